pub mod filter;
pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::payload::Payload;
use crate::model::work_item::Record;

pub use filter::QueryFilter;

/// Page size the service uses when the caller doesn't ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub work_type: String,
    pub filter: Option<QueryFilter>,
    pub fetch: Vec<String>,
    pub workspace: Option<String>,
    /// 1-based index of the first record of the page.
    pub start: usize,
    pub page_size: usize,
}

impl QueryRequest {
    pub fn new(work_type: impl Into<String>) -> Self {
        Self {
            work_type: work_type.into(),
            filter: None,
            fetch: Vec::new(),
            workspace: None,
            start: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn filter(mut self, filter: Option<QueryFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn fetch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn workspace(mut self, workspace_ref: Option<&str>) -> Self {
        self.workspace = workspace_ref.map(String::from);
        self
    }

    pub fn page(mut self, start: usize, page_size: usize) -> Self {
        self.start = start;
        self.page_size = page_size;
        self
    }
}

/// One page of query results plus the server-reported total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub total_result_count: usize,
    pub results: Vec<Record>,
}

/// Remote work-item service. Every call is one request; nothing is retried.
#[async_trait]
pub trait AgileApi: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage>;

    /// Creates an object of `work_type` and returns the created object.
    async fn create(&self, work_type: &str, payload: &Payload) -> Result<Value>;

    /// Applies a partial update to the object behind `reference` and returns it.
    async fn update(&self, reference: &str, payload: &Payload) -> Result<Value>;

    async fn delete(&self, reference: &str) -> Result<()>;
}
