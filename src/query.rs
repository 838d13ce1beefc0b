//! Filtered queries and name-to-reference resolution.

use crate::error::{AgileError, Result};
use crate::model::work_item::{Record, REF_FIELD};
use crate::rally::{AgileApi, QueryFilter, QueryPage, QueryRequest};

pub const WORKSPACE_TYPE: &str = "Workspace";
pub const PROJECT_TYPE: &str = "Project";

/// Equality constraints on one work-item type: values of one field are OR-ed,
/// fields are AND-ed.
#[derive(Debug, Clone, Default)]
pub struct FieldQuery {
    work_type: String,
    workspace: Option<String>,
    constraints: Vec<(String, Vec<String>)>,
    fetch: Vec<String>,
    page_size: Option<usize>,
}

impl FieldQuery {
    pub fn new(work_type: impl Into<String>) -> Self {
        Self {
            work_type: work_type.into(),
            ..Default::default()
        }
    }

    pub fn workspace(mut self, workspace_ref: Option<&str>) -> Self {
        self.workspace = workspace_ref.map(String::from);
        self
    }

    pub fn matching<I, S>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints
            .push((field.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn fetch(mut self, fields: &[&str]) -> Self {
        self.fetch = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// `None` leaves the query unconstrained.
    pub fn filter(&self) -> Option<QueryFilter> {
        QueryFilter::all_of(
            self.constraints
                .iter()
                .filter_map(|(field, values)| QueryFilter::any_of(field, values.iter().cloned())),
        )
    }

    pub fn to_request(&self) -> QueryRequest {
        let mut request = QueryRequest::new(&self.work_type)
            .filter(self.filter())
            .fetch(self.fetch.iter().cloned())
            .workspace(self.workspace.as_deref());
        if let Some(size) = self.page_size {
            request.page_size = size;
        }
        request
    }
}

pub async fn run(api: &dyn AgileApi, query: &FieldQuery) -> Result<QueryPage> {
    api.query(&query.to_request()).await
}

fn type_label(work_type: &str) -> &str {
    if work_type.eq_ignore_ascii_case("hierarchicalrequirement") {
        "User Story"
    } else {
        work_type
    }
}

/// Runs `query` and requires exactly one match.
async fn resolve_single(
    api: &dyn AgileApi,
    query: &FieldQuery,
    kind: &str,
    name: &str,
) -> Result<Record> {
    let page = run(api, query).await?;
    if page.total_result_count != 1 {
        return Err(AgileError::NameResolution {
            kind: type_label(kind).to_string(),
            name: name.to_string(),
            found: page.total_result_count,
        });
    }
    page.results
        .into_iter()
        .next()
        .ok_or_else(|| AgileError::Remote(format!("No result returned for [{name}]")))
}

fn reference_of(record: &Record, name: &str) -> Result<String> {
    record
        .get(REF_FIELD)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| AgileError::Remote(format!("No reference returned for [{name}]")))
}

pub async fn resolve_workspace(api: &dyn AgileApi, name: &str) -> Result<String> {
    let query = FieldQuery::new(WORKSPACE_TYPE)
        .matching("Name", [name])
        .fetch(&[REF_FIELD, "Name"]);
    let record = resolve_single(api, &query, WORKSPACE_TYPE, name).await?;
    let reference = reference_of(&record, name)?;
    tracing::debug!(workspace = name, %reference, "resolved workspace");
    Ok(reference)
}

pub async fn resolve_project(
    api: &dyn AgileApi,
    name: &str,
    workspace_ref: Option<&str>,
) -> Result<String> {
    let query = FieldQuery::new(PROJECT_TYPE)
        .workspace(workspace_ref)
        .matching("Name", [name])
        .fetch(&[REF_FIELD, "Name"]);
    let record = resolve_single(api, &query, PROJECT_TYPE, name).await?;
    reference_of(&record, name)
}

pub async fn resolve_work_item(
    api: &dyn AgileApi,
    formatted_id: &str,
    work_type: &str,
    workspace_ref: Option<&str>,
) -> Result<String> {
    let query = FieldQuery::new(work_type)
        .workspace(workspace_ref)
        .matching("FormattedID", [formatted_id])
        .fetch(&[REF_FIELD, "FormattedID"]);
    let record = resolve_single(api, &query, work_type, formatted_id).await?;
    reference_of(&record, formatted_id)
}

/// Workspace reference for an optional, possibly blank, workspace name.
pub async fn resolve_optional_workspace(
    api: &dyn AgileApi,
    name: Option<&str>,
) -> Result<Option<String>> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => resolve_workspace(api, name).await.map(Some),
        None => Ok(None),
    }
}
