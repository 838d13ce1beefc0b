//! Streams a filtered set of work items into a CSV file, page by page.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::{AgileError, Result};
use crate::model::work_item::{Record, REF_OBJECT_NAME};
use crate::rally::{AgileApi, QueryFilter, QueryRequest};
use crate::util::csv_writer::CsvWriter;

/// Largest page requested from the service.
pub const PAGE_SIZE: usize = 200;

/// Service bookkeeping fields never exported as columns.
const EXCLUDED_FIELDS: &[&str] = &[
    "_rallyAPIMajor",
    "_rallyAPIMinor",
    "_ref",
    "_refObjectUUID",
    "_objectVersion",
    "_refObjectName",
    "_CreatedAt",
    "ObjectUUID",
    "VersionId",
    "_type",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    Unbounded,
    AtMost(usize),
}

impl RowLimit {
    /// `0` and absent both mean no cap.
    pub fn from_option(limit: Option<u64>) -> Self {
        match limit {
            None | Some(0) => RowLimit::Unbounded,
            Some(n) => RowLimit::AtMost(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }

    fn cap(self, total: usize) -> usize {
        match self {
            RowLimit::Unbounded => total,
            RowLimit::AtMost(n) => n.min(total),
        }
    }

    fn first_page_size(self) -> usize {
        self.cap(PAGE_SIZE)
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub work_type: String,
    pub workspace_ref: Option<String>,
    /// Expression in the service's query language, sent as-is.
    pub filter: Option<String>,
    /// Requested columns; `None` derives them from the first record.
    pub fields: Option<Vec<String>>,
    pub path: PathBuf,
    pub limit: RowLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub total_available: usize,
    /// Set only when at least one row was written.
    pub path: Option<PathBuf>,
}

/// Splits a comma-separated field list. Blank entries are dropped and
/// duplicates (ignoring case) keep their first spelling.
pub fn parse_fields(raw: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let fields: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .filter(|f| seen.insert(f.to_lowercase()))
        .map(String::from)
        .collect();
    if fields.is_empty() {
        return Err(AgileError::Validation(format!(
            "Invalid Fields have been provided [{raw}]"
        )));
    }
    Ok(fields)
}

fn is_exportable(value: &Value) -> bool {
    match value {
        Value::String(_) | Value::Bool(_) | Value::Number(_) => true,
        Value::Object(obj) => obj.contains_key(REF_OBJECT_NAME),
        _ => false,
    }
}

/// Columns for an export with no field list: every scalar or named reference
/// in `first`, in response order, minus bookkeeping fields.
pub fn derive_columns(first: &Record) -> Vec<String> {
    first
        .iter()
        .filter(|(key, _)| !EXCLUDED_FIELDS.contains(&key.as_str()))
        .filter(|(_, value)| is_exportable(value))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Maps requested fields onto the actual keys of `first`, ignoring case.
pub fn match_columns(first: &Record, requested: &[String]) -> Result<Vec<String>> {
    let actual: HashMap<String, &String> = first.keys().map(|k| (k.to_lowercase(), k)).collect();

    let mut columns = Vec::with_capacity(requested.len());
    let mut invalid = Vec::new();
    for field in requested {
        match actual.get(&field.to_lowercase()) {
            Some(key) => columns.push((*key).clone()),
            None => invalid.push(field.as_str()),
        }
    }

    if invalid.is_empty() {
        Ok(columns)
    } else {
        Err(AgileError::Validation(format!(
            "Invalid export fields have been specified {}",
            invalid.join(" ")
        )))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::Object(obj)) => obj
            .get(REF_OBJECT_NAME)
            .and_then(scalar_text)
            .unwrap_or_default(),
        Some(v) => scalar_text(v).unwrap_or_default(),
        None => String::new(),
    }
}

pub fn project_row(record: &Record, columns: &[String]) -> Vec<String> {
    columns.iter().map(|c| cell(record.get(c))).collect()
}

pub async fn export(api: &dyn AgileApi, request: &ExportRequest) -> Result<ExportSummary> {
    let base = QueryRequest::new(&request.work_type)
        .workspace(request.workspace_ref.as_deref())
        .filter(request.filter.as_deref().map(QueryFilter::raw))
        .fetch(
            request
                .fields
                .as_ref()
                .map(|f| f.iter().map(|s| s.to_lowercase()).collect())
                .unwrap_or_else(Vec::new),
        );

    let mut requested = request.limit.first_page_size();
    let mut page = api.query(&base.clone().page(1, requested)).await?;
    let total = page.total_result_count;
    let max_export = request.limit.cap(total);
    tracing::info!(total, max_export, "total available record count");

    let first = match page.results.first() {
        Some(first) if max_export > 0 => first,
        _ => {
            return Ok(ExportSummary {
                rows: 0,
                total_available: total,
                path: None,
            })
        }
    };

    let columns = match &request.fields {
        Some(fields) => match_columns(first, fields)?,
        None => derive_columns(first),
    };
    if columns.is_empty() {
        return Err(AgileError::Validation("No exportable fields found".into()));
    }

    let mut writer = CsvWriter::create(&request.path, &columns)?;
    let mut start = 1;
    loop {
        let returned = page.results.len();
        let take = returned.min(max_export - writer.rows());
        for record in page.results.iter().take(take) {
            writer.write_row(&project_row(record, &columns))?;
        }
        writer.flush()?;
        start += returned;

        let remaining = max_export - writer.rows();
        tracing::info!(remaining, "remaining work items to be exported");
        if remaining == 0 || returned == 0 || returned < requested {
            break;
        }

        requested = remaining.min(PAGE_SIZE);
        page = api.query(&base.clone().page(start, requested)).await?;
    }

    let rows = writer.rows();
    drop(writer);
    Ok(ExportSummary {
        rows,
        total_available: total,
        path: (rows > 0).then(|| request.path.clone()),
    })
}
