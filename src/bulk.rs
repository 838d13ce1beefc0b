//! Applies one update payload to many work items.
//!
//! IDs are resolved to references in batches, because the service limits how
//! many values one filter may carry, then updated one at a time. The first
//! failed update stops the run; items updated before it stay updated.

use std::collections::BTreeSet;
use std::io::Write;

use crate::error::{AgileError, Result};
use crate::model::payload::Payload;
use crate::model::work_item::{WorkItem, REF_FIELD};
use crate::query::{self, FieldQuery};
use crate::rally::AgileApi;

/// Maximum number of formatted IDs in one OR-query.
pub const BATCH_SIZE: usize = 15;

pub const NOTHING_TO_UPDATE: &str = "Nothing to update";

/// Splits a comma-separated ID list into a de-duplicated set.
pub fn parse_ids(raw: &str) -> Result<BTreeSet<String>> {
    let ids: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();
    if ids.is_empty() {
        return Err(AgileError::invalid_parameter("Work item ids", raw));
    }
    Ok(ids)
}

/// Resolves every ID to its reference. A batch whose match count differs from
/// its size fails the whole resolution.
pub async fn resolve_refs(
    api: &dyn AgileApi,
    work_type: &str,
    workspace_ref: Option<&str>,
    ids: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let ids: Vec<&String> = ids.iter().collect();
    let mut refs = Vec::with_capacity(ids.len());

    for (n, batch) in ids.chunks(BATCH_SIZE).enumerate() {
        let query = FieldQuery::new(work_type)
            .workspace(workspace_ref)
            .matching("FormattedID", batch.iter().map(|id| id.as_str()))
            .fetch(&[REF_FIELD, "FormattedID"])
            .page_size(batch.len());
        let page = query::run(api, &query).await?;
        tracing::debug!(
            batch = n + 1,
            requested = batch.len(),
            found = page.total_result_count,
            "resolved batch"
        );

        if page.total_result_count != batch.len() {
            let found: BTreeSet<&str> = page
                .results
                .iter()
                .filter_map(|r| r.get("FormattedID").and_then(|v| v.as_str()))
                .collect();
            let missing: Vec<&str> = batch
                .iter()
                .map(|id| id.as_str())
                .filter(|id| !found.contains(id))
                .collect();
            return Err(AgileError::Validation(format!(
                "Error occured while fetching details of work items, some work items might not exist: [{}]",
                missing.join(", ")
            )));
        }

        for record in &page.results {
            let reference = record
                .get(REF_FIELD)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    AgileError::Remote("Work item without reference in response".into())
                })?;
            refs.push(reference.to_string());
        }
    }

    Ok(refs)
}

/// Sends `payload` to each reference in order, reporting each success to `out`.
/// Returns the number of items updated.
pub async fn apply<W: Write>(
    api: &dyn AgileApi,
    refs: &[String],
    payload: &Payload,
    out: &mut W,
) -> Result<usize> {
    for (done, reference) in refs.iter().enumerate() {
        let object = match api.update(reference, payload).await {
            Ok(object) => object,
            Err(e) => {
                tracing::error!(
                    %reference,
                    updated = done,
                    remaining = refs.len() - done,
                    "bulk update aborted"
                );
                return Err(e);
            }
        };
        let item = WorkItem::from_object(&object);
        writeln!(out, "Work Item {} updated", item.display_id())
            .map_err(|e| AgileError::io("Unable to write to console", e))?;
    }
    Ok(refs.len())
}

/// Full bulk edit: parse, resolve, then apply fail-fast.
pub async fn run<W: Write>(
    api: &dyn AgileApi,
    work_type: &str,
    workspace_ref: Option<&str>,
    raw_ids: &str,
    payload: &Payload,
    out: &mut W,
) -> Result<usize> {
    if payload.is_empty() {
        return Err(AgileError::Validation(NOTHING_TO_UPDATE.into()));
    }
    let ids = parse_ids(raw_ids)?;
    let refs = resolve_refs(api, work_type, workspace_ref, &ids).await?;
    tracing::info!(items = refs.len(), "updating work items");
    apply(api, &refs, payload, out).await
}
