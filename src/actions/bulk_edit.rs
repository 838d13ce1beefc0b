use std::io::Write;

use clap::Args;

use super::{required, sets_fields, FieldChanges};
use crate::bulk;
use crate::error::{AgileError, Result};
use crate::model::payload::Payload;
use crate::rally::AgileApi;

#[derive(Debug, Clone, Args)]
pub struct BulkEditArgs {
    /// Comma-separated formatted IDs, e.g. US1,US2
    #[arg(long = "workitemids")]
    pub ids: String,

    #[arg(long = "workitemtype")]
    pub work_type: String,

    #[command(flatten)]
    pub changes: FieldChanges,
}

pub async fn run<W: Write>(api: &dyn AgileApi, args: &BulkEditArgs, out: &mut W) -> Result<()> {
    let work_type = required(
        &args.work_type,
        "Type of work item e.g HierarchicalRequirement, Defect",
    )?;
    bulk::parse_ids(&args.ids)?;
    let nothing_to_update = || AgileError::Validation(bulk::NOTHING_TO_UPDATE.into());
    if !args.changes.has_changes() {
        return Err(nothing_to_update());
    }

    let mut payload = Payload::new();
    let workspace_ref = args.changes.apply(api, &mut payload).await?;
    if !sets_fields(&payload) {
        return Err(nothing_to_update());
    }

    let updated = bulk::run(
        api,
        work_type,
        workspace_ref.as_deref(),
        &args.ids,
        &payload,
        out,
    )
    .await?;
    tracing::info!(updated, "bulk edit finished");
    Ok(())
}
