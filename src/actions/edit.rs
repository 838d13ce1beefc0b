use clap::Args;

use super::{non_blank, required, sets_fields, FieldChanges};
use crate::error::{AgileError, Result};
use crate::model::payload::Payload;
use crate::query;
use crate::rally::AgileApi;

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    /// Formatted ID of the item, e.g. US123
    #[arg(long = "workitemid")]
    pub id: String,

    #[arg(long = "workitemtype")]
    pub work_type: String,

    /// New name
    #[arg(long = "workitemname")]
    pub name: Option<String>,

    #[command(flatten)]
    pub changes: FieldChanges,
}

pub async fn run(api: &dyn AgileApi, args: &EditArgs) -> Result<()> {
    let id = required(&args.id, "ID of the work item (User story, Defect etc.)")?;
    let work_type = required(
        &args.work_type,
        "Type of work item e.g HierarchicalRequirement, Defect",
    )?;

    let no_changes = || {
        AgileError::Validation(format!(
            "No changes have been specified for work item [{id}]"
        ))
    };
    let name = non_blank(args.name.as_deref());
    if name.is_none() && !args.changes.has_changes() {
        return Err(no_changes());
    }

    let mut payload = Payload::new();
    if let Some(name) = name {
        payload.set("Name", name);
    }
    let workspace_ref = args.changes.apply(api, &mut payload).await?;
    if !sets_fields(&payload) {
        return Err(no_changes());
    }

    let reference = query::resolve_work_item(api, id, work_type, workspace_ref.as_deref()).await?;
    api.update(&reference, &payload).await?;
    tracing::info!(id, fields = payload.len(), "work item updated");
    Ok(())
}
