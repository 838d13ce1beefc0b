use std::io::Write;

use clap::Args;

use super::{emit, required, FieldChanges};
use crate::error::{AgileError, Result};
use crate::model::payload::Payload;
use crate::model::work_item::WorkItem;
use crate::rally::AgileApi;

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    /// Name of the new work item
    #[arg(long = "workitemname")]
    pub name: String,

    /// Work item type, e.g. HierarchicalRequirement or Defect
    #[arg(long = "workitemtype")]
    pub work_type: String,

    #[command(flatten)]
    pub changes: FieldChanges,
}

pub async fn run<W: Write>(api: &dyn AgileApi, args: &CreateArgs, out: &mut W) -> Result<()> {
    let name = required(&args.name, "Name of the work item")?;
    let work_type = required(
        &args.work_type,
        "Type of work item e.g HierarchicalRequirement, Defect",
    )?;

    let mut payload = Payload::new().with("Name", name);
    args.changes.apply(api, &mut payload).await?;

    let created = WorkItem::from_object(&api.create(work_type, &payload).await?);
    let formatted_id = created
        .formatted_id
        .ok_or_else(|| AgileError::Remote("Created work item has no FormattedID".into()))?;
    let object_id = created
        .object_id
        .ok_or_else(|| AgileError::Remote("Created work item has no ObjectID".into()))?;
    tracing::info!(%formatted_id, object_id, "work item created");

    emit(out, "UC4RB_AC_WORK_ITEM_ID", &formatted_id)?;
    emit(out, "UC4RB_AC_WORK_ITEM_OBJ_ID", object_id)
}
