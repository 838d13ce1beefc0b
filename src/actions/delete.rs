use clap::Args;

use super::required;
use crate::error::Result;
use crate::query;
use crate::rally::AgileApi;

#[derive(Debug, Clone, Args)]
pub struct DeleteArgs {
    #[arg(long = "workitemid")]
    pub id: String,

    #[arg(long = "workitemtype")]
    pub work_type: String,

    /// Workspace name used to narrow the lookup
    #[arg(long)]
    pub workspace: Option<String>,
}

pub async fn run(api: &dyn AgileApi, args: &DeleteArgs) -> Result<()> {
    let work_type = required(&args.work_type, "Work Item type")?;
    let id = required(&args.id, "Work Item ID")?;

    let workspace_ref = query::resolve_optional_workspace(api, args.workspace.as_deref()).await?;
    let reference = query::resolve_work_item(api, id, work_type, workspace_ref.as_deref()).await?;
    api.delete(&reference).await?;
    tracing::info!(id, %reference, "work item deleted");
    Ok(())
}
