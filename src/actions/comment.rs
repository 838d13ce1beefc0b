use std::path::PathBuf;

use clap::Args;

use super::required;
use crate::error::Result;
use crate::model::payload::Payload;
use crate::query;
use crate::rally::AgileApi;
use crate::util::files;

pub const CONVERSATION_POST: &str = "ConversationPost";

#[derive(Debug, Clone, Args)]
pub struct CommentArgs {
    #[arg(long)]
    pub workspace: String,

    #[arg(long = "workitemid")]
    pub id: String,

    #[arg(long = "workitemtype")]
    pub work_type: String,

    /// File whose whole content is posted as the comment
    #[arg(long = "commentfilepath")]
    pub comment_file: PathBuf,
}

pub async fn run(api: &dyn AgileApi, args: &CommentArgs) -> Result<()> {
    let workspace = required(&args.workspace, "Workspace name")?;
    let work_type = required(&args.work_type, "Work Item type")?;
    let id = required(&args.id, "Work Item ID")?;
    let text = files::read_text(&args.comment_file)?;

    let workspace_ref = query::resolve_workspace(api, workspace).await?;
    let reference = query::resolve_work_item(api, id, work_type, Some(&workspace_ref)).await?;

    let post = Payload::new().with("Text", text).with("Artifact", reference);
    api.create(CONVERSATION_POST, &post).await?;
    tracing::info!(id, "comment added");
    Ok(())
}
