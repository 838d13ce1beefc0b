use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Args;

use super::{non_blank, required};
use crate::error::{AgileError, Result};
use crate::model::payload::Payload;
use crate::model::work_item::WorkItem;
use crate::query;
use crate::rally::AgileApi;
use crate::util::files;

#[derive(Debug, Clone, Args)]
pub struct AttachmentArgs {
    #[arg(long = "workitemid")]
    pub id: String,

    #[arg(long = "workitemtype")]
    pub work_type: String,

    /// File to upload
    #[arg(long = "filepath")]
    pub file: PathBuf,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub workspace: Option<String>,
}

/// MIME type guessed from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "xml" => "application/xml",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

fn read_attachment(path: &Path) -> Result<Vec<u8>> {
    files::check_file_exists(path)?;
    let bytes = fs::read(path).map_err(|e| {
        AgileError::io(format!("Unable to read file [{}]", path.display()), e)
    })?;
    if bytes.is_empty() {
        return Err(AgileError::Validation(format!(
            "The file[{}] is empty.",
            path.display()
        )));
    }
    Ok(bytes)
}

pub async fn run(api: &dyn AgileApi, args: &AttachmentArgs) -> Result<()> {
    let bytes = read_attachment(&args.file)?;
    let work_type = required(&args.work_type, "Work Item type")?;
    let id = required(&args.id, "Work item ID")?;

    let workspace_ref = query::resolve_optional_workspace(api, args.workspace.as_deref()).await?;
    let reference = query::resolve_work_item(api, id, work_type, workspace_ref.as_deref()).await?;

    let content = api
        .create(
            "AttachmentContent",
            &Payload::new().with("Content", STANDARD.encode(&bytes)),
        )
        .await?;
    let content_ref = WorkItem::from_object(&content)
        .reference
        .ok_or_else(|| AgileError::Remote("Uploaded content has no reference".into()))?;

    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut attachment = Payload::new()
        .with("Artifact", reference)
        .with("Content", content_ref)
        .with("ContentType", content_type(&args.file))
        .with("Name", name)
        .with("Size", bytes.len());
    if let Some(description) = non_blank(args.description.as_deref()) {
        attachment.set("Description", description);
    }
    api.create("Attachment", &attachment).await?;
    tracing::info!(id, size = bytes.len(), "attachment added");
    Ok(())
}
