use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use super::{emit, non_blank, required};
use crate::error::Result;
use crate::export::{self, ExportRequest, RowLimit};
use crate::query;
use crate::rally::AgileApi;
use crate::util::files;

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[arg(long = "workitemtype")]
    pub work_type: String,

    /// Destination CSV file
    #[arg(long = "exportfilepath")]
    pub path: PathBuf,

    #[arg(long)]
    pub workspace: Option<String>,

    /// Query expression passed to the service unchanged, e.g. "(Owner.Name = bob)"
    #[arg(long)]
    pub filters: Option<String>,

    /// Comma-separated fields to export; defaults to every plain field of the first item
    #[arg(long)]
    pub fields: Option<String>,

    /// Maximum number of items to export; 0 means no limit
    #[arg(long)]
    pub limit: Option<u64>,
}

pub async fn run<W: Write>(api: &dyn AgileApi, args: &ExportArgs, out: &mut W) -> Result<()> {
    let work_type = required(&args.work_type, "Work Item type")?;
    files::check_file_writable(&args.path)?;
    let path = files::absolute_path(&args.path)?;
    let fields = args
        .fields
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .map(export::parse_fields)
        .transpose()?;

    let workspace_ref = query::resolve_optional_workspace(api, args.workspace.as_deref()).await?;
    let request = ExportRequest {
        work_type: work_type.to_string(),
        workspace_ref,
        filter: non_blank(args.filters.as_deref()).map(String::from),
        fields,
        path,
        limit: RowLimit::from_option(args.limit),
    };

    let summary = export::export(api, &request).await?;
    tracing::info!(rows = summary.rows, total = summary.total_available, "export finished");

    let exported_path = summary
        .path
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    emit(out, "UC4RB_AC_EXPORT_FILE_PATH", exported_path)?;
    emit(out, "UC4RB_AC_TOTAL_RESULT_COUNT", summary.rows)
}
