//! One module per CLI subcommand. Each action takes the service client and a
//! writer for the orchestration output, which is stdout outside of tests.

pub mod attachment;
pub mod bulk_edit;
pub mod comment;
pub mod create;
pub mod delete;
pub mod edit;
pub mod export;
pub mod status;

use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use crate::error::{AgileError, Result};
use crate::model::payload::Payload;
use crate::query;
use crate::rally::AgileApi;
use crate::util::files;

/// Writes one `KEY ::=value` line for the calling orchestration engine.
pub fn emit<W: Write>(out: &mut W, key: &str, value: impl std::fmt::Display) -> Result<()> {
    writeln!(out, "{key} ::={value}")
        .map_err(|e| AgileError::io("Unable to write to console", e))
}

/// Trimmed value of an optional argument, `None` when blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Trimmed value of a mandatory argument.
pub fn required<'a>(value: &'a str, name: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AgileError::invalid_parameter(name, value));
    }
    Ok(trimmed)
}

const WORKSPACE_FIELD: &str = "Workspace";

/// Whether `payload` sets any field besides the workspace.
pub fn sets_fields(payload: &Payload) -> bool {
    payload.len() > usize::from(payload.contains(WORKSPACE_FIELD))
}

/// Field changes shared by the create and edit actions.
#[derive(Debug, Clone, Default, Args)]
pub struct FieldChanges {
    /// Workspace the item lives in; also scopes the project lookup
    #[arg(long = "workspacename")]
    pub workspace: Option<String>,

    /// Project to assign the item to
    #[arg(long = "projectname")]
    pub project: Option<String>,

    /// File whose whole content becomes the description
    #[arg(long = "descriptionfilepath")]
    pub description_file: Option<PathBuf>,

    #[arg(long = "schedulestate")]
    pub schedule_state: Option<String>,

    /// File of `Key=Value` lines with custom field values
    #[arg(long = "customfilepath")]
    pub custom_file: Option<PathBuf>,
}

impl FieldChanges {
    /// Whether any field besides the workspace was requested. The workspace
    /// only scopes lookups, so on its own it changes nothing.
    pub fn has_changes(&self) -> bool {
        non_blank(self.project.as_deref()).is_some()
            || non_blank(self.schedule_state.as_deref()).is_some()
            || self.custom_file.is_some()
            || self.description_file.is_some()
    }

    /// Adds every requested change to `payload` and returns the resolved
    /// workspace reference. Local files are read before any lookup.
    pub async fn apply(&self, api: &dyn AgileApi, payload: &mut Payload) -> Result<Option<String>> {
        let custom_fields = match &self.custom_file {
            Some(path) => files::read_custom_fields(path)?,
            None => Vec::new(),
        };
        let description = self.description_file.as_deref().map(files::read_text).transpose()?;

        let workspace_ref =
            query::resolve_optional_workspace(api, self.workspace.as_deref()).await?;
        if let Some(workspace_ref) = &workspace_ref {
            payload.set(WORKSPACE_FIELD, workspace_ref.as_str());
        }
        if let Some(project) = non_blank(self.project.as_deref()) {
            let project_ref = query::resolve_project(api, project, workspace_ref.as_deref()).await?;
            payload.set("Project", project_ref);
        }
        if let Some(state) = non_blank(self.schedule_state.as_deref()) {
            payload.set("ScheduleState", state);
        }
        payload.extend(custom_fields);
        if let Some(description) = description {
            payload.set("Description", description);
        }

        Ok(workspace_ref)
    }
}
