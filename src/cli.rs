use std::io::Write;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::actions::{
    attachment::{self, AttachmentArgs},
    bulk_edit::{self, BulkEditArgs},
    comment::{self, CommentArgs},
    create::{self, CreateArgs},
    delete::{self, DeleteArgs},
    edit::{self, EditArgs},
    export::{self, ExportArgs},
    status::{self, StatusArgs},
};
use crate::config::ConnectionOverrides;
use crate::error::Result;
use crate::rally::AgileApi;

#[derive(Debug, Parser)]
#[command(name = "agilecentral")]
#[command(about = "Work item actions against an Agile Central workspace")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Service base URL, e.g. https://rally1.rallydev.com
    #[arg(long = "baseurl", global = true)]
    pub base_url: Option<String>,

    /// Login for basic authentication; the password is read from UC4_DECRYPTED_PWD
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// API key; takes precedence over username and password
    #[arg(long = "apikey", global = true)]
    pub api_key: Option<String>,

    /// Skip TLS certificate validation
    #[arg(long = "ssl", global = true, action = ArgAction::Set, value_name = "BOOL")]
    pub skip_cert_validation: Option<bool>,

    /// Config file (default: ~/.agilecentral/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            base_url: self.base_url.clone(),
            username: self.username.clone(),
            api_key: self.api_key.clone(),
            skip_cert_validation: self.skip_cert_validation,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a work item
    CreateWorkItem(CreateArgs),
    /// Update fields of one work item
    EditWorkItem(EditArgs),
    /// Apply the same field changes to many work items
    BulkEditWorkItems(BulkEditArgs),
    /// Delete a work item
    DeleteWorkItem(DeleteArgs),
    /// Set the Ready/Blocked flags of a work item
    ChangeWorkItemStatus(StatusArgs),
    /// Post a comment on a work item
    AddComment(CommentArgs),
    /// Upload a file and attach it to a work item
    AddAttachment(AttachmentArgs),
    /// Export work items to a CSV file
    ExportWorkItems(ExportArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateWorkItem(_) => "create-work-item",
            Command::EditWorkItem(_) => "edit-work-item",
            Command::BulkEditWorkItems(_) => "bulk-edit-work-items",
            Command::DeleteWorkItem(_) => "delete-work-item",
            Command::ChangeWorkItemStatus(_) => "change-work-item-status",
            Command::AddComment(_) => "add-comment",
            Command::AddAttachment(_) => "add-attachment",
            Command::ExportWorkItems(_) => "export-work-items",
        }
    }
}

pub async fn dispatch<W: Write>(api: &dyn AgileApi, command: &Command, out: &mut W) -> Result<()> {
    tracing::debug!(action = command.name(), "running action");
    match command {
        Command::CreateWorkItem(args) => create::run(api, args, out).await,
        Command::EditWorkItem(args) => edit::run(api, args).await,
        Command::BulkEditWorkItems(args) => bulk_edit::run(api, args, out).await,
        Command::DeleteWorkItem(args) => delete::run(api, args).await,
        Command::ChangeWorkItemStatus(args) => status::run(api, args).await,
        Command::AddComment(args) => comment::run(api, args).await,
        Command::AddAttachment(args) => attachment::run(api, args).await,
        Command::ExportWorkItems(args) => export::run(api, args, out).await,
    }
}
