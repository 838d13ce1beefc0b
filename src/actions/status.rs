use clap::{Args, ValueEnum};

use super::{non_blank, required};
use crate::error::Result;
use crate::model::payload::Payload;
use crate::query;
use crate::rally::AgileApi;

/// Flow flags a work item can carry besides its schedule state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum WorkItemStatus {
    None,
    Ready,
    Blocked,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[arg(long = "workitemid")]
    pub id: String,

    #[arg(long = "workitemtype")]
    pub work_type: String,

    #[arg(long = "workitemstatus", value_enum, ignore_case = true)]
    pub status: WorkItemStatus,

    /// Only sent when the status is Blocked
    #[arg(long = "blockedreason")]
    pub blocked_reason: Option<String>,

    #[arg(long)]
    pub workspace: Option<String>,
}

/// Flag changes for `status`. Ready and Blocked exclude each other.
pub fn status_payload(status: WorkItemStatus, blocked_reason: Option<&str>) -> Payload {
    match status {
        WorkItemStatus::None => Payload::new().with("Ready", false).with("Blocked", false),
        WorkItemStatus::Ready => Payload::new().with("Ready", true).with("Blocked", false),
        WorkItemStatus::Blocked => {
            let mut payload = Payload::new().with("Blocked", true).with("Ready", false);
            if let Some(reason) = non_blank(blocked_reason) {
                payload.set("BlockedReason", reason);
            }
            payload
        }
    }
}

pub async fn run(api: &dyn AgileApi, args: &StatusArgs) -> Result<()> {
    let work_type = required(&args.work_type, "Work Item type")?;
    let id = required(&args.id, "Work item ID")?;

    let workspace_ref = query::resolve_optional_workspace(api, args.workspace.as_deref()).await?;
    let reference = query::resolve_work_item(api, id, work_type, workspace_ref.as_deref()).await?;
    let payload = status_payload(args.status, args.blocked_reason.as_deref());
    api.update(&reference, &payload).await?;
    tracing::info!(id, status = ?args.status, "work item status changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::tests::single_matches;
    use serde_json::json;

    #[test]
    fn none_clears_both_flags() {
        assert_eq!(
            serde_json::to_value(status_payload(WorkItemStatus::None, Some("ignored"))).unwrap(),
            json!({ "Ready": false, "Blocked": false })
        );
    }

    #[test]
    fn ready_clears_blocked() {
        assert_eq!(
            serde_json::to_value(status_payload(WorkItemStatus::Ready, None)).unwrap(),
            json!({ "Ready": true, "Blocked": false })
        );
    }

    #[test]
    fn blocked_carries_reason_when_given() {
        let payload = status_payload(WorkItemStatus::Blocked, Some("Waiting on API"));
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            json!({ "Blocked": true, "Ready": false, "BlockedReason": "Waiting on API" })
        );
        assert!(!status_payload(WorkItemStatus::Blocked, Some(" ")).contains("BlockedReason"));
    }

    #[test]
    fn status_parses_ignoring_case() {
        assert_eq!(
            WorkItemStatus::from_str("blocked", true).unwrap(),
            WorkItemStatus::Blocked
        );
        assert!(WorkItemStatus::from_str("Done", true).is_err());
    }

    #[tokio::test]
    async fn updates_resolved_item() {
        let api = single_matches();
        let args = StatusArgs {
            id: "TA3".into(),
            work_type: "Task".into(),
            status: WorkItemStatus::Ready,
            blocked_reason: None,
            workspace: None,
        };

        run(&api, &args).await.unwrap();

        assert_eq!(api.updated_refs(), vec!["/task/1"]);
        assert_eq!(api.query_count(), 1);
    }
}
