//! Replay command
//!
//! Seeds in-memory collaborators from a scenario file, runs its steps in one
//! write session, then saves (or discards) and prints a JSON report.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tessera_core::logging_facility::{self, Profile};
use tessera_core::memory::{
    InMemoryTemplateCatalog, InMemoryTransactionManager, RecordingResourceProcessor,
    RepositoryCall,
};
use tessera_core::{ChangeSet, ResourceHandle, SessionEnvironment, WriteSession};

use super::scenario::{Scenario, Step};

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Scenario file (JSON)
    pub scenario: PathBuf,

    /// Roll the session back instead of saving it
    #[arg(long)]
    pub discard: bool,

    /// Logging profile (development, production)
    #[arg(long, default_value = "production")]
    pub log_profile: Profile,
}

/// What a replay did to the collaborators
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub session_id: String,
    pub outcome: &'static str,
    pub repository_calls: Vec<RepositoryCall>,
    pub changes: Option<ChangeSet>,
    pub loads: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

pub fn execute(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    logging_facility::init(args.log_profile);

    let content = std::fs::read_to_string(&args.scenario)?;
    let scenario: Scenario = serde_json::from_str(&content)?;
    let report = replay(&scenario, args.discard)?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Run `scenario` in one write session
///
/// # Errors
///
/// Returns an error when seeding fails, a step fails, or saving fails. A
/// failed step discards the session first.
pub fn replay(scenario: &Scenario, discard: bool) -> Result<ReplayReport, Box<dyn std::error::Error>> {
    let templates: InMemoryTemplateCatalog = scenario.catalog();
    let mut repository = scenario.repository()?;
    let mut transactions = InMemoryTransactionManager::new();
    let mut processor = RecordingResourceProcessor::new();

    let mut session = WriteSession::open(SessionEnvironment {
        repository: &mut repository,
        templates: &templates,
        transactions: &mut transactions,
        processor: &mut processor,
    });
    let session_id = session.id().to_string();

    if let Err(err) = run_steps(&mut session, &scenario.steps) {
        session.close();
        return Err(err);
    }

    let (outcome, changes) = if discard {
        session.discard_changes()?;
        ("discarded", None)
    } else {
        ("saved", Some(session.save_changes()?))
    };
    drop(session);

    Ok(ReplayReport {
        session_id,
        outcome,
        repository_calls: repository.calls().to_vec(),
        changes,
        loads: repository.load_count(),
        commits: transactions.commit_count(),
        rollbacks: transactions.rollback_count(),
    })
}

fn run_steps(
    session: &mut WriteSession<'_>,
    steps: &[Step],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut labels: HashMap<String, ResourceHandle> = HashMap::new();

    for (index, step) in steps.iter().enumerate() {
        tracing::debug!(step = index, ?step, "replaying step");
        match step {
            Step::Find {
                name,
                handler,
                label,
            } => {
                let handle = session.find(name, handler)?;
                labels.insert(label.clone(), handle);
            }
            Step::CreateAttachment {
                owner,
                attachment,
                name,
                handler,
                label,
            } => {
                let owner = lookup(&labels, owner)?;
                let child = session.create_attached_resource(owner, attachment, name, handler)?;
                remember(&mut labels, label, child);
            }
            Step::RemoveAttachment { owner, attachment } => {
                let owner = lookup(&labels, owner)?;
                session.remove_attachment(owner, attachment)?;
            }
            Step::SoftDetach {
                owner,
                attachment,
                label,
            } => {
                let owner = lookup(&labels, owner)?;
                if let Some(child) = session.soft_detach(owner, attachment)? {
                    remember(&mut labels, label, child);
                }
            }
            Step::AddMember {
                container,
                name,
                label,
            } => {
                let container = session.as_container(lookup(&labels, container)?)?;
                let member = session.add_member(container, name)?;
                remember(&mut labels, label, member);
            }
            Step::RemoveMember { container, member } => {
                let container = session.as_container(lookup(&labels, container)?)?;
                let target = session
                    .members(container)?
                    .into_iter()
                    .find(|m| m.resource_id().name() == member)
                    .ok_or_else(|| format!("step {}: no member named '{}'", index, member))?;
                session.remove_member(container, target.resource_id())?;
            }
            Step::Modify { target } => {
                session.modify(lookup(&labels, target)?)?;
            }
            Step::Delete { target } => {
                session.delete(lookup(&labels, target)?)?;
            }
        }
    }
    Ok(())
}

fn lookup(labels: &HashMap<String, ResourceHandle>, label: &str) -> Result<ResourceHandle, String> {
    labels
        .get(label)
        .copied()
        .ok_or_else(|| format!("unknown label '{}'", label))
}

fn remember(labels: &mut HashMap<String, ResourceHandle>, label: &Option<String>, handle: ResourceHandle) {
    if let Some(label) = label {
        labels.insert(label.clone(), handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(steps: &str) -> Scenario {
        let json = format!(
            r#"{{
                "templates": [
                    {{ "id": "site", "handler_type": "SiteHandler", "kind": "resource",
                       "attachments": {{ "home": "page", "blog": "blog" }} }},
                    {{ "id": "page", "handler_type": "PageHandler", "kind": "resource" }},
                    {{ "id": "blog", "handler_type": "BlogHandler", "kind": "container",
                       "member_template": "post", "membership_aware": true }},
                    {{ "id": "post", "handler_type": "PostHandler", "kind": "resource" }}
                ],
                "resources": [
                    {{ "id": {{ "name": "s1", "template_id": "site" }} }},
                    {{ "id": {{ "name": "news", "template_id": "blog" }},
                       "parent": {{ "name": "s1", "template_id": "site" }}, "attachment": "blog" }},
                    {{ "id": {{ "name": "p1", "template_id": "post" }},
                       "parent": {{ "name": "news", "template_id": "blog" }} }}
                ],
                "steps": {}
            }}"#,
            steps
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_replay_saves_member_changes() {
        let scenario = scenario(
            r#"[
                { "op": "find", "name": "news", "handler": "BlogHandler", "as": "blog" },
                { "op": "add_member", "container": "blog", "name": "m1" },
                { "op": "remove_member", "container": "blog", "member": "p1" }
            ]"#,
        );

        let report = replay(&scenario, false).unwrap();

        assert_eq!(report.outcome, "saved");
        assert_eq!(report.commits, 1);
        let mutations: Vec<_> = report
            .repository_calls
            .iter()
            .filter(|call| call.is_mutation())
            .collect();
        assert_eq!(mutations.len(), 2);
        let changes = report.changes.unwrap();
        assert_eq!(changes.created.len(), 1);
        assert_eq!(changes.deleted.len(), 1);
    }

    #[test]
    fn test_replay_discard_rolls_back() {
        let scenario = scenario(
            r#"[
                { "op": "find", "name": "s1", "handler": "SiteHandler", "as": "site" },
                { "op": "create_attachment", "owner": "site", "attachment": "home",
                  "name": "home", "handler": "PageHandler" }
            ]"#,
        );

        let report = replay(&scenario, true).unwrap();

        assert_eq!(report.outcome, "discarded");
        assert_eq!(report.rollbacks, 1);
        assert!(report.changes.is_none());
        assert!(report.repository_calls.iter().all(|call| !call.is_mutation()));
    }

    #[test]
    fn test_replay_unknown_label_fails() {
        let scenario = scenario(r#"[ { "op": "modify", "target": "nowhere" } ]"#);

        let err = replay(&scenario, false).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }
}
