#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use tessera_core::errors::{ExErrorKind, SessionError};
use tessera_core::logging_facility::test_capture::init_test_capture;
use tessera_core::logging_facility::Profile;
use tessera_core::memory::RecordingResourceProcessor;
use tessera_core::{log_op_end, log_op_error, log_op_start, ResourceId};
use tessera_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};

#[test]
fn test_log_op_macros_emit_canonical_events() {
    let capture = init_test_capture();
    let op_name = "test_log_op_macros_unique_1";

    log_op_start!(op_name);
    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[1].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[1].fields.get("duration_ms"), Some(&"42".to_string()));
}

#[test]
fn test_log_op_error_includes_kind_and_code() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_2";

    let err = SessionError::UnresolvableReference {
        resource: ResourceId::new("ghost", "page"),
    };
    log_op_error!(op_name, err, duration_ms = 10);

    let events = capture.events_for_op(op_name);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_END_ERROR));
    assert_eq!(
        events[0].fields.get("err.kind"),
        Some(&format!("{:?}", ExErrorKind::UnresolvableReference))
    );
    assert_eq!(
        events[0].fields.get("err.code"),
        Some(&"ERR_UNRESOLVABLE_REFERENCE".to_string())
    );
}

#[test]
fn test_save_changes_is_bracketed_with_counts() {
    let capture = init_test_capture();
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let session_id = session.id().to_string();
    let blog = session.find_container("news", &handler(BLOG)).unwrap();
    session.add_member(blog, "log-m1").unwrap();

    session.save_changes().unwrap();

    let events: Vec<_> = capture
        .events_for_op("save_changes")
        .into_iter()
        .filter(|e| e.fields.get("session_id") == Some(&session_id))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event.as_deref(), Some(EVENT_START));
    assert_eq!(events[1].event.as_deref(), Some(EVENT_END));
    assert_eq!(events[1].fields.get("new_count"), Some(&"1".to_string()));
    assert_eq!(events[1].fields.get("dirty_count"), Some(&"2".to_string()));
    assert_eq!(events[1].fields.get("deleted_count"), Some(&"0".to_string()));
}

#[test]
fn test_failed_save_logs_end_error() {
    let capture = init_test_capture();
    let mut fixture = Fixture::with_processor(RecordingResourceProcessor::failing());
    let mut session = fixture.session();
    let session_id = session.id().to_string();

    assert!(session.save_changes().is_err());

    let errors: Vec<_> = capture
        .events_for_op("save_changes")
        .into_iter()
        .filter(|e| e.fields.get("session_id") == Some(&session_id))
        .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].fields.get("err.code"),
        Some(&"ERR_EXTERNAL_SERVICE".to_string())
    );
}

#[test]
fn test_unit_of_work_reports_each_registration() {
    let capture = init_test_capture();
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let blog = session.find_container("news", &handler(BLOG)).unwrap();

    let member = session.add_member(blog, "log-m2").unwrap();
    session.modify(member).unwrap();
    session.delete(member).unwrap();
    let page = session.resolve(&home()).unwrap();
    session.modify(page).unwrap();
    session.delete(page).unwrap();

    // new then deleted: only the creation is reported
    assert_eq!(capture.ledger_events_for("log-m2@post"), vec!["created"]);
    // dirty then deleted
    assert_eq!(
        capture.ledger_events_for("home@page"),
        vec!["updated", "deleted"]
    );
}

#[test]
fn test_lazy_resolution_is_logged() {
    let capture = init_test_capture();
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let page = session.find("home", &handler(PAGE)).unwrap();

    session.attachments(page).unwrap();

    assert!(capture
        .events_for_op("resolve")
        .iter()
        .any(|e| e.resource.as_deref() == Some("home@page")
            && e.event.as_deref() == Some(EVENT_END)));
}

#[test]
fn test_profile_parsing() {
    assert_eq!("dev".parse::<Profile>().unwrap(), Profile::Development);
    assert_eq!("Production".parse::<Profile>().unwrap(), Profile::Production);
    assert!("verbose".parse::<Profile>().is_err());
    assert_eq!(Profile::Production.default_filter(), "tessera=info");
}
