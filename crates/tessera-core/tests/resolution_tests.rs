//! Lazy resolution of persistent references
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use tessera_core::errors::SessionError;
use tessera_core::{AttachmentId, ResourceId, SnapshotStatus};

#[test]
fn test_find_does_not_touch_repository() {
    // GIVEN a fresh session
    let mut fixture = Fixture::new();
    let mut session = fixture.session();

    // WHEN finding a resource and reading its identity
    let page = session.find("home", &handler(PAGE)).unwrap();
    let snapshot = session.snapshot(page).unwrap();

    // THEN identity is known without a load
    assert_eq!(snapshot.name(), "home");
    assert_eq!(snapshot.template_id().as_str(), "page");
    assert_eq!(snapshot.status(), SnapshotStatus::PersistentReference);
    assert!(!snapshot.is_deleted());
    drop(session);
    assert_eq!(fixture.repository.load_count(), 0);
}

#[test]
fn test_reference_loads_exactly_once() {
    // GIVEN an unresolved reference to the home page
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let page = session.resolve(&home()).unwrap();

    // WHEN calling many accessors
    for _ in 0..3 {
        session.attachments(page).unwrap();
        session
            .attachment_by_id(page, &AttachmentId::new("meta"))
            .unwrap();
        session
            .attachment_by_resource(page, &ResourceId::new("x", "meta"))
            .unwrap();
        session.is_root(page).unwrap();
        session.parent(page).unwrap();
    }

    // THEN the repository was asked for it once
    assert_eq!(
        session.snapshot(page).unwrap().status(),
        SnapshotStatus::Persistent
    );
    drop(session);
    assert_eq!(fixture.repository.load_count_of(&home()), 1);
}

#[test]
fn test_parent_resolves_through_persisted_parent() {
    // GIVEN a member found directly, before its container
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let member = session.find("p1", &handler(POST)).unwrap();

    // WHEN asking for its parent chain
    let container = session.parent(member).unwrap().unwrap();
    let grandparent = session.parent(container).unwrap().unwrap();

    // THEN the chain follows the repository and ends at the root
    assert_eq!(session.snapshot(container).unwrap().id(), &news());
    assert_eq!(session.snapshot(grandparent).unwrap().id(), &site());
    assert!(session.is_root(grandparent).unwrap());
    assert!(!session.is_root(member).unwrap());

    // AND the container found by name is the same snapshot
    let by_name = session.find_container("news", &handler(BLOG)).unwrap();
    assert_eq!(by_name.as_resource(), container);
}

#[test]
fn test_seeded_children_share_cached_snapshots() {
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let page = session.resolve(&home()).unwrap();
    let owner = session.resolve(&site()).unwrap();

    let attachment = session
        .attachment_by_id(owner, &AttachmentId::new("home"))
        .unwrap()
        .unwrap();

    assert_eq!(attachment.resource(), page);
    assert_eq!(session.parent(page).unwrap(), Some(owner));
}

#[test]
fn test_missing_resource_is_unresolvable() {
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let ghost = session.find("ghost", &handler(PAGE)).unwrap();

    let result = session.attachments(ghost);
    assert!(matches!(
        result,
        Err(SessionError::UnresolvableReference { resource }) if resource.name() == "ghost"
    ));

    // the snapshot stays unresolved and is retried on the next access
    assert_eq!(
        session.snapshot(ghost).unwrap().status(),
        SnapshotStatus::PersistentReference
    );
}

#[test]
fn test_unknown_template_and_handler_on_lookup() {
    let mut fixture = Fixture::new();
    let mut session = fixture.session();

    let result = session.resolve(&ResourceId::new("x", "nope"));
    assert!(matches!(result, Err(SessionError::UnknownTemplate { .. })));

    let result = session.find("x", &handler("NopeHandler"));
    assert!(matches!(result, Err(SessionError::UnknownHandler { .. })));
}

#[test]
fn test_loaded_snapshot_stays_readable_after_save() {
    // GIVEN the home page loaded before the save
    let mut fixture = Fixture::new();
    let mut session = fixture.session();
    let page = session.resolve(&home()).unwrap();
    assert!(!session.is_root(page).unwrap());
    session.save_changes().unwrap();

    // WHEN reading it afterwards
    let attachments = session.attachments(page).unwrap();

    // THEN the cached state answers without another load
    assert!(attachments.is_empty());
    drop(session);
    assert_eq!(fixture.repository.load_count(), 1);
}
