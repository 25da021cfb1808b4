#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::any::TypeId;
use std::error::Error;
use std::rc::Rc;

use common::{new_registry, Impostor, Session, Unbindable};
use custodian_core::child::concrete_type_id;
use custodian_core::{
    BasicChild, ExErrorKind, Lifecycle, Manageable, ManagedType, RegistryError,
};

#[test]
fn test_create_then_get_returns_same_instance() {
    // GIVEN an open registry
    let registry = new_registry();

    // WHEN creating a child
    let created = registry.create("k", BasicChild::TYPE_ID).unwrap();

    // THEN get returns that exact instance
    let fetched = registry.get("k").unwrap().expect("child should be bound");
    assert!(Rc::ptr_eq(&created, &fetched));
    assert_eq!(registry.child_count().unwrap(), 1);
}

#[test]
fn test_created_child_is_bound_to_key_and_parent() {
    let registry = new_registry();

    let child = registry.create("k", Session::TYPE_ID).unwrap();

    assert_eq!(child.key().unwrap(), "k");
    assert_eq!(child.parent().unwrap(), registry);
    assert_eq!(child.lifecycle(), Lifecycle::Active);
}

#[test]
fn test_duplicate_key_leaves_original_untouched() {
    // GIVEN a registry with a session under "k"
    let registry = new_registry();
    let original = registry.create_type_keyed::<Session>("k").unwrap();

    // WHEN creating another child under "k"
    let err = registry.create("k", BasicChild::TYPE_ID).unwrap_err();

    // THEN it fails as a duplicate and the session is still bound
    assert!(matches!(err, RegistryError::DuplicateKey { ref key } if key == "k"));
    assert_eq!(err.kind(), ExErrorKind::DuplicateKey);
    let bound = registry.get_as::<Session>("k").unwrap().unwrap();
    assert!(Rc::ptr_eq(&bound, &original));
    assert_eq!(registry.child_count().unwrap(), 1);
    assert_eq!(original.lifecycle(), Lifecycle::Active);
}

#[test]
fn test_duplicate_key_checked_before_instantiation() {
    let registry = new_registry();
    registry.create("k", BasicChild::TYPE_ID).unwrap();

    let err = registry.create("k", "no.such.type").unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateKey { .. }));
}

#[test]
fn test_get_missing_key_is_none() {
    let registry = new_registry();
    assert!(registry.get("absent").unwrap().is_none());
    assert!(!registry.contains_child("absent").unwrap());
    assert!(registry.get_as::<Session>("absent").unwrap().is_none());
}

#[test]
fn test_create_default_keys_by_type_id() {
    let registry = new_registry();

    let child = registry.create_default(Session::TYPE_ID).unwrap();

    assert_eq!(child.key().unwrap(), Session::TYPE_ID);
    assert!(registry.contains_child(Session::TYPE_ID).unwrap());
}

#[test]
fn test_create_type_returns_concrete_child() {
    let registry = new_registry();

    let session = registry.create_type::<Session>().unwrap();

    assert_eq!(session.key().unwrap(), Session::TYPE_ID);
    assert_eq!(session.releases(), 0);
    let keyed = registry.create_type_keyed::<Session>("second").unwrap();
    assert_eq!(keyed.key().unwrap(), "second");
    assert_eq!(registry.child_count().unwrap(), 2);
}

#[test]
fn test_create_type_with_mismatched_constructor_fails_cleanly() {
    // GIVEN "test.impostor" is registered with a constructor building BasicChild
    let registry = new_registry();

    // WHEN creating it as an Impostor
    let err = registry.create_type::<Impostor>().unwrap_err();

    // THEN it is an instantiation failure caused by the type mismatch
    assert_eq!(err.kind(), ExErrorKind::Instantiation);
    let cause = err.source().expect("cause should be attached");
    assert!(cause.to_string().contains("not of the expected type"));

    // AND nothing was stored
    assert_eq!(registry.child_count().unwrap(), 0);
}

#[test]
fn test_untyped_create_accepts_any_constructed_type() {
    let registry = new_registry();
    let child = registry.create("k", Impostor::TYPE_ID).unwrap();

    assert_eq!(concrete_type_id(child.as_ref()), TypeId::of::<BasicChild>());
}

#[test]
fn test_get_as_wrong_type_is_type_mismatch() {
    let registry = new_registry();
    registry.create("k", BasicChild::TYPE_ID).unwrap();

    let err = registry.get_as::<Session>("k").unwrap_err();

    assert!(matches!(err, RegistryError::TypeMismatch { ref key, .. } if key == "k"));
    assert_eq!(err.code(), "ERR_TYPE_MISMATCH");
    assert!(registry.get_as::<BasicChild>("k").unwrap().is_some());
}

#[test]
fn test_initialize_failure_rolls_back_entry() {
    // GIVEN a type whose initialize always fails
    let registry = new_registry();

    // WHEN creating it
    let err = registry.create("k", Unbindable::TYPE_ID).unwrap_err();

    // THEN the initialize error surfaces and no entry remains
    assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    assert!(!registry.contains_child("k").unwrap());
    assert_eq!(registry.child_count().unwrap(), 0);
    assert!(registry.check_invariants().is_ok());

    // AND the key is free for a later create
    registry.create("k", BasicChild::TYPE_ID).unwrap();
}

#[test]
fn test_keys_is_a_snapshot() {
    let registry = new_registry();
    registry.create("a", BasicChild::TYPE_ID).unwrap();
    registry.create("b", BasicChild::TYPE_ID).unwrap();

    let snapshot = registry.keys().unwrap();
    registry.create("c", BasicChild::TYPE_ID).unwrap();
    registry.close_child("a").unwrap();

    let expected: Vec<_> = vec!["a", "b"];
    assert_eq!(snapshot.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    let current: Vec<_> = registry.keys().unwrap().into_iter().collect();
    assert_eq!(current, vec!["b".to_string(), "c".to_string()]);
}

#[test]
fn test_registries_are_independent() {
    let first = new_registry();
    let second = new_registry();

    first.create("k", BasicChild::TYPE_ID).unwrap();
    second.create("k", BasicChild::TYPE_ID).unwrap();

    assert_ne!(first, second);
    assert_ne!(first.id(), second.id());
    assert_eq!(first.child_count().unwrap(), 1);
    assert_eq!(second.child_count().unwrap(), 1);
}

#[test]
fn test_shared_catalog_across_registries() {
    let first = new_registry();
    let second = custodian_core::Registry::new(Rc::clone(first.catalog()));

    assert!(Rc::ptr_eq(first.catalog(), second.catalog()));
    second.create_type::<Session>().unwrap();
}
