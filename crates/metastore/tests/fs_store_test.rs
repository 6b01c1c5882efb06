use metastore::store::fs::FsMetaStore;
use metastore::store::locking;
use metastore::{Attribute, Element, ElementOwner, ElementType, MetaStore, MetaStoreError, Value};
use std::fs;
use tempfile::TempDir;

const NS: &str = "pentaho";

fn setup() -> (TempDir, FsMetaStore, ElementType) {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path()).with_name("disk");
    let element_type = ElementType::new(NS, "dimension")
        .with_name("Dimension")
        .with_description("Star schema dimensions");
    store.create_namespace(NS).unwrap();
    store.create_element_type(NS, &element_type).unwrap();
    (dir, store, element_type)
}

fn dimension(name: &str) -> Element {
    Element::named(name)
        .with_owner(ElementOwner::user("admin"))
        .with_child(Attribute::new("kind", "time"))
        .with_child(
            Attribute::empty("attribute")
                .with_child(Attribute::new("name", "year"))
                .with_child(Attribute::new("depth", 1i64)),
        )
}

#[test]
fn test_namespace_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path());

    assert!(store.namespaces().unwrap().is_empty());
    store.create_namespace("b").unwrap();
    store.create_namespace("a").unwrap();
    assert_eq!(store.namespaces().unwrap(), vec!["a", "b"]);
    assert!(store.namespace_exists("a").unwrap());

    match store.create_namespace("a") {
        Err(MetaStoreError::NamespaceExists(ns)) => assert_eq!(ns, "a"),
        other => panic!("expected NamespaceExists, got {:?}", other),
    }

    store.delete_namespace("a").unwrap();
    assert!(!store.namespace_exists("a").unwrap());
    assert_eq!(store.namespaces().unwrap(), vec!["b"]);
}

#[test]
fn test_invalid_namespace_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = FsMetaStore::new(dir.path());
    assert!(matches!(
        store.create_namespace(""),
        Err(MetaStoreError::InvalidName(_))
    ));
    assert!(matches!(
        store.create_namespace(".."),
        Err(MetaStoreError::InvalidName(_))
    ));
}

#[test]
fn test_delete_namespace_reports_blocking_types() {
    let (_dir, store, element_type) = setup();
    let other = ElementType::new(NS, "connection");
    store.create_element_type(NS, &other).unwrap();

    let err = store.delete_namespace(NS).unwrap_err();
    assert_eq!(
        err.dependencies().unwrap(),
        &["connection".to_string(), element_type.id.clone()][..]
    );
    assert!(store.namespace_exists(NS).unwrap());
}

#[test]
fn test_element_type_round_trip() {
    let (_dir, store, element_type) = setup();

    let loaded = store.element_type(NS, "dimension").unwrap().unwrap();
    assert_eq!(loaded.id, element_type.id);
    assert_eq!(loaded.name, "Dimension");
    assert_eq!(loaded.description, "Star schema dimensions");
    assert_eq!(loaded.namespace, NS);
    assert_eq!(loaded.store_name.as_deref(), Some("disk"));

    assert_eq!(store.element_type_ids(NS).unwrap(), vec!["dimension"]);
    assert!(store.element_type(NS, "missing").unwrap().is_none());
    assert!(matches!(
        store.create_element_type(NS, &element_type),
        Err(MetaStoreError::ElementTypeExists { .. })
    ));
}

#[test]
fn test_element_type_in_missing_namespace() {
    let (_dir, store, _) = setup();
    let orphan = ElementType::new("nowhere", "x");
    assert!(matches!(
        store.create_element_type("nowhere", &orphan),
        Err(MetaStoreError::NamespaceNotFound(_))
    ));
}

#[test]
fn test_update_element_type() {
    let (_dir, store, element_type) = setup();
    let renamed = element_type.clone().with_name("Dim").with_description("changed");
    store.update_element_type(NS, &renamed).unwrap();

    let loaded = store.element_type_by_name(NS, "Dim").unwrap().unwrap();
    assert_eq!(loaded.description, "changed");
    assert!(store.element_type_by_name(NS, "Dimension").unwrap().is_none());
}

#[test]
fn test_element_create_get_equality() {
    let (_dir, store, element_type) = setup();
    let element = dimension("time");
    store.create_element(NS, &element_type, &element).unwrap();

    let loaded = store.element(NS, &element_type, "time").unwrap().unwrap();
    assert_eq!(loaded, element);
    assert_eq!(
        loaded.owner.as_ref().map(|o| o.name.as_str()),
        Some("admin")
    );
    assert!(store.element(NS, &element_type, "absent").unwrap().is_none());
}

#[test]
fn test_duplicate_element_is_rejected_and_original_kept() {
    let (_dir, store, element_type) = setup();
    store.create_element(NS, &element_type, &dimension("time")).unwrap();

    let other = Element::named("time").with_child(Attribute::new("kind", "other"));
    assert!(matches!(
        store.create_element(NS, &element_type, &other),
        Err(MetaStoreError::ElementExists { .. })
    ));
    let kept = store.element(NS, &element_type, "time").unwrap().unwrap();
    assert_eq!(kept, dimension("time"));
}

#[test]
fn test_update_and_rename_element() {
    let (_dir, store, element_type) = setup();
    store.create_element(NS, &element_type, &dimension("time")).unwrap();

    let renamed = dimension("calendar").with_value(Value::Integer(2));
    store
        .update_element(NS, &element_type, "time", &renamed)
        .unwrap();

    assert_eq!(store.element_ids(NS, &element_type).unwrap(), vec!["calendar"]);
    let loaded = store.element(NS, &element_type, "calendar").unwrap().unwrap();
    assert_eq!(loaded.value, Some(Value::Integer(2)));

    assert!(matches!(
        store.update_element(NS, &element_type, "time", &renamed),
        Err(MetaStoreError::ElementNotFound { .. })
    ));
}

#[test]
fn test_update_to_empty_id_keeps_original_file() {
    let (_dir, store, element_type) = setup();
    store.create_element(NS, &element_type, &dimension("a")).unwrap();

    match store.update_element(NS, &element_type, "a", &Element::new("")) {
        Err(MetaStoreError::InvalidName(_)) => {}
        other => panic!("expected invalid name, got {:?}", other),
    }
    assert_eq!(store.element_ids(NS, &element_type).unwrap(), vec!["a"]);
    assert!(store.element_path(NS, "dimension", "a").is_file());
    assert!(!store.element_path(NS, "dimension", "").exists());
}

#[test]
fn test_delete_element_type_reports_blocking_elements() {
    let (_dir, store, element_type) = setup();
    store.create_element(NS, &element_type, &dimension("b")).unwrap();
    store.create_element(NS, &element_type, &dimension("a")).unwrap();

    let err = store.delete_element_type(NS, &element_type).unwrap_err();
    assert_eq!(
        err.dependencies().unwrap(),
        &["a".to_string(), "b".to_string()][..]
    );

    store.delete_element(NS, &element_type, "a").unwrap();
    store.delete_element(NS, &element_type, "b").unwrap();
    assert!(!store.has_elements(NS, &element_type).unwrap());
    store.delete_element_type(NS, &element_type).unwrap();
    store.delete_namespace(NS).unwrap();
}

#[test]
fn test_delete_missing_element() {
    let (_dir, store, element_type) = setup();
    assert!(matches!(
        store.delete_element(NS, &element_type, "ghost"),
        Err(MetaStoreError::ElementNotFound { .. })
    ));
}

#[test]
fn test_ids_with_unsafe_characters() {
    let (_dir, store, element_type) = setup();
    let element = Element::named("sales/2024 Q1");
    store.create_element(NS, &element_type, &element).unwrap();

    assert_eq!(store.element_ids(NS, &element_type).unwrap(), vec!["sales/2024 Q1"]);
    assert!(store
        .element(NS, &element_type, "sales/2024 Q1")
        .unwrap()
        .is_some());
}

#[test]
fn test_first_match_by_name_is_lowest_id() {
    let (_dir, store, element_type) = setup();
    let mut second = Element::new("id-2");
    second.name = Some("shared".to_string());
    let mut first = Element::new("id-1");
    first.name = Some("shared".to_string());
    store.create_element(NS, &element_type, &second).unwrap();
    store.create_element(NS, &element_type, &first).unwrap();

    let found = store
        .element_by_name(NS, &element_type, "shared")
        .unwrap()
        .unwrap();
    assert_eq!(found.id, "id-1");
}

#[test]
fn test_tolerant_listing_skips_malformed_file() {
    let (_dir, store, element_type) = setup();
    for name in ["a", "b", "c"] {
        store.create_element(NS, &element_type, &dimension(name)).unwrap();
    }
    fs::write(store.element_path(NS, "dimension", "b"), "{ not json").unwrap();

    assert!(store.elements(NS, &element_type).is_err());

    let mut failures = Vec::new();
    let elements = store
        .elements_tolerant(NS, &element_type, &mut failures)
        .unwrap();
    let ids: Vec<_> = elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].element_id, "b");
    assert!(failures[0].error.is_unavailable());
}

#[test]
fn test_no_temp_files_left_behind() {
    let (_dir, store, element_type) = setup();
    store.create_element(NS, &element_type, &dimension("time")).unwrap();
    store
        .update_element(NS, &element_type, "time", &dimension("time"))
        .unwrap();

    let type_dir = store.element_path(NS, "dimension", "time");
    let type_dir = type_dir.parent().unwrap();
    for entry in fs::read_dir(type_dir).unwrap() {
        let name = entry.unwrap().file_name().into_string().unwrap();
        assert!(!name.starts_with(".tmp-"), "Found leftover tmp file: {}", name);
    }
}

#[test]
fn test_lock_flag_is_a_no_op() {
    let (_dir, store, element_type) = setup();
    store.create_element(NS, &element_type, &dimension("time")).unwrap();
    assert!(store.modification_lock().is_none());

    let locked = locking::elements(&store, NS, &element_type, true).unwrap();
    let unlocked = locking::elements(&store, NS, &element_type, false).unwrap();
    assert_eq!(locked, unlocked);

    let by_name = locking::element_by_name(&store, NS, &element_type, "time", true).unwrap();
    assert!(by_name.is_some());
    let type_by_name = locking::element_type_by_name(&store, NS, "Dimension", true).unwrap();
    assert_eq!(type_by_name.map(|t| t.id), Some("dimension".to_string()));
}

#[test]
fn test_reopen_sees_persisted_data() {
    let (dir, store, element_type) = setup();
    store.create_element(NS, &element_type, &dimension("time")).unwrap();
    drop(store);

    let reopened = FsMetaStore::new(dir.path());
    assert_eq!(reopened.namespaces().unwrap(), vec![NS]);
    let loaded = reopened.element(NS, &element_type, "time").unwrap().unwrap();
    assert_eq!(loaded, dimension("time"));
}
