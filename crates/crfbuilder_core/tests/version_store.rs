use crfbuilder_core::{EntityKind, LibraryStore, ModelError, ProjectFile, ProjectTree, VersionStore};

fn sample_state() -> (ProjectTree, LibraryStore) {
    let library = LibraryStore::default_library();
    let (tree, visit) = ProjectTree::new().insert_node(None, None, "Day 1").unwrap();
    let (tree, pk) = tree
        .insert_node(Some(visit.as_str()), None, "PK sampling")
        .unwrap();
    let tree = tree.set_form(&pk, "PK", &library).unwrap();
    (tree, library)
}

#[test]
fn capture_appends_in_order_without_touching_live_state() {
    let (tree, library) = sample_state();
    let tree_before = tree.clone();

    let store = VersionStore::new();
    let (store, first) = store.capture("v1", &tree, &library).unwrap();
    let (store, second) = store.capture(" v2 ", &tree, &library).unwrap();

    assert_eq!(store.len(), 2);
    assert_eq!(store.list()[0].id, first.id);
    assert_eq!(store.list()[1].id, second.id);
    assert_eq!(second.label, "v2");
    assert_ne!(first.id, second.id);
    assert!(first.created_at <= second.created_at);
    assert_eq!(tree, tree_before);
}

#[test]
fn capture_rejects_blank_label() {
    let (tree, library) = sample_state();
    let store = VersionStore::new();
    let err = store.capture("  ", &tree, &library).unwrap_err();
    assert!(matches!(err, ModelError::InvalidOperation(_)));
    assert!(store.is_empty());
}

#[test]
fn captured_payload_is_not_aliased_by_later_edits() {
    let (tree, library) = sample_state();
    let (store, version) = VersionStore::new().capture("v1", &tree, &library).unwrap();

    let root = tree.roots()[0].clone();
    let edited_tree = tree.delete_node(&root).unwrap();
    let edited_library = library.remove_variable_cascade("PK_TIME").unwrap();
    assert!(edited_tree.is_empty());
    assert!(!edited_library.contains_variable("PK_TIME"));

    let stored = store.get(&version.id).unwrap();
    assert_eq!(stored.tree, tree);
    assert_eq!(stored.library, library);
    assert_eq!(*stored, version);
}

#[test]
fn restore_twice_yields_equal_copies() {
    let (tree, library) = sample_state();
    let (store, version) = VersionStore::new().capture("v1", &tree, &library).unwrap();

    let first = store.restore(&version.id).unwrap();
    let second = store.restore(&version.id).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, (tree, library));

    let (mutated_tree, _) = first;
    let root = mutated_tree.roots()[0].clone();
    let _ = mutated_tree.delete_node(&root).unwrap();
    assert_eq!(store.restore(&version.id).unwrap(), second);
}

#[test]
fn restore_and_delete_unknown_version_are_not_found() {
    let store = VersionStore::new();
    assert!(matches!(
        store.restore("nope").unwrap_err(),
        ModelError::NotFound { kind: EntityKind::Version, .. }
    ));
    assert!(matches!(
        store.delete("nope").unwrap_err(),
        ModelError::NotFound { kind: EntityKind::Version, .. }
    ));
}

#[test]
fn delete_removes_only_the_target_version() {
    let (tree, library) = sample_state();
    let (store, first) = VersionStore::new().capture("v1", &tree, &library).unwrap();
    let (store, second) = store.capture("v2", &tree, &library).unwrap();

    let store = store.delete(&first.id).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.list()[0].id, second.id);
    assert!(store.get(&first.id).is_none());
}

#[test]
fn project_restore_replaces_live_tree_and_library() {
    let file = ProjectFile::new("Study 001", "").unwrap();
    let file = file
        .edit_tree(|tree, _| tree.insert_node(None, None, "Screening").map(|(tree, _)| tree))
        .unwrap();
    let (file, version) = file.capture_version("baseline").unwrap();

    let root = file.tree().roots()[0].clone();
    let edited = file
        .edit_tree(|tree, _| tree.delete_node(&root))
        .unwrap()
        .edit_library(|library| library.remove_form("DM"))
        .unwrap();
    assert!(edited.tree().is_empty());

    let restored = edited.restore_version(&version.id).unwrap();
    assert_eq!(restored.tree(), &version.tree);
    assert_eq!(restored.library(), &version.library);
    assert_eq!(restored.versions().len(), 1);
    assert!(restored.meta.last_modified >= edited.meta.last_modified);
}
