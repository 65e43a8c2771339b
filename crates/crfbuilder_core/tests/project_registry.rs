use crfbuilder_core::db::migrations::latest_version;
use crfbuilder_core::db::{open_db, open_db_in_memory, open_registry_db, DbError};
use crfbuilder_core::{
    encode_project, ConfigError, CoreConfig, ImportError, InMemoryProjectRegistry, ProjectFile,
    ProjectRegistry, ProjectService, ProjectServiceError, RegistryError, SqliteProjectRegistry,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn open_db_applies_migrations_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.sqlite3");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
}

#[test]
fn open_db_rejects_newer_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert_eq!(err.code(), "db_schema_too_new");
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn open_registry_db_creates_data_dir_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig::for_data_dir(dir.path().join("app").join("data")).unwrap();

    let project_id = {
        let conn = open_registry_db(&config).unwrap();
        let service = ProjectService::new(SqliteProjectRegistry::try_new(&conn).unwrap());
        let file = service.create_project("Study", "").unwrap();
        file.meta.id
    };
    assert!(config.registry_path.is_file());

    let conn = open_registry_db(&config).unwrap();
    let registry = SqliteProjectRegistry::try_new(&conn).unwrap();
    assert!(registry.load(&project_id).unwrap().is_some());
}

#[test]
fn open_registry_db_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CoreConfig::for_data_dir(dir.path()).unwrap();
    config.registry_path = "relative/projects.sqlite3".into();

    let err = open_registry_db(&config).unwrap_err();
    assert_eq!(err.code(), "db_config_invalid");
    assert!(matches!(err, DbError::Config(ConfigError::RelativePath(_))));
    assert!(!dir.path().join("relative").exists());
}

#[test]
fn registry_requires_migrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteProjectRegistry::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RegistryError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn persist_replaces_whole_document_and_lists_latest_first() {
    let conn = setup();
    let registry = SqliteProjectRegistry::try_new(&conn).unwrap();

    let mut older = ProjectFile::new("Older", "").unwrap();
    older.meta.last_modified = 1_000;
    let mut newer = ProjectFile::new("Newer", "").unwrap();
    newer.meta.last_modified = 2_000;
    registry.persist(&older).unwrap();
    registry.persist(&newer).unwrap();

    let names: Vec<String> = registry.list().unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names, ["Newer", "Older"]);

    let edited = older
        .edit_tree(|tree, _| tree.insert_node(None, None, "Visit").map(|(tree, _)| tree))
        .unwrap();
    registry.persist(&edited).unwrap();

    let loaded = registry.load(&older.meta.id).unwrap().unwrap();
    assert_eq!(loaded, edited);
    assert_eq!(registry.list().unwrap().len(), 2);
    assert_eq!(registry.list().unwrap()[0].id, edited.meta.id);
}

#[test]
fn load_missing_returns_none_and_delete_missing_is_not_found() {
    let conn = setup();
    let registry = SqliteProjectRegistry::try_new(&conn).unwrap();
    assert!(registry.load("nope").unwrap().is_none());
    assert!(matches!(
        registry.delete("nope").unwrap_err(),
        RegistryError::NotFound(id) if id == "nope"
    ));
}

#[test]
fn load_rejects_corrupted_document() {
    let conn = setup();
    let registry = SqliteProjectRegistry::try_new(&conn).unwrap();
    let file = ProjectFile::new("Study", "").unwrap();
    registry.persist(&file).unwrap();

    conn.execute(
        "UPDATE project_files SET document = '{\"meta\": 1}' WHERE project_id = ?1;",
        [file.meta.id.as_str()],
    )
    .unwrap();
    assert!(matches!(
        registry.load(&file.meta.id).unwrap_err(),
        RegistryError::InvalidData(_)
    ));
}

#[test]
fn deleting_last_project_leaves_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.sqlite3");
    let project_id = {
        let conn = open_db(&path).unwrap();
        let service = ProjectService::new(SqliteProjectRegistry::try_new(&conn).unwrap());
        let file = service.create_project("Only", "").unwrap();
        service.delete_project(&file.meta.id).unwrap();
        file.meta.id
    };

    let conn = open_db(&path).unwrap();
    let registry = SqliteProjectRegistry::try_new(&conn).unwrap();
    assert!(registry.list().unwrap().is_empty());
    assert!(registry.load(&project_id).unwrap().is_none());
}

#[test]
fn service_create_open_and_commit_persist_each_edit() {
    let service = ProjectService::new(InMemoryProjectRegistry::new());
    let file = service.create_project("  CRF-001 ", "Screening CRFs").unwrap();
    assert_eq!(file.meta.name, "CRF-001");
    assert_eq!(file.library(), &crfbuilder_core::LibraryStore::default_library());

    let edited = service
        .commit(&file, |file| {
            file.edit_tree(|tree, _| tree.insert_node(None, None, "Visit").map(|(tree, _)| tree))
        })
        .unwrap();
    assert_eq!(service.open_project(&file.meta.id).unwrap(), edited);

    let err = service
        .commit(&edited, |file| file.edit_library(|library| library.remove_form("GHOST")))
        .unwrap_err();
    assert!(matches!(err, ProjectServiceError::Model(_)));
    assert_eq!(service.open_project(&file.meta.id).unwrap(), edited);
}

#[test]
fn service_open_and_delete_unknown_project() {
    let service = ProjectService::new(InMemoryProjectRegistry::new());
    assert!(matches!(
        service.open_project("nope").unwrap_err(),
        ProjectServiceError::ProjectNotFound(_)
    ));
    assert!(matches!(
        service.delete_project("nope").unwrap_err(),
        ProjectServiceError::ProjectNotFound(_)
    ));
}

#[test]
fn service_import_duplicate_id_leaves_registry_unchanged() {
    let conn = setup();
    let service = ProjectService::new(SqliteProjectRegistry::try_new(&conn).unwrap());
    let original = service.create_project("Study", "original").unwrap();
    let before = service.list_projects().unwrap();

    let mut foreign = original.set_description("foreign copy");
    foreign.meta.name = "Foreign".to_string();
    let err = service
        .import_project(&encode_project(&foreign).unwrap())
        .unwrap_err();

    assert!(matches!(
        err,
        ProjectServiceError::Import(ImportError::DuplicateProjectId(ref id)) if *id == original.meta.id
    ));
    assert_eq!(service.list_projects().unwrap(), before);
    assert_eq!(service.open_project(&original.meta.id).unwrap(), original);
}

#[test]
fn service_export_then_import_into_another_registry() {
    let source = ProjectService::new(InMemoryProjectRegistry::new());
    let file = source.create_project("Study", "").unwrap();
    let (file, _) = file.capture_version("baseline").unwrap();
    source.save_project(&file).unwrap();
    let document = source.export_project(&file.meta.id).unwrap();

    let target = ProjectService::new(InMemoryProjectRegistry::new());
    let imported = target.import_project(&document).unwrap();
    assert_eq!(imported, file);
    assert_eq!(target.registry().len(), 1);
    assert_eq!(target.open_project(&file.meta.id).unwrap(), file);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}
