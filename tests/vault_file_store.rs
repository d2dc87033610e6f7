//! File-backed vault persistence.

use std::sync::Arc;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use wicket::vault::{
    CredentialVault, FileStore, KeyValueStore, SecretKey, RECORD_KEY,
};
use wicket::WicketError;

fn vault_in(dir: &TempDir) -> CredentialVault {
    CredentialVault::new(Arc::new(FileStore::open(dir.path()).unwrap()))
}

#[tokio::test]
async fn test_saved_key_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let record = vault_in(&dir)
        .save_key("id_rsa", SecretKey::new("PRIVATE KEY".into()), "pw".into())
        .await
        .unwrap();

    // New store instance over the same directory
    let vault = vault_in(&dir);
    assert!(vault.has_stored_key().unwrap());
    assert_eq!(vault.stored_label().unwrap().as_deref(), Some("id_rsa"));
    assert_eq!(vault.load_record().unwrap(), Some(record));
}

#[tokio::test]
async fn test_plaintext_never_written() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let path = store.path().to_path_buf();

    CredentialVault::new(Arc::new(store))
        .save_key(
            "id_rsa",
            SecretKey::new("super-secret-key-material".into()),
            "correct horse".into(),
        )
        .await
        .unwrap();

    let on_disk = std::fs::read_to_string(path).unwrap();
    assert!(on_disk.contains(RECORD_KEY));
    assert!(!on_disk.contains("super-secret-key-material"));
    assert!(!on_disk.contains("correct horse"));
}

#[tokio::test]
async fn test_clear_removes_record() {
    let dir = TempDir::new().unwrap();
    let vault = vault_in(&dir);

    assert_ok!(
        vault
            .save_key("id_rsa", SecretKey::new("k".into()), "pw".into())
            .await
    );
    assert_ok!(vault.clear());

    assert!(!vault_in(&dir).has_stored_key().unwrap());

    // Clearing an empty store is fine
    assert_ok!(vault.clear());
}

#[tokio::test]
async fn test_save_rejects_empty_inputs() {
    let dir = TempDir::new().unwrap();
    let vault = vault_in(&dir);

    assert_err!(
        vault
            .save_key("", SecretKey::new("k".into()), "pw".into())
            .await
    );
    assert!(matches!(
        vault
            .save_key("id_rsa", SecretKey::new("k".into()), "".into())
            .await,
        Err(WicketError::PassphraseRequired)
    ));
    assert!(!vault.has_stored_key().unwrap());
}

#[test]
fn test_missing_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path().join("nested/state")).unwrap();

    assert_eq!(store.get(RECORD_KEY).unwrap(), None);
    assert!(!store.path().exists());
}

#[test]
fn test_corrupt_file_is_storage_fault() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    std::fs::write(store.path(), "{not json").unwrap();

    assert!(matches!(
        store.get(RECORD_KEY),
        Err(WicketError::StorageFault(_))
    ));
}

#[test]
fn test_write_leaves_no_temp_file() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();

    store.set("a", "1").unwrap();
    store.set("b", "2").unwrap();
    store.remove("a").unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["vault.json".to_string()]);
    assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    assert_eq!(store.get("a").unwrap(), None);
}

#[cfg(unix)]
#[test]
fn test_store_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    store.set("k", "v").unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
