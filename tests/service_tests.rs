//! End-to-end tests for the service facade: backup, migrate, roll back
//! on failure, retention, and cancellable background tasks.

use std::sync::Arc;
use std::time::Duration;
use vaultmigrate::store::{BackupStore, EntityStore, EntityStores};
use vaultmigrate::{
    AesGcmCipher, CipherPrimitive, EntityRecord, EntityType, MemoryAuditSink, MigrationConfig,
    MigrationError, MigrationService, Result,
};

fn employee(id: &str, bank_account: &str) -> EntityRecord {
    EntityRecord::new(id)
        .with_field("first_name", "Ana")
        .with_field("last_name", "Ilic")
        .with_field("email", format!("{}@corp.example", id))
        .with_field("phone", "+381 64 123-4567")
        .with_field("bank_account", bank_account)
        .with_field("salary", 95_000.0)
}

#[tokio::test]
async fn test_migrate_with_backup_happy_path() {
    let stores = EntityStores::in_memory();
    stores
        .store(EntityType::Employee)
        .unwrap()
        .save(employee("e-1", "170-0050-111"))
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let service = MigrationService::new(
        MigrationConfig::default(),
        stores.clone(),
        Arc::new(AesGcmCipher::new(&AesGcmCipher::random_key())),
        audit.clone(),
    );

    let outcome = service.migrate_with_backup().await.unwrap();
    assert!(outcome.migration.success);
    assert!(outcome.rollback.is_none());
    assert!(!outcome.backup_id.is_empty());

    // Backup still holds the plaintext snapshot.
    let backup = service
        .backup_store()
        .get_backup(&outcome.backup_id)
        .await
        .unwrap();
    let snapshot = backup.snapshot_for(EntityType::Employee).unwrap();
    assert_eq!(
        snapshot.records[0].text("bank_account"),
        Some("170-0050-111")
    );

    // The live record is ciphertext.
    let live = stores
        .store(EntityType::Employee)
        .unwrap()
        .fetch_by_id("e-1")
        .await
        .unwrap()
        .unwrap();
    assert!(service
        .gateway()
        .is_already_encrypted(live.text("bank_account").unwrap()));

    assert_eq!(audit.events_of_type("backup_created").len(), 1);
    assert_eq!(audit.events_of_type("migration_flow_completed").len(), 1);
}

struct FlakyCipher {
    inner: AesGcmCipher,
}

impl CipherPrimitive for FlakyCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.contains("BOOM") {
            return Err(MigrationError::Encryption("synthetic failure".to_string()));
        }
        self.inner.encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        self.inner.decrypt(ciphertext)
    }
}

#[tokio::test]
async fn test_failed_migration_rolls_back_to_plaintext() {
    let stores = EntityStores::in_memory();
    let store = stores.store(EntityType::Employee).unwrap();
    store.save(employee("e-1", "170-0001-111")).await.unwrap();
    store.save(employee("e-2", "BOOM-0002-222")).await.unwrap();
    let before = store.fetch_all().await.unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let service = MigrationService::new(
        MigrationConfig::default(),
        stores.clone(),
        Arc::new(FlakyCipher {
            inner: AesGcmCipher::new(&[8u8; 32]),
        }),
        audit,
    );

    let outcome = service.migrate_with_backup().await.unwrap();
    assert!(!outcome.migration.success);
    assert_eq!(outcome.migration.total_errors, 1);

    let rollback = outcome.rollback.expect("rollback should have run");
    assert!(rollback.success);
    assert_eq!(rollback.backup_id, outcome.backup_id);

    // Every record is back to its pre-migration plaintext.
    assert_eq!(store.fetch_all().await.unwrap(), before);
}

#[tokio::test]
async fn test_backup_retention_keeps_most_recent() {
    let stores = EntityStores::in_memory();
    let audit = Arc::new(MemoryAuditSink::new());
    let service = MigrationService::new(
        MigrationConfig::new().backup_retention(2),
        stores,
        Arc::new(AesGcmCipher::new(&[8u8; 32])),
        audit,
    );

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(service.backup_store().create_backup().await.unwrap());
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let removed = service.apply_backup_retention().await.unwrap();
    assert_eq!(removed, ids[..3].to_vec());
    assert_eq!(service.backup_store().list_backups().await, ids[3..].to_vec());
}

/// Primitive that stalls on encrypt so cancellation lands between
/// records.
struct SlowCipher {
    inner: AesGcmCipher,
}

impl CipherPrimitive for SlowCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        std::thread::sleep(Duration::from_millis(10));
        self.inner.encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        self.inner.decrypt(ciphertext)
    }
}

#[tokio::test]
async fn test_spawned_migration_can_be_cancelled() {
    let stores = EntityStores::in_memory();
    let store = stores.store(EntityType::Employee).unwrap();
    for i in 0..25 {
        store
            .save(employee(&format!("e-{}", i), "170-0050-111"))
            .await
            .unwrap();
    }

    let audit = Arc::new(MemoryAuditSink::new());
    let service = MigrationService::new(
        MigrationConfig::default(),
        stores.clone(),
        Arc::new(SlowCipher {
            inner: AesGcmCipher::new(&[8u8; 32]),
        }),
        audit,
    );

    // Cancel before the task is first polled: the flag is observed at
    // the first between-records check and the batch aborts cleanly.
    let handle = service.orchestrator().spawn_migrate_all();
    handle.cancel();
    let result = handle.join().await.unwrap();

    assert!(result.cancelled);
    assert!(!result.success);
    assert_eq!(result.total_errors, 0);
    assert!(result.total_processed < 25);
}

#[tokio::test]
async fn test_spawned_migration_runs_to_completion_when_not_cancelled() {
    let stores = EntityStores::in_memory();
    stores
        .store(EntityType::Employee)
        .unwrap()
        .save(employee("e-1", "170-0050-111"))
        .await
        .unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let service = MigrationService::new(
        MigrationConfig::default(),
        stores,
        Arc::new(AesGcmCipher::new(&[8u8; 32])),
        audit,
    );

    let handle = service.orchestrator().spawn_migrate_all();
    let result = handle.join().await.unwrap();
    assert!(result.success);
    assert!(!result.cancelled);
    assert_eq!(result.total_processed, 1);
}

#[tokio::test]
async fn test_spawned_rollback_task() {
    let stores = EntityStores::in_memory();
    let store = stores.store(EntityType::Employee).unwrap();
    store.save(employee("e-1", "170-0050-111")).await.unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let service = MigrationService::new(
        MigrationConfig::default(),
        stores.clone(),
        Arc::new(AesGcmCipher::new(&[8u8; 32])),
        audit,
    );

    let backup_id = service.backup_store().create_backup().await.unwrap();
    store.delete_all().await.unwrap();

    let handle = service.rollback_engine().spawn_full_rollback(&backup_id);
    let result = handle.join().await.unwrap();
    assert!(result.success);
    assert_eq!(store.fetch_all().await.unwrap().len(), 1);
}
