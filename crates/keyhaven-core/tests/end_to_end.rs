//! Full lifecycle scenarios against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use keyhaven_core::versions::VersionState;
use keyhaven_core::{render, CreateSecret, ExportFormat, SecretService};
use keyhaven_store::models::{Environment, MembershipRow, OrgRole, OrgRow};
use keyhaven_store::{MemoryStore, SecretStore};

struct World {
    store: Arc<MemoryStore>,
    service: SecretService,
    org_id: Uuid,
    project_id: Uuid,
}

async fn world() -> World {
    let store = Arc::new(MemoryStore::new());
    let org_id = Uuid::new_v4();
    store
        .insert_org(OrgRow {
            id: org_id,
            name: "acme".to_owned(),
            master_key_material: b"end-to-end-master-material".to_vec(),
            created_at: Utc::now(),
        })
        .await;

    World {
        service: SecretService::new(Arc::clone(&store) as Arc<dyn SecretStore>),
        store,
        org_id,
        project_id: Uuid::new_v4(),
    }
}

async fn join(w: &World, role: OrgRole) -> Uuid {
    let principal = Uuid::new_v4();
    w.store
        .upsert_membership(MembershipRow {
            org_id: w.org_id,
            principal_id: principal,
            role,
            created_at: Utc::now(),
        })
        .await;
    principal
}

fn new_secret(w: &World, name: &str, value: &str) -> CreateSecret {
    CreateSecret {
        org_id: w.org_id,
        project_id: w.project_id,
        folder_id: None,
        name: name.to_owned(),
        description: Some(format!("{name} for integration tests")),
        value: value.to_owned(),
        environment: Environment::Production,
    }
}

/// Create, update, and restore a secret, checking the version ledger at
/// each step.
#[tokio::test]
async fn create_update_restore_lifecycle() {
    let w = world().await;
    let dev = join(&w, OrgRole::Developer).await;

    let row = w
        .service
        .create(dev, new_secret(&w, "DB_URL", "postgres://a"))
        .await
        .unwrap();
    assert_eq!(row.version, 1);

    let updated = w.service.update(dev, row.id, "postgres://b").await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(
        w.service.read(dev, row.id).await.unwrap().value,
        "postgres://b"
    );

    // Restoring v1 mints v3 rather than reviving the number 1.
    let restored = w.service.restore(dev, row.id, 1).await.unwrap();
    assert_eq!(restored.version, 3);
    assert_eq!(
        w.service.read(dev, row.id).await.unwrap().value,
        "postgres://a"
    );

    let history = w.service.list_versions(dev, row.id).await.unwrap();
    let got: Vec<(i32, VersionState)> = history.iter().map(|e| (e.version, e.state)).collect();
    assert_eq!(
        got,
        vec![
            (3, VersionState::Current),
            (2, VersionState::Archived),
            (1, VersionState::Archived),
        ]
    );
}

/// Versions advance by exactly one per content change, with no gaps and
/// no reuse, across an arbitrary mix of updates and restores.
#[tokio::test]
async fn version_numbers_are_a_monotonic_operation_count() {
    let w = world().await;
    let dev = join(&w, OrgRole::Developer).await;

    let row = w
        .service
        .create(dev, new_secret(&w, "TOKEN", "v1"))
        .await
        .unwrap();
    for value in ["v2", "v3", "v4"] {
        w.service.update(dev, row.id, value).await.unwrap();
    }
    w.service.restore(dev, row.id, 2).await.unwrap();
    w.service.update(dev, row.id, "v6").await.unwrap();

    let history = w.service.list_versions(dev, row.id).await.unwrap();
    let versions: Vec<i32> = history.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![6, 5, 4, 3, 2, 1]);
    assert_eq!(history[0].state, VersionState::Current);

    // The restore landed v2's content at v5.
    assert_eq!(w.service.read(dev, row.id).await.unwrap().value, "v6");
    w.service.restore(dev, row.id, 5).await.unwrap();
    assert_eq!(w.service.read(dev, row.id).await.unwrap().value, "v2");
}

/// Sharing lets an outside principal in at exactly the granted level, and
/// revocation shuts the door again.
#[tokio::test]
async fn grant_and_revoke_lifecycle() {
    let w = world().await;
    let owner = join(&w, OrgRole::Owner).await;
    let contractor = Uuid::new_v4();

    let row = w
        .service
        .create(owner, new_secret(&w, "API_KEY", "sk-123"))
        .await
        .unwrap();

    assert!(w.service.read(contractor, row.id).await.is_err());

    w.service
        .grant(
            owner,
            row.id,
            contractor,
            keyhaven_store::models::Permission::Write,
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        w.service.read(contractor, row.id).await.unwrap().value,
        "sk-123"
    );
    w.service.update(contractor, row.id, "sk-456").await.unwrap();

    // Write does not dominate share.
    assert!(w
        .service
        .grant(
            contractor,
            row.id,
            Uuid::new_v4(),
            keyhaven_store::models::Permission::Read,
            None,
        )
        .await
        .is_err());

    w.service.revoke(owner, row.id, contractor).await.unwrap();
    assert!(w.service.read(contractor, row.id).await.is_err());
}

/// Bulk export renders decrypted values in every format.
#[tokio::test]
async fn bulk_export_renders_all_formats() {
    let w = world().await;
    let owner = join(&w, OrgRole::Owner).await;

    let a = w
        .service
        .create(owner, new_secret(&w, "DB_URL", "postgres://db"))
        .await
        .unwrap();
    let b = w
        .service
        .create(owner, new_secret(&w, "API_KEY", "has spaces"))
        .await
        .unwrap();

    let export = w
        .service
        .bulk_export(owner, w.org_id, &[a.id, b.id])
        .await
        .unwrap();
    assert_eq!(export.exported, 2);
    assert!(export.failures.is_empty());

    let json = render(ExportFormat::Json, &export.records);
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 2);

    let csv = render(ExportFormat::Csv, &export.records);
    assert!(csv.starts_with("name,value"));
    assert!(csv.contains("DB_URL,postgres://db"));

    let dotenv = render(ExportFormat::Dotenv, &export.records);
    assert!(dotenv.contains("DB_URL=postgres://db\n"));
    assert!(dotenv.contains("API_KEY=\"has spaces\"\n"));
}

/// Two organizations with identical master material still derive distinct
/// keys, so ciphertext never crosses tenants.
#[tokio::test]
async fn tenants_are_cryptographically_isolated() {
    let store = Arc::new(MemoryStore::new());
    let service = SecretService::new(Arc::clone(&store) as Arc<dyn SecretStore>);

    let mut principals = Vec::new();
    let mut secrets = Vec::new();
    for _ in 0..2 {
        let org_id = Uuid::new_v4();
        store
            .insert_org(OrgRow {
                id: org_id,
                name: "tenant".to_owned(),
                master_key_material: b"shared-master-material".to_vec(),
                created_at: Utc::now(),
            })
            .await;
        let principal = Uuid::new_v4();
        store
            .upsert_membership(MembershipRow {
                org_id,
                principal_id: principal,
                role: OrgRole::Owner,
                created_at: Utc::now(),
            })
            .await;
        let row = service
            .create(
                principal,
                CreateSecret {
                    org_id,
                    project_id: Uuid::new_v4(),
                    folder_id: None,
                    name: "SHARED_NAME".to_owned(),
                    description: None,
                    value: "same plaintext".to_owned(),
                    environment: Environment::Development,
                },
            )
            .await
            .unwrap();
        principals.push(principal);
        secrets.push(row);
    }

    assert_ne!(secrets[0].encrypted_value, secrets[1].encrypted_value);

    // Each owner reads only their own; the other tenant's secret denies.
    assert_eq!(
        service.read(principals[0], secrets[0].id).await.unwrap().value,
        "same plaintext"
    );
    assert!(service.read(principals[0], secrets[1].id).await.is_err());
}
