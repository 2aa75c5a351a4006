use smp_common::Money;
use tempfile::TempDir;

use crate::{
    db_types::{Role, Service, User},
    traits::MarketplaceDatabase,
    SqliteDatabase,
};

pub fn init_test_logging() {
    let _ = env_logger::try_init();
}

/// Create a fresh temp-file database with the schema applied. The returned guard deletes the
/// files when dropped, so keep it alive for the duration of the test.
pub async fn prepare_test_env() -> (TempDir, SqliteDatabase) {
    init_test_logging();
    let dir = tempfile::tempdir().expect("could not create temp dir");
    let path = dir.path().join("marketplace_test.db");
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("could not create test database");
    (dir, db)
}

/// The standard fixture: a client, a specialized worker, an admin and one active service.
pub struct MarketplaceSeed {
    pub client: User,
    pub worker: User,
    pub admin: User,
    pub service: Service,
}

pub async fn seed_marketplace(db: &SqliteDatabase) -> MarketplaceSeed {
    let client = db.insert_user("alice", Role::Client).await.expect("seed client");
    let worker = db.insert_user("bob", Role::Worker).await.expect("seed worker");
    let admin = db.insert_user("carol", Role::Admin).await.expect("seed admin");
    let service = db.insert_service("Deep cleaning", Money::from_whole(250)).await.expect("seed service");
    db.add_specialization(worker.id, service.id).await.expect("seed specialization");
    MarketplaceSeed { client, worker, admin, service }
}
