//! Common test utilities and fixtures for integration tests.
//!
//! `TestContext` wires a reconciler to an in-memory store that enforces the
//! same active-session uniqueness as the PostgreSQL migration.

pub mod fixtures;

use std::sync::Arc;

use ladico_core::{Session, SessionKey};
use ladico_sessions::error::StoreError;
use ladico_sessions::store::{Body, DocumentStore, Filter, InMemoryStore};
use ladico_sessions::{ReconcilerSettings, SessionReconciler};

pub const COLLECTION: &str = "sessions";

pub struct TestContext {
    pub store: InMemoryStore,
    pub reconciler: SessionReconciler,
}

impl TestContext {
    pub fn new() -> Self {
        ladico_sessions::init_tracing("debug");

        let store = InMemoryStore::new().with_unique_field(COLLECTION, "activeKey");
        let reconciler = SessionReconciler::new(
            Arc::new(store.clone()),
            ReconcilerSettings {
                collection: COLLECTION.to_string(),
                ..ReconcilerSettings::default()
            },
        );
        Self { store, reconciler }
    }

    /// Store a session document directly, bypassing the reconciler.
    pub async fn seed(&self, session: &Session) -> String {
        let body = match serde_json::to_value(session).expect("serialize session") {
            serde_json::Value::Object(map) => map,
            _ => Body::new(),
        };
        self.store
            .insert(COLLECTION, body)
            .await
            .expect("Failed to seed session")
    }

    /// Raw stored body of a session.
    pub async fn stored(&self, id: &str) -> Body {
        self.store
            .get(COLLECTION, id)
            .await
            .expect("store reachable")
            .expect("session stored")
            .body
    }

    /// Number of stored sessions for a key, active or not.
    pub async fn count_for(&self, key: &SessionKey) -> usize {
        self.store
            .query(
                COLLECTION,
                &[
                    Filter::eq("userId", key.user_id.as_str()),
                    Filter::eq("competence", key.competence.as_str()),
                    Filter::eq("level", key.level.as_str()),
                ],
                None,
            )
            .await
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn go_offline(&self) {
        self.store.set_available(false);
    }

    pub fn go_online(&self) {
        self.store.set_available(true);
    }
}

#[allow(dead_code)]
pub fn is_unavailable(err: &StoreError) -> bool {
    matches!(err, StoreError::Unavailable(_))
}
