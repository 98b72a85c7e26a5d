//! PostgreSQL document store tests.
//!
//! These need a reachable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;

use common::fixtures;
use ladico_sessions::error::StoreError;
use ladico_sessions::store::{Body, DocumentStore, Filter, PgDocumentStore};
use ladico_sessions::{ReconcilerSettings, SessionReconciler};
use uuid::Uuid;

async fn connect() -> PgDocumentStore {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    let store = PgDocumentStore::from_pool(pool);
    store.run_migrations().await.expect("Failed to run migrations");
    store
}

async fn row_count(store: &PgDocumentStore, collection: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = $1")
        .bind(collection)
        .fetch_one(store.pool())
        .await
        .expect("Failed to count documents")
}

/// Fresh collection name so runs do not see each other's rows.
fn collection() -> String {
    format!("test-{}", Uuid::new_v4())
}

fn body(value: Value) -> Body {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_insert_query_update() {
    let store = connect().await;
    let coll = collection();

    let id = store
        .insert(&coll, body(json!({ "userId": "u1", "endTime": null, "score": 0 })))
        .await
        .unwrap();
    store
        .insert(&coll, body(json!({ "userId": "u2", "endTime": null, "score": 0 })))
        .await
        .unwrap();
    store
        .insert(&coll, body(json!({ "userId": "u1", "score": 0 })))
        .await
        .unwrap();
    assert_eq!(row_count(&store, &coll).await, 3);

    let found = store
        .query(
            &coll,
            &[Filter::eq("userId", "u1"), Filter::eq("endTime", Value::Null)],
            None,
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id);

    let by_user = store
        .query(&coll, &[Filter::eq("userId", "u1")], None)
        .await
        .unwrap();
    assert_eq!(by_user.len(), 2);

    store
        .update(&coll, &id, body(json!({ "score": 67 })))
        .await
        .unwrap();
    let doc = store.get(&coll, &id).await.unwrap().unwrap();
    assert_eq!(doc.body["score"], 67);
    assert_eq!(doc.body["userId"], "u1");

    assert!(store.get(&coll, "not-a-uuid").await.unwrap().is_none());
    let missing = store
        .update(&coll, &Uuid::new_v4().to_string(), Body::new())
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::NotFound(_)));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_active_key_is_unique() {
    let store = connect().await;
    let coll = collection();

    let id = store
        .insert(&coll, body(json!({ "activeKey": "k" })))
        .await
        .unwrap();
    let err = store
        .insert(&coll, body(json!({ "activeKey": "k" })))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    store
        .update(&coll, &id, body(json!({ "activeKey": null })))
        .await
        .unwrap();
    store
        .insert(&coll, body(json!({ "activeKey": "k" })))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_reconciler_round_trip() {
    let store = connect().await;
    let reconciler = SessionReconciler::new(
        Arc::new(store),
        ReconcilerSettings {
            collection: collection(),
            ..ReconcilerSettings::default()
        },
    );
    let key = fixtures::key("pg-user");

    let created = reconciler
        .get_or_create_active_session(&key, fixtures::questions(3))
        .await
        .unwrap();
    assert!(created.was_created);

    let resumed = reconciler
        .get_or_create_active_session(&key, fixtures::questions(3))
        .await
        .unwrap();
    assert!(!resumed.was_created);
    assert_eq!(resumed.session.id, created.session.id);

    let finalized = reconciler
        .complete_session(&resumed.session, 2)
        .await
        .saved()
        .unwrap();
    assert_eq!(finalized.score, 67);
    assert_eq!(reconciler.best_score(&key).await.unwrap(), Some(67));
}
