//! Protocol tests against a mocked Calendar v3 API.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use meetsync_core::notify::NullNotifier;
use meetsync_core::store::memory::{
    MemoryAccountStore, MemoryEventStore, MemoryExceptionStore, MemorySectionStore,
};
use meetsync_core::store::{AccountStore, EventStore};
use meetsync_core::{
    Account, DeltaRequest, EventChange, MeetsyncError, Provider, ProviderAdapter, SyncConfig,
    SyncCursor, SyncReconciler,
};
use meetsync_provider_google::GoogleAdapter;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "ana@example.com";
const EVENTS_PATH: &str = "/calendars/primary/events";

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
}

fn account() -> Account {
    Account::new(USER, Provider::Google, created_at()).with_access_token("test-token")
}

fn adapter(server: &MockServer) -> GoogleAdapter {
    GoogleAdapter::with_base_url(SyncConfig::default(), &server.uri())
}

fn full_listing_request() -> DeltaRequest {
    DeltaRequest {
        cursor: None,
        page_token: None,
        window_start: Some(created_at()),
        window_end: None,
        page_size: 50,
    }
}

fn timed_item(id: &str, summary: &str) -> serde_json::Value {
    json!({
        "id": id,
        "summary": summary,
        "status": "confirmed",
        "start": {"dateTime": "2024-01-10T14:00:00Z"},
        "end": {"dateTime": "2024-01-10T15:00:00Z"},
        "updated": "2024-01-09T08:00:00Z"
    })
}

#[tokio::test]
async fn full_listing_pages_until_the_sync_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(query_param("timeMin", "2023-06-01T12:00:00Z"))
        .and(query_param_is_missing("syncToken"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed_item("g-1", "Kickoff")],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed_item("g-2", "Retro")],
            "nextSyncToken": "cursor-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let account = account();

    let first = adapter
        .fetch_changes(&account, &full_listing_request())
        .await
        .unwrap();
    assert_eq!(first.changes.len(), 1);
    assert_eq!(first.next_page_token.as_deref(), Some("page-2"));
    assert_eq!(first.next_cursor, None);

    let second = adapter
        .fetch_changes(
            &account,
            &DeltaRequest {
                page_token: first.next_page_token,
                ..full_listing_request()
            },
        )
        .await
        .unwrap();
    assert_eq!(second.changes.len(), 1);
    assert_eq!(second.next_page_token, None);
    assert_eq!(second.next_cursor.as_deref(), Some("cursor-1"));

    match &second.changes[0] {
        EventChange::Upsert(changed) => {
            assert_eq!(changed.event.provider_id, "g-2");
            assert_eq!(changed.event.title.as_deref(), Some("Retro"));
        }
        other => panic!("expected an upsert, got {other:?}"),
    }
}

#[tokio::test]
async fn incremental_pass_sends_only_the_sync_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(query_param("syncToken", "cursor-1"))
        .and(query_param_is_missing("timeMin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [],
            "nextSyncToken": "cursor-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = adapter(&server)
        .fetch_changes(
            &account(),
            &DeltaRequest {
                cursor: Some("cursor-1".into()),
                page_size: 50,
                ..DeltaRequest::default()
            },
        )
        .await
        .unwrap();

    assert!(page.changes.is_empty());
    assert_eq!(page.next_cursor.as_deref(), Some("cursor-2"));
}

#[tokio::test]
async fn gone_cursor_surfaces_as_invalid_sync_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .fetch_changes(
            &account(),
            &DeltaRequest {
                cursor: Some("dead".into()),
                page_size: 50,
                ..DeltaRequest::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MeetsyncError::InvalidSyncToken));
}

#[tokio::test]
async fn auth_and_server_failures_map_to_their_variants() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter(&server)
        .fetch_changes(&account(), &full_listing_request())
        .await
        .unwrap_err();
    assert!(matches!(err, MeetsyncError::ProviderAuth(_)));

    server.reset().await;
    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter(&server)
        .fetch_changes(&account(), &full_listing_request())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

/// Revoked-cursor recovery over real HTTP: the stored cursor draws a
/// 410, the reconciler falls back to a full listing seeded from the
/// account's creation time and persists the fresh token.
#[tokio::test]
async fn reconciler_recovers_a_revoked_cursor_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(query_param("syncToken", "dead"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(EVENTS_PATH))
        .and(query_param_is_missing("syncToken"))
        .and(query_param("timeMin", "2023-06-01T12:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed_item("g-1", "Kickoff")],
            "nextSyncToken": "fresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = Arc::new(MemoryEventStore::new());
    let accounts = Arc::new(MemoryAccountStore::new());
    let mut account = account();
    account.cursor = Some(SyncCursor::new("dead".into()));
    accounts.upsert(&account).await.unwrap();

    let reconciler = SyncReconciler::new(
        events.clone(),
        Arc::new(MemoryExceptionStore::new()),
        accounts.clone(),
        Arc::new(MemorySectionStore::new()),
        Arc::new(NullNotifier),
        SyncConfig::default(),
    );

    let report = reconciler
        .sync_account(&adapter(&server), USER)
        .await
        .unwrap();

    assert!(report.full_listing);
    assert_eq!(report.events.written, 1);

    let stored = events
        .find_by_provider_id(Provider::Google, "g-1", USER)
        .await
        .unwrap()
        .expect("event ingested through the fallback listing");
    assert_eq!(stored.title.as_deref(), Some("Kickoff"));

    let refreshed = accounts.get(USER, Provider::Google).await.unwrap().unwrap();
    assert_eq!(refreshed.cursor.unwrap().token, "fresh");
}
