//! Protocol tests against a mocked Graph API.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use meetsync_core::notify::NullNotifier;
use meetsync_core::store::memory::{
    MemoryAccountStore, MemoryEventStore, MemoryExceptionStore, MemorySectionStore,
};
use meetsync_core::store::{AccountStore, EventStore};
use meetsync_core::{
    Account, DeltaRequest, EventChange, MeetsyncError, Provider, ProviderAdapter, SyncConfig,
    SyncReconciler,
};
use meetsync_provider_microsoft::MicrosoftAdapter;
use serde_json::json;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER: &str = "ana@example.com";
const DELTA_PATH: &str = "/me/calendarView/delta";

fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
}

fn account() -> Account {
    Account::new(USER, Provider::Microsoft, created_at()).with_access_token("test-token")
}

fn adapter(server: &MockServer) -> MicrosoftAdapter {
    MicrosoftAdapter::with_base_url(SyncConfig::default(), &server.uri())
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

fn timed_item(id: &str, subject: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "singleInstance",
        "subject": subject,
        "start": {"dateTime": "2024-01-10T14:00:00.0000000", "timeZone": "UTC"},
        "end": {"dateTime": "2024-01-10T15:00:00.0000000", "timeZone": "UTC"},
        "lastModifiedDateTime": "2024-01-09T08:00:00.0000000Z"
    })
}

#[tokio::test]
async fn full_listing_pages_through_skip_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DELTA_PATH))
        .and(query_param("startDateTime", "2023-06-01T12:00:00Z"))
        .and(query_param("endDateTime", "2050-12-31T23:59:59Z"))
        .and(query_param_is_missing("$deltatoken"))
        .and(query_param_is_missing("$skiptoken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [timed_item("m-1", "Kickoff")],
            "@odata.nextLink":
                "https://graph.microsoft.com/v1.0/me/calendarView/delta?$skiptoken=page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DELTA_PATH))
        .and(query_param("$skiptoken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [timed_item("m-2", "Retro")],
            "@odata.deltaLink":
                "https://graph.microsoft.com/v1.0/me/calendarView/delta?$deltatoken=delta-1"
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
    assert_eq!(second.next_page_token, None);
    assert_eq!(second.next_cursor.as_deref(), Some("delta-1"));

    match &second.changes[0] {
        EventChange::Upsert(changed) => {
            assert_eq!(changed.event.provider_id, "m-2");
            assert_eq!(changed.event.title.as_deref(), Some("Retro"));
        }
        other => panic!("expected an upsert, got {other:?}"),
    }
}

#[tokio::test]
async fn incremental_pass_rides_the_delta_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DELTA_PATH))
        .and(query_param("$deltatoken", "delta-1"))
        .and(query_param_is_missing("startDateTime"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [],
            "@odata.deltaLink":
                "https://graph.microsoft.com/v1.0/me/calendarView/delta?$deltatoken=delta-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = adapter(&server)
        .fetch_changes(
            &account(),
            &DeltaRequest {
                cursor: Some("delta-1".into()),
                page_size: 50,
                ..DeltaRequest::default()
            },
        )
        .await
        .unwrap();

    assert!(page.changes.is_empty());
    assert_eq!(page.next_cursor.as_deref(), Some("delta-2"));
}

#[tokio::test]
async fn page_size_and_timezone_preferences_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DELTA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [],
            "@odata.deltaLink":
                "https://graph.microsoft.com/v1.0/me/calendarView/delta?$deltatoken=delta-1"
        })))
        .mount(&server)
        .await;

    adapter(&server)
        .fetch_changes(&account(), &full_listing_request())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let preferences: Vec<&str> = requests[0]
        .headers
        .get_all("prefer")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    assert!(preferences.contains(&"odata.maxpagesize=50"));
    assert!(preferences.contains(&r#"outlook.timezone="UTC""#));
}

#[tokio::test]
async fn gone_cursor_surfaces_as_invalid_sync_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DELTA_PATH))
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

/// Attachment listing is a separate Graph call, so it must happen for
/// exactly the events that advertise attachments and no others.
#[tokio::test]
async fn attachments_are_fetched_only_when_flagged() {
    let server = MockServer::start().await;

    let mut flagged = timed_item("m-1", "Design review");
    flagged["hasAttachments"] = json!(true);

    Mock::given(method("GET"))
        .and(path(DELTA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [flagged, timed_item("m-2", "1:1")],
            "@odata.deltaLink":
                "https://graph.microsoft.com/v1.0/me/calendarView/delta?$deltatoken=delta-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/me/events/m-1/attachments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "att-1", "contentType": "application/pdf", "name": "deck.pdf"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = Arc::new(MemoryEventStore::new());
    let accounts = Arc::new(MemoryAccountStore::new());
    accounts.upsert(&account()).await.unwrap();

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
    assert_eq!(report.events.written, 2);

    let flagged = events
        .find_by_provider_id(Provider::Microsoft, "m-1", USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flagged.attachments.len(), 1);
    assert_eq!(flagged.attachments[0].id.as_deref(), Some("att-1"));

    let plain = events
        .find_by_provider_id(Provider::Microsoft, "m-2", USER)
        .await
        .unwrap()
        .unwrap();
    assert!(plain.attachments.is_empty());

    let attachment_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path().contains("/attachments"))
        .count();
    assert_eq!(attachment_calls, 1);

    let refreshed = accounts
        .get(USER, Provider::Microsoft)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.cursor.unwrap().token, "delta-1");
}
