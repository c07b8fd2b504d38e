use super::*;
use crate::types::SessionStatus;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, credentials: Arc<dyn CredentialProvider>) -> PickerClient {
    let config = ApiConfig {
        base_url: format!("{}/v1/", server.uri()),
        request_timeout: Duration::from_secs(5),
        debug_logging: true,
    };
    PickerClient::new(&config, credentials).unwrap()
}

fn static_client(server: &MockServer) -> PickerClient {
    client_for(server, Arc::new(StaticCredentials::new("test-token")))
}

/// Credentials that start expired and become valid after one refresh
struct ExpiringCredentials {
    refreshed: AtomicBool,
    refresh_calls: AtomicUsize,
    refreshable: bool,
}

impl ExpiringCredentials {
    fn new(refreshable: bool) -> Self {
        Self {
            refreshed: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            refreshable,
        }
    }
}

#[async_trait]
impl CredentialProvider for ExpiringCredentials {
    fn is_valid(&self) -> bool {
        self.refreshed.load(Ordering::SeqCst)
    }

    fn is_expired(&self) -> bool {
        !self.refreshed.load(Ordering::SeqCst)
    }

    fn has_refresh_token(&self) -> bool {
        self.refreshable
    }

    fn token(&self) -> Option<String> {
        Some(if self.refreshed.load(Ordering::SeqCst) {
            "fresh-token".to_string()
        } else {
            "stale-token".to_string()
        })
    }

    async fn refresh(&self) -> Result<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn create_session_sends_filters_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(serde_json::json!({
            "mediaTypeFilter": {"mediaTypes": ["PHOTO"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "s1",
            "pickerUri": "https://photos.google.com/picker/s1",
            "mediaItemsSet": false,
            "expireTime": "2030-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = static_client(&server);
    let filters = SessionFilters {
        included_features: vec![],
        media_types: vec!["PHOTO".into()],
    };
    let session = client.create_session(&filters).await.unwrap();

    assert_eq!(session.id, "s1");
    assert_eq!(
        session.picker_uri.as_deref(),
        Some("https://photos.google.com/picker/s1")
    );
    assert!(session.expire_time.is_some());
}

#[tokio::test]
async fn create_session_without_picker_uri_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "s1"})))
        .mount(&server)
        .await;

    let err = static_client(&server)
        .create_session(&SessionFilters::default())
        .await
        .unwrap_err();
    match err {
        Error::Protocol(msg) => assert!(msg.contains("missing pickerUri"), "got {msg}"),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_session_without_id_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"pickerUri": "https://x"})),
        )
        .mount(&server)
        .await;

    let err = static_client(&server)
        .create_session(&SessionFilters::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Protocol(ref m) if m.contains("missing id")));
}

#[tokio::test]
async fn create_session_with_embedded_error_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "s1",
            "pickerUri": "https://x",
            "error": {"code": 400, "message": "quota exceeded"}
        })))
        .mount(&server)
        .await;

    let err = static_client(&server)
        .create_session(&SessionFilters::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "protocol error: Picker API error: quota exceeded");
}

#[tokio::test]
async fn non_success_status_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let err = static_client(&server)
        .get_session(&SessionId::from("s1"))
        .await
        .unwrap_err();
    match &err {
        Error::Http { status, body } => {
            assert_eq!(*status, 403);
            assert_eq!(body, "PERMISSION_DENIED");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
    assert!(err.user_message().contains("Picker API is not enabled"));
}

#[tokio::test]
async fn get_session_parses_status_and_fills_missing_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "mediaItemsSet": false,
            "status": "SESSION_STATUS_ACTIVE"
        })))
        .mount(&server)
        .await;

    let session = static_client(&server)
        .get_session(&SessionId::from("s1"))
        .await
        .unwrap();
    assert_eq!(session.id, "s1");
    assert_eq!(session.status, SessionStatus::Active);
    assert!(!session.is_complete());
}

#[tokio::test]
async fn delete_session_hits_session_url() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    static_client(&server)
        .delete_session(&SessionId::from("s1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_page_sends_session_and_capped_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/mediaItems"))
        .and(query_param("sessionId", "s1"))
        .and(query_param("pageSize", "100"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "mediaItems": [{"id": "a"}, {"id": "b"}],
            "nextPageToken": "tok2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/mediaItems"))
        .and(query_param("pageToken", "tok2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"mediaItems": [{"id": "c"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = static_client(&server);
    let id = SessionId::from("s1");

    let first = client.fetch_page(&id, 500, None).await.unwrap();
    assert_eq!(first.media_items.len(), 2);
    assert_eq!(first.next_token(), Some("tok2"));

    let second = client.fetch_page(&id, 500, first.next_token()).await.unwrap();
    assert_eq!(second.media_items[0].id, "c");
    assert_eq!(second.next_token(), None);
}

#[tokio::test]
async fn expired_credentials_are_refreshed_before_the_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sessions/s1"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "s1"})))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Arc::new(ExpiringCredentials::new(true));
    let client = client_for(&server, credentials.clone());
    client.get_session(&SessionId::from("s1")).await.unwrap();
    assert_eq!(credentials.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unrefreshable_credentials_fail_fast_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let credentials = Arc::new(ExpiringCredentials::new(false));
    let client = client_for(&server, credentials.clone());
    let err = client.get_session(&SessionId::from("s1")).await.unwrap_err();

    assert!(matches!(err, Error::Credentials(_)));
    assert_eq!(credentials.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn download_media_returns_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/abc"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8, 0xD8, 0xFF]))
        .mount(&server)
        .await;

    let bytes = static_client(&server)
        .download_media(&format!("{}/media/abc", server.uri()))
        .await
        .unwrap();
    assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
}

#[test]
fn truncate_respects_char_boundaries() {
    assert_eq!(truncate("héllo", 2), "h");
    assert_eq!(truncate("abc", 10), "abc");
}
