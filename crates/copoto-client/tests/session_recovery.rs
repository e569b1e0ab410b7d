//! Session recovery against a mock server: refresh, single retry, termination.

mod common;

use std::time::Duration;

use common::{REFRESH, TestClient, failure, hits, hits_with_bearer, tokens};
use copoto_client::{CredentialSet, Error, RefreshFailure};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_expired(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/posts/\d+$"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(401).set_body_json(failure(401, "Token expired")))
        .mount(server)
        .await;
}

async fn mount_ok(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/posts/\d+$"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "hello"})))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expiry_refreshes_once_and_retries_each() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    mount_ok(&server, "A2").await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(body_json(json!({"refreshToken": "R1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tokens(json!({"accessToken": "A2"})))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let client = &test.client;

    let (x, y, z) = tokio::join!(
        client.get::<Value>("posts/1"),
        client.get::<Value>("posts/2"),
        client.get::<Value>("posts/3"),
    );
    for result in [x, y, z] {
        assert_eq!(result.unwrap()["title"], "hello");
    }

    assert_eq!(hits(&server, REFRESH).await, 1);
    assert_eq!(hits_with_bearer(&server, "/api/posts/", "A1").await, 3);
    assert_eq!(hits_with_bearer(&server, "/api/posts/", "A2").await, 3);
    assert_eq!(client.coordinator().flights(), 1);
    assert!(!client.coordinator().is_refreshing());

    let credentials = client.credentials().snapshot();
    assert_eq!(credentials.access_token.as_deref(), Some("A2"));
    assert_eq!(credentials.refresh_token.as_deref(), Some("R1"));
    assert_eq!(test.storage_value("accessToken").as_deref(), Some("A2"));
    assert_eq!(test.navigator.logins(), 0);
}

#[tokio::test]
async fn test_many_concurrent_failures_share_one_refresh() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    mount_ok(&server, "A2").await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tokens(json!({"accessToken": "A2"})))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let requests = (1..=10).map(|i| {
        let client = test.client.clone();
        async move { client.get::<Value>(&format!("posts/{}", i)).await }
    });
    let results = futures::future::join_all(requests).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(hits(&server, REFRESH).await, 1);
    assert_eq!(hits_with_bearer(&server, "/api/posts/", "A2").await, 10);
}

#[tokio::test]
async fn test_refresh_call_carries_no_bearer() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    mount_ok(&server, "A2").await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens(json!({"accessToken": "A2"}))))
        .mount(&server)
        .await;

    let test = TestClient::new(
        &server,
        CredentialSet::new("A1", "R1").with_anti_forgery_token("C1"),
    );
    test.client.get::<Value>("posts/1").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let refresh = requests
        .iter()
        .find(|r| r.url.path() == REFRESH)
        .expect("refresh request");
    assert!(refresh.headers.get("authorization").is_none());
    assert!(refresh.headers.get("x-csrf-token").is_none());
}

#[tokio::test]
async fn test_refreshed_anti_forgery_token_is_used_on_retry() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    Mock::given(method("GET"))
        .and(path("/api/posts/1"))
        .and(header("authorization", "Bearer A2"))
        .and(header("x-csrf-token", "C2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "hello"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens(json!({
            "accessToken": "A2",
            "refreshToken": "R2",
            "csrf": "C2"
        }))))
        .mount(&server)
        .await;

    let test = TestClient::new(
        &server,
        CredentialSet::new("A1", "R1").with_anti_forgery_token("C1"),
    );
    test.client.get::<Value>("posts/1").await.unwrap();

    let credentials = test.client.credentials().snapshot();
    assert_eq!(credentials.refresh_token.as_deref(), Some("R2"));
    assert_eq!(credentials.anti_forgery_token.as_deref(), Some("C2"));
}

#[tokio::test]
async fn test_refresh_rejected_terminates_session() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(failure(403, "Refresh token expired. Please login again.")),
        )
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let err = test.client.get::<Value>("posts/7").await.unwrap_err();

    assert!(matches!(
        err,
        Error::RefreshFailed(RefreshFailure::Rejected { status: 403 })
    ));
    assert!(test.client.credentials().is_empty());
    assert!(test.client.terminator().is_terminated());
    assert_eq!(test.navigator.logins(), 1);
    assert_eq!(test.storage_value("afterLogin").as_deref(), Some("/posts/7"));
    assert_eq!(hits(&server, "/api/posts/7").await, 1);
}

#[tokio::test]
async fn test_refresh_without_access_token_terminates_session() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens(json!({"refreshToken": "R2"}))))
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let err = test.client.get::<Value>("posts/1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::RefreshFailed(RefreshFailure::MissingAccessToken)
    ));
    assert!(test.client.credentials().is_empty());
    assert_eq!(hits(&server, "/api/posts/1").await, 1);
}

#[tokio::test]
async fn test_refresh_server_error_terminates_session() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let err = test.client.get::<Value>("posts/1").await.unwrap_err();

    assert!(matches!(
        err,
        Error::RefreshFailed(RefreshFailure::Status { status: 500 })
    ));
    assert_eq!(test.navigator.logins(), 1);
}

#[tokio::test]
async fn test_second_rejection_after_retry_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(failure(401, "Token expired")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens(json!({"accessToken": "A2"}))))
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let err = test.client.get::<Value>("posts/1").await.unwrap_err();

    assert!(matches!(err, Error::AlreadyRetried));
    assert_eq!(hits(&server, REFRESH).await, 1);
    assert_eq!(hits(&server, "/api/posts/1").await, 2);
    assert!(test.client.credentials().is_empty());
    assert_eq!(test.navigator.logins(), 1);
}

#[tokio::test]
async fn test_missing_refresh_token_terminates_without_refresh_call() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;

    let credentials = CredentialSet {
        access_token: Some("A1".to_string()),
        ..Default::default()
    };
    let test = TestClient::new(&server, credentials);
    let err = test.client.get::<Value>("posts/1").await.unwrap_err();

    assert!(matches!(err, Error::MissingRefreshCredential));
    assert_eq!(hits(&server, REFRESH).await, 0);
    assert_eq!(test.client.coordinator().flights(), 0);
    assert!(test.client.terminator().is_terminated());
    assert_eq!(test.navigator.logins(), 1);
}

#[tokio::test]
async fn test_forbidden_is_returned_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/posts/9"))
        .respond_with(ResponseTemplate::new(403).set_body_json(failure(403, "Not your post")))
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let err = test.client.delete("posts/9").await.unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Not your post");
        }
        other => panic!("expected API error, got {:?}", other),
    }
    assert!(!test.client.coordinator().is_refreshing());
    assert_eq!(test.client.coordinator().flights(), 0);
    assert!(!test.client.terminator().is_terminated());
    assert_eq!(
        test.client.credentials().access_token().as_deref(),
        Some("A1")
    );
    assert_eq!(test.navigator.logins(), 0);
}

#[tokio::test]
async fn test_server_error_on_retry_is_not_terminal() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    Mock::given(method("GET"))
        .and(path("/api/posts/1"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens(json!({"accessToken": "A2"}))))
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let err = test.client.get::<Value>("posts/1").await.unwrap_err();

    assert!(err.is_server_error());
    assert!(!test.client.terminator().is_terminated());
    assert_eq!(
        test.client.credentials().access_token().as_deref(),
        Some("A2")
    );
}

#[tokio::test]
async fn test_concurrent_terminal_failures_navigate_once() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(failure(403, "Refresh token not found."))
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let requests = (1..=5).map(|i| {
        let client = test.client.clone();
        async move { client.get::<Value>(&format!("posts/{}", i)).await }
    });
    let results = futures::future::join_all(requests).await;

    assert!(results.iter().all(|r| matches!(r, Err(e) if e.is_terminal())));
    assert_eq!(hits(&server, REFRESH).await, 1);
    assert_eq!(test.navigator.logins(), 1);
    assert!(test.client.credentials().is_empty());
}

#[tokio::test]
async fn test_decorated_call_to_refresh_path_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let err = test
        .client
        .post::<Value, _>("user/token/refresh", &json!({"refreshToken": "R1"}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::RefreshFailed(RefreshFailure::Rejected { status: 401 })
    ));
    assert_eq!(hits(&server, REFRESH).await, 1);
    assert_eq!(test.client.coordinator().flights(), 0);
}

async fn mount_slow_refresh(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(tokens(json!({"accessToken": "A2", "refreshToken": "R2"})))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(server)
        .await;
}

async fn wait_for_flight(test: &TestClient) {
    for _ in 0..200 {
        if test.client.coordinator().is_refreshing() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("refresh never started");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_termination_during_refresh_keeps_session_cleared() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    mount_ok(&server, "A2").await;
    mount_slow_refresh(&server).await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let request = {
        let client = test.client.clone();
        tokio::spawn(async move { client.get::<Value>("posts/1").await })
    };
    wait_for_flight(&test).await;

    assert!(test.client.terminator().terminate(&Error::AlreadyRetried));
    let err = request.await.unwrap().unwrap_err();

    assert!(matches!(
        err,
        Error::RefreshFailed(RefreshFailure::SessionEnded)
    ));
    assert!(test.client.credentials().is_empty());
    assert!(test.storage_value("accessToken").is_none());
    assert!(test.storage_value("refreshToken").is_none());
    assert!(test.client.terminator().is_terminated());
    assert_eq!(test.navigator.logins(), 1);
    assert_eq!(hits(&server, "/api/posts/1").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_relogin_during_refresh_is_not_overwritten() {
    let server = MockServer::start().await;
    mount_expired(&server, "A1").await;
    mount_slow_refresh(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens(
            json!({"accessToken": "B1", "refreshToken": "S1"}),
        )))
        .mount(&server)
        .await;

    let test = TestClient::new(&server, CredentialSet::new("A1", "R1"));
    let request = {
        let client = test.client.clone();
        tokio::spawn(async move { client.get::<Value>("posts/1").await })
    };
    wait_for_flight(&test).await;

    test.client.terminator().terminate(&Error::AlreadyRetried);
    test.client.auth().login("alice", "hunter2").await.unwrap();
    let err = request.await.unwrap().unwrap_err();

    assert!(!err.is_terminal());
    let credentials = test.client.credentials().snapshot();
    assert_eq!(credentials.access_token.as_deref(), Some("B1"));
    assert_eq!(credentials.refresh_token.as_deref(), Some("S1"));
    assert!(!test.client.terminator().is_terminated());
    assert_eq!(test.navigator.logins(), 1);
}
