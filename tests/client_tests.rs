use std::time::Duration;

use reconhub_dash::client::BackendClient;
use reconhub_dash::error::ClientError;
use reconhub_dash::session::{LoginAttempt, LoginOutcome, Session};
use reconhub_dash::types::{Role, ScanKind};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(&format!("{}/api/", server.uri()), Duration::from_secs(5)).expect("client")
}

fn session() -> Session {
    Session {
        access_token: "tok".into(),
        refresh_token: Some("refresh".into()),
        role: Role::Admin,
    }
}

fn attempt(otp: Option<&str>) -> LoginAttempt {
    LoginAttempt {
        username: "alice".into(),
        password: "pw".into(),
        otp: otp.map(str::to_string),
    }
}

#[tokio::test]
async fn login_reports_second_factor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "2fa_required", "msg": "2FA code required"})))
        .mount(&server)
        .await;

    let outcome = client(&server).login(&attempt(None)).await.expect("login");
    assert_eq!(outcome, LoginOutcome::SecondFactorRequired);
}

#[tokio::test]
async fn login_with_code_returns_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "pw", "otp": "123456"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a.b.c",
            "refresh_token": "r",
            "role": "admin"
        })))
        .mount(&server)
        .await;

    match client(&server).login(&attempt(Some("123456"))).await.expect("login") {
        LoginOutcome::Authenticated(s) => {
            assert_eq!(s.access_token, "a.b.c");
            assert_eq!(s.refresh_token.as_deref(), Some("r"));
            assert!(s.is_admin());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn bad_credentials_keep_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid credentials"})))
        .mount(&server)
        .await;

    let err = client(&server).login(&attempt(None)).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials (Status: 401)");
}

#[tokio::test]
async fn login_without_token_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"role": "user"})))
        .mount(&server)
        .await;

    let err = client(&server).login(&attempt(None)).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingToken));
}

#[tokio::test]
async fn list_scans_sends_bearer_and_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scan/"))
        .and(header("authorization", "Bearer tok"))
        .and(query_param("skip", "0"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "target": "example.com", "scan_type": "dns_lookup", "created_at": "2024-05-01T10:00:00", "result": "{\"A\": [\"1.2.3.4\"]}"},
            {"id": 2, "target": "x", "scan_type": "brand_new", "created_at": "2024-05-01T09:00:00", "result": null}
        ])))
        .mount(&server)
        .await;

    let scans = client(&server).list_scans(&session(), 0, 10).await.expect("scans");
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].scan_type, ScanKind::DnsLookup);
    assert_eq!(scans[1].scan_type, ScanKind::Other("brand_new".into()));
}

#[tokio::test]
async fn expired_token_maps_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/scan/stats"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .mount(&server)
        .await;

    let err = client(&server).stats(&session()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
}

#[tokio::test]
async fn disabled_scan_type_is_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan/"))
        .and(body_json(json!({"target": "example.com", "type": "nmap"})))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "Scan type 'nmap' is currently disabled by admin"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .run_scan(&session(), " example.com ", &ScanKind::Nmap)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Scan type 'nmap' is currently disabled by admin");
}

#[tokio::test]
async fn empty_target_never_reaches_backend() {
    let server = MockServer::start().await;
    let err = client(&server)
        .run_scan(&session(), "   ", &ScanKind::Whois)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn user_list_uses_page_offset_and_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users"))
        .and(query_param("skip", "10"))
        .and(query_param("limit", "5"))
        .and(query_param("search", "bo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 12, "username": "bob", "role": "user", "is_active": true, "created_at": "2024-01-01T00:00:00", "has_2fa": false}],
            "total": 11, "skip": 10, "limit": 5
        })))
        .mount(&server)
        .await;

    let page = client(&server).list_users(&session(), 3, Some("bo")).await.expect("users");
    assert_eq!(page.total, 11);
    assert_eq!(page.items[0].username, "bob");
}

#[tokio::test]
async fn role_change_uses_put() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/admin/users/4"))
        .and(body_json(json!({"role": "admin"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "updated"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).set_role(&session(), 4, &Role::Admin).await.expect("role");
}

#[tokio::test]
async fn scan_toggle_posts_config_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/admin/config"))
        .and(body_json(json!({"scan_sherlock": "false"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "updated"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .set_scan_enabled(&session(), &ScanKind::Sherlock, false)
        .await
        .expect("config");
}

#[tokio::test]
async fn export_single_scan() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/export/scans.csv"))
        .and(query_param("scan_id", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ID,Target\r\n5,example.com\r\n"))
        .mount(&server)
        .await;

    let bytes = client(&server).export_csv(&session(), Some(5)).await.expect("csv");
    assert!(String::from_utf8_lossy(&bytes).contains("5,example.com"));
}

#[tokio::test]
async fn refresh_keeps_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({"refresh_token": "refresh"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})))
        .mount(&server)
        .await;

    let s = client(&server).refresh(&session()).await.expect("refresh");
    assert_eq!(s.access_token, "new");
    assert_eq!(s.refresh_token.as_deref(), Some("refresh"));
}
