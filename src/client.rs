//! Thin async client for the ReconHub REST backend.
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::html::display_value;
use crate::paginate::{Paginator, USER_PAGE_SIZE};
use crate::session::{LoginAttempt, LoginOutcome, Session};
use crate::types::{
    Identity, Role, ScanConfig, ScanKind, ScanRecord, ScanStats, ScanSubmitted, ToggleResult,
    TwoFactorEnrollment, UserPage,
};

#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    base: String,
}

impl BackendClient {
    /// `base_url` is the API root, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reconhub-dash/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn get(&self, session: &Session, path: &str) -> RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(&session.access_token)
    }

    fn post(&self, session: &Session, path: &str) -> RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(&session.access_token)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = authorized(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    /// Submit credentials, optionally with a TOTP code.
    pub async fn login(&self, attempt: &LoginAttempt) -> Result<LoginOutcome> {
        debug!(username = %attempt.username, has_otp = attempt.otp.is_some(), "login attempt");
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(attempt)
            .send()
            .await?;
        // A 401 here means bad credentials, not an expired session.
        let resp = accepted(resp).await?;
        let body: Value = resp.json().await?;
        if body.get("status").and_then(Value::as_str) == Some("2fa_required") {
            return Ok(LoginOutcome::SecondFactorRequired);
        }
        let Some(access_token) = body.get("access_token").and_then(Value::as_str) else {
            warn!("login response without access token");
            return Err(ClientError::MissingToken);
        };
        Ok(LoginOutcome::Authenticated(Session {
            access_token: access_token.to_string(),
            refresh_token: body
                .get("refresh_token")
                .and_then(Value::as_str)
                .map(str::to_string),
            role: Role::parse(body.get("role").and_then(Value::as_str).unwrap_or("user")),
        }))
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<TwoFactorEnrollment> {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        Ok(accepted(resp).await?.json().await?)
    }

    /// Exchange the refresh token for a new access token.
    pub async fn refresh(&self, session: &Session) -> Result<Session> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Err(ClientError::Unauthorized);
        };
        let body: Value = self
            .send(
                self.http
                    .post(self.url("/auth/refresh"))
                    .json(&json!({ "refresh_token": refresh_token })),
            )
            .await?;
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(ClientError::MissingToken)?;
        Ok(Session {
            access_token: access_token.to_string(),
            ..session.clone()
        })
    }

    pub async fn verify(&self, session: &Session) -> Result<Identity> {
        self.send(self.get(session, "/auth/verify")).await
    }

    pub async fn change_password(&self, session: &Session, old_password: &str, new_password: &str) -> Result<()> {
        let _: Value = self
            .send(self.post(session, "/auth/change-password").json(&json!({
                "old_password": old_password,
                "new_password": new_password,
            })))
            .await?;
        Ok(())
    }

    /// Most recent scans first.
    pub async fn list_scans(&self, session: &Session, skip: u64, limit: u64) -> Result<Vec<ScanRecord>> {
        self.send(
            self.get(session, "/scan/")
                .query(&[("skip", skip), ("limit", limit)]),
        )
        .await
    }

    pub async fn scan_config(&self, session: &Session) -> Result<ScanConfig> {
        self.send(self.get(session, "/scan/config")).await
    }

    pub async fn stats(&self, session: &Session) -> Result<ScanStats> {
        self.send(self.get(session, "/scan/stats")).await
    }

    pub async fn run_scan(&self, session: &Session, target: &str, kind: &ScanKind) -> Result<ScanSubmitted> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ClientError::Validation("Please enter a target".into()));
        }
        debug!(%target, kind = %kind, "submitting scan");
        self.send(
            self.post(session, "/scan/")
                .json(&json!({ "target": target, "type": kind.as_str() })),
        )
        .await
    }

    /// CSV report of all scans, or of a single scan.
    pub async fn export_csv(&self, session: &Session, scan_id: Option<i64>) -> Result<Vec<u8>> {
        let mut req = self.get(session, "/export/scans.csv");
        if let Some(id) = scan_id {
            req = req.query(&[("scan_id", id)]);
        }
        let resp = authorized(req.send().await?).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// One page of the admin user list (page size 5).
    pub async fn list_users(&self, session: &Session, page: usize, search: Option<&str>) -> Result<UserPage> {
        let pager = Paginator::new(USER_PAGE_SIZE);
        let mut req = self.get(session, "/admin/users").query(&[
            ("skip", pager.offset(page)),
            ("limit", pager.page_size()),
        ]);
        if let Some(q) = search.filter(|q| !q.is_empty()) {
            req = req.query(&[("search", q)]);
        }
        self.send(req).await
    }

    pub async fn toggle_user(&self, session: &Session, user_id: i64) -> Result<ToggleResult> {
        self.send(self.post(session, &format!("/admin/users/{user_id}/toggle")))
            .await
    }

    pub async fn set_role(&self, session: &Session, user_id: i64, role: &Role) -> Result<()> {
        let req = self
            .http
            .put(self.url(&format!("/admin/users/{user_id}")))
            .bearer_auth(&session.access_token)
            .json(&json!({ "role": role.as_str() }));
        let _: Value = self.send(req).await?;
        Ok(())
    }

    pub async fn reset_password(&self, session: &Session, user_id: i64, password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(ClientError::Validation("Password required".into()));
        }
        let _: Value = self
            .send(
                self.post(session, &format!("/admin/users/{user_id}/reset_password"))
                    .json(&json!({ "password": password })),
            )
            .await?;
        Ok(())
    }

    /// Enabling returns a fresh enrollment QR; disabling returns an empty enrollment.
    pub async fn toggle_2fa(&self, session: &Session, user_id: i64, enable: bool) -> Result<TwoFactorEnrollment> {
        self.send(
            self.post(session, &format!("/admin/users/{user_id}/2fa/toggle"))
                .json(&json!({ "enable": enable })),
        )
        .await
    }

    pub async fn set_scan_enabled(&self, session: &Session, kind: &ScanKind, enabled: bool) -> Result<()> {
        let mut body = Map::new();
        body.insert(kind.config_key(), Value::from(if enabled { "true" } else { "false" }));
        let _: Value = self
            .send(self.post(session, "/admin/config").json(&body))
            .await?;
        Ok(())
    }
}

/// Map error statuses on an authenticated call. 401 always means the session is gone.
async fn authorized(resp: Response) -> Result<Response> {
    if resp.status() == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    accepted(resp).await
}

async fn accepted(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = error_detail(resp.text().await.unwrap_or_default(), status);
    if status == StatusCode::FORBIDDEN {
        return Err(ClientError::Forbidden(detail));
    }
    Err(ClientError::Api {
        status: status.as_u16(),
        detail,
    })
}

/// FastAPI puts the message in `detail`; fall back to the body or the status text.
fn error_detail(body: String, status: StatusCode) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(&body) {
        if let Some(detail) = v.get("detail") {
            return display_value(detail);
        }
    }
    if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("Request failed").to_string()
    } else {
        body
    }
}
