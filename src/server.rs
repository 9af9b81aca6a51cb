use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    cache::ResultCache,
    client::BackendClient,
    config::Settings,
    error::ClientError,
    export,
    paginate::{render_page, PagedKind},
    search::Debouncer,
    session::{LoginFlow, LoginForm, LoginOutcome, PasswordChange, Session},
    types::{Role, ScanKind},
    views,
};

#[derive(Clone)]
pub struct AppState {
    client: BackendClient,
    search: Debouncer,
    scan_list_limit: u64,
    inner: Arc<RwLock<ViewState>>, // signed-in session and the result cache it owns
}

#[derive(Debug, Default)]
struct ViewState {
    session: Option<Session>,
    login: LoginFlow,
    cache: ResultCache,
}

impl AppState {
    pub fn new(client: BackendClient, scan_list_limit: u64) -> Self {
        Self {
            client,
            search: Debouncer::default(),
            scan_list_limit,
            inner: Arc::new(RwLock::new(ViewState::default())),
        }
    }

    async fn session(&self) -> Result<Session, ClientError> {
        self.inner.read().await.session.clone().ok_or(ClientError::NotSignedIn)
    }

    async fn admin_session(&self) -> Result<Session, ClientError> {
        let s = self.session().await?;
        if !s.is_admin() {
            return Err(ClientError::Forbidden("Access Denied".into()));
        }
        Ok(s)
    }

    async fn sign_out(&self) {
        let mut s = self.inner.write().await;
        s.session = None;
        s.login.reset();
        s.cache.clear();
    }

    /// Turn a client error into a response; an expired session is dropped on the way.
    async fn fail(&self, err: ClientError) -> Response {
        if matches!(err, ClientError::Unauthorized) {
            warn!("backend rejected session; signing out");
            self.sign_out().await;
        }
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, err.to_string()).into_response()
    }
}

/// Build the dashboard router: `/ui` fragments and actions, static files as fallback.
pub fn router(state: AppState, settings: &Settings) -> Router {
    let ui = Router::new()
        .route("/login", post(post_login))
        .route("/logout", post(post_logout))
        .route("/register", post(post_register))
        .route("/session/refresh", post(post_refresh))
        .route("/me", get(get_me))
        .route("/password", post(post_password))
        .route("/scans", get(get_scans).post(post_scan))
        .route("/scans/{kind}/{scan_id}/page/{page}", get(get_result_page))
        .route("/scan-types", get(get_scan_types))
        .route("/stats", get(get_stats))
        .route("/export/csv", get(get_export))
        .route("/admin/users", get(get_users))
        .route("/admin/users/search", get(get_user_search))
        .route("/admin/users/{id}/toggle", post(post_toggle_user))
        .route("/admin/users/{id}/role", post(post_user_role))
        .route("/admin/users/{id}/reset_password", post(post_reset_password))
        .route("/admin/users/{id}/2fa", post(post_toggle_2fa))
        .route("/admin/config", get(get_config).post(post_config))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state);

    let static_svc = ServeDir::new(&settings.ui_dir).append_index_html_on_directories(true);

    Router::new()
        .nest("/ui", ui)
        .fallback_service(static_svc)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn spawn_server(settings: &Settings) -> Result<()> {
    let client = BackendClient::new(&settings.backend_url, settings.request_timeout)?;
    let state = AppState::new(client, settings.scan_list_limit);
    let app = router(state, settings);

    info!(bind = %settings.bind, backend = %settings.backend_url, "serving dashboard");
    axum::serve(tokio::net::TcpListener::bind(&settings.bind).await?, app).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum LoginReply {
    Ok { role: Role },
    #[serde(rename = "2fa_required")]
    TwoFactorRequired { message: String },
}

async fn post_login(State(app): State<AppState>, Json(form): Json<LoginForm>) -> Response {
    let flow = app.inner.read().await.login.clone();
    let attempt = match flow.attempt(form) {
        Ok(a) => a,
        Err(e) => return app.fail(e).await,
    };
    let outcome = match app.client.login(&attempt).await {
        Ok(o) => o,
        Err(e) => return app.fail(e).await,
    };

    let mut s = app.inner.write().await;
    s.login.advance(&attempt, &outcome);
    match outcome {
        LoginOutcome::SecondFactorRequired => Json(LoginReply::TwoFactorRequired {
            message: "Credentials verified. Please enter 2FA code.".into(),
        })
        .into_response(),
        LoginOutcome::Authenticated(session) => {
            info!(user = %attempt.username, role = %session.role.as_str(), "signed in");
            let role = session.role.clone();
            s.session = Some(session);
            s.cache.clear();
            Json(LoginReply::Ok { role }).into_response()
        }
    }
}

async fn post_logout(State(app): State<AppState>) -> impl IntoResponse {
    app.sign_out().await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct Registration {
    username: String,
    password: String,
}

async fn post_register(State(app): State<AppState>, Json(req): Json<Registration>) -> Response {
    match app.client.register(&req.username, &req.password).await {
        Ok(enrollment) => Html(views::enrollment(&enrollment)).into_response(),
        Err(e) => app.fail(e).await,
    }
}

async fn post_refresh(State(app): State<AppState>) -> Response {
    let refreshed = match app.session().await {
        Ok(s) => app.client.refresh(&s).await,
        Err(e) => Err(e),
    };
    match refreshed {
        Ok(session) => {
            app.inner.write().await.session = Some(session);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => app.fail(e).await,
    }
}

async fn get_me(State(app): State<AppState>) -> Response {
    let identity = match app.session().await {
        Ok(s) => app.client.verify(&s).await,
        Err(e) => Err(e),
    };
    match identity {
        Ok(id) => Json(id).into_response(),
        Err(e) => app.fail(e).await,
    }
}

async fn post_password(State(app): State<AppState>, Json(change): Json<PasswordChange>) -> Response {
    let res = async {
        change.validate()?;
        let s = app.session().await?;
        app.client
            .change_password(&s, &change.old_password, &change.new_password)
            .await
    }
    .await;
    match res {
        Ok(()) => (StatusCode::OK, "Password updated successfully").into_response(),
        Err(e) => app.fail(e).await,
    }
}

/// Refresh the scan list: fetch, rebuild the cache, render.
async fn get_scans(State(app): State<AppState>) -> Response {
    let records = match app.session().await {
        Ok(s) => app.client.list_scans(&s, 0, app.scan_list_limit).await,
        Err(e) => Err(e),
    };
    match records {
        Ok(records) => {
            let mut s = app.inner.write().await;
            s.cache.rebuild(&records);
            Html(views::scan_list(&records, &s.cache)).into_response()
        }
        Err(e) => app.fail(e).await,
    }
}

/// Page change inside a result list. Served from the cache only.
async fn get_result_page(
    State(app): State<AppState>,
    Path((kind, scan_id, page)): Path<(String, i64, usize)>,
) -> Response {
    let Some(kind) = PagedKind::parse(&kind) else {
        return (StatusCode::BAD_REQUEST, format!("not a paginated result kind: {kind}")).into_response();
    };
    let s = app.inner.read().await;
    match render_page(&s.cache, kind, scan_id, page) {
        Some(html) => Html(html).into_response(),
        None => (StatusCode::NOT_FOUND, "Result not loaded").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ScanForm {
    target: String,
    #[serde(rename = "type")]
    scan_type: ScanKind,
}

async fn post_scan(State(app): State<AppState>, Json(form): Json<ScanForm>) -> Response {
    let submitted = match app.session().await {
        Ok(s) => app.client.run_scan(&s, &form.target, &form.scan_type).await,
        Err(e) => Err(e),
    };
    match submitted {
        Ok(scan) => {
            info!(id = scan.id, kind = %scan.scan_type, "scan completed");
            Json(json!({ "id": scan.id, "message": format!("Scan completed! ID: {}", scan.id) })).into_response()
        }
        Err(e @ (ClientError::Api { .. } | ClientError::Forbidden(_) | ClientError::Http(_) | ClientError::Decode(_))) => {
            let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, format!("Error: {}", e.detail())).into_response()
        }
        Err(e) => app.fail(e).await,
    }
}

async fn get_scan_types(State(app): State<AppState>) -> Response {
    let config = match app.session().await {
        Ok(s) => app.client.scan_config(&s).await,
        Err(e) => Err(e),
    };
    match config {
        Ok(config) => Html(views::scan_type_options(&config)).into_response(),
        Err(e) => app.fail(e).await,
    }
}

async fn get_stats(State(app): State<AppState>) -> Response {
    let stats = match app.session().await {
        Ok(s) => app.client.stats(&s).await,
        Err(e) => Err(e),
    };
    match stats {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => app.fail(e).await,
    }
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    scan_id: Option<i64>,
}

async fn get_export(State(app): State<AppState>, Query(q): Query<ExportQuery>) -> Response {
    let csv = match app.session().await {
        Ok(s) => app.client.export_csv(&s, q.scan_id).await,
        Err(e) => Err(e),
    };
    match csv {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", export::file_name(q.scan_id)),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => app.fail(e).await,
    }
}

#[derive(Debug, Deserialize)]
struct UsersQuery {
    #[serde(default = "first_page")]
    page: usize,
    #[serde(default)]
    search: Option<String>,
}

fn first_page() -> usize {
    1
}

async fn get_users(State(app): State<AppState>, Query(q): Query<UsersQuery>) -> Response {
    let page = q.page.max(1);
    let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match user_table(&app, page, search).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => app.fail(e).await,
    }
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// Search-as-you-type: debounced, and answers superseded by a newer query are dropped (204).
async fn get_user_search(State(app): State<AppState>, Query(q): Query<SearchQuery>) -> Response {
    let Some(ticket) = app.search.settle().await else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let search = q.q.trim();
    let search = (!search.is_empty()).then_some(search);
    let res = user_table(&app, 1, search).await;
    if !ticket.is_current() {
        return StatusCode::NO_CONTENT.into_response();
    }
    match res {
        Ok(html) => Html(html).into_response(),
        Err(e) => app.fail(e).await,
    }
}

async fn user_table(app: &AppState, page: usize, search: Option<&str>) -> Result<String, ClientError> {
    let s = app.admin_session().await?;
    let users = app.client.list_users(&s, page, search).await?;
    Ok(views::user_table(&users, page, search, s.user_id()))
}

async fn post_toggle_user(State(app): State<AppState>, Path(id): Path<i64>) -> Response {
    let res = async {
        let s = app.admin_session().await?;
        app.client.toggle_user(&s, id).await
    }
    .await;
    match res {
        Ok(t) => Json(t).into_response(),
        Err(e) => app.fail(e).await,
    }
}

#[derive(Debug, Deserialize)]
struct RoleForm {
    role: Role,
}

async fn post_user_role(State(app): State<AppState>, Path(id): Path<i64>, Json(form): Json<RoleForm>) -> Response {
    let res = async {
        let s = app.admin_session().await?;
        app.client.set_role(&s, id, &form.role).await
    }
    .await;
    match res {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => app.fail(e).await,
    }
}

#[derive(Debug, Deserialize)]
struct PasswordForm {
    #[serde(default)]
    password: String,
}

async fn post_reset_password(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<PasswordForm>,
) -> Response {
    let res = async {
        let s = app.admin_session().await?;
        app.client.reset_password(&s, id, &form.password).await
    }
    .await;
    match res {
        Ok(()) => (StatusCode::OK, "Password updated").into_response(),
        Err(e) => app.fail(e).await,
    }
}

#[derive(Debug, Deserialize)]
struct TwoFactorForm {
    enable: bool,
}

async fn post_toggle_2fa(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<TwoFactorForm>,
) -> Response {
    let res = async {
        let s = app.admin_session().await?;
        app.client.toggle_2fa(&s, id, form.enable).await
    }
    .await;
    match res {
        Ok(enrollment) if form.enable => Html(views::enrollment(&enrollment)).into_response(),
        Ok(_) => (StatusCode::OK, "2FA Disabled").into_response(),
        Err(e) => app.fail(e).await,
    }
}

async fn get_config(State(app): State<AppState>) -> Response {
    let res = async {
        let s = app.admin_session().await?;
        app.client.scan_config(&s).await
    }
    .await;
    match res {
        Ok(config) => Html(views::config_list(&config)).into_response(),
        Err(e) => app.fail(e).await,
    }
}

#[derive(Debug, Deserialize)]
struct ConfigToggle {
    scan_type: ScanKind,
    enabled: bool,
}

async fn post_config(State(app): State<AppState>, Json(toggle): Json<ConfigToggle>) -> Response {
    let res = async {
        let s = app.admin_session().await?;
        app.client
            .set_scan_enabled(&s, &toggle.scan_type, toggle.enabled)
            .await
    }
    .await;
    match res {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => app.fail(e).await,
    }
}
