mod acl;
pub mod auth;
mod config;
mod extract;

use crate::server::auth::AuthCtx;
use crate::server::extract::{ApiJson, ApiQuery};
use crate::storage::{StorageError, Store, TaskDraft, models::Task};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::{Method, StatusCode, header},
    routing::{delete, get, patch, post},
};
pub use config::{AppConfig, ConfigError, render_default_config};
use serde::{Deserialize, Serialize};
use taskxp_shared::api;
use taskxp_shared::auth::Role;
use taskxp_shared::domain::TaskStatus;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

const BAD_CREDENTIALS: &str = "Invalid phone number or password";

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store) -> Self {
        Self {
            config,
            store,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    // Layers run bottom-up: session check, then ACL, then span enrichment.
    let private = Router::new()
        .route("/api/auth/logout", post(api_logout))
        .route("/api/tasks", get(api_list_tasks).post(api_create_task))
        .route("/api/tasks/{id}", delete(api_delete_task))
        .route("/api/tasks/{id}/complete", patch(api_complete_task))
        .route("/api/tasks/{id}/review", patch(api_review_task))
        .route("/api/children/{id}/tasks", get(api_child_tasks))
        .route("/api/children/{id}/xp", get(api_child_xp))
        .with_state(state.clone())
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn(acl::enforce_acl))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            account_id = tracing::field::Empty,
            role = tracing::field::Empty,
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/api/auth/signup", post(api_signup))
        .route("/api/auth/login", post(api_login))
        .merge(private)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    // Use provided x-request-id if present, else generate
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let is_api = req.uri().path().starts_with("/api/");
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    for (name, value) in [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("referrer-policy", "no-referrer"),
        ("cross-origin-resource-policy", "same-origin"),
    ] {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    // Balances and task lists must never come from a cache
    if is_api {
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("account_id", tracing::field::display(auth.account_id()));
        span.record("role", tracing::field::display(auth.claims.role));
    }
    Ok(next.run(req).await)
}

// Auth

async fn api_signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<api::SignupReq>,
) -> Result<(StatusCode, Json<api::SignupResp>), AppError> {
    let (Some(name), Some(phone), Some(password), Some(role)) =
        (body.name, body.phone, body.password, body.user_type)
    else {
        return Err(AppError::validation("All fields are required"));
    };
    if password.is_empty() {
        return Err(AppError::validation("All fields are required"));
    }
    let cost = state.config.bcrypt_cost();
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(AppError::internal)?
        .map_err(|e| {
            tracing::error!(error=%e, "signup: bcrypt hash failed");
            AppError::internal(e)
        })?;
    let id = state
        .store
        .create_account(role, &name, &phone, &hash)
        .await?;
    tracing::info!(account_id = %id, %role, "signup: account created");
    Ok((
        StatusCode::CREATED,
        Json(api::SignupResp {
            message: "User registered successfully".into(),
            id,
        }),
    ))
}

async fn api_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<api::AuthReq>,
) -> Result<impl IntoResponse, AppError> {
    let (Some(phone), Some(password), Some(role)) = (body.phone, body.password, body.user_type)
    else {
        return Err(AppError::validation("All fields are required"));
    };
    let account = state
        .store
        .find_account_by_phone(role, &phone)
        .await?
        .ok_or_else(|| {
            tracing::warn!(%phone, %role, "login: unknown phone number");
            AppError::Unauthorized(BAD_CREDENTIALS.into())
        })?;
    let hash = account.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(|e| {
            tracing::error!(account_id = %account.id, error=%e, "login: bcrypt verify failed");
            AppError::internal(e)
        })?;
    if !matches {
        tracing::warn!(account_id = %account.id, "login: invalid password");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    let token = auth::issue_token(&state, &account).await?;
    let cookie = auth::session_cookie(&token, state.config.secure_cookies)?;
    tracing::info!(account_id = %account.id, %role, "login: session issued");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(api::AuthResp {
            message: "Login successful".into(),
            id: account.id,
            name: account.name,
            user_type: account.role,
            token,
        }),
    ))
}

async fn api_logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<impl IntoResponse, AppError> {
    state.store.delete_session(&auth.claims.jti).await?;
    let cookie = auth::cleared_cookie(state.config.secure_cookies)?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(api::MessageResp {
            message: "Logged out".into(),
        }),
    ))
}

// Tasks

fn task_dtos(rows: Vec<Task>) -> Result<Vec<api::TaskDto>, AppError> {
    rows.into_iter()
        .map(|t| t.into_dto().map_err(AppError::from))
        .collect()
}

async fn api_create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    ApiJson(body): ApiJson<api::CreateTaskReq>,
) -> Result<(StatusCode, Json<api::CreateTaskResp>), AppError> {
    if let Some(pid) = body.parent_id.as_deref()
        && pid != auth.account_id()
    {
        tracing::warn!(requested = pid, "create_task: parent_id does not match session");
        return Err(AppError::forbidden());
    }
    let draft = TaskDraft {
        name: body.name,
        description: body.description,
        due_date: body.due_date,
        xp: body.xp,
    };
    let task = state.store.create_task(auth.account_id(), draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(api::CreateTaskResp {
            message: "Task added successfully".into(),
            task_id: task.id,
        }),
    ))
}

#[derive(Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

async fn api_list_tasks(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<StatusQuery>,
) -> Result<Json<api::TaskListResp>, AppError> {
    let status: TaskStatus = q
        .status
        .as_deref()
        .ok_or_else(|| AppError::validation("Status is required"))?
        .parse()
        .map_err(AppError::validation)?;
    let rows = state.store.list_tasks_by_status(status).await?;
    Ok(Json(api::TaskListResp {
        tasks: task_dtos(rows)?,
    }))
}

async fn api_delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<api::DeleteTaskResp>, AppError> {
    let deleted = state.store.delete_task(&id).await?;
    Ok(Json(api::DeleteTaskResp {
        message: "Task deleted successfully".into(),
        deleted,
    }))
}

async fn api_complete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<api::CompleteTaskReq>,
) -> Result<Json<api::CompleteTaskResp>, AppError> {
    let child_id = body
        .child_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("Child ID is required"))?;
    if auth.claims.role != Role::Child || child_id != auth.account_id() {
        tracing::warn!(task_id = %id, child_id, "complete: child_id does not match session");
        return Err(AppError::forbidden());
    }
    let done = state.store.complete_task(&id, child_id).await?;
    Ok(Json(api::CompleteTaskResp {
        message: "Task marked as completed and XP updated.".into(),
        task: done.task.into_dto()?,
        xp_point: done.xp_point,
    }))
}

async fn api_review_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<api::ReviewTaskResp>, AppError> {
    let task = state.store.review_task(&id).await?;
    Ok(Json(api::ReviewTaskResp {
        message: "Task marked as reviewed".into(),
        task: task.into_dto()?,
    }))
}

// Children

async fn api_child_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<api::TaskListResp>, AppError> {
    let rows = state.store.list_tasks_for_child(&id).await?;
    Ok(Json(api::TaskListResp {
        tasks: task_dtos(rows)?,
    }))
}

#[derive(Deserialize)]
struct PageOpts {
    page: Option<usize>,
    per_page: Option<usize>,
}

async fn api_child_xp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(opts): ApiQuery<PageOpts>,
) -> Result<Json<api::XpSummaryDto>, AppError> {
    let page = opts.page.unwrap_or(1);
    let per_page = opts.per_page.unwrap_or(10);
    let (xp_point, rows) = state.store.xp_summary(&id, page, per_page).await?;
    let history = rows
        .into_iter()
        .map(|a| api::XpAwardDto {
            task_id: a.task_id,
            task_name: a.task_name,
            xp: a.xp,
            time: chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(
                a.created_at,
                chrono::Utc,
            )
            .to_rfc3339(),
        })
        .collect();
    Ok(Json(api::XpSummaryDto {
        child_id: id,
        xp_point,
        history,
    }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Unauthorized(String),
    Forbidden,
    NotFound(String),
    InvalidTransition(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }
    fn unauthorized() -> Self {
        Self::Unauthorized("unauthorized".into())
    }
    fn forbidden() -> Self {
        Self::Forbidden
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Validation(m) => AppError::Validation(m),
            StorageError::NotFound(m) => AppError::NotFound(m),
            StorageError::Conflict(m) => AppError::Conflict(m),
            StorageError::InvalidTransition(t) => AppError::InvalidTransition(t.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg, kind, detail) = match self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m, "validation", None),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m, "unauthorized", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden".into(), "forbidden", None),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m, "not_found", None),
            AppError::InvalidTransition(m) => {
                (StatusCode::CONFLICT, m, "invalid_transition", None)
            }
            AppError::Conflict(m) => (StatusCode::CONFLICT, m, "conflict", None),
            // Do not leak internal error details to clients, but log them
            AppError::Internal(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".into(),
                "storage",
                Some(m),
            ),
        };
        if let Some(detail) = detail {
            tracing::error!(status = %status, kind = kind, message = %msg, detail = %detail, "request failed");
        } else {
            tracing::warn!(status = %status, kind = kind, message = %msg, "request rejected");
        }
        let body = axum::Json(ErrorBody { error: msg, kind });
        (status, body).into_response()
    }
}
