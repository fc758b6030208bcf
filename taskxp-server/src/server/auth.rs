use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use taskxp_shared::api::SESSION_COOKIE;
use taskxp_shared::jwt::{self, JwtClaims};
use tracing::{error, warn};

use super::{AppError, AppState};
use crate::storage::models::Account;

/// How many days of inactivity before a session is considered expired.
const SESSION_IDLE_DAYS: i64 = 14;
/// How many days before mandatory re-login.
pub const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub claims: JwtClaims,
}

impl AuthCtx {
    pub fn account_id(&self) -> &str {
        &self.claims.sub
    }
}

/// Accepts the session cookie or an `Authorization: Bearer` header.
pub async fn require_session(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(req.headers()).or_else(|| cookie_token(req.headers())) else {
        return Err(AppError::unauthorized());
    };

    let claims = match jwt::decode_and_verify(&token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: jwt decode failed");
            return Err(AppError::unauthorized());
        }
    };

    match state.store.account_exists(claims.role, &claims.sub).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(account_id = %claims.sub, role = %claims.role, "auth: account no longer exists");
            return Err(AppError::unauthorized());
        }
        Err(e) => {
            error!(account_id = %claims.sub, error=%e, "auth: account lookup failed");
            return Err(AppError::internal(e));
        }
    }

    let cutoff = Utc::now() - Duration::days(SESSION_IDLE_DAYS);
    match state
        .store
        .touch_session_with_cutoff(&claims.jti, cutoff.naive_utc())
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            warn!(
                jti = %claims.jti,
                account_id = %claims.sub,
                cutoff = %cutoff,
                "auth: session missing or expired (last_used_at < cutoff)"
            );
            return Err(AppError::unauthorized());
        }
        Err(e) => {
            error!(jti = %claims.jti, error=%e, "auth: touch_session_with_cutoff failed");
            return Err(AppError::internal(e));
        }
    }
    req.extensions_mut().insert(AuthCtx { claims });
    Ok(next.run(req).await)
}

/// Creates a session row and returns the signed token for it.
pub async fn issue_token(state: &AppState, account: &Account) -> Result<String, AppError> {
    let jti = uuid::Uuid::new_v4().to_string();
    let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp();
    let claims = JwtClaims {
        sub: account.id.clone(),
        jti: jti.clone(),
        exp,
        role: account.role,
    };

    state
        .store
        .create_session(&jti, &account.id, account.role)
        .await
        .map_err(|e| {
            error!(account_id = %account.id, error=%e, "login: create_session failed");
            AppError::internal(e)
        })?;
    jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        error!(account_id = %account.id, error=%e, "login: jwt encode failed");
        AppError::internal(e)
    })
}

pub fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, AppError> {
    let max_age = TOKEN_TTL_DAYS * 24 * 60 * 60;
    build_cookie(&format!("{SESSION_COOKIE}={token}; Max-Age={max_age}"), secure)
}

pub fn cleared_cookie(secure: bool) -> Result<HeaderValue, AppError> {
    build_cookie(&format!("{SESSION_COOKIE}=; Max-Age=0"), secure)
}

fn build_cookie(base: &str, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!("{base}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(AppError::internal)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_token_in_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi; other=1"),
        );
        assert_eq!(cookie_token(&headers).as_deref(), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn empty_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert_eq!(cookie_token(&headers), None);
    }

    #[test]
    fn cookie_attributes() {
        let set = session_cookie("t0k", true).unwrap();
        let set = set.to_str().unwrap();
        assert!(set.starts_with("token=t0k; Max-Age=2592000"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("SameSite=Lax"));
        assert!(set.ends_with("; Secure"));
        let cleared = cleared_cookie(false).unwrap();
        assert!(cleared.to_str().unwrap().starts_with("token=; Max-Age=0"));
    }
}
