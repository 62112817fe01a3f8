//! Authentication: API keys, config from env, dev bypass.
//!
//! When `DISABLE_AUTH=true` or `API_KEYS` is unset, all requests are accepted as an
//! anonymous cashier. Otherwise, validate `Authorization: Bearer <key>` or `X-API-Key: <key>`
//! and look the key up in `API_KEYS` (format: `key1:role1,key2:role2`; roles: cashier, waiter, admin).

use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Cashier,
    Waiter,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("cashier") {
            Some(Role::Cashier)
        } else if s.eq_ignore_ascii_case("waiter") {
            Some(Role::Waiter)
        } else if s.eq_ignore_ascii_case("admin") {
            Some(Role::Admin)
        } else {
            None
        }
    }
}

/// Verified caller. Injected by the auth middleware.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub key_id: Option<String>,
    pub role: Role,
}

impl AuthUser {
    /// Name recorded in audit events.
    pub fn actor(&self) -> &str {
        self.key_id.as_deref().unwrap_or("anonymous")
    }
}

impl Default for AuthUser {
    fn default() -> Self {
        Self {
            key_id: None,
            role: Role::Cashier,
        }
    }
}

/// Returns a 403 response unless the caller is an admin. With auth disabled every
/// caller passes.
pub fn require_admin(user: &AuthUser, config: &AuthConfig) -> Result<(), Response> {
    if config.disable || user.role == Role::Admin {
        return Ok(());
    }
    log::warn!("admin endpoint refused actor={} role={:?}", user.actor(), user.role);
    Err((
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": "admin role required", "code": "forbidden" })),
    )
        .into_response())
}

/// Auth configuration: disable flag and key → role map.
#[derive(Clone)]
pub struct AuthConfig {
    pub disable: bool,
    keys: Arc<HashMap<String, Role>>,
}

impl AuthConfig {
    /// Auth disabled: all requests accepted as an anonymous cashier.
    pub fn disabled() -> Self {
        Self {
            disable: true,
            keys: Arc::new(HashMap::new()),
        }
    }

    /// Build from a key:role string (e.g. "till1:cashier,boss:admin").
    pub fn from_keys(keys: &str) -> Self {
        let map = parse_keys(keys);
        Self {
            disable: map.is_empty(),
            keys: Arc::new(map),
        }
    }

    /// `DISABLE_AUTH=true` or unset `API_KEYS` => auth disabled.
    pub fn from_env() -> Self {
        let disable = std::env::var("DISABLE_AUTH")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let config = std::env::var("API_KEYS")
            .map(|s| Self::from_keys(&s))
            .unwrap_or_else(|_| Self::disabled());
        Self {
            disable: disable || config.disable,
            keys: config.keys,
        }
    }

    pub fn lookup(&self, key: &str) -> Option<Role> {
        self.keys.get(key).copied()
    }
}

fn parse_keys(s: &str) -> HashMap<String, Role> {
    s.split(',')
        .filter_map(|part| {
            let mut split = part.trim().splitn(2, ':');
            let key = split.next()?.trim().to_string();
            let role = Role::parse(split.next()?.trim())?;
            if key.is_empty() {
                return None;
            }
            Some((key, role))
        })
        .collect()
}

/// Returns the API key from `Authorization: Bearer <key>` or `X-API-Key: <key>`.
fn get_api_key_from_request(req: &Request) -> Option<String> {
    if let Some(v) = req.headers().get(header::AUTHORIZATION) {
        if let Ok(s) = v.to_str() {
            let s = s.trim();
            if s.len() >= 7 && s.get(..7).map(|p| p.eq_ignore_ascii_case("bearer ")).unwrap_or(false) {
                return Some(s.get(7..).unwrap_or("").trim().to_string());
            }
        }
    }
    if let Some(v) = req.headers().get("X-API-Key") {
        if let Ok(s) = v.to_str() {
            return Some(s.trim().to_string());
        }
    }
    None
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message, "code": "unauthorized" })),
    )
        .into_response()
}

/// Auth middleware: injects [`AuthUser`] or answers 401.
pub async fn require_api_key_or_anonymous(
    mut req: Request<Body>,
    next: Next,
    config: AuthConfig,
) -> Response {
    if config.disable {
        req.extensions_mut().insert(AuthUser::default());
        return next.run(req).await;
    }

    let key = match get_api_key_from_request(&req) {
        Some(k) if !k.is_empty() => k,
        _ => return unauthorized("missing or invalid Authorization or X-API-Key"),
    };

    match config.lookup(&key) {
        Some(role) => {
            req.extensions_mut().insert(AuthUser {
                key_id: Some(key),
                role,
            });
            next.run(req).await
        }
        None => unauthorized("invalid API key"),
    }
}
