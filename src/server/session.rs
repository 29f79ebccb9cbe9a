use super::error::ApiError;
use super::state::ServerState;
use crate::user::{AuthTokenValue, Identity};

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub token: String,
}

impl Session {
    pub fn user_id(&self) -> usize {
        self.identity.user_id
    }
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

fn extract_session_token_from_cookies(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_session_token_from_headers(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(HEADER_SESSION_TOKEN_KEY)?;
    let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
    let value = value.strip_prefix("Bearer ").unwrap_or(&value).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn extract_session_from_request_parts(parts: &Parts, ctx: &ServerState) -> Option<Session> {
    let token = match extract_session_token_from_cookies(parts)
        .or_else(|| extract_session_token_from_headers(parts))
    {
        None => {
            debug!("No token in cookies nor headers.");
            return None;
        }
        Some(x) => x,
    };

    match ctx
        .user_manager
        .identity_for_token(&AuthTokenValue(token.clone()))
    {
        Ok(Some(identity)) => {
            debug!("Resolved session of user_id={}", identity.user_id);
            Some(Session { identity, token })
        }
        Ok(None) => {
            debug!("Auth token not found in database");
            None
        }
        Err(err) => {
            warn!("Failed to resolve auth token: {}", err);
            None
        }
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx).ok_or(ApiError::Unauthenticated)
    }
}

impl OptionalFromRequestParts<ServerState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session_from_request_parts(parts, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(name: &str, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn reads_token_from_cookie() {
        let parts = parts_with_header("cookie", "theme=dark; session_token=abc123");
        assert_eq!(
            extract_session_token_from_cookies(&parts),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn reads_token_from_authorization_header() {
        let parts = parts_with_header("Authorization", "Bearer xyz");
        assert_eq!(
            extract_session_token_from_headers(&parts),
            Some("xyz".to_string())
        );
        let parts = parts_with_header("Authorization", "plain");
        assert_eq!(
            extract_session_token_from_headers(&parts),
            Some("plain".to_string())
        );
    }

    #[test]
    fn expired_cookie_is_ignored() {
        let parts = parts_with_header("cookie", "session_token=");
        assert_eq!(extract_session_token_from_cookies(&parts), None);
    }
}
