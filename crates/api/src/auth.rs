//! Capability checks at the HTTP boundary.
//!
//! The engine itself never sees identity beyond Visitor/Agent/System tags;
//! this module answers the two questions the binding needs before calling
//! in: "may this caller act as an agent?" and "does this caller own this
//! session?". Agent bearer tokens are issued by the surrounding desk
//! product; visitor tokens are minted here when a session starts.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;

/// JWT claims for ChatDesk chat tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatClaims {
    /// Subject: agent id, or the visitor session id for visitor tokens
    pub sub: String,
    /// Token role
    pub role: TokenRole,
    /// Session the token is scoped to (visitor tokens only)
    pub session_id: Option<Uuid>,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRole {
    Visitor,
    Agent,
}

/// Token issue/verify operations over the shared secret
#[derive(Clone)]
pub struct ChatTokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_hours: i64,
}

impl ChatTokenManager {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
        }
    }

    /// Mint the session-scoped token a visitor uses for the rest of the chat.
    pub fn issue_visitor_token(&self, session_id: Uuid) -> Result<String, ApiError> {
        self.issue(ChatClaims {
            sub: session_id.to_string(),
            role: TokenRole::Visitor,
            session_id: Some(session_id),
            iat: 0,
            exp: 0,
        })
    }

    /// Mint an agent token. Normally the desk product's login flow does
    /// this; exposed for ops tooling and tests.
    pub fn issue_agent_token(&self, agent_id: Uuid) -> Result<String, ApiError> {
        self.issue(ChatClaims {
            sub: agent_id.to_string(),
            role: TokenRole::Agent,
            session_id: None,
            iat: 0,
            exp: 0,
        })
    }

    fn issue(&self, mut claims: ChatClaims) -> Result<String, ApiError> {
        let now = OffsetDateTime::now_utc();
        claims.iat = now.unix_timestamp();
        claims.exp = (now + Duration::hours(self.expiry_hours)).unix_timestamp();

        // Explicit algorithm prevents algorithm confusion attacks
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|_| ApiError::Internal)
    }

    pub fn verify(&self, token: &str) -> Result<ChatClaims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<ChatClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized)
    }

    pub fn can_act_as_agent(&self, claims: &ChatClaims) -> bool {
        claims.role == TokenRole::Agent
    }

    pub fn is_session_owner(&self, claims: &ChatClaims, session_id: Uuid) -> bool {
        claims.role == TokenRole::Visitor && claims.session_id == Some(session_id)
    }
}

/// State handed to the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub tokens: ChatTokenManager,
}

/// Authenticated agent identity inserted into request extensions
#[derive(Debug, Clone, Copy)]
pub struct AgentIdentity {
    pub agent_id: Uuid,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware guarding the agent surface: requires a valid agent token and
/// exposes the agent id to handlers.
pub async fn require_agent(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let claims = auth.tokens.verify(token)?;
    if !auth.tokens.can_act_as_agent(&claims) {
        return Err(ApiError::Forbidden);
    }
    let agent_id: Uuid = claims.sub.parse().map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(AgentIdentity { agent_id });
    Ok(next.run(req).await)
}

/// Ownership check for the visitor surface: the bearer token must be the
/// visitor token scoped to this exact session.
pub fn require_session_owner(
    auth: &AuthState,
    headers: &HeaderMap,
    session_id: Uuid,
) -> Result<(), ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let claims = auth.tokens.verify(token)?;
    if auth.tokens.is_session_owner(&claims, session_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Any valid chat token (visitor or agent). Used by the attachment upload
/// endpoint, which both parties share.
pub fn require_any_token(auth: &AuthState, headers: &HeaderMap) -> Result<ChatClaims, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    auth.tokens.verify(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn manager() -> ChatTokenManager {
        ChatTokenManager::new("unit-test-secret-that-is-long-enough!!", 24)
    }

    #[test]
    fn test_visitor_token_round_trip() {
        let tokens = manager();
        let session_id = Uuid::new_v4();
        let token = tokens.issue_visitor_token(session_id).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.role, TokenRole::Visitor);
        assert!(tokens.is_session_owner(&claims, session_id));
        assert!(!tokens.is_session_owner(&claims, Uuid::new_v4()));
        assert!(!tokens.can_act_as_agent(&claims));
    }

    #[test]
    fn test_agent_token_round_trip() {
        let tokens = manager();
        let agent_id = Uuid::new_v4();
        let token = tokens.issue_agent_token(agent_id).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert!(tokens.can_act_as_agent(&claims));
        assert_eq!(claims.sub, agent_id.to_string());
        // An agent token is not a session owner token.
        assert!(!tokens.is_session_owner(&claims, Uuid::new_v4()));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let tokens = manager();
        assert!(tokens.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = manager().issue_agent_token(Uuid::new_v4()).unwrap();
        let other = ChatTokenManager::new("a-completely-different-32char-secret!!", 24);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert!(bearer_token(&headers).is_none());
    }
}
