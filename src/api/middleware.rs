//! API middleware for bearer-token authentication and request tracing.
//!
//! Each guard verifies the token against the role the route requires and
//! stores the resulting [`Principal`] in the request extensions. Every failure
//! produces the same 401 response; the reason is only logged.

use crate::error::ApiError;
use crate::models::{Principal, UserId};
use crate::state::AppState;
use crate::token::Role;
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, Uri, header},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{Span, debug};

/// Authorization scheme expected in the `Authorization` header.
const BEARER_SCHEME: &str = "bearer";

/// Query parameter carrying a bearer token on relay upgrades.
const TOKEN_PARAM: &str = "token";

/// Identity attached to a relay request; `None` when the relay is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayIdentity(pub Option<UserId>);

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Requires a valid `user` token.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, Role::User).await
}

/// Requires a valid `admin` token.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, Role::Admin).await
}

/// Guards the quote relay.
///
/// When `relay.require_auth` is set, a `user` token is required, taken from the
/// `Authorization` header or, for browsers, from the `token` query parameter.
pub async fn relay_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = if state.config.relay.require_auth {
        let query_token = Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(q)| q.token);
        let token = extract_bearer(request.headers())
            .map(str::to_string)
            .or(query_token)
            .ok_or_else(|| {
                debug!("Relay request without token");
                ApiError::Unauthorized
            })?;
        let principal = verify(&state, &token, Role::User)?;
        RelayIdentity(Some(principal.user_id))
    } else {
        RelayIdentity(None)
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn authorize(
    state: &AppState,
    mut request: Request<Body>,
    next: Next,
    role: Role,
) -> Result<Response, ApiError> {
    let principal = {
        let token = extract_bearer(request.headers()).ok_or_else(|| {
            debug!("Request to {} without bearer token", request.uri().path());
            ApiError::Unauthorized
        })?;
        verify(state, token, role)?
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn verify(state: &AppState, token: &str, role: Role) -> Result<Principal, ApiError> {
    let verified = state.tokens.verify(token, role).map_err(|e| {
        debug!("Rejected {} token: {}", role, e);
        ApiError::Unauthorized
    })?;

    Ok(Principal {
        user_id: verified.user_id,
        role: verified.role,
    })
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    Some(token)
}

/// Span for one HTTP request, with any query token masked.
pub fn request_span(request: &Request<Body>) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        uri = %redacted_uri(request.uri()),
        version = ?request.version(),
    )
}

/// Path and query of `uri` with the value of every `token` parameter replaced.
#[must_use]
pub fn redacted_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let pairs = url::form_urlencoded::parse(query.as_bytes()).map(|(key, value)| {
        let value = if key == TOKEN_PARAM {
            Cow::Borrowed("redacted")
        } else {
            value
        };
        (key, value)
    });
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();

    format!("{}?{}", uri.path(), query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use parking_lot::Mutex;
    use std::fmt;
    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Collects the fields of every new span as `name=value` pairs.
    #[derive(Clone, Default)]
    struct SpanFields(Arc<Mutex<String>>);

    impl<S: tracing::Subscriber> Layer<S> for SpanFields {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            attrs.record(&mut FieldWriter(&mut self.0.lock()));
        }
    }

    struct FieldWriter<'a>(&'a mut String);

    impl Visit for FieldWriter<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.push_str(&format!("{}={:?} ", field.name(), value));
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("bearer   abc")), Some("abc"));
        assert_eq!(extract_bearer(&headers("BEARER abc")), Some("abc"));
    }

    #[test]
    fn test_extract_bearer_rejects_malformed() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
        assert_eq!(extract_bearer(&headers("Bearer")), None);
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer(&headers("Bearer a b")), None);
        assert_eq!(extract_bearer(&headers("abc.def.ghi")), None);
    }

    #[test]
    fn test_redacted_uri() {
        let uri: Uri = "/api/market-data?symbol=btc&token=eyJh.eyJz.c2ln".parse().unwrap();
        assert_eq!(redacted_uri(&uri), "/api/market-data?symbol=btc&token=redacted");

        let uri: Uri = "/api/market-data?token=abc".parse().unwrap();
        assert_eq!(redacted_uri(&uri), "/api/market-data?token=redacted");

        let uri: Uri = "/api/order/7".parse().unwrap();
        assert_eq!(redacted_uri(&uri), "/api/order/7");

        let uri: Uri = "/api/market-data?symbol=eth".parse().unwrap();
        assert_eq!(redacted_uri(&uri), "/api/market-data?symbol=eth");
    }

    #[test]
    fn test_request_span_hides_query_token() {
        let fields = SpanFields::default();
        let subscriber = tracing_subscriber::registry().with(fields.clone());
        let request = Request::builder()
            .uri("/api/market-data?symbol=btc&token=secret.bearer.value")
            .body(Body::empty())
            .unwrap();

        tracing::subscriber::with_default(subscriber, || {
            let _span = request_span(&request);
        });

        let recorded = fields.0.lock().clone();
        assert!(recorded.contains("method=GET"), "{recorded}");
        assert!(recorded.contains("symbol=btc"), "{recorded}");
        assert!(!recorded.contains("secret.bearer.value"), "{recorded}");
    }
}
