//! Anonymous session cookie middleware.

use axum::{
    body::Body,
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use uuid::Uuid;

use delivery_types::SessionId;

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Session cookie lifetime: 30 days.
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

/// Reads a non-empty session id from the request cookies.
fn session_from_request(request: &Request<Body>) -> Option<SessionId> {
    let jar = CookieJar::from_headers(request.headers());
    jar.get(SESSION_COOKIE_NAME)
        .map(|c| c.value().trim())
        .filter(|v| !v.is_empty())
        .map(SessionId::new)
}

/// Request extension marking a session id the server issued on this request.
///
/// Its presence means the client sent no cookie.
#[derive(Debug, Clone, Copy)]
pub struct IssuedSession;

fn session_cookie(session_id: &SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session_id.as_str().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_MAX_AGE_SECS))
        .build()
}

/// Attaches a `SessionId` to every request.
///
/// Requests without a session cookie get a fresh UUID v4 and the response
/// carries the `Set-Cookie` header for it.
pub async fn session_middleware(mut request: Request<Body>, next: Next) -> Response {
    let (session_id, issued) = match session_from_request(&request) {
        Some(id) => (id, false),
        None => (SessionId::new(Uuid::new_v4().to_string()), true),
    };

    if issued {
        tracing::debug!(session_id = %session_id, "issued new session");
        request.extensions_mut().insert(IssuedSession);
    }

    request.extensions_mut().insert(session_id.clone());
    let mut response = next.run(request).await;

    if issued {
        match HeaderValue::from_str(&session_cookie(&session_id).to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("invalid session cookie header: {}", e),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_cookie(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/parcels");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_session_from_cookie() {
        let req = request_with_cookie(Some("theme=dark; session_id=abc-123"));
        assert_eq!(session_from_request(&req), Some(SessionId::new("abc-123")));
    }

    #[test]
    fn test_missing_or_empty_session() {
        assert_eq!(session_from_request(&request_with_cookie(None)), None);
        assert_eq!(
            session_from_request(&request_with_cookie(Some("session_id="))),
            None
        );
    }

    #[test]
    fn test_cookie_attributes() {
        let header = session_cookie(&SessionId::new("abc")).to_string();

        assert!(header.starts_with("session_id=abc"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=2592000"));
    }
}
