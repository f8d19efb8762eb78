use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Headers set by the auth proxy after it verified the caller's token.
const TRUSTED_USER_HEADERS: [&str; 2] = ["x-vm-user", "x-forwarded-user"];

/// Accepted only when token verification is disabled.
const DEV_USER_HEADER: &str = "x-user";

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub username: String,
}

/// Auth middleware - resolves the caller from auth proxy headers
///
/// With token verification enabled only the proxy headers are trusted. With it
/// disabled (local development), the `x-user` header is accepted as well.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let username = resolve_username(req.headers(), state.config.verify_token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(AuthenticatedUser { username });

    Ok(next.run(req).await)
}

fn resolve_username(headers: &HeaderMap, verify_token: bool) -> Option<String> {
    let dev_header = (!verify_token).then_some(DEV_USER_HEADER);

    TRUSTED_USER_HEADERS
        .into_iter()
        .chain(dev_header)
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|username| !username.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn test_proxy_header_wins() {
        let map = headers(&[("x-vm-user", "alice"), ("x-user", "mallory")]);
        assert_eq!(resolve_username(&map, false).as_deref(), Some("alice"));
    }

    #[test]
    fn test_dev_header_requires_verification_off() {
        let map = headers(&[("x-user", "alice")]);
        assert_eq!(resolve_username(&map, true), None);
        assert_eq!(resolve_username(&map, false).as_deref(), Some("alice"));
    }

    #[test]
    fn test_blank_username_is_rejected() {
        let map = headers(&[("x-vm-user", "  ")]);
        assert_eq!(resolve_username(&map, true), None);
    }
}
