use crate::gate::RequestContext;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const COUNTRY_HEADER: &str = "x-country-code";
pub const CLOUDFLARE_COUNTRY_HEADER: &str = "cf-ipcountry";

/// Caller identity taken from gateway headers.
///
/// Never rejects: a missing or malformed user id yields an anonymous context
/// and the engine answers `UNAUTHORIZED`.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let user_id = header(USER_ID_HEADER).and_then(|raw| Uuid::parse_str(raw).ok());
        let country = header(COUNTRY_HEADER)
            .or_else(|| header(CLOUDFLARE_COUNTRY_HEADER))
            .map(str::to_string);

        Self(RequestContext { user_id, country })
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_reads_user_and_country() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        headers.insert(CLOUDFLARE_COUNTRY_HEADER, HeaderValue::from_static("NG"));

        let Caller(ctx) = Caller::from_headers(&headers);
        assert_eq!(ctx.user_id, Some(id));
        assert_eq!(ctx.country.as_deref(), Some("NG"));
    }

    #[test]
    fn test_explicit_country_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(COUNTRY_HEADER, HeaderValue::from_static("gh"));
        headers.insert(CLOUDFLARE_COUNTRY_HEADER, HeaderValue::from_static("NG"));
        assert_eq!(Caller::from_headers(&headers).0.country.as_deref(), Some("gh"));
    }

    #[test]
    fn test_malformed_user_id_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(Caller::from_headers(&headers).0, RequestContext::anonymous());
    }
}
