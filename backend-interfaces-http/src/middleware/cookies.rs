use axum::http::{header, HeaderMap};

use backend_domain::MembershipToken;

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}

pub fn membership_token(headers: &HeaderMap, cookie_name: &str) -> Option<MembershipToken> {
    read_cookie(headers, cookie_name).and_then(|raw| MembershipToken::from_cookie(&raw))
}

/// `Set-Cookie` value for a freshly issued membership token.
pub fn membership_cookie(cookie_name: &str, token: &MembershipToken, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", cookie_name, token);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; x-auth-token=abc123"));
        assert_eq!(read_cookie(&headers, "x-auth-token").as_deref(), Some("abc123"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_is_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("x-auth-token="));
        assert_eq!(membership_token(&headers, "x-auth-token"), None);
    }

    #[test]
    fn issued_cookie_is_http_only_and_lax() {
        let token = MembershipToken::from_cookie("t1").unwrap();
        assert_eq!(
            membership_cookie("x-auth-token", &token, false),
            "x-auth-token=t1; Path=/; HttpOnly; SameSite=Lax"
        );
        assert!(membership_cookie("x-auth-token", &token, true).ends_with("; Secure"));
    }
}
