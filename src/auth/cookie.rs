use axum::http::{header, HeaderMap, HeaderValue};

use super::csrf;
use super::token::{TokenAuthority, TokenError};

pub const AUTH_COOKIE: &str = "auth_token";
pub const CSRF_COOKIE: &str = "csrf_token";

/// Look up a cookie value across every `Cookie` header on the request.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
}

/// The pair of cookies that make up a browser session.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    pub auth: String,
    pub csrf: String,
    /// Anti-forgery value the client must echo in `X-CSRF-TOKEN`.
    pub csrf_token: String,
}

impl SessionCookies {
    /// Issue a session token for the subject and pair it with a fresh anti-forgery token.
    pub fn issue(
        authority: &TokenAuthority,
        email: &str,
        user_id: i64,
        secure: bool,
    ) -> Result<Self, TokenError> {
        let token = authority.issue(email, user_id)?;
        let max_age = authority.ttl().num_seconds().max(0);
        let csrf_token = csrf::generate_token();

        Ok(Self {
            auth: build_cookie(AUTH_COOKIE, &token, max_age, true, secure),
            csrf: build_cookie(CSRF_COOKIE, &csrf_token, max_age, false, secure),
            csrf_token,
        })
    }

    /// Cookies that immediately expire both halves of the session.
    pub fn clear(secure: bool) -> Self {
        Self {
            auth: build_cookie(AUTH_COOKIE, "", 0, true, secure),
            csrf: build_cookie(CSRF_COOKIE, "", 0, false, secure),
            csrf_token: String::new(),
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for cookie in [&self.auth, &self.csrf] {
            match HeaderValue::from_str(cookie) {
                Ok(value) => {
                    headers.append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::error!("Refusing to emit invalid Set-Cookie header: {}", e),
            }
        }
    }
}

fn build_cookie(name: &str, value: &str, max_age: i64, http_only: bool, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; Max-Age={}; SameSite=Strict", name, value, max_age);
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
