use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::jwt::JwtKeys;
use crate::auth::tokens::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn auth_cookie(name: &'static str, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

fn ttl(d: std::time::Duration) -> time::Duration {
    time::Duration::seconds(d.as_secs() as i64)
}

/// Store both tokens as HttpOnly, Secure cookies living as long as the tokens.
pub fn with_tokens(jar: CookieJar, keys: &JwtKeys, pair: &TokenPair) -> CookieJar {
    jar.add(auth_cookie(ACCESS_COOKIE, pair.access_token.clone(), ttl(keys.access.ttl)))
        .add(auth_cookie(REFRESH_COOKIE, pair.refresh_token.clone(), ttl(keys.refresh.ttl)))
}

/// Expire both cookies, whether or not the request carried them.
pub fn without_tokens(jar: CookieJar) -> CookieJar {
    jar.add(auth_cookie(ACCESS_COOKIE, String::new(), time::Duration::ZERO))
        .add(auth_cookie(REFRESH_COOKIE, String::new(), time::Duration::ZERO))
}
