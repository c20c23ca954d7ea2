use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{auth::jwt::TokenPair, config::CookieConfig};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(
    cfg: &CookieConfig,
    name: &'static str,
    value: String,
    max_age: time::Duration,
) -> Cookie<'static> {
    let mut builder = Cookie::build((name, value))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(cfg.same_site)
        .path("/")
        .max_age(max_age);
    if let Some(domain) = &cfg.domain {
        builder = builder.domain(domain.clone());
    }
    builder.build()
}

/// Sets both session cookies on the outgoing response.
pub fn attach_session(jar: CookieJar, cfg: &CookieConfig, tokens: TokenPair) -> CookieJar {
    jar.add(session_cookie(cfg, ACCESS_COOKIE, tokens.access, cfg.access_max_age))
        .add(session_cookie(cfg, REFRESH_COOKIE, tokens.refresh, cfg.refresh_max_age))
}

/// Expires both session cookies, whether or not the client sent them.
pub fn clear_session(jar: CookieJar, cfg: &CookieConfig) -> CookieJar {
    [ACCESS_COOKIE, REFRESH_COOKIE]
        .into_iter()
        .fold(jar, |jar, name| {
            let mut cookie = session_cookie(cfg, name, String::new(), time::Duration::ZERO);
            cookie.make_removal();
            jar.add(cookie)
        })
}
