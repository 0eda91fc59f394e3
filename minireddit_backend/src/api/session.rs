use super::{ApiError, AppState};
use crate::accounts::{AccountService, AccountView};
use crate::config::SessionConfig;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

pub(crate) fn accounts(state: &AppState) -> AccountService {
    AccountService::new(state.database.clone(), state.config.session.clone())
}

pub(crate) fn session_token(cookies: &Cookies, config: &SessionConfig) -> Option<String> {
    cookies
        .get(&config.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// The logged-in account, or `None` for anonymous callers. A stale cookie
/// reads as anonymous.
pub(crate) fn current_user(
    state: &AppState,
    cookies: &Cookies,
) -> Result<Option<AccountView>, ApiError> {
    match session_token(cookies, &state.config.session) {
        Some(token) => Ok(accounts(state).resolve_session(&token)?),
        None => Ok(None),
    }
}

pub(crate) fn require_user(state: &AppState, cookies: &Cookies) -> Result<AccountView, ApiError> {
    let token = session_token(cookies, &state.config.session);
    Ok(accounts(state).require_user(token.as_deref())?)
}

pub(crate) fn set_session_cookie(cookies: &Cookies, config: &SessionConfig, token: String) {
    let cookie = Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookie)
        .build();
    cookies.add(cookie);
}

pub(crate) fn clear_session_cookie(cookies: &Cookies, config: &SessionConfig) {
    let cookie = Cookie::build((config.cookie_name.clone(), ""))
        .path("/")
        .build();
    cookies.remove(cookie);
}
