use super::extract::JsonBody;
use super::session::{accounts, clear_session_cookie, require_user, session_token, set_session_cookie};
use super::{ApiError, ApiResult, AppState};
use crate::accounts::{AccountView, LoginInput, RegisterInput};
use crate::communities::{CommunityService, CommunityView};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tower_cookies::Cookies;

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    user: AccountView,
    expires_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct MeResponse {
    user: AccountView,
    subscriptions: Vec<CommunityView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LogoutResponse {
    logged_out: bool,
}

pub(crate) async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let account = accounts(&state).register(payload)?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    JsonBody(payload): JsonBody<LoginInput>,
) -> ApiResult<LoginResponse> {
    let outcome = accounts(&state).login(payload)?;
    set_session_cookie(&cookies, &state.config.session, outcome.token);
    Ok(Json(LoginResponse {
        user: outcome.user,
        expires_at: outcome.expires_at,
    }))
}

pub(crate) async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> ApiResult<LogoutResponse> {
    let logged_out = match session_token(&cookies, &state.config.session) {
        Some(token) => accounts(&state).logout(&token)?,
        None => false,
    };
    clear_session_cookie(&cookies, &state.config.session);
    Ok(Json(LogoutResponse { logged_out }))
}

pub(crate) async fn me(State(state): State<AppState>, cookies: Cookies) -> ApiResult<MeResponse> {
    let user = require_user(&state, &cookies)?;
    let subscriptions = CommunityService::new(state.database.clone()).subscribed_communities(user.id)?;
    Ok(Json(MeResponse {
        user,
        subscriptions,
    }))
}
