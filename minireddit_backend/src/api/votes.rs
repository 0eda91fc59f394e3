use super::extract::PathParam;
use super::session::require_user;
use super::{ApiResult, AppState};
use crate::votes::{VoteOutcome, VoteService};
use axum::extract::State;
use axum::Json;
use tower_cookies::Cookies;

/// The polarity segment is parsed by the service so an unknown tag is a
/// 400 rather than a routing miss.
pub(crate) async fn cast_vote(
    State(state): State<AppState>,
    cookies: Cookies,
    PathParam((post_id, polarity)): PathParam<(i64, String)>,
) -> ApiResult<VoteOutcome> {
    let user = require_user(&state, &cookies)?;
    let outcome = VoteService::new(state.database.clone()).cast_vote_tag(user.id, post_id, &polarity)?;
    Ok(Json(outcome))
}
