use super::extract::PathParam;
use super::session::require_user;
use super::{ApiResult, AppState};
use crate::bookmarks::{BookmarkOutcome, BookmarkService};
use crate::listings::{ListingService, PostListing};
use axum::extract::State;
use axum::Json;
use tower_cookies::Cookies;

pub(crate) async fn toggle_bookmark(
    State(state): State<AppState>,
    cookies: Cookies,
    PathParam(post_id): PathParam<i64>,
) -> ApiResult<BookmarkOutcome> {
    let user = require_user(&state, &cookies)?;
    let outcome = BookmarkService::new(state.database.clone()).toggle_bookmark(user.id, post_id)?;
    Ok(Json(outcome))
}

pub(crate) async fn list_bookmarks(
    State(state): State<AppState>,
    cookies: Cookies,
) -> ApiResult<PostListing> {
    let user = require_user(&state, &cookies)?;
    let page = ListingService::new(state.database.clone(), state.config.listing.clone())
        .list_bookmarks(user.id)?;
    Ok(Json(page))
}
