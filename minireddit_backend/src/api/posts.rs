use super::extract::{JsonBody, PathParam, QueryParams};
use super::session::{current_user, require_user};
use super::{ApiError, ApiResult, AppState};
use crate::listings::{ListingService, ListingSort, PostListing, PostView};
use crate::posts::{AddCommentInput, CommentView, CreatePostInput, PostDetails, PostService};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tower_cookies::Cookies;

#[derive(Debug, Deserialize)]
pub(crate) struct ListingParams {
    #[serde(default)]
    community: Option<String>,
}

fn listing(
    state: &AppState,
    cookies: &Cookies,
    sort: ListingSort,
    params: ListingParams,
) -> ApiResult<PostListing> {
    let viewer = current_user(state, cookies)?.map(|user| user.id);
    let service = ListingService::new(state.database.clone(), state.config.listing.clone());
    let page = service.list_posts(sort, params.community.as_deref(), viewer)?;
    Ok(Json(page))
}

pub(crate) async fn list_newest(
    State(state): State<AppState>,
    cookies: Cookies,
    QueryParams(params): QueryParams<ListingParams>,
) -> ApiResult<PostListing> {
    listing(&state, &cookies, ListingSort::New, params)
}

pub(crate) async fn list_hot(
    State(state): State<AppState>,
    cookies: Cookies,
    QueryParams(params): QueryParams<ListingParams>,
) -> ApiResult<PostListing> {
    listing(&state, &cookies, ListingSort::Hot, params)
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    cookies: Cookies,
    JsonBody(payload): JsonBody<CreatePostInput>,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let user = require_user(&state, &cookies)?;
    let post = PostService::new(state.database.clone()).create_post(user.id, payload)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    cookies: Cookies,
    PathParam(id): PathParam<i64>,
) -> ApiResult<PostDetails> {
    let viewer = current_user(&state, &cookies)?.map(|user| user.id);
    let details = PostService::new(state.database.clone()).get_post(id, viewer)?;
    Ok(Json(details))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    cookies: Cookies,
    PathParam(id): PathParam<i64>,
    JsonBody(payload): JsonBody<AddCommentInput>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let user = require_user(&state, &cookies)?;
    let comment = PostService::new(state.database.clone()).add_comment(user.id, id, payload)?;
    Ok((StatusCode::CREATED, Json(comment)))
}
