use super::extract::QueryParams;
use super::session::current_user;
use super::{ApiResult, AppState};
use crate::communities::{CommunityService, CommunityView};
use crate::listings::{ListingService, PostListing};
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostSearchResponse {
    query: String,
    #[serde(flatten)]
    listing: PostListing,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommunitySearchResponse {
    query: String,
    communities: Vec<CommunityView>,
}

pub(crate) async fn search_posts(
    State(state): State<AppState>,
    cookies: Cookies,
    QueryParams(params): QueryParams<SearchParams>,
) -> ApiResult<PostSearchResponse> {
    let query = params.q.trim().to_string();
    let viewer = current_user(&state, &cookies)?.map(|user| user.id);
    let listing = ListingService::new(state.database.clone(), state.config.listing.clone())
        .search_posts(&query, viewer)?;
    Ok(Json(PostSearchResponse { query, listing }))
}

pub(crate) async fn search_communities(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> ApiResult<CommunitySearchResponse> {
    let query = params.q.trim().to_string();
    let communities = CommunityService::new(state.database.clone())
        .search_communities(&query, state.config.listing.search_page_size)?;
    Ok(Json(CommunitySearchResponse { query, communities }))
}
