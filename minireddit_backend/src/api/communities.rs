use super::extract::{JsonBody, PathParam, QueryParams};
use super::session::{current_user, require_user};
use super::{ApiError, ApiResult, AppState};
use crate::communities::{CommunityService, CommunityView, CreateCommunityInput};
use crate::listings::{ListingService, ListingSort, PostListing};
use crate::subscriptions::{SubscriptionOutcome, SubscriptionService};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

#[derive(Debug, Deserialize)]
pub(crate) struct ListCommunitiesParams {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommunityPageParams {
    #[serde(default)]
    sort: Option<ListingSort>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CommunityPage {
    community: CommunityView,
    is_subscribed: bool,
    sort: ListingSort,
    #[serde(flatten)]
    listing: PostListing,
}

pub(crate) async fn list_communities(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListCommunitiesParams>,
) -> ApiResult<Vec<CommunityView>> {
    let limit = params.limit.unwrap_or(50).min(200);
    let communities = CommunityService::new(state.database.clone()).list_communities(limit)?;
    Ok(Json(communities))
}

pub(crate) async fn create_community(
    State(state): State<AppState>,
    cookies: Cookies,
    JsonBody(payload): JsonBody<CreateCommunityInput>,
) -> Result<(StatusCode, Json<CommunityView>), ApiError> {
    let user = require_user(&state, &cookies)?;
    let community = CommunityService::new(state.database.clone()).create_community(user.id, payload)?;
    Ok((StatusCode::CREATED, Json(community)))
}

pub(crate) async fn community_page(
    State(state): State<AppState>,
    cookies: Cookies,
    PathParam(name): PathParam<String>,
    QueryParams(params): QueryParams<CommunityPageParams>,
) -> ApiResult<CommunityPage> {
    let viewer = current_user(&state, &cookies)?.map(|user| user.id);
    let sort = params.sort.unwrap_or_default();
    let details = CommunityService::new(state.database.clone()).get_community(&name, viewer)?;
    let listing = ListingService::new(state.database.clone(), state.config.listing.clone())
        .list_posts(sort, Some(&details.community.name), viewer)?;
    Ok(Json(CommunityPage {
        community: details.community,
        is_subscribed: details.is_subscribed,
        sort,
        listing,
    }))
}

pub(crate) async fn toggle_subscription(
    State(state): State<AppState>,
    cookies: Cookies,
    PathParam(name): PathParam<String>,
) -> ApiResult<SubscriptionOutcome> {
    let user = require_user(&state, &cookies)?;
    let outcome = SubscriptionService::new(state.database.clone()).toggle_subscription(user.id, &name)?;
    Ok(Json(outcome))
}
