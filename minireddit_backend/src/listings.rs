use crate::config::ListingConfig;
use crate::database::models::{PostListingRecord, VotePolarity};
use crate::database::repositories::{
    BookmarkRepository, CommunityRepository, PostRepository, SqliteRepositories, VoteRepository,
};
use crate::database::Database;
use crate::error::{BoardError, BoardResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingSort {
    #[default]
    New,
    Hot,
}

/// A post as listing pages and the detail view present it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub post_type: String,
    pub author_id: i64,
    pub author_username: String,
    pub community_id: Option<i64>,
    pub community_name: Option<String>,
    pub community_display_name: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub comments_count: i64,
    pub created_at: String,
}

impl PostView {
    pub(crate) fn from_listing(record: PostListingRecord) -> Self {
        let score = record.post.score();
        let post = record.post;
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            post_type: post.post_type,
            author_id: post.user_id,
            author_username: record.author_username,
            community_id: post.community_id,
            community_name: record.community_name,
            community_display_name: record.community_display_name,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            score,
            comments_count: post.comments_count,
            created_at: post.created_at,
        }
    }
}

/// A page of posts plus the viewer's own votes and bookmarks on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostListing {
    pub posts: Vec<PostView>,
    pub user_votes: HashMap<i64, VotePolarity>,
    pub user_bookmarks: HashSet<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerAnnotations {
    pub user_votes: HashMap<i64, VotePolarity>,
    pub user_bookmarks: HashSet<i64>,
}

/// Two queries per page regardless of page length: one for votes, one for
/// bookmarks. Anonymous viewers skip both.
pub(crate) fn annotations_for(
    repos: &SqliteRepositories<'_>,
    viewer: Option<i64>,
    post_ids: &[i64],
) -> BoardResult<ViewerAnnotations> {
    let Some(user_id) = viewer else {
        return Ok(ViewerAnnotations::default());
    };
    if post_ids.is_empty() {
        return Ok(ViewerAnnotations::default());
    }
    Ok(ViewerAnnotations {
        user_votes: repos.votes().polarities_for(user_id, post_ids)?,
        user_bookmarks: repos.bookmarks().bookmarked_among(user_id, post_ids)?,
    })
}

fn into_listing(
    repos: &SqliteRepositories<'_>,
    viewer: Option<i64>,
    records: Vec<PostListingRecord>,
) -> BoardResult<PostListing> {
    let post_ids: Vec<i64> = records.iter().map(|record| record.post.id).collect();
    let annotations = annotations_for(repos, viewer, &post_ids)?;
    Ok(PostListing {
        posts: records.into_iter().map(PostView::from_listing).collect(),
        user_votes: annotations.user_votes,
        user_bookmarks: annotations.user_bookmarks,
    })
}

#[derive(Clone)]
pub struct ListingService {
    database: Database,
    limits: ListingConfig,
}

impl ListingService {
    pub fn new(database: Database, limits: ListingConfig) -> Self {
        Self { database, limits }
    }

    /// Front page or a single community, ordered by `sort`. An unknown
    /// community name is `NotFound` rather than an empty page.
    pub fn list_posts(
        &self,
        sort: ListingSort,
        community: Option<&str>,
        viewer: Option<i64>,
    ) -> BoardResult<PostListing> {
        let limit = self.limits.page_size;
        self.database.with_repositories(|repos| {
            let community_id = match community.map(str::trim).filter(|name| !name.is_empty()) {
                Some(name) => Some(
                    repos
                        .communities()
                        .get_by_name(name)?
                        .ok_or_else(|| BoardError::not_found(format!("community '{name}' not found")))?
                        .id,
                ),
                None => None,
            };
            let records = match sort {
                ListingSort::New => repos.posts().list_newest(community_id, limit)?,
                ListingSort::Hot => repos.posts().list_hot(community_id, limit)?,
            };
            into_listing(&repos, viewer, records)
        })
    }

    pub fn search_posts(&self, query: &str, viewer: Option<i64>) -> BoardResult<PostListing> {
        let limit = self.limits.search_page_size;
        self.database.with_repositories(|repos| {
            let records = repos.posts().search(query, limit)?;
            into_listing(&repos, viewer, records)
        })
    }

    pub fn list_bookmarks(&self, user_id: i64) -> BoardResult<PostListing> {
        let limit = self.limits.page_size;
        self.database.with_repositories(|repos| {
            let records = repos.posts().list_bookmarked(user_id, limit)?;
            into_listing(&repos, Some(user_id), records)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmarks::BookmarkService;
    use crate::test_support::Fixture;
    use crate::votes::VoteService;

    fn ids(listing: &PostListing) -> Vec<i64> {
        listing.posts.iter().map(|post| post.id).collect()
    }

    fn service(fixture: &Fixture) -> ListingService {
        ListingService::new(fixture.database.clone(), ListingConfig::default())
    }

    #[test]
    fn hot_orders_by_score_and_new_by_recency() {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        let b = fixture.user("bob");
        let c = fixture.user("carol");
        let tech = fixture.community(a, "tech");
        let hello = fixture.post(a, Some(tech), "Hello");
        let world = fixture.post(a, Some(tech), "World");
        let votes = VoteService::new(fixture.database.clone());

        votes.cast_vote(b, hello, VotePolarity::Up).unwrap();
        let listings = service(&fixture);
        assert_eq!(ids(&listings.list_posts(ListingSort::New, None, None).unwrap()), vec![world, hello]);
        assert_eq!(ids(&listings.list_posts(ListingSort::Hot, None, None).unwrap()), vec![hello, world]);

        votes.cast_vote(c, hello, VotePolarity::Down).unwrap();
        let hot = listings.list_posts(ListingSort::Hot, Some("tech"), None).unwrap();
        // Equal scores fall back to recency.
        assert_eq!(ids(&hot), vec![world, hello]);
        let hello_view = hot.posts.iter().find(|post| post.id == hello).unwrap();
        assert_eq!((hello_view.upvotes, hello_view.downvotes, hello_view.score), (1, 1, 0));
        assert_eq!(hello_view.community_name.as_deref(), Some("tech"));
        assert_eq!(hello_view.author_username, "alice");
    }

    #[test]
    fn community_filter_and_unknown_community() {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        let tech = fixture.community(a, "tech");
        let food = fixture.community(a, "food");
        let in_tech = fixture.post(a, Some(tech), "chips");
        fixture.post(a, Some(food), "pasta");
        fixture.post(a, None, "loose");
        let listings = service(&fixture);

        assert_eq!(ids(&listings.list_posts(ListingSort::New, Some("tech"), None).unwrap()), vec![in_tech]);
        assert_eq!(listings.list_posts(ListingSort::New, None, None).unwrap().posts.len(), 3);
        assert!(matches!(
            listings.list_posts(ListingSort::New, Some("nowhere"), None),
            Err(BoardError::NotFound(_))
        ));
    }

    #[test]
    fn annotations_belong_to_the_viewer_only() {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        let b = fixture.user("bob");
        let p1 = fixture.post(a, None, "one");
        let p2 = fixture.post(a, None, "two");
        VoteService::new(fixture.database.clone())
            .cast_vote(b, p1, VotePolarity::Down)
            .unwrap();
        BookmarkService::new(fixture.database.clone())
            .toggle_bookmark(b, p2)
            .unwrap();
        let listings = service(&fixture);

        let for_bob = listings.list_posts(ListingSort::New, None, Some(b)).unwrap();
        assert_eq!(for_bob.user_votes, HashMap::from([(p1, VotePolarity::Down)]));
        assert_eq!(for_bob.user_bookmarks, HashSet::from([p2]));

        let for_alice = listings.list_posts(ListingSort::New, None, Some(a)).unwrap();
        assert!(for_alice.user_votes.is_empty());
        assert!(for_alice.user_bookmarks.is_empty());

        let anonymous = listings.list_posts(ListingSort::New, None, None).unwrap();
        assert_eq!(anonymous.posts.len(), 2);
        assert!(anonymous.user_votes.is_empty());
    }

    #[test]
    fn search_is_literal_and_case_insensitive() {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        let sale = fixture.post(a, None, "100% Rust");
        fixture.post(a, None, "1000 Rust");
        let listings = service(&fixture);

        assert_eq!(ids(&listings.search_posts("100%", None).unwrap()), vec![sale]);
        assert_eq!(listings.search_posts("rust", None).unwrap().posts.len(), 2);
        assert!(listings.search_posts("  ", None).unwrap().posts.is_empty());
    }

    #[test]
    fn search_ignores_case_in_any_script() {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        let welcome = fixture.post(a, None, "Добро пожаловать");
        let school = fixture.post(a, None, "ÉCOLE d'été");
        fixture.post(a, None, "plain ascii");
        let listings = service(&fixture);

        assert_eq!(ids(&listings.search_posts("добро", None).unwrap()), vec![welcome]);
        assert_eq!(ids(&listings.search_posts("ПОЖАЛ", None).unwrap()), vec![welcome]);
        assert_eq!(ids(&listings.search_posts("école", None).unwrap()), vec![school]);
        assert_eq!(ids(&listings.search_posts("ÉTÉ", None).unwrap()), vec![school]);
    }

    #[test]
    fn bookmarks_list_most_recent_first() {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        let p1 = fixture.post(a, None, "one");
        let p2 = fixture.post(a, None, "two");
        let p3 = fixture.post(a, None, "three");
        let bookmarks = BookmarkService::new(fixture.database.clone());
        bookmarks.toggle_bookmark(a, p3).unwrap();
        bookmarks.toggle_bookmark(a, p1).unwrap();
        bookmarks.toggle_bookmark(a, p2).unwrap();
        bookmarks.toggle_bookmark(a, p2).unwrap();

        let saved = service(&fixture).list_bookmarks(a).unwrap();
        assert_eq!(ids(&saved), vec![p1, p3]);
        assert_eq!(saved.user_bookmarks, HashSet::from([p1, p3]));
    }

    #[test]
    fn page_size_caps_results() {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        for n in 0..5 {
            fixture.post(a, None, &format!("post {n}"));
        }
        let listings = ListingService::new(
            fixture.database.clone(),
            ListingConfig {
                page_size: 3,
                search_page_size: 4,
            },
        );
        assert_eq!(listings.list_posts(ListingSort::New, None, None).unwrap().posts.len(), 3);
        assert_eq!(listings.search_posts("post", None).unwrap().posts.len(), 4);
    }
}
