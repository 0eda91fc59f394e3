mod bookmarks;
mod comments;
mod communities;
mod posts;
mod sessions;
mod subscriptions;
mod users;
mod votes;

use super::models::{
    CommentRecord, CommunityRecord, NewComment, NewCommunity, NewPost, NewUser,
    PostListingRecord, PostRecord, SessionRecord, UserRecord, VotePolarity,
};
use anyhow::Result;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

pub trait UserRepository {
    fn create(&self, record: &NewUser) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<UserRecord>>;
    fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
    fn adjust_karma(&self, id: i64, delta: i64) -> Result<()>;
    fn count(&self) -> Result<i64>;
}

pub trait CommunityRepository {
    fn create(&self, record: &NewCommunity) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<CommunityRecord>>;
    fn get_by_name(&self, name: &str) -> Result<Option<CommunityRecord>>;
    fn list_popular(&self, limit: usize) -> Result<Vec<CommunityRecord>>;
    fn list_for_subscriber(&self, user_id: i64) -> Result<Vec<CommunityRecord>>;
    /// Case-insensitive substring match over name, display name and
    /// description, most subscribed first.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<CommunityRecord>>;
    fn adjust_subscribers(&self, id: i64, delta: i64) -> Result<()>;
}

pub trait SubscriptionRepository {
    fn exists(&self, user_id: i64, community_id: i64) -> Result<bool>;
    /// Fails on a duplicate (user, community) pair.
    fn insert(&self, user_id: i64, community_id: i64, subscribed_at: &str) -> Result<()>;
    /// Returns whether a row was removed.
    fn delete(&self, user_id: i64, community_id: i64) -> Result<bool>;
}

pub trait PostRepository {
    fn create(&self, record: &NewPost) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<PostRecord>>;
    fn get_listing(&self, id: i64) -> Result<Option<PostListingRecord>>;
    fn list_newest(&self, community_id: Option<i64>, limit: usize) -> Result<Vec<PostListingRecord>>;
    fn list_hot(&self, community_id: Option<i64>, limit: usize) -> Result<Vec<PostListingRecord>>;
    fn search(&self, query: &str, limit: usize) -> Result<Vec<PostListingRecord>>;
    fn list_bookmarked(&self, user_id: i64, limit: usize) -> Result<Vec<PostListingRecord>>;
    fn adjust_vote_counters(&self, id: i64, upvotes_delta: i64, downvotes_delta: i64) -> Result<()>;
    fn increment_comments(&self, id: i64) -> Result<()>;
}

pub trait CommentRepository {
    fn create(&self, record: &NewComment) -> Result<i64>;
    fn get(&self, id: i64) -> Result<Option<CommentRecord>>;
    fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>>;
}

pub trait VoteRepository {
    fn get(&self, user_id: i64, post_id: i64) -> Result<Option<VotePolarity>>;
    /// Fails on a duplicate (user, post) pair.
    fn insert(&self, user_id: i64, post_id: i64, polarity: VotePolarity) -> Result<()>;
    fn update(&self, user_id: i64, post_id: i64, polarity: VotePolarity) -> Result<()>;
    fn delete(&self, user_id: i64, post_id: i64) -> Result<bool>;
    /// One query for the whole page: the caller's votes among `post_ids`.
    fn polarities_for(&self, user_id: i64, post_ids: &[i64]) -> Result<HashMap<i64, VotePolarity>>;
}

pub trait BookmarkRepository {
    fn insert(&self, user_id: i64, post_id: i64, created_at: &str) -> Result<()>;
    fn delete(&self, user_id: i64, post_id: i64) -> Result<bool>;
    /// One query for the whole page: which of `post_ids` the caller saved.
    fn bookmarked_among(&self, user_id: i64, post_ids: &[i64]) -> Result<HashSet<i64>>;
}

pub trait SessionRepository {
    fn create(&self, record: &SessionRecord) -> Result<()>;
    fn find_user(&self, token: &str, now: &str) -> Result<Option<UserRecord>>;
    fn delete(&self, token: &str) -> Result<bool>;
    fn purge_expired(&self, now: &str) -> Result<usize>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn communities(&self) -> impl CommunityRepository + '_ {
        communities::SqliteCommunityRepository { conn: self.conn }
    }

    pub fn subscriptions(&self) -> impl SubscriptionRepository + '_ {
        subscriptions::SqliteSubscriptionRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn votes(&self) -> impl VoteRepository + '_ {
        votes::SqliteVoteRepository { conn: self.conn }
    }

    pub fn bookmarks(&self) -> impl BookmarkRepository + '_ {
        bookmarks::SqliteBookmarkRepository { conn: self.conn }
    }

    pub fn sessions(&self) -> impl SessionRepository + '_ {
        sessions::SqliteSessionRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

/// `?first, ?first+1, ...` for an `IN (...)` list of `count` values.
pub(super) fn numbered_placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{register_functions, MIGRATIONS};

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("base migrations");
        register_functions(&conn).expect("sql functions");
        conn
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            password_hash: "hash".into(),
            created_at: "2024-01-01T00:00:00.000000Z".into(),
        }
    }

    fn new_post(user_id: i64, community_id: Option<i64>, title: &str, created_at: &str) -> NewPost {
        NewPost {
            title: title.into(),
            content: format!("{title} body"),
            user_id,
            community_id,
            post_type: "text".into(),
            created_at: created_at.into(),
        }
    }

    #[test]
    fn placeholders_are_numbered_from_offset() {
        assert_eq!(numbered_placeholders(2, 3), "?2, ?3, ?4");
        assert_eq!(numbered_placeholders(1, 0), "");
    }

    #[test]
    fn user_and_community_repositories_work() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);

        let alice = repos.users().create(&new_user("alice")).unwrap();
        let fetched = repos.users().get_by_username("alice").unwrap().unwrap();
        assert_eq!(fetched.id, alice);
        assert_eq!(fetched.karma, 0);
        assert!(repos.users().create(&new_user("alice")).is_err());

        let community = repos
            .communities()
            .create(&NewCommunity {
                name: "Tech".into(),
                display_name: "Technology".into(),
                description: Some("All things computers".into()),
                owner_id: alice,
                is_public: true,
                created_at: "2024-01-01T00:00:00.000000Z".into(),
            })
            .unwrap();
        // Names are case-sensitive: "tech" is a different community.
        assert!(repos.communities().get_by_name("tech").unwrap().is_none());
        assert_eq!(
            repos.communities().get(community).unwrap().unwrap().display_name,
            "Technology"
        );
        let hits = repos.communities().search("COMPUTERS", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(repos.communities().search("100%", 10).unwrap().is_empty());
    }

    #[test]
    fn search_folds_case_outside_ascii() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = repos.users().create(&new_user("alice")).unwrap();
        repos
            .communities()
            .create(&NewCommunity {
                name: "kino".into(),
                display_name: "Кино".into(),
                description: Some("Обсуждаем ФИЛЬМЫ".into()),
                owner_id: alice,
                is_public: true,
                created_at: "2024-01-01T00:00:00.000000Z".into(),
            })
            .unwrap();
        let welcome = repos
            .posts()
            .create(&new_post(alice, None, "Добро пожаловать", "2024-01-01T00:00:00.000000Z"))
            .unwrap();

        assert_eq!(repos.communities().search("фильмы", 10).unwrap().len(), 1);
        assert_eq!(repos.communities().search("КИНО", 10).unwrap().len(), 1);
        let hits = repos.posts().search("ДОБРО", 10).unwrap();
        assert_eq!(hits.iter().map(|record| record.post.id).collect::<Vec<_>>(), vec![welcome]);
        assert!(repos.posts().search("прощай", 10).unwrap().is_empty());
    }

    #[test]
    fn counters_refuse_to_go_negative() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = repos.users().create(&new_user("alice")).unwrap();
        let post = repos
            .posts()
            .create(&new_post(alice, None, "Hello", "2024-01-01T00:00:00.000000Z"))
            .unwrap();
        assert!(repos.posts().adjust_vote_counters(post, -1, 0).is_err());
        repos.posts().adjust_vote_counters(post, 1, 2).unwrap();
        let stored = repos.posts().get(post).unwrap().unwrap();
        assert_eq!((stored.upvotes, stored.downvotes), (1, 2));
    }

    #[test]
    fn listings_order_by_recency_and_score() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = repos.users().create(&new_user("alice")).unwrap();
        let old = repos
            .posts()
            .create(&new_post(alice, None, "old", "2024-01-01T00:00:00.000000Z"))
            .unwrap();
        let new = repos
            .posts()
            .create(&new_post(alice, None, "new", "2024-01-02T00:00:00.000000Z"))
            .unwrap();
        repos.posts().adjust_vote_counters(old, 3, 1).unwrap();

        let newest: Vec<i64> = repos
            .posts()
            .list_newest(None, 20)
            .unwrap()
            .into_iter()
            .map(|row| row.post.id)
            .collect();
        assert_eq!(newest, vec![new, old]);

        let hot: Vec<i64> = repos
            .posts()
            .list_hot(None, 20)
            .unwrap()
            .into_iter()
            .map(|row| row.post.id)
            .collect();
        assert_eq!(hot, vec![old, new]);

        let limited = repos.posts().list_newest(None, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].author_username, "alice");
    }

    #[test]
    fn batched_annotations_cover_only_requested_posts() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let alice = repos.users().create(&new_user("alice")).unwrap();
        let bob = repos.users().create(&new_user("bob")).unwrap();
        let p1 = repos
            .posts()
            .create(&new_post(alice, None, "one", "2024-01-01T00:00:00.000000Z"))
            .unwrap();
        let p2 = repos
            .posts()
            .create(&new_post(alice, None, "two", "2024-01-01T00:00:01.000000Z"))
            .unwrap();
        let p3 = repos
            .posts()
            .create(&new_post(alice, None, "three", "2024-01-01T00:00:02.000000Z"))
            .unwrap();

        repos.votes().insert(bob, p1, VotePolarity::Up).unwrap();
        repos.votes().insert(bob, p3, VotePolarity::Down).unwrap();
        repos.votes().insert(alice, p2, VotePolarity::Up).unwrap();
        repos.bookmarks().insert(bob, p2, "2024-01-02T00:00:00.000000Z").unwrap();

        let votes = repos.votes().polarities_for(bob, &[p1, p2]).unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes.get(&p1), Some(&VotePolarity::Up));

        let saved = repos.bookmarks().bookmarked_among(bob, &[p1, p2, p3]).unwrap();
        assert_eq!(saved, HashSet::from([p2]));

        assert!(repos.votes().polarities_for(bob, &[]).unwrap().is_empty());
        assert!(repos.votes().insert(bob, p1, VotePolarity::Down).is_err());
    }
}
