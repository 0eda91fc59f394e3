//! Shared fixtures for service tests.

use crate::communities::{CommunityService, CreateCommunityInput};
use crate::database::models::{CommunityRecord, NewPost, NewUser, PostRecord, UserRecord};
use crate::database::repositories::{CommunityRepository, PostRepository, UserRepository};
use crate::database::Database;
use crate::utils::now_utc_iso;
use rusqlite::params;
use std::path::Path;

pub(crate) struct Fixture {
    pub database: Database,
}

impl Fixture {
    pub fn new() -> Self {
        let database = Database::in_memory().expect("in-memory db");
        database.ensure_migrations().expect("migrations");
        Self { database }
    }

    /// File-backed store, so every storage call opens its own connection.
    pub fn on_disk(path: &Path) -> Self {
        let database = Database::open_path(path).expect("file db");
        database.ensure_migrations().expect("migrations");
        Self { database }
    }

    /// Inserts a user directly; the password hash is a placeholder.
    pub fn user(&self, username: &str) -> i64 {
        self.database
            .with_repositories(|repos| {
                repos.users().create(&NewUser {
                    username: username.into(),
                    email: format!("{username}@example.com"),
                    password_hash: "unused".into(),
                    created_at: now_utc_iso(),
                })
            })
            .expect("create user")
    }

    pub fn community(&self, owner_id: i64, name: &str) -> i64 {
        CommunityService::new(self.database.clone())
            .create_community(
                owner_id,
                CreateCommunityInput {
                    name: name.into(),
                    display_name: None,
                    description: None,
                    is_public: None,
                },
            )
            .expect("create community")
            .id
    }

    pub fn post(&self, author_id: i64, community_id: Option<i64>, title: &str) -> i64 {
        self.database
            .with_repositories(|repos| {
                repos.posts().create(&NewPost {
                    title: title.into(),
                    content: format!("{title} body"),
                    user_id: author_id,
                    community_id,
                    post_type: "text".into(),
                    created_at: now_utc_iso(),
                })
            })
            .expect("create post")
    }

    pub fn post_record(&self, post_id: i64) -> PostRecord {
        self.database
            .with_repositories(|repos| repos.posts().get(post_id))
            .expect("load post")
            .expect("post exists")
    }

    pub fn user_record(&self, user_id: i64) -> UserRecord {
        self.database
            .with_repositories(|repos| repos.users().get(user_id))
            .expect("load user")
            .expect("user exists")
    }

    pub fn community_record(&self, community_id: i64) -> CommunityRecord {
        self.database
            .with_repositories(|repos| repos.communities().get(community_id))
            .expect("load community")
            .expect("community exists")
    }

    pub fn count(&self, table: &str) -> i64 {
        self.database
            .with_repositories(|repos| {
                repos
                    .conn()
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                    .map_err(anyhow::Error::from)
            })
            .expect("count rows")
    }

    pub fn count_where(&self, table: &str, column: &str, value: i64) -> i64 {
        self.query_i64(&format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"), value, None)
    }

    pub fn is_subscribed(&self, user_id: i64, community_id: i64) -> bool {
        self.query_i64(
            "SELECT COUNT(*) FROM community_subscriptions WHERE community_id = ?1 AND user_id = ?2",
            community_id,
            Some(user_id),
        ) > 0
    }

    pub fn is_bookmarked(&self, user_id: i64, post_id: i64) -> bool {
        self.query_i64(
            "SELECT COUNT(*) FROM bookmarks WHERE post_id = ?1 AND user_id = ?2",
            post_id,
            Some(user_id),
        ) > 0
    }

    /// Live (upvotes, downvotes) from ledger rows.
    pub fn vote_tally(&self, post_id: i64) -> (i64, i64) {
        let up = self.query_i64(
            "SELECT COUNT(*) FROM votes WHERE post_id = ?1 AND vote_type = 'up'",
            post_id,
            None,
        );
        let down = self.query_i64(
            "SELECT COUNT(*) FROM votes WHERE post_id = ?1 AND vote_type = 'down'",
            post_id,
            None,
        );
        (up, down)
    }

    fn query_i64(&self, sql: &str, first: i64, second: Option<i64>) -> i64 {
        self.database
            .with_repositories(|repos| {
                let conn = repos.conn();
                let value: rusqlite::Result<i64> = match second {
                    Some(second) => conn.query_row(sql, params![first, second], |row| row.get(0)),
                    None => conn.query_row(sql, params![first], |row| row.get(0)),
                };
                value.map_err(anyhow::Error::from)
            })
            .expect("scalar query")
    }
}
