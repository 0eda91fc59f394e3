use crate::error::BoardError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub karma: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: String,
    pub subscribers_count: i64,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct NewCommunity {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub is_public: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub community_id: Option<i64>,
    pub post_type: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub comments_count: i64,
    pub created_at: String,
}

impl PostRecord {
    /// Derived on read; never stored.
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub community_id: Option<i64>,
    pub post_type: String,
    pub created_at: String,
}

/// A post joined with the names a listing page shows next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListingRecord {
    pub post: PostRecord,
    pub author_username: String,
    pub community_name: Option<String>,
    pub community_display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub created_at: String,
    pub author_username: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub content: String,
    pub user_id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotePolarity {
    Up,
    Down,
}

impl VotePolarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotePolarity::Up => "up",
            VotePolarity::Down => "down",
        }
    }
}

impl fmt::Display for VotePolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotePolarity {
    type Err = BoardError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "up" => Ok(VotePolarity::Up),
            "down" => Ok(VotePolarity::Down),
            other => Err(BoardError::invalid(format!(
                "unknown vote type '{other}', expected 'up' or 'down'"
            ))),
        }
    }
}

impl ToSql for VotePolarity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for VotePolarity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err: BoardError| FromSqlError::Other(Box::new(err)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: i64,
    pub created_at: String,
    pub expires_at: String,
}
