use crate::database::repositories::{BookmarkRepository, PostRepository};
use crate::database::Database;
use crate::error::{conflict_on_unique, BoardError, BoardResult};
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkState {
    Bookmarked,
    Unbookmarked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkOutcome {
    pub post_id: i64,
    pub state: BookmarkState,
}

#[derive(Clone)]
pub struct BookmarkService {
    database: Database,
}

impl BookmarkService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn toggle_bookmark(&self, user_id: i64, post_id: i64) -> BoardResult<BookmarkOutcome> {
        let state = self.database.with_transaction(|repos| -> BoardResult<BookmarkState> {
            if repos.posts().get(post_id)?.is_none() {
                return Err(BoardError::not_found(format!("post {post_id} not found")));
            }
            let bookmarks = repos.bookmarks();
            if bookmarks.delete(user_id, post_id)? {
                return Ok(BookmarkState::Unbookmarked);
            }
            bookmarks
                .insert(user_id, post_id, &now_utc_iso())
                .map_err(|err| conflict_on_unique(err, "post already bookmarked"))?;
            Ok(BookmarkState::Bookmarked)
        })?;

        tracing::debug!(user_id, post_id, state = ?state, "bookmark toggled");
        Ok(BookmarkOutcome { post_id, state })
    }
}
