use super::numbered_placeholders;
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::HashSet;

pub(super) struct SqliteBookmarkRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::BookmarkRepository for SqliteBookmarkRepository<'conn> {
    fn insert(&self, user_id: i64, post_id: i64, created_at: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO bookmarks (user_id, post_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, post_id, created_at],
        )?;
        Ok(())
    }

    fn delete(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM bookmarks WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
        )?;
        Ok(removed > 0)
    }

    fn bookmarked_among(&self, user_id: i64, post_ids: &[i64]) -> Result<HashSet<i64>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let sql = format!(
            "SELECT post_id FROM bookmarks WHERE user_id = ?1 AND post_id IN ({})",
            numbered_placeholders(2, post_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let values = std::iter::once(user_id).chain(post_ids.iter().copied());
        let saved = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, i64>(0))?
            .collect::<Result<HashSet<i64>, _>>()?;
        Ok(saved)
    }
}
