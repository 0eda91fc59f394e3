use super::numbered_placeholders;
use crate::database::models::VotePolarity;
use anyhow::Result;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;

pub(super) struct SqliteVoteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::VoteRepository for SqliteVoteRepository<'conn> {
    fn get(&self, user_id: i64, post_id: i64) -> Result<Option<VotePolarity>> {
        Ok(self
            .conn
            .query_row(
                "SELECT vote_type FROM votes WHERE user_id = ?1 AND post_id = ?2",
                params![user_id, post_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn insert(&self, user_id: i64, post_id: i64, polarity: VotePolarity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO votes (user_id, post_id, vote_type) VALUES (?1, ?2, ?3)",
            params![user_id, post_id, polarity],
        )?;
        Ok(())
    }

    fn update(&self, user_id: i64, post_id: i64, polarity: VotePolarity) -> Result<()> {
        self.conn.execute(
            "UPDATE votes SET vote_type = ?3 WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id, polarity],
        )?;
        Ok(())
    }

    fn delete(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM votes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
        )?;
        Ok(removed > 0)
    }

    fn polarities_for(&self, user_id: i64, post_ids: &[i64]) -> Result<HashMap<i64, VotePolarity>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT post_id, vote_type FROM votes WHERE user_id = ?1 AND post_id IN ({})",
            numbered_placeholders(2, post_ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let values = std::iter::once(user_id).chain(post_ids.iter().copied());
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, VotePolarity>(1)?))
        })?;
        let mut votes = HashMap::with_capacity(post_ids.len());
        for row in rows {
            let (post_id, polarity) = row?;
            votes.insert(post_id, polarity);
        }
        Ok(votes)
    }
}
