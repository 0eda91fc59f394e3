use anyhow::Result;
use rusqlite::{params, Connection};

pub(super) struct SqliteSubscriptionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::SubscriptionRepository for SqliteSubscriptionRepository<'conn> {
    fn exists(&self, user_id: i64, community_id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM community_subscriptions WHERE user_id = ?1 AND community_id = ?2",
            params![user_id, community_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert(&self, user_id: i64, community_id: i64, subscribed_at: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO community_subscriptions (user_id, community_id, subscribed_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![user_id, community_id, subscribed_at],
        )?;
        Ok(())
    }

    fn delete(&self, user_id: i64, community_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM community_subscriptions WHERE user_id = ?1 AND community_id = ?2",
            params![user_id, community_id],
        )?;
        Ok(removed > 0)
    }
}
