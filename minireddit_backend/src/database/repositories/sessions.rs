use super::users::{map_user_row, USER_COLUMNS};
use crate::database::models::{SessionRecord, UserRecord};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteSessionRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::SessionRepository for SqliteSessionRepository<'conn> {
    fn create(&self, record: &SessionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.token,
                record.user_id,
                record.created_at,
                record.expires_at
            ],
        )?;
        Ok(())
    }

    fn find_user(&self, token: &str, now: &str) -> Result<Option<UserRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    r#"
                    SELECT {USER_COLUMNS}
                    FROM sessions s
                    JOIN users u ON s.user_id = u.id
                    WHERE s.token = ?1 AND s.expires_at > ?2
                    "#
                ),
                params![token, now],
                map_user_row,
            )
            .optional()?)
    }

    fn delete(&self, token: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(removed > 0)
    }

    fn purge_expired(&self, now: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
        Ok(removed)
    }
}
