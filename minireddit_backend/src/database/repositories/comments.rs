use crate::database::models::{CommentRecord, NewComment};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COMMENT_SELECT: &str = r#"
    SELECT cm.id, cm.content, cm.user_id, cm.post_id, cm.parent_id, cm.created_at, u.username
    FROM comments cm
    JOIN users u ON cm.user_id = u.id
"#;

fn map_comment_row(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        user_id: row.get(2)?,
        post_id: row.get(3)?,
        parent_id: row.get(4)?,
        created_at: row.get(5)?,
        author_username: row.get(6)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &NewComment) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO comments (content, user_id, post_id, parent_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.content,
                record.user_id,
                record.post_id,
                record.parent_id,
                record.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<CommentRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("{COMMENT_SELECT} WHERE cm.id = ?1"),
                params![id],
                map_comment_row,
            )
            .optional()?)
    }

    fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            {COMMENT_SELECT}
            WHERE cm.post_id = ?1
            ORDER BY cm.created_at ASC, cm.id ASC
            "#
        ))?;
        let rows = stmt.query_map(params![post_id], map_comment_row)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}
