use crate::database::models::{NewPost, PostListingRecord, PostRecord};
use crate::utils::like_pattern;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.user_id, p.community_id, p.post_type, p.upvotes, p.downvotes, p.comments_count, p.created_at";

const LISTING_SELECT: &str = r#"
    SELECT p.id, p.title, p.content, p.user_id, p.community_id, p.post_type,
           p.upvotes, p.downvotes, p.comments_count, p.created_at,
           u.username, c.name, c.display_name
    FROM posts p
    JOIN users u ON p.user_id = u.id
    LEFT JOIN communities c ON p.community_id = c.id
"#;

fn map_post_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        user_id: row.get(3)?,
        community_id: row.get(4)?,
        post_type: row.get(5)?,
        upvotes: row.get(6)?,
        downvotes: row.get(7)?,
        comments_count: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_listing_row(row: &Row<'_>) -> rusqlite::Result<PostListingRecord> {
    Ok(PostListingRecord {
        post: map_post_row(row)?,
        author_username: row.get(10)?,
        community_name: row.get(11)?,
        community_display_name: row.get(12)?,
    })
}

impl<'conn> SqlitePostRepository<'conn> {
    fn collect_listing(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PostListingRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map_listing_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &NewPost) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO posts (title, content, user_id, community_id, post_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.title,
                record.content,
                record.user_id,
                record.community_id,
                record.post_type,
                record.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
                params![id],
                map_post_row,
            )
            .optional()?)
    }

    fn get_listing(&self, id: i64) -> Result<Option<PostListingRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("{LISTING_SELECT} WHERE p.id = ?1"),
                params![id],
                map_listing_row,
            )
            .optional()?)
    }

    fn list_newest(&self, community_id: Option<i64>, limit: usize) -> Result<Vec<PostListingRecord>> {
        self.collect_listing(
            &format!(
                r#"
                {LISTING_SELECT}
                WHERE (?1 IS NULL OR p.community_id = ?1)
                ORDER BY p.created_at DESC, p.id DESC
                LIMIT ?2
                "#
            ),
            params![community_id, limit as i64],
        )
    }

    fn list_hot(&self, community_id: Option<i64>, limit: usize) -> Result<Vec<PostListingRecord>> {
        self.collect_listing(
            &format!(
                r#"
                {LISTING_SELECT}
                WHERE (?1 IS NULL OR p.community_id = ?1)
                ORDER BY (p.upvotes - p.downvotes) DESC, p.created_at DESC, p.id DESC
                LIMIT ?2
                "#
            ),
            params![community_id, limit as i64],
        )
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<PostListingRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.collect_listing(
            &format!(
                r#"
                {LISTING_SELECT}
                WHERE fold_case(p.title) LIKE ?1 ESCAPE '\'
                   OR fold_case(p.content) LIKE ?1 ESCAPE '\'
                ORDER BY p.created_at DESC, p.id DESC
                LIMIT ?2
                "#
            ),
            params![like_pattern(&query.to_lowercase()), limit as i64],
        )
    }

    fn list_bookmarked(&self, user_id: i64, limit: usize) -> Result<Vec<PostListingRecord>> {
        self.collect_listing(
            &format!(
                r#"
                {LISTING_SELECT}
                JOIN bookmarks b ON b.post_id = p.id
                WHERE b.user_id = ?1
                ORDER BY b.created_at DESC, b.id DESC
                LIMIT ?2
                "#
            ),
            params![user_id, limit as i64],
        )
    }

    fn adjust_vote_counters(&self, id: i64, upvotes_delta: i64, downvotes_delta: i64) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts
            SET upvotes = upvotes + ?2,
                downvotes = downvotes + ?3
            WHERE id = ?1
            "#,
            params![id, upvotes_delta, downvotes_delta],
        )?;
        Ok(())
    }

    fn increment_comments(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }
}
