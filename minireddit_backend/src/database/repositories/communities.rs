use crate::database::models::{CommunityRecord, NewCommunity};
use crate::utils::like_pattern;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteCommunityRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COMMUNITY_COLUMNS: &str = "c.id, c.name, c.display_name, c.description, c.owner_id, c.created_at, c.subscribers_count, c.is_public";

fn map_community_row(row: &Row<'_>) -> rusqlite::Result<CommunityRecord> {
    Ok(CommunityRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        description: row.get(3)?,
        owner_id: row.get(4)?,
        created_at: row.get(5)?,
        subscribers_count: row.get(6)?,
        is_public: row.get::<_, i64>(7)? != 0,
    })
}

impl<'conn> SqliteCommunityRepository<'conn> {
    fn collect(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<CommunityRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, map_community_row)?;
        let mut communities = Vec::new();
        for row in rows {
            communities.push(row?);
        }
        Ok(communities)
    }
}

impl<'conn> super::CommunityRepository for SqliteCommunityRepository<'conn> {
    fn create(&self, record: &NewCommunity) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO communities (name, display_name, description, owner_id, created_at, subscribers_count, is_public)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            "#,
            params![
                record.name,
                record.display_name,
                record.description,
                record.owner_id,
                record.created_at,
                if record.is_public { 1 } else { 0 }
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<CommunityRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COMMUNITY_COLUMNS} FROM communities c WHERE c.id = ?1"),
                params![id],
                map_community_row,
            )
            .optional()?)
    }

    fn get_by_name(&self, name: &str) -> Result<Option<CommunityRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COMMUNITY_COLUMNS} FROM communities c WHERE c.name = ?1"),
                params![name],
                map_community_row,
            )
            .optional()?)
    }

    fn list_popular(&self, limit: usize) -> Result<Vec<CommunityRecord>> {
        self.collect(
            &format!(
                r#"
                SELECT {COMMUNITY_COLUMNS}
                FROM communities c
                ORDER BY c.subscribers_count DESC, c.name ASC
                LIMIT ?1
                "#
            ),
            params![limit as i64],
        )
    }

    fn list_for_subscriber(&self, user_id: i64) -> Result<Vec<CommunityRecord>> {
        self.collect(
            &format!(
                r#"
                SELECT {COMMUNITY_COLUMNS}
                FROM communities c
                JOIN community_subscriptions s ON s.community_id = c.id
                WHERE s.user_id = ?1
                ORDER BY c.name ASC
                "#
            ),
            params![user_id],
        )
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<CommunityRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.collect(
            &format!(
                r#"
                SELECT {COMMUNITY_COLUMNS}
                FROM communities c
                WHERE fold_case(c.name) LIKE ?1 ESCAPE '\'
                   OR fold_case(c.display_name) LIKE ?1 ESCAPE '\'
                   OR fold_case(c.description) LIKE ?1 ESCAPE '\'
                ORDER BY c.subscribers_count DESC, c.name ASC
                LIMIT ?2
                "#
            ),
            params![like_pattern(&query.to_lowercase()), limit as i64],
        )
    }

    fn adjust_subscribers(&self, id: i64, delta: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE communities SET subscribers_count = subscribers_count + ?2 WHERE id = ?1",
            params![id, delta],
        )?;
        Ok(())
    }
}
