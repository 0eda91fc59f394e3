//! Verifies the cached counters against the ledger tables they project.
//!
//! Every counter is maintained in the same transaction as its ledger row,
//! so drift only appears after manual edits or an import from an older
//! schema. `check` reports it; `reconcile` rewrites the counters from the
//! ledgers.

use crate::database::Database;
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

const LIVE_SUBSCRIBERS: &str =
    "(SELECT COUNT(*) FROM community_subscriptions s WHERE s.community_id = c.id)";
const LIVE_UPVOTES: &str =
    "(SELECT COUNT(*) FROM votes v WHERE v.post_id = p.id AND v.vote_type = 'up')";
const LIVE_DOWNVOTES: &str =
    "(SELECT COUNT(*) FROM votes v WHERE v.post_id = p.id AND v.vote_type = 'down')";
const LIVE_COMMENTS: &str = "(SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id)";
const LIVE_KARMA: &str = r#"(
    SELECT COALESCE(SUM(CASE v.vote_type WHEN 'up' THEN 1 ELSE -1 END), 0)
    FROM votes v JOIN posts kp ON v.post_id = kp.id
    WHERE kp.user_id = u.id
)"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterDrift {
    pub table: &'static str,
    pub row_id: i64,
    pub column: &'static str,
    pub cached: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub drifts: Vec<CounterDrift>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty()
    }
}

pub fn check(database: &Database) -> Result<ConsistencyReport> {
    database.with_repositories(|repos| collect_drifts(repos.conn()))
}

/// Rewrites every drifted counter from its ledger in one transaction and
/// returns the number of rows changed.
pub fn reconcile(database: &Database) -> Result<usize> {
    let fixed = database.with_transaction(|repos| {
        let conn = repos.conn();
        let mut fixed = conn
            .execute(
                &format!(
                    "UPDATE communities AS c SET subscribers_count = {LIVE_SUBSCRIBERS} \
                     WHERE subscribers_count != {LIVE_SUBSCRIBERS}"
                ),
                [],
            )
            .context("failed to reconcile subscriber counts")?;
        fixed += conn
            .execute(
                &format!(
                    "UPDATE posts AS p SET upvotes = {LIVE_UPVOTES}, downvotes = {LIVE_DOWNVOTES}, \
                     comments_count = {LIVE_COMMENTS} \
                     WHERE upvotes != {LIVE_UPVOTES} OR downvotes != {LIVE_DOWNVOTES} \
                     OR comments_count != {LIVE_COMMENTS}"
                ),
                [],
            )
            .context("failed to reconcile post counters")?;
        fixed += conn
            .execute(
                &format!("UPDATE users AS u SET karma = {LIVE_KARMA} WHERE karma != {LIVE_KARMA}"),
                [],
            )
            .context("failed to reconcile karma")?;
        Ok::<_, anyhow::Error>(fixed)
    })?;
    if fixed > 0 {
        tracing::warn!(rows = fixed, "reconciled drifted counters");
    }
    Ok(fixed)
}

fn collect_drifts(conn: &Connection) -> Result<ConsistencyReport> {
    let mut report = ConsistencyReport::default();
    let checks: [(&'static str, &'static str, &'static str, &str, &str); 5] = [
        ("communities", "subscribers_count", "c", "c.subscribers_count", LIVE_SUBSCRIBERS),
        ("posts", "upvotes", "p", "p.upvotes", LIVE_UPVOTES),
        ("posts", "downvotes", "p", "p.downvotes", LIVE_DOWNVOTES),
        ("posts", "comments_count", "p", "p.comments_count", LIVE_COMMENTS),
        ("users", "karma", "u", "u.karma", LIVE_KARMA),
    ];
    for (table, column, alias, cached, live) in checks {
        let sql = format!(
            "SELECT id, cached, actual FROM (\
                SELECT {alias}.id AS id, {cached} AS cached, {live} AS actual FROM {table} {alias}\
             ) WHERE cached != actual ORDER BY id"
        );
        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("failed to prepare {table}.{column} check"))?;
        let rows = stmt.query_map([], |row| {
            Ok(CounterDrift {
                table,
                row_id: row.get(0)?,
                column,
                cached: row.get(1)?,
                actual: row.get(2)?,
            })
        })?;
        for row in rows {
            report.drifts.push(row?);
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::VotePolarity;
    use crate::posts::{AddCommentInput, PostService};
    use crate::subscriptions::SubscriptionService;
    use crate::test_support::Fixture;
    use crate::votes::VoteService;

    fn busy_board() -> (Fixture, i64, i64) {
        let fixture = Fixture::new();
        let a = fixture.user("alice");
        let b = fixture.user("bob");
        let c = fixture.user("carol");
        let tech = fixture.community(a, "tech");
        let post = fixture.post(a, Some(tech), "Hello");
        SubscriptionService::new(fixture.database.clone())
            .toggle_subscription(b, "tech")
            .unwrap();
        let votes = VoteService::new(fixture.database.clone());
        votes.cast_vote(b, post, VotePolarity::Up).unwrap();
        votes.cast_vote(c, post, VotePolarity::Down).unwrap();
        votes.cast_vote(c, post, VotePolarity::Up).unwrap();
        PostService::new(fixture.database.clone())
            .add_comment(
                b,
                post,
                AddCommentInput {
                    content: "nice".into(),
                    parent_id: None,
                },
            )
            .unwrap();
        (fixture, tech, post)
    }

    #[test]
    fn service_driven_mutations_stay_consistent() {
        let (fixture, _, _) = busy_board();
        let report = check(&fixture.database).unwrap();
        assert!(report.is_clean(), "unexpected drift: {:?}", report.drifts);
        assert_eq!(reconcile(&fixture.database).unwrap(), 0);
    }

    #[test]
    fn drift_is_reported_and_repaired() {
        let (fixture, tech, post) = busy_board();
        fixture
            .database
            .with_repositories(|repos| {
                repos.conn().execute_batch(&format!(
                    "UPDATE communities SET subscribers_count = 7 WHERE id = {tech};
                     UPDATE posts SET upvotes = 0, comments_count = 5 WHERE id = {post};"
                ))?;
                Ok::<_, anyhow::Error>(())
            })
            .unwrap();

        let report = check(&fixture.database).unwrap();
        let columns: Vec<&str> = report.drifts.iter().map(|d| d.column).collect();
        assert_eq!(columns, vec!["subscribers_count", "upvotes", "comments_count"]);
        assert_eq!(
            report.drifts[0],
            CounterDrift {
                table: "communities",
                row_id: tech,
                column: "subscribers_count",
                cached: 7,
                actual: 2,
            }
        );

        assert_eq!(reconcile(&fixture.database).unwrap(), 2);
        assert!(check(&fixture.database).unwrap().is_clean());
        let repaired = fixture.post_record(post);
        assert_eq!((repaired.upvotes, repaired.downvotes, repaired.comments_count), (2, 0, 1));
    }

    #[test]
    fn karma_drift_is_detected() {
        let (fixture, _, _) = busy_board();
        let alice = fixture.user_record(1);
        assert_eq!(alice.karma, 2);
        fixture
            .database
            .with_repositories(|repos| {
                repos
                    .conn()
                    .execute("UPDATE users SET karma = 0 WHERE id = 1", [])
                    .map_err(anyhow::Error::from)
            })
            .unwrap();
        let report = check(&fixture.database).unwrap();
        assert_eq!(report.drifts.len(), 1);
        assert_eq!(report.drifts[0].column, "karma");
        assert_eq!(reconcile(&fixture.database).unwrap(), 1);
        assert_eq!(fixture.user_record(1).karma, 2);
    }

    #[test]
    fn concurrent_writers_on_a_file_store_never_lose_updates() {
        const WRITERS: usize = 8;
        const ROUNDS: usize = 20;

        let dir = tempfile::tempdir().unwrap();
        let fixture = Fixture::on_disk(&dir.path().join("board.db"));
        let author = fixture.user("author");
        let tech = fixture.community(author, "tech");
        let post = fixture.post(author, Some(tech), "Contested");
        let voters: Vec<i64> = (0..WRITERS)
            .map(|n| fixture.user(&format!("voter{n}")))
            .collect();

        let errors: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = voters
                .iter()
                .enumerate()
                .map(|(n, &voter)| {
                    let database = fixture.database.clone();
                    scope.spawn(move || {
                        let votes = VoteService::new(database.clone());
                        let subscriptions = SubscriptionService::new(database);
                        let mut failed = 0;
                        for round in 0..ROUNDS {
                            let polarity = if (n + round) % 3 == 0 {
                                VotePolarity::Down
                            } else {
                                VotePolarity::Up
                            };
                            if votes.cast_vote(voter, post, polarity).is_err() {
                                failed += 1;
                            }
                            if subscriptions.toggle_subscription(voter, "tech").is_err() {
                                failed += 1;
                            }
                        }
                        failed
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).sum()
        });
        assert_eq!(errors, 0);

        let report = check(&fixture.database).unwrap();
        assert!(report.is_clean(), "unexpected drift: {:?}", report.drifts);
        let stored = fixture.post_record(post);
        assert_eq!((stored.upvotes, stored.downvotes), fixture.vote_tally(post));
        // Every voter toggled an even number of times.
        assert_eq!(fixture.community_record(tech).subscribers_count, 1);
        assert_eq!(fixture.user_record(author).karma, stored.score());
    }
}
