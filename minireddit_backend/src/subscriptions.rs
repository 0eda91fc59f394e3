use crate::database::repositories::{CommunityRepository, SqliteRepositories, SubscriptionRepository};
use crate::database::Database;
use crate::error::{conflict_on_unique, BoardError, BoardResult};
use crate::utils::now_utc_iso;
use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Subscribed,
    Unsubscribed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionOutcome {
    pub community_id: i64,
    pub community_name: String,
    pub state: SubscriptionState,
    pub subscribers_count: i64,
}

/// Inserts the (user, community) row and bumps the cached count. Must run
/// inside a transaction opened by the caller.
pub(crate) fn add_subscription(
    repos: &SqliteRepositories<'_>,
    user_id: i64,
    community_id: i64,
) -> BoardResult<()> {
    repos
        .subscriptions()
        .insert(user_id, community_id, &now_utc_iso())
        .map_err(|err| conflict_on_unique(err, "already subscribed"))?;
    repos.communities().adjust_subscribers(community_id, 1)?;
    Ok(())
}

/// Removes the row if present; the count only moves when a row did.
pub(crate) fn remove_subscription(
    repos: &SqliteRepositories<'_>,
    user_id: i64,
    community_id: i64,
) -> BoardResult<bool> {
    let removed = repos.subscriptions().delete(user_id, community_id)?;
    if removed {
        repos.communities().adjust_subscribers(community_id, -1)?;
    }
    Ok(removed)
}

#[derive(Clone)]
pub struct SubscriptionService {
    database: Database,
}

impl SubscriptionService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Flips the caller's membership in the named community.
    pub fn toggle_subscription(
        &self,
        user_id: i64,
        community_name: &str,
    ) -> BoardResult<SubscriptionOutcome> {
        let outcome = self.database.with_transaction(|repos| {
            let community = repos
                .communities()
                .get_by_name(community_name)?
                .ok_or_else(|| {
                    BoardError::not_found(format!("community '{community_name}' not found"))
                })?;

            let state = if repos.subscriptions().exists(user_id, community.id)? {
                remove_subscription(&repos, user_id, community.id)?;
                SubscriptionState::Unsubscribed
            } else {
                add_subscription(&repos, user_id, community.id)?;
                SubscriptionState::Subscribed
            };

            let refreshed = repos
                .communities()
                .get(community.id)?
                .context("community disappeared while toggling subscription")?;
            Ok::<_, BoardError>(SubscriptionOutcome {
                community_id: refreshed.id,
                community_name: refreshed.name,
                state,
                subscribers_count: refreshed.subscribers_count,
            })
        })?;

        tracing::debug!(
            user_id,
            community = %outcome.community_name,
            state = ?outcome.state,
            subscribers = outcome.subscribers_count,
            "subscription toggled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn toggling_moves_the_cached_count() {
        let fixture = Fixture::new();
        let alice = fixture.user("alice");
        let bob = fixture.user("bob");
        let tech = fixture.community(alice, "tech");
        assert_eq!(fixture.community_record(tech).subscribers_count, 1);

        let service = SubscriptionService::new(fixture.database.clone());
        let joined = service.toggle_subscription(bob, "tech").unwrap();
        assert_eq!(joined.state, SubscriptionState::Subscribed);
        assert_eq!(joined.subscribers_count, 2);
        assert!(fixture.is_subscribed(bob, tech));

        let left = service.toggle_subscription(bob, "tech").unwrap();
        assert_eq!(left.state, SubscriptionState::Unsubscribed);
        assert_eq!(left.subscribers_count, 1);
        assert!(!fixture.is_subscribed(bob, tech));
    }

    #[test]
    fn count_tracks_rows_across_arbitrary_toggles() {
        let fixture = Fixture::new();
        let users: Vec<i64> = ["alice", "bob", "carol", "dave"]
            .iter()
            .map(|name| fixture.user(name))
            .collect();
        let tech = fixture.community(users[0], "tech");
        let service = SubscriptionService::new(fixture.database.clone());

        let sequence = [1, 2, 1, 3, 0, 2, 2, 3, 0, 1, 1];
        for index in sequence {
            service.toggle_subscription(users[index], "tech").unwrap();
            let rows = fixture.count_where("community_subscriptions", "community_id", tech);
            assert_eq!(fixture.community_record(tech).subscribers_count, rows);
        }
    }

    #[test]
    fn unknown_community_is_not_found() {
        let fixture = Fixture::new();
        let alice = fixture.user("alice");
        let service = SubscriptionService::new(fixture.database.clone());
        let err = service.toggle_subscription(alice, "nowhere").unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));
        assert_eq!(fixture.count("community_subscriptions"), 0);
    }

    #[test]
    fn owner_may_leave_their_own_community() {
        let fixture = Fixture::new();
        let alice = fixture.user("alice");
        let tech = fixture.community(alice, "tech");
        let service = SubscriptionService::new(fixture.database.clone());
        let left = service.toggle_subscription(alice, "tech").unwrap();
        assert_eq!(left.state, SubscriptionState::Unsubscribed);
        assert_eq!(fixture.community_record(tech).subscribers_count, 0);
    }
}
