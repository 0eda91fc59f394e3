use crate::database::models::{CommunityRecord, NewCommunity};
use crate::database::repositories::{CommunityRepository, SubscriptionRepository};
use crate::database::Database;
use crate::error::{conflict_on_unique, BoardError, BoardResult};
use crate::subscriptions::add_subscription;
use crate::utils::now_utc_iso;
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const COMMUNITY_NAME_MIN_LEN: usize = 3;
pub const COMMUNITY_NAME_MAX_LEN: usize = 20;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static community name pattern"))
}

/// Trims and checks a proposed community name: 3 to 20 ASCII letters,
/// digits or underscores. Uniqueness is left to the storage constraint.
pub fn validate_community_name(raw: &str) -> BoardResult<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if !(COMMUNITY_NAME_MIN_LEN..=COMMUNITY_NAME_MAX_LEN).contains(&len) {
        return Err(BoardError::invalid(format!(
            "community name must be between {COMMUNITY_NAME_MIN_LEN} and {COMMUNITY_NAME_MAX_LEN} characters"
        )));
    }
    if !name_pattern().is_match(name) {
        return Err(BoardError::invalid(
            "community name may only contain letters, digits and underscores",
        ));
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityView {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: String,
    pub subscribers_count: i64,
    pub is_public: bool,
}

impl CommunityView {
    pub(crate) fn from_record(record: CommunityRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            display_name: record.display_name,
            description: record.description,
            owner_id: record.owner_id,
            created_at: record.created_at,
            subscribers_count: record.subscribers_count,
            is_public: record.is_public,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityDetails {
    pub community: CommunityView,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommunityInput {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[derive(Clone)]
pub struct CommunityService {
    database: Database,
}

impl CommunityService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Creates the community and subscribes its owner in the same
    /// transaction, so a fresh community always starts with one subscriber.
    pub fn create_community(
        &self,
        owner_id: i64,
        input: CreateCommunityInput,
    ) -> BoardResult<CommunityView> {
        let name = validate_community_name(&input.name)?;
        let display_name = input
            .display_name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| name.clone());
        let description = input
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let record = NewCommunity {
            name: name.clone(),
            display_name,
            description,
            owner_id,
            is_public: input.is_public.unwrap_or(true),
            created_at: now_utc_iso(),
        };

        let community = self.database.with_transaction(|repos| {
            let id = repos
                .communities()
                .create(&record)
                .map_err(|err| conflict_on_unique(err, format!("community '{name}' already exists")))?;
            add_subscription(&repos, owner_id, id)?;
            let stored = repos
                .communities()
                .get(id)?
                .context("community creation lost newly inserted record")?;
            Ok::<_, BoardError>(stored)
        })?;

        tracing::info!(
            community_id = community.id,
            name = %community.name,
            owner_id,
            "community created"
        );
        Ok(CommunityView::from_record(community))
    }

    pub fn get_community(&self, name: &str, viewer: Option<i64>) -> BoardResult<CommunityDetails> {
        self.database.with_repositories(|repos| {
            let community = repos
                .communities()
                .get_by_name(name)?
                .ok_or_else(|| BoardError::not_found(format!("community '{name}' not found")))?;
            let is_subscribed = match viewer {
                Some(user_id) => repos.subscriptions().exists(user_id, community.id)?,
                None => false,
            };
            Ok(CommunityDetails {
                community: CommunityView::from_record(community),
                is_subscribed,
            })
        })
    }

    pub fn list_communities(&self, limit: usize) -> BoardResult<Vec<CommunityView>> {
        self.database.with_repositories(|repos| {
            let communities = repos.communities().list_popular(limit)?;
            Ok(communities.into_iter().map(CommunityView::from_record).collect())
        })
    }

    pub fn search_communities(&self, query: &str, limit: usize) -> BoardResult<Vec<CommunityView>> {
        self.database.with_repositories(|repos| {
            let communities = repos.communities().search(query, limit)?;
            Ok(communities.into_iter().map(CommunityView::from_record).collect())
        })
    }

    pub fn subscribed_communities(&self, user_id: i64) -> BoardResult<Vec<CommunityView>> {
        self.database.with_repositories(|repos| {
            let communities = repos.communities().list_for_subscriber(user_id)?;
            Ok(communities.into_iter().map(CommunityView::from_record).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    fn input(name: &str) -> CreateCommunityInput {
        CreateCommunityInput {
            name: name.into(),
            display_name: None,
            description: None,
            is_public: None,
        }
    }

    #[test]
    fn name_length_and_charset_are_enforced() {
        assert!(validate_community_name("ab").is_err());
        assert_eq!(validate_community_name("abc").unwrap(), "abc");
        assert!(validate_community_name("abc!").is_err());
        assert!(validate_community_name("a_very_long_name_that_is_over").is_err());
        assert_eq!(validate_community_name("  rust_lang  ").unwrap(), "rust_lang");
        assert_eq!(
            validate_community_name("x".repeat(20).as_str()).unwrap().len(),
            20
        );
        assert!(validate_community_name(&"x".repeat(21)).is_err());
        assert!(validate_community_name("naïve").is_err());
    }

    #[test]
    fn creator_is_auto_subscribed() {
        let fixture = Fixture::new();
        let alice = fixture.user("alice");
        let service = CommunityService::new(fixture.database.clone());

        let tech = service.create_community(alice, input("tech")).unwrap();
        assert_eq!(tech.subscribers_count, 1);
        assert_eq!(tech.display_name, "tech");
        let details = service.get_community("tech", Some(alice)).unwrap();
        assert!(details.is_subscribed);
        assert_eq!(fixture.count("community_subscriptions"), 1);
    }

    #[test]
    fn duplicate_names_conflict_and_leave_no_partial_rows() {
        let fixture = Fixture::new();
        let alice = fixture.user("alice");
        let bob = fixture.user("bob");
        let service = CommunityService::new(fixture.database.clone());

        service.create_community(alice, input("tech")).unwrap();
        let err = service.create_community(bob, input("tech")).unwrap_err();
        assert!(matches!(err, BoardError::Conflict(_)));
        assert_eq!(fixture.count("communities"), 1);
        assert_eq!(fixture.count("community_subscriptions"), 1);

        // Case-sensitive uniqueness
        service.create_community(bob, input("Tech")).unwrap();
    }

    #[test]
    fn invalid_names_touch_nothing() {
        let fixture = Fixture::new();
        let alice = fixture.user("alice");
        let service = CommunityService::new(fixture.database.clone());
        let err = service.create_community(alice, input("ab")).unwrap_err();
        assert!(matches!(err, BoardError::InvalidArgument(_)));
        assert_eq!(fixture.count("communities"), 0);
    }

    #[test]
    fn search_matches_description_case_insensitively() {
        let fixture = Fixture::new();
        let alice = fixture.user("alice");
        let service = CommunityService::new(fixture.database.clone());
        service
            .create_community(
                alice,
                CreateCommunityInput {
                    name: "rustaceans".into(),
                    display_name: Some("Rustaceans".into()),
                    description: Some("Systems programming fans".into()),
                    is_public: Some(true),
                },
            )
            .unwrap();
        service.create_community(alice, input("cooking")).unwrap();

        let hits = service.search_communities("PROGRAMMING", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "rustaceans");
        assert!(service.search_communities("   ", 10).unwrap().is_empty());
        assert!(matches!(
            service.get_community("missing", None),
            Err(BoardError::NotFound(_))
        ));
    }
}
