use crate::accounts::{AccountService, RegisterInput};
use crate::communities::{CommunityService, CreateCommunityInput};
use crate::config::SessionConfig;
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::error::{BoardError, BoardResult};
use crate::posts::{AddCommentInput, CreatePostInput, PostService};
use serde::Serialize;

pub const DEMO_USERNAME: &str = "testuser";
pub const DEMO_EMAIL: &str = "test@example.com";
pub const DEMO_PASSWORD: &str = "test123";
pub const DEMO_COMMUNITY: &str = "testcommunity";

#[derive(Debug, Clone, Serialize)]
pub struct SeedSummary {
    pub user_id: i64,
    pub community_id: i64,
    pub post_id: i64,
    pub comment_id: i64,
}

/// Creates a demo account, community, post and comment through the
/// regular services. Does nothing once any user exists.
pub fn seed_demo_data(database: &Database) -> BoardResult<Option<SeedSummary>> {
    let users = database.with_repositories(|repos| Ok::<_, BoardError>(repos.users().count()?))?;
    if users > 0 {
        tracing::info!(users, "store already has users, skipping demo data");
        return Ok(None);
    }

    let user = AccountService::new(database.clone(), SessionConfig::default()).register(
        RegisterInput {
            username: DEMO_USERNAME.into(),
            email: DEMO_EMAIL.into(),
            password: DEMO_PASSWORD.into(),
        },
    )?;
    let community = CommunityService::new(database.clone()).create_community(
        user.id,
        CreateCommunityInput {
            name: DEMO_COMMUNITY.into(),
            display_name: Some("Test Community".into()),
            description: Some("A community for trying things out".into()),
            is_public: Some(true),
        },
    )?;
    let posts = PostService::new(database.clone());
    let post = posts.create_post(
        user.id,
        CreatePostInput {
            title: "Welcome to the board".into(),
            content: "This is the first post. Vote, comment and bookmark to try it out.".into(),
            community: Some(community.name.clone()),
            post_type: None,
        },
    )?;
    let comment = posts.add_comment(
        user.id,
        post.id,
        AddCommentInput {
            content: "First comment!".into(),
            parent_id: None,
        },
    )?;

    tracing::info!(
        user_id = user.id,
        community = %community.name,
        post_id = post.id,
        "demo data created"
    );
    Ok(Some(SeedSummary {
        user_id: user.id,
        community_id: community.id,
        post_id: post.id,
        comment_id: comment.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::LoginInput;
    use crate::consistency;
    use crate::test_support::Fixture;

    #[test]
    fn seeding_is_consistent_and_runs_once() {
        let fixture = Fixture::new();
        let summary = seed_demo_data(&fixture.database).unwrap().unwrap();

        assert_eq!(fixture.community_record(summary.community_id).subscribers_count, 1);
        assert_eq!(fixture.post_record(summary.post_id).comments_count, 1);
        assert!(consistency::check(&fixture.database).unwrap().is_clean());

        AccountService::new(fixture.database.clone(), SessionConfig::default())
            .login(LoginInput {
                username: DEMO_USERNAME.into(),
                password: DEMO_PASSWORD.into(),
            })
            .unwrap();

        assert!(seed_demo_data(&fixture.database).unwrap().is_none());
        assert_eq!(fixture.count("posts"), 1);
    }
}
