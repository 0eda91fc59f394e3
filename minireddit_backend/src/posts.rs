use crate::database::models::{CommentRecord, NewComment, NewPost, VotePolarity};
use crate::database::repositories::{CommentRepository, CommunityRepository, PostRepository};
use crate::database::Database;
use crate::error::{BoardError, BoardResult};
use crate::listings::{annotations_for, PostView};
use crate::utils::now_utc_iso;
use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_POST_TYPE: &str = "text";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub post_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCommentInput {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

impl CommentView {
    fn from_record(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            post_id: record.post_id,
            parent_id: record.parent_id,
            author_id: record.user_id,
            author_username: record.author_username,
            content: record.content,
            created_at: record.created_at,
        }
    }
}

/// Detail page payload: the post, its comments oldest first, and what the
/// viewer has done to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetails {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub user_vote: Option<VotePolarity>,
    pub is_bookmarked: bool,
}

fn required(field: &str, value: &str) -> BoardResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardError::invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct PostService {
    database: Database,
}

impl PostService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn create_post(&self, author_id: i64, input: CreatePostInput) -> BoardResult<PostView> {
        let title = required("title", &input.title)?;
        let content = required("content", &input.content)?;
        let post_type = input
            .post_type
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_POST_TYPE.to_string());
        let community = input
            .community
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let view = self.database.with_transaction(|repos| {
            let community_id = match community.as_deref() {
                Some(name) => Some(
                    repos
                        .communities()
                        .get_by_name(name)?
                        .ok_or_else(|| BoardError::not_found(format!("community '{name}' not found")))?
                        .id,
                ),
                None => None,
            };
            let id = repos.posts().create(&NewPost {
                title,
                content,
                user_id: author_id,
                community_id,
                post_type,
                created_at: now_utc_iso(),
            })?;
            let listing = repos
                .posts()
                .get_listing(id)?
                .context("post creation lost newly inserted record")?;
            Ok::<_, BoardError>(PostView::from_listing(listing))
        })?;

        tracing::info!(
            post_id = view.id,
            author_id,
            community = ?view.community_name,
            "post created"
        );
        Ok(view)
    }

    pub fn get_post(&self, post_id: i64, viewer: Option<i64>) -> BoardResult<PostDetails> {
        self.database.with_repositories(|repos| {
            let listing = repos
                .posts()
                .get_listing(post_id)?
                .ok_or_else(|| BoardError::not_found(format!("post {post_id} not found")))?;
            let comments = repos
                .comments()
                .list_for_post(post_id)?
                .into_iter()
                .map(CommentView::from_record)
                .collect();
            let annotations = annotations_for(&repos, viewer, &[post_id])?;
            Ok(PostDetails {
                post: PostView::from_listing(listing),
                comments,
                user_vote: annotations.user_votes.get(&post_id).copied(),
                is_bookmarked: annotations.user_bookmarks.contains(&post_id),
            })
        })
    }

    /// Inserts the comment and bumps the post's `comments_count` together.
    pub fn add_comment(
        &self,
        author_id: i64,
        post_id: i64,
        input: AddCommentInput,
    ) -> BoardResult<CommentView> {
        let content = required("content", &input.content)?;

        let comment = self.database.with_transaction(|repos| -> BoardResult<CommentView> {
            if repos.posts().get(post_id)?.is_none() {
                return Err(BoardError::not_found(format!("post {post_id} not found")));
            }
            if let Some(parent_id) = input.parent_id {
                let parent = repos.comments().get(parent_id)?.ok_or_else(|| {
                    BoardError::not_found(format!("comment {parent_id} not found"))
                })?;
                if parent.post_id != post_id {
                    return Err(BoardError::invalid(format!(
                        "comment {parent_id} belongs to a different post"
                    )));
                }
            }
            let id = repos.comments().create(&NewComment {
                content,
                user_id: author_id,
                post_id,
                parent_id: input.parent_id,
                created_at: now_utc_iso(),
            })?;
            repos.posts().increment_comments(post_id)?;
            let stored = repos
                .comments()
                .get(id)?
                .context("comment creation lost newly inserted record")?;
            Ok(CommentView::from_record(stored))
        })?;

        tracing::info!(comment_id = comment.id, post_id, author_id, "comment added");
        Ok(comment)
    }
}
