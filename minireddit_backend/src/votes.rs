use crate::database::models::VotePolarity;
use crate::database::repositories::{PostRepository, UserRepository, VoteRepository};
use crate::database::Database;
use crate::error::{conflict_on_unique, BoardError, BoardResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// What a (user, post) pair holds in the vote ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    None,
    Up,
    Down,
}

impl From<Option<VotePolarity>> for VoteState {
    fn from(polarity: Option<VotePolarity>) -> Self {
        match polarity {
            None => VoteState::None,
            Some(VotePolarity::Up) => VoteState::Up,
            Some(VotePolarity::Down) => VoteState::Down,
        }
    }
}

/// Ledger change and counter deltas for one `cast_vote` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub next: Option<VotePolarity>,
    pub upvotes_delta: i64,
    pub downvotes_delta: i64,
}

impl VoteTransition {
    /// No vote inserts, the same vote toggles off, the opposite vote flips.
    pub fn plan(existing: Option<VotePolarity>, requested: VotePolarity) -> Self {
        let (up, down) = counter_of(requested);
        match existing {
            None => Self {
                next: Some(requested),
                upvotes_delta: up,
                downvotes_delta: down,
            },
            Some(current) if current == requested => Self {
                next: None,
                upvotes_delta: -up,
                downvotes_delta: -down,
            },
            Some(current) => {
                let (old_up, old_down) = counter_of(current);
                Self {
                    next: Some(requested),
                    upvotes_delta: up - old_up,
                    downvotes_delta: down - old_down,
                }
            }
        }
    }

    pub fn score_delta(&self) -> i64 {
        self.upvotes_delta - self.downvotes_delta
    }
}

fn counter_of(polarity: VotePolarity) -> (i64, i64) {
    match polarity {
        VotePolarity::Up => (1, 0),
        VotePolarity::Down => (0, 1),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub post_id: i64,
    pub state: VoteState,
    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
}

#[derive(Clone)]
pub struct VoteService {
    database: Database,
}

impl VoteService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Parses the raw polarity tag before touching storage, so a malformed
    /// tag never reaches the ledger.
    pub fn cast_vote_tag(&self, user_id: i64, post_id: i64, tag: &str) -> BoardResult<VoteOutcome> {
        let polarity: VotePolarity = tag.parse()?;
        self.cast_vote(user_id, post_id, polarity)
    }

    /// Applies the vote state machine for (user, post). The ledger row, the
    /// post counters and the author's karma change in one transaction.
    pub fn cast_vote(
        &self,
        user_id: i64,
        post_id: i64,
        polarity: VotePolarity,
    ) -> BoardResult<VoteOutcome> {
        let outcome = self.database.with_transaction(|repos| {
            let post = repos
                .posts()
                .get(post_id)?
                .ok_or_else(|| BoardError::not_found(format!("post {post_id} not found")))?;

            let votes = repos.votes();
            let existing = votes.get(user_id, post_id)?;
            let transition = VoteTransition::plan(existing, polarity);
            match (existing, transition.next) {
                (None, Some(next)) => votes
                    .insert(user_id, post_id, next)
                    .map_err(|err| conflict_on_unique(err, "vote already recorded"))?,
                (Some(_), Some(next)) => votes.update(user_id, post_id, next)?,
                (Some(_), None) => {
                    votes.delete(user_id, post_id)?;
                }
                (None, None) => {}
            }

            repos.posts().adjust_vote_counters(
                post_id,
                transition.upvotes_delta,
                transition.downvotes_delta,
            )?;
            repos
                .users()
                .adjust_karma(post.user_id, transition.score_delta())?;

            let updated = repos
                .posts()
                .get(post_id)?
                .context("post disappeared while voting")?;
            Ok::<_, BoardError>(VoteOutcome {
                post_id,
                state: transition.next.into(),
                upvotes: updated.upvotes,
                downvotes: updated.downvotes,
                score: updated.score(),
            })
        })?;

        tracing::debug!(
            user_id,
            post_id,
            requested = %polarity,
            state = ?outcome.state,
            score = outcome.score,
            "vote recorded"
        );
        Ok(outcome)
    }
}
