//! Per-(learner, course) progress cache with optimistic writes against the store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::curriculum::Curriculum;
use crate::error::{Error, Result};
use crate::models::{CourseProgress, Post, PostProgress, PostStatus, ProgressPatch};
use crate::store::CareerStore;

/// Aggregate view of one course derived from post entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseStatus {
    /// Completed published posts.
    pub completed_count: usize,
    /// Published posts.
    pub total_count: usize,
    /// Any visible post viewed or completed.
    pub touched: bool,
}

impl CourseStatus {
    pub fn from_posts(posts: &[Post], entry: impl Fn(Uuid) -> PostProgress) -> Self {
        let mut status = CourseStatus::default();
        for post in posts {
            let progress = entry(post.id);
            status.touched |= progress.touched();
            if post.status != PostStatus::Published {
                continue;
            }
            status.total_count += 1;
            if progress.completed {
                status.completed_count += 1;
            }
        }
        status
    }

    /// Every published post completed. A course without posts never completes on its own.
    pub fn completed(&self) -> bool {
        self.total_count > 0 && self.completed_count == self.total_count
    }

    /// Within-course progress fraction in [0, 1], full precision.
    pub fn fraction(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.completed_count as f64 / self.total_count as f64
        }
    }

    /// Fraction rounded half-up to two decimals, for display only.
    pub fn display_fraction(&self) -> f64 {
        (self.fraction() * 100.0).round() / 100.0
    }

    pub fn progress(&self) -> CourseProgress {
        CourseProgress::new(self.completed_count, self.total_count)
    }
}

/// Point-in-time copy of a learner's entries across the curriculum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    entries: HashMap<Uuid, PostProgress>,
}

impl ProgressSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, post_id: Uuid, entry: PostProgress) {
        self.entries.insert(post_id, entry);
    }

    pub fn get(&self, post_id: Uuid) -> PostProgress {
        self.entries.get(&post_id).copied().unwrap_or_default()
    }

    pub fn course_status(&self, posts: &[Post]) -> CourseStatus {
        CourseStatus::from_posts(posts, |post_id| self.get(post_id))
    }

    /// Status of every course in curriculum order.
    pub fn course_statuses(&self, curriculum: &Curriculum) -> Vec<CourseStatus> {
        curriculum
            .entries()
            .iter()
            .map(|entry| self.course_status(&entry.posts))
            .collect()
    }
}

impl FromIterator<(Uuid, PostProgress)> for ProgressSnapshot {
    fn from_iter<I: IntoIterator<Item = (Uuid, PostProgress)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Progress of one learner in one course. Writes are applied optimistically and
/// rolled back when the store rejects them.
pub struct ProgressStore {
    store: Arc<dyn CareerStore>,
    learner_id: Uuid,
    course_id: Uuid,
    posts: Vec<Post>,
    entries: HashMap<Uuid, PostProgress>,
}

impl ProgressStore {
    pub fn new(
        store: Arc<dyn CareerStore>,
        learner_id: Uuid,
        course_id: Uuid,
        posts: Vec<Post>,
    ) -> Self {
        Self {
            store,
            learner_id,
            course_id,
            posts,
            entries: HashMap::new(),
        }
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    /// Replaces the cache with the store's view. On failure the cache is left empty.
    pub async fn load(&mut self) -> Result<()> {
        match self.store.read_progress(self.learner_id, self.course_id).await {
            Ok(entries) => {
                self.entries = entries;
                Ok(())
            }
            Err(err) => {
                self.entries.clear();
                Err(err)
            }
        }
    }

    pub async fn mark_viewed(&mut self, post_id: Uuid) -> Result<()> {
        self.mark_viewed_at(post_id, Utc::now()).await
    }

    /// Idempotent: a post already viewed keeps its first timestamp and no write is issued.
    pub async fn mark_viewed_at(&mut self, post_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.ensure_post(post_id)?;
        if self.entry(post_id).viewed() {
            return Ok(());
        }
        self.write(
            post_id,
            ProgressPatch {
                viewed_at: Some(at),
                completed: None,
            },
        )
        .await
    }

    /// Sets the completed flag. The viewed timestamp is never touched.
    pub async fn mark_completed(&mut self, post_id: Uuid, value: bool) -> Result<()> {
        self.ensure_post(post_id)?;
        self.write(
            post_id,
            ProgressPatch {
                viewed_at: None,
                completed: Some(value),
            },
        )
        .await
    }

    pub fn is_completed(&self, post_id: Uuid) -> bool {
        self.entry(post_id).completed
    }

    pub fn entry(&self, post_id: Uuid) -> PostProgress {
        self.entries.get(&post_id).copied().unwrap_or_default()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Uuid, PostProgress)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, *entry))
    }

    pub fn status(&self) -> CourseStatus {
        CourseStatus::from_posts(&self.posts, |post_id| self.entry(post_id))
    }

    /// Completion aggregate over published posts.
    pub fn course_progress(&self) -> CourseProgress {
        self.status().progress()
    }

    /// First published post, in order, that is not completed.
    pub fn next_uncompleted(&self) -> Option<&Post> {
        self.posts
            .iter()
            .filter(|post| post.status == PostStatus::Published)
            .find(|post| !self.is_completed(post.id))
    }

    /// Clears every entry of the course; restored if the store rejects the reset.
    pub async fn reset_course(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.entries);
        if let Err(err) = self
            .store
            .reset_course_progress(self.learner_id, self.course_id)
            .await
        {
            warn!(
                learner = %self.learner_id,
                course = %self.course_id,
                error = %err,
                "course reset rejected, restoring progress"
            );
            self.entries = previous;
            return Err(err);
        }
        Ok(())
    }

    fn ensure_post(&self, post_id: Uuid) -> Result<()> {
        if self.posts.iter().any(|post| post.id == post_id) {
            Ok(())
        } else {
            Err(Error::UnknownPost(post_id.to_string()))
        }
    }

    async fn write(&mut self, post_id: Uuid, patch: ProgressPatch) -> Result<()> {
        let previous = self.entries.get(&post_id).copied();
        let mut optimistic = previous.unwrap_or_default();
        optimistic.apply(&patch);
        self.entries.insert(post_id, optimistic);

        match self
            .store
            .write_progress(self.learner_id, post_id, patch)
            .await
        {
            Ok(echo) => {
                if echo != optimistic {
                    debug!(
                        post = %post_id,
                        "store echo differs from optimistic entry, adopting store value"
                    );
                }
                self.entries.insert(post_id, echo);
                Ok(())
            }
            Err(err) => {
                warn!(
                    learner = %self.learner_id,
                    post = %post_id,
                    error = %err,
                    "progress write rejected, rolling back"
                );
                match previous {
                    Some(entry) => self.entries.insert(post_id, entry),
                    None => self.entries.remove(&post_id),
                };
                Err(err)
            }
        }
    }
}
