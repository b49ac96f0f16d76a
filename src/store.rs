//! Contract with the persistent store that backs curricula and learner progress.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Course, Post, PostProgress, ProgressPatch, Visibility};

#[async_trait]
pub trait CareerStore: Send + Sync {
    /// Courses of a career in curriculum order, with contribution and hours.
    async fn list_courses_for_career(&self, career: &str) -> Result<Vec<Course>>;

    /// Posts of a course in post order, filtered to what `visibility` may see.
    async fn list_posts(&self, course_id: Uuid, visibility: Visibility) -> Result<Vec<Post>>;

    async fn list_published_posts(&self, course_id: Uuid) -> Result<Vec<Post>> {
        self.list_posts(course_id, Visibility::Learner).await
    }

    async fn read_progress(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<HashMap<Uuid, PostProgress>>;

    /// Applies `patch` and echoes the stored entry.
    async fn write_progress(
        &self,
        learner_id: Uuid,
        post_id: Uuid,
        patch: ProgressPatch,
    ) -> Result<PostProgress>;

    /// Clears every progress entry of the learner for the course.
    async fn reset_course_progress(&self, learner_id: Uuid, course_id: Uuid) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    courses: HashMap<String, Vec<Course>>,
    posts: Vec<Post>,
    progress: HashMap<(Uuid, Uuid), PostProgress>,
    resets: Vec<(Uuid, Uuid, usize)>,
}

/// In-process store used by tests and offline runs. Failures can be injected.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_curriculum(career: &str, courses: Vec<Course>, posts: Vec<Post>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            state.courses.insert(career.to_string(), courses);
            state.posts = posts;
        }
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored_progress(&self, learner_id: Uuid, post_id: Uuid) -> Option<PostProgress> {
        self.lock().progress.get(&(learner_id, post_id)).copied()
    }

    /// (learner, course, completed count) for each reset, oldest first.
    pub fn reset_history(&self) -> Vec<(Uuid, Uuid, usize)> {
        self.lock().resets.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(format!("{operation} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl CareerStore for MemoryStore {
    async fn list_courses_for_career(&self, career: &str) -> Result<Vec<Course>> {
        self.check(&self.fail_reads, "list_courses_for_career")?;
        let mut courses = self.lock().courses.get(career).cloned().unwrap_or_default();
        courses.sort_by_key(|course| course.position);
        Ok(courses)
    }

    async fn list_posts(&self, course_id: Uuid, visibility: Visibility) -> Result<Vec<Post>> {
        self.check(&self.fail_reads, "list_posts")?;
        let mut posts: Vec<Post> = self
            .lock()
            .posts
            .iter()
            .filter(|post| post.course_id == course_id && visibility.allows(post.status))
            .cloned()
            .collect();
        posts.sort_by_key(|post| post.position);
        Ok(posts)
    }

    async fn read_progress(
        &self,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<HashMap<Uuid, PostProgress>> {
        self.check(&self.fail_reads, "read_progress")?;
        let state = self.lock();
        let entries = state
            .posts
            .iter()
            .filter(|post| post.course_id == course_id)
            .filter_map(|post| {
                state
                    .progress
                    .get(&(learner_id, post.id))
                    .map(|entry| (post.id, *entry))
            })
            .collect();
        Ok(entries)
    }

    async fn write_progress(
        &self,
        learner_id: Uuid,
        post_id: Uuid,
        patch: ProgressPatch,
    ) -> Result<PostProgress> {
        self.check(&self.fail_writes, "write_progress")?;
        let mut state = self.lock();
        let entry = state.progress.entry((learner_id, post_id)).or_default();
        entry.apply(&patch);
        Ok(*entry)
    }

    async fn reset_course_progress(&self, learner_id: Uuid, course_id: Uuid) -> Result<()> {
        self.check(&self.fail_writes, "reset_course_progress")?;
        let mut state = self.lock();
        let post_ids: Vec<Uuid> = state
            .posts
            .iter()
            .filter(|post| post.course_id == course_id)
            .map(|post| post.id)
            .collect();
        let mut completed = 0;
        for post_id in post_ids {
            if let Some(entry) = state.progress.remove(&(learner_id, post_id)) {
                if entry.completed {
                    completed += 1;
                }
            }
        }
        state.resets.push((learner_id, course_id, completed));
        Ok(())
    }
}
