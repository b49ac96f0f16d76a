use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub position: i32,
    /// Percent of career readiness this course delivers.
    pub contribution: f64,
    /// Learning-hours budget; derived from the contribution share when absent.
    pub hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            _ => None,
        }
    }
}

/// Who is looking at the curriculum. Preview roles also see drafts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Learner,
    Preview,
}

impl Visibility {
    pub fn allows(self, status: PostStatus) -> bool {
        match self {
            Visibility::Learner => status == PostStatus::Published,
            Visibility::Preview => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub slug: String,
    pub course_id: Uuid,
    pub position: i32,
    /// Cosmetic grouping; ordering is by `position` alone.
    pub lesson_id: Option<Uuid>,
    pub status: PostStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProgress {
    pub viewed_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl PostProgress {
    pub fn viewed(&self) -> bool {
        self.viewed_at.is_some()
    }

    /// True when the entry records any interaction at all.
    pub fn touched(&self) -> bool {
        self.viewed() || self.completed
    }

    pub fn apply(&mut self, patch: &ProgressPatch) {
        if let Some(at) = patch.viewed_at {
            self.viewed_at.get_or_insert(at);
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

/// Partial update sent to the store; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressPatch {
    pub viewed_at: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgress {
    pub completed_count: usize,
    pub total_count: usize,
    pub percent: u8,
}

impl CourseProgress {
    pub fn new(completed_count: usize, total_count: usize) -> Self {
        let percent = if total_count == 0 {
            0
        } else {
            (100.0 * completed_count as f64 / total_count as f64).round() as u8
        };
        Self {
            completed_count,
            total_count,
            percent,
        }
    }
}
