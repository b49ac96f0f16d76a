//! Ordered curriculum of a career: courses in sequence, each with its visible posts.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::models::{Course, Post, Visibility};

pub const DEFAULT_TOTAL_LEARNING_HOURS: f64 = 120.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CurriculumCourse {
    pub course: Course,
    pub posts: Vec<Post>,
}

/// Read-only after load. Predecessors are positional.
#[derive(Debug, Clone, PartialEq)]
pub struct Curriculum {
    career: String,
    total_learning_hours: f64,
    courses: Vec<CurriculumCourse>,
}

impl Curriculum {
    /// Orders courses and posts by position and drops posts the audience may not see.
    /// Posts referring to a course outside the curriculum are dropped with a warning.
    pub fn new(
        career: impl Into<String>,
        total_learning_hours: f64,
        courses: Vec<Course>,
        posts: Vec<Post>,
        visibility: Visibility,
    ) -> Self {
        let career = career.into();
        let mut courses = courses;
        courses.sort_by_key(|course| course.position);

        let mut by_course: HashMap<Uuid, Vec<Post>> = HashMap::new();
        for post in posts {
            if !visibility.allows(post.status) {
                continue;
            }
            if !courses.iter().any(|course| course.id == post.course_id) {
                warn!(
                    career = %career,
                    post = %post.slug,
                    "post references a course outside the curriculum, ignoring it"
                );
                continue;
            }
            by_course.entry(post.course_id).or_default().push(post);
        }

        let courses = courses
            .into_iter()
            .map(|course| {
                let mut posts = by_course.remove(&course.id).unwrap_or_default();
                posts.sort_by_key(|post| post.position);
                CurriculumCourse { course, posts }
            })
            .collect();

        let total_learning_hours = if total_learning_hours.is_finite() && total_learning_hours > 0.0 {
            total_learning_hours
        } else {
            warn!(
                career = %career,
                total_learning_hours,
                "invalid learning-hours bound, using default"
            );
            DEFAULT_TOTAL_LEARNING_HOURS
        };

        Self {
            career,
            total_learning_hours,
            courses,
        }
    }

    pub fn career(&self) -> &str {
        &self.career
    }

    /// Configured upper bound of the hours axis.
    pub fn total_learning_hours(&self) -> f64 {
        self.total_learning_hours
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn entries(&self) -> &[CurriculumCourse] {
        &self.courses
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.iter().map(|entry| &entry.course)
    }

    pub fn posts_of(&self, course_id: Uuid) -> &[Post] {
        self.courses
            .iter()
            .find(|entry| entry.course.id == course_id)
            .map(|entry| entry.posts.as_slice())
            .unwrap_or(&[])
    }

    /// Every visible post in (course order, post order).
    pub fn all_posts_ordered(&self) -> impl Iterator<Item = &Post> {
        self.courses.iter().flat_map(|entry| entry.posts.iter())
    }

    pub fn index_of(&self, course_id: Uuid) -> Option<usize> {
        self.courses
            .iter()
            .position(|entry| entry.course.id == course_id)
    }

    pub fn course(&self, course_id: Uuid) -> Option<&Course> {
        self.index_of(course_id).map(|index| &self.courses[index].course)
    }

    pub fn course_by_slug(&self, slug: &str) -> Option<&Course> {
        self.courses()
            .find(|course| course.slug == slug)
    }

    pub fn post_by_slug(&self, course_id: Uuid, slug: &str) -> Option<&Post> {
        self.posts_of(course_id).iter().find(|post| post.slug == slug)
    }
}
