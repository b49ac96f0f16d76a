//! Projection of a learner's progress onto the career trajectory.
//!
//! Each course occupies a segment of the learning-hours axis. The first 80% of the
//! segment is the learning phase, where readiness climbs by the course contribution;
//! the remaining 20% is the validation phase, where readiness stays flat. The
//! projection is a pure function of the curriculum and a progress snapshot.

use serde::Serialize;
use uuid::Uuid;

use crate::curriculum::Curriculum;
use crate::lifecycle::{self, Phase};
use crate::progress::{CourseStatus, ProgressSnapshot};

/// Share of a course's hours (and progress fraction) spent in the learning phase.
pub const LEARNING_SHARE: f64 = 0.8;

pub const MAX_READINESS: f64 = 100.0;

const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub hours: f64,
    pub readiness: f64,
}

impl Point {
    pub const ORIGIN: Point = Point {
        hours: 0.0,
        readiness: 0.0,
    };

    pub fn new(hours: f64, readiness: f64) -> Self {
        Self { hours, readiness }
    }

    /// Hours expressed as a percent of the axis; readiness is already a percent.
    pub fn as_percent(self, total_hours: f64) -> Point {
        let hours = if total_hours > 0.0 {
            self.hours / total_hours * 100.0
        } else {
            0.0
        };
        Point::new(hours, self.readiness)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Declared,
    EqualFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CurriculumIssue {
    /// Declared weights were malformed; every course got `100 / n`.
    WeightsFallback { declared_sum: f64 },
    /// Hours were present but not positive; derived from the contribution instead.
    InvalidHours { course_id: Uuid },
    /// Course hours exceed the configured axis bound; the axis was widened.
    HoursExceedBound { sum: f64, bound: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedWeight {
    pub contribution: f64,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWeights {
    pub weights: Vec<ResolvedWeight>,
    pub source: WeightSource,
    pub total_hours: f64,
    pub issues: Vec<CurriculumIssue>,
}

/// Contribution and hours per course, with the equal-weight fallback applied.
pub fn resolve_weights(curriculum: &Curriculum) -> ResolvedWeights {
    let declared: Vec<f64> = curriculum.courses().map(|c| c.contribution).collect();
    let declared_sum: f64 = declared.iter().sum();
    let well_formed = declared
        .iter()
        .all(|w| w.is_finite() && *w > 0.0 && *w <= MAX_READINESS)
        && (declared_sum - MAX_READINESS).abs() <= WEIGHT_TOLERANCE;

    let mut issues = Vec::new();
    let (contributions, source) = if well_formed || declared.is_empty() {
        (declared, WeightSource::Declared)
    } else {
        issues.push(CurriculumIssue::WeightsFallback { declared_sum });
        let equal = MAX_READINESS / declared.len() as f64;
        (vec![equal; declared.len()], WeightSource::EqualFallback)
    };

    let bound = curriculum.total_learning_hours();
    let weights: Vec<ResolvedWeight> = curriculum
        .courses()
        .zip(contributions)
        .map(|(course, contribution)| {
            let hours = match course.hours {
                Some(h) if h.is_finite() && h > 0.0 => h,
                Some(_) => {
                    issues.push(CurriculumIssue::InvalidHours {
                        course_id: course.id,
                    });
                    bound * contribution / MAX_READINESS
                }
                None => bound * contribution / MAX_READINESS,
            };
            ResolvedWeight { contribution, hours }
        })
        .collect();

    let sum: f64 = weights.iter().map(|w| w.hours).sum();
    let total_hours = if sum > bound + WEIGHT_TOLERANCE {
        issues.push(CurriculumIssue::HoursExceedBound { sum, bound });
        sum
    } else {
        bound
    };

    ResolvedWeights {
        weights,
        source,
        total_hours,
        issues,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSegment {
    pub course_id: Uuid,
    pub index: usize,
    pub contribution: f64,
    pub hours: f64,
    pub start_hours: f64,
    pub start_readiness: f64,
    pub learning_end_hours: f64,
    pub learning_end_readiness: f64,
    pub validation_end_hours: f64,
    pub validation_end_readiness: f64,
    pub current_hours: f64,
    pub current_readiness: f64,
    /// Within-course progress fraction, full precision.
    pub fraction: f64,
    pub completed: bool,
    pub completed_count: usize,
    pub total_count: usize,
    pub touched: bool,
}

impl CourseSegment {
    fn build(
        course_id: Uuid,
        index: usize,
        weight: ResolvedWeight,
        start: Point,
        status: &CourseStatus,
    ) -> Self {
        let learning_hours = weight.hours * LEARNING_SHARE;
        let learning_end_hours = start.hours + learning_hours;
        let learning_end_readiness = (start.readiness + weight.contribution).min(MAX_READINESS);
        let validation_end_hours = start.hours + weight.hours;
        let completed = status.completed();
        let p = status.fraction();

        let (current_hours, current_readiness) = if completed {
            (validation_end_hours, learning_end_readiness)
        } else if p <= LEARNING_SHARE {
            let climb = p / LEARNING_SHARE;
            (
                start.hours + learning_hours * climb,
                (start.readiness + weight.contribution * climb).min(learning_end_readiness),
            )
        } else {
            let validation_hours = weight.hours - learning_hours;
            let advance = (p - LEARNING_SHARE) / (1.0 - LEARNING_SHARE);
            (
                learning_end_hours + validation_hours * advance,
                learning_end_readiness,
            )
        };

        Self {
            course_id,
            index,
            contribution: weight.contribution,
            hours: weight.hours,
            start_hours: start.hours,
            start_readiness: start.readiness,
            learning_end_hours,
            learning_end_readiness,
            validation_end_hours,
            validation_end_readiness: learning_end_readiness,
            current_hours,
            current_readiness,
            fraction: p,
            completed,
            completed_count: status.completed_count,
            total_count: status.total_count,
            touched: status.touched,
        }
    }

    pub fn learning_hours(&self) -> f64 {
        self.learning_end_hours - self.start_hours
    }

    pub fn start(&self) -> Point {
        Point::new(self.start_hours, self.start_readiness)
    }

    pub fn learning_end(&self) -> Point {
        Point::new(self.learning_end_hours, self.learning_end_readiness)
    }

    pub fn validation_end(&self) -> Point {
        Point::new(self.validation_end_hours, self.validation_end_readiness)
    }

    pub fn current(&self) -> Point {
        Point::new(self.current_hours, self.current_readiness)
    }

    /// Phase of the learner's cursor inside this segment.
    pub fn cursor_phase(&self) -> Phase {
        if !self.completed && self.fraction <= LEARNING_SHARE {
            Phase::Learning
        } else {
            Phase::Validation
        }
    }

    pub fn contains(&self, hours: f64) -> bool {
        hours >= self.start_hours && hours <= self.validation_end_hours
    }

    pub fn phase_at(&self, hours: f64) -> Phase {
        if hours <= self.learning_end_hours {
            Phase::Learning
        } else {
            Phase::Validation
        }
    }

    /// Readiness of the trajectory line at `hours` inside this segment.
    pub fn readiness_at(&self, hours: f64) -> f64 {
        match self.phase_at(hours) {
            Phase::Learning => {
                let learning_hours = self.learning_hours();
                if learning_hours <= 0.0 {
                    return self.start_readiness;
                }
                let climb = (hours - self.start_hours) / learning_hours;
                (self.start_readiness + self.contribution * climb).min(self.learning_end_readiness)
            }
            Phase::Validation => self.learning_end_readiness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub segments: Vec<CourseSegment>,
    pub cursor: Point,
    /// Segment holding the cursor: the last course with any progress.
    pub cursor_index: Option<usize>,
    pub active_index: Option<usize>,
    /// Length of the hours axis.
    pub total_hours: f64,
    pub weight_source: WeightSource,
    pub complete_path: Vec<Point>,
    pub progress_path: Vec<Point>,
    pub future_path: Vec<Point>,
    #[serde(skip)]
    pub issues: Vec<CurriculumIssue>,
}

impl Trajectory {
    pub fn segment_at(&self, hours: f64) -> Option<&CourseSegment> {
        self.segments.iter().find(|segment| segment.contains(hours))
    }

    pub fn segment_of(&self, course_id: Uuid) -> Option<&CourseSegment> {
        self.segments.iter().find(|s| s.course_id == course_id)
    }
}

pub fn project(curriculum: &Curriculum, snapshot: &ProgressSnapshot) -> Trajectory {
    project_statuses(curriculum, &snapshot.course_statuses(curriculum))
}

/// Projection from per-course statuses already derived for `curriculum`.
pub fn project_statuses(curriculum: &Curriculum, statuses: &[CourseStatus]) -> Trajectory {
    let resolved = resolve_weights(curriculum);

    let mut cumulative = Point::ORIGIN;
    let mut segments = Vec::with_capacity(curriculum.len());
    for (index, ((course, weight), status)) in curriculum
        .courses()
        .zip(&resolved.weights)
        .zip(statuses)
        .enumerate()
    {
        let segment = CourseSegment::build(course.id, index, *weight, cumulative, status);
        cumulative = segment.validation_end();
        segments.push(segment);
    }

    let cursor_index = segments.iter().rposition(|s| s.touched || s.completed);
    let cursor = cursor_index
        .map(|index| segments[index].current())
        .unwrap_or(Point::ORIGIN);

    let complete_path = complete_path(&segments);
    let (progress_path, future_path) = match cursor_index {
        Some(index) => split_paths(&segments, index),
        None => (vec![Point::ORIGIN], complete_path.clone()),
    };

    Trajectory {
        active_index: lifecycle::active_index(statuses),
        segments,
        cursor,
        cursor_index,
        total_hours: resolved.total_hours,
        weight_source: resolved.source,
        complete_path,
        progress_path,
        future_path,
        issues: resolved.issues,
    }
}

fn push_point(path: &mut Vec<Point>, point: Point) {
    if path.last() != Some(&point) {
        path.push(point);
    }
}

fn complete_path(segments: &[CourseSegment]) -> Vec<Point> {
    let mut path = vec![Point::ORIGIN];
    for segment in segments {
        push_point(&mut path, segment.learning_end());
        push_point(&mut path, segment.validation_end());
    }
    path
}

fn split_paths(segments: &[CourseSegment], cursor_index: usize) -> (Vec<Point>, Vec<Point>) {
    let mut progress = vec![Point::ORIGIN];
    for segment in &segments[..cursor_index] {
        push_point(&mut progress, segment.learning_end());
        push_point(&mut progress, segment.validation_end());
    }

    let current = &segments[cursor_index];
    let cursor = current.current();
    let phase = current.cursor_phase();
    if phase == Phase::Validation {
        push_point(&mut progress, current.learning_end());
    }
    push_point(&mut progress, cursor);

    let mut future = vec![cursor];
    if phase == Phase::Learning {
        push_point(&mut future, current.learning_end());
    }
    push_point(&mut future, current.validation_end());
    for segment in &segments[cursor_index + 1..] {
        push_point(&mut future, segment.learning_end());
        push_point(&mut future, segment.validation_end());
    }

    (progress, future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::fixtures::{course, posts, two_course};
    use crate::models::{PostProgress, Visibility};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn complete(snapshot: &mut ProgressSnapshot, curriculum: &Curriculum, index: usize, count: usize) {
        let course_id = curriculum.entries()[index].course.id;
        for post in curriculum.posts_of(course_id).iter().take(count) {
            snapshot.insert(
                post.id,
                PostProgress {
                    viewed_at: None,
                    completed: true,
                },
            );
        }
    }

    #[test]
    fn nothing_done_sits_at_origin() {
        let curriculum = two_course();
        let trajectory = project(&curriculum, &ProgressSnapshot::new());

        assert_eq!(trajectory.cursor, Point::ORIGIN);
        assert_eq!(trajectory.progress_path, vec![Point::ORIGIN]);
        assert_eq!(trajectory.future_path, trajectory.complete_path);
        assert_eq!(trajectory.active_index, Some(0));
        assert_eq!(
            trajectory.complete_path,
            vec![
                Point::ORIGIN,
                Point::new(48.0, 50.0),
                Point::new(60.0, 50.0),
                Point::new(108.0, 100.0),
                Point::new(120.0, 100.0),
            ]
        );
    }

    #[test]
    fn completed_first_course_kinks_at_learning_end() {
        let curriculum = two_course();
        let mut snapshot = ProgressSnapshot::new();
        complete(&mut snapshot, &curriculum, 0, 10);
        let trajectory = project(&curriculum, &snapshot);

        assert_eq!(trajectory.cursor, Point::new(60.0, 50.0));
        assert_eq!(
            trajectory.progress_path,
            vec![Point::ORIGIN, Point::new(48.0, 50.0), Point::new(60.0, 50.0)]
        );
        assert_eq!(trajectory.active_index, Some(1));
        assert_eq!(trajectory.future_path.first(), Some(&Point::new(60.0, 50.0)));
        assert_eq!(trajectory.future_path.last(), Some(&Point::new(120.0, 100.0)));
    }

    #[test]
    fn learning_phase_cursor_climbs_linearly() {
        let curriculum = two_course();
        let mut snapshot = ProgressSnapshot::new();
        complete(&mut snapshot, &curriculum, 0, 4);
        let trajectory = project(&curriculum, &snapshot);

        assert_eq!(trajectory.cursor, Point::new(24.0, 25.0));
        assert_eq!(trajectory.segments[0].cursor_phase(), Phase::Learning);
        assert_eq!(trajectory.progress_path, vec![Point::ORIGIN, Point::new(24.0, 25.0)]);
        assert_eq!(
            trajectory.future_path[..3],
            [Point::new(24.0, 25.0), Point::new(48.0, 50.0), Point::new(60.0, 50.0)]
        );
    }

    #[test]
    fn validation_phase_cursor_moves_flat() {
        let curriculum = two_course();
        let mut snapshot = ProgressSnapshot::new();
        complete(&mut snapshot, &curriculum, 0, 9);
        let trajectory = project(&curriculum, &snapshot);

        assert!(close(trajectory.cursor.hours, 54.0));
        assert_eq!(trajectory.cursor.readiness, 50.0);
        assert_eq!(trajectory.progress_path.len(), 3);
        assert_eq!(trajectory.progress_path[1], Point::new(48.0, 50.0));
    }

    #[test]
    fn empty_curriculum_projects_origin() {
        let curriculum = Curriculum::new("x", 120.0, Vec::new(), Vec::new(), Visibility::Learner);
        let trajectory = project(&curriculum, &ProgressSnapshot::new());

        assert!(trajectory.segments.is_empty());
        assert_eq!(trajectory.cursor, Point::ORIGIN);
        assert_eq!(trajectory.complete_path, vec![Point::ORIGIN]);
        assert_eq!(trajectory.active_index, None);
        assert_eq!(trajectory.weight_source, WeightSource::Declared);
    }

    #[test]
    fn malformed_weights_fall_back_to_equal_shares() {
        let a = course("A", 1, 70.0, None);
        let b = course("B", 2, 70.0, None);
        let c = course("C", 3, 70.0, None);
        let curriculum = Curriculum::new("x", 120.0, vec![a, b, c], Vec::new(), Visibility::Learner);
        let resolved = resolve_weights(&curriculum);

        assert_eq!(resolved.source, WeightSource::EqualFallback);
        assert!(resolved.weights.iter().all(|w| close(w.contribution, 100.0 / 3.0)));
        assert!(resolved.weights.iter().all(|w| close(w.hours, 40.0)));
        assert!(matches!(
            resolved.issues[0],
            CurriculumIssue::WeightsFallback { declared_sum } if close(declared_sum, 210.0)
        ));

        let trajectory = project(&curriculum, &ProgressSnapshot::new());
        let last = trajectory.segments.last().unwrap();
        assert!(last.learning_end_readiness <= MAX_READINESS);
        assert_eq!(last.validation_end_readiness, last.learning_end_readiness);
    }

    #[test]
    fn equal_shares_never_push_readiness_past_one_hundred() {
        let courses: Vec<_> = (1..=6)
            .map(|position| course(&format!("C{position}"), position, 30.0, None))
            .collect();
        let curriculum = Curriculum::new("x", 120.0, courses, Vec::new(), Visibility::Learner);
        let resolved = resolve_weights(&curriculum);
        assert_eq!(resolved.source, WeightSource::EqualFallback);
        let raw: f64 = resolved.weights.iter().map(|w| w.contribution).sum();
        assert!(raw > MAX_READINESS);

        let trajectory = project(&curriculum, &ProgressSnapshot::new());
        let last = trajectory.segments.last().unwrap();
        assert_eq!(last.learning_end_readiness, MAX_READINESS);
        assert_eq!(last.validation_end_readiness, last.learning_end_readiness);
        assert!(trajectory
            .complete_path
            .iter()
            .all(|point| point.readiness <= MAX_READINESS));
    }

    #[test]
    fn missing_hours_derive_from_contribution() {
        let a = course("A", 1, 25.0, None);
        let b = course("B", 2, 75.0, Some(30.0));
        let curriculum = Curriculum::new("x", 120.0, vec![a, b], Vec::new(), Visibility::Learner);
        let resolved = resolve_weights(&curriculum);

        assert_eq!(resolved.source, WeightSource::Declared);
        assert_eq!(resolved.weights[0].hours, 30.0);
        assert_eq!(resolved.weights[1].hours, 30.0);
        assert_eq!(resolved.total_hours, 120.0);
    }

    #[test]
    fn hours_beyond_bound_widen_the_axis() {
        let a = course("A", 1, 50.0, Some(100.0));
        let b = course("B", 2, 50.0, Some(80.0));
        let curriculum = Curriculum::new("x", 120.0, vec![a, b], Vec::new(), Visibility::Learner);
        let trajectory = project(&curriculum, &ProgressSnapshot::new());

        assert_eq!(trajectory.total_hours, 180.0);
        assert!(trajectory
            .issues
            .iter()
            .any(|issue| matches!(issue, CurriculumIssue::HoursExceedBound { .. })));
    }

    #[test]
    fn course_without_posts_keeps_its_geometry() {
        let a = course("A", 1, 50.0, Some(60.0));
        let b = course("B", 2, 50.0, Some(60.0));
        let all = posts(&a, 2);
        let curriculum = Curriculum::new("x", 120.0, vec![a, b], all, Visibility::Learner);
        let mut snapshot = ProgressSnapshot::new();
        complete(&mut snapshot, &curriculum, 0, 2);
        let trajectory = project(&curriculum, &snapshot);

        let empty = &trajectory.segments[1];
        assert_eq!(empty.validation_end(), Point::new(120.0, 100.0));
        assert!(!empty.completed);
        assert_eq!(trajectory.active_index, Some(1));
        assert_eq!(trajectory.cursor, Point::new(60.0, 50.0));
    }

    #[test]
    fn projection_is_deterministic() {
        let curriculum = two_course();
        let mut snapshot = ProgressSnapshot::new();
        complete(&mut snapshot, &curriculum, 0, 7);
        assert_eq!(project(&curriculum, &snapshot), project(&curriculum, &snapshot));
    }

    #[test]
    fn readiness_at_follows_the_line() {
        let curriculum = two_course();
        let trajectory = project(&curriculum, &ProgressSnapshot::new());
        let a = &trajectory.segments[0];

        assert_eq!(a.readiness_at(24.0), 25.0);
        assert!(close(a.readiness_at(30.0), 31.25));
        assert_eq!(a.readiness_at(55.0), 50.0);
        assert_eq!(a.phase_at(48.0), Phase::Learning);
        assert_eq!(a.phase_at(48.5), Phase::Validation);
    }

    #[test]
    fn percent_points_scale_hours_only() {
        assert_eq!(Point::new(60.0, 50.0).as_percent(120.0), Point::new(50.0, 50.0));
        assert_eq!(Point::new(60.0, 50.0).as_percent(0.0), Point::new(0.0, 50.0));
    }
}

#[cfg(test)]
mod properties {
    use super::*;
    use crate::lifecycle::{derive, CourseState};
    use crate::models::{Course, Post, PostProgress, PostStatus, Visibility};
    use proptest::prelude::*;

    /// Curriculum of up to five courses with arbitrary weights, hours and progress.
    fn arb_case() -> impl Strategy<Value = (Curriculum, ProgressSnapshot)> {
        prop::collection::vec(
            (
                1.0f64..100.0,
                prop::option::of(1.0f64..80.0),
                prop::collection::vec((any::<bool>(), any::<bool>()), 0..6),
            ),
            0..12,
        )
        .prop_map(|specs| {
            let mut courses = Vec::new();
            let mut posts = Vec::new();
            let mut snapshot = ProgressSnapshot::new();
            for (index, (contribution, hours, entries)) in specs.into_iter().enumerate() {
                let course = Course {
                    id: Uuid::new_v4(),
                    name: format!("Course {index}"),
                    slug: format!("course-{index}"),
                    position: index as i32,
                    contribution,
                    hours,
                };
                for (post_index, (viewed, completed)) in entries.into_iter().enumerate() {
                    let post = Post {
                        id: Uuid::new_v4(),
                        slug: format!("post-{post_index}"),
                        course_id: course.id,
                        position: post_index as i32,
                        lesson_id: None,
                        status: PostStatus::Published,
                    };
                    snapshot.insert(
                        post.id,
                        PostProgress {
                            viewed_at: viewed.then(chrono::Utc::now),
                            completed,
                        },
                    );
                    posts.push(post);
                }
                courses.push(course);
            }
            let curriculum = Curriculum::new("prop", 120.0, courses, posts, Visibility::Learner);
            (curriculum, snapshot)
        })
    }

    proptest! {
        #[test]
        fn cursor_readiness_stays_in_range((curriculum, snapshot) in arb_case()) {
            let trajectory = project(&curriculum, &snapshot);
            prop_assert!(trajectory.cursor.readiness >= 0.0);
            prop_assert!(trajectory.cursor.readiness <= MAX_READINESS);
        }

        #[test]
        fn progress_path_never_descends((curriculum, snapshot) in arb_case()) {
            let trajectory = project(&curriculum, &snapshot);
            for pair in trajectory.progress_path.windows(2) {
                prop_assert!(pair[1].readiness >= pair[0].readiness);
                prop_assert!(pair[1].hours >= pair[0].hours);
            }
        }

        #[test]
        fn validation_phase_is_flat((curriculum, snapshot) in arb_case()) {
            let trajectory = project(&curriculum, &snapshot);
            for segment in &trajectory.segments {
                prop_assert_eq!(segment.validation_end_readiness, segment.learning_end_readiness);
            }
        }

        #[test]
        fn locked_courses_follow_incomplete_predecessors((curriculum, snapshot) in arb_case()) {
            let statuses = snapshot.course_statuses(&curriculum);
            let report = derive(&curriculum, &statuses);
            for index in 1..report.courses.len() {
                if report.courses[index].state == CourseState::Locked {
                    prop_assert_ne!(report.courses[index - 1].state, CourseState::Completed);
                }
            }
            prop_assert!(report.courses.iter().filter(|c| c.active).count() <= 1);
        }

        #[test]
        fn projection_depends_only_on_inputs((curriculum, snapshot) in arb_case()) {
            let first = project(&curriculum, &snapshot);
            let second = project(&curriculum, &snapshot.clone());
            prop_assert_eq!(first, second);
        }
    }
}
