//! Career progress engine: owns the learner's progress stores and keeps the
//! trajectory and course states in step with every mutation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::curriculum::Curriculum;
use crate::entry_flow::{EntryFlow, EntryFlowMarker, HeaderLayout, MemorySession, SessionStorage};
use crate::error::{Error, Result};
use crate::hover::{HoverDescriptor, HoverTracker};
use crate::lifecycle::{self, CourseState, LifecycleReport, StateChange};
use crate::models::{CourseProgress, Post};
use crate::navigation::{self, ClickRequest, ClickSource, CompletionChoice, NavigationIntent};
use crate::progress::{CourseStatus, ProgressSnapshot, ProgressStore};
use crate::scroll_spy::ActiveSectionDebouncer;
use crate::store::CareerStore;
use crate::trajectory::{self, CurriculumIssue, Point, Trajectory, WeightSource};

/// Hooks for a presentation layer. None of them feed back into domain state.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    CourseStateChanged(StateChange),
    CursorMoved { from: Point, to: Point },
    CompletedSectionEntered { course_id: Uuid },
    /// User-visible notice, e.g. a rejected navigation.
    Toast { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    pub course_id: Uuid,
    pub name: String,
    pub slug: String,
    pub state: CourseState,
    pub active: bool,
    pub contribution: f64,
    pub hours: f64,
    pub progress_percent: u8,
    /// Completed share of published posts, two decimals.
    pub progress_fraction: f64,
    pub completed_count: usize,
    pub total_count: usize,
}

/// Trajectory as handed to the view: points in (hours %, readiness %).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryView {
    pub career: String,
    pub total_hours: f64,
    pub cursor: Point,
    pub cursor_hours: f64,
    pub weight_source: WeightSource,
    pub complete_path: Vec<Point>,
    pub progress_path: Vec<Point>,
    pub future_path: Vec<Point>,
    pub courses: Vec<CourseSummary>,
}

pub struct CareerEngine<S: SessionStorage = MemorySession> {
    learner_id: Uuid,
    config: EngineConfig,
    curriculum: Curriculum,
    progress: Vec<ProgressStore>,
    trajectory: Trajectory,
    lifecycle: LifecycleReport,
    marker: EntryFlowMarker<S>,
    hover: HoverTracker,
    sections: ActiveSectionDebouncer<Uuid>,
    completion_dialog: Option<Uuid>,
    warned_curriculum: bool,
    warned_inconsistent: HashSet<Uuid>,
    events: Vec<EngineEvent>,
}

impl<S: SessionStorage> CareerEngine<S> {
    /// Loads the curriculum and the learner's progress. Curriculum reads must succeed;
    /// progress reads degrade to an empty state.
    pub async fn load(
        store: Arc<dyn CareerStore>,
        career: &str,
        learner_id: Uuid,
        config: EngineConfig,
        session: S,
    ) -> Result<Self> {
        let visibility = config.visibility();
        let courses = store.list_courses_for_career(career).await?;
        let mut posts = Vec::new();
        for course in &courses {
            posts.extend(store.list_posts(course.id, visibility).await?);
        }
        let curriculum = Curriculum::new(
            career,
            config.total_learning_hours,
            courses,
            posts,
            visibility,
        );
        info!(
            career,
            learner = %learner_id,
            courses = curriculum.len(),
            posts = curriculum.all_posts_ordered().count(),
            "loaded curriculum"
        );

        let progress = curriculum
            .entries()
            .iter()
            .map(|entry| {
                ProgressStore::new(store.clone(), learner_id, entry.course.id, entry.posts.clone())
            })
            .collect();

        let empty = ProgressSnapshot::new();
        let mut engine = Self {
            sections: ActiveSectionDebouncer::new(config.hysteresis()),
            trajectory: trajectory::project(&curriculum, &empty),
            lifecycle: lifecycle::derive(&curriculum, &empty.course_statuses(&curriculum)),
            learner_id,
            config,
            curriculum,
            progress,
            marker: EntryFlowMarker::new(session),
            hover: HoverTracker::new(),
            completion_dialog: None,
            warned_curriculum: false,
            warned_inconsistent: HashSet::new(),
            events: Vec::new(),
        };
        engine.refresh().await;
        engine.events.clear();
        Ok(engine)
    }

    /// Re-reads every course from the store and re-projects.
    pub async fn refresh(&mut self) {
        for progress in &mut self.progress {
            if let Err(err) = progress.load().await {
                warn!(
                    learner = %self.learner_id,
                    course = %progress.course_id(),
                    error = %err,
                    "progress unavailable, showing empty state"
                );
            }
        }
        self.reproject();
    }

    pub fn learner_id(&self) -> Uuid {
        self.learner_id
    }

    pub fn curriculum(&self) -> &Curriculum {
        &self.curriculum
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn lifecycle(&self) -> &LifecycleReport {
        &self.lifecycle
    }

    pub fn state_of(&self, course_id: Uuid) -> Option<CourseState> {
        self.lifecycle.state_of(course_id)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.progress
            .iter()
            .flat_map(|progress| progress.entries())
            .collect()
    }

    pub fn course_progress(&self, course_id: Uuid) -> Option<CourseProgress> {
        self.progress_store(course_id).ok().map(|p| p.course_progress())
    }

    pub fn next_uncompleted(&self, course_id: Uuid) -> Option<&Post> {
        self.progress_store(course_id)
            .ok()
            .and_then(|p| p.next_uncompleted())
    }

    pub fn view(&self) -> TrajectoryView {
        let total = self.trajectory.total_hours;
        let to_percent = |path: &[Point]| -> Vec<Point> {
            path.iter().map(|p| p.as_percent(total)).collect()
        };

        let courses = self
            .curriculum
            .courses()
            .zip(&self.trajectory.segments)
            .zip(&self.lifecycle.courses)
            .map(|((course, segment), state)| CourseSummary {
                course_id: course.id,
                name: course.name.clone(),
                slug: course.slug.clone(),
                state: state.state,
                active: state.active,
                contribution: segment.contribution,
                hours: segment.hours,
                progress_percent: CourseProgress::new(segment.completed_count, segment.total_count)
                    .percent,
                progress_fraction: CourseStatus {
                    completed_count: segment.completed_count,
                    total_count: segment.total_count,
                    touched: segment.touched,
                }
                .display_fraction(),
                completed_count: segment.completed_count,
                total_count: segment.total_count,
            })
            .collect();

        TrajectoryView {
            career: self.curriculum.career().to_string(),
            total_hours: total,
            cursor: self.trajectory.cursor.as_percent(total),
            cursor_hours: self.trajectory.cursor.hours,
            weight_source: self.trajectory.weight_source,
            complete_path: to_percent(&self.trajectory.complete_path),
            progress_path: to_percent(&self.trajectory.progress_path),
            future_path: to_percent(&self.trajectory.future_path),
            courses,
        }
    }

    pub fn hover(&mut self, x: f64, y: f64) -> Option<HoverDescriptor> {
        let outcome = self.hover.pointer_moved(
            &self.trajectory,
            &self.lifecycle,
            &self.config.chart(),
            x,
            y,
        );
        if let Some(course_id) = outcome.confetti {
            self.events
                .push(EngineEvent::CompletedSectionEntered { course_id });
        }
        outcome.descriptor
    }

    pub fn pointer_left(&mut self) {
        self.hover.pointer_left();
    }

    /// Scroll-spy input for the course sequence list. Returns the newly active course.
    pub fn observe_section(&mut self, course_id: Uuid, now: Instant) -> Option<Uuid> {
        self.sections.observe(course_id, now)
    }

    pub fn click(
        &mut self,
        course_id: Uuid,
        target_post: Option<Uuid>,
        source: ClickSource,
    ) -> Result<NavigationIntent> {
        let course = self
            .curriculum
            .course(course_id)
            .ok_or_else(|| Error::UnknownCourse(course_id.to_string()))?;
        let course_name = course.name.clone();
        if let Some(post_id) = target_post {
            if !self
                .curriculum
                .posts_of(course_id)
                .iter()
                .any(|p| p.id == post_id)
            {
                return Err(Error::UnknownPost(post_id.to_string()));
            }
        }

        let request = ClickRequest {
            course_id,
            state: self.state_of(course_id).unwrap_or(CourseState::Locked),
            target_post,
            next_uncompleted: self.next_uncompleted(course_id).map(|p| p.id),
            source,
        };
        let intent = navigation::resolve_click(&mut self.marker, &request);

        match intent {
            NavigationIntent::Reject { reason, .. } => {
                self.events.push(EngineEvent::Toast {
                    message: format!("{course_name} is {}", reason.as_str()),
                });
            }
            NavigationIntent::OpenCompletionDialog { course_id } => {
                self.completion_dialog = Some(course_id);
            }
            NavigationIntent::OpenContinue { .. }
            | NavigationIntent::OpenAtRoot { .. }
            | NavigationIntent::Restart { .. } => {}
        }
        Ok(intent)
    }

    pub fn completion_dialog(&self) -> Option<Uuid> {
        self.completion_dialog
    }

    /// Closes the completion dialog. A restart resets the course before the marker is written.
    pub async fn choose_completion(
        &mut self,
        choice: CompletionChoice,
    ) -> Result<Option<NavigationIntent>> {
        let Some(course_id) = self.completion_dialog.take() else {
            return Ok(None);
        };
        let Some(intent) = navigation::resolve_completion(course_id, choice) else {
            return Ok(None);
        };
        if let NavigationIntent::Restart { course_id } = intent {
            if let Err(err) = self.restart_course(course_id).await {
                self.completion_dialog = Some(course_id);
                return Err(err);
            }
        }
        self.marker.mark_career_flow();
        Ok(Some(intent))
    }

    pub async fn mark_viewed(&mut self, post_id: Uuid) -> Result<()> {
        let index = self.course_index_of_post(post_id)?;
        let result = self.progress[index].mark_viewed(post_id).await;
        self.reproject();
        result
    }

    pub async fn mark_completed(&mut self, post_id: Uuid, value: bool) -> Result<()> {
        let index = self.course_index_of_post(post_id)?;
        let result = self.progress[index].mark_completed(post_id, value).await;
        self.reproject();
        result
    }

    pub async fn restart_course(&mut self, course_id: Uuid) -> Result<()> {
        let index = self
            .curriculum
            .index_of(course_id)
            .ok_or_else(|| Error::UnknownCourse(course_id.to_string()))?;
        let result = self.progress[index].reset_course().await;
        if result.is_ok() {
            info!(learner = %self.learner_id, course = %course_id, "course restarted");
        }
        self.reproject();
        result
    }

    pub fn entry_flow(&self) -> EntryFlow {
        self.marker.read()
    }

    pub fn header_layout(&self) -> HeaderLayout {
        self.marker.header_layout()
    }

    pub fn end_session(&mut self) {
        self.marker.clear();
        self.hover.pointer_left();
        self.completion_dialog = None;
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn progress_store(&self, course_id: Uuid) -> Result<&ProgressStore> {
        self.curriculum
            .index_of(course_id)
            .map(|index| &self.progress[index])
            .ok_or_else(|| Error::UnknownCourse(course_id.to_string()))
    }

    fn course_index_of_post(&self, post_id: Uuid) -> Result<usize> {
        self.curriculum
            .all_posts_ordered()
            .find(|post| post.id == post_id)
            .and_then(|post| self.curriculum.index_of(post.course_id))
            .ok_or_else(|| Error::UnknownPost(post_id.to_string()))
    }

    fn reproject(&mut self) {
        let snapshot = self.snapshot();
        let statuses = snapshot.course_statuses(&self.curriculum);
        let trajectory = trajectory::project(&self.curriculum, &snapshot);
        let lifecycle = lifecycle::derive(&self.curriculum, &statuses);

        self.report_issues(&trajectory, &lifecycle);

        for change in lifecycle::transitions(&self.lifecycle, &lifecycle, &statuses) {
            info!(
                course = %change.course_id,
                from = change.from.label(),
                to = change.to.label(),
                "course state changed"
            );
            self.events.push(EngineEvent::CourseStateChanged(change));
        }
        if trajectory.cursor != self.trajectory.cursor {
            self.events.push(EngineEvent::CursorMoved {
                from: self.trajectory.cursor,
                to: trajectory.cursor,
            });
        }

        self.trajectory = trajectory;
        self.lifecycle = lifecycle;
    }

    fn report_issues(&mut self, trajectory: &Trajectory, lifecycle: &LifecycleReport) {
        if !self.warned_curriculum && !trajectory.issues.is_empty() {
            self.warned_curriculum = true;
            for issue in &trajectory.issues {
                match issue {
                    CurriculumIssue::WeightsFallback { declared_sum } => warn!(
                        career = self.curriculum.career(),
                        declared_sum,
                        "contribution weights do not sum to 100, using equal weights"
                    ),
                    CurriculumIssue::InvalidHours { course_id } => warn!(
                        course = %course_id,
                        "course hours are not positive, deriving from contribution"
                    ),
                    CurriculumIssue::HoursExceedBound { sum, bound } => warn!(
                        sum,
                        bound,
                        "course hours exceed the learning-hours bound, widening the axis"
                    ),
                }
            }
        }

        for &index in &lifecycle.inconsistent {
            let course_id = lifecycle.courses[index].course_id;
            if self.warned_inconsistent.insert(course_id) {
                warn!(
                    learner = %self.learner_id,
                    course = %course_id,
                    "course has progress while its predecessor is incomplete"
                );
            }
        }
    }
}
