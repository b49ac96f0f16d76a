//! Course lifecycle: locked, available, in progress (learning or validation), completed.
//!
//! States are a pure projection of progress. The event table in [`CourseState::on`]
//! names the transition that explains a change between two projections.

use serde::Serialize;
use uuid::Uuid;

use crate::curriculum::Curriculum;
use crate::progress::CourseStatus;
use crate::trajectory::LEARNING_SHARE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Learning,
    Validation,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Learning => "learning",
            Phase::Validation => "validation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseState {
    Locked,
    Available,
    InProgress(Phase),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleEvent {
    PredecessorCompleted,
    PostViewed,
    ProgressAdvanced { fraction: f64 },
    AllPostsCompleted,
    Restarted,
}

impl CourseState {
    pub fn initial(index: usize) -> Self {
        if index == 0 {
            CourseState::Available
        } else {
            CourseState::Locked
        }
    }

    /// Applies one event. Events that do not apply leave the state unchanged.
    pub fn on(self, event: LifecycleEvent) -> Self {
        use CourseState::*;
        use LifecycleEvent::*;

        match (self, event) {
            (Locked, PredecessorCompleted) => Available,
            (Available, PostViewed) => InProgress(Phase::Learning),
            (InProgress(Phase::Learning), ProgressAdvanced { fraction })
                if fraction >= LEARNING_SHARE =>
            {
                InProgress(Phase::Validation)
            }
            (InProgress(_), AllPostsCompleted) => Completed,
            (Completed | InProgress(_), Restarted) => Available,
            (state, _) => state,
        }
    }

    pub fn is_locked(self) -> bool {
        self == CourseState::Locked
    }

    pub fn is_completed(self) -> bool {
        self == CourseState::Completed
    }

    pub fn label(self) -> &'static str {
        match self {
            CourseState::Locked => "locked",
            CourseState::Available => "available",
            CourseState::InProgress(Phase::Learning) => "in progress (learning)",
            CourseState::InProgress(Phase::Validation) => "in progress (validation)",
            CourseState::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CourseLifecycle {
    pub course_id: Uuid,
    pub state: CourseState,
    /// The learner's current focus; at most one course carries it.
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleReport {
    pub courses: Vec<CourseLifecycle>,
    pub active_index: Option<usize>,
    /// Indexes of courses with progress while their predecessor is incomplete.
    pub inconsistent: Vec<usize>,
}

impl LifecycleReport {
    pub fn get(&self, course_id: Uuid) -> Option<&CourseLifecycle> {
        self.courses.iter().find(|c| c.course_id == course_id)
    }

    pub fn state_of(&self, course_id: Uuid) -> Option<CourseState> {
        self.get(course_id).map(|c| c.state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateChange {
    pub course_id: Uuid,
    pub from: CourseState,
    pub to: CourseState,
    /// Table event explaining the change; `None` when progress skipped states.
    pub event: Option<LifecycleEvent>,
}

pub fn derive_state(index: usize, status: &CourseStatus, predecessor_completed: bool) -> CourseState {
    if status.completed() {
        CourseState::Completed
    } else if status.touched {
        if status.fraction() >= LEARNING_SHARE {
            CourseState::InProgress(Phase::Validation)
        } else {
            CourseState::InProgress(Phase::Learning)
        }
    } else if predecessor_completed {
        CourseState::Available
    } else {
        CourseState::initial(index)
    }
}

/// First incomplete course whose predecessor is completed (the first course has none).
pub fn active_index(statuses: &[CourseStatus]) -> Option<usize> {
    statuses.iter().enumerate().position(|(index, status)| {
        let predecessor_completed = index == 0 || statuses[index - 1].completed();
        predecessor_completed && !status.completed()
    })
}

pub fn derive(curriculum: &Curriculum, statuses: &[CourseStatus]) -> LifecycleReport {
    let active = active_index(statuses);
    let mut report = LifecycleReport {
        active_index: active,
        ..LifecycleReport::default()
    };

    for (index, (course, status)) in curriculum.courses().zip(statuses).enumerate() {
        let predecessor_completed = index > 0 && statuses[index - 1].completed();
        if index > 0 && status.touched && !predecessor_completed {
            report.inconsistent.push(index);
        }
        report.courses.push(CourseLifecycle {
            course_id: course.id,
            state: derive_state(index, status, predecessor_completed),
            active: active == Some(index),
        });
    }

    report
}

/// State changes between two projections of the same curriculum.
pub fn transitions(
    before: &LifecycleReport,
    after: &LifecycleReport,
    statuses: &[CourseStatus],
) -> Vec<StateChange> {
    before
        .courses
        .iter()
        .zip(&after.courses)
        .zip(statuses)
        .filter(|((old, new), _)| old.state != new.state)
        .map(|((old, new), status)| StateChange {
            course_id: new.course_id,
            from: old.state,
            to: new.state,
            event: explain(old.state, new.state, status),
        })
        .collect()
}

fn explain(from: CourseState, to: CourseState, status: &CourseStatus) -> Option<LifecycleEvent> {
    [
        LifecycleEvent::PredecessorCompleted,
        LifecycleEvent::PostViewed,
        LifecycleEvent::ProgressAdvanced {
            fraction: status.fraction(),
        },
        LifecycleEvent::AllPostsCompleted,
        LifecycleEvent::Restarted,
    ]
    .into_iter()
    .find(|event| from.on(*event) == to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::fixtures::two_course;

    fn status(completed: usize, total: usize, touched: bool) -> CourseStatus {
        CourseStatus {
            completed_count: completed,
            total_count: total,
            touched,
        }
    }

    #[test]
    fn untouched_curriculum_unlocks_first_course_only() {
        let curriculum = two_course();
        let report = derive(&curriculum, &[status(0, 10, false), status(0, 10, false)]);

        assert_eq!(report.courses[0].state, CourseState::Available);
        assert_eq!(report.courses[1].state, CourseState::Locked);
        assert_eq!(report.active_index, Some(0));
        assert!(report.courses[0].active);
        assert!(report.inconsistent.is_empty());
    }

    #[test]
    fn completing_first_course_unlocks_second() {
        let curriculum = two_course();
        let report = derive(&curriculum, &[status(10, 10, true), status(0, 10, false)]);

        assert_eq!(report.courses[0].state, CourseState::Completed);
        assert_eq!(report.courses[1].state, CourseState::Available);
        assert_eq!(report.active_index, Some(1));
    }

    #[test]
    fn phases_split_at_eighty_percent() {
        assert_eq!(
            derive_state(0, &status(4, 10, true), true),
            CourseState::InProgress(Phase::Learning)
        );
        assert_eq!(
            derive_state(0, &status(8, 10, true), true),
            CourseState::InProgress(Phase::Validation)
        );
        assert_eq!(
            derive_state(0, &status(9, 10, true), true),
            CourseState::InProgress(Phase::Validation)
        );
    }

    #[test]
    fn viewed_only_course_is_in_learning() {
        assert_eq!(
            derive_state(1, &status(0, 10, true), true),
            CourseState::InProgress(Phase::Learning)
        );
    }

    #[test]
    fn empty_course_stays_available_after_predecessor() {
        assert_eq!(derive_state(1, &status(0, 0, false), true), CourseState::Available);
        assert_eq!(derive_state(1, &status(0, 0, false), false), CourseState::Locked);
    }

    #[test]
    fn later_progress_is_flagged_but_shown_in_progress() {
        let curriculum = two_course();
        let report = derive(&curriculum, &[status(3, 10, true), status(1, 10, true)]);

        assert_eq!(report.courses[0].state, CourseState::InProgress(Phase::Learning));
        assert_eq!(report.courses[1].state, CourseState::InProgress(Phase::Learning));
        assert_eq!(report.inconsistent, vec![1]);
        assert_eq!(report.active_index, Some(0));
    }

    #[test]
    fn fully_completed_curriculum_has_no_active_course() {
        assert_eq!(active_index(&[status(2, 2, true), status(3, 3, true)]), None);
        assert_eq!(active_index(&[]), None);
    }

    #[test]
    fn event_table_matches_documented_transitions() {
        use CourseState::*;
        use LifecycleEvent::*;

        assert_eq!(CourseState::initial(0), Available);
        assert_eq!(CourseState::initial(3), Locked);
        assert_eq!(Locked.on(PredecessorCompleted), Available);
        assert_eq!(Available.on(PostViewed), InProgress(Phase::Learning));
        assert_eq!(
            InProgress(Phase::Learning).on(ProgressAdvanced { fraction: 0.8 }),
            InProgress(Phase::Validation)
        );
        assert_eq!(
            InProgress(Phase::Learning).on(ProgressAdvanced { fraction: 0.5 }),
            InProgress(Phase::Learning)
        );
        assert_eq!(InProgress(Phase::Validation).on(AllPostsCompleted), Completed);
        assert_eq!(InProgress(Phase::Learning).on(AllPostsCompleted), Completed);
        assert_eq!(Completed.on(Restarted), Available);
        assert_eq!(Locked.on(AllPostsCompleted), Locked);
    }

    #[test]
    fn transitions_name_the_explaining_event() {
        let curriculum = two_course();
        let before_statuses = [status(9, 10, true), status(0, 10, false)];
        let after_statuses = [status(10, 10, true), status(0, 10, false)];
        let before = derive(&curriculum, &before_statuses);
        let after = derive(&curriculum, &after_statuses);

        let changes = transitions(&before, &after, &after_statuses);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].to, CourseState::Completed);
        assert_eq!(changes[0].event, Some(LifecycleEvent::AllPostsCompleted));
        assert_eq!(changes[1].from, CourseState::Locked);
        assert_eq!(changes[1].event, Some(LifecycleEvent::PredecessorCompleted));
    }

    #[test]
    fn skipped_states_have_no_explaining_event() {
        let curriculum = two_course();
        let before_statuses = [status(0, 10, false), status(0, 10, false)];
        let after_statuses = [status(10, 10, true), status(0, 10, false)];
        let before = derive(&curriculum, &before_statuses);
        let after = derive(&curriculum, &after_statuses);

        let changes = transitions(&before, &after, &after_statuses);
        assert_eq!(changes[0].from, CourseState::Available);
        assert_eq!(changes[0].to, CourseState::Completed);
        assert_eq!(changes[0].event, None);
    }
}
