//! Decides what a click on a course in the career view should do.
//! Produces intents only; navigating and store writes belong to the caller.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::entry_flow::{EntryFlowMarker, SessionStorage};
use crate::lifecycle::CourseState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Locked,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Locked => "locked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum NavigationIntent {
    Reject { course_id: Uuid, reason: RejectReason },
    OpenCompletionDialog { course_id: Uuid },
    OpenContinue { course_id: Uuid, post_id: Uuid },
    OpenAtRoot { course_id: Uuid },
    /// Reset the course, then open it at its root.
    Restart { course_id: Uuid },
}

/// Where the learner ends up once an intent is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub course_id: Uuid,
    pub post_id: Option<Uuid>,
}

impl NavigationIntent {
    pub fn course_id(&self) -> Uuid {
        match *self {
            NavigationIntent::Reject { course_id, .. }
            | NavigationIntent::OpenCompletionDialog { course_id }
            | NavigationIntent::OpenContinue { course_id, .. }
            | NavigationIntent::OpenAtRoot { course_id }
            | NavigationIntent::Restart { course_id } => course_id,
        }
    }

    pub fn destination(&self) -> Option<Destination> {
        match *self {
            NavigationIntent::Reject { .. } | NavigationIntent::OpenCompletionDialog { .. } => None,
            NavigationIntent::OpenContinue { course_id, post_id } => Some(Destination {
                course_id,
                post_id: Some(post_id),
            }),
            NavigationIntent::OpenAtRoot { course_id } | NavigationIntent::Restart { course_id } => {
                Some(Destination {
                    course_id,
                    post_id: None,
                })
            }
        }
    }

    /// The completion dialog defers the marker until the learner picks an option.
    pub fn writes_entry_flow(&self) -> bool {
        self.destination().is_some()
    }
}

/// What was clicked in the career view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickSource {
    Course,
    ChartPoint,
    SequenceRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickRequest {
    pub course_id: Uuid,
    pub state: CourseState,
    /// Post explicitly targeted by the click, if any.
    pub target_post: Option<Uuid>,
    pub next_uncompleted: Option<Uuid>,
    pub source: ClickSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionChoice {
    Restart,
    ViewCourse,
    Dismiss,
}

pub fn resolve(request: &ClickRequest) -> NavigationIntent {
    let course_id = request.course_id;
    match request.state {
        CourseState::Locked => NavigationIntent::Reject {
            course_id,
            reason: RejectReason::Locked,
        },
        CourseState::Completed => NavigationIntent::OpenCompletionDialog { course_id },
        CourseState::InProgress(_) => match request.target_post.or(request.next_uncompleted) {
            Some(post_id) => NavigationIntent::OpenContinue { course_id, post_id },
            None => NavigationIntent::OpenAtRoot { course_id },
        },
        CourseState::Available => NavigationIntent::OpenAtRoot { course_id },
    }
}

pub fn resolve_completion(course_id: Uuid, choice: CompletionChoice) -> Option<NavigationIntent> {
    match choice {
        CompletionChoice::Restart => Some(NavigationIntent::Restart { course_id }),
        CompletionChoice::ViewCourse => Some(NavigationIntent::OpenAtRoot { course_id }),
        CompletionChoice::Dismiss => None,
    }
}

/// Resolves a click and writes the entry-flow marker for navigating intents.
pub fn resolve_click<S: SessionStorage>(
    marker: &mut EntryFlowMarker<S>,
    request: &ClickRequest,
) -> NavigationIntent {
    let intent = resolve(request);
    info!(
        course = %request.course_id,
        source = ?request.source,
        intent = ?intent,
        "resolved career navigation"
    );
    if intent.writes_entry_flow() {
        marker.mark_career_flow();
    }
    intent
}
