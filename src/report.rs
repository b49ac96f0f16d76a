use std::fmt::Write;

use uuid::Uuid;

use crate::engine::{CourseSummary, TrajectoryView};
use crate::lifecycle::CourseState;
use crate::trajectory::WeightSource;

/// Course the learner should work on next, if any.
pub fn next_step(view: &TrajectoryView) -> Option<&CourseSummary> {
    view.courses.iter().find(|course| course.active)
}

pub fn completed_readiness(view: &TrajectoryView) -> f64 {
    view.courses
        .iter()
        .filter(|course| course.state == CourseState::Completed)
        .map(|course| course.contribution)
        .sum()
}

pub fn build_report(view: &TrajectoryView, learner_id: Uuid) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Career Progress Report");
    let _ = writeln!(
        output,
        "Generated for learner {} on the {} career",
        learner_id, view.career
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Readiness");
    let _ = writeln!(
        output,
        "- Trajectory position: {:.1}% readiness after {:.1} of {:.0} learning hours",
        view.cursor.readiness, view.cursor_hours, view.total_hours
    );
    let _ = writeln!(
        output,
        "- Readiness from completed courses: {:.1}%",
        completed_readiness(view)
    );
    if view.weight_source == WeightSource::EqualFallback {
        let _ = writeln!(
            output,
            "- Course weights were malformed; every course counts equally."
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Sequence");

    if view.courses.is_empty() {
        let _ = writeln!(output, "No courses defined for this career.");
    } else {
        for (index, course) in view.courses.iter().enumerate() {
            let marker = if course.active { " (current focus)" } else { "" };
            let _ = writeln!(
                output,
                "{}. {} - {}{}: {}/{} posts ({}%), {:.1}% weight over {:.1}h",
                index + 1,
                course.name,
                course.state.label(),
                marker,
                course.completed_count,
                course.total_count,
                course.progress_percent,
                course.contribution,
                course.hours
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Next Step");

    match next_step(view) {
        Some(course) if course.state == CourseState::Available => {
            let _ = writeln!(output, "Start {}.", course.name);
        }
        Some(course) => {
            let _ = writeln!(
                output,
                "Continue {} at post {} of {}.",
                course.name,
                (course.completed_count + 1).min(course.total_count),
                course.total_count
            );
        }
        None if view.courses.is_empty() => {
            let _ = writeln!(output, "Nothing to do yet.");
        }
        None => {
            let _ = writeln!(output, "Every course is complete.");
        }
    }

    output
}
