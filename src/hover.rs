//! Maps pointer positions over the chart back onto the curriculum.

use serde::Serialize;
use uuid::Uuid;

use crate::lifecycle::{LifecycleReport, Phase};
use crate::models::CourseProgress;
use crate::trajectory::{Trajectory, MAX_READINESS};

pub const DEFAULT_PROXIMITY_PX: f64 = 30.0;

/// Chart area in pixels. Readiness grows upward, so y = 0 is 100% readiness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartArea {
    pub width: f64,
    pub height: f64,
    pub proximity_px: f64,
}

impl ChartArea {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            proximity_px: DEFAULT_PROXIMITY_PX,
        }
    }

    pub fn hours_at(&self, x: f64, total_hours: f64) -> f64 {
        (x * total_hours / self.width).clamp(0.0, total_hours)
    }

    pub fn line_y(&self, readiness: f64) -> f64 {
        self.height * (1.0 - readiness / MAX_READINESS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverDescriptor {
    pub x: f64,
    pub line_y: f64,
    pub hours: f64,
    pub readiness: f64,
    pub course_id: Uuid,
    pub phase: Phase,
    pub completed_count: usize,
    pub total_count: usize,
    /// 1-based ordinal of the post the learner would open next.
    pub next_post_ordinal: usize,
    pub locked: bool,
    pub active: bool,
    pub enrolled: bool,
    pub progress_percent: u8,
}

/// Descriptor for the pointer, or `None` outside the chart or away from the line.
/// Identical input yields an identical result.
pub fn map_pointer(
    trajectory: &Trajectory,
    lifecycle: &LifecycleReport,
    chart: &ChartArea,
    x: f64,
    y: f64,
) -> Option<HoverDescriptor> {
    if chart.width <= 0.0 || chart.height <= 0.0 {
        return None;
    }

    let hours = chart.hours_at(x, trajectory.total_hours);
    let segment = trajectory.segment_at(hours)?;
    let phase = segment.phase_at(hours);
    let readiness = segment.readiness_at(hours);

    let line_y = chart.line_y(readiness);
    if (y - line_y).abs() > chart.proximity_px {
        return None;
    }

    let course = lifecycle.get(segment.course_id)?;
    let progress = CourseProgress::new(segment.completed_count, segment.total_count);

    Some(HoverDescriptor {
        x: x.clamp(0.0, chart.width),
        line_y,
        hours,
        readiness,
        course_id: segment.course_id,
        phase,
        completed_count: segment.completed_count,
        total_count: segment.total_count,
        next_post_ordinal: (segment.completed_count + 1).min(segment.total_count),
        locked: course.state.is_locked(),
        active: course.active,
        enrolled: segment.touched,
        progress_percent: progress.percent,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoverOutcome {
    pub descriptor: Option<HoverDescriptor>,
    /// Set when the pointer just entered a completed course's section.
    pub confetti: Option<Uuid>,
}

/// Remembers the last completed section entered so the confetti burst fires once per entry.
#[derive(Debug, Default)]
pub struct HoverTracker {
    last_completed_section: Option<Uuid>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer_moved(
        &mut self,
        trajectory: &Trajectory,
        lifecycle: &LifecycleReport,
        chart: &ChartArea,
        x: f64,
        y: f64,
    ) -> HoverOutcome {
        let hours = if chart.width > 0.0 {
            Some(chart.hours_at(x, trajectory.total_hours))
        } else {
            None
        };
        let section = hours.and_then(|h| trajectory.segment_at(h));

        let confetti = match section {
            Some(segment) if segment.completed => {
                if self.last_completed_section == Some(segment.course_id) {
                    None
                } else {
                    self.last_completed_section = Some(segment.course_id);
                    Some(segment.course_id)
                }
            }
            _ => {
                self.last_completed_section = None;
                None
            }
        };

        HoverOutcome {
            descriptor: map_pointer(trajectory, lifecycle, chart, x, y),
            confetti,
        }
    }

    pub fn pointer_left(&mut self) {
        self.last_completed_section = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::fixtures::two_course;
    use crate::curriculum::Curriculum;
    use crate::lifecycle::derive;
    use crate::models::PostProgress;
    use crate::progress::ProgressSnapshot;
    use crate::trajectory::project;
    use proptest::prelude::*;

    /// 1200px wide so one pixel is a tenth of an hour; 400px tall so four pixels per percent.
    fn chart() -> ChartArea {
        ChartArea::new(1200.0, 400.0)
    }

    fn scenario(completed_in_a: usize) -> (Curriculum, Trajectory, LifecycleReport) {
        let curriculum = two_course();
        let mut snapshot = ProgressSnapshot::new();
        let a = curriculum.entries()[0].course.id;
        for post in curriculum.posts_of(a).iter().take(completed_in_a) {
            snapshot.insert(
                post.id,
                PostProgress {
                    viewed_at: None,
                    completed: true,
                },
            );
        }
        let statuses = snapshot.course_statuses(&curriculum);
        let trajectory = project(&curriculum, &snapshot);
        let lifecycle = derive(&curriculum, &statuses);
        (curriculum, trajectory, lifecycle)
    }

    #[test]
    fn pointer_on_learning_slope_describes_course() {
        let (curriculum, trajectory, lifecycle) = scenario(4);
        let chart = chart();
        // hours 24 on the line is readiness 25, i.e. y = 300
        let descriptor = map_pointer(&trajectory, &lifecycle, &chart, 240.0, 310.0).unwrap();

        assert_eq!(descriptor.hours, 24.0);
        assert_eq!(descriptor.readiness, 25.0);
        assert_eq!(descriptor.phase, Phase::Learning);
        assert_eq!(descriptor.course_id, curriculum.entries()[0].course.id);
        assert_eq!(descriptor.completed_count, 4);
        assert_eq!(descriptor.next_post_ordinal, 5);
        assert_eq!(descriptor.progress_percent, 40);
        assert!(descriptor.active);
        assert!(descriptor.enrolled);
        assert!(!descriptor.locked);
    }

    #[test]
    fn hover_at_thirty_hours_with_four_of_ten_posts_done() {
        let (_, trajectory, lifecycle) = scenario(4);
        let chart = chart();
        // Readiness follows the drawn line: 30 of 48 learning hours is 31.25, not 25.
        let descriptor = map_pointer(&trajectory, &lifecycle, &chart, 300.0, 275.0).unwrap();

        assert_eq!(descriptor.hours, 30.0);
        assert!((descriptor.readiness - 31.25).abs() < 1e-9);
        assert_eq!(descriptor.phase, Phase::Learning);
    }

    #[test]
    fn validation_section_is_flat() {
        let (_, trajectory, lifecycle) = scenario(0);
        let chart = chart();
        let descriptor = map_pointer(&trajectory, &lifecycle, &chart, 540.0, 200.0).unwrap();

        assert_eq!(descriptor.phase, Phase::Validation);
        assert_eq!(descriptor.readiness, 50.0);
        assert_eq!(descriptor.line_y, 200.0);
    }

    #[test]
    fn locked_course_is_flagged() {
        let (curriculum, trajectory, lifecycle) = scenario(0);
        let chart = chart();
        // hours 84 in B: readiness 50 + 50 * 24/48 = 75, y = 100
        let descriptor = map_pointer(&trajectory, &lifecycle, &chart, 840.0, 100.0).unwrap();

        assert_eq!(descriptor.course_id, curriculum.entries()[1].course.id);
        assert!(descriptor.locked);
        assert!(!descriptor.active);
        assert!(!descriptor.enrolled);
        assert_eq!(descriptor.next_post_ordinal, 1);
    }

    #[test]
    fn far_from_line_yields_nothing() {
        let (_, trajectory, lifecycle) = scenario(4);
        let chart = chart();
        assert!(map_pointer(&trajectory, &lifecycle, &chart, 240.0, 331.0).is_none());
        assert!(map_pointer(&trajectory, &lifecycle, &chart, 240.0, 330.0).is_some());
    }

    #[test]
    fn pointer_beyond_chart_is_clamped() {
        let (_, trajectory, lifecycle) = scenario(0);
        let chart = chart();
        let descriptor = map_pointer(&trajectory, &lifecycle, &chart, 5000.0, 0.0).unwrap();
        assert_eq!(descriptor.hours, 120.0);
        assert_eq!(descriptor.x, 1200.0);
    }

    #[test]
    fn confetti_fires_once_per_entry() {
        let (_, trajectory, lifecycle) = scenario(10);
        let chart = chart();
        let mut tracker = HoverTracker::new();

        let first = tracker.pointer_moved(&trajectory, &lifecycle, &chart, 300.0, 0.0);
        assert!(first.confetti.is_some());
        let again = tracker.pointer_moved(&trajectory, &lifecycle, &chart, 310.0, 0.0);
        assert!(again.confetti.is_none());

        // into the untouched second course, then back
        tracker.pointer_moved(&trajectory, &lifecycle, &chart, 900.0, 0.0);
        let back = tracker.pointer_moved(&trajectory, &lifecycle, &chart, 300.0, 0.0);
        assert!(back.confetti.is_some());

        tracker.pointer_left();
        let after_leave = tracker.pointer_moved(&trajectory, &lifecycle, &chart, 300.0, 0.0);
        assert!(after_leave.confetti.is_some());
    }

    proptest! {
        #[test]
        fn pointer_outside_proximity_band_is_ignored(
            x in 0.0f64..1200.0,
            offset in 30.001f64..400.0,
            below in any::<bool>(),
            completed in 0usize..=10,
        ) {
            let (_, trajectory, lifecycle) = scenario(completed);
            let chart = chart();
            let hours = chart.hours_at(x, trajectory.total_hours);
            let segment = trajectory.segment_at(hours).unwrap();
            let line_y = chart.line_y(segment.readiness_at(hours));
            let y = if below { line_y + offset } else { line_y - offset };
            prop_assert!(map_pointer(&trajectory, &lifecycle, &chart, x, y).is_none());
        }

        #[test]
        fn mapping_is_idempotent(x in 0.0f64..1200.0, y in 0.0f64..400.0) {
            let (_, trajectory, lifecycle) = scenario(6);
            let chart = chart();
            prop_assert_eq!(
                map_pointer(&trajectory, &lifecycle, &chart, x, y),
                map_pointer(&trajectory, &lifecycle, &chart, x, y)
            );
        }
    }
}
