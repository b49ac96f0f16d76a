//! Career progress engine for the Group Scholar learning platform.
//!
//! Projects a learner's progress through an ordered curriculum onto a career
//! readiness trajectory, derives each course's lifecycle state, maps chart
//! pointer positions back to courses and resolves navigation from the career view.

pub mod config;
pub mod curriculum;
pub mod db;
pub mod engine;
pub mod entry_flow;
pub mod error;
pub mod hover;
pub mod lifecycle;
pub mod models;
pub mod navigation;
pub mod progress;
pub mod report;
pub mod scroll_spy;
pub mod store;
pub mod trajectory;

pub use engine::{CareerEngine, EngineEvent, TrajectoryView};
pub use error::{Error, Result};
