//! Bilateral gait monitoring from wearable IMU telemetry.
//!
//! Samples from left and right limb sensors are grouped into activity
//! segments, intersected into bilateral windows, screened for effective
//! movement with a spectral and a duration test, and finally intersected
//! again across limbs to yield effective gait intervals.

pub mod cli;
pub mod config;
pub mod error;
pub mod gait;
pub mod intersect;
pub mod interval;
pub mod movement;
pub mod pipeline;
pub mod segmentation;
pub mod signal;
pub mod store;
pub mod timeutils;
pub mod types;
pub mod validation;

pub use config::Config;
pub use gait::detect_effective_gait;
pub use intersect::intersect;
pub use movement::{detect_effective_movement, EffectiveMovementDetector, MovementReport};
pub use pipeline::{find_activity, find_gait, list_windows, Selection};
pub use segmentation::build_segments;
