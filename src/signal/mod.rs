//! Dual-domain validation of magnitude signal slices.
//!
//! A slice is effective for a channel when its Welch band power reaches the
//! channel's power threshold and it contains enough distinct active runs.

pub mod evaluator;
pub mod welch;
pub mod window;

pub use evaluator::{active_runs, ChannelCriteria, ChannelVerdict, SignalWindowEvaluator};
pub use welch::{Psd, WelchEstimator, DEFAULT_SEGMENT_LEN};
