//! Detection primitives (preprocess/vote/filter) independent of orchestration.
//!
//! The `pipeline` module owns the high-level call order. This module provides
//! the algorithmic building blocks and the detection parameter types.

pub(crate) mod config;
pub(crate) mod filter;
pub(crate) mod hough;
pub(crate) mod preprocess;

pub use config::{DetectionParameters, EdgePolarity, SmoothingParams};
pub use filter::{filter_candidates, DetectedCircle};
pub(crate) use filter::validate_circles;
pub use hough::{detect_candidates, CircleCandidate};
pub use preprocess::{preprocess, smooth};
