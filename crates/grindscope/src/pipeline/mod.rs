//! High-level analysis pipeline.
//!
//! This module is the internal "glue" layer that wires together the stages:
//! preprocess -> Hough vote -> filter -> calibration -> distribution.
//!
//! Algorithmic primitives live in `crate::detector`, `crate::calibration`
//! and `crate::distribution`. The pipeline layer owns call order, early
//! validation and the graceful degradation of calibration failures.

mod config;
mod result;
mod run;

pub use config::AnalysisConfig;
pub use result::AnalysisResult;

pub(crate) use run::{analyze_circles, detect_circles, run};
