//! Shared building blocks for the burrow launch runtime.
//!
//! Holds the workspace-wide error type, fixed path and environment-variable
//! constants, and the [`context::LaunchContext`] value threaded through every
//! launch step.

pub mod constants;
pub mod context;
pub mod error;
