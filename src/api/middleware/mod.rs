//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Session resolver: bearer token or a fresh guest session
//! 2. Access log: runs after the viewer is known

pub mod audit;
pub mod session;
