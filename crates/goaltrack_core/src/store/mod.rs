//! UI-facing state containers.

pub mod goal_store;
