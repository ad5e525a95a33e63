//! Domain model for goals, milestones, streaks and notifications.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep the streak calculation pure and storage-agnostic.
//!
//! # Invariants
//! - Every goal is identified by a stable `GoalId` and scoped by `user_id`.
//! - Streak history is append-only and owned by its goal.

pub mod goal;
pub mod milestone;
pub mod notification;
pub mod streak;
