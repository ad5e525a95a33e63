//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Goal::validate()` / `Milestone::validate()`
//!   before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Every goal-owned query is scoped by `user_id`.

pub mod goal_repo;
pub mod milestone_repo;
pub mod notification_repo;
pub(crate) mod support;
