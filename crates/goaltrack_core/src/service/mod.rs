//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep UI/FFI/CLI layers decoupled from storage details.

pub mod goal_service;
pub mod milestone_service;
pub mod notification_service;
