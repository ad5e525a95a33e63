//! Flutter bridge for goaltrack core.

pub mod api;
