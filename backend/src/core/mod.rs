//! Core scalar and identifier types shared by every engine component.

pub mod errors;
pub mod ids;
pub mod types;
