//! Utility functions
//!
//! Pure helpers - time formatting and randomization.

pub mod rand;
pub mod time;
