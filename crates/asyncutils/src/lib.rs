//! Small async helpers that don't belong to any one crate.

mod debounce;

pub use crate::debounce::Debouncer;
