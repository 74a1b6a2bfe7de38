//! State managers binding the store and the weather provider to published
//! reactive state.
//!
//! # Responsibility
//! - Own the in-memory projections the presentation layer renders.
//! - Keep the presentation layer decoupled from storage and HTTP details.

pub mod debounce;
pub mod note_manager;
pub mod weather_manager;
