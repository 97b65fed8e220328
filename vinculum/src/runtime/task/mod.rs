//! Lazy tasks.
//!
//! A [`Task`] is the unit every other piece of the crate composes: its body
//! runs inline in whoever awaits it, and its outcome is kept in a result cell
//! that can be read any number of times.

mod cell;
mod core;
mod state;

pub use self::core::{Task, WhenReady};
