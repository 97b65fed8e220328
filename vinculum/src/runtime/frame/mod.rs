//! Independently resumable tasks.
//!
//! A [`Frame`] wraps a [`Task`](crate::Task) whose resumption is not driven
//! by an awaiting task but by whatever thread wakes it: the blocking bridge
//! and every fan-in adapter run their task inside a frame. Completion is
//! reported once through [`Notify`].

mod core;
mod state;
mod waker;

pub(crate) use self::core::{Frame, Notify};
