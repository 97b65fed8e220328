//! Utilities for memory-efficient data structures.
//!
//! This module provides low-level utilities used internally by the crate.
//! In particular, it exposes a [`Slab`] used for indexed storage with reuse
//! of freed slots, and a per-thread token used to tell threads apart.

mod slab;
mod token;

pub(crate) use slab::Slab;
pub(crate) use token::thread_token;
