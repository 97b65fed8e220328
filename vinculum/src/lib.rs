//! # Vinculum
//!
//! **Vinculum** is a small cooperative execution engine for Rust: lazy tasks
//! that run inline in whoever awaits them, a bridge that blocks a thread on
//! a task, a fan-in combinator, and a dispatch service that resumes
//! suspended work on the threads lending themselves to it.
//!
//! Unlike general-purpose runtimes, Vinculum spawns no pool of workers. The
//! only thread it owns is the timer thread of a [`DispatchService`], started
//! the first time a task waits on a delay. Everything else runs on threads
//! the application controls.
//!
//! It offers:
//!
//! - **Lazy tasks** ([`Task`]) whose body does not start until awaited and
//!   whose outcome, value or failure, can be read any number of times
//! - **A blocking bridge** ([`sync_wait`]) from synchronous code into a task
//! - **Fan-in** ([`when_all_ready`]) over any number of tasks
//! - **A dispatch service** ([`DispatchService`]) with immediate and timed
//!   scheduling, cooperative cancellation and work tracking
//! - **A test attribute**, `#[vinculum::test]`, for `async fn` tests
//!
//! ## Quick Start
//!
//! ```rust
//! use std::thread;
//! use std::time::Duration;
//! use vinculum::cancel::CancellationToken;
//! use vinculum::{DispatchService, Task, sync_wait, when_all_ready};
//!
//! let service = DispatchService::new();
//! let worker = {
//!     let service = service.clone();
//!     thread::spawn(move || service.process_events())
//! };
//!
//! let greeting = {
//!     let service = service.clone();
//!     Task::new(async move {
//!         service
//!             .schedule_after(Duration::from_millis(5), CancellationToken::none())
//!             .await?;
//!
//!         let parts = when_all_ready([
//!             Task::ready(String::from("hello")),
//!             Task::ready(String::from("world")),
//!         ])
//!         .await;
//!
//!         let mut text = String::new();
//!         for part in parts {
//!             text.push_str(&part.into_result()?);
//!         }
//!         Ok(text)
//!     })
//! };
//!
//! assert_eq!(sync_wait(greeting).unwrap(), "helloworld");
//!
//! service.stop();
//! worker.join().unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`task`]: Lazy tasks and their readiness future
//! - [`cancel`]: Cancellation sources, tokens and registrations
//! - [`sync`]: Blocking synchronization primitives

mod error;
mod runtime;
mod service;
mod utils;

pub mod cancel;
pub mod sync;

pub use error::{Error, Result};
pub use runtime::task;
pub use runtime::{Task, WhenAllReady, WhenAllTask, WhenReady, sync_wait, when_all_ready};
pub use service::{
    DispatchService, Schedule, ServiceBuilder, TimedSchedule, WorkScope, resume_on, schedule_on,
};

pub use vinculum_macros::*;
