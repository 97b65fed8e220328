//! The dispatch service.
//!
//! A [`DispatchService`] owns no worker threads. Any thread can lend itself
//! to the service by running its event loop; suspended work is resumed on
//! those threads:
//!
//! - immediately, through [`DispatchService::schedule`],
//! - after a delay, through [`DispatchService::schedule_after`], tracked by
//!   a dedicated timer thread started on first use.
//!
//! [`schedule_on`] and [`resume_on`] wrap whole tasks in those hops.

mod builder;
mod core;
mod on;
mod port;
mod schedule;
mod timer;

pub use builder::ServiceBuilder;
pub use self::core::{DispatchService, WorkScope};
pub use on::{resume_on, schedule_on};
pub use schedule::{Schedule, TimedSchedule};
