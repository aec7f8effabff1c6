//! `sitemapgen-icc`: inter-component communication primitives for the
//! sitemap generator.
//!
//! - [`ring`]: fixed-capacity circular array of `UrlRecord`s, no internal
//!   synchronization.
//! - [`mutex`]: named binary semaphore set gating the ring buffer.
//! - [`filelock`]: named exclusive file lock serializing setup/teardown.
//! - [`pipe`]: composes the three into the one-way `UrlPipe` transport.

pub mod filelock;
pub mod mutex;
pub mod pipe;
pub mod ring;
mod shm_layout;

pub use mutex::{Mutex, MutexError, MutexSet, WaitResult};
pub use pipe::{PipeConfig, PipeError, PipeReceiver, PipeSender};
