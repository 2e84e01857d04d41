//! Foundation utilities shared across the Aster engine crates.
//!
//! Currently this covers two concerns:
//!
//! - [`TrackingCollection`]: an ordered collection that records every
//!   add/remove as a [`CollectionEvent`] for later draining, replacing
//!   callback-style change listeners with a pull model.
//! - [`ThreadPool`]: scoped worker threads with a chunked
//!   [`dispatch`](ThreadPool::dispatch) primitive for batch workloads.

mod collections;
mod thread_pool;

pub use collections::{CollectionAction, CollectionEvent, TrackingCollection};
pub use thread_pool::{Scope, ThreadPool};
