#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

pub mod extraction;
pub mod factory;
pub mod store;
pub mod sweep;

pub use extraction::extract;
pub use factory::{StoreHandle, select_store};
pub use store::MemorySessionStore;
#[cfg(feature = "redis-backend")]
pub use store::RedisSessionStore;
pub use sweep::{Sweeper, spawn_sweeper};
