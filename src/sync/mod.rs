//! Offline-first synchronization between the remote post list and the local store.

mod pagination;
mod repository;

#[cfg(test)]
pub(crate) mod testing;

pub use pagination::{FeedController, FeedState};
pub use repository::{PostRepository, SyncError};
