//! Refresh sessions: the last-known result per query key, auto-refresh
//! polling, and overlap suppression.
//!
//! A [`RefreshCoordinator`] belongs to one view. Each session it creates runs
//! on its own task and publishes [`SessionSnapshot`]s through a watch
//! channel, so holders always see the latest state without polling.

mod coordinator;
mod session;
pub mod types;

pub use coordinator::{RefreshCoordinator, RefreshHandle};
pub use types::{RefreshState, SessionSnapshot};
