pub mod config;
pub mod dispatch;
pub mod errors;
pub mod store;

// Domain types live in the shared crate; re-exported so callers only need
// one dependency.
pub mod models {
    pub use dispatch_common::models::*;
}
