//! Tiered Cache Module
//!
//! Orchestrates tier 1 (in-process [`BoundedStore`](crate::cache::BoundedStore)),
//! tier 2 (a [`RemoteTier`]) and tier 3 (a [`Loader`]).
//!
//! ```text
//! get ─► tier 1 ─hit─► return
//!          │ miss
//!          ▼
//!        tier 2 ─hit─► promote to tier 1 ─► return
//!          │ miss / unavailable
//!          ▼
//!        loader ─ok─► populate tier 1 + tier 2 ─► return
//!          │ err
//!          ▼
//!       NotFound
//! ```

mod loader;
mod orchestrator;
mod remote;
mod stats;

pub use loader::{loader_fn, FnLoader, Loader};
pub use orchestrator::TieredCache;
pub use remote::{InMemoryRemote, RemoteTier};
pub use stats::{TierOutcome, TieredStats};
