//! # Cache Manager
//!
//! Read-through caching for idempotent aggregate reads.
//!
//! ```text
//! CacheRegistry                 <- named instances from config
//!   └── CacheManager            <- typed JSON values, errors become misses
//!         └── CacheProvider     <- enum dispatch
//!               ├── Moka        <- LRU + per-entry TTL, process-local
//!               └── NoOp        <- always miss
//! ```
//!
//! Eligibility and reward decisions are never cached: they depend on the time
//! of day and on counters that change with every completion.

pub mod errors;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use manager::CacheManager;
pub use provider::CacheProvider;
pub use providers::{MokaCacheService, NoOpCacheService};
pub use registry::CacheRegistry;
pub use traits::{CacheService, KeyPattern};
