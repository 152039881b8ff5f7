//! In-memory caches shared by every buy and sell task
//!
//! Each cache is an independently locked map. Locks are never held
//! across an await.

pub mod market;
pub mod pool;
pub mod pool_info;

pub use market::MarketCache;
pub use pool::PoolCache;
pub use pool_info::PoolInfoCache;
