/// Persistent monitor state: backend trait, cache and Postgres table
pub mod backend;
pub mod postgres;
pub mod state_store;

pub use backend::{MemoryStateBackend, StateBackend, StoreFuture};
pub use postgres::{create_pool, PgStateBackend, DEFAULT_TABLE};
pub use state_store::StateStore;
