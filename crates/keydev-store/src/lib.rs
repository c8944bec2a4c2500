//! KeyDev Store - persistence collaborator interface
//!
//! The workflow core assumes a document store that runs each mutation as one
//! serializable unit. This crate defines that contract and ships an
//! in-memory implementation:
//! - [`DocumentStore`]: opens atomic units of work
//! - [`StoreTx`]: reads, writes and indexed queries inside a unit
//! - [`MemoryStore`]: mutex-serialized store over persistent maps
//!
//! # Example
//!
//! ```rust
//! use keydev_store::{DocumentStore, MemoryStore, StoreError};
//!
//! let store = MemoryStore::new();
//! let highest = store
//!     .read(|tx| tx.highest_human_id())
//!     .unwrap();
//! assert!(highest.is_none());
//!
//! // A failed unit publishes nothing.
//! let result: Result<(), StoreError> = store.transaction(|_tx| {
//!     Err(StoreError::Unavailable("simulated".into()))
//! });
//! assert!(result.is_err());
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod memory;
pub mod tx;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use tx::{DocumentStore, StoreTx};
