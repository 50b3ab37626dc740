//! Transactional storage for the hostel booking system.
//!
//! Every record carries a [`Version`]. A [`Transaction`] remembers the
//! version of each record it read and commits its writes as one
//! [`ChangeSet`]; the commit fails with
//! [`StoreError::ConcurrencyConflict`] if any of those records changed in the
//! meantime, and nothing is written.

pub mod change_set;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod transaction;
pub mod version;

pub use change_set::{Change, ChangeSet};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::Store;
pub use transaction::Transaction;
pub use version::{Version, Versioned};
