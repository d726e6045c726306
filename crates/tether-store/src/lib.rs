//! # Tether Store
//!
//! Concurrent in-memory registry of device associations.
//!
//! [`AssociationStore`] holds the authoritative id -> record map together
//! with a secondary address index and a memoized per-user view, and fans
//! out change notifications to registered
//! [`AssociationListener`](tether_core::AssociationListener)s after every
//! committed mutation.
//!
//! The store is a passive data structure: it creates no threads and
//! performs no I/O. The owning service constructs it from the persisted
//! record set and drives all mutations; lookups are safe from any thread.
//!
//! ```
//! use tether_core::{Association, AssociationId, UserId};
//! use tether_store::AssociationStore;
//!
//! let store = AssociationStore::default();
//! store.add(
//!     Association::new(AssociationId(1), UserId(0), "com.example.watch")
//!         .with_address("AA:BB:CC:DD:EE:FF".parse().unwrap()),
//! );
//!
//! let watch = store.association_by_id(AssociationId(1)).unwrap();
//! assert_eq!(watch.package_name, "com.example.watch");
//! ```

pub mod store;

pub use store::AssociationStore;
