//! # Tether Core
//!
//! Core types, events, and errors for the Tether association registry.
//!
//! An *association* is a lightweight fact binding a device identity
//! (optionally a hardware address) to the user and package that own it.
//! This crate defines the record and its identifiers; the registry that
//! stores and indexes them lives in `tether-store`.
//!
//! ## Key Types
//!
//! - [`Association`]: the record itself
//! - [`AssociationId`] / [`UserId`]: typed identifiers
//! - [`MacAddress`]: 6-octet hardware address value type
//! - [`ChangeKind`] / [`AssociationListener`]: change-notification surface

pub mod address;
pub mod association;
pub mod error;
pub mod event;

// Re-export main types
pub use address::*;
pub use association::*;
pub use error::*;
pub use event::*;
