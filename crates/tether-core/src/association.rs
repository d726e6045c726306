//! Association records
//!
//! An [`Association`] binds a device identity, optionally carrying a
//! hardware address, to the user and package that own it. Records are
//! immutable values from the registry's point of view: an "update" is a
//! whole replacement record sharing the same id.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::address::MacAddress;

/// Unique identifier of an association record
///
/// Assigned by the owning service before insertion and stable for the
/// record's lifetime.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssociationId(pub u32);

/// Identifier of the user scope that owns a record
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UserId(pub u32);

/// An association between a device and an owning user/package
///
/// Only `id`, `user_id`, `package_name`, and `mac_address` participate in
/// the registry's own logic; the remaining fields are inert metadata,
/// compared only through full structural equality (used to detect no-op
/// updates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Unique key, caller-assigned
    pub id: AssociationId,
    /// Owning user scope
    pub user_id: UserId,
    /// Owning application within that user scope
    pub package_name: String,
    /// Hardware address of the associated device, if any
    pub mac_address: Option<MacAddress>,
    /// Human-readable device name
    pub display_name: Option<String>,
    /// Device profile the association was created under
    pub device_profile: Option<String>,
    /// Whether the owning application manages the device itself
    pub self_managed: bool,
    /// Whether the owner wants wake-ups when the device is nearby
    pub notify_on_device_nearby: bool,
    /// When the association was approved
    pub time_approved: DateTime<Utc>,
}

impl Association {
    /// Create a new association record
    pub fn new(id: AssociationId, user_id: UserId, package_name: impl Into<String>) -> Self {
        Self {
            id,
            user_id,
            package_name: package_name.into(),
            mac_address: None,
            display_name: None,
            device_profile: None,
            self_managed: false,
            notify_on_device_nearby: false,
            time_approved: Utc::now(),
        }
    }

    /// Set the hardware address
    pub fn with_address(mut self, address: MacAddress) -> Self {
        self.mac_address = Some(address);
        self
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the device profile
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.device_profile = Some(profile.into());
        self
    }

    /// Mark as self-managed
    pub fn with_self_managed(mut self, self_managed: bool) -> Self {
        self.self_managed = self_managed;
        self
    }

    /// Whether this record belongs to the given user and package
    pub fn belongs_to_package(&self, user_id: UserId, package_name: &str) -> bool {
        self.user_id == user_id && self.package_name == package_name
    }

    /// Short display form (for logging)
    pub fn short_string(&self) -> String {
        format!(
            "id={} u{}/{} addr={}",
            self.id,
            self.user_id,
            self.package_name,
            self.mac_address
                .map(|a| a.to_string())
                .unwrap_or_else(|| "none".to_string()),
        )
    }
}
