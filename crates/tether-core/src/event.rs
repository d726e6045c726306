//! Change events and the listener trait
//!
//! Every committed mutation of the registry produces exactly one
//! notification cycle: for each registered listener, a generic
//! [`AssociationListener::on_changed`] call tagged with a [`ChangeKind`],
//! followed by exactly one kind-specific callback.

use serde::{Deserialize, Serialize};

use crate::association::Association;

/// What kind of mutation a change notification reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A record was inserted
    Added,
    /// A record was removed
    Removed,
    /// A record was replaced and its hardware address changed
    UpdatedAddressChanged,
    /// A record was replaced without touching its hardware address
    UpdatedAddressUnchanged,
}

impl ChangeKind {
    /// Whether this kind reports an update (of either flavor)
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            ChangeKind::UpdatedAddressChanged | ChangeKind::UpdatedAddressUnchanged
        )
    }
}

/// Callback target notified after each committed mutation
///
/// Callbacks run synchronously on the mutating thread, after the registry
/// has released all of its internal locks. A listener may therefore
/// re-enter any read or write operation of the registry, and may register
/// or unregister listeners, without deadlocking.
///
/// All methods have empty default bodies; implement only the ones you
/// care about.
pub trait AssociationListener: Send + Sync {
    /// Generic notification, delivered before the kind-specific callback
    fn on_changed(&self, kind: ChangeKind, association: &Association) {
        let _ = (kind, association);
    }

    /// A record was inserted
    fn on_added(&self, association: &Association) {
        let _ = association;
    }

    /// A record was removed; `association` carries its last known value
    fn on_removed(&self, association: &Association) {
        let _ = association;
    }

    /// A record was replaced; `address_changed` reports whether the
    /// hardware address differs from the previous record
    fn on_updated(&self, association: &Association, address_changed: bool) {
        let _ = (association, address_changed);
    }
}
