//! The association registry
//!
//! [`AssociationStore`] owns the authoritative id -> record map, a
//! secondary address -> id-set index, a lazily memoized per-user view,
//! and the set of registered listeners.
//!
//! ## Locking discipline
//!
//! Two independent locks exist and are never held at the same time by
//! store code:
//!
//! - the **data lock**, guarding `by_id`, `by_address`, and
//!   `per_user_cache` as one consistency unit;
//! - the **listener lock**, guarding the listener set.
//!
//! Every mutation commits under the data lock, releases it, snapshots
//! the listener set under the listener lock, releases that too, and only
//! then invokes callbacks. A listener can therefore re-enter any store
//! operation (reads, writes, or listener registration) from inside a
//! callback without deadlocking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use tether_core::{
    Association, AssociationId, AssociationListener, ChangeKind, MacAddress, UserId,
};

/// Record state: one consistency unit under the data lock
#[derive(Default)]
struct Records {
    /// Primary store, single source of truth for record content
    by_id: HashMap<AssociationId, Association>,
    /// Secondary index; every id in a set refers to a record in `by_id`
    /// carrying exactly that address
    by_address: HashMap<MacAddress, HashSet<AssociationId>>,
    /// Memoized result of filtering `by_id` by user; entries are deleted,
    /// never refreshed in place
    per_user_cache: HashMap<UserId, Vec<Association>>,
}

impl Records {
    fn index_address(&mut self, id: AssociationId, address: Option<MacAddress>) {
        if let Some(address) = address {
            self.by_address.entry(address).or_default().insert(id);
        }
    }

    fn unindex_address(&mut self, id: AssociationId, address: Option<MacAddress>) {
        if let Some(address) = address
            && let Some(ids) = self.by_address.get_mut(&address)
        {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_address.remove(&address);
            }
        }
    }

    fn invalidate_user_cache(&mut self, user_id: UserId) {
        self.per_user_cache.remove(&user_id);
    }

    /// Compute-or-return the memoized per-user view. Caller holds the
    /// data lock.
    fn associations_for_user(&mut self, user_id: UserId) -> Vec<Association> {
        if let Some(cached) = self.per_user_cache.get(&user_id) {
            return cached.clone();
        }

        let associations: Vec<Association> = self
            .by_id
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        self.per_user_cache.insert(user_id, associations.clone());
        associations
    }
}

/// Concurrent in-memory registry of association records
///
/// Constructed once by the owning service from the persisted record set;
/// the owner is the sole caller of [`add`](Self::add),
/// [`update`](Self::update), and [`remove`](Self::remove). Lookups may be
/// called from any thread at any time.
///
/// "Not found" conditions (duplicate `add`, `update`/`remove` of an
/// unknown id) are deliberate silent no-ops, observable only through
/// `tracing` output. They are not errors: the owner already validated the
/// mutation against its own state.
pub struct AssociationStore {
    records: Mutex<Records>,
    listeners: Mutex<Vec<Arc<dyn AssociationListener>>>,
}

impl AssociationStore {
    /// Build a store from the initial record collection
    ///
    /// Caller contract: ids in `initial` are unique. Duplicates are not
    /// detected; the later record silently wins in the primary map and
    /// the index state for the loser is unspecified. No events are
    /// emitted for construction.
    pub fn new(initial: impl IntoIterator<Item = Association>) -> Self {
        let mut records = Records::default();
        for association in initial {
            let id = association.id;
            let address = association.mac_address;
            records.by_id.insert(id, association);
            records.index_address(id, address);
        }

        Self {
            records: Mutex::new(records),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Insert a new record
    ///
    /// No-op if a record with the same id is already present.
    pub fn add(&self, association: Association) {
        debug!(association = %association.short_string(), "add");

        let id = association.id;
        {
            let mut records = self.records.lock();
            if records.by_id.contains_key(&id) {
                warn!(%id, "association already stored, ignoring add");
                return;
            }

            let address = association.mac_address;
            let user_id = association.user_id;
            records.by_id.insert(id, association.clone());
            records.index_address(id, address);
            records.invalidate_user_cache(user_id);
        }

        self.broadcast(ChangeKind::Added, &association);
    }

    /// Replace the record with the same id
    ///
    /// No-op if no such record exists, or if `updated` equals the current
    /// record in all fields (equal updates are not re-broadcast).
    ///
    /// The per-user view is only invalidated when the user scope itself
    /// changed; after a content-only update,
    /// [`associations_for_user`](Self::associations_for_user) may keep
    /// returning the previous record value until the next
    /// membership-changing mutation.
    pub fn update(&self, updated: Association) {
        debug!(updated = %updated.short_string(), "update");

        let id = updated.id;
        let address_changed;
        {
            let mut records = self.records.lock();
            let Some(current) = records.by_id.get(&id).cloned() else {
                debug!(%id, "association does not exist, ignoring update");
                return;
            };

            if current == updated {
                debug!(%id, "no changes, ignoring update");
                return;
            }

            records.by_id.insert(id, updated.clone());

            // Polarity matters here: the index moves only when the
            // addresses are unequal.
            address_changed = current.mac_address != updated.mac_address;
            if address_changed {
                records.unindex_address(id, current.mac_address);
                records.index_address(id, updated.mac_address);
            }

            if current.user_id != updated.user_id {
                records.invalidate_user_cache(current.user_id);
                records.invalidate_user_cache(updated.user_id);
            }
        }

        let kind = if address_changed {
            ChangeKind::UpdatedAddressChanged
        } else {
            ChangeKind::UpdatedAddressUnchanged
        };
        self.broadcast(kind, &updated);
    }

    /// Remove a record by id
    ///
    /// No-op if no such record exists. The `Removed` event carries the
    /// record's last known value.
    pub fn remove(&self, id: AssociationId) {
        debug!(%id, "remove");

        let removed;
        {
            let mut records = self.records.lock();
            match records.by_id.remove(&id) {
                Some(association) => removed = association,
                None => {
                    debug!(%id, "association is not stored, ignoring remove");
                    return;
                }
            }

            records.unindex_address(id, removed.mac_address);
            records.invalidate_user_cache(removed.user_id);
        }

        self.broadcast(ChangeKind::Removed, &removed);
    }

    /// Get a point-in-time snapshot of all records
    pub fn associations(&self) -> Vec<Association> {
        self.records.lock().by_id.values().cloned().collect()
    }

    /// Get a record by id
    pub fn association_by_id(&self, id: AssociationId) -> Option<Association> {
        self.records.lock().by_id.get(&id).cloned()
    }

    /// Get all records owned by a user
    ///
    /// This is the only cache-consuming lookup. The memoized view is
    /// refreshed on membership changes (add/remove, user-scope change)
    /// but deliberately not on content-only updates; see
    /// [`update`](Self::update).
    pub fn associations_for_user(&self, user_id: UserId) -> Vec<Association> {
        self.records.lock().associations_for_user(user_id)
    }

    /// Get all records owned by a package within a user scope
    pub fn associations_for_package(&self, user_id: UserId, package_name: &str) -> Vec<Association> {
        let mut associations = self.associations_for_user(user_id);
        associations.retain(|a| a.package_name == package_name);
        associations
    }

    /// Find the record for a device address within a user+package scope
    pub fn association_for_package_with_address(
        &self,
        user_id: UserId,
        package_name: &str,
        address: MacAddress,
    ) -> Option<Association> {
        self.associations_by_address(address)
            .into_iter()
            .find(|a| a.belongs_to_package(user_id, package_name))
    }

    /// Get all records bound to a device address
    ///
    /// The secondary index is consulted only as an existence check; the
    /// returned records come from re-filtering the primary map by exact
    /// address equality, so a stale index entry can at worst cost a scan,
    /// never return a wrong record.
    pub fn associations_by_address(&self, address: MacAddress) -> Vec<Association> {
        let records = self.records.lock();
        match records.by_address.get(&address) {
            None => Vec::new(),
            Some(ids) if ids.is_empty() => Vec::new(),
            Some(_) => records
                .by_id
                .values()
                .filter(|a| a.mac_address == Some(address))
                .cloned()
                .collect(),
        }
    }

    /// Number of stored records
    pub fn count(&self) -> usize {
        self.records.lock().by_id.len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Register a listener
    ///
    /// Idempotent: registering the same `Arc` twice has the effect of
    /// registering it once. Safe to call from inside a callback.
    pub fn register_listener(&self, listener: Arc<dyn AssociationListener>) {
        let mut listeners = self.listeners.lock();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Unregister a listener
    ///
    /// No-op if the listener is not registered. Safe to call from inside
    /// a callback; the current notification cycle still runs against the
    /// snapshot taken when it started.
    pub fn unregister_listener(&self, listener: &Arc<dyn AssociationListener>) {
        self.listeners
            .lock()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Run one notification cycle against a snapshot of the listener set.
    /// Both locks are released before any callback runs.
    fn broadcast(&self, kind: ChangeKind, association: &Association) {
        let snapshot: Vec<Arc<dyn AssociationListener>> = self.listeners.lock().clone();

        for listener in snapshot {
            listener.on_changed(kind, association);

            match kind {
                ChangeKind::Added => listener.on_added(association),
                ChangeKind::Removed => listener.on_removed(association),
                ChangeKind::UpdatedAddressChanged => listener.on_updated(association, true),
                ChangeKind::UpdatedAddressUnchanged => listener.on_updated(association, false),
            }
        }
    }
}

impl Default for AssociationStore {
    fn default() -> Self {
        Self::new([])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    fn record(id: u32, user: u32, pkg: &str) -> Association {
        Association::new(AssociationId(id), UserId(user), pkg)
    }

    /// Checks the index-consistency invariant directly against the
    /// internal maps.
    fn assert_index_consistent(store: &AssociationStore) {
        let records = store.records.lock();
        for (address, ids) in &records.by_address {
            assert!(!ids.is_empty(), "empty index set left behind for {address}");
            for id in ids {
                let association = records
                    .by_id
                    .get(id)
                    .unwrap_or_else(|| panic!("index references missing record {id}"));
                assert_eq!(association.mac_address, Some(*address));
            }
        }
        for association in records.by_id.values() {
            if let Some(address) = association.mac_address {
                let ids = records
                    .by_address
                    .get(&address)
                    .unwrap_or_else(|| panic!("record {} not indexed", association.id));
                assert!(ids.contains(&association.id));
            }
        }
    }

    #[test]
    fn test_construct_builds_both_indices() {
        let store = AssociationStore::new([
            record(1, 5, "a"),
            record(2, 5, "b").with_address(addr("AA:BB:CC:DD:EE:FF")),
        ]);

        assert_eq!(store.count(), 2);
        assert_eq!(store.associations_by_address(addr("AA:BB:CC:DD:EE:FF")).len(), 1);
        assert_index_consistent(&store);
    }

    #[test]
    fn test_add_duplicate_id_is_noop() {
        let store = AssociationStore::default();
        store.add(record(1, 5, "a"));
        store.add(record(1, 7, "b").with_address(addr("AA:BB:CC:DD:EE:FF")));

        assert_eq!(store.count(), 1);
        let stored = store.association_by_id(AssociationId(1)).unwrap();
        assert_eq!(stored.user_id, UserId(5));
        assert!(store.associations_by_address(addr("AA:BB:CC:DD:EE:FF")).is_empty());
        assert_index_consistent(&store);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let store = AssociationStore::default();
        store.update(record(9, 5, "a"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let store = AssociationStore::new([record(1, 5, "a")]);
        store.remove(AssociationId(9));
        assert_eq!(store.count(), 1);
        assert_index_consistent(&store);
    }

    #[test]
    fn test_update_moves_address_index() {
        let store = AssociationStore::new([
            record(2, 5, "b").with_address(addr("AA:BB:CC:DD:EE:FF")),
        ]);

        store.update(record(2, 5, "b").with_address(addr("CC:DD:EE:FF:00:11")));

        assert!(store.associations_by_address(addr("AA:BB:CC:DD:EE:FF")).is_empty());
        let moved = store.associations_by_address(addr("CC:DD:EE:FF:00:11"));
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].id, AssociationId(2));
        assert_index_consistent(&store);
    }

    #[test]
    fn test_update_can_clear_address() {
        let store = AssociationStore::new([
            record(2, 5, "b").with_address(addr("AA:BB:CC:DD:EE:FF")),
        ]);

        store.update(record(2, 5, "b"));

        assert!(store.associations_by_address(addr("AA:BB:CC:DD:EE:FF")).is_empty());
        assert_index_consistent(&store);
    }

    #[test]
    fn test_user_scope_change_refreshes_both_views() {
        let store = AssociationStore::new([record(1, 5, "a")]);
        // Warm both caches.
        assert_eq!(store.associations_for_user(UserId(5)).len(), 1);
        assert!(store.associations_for_user(UserId(6)).is_empty());

        // Same record, new user scope.
        let mut moved = store.association_by_id(AssociationId(1)).unwrap();
        moved.user_id = UserId(6);
        store.update(moved);

        assert!(store.associations_for_user(UserId(5)).is_empty());
        assert_eq!(store.associations_for_user(UserId(6)).len(), 1);
    }

    #[test]
    fn test_content_only_update_leaves_per_user_view_stale() {
        let store = AssociationStore::new([record(1, 5, "a")]);
        // Warm the cache.
        assert_eq!(store.associations_for_user(UserId(5))[0].display_name, None);

        let mut renamed = store.association_by_id(AssociationId(1)).unwrap();
        renamed.display_name = Some("Watch".to_string());
        store.update(renamed);

        // Documented weak consistency: the memoized view still holds the
        // pre-update record.
        assert_eq!(store.associations_for_user(UserId(5))[0].display_name, None);
        // The primary map is current.
        assert_eq!(
            store.association_by_id(AssociationId(1)).unwrap().display_name,
            Some("Watch".to_string())
        );

        // The next membership-changing mutation refreshes the view.
        store.add(record(2, 5, "b"));
        let refreshed = store.associations_for_user(UserId(5));
        assert!(refreshed
            .iter()
            .any(|a| a.display_name == Some("Watch".to_string())));
    }

    #[test]
    fn test_per_user_view_tracks_membership() {
        let store = AssociationStore::new([record(1, 5, "a")]);
        assert_eq!(store.associations_for_user(UserId(5)).len(), 1);

        store.add(record(2, 5, "b"));
        assert_eq!(store.associations_for_user(UserId(5)).len(), 2);

        store.remove(AssociationId(1));
        let remaining = store.associations_for_user(UserId(5));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, AssociationId(2));
    }

    #[test]
    fn test_associations_for_package_filters() {
        let store = AssociationStore::new([
            record(1, 5, "a"),
            record(2, 5, "b"),
            record(3, 6, "a"),
        ]);

        let for_a = store.associations_for_package(UserId(5), "a");
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].id, AssociationId(1));
    }

    #[test]
    fn test_association_for_package_with_address() {
        let shared = addr("AA:BB:CC:DD:EE:FF");
        let store = AssociationStore::new([
            record(1, 5, "a").with_address(shared),
            record(2, 6, "a").with_address(shared),
        ]);

        let found = store
            .association_for_package_with_address(UserId(6), "a", shared)
            .unwrap();
        assert_eq!(found.id, AssociationId(2));

        assert!(store
            .association_for_package_with_address(UserId(6), "b", shared)
            .is_none());
        assert!(store
            .association_for_package_with_address(UserId(7), "a", shared)
            .is_none());
    }

    #[test]
    fn test_shared_address_between_records() {
        let shared = addr("AA:BB:CC:DD:EE:FF");
        let store = AssociationStore::new([
            record(1, 5, "a").with_address(shared),
            record(2, 6, "b").with_address(shared),
        ]);

        assert_eq!(store.associations_by_address(shared).len(), 2);

        store.remove(AssociationId(1));
        let remaining = store.associations_by_address(shared);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, AssociationId(2));
        assert_index_consistent(&store);
    }

    #[test]
    fn test_snapshot_is_detached_from_store() {
        let store = AssociationStore::new([record(1, 5, "a")]);
        let snapshot = store.associations();

        store.remove(AssociationId(1));
        assert_eq!(snapshot.len(), 1);
        assert!(store.is_empty());
    }
}
