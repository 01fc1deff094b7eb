//! Provider registry
//!
//! In-memory catalog of registered providers with copy-on-write snapshot
//! semantics: every write builds a new catalog and swaps it in atomically,
//! so readers clone an `Arc` and never observe a partially-updated view,
//! and never block writers.
//!
//! Unregistration tombstones rather than removes: sessions holding a
//! challenge against a provider that was unregistered mid-flight can still
//! validate it, but tombstoned providers are never selected for new
//! challenges.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::descriptor::{DescriptorFilter, ProviderDescriptor};
use crate::error::{ProviderError, ProviderResult};
use crate::ids::{ProviderId, ProviderKey};
use crate::traits::AuthProvider;

/// A registered provider: its descriptor plus the plugin instance.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub descriptor: ProviderDescriptor,
    pub plugin: Arc<dyn AuthProvider>,
    /// Set by [`ProviderRegistry::unregister`]; tombstoned providers are
    /// resolvable by key but excluded from queries.
    pub tombstoned: bool,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("descriptor", &self.descriptor)
            .field("tombstoned", &self.tombstoned)
            .finish_non_exhaustive()
    }
}

/// Outcome of a registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new `(id, version)` entry was added.
    Inserted,
    /// The key existed with a different descriptor and was replaced.
    Replaced,
    /// The key existed with an identical descriptor; nothing changed.
    Unchanged,
}

/// Immutable catalog snapshot.
///
/// All lookups on a snapshot see one consistent catalog state; a snapshot
/// taken before a write keeps serving the old state.
#[derive(Default)]
pub struct CatalogSnapshot {
    // BTreeMap keeps iteration deterministic by (id, version).
    entries: BTreeMap<ProviderKey, RegisteredProvider>,
}

impl CatalogSnapshot {
    /// Resolve a provider by exact key. Tombstoned entries are returned so
    /// in-flight sessions can still complete validation.
    #[must_use]
    pub fn get(&self, key: &ProviderKey) -> Option<&RegisteredProvider> {
        self.entries.get(key)
    }

    /// Resolve a provider by exact key, erroring when absent.
    pub fn require(&self, key: &ProviderKey) -> ProviderResult<&RegisteredProvider> {
        self.get(key).ok_or_else(|| ProviderError::NotRegistered {
            key: key.clone(),
        })
    }

    /// The latest live (non-tombstoned) registration of `id`.
    #[must_use]
    pub fn latest(&self, id: &ProviderId) -> Option<&RegisteredProvider> {
        self.entries
            .values()
            .filter(|entry| &entry.descriptor.id == id && !entry.tombstoned)
            .max_by_key(|entry| entry.descriptor.version)
    }

    /// Query live descriptors matching `filter`.
    ///
    /// Only the latest live version of each id is considered. Results are
    /// ordered by descending assurance level, then ascending id, so
    /// selection is deterministic.
    #[must_use]
    pub fn query(&self, filter: &DescriptorFilter) -> Vec<&RegisteredProvider> {
        let mut latest_per_id: BTreeMap<&ProviderId, &RegisteredProvider> = BTreeMap::new();
        for entry in self.entries.values() {
            if entry.tombstoned {
                continue;
            }
            latest_per_id
                .entry(&entry.descriptor.id)
                .and_modify(|current| {
                    if entry.descriptor.version > current.descriptor.version {
                        *current = entry;
                    }
                })
                .or_insert(entry);
        }

        let mut matches: Vec<&RegisteredProvider> = latest_per_id
            .into_values()
            .filter(|entry| filter.matches(&entry.descriptor))
            .collect();
        matches.sort_by(|a, b| {
            b.descriptor
                .assurance_level
                .cmp(&a.descriptor.assurance_level)
                .then_with(|| a.descriptor.id.cmp(&b.descriptor.id))
        });
        matches
    }

    /// Number of entries, tombstoned included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The provider registry.
///
/// Reads go through [`ProviderRegistry::snapshot`]; writes clone the
/// current catalog, apply the change, and swap the `Arc`. All operations
/// are synchronous.
pub struct ProviderRegistry {
    catalog: RwLock<Arc<CatalogSnapshot>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(Arc::new(CatalogSnapshot::default())),
        }
    }

    /// Current catalog snapshot. Cheap (`Arc` clone) and never blocks on
    /// concurrent writes once taken.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.catalog.read().expect("registry lock poisoned"))
    }

    /// Register a provider under its descriptor's `(id, version)` key.
    ///
    /// Idempotent: re-registering an identical descriptor is a no-op. A
    /// changed descriptor under the same key replaces the entry; a new
    /// version supersedes latest-by-id lookup without removing the old
    /// version.
    pub fn register(&self, plugin: Arc<dyn AuthProvider>) -> RegistrationOutcome {
        let descriptor = plugin.descriptor().clone();
        let key = descriptor.key();

        let mut guard = self.catalog.write().expect("registry lock poisoned");
        if let Some(existing) = guard.entries.get(&key) {
            if existing.descriptor == descriptor && !existing.tombstoned {
                debug!(provider = %key, "provider already registered, no-op");
                return RegistrationOutcome::Unchanged;
            }
        }

        let mut next = CatalogSnapshot {
            entries: guard.entries.clone(),
        };
        let replaced = next
            .entries
            .insert(
                key.clone(),
                RegisteredProvider {
                    descriptor,
                    plugin,
                    tombstoned: false,
                },
            )
            .is_some();
        *guard = Arc::new(next);

        info!(provider = %key, replaced, "provider registered");
        if replaced {
            RegistrationOutcome::Replaced
        } else {
            RegistrationOutcome::Inserted
        }
    }

    /// Tombstone a registration.
    ///
    /// Returns `false` when the key was never registered. In-flight
    /// sessions can still resolve the tombstoned entry by key.
    pub fn unregister(&self, key: &ProviderKey) -> bool {
        let mut guard = self.catalog.write().expect("registry lock poisoned");
        if !guard.entries.contains_key(key) {
            return false;
        }

        let mut next = CatalogSnapshot {
            entries: guard.entries.clone(),
        };
        if let Some(entry) = next.entries.get_mut(key) {
            entry.tombstoned = true;
        }
        *guard = Arc::new(next);

        info!(provider = %key, "provider unregistered (tombstoned)");
        true
    }
}
