//! Marker collections and tap dispatch.
//!
//! Every marker added through a [`MarkerManager`] belongs to exactly one
//! collection. A tap on a marker goes to the listener of its collection.

use crate::error::{ClusterError, Result};
use crate::render::surface::{MarkerId, MarkerOptions, RenderingSurface};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

/// Listener for taps on markers of one collection. Returns whether the tap
/// was consumed.
pub type MarkerClickListener = Arc<dyn Fn(MarkerId) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionId(usize);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection#{}", self.0)
    }
}

#[derive(Default)]
struct Collection {
    name: Option<String>,
    markers: FxHashSet<MarkerId>,
    listener: Option<MarkerClickListener>,
}

#[derive(Default)]
pub struct MarkerManager {
    collections: Vec<Collection>,
    names: FxHashMap<String, CollectionId>,
    owners: FxHashMap<MarkerId, CollectionId>,
}

impl MarkerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_collection(&mut self) -> CollectionId {
        self.collections.push(Collection::default());
        CollectionId(self.collections.len() - 1)
    }

    /// Create a collection that can be looked up by `name` later.
    pub fn new_named_collection(&mut self, name: &str) -> Result<CollectionId> {
        if self.names.contains_key(name) {
            return Err(ClusterError::DuplicateCollection(name.to_string()));
        }
        let id = self.new_collection();
        self.collections[id.0].name = Some(name.to_string());
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn collection(&self, name: &str) -> Result<CollectionId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ClusterError::UnknownCollection(name.to_string()))
    }

    pub fn collection_name(&self, collection: CollectionId) -> Option<&str> {
        self.collections.get(collection.0)?.name.as_deref()
    }

    fn get_mut(&mut self, collection: CollectionId) -> Result<&mut Collection> {
        self.collections
            .get_mut(collection.0)
            .ok_or_else(|| ClusterError::UnknownCollection(collection.to_string()))
    }

    /// Draw a marker on `surface` and record it under `collection`.
    pub fn add_marker<S>(
        &mut self,
        collection: CollectionId,
        surface: &mut S,
        options: MarkerOptions,
    ) -> Result<MarkerId>
    where
        S: RenderingSurface + ?Sized,
    {
        let entry = self.get_mut(collection)?;
        let marker = surface.add_marker(options);
        entry.markers.insert(marker);
        self.owners.insert(marker, collection);
        Ok(marker)
    }

    /// Remove a marker from its collection and the surface. Markers this
    /// manager does not know are left alone.
    pub fn remove<S>(&mut self, marker: MarkerId, surface: &mut S) -> bool
    where
        S: RenderingSurface + ?Sized,
    {
        let Some(owner) = self.owners.remove(&marker) else {
            return false;
        };
        if let Some(collection) = self.collections.get_mut(owner.0) {
            collection.markers.remove(&marker);
        }
        surface.remove_marker(marker);
        true
    }

    /// Remove every marker of `collection` from the surface.
    pub fn clear<S>(&mut self, collection: CollectionId, surface: &mut S) -> Result<()>
    where
        S: RenderingSurface + ?Sized,
    {
        let markers = std::mem::take(&mut self.get_mut(collection)?.markers);
        for marker in markers {
            self.owners.remove(&marker);
            surface.remove_marker(marker);
        }
        Ok(())
    }

    pub fn markers(&self, collection: CollectionId) -> Vec<MarkerId> {
        self.collections
            .get(collection.0)
            .map(|c| c.markers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn collection_of(&self, marker: MarkerId) -> Option<CollectionId> {
        self.owners.get(&marker).copied()
    }

    pub fn set_click_listener(
        &mut self,
        collection: CollectionId,
        listener: Option<MarkerClickListener>,
    ) -> Result<()> {
        self.get_mut(collection)?.listener = listener;
        Ok(())
    }

    /// Listener of the collection owning `marker`. Clone it out and release
    /// the manager before calling it.
    pub fn click_listener_for(&self, marker: MarkerId) -> Option<MarkerClickListener> {
        let owner = self.owners.get(&marker)?;
        self.collections.get(owner.0)?.listener.clone()
    }
}

impl fmt::Debug for MarkerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerManager")
            .field("collections", &self.collections.len())
            .field("markers", &self.owners.len())
            .finish()
    }
}
