//! Feature storage seam and the edit sets produced by topology operations
//!
//! Geometry operations never talk to a store: they return an [`EditSet`] that
//! the caller commits against any [`FeatureStore`]. [`FeatureCollection`] is
//! the in-memory store, keeping an append-only log of applied changes.

use crate::{Feature, FeatureId, GeoEditError, Geometry, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Layer-addressed feature persistence used by the editing layer
pub trait FeatureStore {
    fn get_all_features(&self, layer: &str) -> Result<Vec<Feature>>;

    /// Store new features and return their assigned identities in input order
    fn add_features(
        &mut self,
        layer: &str,
        features: Vec<Feature>,
        change_tag: &str,
    ) -> Result<Vec<FeatureId>>;

    fn delete_features(&mut self, layer: &str, ids: &[FeatureId], change_tag: &str) -> Result<()>;

    fn update_features(
        &mut self,
        layer: &str,
        updates: Vec<(FeatureId, Geometry)>,
        change_tag: &str,
    ) -> Result<()>;
}

/// Result of an editing operation, applied as one undoable change
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EditSet {
    pub change_tag: String,
    /// Stored features replaced by the operation
    pub deleted: Vec<FeatureId>,
    /// New features, without identity
    pub added: Vec<Feature>,
    /// Geometry replacements for features edited in place
    pub updated: Vec<(FeatureId, Geometry)>,
}

impl EditSet {
    pub fn new(change_tag: impl Into<String>) -> Self {
        Self {
            change_tag: change_tag.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.added.is_empty() && self.updated.is_empty()
    }

    /// Apply to a store: delete, then add, then update
    ///
    /// Returns the identities assigned to the added features.
    pub fn commit<S>(self, store: &mut S, layer: &str) -> Result<Vec<FeatureId>>
    where
        S: FeatureStore + ?Sized,
    {
        if !self.deleted.is_empty() {
            store.delete_features(layer, &self.deleted, &self.change_tag)?;
        }
        let ids = if self.added.is_empty() {
            Vec::new()
        } else {
            store.add_features(layer, self.added, &self.change_tag)?
        };
        if !self.updated.is_empty() {
            store.update_features(layer, self.updated, &self.change_tag)?;
        }
        Ok(ids)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChangeKind {
    Added,
    Deleted,
    Updated,
}

/// One entry of the change log
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChangeRecord {
    pub change_tag: String,
    pub layer: String,
    pub kind: ChangeKind,
    pub ids: Vec<FeatureId>,
}

/// Summary of a collection's contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollectionInfo {
    pub layer_count: usize,
    pub feature_count: usize,
    pub point_count: usize,
}

/// In-memory feature store
///
/// Identities are allocated from a single counter shared by all layers and are
/// never reused.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureCollection {
    layers: HashMap<String, BTreeMap<FeatureId, Feature>>,
    next_id: u64,
    history: Vec<ChangeRecord>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty layer; existing layers are left untouched
    pub fn add_layer(&mut self, name: impl Into<String>) {
        self.layers.entry(name.into()).or_default();
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Layer names in sorted order
    pub fn layer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.layers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn get_feature(&self, layer: &str, id: FeatureId) -> Result<&Feature> {
        self.layer(layer)?
            .get(&id)
            .ok_or(GeoEditError::UnknownFeature(id))
    }

    pub fn feature_count(&self, layer: &str) -> Result<usize> {
        Ok(self.layer(layer)?.len())
    }

    /// Applied changes, oldest first
    pub fn history(&self) -> &[ChangeRecord] {
        &self.history
    }

    pub fn get_info(&self) -> CollectionInfo {
        let features = self.layers.values().flat_map(BTreeMap::values);
        CollectionInfo {
            layer_count: self.layers.len(),
            feature_count: self.layers.values().map(BTreeMap::len).sum(),
            point_count: features.map(|f| f.geometry().point_count()).sum(),
        }
    }

    fn layer(&self, name: &str) -> Result<&BTreeMap<FeatureId, Feature>> {
        self.layers
            .get(name)
            .ok_or_else(|| GeoEditError::UnknownLayer(name.to_string()))
    }

    fn layer_mut(&mut self, name: &str) -> Result<&mut BTreeMap<FeatureId, Feature>> {
        self.layers
            .get_mut(name)
            .ok_or_else(|| GeoEditError::UnknownLayer(name.to_string()))
    }

    fn record(&mut self, layer: &str, kind: ChangeKind, ids: Vec<FeatureId>, change_tag: &str) {
        tracing::debug!("{:?} {} feature(s) in layer {} ({})", kind, ids.len(), layer, change_tag);
        self.history.push(ChangeRecord {
            change_tag: change_tag.to_string(),
            layer: layer.to_string(),
            kind,
            ids,
        });
    }
}

impl FeatureStore for FeatureCollection {
    fn get_all_features(&self, layer: &str) -> Result<Vec<Feature>> {
        Ok(self.layer(layer)?.values().cloned().collect())
    }

    fn add_features(
        &mut self,
        layer: &str,
        features: Vec<Feature>,
        change_tag: &str,
    ) -> Result<Vec<FeatureId>> {
        let first_id = self.next_id;
        let target = self.layer_mut(layer)?;
        let mut ids = Vec::with_capacity(features.len());
        for (offset, feature) in (first_id..).zip(features) {
            let id = FeatureId(offset);
            target.insert(id, feature.assign_id(id));
            ids.push(id);
        }
        self.next_id = first_id + ids.len() as u64;
        self.record(layer, ChangeKind::Added, ids.clone(), change_tag);
        Ok(ids)
    }

    /// All identities are checked before anything is removed
    fn delete_features(&mut self, layer: &str, ids: &[FeatureId], change_tag: &str) -> Result<()> {
        let target = self.layer_mut(layer)?;
        if let Some(missing) = ids.iter().find(|id| !target.contains_key(id)) {
            return Err(GeoEditError::UnknownFeature(*missing));
        }
        for id in ids {
            target.remove(id);
        }
        self.record(layer, ChangeKind::Deleted, ids.to_vec(), change_tag);
        Ok(())
    }

    fn update_features(
        &mut self,
        layer: &str,
        updates: Vec<(FeatureId, Geometry)>,
        change_tag: &str,
    ) -> Result<()> {
        let target = self.layer_mut(layer)?;
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !target.contains_key(id)) {
            return Err(GeoEditError::UnknownFeature(*missing));
        }
        let mut ids = Vec::with_capacity(updates.len());
        for (id, geometry) in updates {
            if let Some(feature) = target.get_mut(&id) {
                *feature = feature.replace_geometry(geometry);
            }
            ids.push(id);
        }
        self.record(layer, ChangeKind::Updated, ids, change_tag);
        Ok(())
    }
}
