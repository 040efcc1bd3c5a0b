//! Features: identity, geometry and attributes as handed over by the editing layer

use crate::Geometry;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque identity assigned by a feature store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

/// Attribute map, ordered by field name
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A geometry with identity and attributes
///
/// Features created by this crate carry no identity (`id() == None`) until a
/// [`FeatureStore`](crate::FeatureStore) assigns one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Feature {
    id: Option<FeatureId>,
    geometry: Geometry,
    attributes: Attributes,
}

impl Feature {
    /// Create a feature that has not been stored yet
    pub fn new(geometry: Geometry, attributes: Attributes) -> Self {
        Self {
            id: None,
            geometry,
            attributes,
        }
    }

    /// Create a feature with a known identity
    pub fn with_id(id: FeatureId, geometry: Geometry, attributes: Attributes) -> Self {
        Self {
            id: Some(id),
            geometry,
            attributes,
        }
    }

    #[inline]
    pub fn id(&self) -> Option<FeatureId> {
        self.id
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[inline]
    pub fn into_geometry(self) -> Geometry {
        self.geometry
    }

    /// Same identity and attributes, new geometry
    pub fn replace_geometry(&self, geometry: Geometry) -> Self {
        Self {
            id: self.id,
            geometry,
            attributes: self.attributes.clone(),
        }
    }

    /// New, unstored feature with a copy of this feature's attributes
    pub fn derive(&self, geometry: Geometry) -> Self {
        Self {
            id: None,
            geometry,
            attributes: self.attributes.clone(),
        }
    }

    pub(crate) fn assign_id(mut self, id: FeatureId) -> Self {
        self.id = Some(id);
        self
    }
}
