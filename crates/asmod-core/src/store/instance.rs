use super::entity::PropertyType;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum InstanceError {
    #[error("Instance of '{meta}' has no property '{property}'")]
    UnknownProperty { meta: String, property: String },
    #[error("Property '{property}' expects {expected:?} values, got {found:?}")]
    TypeMismatch {
        property: String,
        expected: PropertyType,
        found: PropertyType,
    },
    #[error("Property '{property}' expects {expected} elements (shape {shape:?}), got {found}")]
    ShapeMismatch {
        property: String,
        shape: Vec<usize>,
        expected: usize,
        found: usize,
    },
    #[error("Entity '{meta}' expects {expected} dimension sizes, got {found}")]
    DimensionMismatch {
        meta: String,
        expected: usize,
        found: usize,
    },
}

/// Flat, row-major storage for the elements of a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(Vec<String>),
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
}

impl PropertyValue {
    pub(crate) fn zeroed(property_type: PropertyType, len: usize) -> Self {
        match property_type {
            PropertyType::String => Self::String(vec![String::new(); len]),
            PropertyType::Float => Self::Float(vec![0.0; len]),
            PropertyType::Int => Self::Int(vec![0; len]),
            PropertyType::Bool => Self::Bool(vec![false; len]),
        }
    }

    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::String(_) => PropertyType::String,
            Self::Float(_) => PropertyType::Float,
            Self::Int(_) => PropertyType::Int,
            Self::Bool(_) => PropertyType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::String(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(vec![value])
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(vec![value])
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(values: Vec<f64>) -> Self {
        Self::Float(values)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        Self::String(values)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(vec![value.to_string()])
    }
}

/// A property slot of an instance: its type, resolved shape and current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    #[serde(rename = "type")]
    property_type: PropertyType,
    shape: Vec<usize>,
    value: PropertyValue,
}

impl Property {
    pub(crate) fn new(property_type: PropertyType, shape: Vec<usize>, value: PropertyValue) -> Self {
        Self {
            property_type,
            shape,
            value,
        }
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }
}

/// A record conforming to an [`Entity`](super::entity::Entity).
///
/// Instances are created by [`Entity::instantiate`](super::entity::Entity::instantiate)
/// with fixed dimension sizes; [`Instance::set`] only accepts values of the
/// declared type with exactly the declared number of elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instance {
    uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    meta: String,
    dimensions: BTreeMap<String, usize>,
    properties: BTreeMap<String, Property>,
}

impl Instance {
    pub(crate) fn new(
        meta: &str,
        id: Option<&str>,
        dimensions: BTreeMap<String, usize>,
        properties: BTreeMap<String, Property>,
    ) -> Self {
        // Named instances get a stable uuid so the same id always maps to the same record uuid.
        let uuid = match id {
            Some(id) => Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes()),
            None => Uuid::new_v4(),
        };
        Self {
            uuid,
            id: id.map(str::to_string),
            meta: meta.to_string(),
            dimensions,
            properties,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The uri of the entity this instance conforms to.
    pub fn meta(&self) -> &str {
        &self.meta
    }

    pub fn dimension(&self, name: &str) -> Option<usize> {
        self.dimensions.get(name).copied()
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.property(name).map(Property::shape)
    }

    pub fn get_strings(&self, name: &str) -> Option<&[String]> {
        match self.property(name)?.value() {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_floats(&self, name: &str) -> Option<&[f64]> {
        match self.property(name)?.value() {
            PropertyValue::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a scalar float property.
    pub fn get_scalar_float(&self, name: &str) -> Option<f64> {
        let property = self.property(name)?;
        if !property.shape().is_empty() {
            return None;
        }
        match property.value() {
            PropertyValue::Float(v) => v.first().copied(),
            _ => None,
        }
    }

    /// Replaces the value of a property.
    ///
    /// # Errors
    ///
    /// Returns an error if the property does not exist, has another element
    /// type, or the element count differs from the product of its shape.
    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) -> Result<(), InstanceError> {
        let value = value.into();
        let property = self
            .properties
            .get_mut(name)
            .ok_or_else(|| InstanceError::UnknownProperty {
                meta: self.meta.clone(),
                property: name.to_string(),
            })?;
        if value.property_type() != property.property_type {
            return Err(InstanceError::TypeMismatch {
                property: name.to_string(),
                expected: property.property_type,
                found: value.property_type(),
            });
        }
        let expected: usize = property.shape.iter().product();
        if value.len() != expected {
            return Err(InstanceError::ShapeMismatch {
                property: name.to_string(),
                shape: property.shape.clone(),
                expected,
                found: value.len(),
            });
        }
        property.value = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::entity::Entity;
    use super::*;

    fn point_instance() -> Instance {
        let entity = Entity::from_json_str(
            r#"{
                "uri": "http://example.com/meta/0.1/Point",
                "dimensions": {"n": "points"},
                "properties": {
                    "xs": {"type": "float64", "shape": ["n"]},
                    "name": {"type": "string"},
                    "count": {"type": "int32"}
                }
            }"#,
            "test",
        )
        .unwrap();
        entity.instantiate(&[3], Some("p")).unwrap()
    }

    #[test]
    fn set_accepts_matching_values() {
        let mut instance = point_instance();
        instance.set("xs", vec![1.0, 2.0, 3.0]).unwrap();
        instance.set("name", "origin").unwrap();
        instance.set("count", 3_i64).unwrap();
        assert_eq!(instance.get_floats("xs").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(instance.get_strings("name").unwrap(), &["origin"]);
    }

    #[test]
    fn set_rejects_unknown_property() {
        let mut instance = point_instance();
        assert!(matches!(
            instance.set("ys", 1.0),
            Err(InstanceError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut instance = point_instance();
        assert_eq!(
            instance.set("xs", vec!["a".to_string(); 3]),
            Err(InstanceError::TypeMismatch {
                property: "xs".into(),
                expected: PropertyType::Float,
                found: PropertyType::String,
            })
        );
    }

    #[test]
    fn set_rejects_wrong_element_count_and_keeps_old_value() {
        let mut instance = point_instance();
        assert!(matches!(
            instance.set("xs", vec![1.0, 2.0]),
            Err(InstanceError::ShapeMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
        assert_eq!(instance.get_floats("xs").unwrap(), &[0.0; 3]);
    }

    #[test]
    fn named_instances_get_deterministic_uuids() {
        assert_eq!(point_instance().uuid(), point_instance().uuid());
    }

    #[test]
    fn serializes_flat_values() {
        let mut instance = point_instance();
        instance.set("xs", vec![1.0, 2.0, 3.0]).unwrap();
        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["meta"], "http://example.com/meta/0.1/Point");
        assert_eq!(json["dimensions"]["n"], 3);
        assert_eq!(json["properties"]["xs"]["shape"], serde_json::json!([3]));
        assert_eq!(json["properties"]["xs"]["value"], serde_json::json!([1.0, 2.0, 3.0]));
    }
}
