use super::instance::{Instance, InstanceError, Property, PropertyValue};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON parsing error for '{origin}': {source}")]
    Json {
        origin: String,
        source: serde_json::Error,
    },
    #[error("Schema '{0}' could not be found locally or remotely")]
    NotFound(String),
    #[error("Failed to fetch schema '{url}': {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("Unsupported property type '{type_name}' for property '{property}'")]
    UnsupportedType { property: String, type_name: String },
    #[error("Property '{property}' refers to undeclared dimension '{dimension}'")]
    UnknownDimension { property: String, dimension: String },
}

/// Element type of an entity property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Float,
    Int,
    Bool,
}

impl PropertyType {
    fn parse(type_name: &str) -> Option<Self> {
        let lowered = type_name.to_ascii_lowercase();
        match lowered.as_str() {
            "float" | "double" | "float32" | "float64" => Some(Self::Float),
            "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16"
            | "uint32" | "uint64" => Some(Self::Int),
            "bool" | "boolean" => Some(Self::Bool),
            s if s.starts_with("string") || s == "str" => Some(Self::String),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionDef {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub property_type: PropertyType,
    /// Dimension names, outermost first. Empty for scalars.
    pub shape: Vec<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

/// A metadata schema ("entity") describing the dimensions and typed properties
/// of the records created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub uri: String,
    pub description: String,
    pub dimensions: Vec<DimensionDef>,
    pub properties: Vec<PropertyDef>,
}

#[derive(Deserialize)]
struct RawProperty {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default, alias = "dims")]
    shape: Vec<String>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct RawDimension {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

/// Entities list dimensions and properties either as a JSON object keyed by
/// name or as an array of objects carrying a `name` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    #[serde(deserialize_with = "ordered_entries")]
    Keyed(Vec<(String, T)>),
    Listed(Vec<T>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionEntry {
    Description(String),
    Full(RawDimension),
}

#[derive(Deserialize)]
struct RawEntity {
    uri: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    dimensions: Option<Listing<DimensionEntry>>,
    #[serde(default)]
    properties: Option<Listing<RawProperty>>,
}

/// Deserializes a JSON object into `(key, value)` pairs in document order.
fn ordered_entries<'de, D, T>(deserializer: D) -> Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct EntriesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor(PhantomData))
}

impl Entity {
    /// Parses an entity from its JSON text. `origin` names the source in error messages.
    pub fn from_json_str(content: &str, origin: &str) -> Result<Self, SchemaError> {
        let raw: RawEntity = serde_json::from_str(content).map_err(|source| SchemaError::Json {
            origin: origin.to_string(),
            source,
        })?;
        Self::from_raw(raw, origin)
    }

    /// Loads an entity from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        Self::from_json_str(&content, &path.to_string_lossy())
    }

    fn from_raw(raw: RawEntity, origin: &str) -> Result<Self, SchemaError> {
        let dimensions: Vec<DimensionDef> = match raw.dimensions {
            Some(Listing::Keyed(entries)) => entries
                .into_iter()
                .map(|(name, entry)| DimensionDef {
                    description: match entry {
                        DimensionEntry::Description(d) => d,
                        DimensionEntry::Full(full) => full.description,
                    },
                    name,
                })
                .collect(),
            Some(Listing::Listed(entries)) => entries
                .into_iter()
                .map(|entry| match entry {
                    DimensionEntry::Full(full) => DimensionDef {
                        name: full.name,
                        description: full.description,
                    },
                    DimensionEntry::Description(name) => DimensionDef {
                        name,
                        description: String::new(),
                    },
                })
                .collect(),
            None => Vec::new(),
        };

        let raw_properties: Vec<(String, RawProperty)> = match raw.properties {
            Some(Listing::Keyed(entries)) => entries,
            Some(Listing::Listed(entries)) => entries
                .into_iter()
                .map(|p| {
                    let name = p.name.clone().ok_or_else(|| SchemaError::Json {
                        origin: origin.to_string(),
                        source: de::Error::custom("property without a name"),
                    })?;
                    Ok((name, p))
                })
                .collect::<Result<_, SchemaError>>()?,
            None => Vec::new(),
        };

        let mut properties = Vec::with_capacity(raw_properties.len());
        for (name, p) in raw_properties {
            let property_type =
                PropertyType::parse(&p.type_name).ok_or_else(|| SchemaError::UnsupportedType {
                    property: name.clone(),
                    type_name: p.type_name.clone(),
                })?;
            if let Some(unknown) = p
                .shape
                .iter()
                .find(|d| !dimensions.iter().any(|dim| &dim.name == *d))
            {
                return Err(SchemaError::UnknownDimension {
                    property: name,
                    dimension: unknown.clone(),
                });
            }
            properties.push(PropertyDef {
                name,
                property_type,
                shape: p.shape,
                unit: p.unit,
                description: p.description,
            });
        }

        Ok(Self {
            uri: raw.uri,
            description: raw.description,
            dimensions,
            properties,
        })
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Creates a record of this entity with every property zero-initialized.
    ///
    /// `dims` gives the size of each declared dimension in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::DimensionMismatch`] if `dims` does not match the
    /// number of declared dimensions.
    pub fn instantiate(&self, dims: &[usize], id: Option<&str>) -> Result<Instance, InstanceError> {
        if dims.len() != self.dimensions.len() {
            return Err(InstanceError::DimensionMismatch {
                meta: self.uri.clone(),
                expected: self.dimensions.len(),
                found: dims.len(),
            });
        }
        let sizes: BTreeMap<String, usize> = self
            .dimensions
            .iter()
            .zip(dims)
            .map(|(d, &n)| (d.name.clone(), n))
            .collect();

        let properties = self
            .properties
            .iter()
            .map(|p| {
                let shape: Vec<usize> = p.shape.iter().map(|d| sizes[d]).collect();
                let len = shape.iter().product();
                let value = PropertyValue::zeroed(p.property_type, len);
                (p.name.clone(), Property::new(p.property_type, shape, value))
            })
            .collect();

        Ok(Instance::new(&self.uri, id, sizes, properties))
    }
}
