//! Domain identifier types with validation
//!
//! Newtype wrappers for entity types, primary keys and the opaque references
//! (legal reasons, purposes) that flow through anonymization.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity type identifier
///
/// Names a kind of record in the underlying store, conventionally in
/// `app.model` form (e.g. `shop.customer`).
///
/// # Examples
///
/// ```
/// use obscura::domain::ids::EntityType;
/// use std::str::FromStr;
///
/// let ty = EntityType::from_str("shop.customer").unwrap();
/// assert_eq!(ty.as_str(), "shop.customer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    /// Creates a new EntityType from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(EntityType)` if the name is non-empty and contains no
    /// whitespace, `Err` otherwise
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Entity type cannot be empty".to_string());
        }
        if name.chars().any(char::is_whitespace) {
            return Err(format!("Entity type '{name}' cannot contain whitespace"));
        }
        Ok(Self(name.to_lowercase()))
    }

    /// Returns the entity type as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}

impl AsRef<str> for EntityType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Primary key of a record
///
/// Integer keys order numerically and always sort before text keys, which
/// gives bulk cursors a strict total order to resume from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    /// Integer primary key
    Int(i64),
    /// Text primary key (UUIDs, slugs)
    Text(String),
}

impl ObjectId {
    /// Returns the integer key, if this is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Int(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Int(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ObjectId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ObjectId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl TryFrom<&serde_json::Value> for ObjectId {
    type Error = String;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .ok_or_else(|| format!("Primary key {n} is not an integer")),
            serde_json::Value::String(s) if !s.is_empty() => Ok(Self::Text(s.clone())),
            other => Err(format!("Value {other} cannot be used as a primary key")),
        }
    }
}

impl From<&ObjectId> for serde_json::Value {
    fn from(value: &ObjectId) -> Self {
        match value {
            ObjectId::Int(v) => serde_json::Value::from(*v),
            ObjectId::Text(v) => serde_json::Value::from(v.clone()),
        }
    }
}

/// Reference to a legal reason record
///
/// Opaque to the anonymization core: it is attached to anonymization markers
/// and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegalReasonRef(Uuid);

impl LegalReasonRef {
    /// Creates a reference from an existing legal reason id
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a fresh reference (useful for tests and ad-hoc jobs)
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying id
    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for LegalReasonRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a processing purpose
///
/// Consumed opaquely; it is passed down the traversal unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurposeRef(String);

impl PurposeRef {
    /// Creates a new purpose reference from its slug
    pub fn new(slug: impl Into<String>) -> Result<Self, String> {
        let slug = slug.into();
        if slug.trim().is_empty() {
            return Err("Purpose slug cannot be empty".to_string());
        }
        Ok(Self(slug))
    }

    /// Returns the purpose slug
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PurposeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_type_valid() {
        let ty = EntityType::new("Shop.Customer").unwrap();
        assert_eq!(ty.as_str(), "shop.customer");
        assert_eq!(ty.to_string(), "shop.customer");
    }

    #[test]
    fn test_entity_type_invalid() {
        assert!(EntityType::new("").is_err());
        assert!(EntityType::new("   ").is_err());
        assert!(EntityType::new("shop customer").is_err());
    }

    #[test]
    fn test_entity_type_serde() {
        let ty: EntityType = serde_json::from_value(json!("shop.email")).unwrap();
        assert_eq!(ty.as_str(), "shop.email");
        assert!(serde_json::from_value::<EntityType>(json!("")).is_err());
    }

    #[test]
    fn test_object_id_ordering() {
        let mut ids = vec![
            ObjectId::from("b"),
            ObjectId::Int(10),
            ObjectId::from("a"),
            ObjectId::Int(9),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                ObjectId::Int(9),
                ObjectId::Int(10),
                ObjectId::from("a"),
                ObjectId::from("b"),
            ]
        );
    }

    #[test]
    fn test_object_id_from_json() {
        assert_eq!(ObjectId::try_from(&json!(42)).unwrap(), ObjectId::Int(42));
        assert_eq!(
            ObjectId::try_from(&json!("abc")).unwrap(),
            ObjectId::from("abc")
        );
        assert!(ObjectId::try_from(&json!(1.5)).is_err());
        assert!(ObjectId::try_from(&json!(null)).is_err());
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId::Int(7).to_string(), "7");
        assert_eq!(ObjectId::from("x-1").to_string(), "x-1");
    }

    #[test]
    fn test_purpose_ref() {
        assert!(PurposeRef::new("marketing").is_ok());
        assert!(PurposeRef::new(" ").is_err());
    }
}
