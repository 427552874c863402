use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when constructing an [`ObjectClass`] from a blank label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Object class must not be empty")]
pub struct InvalidObjectClass;

/// Label naming a category of detected object, e.g. `"cat"`.
///
/// Acts as the key for accumulated counts, so it is guaranteed non-empty
/// and ordered lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectClass(String);

impl ObjectClass {
    /// Creates an object class, rejecting empty or whitespace-only labels.
    pub fn new(label: impl Into<String>) -> Result<Self, InvalidObjectClass> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(InvalidObjectClass);
        }
        Ok(Self(label))
    }

    /// Returns the label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the class and returns the owned label.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectClass {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectClass {
    type Error = InvalidObjectClass;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        Self::new(label)
    }
}

impl TryFrom<&str> for ObjectClass {
    type Error = InvalidObjectClass;

    fn try_from(label: &str) -> Result<Self, Self::Error> {
        Self::new(label)
    }
}

impl From<ObjectClass> for String {
    fn from(class: ObjectClass) -> Self {
        class.0
    }
}

/// Number of occurrences recorded for one object class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectCount {
    pub object_class: ObjectClass,
    pub count: u64,
}

impl ObjectCount {
    /// Creates a count for the given class.
    pub fn new(object_class: ObjectClass, count: u64) -> Self {
        Self {
            object_class,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_class_rejects_blank_labels() {
        assert_eq!(ObjectClass::new(""), Err(InvalidObjectClass));
        assert_eq!(ObjectClass::new("   "), Err(InvalidObjectClass));
    }

    #[test]
    fn object_class_preserves_label() {
        let class = ObjectClass::new("traffic light").unwrap();
        assert_eq!(class.as_str(), "traffic light");
        assert_eq!(class.to_string(), "traffic light");
    }

    #[test]
    fn object_class_orders_lexicographically() {
        let cat = ObjectClass::new("cat").unwrap();
        let dog = ObjectClass::new("dog").unwrap();
        assert!(cat < dog);
    }

    #[test]
    fn object_count_serializes_as_plain_fields() {
        let count = ObjectCount::new(ObjectClass::new("cat").unwrap(), 2);
        let json = serde_json::to_value(&count).unwrap();
        assert_eq!(json, serde_json::json!({"object_class": "cat", "count": 2}));
    }

    #[test]
    fn object_count_deserialization_validates_class() {
        let result: Result<ObjectCount, _> =
            serde_json::from_str(r#"{"object_class": "", "count": 1}"#);
        assert!(result.is_err());
    }
}
