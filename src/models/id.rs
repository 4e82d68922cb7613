use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for users and accounts.
///
/// Ids are ordered so per-owner aggregates can live in a `BTreeMap` and come
/// out in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(Id::new(), Id::new());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&Id::from("mei")).unwrap(), r#""mei""#);
    }

    #[test]
    fn test_ids_order_lexicographically() {
        let mut ids = vec![Id::from("carol"), Id::from("alice"), Id::from("bob")];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(Id::as_str).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }
}
