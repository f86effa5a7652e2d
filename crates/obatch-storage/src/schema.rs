//! Collection schema: entity types and associations.
//!
//! Loaded from a JSON file of the form:
//! ```json
//! {
//!   "collections": {
//!     "cell/box/col": {
//!       "entity_types": ["Sales", "Product"],
//!       "associations": [
//!         { "source": "Sales", "source_multiplicity": "0..1",
//!           "target": "Product", "target_multiplicity": "1" }
//!       ]
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use obatch_domain::model::Multiplicity;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// An association between two entity types with both end multiplicities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationSchema {
    pub source: String,
    pub source_multiplicity: Multiplicity,
    pub target: String,
    pub target_multiplicity: Multiplicity,
}

/// Entity types and associations of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub associations: Vec<AssociationSchema>,
}

impl CollectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_type(mut self, name: impl Into<String>) -> Self {
        self.entity_types.push(name.into());
        self
    }

    pub fn with_association(
        mut self,
        source: impl Into<String>,
        source_multiplicity: Multiplicity,
        target: impl Into<String>,
        target_multiplicity: Multiplicity,
    ) -> Self {
        self.associations.push(AssociationSchema {
            source: source.into(),
            source_multiplicity,
            target: target.into(),
            target_multiplicity,
        });
        self
    }

    pub fn has_entity_type(&self, name: &str) -> bool {
        self.entity_types.iter().any(|t| t == name)
    }

    /// Multiplicity of the `to` end of the association between `from` and `to`.
    pub fn multiplicity(&self, from: &str, to: &str) -> Option<Multiplicity> {
        self.associations.iter().find_map(|a| {
            if a.source == from && a.target == to {
                Some(a.target_multiplicity)
            } else if a.target == from && a.source == to {
                Some(a.source_multiplicity)
            } else {
                None
            }
        })
    }

    /// Checks that every association names declared entity types.
    pub fn validate(&self) -> StorageResult<()> {
        for a in &self.associations {
            for end in [&a.source, &a.target] {
                if !self.has_entity_type(end) {
                    return Err(StorageError::SchemaError {
                        message: format!("association refers to undeclared entity type '{end}'"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Schema file: collections keyed by `cell/box/collection`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    pub collections: BTreeMap<String, CollectionSchema>,
}

impl SchemaFile {
    /// Reads and validates a schema file.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| StorageError::SchemaError {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> StorageResult<Self> {
        let file: SchemaFile =
            serde_json::from_str(content).map_err(|e| StorageError::SchemaError {
                message: e.to_string(),
            })?;
        for schema in file.collections.values() {
            schema.validate()?;
        }
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sales_schema() -> CollectionSchema {
        CollectionSchema::new()
            .with_entity_type("Sales")
            .with_entity_type("Product")
            .with_association("Sales", Multiplicity::ZeroOrOne, "Product", Multiplicity::One)
    }

    #[test]
    fn test_multiplicity_is_read_from_the_far_end() {
        let schema = sales_schema();
        assert_eq!(schema.multiplicity("Sales", "Product"), Some(Multiplicity::One));
        assert_eq!(
            schema.multiplicity("Product", "Sales"),
            Some(Multiplicity::ZeroOrOne)
        );
        assert_eq!(schema.multiplicity("Sales", "Sales"), None);
    }

    #[test]
    fn test_validate_rejects_undeclared_types() {
        let schema = CollectionSchema::new().with_entity_type("Sales").with_association(
            "Sales",
            Multiplicity::Many,
            "Ghost",
            Multiplicity::Many,
        );
        assert!(matches!(
            schema.validate(),
            Err(StorageError::SchemaError { .. })
        ));
    }

    #[test]
    fn test_load_schema_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"collections":{{"c/b/col":{{"entity_types":["Sales","Product"],
            "associations":[{{"source":"Sales","source_multiplicity":"*",
            "target":"Product","target_multiplicity":"0..1"}}]}}}}}}"#
        )
        .unwrap();

        let loaded = SchemaFile::load(file.path()).unwrap();
        let schema = &loaded.collections["c/b/col"];
        assert_eq!(
            schema.multiplicity("Sales", "Product"),
            Some(Multiplicity::ZeroOrOne)
        );
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = SchemaFile::load("/nonexistent/schema.json");
        assert!(matches!(result, Err(StorageError::SchemaError { .. })));
    }
}
