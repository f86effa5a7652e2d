//! Typed parsers for sub-request bodies.

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{EntityRef, ResourcePath};
use crate::error::{DomainError, DomainResult};

/// Member carrying the entity key in an entity body.
pub const ID_PROPERTY: &str = "__id";

/// JSON body of an entity create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityBody {
    /// Key taken from `__id`, or a generated one.
    pub id: String,
    /// Whether `id` was generated because the body had no `__id`.
    pub generated_id: bool,
    /// Remaining members, `__id` excluded.
    pub properties: Map<String, Value>,
}

impl EntityBody {
    pub fn parse(body: &str) -> DomainResult<Self> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| DomainError::json(e.to_string()))?;
        let Value::Object(mut properties) = value else {
            return Err(DomainError::json("entity body must be a JSON object"));
        };
        let (id, generated_id) = match properties.remove(ID_PROPERTY) {
            Some(Value::String(id)) if !id.is_empty() => (id, false),
            Some(_) => return Err(DomainError::json("__id must be a non-empty string")),
            None => (Uuid::new_v4().simple().to_string(), true),
        };
        Ok(Self {
            id,
            generated_id,
            properties,
        })
    }
}

/// JSON body of a `$links` request: `{"uri": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBody {
    pub uri: String,
    /// Entity addressed by the last segment of `uri`.
    pub target: EntityRef,
}

impl LinkBody {
    pub fn parse(body: &str) -> DomainResult<Self> {
        if body.trim().is_empty() {
            return Err(DomainError::json("link body is empty"));
        }
        let value: Value =
            serde_json::from_str(body).map_err(|e| DomainError::json(e.to_string()))?;
        let Value::Object(members) = value else {
            return Err(DomainError::json("link body must be a JSON object"));
        };
        if members.len() != 1 {
            return Err(DomainError::json("link body must only contain uri"));
        }
        let uri = match members.get("uri") {
            Some(Value::String(uri)) if !uri.is_empty() => uri.clone(),
            _ => return Err(DomainError::json("uri is missing")),
        };
        let target =
            link_target(&uri).ok_or_else(|| DomainError::LinkUriFormat { uri: uri.clone() })?;
        Ok(Self { uri, target })
    }
}

fn link_target(uri: &str) -> Option<EntityRef> {
    let (_, last) = uri.rsplit_once('/')?;
    match ResourcePath::parse(last)? {
        ResourcePath::Entity { entity_set, key } if !entity_set.is_empty() => {
            Some(EntityRef { entity_set, key })
        }
        _ => None,
    }
}
