//! Core value types shared by the envelope parser, the store seam and the dispatcher.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Method of a sub-request inside a batch envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Merge,
    Patch,
}

impl HttpMethod {
    /// Every method accepted inside an envelope.
    pub const ALL: [HttpMethod; 6] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Merge,
        HttpMethod::Patch,
    ];

    /// Parses an exact, uppercase method token.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == token)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Merge => "MERGE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Only GET is served while the admission shutter is tripped.
    pub fn is_read_only(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }

    /// Methods still allowed in read/delete-only maintenance mode.
    pub fn is_read_or_delete(&self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }

    /// Whether a resource path for this method must carry an entity key.
    pub fn requires_key(&self) -> bool {
        matches!(
            self,
            HttpMethod::Put | HttpMethod::Delete | HttpMethod::Merge | HttpMethod::Patch
        )
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::parse(s).ok_or_else(|| DomainError::MethodFormat {
            method: s.to_string(),
        })
    }
}

/// Declared multiplicity of one association end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "0..1")]
    ZeroOrOne,
    #[serde(rename = "*")]
    Many,
}

impl Multiplicity {
    /// Parses the CSDL notation (`1`, `0..1`, `*`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Multiplicity::One),
            "0..1" => Some(Multiplicity::ZeroOrOne),
            "*" => Some(Multiplicity::Many),
            _ => None,
        }
    }

    /// True for ends that admit at most one linked entity.
    pub fn is_single_valued(&self) -> bool {
        !matches!(self, Multiplicity::Many)
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Multiplicity::One => "1",
            Multiplicity::ZeroOrOne => "0..1",
            Multiplicity::Many => "*",
        };
        f.write_str(s)
    }
}

/// An entity addressed by entity set and key, e.g. `Sales('k1')`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_set: String,
    pub key: String,
}

impl EntityRef {
    pub fn new(entity_set: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entity_set: entity_set.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}')", self.entity_set, self.key)
    }
}
