//! Resource path grammar for batch sub-requests.
//!
//! Recognised shapes (the query string is split off beforehand):
//! ```text
//! Sales                         entity set
//! Sales('k1')                   entity
//! Sales('k1')/_SalesDetail      navigation property
//! Sales('k1')/_Product('p1')    navigation property with key
//! Sales('k1')/$links/_Product   links collection
//! Sales('k1')/$links/_Product('p1')
//! ```

use std::fmt;

use nom::{
    bytes::complete::{tag, take_till},
    combinator::{all_consuming, opt},
    error::{context, ContextError, ParseError, VerboseError},
    sequence::{delimited, preceded, tuple},
    IResult,
};

use super::{EntityRef, HttpMethod};

/// A parsed resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourcePath {
    /// `Set`
    EntitySet { entity_set: String },
    /// `Set('key')`
    Entity { entity_set: String, key: String },
    /// `Set('key')/_Property[('key')]`, property stored without the leading underscore.
    NavigationProperty {
        source: EntityRef,
        property: String,
        key: Option<String>,
    },
    /// `Set('key')/$links/_Target[('key')]`, target stored without the leading underscore.
    Links {
        source: EntityRef,
        target_type: String,
        target_key: Option<String>,
    },
}

// ============ Helper Parsers ============

/// Entity set or property name: everything up to the key predicate.
fn name<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    take_till(|c| c == '(')(input)
}

/// Source key predicate `('key')`.
fn key_predicate<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    context(
        "key predicate",
        delimited(tag("('"), take_till(|c| c == '\''), tag("')")),
    )(input)
}

/// Trailing key predicate on a navigation or links target; may not contain `)`.
fn target_key<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    context(
        "target key",
        delimited(tag("('"), take_till(|c| c == '\'' || c == ')'), tag("')")),
    )(input)
}

fn source<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, EntityRef, E> {
    let (rest, (set, key)) = tuple((name, key_predicate))(input)?;
    Ok((rest, EntityRef::new(set, key)))
}

// ============ Path Parsers ============

fn links_path<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, ResourcePath, E> {
    let (rest, (source, target, key)) = context(
        "links path",
        tuple((source, preceded(tag("/$links/"), name), opt(target_key))),
    )(input)?;
    Ok((
        rest,
        ResourcePath::Links {
            source,
            target_type: target.strip_prefix('_').unwrap_or(target).to_string(),
            target_key: key.map(str::to_string),
        },
    ))
}

fn navigation_path<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, ResourcePath, E> {
    let (rest, (source, property, key)) = context(
        "navigation property path",
        tuple((source, preceded(tag("/_"), name), opt(target_key))),
    )(input)?;
    Ok((
        rest,
        ResourcePath::NavigationProperty {
            source,
            property: property.to_string(),
            key: key.map(str::to_string),
        },
    ))
}

fn entity_path<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, ResourcePath, E> {
    let (rest, (set, key)) = context("entity path", tuple((name, opt(key_predicate))))(input)?;
    let path = match key {
        Some(key) => ResourcePath::Entity {
            entity_set: set.to_string(),
            key: key.to_string(),
        },
        None => ResourcePath::EntitySet {
            entity_set: set.to_string(),
        },
    };
    Ok((rest, path))
}

// ============ Public API ============

impl ResourcePath {
    /// Parses the path part of a request line (without query string).
    ///
    /// Returns `None` when the path matches none of the recognised shapes.
    pub fn parse(path: &str) -> Option<Self> {
        if path.contains('/') {
            if let Ok((_, p)) = all_consuming(links_path::<VerboseError<&str>>)(path) {
                return Some(p);
            }
            return all_consuming(navigation_path::<VerboseError<&str>>)(path)
                .ok()
                .map(|(_, p)| p);
        }
        all_consuming(entity_path::<VerboseError<&str>>)(path)
            .ok()
            .map(|(_, p)| p)
    }

    /// Whether this path may be combined with a query string.
    pub fn accepts_query(&self) -> bool {
        matches!(
            self,
            ResourcePath::EntitySet { .. } | ResourcePath::Entity { .. }
        )
    }

    /// Whether the key rules for entity paths hold for `method`.
    ///
    /// POST must not name a key; updates and deletes must.
    pub fn accepts_method(&self, method: HttpMethod) -> bool {
        match self {
            ResourcePath::Entity { .. } => method != HttpMethod::Post,
            ResourcePath::EntitySet { .. } => !method.requires_key(),
            _ => true,
        }
    }

    /// The entity set the request is addressed to.
    pub fn entity_set(&self) -> &str {
        match self {
            ResourcePath::EntitySet { entity_set } | ResourcePath::Entity { entity_set, .. } => {
                entity_set
            }
            ResourcePath::NavigationProperty { source, .. } | ResourcePath::Links { source, .. } => {
                &source.entity_set
            }
        }
    }

    /// Source entity of a navigation-property or links path.
    pub fn source(&self) -> Option<&EntityRef> {
        match self {
            ResourcePath::NavigationProperty { source, .. } | ResourcePath::Links { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// Target entity type of a navigation-property or links path.
    pub fn target_type(&self) -> Option<&str> {
        match self {
            ResourcePath::NavigationProperty { property, .. } => Some(property),
            ResourcePath::Links { target_type, .. } => Some(target_type),
            _ => None,
        }
    }

    pub fn is_navigation_property(&self) -> bool {
        matches!(self, ResourcePath::NavigationProperty { .. })
    }

    pub fn is_links(&self) -> bool {
        matches!(self, ResourcePath::Links { .. })
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePath::EntitySet { entity_set } => write!(f, "{entity_set}"),
            ResourcePath::Entity { entity_set, key } => write!(f, "{entity_set}('{key}')"),
            ResourcePath::NavigationProperty {
                source,
                property,
                key,
            } => {
                write!(f, "{source}/_{property}")?;
                match key {
                    Some(key) => write!(f, "('{key}')"),
                    None => Ok(()),
                }
            }
            ResourcePath::Links {
                source,
                target_type,
                target_key,
            } => {
                write!(f, "{source}/$links/_{target_type}")?;
                match target_key {
                    Some(key) => write!(f, "('{key}')"),
                    None => Ok(()),
                }
            }
        }
    }
}
