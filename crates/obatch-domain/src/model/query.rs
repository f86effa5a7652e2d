//! System query options of a single sub-request.
//!
//! [`QueryOptions`] is the decoded query string; [`QueryFacet`] is the
//! validated view used for read and list requests.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

pub const TOP: &str = "$top";
pub const SKIP: &str = "$skip";
pub const FILTER: &str = "$filter";
pub const ORDERBY: &str = "$orderby";
pub const SELECT: &str = "$select";
pub const EXPAND: &str = "$expand";
pub const INLINECOUNT: &str = "$inlinecount";
pub const SEARCH: &str = "q";

/// Decoded query string, keeping every pair in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    raw: String,
    pairs: Vec<(String, String)>,
}

impl QueryOptions {
    /// Parses a raw query string (without the leading `?`).
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|segment| !segment.is_empty())
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
                let key = decode(key);
                if key.is_empty() {
                    None
                } else {
                    Some((key, decode(value)))
                }
            })
            .collect();
        Self {
            raw: raw.to_string(),
            pairs,
        }
    }

    /// The first value given for `key`. Later duplicates are ignored.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// `$top` as counted by the batch-wide quota: values that are not a
    /// non-negative integer count as absent.
    pub fn top_hint(&self) -> u64 {
        self.first(TOP)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    }
}

fn decode(value: &str) -> String {
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Per-part bounds on query options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub top_max: u64,
    pub skip_max: u64,
    pub expand_max_properties: usize,
    pub expand_top_max: u64,
    pub q_max_bytes: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            top_max: 10_000,
            skip_max: 100_000,
            expand_max_properties: 2,
            expand_top_max: 100,
            q_max_bytes: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub property: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineCount {
    AllPages,
    #[default]
    None,
}

/// Validated query options of a read or list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFacet {
    pub top: Option<u64>,
    pub skip: Option<u64>,
    pub filter: Option<String>,
    pub orderby: Vec<OrderBy>,
    /// `None` selects everything; `Some(["*"])` is an explicit wildcard.
    pub select: Option<Vec<String>>,
    pub expand: Vec<String>,
    pub inline_count: InlineCount,
    pub search: Option<String>,
}

impl QueryFacet {
    /// Validates the options of one part against `limits`.
    pub fn parse(options: &QueryOptions, limits: &QueryLimits) -> DomainResult<Self> {
        let top = bounded_integer(options, TOP, limits.top_max)?;
        let skip = bounded_integer(options, SKIP, limits.skip_max)?;

        let filter = match options.first(FILTER) {
            Some(v) if v.trim().is_empty() => return Err(DomainError::FilterParse),
            Some(v) => Some(v.to_string()),
            None => None,
        };

        let orderby = match options.first(ORDERBY) {
            Some(v) => parse_orderby(v)?,
            None => Vec::new(),
        };

        let select = match options.first(SELECT) {
            Some(v) => Some(parse_select(v)?),
            None => None,
        };

        let inline_count = match options.first(INLINECOUNT) {
            Some("allpages") => InlineCount::AllPages,
            Some("none") | None => InlineCount::None,
            Some(other) => {
                return Err(DomainError::InlineCountParse {
                    value: other.to_string(),
                })
            }
        };

        let expand = match options.first(EXPAND) {
            Some(v) => {
                let properties = parse_name_list(v).ok_or(DomainError::ExpandParse)?;
                if properties.len() > limits.expand_max_properties {
                    return Err(DomainError::ExpandCountExceeded {
                        count: properties.len(),
                        max: limits.expand_max_properties,
                    });
                }
                properties
            }
            None => Vec::new(),
        };
        if !expand.is_empty() {
            if let Some(t) = top.filter(|t| *t > limits.expand_top_max) {
                return Err(DomainError::QueryInvalid {
                    option: TOP.to_string(),
                    value: t.to_string(),
                });
            }
        }

        let search = match options.first(SEARCH) {
            Some(v) if v.is_empty() || v.len() > limits.q_max_bytes => {
                return Err(DomainError::QueryInvalid {
                    option: SEARCH.to_string(),
                    value: v.to_string(),
                })
            }
            Some(v) => Some(v.to_string()),
            None => None,
        };

        Ok(Self {
            top,
            skip,
            filter,
            orderby,
            select,
            expand,
            inline_count,
            search,
        })
    }
}

fn bounded_integer(options: &QueryOptions, option: &str, max: u64) -> DomainResult<Option<u64>> {
    let Some(raw) = options.first(option) else {
        return Ok(None);
    };
    let value: i64 = raw.parse().map_err(|_| DomainError::QueryParse {
        option: option.to_string(),
    })?;
    match u64::try_from(value) {
        Ok(v) if v <= max => Ok(Some(v)),
        _ => Err(DomainError::QueryInvalid {
            option: option.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn is_property_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '/')
}

/// Comma-separated property names; `None` when empty or malformed.
fn parse_name_list(value: &str) -> Option<Vec<String>> {
    let names: Vec<String> = value.split(',').map(|s| s.trim().to_string()).collect();
    if names.iter().all(|n| is_property_name(n)) {
        Some(names)
    } else {
        None
    }
}

fn parse_select(value: &str) -> DomainResult<Vec<String>> {
    if value.trim() == "*" {
        return Ok(vec!["*".to_string()]);
    }
    parse_name_list(value).ok_or(DomainError::SelectParse)
}

fn parse_orderby(value: &str) -> DomainResult<Vec<OrderBy>> {
    value
        .split(',')
        .map(|item| {
            let mut tokens = item.split_whitespace();
            let property = tokens
                .next()
                .filter(|p| is_property_name(p))
                .ok_or(DomainError::OrderByParse)?;
            let descending = match tokens.next() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(_) => return Err(DomainError::OrderByParse),
            };
            if tokens.next().is_some() {
                return Err(DomainError::OrderByParse);
            }
            Ok(OrderBy {
                property: property.to_string(),
                descending,
            })
        })
        .collect()
}
