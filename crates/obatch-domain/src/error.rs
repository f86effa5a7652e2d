//! Domain error types for batch envelope and sub-request processing.

use thiserror::Error;

/// Wire codes carried in the `code` member of an error envelope.
///
/// Structural codes abort the whole batch; the rest are reported for a
/// single part only.
pub mod codes {
    // Structural (whole batch, 400)
    pub const BATCH_BODY_PARSE_ERROR: &str = "batch_body_parse_error";
    pub const BATCH_BODY_FORMAT_HEADER_ERROR: &str = "batch_body_format_header_error";
    pub const BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR: &str =
        "batch_body_format_changeset_nest_error";
    pub const BATCH_BODY_FORMAT_PATH_ERROR: &str = "batch_body_format_path_error";
    pub const BATCH_BODY_FORMAT_METHOD_ERROR: &str = "batch_body_format_method_error";

    // Query options (per part, 400)
    pub const QUERY_PARSE_ERROR: &str = "query_parse_error";
    pub const QUERY_INVALID_ERROR: &str = "query_invalid_error";
    pub const ORDERBY_PARSE_ERROR: &str = "orderby_parse_error";
    pub const SELECT_PARSE_ERROR: &str = "select_parse_error";
    pub const INLINECOUNT_PARSE_ERROR: &str = "inlinecount_parse_error";
    pub const EXPAND_PARSE_ERROR: &str = "expand_parse_error";
    pub const EXPAND_COUNT_LIMITATION_EXCEEDED: &str = "expand_count_limitation_exceeded";
    pub const FILTER_PARSE_ERROR: &str = "filter_parse_error";

    // Bodies (per part, 400)
    pub const JSON_PARSE_ERROR: &str = "json_parse_error";
    pub const LINK_URI_FORMAT_ERROR: &str = "link_uri_format_error";
}

/// Errors raised while parsing an envelope, a query string or a part body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The envelope does not have a start or end boundary marker, or holds no parts.
    #[error("batch body could not be parsed")]
    BodyParse,

    /// A required header is missing or malformed.
    #[error("batch body format error: invalid {header} header")]
    HeaderFormat { header: String },

    /// A changeset was declared inside another changeset.
    #[error("batch body format error: changeset cannot be nested")]
    NestedChangeset,

    /// The request line or its resource path does not follow the sub-request grammar.
    #[error("batch body format error: invalid request line [{request_line}]")]
    PathFormat { request_line: String },

    /// The request line names a method that is not accepted inside a batch.
    #[error("batch body format error: method [{method}] is not supported")]
    MethodFormat { method: String },

    /// A query option value could not be parsed.
    #[error("failed to parse query option [{option}]")]
    QueryParse { option: String },

    /// A query option value is out of its allowed range.
    #[error("query option [{option}] has invalid value [{value}]")]
    QueryInvalid { option: String, value: String },

    #[error("failed to parse $orderby")]
    OrderByParse,

    #[error("failed to parse $select")]
    SelectParse,

    #[error("$inlinecount value [{value}] is not one of allpages, none")]
    InlineCountParse { value: String },

    #[error("failed to parse $expand")]
    ExpandParse,

    /// More `$expand` properties than allowed.
    #[error("$expand names {count} properties, maximum is {max}")]
    ExpandCountExceeded { count: usize, max: usize },

    #[error("failed to parse $filter")]
    FilterParse,

    /// A JSON body is not the expected shape.
    #[error("JSON body format error: {message}")]
    JsonParse { message: String },

    /// A `$links` body names a URI that does not address an entity.
    #[error("link target uri [{uri}] does not address an entity")]
    LinkUriFormat { uri: String },
}

impl DomainError {
    /// Returns the wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::BodyParse => codes::BATCH_BODY_PARSE_ERROR,
            DomainError::HeaderFormat { .. } => codes::BATCH_BODY_FORMAT_HEADER_ERROR,
            DomainError::NestedChangeset => codes::BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR,
            DomainError::PathFormat { .. } => codes::BATCH_BODY_FORMAT_PATH_ERROR,
            DomainError::MethodFormat { .. } => codes::BATCH_BODY_FORMAT_METHOD_ERROR,
            DomainError::QueryParse { .. } => codes::QUERY_PARSE_ERROR,
            DomainError::QueryInvalid { .. } => codes::QUERY_INVALID_ERROR,
            DomainError::OrderByParse => codes::ORDERBY_PARSE_ERROR,
            DomainError::SelectParse => codes::SELECT_PARSE_ERROR,
            DomainError::InlineCountParse { .. } => codes::INLINECOUNT_PARSE_ERROR,
            DomainError::ExpandParse => codes::EXPAND_PARSE_ERROR,
            DomainError::ExpandCountExceeded { .. } => codes::EXPAND_COUNT_LIMITATION_EXCEEDED,
            DomainError::FilterParse => codes::FILTER_PARSE_ERROR,
            DomainError::JsonParse { .. } => codes::JSON_PARSE_ERROR,
            DomainError::LinkUriFormat { .. } => codes::LINK_URI_FORMAT_ERROR,
        }
    }

    /// Returns true for errors that reject the whole envelope.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            DomainError::BodyParse
                | DomainError::HeaderFormat { .. }
                | DomainError::NestedChangeset
                | DomainError::PathFormat { .. }
                | DomainError::MethodFormat { .. }
        )
    }

    pub(crate) fn json(message: impl Into<String>) -> Self {
        DomainError::JsonParse {
            message: message.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
