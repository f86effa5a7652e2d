//! Line-oriented multipart parser for batch envelopes.
//!
//! ```text
//! --batch_1                              outer start marker
//! Content-Type: application/http         transfer headers
//!                                        blank line
//! GET Sales?$top=10 HTTP/1.1             request line
//! Accept: application/json               request headers
//!                                        blank line
//! --batch_1                              next part
//! Content-Type: multipart/mixed; boundary=changeset_1
//!
//! --changeset_1
//! Content-Type: application/http
//!
//! POST Sales HTTP/1.1
//! ...
//! --changeset_1--
//! --batch_1--                            end marker
//! ```

use nom::{
    bytes::complete::{tag, tag_no_case, take_till1, take_while},
    character::complete::{char, space0},
    combinator::{all_consuming, rest},
    error::{context, ContextError, ParseError, VerboseError},
    sequence::{preceded, separated_pair, terminated, tuple},
    IResult,
};
use tracing::debug;

use super::{Envelope, RequestPart};
use crate::error::{DomainError, DomainResult};
use crate::model::{HttpMethod, QueryOptions, ResourcePath};

const CONTENT_TYPE: &str = "Content-Type";
const HTTP_VERSION: &str = "HTTP/1.1";

/// A body line with its one-based line number.
type Line<'a> = (usize, &'a str);

// ============ Helper Parsers ============

/// `METHOD SP uri SP HTTP/1.1`
fn request_line<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (&'a str, &'a str), E> {
    context(
        "request line",
        terminated(
            separated_pair(take_till1(|c| c == ' '), char(' '), take_till1(|c| c == ' ')),
            tuple((char(' '), tag(HTTP_VERSION))),
        ),
    )(input)
}

/// `multipart/mixed; ... boundary=<token>` → token (quotes kept).
fn boundary_param<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    context(
        "boundary parameter",
        preceded(tuple((space0, tag_no_case("boundary"), space0, char('='), space0)), rest),
    )(input)
}

fn media_type<'a, E: ParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    take_while(|c| c != ';')(input)
}

// ============ Public API ============

/// Extracts the boundary token from a `multipart/mixed` content type.
pub fn boundary_from_content_type(content_type: &str) -> DomainResult<String> {
    let header_error = || DomainError::HeaderFormat {
        header: CONTENT_TYPE.to_string(),
    };
    let (params, media) =
        media_type::<VerboseError<&str>>(content_type).map_err(|_| header_error())?;
    if !media.trim().eq_ignore_ascii_case("multipart/mixed") {
        return Err(header_error());
    }
    params
        .split(';')
        .filter_map(|p| {
            all_consuming(boundary_param::<VerboseError<&str>>)(p)
                .ok()
                .map(|(_, b)| b.trim().trim_matches('"').to_string())
        })
        .find(|b| !b.is_empty())
        .ok_or_else(header_error)
}

/// Parses a batch body delimited by `boundary`.
///
/// Returns the first structural error found; no part is returned in that case.
pub fn parse_envelope(boundary: &str, body: &str) -> DomainResult<Envelope> {
    let normalized = body.replace("\r\n", "\n");
    let lines: Vec<Line<'_>> = normalized
        .split('\n')
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .collect();

    let mut parts = Vec::new();
    for segment in split_segments(&lines, boundary)? {
        parse_segment(segment, None, &mut parts)?;
    }
    if parts.is_empty() {
        return Err(DomainError::BodyParse);
    }
    debug!(parts = parts.len(), "parsed batch envelope");
    Ok(Envelope {
        boundary: boundary.to_string(),
        parts,
    })
}

// ============ Segments ============

/// Splits `lines` at `--boundary` markers up to the `--boundary--` end marker.
///
/// Lines before the first marker and after the end marker are ignored.
fn split_segments<'l, 'a>(
    lines: &'l [Line<'a>],
    boundary: &str,
) -> DomainResult<Vec<&'l [Line<'a>]>> {
    let start = format!("--{boundary}");
    let end = format!("--{boundary}--");

    let first = lines
        .iter()
        .position(|(_, l)| l.trim_end() == start)
        .ok_or(DomainError::BodyParse)?;

    let mut segments = Vec::new();
    let mut from = first + 1;
    for i in from..lines.len() {
        let line = lines[i].1.trim_end();
        if line == start {
            segments.push(&lines[from..i]);
            from = i + 1;
        } else if line == end {
            segments.push(&lines[from..i]);
            return Ok(segments);
        }
    }
    Err(DomainError::BodyParse)
}

/// Header block at the start of `lines`, up to the first blank line.
///
/// Returns the headers and the lines after the blank separator.
fn header_block<'l, 'a>(lines: &'l [Line<'a>]) -> (Vec<(String, String)>, &'l [Line<'a>]) {
    let mut headers = Vec::new();
    for (i, (_, line)) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            return (headers, &lines[i + 1..]);
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
    (headers, &[])
}

fn find_header<'h>(headers: &'h [(String, String)], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn skip_blank<'l, 'a>(lines: &'l [Line<'a>]) -> &'l [Line<'a>] {
    let n = lines.iter().take_while(|(_, l)| l.trim().is_empty()).count();
    &lines[n..]
}

fn parse_segment(
    segment: &[Line<'_>],
    changeset: Option<&str>,
    parts: &mut Vec<RequestPart>,
) -> DomainResult<()> {
    let (transfer_headers, rest) = header_block(skip_blank(segment));
    let content_type = find_header(&transfer_headers, CONTENT_TYPE).ok_or_else(|| {
        DomainError::HeaderFormat {
            header: CONTENT_TYPE.to_string(),
        }
    })?;
    let media = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match media.as_str() {
        "application/http" => {
            let part = parse_request(rest, changeset, parts.len())?;
            parts.push(part);
            Ok(())
        }
        "multipart/mixed" => {
            if changeset.is_some() {
                return Err(DomainError::NestedChangeset);
            }
            let inner = boundary_from_content_type(content_type)?;
            let members = split_segments(rest, &inner)?;
            if members.is_empty() {
                return Err(DomainError::BodyParse);
            }
            for member in members {
                parse_segment(member, Some(&inner), parts)?;
            }
            Ok(())
        }
        _ => Err(DomainError::HeaderFormat {
            header: CONTENT_TYPE.to_string(),
        }),
    }
}

// ============ Request ============

fn parse_request(
    lines: &[Line<'_>],
    changeset: Option<&str>,
    index: usize,
) -> DomainResult<RequestPart> {
    let lines = skip_blank(lines);
    let Some(((line_no, raw_line), after)) = lines.split_first() else {
        return Err(DomainError::BodyParse);
    };
    let request_line_text = raw_line.trim_end();
    let path_error = || DomainError::PathFormat {
        request_line: request_line_text.to_string(),
    };

    let (_, (method_token, uri)) =
        all_consuming(request_line::<VerboseError<&str>>)(request_line_text)
            .map_err(|_| path_error())?;
    let method = HttpMethod::parse(method_token).ok_or_else(|| DomainError::MethodFormat {
        method: method_token.to_string(),
    })?;

    let (path_text, query_text) = match uri.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (uri, None),
    };
    let path = ResourcePath::parse(path_text).ok_or_else(path_error)?;
    if query_text.is_some() && !path.accepts_query() {
        return Err(path_error());
    }
    if !path.accepts_method(method) {
        return Err(path_error());
    }

    let (headers, body_lines) = header_block(after);
    let body = body_lines
        .iter()
        .map(|(_, l)| *l)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end_matches('\n')
        .to_string();

    Ok(RequestPart {
        index,
        method,
        uri: uri.to_string(),
        path,
        query: QueryOptions::parse(query_text.unwrap_or_default()),
        headers,
        body,
        line: *line_no,
        changeset: changeset.map(str::to_string),
    })
}
