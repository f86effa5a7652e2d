//! Serializes part results into the multipart response body.
//!
//! GET results are written as a plain `application/http` part. Every other
//! result is wrapped in its own single-member changeset.

use obatch_domain::model::HttpMethod;
use uuid::Uuid;

use super::types::PartResult;

const CRLF: &str = "\r\n";

/// Builds the response body for `results` using the client's `boundary`.
pub fn assemble(boundary: &str, results: &[PartResult]) -> String {
    let mut out = String::new();
    for result in results {
        push_line(&mut out, &format!("--{boundary}"));
        if result.method == HttpMethod::Get {
            push_line(&mut out, "Content-Type: application/http");
            push_line(&mut out, "");
            push_message(&mut out, result);
        } else {
            let changeset = result
                .changeset
                .clone()
                .unwrap_or_else(|| format!("changeset_{}", Uuid::new_v4().simple()));
            push_line(
                &mut out,
                &format!("Content-Type: multipart/mixed; boundary={changeset}"),
            );
            push_line(&mut out, "");
            push_line(&mut out, &format!("--{changeset}"));
            push_line(&mut out, "Content-Type: application/http");
            push_line(&mut out, "Content-Transfer-Encoding: binary");
            push_line(&mut out, "");
            push_message(&mut out, result);
            push_line(&mut out, &format!("--{changeset}--"));
        }
    }
    push_line(&mut out, &format!("--{boundary}--"));
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}

/// Status line, headers, blank line, then the body if any.
fn push_message(out: &mut String, result: &PartResult) {
    push_line(
        out,
        &format!(
            "HTTP/1.1 {} {}",
            result.status,
            reason_phrase(result.status)
        ),
    );
    for (name, value) in &result.headers {
        push_line(out, &format!("{name}: {value}"));
    }
    push_line(out, "");
    if let Some(body) = result.body.as_deref().filter(|b| !b.is_empty()) {
        push_line(out, body);
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        412 => "Precondition Failed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "",
    }
}
