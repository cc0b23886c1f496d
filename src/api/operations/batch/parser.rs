//! Dynamics 365 $batch response parser
//!
//! Parses multipart/mixed batch responses from the Web API into
//! [`BatchResult`]s, in the order the server wrote the parts.

use crate::api::constants::{self, headers};
use crate::api::context;
use crate::api::error::{ApiError, ApiResult};
use crate::api::operations::BatchResult;
use serde_json::Value;

/// Parser for batch responses
pub struct BatchResponseParser;

/// MIME or HTTP header block of one part
struct HeaderBlock<'a> {
    lines: Vec<(&'a str, &'a str)>,
}

impl<'a> HeaderBlock<'a> {
    fn parse(text: &'a str) -> Self {
        let lines = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim(), value.trim()))
            .collect();
        Self { lines }
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        self.lines
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

impl BatchResponseParser {
    /// Parse a batch response body.
    ///
    /// `content_type` is the response `Content-Type` header; when it has no boundary
    /// the first delimiter line of the body is used instead.
    pub fn parse(content_type: Option<&str>, response_text: &str) -> ApiResult<Vec<BatchResult>> {
        let boundary = content_type
            .and_then(Self::boundary_param)
            .or_else(|| Self::first_delimiter(response_text))
            .ok_or_else(|| {
                ApiError::parse(
                    anyhow::anyhow!("Could not find batch boundary in response"),
                    response_text,
                )
            })?;

        let mut results = Vec::new();
        Self::parse_multipart(response_text, &boundary, &mut results);
        Ok(results)
    }

    fn parse_multipart(text: &str, boundary: &str, results: &mut Vec<BatchResult>) {
        for part in Self::split_parts(text, boundary) {
            let (mime_head, content) = split_head(part);
            let mime_headers = HeaderBlock::parse(mime_head);
            let part_type = mime_headers.get("Content-Type").unwrap_or_default();

            if starts_with_ignore_case(part_type, constants::PART_CONTENT_TYPE) {
                if let Some(result) = Self::parse_http_response(&mime_headers, content) {
                    results.push(result);
                }
            } else if starts_with_ignore_case(part_type, constants::BATCH_CONTENT_TYPE) {
                // Change set: same format, one level down
                match Self::boundary_param(part_type) {
                    Some(changeset_boundary) => {
                        Self::parse_multipart(content, &changeset_boundary, results)
                    }
                    None => log::warn!("Skipping change set part without boundary"),
                }
            } else {
                log::debug!("Skipping batch part with content type '{}'", part_type);
            }
        }
    }

    /// Split a multipart body into the raw text of each part
    fn split_parts<'a>(text: &'a str, boundary: &str) -> Vec<&'a str> {
        let delimiter = format!("--{}", boundary);
        let mut segments = text.split(delimiter.as_str());
        segments.next(); // preamble

        let mut parts = Vec::new();
        for segment in segments {
            if segment.starts_with("--") {
                break; // close delimiter
            }
            // Remainder of the delimiter line
            let Some(line_end) = segment.find('\n') else {
                continue;
            };
            let part = &segment[line_end + 1..];
            // The line break before the next delimiter belongs to the delimiter
            let part = part
                .strip_suffix("\r\n")
                .or_else(|| part.strip_suffix('\n'))
                .unwrap_or(part);
            parts.push(part);
        }
        parts
    }

    /// Parse the embedded HTTP response of an `application/http` part
    fn parse_http_response(mime_headers: &HeaderBlock<'_>, content: &str) -> Option<BatchResult> {
        let (http_head, body) = split_head(content);
        let status_line = http_head.lines().next().unwrap_or_default();
        let Some(status_code) = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse::<u16>().ok())
        else {
            log::warn!("Skipping batch part with malformed status line '{}'", status_line);
            return None;
        };

        let content_id = mime_headers
            .get(headers::CONTENT_ID)
            .or_else(|| HeaderBlock::parse(http_head).get(headers::CONTENT_ID))
            .map(str::to_string);

        if !(200..300).contains(&status_code) {
            return Some(BatchResult {
                content_id,
                success: false,
                status_code,
                entity_set: None,
                records: None,
                error_body: Some(body.to_string()),
            });
        }

        if body.trim().is_empty() {
            // Plain create/update/delete acknowledgement
            return None;
        }

        let json: Value = match serde_json::from_str(body) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Skipping batch part {:?} with invalid JSON body: {}", content_id, e);
                return None;
            }
        };

        let entity_set =
            context::entity_set_name(json.get("@odata.context").and_then(Value::as_str));
        match (entity_set, json.get("value").and_then(Value::as_array)) {
            (Some(entity_set), Some(records)) => Some(BatchResult {
                content_id,
                success: true,
                status_code,
                entity_set: Some(entity_set.to_string()),
                records: Some(records.clone()),
                error_body: None,
            }),
            _ => {
                log::debug!(
                    "Dropping successful batch part {:?}: no entity set or value collection",
                    content_id
                );
                None
            }
        }
    }

    /// Extract the `boundary` parameter of a multipart Content-Type
    fn boundary_param(content_type: &str) -> Option<String> {
        content_type
            .split(';')
            .map(str::trim)
            .find_map(|param| {
                let (name, value) = param.split_once('=')?;
                name.trim()
                    .eq_ignore_ascii_case("boundary")
                    .then(|| value.trim().trim_matches('"').to_string())
            })
            .filter(|boundary| !boundary.is_empty())
    }

    /// Fallback: the first `--<boundary>` line of the body
    fn first_delimiter(text: &str) -> Option<String> {
        text.lines()
            .map(str::trim_end)
            .find(|line| line.starts_with("--") && line.len() > 2)
            .map(|line| line.trim_start_matches("--").to_string())
    }
}

/// Split a header block from what follows the first blank line
fn split_head(text: &str) -> (&str, &str) {
    if let Some(rest) = text.strip_prefix("\r\n").or_else(|| text.strip_prefix('\n')) {
        return ("", rest);
    }

    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    let lf = text.find("\n\n").map(|i| (i, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((index, len)) => (&text[..index], &text[index + len..]),
        None => (text, ""),
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
