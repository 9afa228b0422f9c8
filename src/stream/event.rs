//! Typed events and wire payload parsing.

use serde::Deserialize;

/// A decoded event from the OCR relay stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Announces grid bounds. Must precede any valid `result`.
    Info {
        total_pages: usize,
        total_backends: usize,
    },
    /// One task reached a terminal state.
    Result(TaskResult),
    /// Stream-level failure report; does not terminate the stream.
    Error { message: String },
    /// Producer's explicit end-of-work signal.
    Complete,
    /// Keep-alive; no state change.
    Heartbeat,
}

/// Body of a `result` record, page index already converted to 0-based.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub page: usize,
    pub backend: usize,
    pub content: String,
    pub success: bool,
    pub confidence: Option<f64>,
    pub processing_time_ms: Option<u64>,
}

/// A record whose prefix was recognized but whose body did not parse.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRecord {
    pub kind: String,
    pub detail: String,
}

/// Outcome of decoding one framed record.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    Event(StreamEvent),
    Malformed(MalformedRecord),
}

#[derive(Deserialize)]
struct InfoBody {
    total_pages: usize,
    total_apis: usize,
}

#[derive(Deserialize)]
struct ResultBody {
    result: ResultPayload,
    api_index: usize,
}

#[derive(Deserialize)]
struct ResultPayload {
    /// 1-based on the wire.
    page: u64,
    content: String,
    success: bool,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    processing_time_ms: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Parse one complete line into a record.
///
/// Returns `None` for blank lines and unrecognized prefixes (skipped
/// silently, per the protocol's forward-compatibility rule).
pub(crate) fn parse_line(line: &str) -> Option<DecodedRecord> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return None;
    }

    let Some((kind, body)) = line.split_once(':') else {
        tracing::debug!("skipping unframed stream line: {}", line);
        return None;
    };
    let kind = kind.trim();
    let body = body.trim();

    let malformed = |detail: String| {
        Some(DecodedRecord::Malformed(MalformedRecord {
            kind: kind.to_string(),
            detail,
        }))
    };

    match kind {
        "info" => match serde_json::from_str::<InfoBody>(body) {
            Ok(info) => Some(DecodedRecord::Event(StreamEvent::Info {
                total_pages: info.total_pages,
                total_backends: info.total_apis,
            })),
            Err(e) => malformed(e.to_string()),
        },
        "result" => match serde_json::from_str::<ResultBody>(body) {
            Ok(result) => {
                // Pages arrive 1-based; the grid is 0-based. A page of 0
                // has no valid grid index.
                let Some(page) = result.result.page.checked_sub(1) else {
                    return malformed("page index 0 (pages are 1-based on the wire)".to_string());
                };
                Some(DecodedRecord::Event(StreamEvent::Result(TaskResult {
                    page: page as usize,
                    backend: result.api_index,
                    content: result.result.content,
                    success: result.result.success,
                    confidence: result.result.confidence,
                    processing_time_ms: result.result.processing_time_ms,
                })))
            }
            Err(e) => malformed(e.to_string()),
        },
        "error" => match serde_json::from_str::<ErrorBody>(body) {
            Ok(err) => Some(DecodedRecord::Event(StreamEvent::Error {
                message: err.error,
            })),
            Err(e) => malformed(e.to_string()),
        },
        "complete" => Some(DecodedRecord::Event(StreamEvent::Complete)),
        "heartbeat" => Some(DecodedRecord::Event(StreamEvent::Heartbeat)),
        _ => {
            tracing::debug!("skipping unknown record kind: {}", kind);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info() {
        let record = parse_line(r#"info: {"total_pages": 3, "total_apis": 2}"#).unwrap();
        assert_eq!(
            record,
            DecodedRecord::Event(StreamEvent::Info {
                total_pages: 3,
                total_backends: 2,
            })
        );
    }

    #[test]
    fn test_parse_result_converts_page_to_zero_based() {
        let record = parse_line(
            r##"result: {"result": {"page": 1, "content": "# Title", "success": true}, "api_index": 0}"##,
        )
        .unwrap();
        match record {
            DecodedRecord::Event(StreamEvent::Result(result)) => {
                assert_eq!(result.page, 0);
                assert_eq!(result.backend, 0);
                assert_eq!(result.content, "# Title");
                assert!(result.success);
                assert_eq!(result.confidence, None);
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_parse_result_page_zero_is_malformed() {
        let record = parse_line(
            r#"result: {"result": {"page": 0, "content": "init failed", "success": false}, "api_index": 1}"#,
        )
        .unwrap();
        assert!(matches!(record, DecodedRecord::Malformed(ref m) if m.kind == "result"));
    }

    #[test]
    fn test_parse_result_optional_fields() {
        let record = parse_line(
            r#"result: {"result": {"page": 2, "content": "x", "success": true, "confidence": 0.92, "processing_time_ms": 1500}, "api_index": 1}"#,
        )
        .unwrap();
        match record {
            DecodedRecord::Event(StreamEvent::Result(result)) => {
                assert_eq!(result.page, 1);
                assert_eq!(result.confidence, Some(0.92));
                assert_eq!(result.processing_time_ms, Some(1500));
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_complete_heartbeat() {
        assert_eq!(
            parse_line(r#"error: {"error": "backend timed out"}"#).unwrap(),
            DecodedRecord::Event(StreamEvent::Error {
                message: "backend timed out".to_string()
            })
        );
        assert_eq!(
            parse_line("complete: {}").unwrap(),
            DecodedRecord::Event(StreamEvent::Complete)
        );
        assert_eq!(
            parse_line("heartbeat: {}").unwrap(),
            DecodedRecord::Event(StreamEvent::Heartbeat)
        );
    }

    #[test]
    fn test_unknown_prefix_skipped() {
        assert_eq!(parse_line(r#"debug: {"note": "ignore me"}"#), None);
        assert_eq!(parse_line("not a framed record"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn test_malformed_body_reported_not_fatal() {
        let record = parse_line("info: {not json").unwrap();
        match record {
            DecodedRecord::Malformed(m) => assert_eq!(m.kind, "info"),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_crlf_tolerated() {
        let record = parse_line("complete: {}\r").unwrap();
        assert_eq!(record, DecodedRecord::Event(StreamEvent::Complete));
    }
}
