// file: src/protocol/clixml.rs
// version: 1.1.0
// guid: c5c85f5f-3f44-4fb5-a140-5b72e1b8d9c6

//! CLIXML error stream cleanup
//!
//! PowerShell serializes its error stream as a CLIXML document when run
//! without a console. The raw document is unreadable; this module pulls
//! the error record texts back out so stderr looks like it would in an
//! interactive session. Anything that is not CLIXML passes through
//! untouched.

use std::sync::OnceLock;

use regex::Regex;

use super::response::xml_unescape;

const CLIXML_PREAMBLE: &[u8] = b"#< CLIXML";

fn error_record_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<S S="Error">([^<]*)</S>"#).expect("valid regex"))
}

/// Strip the CLIXML wrapping from a stderr capture.
///
/// Non-CLIXML input, undecodable input, and documents without error
/// records all come back unchanged; a cleanup failure must never lose
/// the only diagnostics the remote side produced.
pub fn clean_error_stream(raw: &[u8]) -> Vec<u8> {
    if !raw.starts_with(CLIXML_PREAMBLE) {
        return raw.to_vec();
    }
    let Ok(text) = std::str::from_utf8(raw) else {
        return raw.to_vec();
    };

    let mut cleaned = String::new();
    for caps in error_record_regex().captures_iter(text) {
        cleaned.push_str(&xml_unescape(&caps[1]));
    }
    if cleaned.is_empty() {
        return raw.to_vec();
    }

    cleaned.replace("_x000D__x000A_", "\r\n").into_bytes()
}
