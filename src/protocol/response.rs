// file: src/protocol/response.rs
// version: 1.1.0
// guid: 4e0c427d-e940-4946-85e7-268900897699

//! SOAP response parsing for the shell operations
//!
//! The service's responses are small, namespace-prefixed XML documents;
//! the handful of fields the client needs are pulled out with anchored
//! patterns rather than a full XML stack.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;

use crate::{Result, WinRmError};

/// WSManFault code the service uses to end an idle `Receive` poll.
/// Not an error: the command is still running and the poll is re-issued.
pub const FAULT_OPERATION_TIMEOUT: u32 = 2_150_858_793;

/// Output captured from one `Receive` round trip.
#[derive(Debug, Default)]
pub struct ReceiveChunk {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    pub done: bool,
}

/// Details of a SOAP fault response.
#[derive(Debug)]
pub struct SoapFault {
    pub code: Option<u32>,
    pub message: String,
}

fn shell_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(?:\w+:)?ShellId>([^<]+)</").expect("valid regex"))
}

fn shell_selector_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"Selector\s+Name="ShellId"[^>]*>([^<]+)<"#).expect("valid regex")
    })
}

fn command_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(?:\w+:)?CommandId>([^<]+)</").expect("valid regex"))
}

fn stream_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(?:\w+:)?Stream\b([^>]*)>([^<]*)</").expect("valid regex"))
}

fn command_state_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(?:\w+:)?CommandState\b([^>]*)>").expect("valid regex"))
}

fn exit_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(?:\w+:)?ExitCode>(-?\d+)</").expect("valid regex"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z_][\w.-]*)="([^"]*)""#).expect("valid regex"))
}

fn fault_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"WSManFault[^>]*\bCode="(\d+)""#).expect("valid regex"))
}

fn fault_text_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(?:\w+:)?Text[^>]*>([^<]+)</").expect("valid regex"))
}

fn fault_message_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(?:\w+:)?Message>([^<]+)</").expect("valid regex"))
}

/// Shell id from a `transfer/Create` response.
///
/// Servers report it both inside the created shell body and in the
/// ResourceCreated selector set; either form is accepted.
pub fn extract_shell_id(body: &str) -> Result<String> {
    if let Some(caps) = shell_id_regex().captures(body) {
        return Ok(xml_unescape(caps[1].trim()));
    }
    if let Some(caps) = shell_selector_regex().captures(body) {
        return Ok(xml_unescape(caps[1].trim()));
    }
    Err(WinRmError::protocol(
        "Create response carried no shell id",
    ))
}

/// Command id from a `shell/Command` response.
pub fn extract_command_id(body: &str) -> Result<String> {
    command_id_regex()
        .captures(body)
        .map(|caps| xml_unescape(caps[1].trim()))
        .ok_or_else(|| WinRmError::protocol("Command response carried no command id"))
}

/// Decode the streams, command state, and exit code of one `Receive`
/// response. Stream chunks are appended in document order.
pub fn parse_receive_response(body: &str) -> Result<ReceiveChunk> {
    let mut chunk = ReceiveChunk::default();

    for caps in stream_regex().captures_iter(body) {
        let attrs = &caps[1];
        let content: String = caps[2]
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if content.is_empty() {
            continue;
        }
        let Some(name) = attr_value(attrs, "Name") else {
            continue;
        };
        let decoded = BASE64.decode(content.as_bytes()).map_err(|e| {
            WinRmError::Protocol(format!("Invalid base64 in {} stream: {}", name, e))
        })?;
        match name.as_str() {
            "stdout" => chunk.stdout.extend_from_slice(&decoded),
            "stderr" => chunk.stderr.extend_from_slice(&decoded),
            _ => {}
        }
    }

    if let Some(caps) = command_state_regex().captures(body) {
        if let Some(state) = attr_value(&caps[1], "State") {
            chunk.done = state.ends_with("/Done");
        }
    }

    if let Some(caps) = exit_code_regex().captures(body) {
        chunk.exit_code = caps[1].parse::<i32>().ok();
    }

    Ok(chunk)
}

/// SOAP fault details, if the response carries a fault.
pub fn parse_fault(body: &str) -> Option<SoapFault> {
    if !body.contains(":Fault>") && !body.contains("<Fault") {
        return None;
    }

    let code = fault_code_regex()
        .captures(body)
        .and_then(|caps| caps[1].parse::<u32>().ok());
    let message = fault_text_regex()
        .captures(body)
        .map(|caps| xml_unescape(caps[1].trim()))
        .or_else(|| {
            fault_message_regex()
                .captures(body)
                .map(|caps| xml_unescape(caps[1].trim()))
        })
        .unwrap_or_else(|| "Unspecified WS-Management fault".to_string());

    Some(SoapFault { code, message })
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    attr_regex()
        .captures_iter(attrs)
        .find(|caps| &caps[1] == name)
        .map(|caps| caps[2].to_string())
}

/// Undo the five XML character entities.
pub(crate) fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DONE_STATE: &str =
        "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/CommandState/Done";
    const RUNNING_STATE: &str =
        "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/CommandState/Running";

    fn encode(data: &[u8]) -> String {
        BASE64.encode(data)
    }

    #[test]
    fn test_extract_shell_id_from_shell_body() {
        // Arrange
        let body = "<rsp:Shell><rsp:ShellId>4A2C-99</rsp:ShellId></rsp:Shell>";

        // Act & Assert
        assert_eq!(extract_shell_id(body).unwrap(), "4A2C-99");
    }

    #[test]
    fn test_extract_shell_id_from_selector_set() {
        // Arrange
        let body = concat!(
            "<x:ResourceCreated><a:ReferenceParameters><w:SelectorSet>",
            "<w:Selector Name=\"ShellId\">D5A2-11</w:Selector>",
            "</w:SelectorSet></a:ReferenceParameters></x:ResourceCreated>"
        );

        // Act & Assert
        assert_eq!(extract_shell_id(body).unwrap(), "D5A2-11");
    }

    #[test]
    fn test_extract_shell_id_missing_is_an_error() {
        // Act
        let result = extract_shell_id("<s:Envelope><s:Body/></s:Envelope>");

        // Assert
        assert!(matches!(result, Err(WinRmError::Protocol(_))));
    }

    #[test]
    fn test_extract_command_id() {
        // Arrange
        let body = "<rsp:CommandResponse><rsp:CommandId>77E1-C3</rsp:CommandId></rsp:CommandResponse>";

        // Act & Assert
        assert_eq!(extract_command_id(body).unwrap(), "77E1-C3");
    }

    #[test]
    fn test_receive_accumulates_streams_in_order() {
        // Arrange
        let body = format!(
            concat!(
                "<rsp:ReceiveResponse>",
                "<rsp:Stream Name=\"stdout\" CommandId=\"C\">{}</rsp:Stream>",
                "<rsp:Stream Name=\"stderr\" CommandId=\"C\">{}</rsp:Stream>",
                "<rsp:Stream Name=\"stdout\" CommandId=\"C\">{}</rsp:Stream>",
                "<rsp:CommandState CommandId=\"C\" State=\"{}\"/>",
                "</rsp:ReceiveResponse>"
            ),
            encode(b"first "),
            encode(b"oops\n"),
            encode(b"second"),
            RUNNING_STATE,
        );

        // Act
        let chunk = parse_receive_response(&body).unwrap();

        // Assert
        assert_eq!(chunk.stdout, b"first second");
        assert_eq!(chunk.stderr, b"oops\n");
        assert!(!chunk.done);
        assert_eq!(chunk.exit_code, None);
    }

    #[test]
    fn test_receive_detects_done_and_exit_code() {
        // Arrange
        let body = format!(
            concat!(
                "<rsp:ReceiveResponse>",
                "<rsp:Stream Name=\"stdout\" CommandId=\"C\" End=\"true\">{}</rsp:Stream>",
                "<rsp:CommandState CommandId=\"C\" State=\"{}\">",
                "<rsp:ExitCode>5</rsp:ExitCode>",
                "</rsp:CommandState>",
                "</rsp:ReceiveResponse>"
            ),
            encode(b"done\n"),
            DONE_STATE,
        );

        // Act
        let chunk = parse_receive_response(&body).unwrap();

        // Assert
        assert_eq!(chunk.stdout, b"done\n");
        assert!(chunk.done);
        assert_eq!(chunk.exit_code, Some(5));
    }

    #[test]
    fn test_receive_parses_negative_exit_codes() {
        // Arrange
        let body = format!(
            "<rsp:CommandState State=\"{}\"><rsp:ExitCode>-1073741510</rsp:ExitCode></rsp:CommandState>",
            DONE_STATE
        );

        // Act
        let chunk = parse_receive_response(&body).unwrap();

        // Assert
        assert_eq!(chunk.exit_code, Some(-1_073_741_510));
    }

    #[test]
    fn test_receive_tolerates_attribute_order() {
        // Arrange
        let body = format!(
            "<rsp:Stream CommandId=\"C\" Name=\"stdout\">{}</rsp:Stream>",
            encode(b"swapped")
        );

        // Act
        let chunk = parse_receive_response(&body).unwrap();

        // Assert
        assert_eq!(chunk.stdout, b"swapped");
    }

    #[test]
    fn test_receive_ignores_unknown_streams() {
        // Arrange
        let body = format!(
            "<rsp:Stream Name=\"pr\" CommandId=\"C\">{}</rsp:Stream>",
            encode(b"psrp")
        );

        // Act
        let chunk = parse_receive_response(&body).unwrap();

        // Assert
        assert!(chunk.stdout.is_empty());
        assert!(chunk.stderr.is_empty());
    }

    #[test]
    fn test_receive_rejects_bad_base64() {
        // Arrange
        let body = "<rsp:Stream Name=\"stdout\">!!not-base64!!</rsp:Stream>";

        // Act
        let result = parse_receive_response(body);

        // Assert
        assert!(matches!(result, Err(WinRmError::Protocol(_))));
    }

    #[test]
    fn test_parse_fault_with_wsman_code() {
        // Arrange
        let body = concat!(
            "<s:Envelope><s:Body><s:Fault>",
            "<s:Code><s:Value>s:Receiver</s:Value></s:Code>",
            "<s:Reason><s:Text xml:lang=\"en-US\">The WS-Management service cannot complete the operation ",
            "within the time specified in OperationTimeout.</s:Text></s:Reason>",
            "<s:Detail><f:WSManFault xmlns:f=\"http://schemas.microsoft.com/wbem/wsman/1/wsmanfault\" ",
            "Code=\"2150858793\" Machine=\"host\"/></s:Detail>",
            "</s:Fault></s:Body></s:Envelope>"
        );

        // Act
        let fault = parse_fault(body).unwrap();

        // Assert
        assert_eq!(fault.code, Some(FAULT_OPERATION_TIMEOUT));
        assert!(fault.message.contains("OperationTimeout"));
    }

    #[test]
    fn test_parse_fault_none_for_normal_responses() {
        // Act & Assert
        assert!(parse_fault("<rsp:Shell><rsp:ShellId>X</rsp:ShellId></rsp:Shell>").is_none());
    }

    #[test]
    fn test_parse_fault_without_code_keeps_the_text() {
        // Arrange
        let body = concat!(
            "<s:Fault><s:Reason><s:Text xml:lang=\"en-US\">access is denied</s:Text>",
            "</s:Reason></s:Fault>"
        );

        // Act
        let fault = parse_fault(body).unwrap();

        // Assert
        assert_eq!(fault.code, None);
        assert_eq!(fault.message, "access is denied");
    }

    #[test]
    fn test_xml_unescape() {
        // Act & Assert
        assert_eq!(xml_unescape("a &amp; b"), "a & b");
        assert_eq!(xml_unescape("&lt;S&gt;"), "<S>");
        assert_eq!(xml_unescape("&quot;x&apos;"), "\"x'");
        assert_eq!(xml_unescape("&amp;lt;"), "&lt;");
    }
}
