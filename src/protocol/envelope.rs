// file: src/protocol/envelope.rs
// version: 1.1.0
// guid: bce0f5d7-044b-4171-aaf4-e9ba479b4e3c

//! WS-Management SOAP envelope construction
//!
//! Templates for the five shell operations WinRM uses: Create, Command,
//! Receive, Signal, and Delete. Every envelope carries a fresh MessageID;
//! the remaining header fields stay fixed for the life of a session.

use uuid::Uuid;

const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
const ADDRESSING_NS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
const WSMAN_NS: &str = "http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd";
const MS_WSMAN_NS: &str = "http://schemas.microsoft.com/wbem/wsman/1/wsman.xsd";
const SHELL_NS: &str = "http://schemas.microsoft.com/wbem/wsman/1/windows/shell";

const ANONYMOUS_ADDRESS: &str =
    "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";
const CMD_SHELL_RESOURCE_URI: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/cmd";

const ACTION_CREATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Create";
const ACTION_DELETE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Delete";
const ACTION_COMMAND: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Command";
const ACTION_RECEIVE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Receive";
const ACTION_SIGNAL: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/Signal";
const SIGNAL_TERMINATE: &str =
    "http://schemas.microsoft.com/wbem/wsman/1/windows/shell/signal/terminate";

/// Maximum SOAP envelope size granted to the service, in bytes.
const MAX_ENVELOPE_SIZE: u32 = 153_600;

/// Builds the SOAP envelopes for one shell session.
pub struct EnvelopeBuilder {
    endpoint: String,
    operation_timeout: String,
    codepage: u32,
}

impl EnvelopeBuilder {
    pub fn new(endpoint: &str, operation_timeout_secs: u64, codepage: u32) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            operation_timeout: format!("PT{}S", operation_timeout_secs),
            codepage,
        }
    }

    /// Envelope for `transfer/Create`: open the remote shell.
    pub fn create_shell(&self) -> String {
        let options = format!(
            concat!(
                "<w:OptionSet>",
                "<w:Option Name=\"WINRS_NOPROFILE\">FALSE</w:Option>",
                "<w:Option Name=\"WINRS_CODEPAGE\">{}</w:Option>",
                "</w:OptionSet>"
            ),
            self.codepage
        );
        let body = concat!(
            "<rsp:Shell>",
            "<rsp:InputStreams>stdin</rsp:InputStreams>",
            "<rsp:OutputStreams>stdout stderr</rsp:OutputStreams>",
            "</rsp:Shell>"
        );
        self.envelope(ACTION_CREATE, None, &options, body)
    }

    /// Envelope for `shell/Command`: submit a command line to the shell.
    pub fn start_command(&self, shell_id: &str, command: &str, args: &[&str]) -> String {
        let options = concat!(
            "<w:OptionSet>",
            "<w:Option Name=\"WINRS_CONSOLEMODE_STDIN\">TRUE</w:Option>",
            "<w:Option Name=\"WINRS_SKIP_CMD_SHELL\">FALSE</w:Option>",
            "</w:OptionSet>"
        );
        let mut body = format!(
            "<rsp:CommandLine><rsp:Command>{}</rsp:Command>",
            xml_escape(command)
        );
        for arg in args {
            body.push_str("<rsp:Arguments>");
            body.push_str(&xml_escape(arg));
            body.push_str("</rsp:Arguments>");
        }
        body.push_str("</rsp:CommandLine>");
        self.envelope(ACTION_COMMAND, Some(shell_id), options, &body)
    }

    /// Envelope for `shell/Receive`: poll the output streams.
    pub fn receive_output(&self, shell_id: &str, command_id: &str) -> String {
        let body = format!(
            "<rsp:Receive><rsp:DesiredStream CommandId=\"{}\">stdout stderr</rsp:DesiredStream></rsp:Receive>",
            xml_escape(command_id)
        );
        self.envelope(ACTION_RECEIVE, Some(shell_id), "", &body)
    }

    /// Envelope for `shell/Signal`: terminate the finished command.
    pub fn signal_terminate(&self, shell_id: &str, command_id: &str) -> String {
        let body = format!(
            "<rsp:Signal CommandId=\"{}\"><rsp:Code>{}</rsp:Code></rsp:Signal>",
            xml_escape(command_id),
            SIGNAL_TERMINATE
        );
        self.envelope(ACTION_SIGNAL, Some(shell_id), "", &body)
    }

    /// Envelope for `transfer/Delete`: release the shell.
    pub fn delete_shell(&self, shell_id: &str) -> String {
        self.envelope(ACTION_DELETE, Some(shell_id), "", "")
    }

    fn envelope(
        &self,
        action: &str,
        shell_id: Option<&str>,
        options: &str,
        body: &str,
    ) -> String {
        let selector_set = shell_id
            .map(|id| {
                format!(
                    "<w:SelectorSet><w:Selector Name=\"ShellId\">{}</w:Selector></w:SelectorSet>",
                    xml_escape(id)
                )
            })
            .unwrap_or_default();

        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
                "<s:Envelope xmlns:s=\"{soap_ns}\" xmlns:a=\"{addressing_ns}\" ",
                "xmlns:w=\"{wsman_ns}\" xmlns:p=\"{ms_wsman_ns}\" xmlns:rsp=\"{shell_ns}\">",
                "<s:Header>",
                "<a:To>{endpoint}</a:To>",
                "<a:ReplyTo><a:Address s:mustUnderstand=\"true\">{anonymous}</a:Address></a:ReplyTo>",
                "<w:MaxEnvelopeSize s:mustUnderstand=\"true\">{max_size}</w:MaxEnvelopeSize>",
                "<a:MessageID>uuid:{message_id}</a:MessageID>",
                "<w:Locale xml:lang=\"en-US\" s:mustUnderstand=\"false\"/>",
                "<p:DataLocale xml:lang=\"en-US\" s:mustUnderstand=\"false\"/>",
                "<w:OperationTimeout>{timeout}</w:OperationTimeout>",
                "<w:ResourceURI s:mustUnderstand=\"true\">{resource}</w:ResourceURI>",
                "<a:Action s:mustUnderstand=\"true\">{action}</a:Action>",
                "{selector_set}",
                "{options}",
                "</s:Header>",
                "<s:Body>{body}</s:Body>",
                "</s:Envelope>"
            ),
            soap_ns = SOAP_ENV_NS,
            addressing_ns = ADDRESSING_NS,
            wsman_ns = WSMAN_NS,
            ms_wsman_ns = MS_WSMAN_NS,
            shell_ns = SHELL_NS,
            endpoint = xml_escape(&self.endpoint),
            anonymous = ANONYMOUS_ADDRESS,
            max_size = MAX_ENVELOPE_SIZE,
            message_id = Uuid::new_v4(),
            timeout = self.operation_timeout,
            resource = CMD_SHELL_RESOURCE_URI,
            action = action,
            selector_set = selector_set,
            options = options,
            body = body,
        )
    }
}

/// Escape the five XML metacharacters for element and attribute content.
pub(crate) fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
