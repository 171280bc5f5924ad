// file: src/network/transport.rs
// version: 1.1.0
// guid: f73635b9-939d-498a-b91b-fc6868ca8786

//! HTTP transport with per-request NTLM authentication
//!
//! WinRM listeners configured for Negotiate auth run the NTLM handshake
//! on every SOAP exchange: an empty POST carrying the negotiate token
//! draws a 401 with the server challenge, and the authenticate token
//! then rides along with the actual envelope.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Client, StatusCode};
use tracing::trace;

use crate::auth::NtlmAuthenticator;
use crate::network::winrm::WinRmConfig;
use crate::{Result, WinRmError};

const CONTENT_TYPE_SOAP: &str = "application/soap+xml;charset=UTF-8";

/// Status and body of one completed SOAP exchange.
pub struct SoapResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Authenticating HTTP client bound to one WinRM endpoint.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    authenticator: NtlmAuthenticator,
}

impl HttpTransport {
    /// Build the transport. Both legs of the NTLM exchange must ride the
    /// same TCP connection, so the pool keeps exactly one idle connection
    /// per host for the authenticated leg to reuse.
    pub fn new(config: &WinRmConfig, authenticator: NtlmAuthenticator) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("winrm-exec/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| WinRmError::connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint_url(),
            authenticator,
        })
    }

    /// POST one SOAP envelope, running the NTLM handshake first.
    pub async fn send(&self, envelope: &str) -> Result<SoapResponse> {
        let negotiate = BASE64.encode(self.authenticator.negotiate_message());
        let offer = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, CONTENT_TYPE_SOAP)
            .header(AUTHORIZATION, format!("Negotiate {}", negotiate))
            .body("")
            .send()
            .await?;

        if offer.status() != StatusCode::UNAUTHORIZED {
            return Err(WinRmError::authentication(format!(
                "Expected an NTLM challenge, server answered {}",
                offer.status()
            )));
        }
        let challenge = extract_challenge(offer.headers())?;
        // The challenge binds to this connection; drain the body so the
        // pool can hand the same connection to the authenticate leg.
        offer.bytes().await?;

        let authenticate = BASE64.encode(self.authenticator.authenticate_message(&challenge)?);
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, CONTENT_TYPE_SOAP)
            .header(AUTHORIZATION, format!("Negotiate {}", authenticate))
            .body(envelope.to_string())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(WinRmError::authentication(
                "The server rejected the supplied credentials",
            ));
        }

        let status = response.status();
        let body = response.text().await?;
        trace!(status = %status, bytes = body.len(), "soap exchange complete");
        Ok(SoapResponse { status, body })
    }
}

/// Pull the base64 NTLM challenge out of a 401's WWW-Authenticate header.
fn extract_challenge(headers: &HeaderMap) -> Result<Vec<u8>> {
    let header = headers
        .get(WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            WinRmError::authentication(
                "401 response carried no WWW-Authenticate header; \
                 is Negotiate auth enabled on the WinRM listener?",
            )
        })?;

    let token = header
        .strip_prefix("Negotiate ")
        .or_else(|| header.strip_prefix("NTLM "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            WinRmError::authentication(format!(
                "Server answered 401 without an NTLM challenge token (WWW-Authenticate: {})",
                header
            ))
        })?;

    BASE64
        .decode(token.as_bytes())
        .map_err(|e| WinRmError::authentication(format!("Undecodable NTLM challenge: {}", e)))
}
