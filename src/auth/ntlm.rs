// file: src/auth/ntlm.rs
// version: 1.2.0
// guid: c5cb641b-22a6-4893-acd4-2e6b4cb6290c

//! NTLM v2 message construction (MS-NLMP)
//!
//! Implements the three-message exchange WinRM embeds in HTTP
//! `Authorization: Negotiate` headers: NEGOTIATE (type 1) from the
//! client, CHALLENGE (type 2) from the server, AUTHENTICATE (type 3)
//! carrying the NTLMv2 proof values.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use md4::{Digest, Md4};
use md5::Md5;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::auth::Credentials;
use crate::{Result, WinRmError};

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const MSG_NEGOTIATE: u32 = 1;
const MSG_CHALLENGE: u32 = 2;
const MSG_AUTHENTICATE: u32 = 3;

// Negotiate flags (MS-NLMP 2.2.2.5)
const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const NEGOTIATE_OEM: u32 = 0x0000_0002;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;

const FLAGS: u32 = NEGOTIATE_UNICODE
    | NEGOTIATE_OEM
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY;

// AV pair ids from the challenge target info (MS-NLMP 2.2.2.1)
const AV_EOL: u16 = 0x0000;
const AV_TIMESTAMP: u16 = 0x0007;

/// Seconds between the Windows epoch (1601) and the Unix epoch (1970).
const EPOCH_DIFF_SECS: u64 = 11_644_473_600;
/// FILETIME resolution: 100 ns ticks.
const TICKS_PER_SEC: u64 = 10_000_000;

type HmacMd5 = Hmac<Md5>;

/// Builds the client-side NTLM messages for one authentication exchange.
pub struct NtlmAuthenticator {
    credentials: Credentials,
    workstation: String,
}

impl NtlmAuthenticator {
    pub fn new(credentials: Credentials) -> Self {
        let workstation = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| "WORKSTATION".to_string())
            .to_uppercase();

        Self {
            credentials,
            workstation,
        }
    }

    /// NEGOTIATE message (type 1).
    pub fn negotiate_message(&self) -> Vec<u8> {
        let domain = self.credentials.domain().to_uppercase();
        let domain_bytes = domain.as_bytes();
        let workstation_bytes = self.workstation.as_bytes();

        // Fixed part: signature, type, flags, two buffer descriptors.
        let mut offset = 32u32;
        let mut msg = Vec::with_capacity(32 + domain_bytes.len() + workstation_bytes.len());
        msg.extend_from_slice(SIGNATURE);
        msg.extend_from_slice(&MSG_NEGOTIATE.to_le_bytes());
        msg.extend_from_slice(&FLAGS.to_le_bytes());
        push_buffer_fields(&mut msg, domain_bytes.len(), offset);
        offset += domain_bytes.len() as u32;
        push_buffer_fields(&mut msg, workstation_bytes.len(), offset);
        msg.extend_from_slice(domain_bytes);
        msg.extend_from_slice(workstation_bytes);
        msg
    }

    /// AUTHENTICATE message (type 3), answering the server challenge.
    pub fn authenticate_message(&self, challenge: &[u8]) -> Result<Vec<u8>> {
        let challenge = Challenge::parse(challenge)?;

        let mut client_challenge = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut client_challenge);

        // Prefer the server clock from the challenge so skewed local
        // clocks cannot fail the proof.
        let timestamp = challenge.timestamp().unwrap_or_else(filetime_now);

        let ntowf = ntowf_v2(
            self.credentials.username(),
            self.credentials.domain(),
            self.credentials.password(),
        );
        let (nt_response, lm_response) = ntlmv2_responses(
            ntowf.as_slice(),
            &challenge.server_challenge,
            &client_challenge,
            timestamp,
            &challenge.target_info,
        );

        // The domain travels exactly as the user spelled it; the server
        // recomputes the proof from these payload fields.
        let domain = utf16le(self.credentials.domain());
        let user = utf16le(self.credentials.username());
        let workstation = utf16le(&self.workstation);

        // Fixed part: signature, type, six buffer descriptors, flags,
        // zeroed Version and MIC (MS-NLMP 2.2.1.3).
        let header_len = 88usize;
        let mut offset = header_len as u32;
        let mut msg = Vec::with_capacity(
            header_len
                + lm_response.len()
                + nt_response.len()
                + domain.len()
                + user.len()
                + workstation.len(),
        );
        msg.extend_from_slice(SIGNATURE);
        msg.extend_from_slice(&MSG_AUTHENTICATE.to_le_bytes());
        push_buffer_fields(&mut msg, lm_response.len(), offset);
        offset += lm_response.len() as u32;
        push_buffer_fields(&mut msg, nt_response.len(), offset);
        offset += nt_response.len() as u32;
        push_buffer_fields(&mut msg, domain.len(), offset);
        offset += domain.len() as u32;
        push_buffer_fields(&mut msg, user.len(), offset);
        offset += user.len() as u32;
        push_buffer_fields(&mut msg, workstation.len(), offset);
        offset += workstation.len() as u32;
        push_buffer_fields(&mut msg, 0, offset); // session key: absent
        msg.extend_from_slice(&FLAGS.to_le_bytes());
        msg.extend_from_slice(&[0u8; 8]); // Version
        msg.extend_from_slice(&[0u8; 16]); // MIC
        msg.extend_from_slice(&lm_response);
        msg.extend_from_slice(&nt_response);
        msg.extend_from_slice(&domain);
        msg.extend_from_slice(&user);
        msg.extend_from_slice(&workstation);
        Ok(msg)
    }
}

/// Parsed CHALLENGE message (type 2).
struct Challenge {
    server_challenge: [u8; 8],
    target_info: Vec<u8>,
}

impl Challenge {
    fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < 32 || &raw[0..8] != SIGNATURE {
            return Err(WinRmError::authentication(
                "Malformed NTLM challenge from server",
            ));
        }
        let msg_type = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
        if msg_type != MSG_CHALLENGE {
            return Err(WinRmError::Authentication(format!(
                "Unexpected NTLM message type {} where a challenge was expected",
                msg_type
            )));
        }

        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&raw[24..32]);

        // Target info fields sit at offset 40; servers predating NTLMv2
        // may truncate the header before them.
        let target_info = if raw.len() >= 48 {
            let len = u16::from_le_bytes([raw[40], raw[41]]) as usize;
            let offset = u32::from_le_bytes([raw[44], raw[45], raw[46], raw[47]]) as usize;
            raw.get(offset..)
                .and_then(|tail| tail.get(..len))
                .map(<[u8]>::to_vec)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            server_challenge,
            target_info,
        })
    }

    /// The MsvAvTimestamp pair from the target info, when present.
    fn timestamp(&self) -> Option<u64> {
        let mut rest = self.target_info.as_slice();
        while rest.len() >= 4 {
            let av_id = u16::from_le_bytes([rest[0], rest[1]]);
            let av_len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
            let value = rest.get(4..4 + av_len)?;
            if av_id == AV_EOL {
                break;
            }
            if av_id == AV_TIMESTAMP && av_len == 8 {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(value);
                return Some(u64::from_le_bytes(buf));
            }
            rest = &rest[4 + av_len..];
        }
        None
    }
}

/// NT hash: MD4 over the UTF-16LE password (MS-NLMP NTOWFv1).
fn nt_hash(password: &str) -> Zeroizing<[u8; 16]> {
    let encoded = Zeroizing::new(utf16le(password));
    Zeroizing::new(Md4::digest(encoded.as_slice()).into())
}

/// NTOWFv2 (MS-NLMP 3.3.2): HMAC-MD5 over uppercase(user) + domain,
/// keyed with the NT hash.
fn ntowf_v2(username: &str, domain: &str, password: &str) -> Zeroizing<[u8; 16]> {
    let key = nt_hash(password);
    let identity = Zeroizing::new(utf16le(&format!(
        "{}{}",
        username.to_uppercase(),
        domain
    )));
    Zeroizing::new(hmac_md5(key.as_slice(), identity.as_slice()))
}

/// The NTLMv2 proof pair (MS-NLMP 3.3.2): NT response and LMv2 response.
///
/// Pure in all its inputs so the MS-NLMP reference vectors can drive it
/// directly.
fn ntlmv2_responses(
    ntowf: &[u8],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
    timestamp: u64,
    target_info: &[u8],
) -> (Vec<u8>, Vec<u8>) {
    // temp blob: version marker, time, client nonce, target info.
    let mut temp = Vec::with_capacity(32 + target_info.len());
    temp.extend_from_slice(&[0x01, 0x01, 0, 0, 0, 0, 0, 0]);
    temp.extend_from_slice(&timestamp.to_le_bytes());
    temp.extend_from_slice(client_challenge);
    temp.extend_from_slice(&[0u8; 4]);
    temp.extend_from_slice(target_info);
    temp.extend_from_slice(&[0u8; 4]);

    let mut keyed = Vec::with_capacity(8 + temp.len());
    keyed.extend_from_slice(server_challenge);
    keyed.extend_from_slice(&temp);
    let nt_proof = hmac_md5(ntowf, &keyed);

    let mut nt_response = Vec::with_capacity(16 + temp.len());
    nt_response.extend_from_slice(&nt_proof);
    nt_response.extend_from_slice(&temp);

    let mut lm_keyed = [0u8; 16];
    lm_keyed[..8].copy_from_slice(server_challenge);
    lm_keyed[8..].copy_from_slice(client_challenge);
    let mut lm_response = Vec::with_capacity(24);
    lm_response.extend_from_slice(&hmac_md5(ntowf, &lm_keyed));
    lm_response.extend_from_slice(client_challenge);

    (nt_response, lm_response)
}

fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    let mut mac = HmacMd5::new_from_slice(key).expect("HMAC-MD5 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// UTF-16LE bytes of a string (the NTLM "UNICODE" encoding).
pub(crate) fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Current time as a Windows FILETIME (100 ns ticks since 1601).
fn filetime_now() -> u64 {
    let unix_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    (unix_secs + EPOCH_DIFF_SECS) * TICKS_PER_SEC
}

/// Security buffer descriptor: length, maximum length, payload offset.
fn push_buffer_fields(msg: &mut Vec<u8>, len: usize, offset: u32) {
    let len = len as u16;
    msg.extend_from_slice(&len.to_le_bytes());
    msg.extend_from_slice(&len.to_le_bytes());
    msg.extend_from_slice(&offset.to_le_bytes());
}
