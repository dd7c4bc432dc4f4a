// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in message parsing (EIP-4361 "Sign-In with Ethereum").
//!
//! ```text
//! ${domain} wants you to sign in with your Ethereum account:
//! ${address}
//!
//! ${statement}
//!
//! URI: ${uri}
//! Version: 1
//! Chain ID: ${chain-id}
//! Nonce: ${nonce}
//! Issued At: ${issued-at}
//! Expiration Time: ${expiration-time}   (optional)
//! Not Before: ${not-before}             (optional)
//! Request ID: ${request-id}             (optional)
//! Resources:                            (optional)
//! - ${resource}
//! ```
//!
//! The statement block is optional. Parsing is strict about line order,
//! validation of the time bounds and domain is a separate step.

use chrono::{DateTime, Utc};

use crate::models::WalletAddress;

const PREAMBLE_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const SUPPORTED_VERSION: &str = "1";
const MIN_NONCE_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SiweError {
    #[error("missing preamble line")]
    MissingPreamble,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("missing or out-of-order field: {0}")]
    MissingField(&'static str),

    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid chain id: {0}")]
    InvalidChainId(String),

    #[error("nonce must be at least 8 alphanumeric characters")]
    InvalidNonce,

    #[error("invalid timestamp in {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("unexpected trailing content: {0}")]
    TrailingContent(String),

    #[error("message has expired")]
    Expired,

    #[error("message is not yet valid")]
    NotYetValid,

    #[error("domain mismatch: expected {expected}, got {actual}")]
    DomainMismatch { expected: String, actual: String },
}

/// A parsed sign-in message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: WalletAddress,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

fn parse_time(field: &'static str, value: &str) -> Result<DateTime<Utc>, SiweError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| SiweError::InvalidTimestamp {
            field,
            value: value.to_string(),
        })
}

/// Line cursor that understands `Tag: value` fields.
struct Lines<'a> {
    lines: std::iter::Peekable<std::str::Lines<'a>>,
}

impl<'a> Lines<'a> {
    fn required(&mut self, tag: &'static str) -> Result<&'a str, SiweError> {
        self.optional(tag).ok_or(SiweError::MissingField(tag))
    }

    fn optional(&mut self, tag: &'static str) -> Option<&'a str> {
        let line = *self.lines.peek()?;
        let value = line.strip_prefix(tag)?.strip_prefix(": ")?;
        self.lines.next();
        Some(value)
    }
}

impl SiweMessage {
    /// Parse the message text exactly as the wallet signed it.
    pub fn parse(raw: &str) -> Result<Self, SiweError> {
        // Wallets on Windows may sign CRLF text; the signature covers the raw
        // bytes, so only the parser tolerates it.
        let mut cursor = Lines {
            lines: raw.lines().peekable(),
        };

        let domain = cursor
            .lines
            .next()
            .and_then(|l| l.strip_suffix(PREAMBLE_SUFFIX))
            .filter(|d| !d.is_empty() && !d.contains(char::is_whitespace))
            .ok_or(SiweError::MissingPreamble)?
            .to_string();

        let address_line = cursor
            .lines
            .next()
            .ok_or(SiweError::MissingField("address"))?;
        let address = WalletAddress::parse(address_line)
            .map_err(|_| SiweError::InvalidAddress(address_line.to_string()))?;

        if cursor.lines.next() != Some("") {
            return Err(SiweError::MissingField("blank line after address"));
        }

        // Optional statement followed by its own blank line.
        let statement = match cursor.lines.peek() {
            Some(line) if !line.starts_with("URI: ") => {
                let text = line.to_string();
                cursor.lines.next();
                if cursor.lines.next() != Some("") {
                    return Err(SiweError::MissingField("blank line after statement"));
                }
                Some(text)
            }
            _ => None,
        };

        let uri = cursor.required("URI")?.to_string();

        let version = cursor.required("Version")?;
        if version != SUPPORTED_VERSION {
            return Err(SiweError::UnsupportedVersion(version.to_string()));
        }

        let chain_raw = cursor.required("Chain ID")?;
        let chain_id = chain_raw
            .parse::<u64>()
            .map_err(|_| SiweError::InvalidChainId(chain_raw.to_string()))?;

        let nonce = cursor.required("Nonce")?;
        if nonce.len() < MIN_NONCE_LEN || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SiweError::InvalidNonce);
        }

        let issued_at = parse_time("Issued At", cursor.required("Issued At")?)?;
        let expiration_time = cursor
            .optional("Expiration Time")
            .map(|v| parse_time("Expiration Time", v))
            .transpose()?;
        let not_before = cursor
            .optional("Not Before")
            .map(|v| parse_time("Not Before", v))
            .transpose()?;
        let request_id = cursor.optional("Request ID").map(str::to_string);

        let mut resources = Vec::new();
        if cursor.lines.peek() == Some(&"Resources:") {
            cursor.lines.next();
            while let Some(resource) = cursor.lines.peek().and_then(|l| l.strip_prefix("- ")) {
                resources.push(resource.to_string());
                cursor.lines.next();
            }
        }

        if let Some(extra) = cursor.lines.find(|l| !l.trim().is_empty()) {
            return Err(SiweError::TrailingContent(extra.to_string()));
        }

        Ok(Self {
            domain,
            address,
            statement,
            uri,
            version: version.to_string(),
            chain_id,
            nonce: nonce.to_string(),
            issued_at,
            expiration_time,
            not_before,
            request_id,
            resources,
        })
    }

    /// Check the time bounds and, when configured, the expected domain.
    pub fn validate(&self, now: DateTime<Utc>, expected_domain: Option<&str>) -> Result<(), SiweError> {
        if let Some(expected) = expected_domain {
            if !self.domain.eq_ignore_ascii_case(expected) {
                return Err(SiweError::DomainMismatch {
                    expected: expected.to_string(),
                    actual: self.domain.clone(),
                });
            }
        }
        if self.expiration_time.is_some_and(|exp| exp <= now) {
            return Err(SiweError::Expired);
        }
        if self.not_before.is_some_and(|nbf| nbf > now) {
            return Err(SiweError::NotYetValid);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_message(domain: &str, address: &str, nonce: &str) -> String {
    format!(
        "{domain} wants you to sign in with your Ethereum account:\n\
         {address}\n\
         \n\
         Sign in to Relational Cover.\n\
         \n\
         URI: https://{domain}\n\
         Version: 1\n\
         Chain ID: 56\n\
         Nonce: {nonce}\n\
         Issued At: 2026-01-01T00:00:00Z"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ADDR: &str = "0xAbC0000000000000000000000000000000000001";

    #[test]
    fn parses_full_message() {
        let raw = format!(
            "{}\nExpiration Time: 2030-01-01T00:00:00Z\nRequest ID: req-1\nResources:\n- https://a\n- https://b",
            sample_message("cover.relational.network", ADDR, "abcdEFGH1234")
        );
        let msg = SiweMessage::parse(&raw).unwrap();

        assert_eq!(msg.domain, "cover.relational.network");
        assert_eq!(msg.address.as_canonical(), ADDR.to_ascii_lowercase());
        assert_eq!(msg.statement.as_deref(), Some("Sign in to Relational Cover."));
        assert_eq!(msg.uri, "https://cover.relational.network");
        assert_eq!(msg.chain_id, 56);
        assert_eq!(msg.nonce, "abcdEFGH1234");
        assert!(msg.expiration_time.is_some());
        assert_eq!(msg.request_id.as_deref(), Some("req-1"));
        assert_eq!(msg.resources, vec!["https://a", "https://b"]);
    }

    #[test]
    fn statement_is_optional() {
        let raw = format!(
            "example.com wants you to sign in with your Ethereum account:\n{ADDR}\n\n\
             URI: https://example.com\nVersion: 1\nChain ID: 1\nNonce: 12345678\n\
             Issued At: 2026-01-01T00:00:00Z"
        );
        let msg = SiweMessage::parse(&raw).unwrap();
        assert_eq!(msg.statement, None);
    }

    #[test]
    fn rejects_structural_problems() {
        assert_eq!(SiweMessage::parse("hello").unwrap_err(), SiweError::MissingPreamble);

        let bad_addr = sample_message("example.com", "0x1234", "abcdEFGH1234");
        assert!(matches!(
            SiweMessage::parse(&bad_addr),
            Err(SiweError::InvalidAddress(_))
        ));

        let v2 = sample_message("example.com", ADDR, "abcdEFGH1234").replace("Version: 1", "Version: 2");
        assert!(matches!(
            SiweMessage::parse(&v2),
            Err(SiweError::UnsupportedVersion(_))
        ));

        let no_nonce = sample_message("example.com", ADDR, "abcdEFGH1234").replace("Nonce: abcdEFGH1234\n", "");
        assert_eq!(
            SiweMessage::parse(&no_nonce).unwrap_err(),
            SiweError::MissingField("Nonce")
        );

        let short_nonce = sample_message("example.com", ADDR, "abc");
        assert_eq!(SiweMessage::parse(&short_nonce).unwrap_err(), SiweError::InvalidNonce);

        let trailing = format!("{}\nsurprise", sample_message("example.com", ADDR, "abcdEFGH1234"));
        assert!(matches!(
            SiweMessage::parse(&trailing),
            Err(SiweError::TrailingContent(_))
        ));
    }

    #[test]
    fn validate_checks_time_bounds_and_domain() {
        let now = Utc::now();
        let mut msg = SiweMessage::parse(&sample_message("example.com", ADDR, "abcdEFGH1234")).unwrap();
        assert!(msg.validate(now, Some("EXAMPLE.com")).is_ok());
        assert!(matches!(
            msg.validate(now, Some("evil.com")),
            Err(SiweError::DomainMismatch { .. })
        ));

        msg.expiration_time = Some(now - Duration::seconds(1));
        assert_eq!(msg.validate(now, None).unwrap_err(), SiweError::Expired);

        msg.expiration_time = None;
        msg.not_before = Some(now + Duration::minutes(5));
        assert_eq!(msg.validate(now, None).unwrap_err(), SiweError::NotYetValid);
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let raw = sample_message("example.com", ADDR, "abcdEFGH1234").replace('\n', "\r\n");
        assert!(SiweMessage::parse(&raw).is_ok());
    }
}
