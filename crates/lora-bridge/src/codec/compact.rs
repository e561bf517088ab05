// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compact radio payload
//!
//! Wire form is a single JSON object with exactly four fields:
//!
//! ```text
//! {"id":"lathe_01","t":67.3,"v":0.012,"r":3200}
//! ```
//!
//! Temperature is rounded to 1 decimal and vibration to 3 decimals before
//! encoding, so the same reading always produces the same bytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum encoded payload size (bytes). Bounds airtime per packet.
pub const MAX_PAYLOAD_LEN: usize = 128;

/// Maximum node identity length (bytes)
pub const MAX_IDENTITY_LEN: usize = 32;

/// Identity policy violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Identity is empty
    #[error("identity is empty")]
    Empty,

    /// Identity exceeds [`MAX_IDENTITY_LEN`]
    #[error("identity is {0} bytes, limit is {MAX_IDENTITY_LEN}")]
    TooLong(usize),

    /// Identity contains a character outside `[A-Za-z0-9_.-]`
    #[error("identity contains forbidden character {0:?}")]
    ForbiddenChar(char),
}

/// Node-side encoding errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Identity does not satisfy the identity policy
    #[error("invalid identity: {0}")]
    Identity(#[from] IdentityError),

    /// Encoded form does not fit in one radio packet
    #[error("encoded payload is {0} bytes, limit is {MAX_PAYLOAD_LEN}")]
    Oversized(usize),

    /// Field is NaN or infinite; JSON has no encoding for it
    #[error("{field} is not a finite number")]
    NonFinite {
        /// Wire field name
        field: &'static str,
    },

    /// JSON serialization failure
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Gateway-side decode/validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not a well-formed compact payload
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// `id` absent, null or empty
    #[error("missing node identity")]
    MissingIdentity,

    /// `id` present but violates the identity policy
    #[error("invalid node identity {identity:?}: {reason}")]
    InvalidIdentity {
        /// Identity as received
        identity: String,
        /// Policy violation
        reason: IdentityError,
    },

    /// Packet longer than [`MAX_PAYLOAD_LEN`]
    #[error("payload is {0} bytes, limit is {MAX_PAYLOAD_LEN}")]
    Oversized(usize),
}

/// One sensor reading as transmitted over the radio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactReading {
    /// Node identity (1-32 bytes of `[A-Za-z0-9_.-]`)
    #[serde(rename = "id")]
    pub identity: String,

    /// Temperature in °C
    #[serde(rename = "t")]
    pub temperature: f64,

    /// Vibration magnitude in g
    #[serde(rename = "v")]
    pub vibration: f64,

    /// Rotational speed in rpm
    #[serde(rename = "r")]
    pub rpm: u32,
}

impl CompactReading {
    /// Create a reading
    pub fn new(identity: impl Into<String>, temperature: f64, vibration: f64, rpm: u32) -> Self {
        Self {
            identity: identity.into(),
            temperature,
            vibration,
            rpm,
        }
    }

    /// Copy of this reading with the wire rounding applied
    pub fn rounded(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            temperature: round_to(self.temperature, 10.0),
            vibration: round_to(self.vibration, 1000.0),
            rpm: self.rpm,
        }
    }
}

#[derive(Serialize)]
struct WireReading<'a> {
    id: &'a str,
    t: f64,
    v: f64,
    r: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReading {
    #[serde(default)]
    id: Option<String>,
    t: f64,
    v: f64,
    r: u32,
}

fn round_to(value: f64, scale: f64) -> f64 {
    let scaled = value * scale;
    if !scaled.is_finite() {
        // Too large to carry decimals anyway
        return value;
    }
    scaled.round() / scale
}

/// Check an identity against the allowed character set and length
pub fn validate_identity(identity: &str) -> Result<(), IdentityError> {
    if identity.is_empty() {
        return Err(IdentityError::Empty);
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(IdentityError::TooLong(identity.len()));
    }
    if let Some(c) = identity
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(IdentityError::ForbiddenChar(c));
    }
    Ok(())
}

/// Encode a reading into its compact wire form
///
/// The identity is never truncated: an identity outside the policy is a
/// deployment error and is reported as such.
pub fn encode(reading: &CompactReading) -> Result<Vec<u8>, CodecError> {
    validate_identity(&reading.identity)?;
    for (field, value) in [("t", reading.temperature), ("v", reading.vibration)] {
        if !value.is_finite() {
            return Err(CodecError::NonFinite { field });
        }
    }

    let wire = WireReading {
        id: &reading.identity,
        t: round_to(reading.temperature, 10.0),
        v: round_to(reading.vibration, 1000.0),
        r: reading.rpm,
    };
    let bytes = serde_json::to_vec(&wire)?;

    if bytes.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::Oversized(bytes.len()));
    }
    Ok(bytes)
}

/// Decode and validate a compact payload received from the radio
pub fn decode(bytes: &[u8]) -> Result<CompactReading, DecodeError> {
    if bytes.len() > MAX_PAYLOAD_LEN {
        return Err(DecodeError::Oversized(bytes.len()));
    }

    let raw: RawReading = serde_json::from_slice(bytes)
        .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let identity = match raw.id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(DecodeError::MissingIdentity),
    };
    if let Err(reason) = validate_identity(&identity) {
        return Err(DecodeError::InvalidIdentity { identity, reason });
    }

    Ok(CompactReading {
        identity,
        temperature: raw.t,
        vibration: raw.v,
        rpm: raw.r,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_reference_packet() {
        let reading = CompactReading::new("lathe_01", 67.3, 0.012, 3200);
        let bytes = encode(&reading).unwrap();
        assert_eq!(bytes, br#"{"id":"lathe_01","t":67.3,"v":0.012,"r":3200}"#);
    }

    #[test]
    fn test_encode_applies_rounding() {
        let reading = CompactReading::new("n1", 21.46, 0.12345, 10);
        let bytes = encode(&reading).unwrap();
        assert_eq!(bytes, br#"{"id":"n1","t":21.5,"v":0.123,"r":10}"#);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let reading = CompactReading::new("pump-7", -3.04, 1.0005, 0);
        assert_eq!(encode(&reading).unwrap(), encode(&reading).unwrap());
    }

    #[test]
    fn test_roundtrip_within_precision() {
        let samples = [
            CompactReading::new("lathe_01", 67.34, 0.0124, 3200),
            CompactReading::new("a", -40.05, 15.9999, 0),
            CompactReading::new("x".repeat(MAX_IDENTITY_LEN), 125.0, 0.0, u32::MAX),
        ];

        for reading in &samples {
            let decoded = decode(&encode(reading).unwrap()).unwrap();
            assert_eq!(decoded, reading.rounded());
            assert!((decoded.temperature - reading.temperature).abs() <= 0.05 + 1e-9);
            assert!((decoded.vibration - reading.vibration).abs() <= 0.0005 + 1e-9);
        }
    }

    #[test]
    fn test_worst_case_fits_packet_budget() {
        let reading = CompactReading::new("x".repeat(MAX_IDENTITY_LEN), -1.0e300, -1.0e300, u32::MAX);
        let bytes = encode(&reading).unwrap();
        assert!(bytes.len() <= MAX_PAYLOAD_LEN, "{} bytes", bytes.len());
    }

    #[test]
    fn test_encode_rejects_non_finite() {
        let nan = CompactReading::new("lathe_01", f64::NAN, 0.01, 1);
        assert!(matches!(encode(&nan), Err(CodecError::NonFinite { field: "t" })));

        let inf = CompactReading::new("lathe_01", 20.0, f64::INFINITY, 1);
        assert!(matches!(encode(&inf), Err(CodecError::NonFinite { field: "v" })));

        let neg_inf = CompactReading::new("lathe_01", f64::NEG_INFINITY, 0.01, 1);
        assert!(matches!(encode(&neg_inf), Err(CodecError::NonFinite { field: "t" })));
    }

    #[test]
    fn test_huge_finite_values_survive_rounding() {
        let reading = CompactReading::new("lathe_01", 20.0, 1e306, 1);
        let bytes = encode(&reading).unwrap();
        assert!(!bytes.windows(4).any(|w| w == b"null"));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.vibration, 1e306);
        assert_eq!(decoded, reading.rounded());

        let max = CompactReading::new("lathe_01", f64::MAX, -f64::MAX, 1);
        let decoded = decode(&encode(&max).unwrap()).unwrap();
        assert_eq!(decoded.temperature, f64::MAX);
        assert_eq!(decoded.vibration, -f64::MAX);
    }

    #[test]
    fn test_encode_rejects_long_identity() {
        let reading = CompactReading::new("x".repeat(MAX_IDENTITY_LEN + 1), 1.0, 1.0, 1);
        assert!(matches!(
            encode(&reading),
            Err(CodecError::Identity(IdentityError::TooLong(33)))
        ));
    }

    #[test]
    fn test_encode_rejects_topic_delimiters() {
        for bad in ["a/b", "a+b", "a#", "a b", ""] {
            let reading = CompactReading::new(bad, 1.0, 1.0, 1);
            assert!(encode(&reading).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_decode_reference_packet() {
        let reading = decode(br#"{"id":"lathe_01","t":67.3,"v":0.012,"r":3200}"#).unwrap();
        assert_eq!(reading.identity, "lathe_01");
        assert_eq!(reading.temperature, 67.3);
        assert_eq!(reading.vibration, 0.012);
        assert_eq!(reading.rpm, 3200);
    }

    #[test]
    fn test_decode_missing_identity() {
        assert_eq!(
            decode(br#"{"t":67.3,"v":0.012,"r":3200}"#),
            Err(DecodeError::MissingIdentity)
        );
        assert_eq!(
            decode(br#"{"id":"","t":67.3,"v":0.012,"r":3200}"#),
            Err(DecodeError::MissingIdentity)
        );
        assert_eq!(
            decode(br#"{"id":null,"t":67.3,"v":0.012,"r":3200}"#),
            Err(DecodeError::MissingIdentity)
        );
    }

    #[test]
    fn test_decode_invalid_identity() {
        let err = decode(br#"{"id":"plant/+","t":1.0,"v":0.1,"r":1}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidIdentity {
                reason: IdentityError::ForbiddenChar('/'),
                ..
            }
        ));
    }

    #[test]
    fn test_decode_malformed() {
        let cases: [&[u8]; 7] = [
            b"",
            br#"{"id":"lathe_01","t":67.3,"v":0.0"#,
            br#"{"id":"lathe_01","t":"hot","v":0.012,"r":3200}"#,
            br#"{"id":"lathe_01","t":67.3,"v":0.012,"r":-1}"#,
            br#"{"id":"lathe_01","t":67.3,"v":0.012}"#,
            br#"{"id":"lathe_01","t":67.3,"v":0.012,"r":3200,"x":1}"#,
            &[0xff, 0xfe, 0x00],
        ];
        for case in cases {
            assert!(
                matches!(decode(case), Err(DecodeError::MalformedPayload(_))),
                "{:?}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_decode_oversized() {
        let big = vec![b' '; MAX_PAYLOAD_LEN + 1];
        assert_eq!(decode(&big), Err(DecodeError::Oversized(MAX_PAYLOAD_LEN + 1)));
    }
}
