// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reading codecs
//!
//! - [`compact`] -- the radio format sent by nodes (`id`, `t`, `v`, `r`)
//! - [`canonical`] -- the enriched broker format published by the gateway
//!
//! Both are JSON text. The compact form is bounded by [`MAX_PAYLOAD_LEN`] to
//! keep airtime predictable.

pub mod canonical;
pub mod compact;

pub use canonical::{derive_topic, CanonicalReading};
pub use compact::{
    decode, encode, validate_identity, CodecError, CompactReading, DecodeError, IdentityError,
    MAX_IDENTITY_LEN, MAX_PAYLOAD_LEN,
};
