// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Object ↔ bytes serialization for packet bodies.
//!
//! The wire format reserves a nibble (header byte 3, high bits) to name
//! which serializer produced a body. Only one is implemented: the
//! "native object" serializer, backed by `bincode`, which is `serde`-based
//! and handles the null/void return case via `Option<T>`.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Serializer id carried in header byte 3's high nibble.
pub const NATIVE_SERIALIZER_ID: u8 = 0;

/// Serializes `value` with the native (bincode) serializer.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Deserializes bytes produced by [`serialize`] back into `T`.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

/// Body of a REQUEST packet: the method's unique name plus its
/// already-native-serialized argument tuple.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct RequestBody {
    pub method: String,
    pub args: Vec<u8>,
}
