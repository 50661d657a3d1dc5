// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Body compression. Bodies at or above a configured threshold are
//! deflate-compressed before being written to the wire; the packet header's
//! compressed bit (see [`crate::packet`]) records whether that happened.

use std::io::{Read, Write};

use flate2::{Compression, read::DeflateDecoder, write::DeflateEncoder};

use crate::error::{Result, RpcError};

/// Deflates `body` at the default compression level.
pub fn compress(body: &[u8]) -> Result<Vec<u8>> {
    let mut enc = DeflateEncoder::new(Vec::with_capacity(body.len()), Compression::default());
    enc.write_all(body)?;
    Ok(enc.finish()?)
}

/// Inflates a buffer previously produced by [`compress`].
pub fn decompress(body: &[u8]) -> Result<Vec<u8>> {
    let mut dec = DeflateDecoder::new(body);
    let mut out = Vec::new();
    dec.read_to_end(&mut out)
        .map_err(|e| RpcError::Protocol(format!("failed to inflate body: {e}")))?;
    Ok(out)
}

/// Whether a body of `len` bytes must be compressed before being framed.
#[inline]
pub fn should_compress(len: usize, threshold: usize) -> bool {
    len >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let body = b"the quick brown fox jumps over the lazy dog".repeat(64);
        let compressed = compress(&body).expect("compress");
        assert!(compressed.len() < body.len());
        let restored = decompress(&compressed).expect("decompress");
        assert_eq!(restored, body);
    }

    #[test]
    fn empty_body_roundtrip() {
        let compressed = compress(&[]).expect("compress empty");
        let restored = decompress(&compressed).expect("decompress empty");
        assert!(restored.is_empty());
    }

    #[test]
    fn threshold() {
        assert!(!should_compress(10, 1024));
        assert!(should_compress(2048, 1024));
        assert!(should_compress(1024, 1024));
    }
}
