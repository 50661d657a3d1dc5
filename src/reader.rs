// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Length-delimited framed reader over an async byte stream.
//!
//! Reads exactly [`HEADER_LEN`](crate::packet::HEADER_LEN) header bytes
//! (looping on short reads), then exactly `body_len` body bytes. Returns
//! `Ok(None)` only when the very first header byte can't be read (a clean
//! peer close); any other short read is a [`RpcError::Protocol`].

use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::{
    error::{Result, RpcError},
    packet::{HEADER_LEN, Packet, PacketHeader},
};

/// An observer invoked after every successful packet read with
/// `(host, bytes_read)`.
pub trait ReadObserver: Send + Sync {
    fn on_read(&self, host: &str, bytes_read: usize);
}

/// No-op observer used when the caller doesn't care to track read volume.
pub struct NoopReadObserver;

impl ReadObserver for NoopReadObserver {
    fn on_read(&self, _host: &str, _bytes_read: usize) {}
}

/// Reads one packet from `stream`. Returns `Ok(None)` on a clean EOF at the
/// start of a header.
pub async fn read_packet<R>(
    stream: &mut R,
    host: &str,
    observer: &dyn ReadObserver,
) -> Result<Option<Packet>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut hdr_buf = [0u8; HEADER_LEN];

    // Peek the first byte by hand so a clean close (0 bytes available) can be
    // told apart from a short read mid-header.
    let n = stream.read(&mut hdr_buf[..1]).await?;
    if n == 0 {
        return Ok(None);
    }

    let mut filled = 1;
    while filled < HEADER_LEN {
        let n = stream.read(&mut hdr_buf[filled..]).await?;
        if n == 0 {
            return Err(RpcError::Protocol(
                "peer closed mid-header".to_string(),
            ));
        }
        filled += n;
    }

    let header = PacketHeader::from_bytes(&hdr_buf)?;

    let mut body = vec![0u8; header.body_len as usize];
    stream.read_exact(&mut body).await.map_err(|e| {
        RpcError::Protocol(format!("peer closed mid-body (wanted {} bytes): {e}", body.len()))
    })?;

    let total = HEADER_LEN + body.len();
    observer.on_read(host, total);

    Ok(Some(Packet {
        header,
        body: Bytes::from(body),
    }))
}
