// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The synchronous-contract invocation façade over one [`Channel`].

use std::{sync::Arc, time::Duration, time::Instant};

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{
    cfg::config::{ChannelConfig, ClientConfig},
    channel::Channel,
    client::pending::{PendingMap, SlotOutcome},
    compress,
    error::{Result, RpcError},
    listener::{ChannelListener, NoopListener, SharedDirectClientListener},
    packet::{Opcode, Packet, Status},
    serializer::{self, RequestBody},
    utils::PacketIdGenerator,
};

struct RoutingListener {
    pending: Arc<PendingMap>,
    listener: SharedDirectClientListener,
}

impl ChannelListener for RoutingListener {
    fn on_receive(&self, host: &str, packet: Packet) {
        if !self.pending.complete(packet) {
            debug!(%host, "discarding response with no matching pending call");
        }
    }

    fn on_closed(&self, host: &str, offline: bool) {
        self.pending.close_all();
        self.listener.on_closed(host, offline);
    }
}

/// Send-and-wait façade over one [`Channel`]: correlates responses to
/// callers by packet id, enforces per-call timeouts, and translates
/// response status codes into outcomes.
pub struct DirectClient {
    host: String,
    channel: Arc<Channel>,
    pending: Arc<PendingMap>,
    ids: PacketIdGenerator,
    cfg: ClientConfig,
    compression_threshold: usize,
    listener: SharedDirectClientListener,
}

impl DirectClient {
    pub async fn connect(
        host: &str,
        channel_cfg: ChannelConfig,
        client_cfg: ClientConfig,
    ) -> Result<Arc<Self>> {
        Self::connect_with_listener(host, channel_cfg, client_cfg, Arc::new(NoopListener)).await
    }

    pub async fn connect_with_listener(
        host: &str,
        channel_cfg: ChannelConfig,
        client_cfg: ClientConfig,
        listener: SharedDirectClientListener,
    ) -> Result<Arc<Self>> {
        let stream = TcpStream::connect(host).await?;
        let pending = Arc::new(PendingMap::new());
        let compression_threshold = channel_cfg.compression_threshold_bytes;
        let routing = Arc::new(RoutingListener {
            pending: pending.clone(),
            listener: listener.clone(),
        });

        let channel = Channel::with_listener(stream, host.to_string(), channel_cfg, routing);
        channel.init().await?;
        listener.on_created(host);

        Ok(Arc::new(Self {
            host: host.to_string(),
            channel,
            pending,
            ids: PacketIdGenerator::new(),
            cfg: client_cfg,
            compression_threshold,
            listener,
        }))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_active(&self) -> bool {
        self.channel.is_active()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sends `method(args)` and blocks until a response, timeout, or close.
    pub async fn invoke<A, R>(&self, method: &str, args: &A, timeout: Option<Duration>) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let args_bytes = serializer::serialize(args)?;
        let raw = self.invoke_raw(method, args_bytes, timeout).await?;
        serializer::deserialize(&raw)
    }

    /// Same call as [`DirectClient::invoke`], but takes already-serialized
    /// argument bytes and returns the raw (decompressed, not-yet-deserialized)
    /// response body. Used by [`crate::cluster::broadcast::BroadcastClient`]
    /// to serialize arguments once and fan out the same bytes to every
    /// member.
    pub async fn invoke_raw(
        &self,
        method: &str,
        args_bytes: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let id = self.ids.next();
        let rx = self.pending.install(id);

        let raw_body = serializer::serialize(&RequestBody {
            method: method.to_string(),
            args: args_bytes,
        })?;
        let compressed = compress::should_compress(raw_body.len(), self.compression_threshold);
        let body = if compressed { compress::compress(&raw_body)? } else { raw_body };

        let packet = Packet::request(id, Opcode::RemoteInvocation, Bytes::from(body), compressed);

        if let Err(e) = self.channel.send(packet) {
            self.pending.remove(id);
            return Err(e);
        }

        let started = Instant::now();
        let timeout_dur = timeout.unwrap_or(self.cfg.default_timeout);

        let outcome = match tokio::time::timeout(timeout_dur, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => SlotOutcome::Closed,
            Err(_) => {
                self.pending.remove(id);
                self.listener.on_timeout(&self.host, method);
                return Err(RpcError::Timeout(timeout_dur));
            },
        };

        match outcome {
            SlotOutcome::Closed => {
                self.listener
                    .on_invocation_error(&self.host, method, "channel closed");
                Err(RpcError::ChannelClosed)
            },
            SlotOutcome::Response(packet) => {
                let elapsed = started.elapsed();
                if elapsed >= self.cfg.slow_execution_threshold {
                    self.listener.on_slow_execution(&self.host, method, elapsed);
                }
                self.decode_response(method, packet)
            },
        }
    }

    fn decode_response(&self, method: &str, packet: Packet) -> Result<Vec<u8>> {
        match packet.header.status {
            Status::Success => {
                if packet.header.flags.is_compressed() {
                    compress::decompress(&packet.body)
                } else {
                    Ok(packet.body.to_vec())
                }
            },
            Status::TooBusy => {
                self.listener.on_too_busy(&self.host, method);
                Err(RpcError::TooBusy(format!("{method} rejected by server")))
            },
            status @ (Status::InvocationError | Status::ClassNotFound | Status::MethodNotFound) => {
                let msg = format!("{method} failed with status {status:?}");
                self.listener.on_invocation_error(&self.host, method, &msg);
                Err(RpcError::Invocation(msg))
            },
        }
    }

    /// Starts the graceful drain handshake on the underlying channel.
    pub fn offline(&self) -> Result<()> {
        self.channel.offline()
    }

    /// Closes the underlying channel; pending calls observe
    /// [`RpcError::ChannelClosed`].
    pub fn close(&self) {
        self.channel.close(false);
    }
}
