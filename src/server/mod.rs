// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Accept loop, method registry, and bounded worker pool that turns decoded
//! invocations into executed calls and framed responses.

pub mod registry;

use std::{sync::Arc, time::Duration, time::Instant};

use bytes::Bytes;
use dashmap::DashMap;
use tokio::{net::TcpListener, sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::{ChannelConfig, ServerConfig},
    channel::Channel,
    compress,
    error::Result,
    listener::{ChannelListener, ExecutorListener, NoopListener, SharedExecutorListener},
    packet::{Opcode, Packet, Status},
    serializer::{self, RequestBody},
    server::registry::MethodRegistry,
};

struct DispatcherChannelListener {
    dispatcher: Arc<ServerDispatcher>,
}

impl ChannelListener for DispatcherChannelListener {
    fn on_receive(&self, host: &str, packet: Packet) {
        let dispatcher = self.dispatcher.clone();
        let host = host.to_string();
        tokio::spawn(async move {
            dispatcher.dispatch(&host, packet).await;
        });
    }

    fn on_closed(&self, host: &str, offline: bool) {
        self.dispatcher.channels.remove(host);
        debug!(%host, offline, "channel closed, dropped from tracked set");
    }
}

/// Accepts connections, pairs each with a [`Channel`], and executes decoded
/// invocations on a bounded worker pool before writing the encoded response
/// back. One instance per listening port.
pub struct ServerDispatcher {
    cfg: ServerConfig,
    channel_cfg: ChannelConfig,
    registry: MethodRegistry,
    channels: DashMap<String, Arc<Channel>>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    accept_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    listener: SharedExecutorListener,
}

impl ServerDispatcher {
    pub fn new(cfg: ServerConfig, channel_cfg: ChannelConfig, registry: MethodRegistry) -> Arc<Self> {
        Self::with_listener(cfg, channel_cfg, registry, Arc::new(NoopListener))
    }

    pub fn with_listener(
        cfg: ServerConfig,
        channel_cfg: ChannelConfig,
        registry: MethodRegistry,
        listener: SharedExecutorListener,
    ) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(cfg.worker_pool_size));
        Arc::new(Self {
            cfg,
            channel_cfg,
            registry,
            channels: DashMap::new(),
            semaphore,
            cancel: CancellationToken::new(),
            accept_handle: std::sync::Mutex::new(None),
            listener,
        })
    }

    /// Binds [`ServerConfig::bind_address`] and starts the accept loop.
    /// Returns the bound address (useful for tests binding port `0`).
    pub async fn init(self: &Arc<Self>) -> Result<std::net::SocketAddr> {
        let tcp_listener = TcpListener::bind(&self.cfg.bind_address).await?;
        let local_addr = tcp_listener.local_addr()?;

        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.accept_loop(tcp_listener).await;
        });
        *self.accept_handle.lock().unwrap() = Some(handle);

        Ok(local_addr)
    }

    async fn accept_loop(self: Arc<Self>, tcp_listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                accepted = tcp_listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.handle_new_connection(stream, peer.to_string()),
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }

    fn handle_new_connection(self: &Arc<Self>, stream: tokio::net::TcpStream, host: String) {
        let dispatcher_listener = Arc::new(DispatcherChannelListener { dispatcher: self.clone() });
        let channel = Channel::with_listener(stream, host.clone(), self.channel_cfg.clone(), dispatcher_listener);
        self.channels.insert(host.clone(), channel.clone());

        tokio::spawn(async move {
            if let Err(e) = channel.init().await {
                warn!(%host, error = %e, "failed to initialize accepted channel");
            }
        });
    }

    /// Routes one decoded packet from a tracked channel: HEARTBEAT/OFFLINE
    /// are already handled inside the channel's own read loop and never
    /// reach here; anything else is assumed a REQUEST and submitted to the
    /// worker pool. A RESPONSE arriving here (a misbehaving peer) is logged
    /// and discarded.
    async fn dispatch(self: Arc<ServerDispatcher>, host: &str, packet: Packet) {
        if !packet.is_request() {
            warn!(%host, "discarding unsolicited response packet");
            return;
        }

        let Some(channel) = self.channels.get(host).map(|c| c.clone()) else {
            return;
        };

        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                self.listener.on_too_busy("<unknown>");
                let reply = Packet::response(
                    packet.header.packet_id,
                    packet.header.opcode,
                    Status::TooBusy,
                    Bytes::new(),
                    false,
                );
                let _ = channel.send_internal(reply);
                return;
            },
        };

        tokio::spawn(async move {
            self.invoke_and_respond(&channel, packet).await;
            drop(permit);
        });
    }

    async fn invoke_and_respond(&self, channel: &Arc<Channel>, packet: Packet) {
        let packet_id = packet.header.packet_id;
        let opcode = packet.header.opcode;

        let body = if packet.header.flags.is_compressed() {
            match compress::decompress(&packet.body) {
                Ok(b) => b,
                Err(e) => {
                    self.respond_error(channel, packet_id, opcode, Status::InvocationError, &e.to_string());
                    return;
                },
            }
        } else {
            packet.body.to_vec()
        };

        let request: RequestBody = match serializer::deserialize(&body) {
            Ok(r) => r,
            Err(e) => {
                self.respond_error(channel, packet_id, opcode, Status::InvocationError, &e.to_string());
                return;
            },
        };

        let Some(handler) = self.registry.lookup(&request.method) else {
            self.listener.on_method_not_found(&request.method);
            self.respond_error(
                channel,
                packet_id,
                opcode,
                Status::MethodNotFound,
                &format!("no such method: {}", request.method),
            );
            return;
        };

        let started = Instant::now();
        let result = handler.call(&request.args).await;
        let elapsed = started.elapsed();
        if elapsed >= self.cfg.slow_execution_threshold {
            self.listener.on_slow_execution(&request.method, elapsed);
        }

        match result {
            Ok(raw) => {
                let compressed = compress::should_compress(raw.len(), self.channel_cfg.compression_threshold_bytes);
                let body = if compressed {
                    match compress::compress(&raw) {
                        Ok(b) => b,
                        Err(e) => {
                            self.respond_error(channel, packet_id, opcode, Status::InvocationError, &e.to_string());
                            return;
                        },
                    }
                } else {
                    raw
                };
                let reply = Packet::response(packet_id, opcode, Status::Success, Bytes::from(body), compressed);
                let _ = channel.send_internal(reply);
            },
            Err(e) => {
                self.listener.on_invocation_error(&request.method, &e.to_string());
                self.respond_error(channel, packet_id, opcode, Status::InvocationError, &e.to_string());
            },
        }
    }

    fn respond_error(&self, channel: &Arc<Channel>, packet_id: i64, opcode: Opcode, status: Status, message: &str) {
        debug!(packet_id, status = ?status, message, "responding with error status");
        let reply = Packet::response(packet_id, opcode, status, Bytes::new(), false);
        let _ = channel.send_internal(reply);
    }

    /// Starts the graceful drain handshake on every currently tracked
    /// channel, then closes each after the configured grace period.
    pub async fn offline(&self) {
        let grace = Duration::from_secs(60);
        for entry in self.channels.iter() {
            let _ = entry.value().offline();
        }
        tokio::time::sleep(grace).await;
        self.close();
    }

    /// Stops the accept loop and closes every tracked channel.
    pub fn close(&self) {
        self.cancel.cancel();
        if let Some(h) = self.accept_handle.lock().unwrap().take() {
            h.abort();
        }
        for entry in self.channels.iter() {
            entry.value().close(false);
        }
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{client::DirectClient, server::registry::{MethodSpec, typed}};

    fn server_cfg() -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            worker_pool_size: 4,
            slow_execution_threshold: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn echo_roundtrip_through_the_wire() {
        let mut registry = MethodRegistry::new();
        registry
            .register_all(vec![MethodSpec::new(
                "echo",
                vec!["String".to_string()],
                typed(|s: String| async move { Ok(s) }),
            )])
            .expect("register");

        let dispatcher = ServerDispatcher::new(server_cfg(), ChannelConfig::default(), registry);
        let addr = dispatcher.init().await.expect("bind");

        let client = DirectClient::connect(&addr.to_string(), ChannelConfig::default(), Default::default())
            .await
            .expect("connect");

        let reply: String = client
            .invoke("echo", &"hello".to_string(), Some(Duration::from_secs(2)))
            .await
            .expect("invoke");
        assert_eq!(reply, "hello");

        dispatcher.close();
    }

    #[tokio::test]
    async fn unknown_method_returns_invocation_error() {
        let registry = MethodRegistry::new();
        let dispatcher = ServerDispatcher::new(server_cfg(), ChannelConfig::default(), registry);
        let addr = dispatcher.init().await.expect("bind");

        let client = DirectClient::connect(&addr.to_string(), ChannelConfig::default(), Default::default())
            .await
            .expect("connect");

        let result: Result<String> = client
            .invoke("does_not_exist", &"hi".to_string(), Some(Duration::from_secs(2)))
            .await;
        assert!(result.is_err());

        dispatcher.close();
    }
}
