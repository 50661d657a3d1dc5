// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A bidirectional framed packet pipe over one TCP socket: a paired
//! write-loop (batched) and read-loop task, a heartbeat, and the offline
//! drain handshake.

mod read_loop;
mod write_loop;

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, Ordering},
};

use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    cfg::config::ChannelConfig,
    error::{Result, RpcError},
    listener::{NoopListener, SharedChannelListener},
    packet::Packet,
};

/// Monotonic channel lifecycle. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    Uninitialized = 0,
    Normal = 1,
    Closed = 2,
}

impl From<u8> for ChannelState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Normal,
            2 => Self::Closed,
            _ => Self::Uninitialized,
        }
    }
}

/// One socket, one outbound queue, one read task, one write task.
pub struct Channel {
    host: String,
    cfg: ChannelConfig,
    tx: mpsc::UnboundedSender<Packet>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Packet>>>,
    halves: Mutex<Option<(OwnedReadHalf, OwnedWriteHalf)>>,
    state: AtomicU8,
    offline_received: AtomicBool,
    closed_once: AtomicBool,
    cancel: CancellationToken,
    listener: SharedChannelListener,
    read_handle: Mutex<Option<JoinHandle<()>>>,
    write_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Channel {
    /// Wraps an already-connected socket. Does not start I/O; call
    /// [`Channel::init`] to do that.
    pub fn new(stream: TcpStream, host: String, cfg: ChannelConfig) -> Arc<Self> {
        Self::with_listener(stream, host, cfg, Arc::new(NoopListener))
    }

    pub fn with_listener(
        stream: TcpStream,
        host: String,
        cfg: ChannelConfig,
        listener: SharedChannelListener,
    ) -> Arc<Self> {
        let (r, w) = stream.into_split();
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            host,
            cfg,
            tx,
            rx: Mutex::new(Some(rx)),
            halves: Mutex::new(Some((r, w))),
            state: AtomicU8::new(ChannelState::Uninitialized as u8),
            offline_received: AtomicBool::new(false),
            closed_once: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            listener,
            read_handle: Mutex::new(None),
            write_handle: Mutex::new(None),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from(self.state.load(Ordering::Acquire))
    }

    /// `NORMAL` and no OFFLINE request has been observed from the peer.
    pub fn is_active(&self) -> bool {
        self.state() == ChannelState::Normal && !self.offline_received.load(Ordering::Acquire)
    }

    pub fn offline_received(&self) -> bool {
        self.offline_received.load(Ordering::Acquire)
    }

    /// Idempotent. Requires the socket handed to [`Channel::new`] to already
    /// be connected (always true for a `tokio::net::TcpStream`); starts the
    /// read and write tasks and transitions to `NORMAL`.
    pub async fn init(self: &Arc<Self>) -> Result<()> {
        if self.state() != ChannelState::Uninitialized {
            return Ok(());
        }

        let halves = self.halves.lock().await.take();
        let rx = self.rx.lock().await.take();
        let (Some((reader, writer)), Some(rx)) = (halves, rx) else {
            self.state.store(ChannelState::Closed as u8, Ordering::Release);
            return Err(RpcError::IllegalState(
                "channel already initialized or socket missing".to_string(),
            ));
        };

        self.state.store(ChannelState::Normal as u8, Ordering::Release);

        let read_task = tokio::spawn(read_loop::run(self.clone(), reader));
        let write_task = tokio::spawn(write_loop::run(self.clone(), writer, rx));

        *self.read_handle.lock().await = Some(read_task);
        *self.write_handle.lock().await = Some(write_task);

        Ok(())
    }

    /// Non-blocking enqueue onto the unbounded outbound FIFO.
    pub fn send(&self, packet: Packet) -> Result<()> {
        if !self.is_active() {
            return Err(RpcError::IllegalState(format!(
                "channel {} is not active",
                self.host
            )));
        }
        self.tx.send(packet).map_err(|_| RpcError::ChannelClosed)
    }

    /// Enqueues an OFFLINE request, starting the graceful drain handshake.
    pub fn offline(&self) -> Result<()> {
        self.tx
            .send(Packet::offline_request())
            .map_err(|_| RpcError::ChannelClosed)
    }

    /// Enqueues a protocol-internal packet (HEARTBEAT/OFFLINE response)
    /// regardless of `is_active`; the read worker uses this to reply to the
    /// peer even after `offlineReceived` flips.
    pub(crate) fn send_internal(&self, packet: Packet) -> Result<()> {
        self.tx.send(packet).map_err(|_| RpcError::ChannelClosed)
    }

    pub(crate) fn mark_offline_received(&self) {
        self.offline_received.store(true, Ordering::Release);
    }

    pub(crate) fn config(&self) -> &ChannelConfig {
        &self.cfg
    }

    pub(crate) fn listener(&self) -> &SharedChannelListener {
        &self.listener
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Idempotent: closes the socket, stops both workers, and invokes
    /// `onClosed` exactly once.
    pub fn close(self: &Arc<Self>, offline: bool) {
        if self
            .closed_once
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.state.store(ChannelState::Closed as u8, Ordering::Release);
        self.cancel.cancel();

        let this = self.clone();
        tokio::spawn(async move {
            if let Some(h) = this.read_handle.lock().await.take() {
                h.abort();
            }
            if let Some(h) = this.write_handle.lock().await.take() {
                h.abort();
            }
        });

        self.listener.on_closed(&self.host, offline);
    }

    /// Schedules a deferred close after the offline grace period, used once
    /// an OFFLINE request has been observed from the peer.
    pub(crate) fn schedule_offline_close(self: &Arc<Self>) {
        let this = self.clone();
        let grace = this.cfg.offline_grace_period;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            this.close(true);
        });
    }
}
