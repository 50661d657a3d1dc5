// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A pool of direct clients spread over many provider hosts: round-robin
//! dispatch, background reconnection, and per-member listener callbacks.

pub mod broadcast;

use std::{
    sync::{
        Arc, RwLock, Weak,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    cfg::config::{ChannelConfig, ClientConfig, ClusterConfig},
    client::DirectClient,
    error::{Result, RpcError},
    listener::{DirectClientListener, NoopListener, SharedClusterClientListener},
};

pub use broadcast::BroadcastClient;

struct MemberListener {
    cluster: Weak<ClusterClient>,
    idx: usize,
}

impl DirectClientListener for MemberListener {
    fn on_closed(&self, host: &str, offline: bool) {
        if let Some(cluster) = self.cluster.upgrade() {
            cluster.handle_member_closed(self.idx, host, offline);
        }
    }
}

/// A pool of [`DirectClient`]s, one per configured host, dispatched over by
/// round robin with automatic failure detection and background recovery.
pub struct ClusterClient {
    hosts: Vec<String>,
    slots: Vec<RwLock<Option<Arc<DirectClient>>>>,
    counter: AtomicUsize,
    channel_cfg: ChannelConfig,
    client_cfg: ClientConfig,
    recovery_interval: Duration,
    cancel: CancellationToken,
    recovery_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    listener: SharedClusterClientListener,
}

impl ClusterClient {
    pub fn new(cluster_cfg: ClusterConfig, channel_cfg: ChannelConfig, client_cfg: ClientConfig) -> Arc<Self> {
        Self::with_listener(cluster_cfg, channel_cfg, client_cfg, Arc::new(NoopListener))
    }

    pub fn with_listener(
        cluster_cfg: ClusterConfig,
        channel_cfg: ChannelConfig,
        client_cfg: ClientConfig,
        listener: SharedClusterClientListener,
    ) -> Arc<Self> {
        let slots = cluster_cfg.hosts.iter().map(|_| RwLock::new(None)).collect();
        Arc::new(Self {
            hosts: cluster_cfg.hosts,
            slots,
            counter: AtomicUsize::new(0),
            channel_cfg,
            client_cfg,
            recovery_interval: cluster_cfg.recovery_interval,
            cancel: CancellationToken::new(),
            recovery_handle: std::sync::Mutex::new(None),
            listener,
        })
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Connects to every configured host concurrently, tolerating individual
    /// failures. Fails with [`RpcError::NoLiveMember`] only if every host is
    /// unreachable. Starts the background recovery task on success.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let mut handles = Vec::with_capacity(self.hosts.len());
        for (idx, host) in self.hosts.iter().cloned().enumerate() {
            let channel_cfg = self.channel_cfg.clone();
            let client_cfg = self.client_cfg.clone();
            let member_listener = Arc::new(MemberListener {
                cluster: Arc::downgrade(self),
                idx,
            });
            handles.push(tokio::spawn(async move {
                let result =
                    DirectClient::connect_with_listener(&host, channel_cfg, client_cfg, member_listener).await;
                (idx, host, result)
            }));
        }

        let mut any_live = false;
        for handle in handles {
            let (idx, host, result) = handle
                .await
                .map_err(|e| RpcError::Invocation(format!("connect task panicked: {e}")))?;
            match result {
                Ok(client) => {
                    *self.slots[idx].write().unwrap() = Some(client);
                    self.listener.on_created(&host);
                    any_live = true;
                },
                Err(e) => {
                    warn!(%host, error = %e, "cluster member unreachable at construction");
                },
            }
        }

        if !any_live {
            return Err(RpcError::NoLiveMember);
        }

        self.spawn_recovery();
        Ok(())
    }

    fn spawn_recovery(self: &Arc<Self>) {
        let this = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => return,
                    _ = tokio::time::sleep(this.recovery_interval) => {},
                }
                this.recover_once().await;
            }
        });
        *self.recovery_handle.lock().unwrap() = Some(handle);
    }

    async fn recover_once(self: &Arc<Self>) {
        for (idx, host) in self.hosts.iter().enumerate() {
            let is_empty = self.slots[idx].read().unwrap().is_none();
            if !is_empty {
                continue;
            }

            let member_listener = Arc::new(MemberListener {
                cluster: Arc::downgrade(self),
                idx,
            });
            match DirectClient::connect_with_listener(
                host,
                self.channel_cfg.clone(),
                self.client_cfg.clone(),
                member_listener,
            )
            .await
            {
                Ok(client) => {
                    *self.slots[idx].write().unwrap() = Some(client);
                    self.listener.on_recovered(host);
                },
                Err(e) => {
                    tracing::debug!(%host, error = %e, "recovery attempt failed");
                },
            }
        }
    }

    fn handle_member_closed(&self, idx: usize, host: &str, offline: bool) {
        *self.slots[idx].write().unwrap() = None;
        self.listener.on_closed(host, offline);
    }

    /// Picks a live member by round robin starting at the next counter
    /// value, scanning forward with wraparound if that slot is empty or
    /// inactive.
    pub fn get_client(&self) -> Result<Arc<DirectClient>> {
        let len = self.hosts.len();
        if len == 0 {
            return Err(RpcError::NoLiveMember);
        }
        let start = self.counter.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            let idx = (start + offset) % len;
            if let Some(client) = self.slots[idx].read().unwrap().as_ref()
                && client.is_active()
            {
                return Ok(client.clone());
            }
        }
        Err(RpcError::TooBusy("no live cluster member available".to_string()))
    }

    /// Looks up the live client for a specific host, if any; used by
    /// [`BroadcastClient`] which targets hosts explicitly rather than by
    /// round robin.
    pub(crate) fn client_for_host(&self, host: &str) -> Option<Arc<DirectClient>> {
        let idx = self.hosts.iter().position(|h| h == host)?;
        self.slots[idx].read().unwrap().clone()
    }

    /// Dispatches `method(args)` to a round-robin-selected live member.
    pub async fn invoke<A, R>(&self, method: &str, args: &A, timeout: Option<Duration>) -> Result<R>
    where
        A: Serialize,
        R: DeserializeOwned,
    {
        let client = self.get_client()?;
        client.invoke(method, args, timeout).await
    }

    /// Stops the recovery task and closes every live member.
    pub fn close(&self) {
        self.cancel.cancel();
        if let Some(h) = self.recovery_handle.lock().unwrap().take() {
            h.abort();
        }
        for slot in &self.slots {
            if let Some(client) = slot.write().unwrap().take() {
                client.close();
            }
        }
    }
}
