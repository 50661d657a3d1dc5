// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Parallel fan-out over a cluster's member hosts using a bounded worker
//! pool, returning a per-host result map.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Semaphore;

use crate::{
    cluster::ClusterClient,
    error::{Result, RpcError},
    serializer,
};

/// Fans a single call out to every (or a chosen subset of) a cluster's
/// member hosts in parallel, bounded by a worker pool sized at
/// construction (mirrors the server dispatcher's backpressure primitive).
pub struct BroadcastClient {
    cluster: Arc<ClusterClient>,
    semaphore: Arc<Semaphore>,
}

impl BroadcastClient {
    pub fn new(cluster: Arc<ClusterClient>, worker_pool_size: usize) -> Self {
        Self {
            cluster,
            semaphore: Arc::new(Semaphore::new(worker_pool_size)),
        }
    }

    /// Invokes `method(args)` on every host in `hosts` (or every configured
    /// cluster host when `None`), returning a map from host to its outcome.
    /// A host whose task is rejected by the worker pool maps to
    /// [`RpcError::TooBusy`].
    pub async fn execute<A, R>(
        &self,
        method: &str,
        args: &A,
        hosts: Option<&[String]>,
        timeout: Option<Duration>,
    ) -> HashMap<String, Result<R>>
    where
        A: Serialize,
        R: DeserializeOwned + Send + 'static,
    {
        let targets: Vec<String> = match hosts {
            Some(h) => h.to_vec(),
            None => self.cluster.hosts().to_vec(),
        };

        let args_bytes = match serializer::serialize(args) {
            Ok(b) => b,
            Err(e) => {
                let msg = e.to_string();
                return targets
                    .into_iter()
                    .map(|h| (h, Err(RpcError::Invocation(msg.clone()))))
                    .collect();
            },
        };
        let args_bytes = Arc::new(args_bytes);

        let mut handles = Vec::with_capacity(targets.len());
        for host in targets {
            let cluster = self.cluster.clone();
            let semaphore = self.semaphore.clone();
            let method = method.to_string();
            let args_bytes = args_bytes.clone();

            handles.push(tokio::spawn(async move {
                let permit = match semaphore.try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        return (
                            host,
                            Err(RpcError::TooBusy(format!("broadcast pool saturated for {method}"))),
                        );
                    },
                };

                let result = match cluster.client_for_host(&host) {
                    Some(client) => client.invoke_raw(&method, (*args_bytes).clone(), timeout).await,
                    None => Err(RpcError::ChannelClosed),
                };
                drop(permit);
                (host, result)
            }));
        }

        let mut out = HashMap::with_capacity(handles.len());
        for handle in handles {
            let Ok((host, raw_result)) = handle.await else {
                continue;
            };
            let decoded = raw_result.and_then(|raw| serializer::deserialize::<R>(&raw));
            out.insert(host, decoded);
        }
        out
    }
}
