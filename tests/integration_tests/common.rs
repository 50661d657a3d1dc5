// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, time::Duration};

use corerpc::{
    cfg::config::{ChannelConfig, ClientConfig, ServerConfig},
    error::RpcError,
    server::{
        ServerDispatcher,
        registry::{MethodRegistry, MethodSpec, typed},
    },
};

pub fn channel_cfg() -> ChannelConfig {
    ChannelConfig::default()
}

pub fn client_cfg() -> ClientConfig {
    ClientConfig::default()
}

pub fn fast_timeout() -> Option<Duration> {
    Some(Duration::from_secs(5))
}

/// Starts an in-process server on `127.0.0.1:0` exposing `echo(String)` and
/// `fail(String)` (always returns an invocation error), returning its bound
/// address. The server runs for the remainder of the test process.
pub async fn spawn_demo_server() -> SocketAddr {
    let mut registry = MethodRegistry::new();
    registry
        .register_all(vec![
            MethodSpec::new("echo", vec!["String".to_string()], typed(|s: String| async move { Ok(s) })),
            MethodSpec::new(
                "fail",
                vec!["String".to_string()],
                typed(|_: String| async move { Err::<String, _>(RpcError::Invocation("boom".to_string())) }),
            ),
        ])
        .expect("register demo methods");

    let cfg = ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        worker_pool_size: 16,
        slow_execution_threshold: Duration::from_secs(1),
    };
    let dispatcher = ServerDispatcher::new(cfg, channel_cfg(), registry);
    dispatcher.init().await.expect("bind demo server")
}
