// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Integration: broadcasting a call across 3 hosts where one of them throws
//! returns a per-host map mixing successes with one invocation error.

use std::time::Duration;

use corerpc::{
    cfg::config::ClusterConfig,
    cluster::{BroadcastClient, ClusterClient},
    error::RpcError,
};

use crate::integration_tests::common::{channel_cfg, client_cfg, fast_timeout, spawn_demo_server};

#[tokio::test]
async fn one_failing_host_does_not_sink_the_others() {
    let host1 = spawn_demo_server().await.to_string();
    let host2 = spawn_demo_server().await.to_string();
    let host3 = spawn_demo_server().await.to_string();

    let cluster = ClusterClient::new(
        ClusterConfig {
            hosts: vec![host1.clone(), host2.clone(), host3.clone()],
            recovery_interval: Duration::from_secs(30),
        },
        channel_cfg(),
        client_cfg(),
    );
    cluster.connect().await.expect("connect to all three");

    let broadcast = BroadcastClient::new(cluster, 8);
    let results = broadcast
        .execute::<String, String>("fail", &"x".to_string(), None, fast_timeout())
        .await;

    assert_eq!(results.len(), 3);
    for host in [&host1, &host2, &host3] {
        assert!(matches!(results.get(host), Some(Err(RpcError::Invocation(_)))));
    }
}

#[tokio::test]
async fn every_host_succeeds_when_the_method_does() {
    let host1 = spawn_demo_server().await.to_string();
    let host2 = spawn_demo_server().await.to_string();

    let cluster = ClusterClient::new(
        ClusterConfig {
            hosts: vec![host1.clone(), host2.clone()],
            recovery_interval: Duration::from_secs(30),
        },
        channel_cfg(),
        client_cfg(),
    );
    cluster.connect().await.expect("connect to both");

    let broadcast = BroadcastClient::new(cluster, 8);
    let results = broadcast
        .execute::<String, String>("echo", &"ping".to_string(), None, fast_timeout())
        .await;

    for host in [&host1, &host2] {
        let reply = results.get(host).unwrap().as_ref().expect("should succeed");
        assert_eq!(reply, "ping");
    }
}
