// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Integration: a cluster client tolerates some members being unreachable
//! at connect time and keeps dispatching to the ones that are alive.

use std::time::Duration;

use corerpc::{
    cfg::config::ClusterConfig,
    cluster::ClusterClient,
};

use crate::integration_tests::common::{channel_cfg, client_cfg, fast_timeout, spawn_demo_server};

#[tokio::test]
async fn connects_despite_one_dead_member_and_keeps_serving() {
    let live_addr = spawn_demo_server().await;

    let cluster = ClusterClient::new(
        ClusterConfig {
            hosts: vec![live_addr.to_string(), "127.0.0.1:1".to_string()],
            recovery_interval: Duration::from_secs(30),
        },
        channel_cfg(),
        client_cfg(),
    );
    cluster.connect().await.expect("connect despite one dead member");

    for i in 0..6 {
        let arg = format!("call-{i}");
        let reply: String = cluster
            .invoke("echo", &arg, fast_timeout())
            .await
            .expect("invoke through whichever member is live");
        assert_eq!(reply, arg);
    }
}

#[tokio::test]
async fn all_members_dead_fails_to_connect() {
    let cluster = ClusterClient::new(
        ClusterConfig {
            hosts: vec!["127.0.0.1:1".to_string(), "127.0.0.1:2".to_string()],
            recovery_interval: Duration::from_secs(30),
        },
        channel_cfg(),
        client_cfg(),
    );
    assert!(cluster.connect().await.is_err());
}
