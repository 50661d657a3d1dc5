// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Integration: an idle channel keeps itself alive via HEARTBEAT traffic
//! that never reaches either side's application listener.

use std::time::Duration;

use corerpc::{cfg::config::ChannelConfig, client::DirectClient};

use crate::integration_tests::common::{client_cfg, fast_timeout, spawn_demo_server};

#[tokio::test]
async fn idle_channel_survives_past_several_heartbeat_periods() {
    let addr = spawn_demo_server().await;

    let fast_heartbeat = ChannelConfig {
        heartbeat_period: 1,
        ..ChannelConfig::default()
    };
    let client = DirectClient::connect(&addr.to_string(), fast_heartbeat, client_cfg())
        .await
        .expect("connect");

    // Do nothing for long enough that both sides' write loops emit several
    // heartbeats into the otherwise-idle queue.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(client.is_active());
    let reply: String = client
        .invoke("echo", &"still alive".to_string(), fast_timeout())
        .await
        .expect("invoke after idle period");
    assert_eq!(reply, "still alive");
}
