// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Integration: a caller invocation against a real server either succeeds,
//! surfaces the server's own failure, or times out cleanly against a peer
//! that never answers.

use std::time::Duration;

use corerpc::{
    cfg::config::ChannelConfig, client::DirectClient, error::RpcError,
};
use tokio::net::TcpListener;

use crate::integration_tests::common::{client_cfg, channel_cfg, fast_timeout, spawn_demo_server};

#[tokio::test]
async fn successful_invocation_returns_the_value() {
    let addr = spawn_demo_server().await;
    let client = DirectClient::connect(&addr.to_string(), channel_cfg(), client_cfg())
        .await
        .expect("connect");

    let reply: String = client
        .invoke("echo", &"hi".to_string(), fast_timeout())
        .await
        .expect("invoke");
    assert_eq!(reply, "hi");
}

#[tokio::test]
async fn server_side_failure_surfaces_as_invocation_error() {
    let addr = spawn_demo_server().await;
    let client = DirectClient::connect(&addr.to_string(), channel_cfg(), client_cfg())
        .await
        .expect("connect");

    let result: Result<String, RpcError> = client.invoke("fail", &"hi".to_string(), fast_timeout()).await;
    assert!(matches!(result, Err(RpcError::Invocation(_))));
}

#[tokio::test]
async fn unresponsive_peer_times_out_and_frees_the_slot() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_stream, _peer) = listener.accept().await.unwrap();
        std::future::pending::<()>().await
    });

    let client = DirectClient::connect(&addr.to_string(), ChannelConfig::default(), client_cfg())
        .await
        .expect("connect");

    let result: Result<String, RpcError> = client
        .invoke("echo", &"hi".to_string(), Some(Duration::from_millis(100)))
        .await;
    assert!(matches!(result, Err(RpcError::Timeout(_))));
    assert_eq!(client.pending_count(), 0);
}
