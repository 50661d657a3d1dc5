// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::all)]

mod integration_tests {
    pub mod common;

    pub mod broadcast_partial_failure;
    pub mod channel_heartbeat;
    pub mod cluster_failover;
    pub mod direct_client_timeout;
    pub mod packet_roundtrip;
}
