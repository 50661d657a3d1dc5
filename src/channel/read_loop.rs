// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The channel's read worker: classifies HEARTBEAT/OFFLINE traffic locally
//! and hands everything else to the external [`crate::listener::ChannelListener`].

use std::{panic::AssertUnwindSafe, sync::Arc};

use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, warn};

use crate::{
    packet::Packet,
    reader::{NoopReadObserver, read_packet},
};

use super::Channel;

pub(super) async fn run(channel: Arc<Channel>, mut reader: OwnedReadHalf) {
    let host = channel.host().to_string();

    loop {
        let outcome = tokio::select! {
            biased;
            _ = channel.cancellation().cancelled() => return,
            outcome = read_packet(&mut reader, &host, &NoopReadObserver) => outcome,
        };

        let packet = match outcome {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                debug!(%host, "peer closed the connection");
                channel.close(false);
                return;
            },
            Err(e) => {
                warn!(%host, error = %e, "read error, closing channel");
                channel.close(false);
                return;
            },
        };

        classify(&channel, &host, packet);
    }
}

fn classify(channel: &Arc<Channel>, host: &str, packet: Packet) {
    if packet.is_heartbeat() {
        if packet.is_request() {
            let _ = channel.send_internal(Packet::heartbeat_response());
        }
        return;
    }

    if packet.is_offline() {
        if packet.is_request() {
            channel.mark_offline_received();
            let _ = channel.send_internal(Packet::offline_response());
            channel.schedule_offline_close();
        }
        return;
    }

    let listener = channel.listener().clone();
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_receive(host, packet)));
    if result.is_err() {
        warn!(%host, "channel listener panicked handling a received packet");
    }
}
