// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The channel's write worker: batches queued packets against a byte
//! budget, flushes whenever the queue drains, and emits a HEARTBEAT when
//! the queue sits idle past `heartbeat_period`.

use std::{sync::Arc, time::Duration};

use tokio::{
    io::AsyncWriteExt,
    net::tcp::OwnedWriteHalf,
    sync::mpsc::{self, error::TryRecvError},
};
use tracing::{debug, warn};

use crate::packet::{HEADER_LEN, Packet};

use super::Channel;

async fn recv_first(rx: &mut mpsc::UnboundedReceiver<Packet>, heartbeat_period: i64) -> Option<Packet> {
    if heartbeat_period > 0 {
        match tokio::time::timeout(Duration::from_secs(heartbeat_period as u64), rx.recv()).await {
            Ok(v) => v,
            Err(_) => Some(Packet::heartbeat_request()),
        }
    } else {
        rx.recv().await
    }
}

async fn flush(writer: &mut OwnedWriteHalf, batch: &[Packet]) -> std::io::Result<()> {
    let mut buf = Vec::new();
    for p in batch {
        buf.extend_from_slice(&p.to_bytes());
    }
    writer.write_all(&buf).await?;
    writer.flush().await
}

pub(super) async fn run(
    channel: Arc<Channel>,
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Packet>,
) {
    let host = channel.host().to_string();
    let heartbeat_period = channel.config().heartbeat_period;
    let send_buffer_size = channel.config().send_buffer_size_bytes;
    let cancel = channel.cancellation().clone();

    loop {
        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            first = recv_first(&mut rx, heartbeat_period) => first,
        };

        let Some(first) = first else {
            debug!(%host, "write worker stopping: outbound queue dropped");
            return;
        };

        let mut batch = vec![first];
        let mut batched_bytes = HEADER_LEN + batch[0].body.len();

        loop {
            match rx.try_recv() {
                Ok(packet) => {
                    let plen = HEADER_LEN + packet.body.len();
                    if batched_bytes + plen < send_buffer_size {
                        batched_bytes += plen;
                        batch.push(packet);
                    } else {
                        if let Err(e) = flush(&mut writer, &batch).await {
                            warn!(%host, error = %e, "write error, closing channel");
                            channel.close(false);
                            return;
                        }
                        batch.clear();
                        batch.push(packet);
                        batched_bytes = plen;
                    }
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = flush(&mut writer, &batch).await;
                    return;
                },
            }
        }

        if let Err(e) = flush(&mut writer, &batch).await {
            warn!(%host, error = %e, "write error, closing channel");
            channel.close(false);
            return;
        }
    }
}
