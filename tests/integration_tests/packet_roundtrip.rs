// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Integration: a packet written to one end of a real TCP socket comes back
//! out the framed reader on the other end byte-for-byte.

use bytes::Bytes;
use corerpc::{
    packet::{Opcode, Packet, Status},
    reader::{NoopReadObserver, read_packet},
};
use tokio::{io::AsyncWriteExt, net::TcpListener};

#[tokio::test]
async fn request_and_response_survive_a_real_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();

    let accept_task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        read_packet(&mut stream, "peer", &NoopReadObserver)
            .await
            .expect("read ok")
            .expect("not eof")
    });

    let mut client = tokio::net::TcpStream::connect(addr).await.expect("connect");
    let sent = Packet::request(42, Opcode::RemoteInvocation, Bytes::from_static(b"payload"), false);
    client.write_all(&sent.to_bytes()).await.expect("write");

    let received = accept_task.await.expect("join");
    assert_eq!(received.header.packet_id, 42);
    assert_eq!(received.header.opcode, Opcode::RemoteInvocation);
    assert_eq!(&received.body[..], b"payload");

    // A response frame, including a non-success status, survives the same
    // path.
    let status_packet = Packet::response(42, Opcode::RemoteInvocation, Status::MethodNotFound, Bytes::new(), false);
    let bytes = status_packet.to_bytes();
    let mut cursor = std::io::Cursor::new(bytes);
    let roundtripped = read_packet(&mut cursor, "peer", &NoopReadObserver)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(roundtripped.header.status, Status::MethodNotFound);
}
