// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The wire packet: a fixed 24-byte header (opcode, packet type, status,
//! body flags, body length, packet id) followed by a variable-length
//! body whose length is given by the header.

use bytes::Bytes;

use crate::{
    codec::{get_i32_be, get_i64_be, put_i32_be, put_i64_be},
    error::{Result, RpcError},
};

/// Size of the fixed packet header, in bytes.
pub const HEADER_LEN: usize = 24;

/// Operation code carried in header byte 0.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    RemoteInvocation = 1,
    Heartbeat = 2,
    Offline = 3,
}

impl Opcode {
    #[inline]
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Self::RemoteInvocation),
            2 => Ok(Self::Heartbeat),
            3 => Ok(Self::Offline),
            other => Err(RpcError::Protocol(format!("unknown opcode: {other}"))),
        }
    }
}

/// REQUEST/RESPONSE flag carried in header byte 1.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Request = 0,
    Response = 1,
}

impl PacketType {
    #[inline]
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Request),
            1 => Ok(Self::Response),
            other => Err(RpcError::Protocol(format!("unknown packet type: {other}"))),
        }
    }
}

/// Response status carried in header byte 2. Zero for requests.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success = 0,
    TooBusy = 40,
    InvocationError = 41,
    ClassNotFound = 44,
    MethodNotFound = 45,
}

impl Status {
    #[inline]
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Success),
            40 => Ok(Self::TooBusy),
            41 => Ok(Self::InvocationError),
            44 => Ok(Self::ClassNotFound),
            45 => Ok(Self::MethodNotFound),
            other => Err(RpcError::Protocol(format!("unknown status: {other}"))),
        }
    }
}

bitflags::bitflags! {
    /// Body serialization/compression flags (header byte 3).
    ///
    /// Bit 0 is the compressed flag; the serializer id lives in the high
    /// nibble and is accessed separately via [`BodyFlags::serializer_id`]
    /// since `bitflags` models single-purpose bits, not packed integers.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct BodyFlags: u8 {
        const COMPRESSED = 0b0000_0001;
    }
}

impl BodyFlags {
    #[inline]
    pub fn new(compressed: bool, serializer_id: u8) -> Self {
        let bits = (if compressed { Self::COMPRESSED.bits() } else { 0 }) | (serializer_id << 4);
        Self::from_bits_truncate(bits)
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.contains(Self::COMPRESSED)
    }

    #[inline]
    pub fn serializer_id(&self) -> u8 {
        self.bits() >> 4
    }
}

impl std::fmt::Debug for BodyFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BodyFlags(compressed={}, serializer={})",
            self.is_compressed(),
            self.serializer_id()
        )
    }
}

/// Fixed 24-byte packet header.
#[derive(Debug, Clone, Copy)]
pub struct PacketHeader {
    pub opcode: Opcode,
    pub packet_type: PacketType,
    pub status: Status,
    pub flags: BodyFlags,
    pub body_len: i32,
    pub packet_id: i64,
}

impl PacketHeader {
    pub fn to_bytes(&self, buf: &mut [u8; HEADER_LEN]) {
        buf[0] = self.opcode as u8;
        buf[1] = self.packet_type as u8;
        buf[2] = self.status as u8;
        buf[3] = self.flags.bits();
        put_i32_be(&mut buf[4..8], self.body_len);
        put_i64_be(&mut buf[8..16], self.packet_id);
        buf[16..24].fill(0);
    }

    pub fn from_bytes(buf: &[u8; HEADER_LEN]) -> Result<Self> {
        let body_len = get_i32_be(&buf[4..8]);
        if body_len < 0 {
            return Err(RpcError::Protocol(format!("negative body length: {body_len}")));
        }
        Ok(Self {
            opcode: Opcode::from_u8(buf[0])?,
            packet_type: PacketType::from_u8(buf[1])?,
            status: Status::from_u8(buf[2])?,
            flags: BodyFlags::from_bits_truncate(buf[3]),
            body_len,
            packet_id: get_i64_be(&buf[8..16]),
        })
    }
}

/// A full wire packet: header plus body bytes.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    pub body: Bytes,
}

impl Packet {
    pub fn request(packet_id: i64, opcode: Opcode, body: Bytes, compressed: bool) -> Self {
        Self {
            header: PacketHeader {
                opcode,
                packet_type: PacketType::Request,
                status: Status::Success,
                flags: BodyFlags::new(compressed, crate::serializer::NATIVE_SERIALIZER_ID),
                body_len: body.len() as i32,
                packet_id,
            },
            body,
        }
    }

    pub fn response(
        packet_id: i64,
        opcode: Opcode,
        status: Status,
        body: Bytes,
        compressed: bool,
    ) -> Self {
        Self {
            header: PacketHeader {
                opcode,
                packet_type: PacketType::Response,
                status,
                flags: BodyFlags::new(compressed, crate::serializer::NATIVE_SERIALIZER_ID),
                body_len: body.len() as i32,
                packet_id,
            },
            body,
        }
    }

    /// Zero-id, empty-body HEARTBEAT request.
    pub fn heartbeat_request() -> Self {
        Self::request(0, Opcode::Heartbeat, Bytes::new(), false)
    }

    /// Zero-id, empty-body SUCCESS HEARTBEAT response.
    pub fn heartbeat_response() -> Self {
        Self::response(0, Opcode::Heartbeat, Status::Success, Bytes::new(), false)
    }

    /// Zero-id, empty-body OFFLINE request.
    pub fn offline_request() -> Self {
        Self::request(0, Opcode::Offline, Bytes::new(), false)
    }

    /// Zero-id, empty-body SUCCESS OFFLINE response.
    pub fn offline_response() -> Self {
        Self::response(0, Opcode::Offline, Status::Success, Bytes::new(), false)
    }

    #[inline]
    pub fn is_heartbeat(&self) -> bool {
        self.header.opcode == Opcode::Heartbeat
    }

    #[inline]
    pub fn is_offline(&self) -> bool {
        self.header.opcode == Opcode::Offline
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.header.packet_type == PacketType::Request
    }

    /// Serializes this packet to a single contiguous buffer (header + body).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        let mut hdr_buf = [0u8; HEADER_LEN];
        self.header.to_bytes(&mut hdr_buf);
        out.extend_from_slice(&hdr_buf);
        out.extend_from_slice(&self.body);
        out
    }
}
