//! Wire format for the Minecraft Java Edition status ("server list ping") exchange.
//!
//! Every packet is `VarInt length | VarInt packet id | payload`. The client
//! sends a handshake asking for the status state followed by an empty status
//! request, and the server answers with one packet holding a JSON string.

use super::PingError;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Protocol version announced in the handshake. Servers answer status
/// requests regardless of the version a client claims.
pub const PROTOCOL_VERSION: i32 = 47;

/// Handshake `next state` value for a status query.
const NEXT_STATE_STATUS: i32 = 1;

const HANDSHAKE_ID: i32 = 0x00;
const STATUS_REQUEST_ID: i32 = 0x00;
pub const STATUS_RESPONSE_ID: i32 = 0x00;

/// Upper bound for an incoming packet. Status JSON with a favicon is a few
/// tens of KB; anything near this is not a Minecraft server.
pub const MAX_PACKET_LEN: usize = 2 * 1024 * 1024;

const MAX_VARINT_BYTES: usize = 5;

pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

/// Decode a VarInt from the front of `bytes`, returning it and the bytes used.
pub fn read_varint_slice(bytes: &[u8]) -> Result<(i32, usize), PingError> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(MAX_VARINT_BYTES).enumerate() {
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value as i32, i + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_BYTES {
        Err(PingError::Protocol("VarInt is too long".to_string()))
    } else {
        Err(PingError::Protocol("truncated VarInt".to_string()))
    }
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, PingError> {
    let mut value: u32 = 0;
    for i in 0..MAX_VARINT_BYTES {
        let byte = reader.read_u8().await?;
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(PingError::Protocol("VarInt is too long".to_string()))
}

pub fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Decode a length-prefixed UTF-8 string from the front of `bytes`.
pub fn read_string(bytes: &[u8]) -> Result<String, PingError> {
    let (len, used) = read_varint_slice(bytes)?;
    let len = usize::try_from(len)
        .map_err(|_| PingError::Protocol(format!("negative string length {}", len)))?;
    let body = bytes
        .get(used..used + len)
        .ok_or_else(|| PingError::Protocol("string runs past end of packet".to_string()))?;
    String::from_utf8(body.to_vec())
        .map_err(|_| PingError::Protocol("string is not valid UTF-8".to_string()))
}

/// Wrap `payload` into a length-prefixed packet with the given id.
pub fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + MAX_VARINT_BYTES);
    write_varint(&mut body, packet_id);
    body.extend_from_slice(payload);

    let mut packet = Vec::with_capacity(body.len() + MAX_VARINT_BYTES);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(&body);
    packet
}

pub fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(host.len() + 8);
    write_varint(&mut payload, PROTOCOL_VERSION);
    write_string(&mut payload, host);
    payload.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut payload, NEXT_STATE_STATUS);
    frame(HANDSHAKE_ID, &payload)
}

pub fn status_request_packet() -> Vec<u8> {
    frame(STATUS_REQUEST_ID, &[])
}

/// Read one packet, returning its id and the remaining payload.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(i32, Vec<u8>), PingError> {
    let len = read_varint(reader).await?;
    let len = usize::try_from(len)
        .ok()
        .filter(|len| (1..=MAX_PACKET_LEN).contains(len))
        .ok_or_else(|| PingError::Protocol(format!("bad packet length {}", len)))?;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    let (packet_id, used) = read_varint_slice(&body)?;
    body.drain(..used);
    Ok((packet_id, body))
}
