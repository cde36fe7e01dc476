//! The i3-ipc wire format: a 6-byte magic, then a little-endian
//! `(length, type)` header, then a `length`-byte payload. Grounded on
//! `original_source/sway/ipc-server.c`'s `ipc_magic` constant and framing,
//! reimplemented over `byteorder` the way an earlier, non-i3 JSON protocol
//! framed its own messages.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

pub const MAGIC: &[u8; 6] = b"i3-ipc";

/// Request type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    RunCommand,
    GetWorkspaces,
    Subscribe,
    GetOutputs,
    GetTree,
    GetMarks,
    GetBarConfig,
    GetVersion,
    GetBindingModes,
    GetConfig,
    SendTick,
    Sync,
    GetBindingState,
    GetInputs,
    GetSeats,
}

impl RequestType {
    pub fn code(self) -> u32 {
        match self {
            RequestType::RunCommand => 0,
            RequestType::GetWorkspaces => 1,
            RequestType::Subscribe => 2,
            RequestType::GetOutputs => 3,
            RequestType::GetTree => 4,
            RequestType::GetMarks => 5,
            RequestType::GetBarConfig => 6,
            RequestType::GetVersion => 7,
            RequestType::GetBindingModes => 8,
            RequestType::GetConfig => 9,
            RequestType::SendTick => 10,
            RequestType::Sync => 11,
            RequestType::GetBindingState => 12,
            RequestType::GetInputs => 13,
            RequestType::GetSeats => 14,
        }
    }

    pub fn from_code(code: u32) -> Option<RequestType> {
        Some(match code {
            0 => RequestType::RunCommand,
            1 => RequestType::GetWorkspaces,
            2 => RequestType::Subscribe,
            3 => RequestType::GetOutputs,
            4 => RequestType::GetTree,
            5 => RequestType::GetMarks,
            6 => RequestType::GetBarConfig,
            7 => RequestType::GetVersion,
            8 => RequestType::GetBindingModes,
            9 => RequestType::GetConfig,
            10 => RequestType::SendTick,
            11 => RequestType::Sync,
            12 => RequestType::GetBindingState,
            13 => RequestType::GetInputs,
            14 => RequestType::GetSeats,
            _ => return None,
        })
    }
}

/// Event type codes. On the wire these are OR'd with `EVENT_BIT` (bit 31
/// set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Workspace,
    Output,
    Mode,
    Window,
    BarConfigUpdate,
    Binding,
    Shutdown,
    Tick,
}

pub const EVENT_BIT: u32 = 0x8000_0000;

impl EventType {
    fn bit(self) -> u32 {
        match self {
            EventType::Workspace => 0,
            EventType::Output => 1,
            EventType::Mode => 2,
            EventType::Window => 3,
            EventType::BarConfigUpdate => 4,
            EventType::Binding => 5,
            EventType::Shutdown => 6,
            EventType::Tick => 7,
        }
    }

    pub fn code(self) -> u32 {
        EVENT_BIT | self.bit()
    }

    pub fn subscription_mask(self) -> u32 {
        1 << self.bit()
    }
}

pub struct FrameHeader {
    pub length: u32,
    pub type_code: u32,
}

/// Writes a complete frame: magic, header, payload.
pub fn write_frame<W: Write>(w: &mut W, type_code: u32, payload: &[u8]) -> io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_u32::<LittleEndian>(payload.len() as u32)?;
    w.write_u32::<LittleEndian>(type_code)?;
    w.write_all(payload)
}

/// Reads and validates a frame header (magic + length + type). Callers
/// then read exactly `length` more bytes for the payload.
pub fn read_header<R: Read>(r: &mut R) -> Result<FrameHeader> {
    let mut magic = [0u8; 6];
    r.read_exact(&mut magic)
        .map_err(|e| Error::IpcProtocol(format!("reading magic: {e}")))?;
    if &magic != MAGIC {
        return Err(Error::IpcProtocol(format!(
            "bad magic {magic:?}, expected {MAGIC:?}"
        )));
    }
    let length = r
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::IpcProtocol(format!("reading length: {e}")))?;
    let type_code = r
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::IpcProtocol(format!("reading type: {e}")))?;
    Ok(FrameHeader { length, type_code })
}

/// Attempts to parse one complete frame (header + payload) from the front
/// of `buf`, returning `(type_code, payload, consumed_bytes)`. Returns
/// `None` if `buf` doesn't yet hold a full frame; callers leave `buf`
/// untouched in that case and wait for more bytes to arrive.
pub fn try_parse_frame(buf: &[u8]) -> Result<Option<(u32, Vec<u8>, usize)>> {
    const HEADER_LEN: usize = 6 + 4 + 4;
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }
    let mut cursor = io::Cursor::new(buf);
    let header = read_header(&mut cursor)?;
    let length = header.length as usize;
    if buf.len() < HEADER_LEN + length {
        return Ok(None);
    }
    let payload = buf[HEADER_LEN..HEADER_LEN + length].to_vec();
    Ok(Some((header.type_code, payload, HEADER_LEN + length)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, RequestType::GetTree.code(), b"{}").unwrap();
        let (type_code, payload, consumed) = try_parse_frame(&buf).unwrap().unwrap();
        assert_eq!(type_code, RequestType::GetTree.code());
        assert_eq!(payload, b"{}");
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn partial_frame_returns_none() {
        let mut buf = Vec::new();
        write_frame(&mut buf, 0, b"hello world").unwrap();
        let partial = &buf[..buf.len() - 2];
        assert!(try_parse_frame(partial).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = b"XXXXXX".to_vec();
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        assert!(try_parse_frame(&buf).is_err());
    }

    #[test]
    fn event_codes_have_top_bit_set() {
        assert_eq!(EventType::Window.code() & EVENT_BIT, EVENT_BIT);
        assert_eq!(RequestType::GetTree.code() & EVENT_BIT, 0);
    }
}
