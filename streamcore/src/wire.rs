//! Wire format for the negotiation record. Integers are explicitly
//! little-endian rather than host byte order, since the deployment
//! shouldn't be assumed homogeneous.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use common::ErrorKind;
use std::io::{self, Read, Write};

const TEXT_FIELD_SIZE: usize = 10;

/// Total on-wire size of a negotiation record.
pub const RECORD_SIZE: usize = 4 + TEXT_FIELD_SIZE + 4 + TEXT_FIELD_SIZE + 4 + 4;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Kind {
    Request,
    Response,
}

impl Kind {
    fn to_u32(self) -> u32 {
        match self {
            Kind::Request => 1,
            Kind::Response => 2,
        }
    }

    fn from_u32(value: u32) -> Option<Kind> {
        match value {
            1 => Some(Kind::Request),
            2 => Some(Kind::Response),
            _ => None,
        }
    }
}

/// A single fixed-layout negotiation message, sent once in each direction.
#[derive(Debug, Clone)]
pub struct NegotiationRecord {
    pub kind: Kind,
    pub resolution: String,
    pub bandwidth: u32,
    pub transport: String,
    pub streaming_port: u32,
    pub client_id: u32,
}

impl NegotiationRecord {
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), ErrorKind> {
        out.write_u32::<LittleEndian>(self.kind.to_u32())?;
        out.write_all(&pad_text(&self.resolution))?;
        out.write_u32::<LittleEndian>(self.bandwidth)?;
        out.write_all(&pad_text(&self.transport))?;
        out.write_u32::<LittleEndian>(self.streaming_port)?;
        out.write_u32::<LittleEndian>(self.client_id)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut input: R) -> Result<NegotiationRecord, ErrorKind> {
        let kind_raw = input.read_u32::<LittleEndian>()?;
        let kind = Kind::from_u32(kind_raw)
            .ok_or_else(|| ErrorKind::Input(format!("unknown negotiation kind {}", kind_raw)))?;

        let mut resolution_buf = [0u8; TEXT_FIELD_SIZE];
        input.read_exact(&mut resolution_buf)?;
        let resolution = unpad_text(&resolution_buf)
            .map_err(|e| ErrorKind::Input(format!("bad resolution field: {}", e)))?;

        let bandwidth = input.read_u32::<LittleEndian>()?;

        let mut transport_buf = [0u8; TEXT_FIELD_SIZE];
        input.read_exact(&mut transport_buf)?;
        let transport = unpad_text(&transport_buf)
            .map_err(|e| ErrorKind::Input(format!("bad transport field: {}", e)))?;

        let streaming_port = input.read_u32::<LittleEndian>()?;
        let client_id = input.read_u32::<LittleEndian>()?;

        Ok(NegotiationRecord {
            kind,
            resolution,
            bandwidth,
            transport,
            streaming_port,
            client_id,
        })
    }
}

fn pad_text(text: &str) -> [u8; TEXT_FIELD_SIZE] {
    let mut buf = [0u8; TEXT_FIELD_SIZE];
    let bytes = text.as_bytes();
    let len = bytes.len().min(TEXT_FIELD_SIZE);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

fn unpad_text(buf: &[u8; TEXT_FIELD_SIZE]) -> Result<String, io::Error> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(TEXT_FIELD_SIZE);
    String::from_utf8(buf[..end].to_vec())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn request_round_trips() {
        let record = NegotiationRecord {
            kind: Kind::Request,
            resolution: "720p".to_string(),
            bandwidth: 0,
            transport: "TCP".to_string(),
            streaming_port: 0,
            client_id: 0,
        };

        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), RECORD_SIZE);

        let parsed = NegotiationRecord::read_from(Cursor::new(buf)).unwrap();
        assert_eq!(parsed.kind, Kind::Request);
        assert_eq!(parsed.resolution, "720p");
        assert_eq!(parsed.transport, "TCP");
    }

    #[test]
    fn response_round_trips_with_assigned_fields() {
        let record = NegotiationRecord {
            kind: Kind::Response,
            resolution: "1080p".to_string(),
            bandwidth: 6000,
            transport: "UDP".to_string(),
            streaming_port: 8080,
            client_id: 3,
        };

        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();

        let parsed = NegotiationRecord::read_from(Cursor::new(buf)).unwrap();
        assert_eq!(parsed.kind, Kind::Response);
        assert_eq!(parsed.bandwidth, 6000);
        assert_eq!(parsed.streaming_port, 8080);
        assert_eq!(parsed.client_id, 3);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut buf = vec![0u8; RECORD_SIZE];
        buf[0] = 99;
        let result = NegotiationRecord::read_from(Cursor::new(buf));
        assert!(matches!(result, Err(ErrorKind::Input(_))));
    }

    #[test]
    fn short_buffer_yields_fatal_io_error() {
        let buf = vec![0u8; RECORD_SIZE - 1];
        let result = NegotiationRecord::read_from(Cursor::new(buf));
        assert!(result.is_err());
    }
}
