//! The VICI packet envelope: a type byte, a name for named packet types, and
//! the message body.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{Error, ErrorCode, Result},
    PacketType,
};

/// Largest framed segment the protocol permits, on either side of the
/// connection.
pub(crate) const MAX_SEGMENT_LEN: usize = 512 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Packet {
    pub ptype: PacketType,
    pub name: Option<String>,
    pub body: Bytes,
}

impl Packet {
    pub fn new(ptype: PacketType, name: Option<String>, body: Bytes) -> Self {
        Self { ptype, name, body }
    }

    /// Formats the packet for transmission. Named packet types require a
    /// non-empty name of at most 255 bytes; the name is encoded like a
    /// message key.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(2 + self.name.as_ref().map_or(0, String::len) + self.body.len());
        buf.put_u8(self.ptype as u8);

        if self.ptype.is_named() {
            let name = self.name.as_deref().unwrap_or_default();
            if name.is_empty() {
                return Err(Error::new(ErrorCode::EmptyKey));
            }
            if name.len() > usize::from(u8::MAX) {
                return Err(Error::new(ErrorCode::KeyTooLong(name.len())));
            }

            buf.put_u8(name.len() as u8);
            buf.put_slice(name.as_bytes());
        }

        buf.put_slice(&self.body);

        if buf.len() > u32::MAX as usize {
            return Err(Error::new(ErrorCode::PacketTooLong(buf.len())));
        }

        Ok(buf.freeze())
    }

    /// Parses a framed segment into its envelope. The body is kept as raw
    /// bytes; decoding it into a message is up to the caller.
    pub fn parse(mut frame: Bytes) -> Result<Self> {
        if frame.is_empty() {
            return Err(Error::data(ErrorCode::EofWhileParsingElementType, None, Some(0)));
        }

        let t = frame.get_u8();
        let ptype = PacketType::try_from(t).map_err(|_| Error::data(ErrorCode::InvalidPacketType(t), Some(t), Some(0)))?;

        let mut name = None;
        if ptype.is_named() {
            if frame.is_empty() {
                return Err(Error::data(ErrorCode::EofWhileParsingKey, None, Some(1)));
            }

            let len = usize::from(frame.get_u8());
            if len == 0 {
                return Err(Error::data(ErrorCode::EmptyKey, None, Some(1)));
            }
            if frame.len() < len {
                return Err(Error::data(ErrorCode::EofWhileParsingKey, None, Some(2)));
            }

            let raw = frame.split_to(len);
            let parsed = std::str::from_utf8(&raw)
                .map_err(|e| Error::data(ErrorCode::InvalidUnicodeCodePoint, raw.get(e.valid_up_to()).copied(), Some(2)))?;
            name = Some(parsed.to_string());
        }

        Ok(Self {
            ptype,
            name,
            body: frame,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{to_vec, Message};

    #[test]
    fn encode_named_request() {
        let mut msg = Message::new();
        msg.set("child", "test-CHILD_SA").unwrap();
        msg.set("ike", "test-IKE_SA").unwrap();

        let body = Bytes::from(to_vec(&msg).unwrap());
        let pkt = Packet::new(PacketType::CmdRequest, Some("install".to_string()), body);

        #[rustfmt::skip]
        assert_eq!(
            pkt.encode().unwrap().as_ref(),
            &[
                // CmdRequest named "install"
                0, 7, b'i', b'n', b's', b't', b'a', b'l', b'l',
                // child = test-CHILD_SA
                3, 5, b'c', b'h', b'i', b'l', b'd',
                0, 13, b't', b'e', b's', b't', b'-', b'C', b'H', b'I', b'L', b'D', b'_', b'S', b'A',
                // ike = test-IKE_SA
                3, 3, b'i', b'k', b'e',
                0, 11, b't', b'e', b's', b't', b'-', b'I', b'K', b'E', b'_', b'S', b'A',
            ][..],
        );
    }

    #[test]
    fn parse_unnamed_response() {
        #[rustfmt::skip]
        let frame: &[u8] = &[
            // CmdResponse
            1,
            // success = no
            3, 7, b's', b'u', b'c', b'c', b'e', b's', b's', 0, 2, b'n', b'o',
            // errmsg = failed to install CHILD_SA
            3, 6, b'e', b'r', b'r', b'm', b's', b'g',
            0, 26, b'f', b'a', b'i', b'l', b'e', b'd', b' ', b't', b'o', b' ', b'i', b'n', b's', b't', b'a', b'l', b'l',
            b' ', b'C', b'H', b'I', b'L', b'D', b'_', b'S', b'A',
        ];

        let pkt = Packet::parse(Bytes::copy_from_slice(frame)).unwrap();
        assert_eq!(pkt.ptype, PacketType::CmdResponse);
        assert_eq!(pkt.name, None);

        let msg: Message = crate::from_slice(&pkt.body).unwrap();
        assert_eq!(msg.get("success").and_then(|v| v.as_str()), Some("no"));

        let err = msg.check().unwrap_err();
        assert_eq!(err.to_string(), "command failed: failed to install CHILD_SA");
    }

    #[test]
    fn parse_named_event() {
        #[rustfmt::skip]
        let frame: &[u8] = &[
            // Event named "ike-updown"
            7, 10, b'i', b'k', b'e', b'-', b'u', b'p', b'd', b'o', b'w', b'n',
            // up = yes
            3, 2, b'u', b'p', 0, 3, b'y', b'e', b's',
        ];

        let pkt = Packet::parse(Bytes::copy_from_slice(frame)).unwrap();
        assert_eq!(pkt.ptype, PacketType::Event);
        assert_eq!(pkt.name.as_deref(), Some("ike-updown"));
    }

    #[test]
    fn parse_invalid_packet_type() {
        let err = Packet::parse(Bytes::from_static(&[9])).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn parse_truncated_name() {
        let err = Packet::parse(Bytes::from_static(&[0, 7, b'i', b'n'])).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn parse_empty_name() {
        let err = Packet::parse(Bytes::from_static(&[0, 0])).unwrap_err();
        assert!(err.is_data());
    }

    #[test]
    fn encode_requires_name() {
        let pkt = Packet::new(PacketType::EventRegister, None, Bytes::new());
        assert!(pkt.encode().unwrap_err().is_data());

        let pkt = Packet::new(PacketType::EventRegister, Some("e".repeat(256)), Bytes::new());
        assert!(pkt.encode().unwrap_err().is_size());
    }
}
