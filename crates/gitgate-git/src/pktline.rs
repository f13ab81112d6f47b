//! Git pkt-line format implementation.
//!
//! Each line is prefixed with a 4-character lowercase hex length that counts
//! the prefix itself, or "0000" for flush. The gateway only frames its own
//! service advertisement prelude; everything else on the wire belongs to the
//! git transport subprocess.

use crate::{GitError, Result, TransportService};

/// Maximum total frame length expressible in a 4-hex-digit header.
const MAX_FRAME_LEN: usize = 0xffff;

/// A pkt-line frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
}

impl PktLine {
    /// Creates a data frame from a string slice.
    pub fn from_string(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }

    /// Creates a data frame from bytes.
    pub fn from_bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Data(b.into())
    }

    /// Encodes the frame to bytes.
    ///
    /// The encoding of a payload longer than `0xfffb` bytes cannot be
    /// represented in a 4-hex-digit header; such a payload is a caller error.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Data(data) => {
                let len = data.len() + 4;
                debug_assert!(len <= MAX_FRAME_LEN, "pkt-line payload too large");
                let mut result = format!("{:04x}", len).into_bytes();
                result.extend_from_slice(data);
                result
            }
            Self::Flush => b"0000".to_vec(),
        }
    }

    /// Decodes one frame from the start of `input`.
    ///
    /// Returns the total number of bytes consumed (header included) and the
    /// frame. Fails when the header is not 4 hex digits, declares a length
    /// below 4, or declares more bytes than `input` holds.
    pub fn decode(input: &[u8]) -> Result<(usize, PktLine)> {
        if input.len() < 4 {
            return Err(GitError::InvalidPktLine(
                "truncated length prefix".to_string(),
            ));
        }

        let len_str = std::str::from_utf8(&input[..4])
            .map_err(|_| GitError::InvalidPktLine("invalid length prefix".to_string()))?;

        if len_str == "0000" {
            return Ok((4, PktLine::Flush));
        }

        let len = usize::from_str_radix(len_str, 16)
            .map_err(|_| GitError::InvalidPktLine(format!("invalid length: {len_str:?}")))?;

        if len < 4 {
            return Err(GitError::InvalidPktLine(format!("length too small: {len}")));
        }
        if len > input.len() {
            return Err(GitError::InvalidPktLine(format!(
                "declared {len} bytes, only {} available",
                input.len()
            )));
        }

        Ok((len, PktLine::Data(input[4..len].to_vec())))
    }

    /// Returns true if this is a flush packet.
    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush)
    }

    /// Returns the data content, or None for the flush packet.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(data) => Some(data),
            Self::Flush => None,
        }
    }
}

/// Builds the service advertisement prelude required by the smart HTTP
/// protocol: `# service=<service>\n` framed as a pkt-line, then a flush.
///
/// The gateway writes these bytes before any output from the transport
/// subprocess.
pub fn service_prelude(service: TransportService) -> Vec<u8> {
    let mut out = PktLine::from_string(&format!("# service={}\n", service)).encode();
    out.extend_from_slice(&PktLine::Flush.encode());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode() {
        assert_eq!(PktLine::from_string("hello\n").encode(), b"000ahello\n");
        assert_eq!(PktLine::Flush.encode(), b"0000");
        assert_eq!(PktLine::from_bytes(Vec::new()).encode(), b"0004");
    }

    #[test]
    fn test_service_line_header() {
        // 27-byte payload -> 0x1f total.
        let encoded = PktLine::from_string("# service=git-upload-pack\n").encode();
        assert_eq!(&encoded[..4], b"001f");
        assert_eq!(&encoded[4..], b"# service=git-upload-pack\n");
    }

    #[test]
    fn test_flush_constant() {
        assert_eq!(PktLine::Flush.encode(), b"0000");
        let (consumed, pkt) = PktLine::decode(b"0000").unwrap();
        assert_eq!(consumed, 4);
        assert!(pkt.is_flush());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(PktLine::decode(b"00").is_err());
        assert!(PktLine::decode(b"zzzzabcd").is_err());
        assert!(PktLine::decode(b"0003").is_err());
        assert!(PktLine::decode(b"0001").is_err());
        // Declares 16 bytes, supplies 8.
        assert!(PktLine::decode(b"0010abcd").is_err());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let (consumed, pkt) = PktLine::decode(b"0009hellomore").unwrap();
        assert_eq!(consumed, 9);
        assert_eq!(pkt.data(), Some(b"hello".as_slice()));
    }

    #[test]
    fn test_service_prelude() {
        assert_eq!(
            service_prelude(TransportService::UploadPack),
            b"001f# service=git-upload-pack\n0000"
        );
        assert_eq!(
            service_prelude(TransportService::ReceivePack),
            b"0020# service=git-receive-pack\n0000"
        );
    }

    proptest! {
        #[test]
        fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..=9000)) {
            let encoded = PktLine::from_bytes(payload.clone()).encode();
            let (consumed, decoded) = PktLine::decode(&encoded).unwrap();
            prop_assert_eq!(consumed, payload.len() + 4);
            prop_assert_eq!(decoded.data().unwrap(), payload.as_slice());
        }

        #[test]
        fn prop_header_is_hex_of_total_len(payload in proptest::collection::vec(any::<u8>(), 0..=9000)) {
            let encoded = PktLine::from_bytes(payload.clone()).encode();
            let header = std::str::from_utf8(&encoded[..4]).unwrap();
            prop_assert_eq!(header, format!("{:04x}", payload.len() + 4));
        }
    }
}
