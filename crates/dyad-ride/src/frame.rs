use std::io::Read;

use crate::error::RideError;

const TAG: &[u8; 4] = b"RIDE";

/// Ceiling on the frame length word. Anything larger is treated as a
/// corrupt stream rather than an allocation request.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Encode one payload as a frame: length word, `RIDE` tag, payload bytes.
/// The length word counts itself, so for an n-byte payload it is `n + 8`.
pub fn encode(payload: &str) -> Vec<u8> {
    let len = (payload.len() + TAG.len() + 4) as u32;
    let mut out = Vec::with_capacity(len as usize);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(TAG);
    out.extend_from_slice(payload.as_bytes());
    out
}

/// Read exactly one frame and return its payload with the tag stripped.
///
/// A peer that closes the stream mid-frame yields `ShortRead`; a length
/// word below the header size or above [`MAX_FRAME_LEN`] is rejected
/// before any body allocation.
pub fn decode_one(reader: &mut impl Read) -> Result<String, RideError> {
    let mut word = [0u8; 4];
    read_full(reader, &mut word)?;
    let len = u32::from_be_bytes(word);
    if len < 8 {
        return Err(RideError::Undersize(len));
    }
    if len > MAX_FRAME_LEN {
        return Err(RideError::Oversize(len));
    }

    let mut body = vec![0u8; (len - 4) as usize];
    read_full(reader, &mut body)?;
    if body.starts_with(TAG) {
        body.drain(..TAG.len());
    }
    Ok(String::from_utf8(body)?)
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), RideError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            RideError::ShortRead
        } else {
            RideError::Io(err)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encode_lays_out_length_tag_payload() {
        let bytes = encode("abc");
        assert_eq!(bytes[..4], 11u32.to_be_bytes());
        assert_eq!(&bytes[4..8], b"RIDE");
        assert_eq!(&bytes[8..], b"abc");
    }

    #[test]
    fn roundtrip_preserves_payload() {
        for payload in ["", "UsingProtocol=2", "[\"Execute\",{\"text\":\"⍳5\\n\"}]"] {
            let mut cursor = Cursor::new(encode(payload));
            assert_eq!(decode_one(&mut cursor).unwrap(), payload);
        }
    }

    #[test]
    fn empty_payload_after_tag_decodes_to_empty_string() {
        let mut bytes = 8u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"RIDE");
        let mut cursor = Cursor::new(bytes);
        assert_eq!(decode_one(&mut cursor).unwrap(), "");
    }

    #[test]
    fn untagged_body_is_returned_whole() {
        let mut bytes = 9u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"hello");
        let mut cursor = Cursor::new(bytes);
        assert_eq!(decode_one(&mut cursor).unwrap(), "hello");
    }

    #[test]
    fn truncated_frame_is_a_short_read() {
        let mut bytes = encode("SupportedProtocols=2");
        bytes.truncate(bytes.len() - 5);
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            decode_one(&mut cursor),
            Err(RideError::ShortRead)
        ));
    }

    #[test]
    fn oversize_length_word_is_rejected() {
        let bytes = (MAX_FRAME_LEN + 1).to_be_bytes().to_vec();
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            decode_one(&mut cursor),
            Err(RideError::Oversize(_))
        ));
    }

    #[test]
    fn undersize_length_word_is_rejected() {
        let bytes = 5u32.to_be_bytes().to_vec();
        let mut cursor = Cursor::new(bytes);
        assert!(matches!(
            decode_one(&mut cursor),
            Err(RideError::Undersize(5))
        ));
    }
}
