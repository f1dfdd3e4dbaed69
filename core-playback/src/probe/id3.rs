//! ID3v2 tag detection.
//!
//! Only the 10-byte header is inspected; the tag body is skipped unread.

/// Bytes needed to recognise a tag.
pub const HEADER_LEN: usize = 10;

const FOOTER_FLAG: u8 = 0x10;

/// Total on-disk length of the ID3v2 tag starting at `header`, including
/// header and optional footer, or `None` when no valid tag is present.
pub fn tag_len(header: &[u8]) -> Option<u64> {
    let header: &[u8; HEADER_LEN] = header.get(..HEADER_LEN)?.try_into().ok()?;

    if &header[..3] != b"ID3" || header[3] == 0xFF || header[4] == 0xFF {
        return None;
    }

    let size_bytes = &header[6..10];
    if size_bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    let size = size_bytes
        .iter()
        .fold(0u64, |acc, &b| (acc << 7) | u64::from(b));

    let footer = if header[5] & FOOTER_FLAG != 0 {
        HEADER_LEN as u64
    } else {
        0
    };

    Some(HEADER_LEN as u64 + size + footer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(flags: u8, size: u32) -> [u8; HEADER_LEN] {
        [
            b'I',
            b'D',
            b'3',
            4,
            0,
            flags,
            ((size >> 21) & 0x7F) as u8,
            ((size >> 14) & 0x7F) as u8,
            ((size >> 7) & 0x7F) as u8,
            (size & 0x7F) as u8,
        ]
    }

    #[test]
    fn test_tag_len_includes_header() {
        assert_eq!(tag_len(&header(0, 118)), Some(128));
        assert_eq!(tag_len(&header(0, 0x0F_FFFF)), Some(0x0F_FFFF + 10));
    }

    #[test]
    fn test_footer_adds_ten_bytes() {
        assert_eq!(tag_len(&header(FOOTER_FLAG, 100)), Some(120));
    }

    #[test]
    fn test_rejects_non_syncsafe_size() {
        let mut h = header(0, 100);
        h[8] = 0x80;
        assert_eq!(tag_len(&h), None);
    }

    #[test]
    fn test_rejects_other_data() {
        assert_eq!(tag_len(&[0xFF, 0xFB, 0x90, 0x64, 0, 0, 0, 0, 0, 0]), None);
        assert_eq!(tag_len(b"ID3"), None);

        let mut h = header(0, 10);
        h[3] = 0xFF;
        assert_eq!(tag_len(&h), None);
    }
}
