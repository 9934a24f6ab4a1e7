//! UTF-8 <-> UTF-16 transcoding for the national character types
//! -------------------------------------------------------------
//! Bounded, table-driven converters. Both directions work on explicit
//! slices and never rely on a terminator: a multi-byte sequence that would
//! run past the source end is an error, and a full destination yields the
//! partial unit count with a truncation flag instead of writing further.
//! Stateless; safe to call from any thread.

use thiserror::Error;

const REPLACEMENT: u32 = 0xFFFD;
const MAX_CODE_POINT: u32 = 0x10_FFFF;
const SURROGATE_HIGH_START: u32 = 0xD800;
const SURROGATE_HIGH_END: u32 = 0xDBFF;
const SURROGATE_LOW_START: u32 = 0xDC00;
const SURROGATE_LOW_END: u32 = 0xDFFF;
const HALF_BASE: u32 = 0x1_0000;
const HALF_SHIFT: u32 = 10;
const HALF_MASK: u32 = 0x3FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoded {
    /// Units written to the destination: u16 units or bytes, per direction.
    pub written: usize,
    /// True when the destination filled up before the source was consumed.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    #[error("truncated multi-byte sequence at source offset {offset}")]
    TruncatedSource { offset: usize },
}

/// Continuation-byte count for a UTF-8 lead byte.
fn trailing_bytes(lead: u8) -> usize {
    match lead {
        0x00..=0xBF => 0,
        0xC0..=0xDF => 1,
        0xE0..=0xEF => 2,
        0xF0..=0xF7 => 3,
        0xF8..=0xFB => 4,
        _ => 5,
    }
}

/// Magic offsets subtracted after folding the raw sequence bytes, indexed by
/// trailing-byte count.
const UTF8_OFFSETS: [u32; 6] = [
    0x0000_0000,
    0x0000_3080,
    0x000E_2080,
    0x03C8_2080,
    0xFA08_2080,
    0x8208_2080,
];

/// Decode UTF-8 bytes into UTF-16 units.
///
/// Returns the number of u16 units produced. Lone surrogate values embedded
/// in the source pass through unchanged; code points beyond U+10FFFF become
/// U+FFFD.
pub fn utf8_to_utf16(src: &[u8], dst: &mut [u16]) -> Result<Transcoded, TranscodeError> {
    let mut i = 0usize;
    let mut written = 0usize;

    while i < src.len() {
        let extra = trailing_bytes(src[i]);
        if i + extra >= src.len() {
            return Err(TranscodeError::TruncatedSource { offset: i });
        }

        let mut ch: u32 = 0;
        for k in 0..=extra {
            ch = ch.wrapping_add(src[i + k] as u32);
            if k < extra {
                ch <<= 6;
            }
        }
        ch = ch.wrapping_sub(UTF8_OFFSETS[extra]);
        i += extra + 1;

        if ch <= 0xFFFF {
            if written >= dst.len() {
                return Ok(Transcoded { written, truncated: true });
            }
            dst[written] = ch as u16;
            written += 1;
        } else if ch <= MAX_CODE_POINT {
            if written + 2 > dst.len() {
                return Ok(Transcoded { written, truncated: true });
            }
            let ch = ch - HALF_BASE;
            dst[written] = ((ch >> HALF_SHIFT) + SURROGATE_HIGH_START) as u16;
            dst[written + 1] = ((ch & HALF_MASK) + SURROGATE_LOW_START) as u16;
            written += 2;
        } else {
            if written >= dst.len() {
                return Ok(Transcoded { written, truncated: true });
            }
            dst[written] = REPLACEMENT as u16;
            written += 1;
        }
    }

    Ok(Transcoded { written, truncated: false })
}

const UTF8_FIRST_BYTE_MARK: [u8; 5] = [0x00, 0x00, 0xC0, 0xE0, 0xF0];

/// Encode UTF-16 units into UTF-8 bytes.
///
/// A high/low surrogate pair is combined into one code point; an unpaired
/// surrogate is emitted as a raw three-byte sequence, matching the decode
/// direction's passthrough.
pub fn utf16_to_utf8(src: &[u16], dst: &mut [u8]) -> Transcoded {
    let byte_mask: u32 = 0xBF;
    let byte_mark: u32 = 0x80;
    let mut i = 0usize;
    let mut written = 0usize;

    while i < src.len() {
        let mut ch = src[i] as u32;
        i += 1;
        if (SURROGATE_HIGH_START..=SURROGATE_HIGH_END).contains(&ch) && i < src.len() {
            let ch2 = src[i] as u32;
            if (SURROGATE_LOW_START..=SURROGATE_LOW_END).contains(&ch2) {
                ch = ((ch - SURROGATE_HIGH_START) << HALF_SHIFT)
                    + (ch2 - SURROGATE_LOW_START)
                    + HALF_BASE;
                i += 1;
            }
        }

        let n = if ch < 0x80 {
            1
        } else if ch < 0x800 {
            2
        } else if ch < 0x1_0000 {
            3
        } else {
            4
        };

        if written + n > dst.len() {
            return Transcoded { written, truncated: true };
        }

        // Emit continuation bytes back to front, then the lead byte.
        for k in (1..n).rev() {
            dst[written + k] = ((ch | byte_mark) & byte_mask) as u8;
            ch >>= 6;
        }
        dst[written] = (ch as u8) | UTF8_FIRST_BYTE_MARK[n];
        written += n;
    }

    Transcoded { written, truncated: false }
}

/// Decode a whole UTF-8 buffer into a freshly sized UTF-16 vector.
pub fn utf8_to_utf16_vec(src: &[u8]) -> Result<Vec<u16>, TranscodeError> {
    // One u16 unit per source byte is the worst case.
    let mut out = vec![0u16; src.len()];
    let res = utf8_to_utf16(src, &mut out)?;
    out.truncate(res.written);
    Ok(out)
}

/// Encode a whole UTF-16 buffer into a freshly sized UTF-8 vector.
pub fn utf16_to_utf8_vec(src: &[u16]) -> Vec<u8> {
    let mut out = vec![0u8; src.len() * 4];
    let res = utf16_to_utf8(src, &mut out);
    out.truncate(res.written);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(s: &str) -> String {
        let units = utf8_to_utf16_vec(s.as_bytes()).expect("utf8 -> utf16");
        let bytes = utf16_to_utf8_vec(&units);
        String::from_utf8(bytes).expect("valid utf8 back")
    }

    #[test]
    fn ascii_roundtrip() {
        assert_eq!(roundtrip("hello, world"), "hello, world");
        assert_eq!(roundtrip(""), "");
    }

    #[test]
    fn bmp_roundtrip() {
        assert_eq!(roundtrip("caf\u{e9} \u{4e2d}\u{6587}"), "caf\u{e9} \u{4e2d}\u{6587}");
    }

    #[test]
    fn surrogate_pair_roundtrip() {
        let s = "mixed \u{1F600}\u{10348} text";
        let units = utf8_to_utf16_vec(s.as_bytes()).expect("utf8 -> utf16");
        // The two astral characters must occupy two units each.
        assert_eq!(units.len(), s.chars().count() + 2);
        assert_eq!(roundtrip(s), s);
    }

    #[test]
    fn surrogate_assembly_matches_standard() {
        // U+1F600 = D83D DE00
        let units = utf8_to_utf16_vec("\u{1F600}".as_bytes()).expect("transcode");
        assert_eq!(units, vec![0xD83D, 0xDE00]);
    }

    #[test]
    fn truncated_source_is_an_error_not_a_read() {
        // First two bytes of a four-byte sequence.
        let bad = &"\u{1F600}".as_bytes()[..2];
        let mut dst = [0u16; 8];
        match utf8_to_utf16(bad, &mut dst) {
            Err(TranscodeError::TruncatedSource { offset }) => assert_eq!(offset, 0),
            other => panic!("expected truncated-source error, got {:?}", other),
        }
    }

    #[test]
    fn full_destination_reports_truncation() {
        let mut dst = [0u16; 3];
        let res = utf8_to_utf16(b"abcdef", &mut dst).expect("no source error");
        assert!(res.truncated);
        assert_eq!(res.written, 3);
        assert_eq!(&dst, &[b'a' as u16, b'b' as u16, b'c' as u16]);

        // A surrogate pair must not be split across the boundary.
        let mut one = [0u16; 1];
        let res = utf8_to_utf16("\u{1F600}".as_bytes(), &mut one).expect("no source error");
        assert!(res.truncated);
        assert_eq!(res.written, 0);
    }

    #[test]
    fn utf16_destination_truncation() {
        let units: Vec<u16> = "abcdef".encode_utf16().collect();
        let mut dst = [0u8; 4];
        let res = utf16_to_utf8(&units, &mut dst);
        assert!(res.truncated);
        assert_eq!(res.written, 4);
    }

    #[test]
    fn lone_surrogate_passes_through() {
        let units = [0xD800u16];
        let bytes = utf16_to_utf8_vec(&units);
        assert_eq!(bytes.len(), 3);
        let mut back = [0u16; 2];
        let res = utf8_to_utf16(&bytes, &mut back).expect("decode");
        assert_eq!(res.written, 1);
        assert_eq!(back[0], 0xD800);
    }
}
