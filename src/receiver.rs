//! Incremental reply assembly with a receive deadline.

use byteorder::{BigEndian, ByteOrder};

use crate::frame::{self, Frame, FrameBuf, FrameError, HEADER_LEN, MAX_FRAME_LEN, MIN_FRAME_LEN};

/// Terminal failures of a receive attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveError {
    /// The assembled bytes failed frame validation.
    Frame(FrameError),
    /// The deadline passed before a complete frame arrived.
    Timeout,
}

impl From<FrameError> for ReceiveError {
    fn from(e: FrameError) -> Self {
        ReceiveError::Frame(e)
    }
}

/// Assembly phase: the fixed 9-byte header first, then a body whose
/// size the header's length field dictates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body { frame_len: usize },
}

/// Collects one reply frame from arbitrarily chunked serial data.
///
/// One assembler serves one command: the driver creates it when the
/// command is written and drops it on any terminal outcome (a frame,
/// a validation error, or a timeout). Bytes arriving after that are
/// the next command's problem.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: FrameBuf,
    phase: Phase,
    deadline: u32,
}

impl FrameAssembler {
    /// Starts assembly with a deadline of `now + timeout_ms`.
    pub fn new(now: u32, timeout_ms: u32) -> Self {
        FrameAssembler {
            buf: FrameBuf::new(),
            phase: Phase::Header,
            deadline: now.wrapping_add(timeout_ms),
        }
    }

    /// True from the deadline onwards. Wrap-safe for any `now` within
    /// half the counter range of the deadline.
    pub fn is_expired(&self, now: u32) -> bool {
        (now.wrapping_sub(self.deadline) as i32) >= 0
    }

    /// Appends a chunk (any size, empty included) and advances
    /// assembly.
    ///
    /// Returns the decoded frame once all required bytes are in,
    /// `WouldBlock` while bytes are outstanding and the deadline has
    /// not passed, and a terminal error otherwise. The outcome depends
    /// only on the byte sequence and the clock, never on how the
    /// sequence was chunked. A bad start code or an impossible length
    /// field fails as soon as the header is complete, without waiting
    /// for a body that may never come.
    pub fn feed(&mut self, chunk: &[u8], now: u32) -> nb::Result<Frame, ReceiveError> {
        for &byte in chunk {
            self.buf
                .try_push(byte)
                .map_err(|_| nb::Error::Other(ReceiveError::Frame(FrameError::Oversize)))?;
            if self.phase == Phase::Header && self.buf.len() == HEADER_LEN {
                match self.frame_len_from_header() {
                    Ok(frame_len) => self.phase = Phase::Body { frame_len },
                    Err(e) => return Err(nb::Error::Other(e.into())),
                }
            }
            if let Phase::Body { frame_len } = self.phase {
                if self.buf.len() == frame_len {
                    return frame::decode(&self.buf)
                        .map_err(|e| nb::Error::Other(ReceiveError::Frame(e)));
                }
            }
        }
        if self.is_expired(now) {
            Err(nb::Error::Other(ReceiveError::Timeout))
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn frame_len_from_header(&self) -> Result<usize, FrameError> {
        if BigEndian::read_u16(&self.buf[0..2]) != frame::START_CODE {
            return Err(FrameError::BadStartCode);
        }
        let tail = BigEndian::read_u16(&self.buf[7..9]) as usize;
        let frame_len = HEADER_LEN + tail;
        if frame_len < MIN_FRAME_LEN {
            return Err(FrameError::Truncated);
        }
        if frame_len > MAX_FRAME_LEN {
            return Err(FrameError::Oversize);
        }
        Ok(frame_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode, PackageId};

    const TIMEOUT: u32 = 1000;

    fn ok_ack() -> FrameBuf {
        encode(PackageId::Ack, &[0x00]).unwrap()
    }

    fn feed_in_chunks(bytes: &[u8], chunk_len: usize) -> nb::Result<Frame, ReceiveError> {
        let mut asm = FrameAssembler::new(0, TIMEOUT);
        let mut last = Err(nb::Error::WouldBlock);
        for chunk in bytes.chunks(chunk_len) {
            last = asm.feed(chunk, 1);
        }
        last
    }

    #[test]
    fn assembles_a_single_delivery() {
        let bytes = ok_ack();
        let frame = feed_in_chunks(&bytes, bytes.len()).unwrap();
        assert_eq!(frame.package_id, PackageId::Ack);
        assert_eq!(&frame.payload[..], &[0x00]);
    }

    #[test]
    fn chunking_does_not_change_the_outcome() {
        let bytes = encode(PackageId::Ack, &[0x00, 0x00, 0x05, 0x00, 0x32]).unwrap();
        let whole = feed_in_chunks(&bytes, bytes.len()).unwrap();
        // 3-byte chunks straddle the header/body boundary
        for &chunk_len in &[1usize, 3] {
            let frame = feed_in_chunks(&bytes, chunk_len).unwrap();
            assert_eq!(frame, whole);
        }
    }

    #[test]
    fn would_block_until_the_last_byte() {
        let bytes = ok_ack();
        let mut asm = FrameAssembler::new(0, TIMEOUT);
        for &byte in &bytes[..bytes.len() - 1] {
            assert!(matches!(asm.feed(&[byte], 1), Err(nb::Error::WouldBlock)));
        }
        assert!(asm.feed(&bytes[bytes.len() - 1..], 1).is_ok());
    }

    #[test]
    fn bad_start_code_fails_once_the_header_is_in() {
        let mut bytes = ok_ack();
        bytes[0] = 0xDE;
        let mut asm = FrameAssembler::new(0, TIMEOUT);
        assert!(matches!(
            asm.feed(&bytes[..HEADER_LEN], 1),
            Err(nb::Error::Other(ReceiveError::Frame(FrameError::BadStartCode)))
        ));
    }

    #[test]
    fn corrupt_payload_fails_the_checksum() {
        let mut bytes = encode(PackageId::Ack, &[0x00, 0x00, 0x05, 0x00, 0x32]).unwrap();
        bytes[10] ^= 0x40;
        assert!(matches!(
            feed_in_chunks(&bytes, 1),
            Err(nb::Error::Other(ReceiveError::Frame(FrameError::ChecksumMismatch { .. })))
        ));
    }

    #[test]
    fn impossible_length_fields_fail_at_the_header() {
        let mut asm = FrameAssembler::new(0, TIMEOUT);
        let too_short = [0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x01];
        assert!(matches!(
            asm.feed(&too_short, 1),
            Err(nb::Error::Other(ReceiveError::Frame(FrameError::Truncated)))
        ));

        let mut asm = FrameAssembler::new(0, TIMEOUT);
        let too_long = [0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x7F, 0xFF];
        assert!(matches!(
            asm.feed(&too_long, 1),
            Err(nb::Error::Other(ReceiveError::Frame(FrameError::Oversize)))
        ));
    }

    #[test]
    fn times_out_exactly_at_the_deadline() {
        let bytes = ok_ack();
        let mut asm = FrameAssembler::new(0, TIMEOUT);
        assert!(matches!(asm.feed(&bytes[..3], 0), Err(nb::Error::WouldBlock)));
        assert!(matches!(asm.feed(&[], TIMEOUT - 1), Err(nb::Error::WouldBlock)));
        assert!(matches!(
            asm.feed(&[], TIMEOUT),
            Err(nb::Error::Other(ReceiveError::Timeout))
        ));
    }

    #[test]
    fn completion_just_before_the_deadline_succeeds() {
        let bytes = ok_ack();
        let mut asm = FrameAssembler::new(0, TIMEOUT);
        assert!(matches!(asm.feed(&bytes[..3], 0), Err(nb::Error::WouldBlock)));
        assert!(asm.feed(&bytes[3..], TIMEOUT - 1).is_ok());
    }

    #[test]
    fn times_out_with_nothing_received() {
        let mut asm = FrameAssembler::new(500, TIMEOUT);
        assert!(matches!(
            asm.feed(&[], 500 + TIMEOUT),
            Err(nb::Error::Other(ReceiveError::Timeout))
        ));
    }

    #[test]
    fn expiry_is_queryable_and_wrap_safe() {
        let asm = FrameAssembler::new(0, TIMEOUT);
        assert!(!asm.is_expired(TIMEOUT - 1));
        assert!(asm.is_expired(TIMEOUT));

        let asm = FrameAssembler::new(u32::MAX - 100, TIMEOUT);
        assert!(!asm.is_expired(u32::MAX));
        assert!(!asm.is_expired(TIMEOUT - 102));
        assert!(asm.is_expired(TIMEOUT - 101));
    }
}
