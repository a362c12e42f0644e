//! Frame-level codec for the ZFM-20's 0xEF01 wire protocol.
//!
//! Pure functions only; serial I/O and timing live in
//! [`driver`](crate::driver) and [`receiver`](crate::receiver).

use arrayvec::ArrayVec;
use byteorder::{BigEndian, ByteOrder};

/// First two bytes of every frame.
pub const START_CODE: u16 = 0xEF01;

/// Broadcast module address. The driver always addresses the module
/// this way; per-device addressing is not supported.
pub const ADDRESS: u32 = 0xFFFF_FFFF;

/// Fixed frame prefix: start code, address, package id, length field.
pub const HEADER_LEN: usize = 9;

const CHECKSUM_LEN: usize = 2;

/// Shortest legal frame: header plus checksum around an empty payload.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

/// Largest frame this driver will build or assemble.
pub const MAX_FRAME_LEN: usize = 128;

/// Largest payload that fits in [`MAX_FRAME_LEN`].
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - MIN_FRAME_LEN;

/// Fixed-capacity byte buffer holding one frame.
pub type FrameBuf = ArrayVec<[u8; MAX_FRAME_LEN]>;

/// The package id byte at offset 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageId {
    /// Host-to-module command request.
    Command,
    /// Module-to-host acknowledgement.
    Ack,
    /// Any other id on the wire, e.g. the data-stream packets this
    /// driver does not use.
    Other(u8),
}

impl PackageId {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x01 => PackageId::Command,
            0x07 => PackageId::Ack,
            other => PackageId::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            PackageId::Command => 0x01,
            PackageId::Ack => 0x07,
            PackageId::Other(byte) => byte,
        }
    }
}

/// A validated frame: package id plus payload, framing stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub package_id: PackageId,
    pub payload: FrameBuf,
}

/// Ways a byte run can fail frame validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The first two bytes are not [`START_CODE`].
    BadStartCode,
    /// Shorter than [`MIN_FRAME_LEN`], or a declared length too small
    /// to hold its own checksum.
    Truncated,
    /// Larger than [`MAX_FRAME_LEN`] allows.
    Oversize,
    /// The checksum trailer does not match the frame contents.
    ChecksumMismatch { computed: u16, received: u16 },
}

/// Low 16 bits of the byte sum. On the wire this covers the package
/// id, the length field and the payload; neither the start code nor
/// the address is included.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)))
}

/// Builds a complete wire frame around `payload`.
///
/// Frame layout:
///
/// ```text
/// headr  | 0xEF 0x01 [2]
/// addr   | 0xFF 0xFF 0xFF 0xFF [4]
/// ident  | package id [1]
/// length | payload + 2 [2]
/// data   | payload [n]
/// chksum | ident + length + data [2]
/// ```
pub fn encode(package_id: PackageId, payload: &[u8]) -> Result<FrameBuf, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::Oversize);
    }
    let mut header = [0u8; HEADER_LEN];
    BigEndian::write_u16(&mut header[0..2], START_CODE);
    BigEndian::write_u32(&mut header[2..6], ADDRESS);
    header[6] = package_id.to_byte();
    BigEndian::write_u16(&mut header[7..9], (payload.len() + CHECKSUM_LEN) as u16);

    let mut buf = FrameBuf::new();
    buf.try_extend_from_slice(&header)
        .map_err(|_| FrameError::Oversize)?;
    buf.try_extend_from_slice(payload)
        .map_err(|_| FrameError::Oversize)?;
    let sum = checksum(&buf[6..]);
    let mut trailer = [0u8; CHECKSUM_LEN];
    BigEndian::write_u16(&mut trailer, sum);
    buf.try_extend_from_slice(&trailer)
        .map_err(|_| FrameError::Oversize)?;
    Ok(buf)
}

/// Validates exactly one frame's bytes and strips the framing.
///
/// Validation order: start code, then length, then checksum. The
/// checksum trailer is taken from the end of the run, so the length
/// field is not trusted for boundaries; it is covered by the checksum,
/// which catches corruption in it. The address bytes are not covered
/// by the checksum and the module does not echo anything meaningful in
/// them, so they are skipped.
pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::Truncated);
    }
    if BigEndian::read_u16(&bytes[0..2]) != START_CODE {
        return Err(FrameError::BadStartCode);
    }
    let trailer_at = bytes.len() - CHECKSUM_LEN;
    let computed = checksum(&bytes[6..trailer_at]);
    let received = BigEndian::read_u16(&bytes[trailer_at..]);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }
    let mut payload = ArrayVec::new();
    payload
        .try_extend_from_slice(&bytes[HEADER_LEN..trailer_at])
        .map_err(|_| FrameError::Oversize)?;
    Ok(Frame {
        package_id: PackageId::from_byte(bytes[6]),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_verify_password_request() {
        let frame = encode(PackageId::Command, &[0x13, 0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(
            &frame[..],
            &[
                0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x07, 0x13, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x1B,
            ]
        );
    }

    #[test]
    fn encodes_ok_acknowledgement() {
        let frame = encode(PackageId::Ack, &[0x00]).unwrap();
        assert_eq!(
            &frame[..],
            &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0A]
        );
    }

    #[test]
    fn round_trips_every_frame_shape() {
        let cases: &[(PackageId, &[u8])] = &[
            (PackageId::Command, &[0x01]),
            (PackageId::Command, &[0x13, 0x00, 0x00, 0x12, 0x34]),
            (PackageId::Command, &[0x04, 0x01, 0x00, 0x00, 0x00, 0x64]),
            (PackageId::Ack, &[0x00]),
            (PackageId::Ack, &[0x00, 0x00, 0x05, 0x00, 0x32]),
            (PackageId::Ack, &[]),
            (PackageId::Other(0x02), &[0xAA, 0xBB]),
        ];
        for (package_id, payload) in cases {
            let encoded = encode(*package_id, payload).unwrap();
            let frame = decode(&encoded).unwrap();
            assert_eq!(frame.package_id, *package_id);
            assert_eq!(&frame.payload[..], *payload);
        }
    }

    #[test]
    fn any_corrupt_bit_outside_the_address_fails_decode() {
        let clean = encode(PackageId::Ack, &[0x00, 0x00, 0x05, 0x00, 0x32]).unwrap();
        for bit in 0..clean.len() * 8 {
            let byte = bit / 8;
            if (2..6).contains(&byte) {
                // the address is not covered by the checksum
                continue;
            }
            let mut corrupt = clean.clone();
            corrupt[byte] ^= 1 << (bit % 8);
            match decode(&corrupt) {
                Err(FrameError::BadStartCode) => {
                    assert!(byte < 2, "bit {} misreported as a start code error", bit)
                }
                Err(FrameError::ChecksumMismatch { .. }) => {
                    assert!(byte >= 6, "bit {} misreported as a checksum error", bit)
                }
                other => panic!("corrupt bit {} decoded as {:?}", bit, other),
            }
        }
    }

    #[test]
    fn checksum_mismatch_reports_both_values() {
        let mut frame = encode(PackageId::Ack, &[0x00]).unwrap();
        let last = frame.len() - 1;
        frame[last] = 0xFF;
        assert_eq!(
            decode(&frame),
            Err(FrameError::ChecksumMismatch {
                computed: 0x000A,
                received: 0x00FF,
            })
        );
    }

    #[test]
    fn rejects_truncated_runs() {
        let frame = encode(PackageId::Ack, &[0x00]).unwrap();
        assert_eq!(decode(&frame[..MIN_FRAME_LEN - 1]), Err(FrameError::Truncated));
        assert_eq!(decode(&[]), Err(FrameError::Truncated));
    }

    #[test]
    fn bounds_the_payload_size() {
        let big = [0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(encode(PackageId::Command, &big), Err(FrameError::Oversize));
        assert!(encode(PackageId::Command, &big[..MAX_PAYLOAD_LEN]).is_ok());
    }

    #[test]
    fn checksum_keeps_the_low_sixteen_bits() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), 0x0006);
        assert_eq!(checksum(&[0xFF; 300]), (300 * 0xFF_u32 & 0xFFFF) as u16);
    }
}
