use core::fmt;

use crate::frame::{FrameError, PackageId};
use crate::receiver::ReceiveError;

pub trait CommandWriter {
    fn write_cmd_bytes(&mut self, bytes: &[u8]);
}

pub trait ToPayload {
    fn to_payload(&self, writer: &mut dyn CommandWriter);
}

/// Monotonic millisecond clock used for read deadlines.
///
/// The counter may wrap; deadlines are compared with wrapping
/// arithmetic, so any free-running 32-bit millisecond source works.
pub trait Timer {
    fn timestamp_ms(&mut self) -> u32;
}

/// Errors reported by a [`Zfm20`](crate::Zfm20) session.
pub enum Error<TxE, RxE> {
    /// The reply failed frame validation (start code, length, checksum).
    Frame(FrameError),
    /// No complete reply arrived before the configured deadline.
    ReadTimeout,
    /// A well-formed frame arrived but it is not an acknowledgement.
    UnexpectedFrameType(PackageId),
    /// A command is already in flight and has not timed out yet.
    OperationInProgress,
    /// `poll_reply` was called with no command in flight.
    NoCommandInFlight,
    /// Rejected session configuration, e.g. a zero timeout.
    InvalidConfiguration,
    /// The serial transmit half reported an error.
    Write(TxE),
    /// The serial receive half reported an error.
    Read(RxE),
}

impl<TxE, RxE> From<FrameError> for Error<TxE, RxE> {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl<TxE, RxE> From<ReceiveError> for Error<TxE, RxE> {
    fn from(e: ReceiveError) -> Self {
        match e {
            ReceiveError::Frame(e) => Error::Frame(e),
            ReceiveError::Timeout => Error::ReadTimeout,
        }
    }
}

// Not derived: the serial HAL puts no bounds on its error types, so
// the wrapped errors print opaquely.
impl<TxE, RxE> fmt::Debug for Error<TxE, RxE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Frame(e) => f.debug_tuple("Frame").field(e).finish(),
            Error::ReadTimeout => f.write_str("ReadTimeout"),
            Error::UnexpectedFrameType(id) => {
                f.debug_tuple("UnexpectedFrameType").field(id).finish()
            }
            Error::OperationInProgress => f.write_str("OperationInProgress"),
            Error::NoCommandInFlight => f.write_str("NoCommandInFlight"),
            Error::InvalidConfiguration => f.write_str("InvalidConfiguration"),
            Error::Write(_) => f.write_str("Write(..)"),
            Error::Read(_) => f.write_str("Read(..)"),
        }
    }
}
