//! The transport session: owns the serial link and runs one command
//! at a time against the module.

use embedded_hal::serial::{Read, Write};
use log::{debug, warn};
use nb::block;

use crate::commands::Command;
use crate::frame::{self, Frame, PackageId};
use crate::receiver::FrameAssembler;
use crate::responses::{self, SearchMatch};
use crate::utils::{Error, Timer};

/// Line speed the module ships with. The UART handed to the session
/// must already be configured for it.
pub const BAUD_RATE: u32 = 57_600;

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for a complete reply, per command.
    pub timeout_ms: u32,
    /// Password for the [`VerifyPassword`](Command::VerifyPassword)
    /// handshake.
    pub password: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout_ms: 1000,
            password: 0,
        }
    }
}

/// Represents a ZFM-20 connected to a U(S)ART.
///
/// The link is half duplex and the module answers exactly one command
/// at a time, so the session runs one command at a time too. Callers
/// on an event loop use [`start`](Zfm20::start) and
/// [`poll_reply`](Zfm20::poll_reply) directly; the typed methods block
/// on top of them.
#[derive(Debug)]
pub struct Zfm20<TX, RX, T> {
    tx: TX,
    rx: RX,
    timer: T,
    config: SessionConfig,
    pending: Option<FrameAssembler>,
}

impl<TX, RX, T> Zfm20<TX, RX, T>
where
    TX: Write<u8>,
    RX: Read<u8>,
    T: Timer,
{
    /// Creates a session with the default configuration: 1 second
    /// reply timeout, password 0.
    pub fn new(tx: TX, rx: RX, timer: T) -> Self {
        Self {
            tx,
            rx,
            timer,
            config: SessionConfig::default(),
            pending: None,
        }
    }

    /// Creates a session with an explicit configuration.
    ///
    /// A zero timeout would expire every read before its first byte
    /// and is rejected.
    pub fn with_config(
        tx: TX,
        rx: RX,
        timer: T,
        config: SessionConfig,
    ) -> Result<Self, Error<TX::Error, RX::Error>> {
        if config.timeout_ms == 0 {
            return Err(Error::InvalidConfiguration);
        }
        let mut session = Self::new(tx, rx, timer);
        session.config = config;
        Ok(session)
    }

    /// The active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// True while a command is in flight and its reply outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Writes a command to the module and arms the reply deadline.
    ///
    /// Fails with [`Error::OperationInProgress`] while an earlier
    /// command is still within its deadline. An earlier command that
    /// has already expired is abandoned instead: whatever is left of
    /// its reply is drained off the line so it cannot be taken for the
    /// new command's reply.
    pub fn start(&mut self, cmd: Command) -> Result<(), Error<TX::Error, RX::Error>> {
        let now = self.timer.timestamp_ms();
        match &self.pending {
            Some(pending) if !pending.is_expired(now) => {
                return Err(Error::OperationInProgress);
            }
            Some(_) => {
                self.pending = None;
                let drained = self.drain_stale_bytes();
                warn!("abandoned a timed-out command ({} stale bytes)", drained);
            }
            None => {}
        }

        let payload = cmd.payload();
        let bytes = frame::encode(PackageId::Command, payload.as_bytes())?;
        debug!("send {:02x?}", &bytes[..]);
        for byte in &bytes {
            block!(self.tx.write(*byte)).map_err(Error::Write)?;
        }
        block!(self.tx.flush()).map_err(Error::Write)?;

        let now = self.timer.timestamp_ms();
        self.pending = Some(FrameAssembler::new(now, self.config.timeout_ms));
        Ok(())
    }

    /// Makes progress on the in-flight command without blocking.
    ///
    /// Feeds whatever the UART has into the reply assembler. Returns
    /// `WouldBlock` while the reply is incomplete and the deadline has
    /// not passed; any other outcome resolves the command and leaves
    /// the session idle. A reply that is not an acknowledgement frame
    /// fails with [`Error::UnexpectedFrameType`]; frame validation
    /// failures and deadline expiry surface as their own kinds.
    pub fn poll_reply(&mut self) -> nb::Result<Frame, Error<TX::Error, RX::Error>> {
        let pending = match self.pending.as_mut() {
            Some(pending) => pending,
            None => return Err(nb::Error::Other(Error::NoCommandInFlight)),
        };

        let outcome = loop {
            match self.rx.read() {
                Ok(byte) => {
                    let now = self.timer.timestamp_ms();
                    match pending.feed(&[byte], now) {
                        Ok(reply) => break Ok(reply),
                        Err(nb::Error::WouldBlock) => continue,
                        Err(nb::Error::Other(e)) => break Err(Error::from(e)),
                    }
                }
                Err(nb::Error::WouldBlock) => {
                    let now = self.timer.timestamp_ms();
                    if pending.is_expired(now) {
                        break Err(Error::ReadTimeout);
                    }
                    return Err(nb::Error::WouldBlock);
                }
                Err(nb::Error::Other(e)) => break Err(Error::Read(e)),
            }
        };
        self.pending = None;

        match outcome {
            Ok(reply) => {
                debug!("recv {:02x?}", &reply.payload[..]);
                if reply.package_id != PackageId::Ack {
                    warn!("reply is not an ack: {:?}", reply.package_id);
                    return Err(nb::Error::Other(Error::UnexpectedFrameType(
                        reply.package_id,
                    )));
                }
                Ok(reply)
            }
            Err(e) => {
                warn!("command failed: {:?}", e);
                Err(nb::Error::Other(e))
            }
        }
    }

    /// Sends a command and blocks until its reply resolves.
    ///
    /// The returned frame is always an acknowledgement; its payload
    /// starts with the confirmation code.
    pub fn send_command(&mut self, cmd: Command) -> Result<Frame, Error<TX::Error, RX::Error>> {
        self.start(cmd)?;
        block!(self.poll_reply())
    }

    /// Checks the configured password against the module.
    pub fn verify_password(&mut self) -> Result<bool, Error<TX::Error, RX::Error>> {
        let password = self.config.password;
        self.ack_is_ok(Command::VerifyPassword { password })
    }

    /// Captures a finger image. `false` usually means no finger on
    /// the sensor.
    pub fn get_image(&mut self) -> Result<bool, Error<TX::Error, RX::Error>> {
        self.ack_is_ok(Command::GetImage)
    }

    /// Converts the captured image into character buffer `buffer`
    /// (1 or 2).
    pub fn img2tz(&mut self, buffer: u8) -> Result<bool, Error<TX::Error, RX::Error>> {
        self.ack_is_ok(Command::Img2Tz { buffer })
    }

    /// Combines the two character buffers into a template.
    pub fn create_model(&mut self) -> Result<bool, Error<TX::Error, RX::Error>> {
        self.ack_is_ok(Command::CreateModel)
    }

    /// Stores the freshly created template at flash slot `id`.
    pub fn store_model(&mut self, id: u16) -> Result<bool, Error<TX::Error, RX::Error>> {
        self.ack_is_ok(Command::StoreModel { id })
    }

    /// Deletes every stored template.
    pub fn empty_library(&mut self) -> Result<bool, Error<TX::Error, RX::Error>> {
        self.ack_is_ok(Command::EmptyLibrary)
    }

    /// Matches character buffer `buffer` against `count` templates
    /// starting at page `start`. `None` means nothing matched.
    pub fn search(
        &mut self,
        buffer: u8,
        start: u16,
        count: u16,
    ) -> Result<Option<SearchMatch>, Error<TX::Error, RX::Error>> {
        let reply = self.send_command(Command::Search {
            buffer,
            start,
            count,
        })?;
        Ok(responses::search_match(&reply.payload))
    }

    /// [`search`](Zfm20::search) with the module's fast matcher.
    pub fn high_speed_search(
        &mut self,
        buffer: u8,
        start: u16,
        count: u16,
    ) -> Result<Option<SearchMatch>, Error<TX::Error, RX::Error>> {
        let reply = self.send_command(Command::HighSpeedSearch {
            buffer,
            start,
            count,
        })?;
        Ok(responses::search_match(&reply.payload))
    }

    fn ack_is_ok(&mut self, cmd: Command) -> Result<bool, Error<TX::Error, RX::Error>> {
        let reply = self.send_command(cmd)?;
        Ok(responses::is_ok(&reply.payload))
    }

    fn drain_stale_bytes(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.read().is_ok() {
            drained += 1;
        }
        drained
    }
}
