//! The subset of the ZFM-20 instruction set this driver speaks.
//! Names follow the datasheet where it has one.

use arrayvec::ArrayVec;

use crate::frame::MAX_FRAME_LEN;
use crate::utils::{CommandWriter, ToPayload};

const GET_IMAGE: u8 = 0x01;
const IMAGE_2_TZ: u8 = 0x02;
const SEARCH: u8 = 0x04;
const REG_MODEL: u8 = 0x05;
const STORE_MODEL: u8 = 0x06;
const EMPTY_LIBRARY: u8 = 0x0D;
const VERIFY_PASSWORD: u8 = 0x13;
const HIGH_SPEED_SEARCH: u8 = 0x1B;

/// Commands one can send to the module.
///
/// A command serializes to its instruction byte followed by its
/// arguments; [`frame::encode`](crate::frame::encode) wraps that in
/// the wire framing, so every instruction goes through the same send
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Handshake. The module answers OK only to its configured
    /// password; the factory default is 0x00000000.
    VerifyPassword {
        /// The device password.
        password: u32,
    },

    /// Captures a finger image into the module's image buffer.
    GetImage,

    /// Processes the captured image into a _character buffer_.
    Img2Tz {
        /// Which of the two character buffers (1 or 2) receives the
        /// processed data.
        buffer: u8,
    },

    /// Combines character buffers 1 and 2 into a template
    /// (RegModel in the datasheet).
    CreateModel,

    /// Writes the template held in character buffer 1 to flash
    /// slot `id`.
    StoreModel { id: u16 },

    /// Deletes every template stored in the module.
    EmptyLibrary,

    /// Matches a character buffer against `count` stored templates
    /// starting at page `start`.
    Search { buffer: u8, start: u16, count: u16 },

    /// [`Search`](Command::Search) using the module's fast matcher.
    HighSpeedSearch { buffer: u8, start: u16, count: u16 },
}

impl Command {
    /// Serializes this command into a fresh payload buffer.
    pub fn payload(&self) -> PayloadBuf {
        let mut buf = PayloadBuf::new();
        self.to_payload(&mut buf);
        buf
    }
}

impl ToPayload for Command {
    fn to_payload(&self, writer: &mut dyn CommandWriter) {
        match self {
            // instr  | 0x13 [1]
            // passwd | password [4]
            Self::VerifyPassword { password } => {
                writer.write_cmd_bytes(&[VERIFY_PASSWORD]);
                writer.write_cmd_bytes(&password.to_be_bytes()[..]);
            }

            // instr  | 0x01 [1]
            Self::GetImage => {
                writer.write_cmd_bytes(&[GET_IMAGE]);
            }

            // instr  | 0x02 [1]
            // bufid  | buffer [1]
            Self::Img2Tz { buffer } => {
                writer.write_cmd_bytes(&[IMAGE_2_TZ, *buffer]);
            }

            // instr  | 0x05 [1]
            Self::CreateModel => {
                writer.write_cmd_bytes(&[REG_MODEL]);
            }

            // instr  | 0x06 [1]
            // bufid  | 0x01 [1]
            // slotid | id [2]
            Self::StoreModel { id } => {
                writer.write_cmd_bytes(&[STORE_MODEL, 0x01]);
                writer.write_cmd_bytes(&id.to_be_bytes()[..]);
            }

            // instr  | 0x0D [1]
            Self::EmptyLibrary => {
                writer.write_cmd_bytes(&[EMPTY_LIBRARY]);
            }

            // instr  | 0x04 (or 0x1B) [1]
            // bufid  | buffer [1]
            // sstart | start [2]
            // scount | count [2]
            Self::Search {
                buffer,
                start,
                count,
            } => {
                write_search(writer, SEARCH, *buffer, *start, *count);
            }

            Self::HighSpeedSearch {
                buffer,
                start,
                count,
            } => {
                write_search(writer, HIGH_SPEED_SEARCH, *buffer, *start, *count);
            }
        }
    }
}

fn write_search(
    writer: &mut dyn CommandWriter,
    instruction: u8,
    buffer: u8,
    start: u16,
    count: u16,
) {
    writer.write_cmd_bytes(&[instruction, buffer]);
    writer.write_cmd_bytes(&start.to_be_bytes()[..]);
    writer.write_cmd_bytes(&count.to_be_bytes()[..]);
}

/// Accumulates a command payload before framing.
#[derive(Debug, Default)]
pub struct PayloadBuf(ArrayVec<[u8; MAX_FRAME_LEN]>);

impl PayloadBuf {
    pub fn new() -> Self {
        PayloadBuf(ArrayVec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl CommandWriter for PayloadBuf {
    fn write_cmd_bytes(&mut self, bytes: &[u8]) {
        // every payload in the command set is a handful of bytes;
        // overflowing this buffer is a bug in the instruction table
        let appended = self.0.try_extend_from_slice(bytes);
        debug_assert!(appended.is_ok(), "command payload overflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(cmd: Command) -> Vec<u8> {
        cmd.payload().as_bytes().to_vec()
    }

    #[test]
    fn serializes_the_instruction_table() {
        let table: &[(Command, &[u8])] = &[
            (
                Command::VerifyPassword {
                    password: 0xA1B2_C3D4,
                },
                &[0x13, 0xA1, 0xB2, 0xC3, 0xD4],
            ),
            (Command::GetImage, &[0x01]),
            (Command::Img2Tz { buffer: 2 }, &[0x02, 0x02]),
            (Command::CreateModel, &[0x05]),
            (
                Command::StoreModel { id: 0x0102 },
                &[0x06, 0x01, 0x01, 0x02],
            ),
            (Command::EmptyLibrary, &[0x0D]),
            (
                Command::Search {
                    buffer: 1,
                    start: 0,
                    count: 100,
                },
                &[0x04, 0x01, 0x00, 0x00, 0x00, 0x64],
            ),
            (
                Command::HighSpeedSearch {
                    buffer: 1,
                    start: 2,
                    count: 3,
                },
                &[0x1B, 0x01, 0x00, 0x02, 0x00, 0x03],
            ),
        ];
        for (cmd, expected) in table {
            assert_eq!(&payload_of(*cmd)[..], *expected, "payload of {:?}", cmd);
        }
    }

    #[test]
    fn store_model_always_uses_char_buffer_one() {
        for id in &[0u16, 1, 0xFFFF] {
            assert_eq!(payload_of(Command::StoreModel { id: *id })[1], 0x01);
        }
    }

    #[test]
    #[should_panic(expected = "command payload overflow")]
    fn oversized_writes_do_not_pass_silently() {
        let mut buf = PayloadBuf::new();
        buf.write_cmd_bytes(&[0u8; 200]);
    }
}
