//! **zfm20** is an embedded-hal driver for the ZhianTec ZFM-20 optical
//! fingerprint module, as found in inexpensive door-lock and attendance
//! hardware. Other modules of the family speaking the same 0xEF01
//! framed protocol over a UART should work as well.
//!
//! The driver is `no_std`, talks through the embedded-hal serial
//! traits, and never blocks unless asked to: a command is
//! [started](Zfm20::start) and [polled](Zfm20::poll_reply), or run to
//! completion with the blocking typed methods. One command is in
//! flight at a time; replies are assembled incrementally with a
//! deadline, so a wedged module costs a timeout, not a hang.
//!
//! ## Example
//!
//! To authenticate with the module:
//! ```
//! # use embedded_hal::serial::{Read, Write};
//! use zfm20::{Timer, Zfm20};
//! # struct TestTx;
//! # struct TestRx(usize);
//! # struct TestTimer(u32);
//! #
//! # impl Write<u8> for TestTx {
//! #     type Error = ();
//! #     fn write(&mut self, _word: u8) -> nb::Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! #     fn flush(&mut self) -> nb::Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! #
//! # const RES_DATA: &[u8] = &[ 0xef, 0x01, 0xff, 0xff, 0xff, 0xff, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0a ];
//! #
//! # impl Read<u8> for TestRx {
//! #     type Error = ();
//! #     fn read(&mut self) -> nb::Result<u8, Self::Error> {
//! #         let word = RES_DATA[self.0];
//! #         self.0 += 1;
//! #         Ok(word)
//! #     }
//! # }
//! #
//! # impl Timer for TestTimer {
//! #     fn timestamp_ms(&mut self) -> u32 {
//! #         self.0 += 1;
//! #         self.0
//! #     }
//! # }
//! # let tx = TestTx;
//! # let rx = TestRx(0);
//! # let timer = TestTimer(0);
//!
//! // Obtain tx and rx from some serial port implementation, and a
//! // millisecond timer from wherever the platform keeps its clock
//! let mut sensor = Zfm20::new(tx, rx, timer);
//! match sensor.verify_password() {
//!     Ok(true) => println!("Handshake ok"),
//!     Ok(false) => println!("The module declined the password"),
//!     Err(error) => panic!("Error: {:#?}", error),
//! }
//! ```
//!
//! For complete programs, including enrolment and a door-lock loop on
//! a PC serial port, see the `demos` directory.
#![warn(missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(not(test), no_std)]

mod commands;
mod driver;
pub mod frame;
mod lock;
mod receiver;
pub mod responses;
mod utils;

pub use crate::commands::{Command, PayloadBuf};
pub use crate::driver::{SessionConfig, Zfm20, BAUD_RATE};
pub use crate::frame::{Frame, FrameError, PackageId};
pub use crate::lock::Lock;
pub use crate::receiver::{FrameAssembler, ReceiveError};
pub use crate::responses::{SearchMatch, CONFIRMATION_OK};
pub use crate::utils::{CommandWriter, Error, Timer, ToPayload};
