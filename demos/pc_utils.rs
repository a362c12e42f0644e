use std::cell::RefCell;
use std::io::{Read as _, Write as _};
use std::time::{Duration, Instant};

use embedded_hal::serial::{Read, Write};
use serialport::prelude::*;
use zfm20::{Timer, BAUD_RATE};

// We cheat and use the host OS's serial port as our UART, which means
// implementing the embedded-hal read/write interfaces over it.

pub struct SerialReader<'a>(pub &'a RefCell<Box<dyn SerialPort>>);
pub struct SerialWriter<'a>(pub &'a RefCell<Box<dyn SerialPort>>);

impl Read<u8> for SerialReader<'_> {
    type Error = std::io::Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let mut buf: [u8; 1] = [0u8];
        match self.0.borrow_mut().read(&mut buf) {
            Ok(1) => Ok(buf[0]),
            Ok(_) => Err(nb::Error::WouldBlock),
            // the port's short read timeout is our "no data yet"
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::from(e)),
        }
    }
}

impl Write<u8> for SerialWriter<'_> {
    type Error = std::io::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        let buf: [u8; 1] = [word];
        loop {
            match self.0.borrow_mut().write(&buf) {
                Ok(1) => return Ok(()),
                Ok(_) => continue,
                Err(e) => return Err(nb::Error::from(e)),
            }
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        match self.0.borrow_mut().flush() {
            Ok(()) => Ok(()),
            Err(e) => Err(nb::Error::from(e)),
        }
    }
}

/// Milliseconds since program start.
pub struct StdTimer(Instant);

impl StdTimer {
    pub fn new() -> Self {
        StdTimer(Instant::now())
    }
}

impl Timer for StdTimer {
    fn timestamp_ms(&mut self) -> u32 {
        self.0.elapsed().as_millis() as u32
    }
}

pub fn print_ports() {
    let ports = serialport::available_ports().expect("could not list serial ports");
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port.port_name);
    }
}

pub fn open_port(port_name: &str) -> RefCell<Box<dyn SerialPort>> {
    let settings = SerialPortSettings {
        baud_rate: BAUD_RATE,
        // keep OS reads short so the driver's own deadline is in charge
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let port = serialport::open_with_settings(port_name, &settings)
        .expect("could not open the serial port");
    RefCell::new(port)
}
