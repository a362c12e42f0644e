use std::env::args;
use std::thread;
use std::time::Duration;

use zfm20::{Error, Zfm20};

mod pc_utils;
use pc_utils::{open_port, print_ports, SerialReader, SerialWriter, StdTimer};

type PcSensor<'a> = Zfm20<SerialWriter<'a>, SerialReader<'a>, StdTimer>;
type PcError = Error<std::io::Error, std::io::Error>;

fn main() {
    env_logger::init();
    let arg_list: Vec<String> = args().collect();
    match arg_list.len() {
        1 => print_ports(),
        2 => run_enrolment(&arg_list[1]),
        _ => panic!("Usage: pc_enroll [port_name]"),
    }
}

fn run_enrolment(port_name: &str) {
    let port = open_port(port_name);
    let mut sensor = Zfm20::new(SerialWriter(&port), SerialReader(&port), StdTimer::new());

    println!("1. Verifying password");
    if !sensor.verify_password().expect("handshake failed") {
        panic!("The module declined the password");
    }

    println!("2. Emptying the template library");
    if !sensor.empty_library().expect("empty_library failed") {
        panic!("The module refused to empty its library");
    }

    println!("3. Enrolling fingers, press Ctrl-C to stop");
    let mut next_id: u16 = 0;
    loop {
        match enroll_one(&mut sensor, next_id) {
            Ok(true) => {
                println!("   Stored as template #{}", next_id);
                next_id += 1;
            }
            Ok(false) => {}
            Err(e) => println!("   Error: {:?}, retrying", e),
        }
        thread::sleep(Duration::from_secs(3));
    }
}

fn enroll_one(sensor: &mut PcSensor<'_>, id: u16) -> Result<bool, PcError> {
    if !sensor.get_image()? {
        println!("   Waiting for a finger");
        return Ok(false);
    }
    if !sensor.img2tz(1)? {
        println!("   Could not read the finger, try again");
        return Ok(false);
    }
    println!("   Got one image, press the same finger again");
    thread::sleep(Duration::from_secs(2));
    if !sensor.get_image()? {
        println!("   No finger on the second pass");
        return Ok(false);
    }
    if !sensor.img2tz(2)? {
        println!("   Could not read the finger, try again");
        return Ok(false);
    }
    if !sensor.create_model()? {
        println!("   The two reads do not match, try again");
        return Ok(false);
    }
    sensor.store_model(id)
}
