use std::env::args;
use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use embedded_hal::digital::v2::OutputPin;
use zfm20::responses::{is_ok, search_match};
use zfm20::{Command, Lock, Timer, Zfm20};

mod pc_utils;
use pc_utils::{open_port, print_ports, SerialReader, SerialWriter, StdTimer};

const ALARM_PORT: u16 = 3000;
const GAS_ALARM_LEVEL: u64 = 1000;
const OPEN_MS: u32 = 3000;
const RESCAN_MS: u32 = 250;

type PcSensor<'a> = Zfm20<SerialWriter<'a>, SerialReader<'a>, StdTimer>;

/// Stands in for the strike relay when running on a PC.
struct StdoutPin;

impl OutputPin for StdoutPin {
    type Error = std::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        println!("[lock] open");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        println!("[lock] closed");
        Ok(())
    }
}

enum Alarm {
    Flame,
    Gas(u64),
}

/// Which command of the capture/convert/search sequence is in flight.
#[derive(Clone, Copy)]
enum Step {
    Capture,
    Convert,
    Search,
}

fn main() {
    env_logger::init();
    let arg_list: Vec<String> = args().collect();
    match arg_list.len() {
        1 => print_ports(),
        2 => run_doorlock(&arg_list[1]),
        _ => panic!("Usage: pc_doorlock [port_name]"),
    }
}

fn run_doorlock(port_name: &str) {
    let port = open_port(port_name);
    let mut sensor = Zfm20::new(SerialWriter(&port), SerialReader(&port), StdTimer::new());
    let mut clock = StdTimer::new();
    let mut lock = Lock::new(StdoutPin);
    lock.close().unwrap();

    println!("1. Verifying password");
    if !sensor.verify_password().expect("handshake failed") {
        panic!("The module declined the password");
    }

    println!("2. Starting the sensor alarm listener on port {}", ALARM_PORT);
    let alarms = spawn_alarm_listener();

    println!("3. Watching for fingers, press Ctrl-C to stop");
    // The finger sequence is polled, not blocked on: alarms and the
    // lock auto-close keep being serviced while a reply is pending.
    let mut step = Step::Capture;
    let mut next_scan_at = 0u32;
    loop {
        let now = clock.timestamp_ms();
        lock.tick(now).unwrap();

        while let Ok(alarm) = alarms.try_recv() {
            match alarm {
                Alarm::Flame => println!("   Flame alarm, opening the lock"),
                Alarm::Gas(level) => println!("   Gas alarm at {}, opening the lock", level),
            }
            // an alarm holds the door open, no auto-close
            lock.open().unwrap();
        }

        if sensor.is_busy() {
            match sensor.poll_reply() {
                Err(nb::Error::WouldBlock) => {}
                Ok(reply) => match advance(&mut sensor, step, &reply.payload, &mut lock, now) {
                    Some(next) => step = next,
                    None => next_scan_at = now.wrapping_add(RESCAN_MS),
                },
                Err(nb::Error::Other(e)) => {
                    println!("   Error: {:?}", e);
                    next_scan_at = now.wrapping_add(RESCAN_MS);
                }
            }
        } else if due(next_scan_at, now) {
            match start_step(&mut sensor, Step::Capture) {
                Some(started) => step = started,
                None => next_scan_at = now.wrapping_add(RESCAN_MS),
            }
        }

        thread::sleep(Duration::from_millis(10));
    }
}

fn due(at: u32, now: u32) -> bool {
    (now.wrapping_sub(at) as i32) >= 0
}

/// Writes `step`'s command to the module; `None` if the write failed.
fn start_step(sensor: &mut PcSensor<'_>, step: Step) -> Option<Step> {
    let cmd = match step {
        Step::Capture => Command::GetImage,
        Step::Convert => Command::Img2Tz { buffer: 1 },
        Step::Search => Command::Search {
            buffer: 1,
            start: 0,
            count: 100,
        },
    };
    match sensor.start(cmd) {
        Ok(()) => Some(step),
        Err(e) => {
            println!("   Error: {:?}", e);
            None
        }
    }
}

/// Feeds one reply into the sequence. Returns the next in-flight step,
/// or `None` once the sequence is over and a rescan is due.
fn advance(
    sensor: &mut PcSensor<'_>,
    step: Step,
    payload: &[u8],
    lock: &mut Lock<StdoutPin>,
    now: u32,
) -> Option<Step> {
    match step {
        // no finger on the sensor is the common case; stay quiet
        Step::Capture if !is_ok(payload) => None,
        Step::Capture => start_step(sensor, Step::Convert),
        Step::Convert if !is_ok(payload) => None,
        Step::Convert => start_step(sensor, Step::Search),
        Step::Search => {
            match search_match(payload) {
                Some(hit) => {
                    println!("   Match: template #{} (score {})", hit.id, hit.score);
                    lock.open_for(OPEN_MS, now).unwrap();
                }
                None => println!("   No match for that finger"),
            }
            None
        }
    }
}

fn spawn_alarm_listener() -> mpsc::Receiver<Alarm> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let listener =
            TcpListener::bind(("0.0.0.0", ALARM_PORT)).expect("could not bind the alarm port");
        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            let tx = tx.clone();
            thread::spawn(move || {
                for line in BufReader::new(stream).lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(_) => break,
                    };
                    if let Some(alarm) = parse_alarm(&line) {
                        if tx.send(alarm).is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    rx
}

/// Messages look like `{"flame": false, "gas": 240}`, one per line.
fn parse_alarm(line: &str) -> Option<Alarm> {
    let msg: serde_json::Value = serde_json::from_str(line).ok()?;
    if msg.get("flame").and_then(|v| v.as_bool()) == Some(true) {
        return Some(Alarm::Flame);
    }
    let gas = msg.get("gas").and_then(|v| v.as_u64())?;
    if gas > GAS_ALARM_LEVEL {
        return Some(Alarm::Gas(gas));
    }
    None
}
