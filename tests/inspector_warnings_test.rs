//! Warning output of the telemetry inspector
//!
//! Installs a capturing logger for this test binary. Records are kept per
//! thread so concurrently running tests do not see each other's output.

use std::cell::RefCell;
use std::sync::Once;

use bytes::Bytes;
use enver_proxy::inspect::{Inspector, Publisher, TelemetryInspector};
use enver_proxy::protocol::{Direction, StatusFrame, TelemetryRecord};
use log::{Level, LevelFilter, Log, Metadata, Record};

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|c| c.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

fn capture_logs() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("logger already installed");
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|c| c.borrow_mut().clear());
}

/// Warnings logged on this thread since the last call
fn take_warnings() -> Vec<String> {
    CAPTURED.with(|c| {
        c.borrow_mut()
            .drain(..)
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, msg)| msg)
            .collect()
    })
}

struct Discard;

impl Publisher for Discard {
    fn publish_record(&mut self, _: &TelemetryRecord) {}
    fn publish_status(&mut self, _: &StatusFrame) {}
}

#[test]
fn test_unknown_chunk_warns_once() {
    capture_logs();
    let mut inspector = TelemetryInspector::new(Discard, true);

    let junk = Bytes::from_static(b"\x01\x02\x03 not a bridge frame \xff");
    inspector.inspect(Direction::FromDevice, junk);

    let warnings = take_warnings();
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].contains("unknown content and length 24"), "{}", warnings[0]);
}

#[test]
fn test_truncated_known_frame_warns_once() {
    capture_logs();
    let mut inspector = TelemetryInspector::new(Discard, false);

    // Ack prefix, but shorter than an ack frame
    let ack = hex::decode("680012681015a1b2c3d4").unwrap();
    inspector.inspect(Direction::FromPortal, Bytes::from(ack));

    let warnings = take_warnings();
    assert_eq!(warnings.len(), 1, "{:?}", warnings);
    assert!(warnings[0].contains("malformed"), "{}", warnings[0]);
}

#[test]
fn test_known_frames_do_not_warn() {
    capture_logs();
    let mut inspector = TelemetryInspector::new(Discard, true);

    let mut poll = hex::decode("680030681006a1b2c3d4").unwrap();
    poll.resize(48, 0);
    inspector.inspect(Direction::FromDevice, Bytes::from(poll));

    let ack = hex::decode("680012681015a1b2c3d41402070d0000a116").unwrap();
    inspector.inspect(Direction::FromPortal, Bytes::from(ack));

    assert!(take_warnings().is_empty());
}
