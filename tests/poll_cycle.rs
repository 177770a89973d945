//! End-to-end polling test over the mock transport
//!
//! Runs the full service stack (driver, journal, polling task) against a
//! scripted device and checks the observable surface: snapshot data, journal
//! file content and a clean stop.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::sleep;

use rectsrv::config::{PollingConfig, ScalingConfig};
use rectsrv::driver::{
    RectifierDriver, REG_ACTUAL_CURRENT, REG_ACTUAL_VOLTAGE, REG_POLARITY, REG_POWER_STATE,
};
use rectsrv::journal::CsvJournal;
use rectsrv::service::RectifierService;
use rectsrv::transport::MockTransport;
use rectsrv::types::{ConnectionState, Polarity, PowerState};

struct Harness {
    mock: MockTransport,
    service: Arc<RectifierService>,
    dir: TempDir,
}

fn harness(interval: Duration) -> Harness {
    let mock = MockTransport::with_registers(&[
        (REG_ACTUAL_VOLTAGE, 123),
        (REG_ACTUAL_CURRENT, 45),
        (REG_POWER_STATE, 1),
        (REG_POLARITY, 0),
    ]);
    let driver = Arc::new(RectifierDriver::new(
        Box::new(mock.clone()),
        &ScalingConfig::default(),
    ));
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(CsvJournal::new(dir.path()).unwrap());
    let polling = PollingConfig {
        interval,
        max_failures: 3,
    };
    let service = Arc::new(RectifierService::new(driver, journal, &polling));
    Harness { mock, service, dir }
}

#[tokio::test]
async fn test_polling_produces_data_and_journal_rows() {
    let h = harness(Duration::from_millis(20));
    h.service.start().await;

    sleep(Duration::from_millis(150)).await;

    let reading = h.service.data().expect("a good reading after several cycles");
    assert_eq!(reading.actual_voltage, Some(12.3));
    assert_eq!(reading.actual_current, Some(4.5));
    assert_eq!(reading.power, Some(PowerState::On));
    assert_eq!(reading.polarity, Some(Polarity::Forward));
    assert!(reading.error.is_none());
    assert_eq!(h.service.state(), ConnectionState::Connected);

    // Several cycles fit in the window, each one lands in today's file
    assert!(h.mock.read_calls() >= 3 * 4);

    let mut csv_files: Vec<_> = std::fs::read_dir(h.dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".csv"))
        .collect();
    assert_eq!(csv_files.len(), 1);
    let name = csv_files.remove(0);
    assert!(name.starts_with("rectifier_"));

    let content = std::fs::read_to_string(h.dir.path().join(name)).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(
        lines[0],
        "timestamp,actual_voltage,actual_current,power,polarity"
    );
    assert!(lines.len() >= 3);
    assert!(lines[1].contains("12.3"));
    assert!(lines[1].contains("ON"));
    assert!(lines[1].contains("FORWARD"));

    h.service.stop();
}

#[tokio::test]
async fn test_stop_halts_polling() {
    let h = harness(Duration::from_millis(10));
    h.service.start().await;
    sleep(Duration::from_millis(60)).await;
    assert!(h.service.data().is_some());

    h.service.stop();
    assert!(!h.service.is_running());

    sleep(Duration::from_millis(30)).await;
    let reads_after_stop = h.mock.read_calls();
    sleep(Duration::from_millis(40)).await;
    assert_eq!(h.mock.read_calls(), reads_after_stop);
}

#[tokio::test]
async fn test_device_outage_and_recovery() {
    let h = harness(Duration::from_millis(10));
    h.service.start().await;
    sleep(Duration::from_millis(50)).await;
    let before = h.service.data().expect("data before the outage");

    // Device goes away: reads fail, cached data survives
    h.mock.set_fail_reads(true);
    sleep(Duration::from_millis(60)).await;
    assert_eq!(h.service.data().unwrap().timestamp, before.timestamp);
    assert!(h.service.latest().unwrap().error.is_some());

    // Device returns: the forced reconnect path brings polling back
    h.mock.set_fail_reads(false);
    h.mock.set_register(REG_ACTUAL_VOLTAGE, 200);
    sleep(Duration::from_millis(60)).await;
    let after = h.service.data().unwrap();
    assert_eq!(after.actual_voltage, Some(20.0));
    assert_eq!(h.service.state(), ConnectionState::Connected);

    h.service.stop();
}
