//! Integration tests for the threaded session
//!
//! These tests run real reader, decoder and writer threads:
//! - End-to-end decoding into a record file
//! - Link failure mid-stream
//! - Persistence backpressure (bounded wait, no reordering)
//! - Write failures surfacing as session events
//! - Binary microvolt capture

mod common;

use common::builders::PayloadBuilder;
use common::mock_helpers::{ChunkedSource, FailingSource, Gate, MockWriter, StalledWriter};
use common::test_timeout;
use std::io::{self, Read};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tgam_link::config::AppConfig;
use tgam_link::sink::{FormattedWriter, PersistFilter, RecordFormat, VisualizationBuffer};
use tgam_link::{LinkStatus, SessionBuilder, SessionEvent, SessionHandle, TgamSimulator};

fn raw_stream(count: i16) -> Vec<u8> {
    (0..count)
        .flat_map(|v| PayloadBuilder::new().raw(v).frame())
        .collect()
}

fn wait_until_finished(handle: &SessionHandle) {
    let deadline = Instant::now() + test_timeout();
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "Session did not finish in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_simulated_capture_to_record_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.txt");

    let mut bytes = Vec::new();
    TgamSimulator::new(11)
        .with_frame_limit(2 * 513)
        .read_to_end(&mut bytes)
        .unwrap();

    let writer = FormattedWriter::create(&path, RecordFormat::Decimal, PersistFilter::RawOnly).unwrap();
    let chart = VisualizationBuffer::new(256);
    let session = SessionBuilder::new(AppConfig::default())
        .persist_to(Box::new(writer))
        .visualize(chart.clone())
        .start(Box::new(ChunkedSource::new(&bytes, 13)))
        .unwrap();
    let report = session.join().unwrap();

    assert_eq!(report.link_status, LinkStatus::Closed);
    assert!(report.link_error.is_none());
    assert_eq!(report.bytes_read, bytes.len() as u64);
    assert_eq!(report.decoder.frames_decoded, 2 * 513);
    assert_eq!(report.decoder.frames_dropped(), 0);
    // 1024 raw rows plus four rows per summary frame
    assert_eq!(report.router.routed, 1024 + 8);
    assert_eq!(report.persistence_rejections(), 0);

    let persistence = report.persistence.unwrap();
    assert_eq!(persistence.samples_received, 1032);
    assert_eq!(persistence.records_written, 1024);

    let contents = std::fs::read_to_string(&path).unwrap();
    let values: Vec<i16> = contents.lines().map(|l| l.parse().unwrap()).collect();
    assert_eq!(values.len(), 1024);
    assert!(values.iter().all(|v| (-2048..=2047).contains(v)));

    assert_eq!(chart.len(), 256);
    assert_eq!(report.visualization_evicted, Some(1032 - 256));
    let metrics = chart.metrics();
    assert!(metrics.attention.is_some());
    assert!(metrics.meditation.is_some());
}

#[test]
fn test_record_file_matches_stream_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ordered.csv");

    let mut stream = raw_stream(20);
    stream.extend_from_slice(&PayloadBuilder::new().signal_quality(0).attention(55).frame());

    let writer = FormattedWriter::create(&path, RecordFormat::Csv, PersistFilter::AllNumeric).unwrap();
    let report = SessionBuilder::new(AppConfig::default())
        .persist_to(Box::new(writer))
        .start(Box::new(ChunkedSource::new(&stream, 3)))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(report.router.routed, 22);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], "sequence_index,kind,value,microvolts");
    assert_eq!(lines[1], "0,raw,0,0.000");
    assert_eq!(lines[21], "20,signal_quality,0,");
    assert_eq!(lines[22], "21,attention,55,");
}

#[test]
fn test_binary_capture_holds_microvolt_floats() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(format!("capture.{}", RecordFormat::Binary.extension()));

    let writer = FormattedWriter::create(&path, RecordFormat::Binary, PersistFilter::RawOnly).unwrap();
    let report = SessionBuilder::new(AppConfig::default())
        .persist_to(Box::new(writer))
        .start(Box::new(ChunkedSource::new(&raw_stream(10), 5)))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(report.persistence.unwrap().records_written, 10);

    let bytes = std::fs::read(&path).unwrap();
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    assert_eq!(values.len(), 10);
    for (raw, uv) in values.iter().enumerate() {
        assert!((uv - raw as f32 * 0.516).abs() < 1e-4);
    }
}

#[test]
fn test_link_failure_keeps_routed_samples() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.txt");

    let mut stream = raw_stream(10);
    // Half of an eleventh frame arrives before the link drops.
    stream.extend_from_slice(&[0xAA, 0xAA, 0x03, 0x80]);

    let writer = FormattedWriter::create(&path, RecordFormat::Decimal, PersistFilter::RawOnly).unwrap();
    let session = SessionBuilder::new(AppConfig::default())
        .persist_to(Box::new(writer))
        .start(Box::new(FailingSource::new(stream, io::ErrorKind::BrokenPipe)))
        .unwrap();
    let events = session.events().clone();
    let report = session.join().unwrap();

    assert_eq!(report.link_status, LinkStatus::Failed);
    assert!(report.link_error.as_deref().unwrap_or("").contains("link lost"));
    assert_eq!(report.router.routed, 10);
    assert!(report.discarded_partial_frame);

    let events = events.drain();
    assert!(events.iter().any(|e| matches!(e, SessionEvent::LinkFailure(_))));
    assert!(events.contains(&SessionEvent::LinkStatus(LinkStatus::Failed)));
    assert_eq!(events.last(), Some(&SessionEvent::DecoderFinished));

    let contents = std::fs::read_to_string(&path).unwrap();
    let expected: Vec<String> = (0..10).map(|v| v.to_string()).collect();
    assert_eq!(contents.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn test_slow_writer_applies_backpressure_without_loss() {
    let gate = Gate::default();
    let (writer, seen) = StalledWriter::new(gate.clone());

    let mut config = AppConfig::default();
    config.persistence.queue_capacity = 2;
    config.persistence.enqueue_timeout_ms = test_timeout().as_millis() as u64;
    let chart = VisualizationBuffer::new(4);

    let session = SessionBuilder::new(config)
        .persist_to(Box::new(writer))
        .visualize(chart.clone())
        .start(Box::new(ChunkedSource::new(&raw_stream(50), 64)))
        .unwrap();

    // The writer holds the first sample, the queue fills, and the decoder
    // has to wait on it.
    std::thread::sleep(Duration::from_millis(100));
    assert!(!session.is_finished());
    assert!(chart.appended() < 50);

    gate.open();
    let report = session.join().unwrap();

    assert_eq!(report.persistence_rejections(), 0);
    assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<u64>>());
    assert_eq!(report.persistence.unwrap().records_written, 50);

    // The chart never waits: it keeps only the newest samples.
    assert_eq!(report.visualization_evicted, Some(46));
    let latest: Vec<u64> = chart.latest(4).iter().map(|s| s.sequence_index).collect();
    assert_eq!(latest, vec![46, 47, 48, 49]);
}

#[test]
fn test_backpressure_timeout_drops_sample_and_reports_it() {
    let gate = Gate::default();
    let (writer, seen) = StalledWriter::new(gate.clone());

    let mut config = AppConfig::default();
    config.persistence.queue_capacity = 1;
    config.persistence.enqueue_timeout_ms = 10;

    let session = SessionBuilder::new(config)
        .persist_to(Box::new(writer))
        .start(Box::new(ChunkedSource::new(&raw_stream(8), 64)))
        .unwrap();
    let events = session.events().clone();

    wait_until_finished(&session);
    gate.open();
    let report = session.join().unwrap();

    let rejected = report.persistence_rejections();
    let seen = seen.lock().unwrap().clone();
    assert!(rejected > 0);
    assert_eq!(seen.len() as u64 + rejected, 8);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));

    let backpressure = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::SinkError { sink, .. } if sink == "persistence"))
        .count() as u64;
    assert_eq!(backpressure, rejected);
}

#[test]
fn test_write_failure_is_reported_and_decoding_continues() {
    let mut writer = MockWriter::new();
    writer
        .expect_write_sample()
        .times(5)
        .returning(|sample| {
            if sample.sequence_index == 1 {
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            } else {
                Ok(true)
            }
        });
    writer.expect_flush().returning(|| Ok(()));

    let chart = VisualizationBuffer::new(16);
    let session = SessionBuilder::new(AppConfig::default())
        .persist_to(Box::new(writer))
        .visualize(chart.clone())
        .start(Box::new(ChunkedSource::new(&raw_stream(5), 4)))
        .unwrap();
    let events = session.events().clone();
    let report = session.join().unwrap();

    assert_eq!(report.link_status, LinkStatus::Closed);
    assert_eq!(chart.len(), 5);
    let persistence = report.persistence.unwrap();
    assert_eq!(persistence.write_failures, 1);
    assert_eq!(persistence.records_written, 4);
    assert_eq!(persistence.last_error.as_deref(), Some("disk full"));

    let errors: Vec<SessionEvent> = events
        .drain()
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::SinkError { .. }))
        .collect();
    assert_eq!(
        errors,
        vec![SessionEvent::SinkError {
            sink: "persistence".to_string(),
            sequence_index: Some(1),
            message: "disk full".to_string(),
        }]
    );
}

#[test]
fn test_stop_ends_endless_source() {
    let chart = VisualizationBuffer::new(64);
    let session = SessionBuilder::new(AppConfig::default())
        .visualize(chart.clone())
        .start(Box::new(TgamSimulator::new(2)))
        .unwrap();

    let deadline = Instant::now() + test_timeout();
    while chart.len() < 64 {
        assert!(Instant::now() < deadline, "No samples arrived");
        std::thread::sleep(Duration::from_millis(5));
    }

    let report = session.close().unwrap();
    assert_eq!(report.link_status, LinkStatus::Closed);
    assert!(report.router.routed >= 64);
}

#[test]
fn test_invalid_config_is_rejected_before_start() {
    let mut config = AppConfig::default();
    config.persistence.queue_capacity = 0;
    let result = SessionBuilder::new(config).start(Box::new(ChunkedSource::new(&[], 1)));
    assert!(result.is_err());
}
