//! Capture metadata parsing tests.

use framestamp::{CaptureMetadata, FramestampError};

// ── valid documents ────────────────────────────────────────────────

#[test]
fn parses_complete_document() {
    let metadata = CaptureMetadata::from_json_str(
        r#"{"file": {"startTs": 1700000000.25, "stopTs": 1700000010.25, "numFrames": 301, "tzOffset": 120}}"#,
    );
    assert!(metadata.valid);
    assert!(metadata.issue.is_none());
    assert_eq!(metadata.start_ts, 1_700_000_000.25);
    assert_eq!(metadata.stop_ts, 1_700_000_010.25);
    assert_eq!(metadata.num_frames, 301);
    assert_eq!(metadata.tz_offset_minutes, 120);
    assert_eq!(metadata.start_ts_ms(), Some(1_700_000_000_250.0));
    assert_eq!(metadata.stop_ts_ms(), Some(1_700_000_010_250.0));
    assert_eq!(metadata.nominal_interval_ms(), Some(10_000.0 / 300.0));
    assert_eq!(metadata.expected_frames(), Some(301));
}

#[test]
fn tz_offset_defaults_to_zero() {
    let metadata =
        CaptureMetadata::from_json_str(r#"{"file": {"startTs": 1, "stopTs": 2, "numFrames": 2}}"#);
    assert!(metadata.valid);
    assert_eq!(metadata.tz_offset_minutes, 0);
}

#[test]
fn accepts_numeric_strings() {
    let metadata = CaptureMetadata::from_json_str(
        r#"{"file": {"startTs": "100.5", "stopTs": " 101.5 ", "numFrames": "11", "tzOffset": "-480"}}"#,
    );
    assert!(metadata.valid, "{:?}", metadata.issue);
    assert_eq!(metadata.start_ts, 100.5);
    assert_eq!(metadata.num_frames, 11);
    assert_eq!(metadata.tz_offset_minutes, -480);
}

#[test]
fn fractional_frame_count_is_truncated() {
    let metadata = CaptureMetadata::from_json_str(
        r#"{"file": {"startTs": 0, "stopTs": 1, "numFrames": 30.9}}"#,
    );
    assert!(metadata.valid);
    assert_eq!(metadata.num_frames, 30);
}

#[test]
fn ignores_unrelated_fields() {
    let metadata = CaptureMetadata::from_json_str(
        r#"{"camera": {"model": "x"}, "file": {"name": "run_01.mp4", "startTs": 0, "stopTs": 1, "numFrames": 31}}"#,
    );
    assert!(metadata.valid);
}

// ── degraded documents ─────────────────────────────────────────────

#[test]
fn missing_field_is_invalid() {
    let metadata =
        CaptureMetadata::from_json_str(r#"{"file": {"startTs": 1, "numFrames": 10, "tzOffset": 60}}"#);
    assert!(!metadata.valid);
    assert!(metadata.issue.as_deref().is_some_and(|issue| issue.contains("stopTs")));
    assert_eq!(metadata.tz_offset_minutes, 0, "Timezone is dropped with the document");
    assert_eq!(metadata.start_ts_ms(), None);
    assert_eq!(metadata.nominal_interval_ms(), None);
    assert_eq!(metadata.expected_frames(), None);
}

#[test]
fn missing_file_object_is_invalid() {
    let metadata = CaptureMetadata::from_json_str(r#"{"startTs": 1, "stopTs": 2, "numFrames": 2}"#);
    assert!(!metadata.valid);
}

#[test]
fn unparsable_values_are_invalid() {
    for document in [
        r#"{"file": {"startTs": "soon", "stopTs": 2, "numFrames": 2}}"#,
        r#"{"file": {"startTs": 1, "stopTs": [2], "numFrames": 2}}"#,
        r#"{"file": {"startTs": 1, "stopTs": 2, "numFrames": -5}}"#,
        r#"{"file": {"startTs": 1, "stopTs": 2, "numFrames": 2, "tzOffset": "east"}}"#,
        r#"{"file": {"startTs": null, "stopTs": 2, "numFrames": 2}}"#,
    ] {
        let metadata = CaptureMetadata::from_json_str(document);
        assert!(!metadata.valid, "{document} should be invalid");
        assert!(metadata.issue.is_some());
    }
}

#[test]
fn malformed_json_is_invalid() {
    let metadata = CaptureMetadata::from_json_str("{ not json");
    assert!(!metadata.valid);
    assert!(metadata.issue.as_deref().is_some_and(|issue| issue.contains("JSON")));
}

#[test]
fn fewer_than_two_frames_is_invalid() {
    for frames in [0, 1] {
        let metadata = CaptureMetadata::from_json_str(&format!(
            r#"{{"file": {{"startTs": 1, "stopTs": 2, "numFrames": {frames}}}}}"#
        ));
        assert!(!metadata.valid);
        assert_eq!(metadata.num_frames, frames);
        assert!(metadata.issue.as_deref().is_some_and(|issue| issue.contains("numFrames")));
    }
}

// ── loading ────────────────────────────────────────────────────────

#[test]
fn load_reads_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temporary_directory.path().join("run_01.json");
    std::fs::write(
        &path,
        r#"{"file": {"startTs": 10, "stopTs": 11, "numFrames": 31, "tzOffset": 0}}"#,
    )
    .expect("Failed to write metadata");

    let metadata = CaptureMetadata::load(&path).expect("Readable file");
    assert!(metadata.valid);
    assert_eq!(metadata.num_frames, 31);
}

#[test]
fn load_of_malformed_file_is_not_an_error() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temporary_directory.path().join("run_01.json");
    std::fs::write(&path, "garbage").expect("Failed to write metadata");

    let metadata = CaptureMetadata::load(&path).expect("Readable file");
    assert!(!metadata.valid);
}

#[test]
fn load_of_missing_file_is_unreadable() {
    let error = CaptureMetadata::load("this_file_does_not_exist.json").expect_err("No such file");
    match error {
        FramestampError::MetadataUnreadable { path, .. } => {
            assert_eq!(path.to_str(), Some("this_file_does_not_exist.json"));
        }
        other => panic!("Expected MetadataUnreadable, got: {other}"),
    }
}
