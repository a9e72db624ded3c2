//! End-to-end provisioning runs against a local HTTP server.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use httpmock::prelude::*;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use hostprep::config::Settings;
use hostprep::fetch::AcquisitionResult;
use hostprep::launch::{normal_command, LaunchOutcome, ScriptLauncher};
use hostprep::pipeline::{ExtractionOutcome, Provisioner, RunStatus};
use hostprep::probe::FixedProbe;
use hostprep::progress::RecordingSink;
use hostprep::shell::{MockResponse, MockRunner};

fn settings(app_dir: &Path) -> Settings {
    Settings {
        app_dir: Some(app_dir.to_path_buf()),
        request_timeout_secs: 5,
        launch_script: "run.sh".to_string(),
        ..Default::default()
    }
}

fn write_manifest(app_dir: &Path, doc: serde_json::Value) {
    fs::write(app_dir.join("cloud_config.json"), doc.to_string()).unwrap();
}

fn bundle_zip() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.add_directory("kourichat/", options).unwrap();
    writer.start_file("kourichat/run.sh", options).unwrap();
    writer.write_all(b"#!/bin/sh\necho started\n").unwrap();
    writer.start_file("kourichat/config.json", options).unwrap();
    writer.write_all(b"{}").unwrap();
    writer.finish().unwrap().into_inner()
}

#[test]
fn falls_back_when_primary_is_unreachable() {
    let temp = TempDir::new().unwrap();
    let server = MockServer::start();
    let mirror = server.mock(|when, then| {
        when.method(GET).path("/mirror/data.bin");
        then.status(200).body("0123456789");
    });
    write_manifest(
        temp.path(),
        serde_json::json!({
            "version": "1",
            "packages": [
                {"name": "data.bin", "url": "http://127.0.0.1:1/data.bin", "size": 10, "description": "data"}
            ],
            "fallback_urls": {"data.bin": [server.url("/mirror/data.bin")]},
        }),
    );
    let settings = settings(temp.path());
    let runner = MockRunner::new();
    let probe = FixedProbe::new().elevated(true);
    let sink = RecordingSink::new();

    let report = Provisioner::new(&settings, &runner, &probe, &sink)
        .without_refresh()
        .run();

    mirror.assert();
    assert_eq!(report.status, RunStatus::Succeeded);
    match &report.package("data.bin").unwrap().acquisition {
        AcquisitionResult::Acquired {
            path,
            attempts,
            bytes,
        } => {
            assert_eq!(*attempts, 2);
            assert_eq!(*bytes, 10);
            assert_eq!(fs::read_to_string(path).unwrap(), "0123456789");
        }
        other => panic!("expected Acquired, got {:?}", other),
    }
}

#[test]
fn second_run_skips_present_package() {
    let temp = TempDir::new().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/data.bin");
        then.status(200).body("0123456789");
    });
    write_manifest(
        temp.path(),
        serde_json::json!({
            "version": "1",
            "packages": [
                {"name": "data.bin", "url": server.url("/data.bin"), "size": 10, "description": "data"}
            ],
        }),
    );
    let settings = settings(temp.path());
    let runner = MockRunner::new();
    let probe = FixedProbe::new().elevated(true);
    let sink = RecordingSink::new();
    let provisioner = Provisioner::new(&settings, &runner, &probe, &sink).without_refresh();

    let first = provisioner.run();
    let second = provisioner.run();

    mock.assert_hits(1);
    assert_eq!(first.status, RunStatus::Succeeded);
    assert_eq!(second.status, RunStatus::Succeeded);
    assert!(matches!(
        second.package("data.bin").unwrap().acquisition,
        AcquisitionResult::Skipped(_)
    ));
}

#[test]
fn extracts_bundle_and_launches_project() {
    let temp = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bundle.zip");
        then.status(200).body(bundle_zip());
    });
    write_manifest(
        temp.path(),
        serde_json::json!({
            "version": "1",
            "base_url": server.base_url(),
            "packages": [
                {
                    "name": "bundle.zip",
                    "url": "/bundle.zip",
                    "size": 0,
                    "description": "Project bundle",
                    "post_download": "extract",
                    "extract_to": "."
                }
            ],
        }),
    );
    let settings = settings(temp.path());
    let script: PathBuf = temp.path().join("kourichat").join("run.sh");
    let runner = MockRunner::new().on(&normal_command(&script).display(), MockResponse::ok(""));
    let probe = FixedProbe::new().elevated(true);
    let sink = RecordingSink::new();

    let report = Provisioner::new(&settings, &runner, &probe, &sink)
        .without_refresh()
        .run();

    assert_eq!(report.status, RunStatus::Succeeded);
    let package = report.package("bundle.zip").unwrap();
    match &package.extraction {
        Some(ExtractionOutcome::Expanded(summary)) => {
            assert!(summary.failed.is_empty());
            assert!(summary.archive_removed);
        }
        other => panic!("expected Expanded, got {:?}", other),
    }
    assert!(script.exists());
    assert!(temp.path().join("kourichat/config.json").exists());
    assert!(!temp.path().join("downloads/bundle.zip").exists());

    let outcome = ScriptLauncher::new(&runner, &sink, &settings)
        .find_and_launch(&[temp.path().to_path_buf()]);
    assert!(matches!(outcome, LaunchOutcome::Normal { .. }));
    assert!(outcome.is_started());
}

#[test]
fn corrupt_archive_is_kept_and_reported() {
    let temp = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bundle.zip");
        then.status(200).body("definitely not a zip");
    });
    write_manifest(
        temp.path(),
        serde_json::json!({
            "version": "1",
            "packages": [
                {
                    "name": "bundle.zip",
                    "url": server.url("/bundle.zip"),
                    "size": 0,
                    "description": "",
                    "post_download": "extract"
                }
            ],
        }),
    );
    let settings = settings(temp.path());
    let runner = MockRunner::new();
    let probe = FixedProbe::new().elevated(true);
    let sink = RecordingSink::new();

    let report = Provisioner::new(&settings, &runner, &probe, &sink)
        .without_refresh()
        .run();

    assert_eq!(report.status, RunStatus::PartiallyFailed);
    assert!(matches!(
        report.package("bundle.zip").unwrap().extraction,
        Some(ExtractionOutcome::Failed { .. })
    ));
    assert!(temp.path().join("downloads/bundle.zip").exists());
}

#[test]
fn report_serializes_to_json() {
    let temp = TempDir::new().unwrap();
    write_manifest(
        temp.path(),
        serde_json::json!({
            "version": "9",
            "packages": [
                {"name": "data.bin", "url": "http://127.0.0.1:1/data.bin", "size": 1, "description": ""}
            ],
        }),
    );
    let settings = settings(temp.path());
    let runner = MockRunner::new();
    let probe = FixedProbe::new().elevated(true);
    let sink = RecordingSink::new();

    let report = Provisioner::new(&settings, &runner, &probe, &sink)
        .without_refresh()
        .run();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["manifest_version"], "9");
    assert_eq!(json["packages"][0]["acquisition"]["status"], "failed");
    assert_eq!(
        json["packages"][0]["acquisition"]["detail"]["cause"],
        "network_exhausted"
    );
    assert!(json["fatal"].is_string());
}
