mod common;

use common::{
    assert_success, stdout, testkit, write_catalog, write_tar, FILTER_TOOL, SPURIOUS_TOOL,
    UNZIP_TOOL,
};
use serde_json::{json, Value};
use std::fs;

fn invocation_members() -> Vec<(&'static str, String)> {
    let collections = json!([{
        "collection": {"elements": [
            {"encoded_id": "f1", "element_identifier": "data_images_tiff_uint8_y10_x11.tiff"},
            {"encoded_id": "f2", "element_identifier": "data_images_tiff_float32_y10_x11_z12.tiff"},
        ]}
    }]);
    let jobs = json!([
        {"tool_id": UNZIP_TOOL, "state": "ok", "params": {"input": {"id": "zip"}}},
        {"tool_id": FILTER_TOOL, "state": "ok", "params": {"input": {"values": [{"id": "f1", "src": "hda"}]}}},
        {"tool_id": FILTER_TOOL, "state": "error", "params": {"input": {"values": [{"id": "f2", "src": "hda"}]}}},
        {"tool_id": SPURIOUS_TOOL, "state": "ok", "params": {"input": {"id": "f1"}}},
        {"tool_id": SPURIOUS_TOOL, "state": "ok", "params": {"input": {"id": "not-a-fixture"}}},
    ]);
    vec![
        ("collections_attrs.txt", collections.to_string()),
        ("jobs_attrs.txt", jobs.to_string()),
    ]
}

#[test]
fn invocation_summary_prints_json_report() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let catalog = write_catalog(temp_dir.path());
    let archive = temp_dir.path().join("invocation.tar");
    write_tar(&archive, &invocation_members());

    let output = testkit(
        &[
            "summarize-invocation",
            archive.to_str().expect("utf8 path"),
            "--tools",
            catalog.to_str().expect("utf8 path"),
        ],
        temp_dir.path(),
    );
    assert_success(&output);
    let report: Value = serde_json::from_str(&stdout(&output)).expect("report JSON");

    assert_eq!(
        report["expectedly_tested_tools"],
        json!(["2d_simple_filter/ip_filter_standard"])
    );
    assert_eq!(report["untested_tools"], json!(["2d_auto_threshold/ip_threshold"]));
    assert_eq!(
        report["spuriously_tested_tools"],
        json!(["graphicsmagick_image_convert/graphicsmagick_image_convert"])
    );
    let filter = &report["details"]["2d_simple_filter/ip_filter_standard"];
    assert_eq!(filter[0]["inputs"]["input"], "uint8_y10_x11.tiff");
    assert_eq!(filter[1]["success"], json!(false));
    let spurious = &report["details"]["graphicsmagick_image_convert/graphicsmagick_image_convert"];
    assert_eq!(spurious.as_array().map(Vec::len), Some(1));
    assert!(report["details"].get("unzip/unzip").is_none());
}

#[test]
fn invocation_summary_defaults_catalog_to_data_dir() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).expect("create data dir");
    write_catalog(&data_dir);
    let archive = temp_dir.path().join("invocation.tar");
    write_tar(&archive, &invocation_members());

    let output = testkit(&["summarize-invocation", "invocation.tar"], temp_dir.path());
    assert_success(&output);
    assert!(stdout(&output).contains("2d_auto_threshold/ip_threshold"));
}

#[test]
fn invocation_summary_rejects_archives_without_job_listing() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let catalog = write_catalog(temp_dir.path());
    let archive = temp_dir.path().join("broken.tar");
    write_tar(&archive, &[("collections_attrs.txt", "[]".to_string())]);

    let output = testkit(
        &[
            "summarize-invocation",
            archive.to_str().expect("utf8 path"),
            "--tools",
            catalog.to_str().expect("utf8 path"),
        ],
        temp_dir.path(),
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("jobs_attrs.txt"));
}

fn xunit_steps() -> Value {
    json!({
        "0": {"jobs": [{
            "tool_id": UNZIP_TOOL,
            "state": "ok",
            "inputs": {"input": {"id": "zip"}},
            "outputs": {
                "unzipped|data_images_tiff_uint8_y10_x11.tiff__": {"id": "o1"},
                "unzipped|data_images_tiff_uint8_x11_y10.tiff__": {"id": "o2"},
            },
        }]},
        "1": {"jobs": [
            {"tool_id": FILTER_TOOL, "state": "ok", "inputs": {"input": {"id": "o1"}}},
            {"tool_id": FILTER_TOOL, "state": "failed", "inputs": {"input": {"id": "o2"}}},
        ]},
    })
}

fn write_xunit(path: &std::path::Path, error_payload: Option<&Value>) {
    let error = error_payload
        .map(|payload| format!("<error type=\"failure\"><![CDATA[{payload}]]></error>"))
        .unwrap_or_default();
    let xml = format!(
        "<?xml version=\"1.0\"?>\n<testsuite name=\"workflow\" tests=\"1\">\n  <testcase name=\"run\">{error}</testcase>\n</testsuite>\n"
    );
    fs::write(path, xml).expect("write xunit");
}

#[test]
fn xunit_without_error_reports_all_passed() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let catalog = write_catalog(temp_dir.path());
    let xunit = temp_dir.path().join("results.xml");
    write_xunit(&xunit, None);

    let output = testkit(
        &[
            "summarize-xunit",
            xunit.to_str().expect("utf8 path"),
            "--tools",
            catalog.to_str().expect("utf8 path"),
        ],
        temp_dir.path(),
    );
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), "All tests passed.");
}

#[test]
fn xunit_failure_writes_csv_tables() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let catalog = write_catalog(temp_dir.path());
    let xunit = temp_dir.path().join("results.xml");
    write_xunit(
        &xunit,
        Some(&json!({"invocation_details": {"steps": xunit_steps()}})),
    );
    let csv_dir = temp_dir.path().join("report");

    let output = testkit(
        &[
            "summarize-xunit",
            xunit.to_str().expect("utf8 path"),
            "--tools",
            catalog.to_str().expect("utf8 path"),
            "--csv",
            csv_dir.to_str().expect("utf8 path"),
        ],
        temp_dir.path(),
    );
    assert_success(&output);
    assert!(stdout(&output).is_empty());

    let overview = fs::read_to_string(csv_dir.join("overview.csv")).expect("read overview");
    let lines: Vec<&str> = overview.lines().collect();
    assert_eq!(
        lines,
        [
            "Tested Tools,Success Rate,,Untested Tools,Spuriously Tested Tools",
            "2d_simple_filter/ip_filter_standard,0.5,,2d_auto_threshold/ip_threshold,",
        ]
    );

    let tool_table = fs::read_to_string(
        csv_dir
            .join("2d_simple_filter")
            .join("ip_filter_standard.csv"),
    )
    .expect("read tool table");
    let lines: Vec<&str> = tool_table.lines().collect();
    assert_eq!(
        lines,
        [
            "Inputs/input,State,Success",
            "uint8_y10_x11.tiff,ok,True",
            "uint8_x11_y10.tiff,failed,False",
        ]
    );
    assert!(!csv_dir.join("unzip").exists());
}

#[test]
fn malformed_xunit_exits_non_zero() {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let catalog = write_catalog(temp_dir.path());
    let xunit = temp_dir.path().join("results.xml");
    fs::write(&xunit, "<testsuite><testcase>").expect("write xunit");

    let output = testkit(
        &[
            "summarize-xunit",
            xunit.to_str().expect("utf8 path"),
            "--tools",
            catalog.to_str().expect("utf8 path"),
        ],
        temp_dir.path(),
    );
    assert!(!output.status.success());
}
