//! Configuration deserialization tests.

use std::path::PathBuf;

use cachetrace_core::config::{DeviceStatsConfig, InstrCountConfig, WorkingSetConfig};

#[test]
fn device_defaults() {
    let config = DeviceStatsConfig::default();
    assert_eq!(config.line_size, 64);
    assert_eq!(config.report_top, 10);
    assert!(config.miss_file.is_none());
    assert!(config.addr2line_file.is_none());
    assert!(!config.warmup_enabled);
    assert!(!config.coherent);
    assert!(!config.record_miss_pcs);
    assert!(!config.record_working_set);
}

#[test]
fn device_json_with_partial_fields_fills_defaults() {
    let json = r#"{
        "line_size": 128,
        "miss_file": "/tmp/misses.csv",
        "coherent": true
    }"#;
    let config: DeviceStatsConfig = serde_json::from_str(json).expect("valid config");
    assert_eq!(config.line_size, 128);
    assert_eq!(config.miss_file, Some(PathBuf::from("/tmp/misses.csv")));
    assert!(config.coherent);
    assert_eq!(config.report_top, 10);
    assert!(!config.record_miss_pcs);
}

#[test]
fn working_set_json_defaults() {
    let config: WorkingSetConfig = serde_json::from_str("{}").expect("valid config");
    assert_eq!(config.line_size, 64);
    assert_eq!(config.reset_interval, 100_000_000);
}

#[test]
fn instr_count_json_round_trip() {
    let json = r#"{
        "addr2line_file": "symbols.csv",
        "output_dir": "out",
        "report_top": 25
    }"#;
    let config: InstrCountConfig = serde_json::from_str(json).expect("valid config");
    assert_eq!(config.addr2line_file, Some(PathBuf::from("symbols.csv")));
    assert_eq!(config.output_dir, Some(PathBuf::from("out")));
    assert_eq!(config.report_top, 25);
}
