//! Addr2LineTable loading tests.

use std::path::Path;

use cachetrace_core::symbols::Addr2LineTable;
use cachetrace_core::StatsError;

use crate::common::addr2line_fixture;

#[test]
fn loads_columns_in_any_order() {
    let csv = addr2line_fixture(&[
        "line,path,addr,symbol",
        "42,src/main.c,4096,main",
        "7,src/util.c,8192,helper",
    ]);
    let table = Addr2LineTable::load(csv.path()).expect("table loads");
    assert_eq!(table.len(), 2);

    let main = table.get(4096).expect("addr 4096 present");
    assert_eq!(main.symbol, "main");
    assert_eq!(main.path, "src/main.c");
    assert_eq!(main.line, 42);
    assert_eq!(table.get(8192).unwrap().symbol, "helper");
    assert!(table.get(1).is_none());
}

#[test]
fn ignores_unrecognized_columns() {
    let csv = addr2line_fixture(&[
        "addr,module,symbol,path,line",
        "100,libc.so,memcpy,string.c,9",
    ]);
    let table = Addr2LineTable::load(csv.path()).expect("table loads");
    assert_eq!(table.get(100).unwrap().symbol, "memcpy");
}

#[test]
fn quoted_fields_keep_embedded_commas() {
    let csv = addr2line_fixture(&[
        "addr,symbol,path,line",
        "256,\"operator,<\",\"src/cmp, v2.cc\",3",
    ]);
    let table = Addr2LineTable::load(csv.path()).expect("table loads");
    let info = table.get(256).unwrap();
    assert_eq!(info.symbol, "operator,<");
    assert_eq!(info.path, "src/cmp, v2.cc");
}

#[test]
fn last_row_counts_without_trailing_newline() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "addr,symbol,path,line\n1,a,b,2\n3,c,d,4").expect("fixture write");
    file.flush().expect("fixture flush");

    let table = Addr2LineTable::load(file.path()).expect("table loads");
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(3).unwrap().symbol, "c");
}

#[test]
fn missing_required_column_is_an_error() {
    let csv = addr2line_fixture(&["addr,symbol,line", "1,a,2"]);
    assert!(matches!(
        Addr2LineTable::load(csv.path()),
        Err(StatsError::CsvMissingColumn("path"))
    ));
}

#[test]
fn short_body_row_is_a_parse_error() {
    let csv = addr2line_fixture(&["addr,symbol,path,line", "1,a"]);
    assert!(matches!(
        Addr2LineTable::load(csv.path()),
        Err(StatsError::CsvParse { .. })
    ));
}

#[test]
fn malformed_body_row_is_an_error() {
    let csv = addr2line_fixture(&["addr,symbol,path,line", "0xdeadbeef,a,b,2"]);
    assert!(matches!(
        Addr2LineTable::load(csv.path()),
        Err(StatsError::CsvParse { field: "addr", .. })
    ));
}

#[test]
fn absent_file_is_an_open_error() {
    assert!(matches!(
        Addr2LineTable::load(Path::new("/nonexistent/symbols.csv")),
        Err(StatsError::IoOpen { .. })
    ));
}
