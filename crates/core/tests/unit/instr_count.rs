//! InstrCountTool sharding, reduction, and export tests.

use std::fs;
use std::thread;

use cachetrace_core::config::InstrCountConfig;
use cachetrace_core::tools::InstrCountTool;
use cachetrace_core::MemRef;

use crate::common::addr2line_fixture;

#[test]
fn serial_path_counts_instruction_fetches_only() {
    let mut tool = InstrCountTool::new(&InstrCountConfig::default());
    tool.process_memref(&MemRef::instr(0x1000, 4));
    tool.process_memref(&MemRef::instr(0x1000, 4));
    tool.process_memref(&MemRef::instr(0x2000, 4));
    tool.process_memref(&MemRef::read(0x1000, 0x8000, 8));
    tool.process_memref(&MemRef::prefetch_instr(0x3000, 4));

    tool.reduce_results();
    assert_eq!(tool.reduced_map().len(), 2);
    assert_eq!(tool.reduced_map().get(&0x1000), Some(&2));
    assert_eq!(tool.reduced_map().get(&0x2000), Some(&1));
}

#[test]
fn reduction_sums_shards_exactly() {
    let mut tool = InstrCountTool::new(&InstrCountConfig::default());
    {
        let tool_ref = &tool;
        thread::scope(|scope| {
            for worker in 0..4usize {
                scope.spawn(move || {
                    let mut shard = tool_ref.parallel_shard_init(worker);
                    // Every shard touches a shared address plus its own.
                    for _ in 0..10 {
                        InstrCountTool::parallel_shard_memref(
                            &mut shard.data,
                            &MemRef::instr(0xaaaa, 4),
                        );
                    }
                    InstrCountTool::parallel_shard_memref(
                        &mut shard.data,
                        &MemRef::instr(0x1000 + worker as u64 * 0x10, 4),
                    );
                    tool_ref.parallel_shard_exit(shard);
                });
            }
        });
    }

    tool.reduce_results();
    assert_eq!(tool.reduced_map().get(&0xaaaa), Some(&40));
    for worker in 0..4u64 {
        assert_eq!(tool.reduced_map().get(&(0x1000 + worker * 0x10)), Some(&1));
    }
    assert_eq!(tool.reduced_map().len(), 5);
}

#[test]
fn parallel_shards_shadow_the_serial_shard() {
    // Once any shard registers, the serial shard no longer contributes.
    let mut tool = InstrCountTool::new(&InstrCountConfig::default());
    tool.process_memref(&MemRef::instr(0x1, 4));
    let shard = tool.parallel_shard_init(0);
    tool.parallel_shard_exit(shard);

    tool.reduce_results();
    assert!(tool.reduced_map().is_empty());
}

#[test]
fn report_lists_unique_count_and_top_entries() {
    let mut tool = InstrCountTool::new(&InstrCountConfig {
        report_top: 2,
        ..InstrCountConfig::default()
    });
    for _ in 0..5 {
        tool.process_memref(&MemRef::instr(0x4000, 4));
    }
    tool.process_memref(&MemRef::instr(0x5000, 4));
    tool.process_memref(&MemRef::instr(0x6000, 4));

    let mut out = Vec::new();
    tool.write_results(&mut out).expect("report renders");
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("instructions: 3 unique instructions"));
    assert!(report.contains("instructions top 2"));
    assert!(report.contains(&format!("{:>18}: 5", "0x4000")));
}

#[test]
fn report_symbolizes_when_table_is_supplied() {
    let csv = addr2line_fixture(&["addr,symbol,path,line", "16384,hot_loop,src/kernel.c,77"]);
    let mut tool = InstrCountTool::new(&InstrCountConfig {
        addr2line_file: Some(csv.path().to_path_buf()),
        report_top: 1,
        ..InstrCountConfig::default()
    });
    tool.process_memref(&MemRef::instr(16384, 4));

    let mut out = Vec::new();
    tool.write_results(&mut out).expect("report renders");
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("    src/kernel.c:77 hot_loop"));
}

#[test]
fn csv_export_marks_unknown_addresses() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = addr2line_fixture(&["addr,symbol,path,line", "4096,foo,src/a.c,10"]);
    let mut tool = InstrCountTool::new(&InstrCountConfig {
        addr2line_file: Some(csv.path().to_path_buf()),
        output_dir: Some(dir.path().join("out")),
        report_top: 10,
    });
    tool.process_memref(&MemRef::instr(4096, 4));
    tool.process_memref(&MemRef::instr(4096, 4));
    tool.process_memref(&MemRef::instr(8192, 4));

    let mut out = Vec::new();
    tool.write_results(&mut out).expect("report renders");

    let exported = fs::read_to_string(dir.path().join("out/instr_counts.csv"))
        .expect("instr_counts.csv written");
    assert_eq!(
        exported,
        "addr,count,path,line,symbol\n4096,2,src/a.c,10,foo\n8192,1,unknown,0,unknown\n"
    );
}

#[test]
fn csv_export_works_without_a_symbol_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut tool = InstrCountTool::new(&InstrCountConfig {
        addr2line_file: None,
        output_dir: Some(dir.path().to_path_buf()),
        report_top: 10,
    });
    tool.process_memref(&MemRef::instr(100, 4));

    let mut out = Vec::new();
    tool.write_results(&mut out).expect("report renders");

    let exported = fs::read_to_string(dir.path().join("instr_counts.csv"))
        .expect("instr_counts.csv written");
    assert_eq!(exported, "addr,count,path,line,symbol\n100,1,unknown,0,unknown\n");
}
