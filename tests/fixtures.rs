#![allow(dead_code)]
use acrntrace_format::{Payload, RawHeader, Record};

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
pub fn ensure_env_logger_initialized() {
    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .is_test(true)
            .init();
    });
}

pub fn samples_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("samples")
        .canonicalize()
        .unwrap()
}

pub fn sample_formats() -> PathBuf {
    samples_dir().join("acrntrace.formats")
}

pub fn encode(records: &[Record]) -> Vec<u8> {
    records.iter().flat_map(Record::to_bytes).collect()
}

/// Encodes a tsc and a raw header without any payload bytes.
pub fn raw_entry(tsc: u64, header: RawHeader) -> Vec<u8> {
    let mut out = tsc.to_le_bytes().to_vec();
    out.extend_from_slice(&header.to_u64().to_le_bytes());
    out
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path)
        .and_then(|mut f| f.write_all(contents))
        .unwrap();
    path
}

/// A few entries matching the rules in `samples/acrntrace.formats`.
pub fn sample_records() -> Vec<Record> {
    let mut name = [0_u8; 16];
    name[..6].copy_from_slice(b"vcpu_0");

    vec![
        Record::new(1000, 0, 0x1, Payload::Qwords([0xDEAD_BEEF, 0x12])),
        Record::new(1010, 1, 0x11, Payload::Qwords([0x30, 0x1C])),
        // No rule for this one.
        Record::new(1020, 1, 0x99, Payload::Empty),
        Record::new(1030, 2, 0x20, Payload::Dwords([3, 0, 0, 0])),
        Record::new(1040, 3, 0x40, Payload::Bytes(name)),
        Record::new(
            1050,
            3,
            0x41,
            Payload::SignedBytes([-1, 2, -3, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
        ),
    ]
}

pub fn sample_output() -> &'static str {
    "CPU0 0x00000001 1000 timer added      [fire_tsc = 0x00000012deadbeef]\n\
     CPU1 0x00000011 1010 VMEXIT_EXIT      [reason = 0x30, exit_qualification = 0x1c]\n\
     CPU2 0x00000020 1030 VM_ENTER         [vcpu = 3]\n\
     CPU3 0x00000040 1040 SCHED_TRACE      [vcpu_0]\n\
     CPU3 0x00000041 1050 DELTA            [delta = -1 2 -3 4]\n"
}
