mod fixtures;

use fixtures::*;

use acrntrace_format::{Payload, Record};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::{self, File};
use std::process::Command;
use tempfile::tempdir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo_bin!("acrntrace_format"))
}

#[test]
fn it_renders_sample_trace_to_stdout() {
    let d = tempdir().unwrap();
    let trace = write_file(d.path(), "trace.bin", &encode(&sample_records()));

    cmd()
        .arg(sample_formats())
        .arg(&trace)
        .assert()
        .success()
        .stdout(sample_output());
}

#[test]
fn it_supports_stdin_input_with_dash() {
    let d = tempdir().unwrap();
    let trace = write_file(d.path(), "trace.bin", &encode(&sample_records()));

    cmd()
        .arg(sample_formats())
        .arg("-")
        .stdin(File::open(&trace).unwrap())
        .assert()
        .success()
        .stdout(sample_output());
}

#[test]
fn it_aborts_on_a_malformed_format_file_before_decoding() {
    let d = tempdir().unwrap();
    let formats = write_file(d.path(), "formats", b"1 ok %(tsc)d\nnot-a-number template\n");
    let trace = write_file(
        d.path(),
        "trace.bin",
        &encode(&[Record::new(1, 0, 1, Payload::Empty)]),
    );

    cmd()
        .arg(&formats)
        .arg(&trace)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("wrong format file (line 2)"));
}

#[test]
fn it_rejects_unknown_placeholders_unless_lenient() {
    let d = tempdir().unwrap();
    let formats = write_file(d.path(), "formats", b"1 vcpu %(vcpu)d\n");
    let trace = write_file(
        d.path(),
        "trace.bin",
        &encode(&[Record::new(1, 0, 1, Payload::Empty)]),
    );

    cmd()
        .arg(&formats)
        .arg(&trace)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("unknown placeholder `%(vcpu)`"));

    cmd()
        .arg("--lenient")
        .arg(&formats)
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "vcpu %(vcpu)d\n{cpu: 0, tsc: 1, event: 1,",
        ));
}

#[test]
fn it_fails_on_missing_files() {
    let d = tempdir().unwrap();
    let trace = write_file(d.path(), "trace.bin", b"");

    cmd()
        .arg(d.path().join("no-such-formats"))
        .arg(&trace)
        .assert()
        .failure()
        .code(1);

    cmd()
        .arg(sample_formats())
        .arg(d.path().join("no-such-trace"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to open trace file"));
}

#[test]
fn it_exits_cleanly_on_a_truncated_trace() {
    let d = tempdir().unwrap();
    let mut bytes = encode(&sample_records()[..1]);
    bytes.extend_from_slice(&[0xAA; 12]);
    let trace = write_file(d.path(), "trace.bin", &bytes);

    cmd()
        .arg(sample_formats())
        .arg(&trace)
        .assert()
        .success()
        .stdout("CPU0 0x00000001 1000 timer added      [fire_tsc = 0x00000012deadbeef]\n");
}

#[test]
fn it_fails_when_the_trace_cannot_be_read() {
    let d = tempdir().unwrap();

    cmd()
        .arg(sample_formats())
        .arg(d.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("offset 0: failed to read tsc"))
        .stderr(predicate::str::contains("Is a directory").count(1));
}

#[test]
fn it_rejects_oversized_widths() {
    let d = tempdir().unwrap();
    let formats = write_file(d.path(), "formats", b"1 w=%(1)70000d\n");
    let trace = write_file(
        d.path(),
        "trace.bin",
        &encode(&[Record::new(1, 0, 1, Payload::Qwords([5, 0]))]),
    );

    cmd()
        .arg(&formats)
        .arg(&trace)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("wrong format file (line 1)"));

    cmd()
        .arg("--lenient")
        .arg(&formats)
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("w=%(1)70000d\n{cpu: 0, tsc: 1, event: 1,"));
}

#[test]
fn it_prints_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("FORMATS"));

    cmd().assert().failure().code(2);
}

#[test]
fn it_respects_file_output() {
    let d = tempdir().unwrap();
    let trace = write_file(d.path(), "trace.bin", &encode(&sample_records()));
    let out = d.path().join("nested").join("trace.txt");

    cmd()
        .arg("-f")
        .arg(&out)
        .arg(sample_formats())
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(fs::read_to_string(&out).unwrap(), sample_output());
}

#[test]
fn test_it_refuses_to_overwrite_directory() {
    let d = tempdir().unwrap();
    let trace = write_file(d.path(), "trace.bin", &encode(&sample_records()));

    cmd()
        .arg("-f")
        .arg(d.path())
        .arg(sample_formats())
        .arg(&trace)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_it_overwrites_file_anyways_if_passed_flag() {
    let d = tempdir().unwrap();
    let trace = write_file(d.path(), "trace.bin", &encode(&sample_records()));
    let out = write_file(d.path(), "trace.txt", b"I'm a file!");

    cmd()
        .arg("-f")
        .arg(&out)
        .arg("--no-confirm-overwrite")
        .arg(sample_formats())
        .arg(&trace)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&out).unwrap(), sample_output());
}
