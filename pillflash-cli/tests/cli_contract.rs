//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("pillflash")
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pillflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pillflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn pad_grows_image_to_target_size() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("bootloader.bin");
    let output = dir.path().join("padded.bin");
    fs::write(&input, [0x01, 0x02, 0x03]).expect("write input");

    let mut cmd = cli_cmd();
    cmd.arg("pad")
        .arg(&input)
        .args(["--size", "0x20"])
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let padded = fs::read(&output).expect("padded output exists");
    assert_eq!(padded.len(), 0x20);
    assert_eq!(&padded[..3], &[0x01, 0x02, 0x03]);
    assert!(padded[3..].iter().all(|&b| b == 0xFF));

    // Input file untouched when --output is given.
    assert_eq!(fs::read(&input).expect("input intact").len(), 3);
}

#[test]
fn pad_in_place_without_output_flag() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("bootloader.bin");
    fs::write(&input, [0xAA; 8]).expect("write input");

    let mut cmd = cli_cmd();
    cmd.arg("pad")
        .arg(&input)
        .args(["--size", "16"])
        .assert()
        .success();

    assert_eq!(fs::read(&input).expect("padded in place").len(), 16);
}

#[test]
fn pad_rejects_input_larger_than_target() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("too_big.bin");
    fs::write(&input, vec![0u8; 64]).expect("write input");

    let mut cmd = cli_cmd();
    cmd.arg("pad")
        .arg(&input)
        .args(["--size", "32"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"));

    // Input must not be clobbered on failure.
    assert_eq!(fs::read(&input).expect("input intact").len(), 64);
}

#[test]
fn update_with_missing_firmware_fails_before_touching_ports() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir.path().join("not_exists.bin");

    let mut cmd = cli_cmd();
    cmd.arg("update")
        .arg(nonexistent.as_os_str())
        .args(["--port", "/dev/null", "--non-interactive"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn completions_bash_writes_script_to_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pillflash"));
}
