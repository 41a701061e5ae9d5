use std::path::Path;
use std::process::{Command, Output};

fn hoard(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hoard"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run hoard")
}

fn ok(data_dir: &Path, args: &[&str]) -> String {
    let out = hoard(data_dir, args);
    assert!(
        out.status.success(),
        "hoard {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn claim_and_show_across_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();

    ok(data, &["init-group", "Lantern"]);
    ok(data, &["character", "add", "Lantern", "Aria", "--class", "Ranger"]);
    ok(data, &["character", "add", "Lantern", "Bren"]);
    ok(data, &["add", "Lantern", "Arrows", "-n", "10", "-c", "ammunition"]);
    ok(data, &["claim", "Lantern", "Arrows", "Aria", "-n", "4"]);
    ok(data, &["claim", "Lantern", "Arrows", "Bren", "-n", "3"]);

    let shown = ok(data, &["show", "Lantern", "Arrows"]);
    assert!(shown.contains("Aria: 4, Bren: 3, Party Storage: 3"), "{shown}");

    let listed = ok(data, &["character", "list", "Lantern"]);
    assert!(listed.contains("Aria Ranger 1"), "{listed}");

    ok(data, &["verify", "Lantern"]);
    assert!(data.join("groups.json").is_file());
}

#[test]
fn over_allocation_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();

    ok(data, &["init-group", "Lantern"]);
    ok(data, &["character", "add", "Lantern", "Aria"]);
    ok(data, &["add", "Lantern", "Rope", "-n", "2", "-c", "tool"]);

    let out = hoard(data, &["claim", "Lantern", "Rope", "Aria", "-n", "3"]);
    assert!(!out.status.success());

    let shown = ok(data, &["show", "Lantern", "Rope"]);
    assert!(shown.contains("Party Storage: 2"), "{shown}");
}

#[test]
fn json_summary_is_machine_readable() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path();

    ok(data, &["init-group", "Lantern"]);
    ok(data, &["add", "Lantern", "Torch", "-n", "5", "--weight", "1"]);

    let json = ok(data, &["--format", "json", "summary", "Lantern"]);
    assert!(json.contains("\"itemCount\": 1"), "{json}");
    assert!(json.contains("\"partyStorageUnits\": 5"), "{json}");
}
