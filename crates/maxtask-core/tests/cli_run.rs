use std::ffi::OsString;
use std::fs;

use maxtask_core::seed::Seed;
use tempfile::tempdir;

fn args(parts: &[&str]) -> Vec<OsString> {
    parts.iter().map(OsString::from).collect()
}

#[test]
fn run_exports_a_seeded_session() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("maxtaskrc");
    fs::write(&rc, "color = off\ntimezone = UTC\n").expect("write rc");

    let seed_path = temp.path().join("seed.toml");
    fs::write(
        &seed_path,
        r#"
[[projects]]
id = 1
name = "Infra"
color = "orange"

[[tasks]]
id = 3
title = "Rotate keys"
status = "In Progress"
project_id = 1
deadline = "2026-05-01"
created_at = "2026-04-01"
"#,
    )
    .expect("write seed");

    let export_path = temp.path().join("out.json");
    let rc_arg = rc.to_string_lossy().to_string();
    let seed_arg = seed_path.to_string_lossy().to_string();
    let export_arg = export_path.to_string_lossy().to_string();

    maxtask_core::run(args(&[
        "maxtask",
        "--maxtaskrc",
        &rc_arg,
        "--seed",
        &seed_arg,
        "rc.dashboard.recent.limit=2",
        "export",
        "--output",
        &export_arg,
    ]))
    .expect("run export");

    let exported = Seed::load(&export_path).expect("load export");
    assert_eq!(exported.tasks.len(), 1);
    assert_eq!(exported.tasks[0].title, "Rotate keys");
    assert_eq!(exported.projects[0].name, "Infra");
    assert!(exported.user.is_none());
}

#[test]
fn run_rejects_invalid_default_command() {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("maxtaskrc");
    fs::write(&rc, "default.command = explode\n").expect("write rc");
    let rc_arg = rc.to_string_lossy().to_string();

    let err = maxtask_core::run(args(&["maxtask", "--maxtaskrc", &rc_arg]))
        .expect_err("unknown default command");
    assert!(format!("{err:#}").contains("invalid default.command"));
}
