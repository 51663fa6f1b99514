#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn libris(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("libris").unwrap();
    cmd.current_dir(dir.path()).env("LIBRIS_ROOT", dir.path());
    cmd
}

fn yaml_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Write a libris.yaml whose setup commands are cheap shell stand-ins.
/// `overrides` replaces individual `setup.*` commands.
fn write_project(dir: &TempDir, overrides: &[(&str, &str)]) {
    let mut commands = vec![
        ("install", "echo installing {requirements}"),
        ("make_migrations", "echo making migrations"),
        ("migrate", "echo applying migrations"),
        ("create_superuser", "touch superuser.ran"),
        ("sample_data", "touch sample.ran"),
        ("run_server", "serve --dev"),
    ];
    for &(key, value) in overrides {
        if let Some(entry) = commands.iter_mut().find(|entry| entry.0 == key) {
            entry.1 = value;
        }
    }
    let mut yaml = String::from("version: 1\nproject:\n  name: library\nsetup:\n");
    for (key, value) in commands {
        yaml.push_str(&format!("  {key}: {}\n", yaml_quote(value)));
    }
    std::fs::write(dir.path().join("libris.yaml"), yaml).unwrap();
}

fn roles_json(dir: &TempDir) -> serde_json::Value {
    let out = libris(dir)
        .args(["roles", "list", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).unwrap()
}

// ---------------------------------------------------------------------------
// libris init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_marker_and_data_dir() {
    let dir = TempDir::new().unwrap();
    libris(&dir)
        .args(["init", "--name", "library"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: libris.yaml"));

    assert!(dir.path().join("libris.yaml").exists());
    assert!(dir.path().join(".libris").is_dir());
    assert!(dir.path().join(".libris/.gitignore").exists());
}

#[test]
fn init_keeps_existing_config() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[("migrate", "echo custom-migrate")]);

    libris(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  libris.yaml"));

    let content = std::fs::read_to_string(dir.path().join("libris.yaml")).unwrap();
    assert!(content.contains("custom-migrate"));
}

// ---------------------------------------------------------------------------
// libris setup-roles
// ---------------------------------------------------------------------------

#[test]
fn setup_roles_creates_three_then_none() {
    let dir = TempDir::new().unwrap();
    libris(&dir).arg("init").assert().success();

    libris(&dir)
        .arg("setup-roles")
        .assert()
        .success()
        .stdout(predicate::str::contains("Setting up user roles..."))
        .stdout(predicate::str::contains("✅ Created role: admin"))
        .stdout(predicate::str::contains("✅ Created role: staff"))
        .stdout(predicate::str::contains("✅ Created role: student"))
        .stdout(predicate::str::contains("Successfully created 3 new role(s)"))
        .stdout(predicate::str::contains("- staff: Can manage books and issue them to students"));

    libris(&dir)
        .arg("setup-roles")
        .assert()
        .success()
        .stdout(predicate::str::contains("Role already exists: admin"))
        .stdout(predicate::str::contains("All required roles already exist"))
        .stdout(predicate::str::contains("Created role").not());
}

#[test]
fn setup_groups_alias_and_json_report() {
    let dir = TempDir::new().unwrap();
    libris(&dir).arg("init").assert().success();

    let out = libris(&dir)
        .args(["setup-groups", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["created_count"], 3);
    assert_eq!(report["roles"][0]["role"], "admin");
    assert_eq!(report["roles"][0]["created"], true);

    let out = libris(&dir)
        .args(["setup-roles", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["created_count"], 0);
}

#[test]
fn setup_roles_requires_config() {
    let dir = TempDir::new().unwrap();
    libris(&dir)
        .arg("setup-roles")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn roles_list_shows_required_flag() {
    let dir = TempDir::new().unwrap();
    libris(&dir).arg("init").assert().success();

    libris(&dir)
        .args(["roles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No roles stored"));

    libris(&dir).arg("setup-roles").assert().success();
    libris(&dir)
        .args(["roles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("student"));
}

// ---------------------------------------------------------------------------
// libris setup
// ---------------------------------------------------------------------------

#[test]
fn setup_without_marker_exits_1() {
    let dir = TempDir::new().unwrap();
    libris(&dir)
        .args(["setup", "--sample-data", "no"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("libris.yaml not found"));
}

#[test]
fn setup_runs_every_step() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[]);

    libris(&dir)
        .args(["setup", "--sample-data", "yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✅ Applying migrations completed successfully"))
        .stdout(predicate::str::contains("applying migrations"))
        .stdout(predicate::str::contains("Created role: admin"))
        .stdout(predicate::str::contains("Setup completed successfully"))
        .stdout(predicate::str::contains("1. Start the development server: serve --dev"))
        .stdout(predicate::str::contains("http://127.0.0.1:8000/admin"))
        .stdout(predicate::str::contains(
            "📧 Email notifications will be displayed in the console during development",
        ));

    assert!(dir.path().join("superuser.ran").exists());
    assert!(dir.path().join("sample.ran").exists());
    assert_eq!(roles_json(&dir).as_array().unwrap().len(), 3);
}

#[test]
fn migrate_failure_skips_later_steps() {
    let dir = TempDir::new().unwrap();
    write_project(
        &dir,
        &[("migrate", "echo 'migration exploded' >&2; exit 1")],
    );

    libris(&dir)
        .args(["setup", "--sample-data", "yes"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("❌ Error during Applying migrations"))
        .stdout(predicate::str::contains("migration exploded"))
        .stdout(predicate::str::contains("Setup failed"));

    assert!(!dir.path().join("superuser.ran").exists());
    assert!(!dir.path().join("sample.ran").exists());
    assert!(!dir.path().join(".libris/roles.redb").exists());
}

#[test]
fn missing_local_requirements_falls_back() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[]);

    libris(&dir)
        .args(["setup", "--sample-data", "no"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "requirements-local.txt not found, using requirements.txt",
        ))
        .stdout(predicate::str::contains("installing requirements.txt"));
}

#[test]
fn local_requirements_are_preferred() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[]);
    std::fs::write(dir.path().join("requirements-local.txt"), "django\n").unwrap();

    libris(&dir)
        .args(["setup", "--sample-data", "no"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installing requirements-local.txt"))
        .stdout(predicate::str::contains("not found").not());
}

#[test]
fn sample_data_prompt_declined() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[]);

    libris(&dir)
        .arg("setup")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("populate the database with sample data? (y/n)"));

    assert!(!dir.path().join("sample.ran").exists());
}

#[test]
fn sample_data_prompt_accepted() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[]);

    libris(&dir).arg("setup").write_stdin("Yes\n").assert().success();

    assert!(dir.path().join("sample.ran").exists());
}

#[test]
fn sample_data_failure_still_succeeds() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[("sample_data", "exit 4")]);

    libris(&dir)
        .args(["setup", "--sample-data", "yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Sample data creation failed, but you can continue without it",
        ));
}

#[test]
fn interrupted_superuser_is_skipped() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[("create_superuser", "exit 130")]);

    libris(&dir)
        .args(["setup", "--sample-data", "no"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Superuser creation skipped"));

    assert_eq!(roles_json(&dir).as_array().unwrap().len(), 3);
}

#[test]
fn failed_superuser_halts() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[("create_superuser", "exit 1")]);

    libris(&dir)
        .args(["setup", "--sample-data", "yes"])
        .assert()
        .code(1);

    assert!(!dir.path().join("sample.ran").exists());
}

#[test]
fn setup_json_report() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[]);

    let out = libris(&dir)
        .args(["setup", "--sample-data", "no", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["succeeded"], true);
    assert_eq!(report["requirements"]["fallback"], true);
    assert_eq!(report["provision"]["created_count"], 3);
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 6);
    assert_eq!(steps[5]["step"], "sample-data");
    assert_eq!(steps[5]["status"], "skipped");
}

#[test]
fn setup_json_keeps_prompt_and_superuser_output_off_stdout() {
    let dir = TempDir::new().unwrap();
    write_project(
        &dir,
        &[("create_superuser", "echo Superuser created successfully.")],
    );

    let assert = libris(&dir)
        .args(["setup", "--json"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Superuser created successfully."))
        .stderr(predicate::str::contains("populate the database with sample data? (y/n)"));

    let report: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("stdout is one JSON report");
    assert_eq!(report["succeeded"], true);
    assert_eq!(report["steps"][5]["reason"], "declined");
}

// ---------------------------------------------------------------------------
// Ctrl-C
// ---------------------------------------------------------------------------

/// Start `libris setup`, wait for `marker` to appear, then send SIGINT.
fn interrupt_setup_at(dir: &TempDir, marker: &str) -> std::process::Output {
    let child = std::process::Command::new(env!("CARGO_BIN_EXE_libris"))
        .args(["setup", "--sample-data", "no"])
        .current_dir(dir.path())
        .env("LIBRIS_ROOT", dir.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let marker = dir.path().join(marker);
    let deadline = Instant::now() + Duration::from_secs(20);
    while !marker.exists() {
        assert!(Instant::now() < deadline, "setup never reached {}", marker.display());
        std::thread::sleep(Duration::from_millis(20));
    }

    let sent = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());
    child.wait_with_output().unwrap()
}

#[test]
fn ctrl_c_during_superuser_skips_it() {
    let dir = TempDir::new().unwrap();
    write_project(
        &dir,
        &[("create_superuser", "touch superuser.started; sleep 2; exit 1")],
    );

    let out = interrupt_setup_at(&dir, "superuser.started");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(out.status.code(), Some(0), "stdout: {stdout}");
    assert!(stdout.contains("Superuser creation skipped"), "stdout: {stdout}");
    assert!(stdout.contains("Setup completed successfully"));
    assert_eq!(roles_json(&dir).as_array().unwrap().len(), 3);
}

#[test]
fn ctrl_c_during_migrate_aborts_with_130() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[("migrate", "touch migrate.started; sleep 5")]);

    let out = interrupt_setup_at(&dir, "migrate.started");
    assert_eq!(out.status.code(), Some(130));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Setup interrupted."));
    assert!(!dir.path().join("superuser.ran").exists());
    assert!(!dir.path().join(".libris/roles.redb").exists());
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[test]
fn rust_log_raises_log_level() {
    let dir = TempDir::new().unwrap();
    libris(&dir).arg("init").assert().success();

    libris(&dir)
        .arg("setup-roles")
        .env("RUST_LOG", "debug")
        .assert()
        .success()
        .stderr(predicate::str::contains("opened role store"));

    libris(&dir)
        .arg("setup-roles")
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("opened role store").not());
}

// ---------------------------------------------------------------------------
// libris config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_rejects_empty_command() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[("migrate", "")]);

    libris(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] setup.migrate is empty"));
}

#[test]
fn config_show_fills_defaults() {
    let dir = TempDir::new().unwrap();
    write_project(&dir, &[]);

    libris(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1:8000"))
        .stdout(predicate::str::contains("path: .libris/roles.redb"));
}
