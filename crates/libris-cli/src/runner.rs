use std::io::{BufRead, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use libris_core::setup::{SetupEvent, SetupStep, StepOutcome, StepRunner, StepStatus};

use crate::interrupt::Interrupts;
use crate::output;

const SIGINT: i32 = 2;

/// Runs setup steps through `sh -c` in the project root and prints progress.
pub struct ShellRunner {
    root: PathBuf,
    timeout: Option<Duration>,
    interrupts: Option<Interrupts>,
    quiet: bool,
    last_output: String,
}

impl ShellRunner {
    pub fn new(root: &Path, timeout_seconds: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            timeout: (timeout_seconds > 0).then(|| Duration::from_secs(timeout_seconds)),
            interrupts: None,
            quiet: false,
            last_output: String::new(),
        }
    }

    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    /// Suppress progress lines (JSON mode).
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Print without a newline. JSON mode keeps stdout for the report.
    fn prompt(&self, text: &str) {
        if self.quiet {
            eprint!("{text}");
            let _ = std::io::stderr().flush();
        } else {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
    }

    fn print_finished(&mut self, step: SetupStep, status: &StepStatus) {
        let captured = std::mem::take(&mut self.last_output);
        if self.quiet {
            return;
        }
        match (step, status) {
            (SetupStep::ProvisionRoles, StepStatus::Failed { message }) => {
                output::failure(&format!("Could not create roles: {message}"));
            }
            (SetupStep::ProvisionRoles, _) => {}
            (SetupStep::CreateSuperuser, StepStatus::Skipped { reason }) => {
                println!();
                output::warning(&format!("Superuser creation skipped ({reason})"));
            }
            (SetupStep::SampleData, StepStatus::Skipped { .. }) => {}
            (SetupStep::SampleData, StepStatus::Failed { message }) => {
                output::failure(&format!("Error during {}", step.description()));
                print_trimmed("Error", message);
                output::warning("Sample data creation failed, but you can continue without it");
            }
            (_, StepStatus::Succeeded) => {
                output::success(&format!("{} completed successfully", step.description()));
                let trimmed = captured.trim_end();
                if !trimmed.is_empty() {
                    println!("{trimmed}");
                }
            }
            (_, StepStatus::Failed { message }) => {
                output::failure(&format!("Error during {}", step.description()));
                print_trimmed("Error", message);
            }
            (_, StepStatus::Skipped { reason }) => {
                output::info(&format!("{} skipped: {reason}", step.description()));
            }
        }
    }
}

fn print_trimmed(label: &str, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        println!("{label}: {trimmed}");
    }
}

impl StepRunner for ShellRunner {
    fn run(&mut self, step: SetupStep, command: &str) -> StepOutcome {
        let (success, stdout, stderr) =
            execute_captured(command, &self.root, self.timeout, self.interrupts.as_ref());
        tracing::debug!(step = %step, success, "captured step finished");
        if success {
            self.last_output = stdout;
            StepOutcome::Succeeded {
                output: self.last_output.clone(),
            }
        } else {
            StepOutcome::Failed { output: stderr }
        }
    }

    fn run_interactive(&mut self, step: SetupStep, command: &str) -> StepOutcome {
        let root = self.root.clone();
        let quiet = self.quiet;
        let spawn = move || -> std::io::Result<ExitStatus> {
            let stdout = if quiet {
                Stdio::from(std::io::stderr().as_fd().try_clone_to_owned()?)
            } else {
                Stdio::inherit()
            };
            Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&root)
                .stdin(Stdio::inherit())
                .stdout(stdout)
                .stderr(Stdio::inherit())
                .status()
        };
        let (status, caught) = match &self.interrupts {
            Some(interrupts) => interrupts.shielded(spawn),
            None => (spawn(), false),
        };
        tracing::debug!(step = %step, caught, "interactive step finished");

        match status {
            Err(e) => StepOutcome::Failed {
                output: format!("failed to spawn: {e}"),
            },
            Ok(_) if caught => StepOutcome::Interrupted,
            Ok(s) if s.success() => StepOutcome::Succeeded {
                output: String::new(),
            },
            Ok(s) if was_interrupted(&s) => StepOutcome::Interrupted,
            Ok(s) => StepOutcome::Failed {
                output: format!("{command} exited with {s}"),
            },
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.prompt(&format!("\n📊 {question} (y/n): "));
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => {
                self.prompt("\n");
                false
            }
            Ok(_) => libris_core::setup::is_yes(&answer),
        }
    }

    fn notify(&mut self, event: SetupEvent) {
        match event {
            SetupEvent::StepFinished(record) => self.print_finished(record.step, &record.status),
            _ if self.quiet => {}
            SetupEvent::RequirementsFallback { missing, using } => {
                println!("\n📦 Installing dependencies...");
                output::warning(&format!("{missing} not found, using {using}"));
            }
            SetupEvent::StepStarted(SetupStep::CreateSuperuser) => {
                println!("\n👤 Creating superuser account...");
                println!("You'll be prompted to create a superuser account for admin access.");
            }
            SetupEvent::StepStarted(SetupStep::ProvisionRoles) => {
                println!("\n👥 Setting up user roles...");
            }
            SetupEvent::StepStarted(step) => {
                println!("\n🔄 {}...", step.description());
            }
            SetupEvent::Provisioned(report) => {
                for status in &report.roles {
                    if status.created {
                        println!("Created role: {}", status.role);
                    } else {
                        println!("Role already exists: {}", status.role);
                    }
                }
            }
        }
    }
}

/// A child that died from SIGINT, or a shell reporting it (128 + 2).
fn was_interrupted(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(SIGINT) || status.code() == Some(128 + SIGINT)
}

/// Execute a shell command with an optional timeout. Returns (success, stdout, stderr).
///
/// The command leads its own process group, so a timeout kills everything it
/// started. stdout/stderr are drained on dedicated threads; the timeout uses
/// a waiter thread and `recv_timeout`.
fn execute_captured(
    command: &str,
    cwd: &Path,
    timeout: Option<Duration>,
    interrupts: Option<&Interrupts>,
) -> (bool, String, String) {
    let child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .process_group(0)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return (false, String::new(), format!("failed to spawn: {e}")),
    };

    let child_pid = child.id();
    if let Some(interrupts) = interrupts {
        interrupts.track(child_pid);
    }
    let result = collect(child, child_pid, timeout);
    if let Some(interrupts) = interrupts {
        interrupts.untrack();
    }
    result
}

fn collect(
    mut child: std::process::Child,
    child_pid: u32,
    timeout: Option<Duration>,
) -> (bool, String, String) {
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stdout_handle {
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });
    let stderr_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stderr_handle {
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });

    let wait_result = match timeout {
        None => child.wait(),
        Some(timeout_dur) => {
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });

            match rx.recv_timeout(timeout_dur) {
                Ok(result) => result,
                Err(_) => {
                    signal_group(child_pid, "-KILL");
                    let secs = timeout_dur.as_secs();
                    return (false, String::new(), format!("timed out after {secs}s"));
                }
            }
        }
    };

    let stdout_buf = stdout_thread.join().unwrap_or_default();
    let stderr_buf = stderr_thread.join().unwrap_or_default();

    match wait_result {
        Ok(s) if s.success() => (true, stdout_buf, stderr_buf),
        Ok(s) if stderr_buf.trim().is_empty() => {
            (false, stdout_buf, format!("command exited with {s}"))
        }
        Ok(_) => (false, stdout_buf, stderr_buf),
        Err(e) => (false, stdout_buf, format!("wait failed: {e}")),
    }
}

/// Send `signal` (e.g. `-KILL`) to every process in group `pgid`. Best-effort.
pub fn signal_group(pgid: u32, signal: &str) {
    let _ = Command::new("kill")
        .arg(signal)
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
