//! Local development setup sequence.
//!
//! `run_setup` walks the fixed step list and decides what happens after each
//! outcome. Running commands, prompting and printing belong to the caller's
//! [`StepRunner`], which keeps the sequencing testable without subprocesses.
//!
//! # Failure rules
//! - Any failed step halts the sequence and fails the run.
//! - `create-superuser` interrupted by the user is skipped, not failed.
//! - `sample-data` only runs when confirmed; its failure is a warning.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{Config, SetupConfig};
use crate::provision::{provision_roles, ProvisionReport};
use crate::store::RoleStore;

// ---------------------------------------------------------------------------
// SetupStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupStep {
    Install,
    MakeMigrations,
    Migrate,
    CreateSuperuser,
    ProvisionRoles,
    SampleData,
}

impl SetupStep {
    pub fn all() -> &'static [SetupStep] {
        &[
            SetupStep::Install,
            SetupStep::MakeMigrations,
            SetupStep::Migrate,
            SetupStep::CreateSuperuser,
            SetupStep::ProvisionRoles,
            SetupStep::SampleData,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SetupStep::Install => "install",
            SetupStep::MakeMigrations => "make-migrations",
            SetupStep::Migrate => "migrate",
            SetupStep::CreateSuperuser => "create-superuser",
            SetupStep::ProvisionRoles => "provision-roles",
            SetupStep::SampleData => "sample-data",
        }
    }

    /// Human-readable progress label.
    pub fn description(self) -> &'static str {
        match self {
            SetupStep::Install => "Installing requirements",
            SetupStep::MakeMigrations => "Creating migrations",
            SetupStep::Migrate => "Applying migrations",
            SetupStep::CreateSuperuser => "Creating superuser account",
            SetupStep::ProvisionRoles => "Setting up user roles",
            SetupStep::SampleData => "Populating database with sample data",
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Runner seam
// ---------------------------------------------------------------------------

/// Result of running one external command.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Exit status zero. `output` is the captured stdout (empty when interactive).
    Succeeded { output: String },
    /// Non-zero exit, spawn failure or timeout. `output` is the captured stderr
    /// or a description of what went wrong.
    Failed { output: String },
    /// The user interrupted the command (Ctrl-C).
    Interrupted,
}

/// Progress notifications emitted while the sequence runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupEvent {
    RequirementsFallback { missing: String, using: String },
    StepStarted(SetupStep),
    StepFinished(StepRecord),
    Provisioned(ProvisionReport),
}

pub trait StepRunner {
    /// Run a command with captured stdout/stderr.
    fn run(&mut self, step: SetupStep, command: &str) -> StepOutcome;

    /// Run a command attached to the terminal.
    fn run_interactive(&mut self, step: SetupStep, command: &str) -> StepOutcome;

    /// Ask a yes/no question. `false` on anything but an explicit yes.
    fn confirm(&mut self, question: &str) -> bool;

    fn notify(&mut self, event: SetupEvent);
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed { message: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: SetupStep,
    #[serde(flatten)]
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupReport {
    pub succeeded: bool,
    pub requirements: RequirementsChoice,
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provision: Option<ProvisionReport>,
}

impl SetupReport {
    pub fn status_of(&self, step: SetupStep) -> Option<&StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.status)
    }
}

/// How the sample-data prompt is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleData {
    #[default]
    Ask,
    Yes,
    No,
}

// ---------------------------------------------------------------------------
// Requirements selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementsChoice {
    pub file: String,
    pub fallback: bool,
}

/// Prefer the primary requirements file; use the fallback when it is absent.
pub fn choose_requirements(root: &Path, setup: &SetupConfig) -> RequirementsChoice {
    if !setup.requirements.trim().is_empty() && root.join(&setup.requirements).exists() {
        RequirementsChoice {
            file: setup.requirements.clone(),
            fallback: false,
        }
    } else {
        RequirementsChoice {
            file: setup.fallback_requirements.clone(),
            fallback: true,
        }
    }
}

pub fn install_command(setup: &SetupConfig, requirements: &str) -> String {
    setup.install.replace("{requirements}", requirements)
}

/// Answers accepted as "yes" at the sample-data prompt.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

struct Sequence<'r, R: StepRunner> {
    runner: &'r mut R,
    steps: Vec<StepRecord>,
}

impl<R: StepRunner> Sequence<'_, R> {
    fn record(&mut self, step: SetupStep, status: StepStatus) {
        let record = StepRecord { step, status };
        self.runner.notify(SetupEvent::StepFinished(record.clone()));
        self.steps.push(record);
    }

    /// Run a captured step. Returns `false` when the sequence must stop.
    fn hard(&mut self, step: SetupStep, command: &str) -> bool {
        self.runner.notify(SetupEvent::StepStarted(step));
        tracing::info!(step = %step, command, "running setup step");
        match self.runner.run(step, command) {
            StepOutcome::Succeeded { .. } => {
                self.record(step, StepStatus::Succeeded);
                true
            }
            StepOutcome::Failed { output } => {
                self.record(step, StepStatus::Failed { message: output });
                false
            }
            StepOutcome::Interrupted => {
                self.record(
                    step,
                    StepStatus::Failed {
                        message: "interrupted".to_string(),
                    },
                );
                false
            }
        }
    }
}

/// Run the full local setup sequence from `root`.
///
/// The marker file check happens before this is called; `config` is the
/// already-loaded `libris.yaml`.
pub fn run_setup<R: StepRunner>(
    root: &Path,
    config: &Config,
    sample_data: SampleData,
    runner: &mut R,
) -> SetupReport {
    let setup = &config.setup;
    let requirements = choose_requirements(root, setup);
    if requirements.fallback {
        runner.notify(SetupEvent::RequirementsFallback {
            missing: setup.requirements.clone(),
            using: requirements.file.clone(),
        });
    }

    let mut seq = Sequence {
        runner,
        steps: Vec::new(),
    };
    let mut provision = None;

    let ok = 'run: {
        let install = install_command(setup, &requirements.file);
        for (step, command) in [
            (SetupStep::Install, install.as_str()),
            (SetupStep::MakeMigrations, setup.make_migrations.as_str()),
            (SetupStep::Migrate, setup.migrate.as_str()),
        ] {
            if !seq.hard(step, command) {
                break 'run false;
            }
        }

        let step = SetupStep::CreateSuperuser;
        seq.runner.notify(SetupEvent::StepStarted(step));
        match seq.runner.run_interactive(step, &setup.create_superuser) {
            StepOutcome::Succeeded { .. } => seq.record(step, StepStatus::Succeeded),
            StepOutcome::Interrupted => {
                tracing::warn!("superuser creation interrupted; skipping");
                seq.record(
                    step,
                    StepStatus::Skipped {
                        reason: format!(
                            "interrupted; create one later with: {}",
                            setup.create_superuser
                        ),
                    },
                );
            }
            StepOutcome::Failed { output } => {
                seq.record(step, StepStatus::Failed { message: output });
                break 'run false;
            }
        }

        let step = SetupStep::ProvisionRoles;
        seq.runner.notify(SetupEvent::StepStarted(step));
        let provisioned =
            RoleStore::open(&config.database_path(root)).and_then(|store| provision_roles(&store));
        match provisioned {
            Ok(report) => {
                seq.runner.notify(SetupEvent::Provisioned(report.clone()));
                provision = Some(report);
                seq.record(step, StepStatus::Succeeded);
            }
            Err(e) => {
                seq.record(
                    step,
                    StepStatus::Failed {
                        message: e.to_string(),
                    },
                );
                break 'run false;
            }
        }

        let step = SetupStep::SampleData;
        let wanted = match sample_data {
            SampleData::Yes => true,
            SampleData::No => false,
            SampleData::Ask => seq.runner.confirm(
                "Would you like to populate the database with sample data?",
            ),
        };
        if !wanted {
            seq.record(
                step,
                StepStatus::Skipped {
                    reason: "declined".to_string(),
                },
            );
            break 'run true;
        }
        seq.runner.notify(SetupEvent::StepStarted(step));
        let outcome = seq.runner.run(step, &setup.sample_data);
        let status = match outcome {
            StepOutcome::Succeeded { .. } => StepStatus::Succeeded,
            StepOutcome::Failed { output } => StepStatus::Failed { message: output },
            StepOutcome::Interrupted => StepStatus::Failed {
                message: "interrupted".to_string(),
            },
        };
        if matches!(status, StepStatus::Failed { .. }) {
            tracing::warn!("sample data population failed; continuing");
        }
        seq.record(step, status);
        true
    };

    SetupReport {
        succeeded: ok,
        requirements,
        steps: seq.steps,
        provision,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
