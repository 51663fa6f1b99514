use crate::interrupt::Interrupts;
use crate::output::{self, print_json};
use crate::runner::ShellRunner;
use anyhow::Context;
use clap::ValueEnum;
use libris_core::{
    config::Config,
    paths,
    role::Role,
    setup::{run_setup, SampleData},
};
use std::path::Path;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SampleDataArg {
    /// Prompt on the terminal
    Ask,
    /// Populate without asking
    Yes,
    /// Skip without asking
    No,
}

impl From<SampleDataArg> for SampleData {
    fn from(arg: SampleDataArg) -> Self {
        match arg {
            SampleDataArg::Ask => SampleData::Ask,
            SampleDataArg::Yes => SampleData::Yes,
            SampleDataArg::No => SampleData::No,
        }
    }
}

/// `libris setup` — bootstrap a local development environment.
pub fn run(root: &Path, sample_data: SampleData, json: bool) -> anyhow::Result<()> {
    if !json {
        println!("🚀 Starting local development setup");
        output::rule();
    }

    if !paths::config_path(root).exists() {
        output::failure(&format!(
            "Error: {} not found. Please run this from the project root directory.",
            paths::CONFIG_FILE
        ));
        anyhow::bail!("no {} in {}", paths::CONFIG_FILE, root.display());
    }

    let config = Config::load(root).context("failed to load config")?;
    let interrupts = Interrupts::install()?;
    let mut runner = ShellRunner::new(root, config.setup.timeout_seconds)
        .with_interrupts(interrupts)
        .quiet(json);

    let report = run_setup(root, &config, sample_data, &mut runner);
    tracing::info!(succeeded = report.succeeded, "setup finished");

    if json {
        print_json(&report)?;
    } else if report.succeeded {
        print_next_steps(&config.setup.run_server, &config.server.url);
    } else {
        println!();
        output::failure("Setup failed. Please check the errors above and try again.");
    }

    if !report.succeeded {
        anyhow::bail!("setup failed");
    }
    Ok(())
}

fn print_next_steps(run_server: &str, url: &str) {
    let url = url.trim_end_matches('/');
    println!();
    output::rule();
    println!("🎉 Setup completed successfully!");
    println!("\n📝 Next steps:");
    println!("1. Start the development server: {run_server}");
    println!("2. Open your browser and go to: {url}");
    println!("3. Access admin panel at: {url}/admin");
    println!("4. Register new users at: {url}/accounts/register");
    println!("\n🔧 Available user roles:");
    for role in Role::all() {
        println!("- {role}: {}", role.description());
    }
    println!("\n📧 Email notifications will be displayed in the console during development");
}
