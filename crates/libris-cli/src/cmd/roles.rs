use crate::output::{self, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use libris_core::{
    config::Config,
    provision::{provision_roles, ProvisionReport},
    role::Role,
    store::RoleStore,
};
use std::path::Path;

#[derive(Subcommand)]
pub enum RolesSubcommand {
    /// List every role in the role store
    List,
}

pub fn run(root: &Path, subcmd: RolesSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        RolesSubcommand::List => list(root, json),
    }
}

fn open_store(root: &Path) -> anyhow::Result<RoleStore> {
    let config = Config::load(root).context("failed to load config")?;
    let path = config.database_path(root);
    RoleStore::open(&path).with_context(|| format!("failed to open role store {}", path.display()))
}

/// `libris setup-roles` — create any missing required role.
pub fn setup_roles(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;

    if json {
        let report = provision_roles(&store).context("failed to provision roles")?;
        return print_json(&report);
    }

    println!("Setting up user roles...");
    let report = provision_roles(&store).context("failed to provision roles")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ProvisionReport) {
    for status in &report.roles {
        if status.created {
            output::success(&format!("Created role: {}", status.role));
        } else {
            output::info(&format!("Role already exists: {}", status.role));
        }
    }

    println!();
    if report.created_count > 0 {
        println!(
            "🎉 Successfully created {} new role(s)",
            report.created_count
        );
    } else {
        output::success("All required roles already exist");
    }

    println!("\n📝 Available roles:");
    for role in Role::all() {
        println!("- {role}: {}", role.description());
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let records = store.list().context("failed to list roles")?;

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No roles stored. Run: libris setup-roles");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                if Role::is_required(&r.name) { "yes" } else { "no" }.to_string(),
                r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "REQUIRED", "CREATED"], rows);
    Ok(())
}
