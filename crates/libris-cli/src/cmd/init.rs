use anyhow::Context;
use libris_core::{config::Config, io, paths};
use std::path::Path;

/// `libris init` — create `libris.yaml` and the `.libris/` data directory.
///
/// Idempotent: an existing config is left untouched.
pub fn run(root: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let project_name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "library".to_string())
    });

    println!("Initializing libris in: {}", root.display());

    let data_dir = paths::data_dir(root);
    io::ensure_dir(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::new(&project_name)
            .save(root)
            .with_context(|| format!("failed to write {}", paths::CONFIG_FILE))?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    // The role store is local state; keep it out of version control.
    let ignore = data_dir.join(".gitignore");
    if io::write_if_missing(&ignore, b"*\n")? {
        println!("  created: {}/.gitignore", paths::DATA_DIR);
    }

    Ok(())
}
