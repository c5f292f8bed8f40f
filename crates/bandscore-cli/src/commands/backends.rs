//! The `bandscore backends` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use bandscore_providers::config::{load_config_from, BackendConfig};

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut table = Table::new();
    table.set_header(vec!["", "Backend", "Type", "Model"]);

    for name in config.backend_names() {
        let backend = config
            .backends
            .get(&name)
            .cloned()
            .unwrap_or(BackendConfig::Recorded);
        let active = if name == config.grammar_backend { "*" } else { "" };
        table.add_row(vec![
            Cell::new(active),
            Cell::new(&name),
            Cell::new(backend.kind()),
            Cell::new(backend.model().unwrap_or("-")),
        ]);
    }

    println!("{table}");

    if !config.backend_names().contains(&config.grammar_backend) {
        println!(
            "\nActive backend '{}' is not configured. Add it under [backends] in bandscore.toml.",
            config.grammar_backend
        );
    }
    if config.backends.is_empty() {
        println!("\nOnly recorded corrections are available. Run `bandscore init` to create a config file.");
    }

    Ok(())
}
