//! Backend management commands.

use console::style;

use crate::cli::helpers::truncate;
use crate::config::Config;
use crate::models::BackendConfig;

/// Add a backend configuration and persist it.
pub fn cmd_backend_add(
    mut config: Config,
    name: &str,
    endpoint: &str,
    api_key: &str,
    model: &str,
    provider: &str,
) -> anyhow::Result<()> {
    if config.backends.iter().any(|b| b.name == name) {
        anyhow::bail!("a backend named '{}' already exists", name);
    }

    let backend = BackendConfig::new(name, endpoint, api_key, model, provider);
    let id = backend.id.clone();
    config.backends.push(backend);
    let path = config.save()?;

    println!(
        "{} Added backend '{}' ({})",
        style("✓").green(),
        name,
        &id[..8]
    );
    println!("  config: {}", path.display());
    Ok(())
}

/// List configured backends in submission order.
pub fn cmd_backend_list(config: &Config) -> anyhow::Result<()> {
    let backends = config.effective_backends();
    if backends.is_empty() {
        println!("{} No backends configured", style("!").yellow());
        println!("  Add one with: ocrpick backend add --name NAME --endpoint URL");
        return Ok(());
    }

    println!("\n{}", style("Configured Backends").bold());
    println!("{}", "-".repeat(72));
    println!(
        "{:<4} {:<16} {:<28} {:<14} {}",
        "#", "Name", "Endpoint", "Model", "Provider"
    );
    for (index, backend) in backends.iter().enumerate() {
        println!(
            "{:<4} {:<16} {:<28} {:<14} {}",
            index,
            truncate(&backend.name, 15),
            truncate(&backend.endpoint, 27),
            truncate(&backend.model, 13),
            backend.provider
        );
    }
    println!();
    Ok(())
}

/// Remove a backend by id or name and persist the change.
pub fn cmd_backend_remove(mut config: Config, reference: &str) -> anyhow::Result<()> {
    let before = config.backends.len();
    config
        .backends
        .retain(|b| b.id != reference && b.name != reference);

    if config.backends.len() == before {
        anyhow::bail!("no backend matching '{}'", reference);
    }

    config.save()?;
    println!("{} Removed backend '{}'", style("✓").green(), reference);
    Ok(())
}
