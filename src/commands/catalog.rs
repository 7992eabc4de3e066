use anyhow::{Context, Result};

use paperboy::config::Config;
use paperboy::storage::IssueCatalog;

/// Print the most recent archived issues
pub fn issues(config: &Config, newspaper: Option<&str>, limit: usize) -> Result<()> {
    let path = &config.storage.catalog_path;
    if !path.exists() {
        println!("No catalog at {}", path.display());
        return Ok(());
    }

    let catalog = IssueCatalog::open(path)
        .with_context(|| format!("Failed to open catalog {}", path.display()))?;
    let issues = catalog.issues(newspaper, Some(limit))?;

    if issues.is_empty() {
        println!("No archived issue");
        return Ok(());
    }

    println!("{:<12} {:<24} {:<40} File", "Date", "Newspaper", "Title");
    for issue in issues {
        println!(
            "{:<12} {:<24} {:<40} {}",
            issue.date.to_string(),
            issue.newspaper,
            issue.title,
            issue.path
        );
    }

    Ok(())
}
