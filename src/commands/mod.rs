// src/commands/mod.rs
//! Command handlers for the pkgbridge CLI

pub mod progress;

use anyhow::{Result, bail};
use pkgbridge::{Config, MissingPackages, PackageManager, get_package_manager};
use progress::CliProgress;
use std::io::{self, BufRead, Write};
use tracing::info;

async fn detect(config: &Config) -> Result<Box<dyn PackageManager>> {
    let manager = get_package_manager(config).await?;
    info!("Selected backend: {}", manager.name());
    Ok(manager)
}

/// Print the selected backend
pub async fn cmd_detect(config: &Config) -> Result<()> {
    let manager = detect(config).await?;
    println!("{}", manager.name());
    Ok(())
}

/// Refresh repository metadata
pub async fn cmd_refresh(config: &Config, force: bool) -> Result<()> {
    let manager = detect(config).await?;
    let progress = CliProgress::new("Refreshing metadata");
    let _ctrl_c = progress.cancel_on_ctrl_c();

    let success = manager.refresh(force, &progress).await.inspect_err(|_| progress.abandon())?;
    if success {
        progress.finish("Metadata refreshed");
        Ok(())
    } else {
        progress.abandon();
        bail!("refreshing package metadata failed")
    }
}

/// Show which packages are missing
pub async fn cmd_check(config: &Config, packages: &[String], json: bool) -> Result<()> {
    let manager = detect(config).await?;
    let data = check(manager.as_ref(), packages).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print_summary(&data);
    }
    Ok(())
}

/// Check, confirm, then install
pub async fn cmd_install(config: &Config, packages: &[String], yes: bool) -> Result<()> {
    let manager = detect(config).await?;
    let data = check(manager.as_ref(), packages).await?;

    if !data.is_installable() {
        bail!("not available: {}", data.unavailable_names.join(", "));
    }
    if data.is_empty() {
        println!("All requested packages are installed");
        return Ok(());
    }

    print_summary(&data);
    if !yes && !confirm("Install these packages?")? {
        println!("Aborted");
        return Ok(());
    }

    let progress = CliProgress::new("Installing");
    let _ctrl_c = progress.cancel_on_ctrl_c();
    manager
        .install_missing_packages(&data, &progress)
        .await
        .inspect_err(|_| progress.abandon())?;
    progress.finish("Installed");
    Ok(())
}

async fn check(manager: &dyn PackageManager, packages: &[String]) -> Result<MissingPackages> {
    let progress = CliProgress::new("Checking packages");
    let _ctrl_c = progress.cancel_on_ctrl_c();
    let data = manager
        .check_missing_packages(packages, &progress)
        .await
        .inspect_err(|_| progress.abandon())?;
    progress.finish("Checked");
    Ok(data)
}

fn print_summary(data: &MissingPackages) {
    if data.is_empty() && data.unavailable_names.is_empty() {
        println!("All requested packages are installed");
        return;
    }

    print_list("Missing", &data.missing_names);
    print_list("Not available", &data.unavailable_names);
    if let Some(extra) = &data.extra_names {
        print_list("Additional dependencies", extra);
    }
    if let Some(remove) = &data.remove_names {
        print_list("To be removed", remove);
    }
    if let Some(size) = data.download_size {
        println!("Download size: {}", format_size(size));
    }
}

fn print_list(label: &str, names: &[String]) {
    if !names.is_empty() {
        println!("{}: {}", label, names.join(", "));
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
