// Licensed under the Apache-2.0 license

use anyhow::{Context, Result};
use std::process::Command;

fn cargo(args: &[&str]) -> Result<()> {
    println!("$ cargo {}", args.join(" "));

    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if !status.success() {
        anyhow::bail!("cargo {} failed with {}", args.join(" "), status);
    }
    Ok(())
}

/// Host unit tests of the library crate.
pub fn test() -> Result<()> {
    cargo(&["test", "--package", "powermon-ddk"])
}

/// Clippy over the whole workspace, warnings denied.
pub fn lint() -> Result<()> {
    cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
}

pub fn fmt_check() -> Result<()> {
    cargo(&["fmt", "--all", "--", "--check"])
}

/// Everything a pull request has to pass.
pub fn ci() -> Result<()> {
    fmt_check()?;
    lint()?;
    test()?;
    println!("✅ All checks passed");
    Ok(())
}
