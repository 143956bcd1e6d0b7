//! Profile listing command

use colored::Colorize;
use rotator_core::error::RotatorError;
use std::path::Path;

use super::load_config;

/// List the configured profiles and whether their files exist
pub fn run_profiles(config_path: Option<&Path>) -> Result<(), RotatorError> {
    let config = load_config(config_path)?;
    let profiles = config.rotation.profile_list();

    if profiles.is_empty() {
        println!("{} No profiles configured", "⚠".yellow());
        return Ok(());
    }

    println!(
        "Rotation order ({} profiles, {}s dwell, {}s settle):",
        profiles.len(),
        config.rotation.dwell_secs,
        config.rotation.settle_secs
    );

    for (index, profile) in profiles.iter().enumerate() {
        let marker = if profile.config_path().is_file() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {:>2}. {} {} ({})",
            index + 1,
            marker,
            profile.name(),
            profile.config_path().display()
        );
    }

    Ok(())
}
