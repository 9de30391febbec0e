use colored::Colorize;
use modcheck_config::RunConfig;
use std::path::Path;

pub fn handle(config: &RunConfig, source: Option<&Path>) -> anyhow::Result<bool> {
    match source {
        Some(path) => eprintln!("{} {}", "Config:".bold(), path.display().to_string().cyan()),
        None => eprintln!("{} {}", "Config:".bold(), "(defaults)".dimmed()),
    }
    print!("{}", serde_yaml::to_string(config)?);
    Ok(true)
}
