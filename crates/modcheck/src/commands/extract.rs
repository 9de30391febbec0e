use colored::Colorize;
use modcheck_config::RunConfig;
use modcheck_core::extract_identifier;

pub fn handle(
    config: &RunConfig,
    raw: &str,
    delimiter: Option<String>,
    segment: Option<usize>,
) -> bool {
    let delimiter = delimiter.unwrap_or_else(|| config.output.delimiter.clone());
    let segment = segment.unwrap_or(config.output.segment_index);

    match extract_identifier(raw, &delimiter, segment) {
        Ok(identifier) => {
            println!("{}", identifier);
            true
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            false
        }
    }
}
