use crate::wiring;
use colored::Colorize;
use modcheck_config::RunConfig;
use modcheck_core::is_provider_legal;

/// Print `count` names; fails if the configured affixes produce names the
/// provider would reject
pub fn handle(config: &RunConfig, count: usize) -> bool {
    let generator = wiring::name_generator(config);
    let mut legal = true;

    for _ in 0..count {
        let identity = generator.generate();
        println!("{}", identity);
        if !is_provider_legal(identity.name()) {
            legal = false;
        }
    }

    if !legal {
        eprintln!(
            "{} prefix '{}' / suffix '{}' produce names the provider rejects",
            "Warning:".yellow().bold(),
            config.naming.prefix,
            config.naming.suffix
        );
    }
    legal
}
