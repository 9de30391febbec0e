//! Turns a `RunConfig` into the library types a run is built from

use modcheck_config::{ConfigError, RunConfig};
use modcheck_core::{
    NameGenerator, OutputContract, RetryConfig, RunIdentity, RunTemplate, VerificationPolicy,
};
use modcheck_terraform::{RetryableErrors, Terraform};

pub fn name_generator(config: &RunConfig) -> NameGenerator {
    NameGenerator::new(&config.naming.prefix, &config.naming.suffix)
        .with_token_len(config.naming.token_length)
}

pub fn identity_for_token(config: &RunConfig, token: &str) -> RunIdentity {
    RunIdentity::new(&config.naming.prefix, token, &config.naming.suffix)
}

pub fn run_template(config: &RunConfig) -> RunTemplate {
    let mut template = RunTemplate::new(&config.module_dir, &config.region);
    template.region_env_var = config.region_env_var.clone();
    template.vars = config.vars.clone();
    template.env = config.env.clone();
    template
}

pub fn output_contract(config: &RunConfig) -> OutputContract {
    OutputContract::new(
        &config.output.key,
        &config.output.delimiter,
        config.output.segment_index,
    )
}

pub fn retry_config(config: &RunConfig) -> RetryConfig {
    RetryConfig {
        max_attempts: config.retry.max_attempts,
        initial_delay: config.retry.initial_delay(),
        max_delay: config.retry.max_delay(),
        backoff_multiplier: config.retry.backoff_multiplier,
    }
}

/// Built-in catalogue plus the configured extra patterns
pub fn retryable_errors(config: &RunConfig) -> Result<RetryableErrors, ConfigError> {
    config
        .retry
        .extra_patterns
        .iter()
        .try_fold(RetryableErrors::defaults(), |errors, extra| {
            errors
                .with_pattern(&extra.pattern, &extra.reason)
                .map_err(|e| {
                    ConfigError::Invalid(format!("retry pattern '{}': {}", extra.pattern, e))
                })
        })
}

pub fn terraform(config: &RunConfig) -> Terraform {
    Terraform::new(&config.terraform.binary)
        .with_timeout(config.terraform.timeout())
        .with_interrupt_grace(config.terraform.interrupt_grace())
}

pub fn verification_policy(config: &RunConfig) -> VerificationPolicy {
    VerificationPolicy {
        not_found_codes: config.verification.not_found_codes.clone(),
        transient_codes: config.verification.transient_codes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcheck_config::RetryPattern;
    use modcheck_core::RetryClassifier;
    use modcheck_core::ProvisionError;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_defaults_line_up_with_library_defaults() {
        let config = RunConfig::default();
        assert_eq!(retry_config(&config), RetryConfig::default());
        assert_eq!(output_contract(&config), OutputContract::default());
        assert_eq!(verification_policy(&config), VerificationPolicy::default());

        let terraform = terraform(&config);
        assert_eq!(
            terraform.interrupt_grace(),
            modcheck_terraform::DEFAULT_INTERRUPT_GRACE
        );

        let generator = name_generator(&config);
        assert_eq!(generator.prefix(), modcheck_core::naming::DEFAULT_PREFIX);
        assert_eq!(generator.suffix(), modcheck_core::naming::DEFAULT_SUFFIX);
    }

    #[test]
    fn test_run_template() {
        let mut config = RunConfig::default();
        config.module_dir = PathBuf::from("./modules/ecr");
        config.region = "eu-west-1".to_string();
        config
            .vars
            .insert("scan_on_push".to_string(), serde_json::json!(true));

        let template = run_template(&config);
        assert_eq!(template.module_dir, PathBuf::from("./modules/ecr"));
        assert_eq!(template.region, "eu-west-1");
        assert_eq!(template.region_env_var, "AWS_DEFAULT_REGION");
        assert_eq!(template.vars["scan_on_push"], serde_json::json!(true));
    }

    #[test]
    fn test_identity_for_token() {
        let identity = identity_for_token(&RunConfig::default(), "AbC123");
        assert_eq!(identity.name(), "cs-pmod-abc123-testing");
    }

    #[test]
    fn test_extra_retry_patterns() {
        let mut config = RunConfig::default();
        config.retry.extra_patterns.push(RetryPattern {
            pattern: "RepositoryAlreadyExistsException".to_string(),
            reason: "eventual consistency".to_string(),
        });

        let errors = retryable_errors(&config).unwrap();
        assert!(errors.is_retryable(&ProvisionError::CommandFailed {
            command: "terraform apply".to_string(),
            status: Some(1),
            stderr: "RepositoryAlreadyExistsException".to_string(),
            stdout: String::new(),
        }));

        config.retry.extra_patterns[0].pattern = "(".to_string();
        assert!(matches!(
            retryable_errors(&config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_terraform_settings() {
        let mut config = RunConfig::default();
        config.terraform.binary = "/opt/terraform/bin/terraform".to_string();
        config.terraform.timeout_secs = 90;
        config.terraform.interrupt_grace_secs = 15;

        let terraform = terraform(&config);
        assert_eq!(terraform.binary(), "/opt/terraform/bin/terraform");
        assert_eq!(config.terraform.timeout(), Duration::from_secs(90));
        assert_eq!(terraform.interrupt_grace(), Duration::from_secs(15));
    }
}
