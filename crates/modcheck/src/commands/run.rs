use crate::RunArgs;
use crate::wiring;
use colored::Colorize;
use modcheck_cloud_aws::{AwsClientConfig, EcrDescriber};
use modcheck_config::RunConfig;
use modcheck_core::{LifecycleController, ProvisioningClient, RunReport, VerificationClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn handle(mut config: RunConfig, args: RunArgs) -> anyhow::Result<bool> {
    // Flags win over file and environment
    if let Some(module_dir) = args.module_dir {
        config.module_dir = module_dir;
    }
    if let Some(region) = args.region {
        config.region = region;
    }
    if let Some(profile) = args.profile {
        config.aws.profile = Some(profile);
    }
    config.validate()?;

    let provisioning = ProvisioningClient::new(Arc::new(wiring::terraform(&config))).with_retry(
        wiring::retry_config(&config),
        Arc::new(wiring::retryable_errors(&config)?),
    );

    let mut aws = AwsClientConfig::new(&config.region)
        .with_operation_timeout(config.aws.operation_timeout());
    if let Some(profile) = &config.aws.profile {
        aws = aws.with_profile(profile);
    }
    let describer = EcrDescriber::connect(&aws).await;
    let verification = VerificationClient::new(Arc::new(describer))
        .with_policy(wiring::verification_policy(&config));

    let controller = LifecycleController::new(
        wiring::run_template(&config),
        provisioning,
        verification,
    )
    .with_naming(wiring::name_generator(&config))
    .with_output_contract(wiring::output_contract(&config));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{}",
                "Interrupted, letting terraform stop before tearing down...".yellow()
            );
            on_interrupt.cancel();
        }
    });

    if !args.json {
        println!(
            "{} {} in {}",
            "Provisioning".blue(),
            config.module_dir.display().to_string().cyan(),
            config.region.cyan()
        );
    }

    let report = match &args.token {
        Some(token) => {
            let identity = wiring::identity_for_token(&config, token);
            controller.run_as(identity, &cancel).await
        }
        None => controller.run_until_cancelled(&cancel).await,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }

    Ok(report.passed())
}

fn print_report(report: &RunReport) {
    let path: Vec<String> = report.history.iter().map(|s| s.to_string()).collect();
    println!("  states: {}", path.join(" → ").dimmed());
    if let Some(identifier) = &report.identifier {
        println!("  identifier: {}", identifier.cyan());
    }
    for record in &report.records {
        println!(
            "  found: {} {}",
            record.name.cyan(),
            record.arn.as_deref().unwrap_or_default().dimmed()
        );
    }

    println!();
    if report.passed() {
        println!(
            "{} {} ({} ms)",
            "✓ PASS".green().bold(),
            report.run_name,
            report.duration_ms()
        );
        return;
    }

    println!(
        "{} {} ({} ms)",
        "✗ FAIL".red().bold(),
        report.run_name,
        report.duration_ms()
    );
    for cause in report.causes() {
        println!("  - {}", cause.red());
    }
    if report.teardown_error.is_some() {
        println!(
            "{}",
            format!(
                "  resources named {} may still exist; destroy them by hand",
                report.run_name
            )
            .yellow()
        );
    }
}

fn report_json(report: &RunReport) -> serde_json::Value {
    serde_json::json!({
        "name": report.run_name,
        "passed": report.passed(),
        "state": report.state(),
        "history": report.history,
        "identifier": report.identifier,
        "records": report.records,
        "failure": report.failure.as_ref().map(|e| serde_json::json!({
            "kind": e.kind(),
            "message": e.to_string(),
        })),
        "teardown_error": report.teardown_error.as_ref().map(|e| serde_json::json!({
            "kind": e.kind(),
            "message": e.to_string(),
        })),
        "started_at": report.started_at.to_rfc3339(),
        "finished_at": report.finished_at.to_rfc3339(),
        "duration_ms": report.duration_ms(),
    })
}
