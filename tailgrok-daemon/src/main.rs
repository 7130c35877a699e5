use anyhow::Result;
use clap::Parser;

use tailgrok_core::config::TailgrokConfig;
use tailgrok_daemon::cli::DaemonCli;
use tailgrok_daemon::logging::init_tracing;
use tailgrok_daemon::orchestrator::Orchestrator;
use tailgrok_log_pipeline::{FieldExtractor, PatternLibrary, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = TailgrokConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;

    // CLI flags win over file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }

    init_tracing(&config.general)?;

    if cli.validate {
        return validate(&config).await;
    }

    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "tailgrok-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await
}

/// Checks the configuration and the record mapping without starting anything.
async fn validate(config: &TailgrokConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    let pipeline_config = PipelineConfig::from_core(&config.source);
    pipeline_config.validate()?;
    pipeline_config.validate_paths()?;

    let library = PatternLibrary::load(&pipeline_config.pattern_directory).await?;
    let extractor = FieldExtractor::from_definition(&pipeline_config.file_record_mapping, &library)?;

    tracing::info!(
        patterns = library.len(),
        fields = ?extractor.pattern().field_names(),
        "configuration is valid"
    );
    Ok(())
}
