use std::process::ExitCode;
use std::time::Duration;

use hidropipeline::config::PipelineConfig;
use hidropipeline::ingest::ana::AnaClient;
use hidropipeline::load::CloudSink;
use hidropipeline::logging::{self, TracingReporter};
use hidropipeline::pipeline::{self, PipelineError, RunSummary};

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    match run() {
        Ok(summary) => {
            println!(
                "\n🏁 Pipeline finished successfully. ({} saved, {} skipped, {} failed)",
                summary.saved(),
                summary.skipped(),
                summary.failed()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\n🔥 Critical Pipeline Failure: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunSummary, PipelineError> {
    let config = PipelineConfig::load()?;
    logging::init(&config.log_level, config.log_file.as_deref()).map_err(|source| PipelineError::LogFile {
        path: config.log_file.clone().unwrap_or_default(),
        source,
    })?;

    // Refuse to start a hybrid run without a credential, before any download.
    config.check_credentials()?;

    let reporter = TracingReporter;
    let source = AnaClient::new(
        &config.ana_base_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let cloud = CloudSink::from_config(&config, &reporter);

    if cloud.is_enabled() {
        println!("\n--- 🌎 STARTING HYBRID PIPELINE (LOCAL + AZURE) ---");
    } else {
        println!("\n--- 💾 STARTING LOCAL PIPELINE (NO CLOUD SINK) ---");
    }

    pipeline::run(&config, &source, cloud, &reporter)
}
