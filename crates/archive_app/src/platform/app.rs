use std::sync::Arc;

use anyhow::Context;
use archive_engine::{
    ensure_output_dir, FetchClient, HarvestDriver, HarvestPipeline, OutputLayout, ProgressStore,
};
use archive_logging::{harvest_info, harvest_warn};
use clap::Parser;

use super::cli::Cli;
use super::config::HarvestConfig;
use super::logging;
use super::manifest::ManifestJobSource;

pub fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log.into());

    let mut config = match cli.config.as_deref() {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    if let Some(output) = cli.output {
        config.output_dir = output;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }

    let source = ManifestJobSource::load(&cli.manifest)?;
    harvest_info!(
        "Loaded {} issues from {}",
        source.len(),
        cli.manifest.display()
    );

    ensure_output_dir(&config.output_dir).with_context(|| {
        format!("preparing output directory {}", config.output_dir.display())
    })?;
    let layout = OutputLayout::new(&config.output_dir);
    let store = ProgressStore::open(layout.progress_file())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let _runtime_guard = runtime.enter();

    let client = FetchClient::new(config.fetch_settings()).context("building HTTP client")?;
    let pipeline = HarvestPipeline::new(Arc::new(client), config.pipeline_settings());
    let mut driver = HarvestDriver::new(pipeline, layout, store);

    let summary = runtime.block_on(driver.run(&source));

    if summary.failed > 0 {
        harvest_warn!(
            "{} of {} issues produced no content",
            summary.failed,
            summary.issues
        );
    }
    harvest_info!(
        "Progress recorded in {}",
        driver.store().path().display()
    );
    Ok(())
}
