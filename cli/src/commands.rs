use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use candle_core::Device;
use datasets::{ItemClient, MmapCorpus, id_range, write_items_to_path};
use text_enc::Normalizer;
use titlescore::{build_scorer, prepare_corpus, train_epoch};
use tracing::info;
use trainer::{EpochReport, ProgressRecord, TrainingObserver};

use crate::config::{FetchSettings, TrainSettings, load_settings};
use crate::telemetry::{init_telemetry, write_profile};

/// Prints progress lines to stdout as training runs.
struct ConsoleObserver;

impl TrainingObserver for ConsoleObserver {
    fn on_progress(&mut self, record: &ProgressRecord) {
        println!("{record}");
    }
}

pub fn run_train(config_path: Option<PathBuf>) -> Result<()> {
    let settings = load_settings::<TrainSettings>("train", config_path)?;
    let profiler_guard = init_telemetry(settings.profile_output.is_some());
    info!(?settings.trainer, ?settings.model, "training configuration");

    let corpus = MmapCorpus::open(&settings.dataset)
        .and_then(|mapped| mapped.load())
        .with_context(|| format!("input: failed to load corpus {}", settings.dataset.display()))?;
    let load = corpus.report();

    let normalizer = Normalizer::english();
    let prepared = prepare_corpus(corpus.records(), &normalizer, settings.vocabulary_size)?;
    println!(
        "Starting training - word vector length = {}, data points = {}",
        prepared.vocabulary.len(),
        prepared.samples.len()
    );

    let scorer = build_scorer(
        settings.vocabulary_size,
        settings.model.scorer_config(settings.vocabulary_size),
        &Device::Cpu,
    )?;
    let parameters = scorer.parameter_count();
    let mut console = ConsoleObserver;
    let (_, report) = train_epoch(
        scorer,
        settings.trainer.clone(),
        &prepared,
        Some(&mut console),
    )?;

    let mut lines = vec![
        format!("rows_read = {}", load.rows),
        format!("rows_dropped = {}", load.rows - load.kept()),
        format!("vocabulary = {}", prepared.vocabulary.len()),
        format!("parameters = {parameters}"),
    ];
    lines.extend(render_report(&report));
    let report_text = lines.join("\n");
    println!("Training summary:\n{report_text}");

    if let Some(path) = &settings.report {
        write_text_file(path, &format!("# Training summary\n{report_text}"))?;
        println!("Training report written to {}", path.display());
    }
    if let Some(path) = &settings.vocabulary_output {
        let json = prepared
            .vocabulary
            .to_json()
            .context("failed to serialise vocabulary")?;
        write_text_file(path, &json)?;
        println!("Vocabulary written to {}", path.display());
    }

    if let Some(guard) = profiler_guard {
        if let Some(profile_path) = &settings.profile_output {
            ensure_parent(profile_path)?;
            write_profile(guard, profile_path)?;
            println!("CPU profile written to {}", profile_path.display());
        }
    }

    Ok(())
}

pub fn run_fetch(config_path: Option<PathBuf>) -> Result<()> {
    let settings = load_settings::<FetchSettings>("fetch", config_path)?;
    let _ = init_telemetry(false);
    ensure!(settings.workers > 0, "fetch workers must be at least 1");

    let client = ItemClient::new(
        &settings.base_url,
        Duration::from_secs(settings.timeout_secs),
    )
    .context("failed to build http client")?;
    let max_item = match settings.max_item {
        Some(max_item) => max_item,
        None => client
            .max_item()
            .with_context(|| format!("failed to query max item from {}", client.base_url()))?,
    };
    let ids = id_range(max_item, settings.count);
    info!(start = ids.start, end = ids.end, "fetching id range");

    let (items, report) = client.fetch_range(ids, settings.workers)?;
    write_items_to_path(&settings.output, &items)
        .with_context(|| format!("failed to write {}", settings.output.display()))?;
    println!(
        "Wrote {} items to {} ({} missing, {} failed of {} requested)",
        report.fetched,
        settings.output.display(),
        report.missing,
        report.failed,
        report.requested
    );
    Ok(())
}

fn render_report(report: &EpochReport) -> Vec<String> {
    let mut lines = vec![
        format!("samples = {}", report.samples),
        format!("scored = {}", report.scored),
        format!("empty_sequences = {}", report.empty_sequences),
        format!("non_finite_losses = {}", report.non_finite_losses),
        format!("optimizer_steps = {}", report.optimizer_steps),
        format!("skipped_steps = {}", report.skipped_steps),
        format!("unflushed_samples = {}", report.unflushed_samples),
    ];
    if let Some(mean_loss) = report.mean_loss {
        lines.push(format!("mean_loss = {mean_loss:.6}"));
    }
    if let Some(mae) = report.mean_absolute_error {
        lines.push(format!("mean_absolute_error = {mae:.6}"));
    }
    lines
}

fn write_text_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut body = contents.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}
