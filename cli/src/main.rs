use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use image_suite::cli::{Cli, Command};
use image_suite::io::{collect_files, read_items, write_outcome};
use image_suite::report::print_summary;
use image_suite_core::removal::{MemoizedRemover, RembgClient};
use image_suite_core::{BatchRunner, ConversionRequest, ItemStatus, PipelineConfig, Tool};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match &cli.command {
        Command::Convert {
            input,
            output,
            to,
            recursive,
        } => {
            let runner = BatchRunner::new(PipelineConfig::default());
            let request = ConversionRequest::convert(*to);
            run_batch(&runner, Tool::Converter, &request, input, output, *recursive)
        }
        Command::RemoveBg {
            input,
            output,
            endpoint,
            timeout,
            recursive,
        } => {
            let client = RembgClient::new(endpoint, Duration::from_secs(*timeout))
                .context("Failed to set up rembg client")?;
            let runner = BatchRunner::new(PipelineConfig::default())
                .with_remover(Arc::new(MemoizedRemover::new(client)));
            let request = ConversionRequest::remove_background();
            run_batch(&runner, Tool::BackgroundRemover, &request, input, output, *recursive)
        }
    }
}

fn run_batch(
    runner: &BatchRunner,
    tool: Tool,
    request: &ConversionRequest,
    input: &Path,
    output: &Path,
    recursive: bool,
) -> Result<()> {
    let files = collect_files(input, recursive, tool).context("Failed to collect input files")?;

    if files.is_empty() {
        println!("No supported files found.");
        return Ok(());
    }

    let items = read_items(&files).context("Failed to read input files")?;
    println!("Processing {} file(s) → {}...", items.len(), request.target_format);

    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );

    let outcome = runner.run_with(items, request, |result| {
        let msg = match result.status {
            ItemStatus::Converted => format!("{} → {}", result.source_name, result.output_name),
            status => format!("{} ({})", result.source_name, status),
        };
        pb.set_message(msg);
        pb.inc(1);
    });

    pb.finish_with_message("Done!");
    print_summary(&outcome);

    if let Some(path) = write_outcome(&outcome, output).context("Failed to write output")? {
        println!("Saved {}", path.display());
    }

    Ok(())
}
