use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use seqperf::{class_report, dataset, ConfusionMatrix};
use tracing_subscriber::EnvFilter;

/// Accumulate padded prediction/label batches and report classification metrics
#[derive(Parser, Debug)]
#[command(name = "seqperf", version)]
struct Cli {
    /// Batches to evaluate (.json or .parquet)
    input: PathBuf,

    /// Sentinel value marking padding positions
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pad: i64,

    /// Sequences per batch when reading parquet
    #[arg(long, default_value_t = 32, value_parser = clap::value_parser!(u32).range(1..))]
    batch_size: u32,

    /// Start from a previously saved confusion matrix
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Save the accumulated confusion matrix as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print the dense confusion matrix
    #[arg(long)]
    matrix: bool,

    /// Print the per-label report
    #[arg(long)]
    report: bool,

    /// Print the summary metrics as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// `RUST_LOG` when set, `warn` otherwise; `-v` adds debug output for this crate.
fn log_filter(env: Option<&str>, verbose: bool) -> Result<EnvFilter> {
    let mut filter = match env {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::new("warn"),
    };
    if verbose {
        filter = filter.add_directive("seqperf=debug".parse()?);
    }
    Ok(filter)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env.as_deref(), cli.verbose)?)
        .init();

    let mut cm = match &cli.resume {
        Some(path) => {
            let mut file =
                File::open(path).with_context(|| format!("opening {}", path.display()))?;
            ConfusionMatrix::load_from_file(&mut file)?
        }
        None => ConfusionMatrix::new(),
    };

    let batches = dataset::load_path(&cli.input, cli.pad, cli.batch_size as usize)
        .with_context(|| format!("loading {}", cli.input.display()))?;
    for (idx, batch) in batches.iter().enumerate() {
        cm.update_batch(batch)
            .with_context(|| format!("batch {idx} of {}", cli.input.display()))?;
    }
    tracing::info!(batches = batches.len(), observations = cm.total(), "evaluation finished");

    if let Some(path) = &cli.save {
        let mut file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        cm.save_to_file(&mut file)?;
    }

    if cli.matrix {
        print!("{cm}");
    }
    if cli.report {
        print!("{}", class_report(&cm));
    }

    let metrics = cm.performance_metrics();
    if cli.json {
        println!("{}", serde_json::to_string(&metrics)?);
    } else {
        println!("{metrics}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_log_filter_defaults_to_warn() {
        let filter = log_filter(None, false).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_log_filter_honours_env_without_verbose() {
        let filter = log_filter(Some("debug"), false).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = log_filter(Some("error"), false).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_log_filter_verbose_enables_debug() {
        let filter = log_filter(None, true).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_log_filter_rejects_bad_directives() {
        assert!(log_filter(Some("seqperf=loud"), false).is_err());
    }
}
