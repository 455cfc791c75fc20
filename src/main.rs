use anyhow::{Context, Result};
use clap::Parser;
use memlens::analysis::AnalysisResult;
use memlens::cli::{Cli, OutputFormat, SyntheticKind};
use memlens::config::ExaminerConfig;
use memlens::examiner::{Examiner, ExaminerEvent, ScanTarget};
use memlens::output;
use memlens::platform::{self, PlatformAdapter, SyntheticAdapter, SyntheticLayout};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_adapter(args: &Cli) -> Arc<dyn PlatformAdapter> {
    let layout = match args.synthetic {
        None => return platform::native(),
        Some(SyntheticKind::Sequential) => SyntheticLayout::Sequential {
            count: args.count,
            block_size: args.block_size,
        },
        Some(SyntheticKind::Cyclic) => SyntheticLayout::Cyclic {
            count: args.count,
            slots: args.slots,
            block_size: args.block_size,
        },
        Some(SyntheticKind::Random) => SyntheticLayout::Random {
            count: args.count,
            seed: args.seed,
        },
    };
    Arc::new(SyntheticAdapter::new(layout).with_access_count(args.access_count))
}

fn load_config(args: &Cli) -> Result<ExaminerConfig> {
    let mut config = match &args.config {
        Some(path) => ExaminerConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ExaminerConfig::default(),
    };
    if let Some(interval_ms) = args.interval_ms {
        config.scan_interval_ms = interval_ms;
    }
    config.validate()?;
    Ok(config)
}

fn print_result(result: &AnalysisResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", output::render_text(result)),
        OutputFormat::Json => println!("{}", output::render_json(result)?),
    }
    Ok(())
}

/// Run `scans` ticks on the background loop, printing each as it arrives
fn run_loop(examiner: &mut Examiner, scans: u64, format: OutputFormat) -> Result<()> {
    let events = examiner.events();
    examiner.start()?;

    let mut completed = 0;
    let mut failed = 0;
    while completed + failed < scans {
        match events.recv() {
            Ok(ExaminerEvent::Analysis(result)) => {
                print_result(&result, format)?;
                completed += 1;
            }
            Ok(ExaminerEvent::Error(e)) => {
                eprintln!("memlens: scan failed: {}", e);
                failed += 1;
            }
            Ok(ExaminerEvent::MemoryUpdate(_)) => {}
            Err(_) => break,
        }
    }
    examiner.stop();

    if completed == 0 {
        anyhow::bail!("All {} scans failed", failed);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    if args.scans == 0 {
        anyhow::bail!("Invalid value for --scans: 0 (must be >= 1)");
    }
    if args.synthetic.is_some() && args.count == 0 {
        anyhow::bail!("Invalid value for --count: 0 (must be >= 1)");
    }

    init_tracing(args.debug);

    let config = load_config(&args)?;
    let adapter = build_adapter(&args);
    let target = args.pid.map_or(ScanTarget::System, ScanTarget::Process);
    tracing::debug!(adapter = adapter.name(), ?target, "Starting memlens");

    let mut examiner = Examiner::new(adapter, config, target)?;
    if args.scans == 1 {
        let result = examiner.analyze_once()?;
        print_result(&result, args.format)?;
    } else {
        run_loop(&mut examiner, args.scans, args.format)?;
    }

    Ok(())
}
