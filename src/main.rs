use clap::{Parser, Subcommand};
use profile_alignment::config::{load_config_or_default, Config};
use profile_alignment::logging::{init_logging, MetricsCollector};
use profile_alignment::transport::{request_alignment, ExchangeServer, WireEncoding};
use profile_alignment::visualization::{print_comparison_table, print_results};
use profile_alignment::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "align")]
#[command(about = "Flange/Tread laser profile alignment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Align a flange scan onto a tread scan
    Align {
        /// CSV file with the flange points
        #[arg(short, long)]
        flange: PathBuf,

        /// CSV file with the tread points
        #[arg(short, long)]
        tread: PathBuf,

        /// Apply the line-based coarse rotation before ICP
        #[arg(long)]
        coarse: bool,

        /// Directory for the aligned CSV files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON file for the alignment summary
        #[arg(short, long)]
        json: Option<PathBuf>,
    },

    /// Run the exchange server
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(short, long)]
        bind: Option<String>,

        /// JSON file for the per-exchange measurements, written on shutdown
        #[arg(short, long)]
        metrics: Option<PathBuf>,
    },

    /// Send a flange/tread pair to a running server
    Send {
        #[arg(short, long)]
        flange: PathBuf,

        #[arg(short, long)]
        tread: PathBuf,

        #[arg(short, long, default_value = "127.0.0.1:5555")]
        address: String,

        /// structured or binary (defaults to the configured encoding)
        #[arg(short, long)]
        encoding: Option<WireEncoding>,

        /// Seconds to wait for the reply
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Directory for the returned CSV files
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a synthetic flange/tread pair with a known motion
    Simulate {
        /// Rotation applied to the flange, degrees
        #[arg(short, long, default_value = "0.5", allow_hyphen_values = true)]
        rotation: f64,

        #[arg(long, default_value = "0.3", allow_hyphen_values = true)]
        tx: f64,

        #[arg(long, default_value = "-0.2", allow_hyphen_values = true)]
        ty: f64,

        /// Gaussian noise standard deviation
        #[arg(short, long, default_value = "0.0")]
        noise: f64,

        #[arg(short, long, default_value = "42")]
        seed: u64,

        #[arg(short, long, default_value = "results/simulated")]
        output: PathBuf,
    },

    /// Run synthetic alignment benchmarks
    Benchmark {
        /// Number of synthetic cases
        #[arg(short = 'n', long, default_value = "20")]
        cases: usize,

        /// Largest absolute rotation, degrees
        #[arg(long, default_value = "0.5")]
        max_rotation: f64,

        /// Largest absolute translation per axis
        #[arg(long, default_value = "0.5")]
        max_translation: f64,

        #[arg(long, default_value = "0.0")]
        noise: f64,

        /// Output file for benchmark results
        #[arg(short, long, default_value = "results/benchmark.json")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config_or_default(cli.config.as_deref());
    config.logging = config.logging.clone().with_verbosity(cli.verbose);

    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Align { flange, tread, coarse, output, json } => {
            handle_align(&config, flange, tread, coarse, output, json)?;
        }
        Commands::Serve { bind, metrics } => {
            handle_serve(config, bind, metrics)?;
        }
        Commands::Send { flange, tread, address, encoding, timeout, output } => {
            let encoding = encoding.unwrap_or(config.transport.encoding);
            handle_send(flange, tread, address, encoding, timeout, output)?;
        }
        Commands::Simulate { rotation, tx, ty, noise, seed, output } => {
            handle_simulate(rotation, tx, ty, noise, seed, output)?;
        }
        Commands::Benchmark { cases, max_rotation, max_translation, noise, output } => {
            handle_benchmark(&config, cases, max_rotation, max_translation, noise, output)?;
        }
    }

    Ok(())
}

fn write_scans(dir: &Path, flange: &PointSet, tread: &PointSet) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    save_points(dir.join("flange_aligned.csv"), flange)?;
    save_points(dir.join("tread.csv"), tread)?;
    println!("Aligned scans saved to {}", dir.display());
    Ok(())
}

fn handle_align(
    config: &Config,
    flange_path: PathBuf,
    tread_path: PathBuf,
    coarse: bool,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Loading scans...");
    let flange = load_points(&flange_path)?;
    let tread = load_points(&tread_path)?;
    println!("Flange: {} points, Tread: {} points", flange.len(), tread.len());

    validate_point_set(&flange, 2)?;
    validate_point_set(&tread, 2)?;

    let mut coarse_config = config.coarse_rotation.clone();
    coarse_config.enabled |= coarse;
    let service = AlignmentService::from_parts(config.icp.clone(), coarse_config, config.ransac.clone());

    println!("Running alignment...");
    let result = service.do_alignment(&flange, &tread);
    print_results(&result);

    if let Some(dir) = output {
        write_scans(&dir, &result.aligned_source, &result.target)?;
    }

    if let Some(json_path) = json {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(json_path, json)?;
        println!("Results saved to file.");
    }

    Ok(())
}

fn handle_serve(config: Config, bind: Option<String>, metrics_path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut transport = config.transport.clone();
    if let Some(address) = bind {
        transport.bind_address = address;
    }

    let service = Arc::new(AlignmentService::new(&config));
    let metrics = Arc::new(MetricsCollector::default());
    let server = Arc::new(ExchangeServer::new(service, transport).with_metrics(metrics.clone()));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener = server.bind().await?;
        server
            .serve_until(listener, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
            })
            .await?;

        if let Some(summary) = metrics.alignment_metrics() {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        if let Some(path) = metrics_path {
            std::fs::write(&path, metrics.export_to_json()?)?;
            println!("Measurements written to {}", path.display());
        }
        Ok::<(), anyhow::Error>(())
    })
}

fn handle_send(
    flange_path: PathBuf,
    tread_path: PathBuf,
    address: String,
    encoding: WireEncoding,
    timeout: u64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let flange = LabeledScan::new(ScanLabel::Flange.as_str(), load_points(&flange_path)?);
    let tread = LabeledScan::new(ScanLabel::Tread.as_str(), load_points(&tread_path)?);

    println!("Sending {} + {} points to {} ({})...", flange.points.len(), tread.points.len(), address, encoding);

    let runtime = tokio::runtime::Runtime::new()?;
    let (aligned, tread) = runtime.block_on(request_alignment(
        &address,
        &flange,
        &tread,
        encoding,
        Duration::from_secs(timeout),
    ))?;

    println!("Received {} ({} points) and {} ({} points)", aligned.label, aligned.points.len(), tread.label, tread.points.len());

    if let Some(dir) = output {
        write_scans(&dir, &aligned.points, &tread.points)?;
    }

    Ok(())
}

fn handle_simulate(rotation: f64, tx: f64, ty: f64, noise: f64, seed: u64, output: PathBuf) -> anyhow::Result<()> {
    let truth = Transform2D::from_degrees(rotation, tx, ty);
    let profile = SyntheticProfileConfig::default().with_noise(noise).with_seed(seed);
    let (flange, tread) = ProfileGenerator::new(profile)?.scan_pair(&truth)?;

    std::fs::create_dir_all(&output)?;
    save_points(output.join("flange.csv"), &flange.points)?;
    save_points(output.join("tread.csv"), &tread.points)?;
    std::fs::write(output.join("truth.json"), serde_json::to_string_pretty(&truth)?)?;

    println!("Simulated pair written to {} ({} points each)", output.display(), tread.points.len());
    Ok(())
}

fn handle_benchmark(
    config: &Config,
    cases: usize,
    max_rotation: f64,
    max_translation: f64,
    noise: f64,
    output: PathBuf,
) -> anyhow::Result<()> {
    let mut runner = BenchmarkRunner::new(AlignmentService::new(config));
    let profile = SyntheticProfileConfig::default().with_noise(noise);
    runner.add_synthetic_cases(cases, &profile, max_rotation, max_translation)?;

    println!("Running {} benchmark cases...", cases);
    let results = runner.run_benchmark();
    print_comparison_table(&results);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, serde_json::to_string_pretty(&results)?)?;
    println!("Benchmark results saved to {}", output.display());

    Ok(())
}
