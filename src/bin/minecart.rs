use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use minecart::{
    classify, read_manifest, run_pipeline, BuildOptions, HostRunner, ReleaseId, Settings,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE_HINT: &str = "pass package manifest as argument: minecart <MANIFEST>";

/// Build a versioned native package from an application manifest
#[derive(Parser)]
#[command(name = "minecart")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON package manifest
    manifest: PathBuf,

    /// TOML file overriding build host tool settings
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory the package is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Use this release id (YYYYMMDDHHMMSS) instead of the current time
    #[arg(long)]
    release_id: Option<String>,

    /// Keep the scratch working directory after the run
    #[arg(long)]
    keep_workdir: bool,

    /// Do not install build packages or fpm
    #[arg(long)]
    skip_provision: bool,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let failure = classify(&err);
            let stage = failure.map_or("build", |f| f.stage());
            eprintln!("Failed [{stage}]: {err:#}");
            if matches!(failure, Some(minecart::Failure::Usage(_))) {
                eprintln!("{USAGE_HINT}");
            }
            let code = failure.map_or(1, |f| f.exit_code());
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let manifest = read_manifest(&cli.manifest)?;

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let release = match &cli.release_id {
        Some(raw) => ReleaseId::parse(raw)?,
        None => ReleaseId::now()?,
    };

    std::fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!("creating output directory '{}'", cli.output_dir.display())
    })?;

    let log_path = PathBuf::from(release.log_file_name());
    let mut runner = HostRunner::create(&log_path)?;
    info!("writing log to {}", log_path.display());

    let options = BuildOptions {
        output_dir: cli.output_dir.clone(),
        keep_workdir: cli.keep_workdir,
        skip_provision: cli.skip_provision,
    };
    let outcome = run_pipeline(&mut runner, &settings, &manifest, &release, &options)
        .with_context(|| format!("building {} release {}", manifest.name, release))?;

    println!("{}", outcome.artifact.display());
    Ok(())
}
