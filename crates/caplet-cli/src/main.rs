//! Caplet CLI - Command-line interface for the signed package host

use anyhow::Context;
use caplet_host::{LoadOptions, PackageHost};
use caplet_manifest::{parse_manifest, CancelToken};
use caplet_signing::VerifyMode;
use caplet_update::UpdatePipeline;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "caplet")]
#[command(about = "Caplet - Signed Web-Application Package Host")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Load a package and verify its signatures
    Verify {
        /// Package root directory
        #[arg(short, long)]
        root: PathBuf,
        /// Expected package id
        #[arg(long)]
        id: Option<String>,
        /// Report failures instead of erroring out
        #[arg(long)]
        report: bool,
    },
    /// Run one update round against the package's update endpoint
    Update {
        /// Package root directory
        #[arg(short, long)]
        root: PathBuf,
    },
    /// Show the active version, origin, and verification state
    Status {
        /// Package root directory
        #[arg(short, long)]
        root: PathBuf,
    },
    /// Parse a manifest file and dump it
    Inspect {
        /// Manifest file path
        #[arg(short, long)]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();
    let cancel = CancelToken::new();

    match cli.command {
        Some(Commands::Verify { root, id, report }) => {
            let options = LoadOptions {
                expected_id: id,
                verify_mode: if report {
                    VerifyMode::Report
                } else {
                    VerifyMode::Strict
                },
                require_verified: !report,
                ..LoadOptions::default()
            };
            let host = PackageHost::load(&root, options, &cancel)
                .await
                .context("failed to load package")?;
            println!(
                "{} {} ({}): {}",
                host.manifest().id,
                host.manifest().version,
                host.version_dir().display(),
                if host.is_verified() { "verified" } else { "NOT verified" }
            );
        }
        Some(Commands::Update { root }) => {
            let pipeline = UpdatePipeline::new(&root);
            match pipeline.check_and_update(&cancel).await? {
                Some(version) => println!("updated to {version}"),
                None => println!("no update available"),
            }
        }
        Some(Commands::Status { root }) => {
            let options = LoadOptions {
                verify_mode: VerifyMode::Report,
                require_verified: false,
                ..LoadOptions::default()
            };
            let host = PackageHost::load(&root, options, &cancel)
                .await
                .context("failed to load package")?;
            println!("id:       {}", host.manifest().id);
            println!("name:     {}", host.manifest().name);
            println!("version:  {}", host.manifest().version);
            println!("origin:   {}", host.origin());
            println!("active:   {}", host.version_dir().display());
            println!("verified: {}", host.is_verified());
        }
        Some(Commands::Inspect { manifest }) => {
            let bytes = std::fs::read(&manifest)
                .with_context(|| format!("failed to read {}", manifest.display()))?;
            let parsed = parse_manifest(&bytes).context("malformed manifest")?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        None => {
            println!("Caplet v0.1.0 - Use --help for commands");
        }
    }

    Ok(())
}
