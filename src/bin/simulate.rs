//! Offline dry run of the playlist builder against a JSON fixture
//! Usage: cargo run --release --bin simulate -- <fixture.json> [--report out.json]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hitthefest::catalog::{CatalogFixture, InMemoryCatalog};
use hitthefest::models::AddTracksOutcome;
use hitthefest::pipeline::{build_playlist_plan, publish, RunConfig};
use hitthefest::progress::{format_duration, set_log_only};
use hitthefest::safety::validate_report_path;

#[derive(Parser)]
#[command(name = "simulate")]
#[command(about = "Run quotas and allocation on a fixture without network access")]
struct Args {
    fixture: PathBuf,

    /// Write the JSON allocation report here
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Also create the playlist on the in-memory catalog
    #[arg(long)]
    publish: bool,

    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let crate_level = if args.debug { "hitthefest=debug" } else { "hitthefest=warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(crate_level.parse()?))
        .init();
    set_log_only(true);

    if let Some(report) = &args.report {
        validate_report_path(report, &[args.fixture.as_path()])?;
    }

    let start = Instant::now();
    let fixture = CatalogFixture::load(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;
    let catalog = InMemoryCatalog::from_fixture(&fixture);
    let config = RunConfig {
        pace: Duration::ZERO,
        workers: args.workers,
        ..RunConfig::default()
    };

    let plan = build_playlist_plan(&catalog, fixture.artists.clone(), &config)?;
    let report = plan.report(None, None);

    println!("\n=== SIMULATION RESULTS ===\n");
    println!("Artists:               {:>5}", report.total_artists);
    println!("Tracks selected:       {:>5}", report.total_tracks);
    println!("Artists without tracks:{:>5}", report.artists_without_tracks);
    if let Some([p20, p40, p60, p80]) = report.thresholds {
        println!(
            "Thresholds:            p20={:.1} p40={:.1} p60={:.1} p80={:.1}",
            p20, p40, p60, p80
        );
    }

    println!("\n=== PER ARTIST ===\n");
    for artist in &report.artists {
        println!(
            "{} (popularity {}, quota {}): {} taken",
            artist.name, artist.popularity, artist.quota, artist.assigned
        );
        for track in &artist.tracks {
            println!("  + {}", track);
        }
        for rejected in &artist.rejected {
            println!("  - {} ({})", rejected.track_id, rejected.reason);
        }
    }

    println!("\n=== PLAYLIST ORDER ===\n");
    for (i, track) in plan.tracks().iter().enumerate() {
        println!("{:>4}. {}", i + 1, track);
    }

    if args.publish {
        let published = publish(&catalog, "simulation", plan.tracks(), &config)?;
        match published.outcome {
            AddTracksOutcome::Complete { added } => {
                println!("\nPublished {} tracks to {}", added, published.playlist_id)
            }
            AddTracksOutcome::Partial { added, failed } => println!(
                "\nPublished {} tracks to {} ({} failed)",
                added,
                published.playlist_id,
                failed.len()
            ),
        }
    }

    if let Some(path) = &args.report {
        report.write_to_file(path)?;
        println!("\nReport written to {}", path.display());
    }

    println!("\nElapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
