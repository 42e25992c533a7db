use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hitthefest::lineup::{lineup_path, list_festivals, load_lineup};
use hitthefest::models::{popularity_label, AddTracksOutcome, RejectReason};
use hitthefest::pipeline::{build_playlist_plan, publish, PlaylistPlan, RunConfig, DEFAULT_MARKET};
use hitthefest::progress::{format_duration, set_log_only};
use hitthefest::safety::validate_report_path;
use hitthefest::spotify::{parse_market, SpotifyAuth};

#[derive(Parser)]
#[command(name = "hitthefest")]
#[command(about = "Build a Spotify playlist from a festival lineup")]
struct Args {
    /// Name for the new playlist (prompted if not set)
    #[arg(long)]
    playlist_name: Option<String>,

    /// Authorization code, or the redirect URL carrying it
    #[arg(long)]
    code: Option<String>,

    /// Festival directory name (prompted if not set)
    #[arg(long)]
    festival: Option<String>,

    /// Extra per-artist diagnostics
    #[arg(long)]
    debug: bool,

    #[arg(long, env = "HITTHEFEST_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Market for top-track lookups
    #[arg(long, default_value = DEFAULT_MARKET)]
    market: String,

    /// Threads fetching top tracks (0 = sequential)
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,

    /// Write a JSON allocation report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Hide progress bars, log progress lines instead
    #[arg(long)]
    log_only: bool,

    #[arg(long, env = "SPOTIPY_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    #[arg(long, env = "SPOTIPY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[arg(long, env = "SPOTIPY_REDIRECT_URI")]
    redirect_uri: Option<String>,
}

// ============================================================================
// Prompts
// ============================================================================

fn prompt(message: &str) -> Result<String> {
    print!("{}: ", message);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("stdin closed while waiting for input");
    }
    Ok(line.trim().to_string())
}

fn confirm(message: &str) -> Result<bool> {
    let answer = prompt(&format!("{} [Y/n]", message))?;
    Ok(matches!(answer.to_lowercase().as_str(), "" | "y" | "yes"))
}

/// Numbered festival menu; re-asks until a festival with a valid lineup is picked.
fn select_festival(data_dir: &Path) -> Result<(String, Vec<String>)> {
    loop {
        let festivals = list_festivals(data_dir);
        if festivals.is_empty() {
            bail!("No festivals found in {}", data_dir.display());
        }

        println!("Select the festival for the playlist:");
        for (i, fest) in festivals.iter().enumerate() {
            println!("{}. {}", i + 1, fest);
        }

        let choice = prompt("Enter festival number")?;
        let Some(festival) = choice
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| festivals.get(i))
        else {
            println!("Invalid selection. Please try again.");
            continue;
        };

        match load_lineup(&lineup_path(data_dir, festival)) {
            Ok(artists) => {
                debug!(festival = %festival, "selected festival");
                return Ok((festival.clone(), artists));
            }
            Err(e) => {
                println!("Error: {}", e);
                println!("The selected festival does not have a valid artists.json.");
                println!("Please choose another festival.\n");
            }
        }
    }
}

// ============================================================================
// Output
// ============================================================================

fn print_summary(playlist_name: &str, festival: &str, plan: &PlaylistPlan) {
    println!("\nSummary:");
    println!("Playlist name: {}", playlist_name);
    println!("Festival: {}", festival);
    println!("Number of artists: {}", plan.roster.len());
    println!("Number of tracks to add: {}\n", plan.tracks().len());
}

fn print_zero_track_artists(plan: &PlaylistPlan) {
    let empty: Vec<_> = plan.allocation.artists_without_tracks().collect();
    if empty.is_empty() {
        return;
    }

    println!("\n[DEBUG] Artists with no assigned tracks:");
    for artist in empty {
        println!("\n  - {} (requested: {})", artist.name, artist.quota);
        for outcome in artist.rejected() {
            println!("    Track: {}", outcome.track_id);
            if let Some(credited) = &outcome.credited {
                println!("      Authors: {:?}", credited);
            }
            if let Some(RejectReason::OwnedBy(Some(owner))) = outcome.reject_reason() {
                println!("      Detected owner: {}", owner);
            }
            if let Some(reason) = outcome.reject_reason() {
                println!("      Rejected: {}", reason);
            }
        }
    }
}

fn print_artist_quotas(plan: &PlaylistPlan) {
    println!("\nExtra debug output:");
    for (quota, alloc) in plan.quotas.entries().iter().zip(plan.allocation.artists()) {
        println!(
            "{}: Popularity {}, Tracks to extract: {}, Taken: {}",
            quota.name,
            popularity_label(quota.popularity),
            quota.tier.get(),
            alloc.assigned()
        );
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let crate_level = if args.debug { "hitthefest=debug" } else { "hitthefest=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive(crate_level.parse()?))
        .init();
    set_log_only(args.log_only);

    let start = Instant::now();
    debug!("Starting HitTheFest");

    let (festival, artists) = match &args.festival {
        Some(festival) => {
            let path = lineup_path(&args.data_dir, festival);
            let artists = load_lineup(&path)
                .with_context(|| format!("Festival '{}' does not have a valid lineup", festival))?;
            (festival.clone(), artists)
        }
        None => select_festival(&args.data_dir)?,
    };
    let source = lineup_path(&args.data_dir, &festival);

    if let Some(report) = &args.report {
        validate_report_path(report, &[source.as_path()])?;
    }

    let market = parse_market(&args.market)?;
    let auth = SpotifyAuth::new(
        args.client_id.clone(),
        args.client_secret.clone(),
        args.redirect_uri.clone(),
    )?;

    let playlist_name = match &args.playlist_name {
        Some(name) => name.clone(),
        None => prompt("Enter playlist name")?,
    };
    let raw_code = match &args.code {
        Some(code) => code.clone(),
        None => {
            println!("\nTo authorize the app, open the following URL in your browser, log in, and then paste the code parameter you receive here:");
            println!("{}", auth.authorize_url()?);
            prompt("\nPaste the 'code' parameter here")?
        }
    };
    let code = auth.extract_code(&raw_code)?;
    debug!(playlist = %playlist_name, "inputs collected");

    let client = auth.connect(&code, market)?;

    let config = RunConfig {
        workers: args.workers,
        market: args.market.clone(),
        ..RunConfig::default()
    };

    println!("\nBuilding playlist for {} artists...", artists.len());
    let plan = build_playlist_plan(&client, artists, &config)?;

    if args.debug {
        print_zero_track_artists(&plan);
    }
    print_summary(&playlist_name, &festival, &plan);

    if let Some(path) = &args.report {
        plan.report(Some(&playlist_name), Some(&festival))
            .write_to_file(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    if !args.yes && !confirm("Do you want to create and upload the playlist?")? {
        println!("Aborted.");
        return Ok(());
    }

    println!("Creating playlist on Spotify...");
    let published = publish(&client, &playlist_name, plan.tracks(), &config)?;
    match &published.outcome {
        AddTracksOutcome::Complete { added } => {
            println!("Playlist '{}' created with {} tracks!", playlist_name, added);
        }
        AddTracksOutcome::Partial { added, failed } => {
            println!(
                "Playlist '{}' created with {} of {} tracks ({} could not be added)",
                playlist_name,
                added,
                plan.tracks().len(),
                failed.len()
            );
        }
    }

    if args.debug {
        print_artist_quotas(&plan);
    }

    println!("Elapsed: {}", format_duration(start.elapsed()));
    Ok(())
}
