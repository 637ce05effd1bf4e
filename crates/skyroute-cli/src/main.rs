// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Skyroute contributors

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use skyroute_core::{
    AtlasConfig, CountrySelection, Period, PerformanceMode, RankChange, RouteAtlas, Selection,
    TimeSeries,
};
use skyroute_geo::ArcPath;
use std::io;
use std::path::{Path, PathBuf};

const NO_DIRECT_SERVICE: &str = "no direct service";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Flight feed (GeoJSON FeatureCollection)
    #[arg(short, long, env = "SKYROUTE_FEED")]
    feed: Option<PathBuf>,

    /// Country boundary polygons (GeoJSON FeatureCollection)
    #[arg(short, long, env = "SKYROUTE_BOUNDARIES")]
    boundaries: Option<PathBuf>,

    /// Settings file (defaults to the platform config dir)
    #[arg(short, long, env = "SKYROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured performance mode
    #[arg(short, long)]
    mode: Option<PerformanceMode>,

    /// More log output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective settings, optionally saving them
    Settings {
        #[arg(long)]
        save: bool,
    },
    #[command(flatten)]
    Atlas(AtlasCommand),
}

/// Commands that need the flight feed.
#[derive(Subcommand)]
enum AtlasCommand {
    /// List periods in the feed
    Periods,
    /// Totals, route changes and rankings for one period
    Summary {
        /// YYYYMM (defaults to the latest period)
        #[arg(short, long)]
        period: Option<String>,
        #[arg(short = 'n', long, default_value_t = 5)]
        top: usize,
    },
    /// Monthly totals for a route, both directions
    Route {
        source: String,
        target: String,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Monthly totals for cross-border flights to or from a country
    Country {
        name: String,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Airport to country assignment
    Countries {
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Arc geometry for the visible flights of a period
    Arcs {
        #[arg(short, long)]
        period: Option<String>,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Trail segments for one animation tick
    Trail {
        #[arg(short, long)]
        period: Option<String>,
        /// Elapsed time on the animation clock
        #[arg(short, long, default_value_t = 0.0)]
        elapsed_ms: f64,
        /// Highlight a route given as SOURCE,TARGET
        #[arg(long, value_delimiter = ',', num_args = 2)]
        highlight: Option<Vec<String>>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let _ = TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto);
}

/// Selects the requested period, or the current one when none is given.
fn select_period(atlas: &mut RouteAtlas, requested: Option<&str>) -> Result<Period> {
    match requested {
        Some(code) => Ok(atlas.select_period_code(code)?),
        None => {
            let period = atlas
                .current_period()
                .ok_or_else(|| anyhow::anyhow!("The feed has no periods"))?;
            atlas.select(Selection::Period(period));
            Ok(period)
        }
    }
}

fn rank_change(change: RankChange) -> String {
    match change {
        RankChange::New => "new".to_string(),
        RankChange::Up(n) => format!("+{}", n),
        RankChange::Down(n) => format!("-{}", n),
        RankChange::Same => "=".to_string(),
    }
}

/// A series with no direct service gets a marker row so it can be told
/// apart from an empty one.
fn write_series_csv<W: io::Write>(series: &TimeSeries, out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["period", "label", "passengers", "flights"])?;
    if series.is_no_direct_service() {
        log::warn!("No direct service for the selected country");
        wtr.write_record(["", NO_DIRECT_SERVICE, "", ""])?;
    }
    for point in series.points() {
        wtr.write_record([
            point.period.code(),
            point.label.clone(),
            point.passengers.to_string(),
            point.flights.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn print_series(series: &TimeSeries, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(series)?),
        Format::Csv => write_series_csv(series, io::stdout())?,
        Format::Table => {
            if series.is_no_direct_service() {
                println!("No direct service.");
            } else if series.points().is_empty() {
                println!("No records.");
            }
            for point in series.points() {
                println!(
                    "{:<10} {:>12.0} passengers {:>6} flights",
                    point.label, point.passengers, point.flights
                );
            }
        }
    }
    Ok(())
}

fn print_arcs(arcs: &[ArcPath], route_ids: &[String], format: Format) -> Result<()> {
    match format {
        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            wtr.write_record(["route", "segment", "index", "lon", "lat"])?;
            for (route, arc) in route_ids.iter().zip(arcs) {
                for (s, segment) in arc.segments().into_iter().enumerate() {
                    for (i, point) in segment.iter().enumerate() {
                        wtr.write_record([
                            route.clone(),
                            s.to_string(),
                            i.to_string(),
                            point.lon.to_string(),
                            point.lat.to_string(),
                        ])?;
                    }
                }
            }
            wtr.flush()?;
        }
        Format::Json => {
            let entries: Vec<serde_json::Value> = route_ids
                .iter()
                .zip(arcs)
                .map(|(route, arc)| serde_json::json!({ "route": route, "path": arc }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Format::Table => {
            for (route, arc) in route_ids.iter().zip(arcs) {
                println!(
                    "{:<40} {} segment(s), {} points",
                    route,
                    arc.segment_count(),
                    arc.point_count()
                );
            }
        }
    }
    Ok(())
}

fn show_settings(path: &Path, mode: Option<PerformanceMode>, save: bool) -> Result<()> {
    let mut config = AtlasConfig::load(path)
        .with_context(|| format!("Failed to read settings {}", path.display()))?;
    if let Some(mode) = mode {
        config.performance_mode = mode;
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    if save {
        config.save(path)?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn run(atlas: &mut RouteAtlas, command: AtlasCommand) -> Result<()> {
    match command {
        AtlasCommand::Periods => {
            for period in atlas.store().periods() {
                println!(
                    "{}  {:<9} {:>6} records",
                    period,
                    period.label(),
                    atlas.store().records_in(*period).count()
                );
            }
        }
        AtlasCommand::Summary { period, top } => {
            let period = select_period(atlas, period.as_deref())?;
            atlas.run_country_assignment();

            let stats = atlas.period_stats(period);
            println!("{} ({})", period.label(), period);
            println!(
                "  {} flights, {:.0} passengers, {:.1}% average load factor",
                stats.total_flights, stats.total_passengers, stats.average_load_factor
            );

            let changes = atlas.route_changes(period);
            match changes.previous {
                Some(prev) => println!(
                    "  vs {}: {} new route(s), {} discontinued",
                    prev.label(),
                    changes.new_routes.len(),
                    changes.discontinued_routes.len()
                ),
                None => println!("  first period: {} route(s)", changes.new_routes.len()),
            }

            println!("Top routes:");
            for route in atlas.top_routes(period, top) {
                println!(
                    "  {}. {} -> {}  {:.0}  [{}]",
                    route.rank,
                    route.source,
                    route.target,
                    route.passengers,
                    rank_change(route.change)
                );
            }

            if !atlas.boundaries().is_empty() {
                let countries = atlas.top_countries(period, top);
                println!("Top destination countries:");
                for c in &countries.destinations {
                    println!("  {}. {}  {:.0}  [{}]", c.rank, c.country, c.passengers, rank_change(c.change));
                }
                println!("Top departure countries:");
                for c in &countries.departures {
                    println!("  {}. {}  {:.0}  [{}]", c.rank, c.country, c.passengers, rank_change(c.change));
                }
            }
        }
        AtlasCommand::Route {
            source,
            target,
            format,
        } => {
            atlas.select(Selection::Route { source, target });
            if let Some(series) = atlas.subject_series() {
                print_series(&series, format)?;
            }
        }
        AtlasCommand::Country { name, format } => {
            atlas.run_country_assignment();
            atlas.select(Selection::Country(CountrySelection::ByName(name)));
            if let Some(series) = atlas.subject_series() {
                print_series(&series, format)?;
            }
        }
        AtlasCommand::Countries { format } => {
            if atlas.boundaries().is_empty() {
                anyhow::bail!("Country assignment needs --boundaries");
            }
            let mut rows: Vec<(String, String, String)> = atlas
                .run_country_assignment()
                .iter()
                .map(|(airport, m)| {
                    (
                        airport.clone(),
                        m.country.clone(),
                        m.iso_code.clone().unwrap_or_default(),
                    )
                })
                .collect();
            rows.sort();
            match format {
                Format::Csv => {
                    let mut wtr = csv::Writer::from_writer(io::stdout());
                    wtr.write_record(["airport", "country", "iso_code"])?;
                    for (airport, country, iso) in &rows {
                        wtr.write_record([airport, country, iso])?;
                    }
                    wtr.flush()?;
                }
                Format::Json => println!("{}", serde_json::to_string_pretty(atlas.assignment())?),
                Format::Table => {
                    for (airport, country, iso) in &rows {
                        println!("{:<40} {:<30} {}", airport, country, iso);
                    }
                }
            }
        }
        AtlasCommand::Arcs { period, format } => {
            let period = select_period(atlas, period.as_deref())?;
            let flights = atlas.enhanced_flights(period);
            let arcs = atlas.arcs(period);
            let route_ids: Vec<String> = flights.iter().map(|f| f.route_id.clone()).collect();
            print_arcs(&arcs, &route_ids, format)?;
        }
        AtlasCommand::Trail {
            period,
            elapsed_ms,
            highlight,
        } => {
            let period = select_period(atlas, period.as_deref())?;
            if let Some([source, target]) = highlight.as_deref() {
                atlas.select(Selection::Route {
                    source: source.clone(),
                    target: target.clone(),
                });
            }
            if !atlas.render_settings().animations_enabled {
                log::warn!("Animations are disabled in {:?} mode", atlas.config().performance_mode);
            }
            let segments = atlas.frame(elapsed_ms);
            println!("{}", serde_json::to_string_pretty(&segments)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(AtlasConfig::default_path);

    match cli.command {
        Commands::Settings { save } => show_settings(&config_path, cli.mode, save),
        Commands::Atlas(command) => {
            let feed = cli
                .feed
                .as_deref()
                .context("A flight feed is required (--feed or SKYROUTE_FEED)")?;
            let mut atlas = RouteAtlas::open(&config_path, feed, cli.boundaries.as_deref())
                .with_context(|| format!("Failed to open route atlas for {}", feed.display()))?;
            if let Some(mode) = cli.mode {
                atlas.set_performance_mode(mode);
            }
            run(&mut atlas, command)?;
            atlas.shutdown();
            Ok(())
        }
    }
}
