// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `construct` - build terrain meshes for one tile or a rectangular area
//!
//! ```text
//! construct <work_base> <output_base> <tile_id>
//! construct <work_base> <output_base> <center_lon> <center_lat> <x_extent> <y_extent>
//! ```
//!
//! Exits with 2 on usage or configuration errors, 1 if any tile failed.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use terra_geometry::{area_buckets, BatchReport, ConstructConfig, TileConstructionDriver};
use terra_model::Bucket;

#[derive(Parser, Debug)]
#[command(name = "construct", version, about = "Build terrain tile meshes")]
struct Cli {
    /// Directory holding DEM, polygon and shared-edge files
    work_base: PathBuf,

    /// Directory the meshes are written to
    output_base: PathBuf,

    /// Either <tile_id> or <center_lon> <center_lat> <x_extent> <y_extent>
    #[arg(required = true, num_args = 1..=4, allow_negative_numbers = true, value_name = "TARGET")]
    target: Vec<String>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Lower bound of the fit node budget
    #[arg(long)]
    min_nodes: Option<usize>,

    /// Upper bound of the fit node budget
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Skip area tiles with a lower index (resume an interrupted run)
    #[arg(long)]
    start_index: Option<u32>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// What to build
#[derive(Clone, Copy, Debug, PartialEq)]
enum Target {
    Tile(u32),
    Area {
        center_lon: f64,
        center_lat: f64,
        x_extent: f64,
        y_extent: f64,
    },
}

impl Target {
    fn parse(args: &[String]) -> std::result::Result<Self, String> {
        match args {
            [id] => id
                .parse()
                .map(Target::Tile)
                .map_err(|_| format!("invalid tile id '{}'", id)),
            [lon, lat, x, y] => {
                let num = |s: &String| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| format!("invalid number '{}'", s))
                };
                let target = Target::Area {
                    center_lon: num(lon)?,
                    center_lat: num(lat)?,
                    x_extent: num(x)?,
                    y_extent: num(y)?,
                };
                if let Target::Area { x_extent, y_extent, .. } = target {
                    if x_extent < 0.0 || y_extent < 0.0 {
                        return Err("extents must not be negative".to_string());
                    }
                }
                Ok(target)
            }
            _ => Err(format!(
                "expected 1 or 4 target values, got {}",
                args.len()
            )),
        }
    }

    fn buckets(&self) -> Vec<Bucket> {
        match *self {
            Target::Tile(index) => vec![Bucket::from_index(index)],
            Target::Area {
                center_lon,
                center_lat,
                x_extent,
                y_extent,
            } => area_buckets(center_lon, center_lat, x_extent, y_extent),
        }
    }
}

fn load_config(cli: &Cli) -> Result<ConstructConfig> {
    let mut config = match &cli.config {
        Some(path) => ConstructConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConstructConfig::default(),
    };
    let min = cli.min_nodes.unwrap_or(config.min_nodes);
    let max = cli.max_nodes.unwrap_or(config.max_nodes);
    config = config.with_node_budget(min, max);
    Ok(config)
}

fn run(cli: &Cli, target: Target) -> Result<BatchReport> {
    let config = load_config(cli)?;
    let driver = TileConstructionDriver::new(config, &cli.work_base, &cli.output_base)
        .context("Invalid configuration")?;

    let buckets = target.buckets();
    info!(
        "Constructing {} tile(s) from {} into {}",
        buckets.len(),
        cli.work_base.display(),
        cli.output_base.display()
    );
    let start = match target {
        Target::Tile(_) => None,
        Target::Area { .. } => cli.start_index,
    };
    driver
        .construct_area(&buckets, start)
        .context("Construction aborted")
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let target = match Target::parse(&cli.target) {
        Ok(t) => t,
        Err(msg) => Cli::command()
            .error(clap::error::ErrorKind::InvalidValue, msg)
            .exit(),
    };

    match run(&cli, target) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            error!("{} tile(s) failed", report.failed.len());
            ExitCode::from(1)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
