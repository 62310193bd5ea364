//! Command-line interface for the comoving group pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ClusterSelection;
use crate::core::writers::hr_file_name;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "comoving-groups")]
#[command(about = "Comoving stellar group, tidal tail and runaway detection", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster a star catalog and detect tails and runaways
    Analyze {
        /// Input catalog CSV
        catalog: PathBuf,
        /// Output directory for stars.json and analysis.json
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Smallest group reported as a cluster
        #[arg(long)]
        min_cluster_size: Option<usize>,
        /// Neighbor count for core distances
        #[arg(long)]
        min_samples: Option<usize>,
        /// Cluster selection method
        #[arg(long, value_enum)]
        selection: Option<ClusterSelection>,
        /// Also write the labeled catalog as CSV
        #[arg(long)]
        csv: bool,
    },

    /// Export color-magnitude rows of one cluster to CSV
    ExportHr {
        /// Input catalog CSV
        catalog: PathBuf,
        /// analysis.json from a previous run
        analysis: PathBuf,
        /// Cluster id to export
        #[arg(long)]
        cluster: i32,
        /// Output CSV path (defaults to cluster_<id>_data.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a sky map (and optionally an HR diagram) as PNG
    Visualize {
        /// stars.json from a previous run
        stars: PathBuf,
        /// analysis.json for tail and runaway markers
        #[arg(long)]
        analysis: Option<PathBuf>,
        /// Output PNG path for the sky map
        #[arg(short, long, default_value = "sky.png")]
        output: PathBuf,
        /// Also plot the HR diagram of this cluster
        #[arg(long)]
        hr_cluster: Option<i32>,
    },

    /// Write the default configuration to a YAML file
    Config {
        /// Output YAML path
        output: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            let head: String = value.chars().take(34).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            catalog,
            output_dir,
            min_cluster_size,
            min_samples,
            selection,
            csv,
        } => {
            let mut config = config;
            if let Some(v) = min_cluster_size {
                config.clustering.min_cluster_size = v;
            }
            if let Some(v) = min_samples {
                config.clustering.min_samples = v;
            }
            if let Some(v) = selection {
                config.clustering.selection = v;
            }
            cmd_analyze(&catalog, &output_dir, csv, &config);
        }
        Commands::ExportHr {
            catalog,
            analysis,
            cluster,
            output,
        } => {
            cmd_export_hr(&catalog, &analysis, cluster, output, &config);
        }
        Commands::Visualize {
            stars,
            analysis,
            output,
            hr_cluster,
        } => {
            cmd_visualize(&stars, analysis.as_deref(), &output, hr_cluster);
        }
        Commands::Config { output } => {
            cmd_config(&output, &config);
        }
    }
}

fn cmd_analyze(catalog: &Path, output_dir: &Path, csv: bool, config: &PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();

    println!("Analyzing catalog...");
    println!("Input: {}", catalog.display());
    println!("Output directory: {}", output_dir.display());
    println!("Parameters:");
    println!("  min_cluster_size: {}", config.clustering.min_cluster_size);
    println!("  min_samples: {}", config.clustering.min_samples);
    println!("  selection: {:?}", config.clustering.selection);

    let spinner = create_spinner("Clustering stars...");

    match pipeline::analyze_catalog_file(catalog, output_dir, config, csv) {
        Ok((result, outputs)) => {
            spinner.finish_and_clear();

            let tails: usize = result
                .summary
                .clusters
                .iter()
                .map(|c| c.tail_members.len())
                .sum();

            let mut items = vec![
                ("Input file", catalog.display().to_string()),
                ("Stars", result.stars.len().to_string()),
                ("Rows dropped", outputs.dropped_rows.to_string()),
                ("Clusters found", result.summary.clusters.len().to_string()),
                ("Noise stars", result.noise_count().to_string()),
                ("Tail candidates", tails.to_string()),
                ("Runaways", result.summary.runaways.len().to_string()),
                ("Stars JSON", outputs.stars_json.display().to_string()),
                ("Analysis JSON", outputs.analysis_json.display().to_string()),
            ];
            if let Some(path) = outputs.stars_csv {
                items.push(("Stars CSV", path.display().to_string()));
            }
            items.push(("Duration", format!("{:.2?}", start.elapsed())));

            print_summary("Analysis Complete", &items);
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Analysis failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_export_hr(
    catalog: &Path,
    analysis: &Path,
    cluster: i32,
    output: Option<PathBuf>,
    config: &PipelineConfig,
) {
    use crate::processors::pipeline;

    let start = Instant::now();
    let output_path = output.unwrap_or_else(|| PathBuf::from(hr_file_name(cluster)));

    println!("Exporting HR data for cluster {}...", cluster);

    match pipeline::export_cluster_hr(catalog, analysis, cluster, &output_path, config) {
        Ok(rows) => {
            print_summary(
                "HR Export Complete",
                &[
                    ("Cluster", cluster.to_string()),
                    ("Rows written", rows.to_string()),
                    ("Output CSV", output_path.display().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("HR export failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_visualize(stars_path: &Path, analysis: Option<&Path>, output: &Path, hr_cluster: Option<i32>) {
    use crate::core::loaders;
    use crate::processors::assembly::hr_points_labeled;
    use crate::visualization;

    let start = Instant::now();

    println!("Visualizing analysis results...");
    println!("Input: {}", stars_path.display());
    println!("Output: {}", output.display());

    let spinner = create_spinner("Loading stars...");

    let stars = match loaders::load_labeled_stars(stars_path) {
        Ok(s) => s,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load stars: {}", e);
            std::process::exit(1);
        }
    };

    let summary = match analysis.map(loaders::load_analysis).transpose() {
        Ok(s) => s,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load analysis: {}", e);
            std::process::exit(1);
        }
    };

    spinner.set_message("Generating sky map...");

    if let Err(e) = visualization::plot_sky_map(output, &stars, summary.as_ref()) {
        spinner.finish_and_clear();
        error!("Visualization failed: {}", e);
        std::process::exit(1);
    }

    let mut items = vec![
        ("Input file", stars_path.display().to_string()),
        ("Sky map PNG", output.display().to_string()),
        ("Stars plotted", stars.len().to_string()),
    ];

    if let Some(cluster) = hr_cluster {
        spinner.set_message("Generating HR diagram...");

        let hr_path = output.with_file_name(format!("cluster_{}_hr.png", cluster));
        let points = hr_points_labeled(&stars, cluster);
        if points.is_empty() {
            warn!("Cluster {} has no members with a BP-RP color", cluster);
        }
        if let Err(e) = visualization::plot_hr_diagram(&hr_path, &points, cluster) {
            spinner.finish_and_clear();
            error!("HR diagram for cluster {} failed: {}", cluster, e);
            std::process::exit(1);
        }
        items.push(("HR diagram PNG", hr_path.display().to_string()));
    }

    spinner.finish_and_clear();
    items.push(("Duration", format!("{:.2?}", start.elapsed())));
    print_summary("Visualization Complete", &items);
}

fn cmd_config(output: &Path, config: &PipelineConfig) {
    match config.to_yaml(output) {
        Ok(()) => println!("Wrote configuration to {}", output.display()),
        Err(e) => {
            error!("Failed to write config: {}", e);
            std::process::exit(1);
        }
    }
}
