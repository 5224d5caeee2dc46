use clap::{Parser, Subcommand};
use route_snapshot::responder::Responder;
use route_snapshot::rewrite::Rewriter;
use route_snapshot::routes::{RouteCatalog, RouteSource};
use route_snapshot::site::Site;
use route_snapshot::snapshot::{self, SnapshotOptions};
use route_snapshot::{config, logging, output};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(clap::Args, Clone)]
struct GenerateArgs {
    /// Output directory (default: `output_root` from site.toml, inside the site)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Regenerate a single route instead of the whole site
    #[arg(long)]
    route: Option<String>,

    /// Write the snapshot result as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Parser)]
#[command(name = "route-snapshot")]
#[command(about = "Snapshot a route-driven content site into static files")]
#[command(long_about = "\
Snapshot a route-driven content site into static files

Every GET route in site.toml is rendered, its stylesheet and script bundles are
saved next to it, and the images its page references are copied into the tree
with the references rewritten.

Site structure:

  site/
  ├── site.toml                    # Routes, rewrite rules, asset settings
  ├── views/
  │   ├── gems.md                  # Markdown view → /gems
  │   └── rack.html                # HTML fragment view → /rack
  ├── assets/
  │   ├── images/ruby.png          # Relocated into the pages that use it
  │   ├── stylesheets/gems.css     # Bundle for /gems (may `*= require` others)
  │   └── javascripts/gems.js      # Bundle for /gems (may `//= require` others)
  └── vendor/assets/javascripts/   # Extra load path for required files

Output:

  public/gems/index.html
  public/gems/assets/{gems.css, gems.js, ruby.png}

Run 'route-snapshot gen-config' to generate a documented site.toml.")]
#[command(version)]
struct Cli {
    /// Site directory
    #[arg(long, default_value = ".", global = true)]
    site: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Snapshot every GET route into the output directory
    Generate(GenerateArgs),
    /// List the routes and the pages they map to
    Routes,
    /// Validate site.toml and check that every route has a view
    Check,
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Command::Generate(args) => generate(&cli, args)?,
        Command::Routes => {
            let site = Site::open(&cli.site)?;
            output::print_routes(&site.routes());
        }
        Command::Check => {
            println!("==> Checking {}", cli.site.display());
            let site = Site::open(&cli.site)?;
            let missing = site.missing_views();
            output::print_check_output(&site.config().routes, &missing);
            if !missing.is_empty() {
                return Err(format!("{} route(s) have no view", missing.len()).into());
            }
            println!("==> Site is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn generate(cli: &Cli, args: &GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let site = Site::open(&cli.site)?;
    let config = site.config();
    let output_root = args
        .output
        .clone()
        .unwrap_or_else(|| cli.site.join(&config.output_root));

    let mut catalog = RouteCatalog::new(&site);
    if let Some(path) = &args.route {
        if catalog.select_route(path).is_none() {
            info!("No GET route {path}, nothing to generate");
            return Ok(());
        }
        catalog = catalog.only(path.as_str());
    }

    let responder = Responder::new(&site, &site);
    let rewriter = Rewriter::from_table(&config.rewrite);
    for rule in rewriter.rules() {
        debug!("Rewriting <{}> {}", rule.tag, rule.attribute);
    }

    let mut options = SnapshotOptions::new(&output_root, site.root());
    options.assets_prefix = config.assets_prefix.clone();
    options.strip_stylesheet_comments = config.stylesheets.strip_source_comments;

    println!("==> Generating {} → {}", cli.site.display(), output_root.display());
    let result = snapshot::run(&catalog, &responder, &rewriter, &options)?;
    output::print_snapshot_output(&result, &output_root);

    if let Some(report) = &args.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(report, json)?;
        info!("Report written to {}", report.display());
    }
    Ok(())
}
