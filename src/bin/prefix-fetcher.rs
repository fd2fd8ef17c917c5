use clap::{Parser, Subcommand};
use prefix_fetcher::PrefixFetcherConfig;
use tracing::Level;

mod commands;

use commands::asns::AsnsArgs;
use commands::fetch::FetchArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.prefix-fetcher/prefix-fetcher.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve countries to prefix lists and write <cc>_prefixes_v4.txt / <cc>_prefixes_v6.txt.
    Fetch(FetchArgs),

    /// List the public ASNs registered to a country.
    Asns(AsnsArgs),

    /// List supported countries and their registries.
    Countries,

    /// Show the effective configuration.
    Config,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match PrefixFetcherConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(&config, args),
        Commands::Asns(args) => commands::asns::run(&config, args),
        Commands::Countries => commands::countries::run(&config),
        Commands::Config => commands::config::run(&config),
    }
}
