use clap::Args;
use prefix_fetcher::{PrefixFetchArgs, PrefixFetcherConfig, PrefixLens};
use std::path::Path;

/// Arguments for the Fetch command
#[derive(Args)]
pub struct FetchArgs {
    #[clap(flatten)]
    pub fetch: PrefixFetchArgs,
}

pub fn run(config: &PrefixFetcherConfig, args: FetchArgs) {
    let FetchArgs { fetch } = args;

    let lens = match PrefixLens::from_config(config) {
        Ok(lens) => lens,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let results = match lens.search(&fetch) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let output_dir = fetch
        .output_dir
        .as_deref()
        .map(Path::new)
        .unwrap_or_else(|| config.output_path());

    for result in &results {
        if let Err(e) = result.prefixes.write_files(output_dir, &result.country) {
            eprintln!(
                "ERROR: failed to write prefix files for {} to {}: {}",
                result.country,
                output_dir.display(),
                e
            );
            std::process::exit(1);
        }
    }

    println!("{}", lens.format_results(&results, &fetch.format));
}
