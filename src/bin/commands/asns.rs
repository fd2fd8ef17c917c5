use clap::Args;
use prefix_fetcher::{AsnLens, AsnLookupArgs, PrefixFetcherConfig};

/// Arguments for the Asns command
#[derive(Args)]
pub struct AsnsArgs {
    #[clap(flatten)]
    pub lookup: AsnLookupArgs,
}

pub fn run(config: &PrefixFetcherConfig, args: AsnsArgs) {
    let AsnsArgs { lookup } = args;

    let lens = match AsnLens::from_config(config) {
        Ok(lens) => lens,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    match lens.search(&lookup) {
        Ok(resolution) => println!("{}", lens.format_results(&resolution, &lookup.format)),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}
