use prefix_fetcher::PrefixFetcherConfig;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct CountryRow {
    country: String,
    registry: &'static str,
    delegated_file: &'static str,
}

pub fn run(config: &PrefixFetcherConfig) {
    let table = match config.registry_table() {
        Ok(table) => table,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let rows: Vec<CountryRow> = table
        .iter()
        .map(|(cc, rir)| CountryRow {
            country: cc.to_string(),
            registry: rir.name(),
            delegated_file: rir.url(),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}
