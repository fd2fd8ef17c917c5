use prefix_fetcher::PrefixFetcherConfig;

pub fn run(config: &PrefixFetcherConfig) {
    println!("{}", config.summary());
}
