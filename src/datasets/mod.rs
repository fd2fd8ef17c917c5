//! Data sources: registry delegated files, the BGP table, and address block arithmetic

pub mod bgp_table;
pub mod blocks;
pub mod delegated;
pub mod registry;
pub mod transport;

pub use bgp_table::{
    parse_bgp_table, BgpTableFetcher, RetryPolicy, RoutedPrefix, Sleeper, ThreadSleeper,
    BGP_TOOLS_TABLE_URL, DEFAULT_USER_AGENT,
};
pub use blocks::{align_to_24, compare_prefixes, compare_v4, compare_v6, split_into_24s};
pub use delegated::{parse_delegated, DelegatedRecord, RecordStatus, RecordType};
pub use registry::{RegistryTable, Rir};
pub use transport::{HttpTransport, Transport};
