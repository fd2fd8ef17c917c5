pub mod asns;
pub mod config;
pub mod countries;
pub mod fetch;
