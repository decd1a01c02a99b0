//! Library surface for the `mysql-indexer` binary, criterion benchmarks and hosts that
//! embed the engine in their own query hook. The binary entry point lives in src/main.rs.

pub mod config;
pub mod db;
pub mod index;
pub mod inspect;
pub mod query;
pub mod replay;
pub mod report;
pub mod schema;
#[cfg(test)]
pub mod test_helpers;
