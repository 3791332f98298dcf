pub mod config;
pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod import;
pub mod ledger;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod transport;
pub mod types;
