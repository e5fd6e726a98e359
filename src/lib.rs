pub mod config;
pub mod fetch;
pub mod load;
pub mod logging;
pub mod period;
pub mod pipeline;
pub mod process;
pub mod schema;

pub use config::{Config, ConfigError, RunPlan};
pub use fetch::{Fetcher, HttpTransport, Transport};
pub use load::{FileSink, PostgresSink, Sink};
pub use period::{period_range, Granularity, Period};
pub use pipeline::{run, RunOutcome, RunReport};
pub use process::{normalize, row_identifier, TradeBatch};
