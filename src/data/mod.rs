//! Input data: loading delimited files and the time-ordered table they become

mod frame;
mod loader;

pub use frame::{TimeSeriesFrame, TIMESTAMP_FORMAT};
pub use loader::{parse_timestamp, DataLoader, DataSaver};
