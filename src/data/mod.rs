//! Event data: schema, CSV loading and dataset discovery

mod loader;
mod schema;

pub use loader::{parse_flag, pick_csv, DataLoader, DatasetLocator};
pub use schema::{Column, ColumnSet, EventRecord, EventTable};
