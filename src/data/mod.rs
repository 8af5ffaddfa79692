//! Sales data ingestion, preparation and insights

pub mod columns;
pub mod dataset;
pub mod features;
pub mod filter;
pub mod frame;
pub mod loader;
pub mod summary;

pub use dataset::ModelData;
pub use features::{FeatureEngineer, PrepareReport, Prepared};
pub use filter::DatasetFilter;
pub use frame::{Column, ColumnData, ColumnKind, SalesFrame};
pub use loader::load_csv;
