//! Data ingestion and splitting utilities

pub mod data_loader;
pub mod split;

pub use data_loader::{DataLoader, Dataset, DatasetSummary};
pub use split::{split_indices, train_test_split, SplitConfig, SplitIndices};
