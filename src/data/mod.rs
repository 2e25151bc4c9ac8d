pub mod provider;

pub use provider::{DataProvider, LinkCount, LinkTypesOfRequest, MetadataApi};
