pub mod cacheable_store;
pub mod triple_store;
pub mod indexing {
    pub mod labels;
    pub mod types;
}

pub use cacheable_store::RdfCacheableStore;
pub use triple_store::{MatchStatement, OxigraphTripleStore, TripleStore};
