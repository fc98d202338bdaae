//! Search engine client helpers and raw response types.

mod elasticsearch_utils;
pub use elasticsearch_utils::{
    RawSearchHit, RawSearchHits, RawSearchResult, RawSearchTotal, SearchEngine,
};
