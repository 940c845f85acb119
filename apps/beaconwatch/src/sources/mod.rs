/// Collaborators observed by the probes
///
/// Each trait is the narrow view a probe needs of an external system; the
/// concrete adapters live next to it.
pub mod cache;
pub mod chain_store;

pub use cache::{CacheClient, RespCache};
pub use chain_store::{CanonicalBlock, PrimaryStore, SecondaryStore, SqlChainStore};
