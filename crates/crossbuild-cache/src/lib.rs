//! Build output cache for crossbuild.
//!
//! A build is keyed by its name and holds exactly one record: the
//! fingerprint of the sources it was built from plus copies of the files it
//! produced. A later run whose fingerprint matches can reuse those files
//! instead of rebuilding.

pub mod error;
pub mod fingerprint;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use fingerprint::fingerprint;
pub use store::{BuildMeta, CACHE_DIR_ENV, CacheStore};
