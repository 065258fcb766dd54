pub mod backend;
pub mod config;
pub mod error;
pub mod search;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::{BackendKind, BackendStatus, CatalogBackend, CatalogTransport, SearchSession};
pub use config::{load_config, SearchConfig};
pub use error::{ErrorCategory, SearchError, TransportError};
pub use search::{CatalogSearch, SearchRequest, SearchResponse, SearchResult};
pub use session::{CatalogSession, LocationProvider, StaticLocations, StaticSession};
