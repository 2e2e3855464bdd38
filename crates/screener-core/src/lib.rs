pub mod error;
pub mod fallback;
pub mod history;
pub mod pipeline;
pub mod query;
pub mod service;
pub mod traits;
pub mod types;

pub use error::*;
pub use query::{ProviderQuery, RawScreenerQuery};
pub use service::{EnrichmentConfig, ScreenerService};
pub use traits::*;
pub use types::*;
