pub mod attrs;
pub mod compose;
pub mod error;
pub mod extract;
pub mod keywords;
pub mod models;
pub mod resolve;
pub mod stage;
pub mod sync;
pub mod templates;
pub mod testutil;
pub mod throttle;
pub mod traits;

pub use attrs::{AttrKey, AttributeMap};
pub use error::AppError;
pub use models::{
    compute_hash, handle_for, ExportRecord, GeneratedListing, NewExportRecord, ProductRecord,
    SpecItem, SpecSheet, SyncState,
};
pub use resolve::{EnrichmentResolver, LookupSite, Resolution};
pub use stage::{StageResult, StagingService};
pub use sync::{SyncConfig, SyncEngine, SyncReport};
pub use traits::{Cleaner, ExportStore, Extractor, Fetcher, SearchProvider, ShopClient};
