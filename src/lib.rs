//! dashfeed — data-fetching and drilldown orchestration for the media
//! analytics dashboard.
//!
//! The crate is the non-visual kernel of the dashboard front-end: it binds
//! declarative filter state to either a deterministic mock engine or the
//! backend API, manages request lifecycle (loading/ready/error,
//! cancellation, fallback), and drives cursor-paginated, sortable,
//! locally-searchable drilldown lists. Presentation layers consume
//! read-only snapshots via `watch` subscriptions.
//!
//! Flow: filter state → [`query::build_canonical`] → serialized dependency
//! key → [`resource::QueryResource`] → [`drilldown::DrilldownController`]
//! → [`localsearch`] projection → UI.

pub mod config;
pub mod drilldown;
pub mod error;
pub mod http;
pub mod localsearch;
pub mod mock;
pub mod query;
pub mod resource;
pub mod types;

pub use config::{DataMode, KvStore, MemoryStore, NamespacedStore};
pub use drilldown::{
    DrilldownController, DrilldownKind, DrilldownSession, DrilldownSpec, HttpPageFetcher,
    NullFetcher, PAGE_SIZE, PageFetcher, parse_kind, spec_for,
};
pub use error::FetchError;
pub use mock::SortDir;
pub use query::{CanonicalQuery, DatePreset, MediaType, QueryIntent, build_canonical};
pub use resource::{
    CancelToken, DataOrigin, QueryResource, ResourceOptions, ResourceState, ResourceStatus,
};
pub use types::{ListPage, Paging, Row};

/// Install the default tracing subscriber for binaries and examples.
/// Filter via `RUST_LOG`; quiet by default.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .try_init();
}
