//! # Facets Engine
//!
//! Resolves the facet panel of a listing page: which filterable dimensions exist, which
//! values are currently selected, and how many results each value would yield.
//!
//! ## Architecture
//!
//! ```text
//! FacetRequest (query args, URL params, path, provider, caller context)
//!     │
//!     ├──> QueryArgs with paged=1 (search term forces the aggregation provider)
//!     │
//!     ├──> FacetRegistry → FacetDefinition[] for the provider
//!     │
//!     ├──> extract_selection(<prefix><facet>=a,b)
//!     │
//!     ├──> Cache (key = blake3 fingerprint, group = path without /page/<n>/)
//!     │    ├─> hit: cached {facets, pagination, settings}
//!     │    └─> miss / bypass
//!     │         ├─> FacetProvider::build_query → fetch → parse_response
//!     │         └─> cache write (unless bypassed or empty preview)
//!     │
//!     └──> Resolution → presentation (visible / expanded choice lists)
//! ```
//!
//! Failures never escape [`FacetResolver::resolve`]; they are logged and turned into the
//! empty payload so the page renders without a facet panel.
//!
//! ## Example
//!
//! ```rust,no_run
//! use facets_engine::{
//!     AggregationAdapter, FacetRegistry, FacetRequest, FacetResolver, IndexerAdapter,
//!     MemoryCache, ProviderKind, ProviderTransport, QueryArgs,
//! };
//! use std::sync::Arc;
//!
//! # async fn run(indexer: Arc<dyn ProviderTransport>, search: Arc<dyn ProviderTransport>) {
//! let resolver = FacetResolver::new(
//!     Arc::new(FacetRegistry::builtin()),
//!     Arc::new(MemoryCache::new(512)),
//!     Arc::new(IndexerAdapter::new(indexer)),
//!     Arc::new(AggregationAdapter::new(search)),
//! );
//! let request = FacetRequest::new(QueryArgs::new().with("post_type", "post"), ProviderKind::Indexer)
//!     .path("/reports/")
//!     .param("formats", "report,feature");
//! let resolution = resolver.resolve(&request).await;
//! println!("{} facets", resolution.get_facets().len());
//! # }
//! ```

mod cache;
mod error;
mod fingerprint;
pub mod label;
pub mod presentation;
pub mod provider;
mod query;
mod registry;
mod resolver;
mod selection;

pub use cache::{CacheBackend, CacheConfig, FacetCache, FileCache, MemoryCache, DEFAULT_TTL};
pub use error::{FacetError, Result};
pub use fingerprint::{construct_cache_group, construct_cache_key, CACHE_INVALIDATION_MARKER};
pub use presentation::{present, present_payload, ChoiceLists};
pub use provider::{
    AggregationAdapter, CapturedAggregations, FacetProvider, IndexerAdapter, ParseContext,
    ProviderKind, ProviderQuery, ProviderResponse, ProviderTransport,
};
pub use query::{FacetRequest, QueryArgs, RequestContext, DEFAULT_PER_PAGE};
pub use registry::{FacetRegistry, ProviderRegistry, ProviderRegistryConfig, RegistryConfig};
pub use resolver::{CacheStatus, FacetResolver, Resolution, MAX_CACHED_PAGE};
pub use selection::{
    clear_facet, encode_selection, extract_selection, selection_tokens, toggle_choice,
    SelectedToken,
};
