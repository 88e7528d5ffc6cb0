//! Per-request facet resolution.
//!
//! One call to [`FacetResolver::resolve`] builds the query args, lists the provider's
//! facets, extracts the selection, consults the cache, and on a miss runs exactly one
//! provider round trip. Every failure degrades to [`FacetsPayload::empty`].

use crate::cache::{FacetCache, DEFAULT_TTL};
use crate::error::Result;
use crate::fingerprint::{construct_cache_group, construct_cache_key};
use crate::provider::{CapturedAggregations, FacetProvider, ParseContext, ProviderKind};
use crate::query::{FacetRequest, QueryArgs};
use crate::registry::FacetRegistry;
use crate::selection::extract_selection;
use facets_protocol::{
    FacetDefinition, FacetSettings, FacetsPayload, Pagination, ResolvedFacet, Selection,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Deeper pages are served uncached.
pub const MAX_CACHED_PAGE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    Hit,
    /// Computed and written to the cache (or skipped for an empty preview).
    Miss,
    /// Computed without reading or writing the cache.
    Bypassed,
    /// Short-circuited to the empty payload without calling the provider.
    FailSafe,
}

/// Why the cache was not consulted for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bypass {
    Search,
    DeepPage,
    PrimaryContext,
    NoGroup,
}

/// Final state of one resolution. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub provider: ProviderKind,
    pub cache_status: CacheStatus,
    pub selected: Selection,
    pub payload: FacetsPayload,
    /// Buckets the provider reported out of band. Always empty for cache hits.
    #[serde(skip_serializing_if = "CapturedAggregations::is_empty")]
    pub captured: CapturedAggregations,
}

impl Resolution {
    fn new(provider: ProviderKind, cache_status: CacheStatus, selected: Selection) -> Self {
        Self {
            provider,
            cache_status,
            selected,
            payload: FacetsPayload::empty(),
            captured: CapturedAggregations::default(),
        }
    }

    pub fn get_facets(&self) -> &BTreeMap<String, ResolvedFacet> {
        &self.payload.facets
    }

    pub fn get_pagination(&self) -> &Pagination {
        &self.payload.pagination
    }

    pub fn selected(&self) -> &Selection {
        &self.selected
    }

    pub fn into_payload(self) -> FacetsPayload {
        self.payload
    }
}

pub struct FacetResolver {
    registry: Arc<FacetRegistry>,
    cache: Arc<dyn FacetCache>,
    ttl: Duration,
    indexer: Arc<dyn FacetProvider>,
    aggregation: Arc<dyn FacetProvider>,
}

impl FacetResolver {
    pub fn new(
        registry: Arc<FacetRegistry>,
        cache: Arc<dyn FacetCache>,
        indexer: Arc<dyn FacetProvider>,
        aggregation: Arc<dyn FacetProvider>,
    ) -> Self {
        Self {
            registry,
            cache,
            ttl: DEFAULT_TTL,
            indexer,
            aggregation,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn registry(&self) -> &FacetRegistry {
        &self.registry
    }

    /// Definitions the facet panel is configured with for `kind`.
    pub fn settings(&self, kind: ProviderKind) -> &[FacetDefinition] {
        self.registry.list_facet_definitions(kind)
    }

    fn provider(&self, kind: ProviderKind) -> &dyn FacetProvider {
        match kind {
            ProviderKind::Indexer => self.indexer.as_ref(),
            ProviderKind::Aggregation => self.aggregation.as_ref(),
        }
    }

    pub async fn resolve(&self, request: &FacetRequest) -> Resolution {
        let args = request.query.with_paged(1);
        let kind = if args.is_search() {
            ProviderKind::Aggregation
        } else {
            request.provider
        };
        let catalog = self.registry.provider(kind);
        let facets = catalog.list_facet_definitions();
        let selected = extract_selection(&request.url_params, catalog.url_prefix(), facets);

        let group = construct_cache_group(request.path.as_deref());
        if group.is_none() && !request.context.is_authenticated {
            log::debug!("No cache group for anonymous {kind} request, serving empty facets");
            return Resolution::new(kind, CacheStatus::FailSafe, selected);
        }

        let bypass = if args.is_search() {
            Some(Bypass::Search)
        } else if request.query.paged() > MAX_CACHED_PAGE {
            Some(Bypass::DeepPage)
        } else if request.context.is_primary_context {
            Some(Bypass::PrimaryContext)
        } else if group.is_none() {
            Some(Bypass::NoGroup)
        } else {
            None
        };

        let cache_slot = match (bypass, group) {
            (None, Some(group)) => Some((construct_cache_key(&args, &selected), group)),
            (reason, _) => {
                log::debug!("Facet cache bypassed for {kind} request: {reason:?}");
                None
            }
        };

        if let Some((key, group)) = &cache_slot {
            if let Some(payload) = self.cached(key, group).await {
                let mut resolution = Resolution::new(kind, CacheStatus::Hit, selected);
                resolution.payload = payload;
                return resolution;
            }
        }

        let status = if cache_slot.is_some() {
            CacheStatus::Miss
        } else {
            CacheStatus::Bypassed
        };
        let mut resolution = Resolution::new(kind, status, selected);
        match self.fetch(kind, &args, facets, &resolution.selected).await {
            Ok((payload, captured)) => {
                resolution.payload = payload;
                resolution.captured = captured;
            }
            Err(err) => {
                log::warn!("Facet provider {kind} failed, serving empty facets: {err}");
                return resolution;
            }
        }

        let Some((key, group)) = cache_slot else {
            return resolution;
        };
        if request.context.is_preview && resolution.payload.is_empty() {
            log::debug!("Empty preview result for {kind} not cached");
            return resolution;
        }
        match serde_json::to_value(&resolution.payload) {
            Ok(value) => {
                if let Err(err) = self.cache.set(&key, value, &group, self.ttl).await {
                    log::warn!("Facet cache write failed for group {group}: {err}");
                }
            }
            Err(err) => log::warn!("Facet payload not serializable for cache: {err}"),
        }
        resolution
    }

    async fn cached(&self, key: &str, group: &str) -> Option<FacetsPayload> {
        let value = self.cache.get(key, group).await?;
        match serde_json::from_value(value) {
            Ok(payload) => Some(payload),
            Err(err) => {
                log::warn!("Discarding unreadable cached facets in group {group}: {err}");
                None
            }
        }
    }

    async fn fetch(
        &self,
        kind: ProviderKind,
        args: &QueryArgs,
        facets: &[FacetDefinition],
        selected: &Selection,
    ) -> Result<(FacetsPayload, CapturedAggregations)> {
        let provider = self.provider(kind);
        let query = provider.build_query(args, facets, selected)?;
        log::debug!("Facet query for {}: {}", provider.kind(), query.body);
        let raw = provider.fetch(&query).await?;
        let ctx = ParseContext {
            registry: self.registry.provider(provider.kind()),
            selection: selected,
            query: args,
        };
        let parsed = provider.parse_response(raw, &ctx)?;
        let payload = FacetsPayload {
            facets: parsed.facets,
            pagination: parsed.pagination,
            settings: FacetSettings::default(),
        };
        Ok((payload, parsed.captured))
    }
}
