use anyhow::{Context as AnyhowContext, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use clap::{Args, Parser, Subcommand};
use facets_engine::{
    present_payload, selection_tokens, AggregationAdapter, CacheBackend, CacheConfig, ChoiceLists,
    FacetRegistry, FacetRequest, FacetResolver, IndexerAdapter, ProviderKind, Resolution,
    SelectedToken,
};
use facets_protocol::{serialize_json, FacetDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod http_api;
mod server_security;
mod transport;

pub use transport::HttpTransport;

const DEFAULT_TEMPLATE_SLUG: &str = "archive";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "facets")]
#[command(about = "Faceted search resolution for listing pages", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Facet registry TOML; the built-in catalog is used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory for the file backend
    #[arg(long, global = true, default_value = ".facets/cache")]
    cache_dir: String,

    /// Cache TTL in seconds
    #[arg(long, global = true, default_value_t = 1_800)]
    cache_ttl_seconds: u64,

    /// Cache backend: file|memory
    #[arg(long, global = true, default_value = "memory")]
    cache_backend: String,

    /// Maximum entries held by the memory backend
    #[arg(long, global = true, default_value_t = 512)]
    cache_capacity: usize,

    /// REST base of the self-hosted indexer
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080/wp-json")]
    indexer_url: String,

    /// Search engine index URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:9200/posts")]
    search_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the facets API over HTTP
    ServeHttp(ServeArgs),

    /// Print the facet definitions for a site-editor template
    Settings(SettingsArgs),

    /// Resolve one FacetRequest (JSON file or stdin) and print the result
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:7710
    #[arg(long, default_value = "127.0.0.1:7710")]
    bind: String,

    /// Allow binding to non-loopback addresses
    #[arg(long)]
    public: bool,

    /// Honor `context.is_authenticated` from request bodies (only behind an authenticating proxy)
    #[arg(long)]
    trust_client_context: bool,
}

#[derive(Args)]
struct SettingsArgs {
    /// Template slug; slugs containing "search" select the aggregation provider
    #[arg(long, default_value = DEFAULT_TEMPLATE_SLUG)]
    template_slug: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Args)]
struct ResolveArgs {
    /// Path to a FacetRequest JSON file (reads stdin when omitted)
    #[arg(long)]
    request: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

fn parse_cache_backend(value: &str) -> Result<CacheBackend> {
    match value.to_lowercase().as_str() {
        "file" => Ok(CacheBackend::File),
        "memory" => Ok(CacheBackend::Memory),
        other => anyhow::bail!("Unsupported cache backend: {other}"),
    }
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // stdout carries JSON for these commands
    if matches!(cli.command, Commands::Settings(_) | Commands::Resolve(_)) && !cli.verbose {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let cache_cfg = CacheConfig {
        dir: PathBuf::from(&cli.cache_dir),
        ttl: Duration::from_secs(cli.cache_ttl_seconds),
        backend: parse_cache_backend(&cli.cache_backend)?,
        capacity: cli.cache_capacity,
    };
    let resolver = build_resolver(&cli, &cache_cfg)?;

    match cli.command {
        Commands::ServeHttp(args) => serve_http(args, resolver).await?,
        Commands::Settings(args) => run_settings(args, &resolver)?,
        Commands::Resolve(args) => run_resolve(args, &resolver).await?,
    }
    Ok(())
}

fn build_resolver(cli: &Cli, cache_cfg: &CacheConfig) -> Result<Arc<FacetResolver>> {
    let registry = match &cli.config {
        Some(path) => FacetRegistry::load(path),
        None => FacetRegistry::builtin(),
    };
    if cache_cfg.backend == CacheBackend::File {
        cache_cfg
            .ensure_dir()
            .with_context(|| format!("Failed to create cache dir {}", cache_cfg.dir.display()))?;
    }

    let indexer = HttpTransport::new(&cli.indexer_url).context("Failed to build indexer client")?;
    let search = HttpTransport::new(&cli.search_url).context("Failed to build search client")?;
    let resolver = FacetResolver::new(
        Arc::new(registry),
        cache_cfg.open(),
        Arc::new(IndexerAdapter::new(Arc::new(indexer))),
        Arc::new(AggregationAdapter::new(Arc::new(search))),
    )
    .with_ttl(cache_cfg.ttl);
    Ok(Arc::new(resolver))
}

/// Facet settings for one provider, as served by `GET /facets/get-settings`.
#[derive(Debug, Serialize)]
struct SettingsOutput<'a> {
    provider: ProviderKind,
    url_prefix: &'a str,
    facets: &'a [FacetDefinition],
}

fn settings_for<'a>(resolver: &'a FacetResolver, template_slug: &str) -> SettingsOutput<'a> {
    let provider = ProviderKind::from_template_slug(template_slug);
    SettingsOutput {
        provider,
        url_prefix: resolver.registry().provider(provider).url_prefix(),
        facets: resolver.settings(provider),
    }
}

/// A resolution plus the panel's view of it.
#[derive(Debug, Serialize)]
struct ResolveOutput {
    #[serde(flatten)]
    resolution: Resolution,
    presented: BTreeMap<String, ChoiceLists>,
    tokens: Vec<SelectedToken>,
}

async fn resolve_request(resolver: &FacetResolver, request: &FacetRequest) -> ResolveOutput {
    let resolution = resolver.resolve(request).await;
    let catalog = resolver.registry().provider(resolution.provider);
    ResolveOutput {
        presented: present_payload(&resolution.payload, catalog),
        tokens: selection_tokens(resolution.selected()),
        resolution,
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).map_err(Into::into)
    } else {
        serialize_json(value)
    }
}

fn run_settings(args: SettingsArgs, resolver: &FacetResolver) -> Result<()> {
    let output = settings_for(resolver, &args.template_slug);
    print_stdout(&render(&output, args.pretty)?)
}

async fn run_resolve(args: ResolveArgs, resolver: &FacetResolver) -> Result<()> {
    let raw = match &args.request {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };
    let request: FacetRequest =
        serde_json::from_str(&raw).context("Request is not a valid FacetRequest")?;
    let output = resolve_request(resolver, &request).await;
    print_stdout(&render(&output, args.pretty)?)
}

#[derive(Clone)]
struct HttpState {
    resolver: Arc<FacetResolver>,
    trust_client_context: bool,
}

async fn serve_http(args: ServeArgs, resolver: Arc<FacetResolver>) -> Result<()> {
    let checked = server_security::check_bind(&args.bind, args.public).await?;

    let state = Arc::new(HttpState {
        resolver,
        trust_client_context: args.trust_client_context,
    });
    if args.trust_client_context {
        log::warn!("Trusting client-supplied authentication on /facets/resolve");
    }
    let app = Router::new()
        .route("/facets/get-settings", get(http_settings))
        .route("/facets/resolve", post(http_resolve))
        .route("/health", get(http_health))
        .fallback(http_not_found)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    let local_addr = listener.local_addr()?;
    let base_url = format!("http://{local_addr}");

    log::info!("Serving facets API on {base_url}");
    print_stdout(&format!("Facet settings: {base_url}/facets/get-settings?templateSlug=archive"))?;
    print_stdout(&format!("Resolve endpoint: {base_url}/facets/resolve"))?;
    print_stdout(&format!("Health endpoint: {base_url}/health"))?;
    if checked.exposed {
        print_stdout(&format!(
            "Public bind enabled (--public). Resolved addresses: {}",
            checked.describe()
        ))?;
    }

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SettingsParams {
    #[serde(rename = "templateSlug", default = "default_template_slug")]
    template_slug: String,
}

fn default_template_slug() -> String {
    DEFAULT_TEMPLATE_SLUG.to_string()
}

async fn http_settings(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<SettingsParams>,
) -> Result<Response, StatusCode> {
    let output = settings_for(&state.resolver, &params.template_slug);
    http_api::build_response(StatusCode::OK, &output)
}

/// Decodes a `POST /facets/resolve` body. The server has no session of its own, so a
/// client-claimed `is_authenticated` is dropped unless the operator trusts the caller.
fn decode_http_request(
    body: &[u8],
    trust_client_context: bool,
) -> serde_json::Result<FacetRequest> {
    let mut request: FacetRequest = serde_json::from_slice(body)?;
    if !trust_client_context && request.context.is_authenticated {
        log::debug!("Ignoring client-supplied authentication");
        request.context.is_authenticated = false;
    }
    Ok(request)
}

/// Anonymous callers without a cache group get the empty payload unless the server was
/// started with `--trust-client-context`.
async fn http_resolve(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> Result<Response, StatusCode> {
    let request = match decode_http_request(&body, state.trust_client_context) {
        Ok(request) => request,
        Err(err) => {
            let envelope =
                http_api::error_response("invalid_request", format!("Invalid JSON request: {err}"));
            return http_api::build_response(StatusCode::BAD_REQUEST, &envelope);
        }
    };
    let output = resolve_request(&state.resolver, &request).await;
    http_api::build_response(StatusCode::OK, &output)
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
}

async fn http_health() -> Result<Response, StatusCode> {
    let report = HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    };
    http_api::build_response(StatusCode::OK, &report)
}

async fn http_not_found() -> Result<Response, StatusCode> {
    let envelope = http_api::error_response("not_found", "No such route".to_string());
    http_api::build_response(StatusCode::NOT_FOUND, &envelope)
}
