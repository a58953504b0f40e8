use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use abrdl::{
    load_catalog, storage::SegmentStorage, AbrStorage, AddressResolver, FixedSelector,
    HttpClient, HttpTransport, ManifestLocation, RepresentationCatalog, RetryPolicy,
    SegmentFetchLoop, SessionConfig, SessionSummary,
};
use anyhow::Context;
use clap::{Args, Parser};
use clap_handler::handler;
use fake_user_agent::get_chrome_rua;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Clone, Default)]
#[clap(name = "download", visible_alias = "dl", short_flag = 'D')]
pub struct DownloadCommand {
    #[clap(flatten)]
    pub http: HttpOptions,

    #[clap(flatten)]
    pub manifest: ManifestOptions,

    #[clap(flatten)]
    pub abr: AbrOptions,

    #[clap(flatten)]
    pub output: OutputOptions,

    /// Manifest URL or local path
    pub url: String,
}

impl DownloadCommand {
    pub async fn download(self) -> anyhow::Result<()> {
        let location = ManifestLocation::parse(&self.url)?;
        let client = self.http.into_client(&location)?;
        let catalog = self.manifest.load(&client, &location).await?;
        for representation in catalog.iter() {
            tracing::info!(
                "Representation {}: {} bps{}",
                representation.id,
                representation.bandwidth,
                representation
                    .resolution()
                    .map(|r| format!(", {r}"))
                    .unwrap_or_default()
            );
        }

        let resolver = match self.abr.default_root.clone() {
            Some(root) => AddressResolver::new(Some(root)),
            None => match location.url() {
                Some(url) => AddressResolver::from_manifest_url(url),
                None => {
                    tracing::warn!(
                        "No --default-root given for a local manifest, relative segment addresses will not resolve."
                    );
                    AddressResolver::default()
                }
            },
        };

        let config = self.abr.session_config();
        config.validate()?;

        let storage = self.output.into_storage();
        if let Some(location) = storage.location_hint() {
            tracing::info!("Saving segments to {location}");
        }

        let token = CancellationToken::new();
        tokio::spawn({
            let token = token.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Ctrl-C received, stopping after in-flight segments...");
                    token.cancel();
                }
            }
        });

        let transport = HttpTransport::new(client);
        let summary = match self.abr.representation {
            Some(id) => {
                let selector = FixedSelector::new(&catalog, id)?;
                let mut session = SegmentFetchLoop::new(transport, storage, resolver, config)
                    .with_selector(selector)
                    .with_cancellation_token(token);
                session.run_catalog(&catalog).await
            }
            None => {
                let mut session = SegmentFetchLoop::new(transport, storage, resolver, config)
                    .with_cancellation_token(token);
                session.run_catalog(&catalog).await
            }
        };

        report(&summary);
        if summary.failed > 0 {
            anyhow::bail!("{} segment(s) failed", summary.failed);
        }
        Ok(())
    }
}

fn report(summary: &SessionSummary) {
    eprintln!(
        "Succeeded: {}, failed: {}, cancelled: {}, skipped: {}",
        summary.succeeded, summary.failed, summary.cancelled, summary.skipped
    );
    eprintln!(
        "Downloaded {:.2} MiB, final bandwidth estimate {:.2} Kbps",
        summary.bytes as f64 / 1024.0 / 1024.0,
        summary.final_estimate_kbps
    );
}

#[derive(Args, Clone, Debug)]
pub struct HttpOptions {
    /// Additional HTTP headers
    #[clap(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Cookies sent with every request to the manifest host
    #[clap(short = 'c', long = "cookie")]
    pub cookies: Vec<String>,

    /// HTTP timeout, in seconds
    #[clap(short, long, default_value = "10")]
    pub timeout: u64,
}

impl HttpOptions {
    pub fn into_client(self, location: &ManifestLocation) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();

        for header in &self.headers {
            let (key, value) = header
                .split_once(':')
                .with_context(|| format!("Invalid header: {header}"))?;
            headers.insert(
                HeaderName::from_str(key.trim())
                    .with_context(|| format!("Invalid header name: {key}"))?,
                HeaderValue::from_str(value.trim())
                    .with_context(|| format!("Invalid header value: {value}"))?,
            );
        }

        let client = HttpClient::new(
            Client::builder()
                .default_headers(headers)
                .user_agent(get_chrome_rua())
                .timeout(Duration::from_secs(self.timeout)),
        )?;
        if let Some(url) = location.url() {
            client.add_cookies(self.cookies, url.clone())?;
        }

        Ok(client)
    }
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            cookies: Vec::new(),
            timeout: 10,
        }
    }
}

/// Which part of the manifest to download
#[derive(Args, Clone, Debug, Default)]
pub struct ManifestOptions {
    /// Index of the period
    #[clap(long, default_value = "0")]
    pub period: usize,

    /// Index of the adaptation set within the period
    #[clap(long, visible_alias = "as", default_value = "0")]
    pub adaptation_set: usize,
}

impl ManifestOptions {
    pub async fn load(
        &self,
        client: &HttpClient,
        location: &ManifestLocation,
    ) -> anyhow::Result<RepresentationCatalog> {
        load_catalog(client, location, self.period, self.adaptation_set)
            .await
            .with_context(|| format!("Failed to load manifest {location:?}"))
    }
}

#[derive(Args, Clone, Debug)]
pub struct AbrOptions {
    /// Bandwidth assumed before the first segment completes, in Kbps
    #[clap(short = 'b', long = "bandwidth", default_value = "5000")]
    pub initial_bandwidth: f64,

    /// Number of segments to download. Derived from the manifest by default
    #[clap(short = 'n', long)]
    pub segments: Option<u64>,

    /// First segment number. Defaults to the manifest's startNumber
    #[clap(long)]
    pub start_number: Option<u64>,

    /// Maximum number of segments downloading at the same time
    #[clap(long, default_value = "1")]
    pub lookahead: NonZeroU32,

    /// Payloads of at most this many bytes are treated as failures
    #[clap(long, default_value = "50")]
    pub min_segment_size: usize,

    /// Segment retry limit
    #[clap(long, default_value = "0")]
    pub segment_retries: u32,

    /// Always download this representation instead of adapting
    #[clap(short = 'r', long)]
    pub representation: Option<String>,

    /// Root for segment addresses when the manifest has no BaseURL.
    /// Defaults to the directory of the manifest URL
    #[clap(long)]
    pub default_root: Option<String>,

    /// Do not download initialization segments
    #[clap(long)]
    pub no_init: bool,
}

impl AbrOptions {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            initial_bandwidth_kbps: self.initial_bandwidth,
            segment_count: self.segments,
            start_number: self.start_number,
            lookahead: self.lookahead,
            min_segment_size: self.min_segment_size,
            retry: RetryPolicy {
                retries: self.segment_retries,
                ..RetryPolicy::none()
            },
            fetch_initialization: !self.no_init,
        }
    }
}

impl Default for AbrOptions {
    fn default() -> Self {
        Self {
            initial_bandwidth: 5000.0,
            segments: None,
            start_number: None,
            lookahead: NonZeroU32::MIN,
            min_segment_size: 50,
            segment_retries: 0,
            representation: None,
            default_root: None,
            no_init: false,
        }
    }
}

/// Output options
#[derive(Args, Clone, Debug)]
pub struct OutputOptions {
    /// Directory segments are written to
    #[clap(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Keep segments in memory and discard them at exit
    #[clap(long)]
    pub discard: bool,
}

impl OutputOptions {
    pub fn into_storage(self) -> AbrStorage {
        if self.discard {
            AbrStorage::memory()
        } else {
            AbrStorage::file(self.output)
        }
    }
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("."),
            discard: false,
        }
    }
}

#[handler(DownloadCommand)]
pub async fn download(args: DownloadCommand) -> anyhow::Result<()> {
    args.download().await
}
