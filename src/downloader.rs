use anyhow::Result;
use encoding_rs::{Encoding, UTF_8};
use indicatif::{ProgressBar, ProgressStyle};
use mime::Mime;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::css::rewrite_css;
use crate::error::{FetchError, MirrorError};
use crate::file_manager::FileManager;
use crate::frontier::{FetchAttempts, Frontier, PathClaims};
use crate::html_rewriter::rewrite_html;
use crate::report::MirrorReport;
use crate::rewriter::{RewriteContext, Schedule};
use crate::site::{local_path, location_url, TargetSite};

const PROGRESS_INTERVAL: usize = 50;

/// A fetched resource, after redirects.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Transport used to retrieve a URL. The crawl awaits one fetch at a time.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, FetchError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(FetchedResource {
            final_url,
            content_type,
            body,
        })
    }
}

/// Which transformer a resource goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
    Raw,
}

impl ContentKind {
    fn from_mime(mime: &Mime) -> Self {
        match (mime.type_(), mime.subtype()) {
            (mime::TEXT, mime::HTML) => ContentKind::Html,
            (mime::TEXT, mime::CSS) => ContentKind::Css,
            _ => ContentKind::Raw,
        }
    }

    /// Guesses from the file extension of a local path.
    pub fn from_path(local_path: &str) -> Self {
        mime_guess::from_path(local_path)
            .first()
            .map(|mime| Self::from_mime(&mime))
            .unwrap_or(ContentKind::Raw)
    }

    fn of_response(mime: Option<&Mime>, final_url: &Url, local_path: &str) -> Self {
        match mime.map(Self::from_mime) {
            Some(ContentKind::Html) => ContentKind::Html,
            _ if final_url.path().ends_with('/') => ContentKind::Html,
            Some(kind) => kind,
            None => Self::from_path(local_path),
        }
    }
}

/// What happened to a popped URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fetched,
    Refreshed,
    Unchanged,
    RedirectedOffsite,
    AlreadyAttempted,
}

pub struct WebsiteMirror<F: Fetch> {
    site: TargetSite,
    fetcher: F,
    file_manager: FileManager,
    frontier: Frontier,
    claims: PathClaims,
    attempts: FetchAttempts,
    report: MirrorReport,
}

impl<F: Fetch> WebsiteMirror<F> {
    pub fn new(site: TargetSite, fetcher: F, output_dir: &Path) -> Result<Self> {
        let file_manager = FileManager::new(output_dir)?;
        let frontier = Frontier::new(site.clone());

        Ok(Self {
            site,
            fetcher,
            file_manager,
            frontier,
            claims: PathClaims::new(),
            attempts: FetchAttempts::new(),
            report: MirrorReport::new(),
        })
    }

    pub fn file_manager(&self) -> &FileManager {
        &self.file_manager
    }

    /// Crawls until the frontier is empty. Per-URL failures end up in the
    /// report; nothing short of process termination stops the loop.
    pub async fn run(mut self) -> MirrorReport {
        self.frontier.schedule(self.site.root().as_str());

        let progress_bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            progress_bar.set_style(style);
        }

        while let Some(url) = self.frontier.pop() {
            progress_bar.set_message(format!("[{} queued] {}", self.frontier.pending(), url));

            match self.process(&url).await {
                Ok(Outcome::RedirectedOffsite) => {
                    tracing::info!(url = %url, "redirected off-site, discarded");
                }
                Ok(Outcome::AlreadyAttempted) => {
                    tracing::debug!(url = %url, "resource already fetched under another spelling");
                }
                Ok(outcome) => {
                    tracing::debug!(url = %url, ?outcome, "processed");
                    let processed = self.report.record_processed();
                    if processed % PROGRESS_INTERVAL == 0 {
                        progress_bar.println(format!("Downloaded {} files...", processed));
                    }
                }
                Err(error) => {
                    tracing::warn!(url = %url, %error, "failed");
                    self.report.record_failure(&url, &error);
                }
            }
        }

        progress_bar.finish_and_clear();
        self.report
    }

    async fn process(&mut self, url: &str) -> Result<Outcome, MirrorError> {
        let parsed = Url::parse(url).map_err(|source| MirrorError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let local = local_path(&parsed);
        if self.file_manager.exists(&local) {
            self.claims.claim(&parsed, &local)?;
            return self.refresh_local(&parsed, &local);
        }

        if !self.attempts.first_attempt(&parsed, &local) {
            return Ok(Outcome::AlreadyAttempted);
        }
        let resource = self.fetcher.fetch(&parsed).await?;
        let final_url = resource.final_url;
        if !self.site.is_internal_url(&final_url) {
            return Ok(Outcome::RedirectedOffsite);
        }
        if final_url != parsed {
            self.frontier.mark_scheduled(final_url.as_str());
        }

        let local = local_path(&final_url);
        self.claims.claim(&final_url, &local)?;

        let mime = resource
            .content_type
            .as_deref()
            .and_then(|value| value.parse::<Mime>().ok());
        let kind = ContentKind::of_response(mime.as_ref(), &final_url, &local);

        let content = match kind {
            ContentKind::Raw => resource.body,
            ContentKind::Html | ContentKind::Css => {
                let text = decode_body(&resource.body, mime.as_ref());
                let mut ctx =
                    RewriteContext::new(&self.site, &final_url, &local, &mut self.frontier);
                transform(kind, &text, &mut ctx).into_bytes()
            }
        };

        self.file_manager.write(&local, &content)?;
        Ok(Outcome::Fetched)
    }

    /// Re-rewrites a file mirrored earlier so references scheduled since
    /// then are picked up, without fetching it again.
    fn refresh_local(&mut self, url: &Url, local: &str) -> Result<Outcome, MirrorError> {
        let kind = ContentKind::from_path(local);
        if kind == ContentKind::Raw {
            return Ok(Outcome::Unchanged);
        }

        let text = self.file_manager.read_text_lossy(local)?;
        let base = location_url(url);
        let mut ctx = RewriteContext::new(&self.site, &base, local, &mut self.frontier);
        let output = transform(kind, &text, &mut ctx);

        if output == text {
            return Ok(Outcome::Unchanged);
        }
        self.file_manager.write(local, output.as_bytes())?;
        Ok(Outcome::Refreshed)
    }
}

fn transform(kind: ContentKind, text: &str, ctx: &mut RewriteContext<'_>) -> String {
    match kind {
        ContentKind::Html => rewrite_html(text, ctx),
        ContentKind::Css => rewrite_css(text, ctx),
        ContentKind::Raw => text.to_string(),
    }
}

/// Decodes a text body using the charset of its content type, replacing
/// undecodable bytes.
pub fn decode_body(body: &[u8], mime: Option<&Mime>) -> String {
    let encoding = mime
        .and_then(|mime| mime.get_param(mime::CHARSET))
        .and_then(|charset| Encoding::for_label(charset.as_str().as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}
