use anyhow::{anyhow, Context, Result};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// The website being mirrored. Classification of URLs depends on nothing
/// else, so a single value is built at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct TargetSite {
    root: Url,
    base_domain: String,
}

impl TargetSite {
    pub fn new(root_url: &str) -> Result<Self> {
        let root = Url::parse(root_url)
            .with_context(|| format!("Failed to parse root URL: {}", root_url))?;
        let base_domain = root
            .host_str()
            .map(|host| host.to_ascii_lowercase())
            .ok_or_else(|| anyhow!("Root URL has no host: {}", root_url))?;

        Ok(Self { root, base_domain })
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Classifies a URL string. Bare paths carry no host and are always
    /// internal; anything else that fails to parse is treated as external.
    pub fn is_internal(&self, url: &str) -> bool {
        if url.starts_with("//") {
            let with_scheme = format!("{}:{}", self.root.scheme(), url);
            return Url::parse(&with_scheme)
                .map(|parsed| self.is_internal_url(&parsed))
                .unwrap_or(false);
        }

        match Url::parse(url) {
            Ok(parsed) => self.is_internal_url(&parsed),
            Err(url::ParseError::RelativeUrlWithoutBase) => true,
            Err(_) => false,
        }
    }

    pub fn is_internal_url(&self, url: &Url) -> bool {
        match url.host_str() {
            None => true,
            Some(host) => {
                let host = host.to_ascii_lowercase();
                host == self.base_domain
                    || host
                        .strip_suffix(self.base_domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }
}

/// Maps a URL onto a `/`-separated path under the output root.
///
/// Directory-style URLs (trailing slash, or a last segment without an
/// extension) become `<path>/index.html`; everything else keeps its path.
/// The result stays percent-encoded, matching what ends up in rewritten
/// references.
pub fn local_path(url: &Url) -> String {
    let mut path = url.path().to_string();
    if path.is_empty() {
        path.push('/');
    }

    if path.ends_with('/') {
        path.push_str("index.html");
    } else {
        let last_segment = path.rsplit('/').next().unwrap_or_default();
        if !has_extension(last_segment) {
            path.push_str("/index.html");
        }
    }

    path.trim_start_matches('/').to_string()
}

/// URL of the mirrored copy itself: the directory-index form of `url`.
/// References in an already rewritten file are relative to this location,
/// not to the URL the file was fetched from.
pub fn location_url(url: &Url) -> Url {
    let mut location = url.clone();
    location.set_path(&format!("/{}", local_path(url)));
    location.set_query(None);
    location.set_fragment(None);
    location
}

fn has_extension(segment: &str) -> bool {
    // Leading dots mark hidden files, not extensions.
    segment.trim_start_matches('.').contains('.')
}

/// Relative reference from the directory holding `from_local` to
/// `to_local`, with the original query and fragment re-appended.
pub fn relative_reference(
    from_local: &str,
    to_local: &str,
    query: Option<&str>,
    fragment: Option<&str>,
) -> String {
    let from_dir = Path::new(from_local).parent().unwrap_or(Path::new(""));
    let relative = pathdiff::diff_paths(Path::new(to_local), from_dir)
        .unwrap_or_else(|| PathBuf::from(to_local));

    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();

    let mut reference = segments.join("/");
    if segments.first().is_some_and(|first| first.contains(':')) {
        reference.insert_str(0, "./");
    }

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        reference.push('?');
        reference.push_str(query);
    }
    if let Some(fragment) = fragment.filter(|f| !f.is_empty()) {
        reference.push('#');
        reference.push_str(fragment);
    }

    reference
}
