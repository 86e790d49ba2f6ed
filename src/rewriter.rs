use url::Url;

use crate::site::{local_path, relative_reference, TargetSite};

/// Schemes that never point at a fetchable resource.
const SKIP_SCHEMES: [&str; 4] = ["mailto", "tel", "javascript", "data"];

/// Capability used by the transformers to hand newly discovered URLs to the
/// crawl frontier. Implementations must tolerate repeated calls for the same
/// URL.
#[cfg_attr(test, mockall::automock)]
pub trait Schedule {
    fn schedule(&mut self, url: &str);
}

/// Everything a single document pass needs to rewrite its references.
pub struct RewriteContext<'a> {
    site: &'a TargetSite,
    base_url: Url,
    // Set once a `<base href>` moved resolution away from the document URL.
    base_overridden: bool,
    local_path: &'a str,
    scheduler: &'a mut dyn Schedule,
}

impl<'a> RewriteContext<'a> {
    pub fn new(
        site: &'a TargetSite,
        base_url: &Url,
        local_path: &'a str,
        scheduler: &'a mut dyn Schedule,
    ) -> Self {
        Self {
            site,
            base_url: base_url.clone(),
            base_overridden: false,
            local_path,
            scheduler,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Replaces the URL that later references are resolved against, as a
    /// document's `<base href>` does. External relative references are then
    /// written out in absolute form, since the mirrored copy has no `<base>`.
    pub fn set_base_url(&mut self, base_url: Url) {
        self.base_url = base_url;
        self.base_overridden = true;
    }

    pub fn local_path(&self) -> &str {
        self.local_path
    }

    /// Returns the string to put in place of `raw`: a relative path to the
    /// mirrored copy for internal URLs, `raw` itself for everything else.
    pub fn rewrite_url(&mut self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return raw.to_string();
        }

        if let Some(scheme) = explicit_scheme(trimmed) {
            if SKIP_SCHEMES
                .iter()
                .any(|skip| scheme.eq_ignore_ascii_case(skip))
            {
                return raw.to_string();
            }
        }

        // `join` also covers protocol-relative references, which inherit the
        // scheme of the base.
        let absolute = match self.base_url.join(trimmed) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(reference = raw, error = %e, "leaving malformed reference unchanged");
                return raw.to_string();
            }
        };

        if !matches!(absolute.scheme(), "http" | "https") || !self.site.is_internal_url(&absolute) {
            if self.base_overridden && explicit_scheme(trimmed).is_none() {
                return absolute.to_string();
            }
            return raw.to_string();
        }

        let mut target = absolute.clone();
        target.set_fragment(None);
        self.scheduler.schedule(target.as_str());

        relative_reference(
            self.local_path,
            &local_path(&target),
            absolute.query(),
            absolute.fragment(),
        )
    }

    /// Rewrites every URL of a `srcset` list, keeping width/density
    /// descriptors as they are.
    pub fn rewrite_srcset(&mut self, value: &str) -> String {
        let mut entries = Vec::new();
        for candidate in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            let mut tokens = candidate.split_whitespace();
            let Some(raw_url) = tokens.next() else {
                continue;
            };
            let mut entry = self.rewrite_url(raw_url);
            for descriptor in tokens {
                entry.push(' ');
                entry.push_str(descriptor);
            }
            entries.push(entry);
        }
        entries.join(", ")
    }
}

fn explicit_scheme(reference: &str) -> Option<&str> {
    let (scheme, _) = reference.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    let valid = first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}
