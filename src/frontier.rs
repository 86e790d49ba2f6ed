use std::collections::{HashMap, HashSet, VecDeque};
use url::Url;

use crate::error::MirrorError;
use crate::rewriter::Schedule;
use crate::site::TargetSite;

/// Deduplicated work queue of internal URLs.
///
/// The scheduled set only ever grows, so each distinct URL (compared without
/// its fragment) is enqueued at most once per run.
#[derive(Debug)]
pub struct Frontier {
    site: TargetSite,
    scheduled: HashSet<String>,
    queue: VecDeque<String>,
}

impl Frontier {
    pub fn new(site: TargetSite) -> Self {
        Self {
            site,
            scheduled: HashSet::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Records a URL as seen without queueing it, e.g. the target of a
    /// redirect that has just been handled.
    pub fn mark_scheduled(&mut self, url: &str) {
        self.scheduled.insert(strip_fragment(url).to_string());
    }

    pub fn is_scheduled(&self, url: &str) -> bool {
        self.scheduled.contains(strip_fragment(url))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }
}

impl Schedule for Frontier {
    fn schedule(&mut self, url: &str) {
        if url.is_empty() || !self.site.is_internal(url) {
            return;
        }
        let url = strip_fragment(url);
        if self.scheduled.insert(url.to_string()) {
            tracing::debug!(url, "scheduled");
            self.queue.push_back(url.to_string());
        }
    }
}

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(head, _)| head)
}

/// Which resource a local path was written for. URLs that only differ in
/// directory-index spelling (`/about`, `/about/`, `/about/index.html`) share
/// an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResourceIdentity {
    host: String,
    local_path: String,
    query: String,
}

impl ResourceIdentity {
    fn of(url: &Url, local_path: &str) -> Self {
        Self {
            host: url.host_str().unwrap_or_default().to_ascii_lowercase(),
            local_path: local_path.to_string(),
            query: url.query().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug)]
struct PathClaim {
    identity: ResourceIdentity,
    url: String,
}

/// Tracks which URL owns each local path during a run, so two different
/// resources never end up in the same file.
///
/// Keys are case-folded: on a case-insensitive filesystem `Logo.png` and
/// `logo.png` are the same file.
#[derive(Debug, Default)]
pub struct PathClaims {
    claims: HashMap<String, PathClaim>,
}

impl PathClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `local_path` for `url`, or reports the URL already holding it.
    pub fn claim(&mut self, url: &Url, local_path: &str) -> Result<(), MirrorError> {
        let identity = ResourceIdentity::of(url, local_path);
        let key = local_path.to_lowercase();
        match self.claims.get(&key) {
            Some(existing) if existing.identity != identity => Err(MirrorError::PathCollision {
                local_path: local_path.to_string(),
                claimed_by: existing.url.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.claims.insert(
                    key,
                    PathClaim {
                        identity,
                        url: url.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Resources a fetch was already started for, whatever came of it.
///
/// The frontier compares URL spellings; re-reading a mirrored page can
/// schedule another spelling of a link (`/missing` then
/// `/missing/index.html`) that must not be fetched a second time.
#[derive(Debug, Default)]
pub struct FetchAttempts {
    attempted: HashSet<ResourceIdentity>,
}

impl FetchAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an attempt for `url`; `false` if its resource was tried before.
    pub fn first_attempt(&mut self, url: &Url, local_path: &str) -> bool {
        self.attempted.insert(ResourceIdentity::of(url, local_path))
    }
}
