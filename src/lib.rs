pub mod cli;
pub mod css;
pub mod downloader;
pub mod error;
pub mod file_manager;
pub mod frontier;
pub mod html_rewriter;
pub mod logging;
pub mod report;
pub mod rewriter;
pub mod site;

// Re-export main types for convenience
pub use cli::MirrorCommand;
pub use css::rewrite_css;
pub use downloader::{ContentKind, Fetch, FetchedResource, HttpFetcher, Outcome, WebsiteMirror};
pub use error::{FetchError, MirrorError};
pub use file_manager::FileManager;
pub use frontier::{FetchAttempts, Frontier, PathClaims};
pub use html_rewriter::{attribute_policy, rewrite_html, AttributePolicy};
pub use report::{Failure, MirrorReport};
pub use rewriter::{RewriteContext, Schedule};
pub use site::{local_path, location_url, relative_reference, TargetSite};
