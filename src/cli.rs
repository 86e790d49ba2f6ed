use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    about = "A CLI utility to mirror a website into an offline-browsable static copy",
    version,
    long_about = "Downloads every internally reachable page, stylesheet, script, image and media file of a website exactly once and rewrites internal references to relative local paths so the copy can be browsed offline."
)]
pub struct MirrorCommand {
    /// Root URL of the website to mirror
    #[arg(default_value = "https://abitcons.com/")]
    pub url: String,

    /// Output directory for the mirrored website
    #[arg(short, long, default_value = "static_site")]
    pub output_dir: PathBuf,

    /// User agent string to use for requests
    #[arg(long, default_value = "Mozilla/5.0 (compatible; static-downloader/1.0)")]
    pub user_agent: String,

    /// Timeout for requests in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Number of failed URLs listed in the final summary
    #[arg(long, default_value_t = 20)]
    pub max_failures_shown: usize,

    /// Write a JSON report of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log every scheduled and processed URL
    #[arg(short, long)]
    pub verbose: bool,
}
