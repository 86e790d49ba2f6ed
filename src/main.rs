use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

use site_mirror::logging::init_logging;
use site_mirror::{HttpFetcher, MirrorCommand, TargetSite, WebsiteMirror};

#[tokio::main]
async fn main() -> Result<()> {
    let args = MirrorCommand::parse();
    init_logging(args.verbose);

    let site = TargetSite::new(&args.url)?;
    let fetcher = HttpFetcher::new(&args.user_agent, Duration::from_secs(args.timeout))?;
    let mirror = WebsiteMirror::new(site, fetcher, &args.output_dir)?;

    println!("🚀 Mirroring {}", args.url.blue());
    println!("📁 Output directory: {:?}", args.output_dir);

    let report = mirror.run().await;

    let summary = report.render_summary(&args.output_dir, args.max_failures_shown);
    if report.failures().is_empty() {
        print!("{}", summary.green());
    } else {
        print!("{}", summary.yellow());
    }

    if let Some(path) = &args.report {
        report.write_json(path)?;
        println!("📝 Report written to {:?}", path);
    }

    // Partial failures still leave a usable mirror.
    Ok(())
}
