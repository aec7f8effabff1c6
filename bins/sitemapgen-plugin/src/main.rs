//! Webserver-side sender demo (`spec.md` 4.D "URL pipe", 6 "External
//! interfaces"), grounded on `bins/obsidian/src/main.rs`'s writer-side
//! shape: attach to the shared ring and push records in, one thread per
//! feed. Stands in for the real webserver module, which would call this
//! same `PipeSender` API from inside the request path instead of reading
//! a demo feed from stdin.

use anyhow::{bail, Context, Result};
use sitemapgen_events::UrlRecord;
use sitemapgen_icc::{PipeConfig, PipeSender};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// One line of the demo feed: tab-separated `siteid\thost\turl\tstatus`.
/// A real webserver module would build these fields from the request it
/// just served instead of parsing them back out of text.
fn parse_feed_line(line: &str) -> Option<UrlRecord> {
    let mut parts = line.splitn(4, '\t');
    let siteid = parts.next()?;
    let host = parts.next()?;
    let url = parts.next()?;
    let status: i32 = parts.next()?.trim().parse().ok()?;
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs() as i64;
    Some(UrlRecord::new(url, host, siteid, status, -1, now, now, now))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let mut args = std::env::args().skip(1);
    let app_name = args.next().unwrap_or_else(|| "sitemapgen".to_string());
    let run_dir = PathBuf::from(args.next().unwrap_or_else(|| "/var/run/sitemapgen".to_string()));

    let config = PipeConfig {
        app_name,
        run_dir,
        pipe_name: "urls".to_string(),
        capacity: 1000,
        send_wait_ms: 100,
        retrieve_period: Duration::from_secs(1),
    };
    let mut sender = PipeSender::new(config);

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read feed line")?;
        if line.trim().is_empty() {
            continue;
        }
        let Some(record) = parse_feed_line(&line) else {
            tracing::warn!(line = %line, "skipping malformed feed line");
            continue;
        };

        let mut sent = sender.send(std::slice::from_ref(&record))?;
        let mut attempts = 0;
        while sent == 0 && attempts < 3 {
            tracing::debug!("receiver unavailable, retrying");
            std::thread::sleep(Duration::from_millis(200));
            sent = sender.send(std::slice::from_ref(&record))?;
            attempts += 1;
        }
        if sent == 0 {
            bail!("daemon unreachable after retries, is sitemapgend running?");
        }
    }

    sender.detach();
    Ok(())
}
