//! Daemon entrypoint (`spec.md` section 5), grounded on
//! `bins/obsidian/src/main.rs`'s thin-`main`-spawns-workers shape: load
//! config, wire per-site services into the scheduler, and drain the pipe
//! on a dedicated receiver thread. Unlike the teacher's demo binaries this
//! one actually blocks for the process lifetime, polling for the two
//! signals `spec.md` 5 assigns: one for clean shutdown, one for a
//! settings reload.

use anyhow::{Context, Result};
use sitemapgen_config::{DaemonConfig, SiteConfig};
use sitemapgen_core::{BackupService, SiteDataManager};
use sitemapgen_icc::{PipeConfig, PipeReceiver};
use sitemapgen_providers::{FileScanner, LogParser};
use sitemapgen_scheduler::{Scheduler, Service};
use sitemapgen_sitemap::{blog_ping_informer, ping_informer, BlogPingService, Informer, NewsSitemapService, PlainSitemapService, SitemapFlavor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// The sitemap protocol's own limits (sitemaps.org): 50,000 URLs or 10 MB
/// uncompressed per file, whichever comes first.
const SITEMAP_MAX_URLS: usize = 50_000;
const SITEMAP_MAX_BYTES: usize = 10 * 1024 * 1024;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);
static RELOAD_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_shutdown_signal(_: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

extern "C" fn on_reload_signal(_: libc::c_int) {
    RELOAD_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, on_shutdown_signal as usize);
        libc::signal(libc::SIGINT, on_shutdown_signal as usize);
        libc::signal(libc::SIGHUP, on_reload_signal as usize);
    }
}

/// Per-site state kept alive across a settings reload so in-memory records
/// that haven't been flushed yet survive it.
struct SiteRuntime {
    config: SiteConfig,
    data: Arc<SiteDataManager>,
}

type SiteMap = HashMap<String, SiteRuntime>;

/// Loads `<physical_path>/robots.txt`, if present, into a [`RobotsFilter`]
/// so the inbound record pipeline honors the site's actual disallow rules.
fn load_robots_filter(site_config: &SiteConfig) -> sitemapgen_core::RobotsFilter {
    let path = Path::new(&site_config.physical_path).join("robots.txt");
    match std::fs::read_to_string(&path) {
        Ok(text) => sitemapgen_core::RobotsFilter::new(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => sitemapgen_core::RobotsFilter::empty(),
        Err(e) => {
            tracing::warn!(site = %site_config.site_id, path = %path.display(), error = %e, "failed to read robots.txt, accepting everything");
            sitemapgen_core::RobotsFilter::empty()
        }
    }
}

fn build_sites(config: &DaemonConfig, data_root: &Path, previous: &SiteMap) -> Result<SiteMap> {
    let mut sites = SiteMap::new();
    for site_config in &config.sites {
        let data = match previous.get(&site_config.site_id) {
            Some(existing) => Arc::clone(&existing.data),
            None => {
                let dir = data_root.join(&site_config.site_id);
                let mut manager = SiteDataManager::new(site_config, &dir).with_context(|| format!("opening site data for '{}'", site_config.site_id))?;
                manager.set_robots_filter(load_robots_filter(site_config));
                Arc::new(manager)
            }
        };
        sites.insert(site_config.site_id.clone(), SiteRuntime { config: site_config.clone(), data });
    }
    for (site_id, removed) in previous.iter().filter(|(id, _)| !sites.contains_key(*id)) {
        if let Err(e) = removed.data.save_memory_data(true, true) {
            tracing::warn!(site = %site_id, error = %e, "failed to flush removed site before unload");
        }
        tracing::info!(site = %site_id, "site removed from settings, unloaded");
    }
    Ok(sites)
}

fn build_informers(templates: &[String]) -> Vec<Informer> {
    templates.iter().map(|t| ping_informer(t.clone())).collect()
}

fn build_services(sites: &SiteMap, run_dir: &Path) -> Vec<Arc<dyn Service>> {
    let mut services: Vec<Arc<dyn Service>> = Vec::new();

    for runtime in sites.values() {
        let cfg = &runtime.config;
        let data = Arc::clone(&runtime.data);
        let site_dir = data.file_manager().dir().to_path_buf();
        let public_base_url = cfg.host_url.clone().unwrap_or_default();
        let informers = build_informers(&cfg.ping_url_templates);

        services.push(Arc::new(BackupService::new(cfg.site_id.clone(), Arc::clone(&data), cfg.backup_duration_secs)));

        services.push(Arc::new(PlainSitemapService::new(
            SitemapFlavor::Web,
            Arc::clone(&data),
            &site_dir,
            public_base_url.clone(),
            cfg.include_patterns.clone(),
            cfg.exclude_patterns.clone(),
            informers.clone(),
            cfg.sitemap_duration_secs,
            false,
            SITEMAP_MAX_BYTES,
            SITEMAP_MAX_URLS,
            Path::new(&cfg.physical_path).join("robots.txt"),
            cfg.update_robots,
        )));

        match NewsSitemapService::new(Arc::clone(&data), &site_dir, cfg.news_expire_secs, cfg.news_max_urls, informers.clone(), cfg.sitemap_duration_secs, public_base_url.clone()) {
            Ok(news) => services.push(Arc::new(news)),
            Err(e) => tracing::error!(site = %cfg.site_id, error = %e, "failed to start news sitemap service"),
        }

        if let Some(template) = cfg.ping_url_templates.first() {
            let informer = blog_ping_informer(template.clone());
            match BlogPingService::new(Arc::clone(&data), &site_dir, informer, template.clone(), cfg.sitemap_duration_secs) {
                Ok(blog) => services.push(Arc::new(blog)),
                Err(e) => tracing::error!(site = %cfg.site_id, error = %e, "failed to start blog ping service"),
            }
        }

        match FileScanner::new(&cfg.site_id, Arc::clone(&data), &cfg.physical_path, run_dir, cfg.sitemap_duration_secs) {
            Ok(scanner) => services.push(Arc::new(scanner)),
            Err(e) => tracing::error!(site = %cfg.site_id, error = %e, "failed to start file scanner"),
        }

        if let Some(log_path) = &cfg.log_path {
            match LogParser::new(&cfg.site_id, Arc::clone(&data), log_path, run_dir, cfg.sitemap_duration_secs) {
                Ok(parser) => services.push(Arc::new(parser)),
                Err(e) => tracing::error!(site = %cfg.site_id, error = %e, "failed to start log parser"),
            }
        }
    }

    services
}

/// Drains the pipe forever, routing each record to its site by the
/// wire-format `siteid` field and triggering a flush once a site's
/// in-memory table crosses its configured threshold. Runs across settings
/// reloads; only the site lookup table underneath it changes.
fn spawn_receiver(config: &DaemonConfig, sites: Arc<RwLock<SiteMap>>) -> Result<std::thread::JoinHandle<()>> {
    let pipe_config = PipeConfig {
        app_name: config.app_name.clone(),
        run_dir: PathBuf::from(&config.run_dir),
        pipe_name: "urls".to_string(),
        capacity: config.ring_capacity,
        send_wait_ms: config.send_wait_ms,
        retrieve_period: config.retrieve_period(),
    };
    let mut receiver = PipeReceiver::init(pipe_config).context("failed to initialize pipe receiver")?;

    Ok(std::thread::spawn(move || loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            receiver.teardown();
            return;
        }
        let records = match receiver.receive() {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "pipe receive failed");
                continue;
            }
        };

        let sites = sites.read().unwrap();
        let mut touched: Vec<Arc<SiteDataManager>> = Vec::new();
        for record in records {
            let Some(runtime) = sites.get(&record.siteid()) else {
                tracing::debug!(siteid = %record.siteid(), "dropping record for unknown site");
                continue;
            };
            runtime.data.process_record(record);
            if !touched.iter().any(|d| Arc::ptr_eq(d, &runtime.data)) {
                touched.push(Arc::clone(&runtime.data));
            }
        }
        drop(sites);

        for data in touched {
            if data.memory_needs_flush() {
                if let Err(e) = data.save_memory_data(true, false) {
                    tracing::error!(error = %e, "failed to flush in-memory records");
                }
            }
        }
    }))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "/etc/sitemapgen/config.toml".to_string());
    install_signal_handlers();

    let mut config = DaemonConfig::load(&config_path).context("failed to load daemon config")?;
    let mut sites = build_sites(&config, Path::new(&config.data_root), &SiteMap::new())?;
    let shared_sites = Arc::new(RwLock::new(SiteMap::new()));
    *shared_sites.write().unwrap() = std::mem::take(&mut sites);

    let run_dir = PathBuf::from(&config.run_dir);
    let _receiver_handle = spawn_receiver(&config, Arc::clone(&shared_sites))?;

    loop {
        let services = build_services(&shared_sites.read().unwrap(), &run_dir);
        let mut scheduler = Scheduler::new(services, config.scheduler_workers * 4);
        scheduler.start(config.scheduler_workers);
        tracing::info!(sites = shared_sites.read().unwrap().len(), "scheduler started");

        loop {
            std::thread::sleep(Duration::from_millis(500));

            if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
                tracing::info!("shutdown requested, flushing sites and stopping scheduler");
                scheduler.stop_service();
                for runtime in shared_sites.read().unwrap().values() {
                    if let Err(e) = runtime.data.save_memory_data(true, false) {
                        tracing::error!(site = %runtime.config.site_id, error = %e, "failed to flush on shutdown");
                    }
                }
                return Ok(());
            }

            if RELOAD_REQUESTED.swap(false, Ordering::SeqCst) {
                tracing::info!("reload requested, re-reading settings");
                match DaemonConfig::load(&config_path) {
                    Ok(new_config) => {
                        scheduler.stop_service();
                        let rebuilt = build_sites(&new_config, Path::new(&new_config.data_root), &shared_sites.read().unwrap())?;
                        *shared_sites.write().unwrap() = rebuilt;
                        config = new_config;
                        break;
                    }
                    Err(e) => tracing::error!(error = %e, "failed to reload settings, keeping current generation running"),
                }
            }
        }
    }
}
