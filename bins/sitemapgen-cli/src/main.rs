//! Operator CLI (`spec.md` 6's control surface, narrowed per the expanded
//! spec to the subset with meaning outside the excluded admin console):
//! `service {start|stop}`, `reload-setting`, `debug`, `version`, and
//! `get-site-setting`/`set-site-setting` as TOML field reads/writes.
//! Built with `clap` `derive`, the same style `rust-daq`'s CLI binary uses.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sitemapgen_config::DaemonConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sitemapgen-cli")]
#[command(about = "Control surface for the sitemapgend daemon")]
struct Cli {
    #[arg(long, default_value = "/etc/sitemapgen/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start or stop the daemon process.
    Service {
        #[command(subcommand)]
        action: ServiceAction,
    },
    /// Signal a running daemon to re-read its settings file.
    ReloadSetting,
    /// Print daemon and config diagnostics.
    Debug,
    /// Print the CLI's own version.
    Version,
    /// Print one site's settings as TOML.
    GetSiteSetting { site_id: String },
    /// Overwrite a single field of one site's settings.
    SetSiteSetting { site_id: String, field: String, value: String },
    ResetPassword,
    ChangePassword,
    RemoteAdmin,
    CleanRobots,
}

#[derive(Subcommand)]
enum ServiceAction {
    Start,
    Stop,
}

fn pid_path(config: &DaemonConfig) -> PathBuf {
    PathBuf::from(&config.run_dir).join("sitemapgend.pid")
}

fn read_pid(path: &std::path::Path) -> Result<i32> {
    let text = std::fs::read_to_string(path).with_context(|| format!("no pid file at '{}', is the daemon running?", path.display()))?;
    text.trim().parse().context("pid file is corrupt")
}

fn send_signal(config: &DaemonConfig, signal: libc::c_int) -> Result<()> {
    let pid = read_pid(&pid_path(config))?;
    let result = unsafe { libc::kill(pid, signal) };
    if result != 0 {
        bail!("failed to signal daemon pid {pid}: {}", std::io::Error::last_os_error());
    }
    Ok(())
}

fn start_service(config_path: &std::path::Path, config: &DaemonConfig) -> Result<()> {
    let pid_file = pid_path(config);
    if pid_file.exists() {
        if let Ok(pid) = read_pid(&pid_file) {
            if unsafe { libc::kill(pid, 0) } == 0 {
                bail!("daemon already running (pid {pid})");
            }
        }
    }

    let child = std::process::Command::new("sitemapgend").arg(config_path).spawn().context("failed to spawn sitemapgend")?;
    std::fs::create_dir_all(&config.run_dir)?;
    std::fs::write(&pid_file, child.id().to_string())?;
    println!("sitemapgend started (pid {})", child.id());
    Ok(())
}

fn stop_service(config: &DaemonConfig) -> Result<()> {
    send_signal(config, libc::SIGTERM)?;
    std::fs::remove_file(pid_path(config)).ok();
    println!("sitemapgend stopped");
    Ok(())
}

fn get_site_setting(config_path: &std::path::Path, site_id: &str) -> Result<()> {
    let text = std::fs::read_to_string(config_path).with_context(|| format!("failed to read '{}'", config_path.display()))?;
    let doc: toml::Value = text.parse().context("failed to parse config as TOML")?;
    let site = find_site(&doc, site_id)?;
    println!("{}", toml::to_string_pretty(site)?);
    Ok(())
}

/// Classifies a raw CLI argument the way a TOML scalar would be written:
/// `true`/`false` as booleans, anything that parses as an integer or float
/// as a number, everything else as a plain string.
fn coerce_scalar(value: &str) -> toml::Value {
    if let Ok(b) = value.parse::<bool>() {
        return toml::Value::Boolean(b);
    }
    if let Ok(i) = value.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(value.to_string())
}

fn set_site_setting(config_path: &std::path::Path, site_id: &str, field: &str, value: &str) -> Result<()> {
    let text = std::fs::read_to_string(config_path).with_context(|| format!("failed to read '{}'", config_path.display()))?;
    let mut doc: toml::Value = text.parse().context("failed to parse config as TOML")?;
    let parsed_value = coerce_scalar(value);
    {
        let site = find_site_mut(&mut doc, site_id)?;
        let table = site.as_table_mut().context("site entry is not a table")?;
        table.insert(field.to_string(), parsed_value);
    }
    std::fs::write(config_path, toml::to_string_pretty(&doc)?).with_context(|| format!("failed to write '{}'", config_path.display()))?;
    println!("updated {field} for site '{site_id}'");
    Ok(())
}

fn find_site<'a>(doc: &'a toml::Value, site_id: &str) -> Result<&'a toml::Value> {
    doc.get("sites")
        .and_then(|v| v.as_array())
        .and_then(|sites| sites.iter().find(|s| s.get("site_id").and_then(|v| v.as_str()) == Some(site_id)))
        .with_context(|| format!("unknown site id: {site_id}"))
}

fn find_site_mut<'a>(doc: &'a mut toml::Value, site_id: &str) -> Result<&'a mut toml::Value> {
    doc.get_mut("sites")
        .and_then(|v| v.as_array_mut())
        .and_then(|sites| sites.iter_mut().find(|s| s.get("site_id").and_then(|v| v.as_str()) == Some(site_id)))
        .with_context(|| format!("unknown site id: {site_id}"))
}

/// `spec.md` 6's admin-console-only commands. They're parsed so the CLI's
/// surface matches the documented protocol, but refused explicitly rather
/// than silently accepted — the admin console itself is a Non-goal.
fn unimplemented_in_core(command: &str) -> Result<()> {
    bail!("'{command}' is unimplemented-in-core: it belongs to the admin console, which is out of scope here")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Service { action } => {
            let config = DaemonConfig::load(cli.config.to_string_lossy().to_string()).context("failed to load daemon config")?;
            match action {
                ServiceAction::Start => start_service(&cli.config, &config),
                ServiceAction::Stop => stop_service(&config),
            }
        }
        Command::ReloadSetting => {
            let config = DaemonConfig::load(cli.config.to_string_lossy().to_string()).context("failed to load daemon config")?;
            send_signal(&config, libc::SIGHUP)?;
            println!("reload requested");
            Ok(())
        }
        Command::Debug => {
            let config = DaemonConfig::load(cli.config.to_string_lossy().to_string()).context("failed to load daemon config")?;
            println!("config: {}", cli.config.display());
            println!("sites: {}", config.sites.len());
            println!("run_dir: {}", config.run_dir);
            let pid_file = pid_path(&config);
            match read_pid(&pid_file) {
                Ok(pid) => println!("daemon pid: {pid} ({})", if unsafe { libc::kill(pid, 0) } == 0 { "running" } else { "stale" }),
                Err(_) => println!("daemon pid: not running"),
            }
            Ok(())
        }
        Command::Version => {
            println!("sitemapgen-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::GetSiteSetting { site_id } => get_site_setting(&cli.config, &site_id),
        Command::SetSiteSetting { site_id, field, value } => set_site_setting(&cli.config, &site_id, &field, &value),
        Command::ResetPassword => unimplemented_in_core("reset-password"),
        Command::ChangePassword => unimplemented_in_core("change-password"),
        Command::RemoteAdmin => unimplemented_in_core("remote-admin"),
        Command::CleanRobots => unimplemented_in_core("clean-robots"),
    }
}
