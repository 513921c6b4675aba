//! CLI definitions and command handlers.
//!
//! Subcommand architecture:
//! - `portprobe probe <host> <port>` - Probe a single target
//! - `portprobe scan <host> <ports>` - Scan a port range
//! - `portprobe wait <host> <port>` - Block until a port opens
//! - `portprobe wait-any <host> <ports>` - Block until any port in a range opens

use crate::policy::RetryPolicy;
use crate::prober::Prober;
use crate::types::{string_to_protocol, Protocol};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// portprobe - a concurrent network reachability prober.
///
/// Probes TCP/UDP targets with retries and exponential backoff, scans port
/// ranges with a bounded worker pool, and waits for services to come up.
#[derive(Parser, Debug)]
#[command(name = "portprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Probe, scan and wait for network reachability", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Protocol family (tcp, tcp4, tcp6, udp, udp4, udp6)
    #[arg(short = 'P', long, global = true, default_value = "tcp")]
    pub protocol: String,

    /// Per-attempt connect timeout in milliseconds
    #[arg(short = 't', long, global = true, default_value = "2000")]
    pub timeout: u64,

    /// Retries after the first failed attempt
    #[arg(short = 'r', long, global = true, default_value = "3")]
    pub retries: u32,

    /// Base delay between attempts in milliseconds
    #[arg(short = 'i', long, global = true, default_value = "500")]
    pub interval: u64,

    /// Exponential backoff multiplier
    #[arg(long, global = true, default_value = "1.5")]
    pub backoff: f64,

    /// Randomize backoff delays by up to 25%
    #[arg(long, global = true)]
    pub jitter: bool,

    /// Maximum concurrent probes for bulk checks
    #[arg(short = 'c', long, global = true, default_value = "100")]
    pub concurrency: usize,

    /// Worker tasks for range scans
    #[arg(short = 'w', long, global = true, default_value = "10")]
    pub workers: usize,

    /// Overall deadline for wait commands in milliseconds
    #[arg(long, global = true, default_value = "300000")]
    pub wait_timeout: u64,

    /// Emit results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe a single host/port once (with retries)
    Probe {
        /// Hostname or IP literal
        host: String,
        /// Port number (1-65535)
        port: u16,
    },
    /// Scan a contiguous port range, e.g. "1-1024"
    Scan {
        /// Hostname or IP literal
        host: String,
        /// Port range as start-end (a single port scans just itself)
        ports: String,
    },
    /// Wait until a port becomes reachable or the wait timeout passes
    Wait {
        /// Hostname or IP literal
        host: String,
        /// Port number (1-65535)
        port: u16,
    },
    /// Wait until any port in a range becomes reachable
    WaitAny {
        /// Hostname or IP literal
        host: String,
        /// Port range as start-end
        ports: String,
    },
}

impl Cli {
    /// Build the probing policy from the global flags.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            default_protocol: string_to_protocol(&self.protocol),
            max_retries: self.retries,
            retry_interval: Duration::from_millis(self.interval),
            backoff_factor: self.backoff,
            jitter: self.jitter,
            dial_timeout: Duration::from_millis(self.timeout),
            wait_timeout: Duration::from_millis(self.wait_timeout),
            max_concurrency: self.concurrency,
            worker_count: self.workers,
            ..RetryPolicy::default()
        }
    }

    fn protocol(&self) -> Protocol {
        string_to_protocol(&self.protocol)
    }
}

/// Parse a "start-end" port range ("80" means "80-80").
pub fn parse_port_range(s: &str) -> Result<(u16, u16)> {
    let s = s.trim();
    match s.split_once('-') {
        Some((start, end)) => {
            let start: u16 = start.trim().parse().context("invalid start port")?;
            let end: u16 = end.trim().parse().context("invalid end port")?;
            Ok((start, end))
        }
        None => {
            let port: u16 = s.parse().context("invalid port")?;
            Ok((port, port))
        }
    }
}

/// Execute the parsed command. Returns the process exit code.
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<i32> {
    let prober = Prober::new(cli.policy());
    let protocol = cli.protocol();

    match &cli.command {
        Commands::Probe { host, port } => {
            let target = crate::types::Target::with_protocol(host.clone(), *port, protocol);
            let result = prober.probe(&cancel, &target).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result);
            }
            Ok(if result.open { 0 } else { 1 })
        }
        Commands::Scan { host, ports } => {
            let (start, end) = parse_port_range(ports)?;
            let result = prober.scan_range(&cancel, host, start, end, protocol).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{} ports {}-{}: {} open, {} closed in {:?}",
                    host, result.start_port, result.end_port, result.success_count,
                    result.failure_count, result.duration
                );
                let mut open = result.open_ports.clone();
                open.sort_unstable();
                for port in open {
                    println!("  {}/{} open", port, protocol);
                }
                for error in &result.errors {
                    eprintln!("  error: {}", error);
                }
            }
            Ok(0)
        }
        Commands::Wait { host, port } => {
            let result = prober.wait_for_port(&cancel, host, *port, protocol).await?;
            print_wait(&cli, &result)?;
            Ok(if result.success { 0 } else { 1 })
        }
        Commands::WaitAny { host, ports } => {
            let (start, end) = parse_port_range(ports)?;
            let result = prober
                .wait_for_any_port(&cancel, host, start, end, protocol)
                .await?;
            print_wait(&cli, &result)?;
            Ok(if result.success { 0 } else { 1 })
        }
    }
}

fn print_wait(cli: &Cli, result: &crate::types::WaitResult) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else if result.success {
        println!(
            "{}:{} reachable after {} attempts ({:?})",
            result.host, result.port, result.attempts, result.duration
        );
    } else {
        println!(
            "{} not reachable within {:?} ({} attempts)",
            result.host, result.duration, result.attempts
        );
    }
    Ok(())
}
