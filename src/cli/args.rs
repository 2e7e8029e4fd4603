use clap::{Parser, Subcommand};
use std::time::Duration;

/// s3probe - liveness and network checks for S3-compatible clusters
#[derive(Parser, Debug)]
#[command(name = "s3probe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (default: ~/.s3probe/config.yaml)
    #[arg(long, global = true, env = "S3PROBE_CONFIG")]
    pub config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Disable SSL certificate verification
    #[arg(long, global = true, env = "S3PROBE_INSECURE")]
    pub insecure: bool,

    /// Enable debug logging and trace every admin request
    #[arg(long, global = true)]
    pub debug: bool,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Probe cluster liveness and report running latency statistics
    Ping {
        /// Target alias (ALIAS or ALIAS/path)
        #[arg(value_name = "TARGET")]
        target: String,

        /// Stop after this many rounds
        #[arg(short, long)]
        count: Option<u64>,

        /// Stop once an endpoint fails this many times in a row
        #[arg(short, long)]
        error_count: Option<u32>,

        /// Pause between rounds (seconds, or 500ms, 2s, ...)
        #[arg(short, long, default_value = "1", value_parser = parse_duration)]
        interval: Duration,

        /// Probe every node of the cluster
        #[arg(short = 'a', long)]
        distributed: bool,
    },

    /// Measure network throughput between cluster nodes
    Netperf {
        /// Target alias (ALIAS or ALIAS/path)
        #[arg(value_name = "TARGET")]
        target: String,

        /// Test duration (seconds, or 500ms, 2s, ...)
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        duration: Duration,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Effective log filter: `--debug` wins over `--log-level`
    pub fn log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

/// Parse plain seconds (`1`, `0.5`) or a humantime string (`500ms`, `2s`).
///
/// Zero is rejected: neither rounds nor tests can run for no time.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let duration = match s.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
        Ok(_) => return Err(format!("duration must be positive: {}", s)),
        Err(_) => humantime::parse_duration(s).map_err(|e| format!("invalid duration `{}`: {}", s, e))?,
    };

    if duration.is_zero() {
        return Err(format!("duration must be positive: {}", s));
    }
    Ok(duration)
}
