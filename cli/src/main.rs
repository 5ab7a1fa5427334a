//! kinesis-tail — follow a Kinesis stream from the terminal.
//!
//! # Commands
//! ```text
//! kinesis-tail cwlogs <stream> [--include S]... [--exclude S]... [--timeout ms] [--count n]
//! kinesis-tail raw    <stream> [--timeout ms] [--count n]
//! ```

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ktail_core::{
    build_timestamp, FailurePolicy, GroupFilter, LineFormat, StartPosition, TailBuilder,
    TailConfig, TailSession,
};
use ktail_kinesis::{KinesisSource, KinesisSourceConfig};
use ktail_observability::{init_tracing, LogConfig};

#[derive(Parser)]
#[command(
    name = "kinesis-tail",
    about = "Tail a Kinesis stream, decoding CloudWatch Logs subscriptions or raw records",
    version
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// AWS region
    #[arg(short, long, global = true, env = "AWS_REGION")]
    region: Option<String>,
    /// AWS profile from the shared config files
    #[arg(short, long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,
    /// Start at this time (epoch milliseconds, 0 = now) instead of the tip
    #[arg(short = 'T', long, global = true, conflicts_with = "trim_horizon")]
    timestamp: Option<i64>,
    /// Start at the oldest record still retained
    #[arg(long, global = true)]
    trim_horizon: bool,
    /// Debug logging
    #[arg(short, long, global = true)]
    debug: bool,
    /// Trace logging
    #[arg(short, long, global = true)]
    trace: bool,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
    /// Disable colored prefixes
    #[arg(long, global = true)]
    no_color: bool,
    /// Time between two fetches of the same shard
    #[arg(long, global = true, default_value_t = 5_000)]
    poll_interval_ms: u64,
    /// Pushes per reordering window (default: shard count)
    #[arg(long, global = true)]
    window: Option<usize>,
    /// Keep tailing healthy shards when one shard's fetch fails
    #[arg(long, global = true)]
    isolate_shard_failures: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail CloudWatch Logs subscription records
    Cwlogs {
        /// Kinesis stream name
        stream: String,
        /// Only show log groups containing one of these substrings
        #[arg(long = "include", short = 'i')]
        includes: Vec<String>,
        /// Hide log groups containing any of these substrings
        #[arg(long = "exclude", short = 'x')]
        excludes: Vec<String>,
        /// Stop after this many milliseconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Stop after this many records (0 = no limit)
        #[arg(long, default_value_t = 0)]
        count: usize,
    },

    /// Tail raw records as text lines
    Raw {
        /// Kinesis stream name
        stream: String,
        /// Stop after this many milliseconds
        #[arg(long, default_value_t = 3_600_000)]
        timeout: u64,
        /// Stop after this many records (0 = no limit)
        #[arg(long, default_value_t = 0)]
        count: usize,
    },
}

impl GlobalArgs {
    fn start_position(&self) -> Result<StartPosition> {
        if self.trim_horizon {
            return Ok(StartPosition::TrimHorizon);
        }
        match self.timestamp {
            Some(ms) => {
                let ts = build_timestamp(ms).context("invalid --timestamp")?;
                Ok(StartPosition::AtTimestamp(ts))
            }
            None => Ok(StartPosition::Latest),
        }
    }

    fn apply(&self, mut builder: TailBuilder) -> Result<TailBuilder> {
        builder = builder
            .start(self.start_position()?)
            .poll_interval_ms(self.poll_interval_ms);
        if let Some(window) = self.window {
            builder = builder.window(window);
        }
        if self.isolate_shard_failures {
            builder = builder.failure_policy(FailurePolicy::Isolate);
        }
        Ok(builder)
    }

    fn source_config(&self) -> KinesisSourceConfig {
        KinesisSourceConfig {
            region: self.region.clone(),
            profile: self.profile.clone(),
            get_records_limit: None,
        }
    }
}

fn build_config(global: &GlobalArgs, command: Commands, color: bool) -> Result<TailConfig> {
    let builder = match command {
        Commands::Cwlogs { stream, includes, excludes, timeout, count } => {
            let format = if color {
                LineFormat::AnnotatedColored
            } else {
                LineFormat::Annotated
            };
            let mut b = TailBuilder::new(stream)
                .logs(GroupFilter::new(includes, excludes))
                .format(format)
                .count(count);
            if let Some(ms) = timeout {
                b = b.timeout_ms(ms);
            }
            b
        }
        Commands::Raw { stream, timeout, count } => TailBuilder::new(stream)
            .raw()
            .format(LineFormat::Plain)
            .timeout_ms(timeout)
            .count(count),
    };

    global
        .apply(builder)?
        .build_config()
        .context("invalid tail configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = cli.global;

    init_tracing(
        &LogConfig::from_flags(global.debug, global.trace).with_json(global.json_logs),
    );

    let color = !global.no_color && io::stdout().is_terminal();
    let config = build_config(&global, cli.command, color)?;
    debug!(stream = %config.stream, start = %config.start, "starting tail");

    let source = KinesisSource::connect(&global.source_config()).await;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, flushing");
            on_signal.cancel();
        }
    });

    let stream = config.stream.clone();
    let session = TailSession::new(Arc::new(source), config).with_cancel_token(cancel);
    let summary = session
        .run(io::stdout().lock())
        .await
        .with_context(|| format!("tailing stream {stream} failed"))?;

    debug!(
        stop = %summary.stop,
        records = summary.records,
        messages = summary.messages,
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use ktail_core::TailMode;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kinesis-tail").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn raw_defaults() {
        let cli = parse(&["raw", "events"]);
        let cfg = build_config(&cli.global, cli.command, false).unwrap();
        assert_eq!(cfg.stream, "events");
        assert!(matches!(cfg.mode, TailMode::Raw));
        assert_eq!(cfg.timeout_ms, Some(3_600_000));
        assert_eq!(cfg.count, 0);
        assert_eq!(cfg.start, StartPosition::Latest);
        assert_eq!(cfg.format, LineFormat::Plain);
    }

    #[test]
    fn cwlogs_filters_and_color() {
        let cli = parse(&[
            "cwlogs", "logs", "--include", "prod", "--include", "api", "--exclude", "debug",
            "--count", "10",
        ]);
        let cfg = build_config(&cli.global, cli.command, true).unwrap();
        match &cfg.mode {
            TailMode::Logs { filter } => {
                assert_eq!(filter.includes, vec!["prod", "api"]);
                assert_eq!(filter.excludes, vec!["debug"]);
            }
            other => panic!("unexpected mode {other:?}"),
        }
        assert_eq!(cfg.count, 10);
        assert_eq!(cfg.timeout_ms, None);
        assert_eq!(cfg.format, LineFormat::AnnotatedColored);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&[
            "raw", "events", "-T", "1526626158315", "--window", "8", "--isolate-shard-failures",
        ]);
        let cfg = build_config(&cli.global, cli.command, false).unwrap();
        assert_eq!(
            cfg.start,
            StartPosition::AtTimestamp(build_timestamp(1_526_626_158_315).unwrap())
        );
        assert_eq!(cfg.window, Some(8));
        assert_eq!(cfg.failure_policy, FailurePolicy::Isolate);
    }

    #[test]
    fn trim_horizon_conflicts_with_timestamp() {
        let res = Cli::try_parse_from(["kinesis-tail", "raw", "s", "--trim-horizon", "-T", "5"]);
        assert!(res.is_err());

        let cli = parse(&["raw", "s", "--trim-horizon"]);
        let cfg = build_config(&cli.global, cli.command, false).unwrap();
        assert_eq!(cfg.start, StartPosition::TrimHorizon);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let cli = parse(&["raw", "s", "--poll-interval-ms", "0"]);
        assert!(build_config(&cli.global, cli.command, false).is_err());
    }
}
