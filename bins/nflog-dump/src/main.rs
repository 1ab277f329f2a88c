//! nflog-dump - print packets logged to an NFLOG group.
//!
//! ```text
//! iptables -A INPUT -p tcp --dport 22 -j NFLOG --nflog-group 5 --nflog-prefix ssh
//! nflog-dump 5 --json
//! ```

mod output;

use std::time::Duration;

use clap::{Parser, ValueEnum};
use nflog::{Config, Connection, CopyMode, LogFlags};
use tokio_stream::StreamExt;

use crate::output::PacketLine;

/// Copy modes accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum Mode {
    /// No metadata, no payload.
    None,
    /// Metadata only.
    Meta,
    /// Metadata and payload.
    Packet,
}

impl From<Mode> for CopyMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::None => CopyMode::None,
            Mode::Meta => CopyMode::Meta,
            Mode::Packet => CopyMode::Packet,
        }
    }
}

#[derive(Parser)]
#[command(name = "nflog-dump", version, about = "Print packets logged to an NFLOG group")]
struct Cli {
    /// Log group to bind to.
    group: u16,

    /// How much of each packet to copy.
    #[arg(short = 'm', long, value_enum, default_value = "packet")]
    mode: Mode,

    /// Maximum payload bytes copied per packet.
    #[arg(short = 'r', long, default_value_t = 0xffff)]
    range: u32,

    /// Request per-group sequence numbers.
    #[arg(long)]
    seq: bool,

    /// Request global sequence numbers.
    #[arg(long)]
    seq_global: bool,

    /// Socket receive buffer size in bytes (0 keeps the default).
    #[arg(short = 'b', long, default_value_t = 0)]
    rcvbuf: u32,

    /// Kernel batch flush timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Kernel queue threshold in packets.
    #[arg(long)]
    qthresh: Option<u32>,

    /// Exit after this many packets.
    #[arg(short = 'c', long)]
    count: Option<u64>,

    /// Print payload bytes as hex.
    #[arg(short = 'x', long)]
    hex: bool,

    /// Output JSON, one object per line.
    #[arg(short = 'j', long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> Config {
        let mut flags = LogFlags::empty();
        flags.set(LogFlags::SEQ, self.seq);
        flags.set(LogFlags::SEQ_GLOBAL, self.seq_global);

        let mut config = Config::new(self.group)
            .copy_mode(self.mode.into())
            .copy_range(self.range)
            .flags(flags)
            .sock_buf_size(self.rcvbuf);
        if let Some(ms) = self.timeout_ms {
            config = config.timeout(Duration::from_millis(ms));
        }
        if let Some(qthresh) = self.qthresh {
            config = config.qthresh(qthresh);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(cli.config()).await?;
    let closer = conn.close_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            closer.close();
        }
    });

    let mut packets = conn.into_stream();
    let mut seen = 0u64;
    while let Some(record) = packets.try_next().await? {
        let line = PacketLine::new(&record, cli.hex);
        if cli.json {
            println!("{}", serde_json::to_string(&line)?);
        } else {
            println!("{}", line);
        }

        seen += 1;
        if cli.count.is_some_and(|count| seen >= count) {
            break;
        }
    }

    let stats = packets.stats();
    eprintln!(
        "{} packets received, {} malformed, {} overruns",
        stats.delivered, stats.malformed, stats.overruns
    );
    Ok(())
}
