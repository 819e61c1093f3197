//! rdpmic-source entry point.
//!
//! ```text
//! rdpmic-source                      Run with rdpmic-source.toml (or defaults)
//! rdpmic-source --config <path>      Load a custom config TOML
//! rdpmic-source --gen-config         Write default config to stdout
//! rdpmic-source --output mic.raw     Write PCM to a file instead of stdout
//! ```

use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdpmic_source::config::SourceConfig;
use rdpmic_source::service::SourceService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rdpmic-source", about = "xrdp remote microphone source")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "rdpmic-source.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Directory holding the peer socket (overrides $XRDP_SOCKET_PATH).
    #[arg(long)]
    socket_path: Option<String>,

    /// Socket file name (overrides $XRDP_PULSE_SOURCE_SOCKET).
    #[arg(long)]
    socket_name: Option<String>,

    /// X display string for the default socket name (overrides $DISPLAY).
    #[arg(long)]
    display: Option<String>,

    /// Tick interval in milliseconds.
    #[arg(long)]
    latency_time: Option<u64>,

    /// Sample format, e.g. s16le.
    #[arg(long)]
    format: Option<String>,

    #[arg(long)]
    channels: Option<u8>,

    #[arg(long)]
    rate: Option<u32>,

    /// Write PCM to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    /// Command-line values win over the file.
    fn apply(&self, config: &mut SourceConfig) {
        if let Some(path) = &self.socket_path {
            config.socket.path = Some(path.clone());
        }
        if let Some(name) = &self.socket_name {
            config.socket.name = Some(name.clone());
        }
        if let Some(display) = &self.display {
            config.socket.display = Some(display.clone());
        }
        if let Some(ms) = self.latency_time {
            config.capture.latency_time_ms = ms;
        }
        if let Some(format) = &self.format {
            config.audio.format = format.clone();
        }
        if let Some(channels) = self.channels {
            config.audio.channels = channels;
        }
        if let Some(rate) = self.rate {
            config.audio.rate = rate;
        }
        if let Some(output) = &self.output {
            config.output.file = output.to_string_lossy().into_owned();
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SourceConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let (mut config, loaded) = SourceConfig::load_reporting(&cli.config);
    cli.apply(&mut config);

    // Init tracing. Logs never go to stdout, which may carry PCM.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.file.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    info!("rdpmic-source v{}", env!("CARGO_PKG_VERSION"));
    loaded.log(&cli.config);
    info!("socket: {}", config.socket_address());
    info!("latency time: {} ms", config.capture.latency_time_ms);

    let service = SourceService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.notify_one();
    });

    service.run().await?;

    Ok(())
}
