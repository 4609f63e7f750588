use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use firehose_monitor::begin_stream_loop;
use firehose_monitor::DefaultTermChecker;
use firehose_monitor::DynamicStream;
use firehose_monitor::Error;
use firehose_monitor::FileTermSource;
use firehose_monitor::HttpStreamTransport;
use firehose_monitor::JsonStreamListener;
use firehose_monitor::OutputConfig;
use firehose_monitor::PrintingHandler;
use firehose_monitor::ReportingTermSource;
use firehose_monitor::Result;
use firehose_monitor::StaticTermSource;
use firehose_monitor::StreamerConfig;
use firehose_monitor::TermChecker;
use firehose_monitor::TermSource;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

type Printer = PrintingHandler<Box<dyn Write + Send>>;

/// Streams statuses matching the terms of a track file to stdout (or a file).
/// Edits to the track file are picked up without restarting.
#[derive(Parser, Debug)]
#[command(name = "stream-terms", version)]
struct Args {
    /// File with one term per line, re-read on every poll
    #[arg(short, long, value_name = "FILE")]
    track_file: Option<PathBuf>,

    /// Token sent as `Authorization: Bearer <token>`
    #[arg(long, env = "FIREHOSE_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Seconds between two checks of the track file [default: 15]
    #[arg(short, long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Stream a sample of everything while no terms are tracked
    #[arg(short, long)]
    unfiltered: bool,

    /// Only statuses in these languages, comma separated
    #[arg(short, long, value_delimiter = ',')]
    languages: Vec<String>,

    /// Debug logging; SIGUSR1 logs a state snapshot
    #[arg(short, long)]
    debug: bool,

    /// Write statuses here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    outfile: Option<PathBuf>,

    /// Extra configuration file, applied over CONFIG_PATH and under the environment
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
}

impl Args {
    /// Layers the command line over the file and environment configuration
    fn settings(&self) -> Result<StreamerConfig> {
        let mut settings = StreamerConfig::new()?;
        if let Some(path) = &self.config {
            settings = settings.with_override_config(path)?;
        }

        if let Some(track_file) = &self.track_file {
            settings.terms.track_file = Some(track_file.clone());
        }
        if let Some(token) = &self.bearer_token {
            settings.connection.bearer_token = Some(token.clone());
        }
        if let Some(seconds) = self.poll_interval {
            settings.stream.poll_interval_ms = seconds.saturating_mul(1000);
        }
        if self.unfiltered {
            settings.stream.unfiltered = true;
        }
        if !self.languages.is_empty() {
            settings.stream.languages = self.languages.clone();
        }
        if let Some(outfile) = &self.outfile {
            settings.output.outfile = Some(outfile.clone());
        }

        settings.validate()
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() {
    let args = Args::parse();

    // Initializing Logs
    init_observability(args.debug);

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = args.settings()?;
    debug!(?settings, "Configuration loaded");

    let handler: Arc<Printer> = Arc::new(PrintingHandler::new(open_output(&settings.output)?));

    match &settings.terms.track_file {
        Some(path) => {
            info!(path = %path.display(), "Monitoring track file");
            let source = FileTermSource::new(path);
            if !settings.stream.unfiltered {
                ensure_terms(&source).await?;
            }
            let source = ReportingTermSource::new(source, handler.clone());
            serve(source, handler, &settings, args.debug).await
        }
        None => {
            let source = ReportingTermSource::new(StaticTermSource::default(), handler.clone());
            serve(source, handler, &settings, args.debug).await
        }
    }
}

async fn serve<S: TermSource>(
    source: S,
    handler: Arc<Printer>,
    settings: &StreamerConfig,
    debug: bool,
) -> Result<()> {
    let transport = Arc::new(HttpStreamTransport::new(&settings.connection)?);
    let listener = Arc::new(JsonStreamListener::new(handler.clone()));
    let stream = Arc::new(DynamicStream::new(
        transport,
        listener,
        DefaultTermChecker::new(source),
        &settings.stream,
        settings.connection.options(),
    ));

    if debug {
        let (stream, handler) = (stream.clone(), handler.clone());
        tokio::spawn(async move {
            if let Err(e) = log_snapshots(stream, handler).await {
                warn!("Debug snapshots unavailable: {}", e);
            }
        });
    }

    info!("Application started. Waiting for SIGINT/SIGTERM...");
    tokio::select! {
        _ = begin_stream_loop(
            stream.as_ref(),
            settings.stream.poll_interval(),
            settings.stream.restart_backoff(),
            || true,
        ) => {}
        result = shutdown_signal() => {
            result?;
            info!("Stopping because of signal");
            handler.set_terminate();
            stream.stop_polling().await;
        }
    }

    info!("Shutdown completed");
    Ok(())
}

/// Fails when filtering and the track file has no usable term
async fn ensure_terms(source: &FileTermSource) -> Result<()> {
    let terms = source.fetch_terms().await?;
    if terms.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no terms to track in {}",
            source.path().display()
        )));
    }
    Ok(())
}

fn open_output(output: &OutputConfig) -> Result<Box<dyn Write + Send>> {
    match &output.outfile {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| Error::Fatal(format!("Failed to open {}: {}", path.display(), e)))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout())),
    }
}

async fn shutdown_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Signal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Signal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }
    Ok(())
}

async fn log_snapshots<C: TermChecker>(
    stream: Arc<DynamicStream<C>>,
    handler: Arc<Printer>,
) -> Result<()> {
    let mut sigusr1 =
        signal(SignalKind::user_defined1()).map_err(|e| Error::Signal(e.to_string()))?;

    while sigusr1.recv().await.is_some() {
        let terms = stream.tracking_terms().await;
        info!(
            polling = stream.is_polling(),
            streaming = stream.is_streaming(),
            received = handler.received(),
            ?terms,
            "State snapshot"
        );
    }
    Ok(())
}

fn init_observability(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
