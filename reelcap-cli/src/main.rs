mod cli;
mod error;
mod params;
mod progress;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mimalloc::MiMalloc;
use reelcap_engine::{
    AcquireConfig, Acquirer, ChromiumConfig, ChromiumRequestSource, FfmpegTranscoder, HttpConfig,
    ManifestConfig, ObservationConfig, ProxyConfig, RequestSource, ScriptedRequestSource,
    StatusPolicy, TranscodeConfig,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::Args;
use crate::error::AppError;
use crate::params::parse_headers;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = build_config(&args)?;

    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cleaning up");
                token.cancel();
            }
        })
    };

    match FfmpegTranscoder::new(config.transcode.clone()).version().await {
        Some(version) => debug!("Using {version}"),
        None => warn!(
            ffmpeg = %config.transcode.ffmpeg_path,
            "ffmpeg did not report a version; transcoding will likely fail"
        ),
    }

    let (source, browser): (Arc<dyn RequestSource>, Option<Arc<ChromiumRequestSource>>) =
        if args.request_urls.is_empty() {
            let browser = Arc::new(
                ChromiumRequestSource::launch(ChromiumConfig {
                    executable: args.chromium.clone(),
                    headless: !args.headful,
                    ..ChromiumConfig::default()
                })
                .await?,
            );
            (browser.clone(), Some(browser))
        } else {
            info!(requests = args.request_urls.len(), "Replaying request URLs");
            (
                Arc::new(ScriptedRequestSource::new(args.request_urls.clone())),
                None,
            )
        };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(progress::render(events_rx, args.quiet));

    let acquirer = Acquirer::from_config(source, config)?.with_events(events_tx);

    let result = acquirer.acquire(&args.url, &args.output, &token).await;
    drop(acquirer);
    let _ = renderer.await;
    ctrl_c.abort();

    if let Some(browser) = browser {
        match Arc::try_unwrap(browser) {
            Ok(browser) => browser.close().await,
            Err(_) => warn!("Browser still in use, leaving it to exit with the process"),
        }
    }

    let report = result?;
    info!(
        video = %report.video_url,
        format = %report.format,
        bytes = report.bytes,
        "Saved {}",
        report.output.display()
    );
    println!("{}", report.output.display());
    Ok(())
}

fn build_config(args: &Args) -> Result<AcquireConfig, AppError> {
    let proxy = args.proxy.as_ref().map(|url| {
        let proxy = ProxyConfig::new(url.clone(), args.proxy_type);
        match &args.proxy_username {
            Some(username) => proxy.with_auth(
                username.clone(),
                args.proxy_password.clone().unwrap_or_default(),
            ),
            None => proxy,
        }
    });

    let http = HttpConfig {
        timeout: Duration::from_secs(args.timeout),
        proxy,
        use_system_proxy: !args.no_system_proxy,
        status_policy: if args.lenient_status {
            StatusPolicy::Lenient
        } else {
            StatusPolicy::Strict
        },
        ..HttpConfig::default()
    }
    .with_headers(parse_headers(&args.headers)?);

    if args.concurrency == 0 {
        return Err(AppError::InvalidInput(
            "--concurrency must be at least 1".to_string(),
        ));
    }

    let mut transcode = TranscodeConfig {
        audio_bitrate: args.audio_bitrate.clone(),
        ..TranscodeConfig::default()
    };
    if let Some(ffmpeg) = &args.ffmpeg {
        transcode.ffmpeg_path = ffmpeg.clone();
    }

    Ok(AcquireConfig {
        http,
        observation: ObservationConfig {
            timeout: Duration::from_secs(args.observe_timeout),
            settle_grace: Duration::from_millis(args.settle_grace),
            fixed_window: args.fixed_window.map(Duration::from_secs),
        },
        manifest: ManifestConfig {
            concurrency: args.concurrency,
            ..ManifestConfig::default()
        },
        transcode,
        work_dir: args.work_dir.clone().unwrap_or_else(std::env::temp_dir),
    })
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}
