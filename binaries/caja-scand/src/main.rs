//! Demo daemon: runs one barcode scan session end to end over the
//! simulated capture and decode drivers, records the detection in the
//! scan registry, and prints a prometheus metrics snapshot.

use anyhow::{Context, Result};
use caja_core::events::SessionEvent;
use caja_core::{BarcodeFormat, DetectedCode};
use caja_capture::drivers::{RecordingSink, SimulatedCamera};
use caja_decode::simulated::{ScriptedContinuousDecoder, SimulatedProbe};
use caja_decode::DecodeError;
use caja_pipeline::{PipelineConfig, ScannerPipeline};
use caja_registry::ScanRegistry;
use caja_telemetry::{init_tracing, ScanMetrics};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "caja-scand",
    about = "Runs one simulated barcode scan session through the caja pipeline",
    version
)]
struct CliArgs {
    /// Path to a pipeline configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Override the configured decode-attempt interval.
    #[arg(long, value_name = "MS")]
    scan_interval_ms: Option<u64>,

    /// Barcode value the simulated detector will report.
    #[arg(long, value_name = "CODE", default_value = "7501234567890")]
    barcode: String,

    /// Empty frames sampled before the detection fires.
    #[arg(long, value_name = "N", default_value_t = 4)]
    frames_before_detect: usize,

    /// Pretend the native capability is absent and exercise the
    /// fallback decoder instead.
    #[arg(long)]
    fallback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let level = args.log_level.as_deref().unwrap_or("info");
    if let Err(err) = init_tracing(level) {
        eprintln!("failed to initialize tracing: {err}");
    }

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(interval) = args.scan_interval_ms {
        config.scan_interval_ms = interval;
    }

    let metrics = ScanMetrics::new().context("building metrics registry")?;
    let registry = ScanRegistry::default();
    let sink = Arc::new(RecordingSink::new());

    // Enough paced frames that the throttled sampling loop reaches the
    // scripted detection even at the default 200ms decode interval.
    let camera = Arc::new(
        SimulatedCamera::with_blank_frames((args.frames_before_detect + 2) * 8, 640, 480)
            .paced(Duration::from_millis(33)),
    );
    let probe = if args.fallback {
        Arc::new(SimulatedProbe::absent())
    } else {
        let mut script: Vec<Result<Vec<DetectedCode>, DecodeError>> =
            vec![Ok(vec![]); args.frames_before_detect];
        script.push(Ok(vec![DetectedCode::new(
            args.barcode.clone(),
            Some(BarcodeFormat::Ean13),
        )]));
        Arc::new(SimulatedProbe::scripted(vec![BarcodeFormat::Ean13], script))
    };
    let fallback = Arc::new(ScriptedContinuousDecoder::new(vec![
        Err(DecodeError::NotFound),
        Ok(DetectedCode::new(args.barcode.clone(), None)),
    ]));

    let pipeline = ScannerPipeline::new(camera, probe, fallback, sink, config);

    // Fold session events into metrics and the scan registry until the
    // session finishes tearing down.
    let mut events = pipeline.subscribe();
    let event_metrics = metrics.clone();
    let event_registry = registry.clone();
    let consumer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    event_metrics.observe(&event);
                    match &event {
                        SessionEvent::SessionStarted { strategy, .. } => {
                            info!(strategy = %strategy, "session scanning");
                        }
                        SessionEvent::CodeDetected {
                            session_id,
                            raw_value,
                        } => {
                            if let Err(err) = event_registry
                                .record(session_id.as_str(), raw_value, None)
                                .await
                            {
                                warn!(error = %err, "failed to record scan");
                            }
                        }
                        SessionEvent::SessionFailed { message, .. } => {
                            warn!(message = %message, "session failed");
                        }
                        SessionEvent::SessionStopped { .. } => break,
                    }
                }
                Err(_) => break,
            }
        }
    });

    let (done_tx, done_rx) = oneshot::channel::<String>();
    let done_slot = Mutex::new(Some(done_tx));
    let on_detected = Box::new(move |code: String| {
        if let Some(tx) = done_slot
            .lock()
            .expect("completion slot lock must be available")
            .take()
        {
            let _ = tx.send(code);
        }
    });
    let on_error = Box::new(|message: String| {
        warn!(message = %message, "scan reported an error");
    });

    let session_id = pipeline
        .start(on_detected, Some(on_error))
        .context("starting scan session")?;
    info!(session_id = %session_id, "scan session started");

    match tokio::time::timeout(Duration::from_secs(5), done_rx).await {
        Ok(Ok(code)) => info!(code = %code, "barcode detected"),
        Ok(Err(_)) => warn!("session ended without a detection"),
        Err(_) => {
            warn!("timed out waiting for a detection; stopping session");
            pipeline.stop();
        }
    }

    let _ = consumer.await;
    if let Some(record) = registry.latest().await {
        info!(
            session_id = %record.session_id,
            raw_value = %record.raw_value,
            "scan recorded"
        );
    }
    println!("{}", metrics.export_text().context("encoding metrics")?);
    Ok(())
}
