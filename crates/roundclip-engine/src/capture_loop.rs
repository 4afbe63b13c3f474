//! The timed capture loop and the real session factory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use roundclip_capture::{find_target_window, CaptureError, WindowCapturer};
use roundclip_encoder::{create_frame_sink, EncoderConfig, FrameSink, HardwareSelection};
use roundclip_types::{CancellationToken, StopKind};

use crate::pacing::FramePacer;
use crate::session::{SessionBody, SessionFactory, SessionRequest, SessionShared};
use crate::EngineResult;

/// Interval between capture statistics log lines.
const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Resolves sessions against real windows and encoders.
pub struct CaptureSessionFactory;

impl SessionFactory for CaptureSessionFactory {
    fn prepare(&self, request: &SessionRequest) -> EngineResult<SessionBody> {
        let target = find_target_window(&request.window_hint)?;

        // The canvas keeps the dimensions the window has right now; later
        // resizes are scaled back into it.
        let config = EncoderConfig {
            width: target.bounds.width(),
            height: target.bounds.height(),
            frame_rate: request.frame_rate,
            codec_id: request.codec_id.clone(),
            hardware: HardwareSelection::parse(&request.hardware_option),
            video_bitrate: request.video_bitrate,
        };

        let sink = create_frame_sink(&request.output_path, &config)?;
        let capturer = WindowCapturer::new(target.handle, config.width, config.height)?;

        info!(
            window = %target.title,
            width = config.width,
            height = config.height,
            encoder = sink.name(),
            "Capture session prepared"
        );

        let frame_rate = request.frame_rate;
        Ok(Box::new(move |token, shared| {
            capture_loop(capturer, sink, frame_rate, token, shared);
        }))
    }
}

/// Run the per-session capture loop until cancelled or a fatal error.
fn capture_loop(
    mut capturer: WindowCapturer,
    mut sink: Box<dyn FrameSink>,
    frame_rate: u32,
    token: CancellationToken,
    shared: Arc<SessionShared>,
) {
    let start = Instant::now();
    let mut pacer = FramePacer::new(frame_rate, start);
    let mut frames: u64 = 0;
    let mut last_stats = start;

    loop {
        if token.is_cancelled() {
            break;
        }

        if !capturer.is_alive() {
            shared.record_stop(StopKind::WindowLost);
            break;
        }

        match capturer.capture_frame() {
            Ok(pixels) => {
                // Any encoder failure is fatal for the session.
                if let Err(e) = sink.write_frame(pixels) {
                    shared.record_stop(StopKind::CaptureError {
                        message: e.to_string(),
                    });
                    break;
                }
                frames += 1;
            }
            Err(CaptureError::WindowGone) => {
                shared.record_stop(StopKind::WindowLost);
                break;
            }
            Err(e) => {
                shared.record_stop(StopKind::CaptureError {
                    message: e.to_string(),
                });
                break;
            }
        }

        if last_stats.elapsed() >= STATS_INTERVAL {
            debug!(
                frames,
                fallback_captures = capturer.fallback_captures(),
                uptime_secs = start.elapsed().as_secs(),
                "Capture stats"
            );
            last_stats = Instant::now();
        }

        // Sleep out the remainder of this frame's slot; when behind
        // schedule, go straight into the next tick.
        if let Some(delay) = pacer.next_delay(Instant::now()) {
            if token.sleep(delay) {
                break;
            }
        }
    }

    // Every exit path lands here exactly once: finalize the container and
    // release the capture surfaces.
    if let Err(e) = sink.finalize() {
        warn!("Encoder finalize failed: {e}");
        shared.record_stop(StopKind::CaptureError {
            message: format!("finalize failed: {e}"),
        });
    }

    debug!(frames, "Capture loop exited");
}
