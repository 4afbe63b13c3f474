//! The trigger evaluator / session orchestrator.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use roundclip_encoder::{normalize_codec_id, normalize_hardware_option};
use roundclip_types::{
    cancellation_pair, normalize_extension, normalize_frame_rate, normalize_video_bitrate,
    sanitize_file_component, RecorderSettings, RoundFacts, StopKind, TriggerSet,
};

use crate::session::{ActiveSession, SessionFactory, SessionRequest, SessionShared};

/// Supplies a fresh settings snapshot per evaluation.
pub trait SettingsSource: Send + Sync {
    fn snapshot(&self) -> RecorderSettings;
}

/// Supplies the current round facts, if a round is active.
pub trait RoundSource: Send + Sync {
    fn current_round(&self) -> Option<RoundFacts>;
}

/// Directory used when the settings leave the output directory empty.
const DEFAULT_OUTPUT_DIR: &str = "recordings";

/// The trigger-driven recording orchestrator.
///
/// `evaluate_recording_state` may be called from any thread; evaluations
/// are serialized by an internal gate and at most one recording session
/// exists at a time. No error escapes the public entry points.
pub struct RecorderService {
    settings: Arc<dyn SettingsSource>,
    rounds: Arc<dyn RoundSource>,
    factory: Arc<dyn SessionFactory>,
    /// Serializes start/stop decisions.
    gate: Mutex<()>,
    /// The single active session slot, shared with capture threads.
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl RecorderService {
    /// Create a service with an explicit session factory.
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        rounds: Arc<dyn RoundSource>,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            settings,
            rounds,
            factory,
            gate: Mutex::new(()),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a service using the real window-capture factory.
    #[cfg(windows)]
    pub fn with_capture_factory(
        settings: Arc<dyn SettingsSource>,
        rounds: Arc<dyn RoundSource>,
    ) -> Self {
        Self::new(settings, rounds, Arc::new(crate::CaptureSessionFactory))
    }

    /// Re-evaluate whether recording should be running.
    ///
    /// Idempotent; safe to call on every state-change event.
    #[instrument(name = "evaluate_recording_state", skip(self))]
    pub fn evaluate_recording_state(&self, reason: &str) {
        let _gate = self.gate.lock();
        let settings = self.settings.snapshot();

        if !settings.enabled {
            self.stop_active(StopKind::Disabled);
            return;
        }

        let Some(round) = self.rounds.current_round() else {
            self.stop_active(StopKind::NoActiveRound);
            return;
        };

        let Some(trigger_description) = match_triggers(&settings, &round) else {
            self.stop_active(StopKind::TriggersNoLongerMatch);
            return;
        };

        if self.active.lock().is_some() {
            debug!("Session already active, nothing to do");
            return;
        }

        self.start_session(&settings, trigger_description);
    }

    /// Stop any active session and release the service.
    pub fn shutdown(&self) {
        let _gate = self.gate.lock();
        self.stop_active(StopKind::Disposed);
    }

    /// Returns true while a recording session is active.
    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    fn start_session(&self, settings: &RecorderSettings, trigger_description: String) {
        let output_dir = if settings.output_dir.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_OUTPUT_DIR)
        } else {
            settings.output_dir.clone()
        };

        if let Err(e) = fs::create_dir_all(&output_dir) {
            error!(dir = %output_dir.display(), "Cannot create output directory: {e}");
            return;
        }

        let extension = normalize_extension(&settings.extension);
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let file_name = format!(
            "{timestamp}_{}.{extension}",
            sanitize_file_component(&trigger_description)
        );
        let output_path = output_dir.join(file_name);

        let request = SessionRequest {
            output_path: output_path.clone(),
            window_hint: settings.window_hint.clone(),
            frame_rate: normalize_frame_rate(settings.frame_rate as i64),
            codec_id: normalize_codec_id(&extension, &settings.codec_id),
            hardware_option: normalize_hardware_option(&settings.hardware_option),
            video_bitrate: normalize_video_bitrate(settings.video_bitrate as i64),
            extension,
            trigger_description: trigger_description.clone(),
        };

        // All fallible setup happens here, before anything is published to
        // the session slot.
        let body = match self.factory.prepare(&request) {
            Ok(body) => body,
            Err(e) => {
                error!(trigger = %trigger_description, "Recording start failed: {e}");
                return;
            }
        };

        let shared = Arc::new(SessionShared::new(trigger_description, output_path));
        let (cancel, token) = cancellation_pair();

        // Publish the session before the thread exists so a capture loop
        // that finishes instantly still finds its own slot entry to clear.
        *self.active.lock() = Some(ActiveSession {
            shared: Arc::clone(&shared),
            cancel,
            join: None,
        });

        let slot = Arc::clone(&self.active);
        let thread_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("roundclip-capture".to_string())
            .spawn(move || {
                body(token, Arc::clone(&thread_shared));
                Self::on_capture_finished(&slot, &thread_shared);
            });

        match spawned {
            Ok(join) => {
                // The loop may already have ended and emptied the slot; in
                // that case the handle is dropped and the thread detaches.
                if let Some(active) = self.active.lock().as_mut() {
                    if Arc::ptr_eq(&active.shared, &shared) {
                        active.join = Some(join);
                    }
                }
                info!(
                    trigger = %shared.trigger_description,
                    path = %shared.output_path.display(),
                    "Recording session started"
                );
            }
            Err(e) => {
                self.active.lock().take();
                error!("Recording start failed: cannot spawn capture thread: {e}");
            }
        }
    }

    /// Stop and tear down the active session, if any. Blocks until the
    /// capture thread has finished, so callers never observe a "stopped"
    /// session that is still writing frames.
    fn stop_active(&self, kind: StopKind) {
        let taken = self.active.lock().take();
        let Some(mut session) = taken else {
            return;
        };

        info!(reason = %kind.message(), "Stopping recording session");
        session.shared.mark_owner_stop();
        session.shared.record_stop(kind);
        session.cancel.cancel();

        if let Some(join) = session.join.take() {
            let _ = join.join();
        }

        if session.shared.has_error() {
            warn!(
                path = %session.shared.output_path.display(),
                reason = ?session.shared.stop_reason(),
                "Recording session stopped after error"
            );
        } else {
            info!(
                path = %session.shared.output_path.display(),
                "Recording session stopped"
            );
        }
    }

    /// Runs on the capture thread when its loop ends on its own.
    fn on_capture_finished(slot: &Mutex<Option<ActiveSession>>, shared: &Arc<SessionShared>) {
        let mut guard = slot.lock();
        let is_current = guard
            .as_ref()
            .map_or(false, |active| Arc::ptr_eq(&active.shared, shared));
        if !is_current {
            // The orchestrator already took the session out; its stop path
            // does the logging.
            return;
        }

        // Dropping the join handle detaches it; this IS the session thread.
        let _session = guard.take();
        drop(guard);

        let reason = shared
            .stop_reason()
            .map(|k| k.message())
            .unwrap_or_else(|| "Capture loop ended".to_string());

        if shared.has_error() && !shared.owner_stopped() {
            warn!(
                reason = %reason,
                path = %shared.output_path.display(),
                "Recording session ended with error"
            );
        } else {
            info!(reason = %reason, "Recording session ended");
        }
    }
}

impl Drop for RecorderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decide whether the round intersects the configured triggers.
///
/// Returns the human-readable trigger description on a match. A round
/// matches when its type equals any round trigger (wildcard included) or
/// any name in its composite terror key equals a terror trigger. With no
/// triggers configured at all, recording never starts.
fn match_triggers(settings: &RecorderSettings, round: &RoundFacts) -> Option<String> {
    let round_set = TriggerSet::new(&settings.round_triggers);
    let terror_set = TriggerSet::new(&settings.terror_triggers);

    if round_set.is_empty() && terror_set.is_empty() {
        return None;
    }

    let round_hit = !round_set.is_empty() && round_set.matches(&round.round_type);
    let terror_hit = round
        .terror_key
        .as_deref()
        .and_then(|key| terror_set.match_terror_key(key));

    if !round_hit && terror_hit.is_none() {
        return None;
    }

    let mut description = format!("Round='{}'", round.round_type);
    if let Some(terror) = terror_hit {
        description.push_str(&format!(" Terror='{terror}'"));
    }
    Some(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionBody;
    use crate::EngineResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeSettings(Mutex<RecorderSettings>);

    impl FakeSettings {
        fn recording(round_triggers: &[&str]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(RecorderSettings {
                enabled: true,
                round_triggers: round_triggers.iter().map(|s| s.to_string()).collect(),
                output_dir: std::env::temp_dir().join(format!(
                    "roundclip-engine-test-{}",
                    std::process::id()
                )),
                ..RecorderSettings::default()
            })))
        }

        fn set_enabled(&self, enabled: bool) {
            self.0.lock().enabled = enabled;
        }
    }

    impl SettingsSource for FakeSettings {
        fn snapshot(&self) -> RecorderSettings {
            self.0.lock().clone()
        }
    }

    struct FakeRounds(Mutex<Option<RoundFacts>>);

    impl FakeRounds {
        fn with_round(round_type: &str) -> Arc<Self> {
            Arc::new(Self(Mutex::new(Some(RoundFacts {
                round_type: round_type.to_string(),
                terror_key: None,
            }))))
        }

        fn end_round(&self) {
            *self.0.lock() = None;
        }
    }

    impl RoundSource for FakeRounds {
        fn current_round(&self) -> Option<RoundFacts> {
            self.0.lock().clone()
        }
    }

    /// Factory whose sessions idle until cancelled, counting finalizes.
    struct FakeFactory {
        prepares: AtomicUsize,
        finalizes: Arc<AtomicUsize>,
        last_request: Mutex<Option<SessionRequest>>,
        last_shared: Arc<Mutex<Option<Arc<SessionShared>>>>,
    }

    impl FakeFactory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                prepares: AtomicUsize::new(0),
                finalizes: Arc::new(AtomicUsize::new(0)),
                last_request: Mutex::new(None),
                last_shared: Arc::new(Mutex::new(None)),
            })
        }
    }

    impl SessionFactory for FakeFactory {
        fn prepare(&self, request: &SessionRequest) -> EngineResult<SessionBody> {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock() = Some(request.clone());

            let finalizes = Arc::clone(&self.finalizes);
            let shared_slot = Arc::clone(&self.last_shared);
            Ok(Box::new(move |token, shared| {
                *shared_slot.lock() = Some(Arc::clone(&shared));
                while !token.sleep(Duration::from_millis(2)) {}
                // Stands in for the encoder finalize that must run exactly
                // once per session.
                finalizes.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    fn service(
        settings: &Arc<FakeSettings>,
        rounds: &Arc<FakeRounds>,
        factory: &Arc<FakeFactory>,
    ) -> RecorderService {
        RecorderService::new(
            Arc::clone(settings) as Arc<dyn SettingsSource>,
            Arc::clone(rounds) as Arc<dyn RoundSource>,
            Arc::clone(factory) as Arc<dyn SessionFactory>,
        )
    }

    #[test]
    fn test_session_lifecycle() {
        let settings = FakeSettings::recording(&["Classic"]);
        let rounds = FakeRounds::with_round("Classic");
        let factory = FakeFactory::new();
        let svc = service(&settings, &rounds, &factory);

        svc.evaluate_recording_state("round started");
        assert!(svc.is_recording());
        assert_eq!(factory.prepares.load(Ordering::SeqCst), 1);

        let request = factory.last_request.lock().clone().unwrap();
        let file_name = request.output_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.contains("Round='Classic'"));
        assert!(!file_name.contains("recording"));

        rounds.end_round();
        svc.evaluate_recording_state("round ended");
        assert!(!svc.is_recording());
        // The stop is confirmed-complete: the finalize already happened.
        assert_eq!(factory.finalizes.load(Ordering::SeqCst), 1);

        let shared = factory.last_shared.lock().clone().unwrap();
        assert_eq!(shared.stop_reason(), Some(StopKind::NoActiveRound));
        assert_eq!(shared.stop_reason().unwrap().message(), "No active round");
        assert!(shared.owner_stopped());
        assert!(!shared.has_error());

        // A later evaluation is a no-op; nothing finalizes twice.
        svc.evaluate_recording_state("idle");
        assert_eq!(factory.finalizes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_at_most_one_session_under_concurrency() {
        let settings = FakeSettings::recording(&["Classic"]);
        let rounds = FakeRounds::with_round("classic");
        let factory = FakeFactory::new();
        let svc = Arc::new(service(&settings, &rounds, &factory));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let svc = Arc::clone(&svc);
            handles.push(thread::spawn(move || {
                svc.evaluate_recording_state("concurrent state change");
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(factory.prepares.load(Ordering::SeqCst), 1);
        assert!(svc.is_recording());
        svc.shutdown();
    }

    #[test]
    fn test_disabled_never_starts_and_stops_active() {
        let settings = FakeSettings::recording(&["Classic"]);
        let rounds = FakeRounds::with_round("Classic");
        let factory = FakeFactory::new();
        let svc = service(&settings, &rounds, &factory);

        svc.evaluate_recording_state("start");
        assert!(svc.is_recording());

        settings.set_enabled(false);
        svc.evaluate_recording_state("settings changed");
        assert!(!svc.is_recording());

        let shared = factory.last_shared.lock().clone().unwrap();
        assert_eq!(shared.stop_reason(), Some(StopKind::Disabled));
    }

    #[test]
    fn test_no_triggers_configured_never_starts() {
        let settings = FakeSettings::recording(&[]);
        let rounds = FakeRounds::with_round("Classic");
        let factory = FakeFactory::new();
        let svc = service(&settings, &rounds, &factory);

        svc.evaluate_recording_state("round started");
        assert!(!svc.is_recording());
        assert_eq!(factory.prepares.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_start_leaves_no_session() {
        struct FailingFactory;
        impl SessionFactory for FailingFactory {
            fn prepare(&self, _request: &SessionRequest) -> EngineResult<SessionBody> {
                Err(crate::EngineError::Capture(
                    roundclip_capture::CaptureError::WindowNotFound("VRChat".into()),
                ))
            }
        }

        let settings = FakeSettings::recording(&["Classic"]);
        let rounds = FakeRounds::with_round("Classic");
        let svc = RecorderService::new(
            Arc::clone(&settings) as Arc<dyn SettingsSource>,
            Arc::clone(&rounds) as Arc<dyn RoundSource>,
            Arc::new(FailingFactory),
        );

        // The failure is absorbed; no session, no panic.
        svc.evaluate_recording_state("round started");
        assert!(!svc.is_recording());
    }

    #[test]
    fn test_match_triggers_terror_key() {
        let mut settings = RecorderSettings {
            enabled: true,
            terror_triggers: vec!["Huggy".to_string()],
            ..RecorderSettings::default()
        };
        let round = RoundFacts {
            round_type: "Classic".to_string(),
            terror_key: Some("Apocalypse Bird & Huggy".to_string()),
        };

        let description = match_triggers(&settings, &round).unwrap();
        assert_eq!(description, "Round='Classic' Terror='Huggy'");

        settings.terror_triggers.clear();
        assert!(match_triggers(&settings, &round).is_none());
    }

    #[test]
    fn test_self_terminating_session_clears_slot() {
        struct ShortFactory;
        impl SessionFactory for ShortFactory {
            fn prepare(&self, _request: &SessionRequest) -> EngineResult<SessionBody> {
                Ok(Box::new(move |_token, shared| {
                    shared.record_stop(StopKind::WindowLost);
                }))
            }
        }

        let settings = FakeSettings::recording(&["Classic"]);
        let rounds = FakeRounds::with_round("Classic");
        let svc = RecorderService::new(
            Arc::clone(&settings) as Arc<dyn SettingsSource>,
            Arc::clone(&rounds) as Arc<dyn RoundSource>,
            Arc::new(ShortFactory),
        );

        svc.evaluate_recording_state("round started");
        // The session body finishes immediately and clears the slot itself.
        for _ in 0..100 {
            if !svc.is_recording() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!svc.is_recording());
    }
}
