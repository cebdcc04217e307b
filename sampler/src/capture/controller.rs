use std::fmt;
use std::time::Duration;

use color_probe_common::color::{self, Color, ColorParseError};
use color_probe_common::config::CaptureConfig;
use color_probe_common::frame::Frame;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use super::report::ReportedState;
use super::scheduler::{Tick, TickScheduler};
use crate::region::sample_frame;
use crate::source::{FrameSource, FrameStream, SourceError, StreamConstraints};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No stream is open.
    Idle,
    /// Sampling the newest frame on every tick.
    Live,
    /// Holding one captured frame; no ticks run.
    Frozen,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CaptureState::Idle => "idle",
            CaptureState::Live => "live",
            CaptureState::Frozen => "frozen",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: CaptureState,
    },
    #[error("camera has no frame to freeze yet")]
    FrameUnavailable,
    #[error("capture controller has shut down")]
    ControllerClosed,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub tick_interval: Duration,
    pub constraints: StreamConstraints,
    pub target: Color,
}

impl CaptureSettings {
    pub fn from_config(config: &CaptureConfig) -> Result<Self, ColorParseError> {
        Ok(Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            constraints: StreamConstraints {
                ideal_width: config.ideal_width,
                ideal_height: config.ideal_height,
            },
            target: config.target.parse()?,
        })
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(33),
            constraints: StreamConstraints::default(),
            target: Color::new(255, 0, 0),
        }
    }
}

/// Releases the stream when dropped, whichever path drops it.
struct ActiveStream(Box<dyn FrameStream>);

impl Drop for ActiveStream {
    fn drop(&mut self) {
        self.0.release();
        debug!("stream released");
    }
}

/// Owns the camera stream and runs the `Idle -> Live <-> Frozen -> Idle`
/// state machine.
///
/// Must be driven from inside a tokio runtime: scheduling a tick spawns a
/// timer task. Ticks arrive on the receiver returned by [`new`](Self::new)
/// and are handed back through [`handle_tick`](Self::handle_tick).
pub struct CaptureController {
    source: Box<dyn FrameSource>,
    constraints: StreamConstraints,
    state: CaptureState,
    stream: Option<ActiveStream>,
    /// The snapshot taken by `pause`, only while Frozen.
    frozen: Option<Frame>,
    target: Color,
    last_sample: Option<Color>,
    similarity: f64,
    error_text: String,
    scheduler: TickScheduler,
    report_tx: watch::Sender<ReportedState>,
    samples_taken: u64,
}

impl CaptureController {
    pub fn new(
        source: Box<dyn FrameSource>,
        settings: CaptureSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (scheduler, ticks) = TickScheduler::new(settings.tick_interval);
        let initial = ReportedState::new(None, settings.target, 0.0, "", false, false);
        let (report_tx, _) = watch::channel(initial);
        let controller = Self {
            source,
            constraints: settings.constraints,
            state: CaptureState::Idle,
            stream: None,
            frozen: None,
            target: settings.target,
            last_sample: None,
            similarity: 0.0,
            error_text: String::new(),
            scheduler,
            report_tx,
            samples_taken: 0,
        };
        (controller, ticks)
    }

    // -- Accessors --------------------------------------------------------------

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn target(&self) -> Color {
        self.target
    }

    pub fn last_sample(&self) -> Option<Color> {
        self.last_sample
    }

    pub fn frozen_frame(&self) -> Option<&Frame> {
        self.frozen.as_ref()
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }

    pub fn report(&self) -> ReportedState {
        self.report_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportedState> {
        self.report_tx.subscribe()
    }

    // -- Transitions ------------------------------------------------------------

    /// Idle -> Live. On failure the controller stays Idle with a
    /// user-visible error.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.require("start", &[CaptureState::Idle])?;

        let stream = match self.source.acquire(&self.constraints) {
            Ok(s) => s,
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "failed to acquire camera stream");
                self.error_text = format!("Unable to access camera: {e}");
                self.publish();
                return Err(CaptureError::SourceUnavailable(e));
            }
        };

        self.stream = Some(ActiveStream(stream));
        self.error_text.clear();
        self.state = CaptureState::Live;
        self.scheduler.schedule();
        info!(source = self.source.name(), "IDLE→LIVE: capture started");
        self.publish();
        Ok(())
    }

    /// Live -> Frozen. Grabs one frame, stops ticking, and samples the
    /// snapshot right away.
    pub fn pause(&mut self) -> Result<(), CaptureError> {
        self.require("pause", &[CaptureState::Live])?;

        let frame = self
            .stream
            .as_mut()
            .and_then(|s| s.0.current_frame())
            .ok_or(CaptureError::FrameUnavailable)?;

        self.scheduler.cancel();
        self.state = CaptureState::Frozen;
        self.sample(&frame);
        info!(
            seq = frame.seq(),
            captured_at_ms = frame.captured_at_ms(),
            "LIVE→FROZEN: frame captured"
        );
        self.frozen = Some(frame);
        self.publish();
        Ok(())
    }

    /// Frozen -> Live. Drops the snapshot and restarts ticking.
    pub fn resume(&mut self) -> Result<(), CaptureError> {
        self.require("resume", &[CaptureState::Frozen])?;

        self.frozen = None;
        self.state = CaptureState::Live;
        self.scheduler.schedule();
        info!("FROZEN→LIVE: capture resumed");
        self.publish();
        Ok(())
    }

    /// Live or Frozen -> Idle. Releases the stream.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        self.require("stop", &[CaptureState::Live, CaptureState::Frozen])?;

        let from = self.state;
        self.scheduler.cancel();
        self.frozen = None;
        self.stream = None;
        self.state = CaptureState::Idle;
        info!(from = %from, samples = self.samples_taken, "capture stopped");
        self.publish();
        Ok(())
    }

    /// Replace the target and rescore the last sample. Never pulls a frame,
    /// so while Frozen the score tracks the snapshot.
    pub fn set_target(&mut self, target: Color) {
        self.target = target;
        if let Some(sample) = self.last_sample {
            self.similarity = color::similarity(sample, target);
        }
        debug!(target_color = %target, similarity = self.similarity, "target changed");
        self.publish();
    }

    /// Run one live sampling cycle. Ticks issued before a cancel, or arriving
    /// outside Live, do nothing and schedule nothing.
    pub fn handle_tick(&mut self, tick: Tick) {
        if !self.scheduler.accept(tick) {
            trace!("stale tick ignored");
            return;
        }
        if self.state != CaptureState::Live {
            debug!(state = %self.state, "tick outside live state ignored");
            return;
        }

        match self.stream.as_mut().and_then(|s| s.0.current_frame()) {
            Some(frame) => {
                if self.sample(&frame) {
                    self.publish();
                }
            }
            None => trace!("no frame ready"),
        }
        self.scheduler.schedule();
    }

    // -- Internals --------------------------------------------------------------

    fn require(&self, action: &'static str, allowed: &[CaptureState]) -> Result<(), CaptureError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        debug!(action, state = %self.state, "invalid transition ignored");
        Err(CaptureError::InvalidTransition {
            action,
            state: self.state,
        })
    }

    /// Sample and score `frame`. Returns false and changes nothing when the
    /// region is empty.
    fn sample(&mut self, frame: &Frame) -> bool {
        match sample_frame(frame) {
            Ok(sampled) => {
                self.last_sample = Some(sampled);
                self.similarity = color::similarity(sampled, self.target);
                self.samples_taken += 1;
                debug!(
                    seq = frame.seq(),
                    color = %sampled,
                    similarity = format!("{:.1}", self.similarity),
                    "sampled center region"
                );
                true
            }
            Err(e) => {
                debug!(error = %e, seq = frame.seq(), "empty sample, keeping previous color");
                false
            }
        }
    }

    fn publish(&self) {
        self.report_tx.send_replace(ReportedState::new(
            self.last_sample,
            self.target,
            self.similarity,
            &self.error_text,
            self.state != CaptureState::Idle,
            self.state == CaptureState::Frozen,
        ));
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.scheduler.cancel();
        if self.stream.take().is_some() {
            info!(state = %self.state, "controller dropped with open stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_probe_common::color::Tier;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const GRAY: Color = Color::new(100, 150, 200);

    /// Shared view into the fake camera so tests can steer it and count calls.
    #[derive(Default)]
    struct Probe {
        color: Mutex<Color>,
        pulls: AtomicUsize,
        acquires: AtomicUsize,
        releases: AtomicUsize,
        deny: AtomicBool,
        blank: AtomicBool,
        /// Camera opened but has not produced a frame yet.
        starved: AtomicBool,
    }

    impl Probe {
        fn set_color(&self, c: Color) {
            *self.color.lock().unwrap() = c;
        }
        fn pulls(&self) -> usize {
            self.pulls.load(Ordering::SeqCst)
        }
        fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }
    }

    struct FakeCamera(Arc<Probe>);

    impl FrameSource for FakeCamera {
        fn acquire(&mut self, _: &StreamConstraints) -> Result<Box<dyn FrameStream>, SourceError> {
            if self.0.deny.load(Ordering::SeqCst) {
                return Err(SourceError::PermissionDenied("user dismissed the prompt".into()));
            }
            self.0.acquires.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeStream(Arc::clone(&self.0))))
        }
    }

    struct FakeStream(Arc<Probe>);

    impl FrameStream for FakeStream {
        fn current_frame(&mut self) -> Option<Frame> {
            let seq = self.0.pulls.fetch_add(1, Ordering::SeqCst) as u64;
            if self.0.starved.load(Ordering::SeqCst) {
                return None;
            }
            if self.0.blank.load(Ordering::SeqCst) {
                return Frame::from_rgba(0, 0, Vec::new(), 0, seq).ok();
            }
            Some(Frame::filled(64, 48, *self.0.color.lock().unwrap(), 0, seq))
        }

        fn release(&mut self) {
            self.0.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn controller(probe: &Arc<Probe>) -> (CaptureController, mpsc::UnboundedReceiver<Tick>) {
        let settings = CaptureSettings {
            tick_interval: Duration::from_millis(1),
            ..Default::default()
        };
        CaptureController::new(Box::new(FakeCamera(Arc::clone(probe))), settings)
    }

    async fn run_tick(ctl: &mut CaptureController, ticks: &mut mpsc::UnboundedReceiver<Tick>) {
        let tick = ticks.recv().await.expect("tick");
        ctl.handle_tick(tick);
    }

    #[tokio::test]
    async fn start_then_tick_samples_center() {
        let probe = Arc::new(Probe::default());
        probe.set_color(GRAY);
        let (mut ctl, mut ticks) = controller(&probe);

        ctl.start().unwrap();
        assert_eq!(ctl.state(), CaptureState::Live);
        assert!(ctl.report().is_active);
        assert_eq!(ctl.last_sample(), None);

        run_tick(&mut ctl, &mut ticks).await;
        assert_eq!(ctl.last_sample(), Some(GRAY));
        let report = ctl.report();
        assert_eq!(report.rgb_text, "100, 150, 200");
        assert_eq!(report.hex_text, "#6496c8");
        assert!(!report.is_paused);

        // Live ticks keep coming and follow the source.
        probe.set_color(Color::new(255, 0, 0));
        run_tick(&mut ctl, &mut ticks).await;
        assert_eq!(ctl.report().similarity_percent, 100);
        assert_eq!(ctl.report().tier, Tier::Excellent);
    }

    #[tokio::test]
    async fn pause_target_change_resume_scenario() {
        let probe = Arc::new(Probe::default());
        probe.set_color(GRAY);
        let (mut ctl, mut ticks) = controller(&probe);

        ctl.start().unwrap();
        run_tick(&mut ctl, &mut ticks).await;

        probe.set_color(Color::new(0, 255, 0));
        ctl.pause().unwrap();
        assert_eq!(ctl.state(), CaptureState::Frozen);
        let frozen_color = Color::new(0, 255, 0);
        assert_eq!(ctl.last_sample(), Some(frozen_color));
        assert!(ctl.frozen_frame().is_some());
        assert!(ctl.report().is_paused);
        let pulls_at_freeze = probe.pulls();

        // The camera moves on, but the frozen score must not.
        probe.set_color(Color::new(0, 0, 0));
        ctl.set_target(frozen_color);
        assert_eq!(probe.pulls(), pulls_at_freeze);
        assert_eq!(ctl.report().similarity_percent, 100);
        ctl.set_target(Color::new(255, 0, 255));
        assert_eq!(probe.pulls(), pulls_at_freeze);
        assert_eq!(
            ctl.report().similarity_percent,
            color::similarity_percent(frozen_color, Color::new(255, 0, 255))
        );
        assert_eq!(ctl.report().target_hex, "#ff00ff");

        ctl.resume().unwrap();
        assert_eq!(ctl.state(), CaptureState::Live);
        assert!(ctl.frozen_frame().is_none());
        run_tick(&mut ctl, &mut ticks).await;
        assert_eq!(ctl.last_sample(), Some(Color::new(0, 0, 0)));
        assert!(probe.pulls() > pulls_at_freeze);
    }

    #[tokio::test]
    async fn denied_start_stays_idle() {
        let probe = Arc::new(Probe::default());
        probe.deny.store(true, Ordering::SeqCst);
        let (mut ctl, _ticks) = controller(&probe);

        let err = ctl.start().unwrap_err();
        assert!(matches!(err, CaptureError::SourceUnavailable(SourceError::PermissionDenied(_))));
        assert_eq!(ctl.state(), CaptureState::Idle);
        let report = ctl.report();
        assert!(!report.error_text.is_empty());
        assert!(!report.is_active);

        let err = ctl.pause().unwrap_err();
        assert!(matches!(err, CaptureError::InvalidTransition { action: "pause", .. }));
        assert_eq!(ctl.state(), CaptureState::Idle);
        assert_eq!(ctl.report(), report);

        // Retrying after access is granted clears the error.
        probe.deny.store(false, Ordering::SeqCst);
        ctl.start().unwrap();
        assert!(ctl.report().error_text.is_empty());
    }

    #[tokio::test]
    async fn tick_already_delivered_before_pause_is_ignored() {
        let probe = Arc::new(Probe::default());
        probe.set_color(GRAY);
        let (mut ctl, mut ticks) = controller(&probe);

        ctl.start().unwrap();
        let stale = ticks.recv().await.unwrap();
        ctl.pause().unwrap();
        let pulls = probe.pulls();
        probe.set_color(Color::WHITE);

        ctl.handle_tick(stale);
        assert_eq!(probe.pulls(), pulls);
        assert_eq!(ctl.last_sample(), Some(GRAY));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ticks.try_recv().is_err(), "frozen controller must not reschedule");
    }

    #[tokio::test]
    async fn stop_releases_stream_and_cancels_ticks() {
        let probe = Arc::new(Probe::default());
        let (mut ctl, mut ticks) = controller(&probe);

        ctl.start().unwrap();
        ctl.pause().unwrap();
        ctl.stop().unwrap();
        assert_eq!(ctl.state(), CaptureState::Idle);
        assert!(ctl.frozen_frame().is_none());
        assert_eq!(probe.releases(), 1);
        assert!(!ctl.report().is_active);

        ctl.start().unwrap();
        let stale = ticks.recv().await.unwrap();
        ctl.stop().unwrap();
        assert_eq!(probe.releases(), 2);
        let pulls = probe.pulls();
        ctl.handle_tick(stale);
        assert_eq!(probe.pulls(), pulls);

        assert!(matches!(ctl.stop(), Err(CaptureError::InvalidTransition { .. })));
        assert_eq!(probe.releases(), 2);
    }

    #[tokio::test]
    async fn dropping_controller_releases_stream() {
        let probe = Arc::new(Probe::default());
        let (mut ctl, _ticks) = controller(&probe);
        ctl.start().unwrap();
        drop(ctl);
        assert_eq!(probe.releases(), 1);
    }

    #[tokio::test]
    async fn empty_frame_keeps_previous_color() {
        let probe = Arc::new(Probe::default());
        probe.set_color(GRAY);
        let (mut ctl, mut ticks) = controller(&probe);
        ctl.start().unwrap();
        run_tick(&mut ctl, &mut ticks).await;
        let before = ctl.report();

        probe.blank.store(true, Ordering::SeqCst);
        run_tick(&mut ctl, &mut ticks).await;
        assert_eq!(ctl.report(), before);
        assert_eq!(ctl.samples_taken(), 1);

        // Still ticking after the skipped sample.
        probe.blank.store(false, Ordering::SeqCst);
        probe.set_color(Color::WHITE);
        run_tick(&mut ctl, &mut ticks).await;
        assert_eq!(ctl.last_sample(), Some(Color::WHITE));
    }

    #[tokio::test]
    async fn pause_without_frame_stays_live() {
        let probe = Arc::new(Probe::default());
        probe.starved.store(true, Ordering::SeqCst);
        let (mut ctl, mut ticks) = controller(&probe);
        ctl.start().unwrap();

        assert!(matches!(ctl.pause(), Err(CaptureError::FrameUnavailable)));
        assert_eq!(ctl.state(), CaptureState::Live);
        assert!(ctl.frozen_frame().is_none());
        assert!(!ctl.report().is_paused);

        // Ticking carries on; once frames arrive they are sampled.
        run_tick(&mut ctl, &mut ticks).await;
        assert_eq!(ctl.last_sample(), None);
        probe.starved.store(false, Ordering::SeqCst);
        probe.set_color(GRAY);
        tokio::time::timeout(Duration::from_millis(500), run_tick(&mut ctl, &mut ticks))
            .await
            .expect("tick after failed pause");
        assert_eq!(ctl.last_sample(), Some(GRAY));
    }

    #[tokio::test]
    async fn invalid_transitions_change_nothing() {
        let probe = Arc::new(Probe::default());
        let (mut ctl, _ticks) = controller(&probe);

        assert!(ctl.resume().is_err());
        assert!(ctl.stop().is_err());
        ctl.start().unwrap();
        assert!(ctl.start().is_err());
        assert!(ctl.resume().is_err());
        assert_eq!(probe.acquires.load(Ordering::SeqCst), 1);
        ctl.pause().unwrap();
        assert!(ctl.pause().is_err());
        assert_eq!(ctl.state(), CaptureState::Frozen);
    }

    #[tokio::test]
    async fn target_change_before_any_sample_keeps_blank_report() {
        let probe = Arc::new(Probe::default());
        let (mut ctl, _ticks) = controller(&probe);
        ctl.set_target(Color::new(0, 0, 255));
        let report = ctl.report();
        assert_eq!(report.target_hex, "#0000ff");
        assert_eq!(report.hex_text, "");
        assert_eq!(probe.pulls(), 0);
    }

    #[test]
    fn settings_from_config() {
        let config = CaptureConfig {
            tick_interval_ms: 50,
            ideal_width: 640,
            ideal_height: 480,
            target: "#00FF7f".into(),
        };
        let settings = CaptureSettings::from_config(&config).unwrap();
        assert_eq!(settings.tick_interval, Duration::from_millis(50));
        assert_eq!(settings.constraints.ideal_width, 640);
        assert_eq!(settings.target, Color::new(0, 255, 127));

        let bad = CaptureConfig {
            target: "red".into(),
            ..config
        };
        assert!(CaptureSettings::from_config(&bad).is_err());
    }
}
