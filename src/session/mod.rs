// SPDX-License-Identifier: GPL-3.0-only

//! Scanner session
//!
//! A session owns one camera backend and one detector for its whole
//! lifetime and ends with exactly one [`ScanResult`]:
//!
//! 1. camera permission is checked, then requested; denial ends the session
//!    with [`ScanResult::MissingPermission`]
//! 2. the camera starts and the overlay becomes visible
//! 3. frames flow through the [`ScanCoordinator`] to the [`AnalysisWorker`]
//! 4. an accepted code is either returned at once or handed to the host's
//!    [`SuccessActionProvider`], which may close, continue or show an error
//! 5. teardown always runs: the worker drains and the camera stops
//!
//! Everything except detection runs on the task awaiting
//! [`ScannerSession::run`]. The host talks to it through a
//! [`SessionHandle`] and listens to [`SessionEvent`]s.

mod hooks;
mod overlay;

pub use hooks::{HapticFeedback, NoHaptics, ScannerAction, SuccessActionProvider, TerminalBell};
pub use overlay::OverlayState;

use crate::analyzer::{AnalysisWorker, AnalyzerEvent, PassOutcome, ScanCoordinator, Submission};
use crate::backends::camera::{
    BackendError, CameraBackend, CameraFrame, CameraSelector, FrameReceiver, Resolution,
};
use crate::backends::permission::{GrantedPermission, PermissionProvider};
use crate::config::ScannerConfig;
use crate::constants::{FRAME_TIMEOUT, TARGET_RESOLUTION};
use crate::detector::{Barcode, BarcodeDetector, DetectorError};
use crate::errors::ScanError;
use crate::result::ScanResult;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

/// Requests from the host to a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Close the scanner (back button, close button, Ctrl+C)
    Close,
    /// Switch the torch; ignored when the toggle is hidden
    SetTorch(bool),
    /// The error dialog was dismissed
    DismissError,
}

/// Notifications from a running session to the host
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    OverlayChanged(OverlayState),
    /// Show a blocking error dialog; answer with [`SessionHandle::dismiss_error`]
    ShowError(String),
    /// Keep the display awake while `true`
    KeepScreenOn(bool),
}

/// Cloneable remote control for a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Returns `false` when the session already ended
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn close(&self) -> bool {
        self.send(SessionCommand::Close)
    }

    pub fn set_torch(&self, on: bool) -> bool {
        self.send(SessionCommand::SetTorch(on))
    }

    pub fn dismiss_error(&self) -> bool {
        self.send(SessionCommand::DismissError)
    }
}

/// One scanner screen, from permission check to result
pub struct ScannerSession {
    config: ScannerConfig,
    backend: Box<dyn CameraBackend>,
    detector: Arc<dyn BarcodeDetector>,
    permission: Arc<dyn PermissionProvider>,
    success_action: Option<Arc<dyn SuccessActionProvider>>,
    haptics: Arc<dyn HapticFeedback>,
    frame_timeout: Duration,
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    commands_rx: mpsc::UnboundedReceiver<SessionCommand>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl ScannerSession {
    /// Session with granted permission, no haptics and no success mediation
    pub fn new(
        config: ScannerConfig,
        backend: Box<dyn CameraBackend>,
        detector: Arc<dyn BarcodeDetector>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            config: config.validate(),
            backend,
            detector,
            permission: Arc::new(GrantedPermission),
            success_action: None,
            haptics: Arc::new(NoHaptics),
            frame_timeout: FRAME_TIMEOUT,
            commands_tx,
            commands_rx,
            events: None,
        }
    }

    pub fn with_permission(mut self, permission: Arc<dyn PermissionProvider>) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_success_action(mut self, provider: Arc<dyn SuccessActionProvider>) -> Self {
        self.success_action = Some(provider);
        self
    }

    /// Feedback used when `haptic_feedback` is enabled in the config
    pub fn with_haptics(mut self, haptics: Arc<dyn HapticFeedback>) -> Self {
        self.haptics = haptics;
        self
    }

    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            commands: self.commands_tx.clone(),
        }
    }

    /// Receive session events; only the latest subscriber is served
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Run the session to completion
    pub async fn run(self) -> ScanResult {
        let session_id = uuid::Uuid::new_v4();
        let span = info_span!("scan_session", id = %session_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> ScanResult {
        info!(
            formats = ?self.config.formats,
            front = self.config.use_front_camera,
            "Scanner session starting"
        );

        if !self.permission.check().is_granted() {
            debug!("Camera permission missing, requesting");
            if !self.permission.request().await.is_granted() {
                info!("Camera permission denied");
                return ScanResult::MissingPermission;
            }
        }

        let selector = CameraSelector::from_front_flag(self.config.use_front_camera);
        let mut frames = match self
            .backend
            .start(selector, Resolution::from(TARGET_RESOLUTION))
        {
            Ok(frames) => frames,
            Err(e) => {
                error!(error = %e, backend = self.backend.name(), "Failed to start camera");
                return ScanResult::Error(e.into());
            }
        };
        info!(backend = self.backend.name(), camera = %selector, "Camera started");

        let mut overlay = OverlayState::from_config(&self.config);
        overlay.visible = true;
        overlay.torch_visible = self.config.show_torch_toggle && self.backend.has_flash_unit();
        self.emit(SessionEvent::OverlayChanged(overlay.clone()));
        if self.config.keep_screen_on {
            self.emit(SessionEvent::KeepScreenOn(true));
        }

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let worker = AnalysisWorker::spawn(Arc::clone(&self.detector), outcome_tx);
        let mut coordinator = ScanCoordinator::new(self.config.format_filter());

        let result = self
            .scan_loop(&mut frames, &worker, outcome_rx, &mut coordinator, &mut overlay)
            .await;

        // Teardown. The frame receiver goes first so a producer blocked on a
        // full channel wakes up before the backend joins it.
        coordinator.finish();
        drop(frames);
        worker.shutdown().await;

        overlay.visible = false;
        overlay.torch_on = false;
        self.emit(SessionEvent::OverlayChanged(overlay));
        if self.config.keep_screen_on {
            self.emit(SessionEvent::KeepScreenOn(false));
        }

        // Stopping joins the capture thread
        let mut backend = self.backend;
        match tokio::task::spawn_blocking(move || backend.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to stop camera"),
            Err(e) => warn!(error = %e, "Camera stop task panicked"),
        }

        info!(
            code = result.result_code(),
            passes = coordinator.passes(),
            "Scanner session finished"
        );
        result
    }

    async fn scan_loop(
        &mut self,
        frames: &mut FrameReceiver,
        worker: &AnalysisWorker,
        mut outcomes: mpsc::UnboundedReceiver<PassOutcome>,
        coordinator: &mut ScanCoordinator,
        overlay: &mut OverlayState,
    ) -> ScanResult {
        let mut pending_error: Option<ScanError> = None;
        let mut decision: Option<BoxFuture<'static, ScannerAction>> = None;
        let mut accepted: Option<Barcode> = None;
        let mut error_dialog_open = false;
        let mut frames_done = false;
        // Newest frame that arrived while the detector was busy
        let mut waiting: Option<CameraFrame> = None;
        let mut timeout_reported = false;
        let mut frame_deadline = Instant::now() + self.frame_timeout;

        loop {
            tokio::select! {
                command = self.commands_rx.recv() => match command {
                    Some(SessionCommand::Close) | None => {
                        info!("Scanner closed by host");
                        return pending_error.map(ScanResult::Error).unwrap_or(ScanResult::UserCanceled);
                    }
                    Some(SessionCommand::SetTorch(on)) => self.set_torch(on, overlay),
                    Some(SessionCommand::DismissError) => {
                        if error_dialog_open {
                            debug!("Error dialog dismissed");
                            error_dialog_open = false;
                            coordinator.resume();
                        }
                    }
                },

                frame = frames.recv(), if !frames_done => match frame {
                    Some(frame) => {
                        frame_deadline = Instant::now() + self.frame_timeout;
                        timeout_reported = false;
                        if let Err(e) = offer_frame(coordinator, worker, &mut waiting, frame) {
                            return ScanResult::Error(e);
                        }
                    }
                    None => {
                        debug!("Camera stream ended");
                        frames_done = true;
                    }
                },

                _ = tokio::time::sleep_until(frame_deadline), if !frames_done && !timeout_reported => {
                    warn!(timeout_ms = self.frame_timeout.as_millis(), "No frame from camera");
                    timeout_reported = true;
                    pending_error = Some(ScanError::Camera(BackendError::FrameTimeout));
                },

                pass = outcomes.recv() => {
                    let Some(pass) = pass else {
                        error!("Analysis worker stopped unexpectedly");
                        return ScanResult::Error(ScanError::Detector(DetectorError::Internal(
                            "analysis worker stopped".to_string(),
                        )));
                    };
                    trace!(sequence = pass.sequence, "Pass finished");

                    for event in coordinator.complete(pass.outcome) {
                        match event {
                            AnalyzerEvent::Success(barcode) => {
                                info!(format = %barcode.format, value_type = ?barcode.value_type, "Code scanned");
                                overlay.highlighted = true;
                                self.emit(SessionEvent::OverlayChanged(overlay.clone()));
                                if self.config.haptic_feedback {
                                    self.haptics.perform();
                                }

                                match &self.success_action {
                                    Some(provider) => {
                                        decision = Some(provider.on_success(&barcode));
                                        accepted = Some(barcode);
                                    }
                                    None => return ScanResult::Success(barcode),
                                }
                            }
                            AnalyzerEvent::Failure(e) => {
                                let err = ScanError::Detector(e);
                                if !err.is_resolvable() {
                                    error!(error = %err, "Fatal detector error");
                                    return ScanResult::Error(err);
                                }
                                warn!(error = %err, "Detector error, scanning continues");
                                pending_error = Some(err);
                            }
                            AnalyzerEvent::PassCompleted { failure_occurred } => {
                                if overlay.loading != failure_occurred {
                                    overlay.loading = failure_occurred;
                                    self.emit(SessionEvent::OverlayChanged(overlay.clone()));
                                }
                            }
                        }
                    }

                    if let Some(frame) = waiting.take()
                        && let Err(e) = offer_frame(coordinator, worker, &mut waiting, frame)
                    {
                        return ScanResult::Error(e);
                    }
                },

                action = await_decision(&mut decision) => {
                    decision = None;
                    let barcode = accepted.take();
                    debug!(?action, "Success action decided");

                    match (action, barcode) {
                        (ScannerAction::CloseScanner, Some(barcode)) => return ScanResult::Success(barcode),
                        (ScannerAction::CloseScanner, None) => return ScanResult::UserCanceled,
                        (ScannerAction::ContinueScanning, _) => {
                            overlay.highlighted = false;
                            self.emit(SessionEvent::OverlayChanged(overlay.clone()));
                            coordinator.resume();
                        }
                        (ScannerAction::Error(message), _) => {
                            overlay.highlighted = false;
                            self.emit(SessionEvent::OverlayChanged(overlay.clone()));
                            if self.emit(SessionEvent::ShowError(message)) {
                                error_dialog_open = true;
                            } else {
                                // Nobody can dismiss the dialog
                                coordinator.resume();
                            }
                        }
                    }
                },
            }

            if frames_done
                && !coordinator.is_in_flight()
                && waiting.is_none()
                && decision.is_none()
                && !error_dialog_open
            {
                info!("Camera stream ended without an accepted code");
                return ScanResult::Error(
                    pending_error.unwrap_or(ScanError::Camera(BackendError::StreamEnded)),
                );
            }
        }
    }

    fn set_torch(&mut self, on: bool, overlay: &mut OverlayState) {
        if !overlay.torch_visible {
            debug!(on, "Torch toggle hidden, ignoring");
            return;
        }

        match self.backend.enable_torch(on) {
            Ok(state) => {
                overlay.torch_on = state.is_on();
                self.emit(SessionEvent::OverlayChanged(overlay.clone()));
            }
            Err(e) => warn!(error = %e, on, "Failed to switch torch"),
        }
    }

    /// Returns whether a subscriber received the event
    fn emit(&mut self, event: SessionEvent) -> bool {
        let Some(events) = &self.events else {
            return false;
        };
        if events.send(event).is_err() {
            debug!("Event subscriber gone");
            self.events = None;
            return false;
        }
        true
    }
}

/// Submit a frame, or keep it until the in-flight pass completes
///
/// Only the newest waiting frame is kept; older ones are dropped.
fn offer_frame(
    coordinator: &mut ScanCoordinator,
    worker: &AnalysisWorker,
    waiting: &mut Option<CameraFrame>,
    frame: CameraFrame,
) -> Result<(), ScanError> {
    if coordinator.is_in_flight() {
        if let Some(dropped) = waiting.replace(frame) {
            trace!(sequence = dropped.sequence, "Frame superseded while detector busy");
        }
        return Ok(());
    }

    match coordinator.submit_frame(frame) {
        Submission::Accepted(frame) => worker.analyze(frame).map_err(|_| {
            error!("Analysis worker is gone");
            ScanError::Detector(DetectorError::Internal("analysis worker stopped".to_string()))
        }),
        Submission::Rejected(reason) => {
            trace!(?reason, "Frame skipped");
            Ok(())
        }
    }
}

async fn await_decision(decision: &mut Option<BoxFuture<'static, ScannerAction>>) -> ScannerAction {
    match decision {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}
