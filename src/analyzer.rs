// SPDX-License-Identifier: GPL-3.0-only

//! Frame pacing for barcode analysis
//!
//! [`ScanCoordinator`] decides which camera frames reach the detector and
//! which detections count:
//!
//! - at most one frame is in flight; frames offered meanwhile are rejected
//! - the first accepted detection latches the pause flag, and no further
//!   success is reported until [`ScanCoordinator::resume`]; frames keep being
//!   analyzed while paused so failures and pass completions still arrive
//! - every analyzed frame ends with exactly one `PassCompleted` event,
//!   whatever the outcome
//!
//! The coordinator is plain state owned by the session loop. The detector
//! itself runs on an [`AnalysisWorker`], a single task that analyzes frames
//! strictly one after another and posts each outcome back.

use crate::backends::camera::CameraFrame;
use crate::detector::{Barcode, BarcodeDetector, DetectionOutcome, DetectorError, FormatFilter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Analysis state of a scan session
///
/// A frame in flight takes precedence over the pause latch: a paused
/// coordinator analyzing a frame reports `AwaitingResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Ready to accept the next frame
    #[default]
    Idle,
    /// A frame is with the detector
    AwaitingResult,
    /// A detection was accepted; waiting for an explicit resume
    Paused,
    /// Session ended; nothing is accepted anymore
    Finished,
}

/// Why a frame was not forwarded to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another frame is still being analyzed
    Busy,
    /// The session is over
    Finished,
}

/// Answer to [`ScanCoordinator::submit_frame`]
#[derive(Debug)]
pub enum Submission {
    /// Forward this frame to the detector
    Accepted(CameraFrame),
    Rejected(RejectReason),
}

/// Callbacks produced by a completed pass, in dispatch order
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerEvent {
    Success(Barcode),
    Failure(DetectorError),
    PassCompleted { failure_occurred: bool },
}

/// Single-flight frame gate with success latching
#[derive(Debug, Default)]
pub struct ScanCoordinator {
    in_flight: bool,
    paused: bool,
    finished: bool,
    formats: FormatFilter,
    passes: u64,
}

impl ScanCoordinator {
    /// Coordinator accepting detections of the given symbologies
    pub fn new(formats: FormatFilter) -> Self {
        Self {
            formats,
            ..Default::default()
        }
    }

    pub fn state(&self) -> ScanState {
        if self.finished {
            ScanState::Finished
        } else if self.in_flight {
            ScanState::AwaitingResult
        } else if self.paused {
            ScanState::Paused
        } else {
            ScanState::Idle
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Number of passes completed so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Offer a frame for analysis
    pub fn submit_frame(&mut self, frame: CameraFrame) -> Submission {
        if self.finished {
            return Submission::Rejected(RejectReason::Finished);
        }
        if self.in_flight {
            return Submission::Rejected(RejectReason::Busy);
        }

        trace!(sequence = frame.sequence, paused = self.paused, "Frame accepted for analysis");
        self.in_flight = true;
        Submission::Accepted(frame)
    }

    /// Record the outcome of the in-flight frame
    ///
    /// Returns the callbacks to dispatch. A detection made while paused is
    /// dropped, but its pass still completes. Outcomes arriving when no frame
    /// is in flight (after teardown) are discarded and produce no events.
    pub fn complete(&mut self, outcome: DetectionOutcome) -> Vec<AnalyzerEvent> {
        if self.finished || !self.in_flight {
            debug!(state = ?self.state(), "Discarding detection outcome");
            return Vec::new();
        }

        self.in_flight = false;
        self.passes += 1;

        match outcome {
            Ok(barcodes) => {
                let accepted = barcodes
                    .into_iter()
                    .find(|b| b.has_value() && self.formats.accepts(b.format));

                let mut events = Vec::with_capacity(2);
                match accepted {
                    Some(barcode) if !self.paused => {
                        debug!(format = %barcode.format, pass = self.passes, "Detection accepted, pausing");
                        self.paused = true;
                        events.push(AnalyzerEvent::Success(barcode));
                    }
                    Some(barcode) => {
                        trace!(format = %barcode.format, pass = self.passes, "Paused, detection dropped");
                    }
                    None => {}
                }
                events.push(AnalyzerEvent::PassCompleted {
                    failure_occurred: false,
                });
                events
            }
            Err(error) => {
                warn!(error = %error, pass = self.passes, "Detector reported failure");
                vec![
                    AnalyzerEvent::Failure(error),
                    AnalyzerEvent::PassCompleted {
                        failure_occurred: true,
                    },
                ]
            }
        }
    }

    /// Re-arm after a success so the next detection is reported again
    ///
    /// Does nothing unless paused. A frame already in flight stays in flight.
    pub fn resume(&mut self) {
        if self.paused && !self.finished {
            debug!("Analysis resumed");
            self.paused = false;
        }
    }

    /// Stop accepting frames; a pending outcome will be discarded
    pub fn finish(&mut self) {
        self.finished = true;
    }
}

/// Outcome of one frame posted back by the worker
#[derive(Debug)]
pub struct PassOutcome {
    pub sequence: u64,
    pub outcome: DetectionOutcome,
}

/// Dedicated task running the detector one frame at a time
pub struct AnalysisWorker {
    frames: mpsc::Sender<CameraFrame>,
    handle: JoinHandle<()>,
}

impl AnalysisWorker {
    /// Spawn the worker; outcomes are delivered on `outcomes`
    pub fn spawn(
        detector: Arc<dyn BarcodeDetector>,
        outcomes: mpsc::UnboundedSender<PassOutcome>,
    ) -> Self {
        // Capacity 1: the coordinator never has more than one frame in flight
        let (frames, mut receiver) = mpsc::channel::<CameraFrame>(1);

        let handle = tokio::spawn(async move {
            while let Some(frame) = receiver.recv().await {
                let sequence = frame.sequence;
                let outcome = detector.detect(frame).await;
                if outcomes.send(PassOutcome { sequence, outcome }).is_err() {
                    debug!(sequence, "Session gone, dropping detection outcome");
                    break;
                }
            }
            debug!("Analysis worker stopped");
        });

        Self { frames, handle }
    }

    /// Hand an accepted frame to the worker
    pub fn analyze(&self, frame: CameraFrame) -> Result<(), CameraFrame> {
        self.frames.try_send(frame).map_err(|e| e.into_inner())
    }

    /// Close the frame queue and wait for the in-flight frame to finish
    pub async fn shutdown(self) {
        drop(self.frames);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Analysis worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::BarcodeFormat;

    fn frame(sequence: u64) -> CameraFrame {
        CameraFrame::from_rgba(1, 1, vec![0, 0, 0, 255], sequence)
    }

    fn qr(text: &str) -> Barcode {
        Barcode::new(BarcodeFormat::QrCode, text.as_bytes().to_vec(), None)
    }

    fn accept(coordinator: &mut ScanCoordinator, sequence: u64) {
        assert!(matches!(
            coordinator.submit_frame(frame(sequence)),
            Submission::Accepted(_)
        ));
    }

    #[test]
    fn test_rejects_overlapping_frames() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        accept(&mut coordinator, 1);
        assert!(matches!(
            coordinator.submit_frame(frame(2)),
            Submission::Rejected(RejectReason::Busy)
        ));
        assert_eq!(coordinator.state(), ScanState::AwaitingResult);
    }

    #[test]
    fn test_empty_pass_returns_to_idle() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        accept(&mut coordinator, 1);
        let events = coordinator.complete(Ok(Vec::new()));
        assert_eq!(
            events,
            vec![AnalyzerEvent::PassCompleted {
                failure_occurred: false
            }]
        );
        assert_eq!(coordinator.state(), ScanState::Idle);
        accept(&mut coordinator, 2);
    }

    #[test]
    fn test_success_latches_until_resume() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        accept(&mut coordinator, 1);
        let events = coordinator.complete(Ok(vec![qr("first"), qr("second")]));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], AnalyzerEvent::Success(qr("first")));
        assert!(coordinator.is_paused());
        assert_eq!(coordinator.state(), ScanState::Paused);

        // Still analyzed while paused, but the detection is not reported
        accept(&mut coordinator, 2);
        assert_eq!(
            coordinator.complete(Ok(vec![qr("second")])),
            vec![AnalyzerEvent::PassCompleted {
                failure_occurred: false
            }]
        );
        assert!(coordinator.is_paused());

        coordinator.resume();
        accept(&mut coordinator, 3);
        let events = coordinator.complete(Ok(vec![qr("third")]));
        assert_eq!(events[0], AnalyzerEvent::Success(qr("third")));
    }

    #[test]
    fn test_failures_reported_while_paused() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        accept(&mut coordinator, 1);
        coordinator.complete(Ok(vec![qr("code")]));

        accept(&mut coordinator, 2);
        assert_eq!(coordinator.state(), ScanState::AwaitingResult);
        let events = coordinator.complete(Err(DetectorError::Internal("crashed".into())));
        assert_eq!(
            events,
            vec![
                AnalyzerEvent::Failure(DetectorError::Internal("crashed".into())),
                AnalyzerEvent::PassCompleted {
                    failure_occurred: true
                }
            ]
        );
        assert_eq!(coordinator.state(), ScanState::Paused);
    }

    #[test]
    fn test_failure_reports_then_completes() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        accept(&mut coordinator, 1);
        let events = coordinator.complete(Err(DetectorError::Busy));
        assert_eq!(
            events,
            vec![
                AnalyzerEvent::Failure(DetectorError::Busy),
                AnalyzerEvent::PassCompleted {
                    failure_occurred: true
                }
            ]
        );
        assert_eq!(coordinator.state(), ScanState::Idle);
    }

    #[test]
    fn test_filtered_and_empty_codes_are_ignored() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::new([BarcodeFormat::Ean13]));
        accept(&mut coordinator, 1);
        let empty = Barcode::new(BarcodeFormat::Ean13, Vec::new(), None);
        let events = coordinator.complete(Ok(vec![qr("not wanted"), empty]));
        assert_eq!(
            events,
            vec![AnalyzerEvent::PassCompleted {
                failure_occurred: false
            }]
        );
        assert!(!coordinator.is_paused());
    }

    #[test]
    fn test_outcome_after_finish_is_discarded() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        accept(&mut coordinator, 1);
        coordinator.finish();
        assert!(coordinator.complete(Ok(vec![qr("late")])).is_empty());
        assert!(matches!(
            coordinator.submit_frame(frame(2)),
            Submission::Rejected(RejectReason::Finished)
        ));
    }

    #[test]
    fn test_resume_when_not_paused_is_noop() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        coordinator.resume();
        assert_eq!(coordinator.state(), ScanState::Idle);
        accept(&mut coordinator, 1);
        coordinator.resume();
        assert_eq!(coordinator.state(), ScanState::AwaitingResult);
    }

    #[test]
    fn test_resume_keeps_frame_in_flight() {
        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        accept(&mut coordinator, 1);
        coordinator.complete(Ok(vec![qr("code")]));
        accept(&mut coordinator, 2);

        coordinator.resume();
        assert!(!coordinator.is_paused());
        assert!(coordinator.is_in_flight());
        assert!(matches!(
            coordinator.submit_frame(frame(3)),
            Submission::Rejected(RejectReason::Busy)
        ));
        let events = coordinator.complete(Ok(vec![qr("again")]));
        assert_eq!(events[0], AnalyzerEvent::Success(qr("again")));
    }

    /// Pseudo-random walk over submits, outcomes and resumes checking the
    /// pacing guarantees after every step.
    #[test]
    fn test_pacing_properties_hold_for_random_sequences() {
        let mut seed: u64 = 0x5eed_cafe;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        let mut coordinator = ScanCoordinator::new(FormatFilter::all());
        let mut accepted = 0u64;
        let mut pass_completed = 0u64;
        let mut successes_since_resume = 0u32;
        let mut in_flight = false;

        for sequence in 0..5_000u64 {
            match next() % 4 {
                0 | 1 => match coordinator.submit_frame(frame(sequence)) {
                    Submission::Accepted(_) => {
                        assert!(!in_flight, "two frames in flight");
                        in_flight = true;
                        accepted += 1;
                    }
                    Submission::Rejected(RejectReason::Busy) => assert!(in_flight),
                    Submission::Rejected(_) => {}
                },
                2 if in_flight => {
                    let outcome = match next() % 3 {
                        0 => Ok(vec![qr("code")]),
                        1 => Ok(Vec::new()),
                        _ => Err(DetectorError::Busy),
                    };
                    in_flight = false;
                    for event in coordinator.complete(outcome) {
                        match event {
                            AnalyzerEvent::Success(_) => successes_since_resume += 1,
                            AnalyzerEvent::PassCompleted { .. } => pass_completed += 1,
                            AnalyzerEvent::Failure(_) => {}
                        }
                    }
                    assert!(successes_since_resume <= 1);
                }
                3 => {
                    coordinator.resume();
                    if !coordinator.is_paused() {
                        successes_since_resume = 0;
                    }
                }
                _ => {}
            }
        }

        if in_flight {
            coordinator.complete(Ok(Vec::new()));
            pass_completed += 1;
        }
        assert_eq!(accepted, pass_completed);
        assert_eq!(coordinator.passes(), pass_completed);
    }
}
