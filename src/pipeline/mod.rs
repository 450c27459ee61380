#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod helper;
pub mod replay;

use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::types::{Frame, LandmarkFrame, PoseFrame};

pub trait PoseEngine: Send + 'static {
    /// `Ok(None)` when no body is visible in the frame.
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<Option<LandmarkFrame>>;
}

pub trait PoseSource {
    /// Blocks until the next frame. `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<PoseFrame>;
}

fn run_worker_loop<E: PoseEngine>(
    mut engine: E,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<PoseFrame>,
) {
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        let landmarks = match engine.infer(&frame) {
            Ok(landmarks) => landmarks,
            Err(err) => {
                // Counts as "no body" so the session still ticks.
                log::warn!("pose inference failed: {err:?}");
                None
            }
        };

        match result_tx.try_send(PoseFrame { frame, landmarks }) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
    log::debug!("pose worker stopped");
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

pub fn start_pose_worker<E: PoseEngine>(
    engine: E,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<PoseFrame>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("pose-worker".into())
        .spawn(move || run_worker_loop(engine, frame_rx, result_tx))
}

pub struct ChannelPoseSource {
    results: Receiver<PoseFrame>,
}

impl ChannelPoseSource {
    pub fn new(results: Receiver<PoseFrame>) -> Self {
        Self { results }
    }
}

impl PoseSource for ChannelPoseSource {
    fn next_frame(&mut self) -> Option<PoseFrame> {
        self.results.recv().ok()
    }
}
