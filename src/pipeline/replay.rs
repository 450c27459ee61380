//! Replays recorded landmarks from a JSON-lines file, one frame per line:
//! `{"width": 1280, "height": 960, "landmarks": [[x, y], ...] | null}`.
//! Used to rehearse a booth without a camera.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::PoseSource;
use crate::types::{Frame, LandmarkFrame, PoseFrame};

#[derive(Deserialize, Debug)]
struct RecordedFrame {
    width: u32,
    height: u32,
    #[serde(default)]
    landmarks: Option<Vec<[f32; 2]>>,
}

pub struct ReplayPoseSource {
    lines: Box<dyn Iterator<Item = std::io::Result<String>>>,
    frame_delay: Duration,
    line_no: usize,
}

impl ReplayPoseSource {
    pub fn open(path: &Path, frame_delay: Duration) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open replay file {}", path.display()))?;
        log::info!("replaying landmarks from {}", path.display());
        Ok(Self::new(BufReader::new(file), frame_delay))
    }

    pub fn new<R: BufRead + 'static>(reader: R, frame_delay: Duration) -> Self {
        Self {
            lines: Box::new(reader.lines()),
            frame_delay,
            line_no: 0,
        }
    }
}

impl PoseSource for ReplayPoseSource {
    fn next_frame(&mut self) -> Option<PoseFrame> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => {
                    log::warn!("replay read failed: {err}");
                    return None;
                }
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let recorded: RecordedFrame = match serde_json::from_str(&line) {
                Ok(recorded) => recorded,
                Err(err) => {
                    log::warn!("skipping replay line {}: {err}", self.line_no);
                    continue;
                }
            };

            if !self.frame_delay.is_zero() {
                thread::sleep(self.frame_delay);
            }
            let landmarks = recorded.landmarks.map(|points| {
                LandmarkFrame::from_mediapipe(&points, recorded.width, recorded.height)
            });
            return Some(PoseFrame {
                frame: Frame::empty(recorded.width, recorded.height),
                landmarks,
            });
        }
    }
}
