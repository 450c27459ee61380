//! Pose landmarks from an external helper process.
//!
//! Each frame goes to the helper's stdin as three little-endian `u32`s
//! (width, height, channels) followed by the raw RGB bytes. The helper answers
//! with one JSON line: `{"landmarks": [[x, y], ...] | null, "error": "..."}`
//! in the 33-point MediaPipe pose layout, normalized to 0..1. It prints `READY`
//! once before the first frame.

use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::PoseEngine;
use crate::{
    error::PoseError,
    types::{Frame, LandmarkFrame},
};

#[derive(Deserialize, Debug)]
struct HelperResponse {
    #[serde(default)]
    landmarks: Option<Vec<[f32; 2]>>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HelperEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl HelperEngine {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        log::info!("starting pose helper: {program} {}", args.join(" "));

        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start pose helper {program}"))?;

        let stdin = process.stdin.take().context("pose helper has no stdin")?;
        let stdout = process.stdout.take().context("pose helper has no stdout")?;
        let mut stdout = BufReader::new(stdout);

        let mut ready = String::new();
        stdout.read_line(&mut ready)?;
        if ready.trim() != "READY" {
            let _ = process.kill();
            anyhow::bail!("pose helper did not signal ready, got: {ready:?}");
        }
        log::info!("pose helper ready");

        Ok(Self {
            process,
            stdin,
            stdout,
        })
    }
}

impl PoseEngine for HelperEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Option<LandmarkFrame>> {
        if frame.rgb.is_empty() {
            return Ok(None);
        }
        write_frame(&mut self.stdin, frame).map_err(PoseError::from)?;

        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).map_err(PoseError::from)?;
        if read == 0 {
            return Err(PoseError::HelperClosed.into());
        }
        Ok(parse_response(&line, frame.width, frame.height)?)
    }
}

impl Drop for HelperEngine {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

pub fn write_frame<W: Write>(out: &mut W, frame: &Frame) -> std::io::Result<()> {
    out.write_all(&frame.width.to_le_bytes())?;
    out.write_all(&frame.height.to_le_bytes())?;
    out.write_all(&3u32.to_le_bytes())?;
    out.write_all(&frame.rgb)?;
    out.flush()
}

pub fn parse_response(
    line: &str,
    width: u32,
    height: u32,
) -> Result<Option<LandmarkFrame>, PoseError> {
    let response: HelperResponse = serde_json::from_str(line.trim())?;
    if let Some(error) = response.error {
        return Err(PoseError::Helper(error));
    }
    Ok(response
        .landmarks
        .map(|points| LandmarkFrame::from_mediapipe(&points, width, height)))
}
