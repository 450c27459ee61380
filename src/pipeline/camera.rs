use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use image::{RgbImage, imageops};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
};

use crate::{config::PoseConfig, types::Frame};

const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::NV12,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
];

fn requested_formats(width: u32, height: u32) -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::HighestResolution(Resolution::new(width, height)),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn build_camera(index: CameraIndex, width: u32, height: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(width, height) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Flips the frame so the player sees themselves as in a mirror.
pub fn mirror(rgb: Vec<u8>, width: u32, height: u32) -> Option<Vec<u8>> {
    let mut image = RgbImage::from_raw(width, height, rgb)?;
    imageops::flip_horizontal_in_place(&mut image);
    Some(image.into_raw())
}

pub fn start_camera_stream(config: &PoseConfig, frame_tx: Sender<Frame>) -> Result<CameraStream> {
    let index = CameraIndex::Index(config.camera_index);
    let (width, height) = (config.width, config.height);

    // Fail fast before spawning the capture thread.
    drop(build_camera(index.clone(), width, height)?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::Builder::new()
        .name("camera".into())
        .spawn(move || {
            let mut camera = match build_camera(index, width, height) {
                Ok(cam) => cam,
                Err(err) => {
                    log::error!("failed to open camera: {err:?}");
                    return;
                }
            };
            log::info!("camera streaming at {}", camera.resolution());

            while !stop_flag.load(Ordering::Relaxed) {
                let frame = match camera.frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::warn!("camera frame read failed: {err:?}");
                        continue;
                    }
                };

                let decoded = match frame.decode_image::<RgbFormat>() {
                    Ok(img) => img,
                    Err(err) => {
                        log::warn!("failed to decode camera frame: {err:?}");
                        continue;
                    }
                };

                let (width, height) = decoded.dimensions();
                let Some(rgb) = mirror(decoded.into_raw(), width, height) else {
                    continue;
                };

                let frame = Frame {
                    rgb,
                    width,
                    height,
                };

                // Drop if the worker is busy, otherwise forward every frame.
                let _ = frame_tx.try_send(frame);
            }

            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err:?}");
            }
        })?;

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}
