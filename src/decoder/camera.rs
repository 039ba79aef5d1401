use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{error, info, warn};
use opencv::{core, imgproc, prelude::*, videoio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::frame_data::FrameData;
use super::FrameSource;

/// Live webcam capture decoded on a background thread.
///
/// The capture thread pushes into a one-slot channel and drops frames while
/// the slot is full; `latest_frame` keeps the newest one it has seen.
pub struct CameraSource {
    rx: Receiver<FrameData>,
    latest: Option<FrameData>,
    target: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Pause after an empty read so a stalled device does not spin the thread.
const EMPTY_FRAME_BACKOFF: Duration = Duration::from_millis(10);
const EMPTY_FRAME_LOG_EVERY: u32 = 100;

fn should_log_empty(streak: u32) -> bool {
    streak == 1 || streak % EMPTY_FRAME_LOG_EVERY == 0
}

fn pack(width: u32, height: u32) -> u64 {
    ((width as u64) << 32) | height as u64
}

fn unpack(v: u64) -> (u32, u32) {
    ((v >> 32) as u32, v as u32)
}

impl CameraSource {
    pub fn open(index: i32, width: u32, height: u32) -> Result<Self> {
        let mut capture = videoio::VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open camera {}", index));
        }

        let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64);
        let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64);

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        let cam_w = capture.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let cam_h = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        info!("camera {} opened: {}x{} @ {} fps", index, cam_w, cam_h, fps);

        let (tx, rx) = crossbeam_channel::bounded(1);
        let target = Arc::new(AtomicU64::new(pack(width, height)));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let target = target.clone();
            let running = running.clone();
            std::thread::spawn(move || capture_loop(capture, tx, target, running))
        };

        Ok(Self {
            rx,
            latest: None,
            target,
            running,
            handle: Some(handle),
        })
    }
}

fn capture_loop(mut capture: videoio::VideoCapture, tx: Sender<FrameData>, target: Arc<AtomicU64>, running: Arc<AtomicBool>) {
    let mut empty_streak = 0u32;
    while running.load(Ordering::SeqCst) {
        let (w, h) = unpack(target.load(Ordering::SeqCst));
        match read_frame(&mut capture, w, h) {
            Ok(Some(frame)) => {
                empty_streak = 0;
                match tx.try_send(frame) {
                    Ok(_) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            Ok(None) => {
                empty_streak = empty_streak.saturating_add(1);
                if should_log_empty(empty_streak) {
                    warn!("camera returned an empty frame ({} in a row)", empty_streak);
                }
                std::thread::sleep(EMPTY_FRAME_BACKOFF);
            }
            Err(e) => {
                error!("camera read failed: {}", e);
                break;
            }
        }
    }
}

fn read_frame(capture: &mut videoio::VideoCapture, width: u32, height: u32) -> Result<Option<FrameData>> {
    let mut frame = Mat::default();
    if !capture.read(&mut frame)? || frame.empty() {
        return Ok(None);
    }

    let mut resized = Mat::default();
    imgproc::resize(
        &frame,
        &mut resized,
        core::Size::new(width as i32, height as i32),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut rgba = Mat::default();
    imgproc::cvt_color(&resized, &mut rgba, imgproc::COLOR_BGR2RGBA, 0, core::AlgorithmHint::ALGO_HINT_DEFAULT)?;

    if !rgba.is_continuous() {
        return Err(anyhow!("Frame data is not continuous"));
    }

    Ok(Some(FrameData::new(rgba.data_bytes()?.to_vec(), width, height)))
}

impl FrameSource for CameraSource {
    fn name(&self) -> &str {
        "camera"
    }

    fn latest_frame(&mut self) -> Result<Option<&FrameData>> {
        if let Some(frame) = self.rx.try_iter().last() {
            self.latest = Some(frame);
        }
        if self.latest.is_none() && self.handle.as_ref().map_or(true, |h| h.is_finished()) {
            return Err(anyhow!("camera capture thread stopped"));
        }
        Ok(self.latest.as_ref())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.target.store(pack(width, height), Ordering::SeqCst);
        self.latest = None;
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
