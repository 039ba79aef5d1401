use anyhow::Result;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::pipeline::GlitchPipeline;
use crate::decoder::FrameSource;
use crate::renderer::{Presenter, SurfaceEvent};

/// How far behind schedule the loop may fall before it stops trying to catch up.
const MAX_LAG: Duration = Duration::from_millis(50);

/// Strict time-based tick scheduling at a fixed rate.
pub struct FramePacer {
    start: Instant,
    interval: Duration,
    index: u32,
}

impl FramePacer {
    pub fn new(fps: u32) -> Self {
        Self {
            start: Instant::now(),
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            index: 0,
        }
    }

    /// Time left until tick `index` is due, `None` if it is already late.
    fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        let expected = self.interval * self.index;
        expected.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Sleep until the next tick is due.
    pub fn wait(&mut self) {
        let elapsed = self.start.elapsed();
        match self.remaining(elapsed) {
            Some(d) => thread::sleep(d),
            None => {
                let expected = self.interval * self.index;
                if elapsed > expected + MAX_LAG {
                    // Far behind: restart the schedule instead of bursting.
                    self.start = Instant::now();
                    self.index = 0;
                }
            }
        }
        self.index += 1;
    }
}

/// Tick the pipeline against a live source until the presenter quits or
/// `running` is cleared.
pub fn run_live(
    pipeline: &mut GlitchPipeline,
    source: &mut dyn FrameSource,
    presenter: &mut dyn Presenter,
    fps: u32,
    running: Arc<AtomicBool>,
) -> Result<()> {
    use thread_priority::*;
    if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
        warn!("Failed to set thread priority: {:?}", e);
    }

    info!("live from {} at {} fps", source.name(), fps);
    let mut pacer = FramePacer::new(fps);

    while running.load(Ordering::SeqCst) {
        match presenter.poll_event()? {
            Some(SurfaceEvent::Quit) => break,
            Some(SurfaceEvent::Resize(w, h)) => {
                pipeline.resize(w, h);
                source.resize(w, h);
            }
            None => {}
        }

        let frame = source.latest_frame()?;
        let buffer = pipeline.tick(frame)?;
        presenter.present(buffer)?;

        pacer.wait();
    }

    let drift = pipeline.last_drift();
    info!(
        "stopped after {} frames, last drift x={:.2} y={:.2}",
        pipeline.frame_count(),
        drift.x,
        drift.y
    );
    Ok(())
}

/// Headless: tick `frames` times as fast as possible and hand each result to
/// the presenter. Returns the number of frames presented.
pub fn run_render(
    pipeline: &mut GlitchPipeline,
    source: &mut dyn FrameSource,
    presenter: &mut dyn Presenter,
    frames: u64,
) -> Result<u64> {
    let start = Instant::now();
    let mut presented = 0;

    for _ in 0..frames {
        let frame = source.latest_frame()?;
        let buffer = pipeline.tick(frame)?;
        presenter.present(buffer)?;
        presented += 1;
    }

    info!("rendered {} frames in {}ms", presented, start.elapsed().as_millis());
    Ok(presented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::PixelBuffer;
    use crate::core::params::EffectParams;
    use crate::decoder::pattern::PatternSource;

    struct Recorder {
        presented: Vec<(u32, u32, u64)>,
        events: Vec<SurfaceEvent>,
    }

    impl Presenter for Recorder {
        fn present(&mut self, buffer: &PixelBuffer) -> Result<()> {
            self.presented.push((buffer.width(), buffer.height(), buffer.generation()));
            Ok(())
        }

        fn poll_event(&mut self) -> Result<Option<SurfaceEvent>> {
            Ok(if self.events.is_empty() { None } else { Some(self.events.remove(0)) })
        }
    }

    #[test]
    fn test_render_presents_every_frame() {
        let mut pipeline = GlitchPipeline::new(EffectParams::default(), 32, 24, 1, 7);
        let mut source = PatternSource::new(32, 24);
        let mut out = Recorder { presented: Vec::new(), events: Vec::new() };

        let n = run_render(&mut pipeline, &mut source, &mut out, 5).unwrap();
        assert_eq!(n, 5);
        assert_eq!(pipeline.frame_count(), 5);
        let generations: Vec<u64> = out.presented.iter().map(|p| p.2).collect();
        assert_eq!(generations, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_live_handles_resize_then_quit() {
        let mut pipeline = GlitchPipeline::new(EffectParams::identity(), 16, 16, 1, 1);
        let mut source = PatternSource::new(16, 16);
        let mut out = Recorder {
            presented: Vec::new(),
            events: vec![SurfaceEvent::Resize(40, 10)],
        };

        // The recorder runs out of events after the resize; clear the flag
        // from another thread so the loop ends.
        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            r.store(false, Ordering::SeqCst);
        });

        run_live(&mut pipeline, &mut source, &mut out, 120, running).unwrap();
        stopper.join().unwrap();

        assert!(!out.presented.is_empty());
        assert!(out.presented.iter().all(|p| (p.0, p.1) == (40, 10)));
        assert_eq!(pipeline.buffer().width(), 40);
    }

    #[test]
    fn test_live_quit_event_stops_loop() {
        let mut pipeline = GlitchPipeline::new(EffectParams::default(), 8, 8, 1, 1);
        let mut source = PatternSource::new(8, 8);
        let mut out = Recorder { presented: Vec::new(), events: vec![SurfaceEvent::Quit] };

        run_live(&mut pipeline, &mut source, &mut out, 60, Arc::new(AtomicBool::new(true))).unwrap();
        assert!(out.presented.is_empty());
        assert_eq!(pipeline.frame_count(), 0);
    }

    #[test]
    fn test_pacer_schedule() {
        let mut pacer = FramePacer::new(50);
        assert_eq!(pacer.interval, Duration::from_millis(20));

        pacer.index = 3;
        assert_eq!(pacer.remaining(Duration::from_millis(45)), Some(Duration::from_millis(15)));
        assert_eq!(pacer.remaining(Duration::from_millis(60)), None);
        assert_eq!(pacer.remaining(Duration::from_millis(70)), None);
    }
}
