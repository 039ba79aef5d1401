use anyhow::{anyhow, Result};
use crossbeam_channel::{Sender, TrySendError};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal,
};
use log::{debug, error, warn};
use std::io::{BufWriter, Write};
use std::thread::JoinHandle;
use std::time::Duration;

use super::cell::{CellData, RgbColor};
use super::processor::FrameProcessor;
use super::quantizer::ColorQuantizer;
use super::{Presenter, SurfaceEvent};
use crate::core::buffer::PixelBuffer;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum DisplayMode {
    /// 24-bit truecolor escapes
    Rgb,
    /// 256-color palette escapes
    Ansi256,
}

/// Squared RGB distance under which a changed cell is not redrawn.
const DIFF_THRESHOLD: i32 = 100;

/// Terminal surface: half-block cells, diff rendering, dedicated writer thread.
pub struct DisplayManager {
    tx: Option<Sender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
    mode: DisplayMode,
    cells: Vec<CellData>,
    last_cells: Option<Vec<CellData>>,
    render_buffer: Vec<u8>,
    last_generation: Option<u64>,
}

impl DisplayManager {
    pub fn new(mode: DisplayMode) -> Result<Self> {
        // Capacity 2: one frame being written, one waiting. Beyond that frames are dropped.
        let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(2);

        let writer = std::thread::spawn(move || {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::with_capacity(4 * 1024 * 1024, stdout);

            while let Ok(data) = rx.recv() {
                if let Err(e) = writer.write_all(&data) {
                    error!("I/O Error: {}", e);
                    break;
                }
                if let Err(e) = writer.flush() {
                    error!("Flush Error: {}", e);
                    break;
                }
            }
        });

        let mut dm = Self {
            tx: Some(tx),
            writer: Some(writer),
            mode,
            cells: Vec::new(),
            last_cells: None,
            last_generation: None,
            render_buffer: Vec::with_capacity(4 * 1024 * 1024),
        };

        dm.initialize_terminal()?;

        Ok(dm)
    }

    fn initialize_terminal(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(b"\x1b[?1049h"); // Alternate screen
        buffer.extend_from_slice(b"\x1b[?25l"); // Hide cursor
        buffer.extend_from_slice(b"\x1b[?7l"); // Disable line wrap
        buffer.extend_from_slice(b"\x1b[?12l"); // Disable cursor blink

        self.send_blocking(buffer)
    }

    fn send_blocking(&self, data: Vec<u8>) -> Result<()> {
        match &self.tx {
            Some(tx) => tx.send(data).map_err(|e| anyhow!("Channel error: {}", e)),
            None => Ok(()),
        }
    }

    /// Terminal size in pixels: one column per pixel, two pixel rows per line.
    pub fn surface_pixels() -> Result<(u32, u32)> {
        let (cols, rows) = terminal::size()?;
        Ok((cols.max(1) as u32, rows.max(1) as u32 * 2))
    }

    #[inline(always)]
    fn write_u8_fast(buffer: &mut Vec<u8>, mut n: u8) {
        if n >= 100 {
            buffer.push(b'0' + (n / 100));
            n %= 100;
            buffer.push(b'0' + (n / 10));
            n %= 10;
            buffer.push(b'0' + n);
        } else if n >= 10 {
            buffer.push(b'0' + (n / 10));
            n %= 10;
            buffer.push(b'0' + n);
        } else {
            buffer.push(b'0' + n);
        }
    }

    #[inline(always)]
    fn write_u16_fast(buffer: &mut Vec<u8>, n: u16) {
        let mut digits = [0u8; 5];
        let mut len = 0;
        let mut n = n;
        loop {
            digits[len] = b'0' + (n % 10) as u8;
            len += 1;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        buffer.extend(digits[..len].iter().rev());
    }

    /// A buffer already on screen needs no work unless the screen was invalidated.
    fn is_on_screen(last_generation: Option<u64>, screen_valid: bool, generation: u64) -> bool {
        screen_valid && last_generation == Some(generation)
    }

    #[inline(always)]
    fn color_distance_sq(c1: RgbColor, c2: RgbColor) -> i32 {
        let r = c1.0 as i32 - c2.0 as i32;
        let g = c1.1 as i32 - c2.1 as i32;
        let b = c1.2 as i32 - c2.2 as i32;
        r * r + g * g + b * b
    }

    fn write_color(buffer: &mut Vec<u8>, mode: DisplayMode, background: bool, color: RgbColor) {
        match mode {
            DisplayMode::Rgb => {
                buffer.extend_from_slice(if background { b"\x1b[48;2;" } else { b"\x1b[38;2;" });
                Self::write_u8_fast(buffer, color.0);
                buffer.push(b';');
                Self::write_u8_fast(buffer, color.1);
                buffer.push(b';');
                Self::write_u8_fast(buffer, color.2);
            }
            DisplayMode::Ansi256 => {
                buffer.extend_from_slice(if background { b"\x1b[48;5;" } else { b"\x1b[38;5;" });
                Self::write_u8_fast(buffer, ColorQuantizer::quantize(color));
            }
        }
        buffer.push(b'm');
    }

    /// Encode the escape sequence stream that moves the terminal from
    /// `last_cells` to `cells`, updating `last_cells` as it goes.
    fn encode_diff(
        buffer: &mut Vec<u8>,
        mode: DisplayMode,
        cells: &[CellData],
        last_cells: &mut [CellData],
        width: usize,
        term: (u16, u16),
        force_redraw: bool,
    ) {
        let (term_cols, term_rows) = term;
        let content_width = width as u16;
        let content_height = (cells.len() / width.max(1)) as u16;

        let offset_x = term_cols.saturating_sub(content_width) / 2;
        let offset_y = term_rows.saturating_sub(content_height) / 2;

        let mut last_fg: Option<RgbColor> = None;
        let mut last_bg: Option<RgbColor> = None;
        let mut cursor_x: i32 = -1;
        let mut cursor_y: i32 = -1;

        for (i, cell) in cells.iter().enumerate() {
            let old_cell = &last_cells[i];

            let is_different = force_redraw
                || cell.char != old_cell.char
                || Self::color_distance_sq(cell.fg, old_cell.fg) > DIFF_THRESHOLD
                || Self::color_distance_sq(cell.bg, old_cell.bg) > DIFF_THRESHOLD;

            if !is_different {
                cursor_x = -1;
                continue;
            }

            let target_x = (i % width) as u16 + offset_x;
            let target_y = (i / width) as u16 + offset_y;

            if target_x >= term_cols || target_y >= term_rows {
                cursor_x = -1;
                continue;
            }

            if cursor_x != target_x as i32 || cursor_y != target_y as i32 {
                buffer.extend_from_slice(b"\x1b[");
                Self::write_u16_fast(buffer, target_y + 1);
                buffer.push(b';');
                Self::write_u16_fast(buffer, target_x + 1);
                buffer.push(b'H');

                cursor_x = target_x as i32;
                cursor_y = target_y as i32;
            }

            if Some(cell.fg) != last_fg {
                Self::write_color(buffer, mode, false, cell.fg);
                last_fg = Some(cell.fg);
            }
            if Some(cell.bg) != last_bg {
                Self::write_color(buffer, mode, true, cell.bg);
                last_bg = Some(cell.bg);
            }

            let mut b_dst = [0u8; 4];
            buffer.extend_from_slice(cell.char.encode_utf8(&mut b_dst).as_bytes());

            last_cells[i] = *cell;
            cursor_x += 1;
        }

        buffer.extend_from_slice(b"\x1b[0m");
    }

    pub fn render_diff(&mut self, buffer: &PixelBuffer) -> Result<()> {
        let start_render = std::time::Instant::now();
        let width = buffer.width() as usize;
        if width == 0 || Self::is_on_screen(self.last_generation, self.last_cells.is_some(), buffer.generation()) {
            return Ok(());
        }

        let count = FrameProcessor::cell_count(buffer);
        if self.cells.len() != count {
            self.cells = vec![CellData::default(); count];
        }
        FrameProcessor::process_frame_into(buffer, &mut self.cells);

        self.render_buffer.clear();
        // Synchronized update begin
        self.render_buffer.extend_from_slice(b"\x1b[?2026h");

        let mut force_redraw = false;
        if self.last_cells.as_ref().map(|v| v.len()).unwrap_or(0) != count {
            self.render_buffer.extend_from_slice(b"\x1b[2J");
            self.last_cells = Some(vec![CellData::default(); count]);
            force_redraw = true;
        }

        let term = terminal::size().unwrap_or((80, 24));
        if let Some(last_cells) = self.last_cells.as_mut() {
            Self::encode_diff(&mut self.render_buffer, self.mode, &self.cells, last_cells, width, term, force_redraw);
        }

        // Synchronized update end
        self.render_buffer.extend_from_slice(b"\x1b[?2026l");

        if let Some(tx) = &self.tx {
            match tx.try_send(self.render_buffer.clone()) {
                Ok(_) => {}
                Err(TrySendError::Full(_)) => {
                    debug!("terminal busy, frame dropped");
                    // The terminal never saw this diff; redraw everything next time.
                    self.last_cells = None;
                }
                Err(e) => return Err(anyhow!("Channel error: {}", e)),
            }
        }

        self.last_generation = Some(buffer.generation());

        let render_time = start_render.elapsed();
        if render_time.as_millis() > 10 {
            warn!("SLOW RENDER: {}us | Cells: {}", render_time.as_micros(), count);
        }

        Ok(())
    }
}

impl Presenter for DisplayManager {
    fn present(&mut self, buffer: &PixelBuffer) -> Result<()> {
        self.render_diff(buffer)
    }

    fn poll_event(&mut self) -> Result<Option<SurfaceEvent>> {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(Some(SurfaceEvent::Quit)),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(Some(SurfaceEvent::Quit))
                    }
                    _ => {}
                },
                Event::Resize(cols, rows) => {
                    self.last_cells = None;
                    return Ok(Some(SurfaceEvent::Resize(cols.max(1) as u32, rows.max(1) as u32 * 2)));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(b"\x1b[0m");
        buffer.extend_from_slice(b"\x1b[?7h"); // Re-enable line wrap
        buffer.extend_from_slice(b"\x1b[?25h"); // Show cursor
        buffer.extend_from_slice(b"\x1b[?1049l"); // Leave alternate screen
        let _ = self.send_blocking(buffer);

        // Closing the channel stops the writer once it has flushed everything.
        self.tx = None;
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        let _ = terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(fg: RgbColor, bg: RgbColor) -> CellData {
        CellData { char: '▀', fg, bg }
    }

    #[test]
    fn test_write_numbers() {
        let mut buf = Vec::new();
        DisplayManager::write_u8_fast(&mut buf, 0);
        buf.push(b',');
        DisplayManager::write_u8_fast(&mut buf, 255);
        buf.push(b',');
        DisplayManager::write_u16_fast(&mut buf, 10203);
        assert_eq!(buf, b"0,255,10203");
    }

    #[test]
    fn test_unchanged_generation_is_skipped() {
        assert!(DisplayManager::is_on_screen(Some(4), true, 4));
        assert!(!DisplayManager::is_on_screen(Some(4), true, 5));
        // invalidated by a resize or a dropped frame
        assert!(!DisplayManager::is_on_screen(Some(4), false, 4));
        assert!(!DisplayManager::is_on_screen(None, true, 0));
    }

    #[test]
    fn test_forced_redraw_emits_every_cell() {
        let cells = vec![cell(RgbColor(255, 0, 0), RgbColor(0, 0, 0)); 4];
        let mut last = vec![CellData::default(); 4];
        let mut out = Vec::new();
        DisplayManager::encode_diff(&mut out, DisplayMode::Rgb, &cells, &mut last, 2, (2, 2), true);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('▀').count(), 4);
        assert!(text.starts_with("\x1b[1;1H\x1b[38;2;255;0;0m\x1b[48;2;0;0;0m"));
        assert_eq!(last, cells);
    }

    #[test]
    fn test_small_color_change_is_skipped() {
        let cells = vec![cell(RgbColor(101, 100, 100), RgbColor(0, 0, 0))];
        let mut last = vec![cell(RgbColor(100, 100, 100), RgbColor(0, 0, 0))];
        let mut out = Vec::new();
        DisplayManager::encode_diff(&mut out, DisplayMode::Rgb, &cells, &mut last, 1, (1, 1), false);
        assert_eq!(out, b"\x1b[0m");
    }

    #[test]
    fn test_ansi256_mode_uses_palette_escape() {
        let cells = vec![cell(RgbColor(255, 0, 0), RgbColor(255, 255, 255))];
        let mut last = vec![CellData::default()];
        let mut out = Vec::new();
        DisplayManager::encode_diff(&mut out, DisplayMode::Ansi256, &cells, &mut last, 1, (1, 1), true);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\x1b[38;5;196m"));
        assert!(text.contains("\x1b[48;5;231m"));
    }

    #[test]
    fn test_content_is_centered() {
        let cells = vec![cell(RgbColor(1, 2, 3), RgbColor(4, 5, 6))];
        let mut last = vec![CellData::default()];
        let mut out = Vec::new();
        DisplayManager::encode_diff(&mut out, DisplayMode::Rgb, &cells, &mut last, 1, (11, 5), true);
        assert!(String::from_utf8(out).unwrap().starts_with("\x1b[3;6H"));
    }
}
