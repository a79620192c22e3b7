// SPDX-License-Identifier: GPL-3.0-only

//! Terminal photo booth
//!
//! Renders the live feed, countdown, flash and finished strip to the terminal
//! using Unicode half-block characters for improved vertical resolution.

use crate::app::{BoothController, BoothEvent, Command};
use crate::backends::camera::format_converters::{frame_to_rgba, yuv_to_rgb};
use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::backends::camera::{CameraSource, FrameWatch};
use crate::config::Config;
use crate::constants::{status, timing};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbaImage;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Run the terminal booth until the user quits
pub fn run<S: CameraSource + 'static>(source: S, config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = runtime.block_on(run_app(&mut terminal, source, config));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Everything the surface currently shows
struct BoothView {
    status: String,
    start_enabled: bool,
    start_label: &'static str,
    download_enabled: bool,
    countdown: Option<u32>,
    flash_started: Option<Instant>,
    live: Option<FrameWatch>,
    preview: Option<RgbaImage>,
    picture: FrameWidget,
}

impl BoothView {
    fn new(mirror: bool) -> Self {
        Self {
            status: status::IDLE.to_string(),
            start_enabled: true,
            start_label: status::START_LABEL,
            download_enabled: false,
            countdown: None,
            flash_started: None,
            live: None,
            preview: None,
            picture: FrameWidget::new(mirror),
        }
    }

    fn apply(&mut self, event: BoothEvent) {
        match event {
            BoothEvent::Status(text) => self.status = text,
            BoothEvent::StartControl { enabled, label } => {
                self.start_enabled = enabled;
                self.start_label = label;
            }
            BoothEvent::DownloadEnabled(enabled) => self.download_enabled = enabled,
            BoothEvent::Countdown(value) => self.countdown = value,
            BoothEvent::Flash => self.flash_started = Some(Instant::now()),
            BoothEvent::Preview(strip) => {
                self.preview = strip.and_then(|strip| match strip.to_rgba() {
                    Ok(rgba) => Some(rgba),
                    Err(e) => {
                        error!(error = %e, "Cannot show strip preview");
                        None
                    }
                });
            }
            BoothEvent::LiveFeed(feed) => {
                self.live = feed;
                self.picture.clear();
            }
            BoothEvent::Downloaded(path) => info!(path = %path.display(), "Strip downloaded"),
        }
    }

    fn refresh_live(&mut self) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if !live.has_changed().unwrap_or(false) {
            return;
        }
        let frame = live.borrow_and_update().clone();
        if let Some(frame) = frame {
            self.picture.update_frame(frame);
        }
    }

    fn flash_level(&self) -> f32 {
        self.flash_started
            .map_or(0.0, |started| flash_level(started.elapsed()))
    }

    fn key_hints(&self) -> String {
        let mut hints = Vec::new();
        if self.start_enabled {
            hints.push(format!("'s' {}", self.start_label.to_lowercase()));
        }
        if self.download_enabled {
            hints.push("'d' download".to_string());
        }
        hints.push("'c' cancel".to_string());
        hints.push("'q' quit".to_string());
        hints.join(" | ")
    }
}

async fn run_app<S: CameraSource + 'static>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    source: S,
    config: Config,
) -> anyhow::Result<()> {
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let (commands, command_rx) = mpsc::channel(16);

    let mut view = BoothView::new(config.camera.mirror_preview);
    let controller = BoothController::new(source, config, event_tx);
    let controller = tokio::spawn(controller.run(command_rx));

    loop {
        while let Ok(event) = events.try_recv() {
            view.apply(event);
        }
        view.refresh_live();

        terminal.draw(|f| {
            let area = f.area();
            let picture_area = Rect {
                height: area.height.saturating_sub(1),
                ..area
            };
            let status_area = Rect {
                y: area.y + area.height.saturating_sub(1),
                height: 1,
                ..area
            };

            if let Some(strip) = &view.preview {
                f.render_widget(ImageWidget { image: strip }, picture_area);
            } else {
                f.render_widget(&view.picture, picture_area);
            }

            let level = view.flash_level();
            if level > 0.0 {
                f.render_widget(FlashWidget { level }, picture_area);
            }

            if let Some(value) = view.countdown {
                f.render_widget(CountdownWidget { value }, picture_area);
            }

            let message = format!("{}  [{}]", view.status, view.key_hints());
            f.render_widget(StatusBar { message: &message }, status_area);
        })?;

        if event::poll(Duration::ZERO)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let command = match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(Command::Quit)
                }
                KeyCode::Char('q') => Some(Command::Quit),
                KeyCode::Char('s') | KeyCode::Enter | KeyCode::Char(' ') if view.start_enabled => {
                    Some(if view.start_label == status::RETAKE_LABEL {
                        Command::Retake
                    } else {
                        Command::Start
                    })
                }
                KeyCode::Char('d') if view.download_enabled => Some(Command::Download),
                KeyCode::Char('c') | KeyCode::Esc => Some(Command::Cancel),
                _ => None,
            };

            if let Some(command) = command {
                let quit = command == Command::Quit;
                if commands.send(command).await.is_err() || quit {
                    break;
                }
            }
        }

        if controller.is_finished() {
            break;
        }
        tokio::time::sleep(FRAME_INTERVAL).await;
    }

    drop(commands);
    let session = controller.await?;
    info!(session = %session.id(), ready = session.ready(), "Terminal booth closed");
    Ok(())
}

/// What the picture area is showing
enum Picture {
    /// Packed raw frame, sampled directly
    Raw(Arc<CameraFrame>),
    /// Compressed frame decoded once on arrival
    Decoded(RgbaImage),
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget {
    picture: Option<Picture>,
    mirror: bool,
}

impl FrameWidget {
    fn new(mirror: bool) -> Self {
        Self {
            picture: None,
            mirror,
        }
    }

    fn clear(&mut self) {
        self.picture = None;
    }

    fn update_frame(&mut self, frame: Arc<CameraFrame>) {
        self.picture = if frame.format == PixelFormat::MJPEG {
            match frame_to_rgba(&frame) {
                Ok(rgba) => Some(Picture::Decoded(rgba)),
                Err(e) => {
                    error!(error = %e, "Dropping undecodable frame");
                    return;
                }
            }
        } else {
            Some(Picture::Raw(frame))
        };
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match &self.picture {
            None => placeholder(area, buf, "Press 's' to start the photo booth"),
            Some(Picture::Raw(frame)) => render_half_blocks(
                area,
                buf,
                frame.width,
                frame.height,
                self.mirror,
                |x, y| sample_pixel_rgb(frame, x, y),
            ),
            Some(Picture::Decoded(image)) => {
                render_half_blocks(area, buf, image.width(), image.height(), self.mirror, |x, y| {
                    let [r, g, b, _] = image.get_pixel(x, y).0;
                    (r, g, b)
                })
            }
        }
    }
}

/// Finished strip preview
struct ImageWidget<'a> {
    image: &'a RgbaImage,
}

impl Widget for ImageWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let image = self.image;
        render_half_blocks(area, buf, image.width(), image.height(), false, |x, y| {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            (r, g, b)
        });
    }
}

fn placeholder(area: Rect, buf: &mut Buffer, msg: &str) {
    let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
    let y = area.y + area.height / 2;
    if y < area.y + area.height && x < area.x + area.width {
        buf.set_string(x, y, msg, Style::default());
    }
}

/// Fit a `width`x`height` picture into `area`, two pixels per cell
fn render_half_blocks(
    area: Rect,
    buf: &mut Buffer,
    width: u32,
    height: u32,
    mirror: bool,
    sample: impl Fn(u32, u32) -> (u8, u8, u8),
) {
    if width == 0 || height == 0 || area.width == 0 || area.height == 0 {
        return;
    }

    let aspect = width as f64 / height as f64;
    let term_width = area.width as f64;
    let term_height = (area.height * 2) as f64;

    let (display_width, display_height) = if term_width / term_height > aspect {
        let h = term_height;
        ((h * aspect) as u16, (h / 2.0) as u16)
    } else {
        let w = term_width;
        (w as u16, (w / aspect / 2.0) as u16)
    };
    if display_width == 0 || display_height == 0 {
        return;
    }

    let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
    let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;
    let x_scale = width as f64 / display_width as f64;
    let y_scale = height as f64 / (display_height * 2) as f64;

    for ty in 0..display_height {
        for tx in 0..display_width {
            let src_x = ((tx as f64 * x_scale) as u32).min(width - 1);
            let src_x = if mirror { width - 1 - src_x } else { src_x };
            let top = ((ty as f64 * 2.0 * y_scale) as u32).min(height - 1);
            let bottom = (((ty as f64 * 2.0 + 1.0) * y_scale) as u32).min(height - 1);

            let (r, g, b) = sample(src_x, top);
            let (r2, g2, b2) = sample(src_x, bottom);

            if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                cell.set_char('▀');
                cell.set_fg(Color::Rgb(r, g, b));
                cell.set_bg(Color::Rgb(r2, g2, b2));
            }
        }
    }
}

fn sample_pixel_rgb(frame: &CameraFrame, x: u32, y: u32) -> (u8, u8, u8) {
    let x = x.min(frame.width.saturating_sub(1));
    let y = y.min(frame.height.saturating_sub(1));
    let data = &frame.data;
    let row = y as usize * frame.stride as usize;

    match frame.format {
        PixelFormat::RGBA | PixelFormat::RGB24 => {
            let bpp = if frame.format == PixelFormat::RGBA { 4 } else { 3 };
            let idx = row + x as usize * bpp;
            match data.get(idx..idx + 3) {
                Some(px) => (px[0], px[1], px[2]),
                None => (0, 0, 0),
            }
        }
        PixelFormat::Gray8 => {
            let v = data.get(row + x as usize).copied().unwrap_or(0);
            (v, v, v)
        }
        PixelFormat::YUYV | PixelFormat::UYVY => {
            // two pixels share one chroma pair
            let base = row + (x & !1) as usize * 2;
            let Some(px) = data.get(base..base + 4) else {
                return (0, 0, 0);
            };
            let (luma, u, v) = if frame.format == PixelFormat::YUYV {
                (if x & 1 == 0 { px[0] } else { px[2] }, px[1], px[3])
            } else {
                (if x & 1 == 0 { px[1] } else { px[3] }, px[0], px[2])
            };
            yuv_to_rgb(luma, u, v)
        }
        PixelFormat::MJPEG => (0, 0, 0),
    }
}

/// Flash brightness `elapsed` after a capture: full white, then a linear fade
fn flash_level(elapsed: Duration) -> f32 {
    if elapsed <= timing::FLASH_DURATION {
        return 1.0;
    }
    let fading = (elapsed - timing::FLASH_DURATION).as_secs_f32();
    (1.0 - fading / timing::FLASH_FADE.as_secs_f32()).max(0.0)
}

/// White wash over whatever the picture area shows
struct FlashWidget {
    level: f32,
}

impl FlashWidget {
    fn wash(&self, color: Color) -> Color {
        let lift = |c: u8| (c as f32 + (255.0 - c as f32) * self.level).round() as u8;
        match color {
            Color::Rgb(r, g, b) => Color::Rgb(lift(r), lift(g), lift(b)),
            _ => {
                let v = lift(0);
                Color::Rgb(v, v, v)
            }
        }
    }
}

impl Widget for FlashWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let level = self.level.clamp(0.0, 1.0);
        let flash = FlashWidget { level };
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    let (fg, bg) = (flash.wash(cell.fg), flash.wash(cell.bg));
                    cell.set_fg(fg);
                    cell.set_bg(bg);
                }
            }
        }
    }
}

/// Big countdown digit centred over the picture
struct CountdownWidget {
    value: u32,
}

impl Widget for CountdownWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let text = format!("  {}  ", self.value);
        let width = text.len() as u16;
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height / 2;
        if y >= area.y + area.height {
            return;
        }
        let style = Style::default()
            .fg(Color::White)
            .bg(Color::Rgb(0xff, 0x6b, 0x6b))
            .add_modifier(Modifier::BOLD);
        for dy in [-1i32, 1] {
            let row = y as i32 + dy;
            if row >= area.y as i32 && row < (area.y + area.height) as i32 {
                buf.set_string(x, row as u16, " ".repeat(width as usize), style);
            }
        }
        buf.set_string(x, y, text, style);
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        buf.set_style(area, style);

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(area.x, area.y, text, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_sampling_uses_shared_chroma() {
        let frame = CameraFrame {
            width: 2,
            height: 1,
            data: Arc::from(vec![200u8, 128, 50, 128]),
            format: PixelFormat::YUYV,
            stride: 4,
            sequence: 1,
            captured_at: Instant::now(),
        };
        assert_eq!(sample_pixel_rgb(&frame, 0, 0), (200, 200, 200));
        assert_eq!(sample_pixel_rgb(&frame, 1, 0), (50, 50, 50));
    }

    #[test]
    fn test_status_bar_truncates() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        StatusBar {
            message: "Get ready!",
        }
        .render(area, &mut buf);
        assert_eq!(buf.cell((4, 0)).map(|c| c.symbol()), Some("r"));
    }

    #[test]
    fn test_key_hints_follow_controls() {
        let mut view = BoothView::new(false);
        assert!(view.key_hints().starts_with("'s' start"));

        view.apply(BoothEvent::StartControl {
            enabled: true,
            label: status::RETAKE_LABEL,
        });
        view.apply(BoothEvent::DownloadEnabled(true));
        let hints = view.key_hints();
        assert!(hints.contains("take new photos"));
        assert!(hints.contains("'d' download"));
    }

    #[test]
    fn test_flash_holds_then_fades_out() {
        assert_eq!(flash_level(Duration::ZERO), 1.0);
        assert_eq!(flash_level(timing::FLASH_DURATION), 1.0);

        let halfway = flash_level(timing::FLASH_DURATION + timing::FLASH_FADE / 2);
        assert!((halfway - 0.5).abs() < 0.01, "{}", halfway);

        assert_eq!(flash_level(timing::FLASH_DURATION + timing::FLASH_FADE), 0.0);
        assert_eq!(flash_level(Duration::from_secs(5)), 0.0);
    }

    #[test]
    fn test_flash_washes_picture_towards_white() {
        let area = Rect::new(0, 0, 1, 1);
        let mut buf = Buffer::empty(area);
        render_half_blocks(area, &mut buf, 1, 2, false, |_, _| (0, 100, 200));

        FlashWidget { level: 0.5 }.render(area, &mut buf);
        let cell = buf.cell((0, 0)).unwrap();
        assert_eq!(cell.fg, Color::Rgb(128, 178, 228));

        FlashWidget { level: 1.0 }.render(area, &mut buf);
        assert_eq!(buf.cell((0, 0)).unwrap().bg, Color::Rgb(255, 255, 255));
    }

    #[test]
    fn test_mirrored_render_flips_columns() {
        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        let sample = |x: u32, _y: u32| if x == 0 { (255, 0, 0) } else { (0, 0, 255) };
        render_half_blocks(area, &mut buf, 2, 2, true, sample);
        assert_eq!(buf.cell((0, 0)).map(|c| c.fg), Some(Color::Rgb(0, 0, 255)));
    }
}
