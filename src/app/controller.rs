// SPDX-License-Identifier: GPL-3.0-only

//! Capture session controller
//!
//! Owns the camera source and the current [`Session`]. Surfaces talk to it
//! through [`Command`]s and listen for [`BoothEvent`]s; the controller itself
//! never draws anything.
//!
//! A capture run is one linear async procedure: acquire, warm up, three
//! countdown/capture cycles, release, compose. Cancelling simply drops that
//! future, which drops the live feed and so releases the camera.

use super::state::{Phase, Session, StartRequest};
use crate::backends::camera::{CameraSource, FrameWatch, LiveFeed, SourceConstraints};
use crate::backends::camera::types::Resolution;
use crate::config::Config;
use crate::constants::{status, timing};
use crate::errors::{SessionError, SessionResult, TransitionError};
use crate::flash::FlashHardware;
use crate::pipelines::photo::{ComposedStrip, PhotoCapture, StripComposer, StripEncoder};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Requests from a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    /// Start over, discarding a ready strip
    Retake,
    Download,
    Cancel,
    Quit,
}

/// What a surface should show
#[derive(Debug, Clone)]
pub enum BoothEvent {
    Status(String),
    StartControl { enabled: bool, label: &'static str },
    DownloadEnabled(bool),
    /// Countdown overlay value; `None` hides it
    Countdown(Option<u32>),
    /// Capture flash (purely visual)
    Flash,
    /// Finished strip; `None` clears the preview
    Preview(Option<ComposedStrip>),
    /// Live camera frames; `None` once the camera is released
    LiveFeed(Option<FrameWatch>),
    Downloaded(PathBuf),
}

enum Interrupt {
    Finished,
    Cancel,
    Quit,
}

/// Drives capture sessions against a camera source
pub struct BoothController<S: CameraSource> {
    source: S,
    config: Config,
    composer: StripComposer,
    flash: FlashHardware,
    events: mpsc::UnboundedSender<BoothEvent>,
    session: Session,
}

impl<S: CameraSource> BoothController<S> {
    pub fn new(source: S, config: Config, events: mpsc::UnboundedSender<BoothEvent>) -> Self {
        let composer = StripComposer::new(config.strip.clone());
        let flash = if config.hardware_flash {
            let hw = FlashHardware::detect();
            if let Some(hint) = &hw.permission_error {
                warn!("{}", hint);
            }
            hw
        } else {
            FlashHardware::default()
        };

        Self {
            source,
            session: Session::new(config.timing.countdown_from),
            config,
            composer,
            flash,
            events,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, event: BoothEvent) {
        // A surface that went away just stops listening
        let _ = self.events.send(event);
    }

    fn status(&self, text: impl Into<String>) {
        self.emit(BoothEvent::Status(text.into()));
    }

    fn start_control(&self, enabled: bool) {
        let label = if self.session.ready() {
            status::RETAKE_LABEL
        } else {
            status::START_LABEL
        };
        self.emit(BoothEvent::StartControl { enabled, label });
    }

    /// Initial surface state
    pub fn announce_idle(&self) {
        self.status(status::IDLE);
        self.start_control(true);
        self.emit(BoothEvent::DownloadEnabled(false));
    }

    /// Serve commands until `Quit` or the channel closes
    ///
    /// Returns the final session.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Session {
        self.announce_idle();

        while let Some(command) = commands.recv().await {
            match command {
                Command::Start | Command::Retake => {
                    let request = if command == Command::Retake {
                        StartRequest::Retake
                    } else {
                        StartRequest::Initial
                    };

                    let interrupt = {
                        let sequence = self.start(request);
                        tokio::pin!(sequence);
                        loop {
                            tokio::select! {
                                result = &mut sequence => {
                                    if let Err(e) = result {
                                        debug!(error = %e, "Session ended early");
                                    }
                                    break Interrupt::Finished;
                                }
                                next = commands.recv() => match next {
                                    Some(Command::Cancel) => break Interrupt::Cancel,
                                    Some(Command::Quit) | None => break Interrupt::Quit,
                                    Some(other) => {
                                        debug!(command = ?other, "Ignoring command while a session runs");
                                    }
                                },
                            }
                        }
                    };

                    match interrupt {
                        Interrupt::Finished => {}
                        Interrupt::Cancel => self.cancel(),
                        Interrupt::Quit => {
                            self.session = self.session.cancel();
                            break;
                        }
                    }
                }
                Command::Download => {
                    if let Err(e) = self.download().await {
                        warn!(error = %e, "Download failed");
                    }
                }
                Command::Cancel => self.cancel(),
                Command::Quit => break,
            }
        }

        info!(session = %self.session.id(), "Controller stopped");
        self.session
    }

    /// Run one complete capture session
    ///
    /// A start while a session runs, or a plain start while a strip is ready,
    /// is ignored and reported as a [`TransitionError`]. Failures are shown
    /// on the surface before being returned.
    pub async fn start(&mut self, request: StartRequest) -> SessionResult<()> {
        let next = match self.session.begin(request) {
            Ok(next) => next,
            Err(e) => {
                debug!(error = %e, "Start ignored");
                return Err(e.into());
            }
        };
        self.session = next;
        info!(session = %self.session.id(), ?request, "Session started");

        self.emit(BoothEvent::Preview(None));
        self.emit(BoothEvent::DownloadEnabled(false));
        self.start_control(false);

        let result = self.capture_sequence().await;
        if let Err(e) = &result {
            self.fail(e);
        }
        result
    }

    async fn capture_sequence(&mut self) -> SessionResult<()> {
        let timing = self.config.timing.clone();
        let constraints = SourceConstraints {
            preferred: Resolution::new(
                self.config.camera.preferred_width,
                self.config.camera.preferred_height,
            ),
            device_path: self.config.camera.device_path.clone(),
        };

        let mut feed = match self.source.acquire(&constraints).await {
            Ok(feed) => feed,
            Err(e) => {
                self.session = self.session.acquire_failed()?;
                return Err(SessionError::SourceAcquisition(e));
            }
        };
        info!(
            session = %self.session.id(),
            source = %self.source.name(),
            resolution = %feed.resolution(),
            "Camera acquired"
        );
        self.session = self.session.acquired()?;
        self.emit(BoothEvent::LiveFeed(Some(feed.subscribe())));

        self.status(status::GET_READY);
        tokio::time::sleep(timing.warmup()).await;
        ensure_alive(&feed)?;

        for index in 0..self.session.target_count() {
            self.status(status::taking_photo(index));
            while let Phase::Counting { seconds_left, .. } = self.session.phase() {
                self.emit(BoothEvent::Countdown(Some(seconds_left)));
                tokio::time::sleep(timing.tick()).await;
                ensure_alive(&feed)?;
                self.session = self.session.tick()?;
            }
            self.emit(BoothEvent::Countdown(None));

            let frame = PhotoCapture::take(&mut feed, index, timing.frame_timeout())
                .await
                .map_err(|e| SessionError::DeviceLost(e.to_string()))?;
            self.fire_flash();
            self.session = self.session.captured(frame)?;
            self.status(status::photo_taken(self.session.photos_taken()));
            info!(
                session = %self.session.id(),
                taken = self.session.photos_taken(),
                "Photo taken"
            );

            if let Phase::Pausing { .. } = self.session.phase() {
                tokio::time::sleep(timing.pause()).await;
                ensure_alive(&feed)?;
                self.session = self.session.pause_elapsed()?;
            }
        }

        if self.session.phase() != Phase::Composing {
            return Err(TransitionError::Invalid {
                phase: self.session.phase().kind(),
                event: "compose",
            }
            .into());
        }

        feed.release();
        self.emit(BoothEvent::LiveFeed(None));

        let strip = self.composer.compose(self.session.frames()).await?;
        self.session = self.session.composed(strip.clone())?;
        info!(
            session = %self.session.id(),
            width = strip.width,
            height = strip.height,
            bytes = strip.png.len(),
            "Photo strip ready"
        );

        self.emit(BoothEvent::Preview(Some(strip)));
        self.status(status::READY);
        self.emit(BoothEvent::DownloadEnabled(true));
        self.start_control(true);
        Ok(())
    }

    fn fire_flash(&self) {
        self.emit(BoothEvent::Flash);
        let _ = self.flash.pulse(timing::FLASH_DURATION);
    }

    /// Put the surface back into a usable state after a failed run
    fn fail(&mut self, err: &SessionError) {
        let message = match err {
            SessionError::SourceAcquisition(e) => {
                error!(session = %self.session.id(), error = %e, "Camera acquisition failed");
                status::CAMERA_ERROR
            }
            SessionError::DeviceLost(reason) => {
                error!(session = %self.session.id(), reason = %reason, "Camera lost mid-session");
                status::DEVICE_LOST
            }
            SessionError::EncodeFailure(e) => {
                error!(session = %self.session.id(), error = %e, "Strip composition failed");
                status::ENCODE_FAILED
            }
            SessionError::Transition(e) => {
                error!(session = %self.session.id(), error = %e, "Session state error");
                status::IDLE
            }
            SessionError::Download(_) => status::SAVE_FAILED,
        };

        self.session = self.session.cancel();
        self.emit(BoothEvent::Countdown(None));
        self.emit(BoothEvent::LiveFeed(None));
        self.status(message);
        self.start_control(true);
    }

    /// Abandon whatever is happening and return to not-started
    pub fn cancel(&mut self) {
        info!(session = %self.session.id(), phase = %self.session.phase().kind(), "Session cancelled");
        self.session = self.session.cancel();
        self.emit(BoothEvent::Countdown(None));
        self.emit(BoothEvent::LiveFeed(None));
        self.emit(BoothEvent::Preview(None));
        self.emit(BoothEvent::DownloadEnabled(false));
        self.status(status::CANCELLED);
        self.start_control(true);
    }

    /// Save the ready strip under its fixed filename
    ///
    /// # Returns
    /// * `Ok(Some(path))` - Strip written
    /// * `Ok(None)` - Nothing ready, nothing written
    /// * `Err(SessionError::Download)` - Write failed; the strip stays ready
    pub async fn download(&mut self) -> SessionResult<Option<PathBuf>> {
        let Some(strip) = self.session.strip().filter(|_| self.session.ready()) else {
            debug!("Download requested with no strip ready");
            return Ok(None);
        };

        let output_dir = self.config.output_dir();
        match StripEncoder::save(strip, &output_dir).await {
            Ok(path) => {
                self.status(status::saved(&path));
                self.emit(BoothEvent::Downloaded(path.clone()));
                Ok(Some(path))
            }
            Err(e) => {
                error!(dir = %output_dir.display(), error = %e, "Could not save strip");
                self.status(status::SAVE_FAILED);
                Err(SessionError::Download(e))
            }
        }
    }
}

fn ensure_alive(feed: &LiveFeed) -> SessionResult<()> {
    if feed.is_alive() {
        Ok(())
    } else {
        Err(SessionError::DeviceLost(format!(
            "{} stopped delivering frames",
            feed.label()
        )))
    }
}
