// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end capture sessions against the test-pattern camera

use photobooth::app::{BoothController, BoothEvent, Command, Phase, StartRequest};
use photobooth::backends::camera::synthetic::SyntheticOptions;
use photobooth::backends::camera::types::{BackendError, Resolution};
use photobooth::backends::camera::SyntheticSource;
use photobooth::config::Config;
use photobooth::constants::{PHOTO_COUNT, STRIP_FILENAME, status};
use photobooth::errors::{SessionError, TransitionError};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

const NATIVE: Resolution = Resolution::new(64, 48);

struct Booth {
    controller: BoothController<SyntheticSource>,
    source: SyntheticSource,
    events: mpsc::UnboundedReceiver<BoothEvent>,
    output: TempDir,
}

fn booth(options: SyntheticOptions) -> Booth {
    booth_with(options, |_| {})
}

fn booth_with(options: SyntheticOptions, configure: impl FnOnce(&mut Config)) -> Booth {
    let output = tempfile::tempdir().unwrap();
    let mut config = Config {
        output_dir: Some(output.path().to_path_buf()),
        ..Default::default()
    };
    configure(&mut config);
    let source = SyntheticSource::new(SyntheticOptions {
        native: Some(NATIVE),
        ..options
    });
    let (tx, events) = mpsc::unbounded_channel();
    Booth {
        controller: BoothController::new(source.clone(), config, tx),
        source,
        events,
        output,
    }
}

fn drain(events: &mut mpsc::UnboundedReceiver<BoothEvent>) -> Vec<BoothEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn statuses(events: &[BoothEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            BoothEvent::Status(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_session_captures_three_frames_in_order() {
    let mut booth = booth(SyntheticOptions::default());
    booth.controller.start(StartRequest::Initial).await.unwrap();

    let session = booth.controller.session();
    assert!(session.ready());
    assert_eq!(session.photos_taken(), PHOTO_COUNT);

    let indices: Vec<usize> = session.frames().iter().map(|f| f.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let sequences: Vec<u64> = session.frames().iter().map(|f| f.raw.sequence).collect();
    assert!(sequences.windows(2).all(|w| w[0] < w[1]), "{:?}", sequences);

    // canvas follows what the camera delivered, not the 1280x720 request
    assert!(session.frames().iter().all(|f| f.canvas == NATIVE));

    assert_eq!(booth.source.acquired(), 1);
    assert_eq!(booth.source.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_events_follow_the_countdown() {
    let mut booth = booth(SyntheticOptions::default());
    booth.controller.start(StartRequest::Initial).await.unwrap();
    let events = drain(&mut booth.events);

    let countdown: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            BoothEvent::Countdown(Some(v)) => Some(*v),
            _ => None,
        })
        .collect();
    assert_eq!(countdown, [3, 2, 1, 0].repeat(PHOTO_COUNT));

    let flashes = events
        .iter()
        .filter(|e| matches!(e, BoothEvent::Flash))
        .count();
    assert_eq!(flashes, PHOTO_COUNT);

    assert_eq!(
        statuses(&events),
        vec![
            status::GET_READY.to_string(),
            "Taking photo 1 of 3".to_string(),
            "Photo 1 taken! Get ready for the next one.".to_string(),
            "Taking photo 2 of 3".to_string(),
            "Photo 2 taken! Get ready for the next one.".to_string(),
            "Taking photo 3 of 3".to_string(),
            status::CREATING_STRIP.to_string(),
            status::READY.to_string(),
        ]
    );

    // the camera is released before the strip is shown
    let released = events
        .iter()
        .position(|e| matches!(e, BoothEvent::LiveFeed(None)))
        .unwrap();
    let preview = events
        .iter()
        .position(|e| matches!(e, BoothEvent::Preview(Some(_))))
        .unwrap();
    assert!(released < preview);

    assert!(matches!(
        events.last(),
        Some(BoothEvent::StartControl {
            enabled: true,
            label: status::RETAKE_LABEL
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_strip_dimensions_follow_layout() {
    let mut booth = booth(SyntheticOptions::default());
    booth.controller.start(StartRequest::Initial).await.unwrap();

    let strip = booth.controller.session().strip().unwrap();
    assert_eq!(strip.width, 300 + 2 * 20);
    assert_eq!(strip.height, 3 * 225 + 2 * 10 + 2 * 20 + 60);

    let decoded = strip.to_rgba().unwrap();
    assert_eq!(decoded.dimensions(), (strip.width, strip.height));
}

#[tokio::test(start_paused = true)]
async fn test_denied_camera_reports_error_and_reenables_start() {
    let mut booth = booth(SyntheticOptions {
        deny: Some(BackendError::PermissionDenied("/dev/video0".into())),
        ..Default::default()
    });

    let err = booth.controller.start(StartRequest::Initial).await.unwrap_err();
    assert!(matches!(err, SessionError::SourceAcquisition(_)));

    let session = booth.controller.session();
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.photos_taken(), 0);
    assert!(!session.ready());

    let events = drain(&mut booth.events);
    assert!(statuses(&events).contains(&status::CAMERA_ERROR.to_string()));
    assert!(matches!(
        events.last(),
        Some(BoothEvent::StartControl { enabled: true, .. })
    ));
    assert_eq!(booth.source.released(), 0);

    // a later start is accepted
    assert!(matches!(
        booth.controller.start(StartRequest::Initial).await,
        Err(SessionError::SourceAcquisition(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_retake_clears_previous_strip() {
    let mut booth = booth(SyntheticOptions::default());
    booth.controller.start(StartRequest::Initial).await.unwrap();
    let first_id = booth.controller.session().id();

    // a plain start does nothing while a strip is ready
    let err = booth.controller.start(StartRequest::Initial).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Transition(TransitionError::StripReady)
    ));
    assert!(booth.controller.session().ready());
    drain(&mut booth.events);

    booth.controller.start(StartRequest::Retake).await.unwrap();
    let events = drain(&mut booth.events);

    // preview and download are reset before the first capture of the retake
    let first_flash = events
        .iter()
        .position(|e| matches!(e, BoothEvent::Flash))
        .unwrap();
    let cleared = events
        .iter()
        .position(|e| matches!(e, BoothEvent::Preview(None)))
        .unwrap();
    let disabled = events
        .iter()
        .position(|e| matches!(e, BoothEvent::DownloadEnabled(false)))
        .unwrap();
    assert!(cleared < first_flash && disabled < first_flash);

    let session = booth.controller.session();
    assert_ne!(session.id(), first_id);
    assert_eq!(session.photos_taken(), PHOTO_COUNT);
    assert!(session.ready());
    assert_eq!(booth.source.released(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_download_writes_previewed_bytes() {
    let mut booth = booth(SyntheticOptions::default());
    let target = booth.output.path().join(STRIP_FILENAME);

    // nothing ready yet
    assert_eq!(booth.controller.download().await.unwrap(), None);
    assert!(!target.exists());

    booth.controller.start(StartRequest::Initial).await.unwrap();
    let previewed = drain(&mut booth.events)
        .into_iter()
        .find_map(|e| match e {
            BoothEvent::Preview(Some(strip)) => Some(strip),
            _ => None,
        })
        .unwrap();

    let path = booth.controller.download().await.unwrap().unwrap();
    assert_eq!(path, target);
    assert_eq!(std::fs::read(&path).unwrap(), previewed.png.to_vec());

    let events = drain(&mut booth.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, BoothEvent::Downloaded(p) if *p == target)));

    // downloading again overwrites with the same bytes and keeps the strip ready
    booth.controller.download().await.unwrap();
    assert!(booth.controller.session().ready());
}

#[tokio::test(start_paused = true)]
async fn test_encode_failure_returns_to_idle() {
    // a strip wider than u32 pixels cannot be laid out
    let mut booth = booth_with(SyntheticOptions::default(), |config| {
        config.strip.photo_width = u32::MAX;
    });

    let err = booth.controller.start(StartRequest::Initial).await.unwrap_err();
    assert!(matches!(err, SessionError::EncodeFailure(_)), "{:?}", err);

    let session = booth.controller.session();
    assert_eq!(session.phase(), Phase::Idle);
    assert!(!session.ready());
    assert!(session.strip().is_none());
    assert_eq!(session.photos_taken(), 0);
    assert_eq!(booth.source.acquired(), 1);
    assert_eq!(booth.source.released(), 1);

    let events = drain(&mut booth.events);
    assert_eq!(
        statuses(&events).last().map(String::as_str),
        Some(status::ENCODE_FAILED)
    );
    assert!(!events
        .iter()
        .any(|e| matches!(e, BoothEvent::Preview(Some(_)) | BoothEvent::DownloadEnabled(true))));
    assert!(matches!(
        events.last(),
        Some(BoothEvent::StartControl {
            enabled: true,
            label: status::START_LABEL
        })
    ));

    // nothing to download
    assert_eq!(booth.controller.download().await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_failed_download_keeps_strip_ready() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let blocked_dir = blocker.path().to_path_buf();
    let mut booth = booth_with(SyntheticOptions::default(), |config| {
        // a regular file where the output directory should be
        config.output_dir = Some(blocked_dir);
    });
    booth.controller.start(StartRequest::Initial).await.unwrap();
    drain(&mut booth.events);

    let err = booth.controller.download().await.unwrap_err();
    assert!(matches!(err, SessionError::Download(_)), "{:?}", err);

    let events = drain(&mut booth.events);
    assert_eq!(statuses(&events), vec![status::SAVE_FAILED.to_string()]);
    assert!(!events.iter().any(|e| matches!(e, BoothEvent::Downloaded(_))));

    let session = booth.controller.session();
    assert!(session.ready());
    assert_eq!(session.phase(), Phase::Ready);
    assert!(session.strip().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_device_loss_aborts_and_releases_once() {
    let mut booth = booth(SyntheticOptions {
        lose_after: Some(1),
        ..Default::default()
    });

    let err = booth.controller.start(StartRequest::Initial).await.unwrap_err();
    assert!(matches!(err, SessionError::DeviceLost(_)));

    let session = booth.controller.session();
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.photos_taken(), 0);
    assert!(!session.ready());

    assert!(statuses(&drain(&mut booth.events)).contains(&status::DEVICE_LOST.to_string()));
    assert_eq!(booth.source.released(), 1);
    assert!(!booth.output.path().join(STRIP_FILENAME).exists());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_session_releases_camera() {
    let Booth {
        controller,
        source,
        mut events,
        output: _output,
    } = booth(SyntheticOptions::default());
    let (commands, rx) = mpsc::channel(8);
    let running = tokio::spawn(controller.run(rx));

    commands.send(Command::Start).await.unwrap();
    // warm-up plus part of the first countdown
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(source.acquired(), 1);
    assert_eq!(source.released(), 0);

    commands.send(Command::Cancel).await.unwrap();
    commands.send(Command::Quit).await.unwrap();
    let session = running.await.unwrap();

    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.photos_taken(), 0);
    assert_eq!(source.released(), 1);

    let events = drain(&mut events);
    assert!(statuses(&events).contains(&status::CANCELLED.to_string()));
    assert!(events.iter().any(|e| matches!(e, BoothEvent::LiveFeed(None))));
}

#[tokio::test(start_paused = true)]
async fn test_commands_drive_a_full_session() {
    let Booth {
        controller,
        source,
        mut events,
        output,
    } = booth(SyntheticOptions::default());
    let (commands, rx) = mpsc::channel(8);
    let running = tokio::spawn(controller.run(rx));

    commands.send(Command::Start).await.unwrap();
    // download before anything is ready is ignored
    commands.send(Command::Download).await.unwrap();

    loop {
        match events.recv().await.unwrap() {
            BoothEvent::DownloadEnabled(true) => break,
            BoothEvent::Downloaded(_) => panic!("downloaded before ready"),
            _ => {}
        }
    }

    commands.send(Command::Download).await.unwrap();
    loop {
        if let BoothEvent::Downloaded(path) = events.recv().await.unwrap() {
            assert_eq!(path, output.path().join(STRIP_FILENAME));
            break;
        }
    }

    // cancelling a ready session throws the strip away
    commands.send(Command::Cancel).await.unwrap();
    commands.send(Command::Quit).await.unwrap();
    let session = running.await.unwrap();
    assert!(!session.ready());
    assert!(session.strip().is_none());
    assert_eq!(source.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_quit_during_session_releases_camera() {
    let Booth {
        controller, source, ..
    } = booth(SyntheticOptions::default());
    let (commands, rx) = mpsc::channel(8);
    let running = tokio::spawn(controller.run(rx));

    commands.send(Command::Start).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4200)).await;
    drop(commands);

    let session = running.await.unwrap();
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(source.acquired(), 1);
    assert_eq!(source.released(), 1);
}
