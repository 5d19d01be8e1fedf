//! Input Driver: screen captures and pointer clicks against the live desktop.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::artifacts;
use crate::error::DriverError;
use crate::geometry::Point;

pub trait InputBackend {
    fn screenshot(&mut self) -> Result<DynamicImage, DriverError>;
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), DriverError>;
    fn click(&mut self) -> Result<(), DriverError>;
}

impl<B: InputBackend + ?Sized> InputBackend for &mut B {
    fn screenshot(&mut self) -> Result<DynamicImage, DriverError> {
        (**self).screenshot()
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), DriverError> {
        (**self).move_to(x, y)
    }

    fn click(&mut self) -> Result<(), DriverError> {
        (**self).click()
    }
}

/// X11 desktop: ImageMagick `import` for captures, `xdotool` for the pointer.
pub struct X11Backend {
    capture_timeout: Duration,
    scratch: PathBuf,
}

impl X11Backend {
    pub fn new(capture_timeout: Duration) -> Self {
        Self {
            capture_timeout,
            scratch: env::temp_dir().join(format!(
                "tac-scenario-capture-{}.png",
                std::process::id()
            )),
        }
    }
}

impl InputBackend for X11Backend {
    fn screenshot(&mut self) -> Result<DynamicImage, DriverError> {
        let program = "import";
        let mut child = Command::new(program)
            .arg("-window")
            .arg("root")
            .arg(&self.scratch)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DriverError::Spawn {
                program: program.to_string(),
                source,
            })?;

        match child.wait_timeout(self.capture_timeout) {
            Ok(Some(status)) if status.success() => {}
            Ok(Some(status)) => {
                let stderr = child
                    .wait_with_output()
                    .map(|o| String::from_utf8_lossy(&o.stderr).trim().to_string())
                    .unwrap_or_default();
                return Err(DriverError::Exit {
                    program: program.to_string(),
                    code: status.code().unwrap_or(1),
                    stderr,
                });
            }
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DriverError::Timeout {
                    program: program.to_string(),
                    timeout_ms: self.capture_timeout.as_millis() as u64,
                });
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DriverError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }

        let image = image::open(&self.scratch).map_err(|err| DriverError::Decode(err.to_string()));
        let _ = fs::remove_file(&self.scratch);
        image
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<(), DriverError> {
        run_xdotool(&["mousemove", "--sync", &x.to_string(), &y.to_string()])
    }

    fn click(&mut self) -> Result<(), DriverError> {
        run_xdotool(&["click", "1"])
    }
}

fn run_xdotool(args: &[&str]) -> Result<(), DriverError> {
    let program = "xdotool";
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| DriverError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(DriverError::Exit {
            program: program.to_string(),
            code: output.status.code().unwrap_or(1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// A capture plus where it was persisted, if anywhere.
pub struct Capture {
    pub image: DynamicImage,
    pub path: Option<PathBuf>,
}

pub struct DriverOptions {
    /// Wait after every click before anything else touches the screen.
    pub settle: Duration,
    /// Where to park the pointer after a click so it does not cover text.
    pub neutral: Option<Point>,
    /// Directory receiving one PNG per capture.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            neutral: Some((0, 0)),
            screenshot_dir: None,
        }
    }
}

pub struct InputDriver<B> {
    backend: B,
    options: DriverOptions,
    clicks: usize,
}

impl<B: InputBackend> InputDriver<B> {
    pub fn new(backend: B, options: DriverOptions) -> Self {
        Self {
            backend,
            options,
            clicks: 0,
        }
    }

    pub fn capture(&mut self) -> Result<Capture, DriverError> {
        let image = self.backend.screenshot()?;
        let path = match &self.options.screenshot_dir {
            Some(dir) => Some(persist_capture(&image, dir)?),
            None => None,
        };
        Ok(Capture { image, path })
    }

    pub fn move_and_click(&mut self, x: i32, y: i32) -> Result<(), DriverError> {
        debug!(x, y, "click");
        self.backend.move_to(x, y)?;
        self.backend.click()?;
        self.clicks += 1;
        if let Some((nx, ny)) = self.options.neutral {
            if let Err(err) = self.backend.move_to(nx, ny) {
                warn!("failed to park pointer at ({nx}, {ny}): {err}");
            }
        }
        if !self.options.settle.is_zero() {
            thread::sleep(self.options.settle);
        }
        Ok(())
    }

    pub fn clicks(&self) -> usize {
        self.clicks
    }
}

fn persist_capture(image: &DynamicImage, dir: &Path) -> Result<PathBuf, DriverError> {
    let path = dir.join(format!("{}.png", artifacts::timestamp_millis()));
    debug!("saving screenshot to {}", path.display());
    let persist_err = |message: String| DriverError::Persist {
        path: path.clone(),
        message,
    };
    artifacts::ensure_parent_dir(&path).map_err(|err| persist_err(format!("{err:#}")))?;
    image
        .save(&path)
        .map_err(|err| persist_err(err.to_string()))?;
    Ok(path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum PointerEvent {
        Move(i32, i32),
        Click,
    }

    /// Records pointer traffic and serves a blank screen.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub events: Vec<PointerEvent>,
        pub screenshots: usize,
    }

    impl RecordingBackend {
        /// Positions at which a click happened.
        pub fn click_points(&self) -> Vec<Point> {
            let mut at = (0, 0);
            let mut points = Vec::new();
            for event in &self.events {
                match *event {
                    PointerEvent::Move(x, y) => at = (x, y),
                    PointerEvent::Click => points.push(at),
                }
            }
            points
        }
    }

    impl InputBackend for RecordingBackend {
        fn screenshot(&mut self) -> Result<DynamicImage, DriverError> {
            self.screenshots += 1;
            Ok(DynamicImage::new_rgba8(64, 48))
        }

        fn move_to(&mut self, x: i32, y: i32) -> Result<(), DriverError> {
            self.events.push(PointerEvent::Move(x, y));
            Ok(())
        }

        fn click(&mut self) -> Result<(), DriverError> {
            self.events.push(PointerEvent::Click);
            Ok(())
        }
    }

    pub(crate) fn quiet_options() -> DriverOptions {
        DriverOptions {
            settle: Duration::ZERO,
            neutral: Some((0, 0)),
            screenshot_dir: None,
        }
    }

    #[test]
    fn click_moves_clicks_then_parks() {
        let mut backend = RecordingBackend::default();
        let mut driver = InputDriver::new(&mut backend, quiet_options());
        driver.move_and_click(120, 45).unwrap();
        assert_eq!(driver.clicks(), 1);
        drop(driver);
        assert_eq!(
            backend.events,
            vec![
                PointerEvent::Move(120, 45),
                PointerEvent::Click,
                PointerEvent::Move(0, 0)
            ]
        );
        assert_eq!(backend.click_points(), vec![(120, 45)]);
    }

    #[test]
    fn no_parking_without_neutral_position() {
        let options = DriverOptions {
            neutral: None,
            ..quiet_options()
        };
        let mut backend = RecordingBackend::default();
        InputDriver::new(&mut backend, options)
            .move_and_click(5, 6)
            .unwrap();
        assert_eq!(backend.events.len(), 2);
    }

    #[test]
    fn captures_are_persisted_when_configured() {
        let dir = tempdir().unwrap();
        let options = DriverOptions {
            screenshot_dir: Some(dir.path().join("screenshots")),
            ..quiet_options()
        };
        let mut driver = InputDriver::new(RecordingBackend::default(), options);
        let capture = driver.capture().unwrap();
        let path = capture.path.expect("screenshot path");
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(capture.image.width(), 64);
    }
}
