//! Runtime settings: CLI flags over environment over defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::geometry::Point;
use crate::input::DriverOptions;

pub const DEBUG_DIR_ENV: &str = "TSG_DEBUG_DIR";
pub const FORCE_DATA_DIR_ENV: &str = "TSG_FORCE_DATA_DIR";

/// Shortest wait after a click; the editor needs this long to redraw.
pub const MIN_SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub debug_dir: PathBuf,
    pub force_data_dir: PathBuf,
    pub settle: Duration,
    pub startup_delay: Duration,
    pub capture_timeout: Duration,
    pub neutral: Option<Point>,
    pub save_screenshots: bool,
    pub annotate_clicks: bool,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_dir: PathBuf::from("debug"),
            force_data_dir: PathBuf::from("force_data"),
            settle: Duration::from_millis(500),
            startup_delay: Duration::from_secs(3),
            capture_timeout: Duration::from_secs(10),
            neutral: Some((0, 0)),
            save_screenshots: true,
            annotate_clicks: false,
            seed: None,
        }
    }
}

/// Values given on the command line; `None` / `false` leave the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub debug_dir: Option<PathBuf>,
    pub force_data_dir: Option<PathBuf>,
    pub settle_ms: Option<u64>,
    pub startup_delay_ms: Option<u64>,
    pub no_screenshots: bool,
    pub annotate_clicks: bool,
    pub seed: Option<u64>,
}

impl Settings {
    pub fn resolve(overrides: Overrides) -> Self {
        Self::resolve_with(overrides, |key| env::var(key).ok())
    }

    fn resolve_with(overrides: Overrides, env_var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let from_env = |key: &str| env_var(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        Self {
            debug_dir: overrides
                .debug_dir
                .or_else(|| from_env(DEBUG_DIR_ENV))
                .unwrap_or(defaults.debug_dir),
            force_data_dir: overrides
                .force_data_dir
                .or_else(|| from_env(FORCE_DATA_DIR_ENV))
                .unwrap_or(defaults.force_data_dir),
            settle: overrides
                .settle_ms
                .map(settle_from_ms)
                .unwrap_or(defaults.settle),
            startup_delay: overrides
                .startup_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.startup_delay),
            capture_timeout: defaults.capture_timeout,
            neutral: defaults.neutral,
            save_screenshots: !overrides.no_screenshots,
            annotate_clicks: overrides.annotate_clicks,
            seed: overrides.seed,
        }
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.debug_dir.join("screenshots")
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            settle: self.settle,
            neutral: self.neutral,
            screenshot_dir: self.save_screenshots.then(|| self.screenshot_dir()),
        }
    }
}

fn settle_from_ms(ms: u64) -> Duration {
    let settle = Duration::from_millis(ms);
    if settle < MIN_SETTLE {
        warn!(
            "settle delay {ms}ms is too short; using {}ms",
            MIN_SETTLE.as_millis()
        );
        return MIN_SETTLE;
    }
    settle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env_or_flags() {
        let settings = Settings::resolve_with(Overrides::default(), |_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.driver_options().screenshot_dir,
            Some(PathBuf::from("debug/screenshots"))
        );
    }

    #[test]
    fn flags_beat_env_beat_defaults() {
        let env = |key: &str| match key {
            DEBUG_DIR_ENV => Some("/tmp/env-debug".to_string()),
            FORCE_DATA_DIR_ENV => Some("/tmp/env-force".to_string()),
            _ => None,
        };
        let settings = Settings::resolve_with(
            Overrides {
                debug_dir: Some(PathBuf::from("/tmp/flag-debug")),
                settle_ms: Some(0),
                no_screenshots: true,
                ..Overrides::default()
            },
            env,
        );
        assert_eq!(settings.debug_dir, PathBuf::from("/tmp/flag-debug"));
        assert_eq!(settings.force_data_dir, PathBuf::from("/tmp/env-force"));
        assert_eq!(settings.settle, MIN_SETTLE);
        assert_eq!(settings.startup_delay, Duration::from_secs(3));
        assert_eq!(settings.driver_options().screenshot_dir, None);
    }

    #[test]
    fn settle_delay_has_a_floor() {
        let settle = |ms| {
            Settings::resolve_with(
                Overrides {
                    settle_ms: Some(ms),
                    ..Overrides::default()
                },
                |_| None,
            )
            .settle
        };
        assert_eq!(settle(0), MIN_SETTLE);
        assert_eq!(settle(99), MIN_SETTLE);
        assert_eq!(settle(750), Duration::from_millis(750));
        assert!(!Settings::default().driver_options().settle.is_zero());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let settings = Settings::resolve_with(Overrides::default(), |_| Some("  ".to_string()));
        assert_eq!(settings.debug_dir, PathBuf::from("debug"));
    }
}
