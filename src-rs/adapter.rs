//! Glue between the roster generator and the navigator for one full run.

use std::thread;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::artifacts;
use crate::config::ScenarioConfig;
use crate::force_data::ForceData;
use crate::generator::RosterGenerator;
use crate::input::{InputBackend, InputDriver, X11Backend};
use crate::locator::{OcrEngine, TesseractCli, TextLocator};
use crate::navigator::{Navigator, PopulateSummary};
use crate::roster::Roster;
use crate::settings::Settings;
use crate::variant::GameVariant;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub game: GameVariant,
    pub armies: Vec<PopulateSummary>,
}

impl RunSummary {
    pub fn units_added(&self) -> usize {
        self.armies.iter().map(|a| a.units_added).sum()
    }

    pub fn clicks(&self) -> usize {
        self.armies.iter().map(|a| a.clicks).sum()
    }
}

/// Generate every configured roster and dump each one under the debug directory.
pub fn generate_rosters(config: &ScenarioConfig, settings: &Settings) -> Result<Vec<Roster>> {
    let game = config.variant()?;
    let rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let force_data = ForceData::new(&settings.force_data_dir, game);
    let mut generator = RosterGenerator::new(config.year, config.month, force_data, rng);
    let rosters = generator.generate_rosters(config)?;
    for roster in &rosters {
        let path = artifacts::dump_roster(roster, &settings.debug_dir)
            .with_context(|| format!("failed to dump {} roster", roster.army))?;
        info!("{} roster written to {}", roster.army, path.display());
    }
    Ok(rosters)
}

/// Populate rosters in order through one navigator so the active side carries
/// over between armies. Empty rosters are skipped without touching the screen.
pub fn populate_rosters<O: OcrEngine, B: InputBackend>(
    navigator: &mut Navigator<O, B>,
    rosters: &[Roster],
) -> Result<Vec<PopulateSummary>> {
    let mut summaries = Vec::new();
    for roster in rosters {
        if roster.is_empty() {
            info!("{} roster is empty; nothing to add", roster.army);
            continue;
        }
        let summary = navigator
            .populate_roster(roster)
            .with_context(|| format!("failed to populate {} roster", roster.army))?;
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Full run against the live desktop: generate, dump, wait for the operator to
/// focus the game window, then click every roster in.
pub fn generate_and_populate(config: &ScenarioConfig, settings: &Settings) -> Result<RunSummary> {
    let game = config.variant()?;
    let rosters = generate_rosters(config, settings)?;

    if !settings.startup_delay.is_zero() {
        info!(
            "starting in {} ms; focus the {game} scenario editor",
            settings.startup_delay.as_millis()
        );
        thread::sleep(settings.startup_delay);
    }

    let locator = TextLocator::new(TesseractCli::default());
    let driver = InputDriver::new(
        X11Backend::new(settings.capture_timeout),
        settings.driver_options(),
    );
    let mut navigator = Navigator::new(game.profile(), locator, driver);
    if settings.annotate_clicks {
        navigator = navigator.with_click_artifacts(settings.debug_dir.clone());
    }

    let armies = populate_rosters(&mut navigator, &rosters)?;
    info!(
        "left the {} with the {} side selected",
        navigator.screen(),
        navigator.active_army()
    );
    let summary = RunSummary { game, armies };
    info!(
        "run complete: {} units added with {} clicks",
        summary.units_added(),
        summary.clicks()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::geometry::BoundingBox;
    use crate::input::tests::{quiet_options, RecordingBackend};
    use crate::locator::RecognizedText;
    use crate::roster::{Army, Unit};
    use image::DynamicImage;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    struct EditorScreen;

    impl OcrEngine for EditorScreen {
        fn recognize(&mut self, _image: &DynamicImage) -> Result<Vec<RecognizedText>, OcrError> {
            Ok([
                ("Allied", 20, 20),
                ("Axis", 100, 20),
                ("Nation", 20, 60),
                ("Location", 200, 60),
                ("German", 20, 140),
                ("US", 120, 140),
                ("On Map", 200, 140),
                ("Infantry", 40, 420),
                ("CHOSEN", 400, 260),
                ("Rifle Platoon", 50, 300),
                ("UNITS", 600, 650),
                ("OK", 600, 700),
            ]
            .iter()
            .map(|(text, x, y)| RecognizedText::new(*text, BoundingBox::from_rect(*x, *y, 80, 20)))
            .collect())
        }
    }

    fn roster(army: Army, nation: &str) -> Roster {
        let mut roster = Roster::new(army);
        roster.push_units(nation, "On Map", None, "Infantry", [Unit::new("Rifle Platoon")]);
        roster
    }

    #[test]
    fn populates_in_order_and_skips_empty_rosters() {
        let mut ocr = EditorScreen;
        let mut backend = RecordingBackend::default();
        let summaries = {
            let mut navigator = Navigator::new(
                GameVariant::Cmbb.profile(),
                TextLocator::new(&mut ocr),
                InputDriver::new(&mut backend, quiet_options()),
            );
            let rosters = [
                roster(Army::Allied, "US"),
                Roster::new(Army::Axis),
                roster(Army::Axis, "German"),
            ];
            populate_rosters(&mut navigator, &rosters).unwrap()
        };
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].army, Army::Allied);
        // Allied needs the side toggle, Axis then has to toggle back.
        assert_eq!(summaries[0].clicks, 10);
        assert_eq!(summaries[1].clicks, 10);
        assert_eq!(backend.click_points().len(), 20);
    }

    #[test]
    fn generated_rosters_are_dumped() {
        let dir = tempdir().unwrap();
        let config = ScenarioConfig::from_yaml_str(
            "game: cmak\nyear: 1943\nmonth: 7\narmies:\n  Axis:\n    German:\n      On Map:\n        Infantry:\n          - unit_name: Rifle Platoon\n            count: 2\n",
        )
        .unwrap();
        let settings = Settings {
            debug_dir: dir.path().to_path_buf(),
            force_data_dir: PathBuf::from("/nonexistent"),
            seed: Some(1),
            ..Settings::default()
        };
        let rosters = generate_rosters(&config, &settings).unwrap();
        assert_eq!(rosters.len(), 1);
        assert_eq!(rosters[0].unit_count(), 2);

        let dumped = fs::read_to_string(dir.path().join("Axis_oob.json")).unwrap();
        assert!(dumped.contains("Rifle Platoon"));
    }

    #[test]
    fn unknown_game_fails_before_any_work() {
        let config = ScenarioConfig::from_yaml_str("game: cm2\nyear: 1943\nmonth: 7\n").unwrap();
        let err = generate_rosters(&config, &Settings::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Must be one of"));
    }
}
