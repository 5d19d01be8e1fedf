//! Navigation state machine for the unit editor.
//!
//! Every step is capture -> OCR -> resolve -> click -> settle, strictly in
//! sequence. Coordinates found on one capture are assumed to stay valid for
//! the rest of the session: the game window must not move or resize while a
//! run is in progress.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts;
use crate::error::NavError;
use crate::geometry::{BoundingBox, ResolvedLocation};
use crate::input::{Capture, InputBackend, InputDriver};
use crate::locator::{match_text, MatchMode, OcrEngine, RecognizedText, TextLocator};
use crate::resolver::{resolve, Anchor, AnchorCache, Constraint};
use crate::roster::{Army, Roster};
use crate::variant::{VariantProfile, ROW_ALIGNMENT_TOLERANCE};

/// How many ranked candidates positional filters get to choose from.
const CANDIDATE_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Screen {
    ScenarioEditor,
    UnitEditor,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Screen::ScenarioEditor => "Scenario Editor",
            Screen::UnitEditor => "Unit Editor",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopulateSummary {
    pub army: Army,
    pub units_added: usize,
    pub clicks: usize,
}

/// One capture and, once needed, its OCR result.
struct View {
    capture: Capture,
    texts: Option<Vec<RecognizedText>>,
}

impl View {
    fn texts<O: OcrEngine>(
        &mut self,
        locator: &mut TextLocator<O>,
    ) -> Result<&[RecognizedText], NavError> {
        if self.texts.is_none() {
            self.texts = Some(locator.scan(&self.capture.image)?);
        }
        Ok(self.texts.as_deref().unwrap_or_default())
    }
}

pub struct Navigator<O, B> {
    profile: &'static VariantProfile,
    locator: TextLocator<O>,
    driver: InputDriver<B>,
    screen: Screen,
    active_army: Army,
    anchors: AnchorCache,
    click_artifacts: Option<PathBuf>,
}

impl<O: OcrEngine, B: InputBackend> Navigator<O, B> {
    /// Starts on the scenario editor with the Axis side selected, which is
    /// where the game leaves a freshly opened scenario.
    pub fn new(profile: &'static VariantProfile, locator: TextLocator<O>, driver: InputDriver<B>) -> Self {
        Self {
            profile,
            locator,
            driver,
            screen: Screen::ScenarioEditor,
            active_army: Army::Axis,
            anchors: AnchorCache::default(),
            click_artifacts: None,
        }
    }

    /// Save an annotated copy of every capture that led to a click.
    pub fn with_click_artifacts(mut self, dir: PathBuf) -> Self {
        self.click_artifacts = Some(dir);
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn active_army(&self) -> Army {
        self.active_army
    }

    fn require(&self, required: Screen) -> Result<(), NavError> {
        if self.screen != required {
            return Err(NavError::ScreenState {
                required,
                actual: self.screen,
            });
        }
        Ok(())
    }

    pub fn enter_unit_editor(&mut self) -> Result<(), NavError> {
        self.require(Screen::ScenarioEditor)?;
        info!("entering unit editor");
        self.click_text(self.profile.unit_editor_button)?;
        self.screen = Screen::UnitEditor;
        Ok(())
    }

    pub fn exit_unit_editor(&mut self) -> Result<(), NavError> {
        self.require(Screen::UnitEditor)?;
        info!("returning to scenario editor");
        self.click_text(self.profile.confirm_button)?;
        self.screen = Screen::ScenarioEditor;
        Ok(())
    }

    /// Click every unit of `roster` into the editor. Not idempotent: units
    /// clicked before a failure stay added, and a rerun adds them again.
    pub fn populate_roster(&mut self, roster: &Roster) -> Result<PopulateSummary, NavError> {
        self.require(Screen::ScenarioEditor)?;
        self.anchors.clear();
        let clicks_before = self.driver.clicks();
        let army = roster.army;
        info!("populating {army} roster ({} units)", roster.unit_count());

        self.enter_unit_editor()
            .map_err(|e| e.at(format!("{army} / enter unit editor")))?;
        self.select_army(army)
            .map_err(|e| e.at(format!("army {army}")))?;

        let mut added = 0;
        for nation in &roster.nations {
            let step = format!("{army} / nation {}", nation.name);
            self.select_nation(&nation.name)
                .map_err(|e| e.at(step.clone()))?;

            for wave in &nation.waves {
                let step = format!("{step} / wave {}", wave.name);
                self.select_wave(&wave.name).map_err(|e| e.at(step.clone()))?;

                for division in &wave.divisions {
                    let step = match &division.name {
                        Some(name) => format!("{step} / division {name}"),
                        None => step.clone(),
                    };
                    if let Some(name) = &division.name {
                        self.select_division(name).map_err(|e| e.at(step.clone()))?;
                    }

                    for group in &division.unit_types {
                        let step = format!("{step} / {}", group.unit_type);
                        self.select_unit_type(&group.unit_type)
                            .map_err(|e| e.at(step.clone()))?;

                        for unit in &group.units {
                            self.add_unit(&unit.name)
                                .map_err(|e| e.at(format!("{step} / unit {}", unit.name)))?;
                            added += 1;
                        }
                    }
                }
            }
        }

        self.exit_unit_editor()
            .map_err(|e| e.at(format!("{army} / exit unit editor")))?;
        let summary = PopulateSummary {
            army,
            units_added: added,
            clicks: self.driver.clicks() - clicks_before,
        };
        info!(
            "{army} roster populated: {} units, {} clicks",
            summary.units_added, summary.clicks
        );
        Ok(summary)
    }

    /// The side selector toggles rather than selects: switching means
    /// clicking off the active side and then onto the requested one.
    pub fn select_army(&mut self, army: Army) -> Result<(), NavError> {
        self.require(Screen::UnitEditor)?;
        if army == self.active_army {
            debug!("{army} side already active");
            return Ok(());
        }
        info!("switching side {} -> {army}", self.active_army);
        self.click_text(self.active_army.label())?;
        self.click_text(army.label())?;
        self.active_army = army;
        Ok(())
    }

    fn select_nation(&mut self, nation: &str) -> Result<(), NavError> {
        info!("selecting nation {nation}");
        self.click_below(self.profile.nation_label)?;
        self.click_text(nation)
    }

    /// Wave names are unreliable under OCR, so waves are picked by row offset
    /// from the always-legible "On Map" entry.
    fn select_wave(&mut self, wave: &str) -> Result<(), NavError> {
        info!("selecting wave {wave}");
        self.click_below(self.profile.wave_label)?;
        let index = reinforcement_index(wave, self.profile.on_map_label)?;
        let mut view = self.look()?;
        let on_map = self.anchor_box(Anchor::OnMap, &mut view)?;
        let location = ResolvedLocation::at_center(on_map)
            .rows_below(index)
            .ok_or_else(|| NavError::InvalidWave {
                wave: wave.to_string(),
            })?;
        self.click(location, wave, &view)
    }

    fn select_division(&mut self, division: &str) -> Result<(), NavError> {
        let Some(label) = self.profile.division_label else {
            warn!(
                "{} has no division menu; ignoring division {division}",
                self.profile.variant
            );
            return Ok(());
        };
        info!("selecting division {division}");
        self.click_below(label)?;
        self.click_text(division)
    }

    fn select_unit_type(&mut self, unit_type: &str) -> Result<(), NavError> {
        let tab = self.profile.tab_label(unit_type);
        info!("selecting {tab} tab");
        if !self.profile.needs_fortification_alignment(tab) {
            return self.click_text(tab);
        }
        let mut view = self.look()?;
        let fortification = self.anchor_box(Anchor::Fortification, &mut view)?;
        let texts = view.texts(&mut self.locator)?;
        let candidates = match_text(tab, texts, MatchMode::Ranked(CANDIDATE_LIMIT));
        let location = resolve(
            tab,
            &candidates,
            Some(Constraint::aligned_with(&fortification, ROW_ALIGNMENT_TOLERANCE)),
        )?;
        self.click(location, tab, &view)
    }

    /// Units already added show up again in the chosen panel on the right;
    /// only the available list, left of the CHOSEN header, is clickable.
    fn add_unit(&mut self, unit: &str) -> Result<(), NavError> {
        debug!("adding unit {unit}");
        let mut view = self.look()?;
        let chosen = self.anchor_box(Anchor::Chosen, &mut view)?;
        let texts = view.texts(&mut self.locator)?;
        let candidates = match_text(unit, texts, MatchMode::Ranked(CANDIDATE_LIMIT));
        let location = resolve(unit, &candidates, Some(Constraint::left_of(&chosen)))?;
        self.click(location, unit, &view)
    }

    fn look(&mut self) -> Result<View, NavError> {
        let capture = self.driver.capture()?;
        if let Some(path) = &capture.path {
            debug!("capture saved to {}", path.display());
        }
        Ok(View {
            capture,
            texts: None,
        })
    }

    fn anchor_label(&self, anchor: Anchor) -> &'static str {
        match anchor {
            Anchor::Chosen => self.profile.chosen_label,
            Anchor::Fortification => self.profile.fortification_label,
            Anchor::OnMap => self.profile.on_map_label,
        }
    }

    fn anchor_box(&mut self, anchor: Anchor, view: &mut View) -> Result<BoundingBox, NavError> {
        let label = self.anchor_label(anchor);
        let locator = &mut self.locator;
        self.anchors.get_or_resolve(anchor, || {
            let texts = view.texts(locator)?;
            resolve(label, &match_text(label, texts, MatchMode::Best), None).map(|loc| loc.bbox)
        })
    }

    fn click_text(&mut self, target: &str) -> Result<(), NavError> {
        let mut view = self.look()?;
        let texts = view.texts(&mut self.locator)?;
        let location = resolve(target, &match_text(target, texts, MatchMode::Best), None)?;
        self.click(location, target, &view)
    }

    /// Click the entry one row under `label`, i.e. the dropdown it captions.
    fn click_below(&mut self, label: &str) -> Result<(), NavError> {
        let mut view = self.look()?;
        let texts = view.texts(&mut self.locator)?;
        let anchor = resolve(label, &match_text(label, texts, MatchMode::Best), None)?;
        let below = anchor
            .rows_below(1)
            .ok_or_else(|| NavError::not_found(label, "no row below it on screen"))?;
        self.click(below, label, &view)
    }

    fn click(&mut self, location: ResolvedLocation, label: &str, view: &View) -> Result<(), NavError> {
        if let Some(dir) = &self.click_artifacts {
            match artifacts::annotate_click(&view.capture.image, &location, label, dir) {
                Ok(path) => debug!("click artifact {}", path.display()),
                Err(err) => warn!("failed to write click artifact for {label}: {err:#}"),
            }
        }
        debug!(label, x = location.x, y = location.y, "clicking");
        self.driver.move_and_click(location.x, location.y)?;
        Ok(())
    }
}

/// 0 for the on-map wave, otherwise the trailing number of "Reinforce N".
pub fn reinforcement_index(wave: &str, on_map_label: &str) -> Result<i32, NavError> {
    if wave.trim().eq_ignore_ascii_case(on_map_label) {
        return Ok(0);
    }
    wave.split_whitespace()
        .last()
        .and_then(|token| token.parse::<i32>().ok())
        .filter(|index| *index > 0)
        .ok_or_else(|| NavError::InvalidWave {
            wave: wave.to_string(),
        })
}
