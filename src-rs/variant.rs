use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;

/// Supported game editions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameVariant {
    Cmbo,
    Cmbb,
    Cmak,
}

impl GameVariant {
    pub const ALL: [GameVariant; 3] = [GameVariant::Cmbo, GameVariant::Cmbb, GameVariant::Cmak];

    pub fn id(self) -> &'static str {
        match self {
            GameVariant::Cmbo => "cmbo",
            GameVariant::Cmbb => "cmbb",
            GameVariant::Cmak => "cmak",
        }
    }

    pub fn profile(self) -> &'static VariantProfile {
        match self {
            GameVariant::Cmbo => &CMBO,
            GameVariant::Cmbb => &CMBB,
            GameVariant::Cmak => &CMAK,
        }
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for GameVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        GameVariant::ALL
            .into_iter()
            .find(|variant| variant.id() == wanted)
            .ok_or_else(|| ConfigError::UnknownVariant {
                id: s.to_string(),
                supported: GameVariant::ALL
                    .iter()
                    .map(|v| v.id())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Label text and menu shape of one edition's unit editor. The navigator
/// consults this table instead of branching on the edition itself.
#[derive(Debug, Serialize)]
pub struct VariantProfile {
    pub variant: GameVariant,
    /// Button on the scenario editor that opens the unit editor.
    pub unit_editor_button: &'static str,
    /// Button that closes the unit editor.
    pub confirm_button: &'static str,
    /// Anchor above the nation dropdown ("FORCE" in the oldest edition).
    pub nation_label: &'static str,
    /// Anchor above the wave dropdown.
    pub wave_label: &'static str,
    /// Anchor above the division dropdown; `None` when the edition has no division step.
    pub division_label: Option<&'static str>,
    pub chosen_label: &'static str,
    pub on_map_label: &'static str,
    pub fortification_label: &'static str,
    /// The Infantry tab shares its row with the Fortification label and is only
    /// trusted when vertically aligned with it.
    pub infantry_aligned_with_fortification: bool,
    /// Roster unit type -> on-screen tab text, where they differ.
    pub tab_aliases: &'static [(&'static str, &'static str)],
}

const SHARED_TAB_ALIASES: &[(&str, &str)] = &[("Artillery", "Artillery/Air"), ("Air", "Artillery/Air")];

/// Pixel tolerance for "same row as the anchor".
pub const ROW_ALIGNMENT_TOLERANCE: i32 = 10;

static CMBO: VariantProfile = VariantProfile {
    variant: GameVariant::Cmbo,
    unit_editor_button: "UNITS",
    confirm_button: "OK",
    nation_label: "FORCE",
    wave_label: "Location",
    division_label: None,
    chosen_label: "CHOSEN",
    on_map_label: "On Map",
    fortification_label: "Fortification",
    infantry_aligned_with_fortification: true,
    tab_aliases: SHARED_TAB_ALIASES,
};

static CMBB: VariantProfile = VariantProfile {
    variant: GameVariant::Cmbb,
    unit_editor_button: "UNITS",
    confirm_button: "OK",
    nation_label: "Nation",
    wave_label: "Location",
    division_label: Some("Division"),
    chosen_label: "CHOSEN",
    on_map_label: "On Map",
    fortification_label: "Fortification",
    infantry_aligned_with_fortification: false,
    tab_aliases: SHARED_TAB_ALIASES,
};

static CMAK: VariantProfile = VariantProfile {
    variant: GameVariant::Cmak,
    unit_editor_button: "UNITS",
    confirm_button: "OK",
    nation_label: "Nation",
    wave_label: "Location",
    division_label: Some("Division"),
    chosen_label: "CHOSEN",
    on_map_label: "On Map",
    fortification_label: "Fortification",
    infantry_aligned_with_fortification: false,
    tab_aliases: SHARED_TAB_ALIASES,
};

impl VariantProfile {
    /// On-screen tab text for a roster unit type.
    pub fn tab_label<'a>(&self, unit_type: &'a str) -> &'a str {
        self.tab_aliases
            .iter()
            .find(|(from, _)| from.eq_ignore_ascii_case(unit_type))
            .map(|(_, to)| *to)
            .unwrap_or(unit_type)
    }

    pub fn needs_fortification_alignment(&self, tab: &str) -> bool {
        self.infantry_aligned_with_fortification && tab.eq_ignore_ascii_case("Infantry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_ids_case_insensitively() {
        assert_eq!("CMAK".parse::<GameVariant>().unwrap(), GameVariant::Cmak);
        assert_eq!(" cmbo ".parse::<GameVariant>().unwrap(), GameVariant::Cmbo);
    }

    #[test]
    fn unknown_id_lists_supported_variants() {
        let err = "bad_game_id".parse::<GameVariant>().unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Must be one of"));
        assert!(text.contains("cmbb"));
    }

    #[test]
    fn division_step_only_in_later_editions() {
        assert!(GameVariant::Cmbo.profile().division_label.is_none());
        assert!(GameVariant::Cmbb.profile().division_label.is_some());
        assert!(GameVariant::Cmak.profile().division_label.is_some());
        assert_eq!(GameVariant::Cmbo.profile().nation_label, "FORCE");
        assert_eq!(GameVariant::Cmak.profile().nation_label, "Nation");
    }

    #[test]
    fn artillery_and_air_share_a_tab() {
        let profile = GameVariant::Cmbb.profile();
        assert_eq!(profile.tab_label("Artillery"), "Artillery/Air");
        assert_eq!(profile.tab_label("air"), "Artillery/Air");
        assert_eq!(profile.tab_label("Infantry"), "Infantry");
    }

    #[test]
    fn fortification_alignment_is_edition_specific() {
        assert!(GameVariant::Cmbo
            .profile()
            .needs_fortification_alignment("Infantry"));
        assert!(!GameVariant::Cmbo
            .profile()
            .needs_fortification_alignment("Armor"));
        assert!(!GameVariant::Cmak
            .profile()
            .needs_fortification_alignment("Infantry"));
    }
}
