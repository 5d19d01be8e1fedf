use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;

/// One of the two sides the editor can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Army {
    Allied,
    Axis,
}

impl Army {
    pub fn label(self) -> &'static str {
        match self {
            Army::Allied => "Allied",
            Army::Axis => "Axis",
        }
    }
}

impl fmt::Display for Army {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Army {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Allied" => Ok(Army::Allied),
            "Axis" => Ok(Army::Axis),
            other => Err(ConfigError::UnknownArmy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    pub name: String,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitGroup {
    pub unit_type: String,
    pub units: Vec<Unit>,
}

/// Units sharing a division. `name` is `None` for editions (or configs) without divisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Division {
    pub name: Option<String>,
    pub unit_types: Vec<UnitGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wave {
    pub name: String,
    pub divisions: Vec<Division>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Nation {
    pub name: String,
    pub waves: Vec<Wave>,
}

/// Order of battle for one army. Every level keeps insertion order, which is
/// the order the navigator clicks things in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Roster {
    pub army: Army,
    pub nations: Vec<Nation>,
}

impl Roster {
    pub fn new(army: Army) -> Self {
        Self {
            army,
            nations: Vec::new(),
        }
    }

    /// Append units under the given path, creating missing levels in
    /// first-seen order.
    pub fn push_units(
        &mut self,
        nation: &str,
        wave: &str,
        division: Option<&str>,
        unit_type: &str,
        units: impl IntoIterator<Item = Unit>,
    ) {
        let nation = find_or_push(
            &mut self.nations,
            |n| n.name == nation,
            || Nation {
                name: nation.to_string(),
                waves: Vec::new(),
            },
        );
        let wave = find_or_push(
            &mut nation.waves,
            |w| w.name == wave,
            || Wave {
                name: wave.to_string(),
                divisions: Vec::new(),
            },
        );
        // Undivided units go first: once a division filter is selected in the
        // editor nothing clears it for the rest of the wave.
        let index = match wave.divisions.iter().position(|d| d.name.as_deref() == division) {
            Some(index) => index,
            None => {
                let at = if division.is_none() { 0 } else { wave.divisions.len() };
                wave.divisions.insert(
                    at,
                    Division {
                        name: division.map(ToString::to_string),
                        unit_types: Vec::new(),
                    },
                );
                at
            }
        };
        let division = &mut wave.divisions[index];
        let group = find_or_push(
            &mut division.unit_types,
            |g| g.unit_type == unit_type,
            || UnitGroup {
                unit_type: unit_type.to_string(),
                units: Vec::new(),
            },
        );
        group.units.extend(units);
    }

    pub fn unit_count(&self) -> usize {
        self.nations
            .iter()
            .flat_map(|n| &n.waves)
            .flat_map(|w| &w.divisions)
            .flat_map(|d| &d.unit_types)
            .map(|g| g.units.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.unit_count() == 0
    }
}

fn find_or_push<T>(items: &mut Vec<T>, matches: impl Fn(&T) -> bool, make: impl FnOnce() -> T) -> &mut T {
    let index = match items.iter().position(matches) {
        Some(index) => index,
        None => {
            items.push(make());
            items.len() - 1
        }
    };
    &mut items[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn army_labels_are_exact() {
        assert_eq!("Axis".parse::<Army>().unwrap(), Army::Axis);
        assert_eq!("Allied".parse::<Army>().unwrap(), Army::Allied);
        assert!(matches!(
            "axis".parse::<Army>(),
            Err(ConfigError::UnknownArmy(_))
        ));
    }

    #[test]
    fn push_units_preserves_first_seen_order() {
        let mut roster = Roster::new(Army::Allied);
        roster.push_units("Canadian", "On Map", None, "Support", [Unit::new("Mortar 81mm")]);
        roster.push_units("British", "On Map", None, "Infantry", [Unit::new("Rifle Platoon")]);
        roster.push_units("Canadian", "Reinforce 1", None, "Armor", [Unit::new("Sherman V")]);
        roster.push_units("Canadian", "On Map", None, "Support", [Unit::new("PIAT Team")]);

        let names: Vec<&str> = roster.nations.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Canadian", "British"]);

        let canadian = &roster.nations[0];
        let waves: Vec<&str> = canadian.waves.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(waves, ["On Map", "Reinforce 1"]);

        let support = &canadian.waves[0].divisions[0].unit_types[0];
        let units: Vec<&str> = support.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(units, ["Mortar 81mm", "PIAT Team"]);
        assert_eq!(roster.unit_count(), 4);
    }

    #[test]
    fn undivided_units_lead_their_wave() {
        let mut roster = Roster::new(Army::Axis);
        roster.push_units("German", "On Map", Some("12th SS"), "Armor", [Unit::new("Panther A")]);
        roster.push_units("German", "On Map", None, "Infantry", [Unit::new("Rifle Platoon")]);
        let wave = &roster.nations[0].waves[0];
        roster.push_units("German", "On Map", Some("Hermann Goering"), "Armor", [Unit::new("Tiger I")]);
        roster.push_units("German", "On Map", None, "Support", [Unit::new("MG42 Light Machinegun")]);
        let wave = &roster.nations[0].waves[0];
        let names: Vec<Option<&str>> = wave.divisions.iter().map(|d| d.name.as_deref()).collect();
        assert_eq!(names, [None, Some("12th SS"), Some("Hermann Goering")]);
        let undivided: Vec<&str> = wave.divisions[0]
            .unit_types
            .iter()
            .map(|g| g.unit_type.as_str())
            .collect();
        assert_eq!(undivided, ["Infantry", "Support"]);
    }
}
