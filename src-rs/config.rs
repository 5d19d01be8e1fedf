//! Scenario configuration: which game, when, and what each army fields.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::ConfigError;
use crate::roster::Army;
use crate::variant::GameVariant;

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    pub game: String,
    pub year: u16,
    pub month: u8,
    /// `Allied` / `Axis` -> nation -> wave -> unit type -> [unit spec]. Kept as
    /// a raw mapping so key order survives into the roster.
    #[serde(default)]
    pub armies: Value,
}

/// One entry under a unit type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitSpec {
    /// Concrete unit name, or `random` to draw from force data.
    pub unit_name: String,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub count_min: Option<u32>,
    #[serde(default)]
    pub count_max: Option<u32>,
    #[serde(default = "default_percent")]
    pub chance_per_unit: u32,
    /// Chance the whole group shows up at all.
    #[serde(default = "default_percent")]
    pub chance: u32,
    #[serde(default)]
    pub all_same: bool,
}

fn default_count() -> u32 {
    1
}

fn default_percent() -> u32 {
    100
}

impl UnitSpec {
    pub fn is_random(&self) -> bool {
        self.unit_name == "random"
    }
}

#[cfg(test)]
impl UnitSpec {
    pub fn named(unit_name: impl Into<String>) -> Self {
        Self {
            unit_name: unit_name.into(),
            division: None,
            count: default_count(),
            count_min: None,
            count_max: None,
            chance_per_unit: default_percent(),
            chance: default_percent(),
            all_same: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTypePlan {
    pub unit_type: String,
    pub specs: Vec<UnitSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePlan {
    pub name: String,
    pub unit_types: Vec<UnitTypePlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationPlan {
    pub name: String,
    pub waves: Vec<WavePlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmyPlan {
    pub army: Army,
    pub nations: Vec<NationPlan>,
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|err| ConfigError::Malformed(err.to_string()))
    }

    pub fn variant(&self) -> Result<GameVariant, ConfigError> {
        self.game.parse()
    }

    /// Configured armies, Allied first. Absent or empty armies are skipped.
    pub fn army_plans(&self) -> Result<Vec<ArmyPlan>, ConfigError> {
        if self.armies.is_null() {
            return Ok(Vec::new());
        }
        let mut plans = Vec::new();
        for (label, nations) in entries(&self.armies, "armies")? {
            let army: Army = label.parse()?;
            if is_empty(nations) {
                continue;
            }
            plans.push(ArmyPlan {
                army,
                nations: nation_plans(nations, &label)?,
            });
        }
        plans.sort_by_key(|plan| plan.army != Army::Allied);
        Ok(plans)
    }
}

fn nation_plans(value: &Value, army: &str) -> Result<Vec<NationPlan>, ConfigError> {
    let mut nations = Vec::new();
    for (nation, waves) in entries(value, army)? {
        let path = format!("{army}.{nation}");
        let mut wave_plans = Vec::new();
        for (wave, unit_types) in entries(waves, &path)? {
            let path = format!("{path}.{wave}");
            let mut type_plans = Vec::new();
            for (unit_type, specs) in entries(unit_types, &path)? {
                let specs: Vec<UnitSpec> = serde_yaml::from_value(specs.clone()).map_err(|err| {
                    ConfigError::Malformed(format!("{path}.{unit_type}: {err}"))
                })?;
                type_plans.push(UnitTypePlan { unit_type, specs });
            }
            wave_plans.push(WavePlan {
                name: wave,
                unit_types: type_plans,
            });
        }
        nations.push(NationPlan {
            name: nation,
            waves: wave_plans,
        });
    }
    Ok(nations)
}

fn entries<'a>(value: &'a Value, path: &str) -> Result<Vec<(String, &'a Value)>, ConfigError> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| ConfigError::Malformed(format!("{path} must be a mapping")))?;
    mapping
        .iter()
        .map(|(key, value)| match key {
            Value::String(s) => Ok((s.clone(), value)),
            Value::Number(n) => Ok((n.to_string(), value)),
            _ => Err(ConfigError::Malformed(format!(
                "{path} has a non-string key {key:?}"
            ))),
        })
        .collect()
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Mapping(m) => m.is_empty(),
        _ => false,
    }
}
