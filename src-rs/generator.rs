//! Expands a scenario config into concrete rosters.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::{debug, info};

use crate::config::{ArmyPlan, ScenarioConfig, UnitSpec};
use crate::error::ConfigError;
use crate::force_data::ForceData;
use crate::roster::{Roster, Unit};

pub struct RosterGenerator<R> {
    year: u16,
    month: u8,
    force_data: ForceData,
    rng: R,
}

impl<R: Rng> RosterGenerator<R> {
    pub fn new(year: u16, month: u8, force_data: ForceData, rng: R) -> Self {
        Self {
            year,
            month,
            force_data,
            rng,
        }
    }

    /// One roster per configured army, Allied first.
    pub fn generate_rosters(&mut self, config: &ScenarioConfig) -> Result<Vec<Roster>, ConfigError> {
        let plans = config.army_plans()?;
        if plans.is_empty() {
            info!("no army configs provided; skipping roster generation");
        }
        plans.iter().map(|plan| self.generate_roster(plan)).collect()
    }

    pub fn generate_roster(&mut self, plan: &ArmyPlan) -> Result<Roster, ConfigError> {
        info!("generating {} roster", plan.army);
        let mut roster = Roster::new(plan.army);
        for nation in &plan.nations {
            for wave in &nation.waves {
                for group in &wave.unit_types {
                    for spec in &group.specs {
                        let units = self.generate_units(&nation.name, &group.unit_type, spec)?;
                        if units.is_empty() {
                            continue;
                        }
                        roster.push_units(
                            &nation.name,
                            &wave.name,
                            spec.division.as_deref(),
                            &group.unit_type,
                            units,
                        );
                    }
                }
            }
        }
        info!("{} roster generated with {} units", plan.army, roster.unit_count());
        Ok(roster)
    }

    /// Zero or more units for one spec line.
    pub fn generate_units(
        &mut self,
        nation: &str,
        unit_type: &str,
        spec: &UnitSpec,
    ) -> Result<Vec<Unit>, ConfigError> {
        let range = count_range(spec)?;
        if self.rng.gen_range(1..=100) > spec.chance {
            debug!(unit = %spec.unit_name, "group chance roll failed");
            return Ok(Vec::new());
        }
        let count = match range {
            Some((min, max)) => self.rng.gen_range(min..=max),
            None => (0..spec.count)
                .filter(|_| self.rng.gen_range(1..=100) <= spec.chance_per_unit)
                .count() as u32,
        };

        let mut units: Vec<Unit> = Vec::with_capacity(count as usize);
        for i in 0..count {
            let name = if i > 0 && spec.all_same {
                units[0].name.clone()
            } else if spec.is_random() {
                self.draw_unit(nation, unit_type, spec.division.as_deref())?
            } else {
                spec.unit_name.clone()
            };
            units.push(Unit::new(name));
        }
        Ok(units)
    }

    fn draw_unit(
        &mut self,
        nation: &str,
        unit_type: &str,
        division: Option<&str>,
    ) -> Result<String, ConfigError> {
        let (month, year) = (self.month, self.year);
        let table = self.force_data.table(nation, unit_type, division)?;
        let weighted = table.weighted_units(month, year)?;
        let dist = WeightedIndex::new(weighted.iter().map(|(_, w)| *w)).map_err(|err| {
            ConfigError::ForceData {
                path: format!("{nation}/{unit_type}").into(),
                message: format!("no units available in {month}/{year}: {err}"),
            }
        })?;
        let name = weighted[dist.sample(&mut self.rng)].0.clone();
        debug!(nation, unit_type, unit = %name, "drew random unit");
        Ok(name)
    }
}

/// `Some((min, max))` for a ranged count, `None` for per-unit rolls.
fn count_range(spec: &UnitSpec) -> Result<Option<(u32, u32)>, ConfigError> {
    match (spec.count_min, spec.count_max) {
        (Some(min), Some(max)) if min >= max => Err(ConfigError::InvalidUnitCount(format!(
            "count_min ({min}) must be less than count_max ({max})"
        ))),
        (Some(min), Some(max)) => Ok(Some((min, max))),
        (None, None) => Ok(None),
        _ => Err(ConfigError::InvalidUnitCount(
            "if count_min is provided, count_max must also be provided".to_string(),
        )),
    }
}
