//! Per-nation unit availability tables used for `random` unit draws.
//!
//! Files live at `<root>/<game>/<nation>_<unit type>[_<division>].tsv`
//! (lower-cased, spaces as underscores) with a header row naming at least a
//! `unit` column and one `<month>_<year>_rarity` column per period.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;
use crate::variant::GameVariant;

/// Rarity value meaning "not available in this period".
pub const UNAVAILABLE_RARITY: i32 = 999;

#[derive(Debug, Clone)]
pub struct ForceTable {
    path: PathBuf,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ForceTable {
    pub fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut lines = raw.lines().filter(|line| !line.trim().is_empty());
        let header: Vec<String> = lines
            .next()
            .ok_or_else(|| force_err(path, "file is empty"))?
            .split('\t')
            .map(|h| h.trim().to_string())
            .collect();
        if !header.iter().any(|h| h == "unit") {
            return Err(force_err(path, "header has no 'unit' column"));
        }
        let rows = lines
            .map(|line| line.split('\t').map(|c| c.trim().to_string()).collect())
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            header,
            rows,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Available units for the period with their draw weights,
    /// `trunc(100 / ((100 + rarity) / 100))`.
    pub fn weighted_units(&self, month: u8, year: u16) -> Result<Vec<(String, u32)>, ConfigError> {
        let rarity_key = format!("{month}_{year}_rarity");
        let unit_col = self
            .column("unit")
            .ok_or_else(|| force_err(&self.path, "header has no 'unit' column"))?;
        let rarity_col = self
            .column(&rarity_key)
            .ok_or_else(|| force_err(&self.path, &format!("no '{rarity_key}' column")))?;

        let mut out = Vec::new();
        for (idx, row) in self.rows.iter().enumerate() {
            let (Some(unit), Some(raw_rarity)) = (row.get(unit_col), row.get(rarity_col)) else {
                continue;
            };
            if unit.is_empty() {
                continue;
            }
            let rarity: i32 = raw_rarity.parse().map_err(|_| {
                force_err(
                    &self.path,
                    &format!("row {}: rarity {raw_rarity:?} is not an integer", idx + 2),
                )
            })?;
            if rarity == UNAVAILABLE_RARITY || rarity <= -100 {
                continue;
            }
            let weight = (100.0 / ((100.0 + f64::from(rarity)) / 100.0)) as u32;
            if weight == 0 {
                continue;
            }
            out.push((unit.clone(), weight));
        }
        Ok(out)
    }
}

fn force_err(path: &Path, message: &str) -> ConfigError {
    ConfigError::ForceData {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

pub fn table_file_name(nation: &str, unit_type: &str, division: Option<&str>) -> String {
    let stem = match division {
        Some(division) => format!("{nation}_{unit_type}_{division}"),
        None => format!("{nation}_{unit_type}"),
    };
    format!("{}.tsv", stem.replace(' ', "_").to_lowercase())
}

type TableKey = (String, String, Option<String>);

/// Lazily loaded, cached force tables for one game.
pub struct ForceData {
    root: PathBuf,
    game: GameVariant,
    cache: HashMap<TableKey, ForceTable>,
}

impl ForceData {
    pub fn new(root: impl Into<PathBuf>, game: GameVariant) -> Self {
        Self {
            root: root.into(),
            game,
            cache: HashMap::new(),
        }
    }

    pub fn table(
        &mut self,
        nation: &str,
        unit_type: &str,
        division: Option<&str>,
    ) -> Result<&ForceTable, ConfigError> {
        let key = (
            nation.to_string(),
            unit_type.to_string(),
            division.map(ToString::to_string),
        );
        if !self.cache.contains_key(&key) {
            let path = self
                .root
                .join(self.game.id())
                .join(table_file_name(nation, unit_type, division));
            debug!("loading force data {}", path.display());
            let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let table = ForceTable::parse(&raw, &path)?;
            self.cache.insert(key.clone(), table);
        }
        self.cache
            .get(&key)
            .ok_or_else(|| force_err(&self.root, "force table cache miss"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TABLE: &str = "unit\t6_1944_rarity\t7_1944_rarity\n\
Rifle Platoon\t0\t0\n\
Pioneer Platoon\t25\t999\n\
Fallschirmjager Platoon\t999\t100\n";

    #[test]
    fn file_names_are_lowercase_with_underscores() {
        assert_eq!(
            table_file_name("German", "Infantry", None),
            "german_infantry.tsv"
        );
        assert_eq!(
            table_file_name("German", "Armor", Some("12th SS")),
            "german_armor_12th_ss.tsv"
        );
    }

    #[test]
    fn weights_skip_unavailable_rows() {
        let table = ForceTable::parse(TABLE, Path::new("german_infantry.tsv")).unwrap();
        let june = table.weighted_units(6, 1944).unwrap();
        assert_eq!(
            june,
            vec![
                ("Rifle Platoon".to_string(), 100),
                ("Pioneer Platoon".to_string(), 80)
            ]
        );
        let july = table.weighted_units(7, 1944).unwrap();
        assert_eq!(
            july,
            vec![
                ("Rifle Platoon".to_string(), 100),
                ("Fallschirmjager Platoon".to_string(), 50)
            ]
        );
    }

    #[test]
    fn missing_period_column_is_an_error() {
        let table = ForceTable::parse(TABLE, Path::new("german_infantry.tsv")).unwrap();
        assert!(matches!(
            table.weighted_units(1, 1941),
            Err(ConfigError::ForceData { .. })
        ));
    }

    #[test]
    fn tables_load_from_game_directory_once() {
        let dir = tempdir().unwrap();
        let game_dir = dir.path().join("cmbo");
        fs::create_dir_all(&game_dir).unwrap();
        let path = game_dir.join("german_infantry.tsv");
        fs::write(&path, TABLE).unwrap();

        let mut data = ForceData::new(dir.path(), GameVariant::Cmbo);
        assert!(data.table("German", "Infantry", None).is_ok());
        fs::remove_file(&path).unwrap();
        // served from cache
        assert!(data.table("German", "Infantry", None).is_ok());
        assert!(matches!(
            data.table("German", "Armor", None),
            Err(ConfigError::Read { .. })
        ));
    }
}
