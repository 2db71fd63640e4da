use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::*;

/// Board descriptor a game is built from: `(columns, rows)` and the configured mine count.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub size: Coord2,
    pub mines: CellCount,
}

impl GameConfig {
    pub const fn new_unchecked(size: Coord2, mines: CellCount) -> Self {
        Self { size, mines }
    }

    pub fn new(size: Coord2, mines: CellCount) -> Result<Self> {
        let config = Self::new_unchecked(size, mines);
        config.validate()?;
        Ok(config)
    }

    /// Checks a config that did not go through [`Self::new`], e.g. one loaded with serde.
    pub fn validate(&self) -> Result<()> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(GameError::InvalidDimensions);
        }
        if self.mines > self.total_cells() {
            return Err(GameError::TooManyMines {
                requested: self.mines,
                capacity: self.total_cells(),
            });
        }
        Ok(())
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }

    /// Cells that must be opened to win.
    pub const fn safe_cells(&self) -> CellCount {
        self.total_cells().saturating_sub(self.mines)
    }
}

/// The preset difficulties.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Beginner,
    Intermediate,
    Expert,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Expert];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
        }
    }

    /// Length of a side; preset boards are square.
    pub const fn size(self) -> Coord {
        match self {
            Self::Beginner => 8,
            Self::Intermediate => 16,
            Self::Expert => 25,
        }
    }

    pub const fn mines(self) -> CellCount {
        match self {
            Self::Beginner => 10,
            Self::Intermediate => 40,
            Self::Expert => 99,
        }
    }

    pub const fn config(self) -> GameConfig {
        GameConfig::new_unchecked((self.size(), self.size()), self.mines())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s.trim()))
            .ok_or(GameError::UnknownLevel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_the_difficulty_table() {
        let table: Vec<_> = Level::ALL
            .iter()
            .map(|level| (level.name(), level.config()))
            .collect();

        assert_eq!(
            table,
            vec![
                ("beginner", GameConfig::new_unchecked((8, 8), 10)),
                ("intermediate", GameConfig::new_unchecked((16, 16), 40)),
                ("expert", GameConfig::new_unchecked((25, 25), 99)),
            ]
        );
        for level in Level::ALL {
            assert_eq!(level.config().validate(), Ok(()));
        }
    }

    #[test]
    fn levels_parse_by_name() {
        assert_eq!("expert".parse::<Level>(), Ok(Level::Expert));
        assert_eq!(" Intermediate ".parse::<Level>(), Ok(Level::Intermediate));
        assert_eq!("nightmare".parse::<Level>(), Err(GameError::UnknownLevel));
        for level in Level::ALL {
            assert_eq!(level.to_string().parse::<Level>(), Ok(level));
        }
    }

    #[test]
    fn config_rejects_impossible_boards() {
        assert_eq!(GameConfig::new((0, 4), 1), Err(GameError::InvalidDimensions));
        assert_eq!(
            GameConfig::new((2, 2), 5),
            Err(GameError::TooManyMines {
                requested: 5,
                capacity: 4
            })
        );
        assert_eq!(GameConfig::new((2, 2), 4).map(|c| c.safe_cells()), Ok(0));
    }

    #[test]
    fn configs_load_from_json() {
        let level: Level = serde_json::from_str("\"expert\"").unwrap();
        assert_eq!(level, Level::Expert);

        let custom: GameConfig = serde_json::from_str(r#"{"size": [30, 16], "mines": 99}"#).unwrap();
        assert_eq!(custom.validate(), Ok(()));
        assert_eq!(custom.safe_cells(), 381);

        let broken: GameConfig = serde_json::from_str(r#"{"size": [3, 3], "mines": 10}"#).unwrap();
        assert!(broken.validate().is_err());
    }
}
