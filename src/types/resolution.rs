//! Named spatial resolutions at which complexity is measured.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoffeeError;

/// The block factor used by the default coarse resolution.
pub const DEFAULT_COARSE_BLOCK: usize = 7;

/// One entry of the catalogue: the untouched fine lattice, or a coarse-graining
/// that collapses `block × block` cells into one.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    Fine,
    Coarse { block: usize },
}

impl Resolution {
    /// The stable column name, e.g. `fine` or `coarse_7`.
    pub fn name(&self) -> String {
        match self {
            Resolution::Fine => "fine".to_string(),
            Resolution::Coarse { block } => format!("coarse_{}", block),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Resolution {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "fine" {
            return Ok(Resolution::Fine);
        }
        let block = s
            .strip_prefix("coarse_")
            .and_then(|k| k.parse::<usize>().ok())
            .ok_or_else(|| {
                CoffeeError::Configuration(format!(
                    "unrecognized resolution '{}' (expected 'fine' or 'coarse_<k>')",
                    s
                ))
            })?;
        if block == 0 {
            return Err(CoffeeError::Configuration(
                "coarse-graining block factor must be at least 1".to_string(),
            ));
        }
        Ok(Resolution::Coarse { block })
    }
}

impl TryFrom<String> for Resolution {
    type Error = CoffeeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.name()
    }
}

/// The ordered, immutable set of resolutions sampled at every recorded step.
///
/// Order is column order in the trajectory store and job-slot order in the
/// worker pool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "Vec<Resolution>", into = "Vec<Resolution>")]
pub struct ResolutionCatalogue {
    entries: Vec<Resolution>,
}

impl ResolutionCatalogue {
    /// Builds a catalogue, rejecting an empty list and duplicate names.
    pub fn new(entries: Vec<Resolution>) -> Result<Self, CoffeeError> {
        if entries.is_empty() {
            return Err(CoffeeError::Configuration(
                "the resolution catalogue must contain at least one entry".to_string(),
            ));
        }
        for (i, res) in entries.iter().enumerate() {
            if entries[..i].contains(res) {
                return Err(CoffeeError::Configuration(format!(
                    "duplicate resolution '{}' in catalogue",
                    res
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolution> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Column names in catalogue order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(Resolution::name).collect()
    }
}

impl Default for ResolutionCatalogue {
    fn default() -> Self {
        Self {
            entries: vec![
                Resolution::Fine,
                Resolution::Coarse {
                    block: DEFAULT_COARSE_BLOCK,
                },
            ],
        }
    }
}

impl TryFrom<Vec<Resolution>> for ResolutionCatalogue {
    type Error = CoffeeError;

    fn try_from(value: Vec<Resolution>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResolutionCatalogue> for Vec<Resolution> {
    fn from(value: ResolutionCatalogue) -> Self {
        value.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_names() {
        assert_eq!(Resolution::Fine.name(), "fine");
        assert_eq!(Resolution::Coarse { block: 7 }.name(), "coarse_7");
        assert_eq!(
            "coarse_3".parse::<Resolution>().unwrap(),
            Resolution::Coarse { block: 3 }
        );
    }

    #[test]
    fn test_zero_block_is_rejected() {
        assert!(matches!(
            "coarse_0".parse::<Resolution>(),
            Err(CoffeeError::Configuration(_))
        ));
        assert!("medium".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_catalogue_rejects_empty_and_duplicates() {
        assert!(ResolutionCatalogue::new(vec![]).is_err());
        assert!(ResolutionCatalogue::new(vec![Resolution::Fine, Resolution::Fine]).is_err());
    }

    #[test]
    fn test_default_catalogue_is_fine_then_coarse_7() {
        assert_eq!(
            ResolutionCatalogue::default().names(),
            vec!["fine".to_string(), "coarse_7".to_string()]
        );
    }

    #[test]
    fn test_catalogue_deserializes_from_names() {
        let cat: ResolutionCatalogue =
            serde_json::from_str(r#"["fine", "coarse_3", "coarse_9"]"#).unwrap();
        assert_eq!(cat.len(), 3);
        assert!(serde_json::from_str::<ResolutionCatalogue>("[]").is_err());
    }
}
