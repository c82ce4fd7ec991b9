//! Tags for the seeding patterns of a fresh lattice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoffeeError;

/// How cream is laid out in the lattice at step 0.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    /// Cream fills the top half of the cup, coffee the bottom half.
    #[default]
    Updown,
    /// A disc of cream centred in the cup.
    Circular,
}

impl InitialState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitialState::Updown => "updown",
            InitialState::Circular => "circular",
        }
    }
}

impl fmt::Display for InitialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitialState {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updown" => Ok(InitialState::Updown),
            "circular" => Ok(InitialState::Circular),
            other => Err(CoffeeError::Configuration(format!(
                "unrecognized initial state '{}' (expected updown or circular)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_tags() {
        assert_eq!("updown".parse::<InitialState>().unwrap(), InitialState::Updown);
        assert_eq!("circular".parse::<InitialState>().unwrap(), InitialState::Circular);
        assert!(matches!(
            "spiral".parse::<InitialState>(),
            Err(CoffeeError::Configuration(_))
        ));
    }
}
