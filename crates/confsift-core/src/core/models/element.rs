use crate::core::utils::identifiers;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A chemical element from hydrogen to radon, stored by atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseElementError {
    #[error("Unknown element symbol '{0}'")]
    UnknownSymbol(String),
    #[error("Atomic number {0} is outside the supported range 1-86")]
    OutOfRange(u32),
}

impl Element {
    pub const HYDROGEN: Element = Element(1);
    pub const CARBON: Element = Element(6);
    pub const NITROGEN: Element = Element(7);
    pub const OXYGEN: Element = Element(8);

    pub fn from_atomic_number(number: u32) -> Result<Self, ParseElementError> {
        u8::try_from(number)
            .ok()
            .filter(|&z| identifiers::symbol_for(z).is_some())
            .map(Element)
            .ok_or(ParseElementError::OutOfRange(number))
    }

    pub fn from_symbol(symbol: &str) -> Result<Self, ParseElementError> {
        identifiers::atomic_number_for_symbol(symbol)
            .map(Element)
            .ok_or_else(|| ParseElementError::UnknownSymbol(symbol.trim().to_string()))
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        identifiers::symbol_for(self.0).unwrap_or("X")
    }

    pub fn mass(self) -> f64 {
        identifiers::mass_for(self.0).unwrap_or(0.0)
    }

    pub fn covalent_radius(self) -> f64 {
        identifiers::covalent_radius_for(self.0).unwrap_or(0.0)
    }

    pub fn is_hydrogen(self) -> bool {
        self == Self::HYDROGEN
    }

    pub fn is_hbond_participant(self) -> bool {
        identifiers::is_hbond_participant(self.symbol())
    }
}

/// Accepts either an element symbol (`"Cl"`) or an atomic number (`"17"`).
impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<u32>() {
            Ok(number) => Self::from_atomic_number(number),
            Err(_) => Self::from_symbol(trimmed),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_symbols_and_numbers() {
        assert_eq!("C".parse::<Element>().unwrap(), Element::CARBON);
        assert_eq!("8".parse::<Element>().unwrap(), Element::OXYGEN);
        assert_eq!(" n ".parse::<Element>().unwrap(), Element::NITROGEN);
    }

    #[test]
    fn rejects_unknown_labels() {
        assert_eq!(
            "Qq".parse::<Element>(),
            Err(ParseElementError::UnknownSymbol("Qq".to_string()))
        );
        assert_eq!("0".parse::<Element>(), Err(ParseElementError::OutOfRange(0)));
        assert_eq!(
            "300".parse::<Element>(),
            Err(ParseElementError::OutOfRange(300))
        );
    }

    #[test]
    fn exposes_physical_properties() {
        assert_eq!(Element::HYDROGEN.symbol(), "H");
        assert!((Element::CARBON.mass() - 12.011).abs() < 1e-9);
        assert!((Element::OXYGEN.covalent_radius() - 0.66).abs() < 1e-9);
        assert!(Element::HYDROGEN.is_hydrogen());
        assert!(Element::OXYGEN.is_hbond_participant());
        assert!(!Element::CARBON.is_hbond_participant());
    }

    #[test]
    fn display_uses_symbol() {
        assert_eq!(Element::from_symbol("cl").unwrap().to_string(), "Cl");
    }
}
