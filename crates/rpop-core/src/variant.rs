#![forbid(unsafe_code)]

//! A/B copy variants.
//!
//! The variant selects which copy deck the surface renders and is attached to
//! every tracked event. Only the two whitelisted labels are accepted.

use std::fmt;
use std::str::FromStr;

/// Copy variant shown in the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// Direct ask.
    A,
    /// Benefit-driven ask.
    #[default]
    B,
}

impl Variant {
    /// All accepted variants, in label order.
    pub const ALL: [Variant; 2] = [Variant::A, Variant::B];

    /// The wire label for this variant (`"A"` or `"B"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A label outside the variant whitelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantError {
    /// The rejected label, verbatim.
    pub raw: String,
}

impl fmt::Display for VariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid variant: {:?} (expected \"A\" or \"B\")", self.raw)
    }
}

impl std::error::Error for VariantError {}

impl FromStr for Variant {
    type Err = VariantError;

    /// Exact, case-sensitive match against the whitelist.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            other => Err(VariantError {
                raw: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_benefit_driven() {
        assert_eq!(Variant::default(), Variant::B);
    }

    #[test]
    fn parse_whitelist() {
        assert_eq!("A".parse::<Variant>(), Ok(Variant::A));
        assert_eq!("B".parse::<Variant>(), Ok(Variant::B));
    }

    #[test]
    fn parse_is_case_sensitive() {
        let err = "a".parse::<Variant>().unwrap_err();
        assert_eq!(err.raw, "a");
        assert!("C".parse::<Variant>().is_err());
        assert!("".parse::<Variant>().is_err());
        assert!(" A".parse::<Variant>().is_err());
    }

    #[test]
    fn labels_round_trip() {
        for variant in Variant::ALL {
            assert_eq!(variant.as_str().parse::<Variant>(), Ok(variant));
        }
    }
}
