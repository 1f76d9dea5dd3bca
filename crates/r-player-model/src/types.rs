//! ---
//! ems_section: "02-measurement-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Enumerated measurement point metadata."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use strum::{Display, EnumString};

use crate::value::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum PhysicalQuantity {
    Current,
    Power,
    Mass,
    Length,
    Force,
    NoQuantity,
}

impl PhysicalQuantity {
    /// Data type used when the configuration row does not name one.
    pub fn default_data_type(self) -> DataType {
        match self {
            PhysicalQuantity::NoQuantity => DataType::Boolean,
            _ => DataType::Double,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum BaseUnitOfMeasure {
    Ampere,
    Voltage,
    Gram,
    Meter,
    Newton,
    #[strum(serialize = "NoUoM")]
    NoUoM,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum UnitPrefix {
    Giga,
    Mega,
    Kilo,
    NoPrefix,
    Milli,
    Micro,
    Nano,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum AccessRight {
    #[default]
    Read,
    Write,
    Both,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_configured_spellings() {
        assert_eq!("Force".parse::<PhysicalQuantity>(), Ok(PhysicalQuantity::Force));
        assert_eq!("NoUoM".parse::<BaseUnitOfMeasure>(), Ok(BaseUnitOfMeasure::NoUoM));
        assert_eq!("noprefix".parse::<UnitPrefix>(), Ok(UnitPrefix::NoPrefix));
        assert_eq!("Both".parse::<AccessRight>(), Ok(AccessRight::Both));
        assert!("Speed".parse::<PhysicalQuantity>().is_err());
    }

    #[test]
    fn no_quantity_points_are_boolean() {
        assert_eq!(PhysicalQuantity::NoQuantity.default_data_type(), DataType::Boolean);
        assert_eq!(PhysicalQuantity::Mass.default_data_type(), DataType::Double);
    }
}
