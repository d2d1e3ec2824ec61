//! Physical units and the normalizer that maps raw endpoint units onto a
//! single canonical unit per physical quantity.
//!
//! Endpoints are independently owned and report the same quantity in
//! different units (`°F` vs `celsius`, `hPa` vs `Pa`). Everything written to
//! the store is expressed in the canonical unit of its [`Quantity`] so that
//! rule predicates and the analysis tooling can compare readings directly.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A physical dimension. Each quantity has exactly one canonical [`Unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Temperature,
    Length,
    Mass,
    Pressure,
    Energy,
    Power,
    Ratio,
    Information,
    Voltage,
    Duration,
    Dimensionless,
}

impl Quantity {
    /// The unit every reading of this quantity is converted into.
    #[must_use]
    pub fn canonical_unit(self) -> Unit {
        match self {
            Self::Temperature => Unit::Celsius,
            Self::Length => Unit::Metre,
            Self::Mass => Unit::Kilogram,
            Self::Pressure => Unit::Pascal,
            Self::Energy => Unit::WattHour,
            Self::Power => Unit::Watt,
            Self::Ratio => Unit::Percent,
            Self::Information => Unit::Byte,
            Self::Voltage => Unit::Volt,
            Self::Duration => Unit::Second,
            Self::Dimensionless => Unit::Dimensionless,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Temperature => "temperature",
            Self::Length => "length",
            Self::Mass => "mass",
            Self::Pressure => "pressure",
            Self::Energy => "energy",
            Self::Power => "power",
            Self::Ratio => "ratio",
            Self::Information => "information",
            Self::Voltage => "voltage",
            Self::Duration => "duration",
            Self::Dimensionless => "dimensionless",
        };
        f.write_str(name)
    }
}

/// A recognised unit of measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Celsius,
    Fahrenheit,
    Kelvin,
    Metre,
    Millimetre,
    Centimetre,
    Kilometre,
    Inch,
    Foot,
    Gram,
    Kilogram,
    Pound,
    Pascal,
    Hectopascal,
    Kilopascal,
    Millibar,
    Bar,
    Psi,
    Joule,
    Kilojoule,
    WattHour,
    KilowattHour,
    Watt,
    Kilowatt,
    Percent,
    Fraction,
    Byte,
    Kilobyte,
    Megabyte,
    Gigabyte,
    Kibibyte,
    Mebibyte,
    Gibibyte,
    Volt,
    Millivolt,
    Second,
    Millisecond,
    Minute,
    Hour,
    Dimensionless,
}

impl Unit {
    /// Stable snake-case name, also accepted by [`Unit::parse`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
            Self::Kelvin => "kelvin",
            Self::Metre => "metre",
            Self::Millimetre => "millimetre",
            Self::Centimetre => "centimetre",
            Self::Kilometre => "kilometre",
            Self::Inch => "inch",
            Self::Foot => "foot",
            Self::Gram => "gram",
            Self::Kilogram => "kilogram",
            Self::Pound => "pound",
            Self::Pascal => "pascal",
            Self::Hectopascal => "hectopascal",
            Self::Kilopascal => "kilopascal",
            Self::Millibar => "millibar",
            Self::Bar => "bar",
            Self::Psi => "psi",
            Self::Joule => "joule",
            Self::Kilojoule => "kilojoule",
            Self::WattHour => "watt_hour",
            Self::KilowattHour => "kilowatt_hour",
            Self::Watt => "watt",
            Self::Kilowatt => "kilowatt",
            Self::Percent => "percent",
            Self::Fraction => "fraction",
            Self::Byte => "byte",
            Self::Kilobyte => "kilobyte",
            Self::Megabyte => "megabyte",
            Self::Gigabyte => "gigabyte",
            Self::Kibibyte => "kibibyte",
            Self::Mebibyte => "mebibyte",
            Self::Gibibyte => "gibibyte",
            Self::Volt => "volt",
            Self::Millivolt => "millivolt",
            Self::Second => "second",
            Self::Millisecond => "millisecond",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Dimensionless => "dimensionless",
        }
    }

    /// The physical quantity this unit measures.
    #[must_use]
    pub fn quantity(self) -> Quantity {
        match self {
            Self::Celsius | Self::Fahrenheit | Self::Kelvin => Quantity::Temperature,
            Self::Metre
            | Self::Millimetre
            | Self::Centimetre
            | Self::Kilometre
            | Self::Inch
            | Self::Foot => Quantity::Length,
            Self::Gram | Self::Kilogram | Self::Pound => Quantity::Mass,
            Self::Pascal
            | Self::Hectopascal
            | Self::Kilopascal
            | Self::Millibar
            | Self::Bar
            | Self::Psi => Quantity::Pressure,
            Self::Joule | Self::Kilojoule | Self::WattHour | Self::KilowattHour => {
                Quantity::Energy
            }
            Self::Watt | Self::Kilowatt => Quantity::Power,
            Self::Percent | Self::Fraction => Quantity::Ratio,
            Self::Byte
            | Self::Kilobyte
            | Self::Megabyte
            | Self::Gigabyte
            | Self::Kibibyte
            | Self::Mebibyte
            | Self::Gibibyte => Quantity::Information,
            Self::Volt | Self::Millivolt => Quantity::Voltage,
            Self::Second | Self::Millisecond | Self::Minute | Self::Hour => Quantity::Duration,
            Self::Dimensionless => Quantity::Dimensionless,
        }
    }

    /// Parse a unit from the spellings endpoints commonly use.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. An
    /// empty string is treated as dimensionless.
    ///
    /// # Errors
    ///
    /// Returns [`UnitError::Unrecognized`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, UnitError> {
        let normalized = raw.trim().to_lowercase();
        let unit = match normalized.as_str() {
            "celsius" | "degc" | "°c" | "\u{2103}" | "degree_celsius" | "degrees_celsius" => {
                Self::Celsius
            }
            "fahrenheit" | "degf" | "°f" | "\u{2109}" | "degree_fahrenheit"
            | "degrees_fahrenheit" => Self::Fahrenheit,
            "kelvin" | "k" => Self::Kelvin,
            "metre" | "meter" | "m" => Self::Metre,
            "millimetre" | "millimeter" | "mm" => Self::Millimetre,
            "centimetre" | "centimeter" | "cm" => Self::Centimetre,
            "kilometre" | "kilometer" | "km" => Self::Kilometre,
            "inch" | "in" => Self::Inch,
            "foot" | "feet" | "ft" => Self::Foot,
            "gram" | "g" => Self::Gram,
            "kilogram" | "kg" => Self::Kilogram,
            "pound" | "lb" | "lbs" => Self::Pound,
            "pascal" | "pa" => Self::Pascal,
            "hectopascal" | "hpa" => Self::Hectopascal,
            "kilopascal" | "kpa" => Self::Kilopascal,
            "millibar" | "mbar" => Self::Millibar,
            "bar" => Self::Bar,
            "psi" => Self::Psi,
            "joule" | "j" => Self::Joule,
            "kilojoule" | "kj" => Self::Kilojoule,
            "watt_hour" | "watt-hour" | "wh" => Self::WattHour,
            "kilowatt_hour" | "kilowatt-hour" | "kwh" => Self::KilowattHour,
            "watt" | "w" => Self::Watt,
            "kilowatt" | "kw" => Self::Kilowatt,
            "percent" | "%" => Self::Percent,
            "fraction" | "ratio" => Self::Fraction,
            "byte" | "bytes" | "b" => Self::Byte,
            "kilobyte" | "kb" => Self::Kilobyte,
            "megabyte" | "mb" => Self::Megabyte,
            "gigabyte" | "gb" => Self::Gigabyte,
            "kibibyte" | "kib" => Self::Kibibyte,
            "mebibyte" | "mib" => Self::Mebibyte,
            "gibibyte" | "gib" => Self::Gibibyte,
            "volt" | "v" => Self::Volt,
            "millivolt" | "mv" => Self::Millivolt,
            "second" | "seconds" | "s" | "sec" => Self::Second,
            "millisecond" | "milliseconds" | "ms" => Self::Millisecond,
            "minute" | "minutes" | "min" => Self::Minute,
            "hour" | "hours" | "h" => Self::Hour,
            "" | "dimensionless" | "boolean" | "bool" | "count" | "unitless" => {
                Self::Dimensionless
            }
            _ => {
                return Err(UnitError::Unrecognized {
                    unit: raw.to_string(),
                });
            }
        };
        Ok(unit)
    }

    /// Convert a value expressed in `self` into the canonical unit of
    /// `self.quantity()`.
    #[must_use]
    pub fn to_canonical(self, value: f64) -> f64 {
        match self {
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            Self::Kelvin => value - 273.15,
            other => value * other.scale(),
        }
    }

    /// Multiplicative factor to the canonical unit (affine units excluded).
    fn scale(self) -> f64 {
        match self {
            Self::Millimetre => 0.001,
            Self::Centimetre => 0.01,
            Self::Kilometre => 1_000.0,
            Self::Inch => 0.0254,
            Self::Foot => 0.3048,
            Self::Gram => 0.001,
            Self::Pound => 0.453_592_37,
            Self::Hectopascal | Self::Millibar => 100.0,
            Self::Kilopascal => 1_000.0,
            Self::Bar => 100_000.0,
            Self::Psi => 6_894.757_293_168,
            Self::Joule => 1.0 / 3_600.0,
            Self::Kilojoule => 1.0 / 3.6,
            Self::KilowattHour | Self::Kilowatt | Self::Kilobyte => 1_000.0,
            Self::Fraction => 100.0,
            Self::Megabyte => 1_000_000.0,
            Self::Gigabyte => 1_000_000_000.0,
            Self::Kibibyte => 1_024.0,
            Self::Mebibyte => 1_048_576.0,
            Self::Gibibyte => 1_073_741_824.0,
            Self::Millivolt | Self::Millisecond => 0.001,
            Self::Minute => 60.0,
            Self::Hour => 3_600.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Why a raw reading could not be normalized.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    /// The unit string matches no known unit.
    #[error("unrecognized unit {unit:?}")]
    Unrecognized { unit: String },

    /// The unit measures a different quantity than the sensor reports.
    #[error("sensor {sensor:?} reports {expected} but the reading is in {unit} ({actual})")]
    Incompatible {
        sensor: String,
        unit: Unit,
        expected: Quantity,
        actual: Quantity,
    },

    /// NaN and infinities are never stored.
    #[error("reading for sensor {sensor:?} is not a finite number")]
    NonFinite { sensor: String },
}

/// Maps raw `(value, unit)` pairs onto canonical units, checking that each
/// sensor reports the physical quantity it is known to measure.
///
/// Sensor names are matched case-insensitively with `_`, `-`, `.` and spaces
/// ignored, so `RelativeHumidity` and `relative_humidity` are the same
/// sensor. Sensors without an expectation accept any recognised unit.
#[derive(Debug, Clone)]
pub struct UnitNormalizer {
    expectations: HashMap<String, Quantity>,
}

impl Default for UnitNormalizer {
    fn default() -> Self {
        Self::empty()
            .expect("temperature", Quantity::Temperature)
            .expect("ambient_temperature", Quantity::Temperature)
            .expect("cpu_temperature", Quantity::Temperature)
            .expect("humidity", Quantity::Ratio)
            .expect("relative_humidity", Quantity::Ratio)
            .expect("pressure", Quantity::Pressure)
            .expect("barometric_pressure", Quantity::Pressure)
            .expect("ram_available", Quantity::Information)
            .expect("disk_free", Quantity::Information)
            .expect("solar_cumulative_output", Quantity::Energy)
            .expect("power", Quantity::Power)
            .expect("solar_output", Quantity::Power)
            .expect("voltage", Quantity::Voltage)
            .expect("battery_voltage", Quantity::Voltage)
            .expect("uptime", Quantity::Duration)
            .expect("ac_status", Quantity::Dimensionless)
    }
}

impl UnitNormalizer {
    /// A normalizer with no sensor expectations.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            expectations: HashMap::new(),
        }
    }

    /// Declare the quantity a sensor is expected to report.
    #[must_use]
    pub fn expect(mut self, sensor_name: &str, quantity: Quantity) -> Self {
        self.expectations.insert(sensor_key(sensor_name), quantity);
        self
    }

    /// The quantity declared for `sensor_name`, if any.
    #[must_use]
    pub fn expected_quantity(&self, sensor_name: &str) -> Option<Quantity> {
        self.expectations.get(&sensor_key(sensor_name)).copied()
    }

    /// Convert a raw reading into its canonical value and unit.
    ///
    /// # Errors
    ///
    /// - [`UnitError::Unrecognized`] when `raw_unit` is unknown
    /// - [`UnitError::Incompatible`] when the unit measures a different
    ///   quantity than the one declared for `sensor_name`
    /// - [`UnitError::NonFinite`] when the value or its conversion is NaN or
    ///   infinite
    pub fn normalize(
        &self,
        raw_value: f64,
        raw_unit: &str,
        sensor_name: &str,
    ) -> Result<(f64, Unit), UnitError> {
        let unit = Unit::parse(raw_unit)?;
        let actual = unit.quantity();
        if let Some(expected) = self.expected_quantity(sensor_name) {
            if expected != actual {
                return Err(UnitError::Incompatible {
                    sensor: sensor_name.to_string(),
                    unit,
                    expected,
                    actual,
                });
            }
        }
        let value = unit.to_canonical(raw_value);
        if !value.is_finite() {
            return Err(UnitError::NonFinite {
                sensor: sensor_name.to_string(),
            });
        }
        Ok((value, actual.canonical_unit()))
    }
}

fn sensor_key(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | '.' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn should_keep_celsius_unchanged() {
        let normalizer = UnitNormalizer::default();
        let (value, unit) = normalizer.normalize(21.5, "celsius", "temperature").unwrap();
        assert_close(value, 21.5);
        assert_eq!(unit, Unit::Celsius);
    }

    #[test]
    fn should_convert_fahrenheit_to_celsius() {
        let normalizer = UnitNormalizer::default();
        let (value, unit) = normalizer.normalize(212.0, "°F", "Temperature").unwrap();
        assert_close(value, 100.0);
        assert_eq!(unit, Unit::Celsius);
    }

    #[test]
    fn should_convert_kelvin_to_celsius() {
        let normalizer = UnitNormalizer::default();
        let (value, _) = normalizer.normalize(273.15, "K", "temperature").unwrap();
        assert_close(value, 0.0);
    }

    #[test]
    fn should_convert_hectopascal_to_pascal() {
        let normalizer = UnitNormalizer::default();
        let (value, unit) = normalizer.normalize(1013.25, "hPa", "pressure").unwrap();
        assert_close(value, 101_325.0);
        assert_eq!(unit, Unit::Pascal);
    }

    #[test]
    fn should_convert_kilowatt_hours_to_watt_hours() {
        let normalizer = UnitNormalizer::default();
        let (value, unit) = normalizer
            .normalize(1.5, "kWh", "SolarCumulativeOutput")
            .unwrap();
        assert_close(value, 1_500.0);
        assert_eq!(unit, Unit::WattHour);
    }

    #[test]
    fn should_convert_fraction_to_percent() {
        let normalizer = UnitNormalizer::default();
        let (value, unit) = normalizer
            .normalize(0.42, "ratio", "RelativeHumidity")
            .unwrap();
        assert_close(value, 42.0);
        assert_eq!(unit, Unit::Percent);
    }

    #[test]
    fn should_reject_unrecognized_unit() {
        let normalizer = UnitNormalizer::default();
        let err = normalizer
            .normalize(1.0, "furlongs", "temperature")
            .unwrap_err();
        assert_eq!(
            err,
            UnitError::Unrecognized {
                unit: "furlongs".to_string()
            }
        );
    }

    #[test]
    fn should_reject_temperature_tagged_as_length() {
        let normalizer = UnitNormalizer::default();
        let err = normalizer.normalize(21.5, "m", "temperature").unwrap_err();
        assert!(matches!(
            err,
            UnitError::Incompatible {
                expected: Quantity::Temperature,
                actual: Quantity::Length,
                ..
            }
        ));
    }

    #[test]
    fn should_accept_any_recognized_unit_for_unknown_sensor() {
        let normalizer = UnitNormalizer::default();
        let (value, unit) = normalizer.normalize(5.0, "km", "commute").unwrap();
        assert_close(value, 5_000.0);
        assert_eq!(unit, Unit::Metre);
    }

    #[test]
    fn should_treat_empty_unit_as_dimensionless() {
        let normalizer = UnitNormalizer::empty();
        let (value, unit) = normalizer.normalize(3.0, "", "door_open").unwrap();
        assert_close(value, 3.0);
        assert_eq!(unit, Unit::Dimensionless);
    }

    #[test]
    fn should_reject_non_finite_values() {
        let normalizer = UnitNormalizer::default();
        let err = normalizer
            .normalize(f64::NAN, "celsius", "temperature")
            .unwrap_err();
        assert!(matches!(err, UnitError::NonFinite { .. }));
    }

    #[test]
    fn should_match_sensor_names_loosely() {
        let normalizer = UnitNormalizer::empty().expect("ram_available", Quantity::Information);
        assert_eq!(
            normalizer.expected_quantity("RAMAvailable"),
            Some(Quantity::Information)
        );
        assert_eq!(
            normalizer.expected_quantity("ram-available"),
            Some(Quantity::Information)
        );
    }

    #[test]
    fn should_parse_canonical_names_back() {
        for quantity in [
            Quantity::Temperature,
            Quantity::Energy,
            Quantity::Ratio,
            Quantity::Information,
        ] {
            let unit = quantity.canonical_unit();
            assert_eq!(Unit::parse(unit.as_str()).unwrap(), unit);
        }
    }
}
