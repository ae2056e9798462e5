//! Unit registry: categories, units and their conversion rules

use crate::core::error::ConvertError;
use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::HashSet;
use std::f64::consts::PI;

/// How a unit relates to its category's base unit.
#[derive(Debug, Clone, Copy)]
pub enum ConversionRule {
    /// `base = value * factor`, `value = base / factor`
    Linear { factor: f64 },
    /// Explicit transforms for offsets, reciprocals and the like.
    Nonlinear {
        to_base: fn(f64) -> f64,
        from_base: fn(f64) -> f64,
    },
}

impl ConversionRule {
    pub fn to_base(&self, value: f64) -> f64 {
        match self {
            ConversionRule::Linear { factor } => value * factor,
            ConversionRule::Nonlinear { to_base, .. } => to_base(value),
        }
    }

    pub fn from_base(&self, base: f64) -> f64 {
        match self {
            ConversionRule::Linear { factor } => base / factor,
            ConversionRule::Nonlinear { from_base, .. } => from_base(base),
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, ConversionRule::Linear { factor } if *factor == 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub key: String,
    pub name: String,
    pub symbol: String,
    pub rule: ConversionRule,
}

impl Unit {
    pub fn linear(key: &str, name: &str, symbol: &str, factor: f64) -> Self {
        Unit {
            key: key.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            rule: ConversionRule::Linear { factor },
        }
    }

    pub fn info(&self) -> UnitInfo {
        UnitInfo {
            key: self.key.clone(),
            name: self.name.clone(),
            symbol: self.symbol.clone(),
        }
    }
}

/// Listing shape handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitInfo {
    pub key: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone)]
pub struct Category {
    pub key: String,
    /// Decimal digits results are rounded to.
    pub precision: u32,
    pub units: Vec<Unit>,
}

impl Category {
    pub fn new(key: &str, precision: u32) -> Self {
        Category {
            key: key.to_string(),
            precision,
            units: Vec::new(),
        }
    }

    pub fn linear(mut self, key: &str, name: &str, symbol: &str, factor: f64) -> Self {
        self.units.push(Unit::linear(key, name, symbol, factor));
        self
    }

    pub fn nonlinear(
        mut self,
        key: &str,
        name: &str,
        symbol: &str,
        to_base: fn(f64) -> f64,
        from_base: fn(f64) -> f64,
    ) -> Self {
        self.units.push(Unit {
            key: key.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            rule: ConversionRule::Nonlinear { to_base, from_base },
        });
        self
    }

    /// Looks up a unit by key, ignoring ASCII case.
    pub fn unit(&self, key: &str) -> Result<&Unit, ConvertError> {
        self.units
            .iter()
            .find(|u| u.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| ConvertError::unknown_unit(&self.key, key))
    }

    pub fn base_unit(&self) -> Option<&Unit> {
        self.units.iter().find(|u| u.rule.is_base())
    }

    pub fn unit_infos(&self) -> Vec<UnitInfo> {
        self.units.iter().map(Unit::info).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.units.is_empty() {
            bail!("Category {} has no units", self.key);
        }
        let mut seen = HashSet::new();
        for unit in &self.units {
            if !seen.insert(unit.key.to_ascii_lowercase()) {
                bail!("Duplicate unit {} in category {}", unit.key, self.key);
            }
            if let ConversionRule::Linear { factor } = unit.rule {
                if !factor.is_finite() || factor <= 0.0 {
                    bail!(
                        "Unit {} in category {} has invalid factor {}",
                        unit.key,
                        self.key,
                        factor
                    );
                }
            }
        }
        if self.base_unit().is_none() {
            bail!("Category {} has no base unit with factor 1", self.key);
        }
        Ok(())
    }
}

/// Read-only table of the statically declared categories.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    categories: Vec<Category>,
}

impl UnitRegistry {
    pub fn from_categories(categories: Vec<Category>) -> Result<Self> {
        let mut seen = HashSet::new();
        for category in &categories {
            if !seen.insert(category.key.to_ascii_lowercase()) {
                bail!("Duplicate category {}", category.key);
            }
            category.validate()?;
        }
        Ok(Self { categories })
    }

    pub fn builtin() -> Self {
        Self {
            categories: builtin_categories(),
        }
    }

    pub fn category(&self, key: &str) -> Result<&Category, ConvertError> {
        self.categories
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| ConvertError::UnknownCategory(key.to_string()))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.key.as_str())
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// L/100km <-> US miles per gallon
const MPG_L100KM: f64 = 235.214583;

fn builtin_categories() -> Vec<Category> {
    vec![
        Category::new("Length", 3)
            .linear("Meter", "Meter", "m", 1.0)
            .linear("Kilometer", "Kilometer", "km", 1000.0)
            .linear("Centimeter", "Centimeter", "cm", 0.01)
            .linear("Millimeter", "Millimeter", "mm", 0.001)
            .linear("Micrometer", "Micrometer", "µm", 1e-6)
            .linear("Nanometer", "Nanometer", "nm", 1e-9)
            .linear("Mile", "Mile", "mi", 1609.344)
            .linear("Yard", "Yard", "yd", 0.9144)
            .linear("Foot", "Foot", "ft", 0.3048)
            .linear("Inch", "Inch", "in", 0.0254),
        Category::new("Weight", 3)
            .linear("Milligram", "Milligram", "mg", 0.001)
            .linear("Gram", "Gram", "g", 1.0)
            .linear("Kilogram", "Kilogram", "kg", 1000.0)
            .linear("Tonne", "Tonne", "t", 1_000_000.0)
            .linear("Pound", "Pound", "lb", 453.59237)
            .linear("Ounce", "Ounce", "oz", 28.349523125)
            .linear("Stone", "Stone", "st", 6350.29318),
        Category::new("Temperature", 2)
            .linear("Celsius", "Celsius", "°C", 1.0)
            .nonlinear(
                "Fahrenheit",
                "Fahrenheit",
                "°F",
                |f| (f - 32.0) * 5.0 / 9.0,
                |c| c * 9.0 / 5.0 + 32.0,
            )
            .nonlinear("Kelvin", "Kelvin", "K", |k| k - 273.15, |c| c + 273.15),
        Category::new("Volume", 3)
            .linear("Liter", "Liter", "L", 1.0)
            .linear("Milliliter", "Milliliter", "mL", 0.001)
            .linear("CubicMeter", "Cubic Meter", "m³", 1000.0)
            .linear("Gallon", "Gallon (US)", "gal", 3.785411784)
            .linear("Quart", "Quart (US)", "qt", 0.946352946)
            .linear("Pint", "Pint (US)", "pt", 0.473176473)
            .linear("Cup", "Cup (US)", "cup", 0.2365882365)
            .linear("Tablespoon", "Tablespoon", "tbsp", 0.01478676478125)
            .linear("Teaspoon", "Teaspoon", "tsp", 0.00492892159375),
        Category::new("Area", 3)
            .linear("SquareMeter", "Square Meter", "m²", 1.0)
            .linear("SquareKilometer", "Square Kilometer", "km²", 1_000_000.0)
            .linear("SquareFoot", "Square Foot", "ft²", 0.09290304)
            .linear("SquareInch", "Square Inch", "in²", 0.00064516)
            .linear("SquareMile", "Square Mile", "mi²", 2_589_988.110336)
            .linear("Hectare", "Hectare", "ha", 10_000.0)
            .linear("Acre", "Acre", "ac", 4046.8564224),
        Category::new("Speed", 3)
            .linear("Meter/Second", "Meter/Second", "m/s", 1.0)
            .linear("Kilometer/Hour", "Kilometer/Hour", "km/h", 1.0 / 3.6)
            .linear("Mile/Hour", "Mile/Hour", "mph", 0.44704)
            .linear("Foot/Second", "Foot/Second", "ft/s", 0.3048)
            .linear("Knot", "Knot", "kn", 1852.0 / 3600.0),
        Category::new("Time", 4)
            .linear("Second", "Second", "s", 1.0)
            .linear("Minute", "Minute", "min", 60.0)
            .linear("Hour", "Hour", "h", 3600.0)
            .linear("Day", "Day", "d", 86_400.0)
            .linear("Week", "Week", "wk", 604_800.0),
        Category::new("Storage", 6)
            .linear("Byte", "Byte", "B", 1.0)
            .linear("Kilobyte", "Kilobyte", "KB", 1024.0)
            .linear("Megabyte", "Megabyte", "MB", 1024f64.powi(2))
            .linear("Gigabyte", "Gigabyte", "GB", 1024f64.powi(3))
            .linear("Terabyte", "Terabyte", "TB", 1024f64.powi(4))
            .linear("Petabyte", "Petabyte", "PB", 1024f64.powi(5)),
        Category::new("Energy", 3)
            .linear("Joule", "Joule", "J", 1.0)
            .linear("Kilojoule", "Kilojoule", "kJ", 1000.0)
            .linear("Calorie", "Calorie", "cal", 4.184)
            .linear("Kilocalorie", "Kilocalorie", "kcal", 4184.0)
            .linear("WattHour", "Watt Hour", "Wh", 3600.0)
            .linear("KilowattHour", "Kilowatt Hour", "kWh", 3_600_000.0),
        Category::new("Pressure", 3)
            .linear("Pascal", "Pascal", "Pa", 1.0)
            .linear("Kilopascal", "Kilopascal", "kPa", 1000.0)
            .linear("Bar", "Bar", "bar", 100_000.0)
            .linear("PSI", "Pound per Square Inch", "psi", 6894.757293168)
            .linear("Atmosphere", "Atmosphere", "atm", 101_325.0),
        Category::new("Frequency", 3)
            .linear("Hertz", "Hertz", "Hz", 1.0)
            .linear("Kilohertz", "Kilohertz", "kHz", 1e3)
            .linear("Megahertz", "Megahertz", "MHz", 1e6)
            .linear("Gigahertz", "Gigahertz", "GHz", 1e9),
        Category::new("Angle", 4)
            .linear("Degree", "Degree", "°", 1.0)
            .linear("Radian", "Radian", "rad", 180.0 / PI)
            .linear("Gradian", "Gradian", "grad", 0.9),
        Category::new("Power", 3)
            .linear("Watt", "Watt", "W", 1.0)
            .linear("Kilowatt", "Kilowatt", "kW", 1000.0)
            .linear("Megawatt", "Megawatt", "MW", 1_000_000.0)
            .linear("Horsepower", "Horsepower", "hp", 745.699872),
        Category::new("FuelEconomy", 2)
            .linear("MPG(US)", "Miles per Gallon (US)", "mpg", 1.0)
            .linear("MPG(UK)", "Miles per Gallon (UK)", "mpg (UK)", 1.0 / 1.20095)
            .nonlinear(
                "L/100km",
                "Liters per 100 km",
                "L/100km",
                |l| MPG_L100KM / l,
                |mpg| MPG_L100KM / mpg,
            ),
        Category::new("Force", 3)
            .linear("Newton", "Newton", "N", 1.0)
            .linear("Kilonewton", "Kilonewton", "kN", 1000.0)
            .linear("PoundForce", "Pound Force", "lbf", 4.4482216152605),
    ]
}
