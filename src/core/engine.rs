//! Two-phase conversion: source unit -> category base -> target unit

use crate::core::error::ConvertError;
use crate::core::units::Category;

/// Parses user input into a finite number.
pub fn parse_value(raw: &str) -> Result<f64, ConvertError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConvertError::InvalidInput("empty value".to_string()));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| ConvertError::InvalidInput(format!("'{trimmed}' is not a number")))?;
    if !value.is_finite() {
        return Err(ConvertError::InvalidInput(format!(
            "'{trimmed}' is not a finite number"
        )));
    }
    Ok(value)
}

/// Converts without rounding.
pub fn convert_exact(
    category: &Category,
    from: &str,
    to: &str,
    value: f64,
) -> Result<f64, ConvertError> {
    if !value.is_finite() {
        return Err(ConvertError::InvalidInput(format!(
            "{value} is not a finite number"
        )));
    }
    let from_unit = category.unit(from)?;
    let to_unit = category.unit(to)?;

    let base = from_unit.rule.to_base(value);
    let result = to_unit.rule.from_base(base);
    if !result.is_finite() {
        return Err(ConvertError::InvalidInput(format!(
            "{value} {} has no finite value in {}",
            from_unit.key, to_unit.key
        )));
    }
    Ok(result)
}

/// Converts and rounds to the category's precision.
pub fn convert(
    category: &Category,
    from: &str,
    to: &str,
    value: f64,
) -> Result<f64, ConvertError> {
    let result = convert_exact(category, from, to, value)?;
    Ok(round_to_precision(result, category.precision))
}

/// Rounds half away from zero after nudging by `f64::EPSILON` away from
/// zero, so values such as 0.999999999999998 land on 1 rather than one unit
/// below, and ties round the same way on both sides of zero.
pub fn round_to_precision(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let scaled = (value + value.signum() * f64::EPSILON) * factor;
    if !scaled.is_finite() {
        return value;
    }
    let rounded = scaled.round() / factor;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Fixed-point rendering with trailing zeros stripped.
pub fn format_value(value: f64, precision: u32) -> String {
    let fixed = format!("{:.*}", precision as usize, round_to_precision(value, precision));
    if !fixed.contains('.') {
        return fixed;
    }
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::UnitRegistry;

    fn category(key: &str) -> Category {
        UnitRegistry::builtin().category(key).unwrap().clone()
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(" 42.5 ").unwrap(), 42.5);
        assert_eq!(parse_value("-3").unwrap(), -3.0);
        assert_eq!(parse_value("1e3").unwrap(), 1000.0);
        for bad in ["abc", "", "   ", "NaN", "inf", "-infinity", "12abc"] {
            assert!(
                matches!(parse_value(bad), Err(ConvertError::InvalidInput(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_concrete_scenarios() {
        assert_eq!(
            convert(&category("Temperature"), "Fahrenheit", "Celsius", 32.0).unwrap(),
            0.0
        );
        assert_eq!(
            convert(&category("Length"), "Mile", "Kilometer", 1.0).unwrap(),
            1.609
        );
        assert_eq!(
            convert(&category("Temperature"), "Celsius", "Kelvin", 100.0).unwrap(),
            373.15
        );
        assert_eq!(
            convert(&category("Temperature"), "Kelvin", "Fahrenheit", 0.0).unwrap(),
            -459.67
        );
    }

    #[test]
    fn test_precision_boundary() {
        assert_eq!(round_to_precision(1.000000000000002, 6), 1.0);
        assert_eq!(round_to_precision(0.999999999999998, 6), 1.0);
        assert_eq!(round_to_precision(2.5, 0), 3.0);
        assert_eq!(round_to_precision(-2.5, 0), -3.0);
        assert_eq!(round_to_precision(1.2344, 3), 1.234);
        assert_eq!(round_to_precision(0.125, 2), 0.13);
        assert_eq!(round_to_precision(-0.125, 2), -0.13);
        assert_eq!(round_to_precision(-0.999999999999998, 6), -1.0);
        assert_eq!(round_to_precision(-0.0001, 2), 0.0);
        assert!(round_to_precision(-0.0001, 2).is_sign_positive());
    }

    #[test]
    fn test_base_identity() {
        let registry = UnitRegistry::builtin();
        for key in registry.categories() {
            let category = registry.category(key).unwrap();
            let base = category.base_unit().unwrap();
            for value in [0.0, 1.0, 12.5, -7.25] {
                assert_eq!(
                    convert(category, &base.key, &base.key, value).unwrap(),
                    round_to_precision(value, category.precision),
                    "{key}"
                );
            }
        }
    }

    #[test]
    fn test_round_trip_within_precision() {
        let cases = [
            ("Length", "Mile", "Kilometer"),
            ("Length", "Foot", "Meter"),
            ("Weight", "Pound", "Kilogram"),
            ("Temperature", "Fahrenheit", "Kelvin"),
            ("Volume", "Gallon", "Liter"),
            ("Speed", "Knot", "Kilometer/Hour"),
            ("Energy", "Kilocalorie", "Kilojoule"),
            ("FuelEconomy", "L/100km", "MPG(US)"),
        ];
        for (key, a, b) in cases {
            let category = category(key);
            let tolerance = 10f64.powi(-(category.precision as i32));
            for value in [1.0, 12.0, 250.0] {
                let there = convert(&category, a, b, value).unwrap();
                let back = convert(&category, b, a, there).unwrap();
                assert!(
                    (back - value).abs() <= 2.0 * value * tolerance,
                    "{key}: {value} {a} -> {there} {b} -> {back} {a}"
                );
            }
        }
    }

    #[test]
    fn test_linear_scaling() {
        let length = category("Length");
        let one = convert_exact(&length, "Inch", "Centimeter", 3.0).unwrap();
        for k in [2.0, 10.0, 0.5] {
            let scaled = convert_exact(&length, "Inch", "Centimeter", 3.0 * k).unwrap();
            assert!((scaled - k * one).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_unit() {
        let err = convert(&category("Length"), "Meter", "XYZ", 5.0).unwrap_err();
        assert_eq!(err, ConvertError::unknown_unit("Length", "XYZ"));
        let err = convert(&category("Length"), "XYZ", "Meter", 5.0).unwrap_err();
        assert_eq!(err, ConvertError::unknown_unit("Length", "XYZ"));
    }

    #[test]
    fn test_non_finite_input_and_result() {
        let length = category("Length");
        assert!(matches!(
            convert(&length, "Meter", "Foot", f64::NAN),
            Err(ConvertError::InvalidInput(_))
        ));
        let fuel = category("FuelEconomy");
        assert!(matches!(
            convert(&fuel, "L/100km", "MPG(US)", 0.0),
            Err(ConvertError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1.5, 3), "1.5");
        assert_eq!(format_value(2.0, 2), "2");
        assert_eq!(format_value(0.1234567, 4), "0.1235");
        assert_eq!(format_value(150.0, 0), "150");
        assert_eq!(format_value(92.0, 2), "92");
    }
}
