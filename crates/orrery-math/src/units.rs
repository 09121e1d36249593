//! Length units. Internal unit is the millimetre.

/// 1 metre = 1,000 millimetres.
pub const UNITS_PER_METER: i128 = 1_000;

/// 1 kilometre = 1,000,000 millimetres.
pub const UNITS_PER_KILOMETER: i128 = 1_000_000;

/// 1 astronomical unit (IAU 2012 exact definition).
pub const UNITS_PER_AU: i128 = 149_597_870_700_000;

/// 1 light-year (IAU definition).
pub const UNITS_PER_LIGHT_YEAR: i128 = 9_460_730_472_580_800_000;

/// 1 parsec.
pub const UNITS_PER_PARSEC: i128 = 30_856_775_814_913_673_000;

/// Astronomical unit in metres.
pub const AU_M: f64 = 149_597_870_700.0;

/// Light-year in metres.
pub const LIGHT_YEAR_M: f64 = 9_460_730_472_580_800.0;

/// Parsec in metres.
pub const PARSEC_M: f64 = 3.085_677_581_491_367_3e16;

/// Solar radius in metres.
pub const SOLAR_RADIUS_M: f64 = 6.957e8;

/// Convert meters (f64) to internal units (i128).
/// Rounds to nearest millimeter.
pub fn meters_to_units(meters: f64) -> i128 {
    (meters * UNITS_PER_METER as f64).round() as i128
}

/// Convert internal units (i128) to meters (f64).
pub fn units_to_meters(units: i128) -> f64 {
    units as f64 / UNITS_PER_METER as f64
}

/// Convert light-years (f64) to internal units (i128).
///
/// Whole light-years go through the exact integer constant; only the
/// fractional part is rounded.
pub fn light_years_to_units(ly: f64) -> i128 {
    let whole = ly.trunc();
    whole as i128 * UNITS_PER_LIGHT_YEAR + ((ly - whole) * UNITS_PER_LIGHT_YEAR as f64).round() as i128
}

/// Format a distance in metres with the most readable unit.
///
/// - 0.5 -> "500 mm"
/// - 1500.0 -> "1.500 km"
/// - 2.0e11 -> "1.337 AU"
/// - 1.0e16 -> "1.057 ly"
pub fn format_distance(meters: f64) -> String {
    let abs = meters.abs();
    let sign = if meters < 0.0 { "-" } else { "" };

    if abs >= LIGHT_YEAR_M {
        format!("{sign}{:.3} ly", abs / LIGHT_YEAR_M)
    } else if abs >= AU_M {
        format!("{sign}{:.3} AU", abs / AU_M)
    } else if abs >= 1_000.0 {
        format!("{sign}{:.3} km", abs / 1_000.0)
    } else if abs >= 1.0 {
        format!("{sign}{:.3} m", abs)
    } else {
        format!("{sign}{:.0} mm", abs * 1_000.0)
    }
}
