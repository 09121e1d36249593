//! Luminosity, radiance and magnitude conversions.
//!
//! All quantities are SI: luminosity in watts, distance in metres, radiance
//! (irradiance at the observer) in W/m². Apparent magnitude uses the Pogson
//! scale anchored on the Sun: a star of solar luminosity seen from ten parsecs
//! has apparent magnitude [`SUN_ABS_MAG`]. Because distances are metres
//! throughout, no additional unit factor appears in `L / (4π d²)`.

use std::f64::consts::PI;

use crate::units::PARSEC_M;

/// Nominal solar luminosity (IAU 2015 B3), watts.
pub const SUN_LUMINOSITY: f64 = 3.828e26;

/// Absolute visual magnitude of the Sun.
pub const SUN_ABS_MAG: f64 = 4.83;

/// Magnitude at which a source is considered a light source for its neighbours.
pub const LIGHT_SOURCE_MAGNITUDE: f64 = -10.0;

/// Radiance of a magnitude-zero source, W/m².
///
/// `E0 = L_sun / (4π (10 pc)²) · 10^(0.4 · M_sun)`.
pub fn zero_point_radiance() -> f64 {
    let d = 10.0 * PARSEC_M;
    SUN_LUMINOSITY / (4.0 * PI * d * d) * 10f64.powf(0.4 * SUN_ABS_MAG)
}

/// Irradiance received at `distance` metres from a point source.
pub fn point_radiance(luminosity: f64, distance: f64) -> f64 {
    if distance <= 0.0 {
        return f64::INFINITY;
    }
    luminosity / (4.0 * PI * distance * distance)
}

/// Apparent magnitude of a source with the given irradiance.
pub fn magnitude_from_radiance(radiance: f64) -> f64 {
    if radiance <= 0.0 {
        return f64::INFINITY;
    }
    -2.5 * (radiance / zero_point_radiance()).log10()
}

/// Irradiance of a source of the given apparent magnitude.
pub fn radiance_from_magnitude(magnitude: f64) -> f64 {
    zero_point_radiance() * 10f64.powf(-0.4 * magnitude)
}

/// Luminosity of a source with the given absolute magnitude.
pub fn luminosity_from_abs_magnitude(abs_mag: f64) -> f64 {
    SUN_LUMINOSITY * 10f64.powf(0.4 * (SUN_ABS_MAG - abs_mag))
}

/// Absolute magnitude of a source with the given luminosity.
pub fn abs_magnitude_from_luminosity(luminosity: f64) -> f64 {
    SUN_ABS_MAG - 2.5 * (luminosity / SUN_LUMINOSITY).log10()
}

/// Apparent magnitude from absolute magnitude and distance (distance modulus).
pub fn app_magnitude(abs_mag: f64, distance: f64) -> f64 {
    abs_mag + 5.0 * (distance / (10.0 * PARSEC_M)).log10()
}
