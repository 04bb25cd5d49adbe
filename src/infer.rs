//! Inference of missing harmonic constituents.
//!
//! Many stations were reduced from short observation series and carry only
//! a handful of constituents. Following Schureman (1971, article 230), the
//! minor semi-diurnal constituents can be approximated from M2 and S2, and
//! the minor diurnal ones from O1 and K1: amplitudes scale by fixed ratios
//! of the principal amplitude, and epochs interpolate linearly in speed
//! between the two principals.

use crate::{ConstituentTable, Station};

/// Schureman's mean amplitude ratio denominators.
const M2_COEFF: f64 = 0.9085;
const O1_COEFF: f64 = 0.3771;

/// Semi-diurnal constituents inferable from M2 and S2, with their mean
/// amplitude coefficients.
const SEMI_DIURNAL: [(&str, f64); 10] = [
    ("N2", 0.1759),
    ("NU2", 0.0341),
    ("MU2", 0.0219),
    ("2N2", 0.0235),
    ("LDA2", 0.0066),
    ("T2", 0.0248),
    ("R2", 0.0035),
    ("L2", 0.0251),
    ("K2", 0.1151),
    ("KJ2", 0.0064),
];

/// Diurnal constituents inferable from O1 and K1.
const DIURNAL: [(&str, f64); 10] = [
    ("OO1", 0.0163),
    ("M1", 0.0209),
    ("J1", 0.0297),
    ("RHO1", 0.0142),
    ("Q1", 0.0730),
    ("2Q1", 0.0097),
    ("P1", 0.1755),
    ("PI1", 0.0103),
    ("PHI1", 0.0076),
    ("PSI1", 0.0042),
];

/// Fills in missing constituents on a reference station, in place.
///
/// Returns true if inference ran. It doesn't run, and returns false
/// without touching the station, unless the station is a reference and
/// `M2`, `S2`, `K1`, and `O1` all exist in the table with strictly
/// positive amplitudes at this station. A constituent is only filled when
/// both its amplitude and its epoch are exactly zero; anything already set
/// is preserved, so running inference twice changes nothing.
///
/// Interpolated epochs are reported as computed, without reduction into
/// [0, 360).
///
/// # Examples
///
/// ```no_run
/// use tcd::Database;
///
/// let mut database = Database::from_path("harmonics.tcd").unwrap();
/// let mut station = database.stations().unwrap()[0].clone();
/// if database.infer_constituents(&mut station) {
///     println!("{} constituents active", station.active_constituents());
/// }
/// ```
pub fn infer_constituents(station: &mut Station, constituents: &ConstituentTable) -> bool {
    let Some(reference) = station.reference_mut() else {
        return false;
    };
    if reference.amplitudes.is_empty() || reference.epochs.is_empty() {
        return false;
    }
    let principals = ["M2", "S2", "K1", "O1"].map(|name| constituents.index_of(name));
    let [Some(m2), Some(s2), Some(k1), Some(o1)] = principals else {
        return false;
    };
    if [m2, s2, k1, o1]
        .iter()
        .any(|&i| reference.amplitudes.get(i).map_or(true, |&a| a <= 0.0))
    {
        return false;
    }

    for (targets, base, first, second) in [
        (&SEMI_DIURNAL, M2_COEFF, m2, s2),
        (&DIURNAL, O1_COEFF, o1, k1),
    ] {
        let base_amplitude = reference.amplitudes[first];
        let (first_epoch, second_epoch) =
            unwrap_epochs(reference.epochs[first], reference.epochs[second]);
        let first_speed = constituents[first].speed();
        let second_speed = constituents[second].speed();
        for &(name, coefficient) in targets {
            let Some(target) = constituents.index_of(name) else {
                continue;
            };
            if reference.amplitudes[target] != 0.0 || reference.epochs[target] != 0.0 {
                continue;
            }
            reference.amplitudes[target] = coefficient / base * base_amplitude;
            let ratio =
                (constituents[target].speed() - first_speed) / (second_speed - first_speed);
            reference.epochs[target] = first_epoch + ratio * (second_epoch - first_epoch);
        }
    }
    true
}

/// Brings an epoch pair within half a turn of each other so the
/// interpolation doesn't cross the 0/360 seam the long way around.
fn unwrap_epochs(first: f64, second: f64) -> (f64, f64) {
    if (second - first).abs() > 180.0 {
        if first < second {
            (first + 360.0, second)
        } else {
            (first, second + 360.0)
        }
    } else {
        (first, second)
    }
}
