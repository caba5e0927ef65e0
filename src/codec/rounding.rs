//! Fixed-precision decimal rounding
//!
//! Both value encodings keep [`PRECISION`] fractional digits and round half
//! away from zero. Rounding works on the shortest decimal representation of
//! the float, so `1.234565` rounds up to `1.23457` even though its binary
//! value sits a hair below the midpoint.

/// Fractional digits kept for every stored metric field
pub const PRECISION: usize = 5;

/// Decimal digits of a rounded magnitude; the last `places` are fractional
struct Rounded {
    negative: bool,
    digits: Vec<u8>,
}

fn round_half_away(x: f64, places: usize) -> Rounded {
    let repr = format!("{}", x.abs());
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    let frac = frac_part.as_bytes();

    let mut digits: Vec<u8> = int_part.bytes().map(|b| b - b'0').collect();
    digits.extend((0..places).map(|i| frac.get(i).map_or(0, |b| b - b'0')));

    if frac.get(places).is_some_and(|&b| b >= b'5') {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, 1);
                break;
            }
            i -= 1;
            if digits[i] == 9 {
                digits[i] = 0;
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    // "-0.00000" is never produced
    let negative = x.is_sign_negative() && digits.iter().any(|&d| d != 0);
    Rounded { negative, digits }
}

/// Format a finite float with exactly `places` fractional digits
pub fn to_fixed(x: f64, places: usize) -> String {
    let rounded = round_half_away(x, places);
    let split = rounded.digits.len() - places;

    let mut s = String::with_capacity(rounded.digits.len() + 2);
    if rounded.negative {
        s.push('-');
    }
    s.extend(rounded.digits[..split].iter().map(|&d| char::from(b'0' + d)));
    if places > 0 {
        s.push('.');
        s.extend(rounded.digits[split..].iter().map(|&d| char::from(b'0' + d)));
    }
    s
}

/// Round a finite float and scale it to an integer count of `10^-places`
///
/// Returns `None` when the scaled value does not fit in an `i64`.
pub fn to_scaled(x: f64, places: usize) -> Option<i64> {
    let rounded = round_half_away(x, places);
    let magnitude = rounded
        .digits
        .iter()
        .try_fold(0i64, |acc, &d| acc.checked_mul(10)?.checked_add(i64::from(d)))?;
    Some(if rounded.negative { -magnitude } else { magnitude })
}

/// Inverse of [`to_scaled`]
pub fn from_scaled(n: i64, places: usize) -> f64 {
    n as f64 / 10f64.powi(places as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fixed_pads_fraction() {
        assert_eq!(to_fixed(0.0, 5), "0.00000");
        assert_eq!(to_fixed(2.0, 5), "2.00000");
        assert_eq!(to_fixed(12.5, 5), "12.50000");
    }

    #[test]
    fn test_to_fixed_rounds_half_away_from_zero() {
        assert_eq!(to_fixed(1.234565, 5), "1.23457");
        assert_eq!(to_fixed(-1.234565, 5), "-1.23457");
        assert_eq!(to_fixed(1.234564, 5), "1.23456");
        assert_eq!(to_fixed(0.000005, 5), "0.00001");
    }

    #[test]
    fn test_to_fixed_carries_into_integer_part() {
        assert_eq!(to_fixed(9.999995, 5), "10.00000");
        assert_eq!(to_fixed(-99.999999, 5), "-100.00000");
    }

    #[test]
    fn test_to_fixed_drops_sign_of_rounded_zero() {
        assert_eq!(to_fixed(-0.000001, 5), "0.00000");
        assert_eq!(to_fixed(-0.0, 5), "0.00000");
    }

    #[test]
    fn test_to_scaled() {
        assert_eq!(to_scaled(1.234565, 5), Some(123_457));
        assert_eq!(to_scaled(-2.5, 5), Some(-250_000));
        assert_eq!(to_scaled(0.0, 5), Some(0));
        assert_eq!(to_scaled(1e300, 5), None);
    }

    #[test]
    fn test_from_scaled_matches_decimal_literal() {
        assert_eq!(from_scaled(123_457, 5), 1.23457);
        assert_eq!(from_scaled(-250_000, 5), -2.5);
    }
}
