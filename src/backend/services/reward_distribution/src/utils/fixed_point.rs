//! Integer arithmetic for ledger-bound amounts.
//!
//! Dimensionless coefficients are quantized to `precision` (e.g. 1e9) before
//! they touch token amounts; all products are then computed on `u128`.

/// Quantize a coefficient in `0..=1` to a fixed-point integer.
pub fn quantize_unit(value: f64, precision: u128) -> u128 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    quantize(value.min(1.0), precision)
}

/// Quantize a non-negative rate that may exceed one.
pub fn quantize(value: f64, precision: u128) -> u128 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value * precision as f64).round() as u128
}

/// `a * b / d`, rounded down, without overflowing on large intermediate
/// products. Division by zero yields zero.
pub fn mul_div(a: u128, b: u128, d: u128) -> u128 {
    if d == 0 {
        return 0;
    }
    match a.checked_mul(b) {
        Some(product) => product / d,
        None => {
            // a*b/d == qa*b + ra*qb + ra*rb/d
            let (qa, ra) = (a / d, a % d);
            let (qb, rb) = (b / d, b % d);
            qa.saturating_mul(b)
                .saturating_add(ra.saturating_mul(qb))
                .saturating_add(ra.saturating_mul(rb) / d)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: u128 = 1_000_000_000;

    #[test]
    fn unit_quantization_clamps() {
        assert_eq!(quantize_unit(1.5, P), P);
        assert_eq!(quantize_unit(-0.1, P), 0);
        assert_eq!(quantize_unit(f64::NAN, P), 0);
        assert_eq!(quantize_unit(0.25, P), 250_000_000);
    }

    #[test]
    fn mul_div_handles_overflowing_products() {
        assert_eq!(mul_div(10, 3, 4), 7);
        assert_eq!(mul_div(5, 5, 0), 0);

        let big = u128::MAX / 2;
        assert_eq!(mul_div(big, P, P), big);
    }
}
