// src/utils/math.rs
//! Numeric helpers shared by the spectral stages

/// `a / b`, or zero when `b` is zero
#[inline]
pub fn div0(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

/// Arithmetic mean; zero for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Piecewise-linear interpolation over `(x, y)` pairs sorted by `x`.
///
/// Values outside the table clamp to the first or last `y`.
pub fn interp(x: f64, table: &[(f64, f64)]) -> f64 {
    let (first, last) = match (table.first(), table.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0.0,
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }

    for pair in table.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            return y0 + (x - x0) * (y1 - y0) / (x1 - x0);
        }
    }
    last.1
}
