//! Band math and byte stretches.
//!
//! Every stretch maps `value` to `clamp(round((value - dmin) / (dmax - dmin) * 255), 0, 255)`.
//! Non-finite samples map to 0, and a band with `dmin == dmax` maps entirely to 0.

use super::{Band, ByteBand, RasterError};

/// Nodata sentinel of the source products.
pub const NODATA: f32 = 0.0;

/// Scale one value into a display byte.
pub fn stretch_value(value: f64, dmin: f64, dmax: f64) -> u8 {
    if !value.is_finite() || !(dmax > dmin) {
        return 0;
    }
    let scaled = ((value - dmin) / (dmax - dmin) * 255.0).round();
    scaled.clamp(0.0, 255.0) as u8
}

/// Stretch a band linearly between `dmin` and `dmax`.
pub fn stretch(band: &Band, dmin: f64, dmax: f64) -> ByteBand {
    ByteBand {
        width: band.width,
        height: band.height,
        data: band
            .data
            .iter()
            .map(|&v| stretch_value(v as f64, dmin, dmax))
            .collect(),
    }
}

/// Percentile of the finite samples, with linear interpolation between
/// closest ranks. Returns `None` for a band without finite samples.
pub fn percentile(values: &[f32], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Stretch between the `p`-th and `(100 - p)`-th percentiles.
pub fn percentile_stretch(band: &Band, p: f64) -> ByteBand {
    match (percentile(&band.data, p), percentile(&band.data, 100.0 - p)) {
        (Some(dmin), Some(dmax)) => stretch(band, dmin, dmax),
        _ => stretch(band, 0.0, 0.0),
    }
}

/// Stretch between the band's exact minimum and maximum.
pub fn minmax_stretch(band: &Band) -> ByteBand {
    let (min, max) = band
        .data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v as f64), hi.max(v as f64))
        });
    stretch(band, min, max)
}

/// Stretch values bounded to `[-1, 1]`.
pub fn fixed_range_stretch(band: &Band) -> ByteBand {
    stretch(band, -1.0, 1.0)
}

fn check_shapes(a: &Band, b: &Band) -> Result<(), RasterError> {
    if a.shape() != b.shape() {
        return Err(RasterError::ShapeMismatch {
            left: a.shape(),
            right: b.shape(),
        });
    }
    Ok(())
}

fn combine(a: &Band, b: &Band, f: impl Fn(f32, f32) -> f32) -> Result<Band, RasterError> {
    check_shapes(a, b)?;
    Ok(Band {
        width: a.width,
        height: a.height,
        data: a.data.iter().zip(&b.data).map(|(&x, &y)| f(x, y)).collect(),
    })
}

/// `num / den`, dividing by 1 where the denominator is zero.
pub fn band_ratio(num: &Band, den: &Band) -> Result<Band, RasterError> {
    combine(num, den, |n, d| n / (d + if d == 0.0 { 1.0 } else { 0.0 }))
}

pub fn band_product(a: &Band, b: &Band) -> Result<Band, RasterError> {
    combine(a, b, |x, y| x * y)
}

/// Absolute difference.
pub fn band_difference(a: &Band, b: &Band) -> Result<Band, RasterError> {
    combine(a, b, |x, y| (x - y).abs())
}

/// `(nir - red) / (nir + red)`; NaN where both are zero.
pub fn normalized_difference(nir: &Band, red: &Band) -> Result<Band, RasterError> {
    combine(nir, red, |n, r| {
        let sum = n as f64 + r as f64;
        if sum == 0.0 {
            f32::NAN
        } else {
            ((n as f64 - r as f64) / sum) as f32
        }
    })
}

/// 1 where the sample holds data, 0 where it equals `nodata` or is NaN.
pub fn validity_mask(band: &Band, nodata: f32) -> ByteBand {
    ByteBand {
        width: band.width,
        height: band.height,
        data: band
            .data
            .iter()
            .map(|&v| u8::from(!(v.is_nan() || v == nodata)))
            .collect(),
    }
}
