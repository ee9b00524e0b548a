//! Geographic box to pixel window conversion.
//!
//! The box is reprojected along densified edges into the dataset CRS, mapped
//! through the inverse geotransform, rounded to whole pixels and finally
//! intersected with the dataset extent so a read never leaves
//! `[0, width) x [0, height)`.

use crate::catalog::BoundingBox;

use super::projection::{CoordinateTransform, EpsgTransform, WGS84};
use super::{DatasetInfo, GeoTransform, PixelWindow, RasterError};

/// Interpolated points per box edge when reprojecting bounds.
pub const DENSIFY_POINTS: usize = 21;

/// Axis-aligned bounds `(min_x, min_y, max_x, max_y)`.
pub type Bounds = (f64, f64, f64, f64);

/// Window in fractional pixel units, possibly outside the dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatWindow {
    pub col_off: f64,
    pub row_off: f64,
    pub width: f64,
    pub height: f64,
}

/// Reproject `bbox` and return the bounds of the reprojected outline.
pub fn transform_bounds(
    bbox: &BoundingBox,
    transform: &dyn CoordinateTransform,
    densify: usize,
) -> Result<Bounds, RasterError> {
    let steps = densify + 1;
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    let dx = bbox.east - bbox.west;
    let dy = bbox.north - bbox.south;

    for i in 0..=steps {
        let f = i as f64 / steps as f64;
        let x = bbox.west + f * dx;
        let y = bbox.south + f * dy;
        let edge_points = [
            (x, bbox.south),
            (x, bbox.north),
            (bbox.west, y),
            (bbox.east, y),
        ];
        for (px, py) in edge_points {
            let (tx, ty) = transform.transform(px, py)?;
            min_x = min_x.min(tx);
            min_y = min_y.min(ty);
            max_x = max_x.max(tx);
            max_y = max_y.max(ty);
        }
    }

    Ok((min_x, min_y, max_x, max_y))
}

/// Fractional window covering `bounds` on the grid described by `transform`.
pub fn window_from_bounds(bounds: Bounds, transform: &GeoTransform) -> Result<FloatWindow, RasterError> {
    let (left, bottom, right, top) = bounds;
    let inverse = transform.invert()?;

    let corners = [(left, top), (right, top), (right, bottom), (left, bottom)];
    let mut col_min = f64::INFINITY;
    let mut col_max = f64::NEG_INFINITY;
    let mut row_min = f64::INFINITY;
    let mut row_max = f64::NEG_INFINITY;
    for (x, y) in corners {
        let (col, row) = inverse.apply(x, y);
        col_min = col_min.min(col);
        col_max = col_max.max(col);
        row_min = row_min.min(row);
        row_max = row_max.max(row);
    }

    Ok(FloatWindow {
        col_off: col_min,
        row_off: row_min,
        width: col_max - col_min,
        height: row_max - row_min,
    })
}

/// Round offsets down (with a small tolerance) and lengths to nearest.
pub fn round_window(window: &FloatWindow) -> (i64, i64, i64, i64) {
    (
        (window.col_off + 0.001).floor() as i64,
        (window.row_off + 0.001).floor() as i64,
        (window.width + 0.5).floor() as i64,
        (window.height + 0.5).floor() as i64,
    )
}

/// Intersect an integer window with `[0, width) x [0, height)`.
pub fn clip_window(
    (col, row, w, h): (i64, i64, i64, i64),
    width: usize,
    height: usize,
) -> PixelWindow {
    let clip_axis = |off: i64, len: i64, size: usize| -> (usize, usize) {
        let size = size as i64;
        let start = off.clamp(0, size);
        let stop = off.saturating_add(len.max(0)).clamp(0, size);
        (start as usize, (stop - start).max(0) as usize)
    };
    let (col_off, win_width) = clip_axis(col, w, width);
    let (row_off, win_height) = clip_axis(row, h, height);

    PixelWindow {
        col_off,
        row_off,
        width: win_width,
        height: win_height,
    }
}

/// Pixel window of `dataset` covering the WGS84 box `bbox`.
///
/// Datasets without a known EPSG code are assumed to be in WGS84.
pub fn compute_window(bbox: &BoundingBox, dataset: &DatasetInfo) -> Result<PixelWindow, RasterError> {
    let transform = EpsgTransform::new(WGS84, dataset.epsg.unwrap_or(WGS84))?;
    let bounds = transform_bounds(bbox, &transform, DENSIFY_POINTS)?;
    let window = window_from_bounds(bounds, &dataset.transform)?;
    Ok(clip_window(
        round_window(&window),
        dataset.width,
        dataset.height,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(width: usize, height: usize, transform: GeoTransform, epsg: u32) -> DatasetInfo {
        DatasetInfo {
            source: "test".to_string(),
            width,
            height,
            band_count: 1,
            transform,
            epsg: Some(epsg),
        }
    }

    #[test]
    fn test_window_inside_dataset() {
        let ds = dataset(200, 200, GeoTransform::north_up(10.0, 46.0, 0.01, 0.01), WGS84);
        let bbox: BoundingBox = "10.5,45.5,10.75,45.75".parse().unwrap();
        let w = compute_window(&bbox, &ds).unwrap();
        assert_eq!(
            w,
            PixelWindow {
                col_off: 50,
                row_off: 25,
                width: 25,
                height: 25
            }
        );
    }

    #[test]
    fn test_window_clipped_at_edge() {
        let ds = dataset(100, 100, GeoTransform::north_up(10.5, 46.0, 0.01, 0.01), WGS84);
        let bbox: BoundingBox = "10,45,11,46".parse().unwrap();
        let w = compute_window(&bbox, &ds).unwrap();
        assert_eq!(w.col_off, 0);
        assert_eq!(w.width, 50);
        assert_eq!(w.row_off, 0);
        assert_eq!(w.height, 100);
    }

    #[test]
    fn test_window_disjoint_is_empty() {
        let ds = dataset(100, 100, GeoTransform::north_up(20.0, 46.0, 0.01, 0.01), WGS84);
        let bbox: BoundingBox = "10,45,11,46".parse().unwrap();
        let w = compute_window(&bbox, &ds).unwrap();
        assert!(w.is_empty());
        assert!(w.col_off <= 100);
    }

    #[test]
    fn test_rounding_tolerance() {
        let fw = FloatWindow {
            col_off: 9.9995,
            row_off: -0.4,
            width: 10.49,
            height: 10.5,
        };
        assert_eq!(round_window(&fw), (10, -1, 10, 11));
    }

    #[test]
    fn test_clip_always_within_bounds() {
        let sizes = [(1usize, 1usize), (7, 3), (100, 250), (10980, 10980)];
        let offsets = [-100_000i64, -5, 0, 3, 99, 10_979, 50_000];
        let lengths = [-4i64, 0, 1, 10, 500, 100_000];
        for &(width, height) in &sizes {
            for &off in &offsets {
                for &len in &lengths {
                    let w = clip_window((off, off / 2, len, len * 2), width, height);
                    assert!(w.col_off + w.width <= width);
                    assert!(w.row_off + w.height <= height);
                }
            }
        }
    }

    #[test]
    fn test_utm_window_is_densified() {
        // 10980 x 10980 S2 tile in UTM 32N
        let ds = dataset(
            10980,
            10980,
            GeoTransform::north_up(600000.0, 5100000.0, 10.0, 10.0),
            32632,
        );
        let bbox: BoundingBox = "10.5,45.5,11.0,45.8".parse().unwrap();
        let w = compute_window(&bbox, &ds).unwrap();
        assert!(!w.is_empty());
        assert!(w.col_off + w.width <= 10980);
        assert!(w.row_off + w.height <= 10980);
        // roughly 39 km x 33 km at 10 m
        assert!(w.width > 3500 && w.width < 4500);
        assert!(w.height > 3000 && w.height < 3800);
    }
}
