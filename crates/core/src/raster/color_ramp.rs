//! Color ramps for rendering single-band float outputs.

use std::fmt::Write as _;

use super::RasterError;

/// One ramp entry: values at `value` render as `rgb`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub value: f64,
    pub rgb: [u8; 3],
}

/// Piecewise-linear color ramp, compatible with `gdaldem color-relief` files.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
}

impl ColorRamp {
    /// Build a ramp; stops are sorted by value.
    pub fn new(mut stops: Vec<ColorStop>) -> Result<Self, RasterError> {
        if stops.is_empty() {
            return Err(RasterError::Parse("color ramp has no stops".to_string()));
        }
        if stops.iter().any(|s| !s.value.is_finite()) {
            return Err(RasterError::Parse("color ramp stop is not finite".to_string()));
        }
        stops.sort_by(|a, b| a.value.total_cmp(&b.value));
        Ok(Self { stops })
    }

    /// Brown-to-green vegetation index ramp over `[-1, 1]`.
    pub fn vegetation_index() -> Self {
        let stop = |value, r, g, b| ColorStop {
            value,
            rgb: [r, g, b],
        };
        Self {
            stops: vec![
                stop(-1.0, 12, 12, 12),
                stop(-0.2, 191, 191, 191),
                stop(0.0, 219, 219, 219),
                stop(0.1, 234, 214, 160),
                stop(0.2, 204, 199, 130),
                stop(0.3, 145, 191, 82),
                stop(0.4, 112, 163, 64),
                stop(0.5, 79, 137, 45),
                stop(0.6, 48, 109, 28),
                stop(0.8, 15, 84, 10),
                stop(1.0, 0, 68, 0),
            ],
        }
    }

    /// Parse a `gdaldem` color file (`value r g b` per line, `nv` lines and
    /// `#` comments ignored).
    pub fn from_gdaldem_text(text: &str) -> Result<Self, RasterError> {
        let mut stops = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|f| !f.is_empty())
                .collect();
            if fields[0].eq_ignore_ascii_case("nv") {
                continue;
            }
            if fields.len() < 4 {
                return Err(RasterError::Parse(format!("bad color ramp line: {}", line)));
            }
            let value: f64 = fields[0]
                .parse()
                .map_err(|_| RasterError::Parse(format!("bad ramp value: {}", fields[0])))?;
            let mut rgb = [0u8; 3];
            for (slot, field) in rgb.iter_mut().zip(&fields[1..4]) {
                *slot = field
                    .parse()
                    .map_err(|_| RasterError::Parse(format!("bad ramp color: {}", field)))?;
            }
            stops.push(ColorStop { value, rgb });
        }
        Self::new(stops)
    }

    /// Render in `gdaldem color-relief` format, with nodata fully transparent.
    pub fn to_gdaldem_text(&self) -> String {
        let mut out = String::new();
        for stop in &self.stops {
            let _ = writeln!(
                out,
                "{} {} {} {}",
                stop.value, stop.rgb[0], stop.rgb[1], stop.rgb[2]
            );
        }
        out.push_str("nv 0 0 0 0\n");
        out
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Color of a value, linearly interpolated and clamped to the end stops.
    /// Non-finite values have no color.
    pub fn color_at(&self, value: f64) -> Option<[u8; 3]> {
        if !value.is_finite() {
            return None;
        }
        let first = self.stops.first()?;
        let last = self.stops.last()?;
        if value <= first.value {
            return Some(first.rgb);
        }
        if value >= last.value {
            return Some(last.rgb);
        }
        let upper = self.stops.iter().position(|s| s.value >= value)?;
        let hi = self.stops[upper];
        let lo = self.stops[upper - 1];
        let t = (value - lo.value) / (hi.value - lo.value);
        let mut rgb = [0u8; 3];
        for i in 0..3 {
            let c = lo.rgb[i] as f64 + (hi.rgb[i] as f64 - lo.rgb[i] as f64) * t;
            rgb[i] = c.round().clamp(0.0, 255.0) as u8;
        }
        Some(rgb)
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self::vegetation_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_at_interpolates() {
        let ramp = ColorRamp::new(vec![
            ColorStop {
                value: 0.0,
                rgb: [0, 0, 0],
            },
            ColorStop {
                value: 1.0,
                rgb: [200, 100, 50],
            },
        ])
        .unwrap();
        assert_eq!(ramp.color_at(0.5), Some([100, 50, 25]));
        assert_eq!(ramp.color_at(-3.0), Some([0, 0, 0]));
        assert_eq!(ramp.color_at(9.0), Some([200, 100, 50]));
        assert_eq!(ramp.color_at(f64::NAN), None);
    }

    #[test]
    fn test_gdaldem_text_round_trip() {
        let ramp = ColorRamp::vegetation_index();
        let text = ramp.to_gdaldem_text();
        assert!(text.ends_with("nv 0 0 0 0\n"));
        let parsed = ColorRamp::from_gdaldem_text(&text).unwrap();
        assert_eq!(parsed, ramp);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ColorRamp::from_gdaldem_text("").is_err());
        assert!(ColorRamp::from_gdaldem_text("0.5 12 x 3").is_err());
        assert!(ColorRamp::from_gdaldem_text("0.5 12").is_err());
    }

    #[test]
    fn test_parse_unsorted_and_commented() {
        let ramp = ColorRamp::from_gdaldem_text("# ndvi\n1 0 255 0\n-1,255,0,0\nnv 0 0 0 0\n").unwrap();
        assert_eq!(ramp.stops()[0].value, -1.0);
        assert_eq!(ramp.stops()[1].rgb, [0, 255, 0]);
    }
}
