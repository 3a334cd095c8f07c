//! Rectangular sensor regions
//!
//! Bounds are inclusive sensor coordinates. Differences between two regions are
//! plain `[i64; 4]` vectors ordered `[left, top, right, bottom]`; they are used
//! for alignment math only and never turned back into a [`Roi`] implicitly.

use std::fmt;
use std::str::FromStr;

use crate::memory_correction::common::error::{CorrectionError, Result};

/// Region of interest with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Roi {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Roi {
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build from floating-point bounds, e.g. values read out of a settings file.
    ///
    /// Fails if any bound is non-finite or has a fractional part, or if the
    /// region is wider or taller than `i64` can express.
    pub fn from_f64_bounds(bounds: [f64; 4]) -> Result<Self> {
        let mut ints = [0i64; 4];
        for (out, &b) in ints.iter_mut().zip(bounds.iter()) {
            if !b.is_finite() {
                return Err(CorrectionError::InvalidRoi(format!(
                    "bound {b} is not finite in {bounds:?}"
                )));
            }
            if b.fract() != 0.0 || b.abs() >= i64::MAX as f64 {
                return Err(CorrectionError::InvalidRoi(format!(
                    "bound {b} is not an integer in {bounds:?}"
                )));
            }
            *out = b as i64;
        }
        let [left, top, right, bottom] = ints;
        if right.checked_sub(left).is_none() || bottom.checked_sub(top).is_none() {
            return Err(CorrectionError::InvalidRoi(format!(
                "extent of {bounds:?} overflows"
            )));
        }
        Ok(Self::new(left, top, right, bottom))
    }

    pub fn width(&self) -> usize {
        (self.right.abs_diff(self.left) as usize).saturating_add(1)
    }

    pub fn height(&self) -> usize {
        (self.bottom.abs_diff(self.top) as usize).saturating_add(1)
    }

    /// `(height, width)`, the shape of a 2D map covering this region.
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn bounds(&self) -> [i64; 4] {
        [self.left, self.top, self.right, self.bottom]
    }

    /// Same region with `left <= right` and `top <= bottom`.
    pub fn normalized(&self) -> Roi {
        Roi::new(
            self.left.min(self.right),
            self.top.min(self.bottom),
            self.left.max(self.right),
            self.top.max(self.bottom),
        )
    }

    /// Whether `other` lies entirely inside this region.
    pub fn contains(&self, other: &Roi) -> bool {
        let outer = self.normalized();
        let inner = other.normalized();
        inner.left >= outer.left
            && inner.right <= outer.right
            && inner.top >= outer.top
            && inner.bottom <= outer.bottom
    }

    /// Component-wise `self + other`.
    pub fn add(&self, other: impl Into<[i64; 4]>) -> [i64; 4] {
        let o = other.into();
        let s = self.bounds();
        [s[0] + o[0], s[1] + o[1], s[2] + o[2], s[3] + o[3]]
    }

    /// Component-wise `self - other`.
    pub fn sub(&self, other: impl Into<[i64; 4]>) -> [i64; 4] {
        let o = other.into();
        let s = self.bounds();
        [s[0] - o[0], s[1] - o[1], s[2] - o[2], s[3] - o[3]]
    }
}

impl From<Roi> for [i64; 4] {
    fn from(roi: Roi) -> Self {
        roi.bounds()
    }
}

impl From<&Roi> for [i64; 4] {
    fn from(roi: &Roi) -> Self {
        roi.bounds()
    }
}

/// Offset of `a` relative to `b`, component-wise `a - b`.
pub fn offset_between(a: &Roi, b: &Roi) -> [i64; 4] {
    a.sub(b)
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}] ({}x{})",
            self.left,
            self.top,
            self.right,
            self.bottom,
            self.width(),
            self.height()
        )
    }
}

/// Parses `"left,top,right,bottom"`; whitespace around each bound is ignored.
impl FromStr for Roi {
    type Err = CorrectionError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(CorrectionError::InvalidRoi(format!(
                "expected 4 comma-separated bounds, got {:?}",
                s
            )));
        }
        let mut bounds = [0f64; 4];
        for (out, part) in bounds.iter_mut().zip(parts) {
            *out = part
                .parse::<f64>()
                .map_err(|e| CorrectionError::InvalidRoi(format!("{part:?}: {e}")))?;
        }
        Self::from_f64_bounds(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_height_inclusive() {
        let roi = Roi::new(1, 1, 2048, 1024);
        assert_eq!(roi.width(), 2048);
        assert_eq!(roi.height(), 1024);
        assert_eq!(roi.shape(), (1024, 2048));

        let single = Roi::new(5, 7, 5, 7);
        assert_eq!(single.shape(), (1, 1));
    }

    #[test]
    fn test_reversed_bounds_use_absolute_extent() {
        let roi = Roi::new(10, 20, 1, 2);
        assert_eq!(roi.width(), 10);
        assert_eq!(roi.height(), 19);
    }

    #[test]
    fn test_offset_arithmetic() {
        let cal = Roi::new(1, 1, 100, 100);
        let data = Roi::new(11, 21, 60, 80);
        assert_eq!(data.sub(cal), [10, 20, -40, -20]);
        assert_eq!(offset_between(&data, &cal), [10, 20, -40, -20]);
        assert_eq!(data.add([1, 1, 1, 1]), [12, 22, 61, 81]);
        assert_eq!(cal.add(&data), [12, 22, 160, 180]);
    }

    #[test]
    fn test_contains() {
        let cal = Roi::new(1, 1, 100, 100);
        assert!(cal.contains(&Roi::new(1, 1, 100, 100)));
        assert!(cal.contains(&Roi::new(20, 30, 40, 50)));
        assert!(!cal.contains(&Roi::new(0, 30, 40, 50)));
        assert!(!cal.contains(&Roi::new(20, 30, 40, 101)));
    }

    #[test]
    fn test_from_f64_bounds_rejects_non_finite() {
        assert!(Roi::from_f64_bounds([0.0, 0.0, f64::NAN, 4.0]).is_err());
        assert!(Roi::from_f64_bounds([0.0, f64::INFINITY, 3.0, 4.0]).is_err());
        assert!(Roi::from_f64_bounds([0.0, 0.5, 3.0, 4.0]).is_err());
        assert_eq!(
            Roi::from_f64_bounds([1.0, 2.0, 3.0, 4.0]).unwrap(),
            Roi::new(1, 2, 3, 4)
        );
    }

    #[test]
    fn test_overflowing_extent_rejected() {
        let err = "-9e18,0,9e18,0".parse::<Roi>().unwrap_err();
        assert!(matches!(err, CorrectionError::InvalidRoi(_)));
        assert!(Roi::from_f64_bounds([0.0, 9e18, 0.0, -9e18]).is_err());
        assert!(Roi::from_f64_bounds([0.0, 0.0, 9.3e18, 0.0]).is_err());

        // Unvalidated extremes still report a size instead of overflowing.
        let wide = Roi::new(i64::MIN, 0, i64::MAX, 0);
        assert_eq!(wide.height(), 1);
        assert!(wide.width() > 0);
    }

    #[test]
    fn test_parse() {
        let roi: Roi = " 513, 769 ,1536,1280".parse().unwrap();
        assert_eq!(roi, Roi::new(513, 769, 1536, 1280));
        assert!("1,2,3".parse::<Roi>().is_err());
        assert!("1,2,x,4".parse::<Roi>().is_err());
    }
}
