//! Image shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Shape of a single image patch in channel-leading layout `(C, H, W)`.
///
/// # Example
///
/// ```rust
/// use histoxai_core::ImageShape;
///
/// let shape = ImageShape::PCAM;
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.pixels(), 96 * 96);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// PatchCamelyon patches: 96×96 RGB.
    pub const PCAM: ImageShape = ImageShape::new(3, 96, 96);

    /// Create a new shape.
    #[must_use]
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Create an ImageShape from a slice of dimensions `[C, H, W]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 3 elements.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        if dims.len() != 3 {
            return Err(CoreError::DimensionError {
                expected: 3,
                got: dims.len(),
            });
        }
        Ok(Self::new(dims[0], dims[1], dims[2]))
    }

    /// Number of color channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Patch height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Patch width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of spatial positions (`H * W`).
    #[must_use]
    pub const fn pixels(&self) -> usize {
        self.height * self.width
    }

    /// Total number of elements (`C * H * W`).
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Convert to an array `[C, H, W]`.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Batched dims `[N, C, H, W]`.
    #[must_use]
    pub const fn batched(&self, batch: usize) -> [usize; 4] {
        [batch, self.channels, self.height, self.width]
    }

    /// Ensure `dims` (a `[C, H, W]` triple) matches this shape.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidShape`] on any mismatch.
    pub fn check(&self, dims: [usize; 3]) -> Result<()> {
        if dims != self.as_array() {
            return Err(CoreError::InvalidShape {
                expected: self.to_string(),
                got: format!("(C={}, H={}, W={})", dims[0], dims[1], dims[2]),
            });
        }
        Ok(())
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::PCAM
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(C={}, H={}, W={})", self.channels, self.height, self.width)
    }
}

impl From<[usize; 3]> for ImageShape {
    fn from([channels, height, width]: [usize; 3]) -> Self {
        Self::new(channels, height, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_creation() {
        let shape = ImageShape::new(3, 96, 64);
        assert_eq!(shape.channels(), 3);
        assert_eq!(shape.height(), 96);
        assert_eq!(shape.width(), 64);
        assert_eq!(shape.batched(8), [8, 3, 96, 64]);
    }

    #[test]
    fn test_shape_from_dims() {
        let shape = ImageShape::from_dims(&[3, 96, 96]).unwrap();
        assert_eq!(shape, ImageShape::PCAM);

        assert!(ImageShape::from_dims(&[3, 96]).is_err());
        assert!(ImageShape::from_dims(&[1, 3, 96, 96]).is_err());
    }

    #[test]
    fn test_shape_check() {
        let shape = ImageShape::PCAM;
        assert!(shape.check([3, 96, 96]).is_ok());
        assert!(shape.check([1, 96, 96]).is_err());
    }

    #[test]
    fn test_shape_is_empty() {
        assert!(!ImageShape::PCAM.is_empty());
        assert!(ImageShape::new(0, 96, 96).is_empty());
        assert!(ImageShape::new(3, 0, 96).is_empty());
    }

    #[test]
    fn test_shape_serialization() {
        let shape = ImageShape::new(3, 32, 32);
        let json = serde_json::to_string(&shape).unwrap();
        let restored: ImageShape = serde_json::from_str(&json).unwrap();
        assert_eq!(shape, restored);
    }
}
