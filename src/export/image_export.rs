//! PNG export of raw RGBA frames

use std::path::Path;

/// Errors that can occur during export
#[derive(Debug)]
pub enum ExportError {
    /// Pixel data does not match the stated dimensions
    BufferMismatch { expected: usize, actual: usize },
    /// Failed to save image file
    SaveError(String),
    /// Invalid dimensions
    InvalidDimensions { width: u32, height: u32 },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::BufferMismatch { expected, actual } => {
                write!(
                    f,
                    "Pixel buffer length {} does not match expected {}",
                    actual, expected
                )
            }
            ExportError::SaveError(msg) => write!(f, "Failed to save image: {}", msg),
            ExportError::InvalidDimensions { width, height } => {
                write!(f, "Invalid dimensions: {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for ExportError {}

/// Write tightly packed RGBA8 pixel data to a PNG file.
pub fn export_frame<P: AsRef<Path>>(
    path: P,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<(), ExportError> {
    if width == 0 || height == 0 {
        return Err(ExportError::InvalidDimensions { width, height });
    }

    let expected = (width * height * 4) as usize;
    if data.len() != expected {
        return Err(ExportError::BufferMismatch {
            expected,
            actual: data.len(),
        });
    }

    let buffer: image::ImageBuffer<image::Rgba<u8>, _> =
        image::ImageBuffer::from_raw(width, height, data.to_vec()).ok_or(
            ExportError::BufferMismatch {
                expected,
                actual: data.len(),
            },
        )?;

    buffer
        .save(path.as_ref())
        .map_err(|e| ExportError::SaveError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let pixel = [32u8, 64, 128, 255];
        let data: Vec<u8> = pixel.iter().cycle().take(3 * 2 * 4).copied().collect();

        export_frame(&path, 3, 2, &data).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_invalid_dimensions() {
        let result = export_frame("/tmp/unused.png", 0, 100, &[]);
        assert!(matches!(result, Err(ExportError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_wrong_data_length() {
        let result = export_frame("/tmp/unused.png", 10, 10, &[0u8; 100]);
        assert!(matches!(result, Err(ExportError::BufferMismatch { .. })));
    }
}
