//! Raw capture buffer to grayscale conversion.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
}

/// Extract the luma channel from packed YUYV 4:2:2 (2 bytes per pixel,
/// Y at even offsets).
pub fn yuyv_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if buf.len() < expected {
        return Err(ConvertError::ShortBuffer {
            expected,
            actual: buf.len(),
        });
    }
    Ok(buf[..expected].iter().step_by(2).copied().collect())
}

/// Trim an 8-bit grayscale buffer to the frame size. Drivers may pad the
/// buffer past `width * height`.
pub fn grey_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let pixels = (width * height) as usize;
    if buf.len() < pixels {
        return Err(ConvertError::ShortBuffer {
            expected: pixels,
            actual: buf.len(),
        });
    }
    Ok(buf[..pixels].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_extracts_luma() {
        // Two pixels: Y0 U0 Y1 V0.
        let buf = [10u8, 128, 20, 128];
        assert_eq!(yuyv_to_grayscale(&buf, 2, 1).unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_yuyv_full_frame() {
        let mut buf = Vec::new();
        for y in 0..8u8 {
            buf.push(y * 10);
            buf.push(128);
        }
        let gray = yuyv_to_grayscale(&buf, 4, 2).unwrap();
        assert_eq!(gray, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn test_yuyv_rejects_short_buffer() {
        let buf = [10u8, 128, 20];
        let err = yuyv_to_grayscale(&buf, 2, 1).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::ShortBuffer {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_grey_trims_padding() {
        let buf = [1u8, 2, 3, 4, 0xff, 0xff];
        assert_eq!(grey_to_grayscale(&buf, 2, 2).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_grey_rejects_short_buffer() {
        let buf = [1u8, 2, 3];
        assert!(grey_to_grayscale(&buf, 2, 2).is_err());
    }
}
