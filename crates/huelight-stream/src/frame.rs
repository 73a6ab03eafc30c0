//! Frames crossing the producer → worker → sink boundary.

use huelight_pipeline::{FrameError, FrameOutput, PixelBuffer, PixelFormat};

/// A frame as delivered by a capture source, not yet validated.
///
/// Capture callbacks hand over whatever layout the device produced;
/// validation happens on the worker thread so a malformed frame costs
/// the producer nothing and is simply skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row length in bytes, including padding.
    pub stride: usize,
    /// Channel layout.
    pub format: PixelFormat,
    /// Frame bytes.
    pub data: Vec<u8>,
}

impl RawFrame {
    /// A tightly packed frame (`stride == width * 4`).
    #[must_use]
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width as usize * huelight_pipeline::types::BYTES_PER_PIXEL,
            format,
            data,
        }
    }

    /// Validate the layout.
    ///
    /// # Errors
    ///
    /// Returns the layout errors of [`PixelBuffer::new`].
    pub fn into_pixel_buffer(self) -> Result<PixelBuffer, FrameError> {
        PixelBuffer::new(self.width, self.height, self.stride, self.format, self.data)
    }
}

impl From<PixelBuffer> for RawFrame {
    fn from(buffer: PixelBuffer) -> Self {
        Self {
            width: buffer.width(),
            height: buffer.height(),
            stride: buffer.stride(),
            format: buffer.format(),
            data: buffer.into_raw(),
        }
    }
}

/// A processed frame on its way to presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedFrame {
    /// Submission sequence number. Numbers of dropped or skipped frames
    /// never reach the sink, so gaps mark frames that were lost.
    pub sequence: u64,
    /// Pipeline output for the frame.
    pub output: FrameOutput,
}

/// Presentation side of the stream.
///
/// Called on the worker thread at most once per processed frame; each
/// call supersedes the previously presented frame.
pub trait FrameSink: Send + 'static {
    /// Display (or otherwise consume) a processed frame.
    fn present(&mut self, frame: PresentedFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(PresentedFrame) + Send + 'static,
{
    fn present(&mut self, frame: PresentedFrame) {
        self(frame);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn packed_frame_has_canonical_stride() {
        let frame = RawFrame::packed(3, 2, PixelFormat::Bgra8, vec![0; 24]);
        assert_eq!(frame.stride, 12);
        assert!(frame.into_pixel_buffer().is_ok());
    }

    #[test]
    fn malformed_frame_fails_validation() {
        let frame = RawFrame {
            width: 4,
            height: 4,
            stride: 8,
            format: PixelFormat::Rgba8,
            data: vec![0; 64],
        };
        assert_eq!(
            frame.into_pixel_buffer().unwrap_err(),
            FrameError::StrideTooSmall { stride: 8, min: 16 }
        );
    }

    #[test]
    fn pixel_buffer_converts_back_losslessly() {
        let buffer = PixelBuffer::new(1, 2, 8, PixelFormat::Rgba8, vec![1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8])
            .unwrap();
        let raw = RawFrame::from(buffer.clone());
        assert_eq!(raw.stride, 8);
        assert_eq!(raw.into_pixel_buffer().unwrap(), buffer);
    }
}
