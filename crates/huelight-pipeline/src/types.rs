//! Shared types for the huelight highlighting pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can hand decoded images
/// to the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// Bytes per pixel for every supported [`PixelFormat`].
pub const BYTES_PER_PIXEL: usize = 4;

/// Channel layout of a 4-byte, 8-bit-per-channel pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Red, green, blue, alpha.
    #[default]
    Rgba8,
    /// Blue, green, red, alpha (the usual camera capture layout).
    Bgra8,
}

impl PixelFormat {
    /// Byte offsets of the red, green and blue channels within a pixel.
    #[must_use]
    pub const fn rgb_offsets(self) -> [usize; 3] {
        match self {
            Self::Rgba8 => [0, 1, 2],
            Self::Bgra8 => [2, 1, 0],
        }
    }

    /// Byte offset of the alpha channel within a pixel.
    #[must_use]
    pub const fn alpha_offset(self) -> usize {
        3
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Tightly packed row length in bytes for a 4-byte pixel format.
    #[must_use]
    pub const fn canonical_stride(self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }
}

/// A single captured video frame.
///
/// Rows may be padded (`stride > width * 4`); padding bytes are never
/// read. The pipeline treats a `PixelBuffer` as read-only and always
/// produces fresh buffers for its outputs.
///
/// All constructors validate the layout, so every live `PixelBuffer`
/// satisfies `stride >= width * 4` and holds enough bytes for its last
/// row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    dimensions: Dimensions,
    stride: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw frame bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::EmptyFrame`] if either dimension is zero,
    /// [`FrameError::StrideTooSmall`] if a row cannot hold `width`
    /// pixels, and [`FrameError::BufferTooShort`] if `data` ends before
    /// the last pixel of the last row.
    pub fn new(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let dimensions = Dimensions { width, height };
        check_layout(dimensions, stride, data.len())?;
        Ok(Self {
            dimensions,
            stride,
            format,
            data,
        })
    }

    /// Wrap tightly packed frame bytes (`stride == width * 4`).
    ///
    /// # Errors
    ///
    /// Same as [`PixelBuffer::new`].
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        let stride = Dimensions { width, height }.canonical_stride();
        Self::new(width, height, stride, format, data)
    }

    /// Build a packed RGBA frame from a decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::EmptyFrame`] for a zero-sized image.
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self, FrameError> {
        let (width, height) = image.dimensions();
        Self::packed(width, height, PixelFormat::Rgba8, image.into_raw())
    }

    /// Convert to an RGBA image (channels reordered to RGBA, padding
    /// dropped).
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        let [r, g, b] = self.format.rgb_offsets();
        let a = self.format.alpha_offset();
        RgbaImage::from_fn(self.dimensions.width, self.dimensions.height, |x, y| {
            let px = self.pixel(x as usize, y as usize);
            image::Rgba([px[r], px[g], px[b], px[a]])
        })
    }

    /// Frame dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Row length in bytes, including any padding.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Channel layout.
    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns `true` if rows carry no padding.
    #[must_use]
    pub const fn is_packed(&self) -> bool {
        self.stride == self.dimensions.canonical_stride()
    }

    /// The raw backing bytes, padding included.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its backing bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Pixel bytes of row `y`, padding excluded.
    ///
    /// `y` must be below [`height`](Self::height).
    #[must_use]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.dimensions.canonical_stride()]
    }

    /// The four bytes of pixel `(x, y)` in storage order.
    ///
    /// `(x, y)` must lie inside the frame.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = y * self.stride + x * BYTES_PER_PIXEL;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Bounds-checked variant of [`pixel`](Self::pixel).
    #[must_use]
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.dimensions.width as usize || y >= self.dimensions.height as usize {
            return None;
        }
        let i = y * self.stride + x * BYTES_PER_PIXEL;
        self.data
            .get(i..i + BYTES_PER_PIXEL)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    /// Re-check the layout invariants.
    ///
    /// # Errors
    ///
    /// Same conditions as [`PixelBuffer::new`].
    pub fn validate(&self) -> Result<(), FrameError> {
        check_layout(self.dimensions, self.stride, self.data.len())
    }

    /// Copy into a buffer with canonical stride.
    ///
    /// Packed buffers are cloned byte-for-byte.
    #[must_use]
    pub fn repack(&self) -> Self {
        if self.is_packed() {
            return self.clone();
        }
        let row_len = self.dimensions.canonical_stride();
        let mut data = Vec::with_capacity(row_len * self.dimensions.height as usize);
        for y in 0..self.dimensions.height as usize {
            data.extend_from_slice(self.row(y));
        }
        Self {
            dimensions: self.dimensions,
            stride: row_len,
            format: self.format,
            data,
        }
    }

    /// Assemble a packed buffer from bytes the pipeline produced itself.
    pub(crate) const fn from_packed_parts(
        dimensions: Dimensions,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            dimensions,
            stride: dimensions.canonical_stride(),
            format,
            data,
        }
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = FrameError;

    fn try_from(image: RgbaImage) -> Result<Self, Self::Error> {
        Self::from_rgba_image(image)
    }
}

fn check_layout(dimensions: Dimensions, stride: usize, len: usize) -> Result<(), FrameError> {
    if dimensions.is_empty() {
        return Err(FrameError::EmptyFrame { dimensions });
    }
    let min = dimensions.canonical_stride();
    if stride < min {
        return Err(FrameError::StrideTooSmall { stride, min });
    }
    // A stride too large to address reports as an unsatisfiable length.
    let required = stride
        .checked_mul(dimensions.height as usize - 1)
        .and_then(|n| n.checked_add(min))
        .unwrap_or(usize::MAX);
    if len < required {
        return Err(FrameError::BufferTooShort { len, required });
    }
    Ok(())
}

/// Single-channel selection mask, one byte per pixel, tightly packed.
///
/// `0` keeps the background, `255` takes the foreground, and anything in
/// between blends proportionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskBuffer {
    dimensions: Dimensions,
    data: Vec<u8>,
}

impl MaskBuffer {
    /// An all-zero mask (pure background).
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        let len = usize::try_from(dimensions.pixel_count()).unwrap_or(0);
        Self {
            dimensions,
            data: vec![0; len],
        }
    }

    /// Wrap raw mask bytes, returning `None` if the length does not
    /// equal `width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let dimensions = Dimensions { width, height };
        (u64::try_from(data.len()).ok() == Some(dimensions.pixel_count()))
            .then_some(Self { dimensions, data })
    }

    /// Assemble a mask from `width * height` bytes the pipeline produced
    /// itself.
    pub(crate) const fn from_packed_parts(dimensions: Dimensions, data: Vec<u8>) -> Self {
        Self { dimensions, data }
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Mask value at `(x, y)`.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.dimensions.width || y >= self.dimensions.height {
            return None;
        }
        let i = y as usize * self.dimensions.width as usize + x as usize;
        self.data.get(i).copied()
    }

    /// Row `y` of the mask.
    #[must_use]
    pub fn row(&self, y: usize) -> &[u8] {
        let width = self.dimensions.width as usize;
        &self.data[y * width..(y + 1) * width]
    }

    /// The raw mask bytes.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Number of pixels with a non-zero mask value.
    #[must_use]
    pub fn coverage(&self) -> u64 {
        self.data.iter().map(|&m| u64::from(m != 0)).sum()
    }
}

/// A color with normalized channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
}

impl Color {
    /// Create a color from normalized channels.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create a color from 8-bit channels.
    #[must_use]
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
        }
    }

    /// Quantize back to 8-bit channels (rounded, clamped).
    #[must_use]
    pub fn to_rgb8(self) -> [u8; 3] {
        [
            unit_to_u8(self.r),
            unit_to_u8(self.g),
            unit_to_u8(self.b),
        ]
    }

    /// `#rrggbb` rendering.
    #[must_use]
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_rgb8();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// HSV representation of this color.
    #[must_use]
    pub fn to_hsv(self) -> crate::hsv::Hsv {
        crate::hsv::rgb_to_hsv(self.r, self.g, self.b)
    }
}

/// Round a normalized value to the nearest 8-bit level.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    v.clamp(0.0, 1.0).mul_add(255.0, 0.5) as u8
}

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    /// The highlighted frame, ready for presentation.
    pub composited: PixelBuffer,
    /// Color under the frame center, read from the unprocessed input.
    pub center_color: Color,
}

/// Errors that cause a frame to be skipped.
///
/// Every variant is local to one frame: callers drop the frame and
/// carry on with the next one.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum FrameError {
    /// One of the frame axes is zero.
    #[error("frame has no pixels ({}x{})", .dimensions.width, .dimensions.height)]
    EmptyFrame {
        /// The offending dimensions.
        dimensions: Dimensions,
    },

    /// A row cannot hold `width` pixels.
    #[error("stride {stride} is smaller than the minimum row length {min}")]
    StrideTooSmall {
        /// Declared stride in bytes.
        stride: usize,
        /// Minimum row length in bytes (`width * 4`).
        min: usize,
    },

    /// The backing storage ends before the last pixel.
    #[error("buffer holds {len} bytes but the frame layout needs {required}")]
    BufferTooShort {
        /// Actual byte length.
        len: usize,
        /// Bytes required by the declared layout.
        required: usize,
    },

    /// The frame is not in a 4-byte, 8-bit-per-channel layout.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Mask and frame dimensions disagree.
    #[error(
        "mask is {}x{} but frame is {}x{}",
        .mask.width, .mask.height, .frame.width, .frame.height
    )]
    MaskMismatch {
        /// Frame dimensions.
        frame: Dimensions,
        /// Mask dimensions.
        mask: Dimensions,
    },

    /// Compositing parameters are out of range.
    #[error("invalid composite parameters: {0}")]
    InvalidParams(String),
}
