//! Decoded input image: raw pixel buffer with explicit geometry.
//!
//! Decoding from a file format is the caller's job; the engine only accepts
//! an already-decoded buffer. Geometry is validated once at construction, so
//! every later stage can rely on `data.len()` matching the declared layout.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Interleaved 8-bit pixel layouts accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Gray8,
    GrayAlpha8,
    Rgb8,
    Rgba8,
    Bgr8,
    Bgra8,
}

impl PixelFormat {
    /// Number of interleaved channels per pixel.
    pub fn channels(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::GrayAlpha8 => 2,
            Self::Rgb8 | Self::Bgr8 => 3,
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    /// Pick the format implied by a bare channel count (RGB order assumed).
    pub fn from_channel_count(channels: usize) -> Result<Self> {
        match channels {
            1 => Ok(Self::Gray8),
            2 => Ok(Self::GrayAlpha8),
            3 => Ok(Self::Rgb8),
            4 => Ok(Self::Rgba8),
            n => Err(AnalysisError::decode(format!(
                "unsupported channel count {n}"
            ))),
        }
    }
}

/// Immutable decoded image owned by one pipeline invocation.
#[derive(Debug, Clone)]
pub struct Image {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Image {
    /// Wrap a tightly packed buffer (`stride == width * channels`).
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let stride = width as usize * format.channels();
        Self::with_stride(width, height, stride, format, data)
    }

    /// Wrap a buffer whose rows may be padded to `stride` bytes.
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AnalysisError::decode(format!(
                "image has zero extent ({width}x{height})"
            )));
        }
        let row_bytes = (width as usize)
            .checked_mul(format.channels())
            .ok_or_else(|| AnalysisError::decode(format!("row of {width} pixels overflows")))?;
        if stride < row_bytes {
            return Err(AnalysisError::decode(format!(
                "stride {stride} is shorter than a row of {row_bytes} bytes"
            )));
        }
        let needed = stride
            .checked_mul(height as usize - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or_else(|| {
                AnalysisError::decode(format!(
                    "stride {stride} over {height} rows overflows the address space"
                ))
            })?;
        let tight = stride == row_bytes;
        let len_ok = if tight {
            data.len() == needed
        } else {
            data.len() >= needed
        };
        if !len_ok {
            return Err(AnalysisError::decode(format!(
                "buffer holds {} bytes, {}x{} {:?} needs {}",
                data.len(),
                width,
                height,
                format,
                needed
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    /// Wrap a buffer described only by a channel count, checking that the
    /// count agrees with the buffer size.
    pub fn from_channels(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
        let format = PixelFormat::from_channel_count(channels)?;
        Self::new(width, height, format, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Luma conversion with integer BT.601 weights; alpha is ignored.
    pub fn to_gray(&self) -> Result<GrayImage> {
        let (w, h) = (self.width as usize, self.height as usize);
        let ch = self.format.channels();
        let mut out = Vec::with_capacity(w * h);
        for y in 0..h {
            let row = &self.data[y * self.stride..y * self.stride + w * ch];
            for px in row.chunks_exact(ch) {
                let v = match self.format {
                    PixelFormat::Gray8 | PixelFormat::GrayAlpha8 => px[0],
                    PixelFormat::Rgb8 | PixelFormat::Rgba8 => luma(px[0], px[1], px[2]),
                    PixelFormat::Bgr8 | PixelFormat::Bgra8 => luma(px[2], px[1], px[0]),
                };
                out.push(v);
            }
        }
        GrayImage::from_raw(self.width, self.height, out)
            .ok_or_else(|| AnalysisError::decode("gray buffer size mismatch"))
    }
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let sum = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((sum + 500) / 1000) as u8
}

impl From<GrayImage> for Image {
    fn from(gray: GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        Self {
            width,
            height,
            stride: width as usize,
            format: PixelFormat::Gray8,
            data: gray.into_raw(),
        }
    }
}
