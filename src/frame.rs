use crate::mode::RoiShape;
use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of frame data delivered by a capture track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// 8-bit luminance
    Gray8,
    /// Packed RGB, 3 bytes per pixel
    Rgb24,
    /// Packed RGBA, 4 bytes per pixel
    Rgba32,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Gray8 => 1,
            FrameFormat::Rgb24 => 3,
            FrameFormat::Rgba32 => 4,
        }
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Frame sequence number within its stream
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Wrap an 8-bit luminance image as a frame
    pub fn from_luma(id: u64, luma: LumaImage) -> Self {
        Self::new(
            id,
            SystemTime::now(),
            luma.data,
            luma.width,
            luma.height,
            FrameFormat::Gray8,
        )
    }

    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() >= self.expected_size()
    }

    /// Convert to a luminance image. Returns None when the buffer is short.
    pub fn to_luma(&self) -> Option<LumaImage> {
        if !self.validate_size() || self.width == 0 || self.height == 0 {
            return None;
        }

        let pixels = self.width as usize * self.height as usize;
        let image = match self.format {
            FrameFormat::Gray8 => {
                return LumaImage::new(self.width, self.height, self.data[..pixels].to_vec());
            }
            FrameFormat::Rgb24 => DynamicImage::ImageRgb8(RgbImage::from_raw(
                self.width,
                self.height,
                self.data[..pixels * 3].to_vec(),
            )?),
            FrameFormat::Rgba32 => DynamicImage::ImageRgba8(RgbaImage::from_raw(
                self.width,
                self.height,
                self.data[..pixels * 4].to_vec(),
            )?),
        };

        Some(LumaImage::from_dynamic(&image))
    }
}

/// Rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Centered region of interest for the given shape, sized from the
    /// actual frame dimensions.
    pub fn centered(shape: RoiShape, frame_width: u32, frame_height: u32) -> Self {
        let (width, height) = match shape {
            RoiShape::Square { side_fraction } => {
                let side = (frame_width.min(frame_height) as f32 * side_fraction) as u32;
                (side, side)
            }
            RoiShape::Wide {
                width_fraction,
                height_fraction,
            } => (
                (frame_width as f32 * width_fraction) as u32,
                (frame_height as f32 * height_fraction) as u32,
            ),
        };

        let width = width.clamp(1, frame_width.max(1));
        let height = height.clamp(1, frame_height.max(1));

        Self {
            x: (frame_width - width) / 2,
            y: (frame_height - height) / 2,
            width,
            height,
        }
    }
}

/// Owned 8-bit grayscale image, row-major without padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl LumaImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// Uniformly filled image
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_dynamic(image: &image::DynamicImage) -> Self {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        Self {
            width,
            height,
            data: gray.into_raw(),
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    /// Copy out a sub-rectangle, clipped to the image bounds
    pub fn crop(&self, region: Region) -> LumaImage {
        let x0 = region.x.min(self.width);
        let y0 = region.y.min(self.height);
        let x1 = (region.x + region.width).min(self.width);
        let y1 = (region.y + region.height).min(self.height);

        let mut data = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
        for y in y0..y1 {
            let row = self.row(y);
            data.extend_from_slice(&row[x0 as usize..x1 as usize]);
        }

        LumaImage {
            width: x1 - x0,
            height: y1 - y0,
            data,
        }
    }

    /// Rotate 90 degrees clockwise
    pub fn rotate90(&self) -> LumaImage {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut data = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                // (x, y) -> (h - 1 - y, x) in an h-wide image
                data[x * h + (h - 1 - y)] = self.data[y * w + x];
            }
        }
        LumaImage {
            width: self.height,
            height: self.width,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format_properties() {
        assert_eq!(FrameFormat::Gray8.bytes_per_pixel(), 1);
        assert_eq!(FrameFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(FrameFormat::Rgba32.bytes_per_pixel(), 4);
    }

    #[test]
    fn test_frame_size_validation() {
        let valid = FrameData::new(1, SystemTime::now(), vec![0u8; 64 * 48 * 3], 64, 48, FrameFormat::Rgb24);
        assert!(valid.validate_size());
        assert!(valid.to_luma().is_some());

        let short = FrameData::new(2, SystemTime::now(), vec![0u8; 100], 64, 48, FrameFormat::Rgb24);
        assert!(!short.validate_size());
        assert!(short.to_luma().is_none());
    }

    #[test]
    fn test_rgb_to_luma() {
        let frame = FrameData::new(
            1,
            SystemTime::now(),
            vec![255, 255, 255, 0, 0, 0, 255, 0, 0],
            3,
            1,
            FrameFormat::Rgb24,
        );
        let luma = frame.to_luma().unwrap();
        assert_eq!((luma.width, luma.height), (3, 1));
        assert_eq!(luma.data[0], 255);
        assert_eq!(luma.data[1], 0);
        assert!(luma.data[2] > 0 && luma.data[2] < 128);

        let rgba = FrameData::new(
            2,
            SystemTime::now(),
            vec![255, 255, 255, 255, 0, 0, 0, 255, 255, 0, 0, 255],
            3,
            1,
            FrameFormat::Rgba32,
        );
        assert_eq!(rgba.to_luma().unwrap().data, luma.data);
    }

    #[test]
    fn test_centered_regions_follow_actual_dimensions() {
        let square = Region::centered(RoiShape::Square { side_fraction: 0.5 }, 1920, 1080);
        assert_eq!(square.width, 540);
        assert_eq!(square.height, 540);
        assert_eq!(square.x, (1920 - 540) / 2);

        let smaller = Region::centered(RoiShape::Square { side_fraction: 0.5 }, 640, 480);
        assert_eq!(smaller.width, 240);

        let wide = Region::centered(
            RoiShape::Wide {
                width_fraction: 0.8,
                height_fraction: 0.4,
            },
            1000,
            500,
        );
        assert_eq!((wide.width, wide.height), (800, 200));
        assert_eq!((wide.x, wide.y), (100, 150));
    }

    #[test]
    fn test_crop_and_rotate() {
        let image = LumaImage::new(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();

        let cropped = image.crop(Region {
            x: 1,
            y: 0,
            width: 5,
            height: 2,
        });
        assert_eq!((cropped.width, cropped.height), (2, 2));
        assert_eq!(cropped.data, vec![2, 3, 5, 6]);

        let rotated = image.rotate90();
        assert_eq!((rotated.width, rotated.height), (2, 3));
        assert_eq!(rotated.data, vec![4, 1, 5, 2, 6, 3]);
    }
}
