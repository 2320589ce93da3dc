use image::{imageops, ImageBuffer, Rgb, RgbImage};

/// 解码后的一帧 (RGB24, 紧密排列)
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// 媒体时间（秒）
    pub timestamp: f64,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, timestamp: f64, frame_number: u64) -> Self {
        Self {
            width,
            height,
            data,
            timestamp,
            frame_number,
        }
    }

    /// Single-color frame, mostly useful for tests and synthetic sources.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], timestamp: f64, frame_number: u64) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(width, height, data, timestamp, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.pixel_count() * 3
    }

    /// Borrowed image view over the pixel data, no copy.
    pub fn as_image(&self) -> Option<ImageBuffer<Rgb<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    /// Copy out a sub-rectangle. Caller guarantees it lies inside the frame.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> RgbImage {
        let mut out = Vec::with_capacity((w * h * 3) as usize);
        let stride = (self.width * 3) as usize;
        for row in y..y + h {
            let start = row as usize * stride + (x * 3) as usize;
            out.extend_from_slice(&self.data[start..start + (w * 3) as usize]);
        }
        RgbImage::from_raw(w, h, out).unwrap_or_else(|| RgbImage::new(w, h))
    }

    /// Paint a solid rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgb: [u8; 3]) {
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for py in y.min(self.height)..y_end {
            for px in x.min(self.width)..x_end {
                let idx = ((py * self.width + px) * 3) as usize;
                self.data[idx..idx + 3].copy_from_slice(&rgb);
            }
        }
    }

    /// 等比缩放到指定宽度，高度向下取整
    pub fn resize_to_width(&self, target_width: u32) -> Option<Frame> {
        if self.width == 0 || target_width == 0 {
            return None;
        }
        let scale = target_width as f64 / self.width as f64;
        let target_height = ((self.height as f64 * scale).floor() as u32).max(1);

        let img = self.as_image()?;
        let resized: RgbImage = imageops::resize(
            &img,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Some(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        })
    }
}
