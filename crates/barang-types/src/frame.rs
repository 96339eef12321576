use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One captured RGBA image buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA pixel buffer, row-major, four bytes per pixel.
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }

    /// Solid-colour frame, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::from_rgba(width, height, data)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0 || self.data.len() < self.pixel_count() * 4
    }

    /// Overwrites this frame in place, reusing the allocation where possible.
    pub fn copy_from(&mut self, width: u32, height: u32, rgba: &[u8]) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.extend_from_slice(rgba);
        self.captured_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_frame_has_rgba_layout() {
        let frame = Frame::filled(3, 2, [1, 2, 3, 255]);
        assert_eq!(frame.data.len(), 24);
        assert_eq!(&frame.data[4..8], &[1, 2, 3, 255]);
        assert!(!frame.is_empty());
    }

    #[test]
    fn short_buffer_counts_as_empty() {
        let frame = Frame::from_rgba(10, 10, vec![0; 12]);
        assert!(frame.is_empty());
        assert!(Frame::empty().is_empty());
    }
}
