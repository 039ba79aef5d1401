/// One RGBA video frame (4 bytes per pixel, row-major).
#[derive(Clone, Debug)]
pub struct FrameData {
    pub buffer: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FrameData {
    pub fn new(buffer: Vec<u8>, width: u32, height: u32) -> Self {
        Self { buffer, width, height }
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.buffer.len() == self.width as usize * self.height as usize * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_frame_length() {
        assert!(FrameData::new(vec![0; 8], 2, 1).is_complete());
        assert!(!FrameData::new(vec![0; 7], 2, 1).is_complete());
    }
}
