//! H.264 encoding of camera frames via openh264

use crate::errors::CameraError;
use crate::types::CameraFrame;
use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

/// One encoded access unit
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Annex B NAL units
    pub data: Vec<u8>,
    pub is_keyframe: bool,
}

/// Fixed-size RGB → H.264 encoder.
///
/// YUV 4:2:0 halves both dimensions for chroma, so an odd source width or
/// height loses its last column or row. `output_size` is what the stream
/// carries.
pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    yuv: Vec<u8>,
}

impl H264Encoder {
    /// `width` and `height` are the camera frame size; both must be at least 2
    pub fn new(width: u32, height: u32) -> Result<Self, CameraError> {
        if width < 2 || height < 2 {
            return Err(CameraError::EncodingError(format!(
                "Frame size {}x{} is too small to encode",
                width, height
            )));
        }

        let encoder = Encoder::new()
            .map_err(|e| CameraError::EncodingError(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width,
            height,
            yuv: Vec::with_capacity((width * height * 3 / 2) as usize),
        })
    }

    /// Encoded picture size, the source size rounded down to even
    pub fn output_size(&self) -> (u32, u32) {
        (self.width & !1, self.height & !1)
    }

    pub fn encode(&mut self, frame: &CameraFrame) -> Result<EncodedFrame, CameraError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(CameraError::EncodingError(format!(
                "Frame {}x{} does not match encoder {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        let expected = (self.width * self.height * 3) as usize;
        if frame.data.len() != expected {
            return Err(CameraError::EncodingError(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                frame.data.len()
            )));
        }

        let (out_w, out_h) = self.output_size();
        rgb_to_i420(
            &frame.data,
            self.width as usize,
            out_w as usize,
            out_h as usize,
            &mut self.yuv,
        );
        let buffer = YUVBuffer::from_vec(self.yuv.clone(), out_w as usize, out_h as usize);

        let bitstream = self
            .encoder
            .encode(&buffer)
            .map_err(|e| CameraError::EncodingError(format!("Encoding failed: {}", e)))?;

        Ok(EncodedFrame {
            is_keyframe: matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I),
            data: bitstream.to_vec(),
        })
    }

    pub fn force_keyframe(&mut self) {
        self.encoder.force_intra_frame();
    }
}

/// BT.601 RGB24 → planar I420 of the top-left `w`x`h` region of a frame
/// `stride` pixels wide. Chroma comes from the top-left pixel of each 2x2 block.
fn rgb_to_i420(rgb: &[u8], stride: usize, w: usize, h: usize, out: &mut Vec<u8>) {
    let y_len = w * h;
    let c_len = (w / 2) * (h / 2);
    out.clear();
    out.resize(y_len + 2 * c_len, 0);
    let (y_plane, chroma) = out.split_at_mut(y_len);
    let (u_plane, v_plane) = chroma.split_at_mut(c_len);

    for (row, line) in rgb.chunks_exact(stride * 3).enumerate().take(h) {
        for (col, px) in line.chunks_exact(3).enumerate().take(w) {
            let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
            y_plane[row * w + col] = (((66 * r + 129 * g + 25 * b + 128) >> 8) + 16).clamp(0, 255) as u8;

            if row % 2 == 0 && col % 2 == 0 {
                let i = (row / 2) * (w / 2) + col / 2;
                u_plane[i] = (((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
                v_plane[i] = (((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i420_layout() {
        let mut out = Vec::new();
        rgb_to_i420(&vec![0u8; 4 * 2 * 3], 4, 4, 2, &mut out);
        assert_eq!(out.len(), 4 * 2 + 2 * 2);
        // black maps to Y=16, U=V=128
        assert!(out[..8].iter().all(|&y| y == 16));
        assert!(out[8..].iter().all(|&c| c == 128));
    }

    #[test]
    fn test_i420_crop_skips_odd_column() {
        // 3x2 source: two black columns, then a white one that gets cropped
        let mut rgb = vec![0u8; 3 * 2 * 3];
        for row in 0..2 {
            let px = (row * 3 + 2) * 3;
            rgb[px..px + 3].copy_from_slice(&[255, 255, 255]);
        }
        let mut out = Vec::new();
        rgb_to_i420(&rgb, 3, 2, 2, &mut out);
        assert_eq!(out.len(), 2 * 2 + 2);
        assert!(out[..4].iter().all(|&y| y == 16));
    }

    #[test]
    fn test_odd_size_encodes_cropped() {
        let mut encoder = H264Encoder::new(321, 241).unwrap();
        assert_eq!(encoder.output_size(), (320, 240));
        let frame = CameraFrame::new(vec![90; 321 * 241 * 3], 321, 241, "0".to_string());
        let encoded = encoder.encode(&frame).unwrap();
        assert!(!encoded.data.is_empty());
    }

    #[test]
    fn test_degenerate_size_rejected() {
        assert!(H264Encoder::new(1, 480).is_err());
        assert!(H264Encoder::new(640, 0).is_err());
    }

    #[test]
    fn test_mismatched_frame_rejected() {
        let mut encoder = H264Encoder::new(320, 240).unwrap();
        let frame = CameraFrame::new(vec![0; 640 * 480 * 3], 640, 480, "0".to_string());
        assert!(encoder.encode(&frame).is_err());
    }

    #[test]
    fn test_first_frame_is_keyframe() {
        let mut encoder = H264Encoder::new(320, 240).unwrap();
        let frame = CameraFrame::new(vec![128; 320 * 240 * 3], 320, 240, "0".to_string());
        let encoded = encoder.encode(&frame).unwrap();
        assert!(!encoded.data.is_empty());
        assert!(encoded.is_keyframe);
    }
}
