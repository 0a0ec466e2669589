//! Synthetic frames for offline tests

use crate::types::CameraFrame;

/// RGB24 gradient frame that shifts with `frame_number`, so consecutive
/// frames differ the way real footage does.
pub fn synthetic_video_frame(frame_number: u64, width: u32, height: u32) -> CameraFrame {
    let base = (frame_number % 256) as u8;
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(base.wrapping_add(x as u8));
            data.push(base.wrapping_add(y as u8));
            data.push(base.wrapping_add((x + y) as u8));
        }
    }
    CameraFrame::new(data, width, height, "synthetic".to_string())
}
