use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::{
    landmarks::NUM_LANDMARKS,
    types::{Frame, HandSkeleton, Landmark},
};

pub const HANDPOSE_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Maps model-space coordinates of a rotated square crop back to the frame.
#[derive(Clone, Debug)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

fn ensure_frame_len(frame: &Frame) -> Result<()> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len || expected_len == 0 {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }
    Ok(())
}

/// Resize keeping aspect ratio, pad to a square and normalize to `[0, 1]` NHWC.
pub fn prepare_frame_with_size(
    frame: &Frame,
    target_size: u32,
) -> Result<(Array4<f32>, LetterboxInfo)> {
    ensure_frame_len(frame)?;

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target_size);

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let pad_x = ((target_size - new_w) / 2) as usize;
    let pad_y = ((target_size - new_h) / 2) as usize;
    let mut canvas = vec![0u8; (target_size as usize) * (target_size as usize) * 4];
    let dst_stride = target_size as usize * 4;
    let src_stride = new_w as usize * 4;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 4;
        let src_offset = row * src_stride;
        canvas[dst_offset..dst_offset + src_stride]
            .copy_from_slice(&resized[src_offset..src_offset + src_stride]);
    }

    let normalized: Vec<f32> = canvas
        .par_chunks_exact(4)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();
    let input = Array4::<f32>::from_shape_vec(
        (1, target_size as usize, target_size as usize, 3),
        normalized,
    )
    .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}

/// Sample a rotated square of side `side` pixels around `center` into a model tensor.
pub fn prepare_rotated_crop(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    output_size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    ensure_frame_len(frame)?;

    let transform = CropTransform {
        center,
        side,
        angle,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    let size = output_size as usize;
    let mut data = vec![0.0f32; size * size * 3];
    data.par_chunks_exact_mut(size * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let (src_x, src_y) = transform.to_frame(x as f32 + 0.5, y as f32 + 0.5);
                px.copy_from_slice(&sample_rgb(frame, src_x, src_y));
            }
        });

    let array = Array4::<f32>::from_shape_vec((1, size, size, 3), data)
        .map_err(|err| anyhow!("failed to build rotated crop tensor: {err}"))?;

    Ok((array, transform))
}

impl CropTransform {
    fn pixel_scale(&self) -> f32 {
        self.side / self.output_size as f32
    }

    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let scale = self.pixel_scale();
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let (sin, cos) = self.angle.sin_cos();
        (
            self.center.0 + dx * cos - dy * sin,
            self.center.1 + dx * sin + dy * cos,
        )
    }

    /// Project a crop-space point to frame pixels, clamped to the frame.
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let (ox, oy) = self.to_frame(x, y);
        (
            ox.clamp(0.0, (self.orig_w.saturating_sub(1)) as f32),
            oy.clamp(0.0, (self.orig_h.saturating_sub(1)) as f32),
        )
    }

    /// Landmarks normalized to the frame: x by width, y by height, z like x.
    pub fn normalize(&self, raw: &[[f32; 3]]) -> HandSkeleton {
        let width = self.orig_w.max(1) as f32;
        let height = self.orig_h.max(1) as f32;
        let z_scale = self.pixel_scale() / width;
        HandSkeleton::new(
            raw.iter()
                .map(|&[x, y, z]| {
                    let (px, py) = self.project(x, y);
                    Landmark::new(px / width, py / height, z * z_scale)
                })
                .collect(),
        )
    }
}

fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if x.is_nan() || y.is_nan() {
        return [0.0, 0.0, 0.0];
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let x1 = x0 + 1.0;
    let y1 = y0 + 1.0;

    let (w, h) = (frame.width as i32, frame.height as i32);
    let fetch = |cx: f32, cy: f32| -> [f32; 3] {
        let ix = cx as i32;
        let iy = cy as i32;
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0, 0.0, 0.0];
        }
        let idx = ((iy as u32 * frame.width + ix as u32) as usize) * 4;
        [
            frame.rgba[idx] as f32 / 255.0,
            frame.rgba[idx + 1] as f32 / 255.0,
            frame.rgba[idx + 2] as f32 / 255.0,
        ]
    };

    let fx = x - x0;
    let fy = y - y0;
    let c00 = fetch(x0, y0);
    let c10 = fetch(x1, y0);
    let c01 = fetch(x0, y1);
    let c11 = fetch(x1, y1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    std::array::from_fn(|c| {
        lerp(
            lerp(c00[c], c10[c], fx),
            lerp(c01[c], c11[c], fx),
            fy,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transform(angle: f32) -> CropTransform {
        CropTransform {
            center: (320.0, 240.0),
            side: 448.0,
            angle,
            output_size: 224,
            orig_w: 640,
            orig_h: 480,
        }
    }

    #[test]
    fn letterbox_pads_the_short_side() {
        let frame = Frame::filled(64, 32, [255, 0, 0, 255]);
        let (input, letterbox) = prepare_frame_with_size(&frame, 16).unwrap();

        assert_eq!(input.shape(), &[1, 16, 16, 3]);
        assert_relative_eq!(letterbox.scale, 0.25);
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0.0, 4.0));
        assert_relative_eq!(input[[0, 0, 8, 0]], 0.0);
        assert_relative_eq!(input[[0, 8, 8, 0]], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let mut frame = Frame::filled(4, 4, [0, 0, 0, 255]);
        frame.rgba.truncate(10);
        assert!(prepare_frame_with_size(&frame, 8).is_err());
        assert!(prepare_rotated_crop(&frame, (2.0, 2.0), 4.0, 0.0, 8).is_err());
    }

    #[test]
    fn short_landmark_tensor_is_an_error() {
        assert!(decode_landmarks(&[0.0; 62]).is_err());
        let decoded = decode_landmarks(&[1.0; 66]).unwrap();
        assert_eq!(decoded.len(), NUM_LANDMARKS);
    }

    #[test]
    fn crop_center_maps_to_palm_center() {
        let (x, y) = transform(0.7).project(112.0, 112.0);
        assert_relative_eq!(x, 320.0, epsilon = 1e-3);
        assert_relative_eq!(y, 240.0, epsilon = 1e-3);
    }

    #[test]
    fn projection_doubles_offsets_and_clamps() {
        let t = transform(0.0);
        let (x, y) = t.project(122.0, 102.0);
        assert_relative_eq!(x, 340.0, epsilon = 1e-3);
        assert_relative_eq!(y, 220.0, epsilon = 1e-3);
        assert_eq!(t.project(-500.0, 1000.0), (0.0, 479.0));
    }

    #[test]
    fn normalized_landmarks_are_unit_scaled() {
        let raw = vec![[112.0, 112.0, 10.0]; NUM_LANDMARKS];
        let skeleton = transform(0.0).normalize(&raw);

        assert_eq!(skeleton.len(), NUM_LANDMARKS);
        let lm = skeleton.landmarks()[0];
        assert_relative_eq!(lm.x, 0.5, epsilon = 1e-4);
        assert_relative_eq!(lm.y, 0.5, epsilon = 1e-4);
        assert_relative_eq!(lm.z, 10.0 * 2.0 / 640.0, epsilon = 1e-6);
    }

    #[test]
    fn rotated_crop_samples_frame_colors() {
        let frame = Frame::filled(32, 32, [0, 255, 0, 255]);
        let (crop, _) = prepare_rotated_crop(&frame, (16.0, 16.0), 8.0, 0.3, 4).unwrap();
        assert_eq!(crop.shape(), &[1, 4, 4, 3]);
        assert_relative_eq!(crop[[0, 1, 1, 1]], 1.0, epsilon = 1e-4);
        assert_relative_eq!(crop[[0, 1, 1, 0]], 0.0);
    }
}
