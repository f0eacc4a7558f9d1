//! Diagnostic drawing on top of processed frames.
//!
//! Hand skeletons and an info panel with a confidence bar are rasterized
//! straight into the RGBA buffer. The panel text comes from
//! [`GestureReport::overlay_lines`] and is left to the display sink.

use crate::{
    config::DisplayConfig,
    landmarks::HAND_CONNECTIONS,
    types::{DetectedHand, Frame, GestureReport},
};

const BONE_COLOR: [u8; 4] = [56, 189, 248, 255];
const JOINT_COLOR: [u8; 4] = [248, 113, 113, 255];
const PANEL_FILL: [u8; 4] = [0, 0, 0, 255];
const PANEL_BORDER: [u8; 4] = [255, 255, 255, 255];
const BAR_CONFIDENT: [u8; 4] = [0, 255, 0, 255];
const BAR_TENTATIVE: [u8; 4] = [255, 255, 0, 255];

pub const PANEL_RECT: (i32, i32, i32, i32) = (10, 10, 400, 120);
pub const BAR_ORIGIN: (i32, i32) = (15, 95);
pub const BAR_WIDTH: i32 = 300;
const BAR_HEIGHT: i32 = 10;
const PANEL_BORDER_THICKNESS: i32 = 2;
const BONE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 4;

#[derive(Clone, Debug)]
pub struct OverlayRenderer {
    pub show_landmarks: bool,
    pub show_gesture_info: bool,
    /// Bars above this confidence are drawn green, the rest yellow.
    pub highlight_threshold: f32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self {
            show_landmarks: true,
            show_gesture_info: true,
            highlight_threshold: 0.7,
        }
    }
}

impl OverlayRenderer {
    pub fn new(display: &DisplayConfig, highlight_threshold: f32) -> Self {
        Self {
            show_landmarks: display.show_landmarks,
            show_gesture_info: display.show_gesture_info,
            highlight_threshold,
        }
    }

    pub fn render(&self, frame: &mut Frame, hands: &[DetectedHand], report: &GestureReport) {
        if self.show_landmarks {
            for hand in hands {
                let points: Vec<(f32, f32)> = hand
                    .skeleton
                    .landmarks()
                    .iter()
                    .map(|lm| (lm.x * frame.width as f32, lm.y * frame.height as f32))
                    .collect();
                draw_skeleton(&mut frame.rgba, frame.width, frame.height, &points);
            }
        }

        if self.show_gesture_info {
            self.draw_info_panel(frame, report);
        }
    }

    fn draw_info_panel(&self, frame: &mut Frame, report: &GestureReport) {
        let (w, h) = (frame.width, frame.height);
        let buf = &mut frame.rgba;
        let (x1, y1, x2, y2) = PANEL_RECT;

        fill_rect(buf, w, h, x1, y1, x2, y2, PANEL_FILL);
        stroke_rect(buf, w, h, x1, y1, x2, y2, PANEL_BORDER, PANEL_BORDER_THICKNESS);

        let confidence = report.confidence().clamp(0.0, 1.0);
        if confidence > 0.0 {
            let (bx, by) = BAR_ORIGIN;
            let filled = (BAR_WIDTH as f32 * confidence) as i32;
            let color = if confidence > self.highlight_threshold {
                BAR_CONFIDENT
            } else {
                BAR_TENTATIVE
            };
            fill_rect(buf, w, h, bx, by, bx + filled, by + BAR_HEIGHT, color);
            stroke_rect(
                buf,
                w,
                h,
                bx,
                by,
                bx + BAR_WIDTH,
                by + BAR_HEIGHT,
                PANEL_BORDER,
                1,
            );
        }
    }
}

pub fn draw_skeleton(buffer: &mut [u8], width: u32, height: u32, points: &[(f32, f32)]) {
    if points.len() < 2 {
        return;
    }

    for &(a, b) in HAND_CONNECTIONS {
        if let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) {
            draw_line(buffer, width, height, pa, pb, BONE_COLOR, BONE_THICKNESS);
        }
    }

    for &(x, y) in points {
        draw_circle(
            buffer,
            width,
            height,
            (x as i32, y as i32),
            JOINT_RADIUS,
            JOINT_COLOR,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn fill_rect(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    color: [u8; 4],
) {
    let x_end = x2.min(width as i32 - 1);
    let y_end = y2.min(height as i32 - 1);
    for y in y1.max(0)..=y_end {
        for x in x1.max(0)..=x_end {
            put_pixel_safe(buffer, width, height, x, y, color);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn stroke_rect(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    color: [u8; 4],
    thickness: i32,
) {
    let t = thickness.max(1) - 1;
    fill_rect(buffer, width, height, x1, y1, x2, y1 + t, color);
    fill_rect(buffer, width, height, x1, y2 - t, x2, y2, color);
    fill_rect(buffer, width, height, x1, y1, x1 + t, y2, color);
    fill_rect(buffer, width, height, x2 - t, y1, x2, y2, color);
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: &(f32, f32),
    p1: &(f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
    let (x1, y1) = (p1.0 as i32, p1.1 as i32);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        if radius > 0 {
            draw_circle(buffer, width, height, (x0, y0), radius, color);
        } else {
            put_pixel_safe(buffer, width, height, x0, y0, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 4;
    if idx + 3 < buffer.len() {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}
