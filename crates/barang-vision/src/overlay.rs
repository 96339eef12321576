use barang_types::{
    frame::Frame,
    geometry::{Corners, Point},
};

/// Draws the closed outline of `corners` onto the frame, clipped to its bounds.
pub fn draw_outline(frame: &mut Frame, corners: &Corners, color: [u8; 4], thickness: u32) {
    if frame.is_empty() {
        return;
    }
    let points = corners.points();
    for i in 0..points.len() {
        draw_line(frame, points[i], points[(i + 1) % points.len()], color, thickness);
    }
}

fn draw_line(frame: &mut Frame, from: Point, to: Point, color: [u8; 4], thickness: u32) {
    // Bresenham
    let (mut x, mut y) = (from.x, from.y);
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        stamp(frame, x, y, color, thickness);
        if x == to.x && y == to.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn stamp(frame: &mut Frame, cx: i32, cy: i32, color: [u8; 4], thickness: u32) {
    let half = (thickness.max(1) / 2) as i32;
    for y in cy - half..=cy + half {
        for x in cx - half..=cx + half {
            if x < 0 || y < 0 || x >= frame.width as i32 || y >= frame.height as i32 {
                continue;
            }
            let idx = (y as usize * frame.width as usize + x as usize) * 4;
            frame.data[idx..idx + 4].copy_from_slice(&color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: [u8; 4] = [0, 255, 0, 255];

    fn pixel(frame: &Frame, x: u32, y: u32) -> &[u8] {
        let idx = ((y * frame.width + x) * 4) as usize;
        &frame.data[idx..idx + 4]
    }

    #[test]
    fn outlines_quadrilateral_edges_only() {
        let mut frame = Frame::filled(20, 20, [0, 0, 0, 255]);
        let corners = Corners([
            Point::new(2, 2),
            Point::new(12, 2),
            Point::new(12, 12),
            Point::new(2, 12),
        ]);
        draw_outline(&mut frame, &corners, GREEN, 1);
        assert_eq!(pixel(&frame, 2, 2), GREEN);
        assert_eq!(pixel(&frame, 7, 2), GREEN);
        assert_eq!(pixel(&frame, 12, 9), GREEN);
        assert_eq!(pixel(&frame, 7, 7), [0, 0, 0, 255]);
    }

    #[test]
    fn clips_points_outside_frame() {
        let mut frame = Frame::filled(5, 5, [0, 0, 0, 255]);
        let corners = Corners([
            Point::new(-3, -3),
            Point::new(8, -3),
            Point::new(8, 8),
            Point::new(-3, 8),
        ]);
        draw_outline(&mut frame, &corners, GREEN, 3);
        assert_eq!(pixel(&frame, 2, 2), [0, 0, 0, 255]);
    }
}
