use barang_types::frame::Frame;
use qrcode::{Color, QrCode};

/// Renders `text` as a QR symbol centred on a light canvas.
pub fn qr_frame(text: &str, width: u32, height: u32, inverted: bool) -> Frame {
    let code = QrCode::new(text.as_bytes()).expect("encodable test payload");
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let scale = 4;
    let side = modules * scale;
    assert!(side + 16 <= width.min(height), "canvas too small for symbol");

    let (light, dark) = if inverted { (20u8, 235u8) } else { (235u8, 20u8) };
    let x0 = (width - side) / 2;
    let y0 = (height - side) / 2;
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            let v = if inside {
                let mx = ((x - x0) / scale) as usize;
                let my = ((y - y0) / scale) as usize;
                match colors[my * modules as usize + mx] {
                    Color::Dark => dark,
                    Color::Light => light,
                }
            } else {
                light
            };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    Frame::from_rgba(width, height, data)
}
