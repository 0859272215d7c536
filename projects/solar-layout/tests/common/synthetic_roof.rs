use image::{Rgb, RgbImage};

pub const ROOF_FILL: Rgb<u8> = Rgb([220, 220, 220]);
pub const BACKGROUND: Rgb<u8> = Rgb([40, 40, 40]);

/// Axis-aligned bright roof on a dark background.
///
/// The roof occupies `roof_w x roof_h` pixels with its top-left corner at
/// `(x0, y0)` and must cover most of the frame so it is the mask foreground.
pub fn rectangular_roof(
    width: u32,
    height: u32,
    x0: u32,
    y0: u32,
    roof_w: u32,
    roof_h: u32,
) -> RgbImage {
    assert!(x0 + roof_w <= width && y0 + roof_h <= height, "roof must fit the frame");
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x0 + roof_w).contains(&x) && (y0..y0 + roof_h).contains(&y) {
            ROOF_FILL
        } else {
            BACKGROUND
        }
    })
}

/// 240 x 200 px roof inside a 320 x 280 frame; with 120 m² this is 12 m x 10 m at 0.05 m/px.
pub fn standard_roof() -> RgbImage {
    rectangular_roof(320, 280, 40, 40, 240, 200)
}

/// `standard_roof` with a dark square (chimney shadow) of side `side` centred at `(cx, cy)`.
pub fn roof_with_block(cx: u32, cy: u32, side: u32) -> RgbImage {
    let mut img = standard_roof();
    let half = side / 2;
    for y in cy - half..cy + half {
        for x in cx - half..cx + half {
            img.put_pixel(x, y, Rgb([60, 60, 60]));
        }
    }
    img
}

pub fn blank(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))
}
