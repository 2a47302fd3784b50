use image::RgbaImage;

/// Blit all of `src` into `canvas` with its top-left at (dx, dy),
/// optionally rotated 90° clockwise.
///
/// Pixels falling outside the canvas are dropped.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32, rotated: bool) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    // destination (rendered) size differs when rotated
    let (rw, rh) = if rotated { (sh, sw) } else { (sw, sh) };

    for yy in 0..rh {
        if dy + yy >= ch {
            break;
        }
        for xx in 0..rw {
            if dx + xx >= cw {
                break;
            }
            let (ix, iy) = if rotated { (yy, sh - 1 - xx) } else { (xx, yy) };
            canvas.put_pixel(dx + xx, dy + yy, *src.get_pixel(ix, iy));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn rotation_is_clockwise() {
        // 2x1 source: red | green
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        src.put_pixel(1, 0, Rgba([0, 255, 0, 255]));

        let mut canvas = RgbaImage::new(4, 4);
        blit_rgba(&src, &mut canvas, 1, 1, true);

        // clockwise: left pixel ends up on top
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([255, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(1, 2), Rgba([0, 255, 0, 255]));
        assert_eq!(*canvas.get_pixel(2, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn upright_blit_clips_to_canvas() {
        let src = RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 255]));
        let mut canvas = RgbaImage::new(4, 4);
        blit_rgba(&src, &mut canvas, 2, 2, false);
        assert_eq!(*canvas.get_pixel(3, 3), Rgba([9, 9, 9, 255]));
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([0, 0, 0, 0]));
    }
}
