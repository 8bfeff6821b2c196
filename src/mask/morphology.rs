//! Binary morphology with square structuring elements.
//!
//! A square element is separable, so each operation runs as a horizontal
//! pass followed by a vertical pass. Pixels outside the mask never
//! contribute: dilation treats them as background and erosion treats them
//! as foreground, matching the usual border convention for closing.

use super::PersonMask;

/// Dilate then erode with a `size x size` all-ones element
pub fn close(mask: &PersonMask, size: u32) -> PersonMask {
    erode(&dilate(mask, size), size)
}

pub fn dilate(mask: &PersonMask, size: u32) -> PersonMask {
    sweep(mask, size, true)
}

pub fn erode(mask: &PersonMask, size: u32) -> PersonMask {
    sweep(mask, size, false)
}

/// `any = true` computes a windowed OR (dilation), otherwise a windowed AND
fn sweep(mask: &PersonMask, size: u32, any: bool) -> PersonMask {
    if size <= 1 {
        return mask.clone();
    }

    // Anchor at the element centre; even sizes lean towards the origin
    let before = (size / 2) as usize;
    let after = (size as usize - 1) - before;
    let (width, height) = (mask.width() as usize, mask.height() as usize);

    let window = |get: &dyn Fn(usize) -> bool, centre: usize, len: usize| -> bool {
        let lo = centre.saturating_sub(before);
        let hi = (centre + after).min(len - 1);
        if any {
            (lo..=hi).any(get)
        } else {
            (lo..=hi).all(get)
        }
    };

    let mut horizontal = PersonMask::new(mask.width(), mask.height());
    for y in 0..height {
        for x in 0..width {
            let hit = window(&|i| mask.at(i, y), x, width);
            horizontal.put(x, y, hit);
        }
    }

    let mut out = PersonMask::new(mask.width(), mask.height());
    for y in 0..height {
        for x in 0..width {
            let hit = window(&|j| horizontal.at(x, j), y, height);
            out.put(x, y, hit);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from_rows(rows: &[&str]) -> PersonMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut mask = PersonMask::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                mask.put(x, y, c == '#');
            }
        }
        mask
    }

    #[test]
    fn test_dilate_single_pixel_grows_to_square() {
        let mut mask = PersonMask::new(9, 9);
        mask.put(4, 4, true);
        let grown = dilate(&mask, 5);
        assert_eq!(grown.count(), 25);
        assert!(grown.at(2, 2) && grown.at(6, 6));
        assert!(!grown.at(1, 4) && !grown.at(7, 4));
    }

    #[test]
    fn test_erode_removes_thin_features() {
        let mask = mask_from_rows(&[
            ".........",
            ".........",
            "#########",
            ".........",
            ".........",
        ]);
        assert_eq!(erode(&mask, 3).count(), 0);
    }

    #[test]
    fn test_erode_ignores_out_of_frame_pixels() {
        let mut mask = PersonMask::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                mask.put(x, y, true);
            }
        }
        assert_eq!(erode(&mask, 5).count(), 16);
    }

    #[test]
    fn test_close_bridges_single_pixel_gap() {
        let mask = mask_from_rows(&[
            "..........",
            ".####.###.",
            ".####.###.",
            ".####.###.",
            "..........",
        ]);
        let closed = close(&mask, 5);
        for y in 1..=3 {
            for x in 1..=8 {
                assert!(closed.at(x, y), "gap left open at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_close_keeps_outer_boundary() {
        let mut mask = PersonMask::new(11, 11);
        for y in 4..=6 {
            for x in 4..=6 {
                mask.put(x, y, true);
            }
        }
        assert_eq!(close(&mask, 5), mask);
    }

    #[test]
    fn test_unit_element_is_identity() {
        let mask = mask_from_rows(&["#.#", ".#."]);
        assert_eq!(close(&mask, 1), mask);
    }
}
