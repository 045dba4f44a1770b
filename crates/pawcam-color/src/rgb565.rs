//! RGB565 → RGB888 expansion.
//!
//! Uses the fixed-point form of `round(c * 255 / max)`: the channel is
//! multiplied by `round(255 / max * 64)` (527 for 5-bit, 259 for 6-bit),
//! biased, and shifted down by 6. No division or float on the hot path.

use crate::error::ConvertError;
use pawcam_core::{Frame, PixelEncoding};
use tracing::trace;

/// Bytes per packed source pixel.
const SRC_BPP: usize = 2;
/// Bytes per expanded destination pixel.
const DST_BPP: usize = 3;

/// Expand one 5-6-5 pixel to `[r, g, b]`.
#[inline]
pub const fn expand_rgb565(p: u16) -> [u8; 3] {
    let p = p as u32;
    let r = ((p >> 11) * 527 + 23) >> 6;
    let g = (((p >> 5) & 63) * 259 + 33) >> 6;
    let b = ((p & 31) * 527 + 23) >> 6;
    [r as u8, g as u8, b as u8]
}

/// Pack an 8-bit RGB triple into 5-6-5 by truncating low bits.
#[inline]
pub const fn pack_rgb888(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// Convert a row-major RGB565 buffer (high byte first) into RGB888.
///
/// Writes exactly `width * height * 3` bytes at the start of `dst` and
/// returns that count. If the write cursor does not land exactly on that
/// end position (source too short or too long, destination too short) the
/// conversion fails with [`ConvertError::ConversionSizeMismatch`]; bytes
/// already written are left in place and must be treated as garbage.
///
/// `src.len()` must be even.
pub fn rgb565_to_rgb888(
    src: &[u8],
    width: u32,
    height: u32,
    dst: &mut [u8],
) -> Result<usize, ConvertError> {
    debug_assert!(src.len() % SRC_BPP == 0, "rgb565 buffer length must be even");

    let expected = width as usize * height as usize * DST_BPP;
    let mut cursor = 0usize;

    for pair in src.chunks_exact(SRC_BPP) {
        let pixel = u16::from_be_bytes([pair[0], pair[1]]);
        let Some(out) = dst.get_mut(cursor..cursor + DST_BPP) else {
            // Destination exhausted before the source.
            return Err(ConvertError::ConversionSizeMismatch {
                expected,
                written: cursor,
            });
        };
        out.copy_from_slice(&expand_rgb565(pixel));
        cursor += DST_BPP;
    }

    if cursor != expected {
        return Err(ConvertError::ConversionSizeMismatch {
            expected,
            written: cursor,
        });
    }

    trace!(width, height, bytes = cursor, "rgb565 frame expanded");
    Ok(cursor)
}

/// Convert a captured RGB565 frame into `dst`.
pub fn convert_frame(frame: &Frame, dst: &mut [u8]) -> Result<usize, ConvertError> {
    match frame.encoding() {
        PixelEncoding::Rgb565 => {
            rgb565_to_rgb888(frame.data(), frame.width(), frame.height(), dst)
        }
        other => Err(ConvertError::UnsupportedEncoding(other.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pawcam_core::{FrameGeometry, FrameId};
    use proptest::prelude::*;

    fn reference(p: u16) -> [u8; 3] {
        let p = p as u32;
        [
            (((p >> 11) * 527 + 23) >> 6) as u8,
            ((((p >> 5) & 63) * 259 + 33) >> 6) as u8,
            (((p & 31) * 527 + 23) >> 6) as u8,
        ]
    }

    #[test]
    fn test_extremes() {
        assert_eq!(expand_rgb565(0x0000), [0, 0, 0]);
        assert_eq!(expand_rgb565(0xFFFF), [255, 255, 255]);
    }

    #[test]
    fn test_primaries() {
        assert_eq!(expand_rgb565(0xF800), [255, 0, 0]);
        assert_eq!(expand_rgb565(0x07E0), [0, 255, 0]);
        assert_eq!(expand_rgb565(0x001F), [0, 0, 255]);
    }

    #[test]
    fn test_every_pixel_value_matches_formula() {
        for p in 0..=u16::MAX {
            let rgb = expand_rgb565(p);
            assert_eq!(rgb, reference(p), "pixel {p:#06x}");
        }
    }

    #[test]
    fn test_expansion_is_monotonic_per_channel() {
        let mut last = 0u8;
        for r5 in 0..32u16 {
            let [r, _, _] = expand_rgb565(r5 << 11);
            assert!(r >= last);
            last = r;
        }
        let mut last = 0u8;
        for g6 in 0..64u16 {
            let [_, g, _] = expand_rgb565(g6 << 5);
            assert!(g >= last);
            last = g;
        }
    }

    #[test]
    fn test_pack_then_expand_keeps_extremes() {
        assert_eq!(expand_rgb565(pack_rgb888(255, 255, 255)), [255, 255, 255]);
        assert_eq!(expand_rgb565(pack_rgb888(0, 0, 0)), [0, 0, 0]);
        assert_eq!(pack_rgb888(255, 0, 0), 0xF800);
    }

    #[test]
    fn test_high_byte_first() {
        let src = [0xF8, 0x00, 0x00, 0x1F];
        let mut dst = [0u8; 6];
        let written = rgb565_to_rgb888(&src, 2, 1, &mut dst).unwrap();
        assert_eq!(written, 6);
        assert_eq!(dst, [255, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_all_zero_frame() {
        let src = vec![0u8; 96 * 96 * 2];
        let mut dst = vec![0xAAu8; 96 * 96 * 3];
        let written = rgb565_to_rgb888(&src, 96, 96, &mut dst).unwrap();
        assert_eq!(written, 96 * 96 * 3);
        assert!(dst.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_short_destination_is_detected() {
        let src = vec![0xFFu8; 4 * 4 * 2];
        let mut dst = vec![0u8; 4 * 4 * 3 - 1];
        let err = rgb565_to_rgb888(&src, 4, 4, &mut dst).unwrap_err();
        // Fifteen whole pixels fit before the cursor runs out.
        assert_eq!(
            err,
            ConvertError::ConversionSizeMismatch {
                expected: 48,
                written: 45
            }
        );
        assert!(dst[..45].iter().all(|&b| b == 255));
    }

    #[test]
    fn test_short_source_is_detected() {
        let src = vec![0u8; 4 * 3 * 2];
        let mut dst = vec![0u8; 4 * 4 * 3];
        let err = rgb565_to_rgb888(&src, 4, 4, &mut dst).unwrap_err();
        assert_eq!(
            err,
            ConvertError::ConversionSizeMismatch {
                expected: 48,
                written: 36
            }
        );
    }

    #[test]
    fn test_long_source_is_detected() {
        let src = vec![0u8; 5 * 4 * 2];
        let mut dst = vec![0u8; 5 * 4 * 3];
        let err = rgb565_to_rgb888(&src, 4, 4, &mut dst).unwrap_err();
        assert_eq!(
            err,
            ConvertError::ConversionSizeMismatch {
                expected: 48,
                written: 60
            }
        );
    }

    #[test]
    fn test_convert_frame_rejects_other_encodings() {
        let geometry = FrameGeometry::new(2, 2, PixelEncoding::Gray8);
        let frame = Frame::new(FrameId(0), geometry, vec![0u8; 4].into_boxed_slice()).unwrap();
        let mut dst = [0u8; 12];
        assert_eq!(
            convert_frame(&frame, &mut dst),
            Err(ConvertError::UnsupportedEncoding("gray8"))
        );
    }

    proptest! {
        #[test]
        fn prop_output_length_and_content(pixels in proptest::collection::vec(any::<u16>(), 1..256)) {
            let width = pixels.len() as u32;
            let src: Vec<u8> = pixels.iter().flat_map(|p| p.to_be_bytes()).collect();
            let mut dst = vec![0u8; pixels.len() * 3];

            let written = rgb565_to_rgb888(&src, width, 1, &mut dst).unwrap();
            prop_assert_eq!(written, pixels.len() * 3);
            for (p, rgb) in pixels.iter().zip(dst.chunks_exact(3)) {
                prop_assert_eq!(rgb, &reference(*p)[..]);
            }
        }
    }
}
