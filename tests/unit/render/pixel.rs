use super::*;

fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
    rgba.repeat((w * h) as usize)
}

#[test]
fn nv12_of_white_and_black() {
    let mut out = Vec::new();
    rgba_to_nv12(&solid(4, 2, [255, 255, 255, 255]), 4, 2, &mut out).unwrap();
    assert_eq!(out.len(), 4 * 2 + 2 * 1 * 2);
    assert!(out[..8].iter().all(|&y| y == 255));
    assert!(out[8..].iter().all(|&c| c == 128));

    rgba_to_nv12(&solid(4, 2, [0, 0, 0, 255]), 4, 2, &mut out).unwrap();
    assert!(out[..8].iter().all(|&y| y == 0));
    assert!(out[8..].iter().all(|&c| c == 128));
}

#[test]
fn nv12_of_pure_red() {
    let mut out = Vec::new();
    rgba_to_nv12(&solid(2, 2, [255, 0, 0, 255]), 2, 2, &mut out).unwrap();
    assert_eq!(&out[..4], &[77, 77, 77, 77]);
    assert_eq!(out[4], 85); // Cb
    assert_eq!(out[5], 255); // Cr
}

#[test]
fn nv12_rejects_odd_or_short_input() {
    let mut out = Vec::new();
    assert!(rgba_to_nv12(&solid(3, 2, [0, 0, 0, 255]), 3, 2, &mut out).is_err());
    assert!(rgba_to_nv12(&[0u8; 8], 2, 2, &mut out).is_err());
}

#[test]
fn flatten_premul_alpha_0_returns_bg() {
    let mut px = vec![0u8, 0, 0, 0];
    flatten_premul_over_bg(&mut px, [10, 20, 30, 255]).unwrap();
    assert_eq!(px, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_premul_alpha_255_is_identity() {
    let mut px = vec![1u8, 2, 3, 255];
    flatten_premul_over_bg(&mut px, [10, 20, 30, 255]).unwrap();
    assert_eq!(px, vec![1, 2, 3, 255]);
}

#[test]
fn pixel_frame_checks_byte_length() {
    let pts = PresentationTime {
        index: FrameIndex(0),
        secs: 0.0,
    };
    assert!(PixelFrame::new(pts, PixelFormat::Nv12FullRange, 4, 2, vec![0; 12]).is_ok());
    assert!(PixelFrame::new(pts, PixelFormat::Nv12FullRange, 4, 2, vec![0; 11]).is_err());
    assert!(PixelFrame::new(pts, PixelFormat::Rgba8, 4, 2, vec![0; 32]).is_ok());
}
