use super::*;
use crate::foundation::core::Point;

const EPS: f64 = 1e-9;

fn assert_point_near(got: Point, want: Point) {
    assert!(
        (got.x - want.x).abs() < EPS && (got.y - want.y).abs() < EPS,
        "got {got:?}, want {want:?}"
    );
}

fn assert_affine_near(got: Affine, want: Affine) {
    for (g, w) in got.as_coeffs().iter().zip(want.as_coeffs().iter()) {
        assert!((g - w).abs() < EPS, "got {got:?}, want {want:?}");
    }
}

/// Map a point given in oriented source space back to natural space, then run the layer
/// transform over it. This is what the compositor does for each source pixel.
fn map_oriented(t: Affine, natural: Size, orientation: Affine, p: Point) -> Point {
    let bounds = oriented_bounds(natural, orientation);
    let oriented_raw = Point::new(p.x + bounds.x0, p.y + bounds.y0);
    let natural_pt = orientation.inverse() * oriented_raw;
    t * natural_pt
}

fn corners(r: Rect) -> [Point; 4] {
    [
        Point::new(r.x0, r.y0),
        Point::new(r.x1, r.y0),
        Point::new(r.x0, r.y1),
        Point::new(r.x1, r.y1),
    ]
}

#[test]
fn crop_corners_land_on_render_rect() {
    let natural = Size::new(1080.0, 1920.0);
    let render = RenderSize::new(312, 424).unwrap();
    let crop = CropRect::new(0.0, 0.0, 500.0, 1920.0).unwrap();
    let orientation = Orientation::UP.to_affine();

    let t = compute_layer_transform(natural, orientation, crop, render);
    let want = corners(Rect::new(0.0, 0.0, 312.0, 424.0));
    for (c, w) in corners(crop.rect()).into_iter().zip(want) {
        assert_point_near(map_oriented(t, natural, orientation, c), w);
    }
}

#[test]
fn crop_corners_land_on_render_rect_for_every_orientation() {
    let natural = Size::new(1920.0, 1080.0);
    let render = RenderSize::new(320, 240).unwrap();
    let crop = CropRect::new(40.0, 100.0, 600.0, 450.0).unwrap();
    let want = corners(Rect::new(0.0, 0.0, 320.0, 240.0));

    for rotation in [0.0, 90.0, 180.0, 270.0] {
        for mirrored in [false, true] {
            let orientation = Orientation::from_rotation_degrees(rotation, mirrored).to_affine();
            let t = compute_layer_transform(natural, orientation, crop, render);
            for (c, w) in corners(crop.rect()).into_iter().zip(want) {
                assert_point_near(map_oriented(t, natural, orientation, c), w);
            }
        }
    }
}

#[test]
fn full_frame_crop_at_natural_size_is_identity() {
    let natural = Size::new(1080.0, 1920.0);
    let render = RenderSize::new(1080, 1920).unwrap();
    let crop = CropRect::new(0.0, 0.0, 1080.0, 1920.0).unwrap();

    let t = compute_layer_transform(natural, Affine::IDENTITY, crop, render);
    assert_affine_near(t, Affine::IDENTITY);
}

#[test]
fn computation_is_deterministic() {
    let natural = Size::new(1080.0, 1920.0);
    let render = RenderSize::new(312, 424).unwrap();
    let crop = CropRect::new(13.5, 7.25, 500.0, 1000.0).unwrap();
    let orientation = Orientation::from_rotation_degrees(90.0, false).to_affine();

    let a = compute_layer_transform(natural, orientation, crop, render);
    let b = compute_layer_transform(natural, orientation, crop, render);
    assert_eq!(a.as_coeffs(), b.as_coeffs());
}

#[test]
fn portrait_rotation_maps_natural_top_left_to_right_edge() {
    // A 1920x1080 landscape-coded frame displayed rotated 90 degrees clockwise.
    let natural = Size::new(1920.0, 1080.0);
    let orientation = Orientation::from_rotation_degrees(90.0, false).to_affine();
    let bounds = oriented_bounds(natural, orientation);
    assert!((bounds.width() - 1080.0).abs() < EPS);
    assert!((bounds.height() - 1920.0).abs() < EPS);

    let render = RenderSize::new(1080, 1920).unwrap();
    let crop = CropRect::new(0.0, 0.0, 1080.0, 1920.0).unwrap();
    let t = compute_layer_transform(natural, orientation, crop, render);
    assert_point_near(t * Point::new(0.0, 0.0), Point::new(1080.0, 0.0));
    assert_point_near(t * Point::new(1920.0, 1080.0), Point::new(0.0, 1920.0));
}

#[test]
fn orientation_snaps_and_normalizes_degrees() {
    assert_eq!(
        Orientation::from_rotation_degrees(-90.0, false).rotation_cw,
        270
    );
    assert_eq!(Orientation::from_rotation_degrees(450.0, false).rotation_cw, 90);
    assert_eq!(Orientation::from_rotation_degrees(179.2, false).rotation_cw, 180);
    assert_eq!(Orientation::from_rotation_degrees(f64::NAN, false), Orientation::UP);
    assert!(Orientation::from_rotation_degrees(270.0, false).swaps_axes());
    assert!(!Orientation::UP.swaps_axes());
}
