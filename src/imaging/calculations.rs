//! Pure calculation functions for rendition geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Snap a rotation in degrees to the nearest quarter turn in `0..360`.
///
/// ```
/// # use photo_publish::imaging::calculations::normalize_rotation;
/// assert_eq!(normalize_rotation(90), 90);
/// assert_eq!(normalize_rotation(100), 90);
/// assert_eq!(normalize_rotation(350), 0);
/// assert_eq!(normalize_rotation(450), 90);
/// ```
pub fn normalize_rotation(degrees: u16) -> u16 {
    let quarter_turns = (u32::from(degrees) + 45) / 90;
    ((quarter_turns % 4) * 90) as u16
}

/// Dimensions after applying a (normalized) rotation.
pub fn rotated_dimensions(source: (u32, u32), rotation: u16) -> (u32, u32) {
    match normalize_rotation(rotation) {
        90 | 270 => (source.1, source.0),
        _ => source,
    }
}

/// Largest size with the source aspect ratio that fits inside `bounds`.
///
/// Never upscales: a source already inside the box keeps its size. Each
/// edge is at least one pixel.
///
/// ```
/// # use photo_publish::imaging::calculations::fit_within;
/// assert_eq!(fit_within((4000, 3000), (200, 200)), (200, 150));
/// assert_eq!(fit_within((3000, 4000), (200, 200)), (150, 200));
/// assert_eq!(fit_within((100, 50), (200, 200)), (100, 50));
/// ```
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    if src_w == 0 || src_h == 0 {
        return (src_w.max(1), src_h.max(1));
    }
    if src_w <= max_w && src_h <= max_h {
        return source;
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}

/// Intermediate and final sizes for a progressive downscale.
///
/// Sizes shrink geometrically from `source` to `target` over `steps` steps.
/// The last entry is always `target`. Returns an empty list when no resize
/// is needed.
pub fn step_sizes(source: (u32, u32), target: (u32, u32), steps: u32) -> Vec<(u32, u32)> {
    if source == target {
        return Vec::new();
    }
    let steps = steps.max(1);
    let ratio_w = target.0 as f64 / source.0.max(1) as f64;
    let ratio_h = target.1 as f64 / source.1.max(1) as f64;

    let mut sizes: Vec<(u32, u32)> = Vec::with_capacity(steps as usize);
    for i in 1..steps {
        let t = i as f64 / steps as f64;
        let w = (source.0 as f64 * ratio_w.powf(t)).round() as u32;
        let h = (source.1 as f64 * ratio_h.powf(t)).round() as u32;
        let size = (w.max(target.0), h.max(target.1));
        if sizes.last() != Some(&size) && size != source {
            sizes.push(size);
        }
    }
    if sizes.last() != Some(&target) {
        sizes.push(target);
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_snaps_to_quarter_turns() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(44), 0);
        assert_eq!(normalize_rotation(45), 90);
        assert_eq!(normalize_rotation(180), 180);
        assert_eq!(normalize_rotation(269), 270);
        assert_eq!(normalize_rotation(360), 0);
    }

    #[test]
    fn rotated_dimensions_swap_on_odd_quarter_turns() {
        assert_eq!(rotated_dimensions((400, 300), 90), (300, 400));
        assert_eq!(rotated_dimensions((400, 300), 180), (400, 300));
        assert_eq!(rotated_dimensions((400, 300), 270), (300, 400));
    }

    #[test]
    fn fit_landscape_into_box() {
        assert_eq!(fit_within((1600, 1200), (800, 800)), (800, 600));
    }

    #[test]
    fn fit_portrait_into_box() {
        assert_eq!(fit_within((1200, 1600), (800, 800)), (600, 800));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(fit_within((300, 200), (800, 600)), (300, 200));
    }

    #[test]
    fn fit_tiny_result_is_at_least_one_pixel() {
        assert_eq!(fit_within((10000, 10), (100, 100)), (100, 1));
    }

    #[test]
    fn single_step_goes_straight_to_target() {
        assert_eq!(step_sizes((1000, 800), (100, 80), 1), vec![(100, 80)]);
    }

    #[test]
    fn multiple_steps_shrink_monotonically_to_target() {
        let sizes = step_sizes((1600, 1200), (100, 75), 4);
        assert_eq!(sizes.len(), 4);
        assert_eq!(*sizes.last().unwrap(), (100, 75));
        for pair in sizes.windows(2) {
            assert!(pair[0].0 > pair[1].0);
            assert!(pair[0].1 > pair[1].1);
        }
        assert!(sizes[0].0 < 1600);
    }

    #[test]
    fn no_steps_when_sizes_match() {
        assert!(step_sizes((640, 480), (640, 480), 3).is_empty());
    }

    #[test]
    fn zero_steps_treated_as_one() {
        assert_eq!(step_sizes((200, 100), (20, 10), 0), vec![(20, 10)]);
    }
}
