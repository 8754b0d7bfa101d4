use yomi_types::{Point, Rect};

/// Largest fraction of `target` covered by any single occluder, 0..=1
pub fn occlusion_ratio(target: Rect, occluders: &[Rect]) -> f64 {
    let target_area = i64::from(target.width.max(1)) * i64::from(target.height.max(1));

    let covered = occluders
        .iter()
        .filter_map(|rect| target.intersect(rect))
        .map(|overlap| overlap.area())
        .max()
        .unwrap_or(0);

    (covered as f64 / target_area as f64).clamp(0.0, 1.0)
}

pub fn is_significant_occlusion(ratio: f64, threshold: f64) -> bool {
    ratio >= threshold.clamp(0.01, 1.0)
}

/// Client rectangle expressed in the coordinates of a captured bitmap whose
/// top-left pixel sits at `origin` on screen
pub fn client_crop_rect(client: Rect, origin: Point) -> Rect {
    client.offset(-origin.x, -origin.y)
}
