use cluster_common::{DVec2, Rect};

/// Voronoi cell of every site, clipped to `bounds`.
///
/// Each cell starts as the bounds rectangle and is cut by the half-plane of
/// points closer to its site than to each other site. Vertices are in
/// counter-clockwise order. A site sharing its position with another is cut
/// by neither, so coincident sites get identical cells.
pub fn compute_cells(sites: &[DVec2], bounds: Rect) -> Vec<Vec<DVec2>> {
    let corners = vec![
        bounds.min,
        bounds.bottom_right(),
        bounds.max,
        bounds.top_left(),
    ];
    sites
        .iter()
        .enumerate()
        .map(|(ix, site)| {
            let mut cell = corners.clone();
            for (jx, other) in sites.iter().enumerate() {
                if ix == jx || site == other {
                    continue;
                }
                cell = clip_half_plane(&cell, *site, *other);
                if cell.is_empty() {
                    break;
                }
            }
            cell
        })
        .collect()
}

/// Sutherland-Hodgman step: keep the part of `polygon` that is at least as
/// close to `site` as to `other`.
fn clip_half_plane(polygon: &[DVec2], site: DVec2, other: DVec2) -> Vec<DVec2> {
    let normal = other - site;
    let midpoint = (site + other) * 0.5;
    let side = |p: DVec2| (p - midpoint).dot(normal);

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for (ix, &current) in polygon.iter().enumerate() {
        let previous = polygon[(ix + polygon.len() - 1) % polygon.len()];
        let (dc, dp) = (side(current), side(previous));
        if dc <= 0.0 {
            if dp > 0.0 {
                out.push(previous + (current - previous) * (dp / (dp - dc)));
            }
            out.push(current);
        } else if dp <= 0.0 {
            out.push(previous + (current - previous) * (dp / (dp - dc)));
        }
    }
    out.dedup();
    out
}
