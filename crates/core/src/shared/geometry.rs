//! Geometric primitives shared by the tracker and the feature state machines:
//! reference-point selection, point-in-polygon, and line-segment intersection
//! with directional sign.

/// A 2-D point, normalized to `[0,1]^2` unless noted otherwise.
pub type Point = (f64, f64);

/// Which point on a detection's bbox is used for geometric tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CentroidMode {
    /// Bbox top-center.
    Head,
    /// Bbox bottom-center.
    Bottom,
    /// Bbox center.
    #[default]
    MidCentre,
}

/// Reference point for a normalized bbox `(x1, y1, x2, y2)` under `mode`.
pub fn reference_point(bbox: [f64; 4], mode: CentroidMode) -> Point {
    let [x1, y1, x2, y2] = bbox;
    match mode {
        CentroidMode::Head => ((x1 + x2) / 2.0, y1),
        CentroidMode::Bottom => ((x1 + x2) / 2.0, y2),
        CentroidMode::MidCentre => ((x1 + x2) / 2.0, (y1 + y2) / 2.0),
    }
}

/// Ray-casting (even-odd rule) point-in-polygon test.
///
/// Convention: a point exactly on the upper edge of the polygon (where
/// `y == min(p1.y, p2.y)`) is classified as *outside*; a point on the lower
/// edge (`y == max(p1.y, p2.y)`) participates in the crossing count. This
/// is the natural behavior of the classic PNPOLY scan and is the rule this
/// engine documents and tests (spec's on-edge convention, §8).
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let (x, y) = point;
    let mut inside = false;
    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (p1x, p1y) = polygon[i];
        let (p2x, p2y) = polygon[j];
        if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) {
            let xinters = if p1y != p2y {
                (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x
            } else {
                x
            };
            if p1x == p2x || x <= xinters {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Strict counter-clockwise orientation test used for segment intersection.
///
/// Returns `true`/`false` rather than a signed magnitude; colinear points
/// compare equal and therefore never flip the orientation, which is what
/// makes an exactly-colinear crossing register as "no intersection" below.
fn ccw(a: Point, b: Point, c: Point) -> bool {
    (c.1 - a.1) * (b.0 - a.0) > (b.1 - a.1) * (c.0 - a.0)
}

/// Whether segment `(p1, p2)` intersects segment `(p3, p4)`, using the
/// standard CCW test. Strict inequality in `ccw` means an exactly colinear
/// touch is *not* an intersection (spec §8 boundary behavior).
pub fn segments_intersect(p1: Point, p2: Point, p3: Point, p4: Point) -> bool {
    ccw(p1, p3, p4) != ccw(p2, p3, p4) && ccw(p1, p2, p3) != ccw(p1, p2, p4)
}

/// Orientation of a configured line zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineOrientation {
    Horizontal,
    Vertical,
    Diagonal,
}

/// Which side of a line counts as "in".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineDirection {
    Upward,
    Downward,
    Leftward,
    Rightward,
}

/// Sign of crossing direction relative to a line's declared "in" side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossingSign {
    In,
    Out,
}

/// Sign of the dot product between the line's normal `(-dy, dx)` and the
/// motion vector `(prev -> curr)`, mapped to "in"/"out" per the
/// `(orientation, direction)` branch table: for a horizontal line,
/// `downward`/`rightward`/`leftward` treat a positive dot as "in" and
/// `upward` inverts it; for a vertical (or diagonal) line, `rightward`
/// treats positive as "in", `leftward` inverts it, and `upward`/`downward`
/// treat positive as "in". This mirrors
/// `original_source/yoi/features/line_cross.py`'s `_check_line_crossing`
/// exactly, including its fallback of non-horizontal orientations onto the
/// vertical branch.
pub fn crossing_sign(
    line_start: Point,
    line_end: Point,
    prev: Point,
    curr: Point,
    orientation: LineOrientation,
    direction: LineDirection,
) -> Option<CrossingSign> {
    let dx = line_end.0 - line_start.0;
    let dy = line_end.1 - line_start.1;
    let normal = (-dy, dx);

    let motion = (curr.0 - prev.0, curr.1 - prev.1);
    let dot = motion.0 * normal.0 + motion.1 * normal.1;
    if dot == 0.0 {
        return None;
    }

    let is_in = match orientation {
        LineOrientation::Horizontal => match direction {
            LineDirection::Upward => dot < 0.0,
            _ => dot > 0.0,
        },
        LineOrientation::Vertical | LineOrientation::Diagonal => match direction {
            LineDirection::Leftward => dot < 0.0,
            _ => dot > 0.0,
        },
    };

    Some(if is_in { CrossingSign::In } else { CrossingSign::Out })
}

/// Euclidean distance between two normalized points.
pub fn distance(a: Point, b: Point) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn reference_point_modes() {
        let bbox = [0.2, 0.3, 0.6, 0.9];
        assert_eq!(reference_point(bbox, CentroidMode::Head), (0.4, 0.3));
        assert_eq!(reference_point(bbox, CentroidMode::Bottom), (0.4, 0.9));
        assert_eq!(reference_point(bbox, CentroidMode::MidCentre), (0.4, 0.6));
    }

    #[rstest]
    #[case((0.5, 0.5), true)]
    #[case((0.0, 0.0), false)]
    #[case((2.0, 2.0), false)]
    fn point_in_polygon_square(#[case] point: Point, #[case] expected: bool) {
        let square = vec![(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)];
        assert_eq!(point_in_polygon(point, &square), expected);
    }

    #[test]
    fn point_on_upper_edge_is_outside() {
        // Upper edge of the square is y == 0.1 (the min y among its edges).
        let square = vec![(0.1, 0.1), (0.9, 0.1), (0.9, 0.9), (0.1, 0.9)];
        assert!(!point_in_polygon((0.5, 0.1), &square));
    }

    #[test]
    fn degenerate_polygon_is_never_inside() {
        assert!(!point_in_polygon((0.5, 0.5), &[(0.0, 0.0), (1.0, 1.0)]));
    }

    #[test]
    fn colinear_touch_is_not_an_intersection() {
        // p1,p2,p3,p4 all on the same horizontal line: no intersection per
        // the strict CCW test.
        assert!(!segments_intersect(
            (0.0, 0.5),
            (1.0, 0.5),
            (0.2, 0.5),
            (0.8, 0.5)
        ));
    }

    #[test]
    fn crossing_segments_intersect() {
        assert!(segments_intersect(
            (0.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (1.0, 0.0)
        ));
    }

    #[test]
    fn horizontal_downward_motion_is_in() {
        let sign = crossing_sign(
            (0.30, 0.30),
            (0.71, 0.30),
            (0.5, 0.29),
            (0.5, 0.33),
            LineOrientation::Horizontal,
            LineDirection::Downward,
        );
        assert_eq!(sign, Some(CrossingSign::In));
    }

    #[test]
    fn horizontal_upward_motion_is_out_for_downward_line() {
        let sign = crossing_sign(
            (0.30, 0.30),
            (0.71, 0.30),
            (0.5, 0.33),
            (0.5, 0.29),
            LineOrientation::Horizontal,
            LineDirection::Downward,
        );
        assert_eq!(sign, Some(CrossingSign::Out));
    }

    #[test]
    fn horizontal_upward_line_inverts_sign() {
        // orientation=horizontal, direction=upward: dot<0 is "in" (the one
        // branch where the python table flips away from "dot>0 => in").
        let sign = crossing_sign(
            (0.30, 0.30),
            (0.71, 0.30),
            (0.5, 0.33),
            (0.5, 0.29),
            LineOrientation::Horizontal,
            LineDirection::Upward,
        );
        assert_eq!(sign, Some(CrossingSign::In));
    }

    #[test]
    fn vertical_leftward_line_inverts_sign() {
        // line normal (-dy, dx) = (-0.6, 0); motion (+0.02, 0) dots to a
        // negative value, which the leftward branch maps to "in".
        let sign = crossing_sign(
            (0.50, 0.20),
            (0.50, 0.80),
            (0.49, 0.5),
            (0.51, 0.5),
            LineOrientation::Vertical,
            LineDirection::Leftward,
        );
        assert_eq!(sign, Some(CrossingSign::In));
    }

    #[test]
    fn vertical_rightward_line_treats_positive_dot_as_in() {
        // same normal; motion (-0.02, 0) dots to a positive value, which the
        // rightward branch (the default, non-inverted case) maps to "in".
        let sign = crossing_sign(
            (0.50, 0.20),
            (0.50, 0.80),
            (0.51, 0.5),
            (0.49, 0.5),
            LineOrientation::Vertical,
            LineDirection::Rightward,
        );
        assert_eq!(sign, Some(CrossingSign::In));
    }
}
