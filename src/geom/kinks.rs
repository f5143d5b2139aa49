//! Segment self-intersection search over sets of polygonal arcs.
//!
//! Mesh validation needs every pairwise crossing between triangle edges,
//! including degenerate contacts: T-touches count, endpoint-only touches do
//! not, and collinear overlaps contribute their subsumed endpoints. The
//! search partitions segments into horizontal stripes sized from the average
//! segment height, sorts each stripe by minimum x, and sweeps; the
//! intersection predicate itself is a pair of orientation-sign tests backed
//! by a parametric solve with endpoint snapping and range clamping for
//! near-degenerate input.

use std::collections::HashSet;

use super::point::Point2;

/// Flattened vertex arrays for a set of arcs (closed rings or open chains).
/// Vertex ids index the shared coordinate arrays; consecutive ids within one
/// arc form its segments.
pub struct SegmentSet {
    xx: Vec<f64>,
    yy: Vec<f64>,
    // Start offset of each arc in the coordinate arrays.
    starts: Vec<usize>,
    counts: Vec<usize>,
}

/// One detected crossing: the location plus both segments, each as an
/// ordered endpoint-id pair (collapsed to a single id when the crossing sits
/// exactly on that endpoint).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub point: Point2,
    pub seg_a: (usize, usize),
    pub seg_b: (usize, usize),
}

impl SegmentSet {
    #[must_use]
    pub fn new(arcs: &[Vec<Point2>]) -> Self {
        let total: usize = arcs.iter().map(Vec::len).sum();
        let mut xx = Vec::with_capacity(total);
        let mut yy = Vec::with_capacity(total);
        let mut starts = Vec::with_capacity(arcs.len());
        let mut counts = Vec::with_capacity(arcs.len());
        for arc in arcs {
            starts.push(xx.len());
            counts.push(arc.len());
            for p in arc {
                xx.push(p.x);
                yy.push(p.y);
            }
        }
        Self { xx, yy, starts, counts }
    }

    fn for_each_segment(&self, mut f: impl FnMut(usize, usize)) -> usize {
        let mut count = 0;
        for (&start, &n) in self.starts.iter().zip(&self.counts) {
            for k in 1..n {
                f(start + k - 1, start + k);
                count += 1;
            }
        }
        count
    }

    fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut it = self.xx.iter().zip(&self.yy);
        let (&x0, &y0) = it.next()?;
        let mut b = (x0, y0, x0, y0);
        for (&x, &y) in it {
            b.0 = b.0.min(x);
            b.1 = b.1.min(y);
            b.2 = b.2.max(x);
            b.3 = b.3.max(y);
        }
        Some(b)
    }

    /// Average |dx| and |dy| over all segments.
    fn average_segment(&self) -> (f64, f64) {
        let mut dx = 0.0;
        let mut dy = 0.0;
        let count = self.for_each_segment(|i, j| {
            dx += (self.xx[i] - self.xx[j]).abs();
            dy += (self.yy[i] - self.yy[j]).abs();
        });
        if count == 0 {
            (0.0, 0.0)
        } else {
            (dx / count as f64, dy / count as f64)
        }
    }

    /// Stripe count chosen so a stripe holds on the order of 20 average
    /// segment heights.
    fn stripe_count(&self) -> usize {
        let yrange = match self.bounds() {
            Some((_, ymin, _, ymax)) => ymax - ymin,
            None => 0.0,
        };
        let seg_len = self.average_segment().1;
        let mut count = 1usize;
        if seg_len > 0.0 && yrange > 0.0 {
            count = (yrange / seg_len / 20.0).ceil() as usize;
        }
        count.max(1)
    }

    /// All segment crossings, deduplicated by segment pair (a segment pair
    /// spanning several stripes is reported once).
    #[must_use]
    pub fn crossings(&self) -> Vec<Crossing> {
        let Some((_, ymin, _, ymax)) = self.bounds() else {
            return Vec::new();
        };
        let yrange = ymax - ymin;
        let stripe_count = self.stripe_count();
        log::debug!(
            "segment sweep: {} arcs, {} stripes",
            self.starts.len(),
            stripe_count
        );
        let stripe_id = |y: f64| -> usize {
            if stripe_count > 1 {
                (((stripe_count - 1) as f64 * (y - ymin)) / yrange).floor() as usize
            } else {
                0
            }
        };

        // Each segment lands in every stripe its y-range overlaps.
        let mut stripes: Vec<Vec<usize>> = vec![Vec::new(); stripe_count];
        self.for_each_segment(|id1, id2| {
            let mut s1 = stripe_id(self.yy[id1]);
            let s2 = stripe_id(self.yy[id2]);
            loop {
                stripes[s1].push(id1);
                stripes[s1].push(id2);
                if s1 == s2 {
                    break;
                }
                if s2 > s1 {
                    s1 += 1;
                } else {
                    s1 -= 1;
                }
            }
        });

        let mut seen: HashSet<((usize, usize), (usize, usize))> = HashSet::new();
        let mut out = Vec::new();
        for ids in &mut stripes {
            for crossing in intersect_stripe(ids, &self.xx, &self.yy) {
                if seen.insert((crossing.seg_a, crossing.seg_b)) {
                    out.push(crossing);
                }
            }
        }
        out
    }
}

/// Crossing points for a set of arcs, deduplicated by exact coordinate,
/// first-seen order.
#[must_use]
pub fn find_intersections(arcs: &[Vec<Point2>]) -> Vec<Point2> {
    let set = SegmentSet::new(arcs);
    let mut seen: HashSet<(u64, u64)> = HashSet::new();
    let mut out = Vec::new();
    for crossing in set.crossings() {
        let p = crossing.point.normalize_zero();
        if seen.insert((p.x.to_bits(), p.y.to_bits())) {
            out.push(p);
        }
    }
    out
}

/// Sweep one stripe. `ids` holds endpoint-id pairs; sorted here by ascending
/// minimum x so the scan can stop as soon as the next segment starts past
/// the current one's maximum x.
fn intersect_stripe(ids: &mut [usize], xx: &[f64], yy: &[f64]) -> Vec<Crossing> {
    let mut out = Vec::new();
    if ids.len() < 4 {
        return out;
    }
    sort_segment_ids(xx, ids);

    let lim = ids.len() - 2;
    let mut i = 0;
    while i < lim {
        let s1p1 = ids[i];
        let s1p2 = ids[i + 1];
        let s1p1x = xx[s1p1];
        let s1p2x = xx[s1p2];
        let s1p1y = yy[s1p1];
        let s1p2y = yy[s1p2];

        let mut j = i;
        while j < lim {
            j += 2;
            let s2p1 = ids[j];
            let s2p1x = xx[s2p1];
            if s1p2x < s2p1x {
                break; // every later segment starts past seg 1
            }
            let s2p1y = yy[s2p1];
            let s2p2 = ids[j + 1];
            let s2p2x = xx[s2p2];
            let s2p2y = yy[s2p2];

            // skip segments with non-overlapping y ranges
            if s1p1y >= s2p1y {
                if s1p1y > s2p2y && s1p2y > s2p1y && s1p2y > s2p2y {
                    continue;
                }
            } else if s1p1y < s2p2y && s1p2y < s2p1y && s1p2y < s2p2y {
                continue;
            }

            // segments adjacent in a path share a vertex id
            if s1p1 == s2p1 || s1p1 == s2p2 || s1p2 == s2p1 || s1p2 == s2p2 {
                continue;
            }

            let hit = segment_intersection(
                s1p1x, s1p1y, s1p2x, s1p2y, s2p1x, s2p1y, s2p2x, s2p2y,
            );
            if let Some(hit) = hit {
                let seg1 = (s1p1, s1p2);
                let seg2 = (s2p1, s2p2);
                let (first, second) = hit.points();
                out.push(format_crossing(first, seg1, seg2, xx, yy));
                if let Some(second) = second {
                    // collinear segments may subsume two endpoints
                    out.push(format_crossing(second, seg1, seg2, xx, yy));
                }
            }
        }
        i += 2;
    }
    out
}

/// Intersection of two closed 2D segments.
///
/// Touches at an endpoint of *both* segments do not count; a T-touch does;
/// collinear partial overlap yields each subsumed endpoint (one or two).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentHit {
    Single(Point2),
    Double(Point2, Point2),
}

impl SegmentHit {
    fn points(self) -> (Point2, Option<Point2>) {
        match self {
            Self::Single(p) => (p, None),
            Self::Double(p, q) => (p, Some(q)),
        }
    }
}

#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn segment_intersection(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> Option<SegmentHit> {
    if !segment_hit(ax, ay, bx, by, cx, cy, dx, dy) {
        return None;
    }
    match cross_intersection(ax, ay, bx, by, cx, cy, dx, dy) {
        Some(p) => {
            if endpoint_hit(ax, ay, bx, by, cx, cy, dx, dy) {
                None
            } else {
                Some(SegmentHit::Single(p))
            }
        }
        // a null parametric solve means the segments are collinear
        None => collinear_intersection(ax, ay, bx, by, cx, cy, dx, dy),
    }
}

// Orientation-sign crossing test; survives floating-point trouble that
// defeats slope comparison.
fn segment_hit(ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64, dx: f64, dy: f64) -> bool {
    orient2d(ax, ay, bx, by, cx, cy) * orient2d(ax, ay, bx, by, dx, dy) <= 0.0
        && orient2d(cx, cy, dx, dy, ax, ay) * orient2d(cx, cy, dx, dy, bx, by) <= 0.0
}

/// Positive when a, b, c wind counterclockwise, negative clockwise, zero
/// collinear.
fn orient2d(ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64) -> f64 {
    determinant2d(ax - cx, ay - cy, bx - cx, by - cy)
}

fn determinant2d(a: f64, b: f64, c: f64, d: f64) -> f64 {
    a * d - b * c
}

/// Crossing point of two non-collinear segments already known to intersect.
#[allow(clippy::too_many_arguments)]
fn cross_intersection(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> Option<Point2> {
    let mut p = line_intersection(ax, ay, bx, by, cx, cy, dx, dy);
    if let Some(point) = p {
        // Re-order operands so the solve starts nearest the intersection;
        // improves precision for long skewed segments.
        p = match nearest_operand(point, ax, ay, bx, by, cx, cy, dx, dy) {
            1 => line_intersection(bx, by, ax, ay, cx, cy, dx, dy),
            2 => line_intersection(cx, cy, dx, dy, ax, ay, bx, by),
            3 => line_intersection(dx, dy, cx, cy, ax, ay, bx, by),
            _ => p,
        };
    }
    p.map(|point| clamp_intersection(point, ax, ay, bx, by, cx, cy, dx, dy))
}

#[allow(clippy::too_many_arguments)]
fn line_intersection(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> Option<Point2> {
    let den = determinant2d(bx - ax, by - ay, dx - cx, dy - cy);
    let eps = 1e-18;
    if den == 0.0 {
        return None;
    }
    let m = orient2d(cx, cy, dx, dy, ax, ay) / den;
    if (-eps..=eps).contains(&den) {
        // tiny denominator, low precision: fall back to an endpoint lying
        // inside both ranges
        find_endpoint_in_range(ax, ay, bx, by, cx, cy, dx, dy)
    } else {
        Some(Point2::new(ax + m * (bx - ax), ay + m * (by - ay)))
    }
}

#[allow(clippy::too_many_arguments)]
fn find_endpoint_in_range(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> Option<Point2> {
    if !outside_range(ax, cx, dx) && !outside_range(ay, cy, dy) {
        Some(Point2::new(ax, ay))
    } else if !outside_range(bx, cx, dx) && !outside_range(by, cy, dy) {
        Some(Point2::new(bx, by))
    } else if !outside_range(cx, ax, bx) && !outside_range(cy, ay, by) {
        Some(Point2::new(cx, cy))
    } else if !outside_range(dx, ax, bx) && !outside_range(dy, ay, by) {
        Some(Point2::new(dx, dy))
    } else {
        None
    }
}

// Is coordinate `a` outside the closed range spanned by `b` and `c`?
fn outside_range(a: f64, b: f64, c: f64) -> bool {
    if b < c {
        a < b || a > c
    } else if b > c {
        a > b || a < c
    } else {
        a != b
    }
}

/// Index (0..=3) of the operand point nearest to `p`.
#[allow(clippy::too_many_arguments)]
fn nearest_operand(
    p: Point2,
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> usize {
    let candidates = [(ax, ay), (bx, by), (cx, cy), (dx, dy)];
    let mut min_idx = 0;
    let mut min_dist = f64::INFINITY;
    for (idx, (x, y)) in candidates.iter().enumerate() {
        let dist = (p.x - x) * (p.x - x) + (p.y - y) * (p.y - y);
        if dist < min_dist {
            min_dist = dist;
            min_idx = idx;
        }
    }
    min_idx
}

// An intersection point may drift just outside either segment's coordinate
// range when one segment is vertical or horizontal; snap it back.
#[allow(clippy::too_many_arguments)]
fn clamp_intersection(
    p: Point2,
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> Point2 {
    let mut x = clamp_to_close_range(p.x, ax, bx);
    x = clamp_to_close_range(x, cx, dx);
    let mut y = clamp_to_close_range(p.y, ay, by);
    y = clamp_to_close_range(y, cy, dy);
    Point2::new(x, y)
}

fn clamp_to_close_range(a: f64, b: f64, c: f64) -> f64 {
    if outside_range(a, b, c) {
        if (a - b).abs() < (a - c).abs() { b } else { c }
    } else {
        a
    }
}

/// For collinear overlapping segments: each endpoint strictly inside the
/// combined span counts. Two coincident interior endpoints mean the segments
/// only meet in the middle, which does not count.
#[allow(clippy::too_many_arguments)]
fn collinear_intersection(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    cx: f64,
    cy: f64,
    dx: f64,
    dy: f64,
) -> Option<SegmentHit> {
    let min_x = ax.min(bx).min(cx).min(dx);
    let max_x = ax.max(bx).max(cx).max(dx);
    let min_y = ay.min(by).min(cy).min(dy);
    let max_y = ay.max(by).max(cy).max(dy);
    let use_y = max_y - min_y > max_x - min_x;

    let mut coords: Vec<Point2> = Vec::with_capacity(2);
    let mut push_if_inside = |px: f64, py: f64| {
        let probe = if use_y { py } else { px };
        let (lo, hi) = if use_y { (min_y, max_y) } else { (min_x, max_x) };
        if probe > lo && probe < hi {
            coords.push(Point2::new(px, py));
        }
    };
    push_if_inside(ax, ay);
    push_if_inside(bx, by);
    push_if_inside(cx, cy);
    push_if_inside(dx, dy);

    match coords.len() {
        1 => Some(SegmentHit::Single(coords[0])),
        2 => {
            if coords[0] == coords[1] {
                None
            } else {
                Some(SegmentHit::Double(coords[0], coords[1]))
            }
        }
        _ => None,
    }
}

fn endpoint_hit(ax: f64, ay: f64, bx: f64, by: f64, cx: f64, cy: f64, dx: f64, dy: f64) -> bool {
    (ax == cx && ay == cy)
        || (ax == dx && ay == dy)
        || (bx == cx && by == cy)
        || (bx == dx && by == dy)
}

fn format_crossing(
    point: Point2,
    seg1: (usize, usize),
    seg2: (usize, usize),
    xx: &[f64],
    yy: &[f64],
) -> Crossing {
    let a = format_segment(point, seg1, xx, yy);
    let b = format_segment(point, seg2, xx, yy);
    if a.0 < b.0 {
        Crossing { point, seg_a: a, seg_b: b }
    } else {
        Crossing { point, seg_a: b, seg_b: a }
    }
}

// Order the endpoint pair; collapse it when the crossing sits exactly on one
// endpoint, so coincident touches key identically across stripes.
fn format_segment(
    point: Point2,
    seg: (usize, usize),
    xx: &[f64],
    yy: &[f64],
) -> (usize, usize) {
    let (mut i, mut j) = if seg.0 < seg.1 { (seg.0, seg.1) } else { (seg.1, seg.0) };
    if xx[i] == point.x && yy[i] == point.y {
        j = i;
    } else if xx[j] == point.x && yy[j] == point.y {
        i = j;
    }
    (i, j)
}

// ─────────────────────────────────────────────────────────────────────────────
// Segment-id sorting
// ─────────────────────────────────────────────────────────────────────────────

/// Sort endpoint-id pairs in place so that `xx[ids[2k]] <= xx[ids[2k+1]]`
/// and pairs ascend by their first (minimum) x.
fn sort_segment_ids(xx: &[f64], ids: &mut [usize]) {
    order_segment_ids(xx, ids);
    quicksort_segment_ids(xx, ids, 0, ids.len() as i64 - 2);
}

fn order_segment_ids(xx: &[f64], ids: &mut [usize]) {
    let mut i = 0;
    while i < ids.len() {
        if xx[ids[i]] > xx[ids[i + 1]] {
            ids.swap(i, i + 1);
        }
        i += 2;
    }
}

fn quicksort_segment_ids(a: &[f64], ids: &mut [usize], mut lo: i64, mut hi: i64) {
    let mut i = lo;
    let mut j = hi;
    while i < hi {
        // mid-range pivot avoids quadratic behavior on sorted input
        let pivot = a[ids[((((lo + hi) >> 2) << 1) as usize)]];
        while i <= j {
            while a[ids[i as usize]] < pivot {
                i += 2;
            }
            while a[ids[j as usize]] > pivot {
                j -= 2;
            }
            if i <= j {
                ids.swap(i as usize, j as usize);
                ids.swap(i as usize + 1, j as usize + 1);
                i += 2;
                j -= 2;
            }
        }

        if j - lo < 40 {
            insertion_sort_segment_ids(a, ids, lo, j);
        } else {
            quicksort_segment_ids(a, ids, lo, j);
        }
        if hi - i < 40 {
            insertion_sort_segment_ids(a, ids, i, hi);
            return;
        }
        lo = i;
        j = hi;
    }
}

fn insertion_sort_segment_ids(arr: &[f64], ids: &mut [usize], start: i64, end: i64) {
    let mut j = start + 2;
    while j <= end {
        let id = ids[j as usize];
        let id2 = ids[j as usize + 1];
        let mut i = j - 2;
        while i >= start && arr[id] < arr[ids[i as usize]] {
            ids[i as usize + 2] = ids[i as usize];
            ids[i as usize + 3] = ids[i as usize + 1];
            i -= 2;
        }
        ids[(i + 2) as usize] = id;
        ids[(i + 3) as usize] = id2;
        j += 2;
    }
}
