//! Table geometry: polygonal cushions and circular pockets
//!
//! Cushions are solid closed polygons sitting outside the playing area. Each
//! one keeps its edges as precomputed segments with outward normals, plus a
//! bounding box used to skip exact tests.

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::params::Params;

/// Axis-aligned box in the table plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec2,
    pub max: DVec2,
}

impl Aabb {
    pub fn from_points(points: &[DVec2]) -> Self {
        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    /// Box swept by a point moving from `from` to `to`, grown by `margin`
    pub fn swept(from: DVec2, to: DVec2, margin: f64) -> Self {
        Self {
            min: from.min(to) - DVec2::splat(margin),
            max: from.max(to) + DVec2::splat(margin),
        }
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

/// One edge of a cushion polygon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: DVec2,
    pub end: DVec2,
    /// Unit direction start → end
    pub dir: DVec2,
    pub length: f64,
    /// Unit normal pointing out of the cushion
    pub normal: DVec2,
}

impl Segment {
    fn new(start: DVec2, end: DVec2, clockwise: bool) -> Self {
        let delta = end - start;
        let length = delta.length();
        let dir = delta / length;
        // Outward normal is the right-hand perpendicular for CCW loops
        let normal = if clockwise {
            DVec2::new(-dir.y, dir.x)
        } else {
            DVec2::new(dir.y, -dir.x)
        };
        Self {
            start,
            end,
            dir,
            length,
            normal,
        }
    }

    /// Closest point on the finite segment
    pub fn closest_point(&self, p: DVec2) -> DVec2 {
        let t = (p - self.start).dot(self.dir).clamp(0.0, self.length);
        self.start + self.dir * t
    }
}

/// Closest boundary point of a cushion to a query point
#[derive(Debug, Clone, Copy)]
pub struct BoundaryHit {
    pub point: DVec2,
    /// Unit normal from the boundary toward the query point's free side
    pub normal: DVec2,
    /// Distance from the boundary (negative when the point is inside)
    pub distance: f64,
}

/// A static cushion polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cushion {
    pub id: u32,
    /// Closed loop, last vertex connects back to the first
    pub vertices: Vec<DVec2>,
    pub bounds: Aabb,
    pub segments: Vec<Segment>,
    pub restitution: f64,
    pub friction: f64,
}

impl Cushion {
    pub fn new(id: u32, vertices: Vec<DVec2>, restitution: f64, friction: f64) -> Self {
        assert!(vertices.len() >= 3, "cushion {id} needs at least three vertices");
        let clockwise = signed_area(&vertices) < 0.0;
        let segments = (0..vertices.len())
            .map(|i| {
                let a = vertices[i];
                let b = vertices[(i + 1) % vertices.len()];
                Segment::new(a, b, clockwise)
            })
            .filter(|s| s.length > 0.0)
            .collect();
        let bounds = Aabb::from_points(&vertices);
        Self {
            id,
            vertices,
            bounds,
            segments,
            restitution,
            friction,
        }
    }

    /// Even-odd point in polygon test
    pub fn contains(&self, p: DVec2) -> bool {
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[j];
            if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Nearest point on the polygon boundary
    pub fn closest_boundary(&self, p: DVec2) -> BoundaryHit {
        let mut best = BoundaryHit {
            point: p,
            normal: DVec2::ZERO,
            distance: f64::INFINITY,
        };
        for seg in &self.segments {
            let q = seg.closest_point(p);
            let d = (p - q).length();
            if d < best.distance {
                best = BoundaryHit {
                    point: q,
                    normal: seg.normal,
                    distance: d,
                };
            }
        }

        let inside = self.contains(p);
        if best.distance > 1e-9 {
            let away = (p - best.point) / best.distance;
            best.normal = if inside { -away } else { away };
        }
        if inside {
            best.distance = -best.distance;
        }
        best
    }
}

fn signed_area(vertices: &[DVec2]) -> f64 {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        * 0.5
}

/// A circular capture zone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pocket {
    pub id: u32,
    pub center: DVec2,
    pub radius: f64,
    pub depth: f64,
}

impl Pocket {
    /// Planar distance from the pocket centre to a ball centre
    #[inline]
    pub fn distance_to(&self, pos: DVec3) -> f64 {
        (pos.truncate() - self.center).length()
    }
}

/// Static table: cushions, pockets and the playing-area extents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub cushions: Vec<Cushion>,
    pub pockets: Vec<Pocket>,
    pub half_length: f64,
    pub half_width: f64,
    /// Ball centres beyond this rectangle have left the table
    pub outer: Aabb,
}

impl Table {
    /// Six-pocket table built from the configured dimensions
    pub fn standard(params: &Params) -> Self {
        let hl = params.table_length / 2.0;
        let hw = params.table_width / 2.0;
        let cm = params.corner_mouth;
        let sm = params.side_mouth;
        let w = params.cushion_width;

        // Corner jaws at 45°, side jaws much steeper
        const CORNER_JAW: f64 = 1.0;
        const SIDE_JAW: f64 = 0.25;

        let rails = [
            (DVec2::new(-hl + cm, -hw), DVec2::new(-sm, -hw), DVec2::NEG_Y, CORNER_JAW, SIDE_JAW),
            (DVec2::new(sm, -hw), DVec2::new(hl - cm, -hw), DVec2::NEG_Y, SIDE_JAW, CORNER_JAW),
            (DVec2::new(-hl + cm, hw), DVec2::new(-sm, hw), DVec2::Y, CORNER_JAW, SIDE_JAW),
            (DVec2::new(sm, hw), DVec2::new(hl - cm, hw), DVec2::Y, SIDE_JAW, CORNER_JAW),
            (DVec2::new(-hl, -hw + cm), DVec2::new(-hl, hw - cm), DVec2::NEG_X, CORNER_JAW, CORNER_JAW),
            (DVec2::new(hl, -hw + cm), DVec2::new(hl, hw - cm), DVec2::X, CORNER_JAW, CORNER_JAW),
        ];

        let cushions = rails
            .iter()
            .enumerate()
            .map(|(i, &(p0, p1, out, jaw0, jaw1))| {
                let d = (p1 - p0).normalize();
                let back0 = p0 + out * w - d * jaw0 * w;
                let back1 = p1 + out * w + d * jaw1 * w;
                Cushion::new(
                    i as u32,
                    vec![p0, p1, back1, back0],
                    params.cushion_restitution,
                    params.cushion_friction,
                )
            })
            .collect();

        let co = params.corner_pocket_offset;
        let so = params.side_pocket_offset;
        let corner = |id, x: f64, y: f64| Pocket {
            id,
            center: DVec2::new(x, y),
            radius: params.corner_pocket_radius,
            depth: params.pocket_depth,
        };
        let side = |id, y: f64| Pocket {
            id,
            center: DVec2::new(0.0, y),
            radius: params.side_pocket_radius,
            depth: params.pocket_depth,
        };
        let pockets = vec![
            corner(0, -hl - co, -hw - co),
            corner(1, hl + co, -hw - co),
            corner(2, -hl - co, hw + co),
            corner(3, hl + co, hw + co),
            side(4, -hw - so),
            side(5, hw + so),
        ];

        Self {
            cushions,
            pockets,
            half_length: hl,
            half_width: hw,
            outer: Aabb {
                min: DVec2::new(-hl - w, -hw - w),
                max: DVec2::new(hl + w, hw + w),
            },
        }
    }

    pub fn pocket(&self, id: u32) -> Option<&Pocket> {
        self.pockets.iter().find(|p| p.id == id)
    }

    /// Ball centre has left the table footprint
    pub fn is_outside(&self, pos: DVec3) -> bool {
        pos.x < self.outer.min.x
            || pos.x > self.outer.max.x
            || pos.y < self.outer.min.y
            || pos.y > self.outer.max.y
    }

    /// Nearest cushion boundary point over all cushions
    pub fn nearest_cushion(&self, pos: DVec3) -> Option<(u32, BoundaryHit)> {
        let p = pos.truncate();
        self.cushions
            .iter()
            .map(|c| (c.id, c.closest_boundary(p)))
            .min_by(|a, b| a.1.distance.total_cmp(&b.1.distance))
    }
}
