use tracing::trace;

use super::geometry::{Rect, Vec2};
use super::tilemap::{Direction, TileMap, TilemapError};

/// Directed line segment in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Vec2,
    pub end: Vec2,
}

impl Segment {
    pub const fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    pub fn delta(&self) -> Vec2 {
        Vec2::new(self.end.x - self.start.x, self.end.y - self.start.y)
    }

    /// Point where the two segments cross, endpoints included. Parallel
    /// and collinear segments never cross.
    pub fn intersection(&self, other: &Segment) -> Option<Vec2> {
        let r = self.delta();
        let s = other.delta();
        let denom = cross(r, s);
        if denom == 0.0 {
            return None;
        }
        let to_other = Vec2::new(other.start.x - self.start.x, other.start.y - self.start.y);
        let t = cross(to_other, s) / denom;
        let u = cross(to_other, r) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(self.start.offset(r.x * t, r.y * t))
        } else {
            None
        }
    }
}

/// One side of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WallEdge {
    Top,
    Bottom,
    Left,
    Right,
}

impl WallEdge {
    pub const ALL: [WallEdge; 4] = [Self::Top, Self::Bottom, Self::Left, Self::Right];

    /// The neighbour that shares this edge.
    pub fn neighbour(self) -> Direction {
        match self {
            Self::Top => Direction::Above,
            Self::Bottom => Direction::Below,
            Self::Left => Direction::Left,
            Self::Right => Direction::Right,
        }
    }

    pub fn segment(self, rect: &Rect) -> Segment {
        match self {
            Self::Top => Segment::new(rect.top_left(), rect.top_right()),
            Self::Bottom => Segment::new(rect.bottom_left(), rect.bottom_right()),
            Self::Left => Segment::new(rect.top_left(), rect.bottom_left()),
            Self::Right => Segment::new(rect.top_right(), rect.bottom_right()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec2,
    pub tile: usize,
    pub edge: WallEdge,
    /// The struck edge as a segment, for sliding along it.
    pub surface: Segment,
}

/// Where `ray` first enters `rect` through one of the two edges facing its
/// start point. `ignored` edges never register. The start must lie outside
/// the rect.
pub fn rect_point_of_collision(
    ray: &Segment,
    rect: &Rect,
    ignored: &[WallEdge],
) -> Option<(Vec2, WallEdge)> {
    let center = rect.center();
    let horizontal = if ray.start.y <= center.y {
        WallEdge::Top
    } else {
        WallEdge::Bottom
    };
    let vertical = if ray.start.x <= center.x {
        WallEdge::Left
    } else {
        WallEdge::Right
    };

    [horizontal, vertical]
        .into_iter()
        .filter(|edge| !ignored.contains(edge))
        .filter_map(|edge| {
            ray.intersection(&edge.segment(rect))
                .map(|point| (point, edge))
        })
        .min_by(|(a, _), (b, _)| {
            distance_squared(ray.start, *a).total_cmp(&distance_squared(ray.start, *b))
        })
}

/// Hit against the collidable tile at `index`. Edges shared with another
/// collidable tile are interior to a wall run and are skipped.
pub fn tile_point_of_collision(
    map: &TileMap,
    ray: &Segment,
    index: usize,
) -> Result<Option<RayHit>, TilemapError> {
    let rect = map.tile_rect(index);
    let mut ignored = Vec::with_capacity(WallEdge::ALL.len());
    for edge in WallEdge::ALL {
        if let Some(neighbour) = map.nearby_tile_index(index, edge.neighbour()) {
            if map.tile_is_collidable(neighbour)? {
                ignored.push(edge);
            }
        }
    }

    Ok(
        rect_point_of_collision(ray, &rect, &ignored).map(|(point, edge)| RayHit {
            point,
            tile: index,
            edge,
            surface: edge.segment(&rect),
        }),
    )
}

/// Marches `ray` cell by cell from its start and returns the first wall
/// edge it strikes. Cells off the map are passed over.
pub fn raycast(map: &TileMap, ray: &Segment) -> Result<Option<RayHit>, TilemapError> {
    let finite = [ray.start.x, ray.start.y, ray.end.x, ray.end.y]
        .iter()
        .all(|value| value.is_finite());
    if !finite {
        trace!(?ray, "raycast_non_finite");
        return Ok(None);
    }

    let tile_size = map.tile_size();
    let (x0, y0) = (ray.start.x / tile_size, ray.start.y / tile_size);
    let (x1, y1) = (ray.end.x / tile_size, ray.end.y / tile_size);
    let mut cell_x = x0.floor() as i64;
    let mut cell_y = y0.floor() as i64;

    let x_axis = AxisMarch::new(x0, x1);
    let y_axis = AxisMarch::new(y0, y1);
    let mut tx_next = x_axis.first_crossing;
    let mut ty_next = y_axis.first_crossing;
    let cells = 1 + x_axis.crossings + y_axis.crossings;

    for _ in 0..cells {
        let corner = Vec2::new(cell_x as f32 * tile_size, cell_y as f32 * tile_size);
        if let Some(index) = map.nearest_tile_index(corner) {
            if map.tile_is_collidable(index)? {
                if let Some(hit) = tile_point_of_collision(map, ray, index)? {
                    trace!(tile = hit.tile, edge = ?hit.edge, "raycast_hit");
                    return Ok(Some(hit));
                }
            }
        }

        if ty_next < tx_next {
            cell_y += y_axis.step;
            ty_next += y_axis.dt;
        } else {
            cell_x += x_axis.step;
            tx_next += x_axis.dt;
        }
    }
    Ok(None)
}

/// Drops the part of `movement` that pushes into `surface`, leaving the
/// component along it.
pub fn collision_slide(movement: Vec2, surface: &Segment) -> Vec2 {
    let along = surface.delta();
    let length = (along.x * along.x + along.y * along.y).sqrt();
    if length == 0.0 {
        return movement;
    }
    let normal = Vec2::new(-along.y / length, along.x / length);
    let into = movement.x * normal.x + movement.y * normal.y;
    Vec2::new(movement.x - normal.x * into, movement.y - normal.y * into)
}

/// Per-axis stepping state for the cell march, in cell units.
struct AxisMarch {
    step: i64,
    crossings: i64,
    first_crossing: f32,
    dt: f32,
}

impl AxisMarch {
    fn new(from: f32, to: f32) -> Self {
        let span = (to - from).abs();
        if span == 0.0 {
            return Self {
                step: 0,
                crossings: 0,
                first_crossing: f32::INFINITY,
                dt: f32::INFINITY,
            };
        }
        let dt = 1.0 / span;
        if to > from {
            Self {
                step: 1,
                crossings: to.floor() as i64 - from.floor() as i64,
                first_crossing: (from.floor() + 1.0 - from) * dt,
                dt,
            }
        } else {
            Self {
                step: -1,
                crossings: from.floor() as i64 - to.floor() as i64,
                first_crossing: (from - from.floor()) * dt,
                dt,
            }
        }
    }
}

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

fn distance_squared(a: Vec2, b: Vec2) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_walls(width: u32, height: u32, walls: &[usize]) -> TileMap {
        let tokens = (0..(width * height) as usize)
            .map(|index| {
                if walls.contains(&index) {
                    "01-00-WA"
                } else {
                    "00-00-FL"
                }
            })
            .collect::<Vec<_>>();
        TileMap::from_tokens(width, height, 32.0, &tokens).expect("map")
    }

    fn ray(from: (f32, f32), to: (f32, f32)) -> Segment {
        Segment::new(Vec2::new(from.0, from.1), Vec2::new(to.0, to.1))
    }

    fn assert_close(actual: Vec2, expected: Vec2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-3 && (actual.y - expected.y).abs() < 1e-3,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn segments_cross_at_shared_point() {
        let a = ray((0.0, 0.0), (10.0, 10.0));
        let b = ray((0.0, 10.0), (10.0, 0.0));
        assert_close(a.intersection(&b).expect("cross"), Vec2::new(5.0, 5.0));

        let parallel = ray((0.0, 1.0), (10.0, 11.0));
        assert_eq!(a.intersection(&parallel), None);
        let short = ray((0.0, 10.0), (4.0, 6.0));
        assert_eq!(a.intersection(&short), None);
    }

    #[test]
    fn ray_stops_at_facing_edge_of_lone_wall() {
        let map = map_with_walls(5, 5, &[12]);
        let hit = raycast(&map, &ray((16.0, 80.0), (150.0, 80.0)))
            .expect("raycast")
            .expect("hit");
        assert_eq!(hit.tile, 12);
        assert_eq!(hit.edge, WallEdge::Left);
        assert_close(hit.point, Vec2::new(64.0, 80.0));
        assert_eq!(
            hit.surface,
            ray((64.0, 64.0), (64.0, 96.0))
        );
    }

    #[test]
    fn ray_entering_from_off_map_still_hits() {
        let map = map_with_walls(5, 5, &[12]);
        let hit = raycast(&map, &ray((-40.0, 80.0), (80.0, 80.0)))
            .expect("raycast")
            .expect("hit");
        assert_eq!(hit.tile, 12);
        assert_close(hit.point, Vec2::new(64.0, 80.0));
    }

    #[test]
    fn ray_onto_wall_run_hits_the_exposed_face() {
        let map = map_with_walls(5, 5, &[11, 12, 13]);
        let hit = raycast(&map, &ray((20.0, 20.0), (140.0, 100.0)))
            .expect("raycast")
            .expect("hit");
        assert_eq!(hit.tile, 12);
        assert_eq!(hit.edge, WallEdge::Top);
        assert_close(hit.point, Vec2::new(86.0, 64.0));
    }

    #[test]
    fn shared_edges_inside_a_wall_run_are_ignored() {
        let crossing = ray((40.0, 80.0), (120.0, 80.0));

        let lone = map_with_walls(5, 5, &[12]);
        let hit = tile_point_of_collision(&lone, &crossing, 12)
            .expect("query")
            .expect("hit");
        assert_eq!(hit.edge, WallEdge::Left);

        let run = map_with_walls(5, 5, &[11, 12, 13]);
        assert_eq!(
            tile_point_of_collision(&run, &crossing, 12).expect("query"),
            None
        );
    }

    #[test]
    fn ray_through_open_floor_hits_nothing() {
        let map = map_with_walls(5, 5, &[12]);
        assert_eq!(
            raycast(&map, &ray((16.0, 16.0), (150.0, 16.0))).expect("raycast"),
            None
        );
        assert_eq!(
            raycast(&map, &ray((16.0, 16.0), (16.0, 16.0))).expect("raycast"),
            None
        );
        assert_eq!(
            raycast(&map, &ray((f32::NAN, 0.0), (16.0, 16.0))).expect("raycast"),
            None
        );
    }

    #[test]
    fn unrecognized_tile_on_the_path_is_an_error() {
        let tokens = ["00-00-FL", "00-00-ZZ", "00-00-FL"];
        let map = TileMap::from_tokens(3, 1, 32.0, &tokens).expect("map");
        assert!(matches!(
            raycast(&map, &ray((8.0, 8.0), (90.0, 8.0))),
            Err(TilemapError::InvalidTileData { index: 1, .. })
        ));
    }

    #[test]
    fn slide_keeps_the_component_along_the_surface() {
        let vertical = ray((32.0, 32.0), (32.0, 64.0));
        assert_close(collision_slide(Vec2::new(3.0, -3.0), &vertical), Vec2::new(0.0, -3.0));

        let horizontal = ray((0.0, 0.0), (10.0, 0.0));
        assert_close(collision_slide(Vec2::new(3.0, 4.0), &horizontal), Vec2::new(3.0, 0.0));

        let point = ray((5.0, 5.0), (5.0, 5.0));
        assert_eq!(collision_slide(Vec2::new(1.0, 2.0), &point), Vec2::new(1.0, 2.0));
    }
}
