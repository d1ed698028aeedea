use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use super::geometry::{Rect, Vec2};

const WALL_CODE: &str = "WA";
const FLOOR_CODE: &str = "FL";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TileKind {
    Wall,
    Floor,
    /// Kept as loaded; classifying it is an error.
    Unrecognized(String),
}

impl TileKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            WALL_CODE => Self::Wall,
            FLOOR_CODE => Self::Floor,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Wall => WALL_CODE,
            Self::Floor => FLOOR_CODE,
            Self::Unrecognized(code) => code,
        }
    }
}

/// One tile record, parsed from an `XX-YY-KK` token: sprite-sheet column,
/// sprite-sheet row, kind code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    sprite_x: u32,
    sprite_y: u32,
    kind: TileKind,
}

impl Tile {
    pub fn new(sprite_x: u32, sprite_y: u32, kind: TileKind) -> Self {
        Self {
            sprite_x,
            sprite_y,
            kind,
        }
    }

    pub fn sprite_index(&self) -> (u32, u32) {
        (self.sprite_x, self.sprite_y)
    }

    pub fn kind(&self) -> &TileKind {
        &self.kind
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}-{:02}-{}",
            self.sprite_x,
            self.sprite_y,
            self.kind.code()
        )
    }
}

impl FromStr for Tile {
    type Err = &'static str;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let mut parts = token.trim().split('-');
        let (Some(x), Some(y), Some(code), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err("expected three '-' separated fields");
        };
        let sprite_x = x.parse::<u32>().map_err(|_| "sprite column is not an integer")?;
        let sprite_y = y.parse::<u32>().map_err(|_| "sprite row is not an integer")?;
        if code.is_empty() {
            return Err("kind code is empty");
        }
        Ok(Self::new(sprite_x, sprite_y, TileKind::from_code(code)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Above,
    Below,
}

/// Which side of a tile boundary a coordinate resolves to. `Near` floors
/// (a left/top edge owns its boundary); `Far` treats the coordinate as an
/// exclusive right/bottom edge, so a boundary belongs to the tile before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolicy {
    Near,
    Far,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TilemapError {
    #[error("invalid map dimensions {width}x{height}; both must be at least 1")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("tile size must be positive and finite, got {tile_size}")]
    InvalidTileSize { tile_size: f32 },
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("tile index {index} is out of range 0..{len}")]
    InvalidIndex { index: usize, len: usize },
    #[error("invalid tile data at index {index} ('{token}'): {reason}")]
    InvalidTileData {
        index: usize,
        token: String,
        reason: String,
    },
}

/// Fixed-size row-major grid of tiles.
///
/// Pixel space starts at `(0, 0)` in the top-left corner; tile `(x, y)`
/// covers `[x * tile_size, (x + 1) * tile_size)` on each axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    width: u32,
    height: u32,
    tile_size: f32,
    tiles: Vec<Tile>,
}

impl TileMap {
    pub fn new(
        width: u32,
        height: u32,
        tile_size: f32,
        tiles: Vec<Tile>,
    ) -> Result<Self, TilemapError> {
        if width == 0 || height == 0 {
            return Err(TilemapError::InvalidDimensions { width, height });
        }
        if !(tile_size.is_finite() && tile_size > 0.0) {
            return Err(TilemapError::InvalidTileSize { tile_size });
        }
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            tile_size,
            tiles,
        })
    }

    /// Parses `XX-YY-KK` tokens. Unknown kind codes are accepted here and
    /// rejected when the tile is classified; malformed tokens fail now.
    pub fn from_tokens<S: AsRef<str>>(
        width: u32,
        height: u32,
        tile_size: f32,
        tokens: &[S],
    ) -> Result<Self, TilemapError> {
        let tiles = tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                let token = token.as_ref();
                token
                    .parse::<Tile>()
                    .map_err(|reason| TilemapError::InvalidTileData {
                        index,
                        token: token.to_string(),
                        reason: reason.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(width, height, tile_size, tiles)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * self.tile_size
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * self.tile_size
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, index: usize) -> Result<&Tile, TilemapError> {
        self.tiles.get(index).ok_or_else(|| {
            warn!(index, len = self.tiles.len(), "tile_index_invalid");
            TilemapError::InvalidIndex {
                index,
                len: self.tiles.len(),
            }
        })
    }

    pub fn tile_is_collidable(&self, index: usize) -> Result<bool, TilemapError> {
        let tile = self.tile(index)?;
        match tile.kind() {
            TileKind::Wall => Ok(true),
            TileKind::Floor => Ok(false),
            TileKind::Unrecognized(code) => {
                warn!(index, code = code.as_str(), "tile_kind_unrecognized");
                Err(TilemapError::InvalidTileData {
                    index,
                    token: tile.to_string(),
                    reason: format!("unrecognized kind code '{code}'"),
                })
            }
        }
    }

    pub fn sprite_index(&self, index: usize) -> Result<(u32, u32), TilemapError> {
        self.tile(index).map(Tile::sprite_index)
    }

    pub fn index_to_coords(&self, index: usize) -> (u32, u32) {
        let width = self.width as usize;
        ((index % width) as u32, (index / width) as u32)
    }

    pub fn coords_to_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Pixel position of the tile's top-left corner.
    pub fn index_to_pixel(&self, index: usize) -> Vec2 {
        let (x, y) = self.index_to_coords(index);
        Vec2::new(x as f32 * self.tile_size, y as f32 * self.tile_size)
    }

    pub fn tile_rect(&self, index: usize) -> Rect {
        Rect::square(self.index_to_pixel(index), self.tile_size)
    }

    /// Tile containing `position`. Positions on the outer right/bottom
    /// boundary resolve to no tile.
    pub fn nearest_tile_index(&self, position: Vec2) -> Option<usize> {
        self.tile_index_at_edge(position, EdgePolicy::Near, EdgePolicy::Near)
    }

    pub fn tile_index_at_edge(
        &self,
        position: Vec2,
        x_edge: EdgePolicy,
        y_edge: EdgePolicy,
    ) -> Option<usize> {
        let x = axis_tile(position.x, self.tile_size, self.width, x_edge)?;
        let y = axis_tile(position.y, self.tile_size, self.height, y_edge)?;
        Some(self.coords_to_index(x, y))
    }

    pub fn nearby_tile_index(&self, index: usize, direction: Direction) -> Option<usize> {
        if index >= self.tiles.len() {
            return None;
        }
        let (x, y) = self.index_to_coords(index);
        let (nx, ny) = match direction {
            Direction::Left => (x.checked_sub(1)?, y),
            Direction::Right => (x.checked_add(1)?, y),
            Direction::Above => (x, y.checked_sub(1)?),
            Direction::Below => (x, y.checked_add(1)?),
        };
        if nx >= self.width || ny >= self.height {
            return None;
        }
        Some(self.coords_to_index(nx, ny))
    }

    /// Every tile index the rect covers (not just its corners), clamped to
    /// the map and in row-major order. The right/bottom edges are exclusive.
    pub fn tile_indices_in_rect(&self, rect: &Rect) -> Vec<usize> {
        let Some((min_x, max_x)) = axis_span(
            rect.top_left().x,
            rect.top_right().x,
            self.tile_size,
            self.width,
        ) else {
            return Vec::new();
        };
        let Some((min_y, max_y)) = axis_span(
            rect.top_left().y,
            rect.bottom_left().y,
            self.tile_size,
            self.height,
        ) else {
            return Vec::new();
        };

        let mut indices =
            Vec::with_capacity(((max_x - min_x + 1) * (max_y - min_y + 1)) as usize);
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                indices.push(self.coords_to_index(x, y));
            }
        }
        indices
    }
}

fn axis_tile(value: f32, tile_size: f32, count: u32, edge: EdgePolicy) -> Option<u32> {
    let extent = count as f32 * tile_size;
    match edge {
        EdgePolicy::Near => {
            if !(value >= 0.0 && value < extent) {
                return None;
            }
            Some(((value / tile_size).floor() as u32).min(count - 1))
        }
        EdgePolicy::Far => {
            if !(value > 0.0 && value <= extent) {
                return None;
            }
            let cell = (value / tile_size).ceil() as u32;
            Some(cell.saturating_sub(1).min(count - 1))
        }
    }
}

fn axis_span(start: f32, end: f32, tile_size: f32, count: u32) -> Option<(u32, u32)> {
    let extent = count as f32 * tile_size;
    if !(end > 0.0 && start < extent && start < end) {
        return None;
    }
    let first = axis_tile(start.max(0.0), tile_size, count, EdgePolicy::Near)?;
    let last = axis_tile(end.min(extent), tile_size, count, EdgePolicy::Far)?;
    Some((first, last.max(first)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_map(width: u32, height: u32, tile_size: f32) -> TileMap {
        let tokens = vec!["00-00-FL"; width as usize * height as usize];
        TileMap::from_tokens(width, height, tile_size, &tokens).expect("tilemap")
    }

    #[test]
    fn tile_token_parses_sprite_and_kind() {
        let tile: Tile = "03-07-WA".parse().expect("tile");
        assert_eq!(tile.sprite_index(), (3, 7));
        assert_eq!(tile.kind(), &TileKind::Wall);
        assert_eq!(tile.to_string(), "03-07-WA");
    }

    #[test]
    fn malformed_tokens_are_invalid_tile_data() {
        let err = TileMap::from_tokens(2, 1, 32.0, &["00-00-FL", "00-FL"]).expect_err("err");
        match err {
            TilemapError::InvalidTileData { index, token, .. } => {
                assert_eq!(index, 1);
                assert_eq!(token, "00-FL");
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!("aa-00-FL".parse::<Tile>().is_err());
        assert!("00-00-".parse::<Tile>().is_err());
        assert!("00-00-FL-XX".parse::<Tile>().is_err());
    }

    #[test]
    fn new_rejects_invalid_tile_count() {
        let err = TileMap::from_tokens(2, 2, 32.0, &["00-00-FL"; 3]).expect_err("err");
        assert_eq!(
            err,
            TilemapError::TileCountMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn new_rejects_zero_dimensions_and_bad_tile_size() {
        assert_eq!(
            TileMap::new(0, 3, 32.0, Vec::new()).expect_err("err"),
            TilemapError::InvalidDimensions {
                width: 0,
                height: 3
            }
        );
        assert!(matches!(
            TileMap::from_tokens(1, 1, 0.0, &["00-00-FL"]).expect_err("err"),
            TilemapError::InvalidTileSize { .. }
        ));
    }

    #[test]
    fn collidability_follows_kind_code() {
        let map =
            TileMap::from_tokens(3, 1, 32.0, &["00-00-WA", "00-00-FL", "00-00-XX"]).expect("map");
        assert_eq!(map.tile_is_collidable(0), Ok(true));
        assert_eq!(map.tile_is_collidable(1), Ok(false));
        assert!(matches!(
            map.tile_is_collidable(2),
            Err(TilemapError::InvalidTileData { index: 2, .. })
        ));
    }

    #[test]
    fn out_of_range_index_is_invalid_index() {
        let map = floor_map(2, 2, 32.0);
        assert_eq!(
            map.tile_is_collidable(4),
            Err(TilemapError::InvalidIndex { index: 4, len: 4 })
        );
        assert_eq!(
            map.sprite_index(9),
            Err(TilemapError::InvalidIndex { index: 9, len: 4 })
        );
    }

    #[test]
    fn sprite_index_reads_token_coordinates() {
        let map = TileMap::from_tokens(2, 1, 16.0, &["01-02-FL", "11-04-WA"]).expect("map");
        assert_eq!(map.sprite_index(0), Ok((1, 2)));
        assert_eq!(map.sprite_index(1), Ok((11, 4)));
    }

    #[test]
    fn index_and_coords_round_trip() {
        let map = floor_map(7, 5, 32.0);
        for index in 0..map.len() {
            let (x, y) = map.index_to_coords(index);
            assert_eq!(map.coords_to_index(x, y), index);
        }
        for y in 0..5 {
            for x in 0..7 {
                assert_eq!(map.index_to_coords(map.coords_to_index(x, y)), (x, y));
            }
        }
    }

    #[test]
    fn nearest_tile_index_uses_floor_division() {
        let map = floor_map(10, 10, 32.0);
        assert_eq!(map.nearest_tile_index(Vec2::new(0.0, 0.0)), Some(0));
        assert_eq!(map.nearest_tile_index(Vec2::new(31.9, 0.0)), Some(0));
        assert_eq!(map.nearest_tile_index(Vec2::new(32.0, 0.0)), Some(1));
        assert_eq!(map.nearest_tile_index(Vec2::new(160.0, 160.0)), Some(55));
    }

    #[test]
    fn nearest_tile_index_outer_boundary_is_none() {
        let map = floor_map(10, 10, 32.0);
        assert_eq!(map.nearest_tile_index(Vec2::new(320.0, 320.0)), None);
        assert_eq!(map.nearest_tile_index(Vec2::new(320.0, 10.0)), None);
        assert_eq!(map.nearest_tile_index(Vec2::new(-0.5, 10.0)), None);
        assert_eq!(map.nearest_tile_index(Vec2::new(319.0, 319.0)), Some(99));
    }

    #[test]
    fn far_edge_boundary_belongs_to_previous_tile() {
        let map = floor_map(10, 10, 32.0);
        assert_eq!(
            map.tile_index_at_edge(Vec2::new(192.0, 192.0), EdgePolicy::Far, EdgePolicy::Far),
            Some(55)
        );
        assert_eq!(
            map.tile_index_at_edge(Vec2::new(320.0, 320.0), EdgePolicy::Far, EdgePolicy::Far),
            Some(99)
        );
        assert_eq!(
            map.tile_index_at_edge(Vec2::new(0.0, 10.0), EdgePolicy::Far, EdgePolicy::Near),
            None
        );
    }

    #[test]
    fn nearby_tile_index_respects_map_edges() {
        let map = floor_map(3, 3, 32.0);
        assert_eq!(map.nearby_tile_index(4, Direction::Left), Some(3));
        assert_eq!(map.nearby_tile_index(4, Direction::Right), Some(5));
        assert_eq!(map.nearby_tile_index(4, Direction::Above), Some(1));
        assert_eq!(map.nearby_tile_index(4, Direction::Below), Some(7));
        assert_eq!(map.nearby_tile_index(3, Direction::Left), None);
        assert_eq!(map.nearby_tile_index(5, Direction::Right), None);
        assert_eq!(map.nearby_tile_index(1, Direction::Above), None);
        assert_eq!(map.nearby_tile_index(7, Direction::Below), None);
        assert_eq!(map.nearby_tile_index(9, Direction::Left), None);
    }

    #[test]
    fn tile_indices_in_rect_covers_interior_and_clamps() {
        let map = floor_map(4, 4, 10.0);
        let rect = Rect::new(Vec2::new(5.0, 5.0), 20.0, 10.0);
        assert_eq!(map.tile_indices_in_rect(&rect), vec![0, 1, 2, 4, 5, 6]);

        let spill = Rect::new(Vec2::new(-50.0, 25.0), 200.0, 100.0);
        assert_eq!(
            map.tile_indices_in_rect(&spill),
            vec![8, 9, 10, 11, 12, 13, 14, 15]
        );

        let outside = Rect::new(Vec2::new(40.0, 0.0), 10.0, 10.0);
        assert!(map.tile_indices_in_rect(&outside).is_empty());
    }

    #[test]
    fn pixel_helpers_match_tile_size() {
        let map = floor_map(3, 2, 16.0);
        assert_eq!(map.pixel_width(), 48.0);
        assert_eq!(map.pixel_height(), 32.0);
        assert_eq!(map.index_to_pixel(4), Vec2::new(16.0, 16.0));
        assert_eq!(map.tile_rect(5).bottom_right(), Vec2::new(48.0, 32.0));
    }
}
