//! Wall index: obstacle id table plus a spatial index over wall pixels.
//!
//! The dense table maps raster group ids back to instrument-space object
//! identifiers; it stays stable across successive samples as long as the
//! instrument space is unchanged. The kd-tree answers "nearest wall pixel"
//! queries for the wall-penalising path strategy.

use super::ConfigSpaceRaster;
use crate::core::{PixelCoord, Vec2};
use kiddo::{KdTree, SquaredEuclidean};

/// Spatial lookup from raster positions to walls.
pub struct WallIndex {
    /// obstacle ident per group id (index 0 corresponds to id 1)
    idents: Vec<String>,
    tree: KdTree<f64, 2>,
    wall_pixels: Vec<PixelCoord>,
}

impl WallIndex {
    /// Build the index from a sampled raster.
    pub fn build(raster: &ConfigSpaceRaster) -> Self {
        let mut tree: KdTree<f64, 2> = KdTree::new();
        let mut wall_pixels = Vec::new();

        for y in 0..raster.height() {
            for x in 0..raster.width() {
                let pix = PixelCoord::new(x as i32, y as i32);
                if raster.id_at(pix) != 0 {
                    tree.add(&[x as f64, y as f64], wall_pixels.len() as u64);
                    wall_pixels.push(pix);
                }
            }
        }

        Self {
            idents: raster.obstacle_idents().to_vec(),
            tree,
            wall_pixels,
        }
    }

    /// Number of indexed wall pixels.
    pub fn len(&self) -> usize {
        self.wall_pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wall_pixels.is_empty()
    }

    /// Instrument-space identifier of a raster group id.
    pub fn ident_of(&self, group_id: u8) -> Option<&str> {
        if group_id == 0 {
            return None;
        }
        self.idents.get(group_id as usize - 1).map(String::as_str)
    }

    /// Nearest wall pixel to a raster position, with its distance in
    /// pixel units.
    pub fn nearest_wall(&self, pos: Vec2) -> Option<(PixelCoord, f64)> {
        if self.wall_pixels.is_empty() {
            return None;
        }
        let found = self.tree.nearest_one::<SquaredEuclidean>(&[pos.x, pos.y]);
        let pix = self.wall_pixels[found.item as usize];
        Some((pix, found.distance.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_with_block() -> ConfigSpaceRaster {
        let mut raster = ConfigSpaceRaster::new(10, 10, (0.0, 1.0), (0.0, 1.0));
        for y in 4..6 {
            for x in 4..6 {
                raster.set_id(PixelCoord::new(x, y), 1);
            }
        }
        raster.set_obstacle_idents(vec!["block".into()]);
        raster
    }

    #[test]
    fn test_ident_table() {
        let index = WallIndex::build(&raster_with_block());
        assert_eq!(index.ident_of(1), Some("block"));
        assert_eq!(index.ident_of(0), None);
        assert_eq!(index.ident_of(9), None);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_nearest_wall() {
        let index = WallIndex::build(&raster_with_block());
        let (pix, dist) = index.nearest_wall(Vec2::new(0.0, 0.0)).unwrap();
        assert_eq!(pix, PixelCoord::new(4, 4));
        assert!((dist - (32.0_f64).sqrt()).abs() < 1e-9);

        let (pix, dist) = index.nearest_wall(Vec2::new(4.0, 4.0)).unwrap();
        assert_eq!(pix, PixelCoord::new(4, 4));
        assert!(dist.abs() < 1e-9);
    }

    #[test]
    fn test_empty_raster() {
        let raster = ConfigSpaceRaster::new(5, 5, (0.0, 1.0), (0.0, 1.0));
        let index = WallIndex::build(&raster);
        assert!(index.is_empty());
        assert!(index.nearest_wall(Vec2::new(1.0, 1.0)).is_none());
    }
}
