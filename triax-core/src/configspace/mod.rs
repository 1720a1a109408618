//! Angular configuration space sampling.
//!
//! The raster covers the rectangle `[a4_lo, a4_hi] x [a2_lo, a2_hi]`; the x
//! axis is the sample scattering angle a4, the y axis the monochromator
//! scattering angle a2 (or the analyser angle when kf is not fixed; the
//! paths builder decides which before invoking the sampler). Cell values are
//! obstacle group ids, 0 = free.

mod sampler;
mod wall_index;

pub use sampler::{sample_config_space, SamplerParams};
pub use wall_index::WallIndex;

use crate::core::{PixelCoord, Vec2};

/// Group id assigned to cells outside the mechanical angular limits.
pub const LIMIT_IDENT: &str = "angular-limits";

/// Rasterised configuration space.
#[derive(Clone, Debug)]
pub struct ConfigSpaceRaster {
    width: usize,
    height: usize,
    /// row-major cell classification: 0 = free, otherwise obstacle group id
    data: Vec<u8>,
    /// a4 range covered by the x axis (radians)
    a4_range: (f64, f64),
    /// a2 range covered by the y axis (radians)
    a2_range: (f64, f64),
    /// obstacle ident per group id (index 0 -> id 1); preserved across the
    /// whole pipeline
    obstacle_idents: Vec<String>,
}

impl ConfigSpaceRaster {
    pub fn new(
        width: usize,
        height: usize,
        a4_range: (f64, f64),
        a2_range: (f64, f64),
    ) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
            a4_range,
            a2_range,
            obstacle_idents: Vec::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn a4_range(&self) -> (f64, f64) {
        self.a4_range
    }

    pub fn a2_range(&self) -> (f64, f64) {
        self.a2_range
    }

    /// Obstacle identifiers by group id (index 0 corresponds to id 1).
    pub fn obstacle_idents(&self) -> &[String] {
        &self.obstacle_idents
    }

    pub(crate) fn set_obstacle_idents(&mut self, idents: Vec<String>) {
        self.obstacle_idents = idents;
    }

    /// Cell id at the pixel, 0 outside the raster.
    #[inline]
    pub fn id_at(&self, pix: PixelCoord) -> u8 {
        if pix.x < 0 || pix.y < 0 || pix.x as usize >= self.width || pix.y as usize >= self.height
        {
            return 0;
        }
        self.data[pix.y as usize * self.width + pix.x as usize]
    }

    /// Is the cell free? Pixels outside the raster count as forbidden.
    #[inline]
    pub fn is_free(&self, pix: PixelCoord) -> bool {
        if pix.x < 0 || pix.y < 0 || pix.x as usize >= self.width || pix.y as usize >= self.height
        {
            return false;
        }
        self.data[pix.y as usize * self.width + pix.x as usize] == 0
    }

    #[inline]
    pub fn set_id(&mut self, pix: PixelCoord, id: u8) {
        if pix.x >= 0
            && pix.y >= 0
            && (pix.x as usize) < self.width
            && (pix.y as usize) < self.height
        {
            self.data[pix.y as usize * self.width + pix.x as usize] = id;
        }
    }

    pub(crate) fn rows_mut(&mut self) -> std::slice::ChunksMut<'_, u8> {
        self.data.chunks_mut(self.width)
    }

    pub fn cells(&self) -> &[u8] {
        &self.data
    }

    /// Convert a raster position (fractional pixels allowed) to angular
    /// coordinates `(a4, a2)` in radians.
    pub fn pixel_to_angle(&self, pix: Vec2) -> Vec2 {
        let a4 = self.a4_range.0
            + (self.a4_range.1 - self.a4_range.0) * (pix.x / self.width as f64);
        let a2 = self.a2_range.0
            + (self.a2_range.1 - self.a2_range.0) * (pix.y / self.height as f64);
        Vec2::new(a4, a2)
    }

    /// Convert angular coordinates `(a4, a2)` to a raster position.
    pub fn angle_to_pixel(&self, angle: Vec2) -> Vec2 {
        let x = (angle.x - self.a4_range.0) / (self.a4_range.1 - self.a4_range.0)
            * self.width as f64;
        let y = (angle.y - self.a2_range.0) / (self.a2_range.1 - self.a2_range.0)
            * self.height as f64;
        Vec2::new(x, y)
    }

    /// Is the angular position inside a free cell?
    pub fn angle_is_free(&self, angle: Vec2) -> bool {
        let pix = self.angle_to_pixel(angle);
        self.is_free(PixelCoord::new(pix.x.floor() as i32, pix.y.floor() as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_angle_roundtrip() {
        let raster = ConfigSpaceRaster::new(100, 50, (-1.0, 1.0), (0.0, 2.0));
        let angle = raster.pixel_to_angle(Vec2::new(50.0, 25.0));
        assert!(angle.approx_eq(Vec2::new(0.0, 1.0), 1e-12));

        let pix = raster.angle_to_pixel(angle);
        assert!(pix.approx_eq(Vec2::new(50.0, 25.0), 1e-9));
    }

    #[test]
    fn test_out_of_bounds_forbidden() {
        let raster = ConfigSpaceRaster::new(4, 4, (0.0, 1.0), (0.0, 1.0));
        assert!(!raster.is_free(PixelCoord::new(-1, 0)));
        assert!(!raster.is_free(PixelCoord::new(0, 4)));
        assert!(raster.is_free(PixelCoord::new(3, 3)));
        assert_eq!(raster.id_at(PixelCoord::new(-1, 0)), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut raster = ConfigSpaceRaster::new(4, 4, (0.0, 1.0), (0.0, 1.0));
        raster.set_id(PixelCoord::new(2, 1), 3);
        assert_eq!(raster.id_at(PixelCoord::new(2, 1)), 3);
        assert!(!raster.is_free(PixelCoord::new(2, 1)));
    }
}
