//! The fixed global tile grid.

use serde::{Deserialize, Serialize};

use crate::{TileError, TileExtent, TileResult};

pub const MIN_LON: i32 = -180;
pub const MAX_LON: i32 = 180;
pub const MIN_LAT: i32 = -90;
pub const MAX_LAT: i32 = 90;

/// Regular grid of square tiles covering longitude [-180,180) and
/// latitude [-90,90).
///
/// Every layer and every date uses the same grid, which is what makes tiles
/// from different layers joinable by extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    step: u32,
}

impl TileGrid {
    /// Create a grid with tiles `step` degrees on a side.
    pub fn new(step: u32) -> TileResult<Self> {
        if step == 0 || step > 180 {
            return Err(TileError::InvalidStep(step));
        }
        Ok(Self { step })
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    fn lons(&self) -> impl Iterator<Item = i32> + Clone {
        (MIN_LON..MAX_LON).step_by(self.step as usize)
    }

    fn lats(&self) -> impl Iterator<Item = i32> + Clone {
        (MIN_LAT..MAX_LAT).step_by(self.step as usize)
    }

    /// Enumerate every tile, longitude-major (all latitudes of the first
    /// column, then the next column).
    pub fn extents(&self) -> impl Iterator<Item = TileExtent> + '_ {
        let step = self.step;
        let lats = self.lats();
        self.lons().flat_map(move |lon| {
            lats.clone()
                .map(move |lat| TileExtent::new(lat, lon, step))
        })
    }

    /// Number of tiles in the grid.
    pub fn len(&self) -> usize {
        self.lons().count() * self.lats().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
