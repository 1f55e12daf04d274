///! QSO path maps
///!
///! Turns a pair of Maidenhead locators into a distance and a PNG map,
///! and manages the on-disk cache of rendered maps.

pub mod maidenhead;
pub mod renderer;
pub mod cache;

pub use cache::{cleanup_old_maps, map_file_name};
pub use maidenhead::{LatLon, distance_km, parse_locator};
pub use renderer::{GridMapRenderer, MapConfig};
