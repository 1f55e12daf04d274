///! Maidenhead grid locator parsing and great-circle distance

use crate::error::MapError;

/// Kilometres per degree of great-circle arc
const KM_PER_DEGREE: f64 = 111.32;

/// Geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle angle to `other`, in degrees (haversine)
    pub fn angle_to(&self, other: &LatLon) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
    }
}

/// Parse a 2, 4, 6 or 8 character locator (e.g. "FN31pr") into the centre of its square.
pub fn parse_locator(locator: &str) -> Result<LatLon, MapError> {
    let invalid = || MapError::InvalidLocator(locator.to_string());

    let chars: Vec<u8> = locator.trim().to_ascii_uppercase().into_bytes();
    if chars.is_empty() || chars.len() > 8 || chars.len() % 2 != 0 {
        return Err(invalid());
    }

    // (lon, lat) of the south-west corner and the size of the current cell
    let (mut lon, mut lat) = (-180.0_f64, -90.0_f64);
    let (mut lon_size, mut lat_size) = (360.0_f64, 180.0_f64);

    for (pair_index, pair) in chars.chunks(2).enumerate() {
        let (base, divisions) = match pair_index {
            0 => (b'A', 18u8),
            1 | 3 => (b'0', 10u8),
            _ => (b'A', 24u8),
        };

        let lon_step = pair[0].wrapping_sub(base);
        let lat_step = pair[1].wrapping_sub(base);
        if lon_step >= divisions || lat_step >= divisions {
            return Err(invalid());
        }

        lon_size /= divisions as f64;
        lat_size /= divisions as f64;
        lon += lon_step as f64 * lon_size;
        lat += lat_step as f64 * lat_size;
    }

    Ok(LatLon::new(lat + lat_size / 2.0, lon + lon_size / 2.0))
}

/// Distance in kilometres between the centres of two locators.
pub fn distance_km(my_grid: &str, their_grid: &str) -> Result<f64, MapError> {
    let mine = parse_locator(my_grid)?;
    let theirs = parse_locator(their_grid)?;
    Ok(mine.angle_to(&theirs) * KM_PER_DEGREE)
}
