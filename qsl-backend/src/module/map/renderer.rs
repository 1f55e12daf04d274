///! QSO path map renderer
///!
///! Projects both stations onto a Web-Mercator canvas, draws the path
///! between them and rasterizes the SVG to PNG.

use resvg::tiny_skia;
use resvg::usvg::{Options, Tree, fontdb};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::maidenhead::{LatLon, parse_locator};
use crate::error::MapError;

/// Web-Mercator limit, beyond which y diverges
const MAX_MERCATOR_LAT: f64 = 85.051_128;
const TILE_SIZE: f64 = 256.0;

/// Output size and zoom of a map
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    /// 0 picks a zoom that fits both stations
    pub zoom: u32,
    pub output_path: PathBuf,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            zoom: 4,
            output_path: PathBuf::from("grid_map.png"),
        }
    }
}

/// Zoom level that fits the (already padded) bounding box into `width` x `height`.
pub fn calculate_zoom_level(
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
    width: u32,
    height: u32,
) -> u32 {
    let lat_zoom = (180.0 / (max_lat - min_lat)).log2();
    let lon_zoom = (360.0 / (max_lon - min_lon)).log2();

    let zoom = lat_zoom.min(lon_zoom)
        + (width as f64 / TILE_SIZE).min(height as f64 / TILE_SIZE).log2();

    zoom.clamp(1.0, 18.0).floor() as u32
}

/// Zoom for two points: bounding box with at least 1 degree per axis plus 10% padding.
fn auto_zoom(a: LatLon, b: LatLon, width: u32, height: u32) -> u32 {
    const PADDING: f64 = 0.1;

    let (min_lat, max_lat) = (a.lat.min(b.lat), a.lat.max(b.lat));
    let (min_lon, max_lon) = (a.lon.min(b.lon), a.lon.max(b.lon));
    let lat_range = (max_lat - min_lat).max(1.0);
    let lon_range = (max_lon - min_lon).max(1.0);

    calculate_zoom_level(
        min_lat - lat_range * PADDING,
        max_lat + lat_range * PADDING,
        min_lon - lon_range * PADDING,
        max_lon + lon_range * PADDING,
        width,
        height,
    )
}

/// World pixel coordinates of a position at `zoom`
fn project(p: LatLon, zoom: u32) -> (f64, f64) {
    let world = TILE_SIZE * 2f64.powi(zoom as i32);
    let lat = p.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();

    let x = (p.lon + 180.0) / 360.0 * world;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * world;
    (x, y)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders two-station maps. Fonts are loaded once per renderer.
pub struct GridMapRenderer {
    fontdb: Arc<fontdb::Database>,
}

impl Default for GridMapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl GridMapRenderer {
    pub fn new() -> Self {
        let mut fontdb = fontdb::Database::new();
        fontdb.load_system_fonts();
        fontdb.load_fonts_dir("fonts");
        tracing::debug!("Loaded {} font faces for map rendering", fontdb.len());

        Self {
            fontdb: Arc::new(fontdb),
        }
    }

    /// Build the SVG document for a map between two locators.
    pub fn build_svg(&self, my_grid: &str, their_grid: &str, config: &MapConfig) -> Result<String, MapError> {
        let mine = parse_locator(my_grid)?;
        let theirs = parse_locator(their_grid)?;

        let (width, height) = (config.width as f64, config.height as f64);
        let zoom = if config.zoom > 0 {
            config.zoom
        } else {
            auto_zoom(mine, theirs, config.width, config.height)
        };

        let center = LatLon::new((mine.lat + theirs.lat) / 2.0, (mine.lon + theirs.lon) / 2.0);
        let (cx, cy) = project(center, zoom);
        let to_canvas = |p: LatLon| {
            let (x, y) = project(p, zoom);
            (x - cx + width / 2.0, y - cy + height / 2.0)
        };

        let mut svg = String::new();
        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = config.width,
            h = config.height
        ));
        svg.push_str(r##"<rect x="0" y="0" width="100%" height="100%" fill="#AAD3DF"/>"##);

        // Graticule
        let step = match zoom {
            0..=2 => 30,
            3..=4 => 10,
            5..=6 => 5,
            _ => 1,
        };
        svg.push_str(r##"<g stroke="#FFFFFF" stroke-width="0.5" stroke-opacity="0.7">"##);
        for lon in (-180..=180).step_by(step) {
            let (x, _) = to_canvas(LatLon::new(0.0, lon as f64));
            if (0.0..=width).contains(&x) {
                svg.push_str(&format!(r#"<line x1="{x:.1}" y1="0" x2="{x:.1}" y2="{height}"/>"#));
            }
        }
        for lat in (-80..=80).step_by(step) {
            let (_, y) = to_canvas(LatLon::new(lat as f64, 0.0));
            if (0.0..=height).contains(&y) {
                svg.push_str(&format!(r#"<line x1="0" y1="{y:.1}" x2="{width}" y2="{y:.1}"/>"#));
            }
        }
        svg.push_str("</g>");

        // Path and markers
        let (mx, my) = to_canvas(mine);
        let (tx, ty) = to_canvas(theirs);
        svg.push_str(&format!(
            r##"<line x1="{mx:.1}" y1="{my:.1}" x2="{tx:.1}" y2="{ty:.1}" stroke="#00FF00" stroke-width="2"/>"##
        ));
        svg.push_str(&format!(
            r##"<circle cx="{mx:.1}" cy="{my:.1}" r="8" fill="#FF0000" stroke="#FFFFFF" stroke-width="1.5"/>"##
        ));
        svg.push_str(&format!(
            r##"<circle cx="{tx:.1}" cy="{ty:.1}" r="8" fill="#0000FF" stroke="#FFFFFF" stroke-width="1.5"/>"##
        ));

        // Attribution
        let attribution = escape_xml(&format!("QSL Map: {} <-> {}", my_grid, their_grid));
        svg.push_str(&format!(
            r##"<rect x="0" y="{ry}" width="{width}" height="18" fill="#FFFFFF" fill-opacity="0.7"/><text x="6" y="{text_y}" font-family="sans-serif" font-size="11" fill="#333333">{attribution}</text>"##,
            ry = height - 18.0,
            text_y = height - 5.0,
        ));
        svg.push_str("</svg>");

        Ok(svg)
    }

    /// Render a map between two locators to PNG bytes.
    pub fn render_png(&self, my_grid: &str, their_grid: &str, config: &MapConfig) -> Result<Vec<u8>, MapError> {
        let svg = self.build_svg(my_grid, their_grid, config)?;

        let mut options = Options::default();
        options.fontdb = self.fontdb.clone();

        let tree = Tree::from_str(&svg, &options).map_err(|e| MapError::Svg(e.to_string()))?;

        let size = tree.size();
        let mut pixmap = tiny_skia::Pixmap::new(size.width() as u32, size.height() as u32)
            .ok_or_else(|| MapError::Render(format!("invalid map size {}x{}", config.width, config.height)))?;

        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

        pixmap.encode_png().map_err(|e| MapError::Render(e.to_string()))
    }

    /// Render a map, publish it at `config.output_path` and return the PNG bytes.
    ///
    /// The file is written under a temporary name and renamed into place, so
    /// readers of `output_path` never see a partial image.
    pub fn create_grid_map(&self, my_grid: &str, their_grid: &str, config: &MapConfig) -> Result<Vec<u8>, MapError> {
        let png = self.render_png(my_grid, their_grid, config)?;
        save_png(&png, &config.output_path)?;
        Ok(png)
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Sibling of `path` that no other writer in this or another process uses.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(name)
}

fn save_png(png: &[u8], path: &Path) -> Result<(), MapError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, png)?;
    std::fs::rename(&tmp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&tmp);
    })?;
    Ok(())
}
