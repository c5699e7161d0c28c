//! PNG figures: observation maps and per-cluster density curves.
//! Equirectangular projection; no coastlines.

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use leafn_core::dataset::Screening;
use leafn_core::summary::ClusterSummaries;
use leafn_core::ObservationTable;

const MAP_W: u32 = 720;
const MAP_H: u32 = 360;
const PLOT_W: u32 = 800;
const PLOT_H: u32 = 400;
const MARGIN: u32 = 40;

const WHITE: [u8; 3] = [255, 255, 255];
const GRID: [u8; 3] = [215, 215, 215];
const AXIS: [u8; 3] = [60, 60, 60];
const INCLUDED: [u8; 3] = [30, 120, 60];
const EXCLUDED: [u8; 3] = [175, 175, 175];

/// Cluster colours, cycled for k > 8.
const PALETTE: [[u8; 3]; 8] = [
    [228, 26, 28],   // red
    [55, 126, 184],  // blue
    [77, 175, 74],   // green
    [152, 78, 163],  // purple
    [255, 127, 0],   // orange
    [166, 86, 40],   // brown
    [247, 129, 191], // pink
    [153, 153, 153], // grey
];

pub fn cluster_color(cluster: usize) -> [u8; 3] {
    PALETTE[cluster % PALETTE.len()]
}

// ── Drawing helpers ──────────────────────────────────────────────────────────

fn canvas(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb(WHITE))
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: [u8; 3]) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, Rgb(color));
    }
}

fn dot(img: &mut RgbImage, x: u32, y: u32, color: [u8; 3]) {
    for dy in -1..=1i64 {
        for dx in -1..=1i64 {
            put(img, x as i64 + dx, y as i64 + dy, color);
        }
    }
}

/// Straight segment by stepping along the longer axis.
fn line(img: &mut RgbImage, (x0, y0): (f64, f64), (x1, y1): (f64, f64), color: [u8; 3]) {
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).ceil().max(1.0) as usize;
    for s in 0..=steps {
        let t = s as f64 / steps as f64;
        put(img, (x0 + (x1 - x0) * t).round() as i64, (y0 + (y1 - y0) * t).round() as i64, color);
    }
}

/// (longitude, latitude) → pixel on the MAP_W × MAP_H equirectangular grid.
pub fn project(lon: f64, lat: f64) -> Option<(u32, u32)> {
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    let x = (lon + 180.0) / 360.0 * (MAP_W - 1) as f64;
    let y = (90.0 - lat) / 180.0 * (MAP_H - 1) as f64;
    Some((x.round() as u32, y.round() as u32))
}

/// Blank map with a 30° graticule; equator drawn darker.
fn base_map() -> RgbImage {
    let mut img = canvas(MAP_W, MAP_H);
    for lon in (-180..=180).step_by(30) {
        if let Some((x, _)) = project(lon as f64, 0.0) {
            for y in 0..MAP_H {
                img.put_pixel(x, y, Rgb(GRID));
            }
        }
    }
    for lat in (-90..=90).step_by(30) {
        if let Some((_, y)) = project(0.0, lat as f64) {
            let color = if lat == 0 { AXIS } else { GRID };
            for x in 0..MAP_W {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }
    img
}

fn save(img: &RgbImage, path: &Path) -> Result<()> {
    img.save(path).with_context(|| format!("saving {}", path.display()))?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

// ── Figures ──────────────────────────────────────────────────────────────────

/// Included observations over excluded ones (excluded drawn first).
pub fn observation_map(screening: &Screening, path: &Path) -> Result<()> {
    let mut img = base_map();
    for (lon, lat) in screening.excluded.iter().filter_map(|e| e.coordinates) {
        if let Some((x, y)) = project(lon, lat) {
            dot(&mut img, x, y, EXCLUDED);
        }
    }
    for obs in screening.table.rows() {
        if let Some((x, y)) = project(obs.longitude, obs.latitude) {
            dot(&mut img, x, y, INCLUDED);
        }
    }
    save(&img, path)
}

/// Observations coloured by cluster label.
pub fn cluster_map(table: &ObservationTable, labels: &[usize], k: usize, path: &Path) -> Result<()> {
    let mut img = base_map();
    // Largest clusters first so small ones stay visible on top.
    let mut order: Vec<usize> = (0..k).collect();
    let mut sizes = vec![0usize; k];
    for &l in labels {
        sizes[l] += 1;
    }
    order.sort_by(|a, b| sizes[*b].cmp(&sizes[*a]));
    for c in order {
        for (obs, _) in table.rows().iter().zip(labels).filter(|(_, &l)| l == c) {
            if let Some((x, y)) = project(obs.longitude, obs.latitude) {
                dot(&mut img, x, y, cluster_color(c));
            }
        }
    }
    save(&img, path)
}

/// Overlaid leaf N density curves, one colour per cluster.
pub fn density_plot(summaries: &ClusterSummaries, path: &Path) -> Result<()> {
    let mut img = canvas(PLOT_W, PLOT_H);
    let x_left = MARGIN as f64;
    let x_right = (PLOT_W - MARGIN) as f64;
    let y_bottom = (PLOT_H - MARGIN) as f64;
    let y_top = MARGIN as f64;

    line(&mut img, (x_left, y_bottom), (x_right, y_bottom), AXIS);
    line(&mut img, (x_left, y_bottom), (x_left, y_top), AXIS);

    let grid = &summaries.grid;
    let y_max = summaries.max_density();
    if grid.len() >= 2 && y_max > 0.0 {
        let (g0, g1) = (grid[0], grid[grid.len() - 1]);
        let to_px = |g: f64, d: f64| {
            (
                x_left + (g - g0) / (g1 - g0) * (x_right - x_left),
                y_bottom - d / y_max * (y_bottom - y_top),
            )
        };
        for c in &summaries.clusters {
            let color = cluster_color(c.cluster);
            for i in 1..grid.len() {
                line(
                    &mut img,
                    to_px(grid[i - 1], c.density[i - 1]),
                    to_px(grid[i], c.density[i]),
                    color,
                );
            }
        }
    }
    save(&img, path)
}
