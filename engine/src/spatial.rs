use crate::geometry::{WorldPoint, WorldRect};

const GRID_COLS: usize = 32;
const GRID_ROWS: usize = 32;

/// A flat 2D bucket grid over normalized world space for marker hit-testing.
/// Rebuilt only when the catalog loads; the catalog is immutable afterwards.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cells: Vec<Vec<usize>>,
    positions: Vec<WorldPoint>,
}

impl SpatialGrid {
    pub fn build(positions: &[WorldPoint]) -> Self {
        let mut cells = vec![Vec::new(); GRID_COLS * GRID_ROWS];
        for (idx, p) in positions.iter().enumerate() {
            let (col, row) = cell_of(*p);
            cells[row * GRID_COLS + col].push(idx);
        }
        Self {
            cells,
            positions: positions.to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Indices of all points within `radius` of `center`, nearest first.
    pub fn query_radius(&self, center: WorldPoint, radius: f64) -> Vec<(usize, f64)> {
        if self.positions.is_empty() || !(radius >= 0.0) {
            return Vec::new();
        }
        let bounds = WorldRect {
            min_x: center.x,
            min_y: center.y,
            max_x: center.x,
            max_y: center.y,
        }
        .inflate(radius);
        if !bounds.intersects(&WorldRect::UNIT) {
            return Vec::new();
        }

        let (col_start, row_start) = cell_of(WorldPoint::new(bounds.min_x, bounds.min_y));
        let (col_end, row_end) = cell_of(WorldPoint::new(bounds.max_x, bounds.max_y));

        let mut hits = Vec::new();
        for row in row_start..=row_end {
            for col in col_start..=col_end {
                for &idx in &self.cells[row * GRID_COLS + col] {
                    let p = self.positions[idx];
                    let d = (p.x - center.x).hypot(p.y - center.y);
                    if d <= radius {
                        hits.push((idx, d));
                    }
                }
            }
        }
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }

    /// Index of the closest point to `p`, scanning outward ring by ring.
    pub fn nearest(&self, p: WorldPoint) -> Option<usize> {
        if self.positions.is_empty() {
            return None;
        }
        let cell_w = 1.0 / GRID_COLS as f64;
        let mut radius = cell_w;
        // Beyond sqrt(2) every point in the unit square is in range.
        while radius < 2.0 {
            if let Some(&(idx, _)) = self.query_radius(p, radius).first() {
                return Some(idx);
            }
            radius *= 2.0;
        }
        self.positions
            .iter()
            .enumerate()
            .min_by(|a, b| {
                let da = (a.1.x - p.x).hypot(a.1.y - p.y);
                let db = (b.1.x - p.x).hypot(b.1.y - p.y);
                da.total_cmp(&db)
            })
            .map(|(idx, _)| idx)
    }
}

fn cell_of(p: WorldPoint) -> (usize, usize) {
    let col = (p.x.clamp(0.0, 1.0) * GRID_COLS as f64).floor() as usize;
    let row = (p.y.clamp(0.0, 1.0) * GRID_ROWS as f64).floor() as usize;
    (col.min(GRID_COLS - 1), row.min(GRID_ROWS - 1))
}
