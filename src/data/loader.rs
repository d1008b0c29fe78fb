use crate::pipeline::{Point, PointSet};
use anyhow::Context;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Load `x,y` rows from a CSV file
pub fn load_points<P: AsRef<Path>>(path: P) -> crate::Result<PointSet> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let points = parse_points(&content);
    tracing::debug!(path = %path.display(), points = points.len(), "Loaded point set");
    Ok(points)
}

/// Parse `x,y` rows.
///
/// A first line that does not parse is taken as a header. Later rows that
/// do not parse, or carry non-finite values, are logged and skipped.
pub fn parse_points(content: &str) -> PointSet {
    let mut points = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_row(line) {
            Some(p) => points.push(p),
            None if line_no == 0 => {}
            None => tracing::warn!(line = line_no + 1, content = line, "Skipping unparsable row"),
        }
    }

    PointSet::new(points)
}

fn parse_row(line: &str) -> Option<Point> {
    let mut fields = line.split(',').map(str::trim);
    let x = fields.next()?.parse::<f64>().ok()?;
    let y = fields.next()?.parse::<f64>().ok()?;
    let p = Point::new(x, y);
    p.is_finite().then_some(p)
}

/// Write `points` as CSV with an `x,y` header
pub fn save_points<P: AsRef<Path>>(path: P, points: &PointSet) -> crate::Result<()> {
    let path = path.as_ref();
    let mut out = String::with_capacity(points.len() * 24 + 4);
    out.push_str("x,y\n");
    for p in points {
        writeln!(out, "{},{}", p.x, p.y)?;
    }
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn validate_point_set(points: &PointSet, min_points: usize) -> crate::Result<()> {
    if points.len() < min_points {
        return Err(anyhow::anyhow!(
            "Point set too small: {} points, minimum: {}",
            points.len(),
            min_points
        ));
    }
    if !points.is_finite() {
        return Err(anyhow::anyhow!("Point set contains non-finite coordinates"));
    }
    Ok(())
}
