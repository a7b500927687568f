//! In-memory population raster read from an ESRI ASCII grid.
//!
//! The grid header names the raster dimensions, the lower-left origin (either
//! as a cell corner or a cell centre), the cell size and the no-data marker.
//! Data rows follow from north to south. Summing over a polygon counts every
//! data cell whose centre lies inside it, which matches clipping the raster to
//! the polygon and summing the remaining cells.

use std::collections::HashMap;
use std::fs;
use std::ops::RangeInclusive;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use catchment_core::{PopulationError, PopulationService};
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use log::debug;
use thiserror::Error;

const DEFAULT_NODATA: f64 = -9999.0;

/// Errors raised while reading a population grid.
#[derive(Debug, Error)]
pub enum GridError {
    /// The grid file could not be read.
    #[error("failed to read population grid {path}: {source}")]
    Io {
        /// File that failed to open.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// A required header key is absent.
    #[error("population grid header lacks `{0}`")]
    MissingHeader(&'static str),
    /// A header value is not a valid number.
    #[error("invalid population grid header `{key}`: {value}")]
    InvalidHeader {
        /// Header key, lowercased.
        key: String,
        /// Offending value.
        value: String,
    },
    /// The raster has no cells or a non-positive cell size.
    #[error("population grid must have positive dimensions and cell size")]
    EmptyGrid,
    /// A cell value is not a number.
    #[error("invalid population value `{value}` in cell {index}")]
    InvalidValue {
        /// Zero-based cell index in row-major order.
        index: usize,
        /// Offending token.
        value: String,
    },
    /// The number of cells does not match `ncols * nrows`.
    #[error("population grid holds {found} cells, expected {expected}")]
    CellCount {
        /// Cells announced by the header.
        expected: usize,
        /// Cells present in the body.
        found: usize,
    },
}

/// Population raster held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationGrid {
    ncols: usize,
    nrows: usize,
    /// Longitude of the western edge.
    x_min: f64,
    /// Latitude of the southern edge.
    y_min: f64,
    cell_size: f64,
    /// Row-major cells, northernmost row first.
    cells: Vec<Option<f64>>,
}

impl PopulationGrid {
    /// Read and parse the grid stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Io`] when the file cannot be read and a parse
    /// error when its contents are malformed.
    pub fn load(path: &Utf8Path) -> Result<Self, GridError> {
        let text = fs::read_to_string(path).map_err(|source| GridError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let grid: Self = text.parse()?;
        debug!(
            "Loaded {}x{} population grid from {path}",
            grid.ncols, grid.nrows
        );
        Ok(grid)
    }

    /// Number of columns.
    #[must_use]
    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of rows.
    #[must_use]
    pub const fn nrows(&self) -> usize {
        self.nrows
    }

    fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row * self.ncols + col).copied().flatten()
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "cell centres are offsets from the raster origin"
    )]
    #[expect(
        clippy::cast_precision_loss,
        reason = "raster dimensions stay far below 2^52"
    )]
    fn centre(&self, row: usize, col: usize) -> Point<f64> {
        let x = self.x_min + (col as f64 + 0.5) * self.cell_size;
        let y = self.y_min + ((self.nrows - row) as f64 - 0.5) * self.cell_size;
        Point::new(x, y)
    }

    /// Columns whose centres fall within `[min, max]` longitude.
    #[expect(clippy::float_arithmetic, reason = "degrees are scaled to cell units")]
    fn columns(&self, min: f64, max: f64) -> Option<RangeInclusive<usize>> {
        centre_span(
            (min - self.x_min) / self.cell_size,
            (max - self.x_min) / self.cell_size,
            self.ncols,
        )
    }

    /// Rows whose centres fall within `[min, max]` latitude.
    #[expect(clippy::float_arithmetic, reason = "degrees are scaled to cell units")]
    #[expect(
        clippy::cast_precision_loss,
        reason = "raster dimensions stay far below 2^52"
    )]
    fn rows(&self, min: f64, max: f64) -> Option<RangeInclusive<usize>> {
        let top = self.y_min + self.nrows as f64 * self.cell_size;
        centre_span(
            (top - max) / self.cell_size,
            (top - min) / self.cell_size,
            self.nrows,
        )
    }
}

/// Map a span in cell units onto the indices whose centres it covers.
#[expect(clippy::float_arithmetic, reason = "cell centres sit half a cell in")]
#[expect(
    clippy::cast_precision_loss,
    reason = "raster dimensions stay far below 2^52"
)]
#[expect(
    clippy::cast_possible_truncation,
    reason = "both bounds are whole numbers clamped to the raster"
)]
#[expect(
    clippy::cast_sign_loss,
    reason = "the lower bound is clamped to zero"
)]
fn centre_span(from: f64, to: f64, len: usize) -> Option<RangeInclusive<usize>> {
    let first = (from - 0.5).ceil().max(0.0);
    let last = (to - 0.5).floor().min(len as f64 - 1.0);
    if !(first.is_finite() && last.is_finite()) || last < first {
        return None;
    }
    Some(first as usize..=last as usize)
}

impl PopulationService for PopulationGrid {
    #[expect(clippy::float_arithmetic, reason = "population counts are summed")]
    fn sum_population(&self, area: &MultiPolygon<f64>) -> Result<Option<f64>, PopulationError> {
        let Some(bounds) = area.bounding_rect() else {
            return Ok(None);
        };
        let (Some(rows), Some(cols)) = (
            self.rows(bounds.min().y, bounds.max().y),
            self.columns(bounds.min().x, bounds.max().x),
        ) else {
            return Ok(None);
        };

        let mut total: Option<f64> = None;
        for row in rows {
            for col in cols.clone() {
                let Some(value) = self.cell(row, col) else {
                    continue;
                };
                if area.contains(&self.centre(row, col)) {
                    *total.get_or_insert(0.0) += value;
                }
            }
        }
        Ok(total)
    }
}

impl FromStr for PopulationGrid {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut header: HashMap<String, String> = HashMap::new();
        let mut lines = s.lines().peekable();
        while let Some(&line) = lines.peek() {
            let mut parts = line.split_whitespace();
            let Some(key) = parts.next() else {
                lines.next();
                continue;
            };
            if !key.starts_with(|c: char| c.is_ascii_alphabetic()) {
                break;
            }
            let value = parts.next().unwrap_or_default();
            header.insert(key.to_ascii_lowercase(), value.to_owned());
            lines.next();
        }

        let ncols = header_usize(&header, "ncols")?;
        let nrows = header_usize(&header, "nrows")?;
        let cell_size = header_f64(&header, "cellsize")?;
        if ncols == 0 || nrows == 0 || cell_size <= 0.0 {
            return Err(GridError::EmptyGrid);
        }
        let x_min = origin(&header, "xllcorner", "xllcenter", cell_size)?;
        let y_min = origin(&header, "yllcorner", "yllcenter", cell_size)?;
        let nodata = if header.contains_key("nodata_value") {
            header_f64(&header, "nodata_value")?
        } else {
            DEFAULT_NODATA
        };

        let cells = lines
            .flat_map(str::split_whitespace)
            .enumerate()
            .map(|(index, token)| {
                let value: f64 = token.parse().map_err(|_| GridError::InvalidValue {
                    index,
                    value: token.to_owned(),
                })?;
                Ok((value != nodata && value.is_finite()).then_some(value))
            })
            .collect::<Result<Vec<_>, GridError>>()?;

        let expected = ncols * nrows;
        if cells.len() != expected {
            return Err(GridError::CellCount {
                expected,
                found: cells.len(),
            });
        }

        Ok(Self {
            ncols,
            nrows,
            x_min,
            y_min,
            cell_size,
            cells,
        })
    }
}

fn header_value<'a>(
    header: &'a HashMap<String, String>,
    key: &'static str,
) -> Result<&'a str, GridError> {
    header
        .get(key)
        .map(String::as_str)
        .ok_or(GridError::MissingHeader(key))
}

fn invalid_header(key: &str, value: &str) -> GridError {
    GridError::InvalidHeader {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}

fn header_usize(header: &HashMap<String, String>, key: &'static str) -> Result<usize, GridError> {
    let value = header_value(header, key)?;
    value.parse().map_err(|_| invalid_header(key, value))
}

fn header_f64(header: &HashMap<String, String>, key: &'static str) -> Result<f64, GridError> {
    let value = header_value(header, key)?;
    value
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| invalid_header(key, value))
}

/// Lower-left edge from either the corner or the centre form of the header.
#[expect(
    clippy::float_arithmetic,
    reason = "a centre origin sits half a cell from the edge"
)]
fn origin(
    header: &HashMap<String, String>,
    corner: &'static str,
    centre: &'static str,
    cell_size: f64,
) -> Result<f64, GridError> {
    if header.contains_key(corner) {
        return header_f64(header, corner);
    }
    if header.contains_key(centre) {
        return Ok(header_f64(header, centre)? - cell_size / 2.0);
    }
    Err(GridError::MissingHeader(corner))
}

#[cfg(test)]
#[expect(clippy::expect_used, reason = "tests use expect for readable failures")]
mod tests {
    use super::*;
    use catchment_core::test_support::square;
    use rstest::{fixture, rstest};

    /// 4x2 raster over `[0, 4] x [0, 2]` with one no-data cell.
    const GRID: &str = "ncols 4
nrows 2
xllcorner 0
yllcorner 0
cellsize 1
NODATA_value -9999
1 2 3 4
10 20 -9999 40
";

    #[fixture]
    fn grid() -> PopulationGrid {
        GRID.parse().expect("valid grid")
    }

    #[rstest]
    fn header_is_parsed(grid: PopulationGrid) {
        assert_eq!(grid.ncols(), 4);
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.cell(1, 2), None);
        assert_eq!(grid.centre(0, 0), Point::new(0.5, 1.5));
    }

    #[rstest]
    #[case(square(0.0, 0.0, 4.0), 80.0)]
    #[case(square(0.0, 0.0, 1.0), 10.0)]
    #[case(square(0.0, 1.0, 2.0), 3.0)]
    #[case(square(2.0, 0.0, 1.0), 0.0)]
    fn sums_cells_with_centres_inside(
        grid: PopulationGrid,
        #[case] area: MultiPolygon<f64>,
        #[case] expected: f64,
    ) {
        let total = grid.sum_population(&area).expect("grid query succeeds");

        if expected == 0.0 {
            assert_eq!(total, None);
        } else {
            assert_eq!(total, Some(expected));
        }
    }

    #[rstest]
    fn outside_the_raster_is_none(grid: PopulationGrid) {
        let total = grid
            .sum_population(&square(10.0, 10.0, 1.0))
            .expect("grid query succeeds");

        assert_eq!(total, None);
    }

    #[rstest]
    fn centre_origin_is_shifted_to_the_corner() {
        let grid: PopulationGrid = "NCOLS 1\nNROWS 1\nXLLCENTER 0.5\nYLLCENTER 0.5\nCELLSIZE 1\n7\n"
            .parse()
            .expect("valid grid");

        assert_eq!(grid.centre(0, 0), Point::new(0.5, 0.5));
        assert_eq!(
            grid.sum_population(&square(0.0, 0.0, 1.0))
                .expect("grid query succeeds"),
            Some(7.0)
        );
    }

    #[rstest]
    #[case("nrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1\n", "ncols")]
    #[case("ncols 1\nnrows 1\nyllcorner 0\ncellsize 1\n1\n", "xllcorner")]
    fn missing_header_is_reported(#[case] input: &str, #[case] key: &str) {
        let err = input.parse::<PopulationGrid>().expect_err("header incomplete");

        assert!(matches!(err, GridError::MissingHeader(missing) if missing == key));
    }

    #[rstest]
    fn wrong_cell_count_is_rejected() {
        let err = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n"
            .parse::<PopulationGrid>()
            .expect_err("one cell short");

        assert!(matches!(
            err,
            GridError::CellCount {
                expected: 4,
                found: 3
            }
        ));
    }

    #[rstest]
    fn non_numeric_cell_is_rejected() {
        let err = "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n12abc\n"
            .parse::<PopulationGrid>()
            .expect_err("not a number");

        assert!(matches!(err, GridError::InvalidValue { index: 0, .. }));
    }

    #[rstest]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("pop.asc")).expect("utf-8 path");
        fs::write(&path, GRID).expect("write grid");

        let grid = PopulationGrid::load(&path).expect("grid loads");

        assert_eq!(grid.ncols(), 4);
    }

    #[rstest]
    fn load_reports_missing_file() {
        let err = PopulationGrid::load(Utf8Path::new("/nonexistent/pop.asc"))
            .expect_err("file is absent");

        assert!(matches!(err, GridError::Io { .. }));
    }
}
