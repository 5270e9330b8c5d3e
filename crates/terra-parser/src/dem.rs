// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DEM grid reader
//!
//! Text layout, whitespace delimited:
//!
//! ```text
//! origin_x origin_y
//! cols col_step
//! rows row_step
//! <cols*rows samples, column-major: col varies slowest>
//! ```
//!
//! Origin and steps are in arc-seconds, samples in meters.

use crate::tokenizer::Cursor;
use std::path::Path;
use terra_model::{ParseError, Result, MAX_GRID_DIM};

/// Grid geometry read from a DEM header
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemHeader {
    /// Longitude of column 0 in arc-seconds
    pub origin_x: f64,
    /// Latitude of row 0 in arc-seconds
    pub origin_y: f64,
    pub cols: usize,
    /// Arc-seconds between columns
    pub col_step: f64,
    pub rows: usize,
    /// Arc-seconds between rows
    pub row_step: f64,
}

impl DemHeader {
    /// Number of samples the body must contain
    pub fn sample_count(&self) -> usize {
        self.cols * self.rows
    }
}

/// Parsed DEM file: header plus column-major samples
#[derive(Clone, Debug)]
pub struct DemData {
    pub header: DemHeader,
    /// `samples[col * rows + row]`
    pub samples: Vec<f64>,
}

/// Parse DEM text content
pub fn parse_dem(content: &str) -> Result<DemData> {
    let mut cursor = Cursor::new(content);
    let header = parse_header(&mut cursor)?;

    let expected = header.sample_count();
    let mut samples = Vec::with_capacity(expected);
    while samples.len() < expected {
        match cursor.next_number() {
            Some(v) => samples.push(v),
            None => break,
        }
    }

    if samples.len() < expected {
        // Distinguish a short file from a bad token in the body
        if !cursor.at_end() {
            return Err(ParseError::format(format!(
                "unparsable elevation sample at position {}",
                samples.len()
            )));
        }
        return Err(ParseError::Truncated {
            expected,
            found: samples.len(),
        });
    }

    Ok(DemData { header, samples })
}

/// Read and parse a DEM file
///
/// A path of `-` asks for standard input, which is not supported.
pub fn read_dem(path: impl AsRef<Path>) -> Result<DemData> {
    let path = path.as_ref();
    if path.as_os_str() == "-" {
        return Err(ParseError::unsupported(
            "reading a DEM from standard input",
        ));
    }
    if !path.exists() {
        return Err(ParseError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    parse_dem(&content)
}

fn parse_header(cursor: &mut Cursor<'_>) -> Result<DemHeader> {
    let origin_x = header_number(cursor, "origin_x")?;
    let origin_y = header_number(cursor, "origin_y")?;
    let cols = header_count(cursor, "cols")?;
    let col_step = header_number(cursor, "col_step")?;
    let rows = header_count(cursor, "rows")?;
    let row_step = header_number(cursor, "row_step")?;

    for (name, dim) in [("cols", cols), ("rows", rows)] {
        if !(2..=MAX_GRID_DIM).contains(&dim) {
            return Err(ParseError::header(format!(
                "{} = {} outside supported range 2..={}",
                name, dim, MAX_GRID_DIM
            )));
        }
    }
    for (name, step) in [("col_step", col_step), ("row_step", row_step)] {
        if !(step.is_finite() && step > 0.0) {
            return Err(ParseError::header(format!(
                "{} must be positive, got {}",
                name, step
            )));
        }
    }

    Ok(DemHeader {
        origin_x,
        origin_y,
        cols,
        col_step,
        rows,
        row_step,
    })
}

fn header_number(cursor: &mut Cursor<'_>, field: &str) -> Result<f64> {
    cursor
        .next_number()
        .ok_or_else(|| ParseError::header(format!("missing or invalid {}", field)))
}

fn header_count(cursor: &mut Cursor<'_>, field: &str) -> Result<usize> {
    cursor
        .next_count()
        .ok_or_else(|| ParseError::header(format!("missing or invalid {}", field)))
}
