// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terra Parser - Readers for terrain source files
//!
//! This crate reads the two inputs of tile construction: elevation grids
//! (DEM) and polygon layers already clipped to a tile. Errors are reported
//! as `terra_model::ParseError` so callers can tell missing files from bad
//! content.
//!
//! # Features
//!
//! - **Token parsing** using `nom` combinators
//! - **Fast float parsing** using `lexical-core`
//! - **`#` comments** allowed anywhere whitespace is
//!
//! # Example
//!
//! ```ignore
//! use terra_parser::read_dem;
//!
//! let dem = read_dem("work/DEM-3/e000n00/e000n00/2912.dem")?;
//! println!("{} x {} samples", dem.header.cols, dem.header.rows);
//! ```

mod dem;
mod polygon;
mod tokenizer;

pub use dem::{parse_dem, read_dem, DemData, DemHeader};
pub use polygon::{parse_polygons, read_polygons, PolygonFileSource};
