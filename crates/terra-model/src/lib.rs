// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Terra Model - Shared types and collaborator traits for terrain tiles
//!
//! This crate holds the plain data types passed between the stages of the
//! tile construction pipeline. It carries no numeric algorithms itself, so
//! the parser and geometry crates can both depend on it without pulling in
//! each other.
//!
//! # Architecture
//!
//! - [`Bucket`] - Geodetic tile identity (index, extents, directory layout)
//! - [`ClippedPolygon`] - Polygon layer geometry tagged with an [`AreaType`]
//! - [`PolygonSource`] - Collaborator seam supplying clipped polygons per tile
//! - [`TileMesh`] - Finished mesh handed to the output serializer
//!
//! # Example
//!
//! ```ignore
//! use terra_model::Bucket;
//!
//! let bucket = Bucket::new(-122.375, 37.6);
//! println!("{} -> {}", bucket.gen_index(), bucket.gen_base_path());
//! ```

pub mod bucket;
pub mod error;
pub mod mesh;
pub mod traits;
pub mod types;

// Re-export all public types
pub use bucket::*;
pub use error::*;
pub use mesh::*;
pub use traits::*;
pub use types::*;
