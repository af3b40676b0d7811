//! # geocluster-types
//!
//! Core geometry and item types for the geocluster crate.
//!
//! - **Projected geometry**: `ProjectedPoint`, `Bounds`
//! - **Items**: the `ClusterItem` trait and the `GeoItem` implementation
//!
//! Geographic positions use `geo::Point<f64>` with x = longitude and
//! y = latitude, the same convention as the rest of the `geo` ecosystem.
//!
//! ## Examples
//!
//! ```rust
//! use geocluster_types::bounds::Bounds;
//! use geocluster_types::item::{ClusterItem, GeoItem};
//! use geocluster_types::point::ProjectedPoint;
//!
//! let item = GeoItem::new(1, -74.0060, 40.7128).with_title("NYC");
//! assert_eq!(item.title(), Some("NYC"));
//!
//! let bounds = Bounds::new(0.0, 256.0, 0.0, 256.0);
//! assert!(bounds.contains_point(&ProjectedPoint::new(128.0, 64.0)));
//! ```

pub mod bounds;
pub mod item;
pub mod point;
