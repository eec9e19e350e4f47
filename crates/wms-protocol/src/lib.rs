//! OGC WMS protocol support.
//!
//! Only the client side of WMS 1.3.0 GetMap is implemented: building the
//! query for one square tile of a layer.

pub mod getmap;

pub use getmap::{GetMapError, GetMapRequest, MapFormat, WMS_VERSION};
