pub mod export;
pub mod formats;
pub mod math;
pub mod scene;
pub mod source;

/// Version of the i3D schema written into every exported document.
pub const I3D_VERSION: &str = "1.6";

/// Name the exporter reports in the `Asset` section.
pub const EXPORTER_NAME: &str = "Blender Exporter (Community)";

pub const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");
