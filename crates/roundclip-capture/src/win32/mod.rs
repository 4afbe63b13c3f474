//! Win32 interop: enumeration, bounds and GDI capture surfaces.

pub mod bounds;
pub mod capturer;
pub mod enumerate;
pub mod surface;
