//! Package descriptor data model
//!
//! [`PackageBuilder`] accumulates the output of a parse and freezes into a
//! read-only [`Package`]. [`ApkLite`] and [`PackageLite`] carry the identity
//! extracted by the locator before any full parse.

mod component;
mod lite;
mod package;

pub use component::*;
pub use lite::{long_version_code, ApkLite, PackageLite, VerifierInfo, INSTALL_LOCATION_UNSPECIFIED};
pub use package::{AppFlags, Package, PackageBuilder};
