//! Platform logic for the kosmo installer
//!
//! The [`install`] and [`uninstall`] modules orchestrate the pipelines;
//! the remaining modules each own one platform concern (runtime chart,
//! package catalog, controller configs, RBAC, XRD schemas, claims).

#![deny(missing_docs)]

pub mod catalog;
pub mod claims;
pub mod configurations;
pub mod controllerconfigs;
pub mod crds;
pub mod defaults;
pub mod helm;
pub mod install;
pub mod license;
pub mod packages;
pub mod pods;
pub mod rbac;
pub mod uninstall;
pub mod values;
pub mod xrd;

pub use kosmo_common::{Error, Result};
