//! Common types for kosmo: errors, dynamic resource access, and waits

#![deny(missing_docs)]

pub mod conditions;
pub mod dynamic;
pub mod error;
pub mod eventbus;
pub mod events;
pub mod watch;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace where the platform runtime and packages are installed
pub const DEFAULT_NAMESPACE: &str = "kosmo-system";

/// Label key stamped on every resource this tool creates or applies
pub const INSTALLED_BY_LABEL: &str = "app.kubernetes.io/installed-by";

/// Label value identifying resources owned by this tool
pub const INSTALLED_BY_VALUE: &str = "kosmo";

/// Label selector matching resources owned by this tool (for API queries)
pub const INSTALLED_BY_SELECTOR: &str = "app.kubernetes.io/installed-by=kosmo";

/// Label key linking a package's workload pods back to the package name
pub const PACKAGE_NAME_LABEL: &str = "kosmo.io/package-name";

/// Field manager name used for server-side apply
pub const FIELD_MANAGER: &str = "kosmo";

/// API group suffix shared by all platform module claims
pub const MODULES_GROUP_SUFFIX: &str = "modules.kosmo.io";
