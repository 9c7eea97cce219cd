//! Error types for kosmo operations
//!
//! Errors are structured with fields to aid debugging. Variants that wrap
//! a remote failure carry enough context to tell the operator which
//! resource or step was involved.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for kosmo operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The API server has no mapping for the requested kind
    ///
    /// Typically means the CRD providing the kind is not installed (yet).
    #[error("no match for kind {kind} in group {group}")]
    NoKindMatch {
        /// API group that was queried
        group: String,
        /// Kind that could not be resolved
        kind: String,
    },

    /// A condition watch gave up before its predicate was satisfied
    #[error("watch timed out: {reason}")]
    WatchTimeout {
        /// What was being waited for
        reason: String,
    },

    /// A condition watch terminated for a reason other than the deadline
    #[error("watch failed: {reason}")]
    WatchFailed {
        /// Why the watch could not continue
        reason: String,
    },

    /// API discovery failed
    #[error("discovery error: {message}")]
    Discovery {
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind involved (if known)
        kind: Option<String>,
    },

    /// Helm invocation error
    #[error("helm error: {message}")]
    Helm {
        /// Description of what failed
        message: String,
    },

    /// Remote fetch error (chart index, catalog, manifests, license)
    #[error("fetch error [{url}]: {message}")]
    Fetch {
        /// URL that was being fetched
        url: String,
        /// Description of what failed
        message: String,
    },

    /// A package manifest was fetched but cannot be installed
    #[error("invalid package {name}: {message}")]
    InvalidPackage {
        /// Package name from the catalog
        name: String,
        /// What is wrong with it
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "install", "watcher")
        context: String,
    },
}

impl Error {
    /// Create a NoKindMatch error for the given group/kind pair
    pub fn no_kind_match(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::NoKindMatch {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Create a watch timeout error describing what was being waited for
    pub fn watch_timeout(reason: impl Into<String>) -> Self {
        Self::WatchTimeout {
            reason: reason.into(),
        }
    }

    /// Create a terminal watch failure
    pub fn watch_failed(reason: impl Into<String>) -> Self {
        Self::WatchFailed {
            reason: reason.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery {
            message: msg.into(),
        }
    }

    /// Create a serialization error without kind context
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error for a specific resource kind
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a helm error
    pub fn helm(msg: impl Into<String>) -> Self {
        Self::Helm {
            message: msg.into(),
        }
    }

    /// Create a fetch error for the given URL
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid package error
    pub fn invalid_package(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidPackage {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error without specific context
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether this error is the watch deadline sentinel
    ///
    /// Callers use this to turn a wait timeout into an actionable message
    /// instead of a generic failure.
    pub fn is_watch_timeout(&self) -> bool {
        matches!(self, Error::WatchTimeout { .. })
    }

    /// Whether this error is a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(ae) } if ae.code == 404)
    }

    /// Whether retrying the operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) => ae.code == 429 || ae.code >= 500,
                _ => true,
            },
            Error::NoKindMatch { .. } => false,
            Error::WatchTimeout { .. } => true,
            Error::WatchFailed { .. } => false,
            Error::Discovery { .. } => true,
            Error::Serialization { .. } => false,
            Error::Helm { .. } => true,
            Error::Fetch { .. } => true,
            Error::InvalidPackage { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> Error {
        Error::Kube {
            source: kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "boom".to_string(),
                reason: "TestReason".to_string(),
                code,
            }),
        }
    }

    /// Story: a timed-out wait is distinguishable from every other failure
    /// so call sites can print what was being waited for.
    #[test]
    fn story_watch_timeout_is_a_distinct_sentinel() {
        let timeout = Error::watch_timeout("pods to become Ready");
        assert!(timeout.is_watch_timeout());
        assert!(timeout.to_string().contains("pods to become Ready"));

        // A watch that failed for another reason is not the sentinel.
        assert!(!Error::watch_failed("stream closed by server").is_watch_timeout());
        assert!(!api_error(500).is_watch_timeout());
        assert!(!Error::no_kind_match("pkg.crossplane.io", "Provider").is_watch_timeout());
    }

    /// Story: a missing CRD mapping surfaces as NoKindMatch so teardown
    /// paths can treat "not installed" as already done.
    #[test]
    fn story_missing_kind_names_group_and_kind() {
        let err = Error::no_kind_match("rbac.authorization.k8s.io", "ClusterRoleBinding");
        match &err {
            Error::NoKindMatch { group, kind } => {
                assert_eq!(group, "rbac.authorization.k8s.io");
                assert_eq!(kind, "ClusterRoleBinding");
            }
            _ => panic!("expected NoKindMatch variant"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(403).is_not_found());
        assert!(!Error::internal("nope").is_not_found());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(api_error(500).is_retryable());
        assert!(api_error(429).is_retryable());
        assert!(!api_error(404).is_retryable());
        assert!(!api_error(409).is_retryable());

        assert!(Error::watch_timeout("anything").is_retryable());
        assert!(Error::helm("transient").is_retryable());
        assert!(Error::fetch("https://example.com", "timeout").is_retryable());
        assert!(!Error::serialization("bad yaml").is_retryable());
        assert!(!Error::invalid_package("provider-git", "wrong group").is_retryable());
    }

    #[test]
    fn test_internal_error_context() {
        let err = Error::internal_with_context("install", "unexpected state");
        assert!(err.to_string().contains("[install]"));
        assert!(err.to_string().contains("unexpected state"));

        let err = Error::internal("unexpected state");
        assert!(err.to_string().contains(&format!("[{UNKNOWN_CONTEXT}]")));
    }
}
