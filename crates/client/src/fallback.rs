//! Remote-first writes with a local fallback.
//!
//! Aggregates try the gateway first. When the gateway cannot help (offline,
//! unreachable, or it answered with an error) the same change is applied to
//! local state instead, and the caller learns which path was taken.

use std::future::Future;

use tracing::warn;

use crate::error::Result;

/// A value plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synced<T> {
    /// Confirmed by the gateway.
    Remote(T),
    /// Applied locally only.
    LocalOnly(T),
}

impl<T> Synced<T> {
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Remote(value) | Self::LocalOnly(value) => value,
        }
    }

    #[must_use]
    pub const fn value(&self) -> &T {
        match self {
            Self::Remote(value) | Self::LocalOnly(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        match self {
            Self::Remote(value) => Synced::Remote(f(value)),
            Self::LocalOnly(value) => Synced::LocalOnly(f(value)),
        }
    }
}

/// Await `remote`; on a remote-side failure run `local` instead.
///
/// Failures that did not come from the gateway (local validation, storage)
/// are returned as-is without trying `local`.
///
/// # Errors
///
/// Returns the non-remote error from `remote`, or whatever `local` returns.
pub async fn remote_or_local<T, F, L>(remote: F, local: L) -> Result<Synced<T>>
where
    F: Future<Output = Result<T>>,
    L: FnOnce() -> Result<T>,
{
    match remote.await {
        Ok(value) => Ok(Synced::Remote(value)),
        Err(e) if e.is_remote() => {
            warn!(error = %e, "gateway unavailable, applying change locally");
            local().map(Synced::LocalOnly)
        }
        Err(e) => Err(e),
    }
}
