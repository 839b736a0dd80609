//! Extension permits.
//!
//! Extending a [`crate::KnownTypes`] registry changes what every generator in
//! the process sees, so only one component may do it. Instead of inspecting
//! the call stack, the registry mints an [`ExtensionPermit`] naming its
//! holder; permits cannot be built outside this crate, and the registry's
//! [`AccessGuard`] checks the permit on every extension attempt.

use std::fmt;

use crate::error::AccessError;

/// A capability to extend one specific registry.
///
/// Minted only by the registry itself (see `KnownTypes::issue_permit`).
pub struct ExtensionPermit {
    holder: String,
    registry_id: u64,
}

impl ExtensionPermit {
    pub(crate) fn new(holder: impl Into<String>, registry_id: u64) -> Self {
        Self {
            holder: holder.into(),
            registry_id,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl fmt::Debug for ExtensionPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionPermit")
            .field("holder", &self.holder)
            .finish_non_exhaustive()
    }
}

/// Admits only permits held by one named component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGuard {
    authorized: &'static str,
}

impl AccessGuard {
    pub const fn allow_only(authorized: &'static str) -> Self {
        Self { authorized }
    }

    pub fn authorized(&self) -> &'static str {
        self.authorized
    }

    /// Check `permit` against the authorized holder and the registry it targets.
    pub fn check(&self, permit: &ExtensionPermit, registry_id: u64) -> Result<(), AccessError> {
        let caller = permit.holder();
        if caller != self.authorized {
            tracing::error!(
                caller,
                expected = self.authorized,
                "unauthorized attempt to extend known types"
            );
            return Err(AccessError::Unauthorized {
                caller: caller.to_string(),
                expected: self.authorized,
            });
        }
        if permit.registry_id != registry_id {
            return Err(AccessError::ForeignRegistry {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }
}
