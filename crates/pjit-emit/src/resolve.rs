//! Call target resolution.
//!
//! The translator asks a [`CallResolver`] for the address of every call.
//! Helpers are always known. Subprogram addresses only exist once every
//! subprogram of the unit has been allocated, so the first compilation of
//! a subprogram may get [`Resolution::Deferred`] and emit a placeholder
//! that the fixup pass rewrites later.

/// What a call instruction invokes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    Helper(i32),
    /// Subprogram id within the unit.
    Subprog(i32),
}

/// A call site being translated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallSite {
    /// VM instruction index of the call.
    pub index: usize,
    pub kind: CallKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Absolute entry address. `fixed` is set when the address can never
    /// change for the lifetime of the unit.
    Resolved { addr: u32, fixed: bool },
    /// Not known yet.
    Deferred,
}

/// Whether the translation may leave subprogram calls unresolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvePhase {
    /// First compilation of a unit member.
    Initial,
    /// Every subprogram has an address; deferral is an error.
    Final,
}

/// Supplies call target addresses.
pub trait CallResolver {
    /// `None` means the target does not exist.
    fn resolve(&self, site: &CallSite) -> Option<Resolution>;
}

/// Resolver for programs that make no calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCalls;

impl CallResolver for NoCalls {
    fn resolve(&self, _site: &CallSite) -> Option<Resolution> {
        None
    }
}

impl<F> CallResolver for F
where
    F: Fn(&CallSite) -> Option<Resolution>,
{
    fn resolve(&self, site: &CallSite) -> Option<Resolution> {
        self(site)
    }
}
