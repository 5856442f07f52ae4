//! Multi-function programs.
//!
//! A program with subprogram calls is split into subprograms that each
//! get their own image. Every subprogram is compiled once with calls to
//! not-yet-compiled siblings left as placeholders; once all of them have
//! addresses, the pending ones are resumed and only their call targets
//! are patched.

use pjit_emit::{CallKind, CallResolver, CallSite, Resolution};
use pjit_isa::Program;
use tracing::{debug, info_span};

use crate::alloc::ImageAllocator;
use crate::error::{Error, Result};
use crate::helpers::HelperTable;
use crate::jit::{Compiled, CompiledProgram, Jit};

/// Helpers plus the entry addresses of the subprograms compiled so far.
struct UnitResolver<'a> {
    helpers: &'a HelperTable,
    entries: &'a [Option<u32>],
}

impl CallResolver for UnitResolver<'_> {
    fn resolve(&self, site: &CallSite) -> Option<Resolution> {
        match site.kind {
            CallKind::Helper(_) => self.helpers.resolve(site),
            CallKind::Subprog(id) => {
                let slot = self.entries.get(usize::try_from(id).ok()?)?;
                Some(slot.map_or(Resolution::Deferred, |addr| Resolution::Resolved {
                    addr,
                    fixed: false,
                }))
            }
        }
    }
}

/// Every subprogram of a program, compiled. Index 0 is the entry.
#[derive(Clone, Debug)]
pub struct CompiledUnit {
    programs: Vec<CompiledProgram>,
}

impl CompiledUnit {
    /// Entry address of the main program.
    pub fn entry(&self) -> u32 {
        self.programs[0].entry()
    }

    pub fn main(&self) -> &CompiledProgram {
        &self.programs[0]
    }

    pub fn programs(&self) -> &[CompiledProgram] {
        &self.programs
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Total image bytes.
    pub fn len_bytes(&self) -> u32 {
        self.programs.iter().map(|p| p.image().len_bytes()).sum()
    }
}

impl<A: ImageAllocator> Jit<A> {
    /// Compile a whole program, splitting it at subprogram boundaries when
    /// it calls into itself.
    ///
    /// # Errors
    ///
    /// Fails if any subprogram fails; the unit runs interpreted then.
    pub fn compile_unit(&self, program: &Program, helpers: &HelperTable) -> Result<CompiledUnit> {
        if !program.has_local_calls() {
            let compiled = self.compile(program, helpers)?;
            return Ok(CompiledUnit {
                programs: vec![compiled],
            });
        }

        let parts = program.split()?;
        let _span = info_span!("unit", subprogs = parts.len()).entered();

        let mut entries: Vec<Option<u32>> = vec![None; parts.len()];
        let mut first = Vec::with_capacity(parts.len());
        for (id, part) in parts.iter().enumerate() {
            let resolver = UnitResolver {
                helpers,
                entries: &entries,
            };
            let compiled = self.compile_initial(part, &resolver)?;
            debug!(id, entry = compiled.entry(), pending = compiled.is_pending(), "first phase");
            entries[id] = Some(compiled.entry());
            first.push(compiled);
        }

        let resolver = UnitResolver {
            helpers,
            entries: &entries,
        };
        let programs = first
            .into_iter()
            .enumerate()
            .map(|(id, compiled)| match compiled {
                Compiled::Done(program) => Ok(program),
                Compiled::Pending(snapshot) => {
                    self.resume(snapshot, &resolver)
                        .map_err(|err| match err {
                            Error::Translate(inner) => Error::ResolutionFailed {
                                id,
                                reason: inner.to_string(),
                            },
                            other => other,
                        })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledUnit { programs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(kind: CallKind) -> CallSite {
        CallSite { index: 3, kind }
    }

    #[test]
    fn test_unit_resolver() {
        let helpers = HelperTable::with_slots(0x4000_0000, [1]);
        let entries = [Some(0x1000), None];
        let resolver = UnitResolver {
            helpers: &helpers,
            entries: &entries,
        };
        assert_eq!(
            resolver.resolve(&site(CallKind::Subprog(0))),
            Some(Resolution::Resolved {
                addr: 0x1000,
                fixed: false
            })
        );
        assert_eq!(
            resolver.resolve(&site(CallKind::Subprog(1))),
            Some(Resolution::Deferred)
        );
        assert_eq!(resolver.resolve(&site(CallKind::Subprog(2))), None);
        assert_eq!(resolver.resolve(&site(CallKind::Subprog(-1))), None);
        assert_eq!(
            resolver.resolve(&site(CallKind::Helper(1))),
            Some(Resolution::Resolved {
                addr: 0x4000_0000,
                fixed: true
            })
        );
    }
}
