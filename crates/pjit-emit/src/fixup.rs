//! In-place rewrite of subprogram call targets.
//!
//! Once every subprogram of a unit has an address, the calls that were
//! emitted with a placeholder only need their `lis`/`ori` pair replaced.
//! Nothing else in the image moves.

use pjit_isa::{CallTarget, Op, Program};
use pjit_ppc::Gpr;
use pjit_ppc::encode::{lis, ori};
use tracing::trace;

use crate::address::AddressTable;
use crate::error::{Result, TranslateError};
use crate::resolve::{CallKind, CallResolver, CallSite, Resolution};

/// Rewrite the target of every subprogram call in `words`, the code
/// generated for `program` with offsets `addrs`. Returns the number of
/// call sites patched.
pub fn fixup_calls(
    words: &mut [u32],
    program: &Program,
    addrs: &AddressTable,
    resolver: &dyn CallResolver,
) -> Result<usize> {
    let mut patched = 0;
    for (index, op) in program.ops() {
        let Ok(Op::Call(CallTarget::Local(id))) = op else {
            continue;
        };
        let site = CallSite {
            index,
            kind: CallKind::Subprog(id),
        };
        let Some(Resolution::Resolved { addr, .. }) = resolver.resolve(&site) else {
            return Err(TranslateError::ResolutionFailed {
                index,
                reason: format!("subprogram {id} has no address"),
            });
        };

        let at = (addrs.get(index) / 4) as usize;
        let Some(pair) = words.get_mut(at..at + 2) else {
            return Err(TranslateError::ResolutionFailed {
                index,
                reason: "call site outside the image".to_owned(),
            });
        };
        pair[0] = lis(Gpr::R0, (addr >> 16) as u16 as i16);
        pair[1] = ori(Gpr::R0, Gpr::R0, addr as u16);
        trace!(index, id, addr, "patched call");
        patched += 1;
    }
    Ok(patched)
}
