//! Helper and subprogram calls.
//!
//! Both kinds load the target into r0 with a fixed `lis`/`ori` pair and
//! branch through CTR, so a placeholder address can be patched without
//! changing the code length. R1..R5 are already in the argument
//! registers; the result comes back in r3:r4 and is moved into R0.

use pjit_isa::{CallTarget, Reg};
use pjit_ppc::Gpr;
use pjit_ppc::encode::{BCTRL, mr, mtctr, stw};
use tracing::trace;

use super::Translator;
use crate::error::{Result, TranslateError};
use crate::layout::PARAM_AREA;
use crate::registers::reserved;
use crate::resolve::{CallKind, CallSite, Resolution, ResolvePhase};

impl Translator<'_, '_> {
    pub(super) fn call(&mut self, target: CallTarget) -> Result<()> {
        let kind = match target {
            CallTarget::Helper(id) => CallKind::Helper(id),
            CallTarget::Local(id) => CallKind::Subprog(id),
            CallTarget::Kfunc(_) => return Err(self.unsupported("kernel function call")),
        };
        let site = CallSite {
            index: self.index,
            kind,
        };
        let addr = match self.resolver.resolve(&site) {
            Some(Resolution::Resolved { addr, fixed }) => {
                trace!(index = self.index, ?kind, addr, fixed, "call target");
                addr
            }
            Some(Resolution::Deferred)
                if matches!(kind, CallKind::Subprog(_)) && self.phase == ResolvePhase::Initial =>
            {
                self.cg.ctx.pending_calls = true;
                0
            }
            Some(Resolution::Deferred) => {
                return Err(self.resolution_failed("address still unknown"));
            }
            None => return Err(self.resolution_failed("no such target")),
        };

        self.cg.ctx.seen.set_func();
        if let CallKind::Helper(_) = kind {
            // Helpers take a fifth argument in the caller's parameter area.
            let r5 = self.reg(Reg::R5);
            self.emit(stw(r5.hi, PARAM_AREA, reserved::SP));
            self.emit(stw(r5.lo, PARAM_AREA + 4, reserved::SP));
        }
        self.cg.li32_fixed(Gpr::R0, addr);
        self.emit(mtctr(Gpr::R0));
        self.emit(BCTRL);

        let r0 = self.reg(Reg::R0);
        self.emit(mr(r0.hi, reserved::RET_HI));
        self.emit(mr(r0.lo, reserved::RET_LO));
        Ok(())
    }

    fn resolution_failed(&self, reason: &str) -> TranslateError {
        TranslateError::ResolutionFailed {
            index: self.index,
            reason: reason.to_owned(),
        }
    }
}
