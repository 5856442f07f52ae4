//! Tail-call sequence.
//!
//! R2 holds the program array, R3 the index. The sequence falls through to
//! the next instruction when the index is out of range, the chain is
//! already at its limit, or the slot is empty. Otherwise it bumps the
//! counter, tears down the frame, and branches past the target's entry
//! setup.

use pjit_isa::Reg;
use pjit_ppc::encode::{BCTR, NOP, add, addi, bc, cmplw, cmplwi, lwz, mtctr, slwi, stw};
use pjit_ppc::Cond;

use crate::emitter::Codegen;
use crate::prologue::TAIL_CALL_ENTRY;
use crate::registers::{TMP, reserved, wide};

impl Codegen<'_> {
    pub(crate) fn emit_tail_call(&mut self) {
        let layout = self.ctx.layout;
        let offsets = self.config.tail_call_layout;
        let array = wide(Reg::R2).lo;
        let index = wide(Reg::R3).lo;
        let sp = reserved::SP;
        let tcc = layout.tail_call_cnt_offset();

        self.mark(TMP);
        self.ctx.seen.set_tail_call();

        let mut outs = Vec::with_capacity(3);

        // if (index >= array->max_entries) goto out
        self.emit(lwz(TMP, offsets.max_entries, array));
        self.emit(cmplw(index, TMP));
        outs.push((self.ctx.idx, Cond::GE));
        self.emit(NOP);

        // if (tail_call_cnt >= MAX) goto out. Counted in TMP: addi with
        // r0 as source reads zero.
        self.emit(lwz(TMP, tcc, sp));
        self.emit(cmplwi(TMP, self.config.max_tail_calls));
        outs.push((self.ctx.idx, Cond::GE));
        self.emit(NOP);
        self.emit(addi(TMP, TMP, 1));
        self.emit(stw(TMP, tcc, sp));

        // prog = array->ptrs[index]; if (!prog) goto out
        self.emit(slwi(TMP, index, 2));
        self.emit(add(TMP, TMP, array));
        self.emit(lwz(TMP, offsets.ptrs, TMP));
        self.emit(cmplwi(TMP, 0));
        outs.push((self.ctx.idx, Cond::EQ));
        self.emit(NOP);

        // goto *(prog->func + TAIL_CALL_ENTRY)
        self.emit(lwz(TMP, offsets.prog_func, TMP));
        if self.config.function_descriptors {
            self.emit(lwz(TMP, 0, TMP));
        }
        self.emit(addi(TMP, TMP, TAIL_CALL_ENTRY as i16));
        self.emit(mtctr(TMP));
        self.build_common_epilogue();
        self.emit(BCTR);

        let out = self.ctx.idx;
        for (at, cond) in outs {
            self.patch(at, bc(cond, ((out - at) * 4) as i32));
        }
    }
}

#[cfg(test)]
mod tests {
    use pjit_isa::ProgramInfo;
    use pjit_ppc::decode::{Insn, decode};

    use super::*;
    use crate::config::EmitConfig;
    use crate::context::CodegenContext;

    fn sequence(config: &EmitConfig) -> Vec<u32> {
        let mut ctx = CodegenContext::new(ProgramInfo::new()).unwrap();
        let mut image = vec![0; 64];
        let mut cg = Codegen::new(&mut ctx, config, &mut image);
        cg.emit_tail_call();
        let len = ctx.idx as usize;
        image.truncate(len);
        image
    }

    #[test]
    fn test_out_branches_land_after_sequence() {
        let words = sequence(&EmitConfig::default());
        let end = (words.len() * 4) as i32;
        let mut branches = 0;
        for (i, &word) in words.iter().enumerate() {
            if let Some(Insn::Bc { disp, .. }) = decode(word) {
                assert_eq!(i as i32 * 4 + disp, end);
                branches += 1;
            }
        }
        assert_eq!(branches, 3);
        assert_eq!(words.last(), Some(&BCTR));
    }

    #[test]
    fn test_descriptor_adds_one_load() {
        let plain = sequence(&EmitConfig::default());
        let desc = sequence(&EmitConfig::default().with_function_descriptors(true));
        assert_eq!(desc.len(), plain.len() + 1);
    }

    #[test]
    fn test_counter_increments_loaded_value() {
        let words = sequence(&EmitConfig::default());
        let tcc = CodegenContext::new(ProgramInfo::new())
            .unwrap()
            .layout
            .tail_call_cnt_offset();
        let load = words
            .iter()
            .position(|&w| w == lwz(TMP, tcc, reserved::SP))
            .unwrap();
        assert_eq!(words[load + 3], addi(TMP, TMP, 1));
        assert_eq!(words[load + 4], stw(TMP, tcc, reserved::SP));
    }

    #[test]
    fn test_marks_state() {
        let mut ctx = CodegenContext::new(ProgramInfo::new()).unwrap();
        let config = EmitConfig::default();
        Codegen::dry(&mut ctx, &config).emit_tail_call();
        assert!(ctx.seen.has_tail_call());
        assert!(ctx.seen.is_marked(TMP));
    }
}
