//! Executes compiled images on the reference interpreter.

use pjit_emit::TailCallLayout;
use pjit_ppc::sim::{Cpu, Machine, Memory};
use tracing::{debug, info};

use crate::error::Result;
use crate::helpers::HelperTable;
use crate::image::GeneratedImage;
use crate::unit::CompiledUnit;

// ============================================================================
// Guest address map
// ============================================================================

/// Start of the region the default image allocator hands out.
pub const CODE_BASE: u32 = 0x0010_0000;
pub const CODE_SIZE: u32 = 0x0100_0000;
/// Where context memory passed as the first argument is mapped.
pub const CTX_BASE: u32 = 0x2000_0000;
/// First helper slot.
pub const HELPER_BASE: u32 = 0x4000_0000;
pub const STACK_TOP: u32 = 0x7fff_0000;
pub const STACK_SIZE: u32 = 0x0010_0000;

/// Helpers every [`Runner`] can bind.
pub mod builtin {
    /// Logs its five arguments, returns 0.
    pub const TRACE: i32 = 6;
    /// Returns the next value of a fixed-seed xorshift sequence.
    pub const PRANDOM: i32 = 7;
}

/// Addresses of the [`builtin`] helpers, in the slots
/// [`Runner::bind_builtins`] binds them to.
pub fn builtin_table() -> HelperTable {
    HelperTable::with_slots(HELPER_BASE, [builtin::TRACE, builtin::PRANDOM])
}

/// Alignment of program objects in a tail-call array.
const PROG_OBJ_ALIGN: u32 = 16;

/// A simulated machine with stack, helpers, and loaded images.
pub struct Runner {
    machine: Machine,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        let mut machine = Machine::new();
        machine.mem.map(STACK_TOP - STACK_SIZE, STACK_SIZE);
        Self { machine }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.machine = self.machine.with_max_steps(max_steps);
        self
    }

    /// Map and copy an image, descriptor header included.
    ///
    /// # Errors
    ///
    /// Cannot fail for a fresh mapping; propagates interpreter faults.
    pub fn load(&mut self, image: &GeneratedImage) -> Result<()> {
        self.machine.load_code(image.base(), image.words())?;
        debug!(base = image.base(), bytes = image.len_bytes(), "loaded image");
        Ok(())
    }

    /// Load every image of a unit.
    ///
    /// # Errors
    ///
    /// See [`Runner::load`].
    pub fn load_unit(&mut self, unit: &CompiledUnit) -> Result<()> {
        for program in unit.programs() {
            self.load(program.image())?;
        }
        Ok(())
    }

    /// Run `f` whenever control reaches `addr`.
    pub fn bind_helper<F>(&mut self, addr: u32, f: F)
    where
        F: FnMut(&mut Memory, [u64; 5]) -> u64 + Send + 'static,
    {
        self.machine.register_native(addr, f);
    }

    /// Bind the [`builtin`] helpers at consecutive slots from
    /// [`HELPER_BASE`] and return their addresses.
    pub fn bind_builtins(&mut self) -> HelperTable {
        let table = builtin_table();
        for (id, addr) in table.iter() {
            match id {
                builtin::TRACE => self.bind_helper(addr, |_, args| {
                    info!(?args, "trace");
                    0
                }),
                builtin::PRANDOM => {
                    let mut state = 0x2545_f491_4f6c_dd1d_u64;
                    self.bind_helper(addr, move |_, _| {
                        state ^= state << 13;
                        state ^= state >> 7;
                        state ^= state << 17;
                        state & 0xffff_ffff
                    });
                }
                _ => {}
            }
        }
        table
    }

    /// Map `len` zeroed bytes at `addr`.
    pub fn map(&mut self, addr: u32, len: u32) {
        self.machine.mem.map(addr, len);
    }

    pub const fn memory(&self) -> &Memory {
        &self.machine.mem
    }

    pub const fn memory_mut(&mut self) -> &mut Memory {
        &mut self.machine.mem
    }

    /// Build a tail-call program array at `addr`: capacity `slots.len()`,
    /// one pointer per slot, and a program object for each filled slot.
    ///
    /// # Errors
    ///
    /// Propagates interpreter faults.
    pub fn install_prog_array(
        &mut self,
        addr: u32,
        layout: &TailCallLayout,
        slots: &[Option<&GeneratedImage>],
    ) -> Result<()> {
        let count = slots.len() as u32;
        let table = addr + layout.ptrs as u32;
        let obj_size = (layout.prog_func as u32 + 4).next_multiple_of(PROG_OBJ_ALIGN);
        let objects = (table + 4 * count).next_multiple_of(PROG_OBJ_ALIGN);
        let end = objects + obj_size * count;
        self.map(addr, end - addr);

        let mem = &mut self.machine.mem;
        mem.write_u32(addr + layout.max_entries as u32, count)?;
        for (i, slot) in (0u32..).zip(slots) {
            let ptr = match slot {
                Some(image) => {
                    let obj = objects + i * obj_size;
                    mem.write_u32(obj + layout.prog_func as u32, image.func_addr())?;
                    obj
                }
                None => 0,
            };
            mem.write_u32(table + 4 * i, ptr)?;
        }
        debug!(addr, count, "installed program array");
        Ok(())
    }

    /// Call `entry` with `ctx` as the first argument and return `R0`.
    ///
    /// # Errors
    ///
    /// Faults, traps, and the step limit end the run with an error.
    pub fn call(&mut self, entry: u32, ctx: u32) -> Result<u64> {
        let ret = self.machine.call(entry, STACK_TOP - 16, ctx)?;
        debug!(entry, steps = self.machine.steps(), ret, "returned");
        Ok(ret)
    }

    /// Register state after the last call.
    pub const fn cpu(&self) -> &Cpu {
        &self.machine.cpu
    }

    /// Instructions executed by the last call.
    pub const fn steps(&self) -> u64 {
        self.machine.steps()
    }
}
