//! Reference interpreter for the encoded instruction subset.
//!
//! Models the 32 GPRs, cr0, the XER carry bit, LR, CTR, and a single
//! load-reservation. Native hooks stand in for code at fixed addresses;
//! reaching one runs the hook with the ABI argument registers and returns
//! to LR. Execution ends when control reaches [`RETURN_ADDR`].

mod exec;
mod memory;

pub use memory::{Memory, PAGE_SIZE};

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

use crate::reg::CrBit;

/// Link-register value that terminates [`Machine::run`].
pub const RETURN_ADDR: u32 = 0xffff_fff0;

/// Default instruction budget per run.
pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;

/// Interpreter errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("memory fault at {addr:#010x}")]
    Fault { addr: u32 },
    #[error("illegal instruction {word:#010x} at {pc:#010x}")]
    IllegalInstruction { pc: u32, word: u32 },
    #[error("trap at {pc:#010x}")]
    Trap { pc: u32 },
    #[error("step limit of {limit} instructions exceeded")]
    StepLimit { limit: u64 },
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Native hook: receives memory and five 64-bit arguments, returns a
/// 64-bit result.
pub type Native = Box<dyn FnMut(&mut Memory, [u64; 5]) -> u64 + Send>;

/// Architectural register state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cpu {
    pub gpr: [u32; 32],
    /// cr0 bits indexed by [`CrBit`].
    pub cr0: [bool; 4],
    /// XER carry.
    pub ca: bool,
    pub lr: u32,
    pub ctr: u32,
    pub pc: u32,
    reservation: Option<u32>,
}

impl Cpu {
    #[inline]
    pub const fn cr_bit(&self, bit: CrBit) -> bool {
        self.cr0[bit as usize]
    }

    /// Record a signed comparison of `value` against zero.
    #[inline]
    fn record(&mut self, value: u32) {
        let v = value as i32;
        self.cr0 = [v < 0, v > 0, v == 0, false];
    }

    /// 64-bit value held in a high/low register pair.
    #[inline]
    pub fn pair(&self, hi: usize, lo: usize) -> u64 {
        (u64::from(self.gpr[hi]) << 32) | u64::from(self.gpr[lo])
    }

    #[inline]
    pub fn set_pair(&mut self, hi: usize, lo: usize, value: u64) {
        self.gpr[hi] = (value >> 32) as u32;
        self.gpr[lo] = value as u32;
    }
}

/// CPU, memory, and native hooks.
pub struct Machine {
    pub cpu: Cpu,
    pub mem: Memory,
    natives: FxHashMap<u32, Native>,
    max_steps: u64,
    steps: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::default(),
            mem: Memory::new(),
            natives: FxHashMap::default(),
            max_steps: DEFAULT_MAX_STEPS,
            steps: 0,
        }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Instructions executed by the most recent run.
    #[inline]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Install a native hook at `addr`.
    pub fn register_native<F>(&mut self, addr: u32, f: F)
    where
        F: FnMut(&mut Memory, [u64; 5]) -> u64 + Send + 'static,
    {
        self.natives.insert(addr & !3, Box::new(f));
    }

    /// Map and fill a code region.
    pub fn load_code(&mut self, addr: u32, words: &[u32]) -> Result<()> {
        self.mem.map(addr, (words.len() * 4) as u32);
        self.mem.write_words(addr, words)
    }

    /// Call `entry` the way the host ABI would: `r1 = sp`, `r3 = arg`,
    /// return address [`RETURN_ADDR`]. Returns the `r3:r4` pair.
    pub fn call(&mut self, entry: u32, sp: u32, arg: u32) -> Result<u64> {
        self.cpu.gpr[1] = sp;
        self.cpu.gpr[3] = arg;
        self.cpu.lr = RETURN_ADDR;
        self.cpu.pc = entry;
        self.run()
    }

    /// Run from the current pc until control reaches [`RETURN_ADDR`].
    pub fn run(&mut self) -> Result<u64> {
        self.steps = 0;
        loop {
            let pc = self.cpu.pc;
            if pc == RETURN_ADDR {
                return Ok(self.cpu.pair(3, 4));
            }
            if self.natives.contains_key(&pc) {
                self.call_native(pc);
                continue;
            }
            if self.steps >= self.max_steps {
                return Err(SimError::StepLimit {
                    limit: self.max_steps,
                });
            }
            self.steps += 1;
            self.step()?;
        }
    }

    fn call_native(&mut self, pc: u32) {
        let cpu = &self.cpu;
        let sp = cpu.gpr[1];
        let args = [
            cpu.pair(3, 4),
            cpu.pair(5, 6),
            cpu.pair(7, 8),
            cpu.pair(9, 10),
            // Fifth argument lives in the caller's parameter area.
            self.mem.read_u64(sp.wrapping_add(8)).unwrap_or(0),
        ];
        trace!(addr = pc, ?args, "native call");
        if let Some(native) = self.natives.get_mut(&pc) {
            let ret = native(&mut self.mem, args);
            self.cpu.set_pair(3, 4, ret);
        }
        self.cpu.pc = self.cpu.lr;
    }
}

#[cfg(test)]
mod tests;
