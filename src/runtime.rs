use std::cmp::Ordering;

use colored::Colorize;
use miette::Result;

use crate::error;
use crate::host::HostIo;

/// LC3 can address 64K words of memory.
pub const MEMORY_MAX: usize = 0x10000;
/// Where user code is loaded and where execution begins.
pub const PC_START: u16 = 0x3000;

/// Keyboard status register: bit 15 is set while a key is ready.
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register: holds the key consumed by the last status read.
pub const KBDR: u16 = 0xFE02;

const TRAP_GETC: u16 = 0x20;
const TRAP_OUT: u16 = 0x21;
const TRAP_PUTS: u16 = 0x22;
const TRAP_IN: u16 = 0x23;
const TRAP_PUTSP: u16 = 0x24;
const TRAP_HALT: u16 = 0x25;

/// Represents complete program state during runtime.
pub struct RunState {
    /// System memory - 64K words, kept on the heap as it is too large
    /// for the stack.
    mem: Box<[u16]>,
    /// Program counter
    pc: u16,
    /// 8x 16-bit registers
    reg: [u16; 8],
    /// Condition code
    flag: RunFlag,
    /// Cleared by the HALT trap; nothing else stops the machine.
    running: bool,
    /// Host side of guest I/O: trap routines and the keyboard registers.
    io: Box<dyn HostIo>,
    /// Instructions retired since boot.
    instructions_run: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunFlag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

impl RunState {
    pub fn new(io: Box<dyn HostIo>) -> RunState {
        RunState {
            mem: vec![0; MEMORY_MAX].into_boxed_slice(),
            pc: PC_START,
            reg: [0; 8],
            flag: RunFlag::Z,
            running: true,
            io,
            instructions_run: 0,
        }
    }

    /// Copy an image payload into memory at `origin`, truncating at the
    /// end of the address space.
    pub fn load_image(&mut self, origin: u16, words: &[u16]) {
        let start = usize::from(origin);
        let len = words.len().min(MEMORY_MAX - start);
        self.mem[start..start + len].copy_from_slice(&words[..len]);
    }

    const OP_TABLE: [fn(&mut RunState, u16) -> Result<()>; 16] = [
        Self::br,   // 0x0
        Self::add,  // 0x1
        Self::ld,   // 0x2
        Self::st,   // 0x3
        Self::jsr,  // 0x4
        Self::and,  // 0x5
        Self::ldr,  // 0x6
        Self::str,  // 0x7
        Self::rti,  // 0x8
        Self::not,  // 0x9
        Self::ldi,  // 0xA
        Self::sti,  // 0xB
        Self::jmp,  // 0xC
        Self::res,  // 0xD
        Self::lea,  // 0xE
        Self::trap, // 0xF
    ];

    /// Run until the HALT trap clears the running flag or an instruction
    /// faults.
    pub fn run(&mut self) -> Result<()> {
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    /// One fetch-decode-execute cycle.
    pub fn step(&mut self) -> Result<()> {
        let instr = self.read_mem(self.pc);
        let opcode = (instr >> 12) as usize;
        // PC incremented before instruction is performed
        self.pc = self.pc.wrapping_add(1);
        Self::OP_TABLE[opcode](self, instr)?;
        self.instructions_run += 1;
        Ok(())
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn flag(&self) -> RunFlag {
        self.flag
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn instructions_run(&self) -> u64 {
        self.instructions_run
    }

    #[inline]
    fn reg(&mut self, reg: u16) -> &mut u16 {
        // SAFETY: Should only be indexed with values that are & 0b111
        unsafe { self.reg.get_unchecked_mut(reg as usize) }
    }

    /// Read a word, consulting the host when the guest looks at the
    /// keyboard status register.
    fn read_mem(&mut self, addr: u16) -> u16 {
        if addr == KBSR {
            // A poll failure reads as "no key ready"
            match self.io.poll_key() {
                Ok(Some(key)) => {
                    self.mem[usize::from(KBDR)] = u16::from(key);
                    self.mem[usize::from(KBSR)] = 0x8000;
                }
                _ => {
                    self.mem[usize::from(KBDR)] = 0;
                    self.mem[usize::from(KBSR)] = 0;
                }
            }
        }
        // SAFETY: memory fits any u16 index
        unsafe { *self.mem.get_unchecked(usize::from(addr)) }
    }

    /// Write a word. The device registers ignore stores.
    fn write_mem(&mut self, addr: u16, val: u16) {
        if addr == KBSR || addr == KBDR {
            return;
        }
        // SAFETY: memory fits any u16 index
        unsafe {
            *self.mem.get_unchecked_mut(usize::from(addr)) = val;
        }
    }

    #[inline]
    fn s_ext(val: u16, bits: u32) -> u16 {
        let mask = (1u32 << bits) - 1;
        let val = u32::from(val) & mask;
        if val & (1 << (bits - 1)) == 0 {
            // positive
            val as u16
        } else {
            // negative: 1-extend
            (val | !mask) as u16
        }
    }

    #[inline]
    fn set_flags(&mut self, val: u16) {
        self.flag = match (val as i16).cmp(&0) {
            Ordering::Less => RunFlag::N,
            Ordering::Equal => RunFlag::Z,
            Ordering::Greater => RunFlag::P,
        }
    }

    fn br(&mut self, instr: u16) -> Result<()> {
        let flag = (instr >> 9) & 0b111;
        if self.flag as u16 & flag != 0 {
            self.pc = self.pc.wrapping_add(Self::s_ext(instr, 9));
        }
        Ok(())
    }

    fn add(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = *self.reg(sr);
        // Check if imm
        let val2 = if instr & 0b100000 == 0 {
            // reg
            *self.reg(instr & 0b111)
        } else {
            // imm
            Self::s_ext(instr, 5)
        };
        let res = val1.wrapping_add(val2);
        self.set_flags(res);
        *self.reg(dr) = res;
        Ok(())
    }

    fn and(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = *self.reg(sr);
        let val2 = if instr & 0b100000 == 0 {
            // reg
            *self.reg(instr & 0b111)
        } else {
            // imm
            Self::s_ext(instr, 5)
        };
        let res = val1 & val2;
        self.set_flags(res);
        *self.reg(dr) = res;
        Ok(())
    }

    fn jmp(&mut self, instr: u16) -> Result<()> {
        // BaseR of 7 is RET
        let br = (instr >> 6) & 0b111;
        self.pc = *self.reg(br);
        Ok(())
    }

    fn jsr(&mut self, instr: u16) -> Result<()> {
        *self.reg(7) = self.pc;
        if instr & 0x800 == 0 {
            // reg
            let br = (instr >> 6) & 0b111;
            self.pc = *self.reg(br);
        } else {
            // offs
            self.pc = self.pc.wrapping_add(Self::s_ext(instr, 11));
        }
        Ok(())
    }

    fn ld(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let val = self.read_mem(self.pc.wrapping_add(Self::s_ext(instr, 9)));
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn ldi(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let ptr = self.read_mem(self.pc.wrapping_add(Self::s_ext(instr, 9)));
        let val = self.read_mem(ptr);
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn ldr(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let br = (instr >> 6) & 0b111;
        let ptr = *self.reg(br);
        let val = self.read_mem(ptr.wrapping_add(Self::s_ext(instr, 6)));
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn lea(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let val = self.pc.wrapping_add(Self::s_ext(instr, 9));
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn not(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;
        let val = !*self.reg(sr);
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn rti(&mut self, _instr: u16) -> Result<()> {
        Err(error::exec_illegal(0x8, self.pc.wrapping_sub(1)))
    }

    fn res(&mut self, _instr: u16) -> Result<()> {
        Err(error::exec_illegal(0xD, self.pc.wrapping_sub(1)))
    }

    fn st(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let val = *self.reg(sr);
        self.write_mem(self.pc.wrapping_add(Self::s_ext(instr, 9)), val);
        Ok(())
    }

    fn sti(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let val = *self.reg(sr);
        let ptr = self.read_mem(self.pc.wrapping_add(Self::s_ext(instr, 9)));
        self.write_mem(ptr, val);
        Ok(())
    }

    fn str(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let br = (instr >> 6) & 0b111;
        let val = *self.reg(sr);
        let ptr = *self.reg(br);
        self.write_mem(ptr.wrapping_add(Self::s_ext(instr, 6)), val);
        Ok(())
    }

    fn trap(&mut self, instr: u16) -> Result<()> {
        // R7 holds the return address for software RET conventions;
        // control returns to the next instruction regardless.
        *self.reg(7) = self.pc;
        match instr & 0xFF {
            // getc
            TRAP_GETC => {
                // A failed or exhausted stdin presents as a NUL read
                let key = self.io.read_key().unwrap_or(0);
                *self.reg(0) = u16::from(key);
                self.set_flags(u16::from(key));
            }
            // out
            TRAP_OUT => {
                let chr = (*self.reg(0) & 0xFF) as u8;
                self.write_host(&[chr])?;
            }
            // puts
            TRAP_PUTS => {
                let mut addr = *self.reg(0);
                let mut buf = Vec::new();
                loop {
                    let word = self.read_mem(addr);
                    if word == 0 {
                        break;
                    }
                    buf.push((word & 0xFF) as u8);
                    // The top of memory acts as an implicit terminator
                    let Some(next) = addr.checked_add(1) else { break };
                    addr = next;
                }
                self.write_host(&buf)?;
            }
            // in
            TRAP_IN => {
                self.write_host(b"Enter a character: ")?;
                let key = self.io.read_key().unwrap_or(0);
                self.write_host(&[key])?;
                *self.reg(0) = u16::from(key);
                self.set_flags(u16::from(key));
            }
            // putsp
            TRAP_PUTSP => {
                let mut addr = *self.reg(0);
                let mut buf = Vec::new();
                loop {
                    let word = self.read_mem(addr);
                    if word == 0 {
                        break;
                    }
                    buf.push((word & 0xFF) as u8);
                    let high = (word >> 8) as u8;
                    if high != 0 {
                        buf.push(high);
                    }
                    let Some(next) = addr.checked_add(1) else { break };
                    addr = next;
                }
                self.write_host(&buf)?;
            }
            // halt
            TRAP_HALT => {
                let banner = format!("\n{:>12}\n", "Halted".cyan());
                self.write_host(banner.as_bytes())?;
                self.running = false;
            }
            // unknown
            vect => return Err(error::exec_unknown_trap(vect, self.pc.wrapping_sub(1))),
        }
        Ok(())
    }

    /// Guest-visible output. A stdout failure is fatal for the machine.
    fn write_host(&mut self, bytes: &[u8]) -> Result<()> {
        self.io
            .write(bytes)
            .and_then(|()| self.io.flush())
            .map_err(error::exec_host_io)
    }
}
