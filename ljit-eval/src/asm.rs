use std::convert::TryFrom;
use crate::buffer::{CodeBuffer, Patch};

pub const REX_W: u8 = 0x48;
pub const LABEL_PLACEHOLDER: u32 = 0xdeadbeef;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Register {
    Rax = 0,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PartialRegister {
    Al = 0,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
}

/// Condition codes as they appear in the low nibble of `jcc`/`setcc`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Condition {
    Equal = 0x4,
    Less = 0xc,
}

/// `[reg + disp]`
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Indirect {
    pub reg: Register,
    pub disp: i32,
}

impl Indirect {
    pub fn new(reg: Register, disp: i32) -> Indirect {
        Indirect { reg, disp }
    }
}

// "no index" in a SIB byte shares its encoding with rsp
const INDEX_NONE: u8 = 0b100;
const SCALE_1: u8 = 0b00;

fn modrm(mode: u8, rm: u8, reg: u8) -> u8 {
    (mode << 6) | ((reg & 7) << 3) | (rm & 7)
}

fn sib(base: Register, index: u8, scale: u8) -> u8 {
    (scale << 6) | (index << 3) | base as u8
}

fn fits_i8(value: i32) -> bool {
    i8::try_from(value).is_ok()
}

impl CodeBuffer {
    /// `reg` is either a register number or an opcode extension.
    fn address(&mut self, reg: u8, mem: Indirect) {
        let mode = if fits_i8(mem.disp) { 0b01 } else { 0b10 };
        if mem.reg == Register::Rsp {
            self.write_u8(modrm(mode, INDEX_NONE, reg));
            self.write_u8(sib(Register::Rsp, INDEX_NONE, SCALE_1));
        } else {
            self.write_u8(modrm(mode, mem.reg as u8, reg));
        }
        if mode == 0b01 {
            self.write_u8(mem.disp as i8 as u8);
        } else {
            self.write_u32(mem.disp as u32);
        }
    }

    fn alu_reg_imm32(&mut self, rax_opcode: u8, extension: u8, dst: Register, src: i32) {
        self.write_u8(REX_W);
        if dst == Register::Rax {
            self.write_u8(rax_opcode);
        } else {
            self.write_u8(0x81);
            self.write_u8(modrm(0b11, dst as u8, extension));
        }
        self.write_u32(src as u32);
    }

    /// `mov dst, imm32` (sign-extended)
    pub fn mov_reg_imm32(&mut self, dst: Register, src: i32) {
        self.write_u8(REX_W);
        self.write_u8(0xc7);
        self.write_u8(modrm(0b11, dst as u8, 0));
        self.write_u32(src as u32);
    }

    /// `mov dst, imm64`
    pub fn mov_reg_imm64(&mut self, dst: Register, src: u64) {
        self.write_u8(REX_W);
        self.write_u8(0xb8 + dst as u8);
        self.write_bytes(&src.to_le_bytes());
    }

    /// Loads a word using the shortest `mov` that reproduces it.
    pub fn mov_reg_word(&mut self, dst: Register, word: u64) {
        match i32::try_from(word as i64) {
            Ok(imm) => self.mov_reg_imm32(dst, imm),
            Err(_) => self.mov_reg_imm64(dst, word),
        }
    }

    pub fn add_reg_imm32(&mut self, dst: Register, src: i32) {
        self.alu_reg_imm32(0x05, 0, dst, src);
    }

    pub fn sub_reg_imm32(&mut self, dst: Register, src: i32) {
        self.alu_reg_imm32(0x2d, 5, dst, src);
    }

    pub fn cmp_reg_imm32(&mut self, left: Register, right: i32) {
        self.alu_reg_imm32(0x3d, 7, left, right);
    }

    pub fn shl_reg_imm8(&mut self, dst: Register, bits: u8) {
        self.write_u8(REX_W);
        self.write_u8(0xc1);
        self.write_u8(modrm(0b11, dst as u8, 4));
        self.write_u8(bits);
    }

    pub fn shr_reg_imm8(&mut self, dst: Register, bits: u8) {
        self.write_u8(REX_W);
        self.write_u8(0xc1);
        self.write_u8(modrm(0b11, dst as u8, 5));
        self.write_u8(bits);
    }

    pub fn or_reg_imm8(&mut self, dst: Register, src: u8) {
        self.write_u8(REX_W);
        self.write_u8(0x83);
        self.write_u8(modrm(0b11, dst as u8, 1));
        self.write_u8(src);
    }

    pub fn and_reg_imm8(&mut self, dst: Register, src: u8) {
        self.write_u8(REX_W);
        self.write_u8(0x83);
        self.write_u8(modrm(0b11, dst as u8, 4));
        self.write_u8(src);
    }

    pub fn setcc_imm8(&mut self, cond: Condition, dst: PartialRegister) {
        self.write_u8(0x0f);
        self.write_u8(0x90 + cond as u8);
        self.write_u8(modrm(0b11, dst as u8, 0));
    }

    /// `mov [dst], src`
    pub fn store_reg_indirect(&mut self, dst: Indirect, src: Register) {
        self.write_u8(REX_W);
        self.write_u8(0x89);
        self.address(src as u8, dst);
    }

    /// `mov dst, [src]`
    pub fn load_reg_indirect(&mut self, dst: Register, src: Indirect) {
        self.write_u8(REX_W);
        self.write_u8(0x8b);
        self.address(dst as u8, src);
    }

    pub fn add_reg_indirect(&mut self, dst: Register, src: Indirect) {
        self.write_u8(REX_W);
        self.write_u8(0x03);
        self.address(dst as u8, src);
    }

    pub fn sub_reg_indirect(&mut self, dst: Register, src: Indirect) {
        self.write_u8(REX_W);
        self.write_u8(0x2b);
        self.address(dst as u8, src);
    }

    pub fn cmp_reg_indirect(&mut self, left: Register, right: Indirect) {
        self.write_u8(REX_W);
        self.write_u8(0x3b);
        self.address(left as u8, right);
    }

    /// `imul qword [src]`: rdx:rax = rax * [src]. Clobbers rdx.
    pub fn imul_indirect(&mut self, src: Indirect) {
        self.write_u8(REX_W);
        self.write_u8(0xf7);
        self.address(5, src);
    }

    /// `mov dst, src`
    pub fn mov_reg_reg(&mut self, dst: Register, src: Register) {
        self.write_u8(REX_W);
        self.write_u8(0x89);
        self.write_u8(modrm(0b11, dst as u8, src as u8));
    }

    pub fn jcc(&mut self, cond: Condition) -> Patch {
        self.write_u8(0x0f);
        self.write_u8(0x80 + cond as u8);
        let patch = Patch::new(self.len());
        self.write_u32(LABEL_PLACEHOLDER);
        patch
    }

    pub fn jmp(&mut self) -> Patch {
        self.write_u8(0xe9);
        let patch = Patch::new(self.len());
        self.write_u32(LABEL_PLACEHOLDER);
        patch
    }

    /// `call rel32` to an offset inside this buffer.
    pub fn call(&mut self, target: usize) {
        const CALL_LEN: i64 = 5;
        let relative = target as i64 - (self.len() as i64 + CALL_LEN);
        let relative = match i32::try_from(relative) {
            Ok(relative) => relative,
            Err(_) => panic!("call target {} is out of range", target),
        };
        self.write_u8(0xe8);
        self.write_u32(relative as u32);
    }

    /// Moves rsp by `adjust` bytes, emitting nothing for zero.
    pub fn rsp_adjust(&mut self, adjust: i32) {
        if adjust < 0 {
            self.sub_reg_imm32(Register::Rsp, -adjust);
        } else if adjust > 0 {
            self.add_reg_imm32(Register::Rsp, adjust);
        }
    }

    pub fn ret(&mut self) {
        self.write_u8(0xc3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iced_x86::{Decoder, DecoderOptions, Instruction, Mnemonic, OpKind};
    use Register::*;

    fn emit(f: impl FnOnce(&mut CodeBuffer)) -> Vec<u8> {
        let mut buf = CodeBuffer::with_capacity(1);
        f(&mut buf);
        buf.bytes().to_vec()
    }

    fn decode_one(bytes: &[u8]) -> Instruction {
        let mut decoder = Decoder::with_ip(64, bytes, 0, DecoderOptions::NONE);
        let instruction = decoder.decode();
        assert!(!instruction.is_invalid(), "invalid encoding: {:02x?}", bytes);
        assert_eq!(instruction.len(), bytes.len(), "trailing bytes in {:02x?}", bytes);
        instruction
    }

    #[test]
    fn mov_imm32() {
        assert_eq!(emit(|b| b.mov_reg_imm32(Rax, 0x1ec)), [0x48, 0xc7, 0xc0, 0xec, 0x01, 0x00, 0x00]);
        assert_eq!(emit(|b| b.mov_reg_imm32(Rax, -492)), [0x48, 0xc7, 0xc0, 0x14, 0xfe, 0xff, 0xff]);
        assert_eq!(emit(|b| b.mov_reg_imm32(Rsi, 1)), [0x48, 0xc7, 0xc6, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn mov_word_picks_encoding() {
        assert_eq!(emit(|b| b.mov_reg_word(Rax, 0x2f)), [0x48, 0xc7, 0xc0, 0x2f, 0x00, 0x00, 0x00]);
        assert_eq!(emit(|b| b.mov_reg_word(Rax, (-4i64) as u64)), [0x48, 0xc7, 0xc0, 0xfc, 0xff, 0xff, 0xff]);
        assert_eq!(
            emit(|b| b.mov_reg_word(Rcx, 0x1_0000_0000)),
            [0x48, 0xb9, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
        );
        let instruction = decode_one(&emit(|b| b.mov_reg_word(Rax, 0x1234_5678_9abc)));
        assert_eq!(instruction.mnemonic(), Mnemonic::Mov);
        assert_eq!(instruction.op0_register(), iced_x86::Register::RAX);
        assert_eq!(instruction.immediate64(), 0x1234_5678_9abc);
    }

    #[test]
    fn alu_imm32_short_form_for_rax() {
        assert_eq!(emit(|b| b.add_reg_imm32(Rax, 4)), [0x48, 0x05, 0x04, 0x00, 0x00, 0x00]);
        assert_eq!(emit(|b| b.sub_reg_imm32(Rax, 4)), [0x48, 0x2d, 0x04, 0x00, 0x00, 0x00]);
        assert_eq!(emit(|b| b.cmp_reg_imm32(Rax, 0x1f)), [0x48, 0x3d, 0x1f, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn alu_imm32_other_registers() {
        assert_eq!(emit(|b| b.add_reg_imm32(Rsi, 16)), [0x48, 0x81, 0xc6, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(emit(|b| b.sub_reg_imm32(Rsp, 8)), [0x48, 0x81, 0xec, 0x08, 0x00, 0x00, 0x00]);
        assert_eq!(emit(|b| b.cmp_reg_imm32(Rdi, 1)), [0x48, 0x81, 0xff, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn shifts_and_masks() {
        assert_eq!(emit(|b| b.shl_reg_imm8(Rax, 7)), [0x48, 0xc1, 0xe0, 0x07]);
        assert_eq!(emit(|b| b.shr_reg_imm8(Rax, 6)), [0x48, 0xc1, 0xe8, 0x06]);
        assert_eq!(emit(|b| b.or_reg_imm8(Rax, 0x1f)), [0x48, 0x83, 0xc8, 0x1f]);
        assert_eq!(emit(|b| b.and_reg_imm8(Rax, 0x3)), [0x48, 0x83, 0xe0, 0x03]);
        assert_eq!(emit(|b| b.shl_reg_imm8(Rcx, 1)), [0x48, 0xc1, 0xe1, 0x01]);
    }

    #[test]
    fn setcc() {
        assert_eq!(emit(|b| b.setcc_imm8(Condition::Equal, PartialRegister::Al)), [0x0f, 0x94, 0xc0]);
        assert_eq!(emit(|b| b.setcc_imm8(Condition::Less, PartialRegister::Al)), [0x0f, 0x9c, 0xc0]);
        assert_eq!(emit(|b| b.setcc_imm8(Condition::Less, PartialRegister::Bh)), [0x0f, 0x9c, 0xc7]);
    }

    #[test]
    fn store_to_stack_uses_sib() {
        assert_eq!(emit(|b| b.store_reg_indirect(Indirect::new(Rsp, -8), Rax)), [0x48, 0x89, 0x44, 0x24, 0xf8]);
        assert_eq!(emit(|b| b.store_reg_indirect(Indirect::new(Rsp, -16), Rcx)), [0x48, 0x89, 0x4c, 0x24, 0xf0]);
    }

    #[test]
    fn store_through_other_bases() {
        assert_eq!(emit(|b| b.store_reg_indirect(Indirect::new(Rsi, 0), Rax)), [0x48, 0x89, 0x46, 0x00]);
        assert_eq!(emit(|b| b.store_reg_indirect(Indirect::new(Rsi, 8), Rax)), [0x48, 0x89, 0x46, 0x08]);
        assert_eq!(emit(|b| b.store_reg_indirect(Indirect::new(Rbp, -8), Rdx)), [0x48, 0x89, 0x55, 0xf8]);
    }

    #[test]
    fn loads_and_memory_alu() {
        assert_eq!(emit(|b| b.load_reg_indirect(Rax, Indirect::new(Rsp, 33))), [0x48, 0x8b, 0x44, 0x24, 0x21]);
        assert_eq!(emit(|b| b.load_reg_indirect(Rax, Indirect::new(Rax, -1))), [0x48, 0x8b, 0x40, 0xff]);
        assert_eq!(emit(|b| b.load_reg_indirect(Rax, Indirect::new(Rax, 7))), [0x48, 0x8b, 0x40, 0x07]);
        assert_eq!(emit(|b| b.add_reg_indirect(Rax, Indirect::new(Rsp, -8))), [0x48, 0x03, 0x44, 0x24, 0xf8]);
        assert_eq!(emit(|b| b.sub_reg_indirect(Rax, Indirect::new(Rsp, -8))), [0x48, 0x2b, 0x44, 0x24, 0xf8]);
        assert_eq!(emit(|b| b.cmp_reg_indirect(Rax, Indirect::new(Rsp, -8))), [0x48, 0x3b, 0x44, 0x24, 0xf8]);
        assert_eq!(emit(|b| b.imul_indirect(Indirect::new(Rsp, -8))), [0x48, 0xf7, 0x6c, 0x24, 0xf8]);
    }

    #[test]
    fn wide_displacement() {
        let bytes = emit(|b| b.load_reg_indirect(Rax, Indirect::new(Rsp, -1024)));
        assert_eq!(bytes, [0x48, 0x8b, 0x84, 0x24, 0x00, 0xfc, 0xff, 0xff]);
        let instruction = decode_one(&bytes);
        assert_eq!(instruction.mnemonic(), Mnemonic::Mov);
        assert_eq!(instruction.memory_base(), iced_x86::Register::RSP);
        assert_eq!(instruction.memory_displacement64(), (-1024i64) as u64);
    }

    #[test]
    fn mov_reg_reg() {
        assert_eq!(emit(|b| b.mov_reg_reg(Rax, Rsi)), [0x48, 0x89, 0xf0]);
        assert_eq!(emit(|b| b.mov_reg_reg(Rsi, Rdi)), [0x48, 0x89, 0xfe]);
    }

    #[test]
    fn jumps_return_displacement_offset() {
        let mut buf = CodeBuffer::with_capacity(1);
        buf.write_u8(0x90);
        let jump = buf.jcc(Condition::Equal);
        assert_eq!(jump.pos(), 3);
        let end = buf.jmp();
        assert_eq!(end.pos(), 8);
        assert_eq!(buf.bytes(), [0x90, 0x0f, 0x84, 0xef, 0xbe, 0xad, 0xde, 0xe9, 0xef, 0xbe, 0xad, 0xde]);
        buf.backpatch(jump);
        buf.backpatch(end);
        assert_eq!(buf.bytes(), [0x90, 0x0f, 0x84, 0x05, 0x00, 0x00, 0x00, 0xe9, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn call_is_relative_to_next_instruction() {
        let mut buf = CodeBuffer::with_capacity(1);
        buf.write_bytes(&[0x90; 8]);
        buf.call(0);
        assert_eq!(&buf.bytes()[8..], [0xe8, 0xf3, 0xff, 0xff, 0xff]);
        buf.call(buf.len() + 5);
        assert_eq!(&buf.bytes()[13..], [0xe8, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn rsp_adjust() {
        assert!(emit(|b| b.rsp_adjust(0)).is_empty());
        assert_eq!(emit(|b| b.rsp_adjust(-8)), [0x48, 0x81, 0xec, 0x08, 0x00, 0x00, 0x00]);
        assert_eq!(emit(|b| b.rsp_adjust(8)), [0x48, 0x81, 0xc4, 0x08, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn decoder_agrees_with_encodings() {
        let instruction = decode_one(&emit(|b| b.imul_indirect(Indirect::new(Rsp, -16))));
        assert_eq!(instruction.mnemonic(), Mnemonic::Imul);
        assert_eq!(instruction.op0_kind(), OpKind::Memory);
        assert_eq!(instruction.memory_base(), iced_x86::Register::RSP);
        assert_eq!(instruction.memory_displacement64(), (-16i64) as u64);

        let instruction = decode_one(&emit(|b| b.cmp_reg_imm32(Rbx, 0x2f)));
        assert_eq!(instruction.mnemonic(), Mnemonic::Cmp);
        assert_eq!(instruction.op0_register(), iced_x86::Register::RBX);

        let instruction = decode_one(&emit(|b| b.setcc_imm8(Condition::Less, PartialRegister::Al)));
        assert_eq!(instruction.mnemonic(), Mnemonic::Setl);
        assert_eq!(instruction.op0_register(), iced_x86::Register::AL);

        let instruction = decode_one(&emit(|b| b.store_reg_indirect(Indirect::new(Rsi, 8), Rax)));
        assert_eq!(instruction.mnemonic(), Mnemonic::Mov);
        assert_eq!(instruction.memory_base(), iced_x86::Register::RSI);
        assert_eq!(instruction.op1_register(), iced_x86::Register::RAX);
    }

    #[test]
    fn memory_operands_match_iced_assembler() -> Result<(), iced_x86::IcedError> {
        use iced_x86::code_asm::{qword_ptr, rax, rdi, rsi, rsp, CodeAssembler};
        let mut asm = CodeAssembler::new(64)?;
        asm.mov(rsi, rdi)?;
        asm.mov(qword_ptr(rsp - 8), rax)?;
        asm.mov(rax, qword_ptr(rsp - 1024))?;
        asm.add(rax, qword_ptr(rsp - 16))?;
        asm.sub(rax, qword_ptr(rsp - 16))?;
        asm.cmp(rax, qword_ptr(rsp - 24))?;
        asm.imul(qword_ptr(rsp - 8))?;
        asm.mov(qword_ptr(rsi + 8), rax)?;
        asm.mov(rax, qword_ptr(rax - 1))?;
        asm.ret()?;
        let expected = asm.assemble(0)?;

        let actual = emit(|b| {
            b.mov_reg_reg(Rsi, Rdi);
            b.store_reg_indirect(Indirect::new(Rsp, -8), Rax);
            b.load_reg_indirect(Rax, Indirect::new(Rsp, -1024));
            b.add_reg_indirect(Rax, Indirect::new(Rsp, -16));
            b.sub_reg_indirect(Rax, Indirect::new(Rsp, -16));
            b.cmp_reg_indirect(Rax, Indirect::new(Rsp, -24));
            b.imul_indirect(Indirect::new(Rsp, -8));
            b.store_reg_indirect(Indirect::new(Rsi, 8), Rax);
            b.load_reg_indirect(Rax, Indirect::new(Rax, -1));
            b.ret();
        });
        assert_eq!(actual, expected);
        Ok(())
    }
}
