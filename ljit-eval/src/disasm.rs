use std::fmt::Write;
use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, NasmFormatter};
use crate::buffer::Hex;

/// One line per instruction: offset, raw bytes and NASM syntax.
pub fn disassemble(code: &[u8]) -> String {
    let mut decoder = Decoder::with_ip(64, code, 0, DecoderOptions::NONE);
    let mut formatter = NasmFormatter::new();
    formatter.options_mut().set_hex_prefix("0x");
    formatter.options_mut().set_hex_suffix("");
    formatter.options_mut().set_space_after_operand_separator(true);

    let mut out = String::new();
    let mut text = String::new();
    let mut hex = String::new();
    let mut instruction = Instruction::default();
    while decoder.can_decode() {
        decoder.decode_out(&mut instruction);
        text.clear();
        formatter.format(&instruction, &mut text);
        let start = instruction.ip() as usize;
        let bytes = &code[start..start + instruction.len()];
        hex.clear();
        let _ = write!(hex, "{}", Hex(bytes));
        let _ = writeln!(out, "{:4x}:  {:<30}{}", start, hex, text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_instruction() {
        let code = [0x48, 0xc7, 0xc0, 0x04, 0x00, 0x00, 0x00, 0xc3];
        let text = disassemble(&code);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("   0:  48 c7 c0 04 00 00 00"), "{}", lines[0]);
        assert!(lines[0].ends_with("mov rax, 4"), "{}", lines[0]);
        assert!(lines[1].starts_with("   7:  c3"), "{}", lines[1]);
        assert!(lines[1].ends_with("ret"), "{}", lines[1]);
    }

    #[test]
    fn instruction_text_starts_in_one_column() {
        let code = [
            0x48, 0x89, 0xfe,
            0x48, 0x81, 0xc6, 0x10, 0x00, 0x00, 0x00,
            0xc3,
        ];
        let text = disassemble(&code);
        let columns = text.lines().map(|line| &line[37..]).collect::<Vec<_>>();
        assert_eq!(columns, ["mov rsi, rdi", "add rsi, 0x10", "ret"]);
    }

    #[test]
    fn empty_code() {
        assert_eq!(disassemble(&[]), "");
    }
}
