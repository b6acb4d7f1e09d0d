//! Disassembly Engine - RV32IM instruction formatter
//!
//! Turns raw 32-bit instruction words into assembly text. The debugger only
//! ever feeds it whole words read from the target, together with the address
//! the word was read from so PC-relative targets can be resolved.

/// Instruction decoder used by the assembly views.
pub trait Decoder {
    /// Formats `word`, located at `pc`, as assembly text.
    fn decode(&self, word: u32, pc: u32) -> String;
}

const REGISTERS: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Decoder for the RV32I base set plus the M extension, ABI register names.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rv32Decoder;

impl Rv32Decoder {
    pub fn new() -> Self {
        Self
    }
}

/// Bit fields of a 32-bit instruction word
struct Fields(u32);

impl Fields {
    fn opcode(&self) -> u32 {
        self.0 & 0x7f
    }
    fn rd(&self) -> &'static str {
        REGISTERS[((self.0 >> 7) & 0x1f) as usize]
    }
    fn rs1(&self) -> &'static str {
        REGISTERS[((self.0 >> 15) & 0x1f) as usize]
    }
    fn rs2(&self) -> &'static str {
        REGISTERS[((self.0 >> 20) & 0x1f) as usize]
    }
    fn rd_index(&self) -> u32 {
        (self.0 >> 7) & 0x1f
    }
    fn rs1_index(&self) -> u32 {
        (self.0 >> 15) & 0x1f
    }
    fn shamt(&self) -> u32 {
        (self.0 >> 20) & 0x1f
    }
    fn funct3(&self) -> u32 {
        (self.0 >> 12) & 0x7
    }
    fn funct7(&self) -> u32 {
        self.0 >> 25
    }
    fn imm_i(&self) -> i32 {
        (self.0 as i32) >> 20
    }
    fn imm_s(&self) -> i32 {
        ((self.0 as i32) >> 25) << 5 | ((self.0 >> 7) & 0x1f) as i32
    }
    fn imm_b(&self) -> i32 {
        let w = self.0;
        let raw = ((w >> 31) & 1) << 12
            | ((w >> 7) & 1) << 11
            | ((w >> 25) & 0x3f) << 5
            | ((w >> 8) & 0xf) << 1;
        ((raw << 19) as i32) >> 19
    }
    fn imm_u(&self) -> u32 {
        self.0 >> 12
    }
    fn imm_j(&self) -> i32 {
        let w = self.0;
        let raw = ((w >> 31) & 1) << 20
            | ((w >> 12) & 0xff) << 12
            | ((w >> 20) & 1) << 11
            | ((w >> 21) & 0x3ff) << 1;
        ((raw << 11) as i32) >> 11
    }
}

fn target(pc: u32, offset: i32) -> u32 {
    pc.wrapping_add(offset as u32)
}

impl Decoder for Rv32Decoder {
    fn decode(&self, word: u32, pc: u32) -> String {
        let f = Fields(word);

        let text = match f.opcode() {
            0x37 => Some(format!("lui {},{:#x}", f.rd(), f.imm_u())),
            0x17 => Some(format!("auipc {},{:#x}", f.rd(), f.imm_u())),
            0x6f => {
                let dest = target(pc, f.imm_j());
                Some(match f.rd_index() {
                    0 => format!("j {:#x}", dest),
                    _ => format!("jal {},{:#x}", f.rd(), dest),
                })
            }
            0x67 if f.funct3() == 0 => Some(
                if f.rd_index() == 0 && f.rs1_index() == 1 && f.imm_i() == 0 {
                    "ret".to_string()
                } else {
                    format!("jalr {},{}({})", f.rd(), f.imm_i(), f.rs1())
                },
            ),
            0x63 => decode_branch(&f, pc),
            0x03 => decode_load(&f),
            0x23 => decode_store(&f),
            0x13 => decode_op_imm(&f),
            0x33 => decode_op(&f),
            0x0f => Some("fence".to_string()),
            0x73 => decode_system(&f),
            _ => None,
        };

        text.unwrap_or_else(|| format!(".word {:#010x}", word))
    }
}

fn decode_branch(f: &Fields, pc: u32) -> Option<String> {
    let mnemonic = match f.funct3() {
        0 => "beq",
        1 => "bne",
        4 => "blt",
        5 => "bge",
        6 => "bltu",
        7 => "bgeu",
        _ => return None,
    };
    Some(format!(
        "{} {},{},{:#x}",
        mnemonic,
        f.rs1(),
        f.rs2(),
        target(pc, f.imm_b())
    ))
}

fn decode_load(f: &Fields) -> Option<String> {
    let mnemonic = match f.funct3() {
        0 => "lb",
        1 => "lh",
        2 => "lw",
        4 => "lbu",
        5 => "lhu",
        _ => return None,
    };
    Some(format!("{} {},{}({})", mnemonic, f.rd(), f.imm_i(), f.rs1()))
}

fn decode_store(f: &Fields) -> Option<String> {
    let mnemonic = match f.funct3() {
        0 => "sb",
        1 => "sh",
        2 => "sw",
        _ => return None,
    };
    Some(format!("{} {},{}({})", mnemonic, f.rs2(), f.imm_s(), f.rs1()))
}

fn decode_op_imm(f: &Fields) -> Option<String> {
    let imm = f.imm_i();
    let text = match (f.funct3(), f.funct7()) {
        (0, _) if f.0 == 0x0000_0013 => "nop".to_string(),
        (0, _) if f.rs1_index() == 0 => format!("li {},{}", f.rd(), imm),
        (0, _) if imm == 0 => format!("mv {},{}", f.rd(), f.rs1()),
        (0, _) => format!("addi {},{},{}", f.rd(), f.rs1(), imm),
        (2, _) => format!("slti {},{},{}", f.rd(), f.rs1(), imm),
        (3, _) => format!("sltiu {},{},{}", f.rd(), f.rs1(), imm),
        (4, _) => format!("xori {},{},{}", f.rd(), f.rs1(), imm),
        (6, _) => format!("ori {},{},{}", f.rd(), f.rs1(), imm),
        (7, _) => format!("andi {},{},{}", f.rd(), f.rs1(), imm),
        (1, 0x00) => format!("slli {},{},{}", f.rd(), f.rs1(), f.shamt()),
        (5, 0x00) => format!("srli {},{},{}", f.rd(), f.rs1(), f.shamt()),
        (5, 0x20) => format!("srai {},{},{}", f.rd(), f.rs1(), f.shamt()),
        _ => return None,
    };
    Some(text)
}

fn decode_op(f: &Fields) -> Option<String> {
    let mnemonic = match (f.funct7(), f.funct3()) {
        (0x00, 0) => "add",
        (0x20, 0) => "sub",
        (0x00, 1) => "sll",
        (0x00, 2) => "slt",
        (0x00, 3) => "sltu",
        (0x00, 4) => "xor",
        (0x00, 5) => "srl",
        (0x20, 5) => "sra",
        (0x00, 6) => "or",
        (0x00, 7) => "and",
        (0x01, 0) => "mul",
        (0x01, 1) => "mulh",
        (0x01, 2) => "mulhsu",
        (0x01, 3) => "mulhu",
        (0x01, 4) => "div",
        (0x01, 5) => "divu",
        (0x01, 6) => "rem",
        (0x01, 7) => "remu",
        _ => return None,
    };
    Some(format!("{} {},{},{}", mnemonic, f.rd(), f.rs1(), f.rs2()))
}

fn decode_system(f: &Fields) -> Option<String> {
    match f.0 {
        0x0000_0073 => return Some("ecall".to_string()),
        0x0010_0073 => return Some("ebreak".to_string()),
        0x3020_0073 => return Some("mret".to_string()),
        0x1050_0073 => return Some("wfi".to_string()),
        _ => {}
    }

    let csr = f.0 >> 20;
    let uimm = f.rs1_index();
    let text = match f.funct3() {
        1 => format!("csrrw {},{:#x},{}", f.rd(), csr, f.rs1()),
        2 => format!("csrrs {},{:#x},{}", f.rd(), csr, f.rs1()),
        3 => format!("csrrc {},{:#x},{}", f.rd(), csr, f.rs1()),
        5 => format!("csrrwi {},{:#x},{}", f.rd(), csr, uimm),
        6 => format!("csrrsi {},{:#x},{}", f.rd(), csr, uimm),
        7 => format!("csrrci {},{:#x},{}", f.rd(), csr, uimm),
        _ => return None,
    };
    Some(text)
}
