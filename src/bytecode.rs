//! JVM opcode table and a small disassembler used by diagnostics.
use std::fmt;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

/// Number of operand bytes following an opcode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operands {
    Fixed(usize),
    // tableswitch, lookupswitch and wide.
    Variable,
}

macro_rules! opcodes {
    ($($name:ident = $byte:literal, $mnemonic:literal, $operands:expr;)*) => {
        /// Every opcode defined by the JVM instruction set.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum OPCode {
            $($name,)*
        }

        impl OPCode {
            /// Decodes an opcode byte, `None` for bytes the instruction set
            /// leaves unassigned.
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Self::$name),)*
                    _ => None,
                }
            }

            pub const fn byte(self) -> u8 {
                match self {
                    $(Self::$name => $byte,)*
                }
            }

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic,)*
                }
            }

            pub const fn operands(self) -> Operands {
                match self {
                    $(Self::$name => $operands,)*
                }
            }
        }
    };
}

use Operands::{Fixed, Variable};

opcodes! {
    Nop = 0x00, "nop", Fixed(0);
    AconstNull = 0x01, "aconst_null", Fixed(0);
    IconstM1 = 0x02, "iconst_m1", Fixed(0);
    Iconst0 = 0x03, "iconst_0", Fixed(0);
    Iconst1 = 0x04, "iconst_1", Fixed(0);
    Iconst2 = 0x05, "iconst_2", Fixed(0);
    Iconst3 = 0x06, "iconst_3", Fixed(0);
    Iconst4 = 0x07, "iconst_4", Fixed(0);
    Iconst5 = 0x08, "iconst_5", Fixed(0);
    Lconst0 = 0x09, "lconst_0", Fixed(0);
    Lconst1 = 0x0a, "lconst_1", Fixed(0);
    Fconst0 = 0x0b, "fconst_0", Fixed(0);
    Fconst1 = 0x0c, "fconst_1", Fixed(0);
    Fconst2 = 0x0d, "fconst_2", Fixed(0);
    Dconst0 = 0x0e, "dconst_0", Fixed(0);
    Dconst1 = 0x0f, "dconst_1", Fixed(0);
    Bipush = 0x10, "bipush", Fixed(1);
    Sipush = 0x11, "sipush", Fixed(2);
    Ldc = 0x12, "ldc", Fixed(1);
    LdcW = 0x13, "ldc_w", Fixed(2);
    Ldc2W = 0x14, "ldc2_w", Fixed(2);
    Iload = 0x15, "iload", Fixed(1);
    Lload = 0x16, "lload", Fixed(1);
    Fload = 0x17, "fload", Fixed(1);
    Dload = 0x18, "dload", Fixed(1);
    Aload = 0x19, "aload", Fixed(1);
    Iload0 = 0x1a, "iload_0", Fixed(0);
    Iload1 = 0x1b, "iload_1", Fixed(0);
    Iload2 = 0x1c, "iload_2", Fixed(0);
    Iload3 = 0x1d, "iload_3", Fixed(0);
    Lload0 = 0x1e, "lload_0", Fixed(0);
    Lload1 = 0x1f, "lload_1", Fixed(0);
    Lload2 = 0x20, "lload_2", Fixed(0);
    Lload3 = 0x21, "lload_3", Fixed(0);
    Fload0 = 0x22, "fload_0", Fixed(0);
    Fload1 = 0x23, "fload_1", Fixed(0);
    Fload2 = 0x24, "fload_2", Fixed(0);
    Fload3 = 0x25, "fload_3", Fixed(0);
    Dload0 = 0x26, "dload_0", Fixed(0);
    Dload1 = 0x27, "dload_1", Fixed(0);
    Dload2 = 0x28, "dload_2", Fixed(0);
    Dload3 = 0x29, "dload_3", Fixed(0);
    Aload0 = 0x2a, "aload_0", Fixed(0);
    Aload1 = 0x2b, "aload_1", Fixed(0);
    Aload2 = 0x2c, "aload_2", Fixed(0);
    Aload3 = 0x2d, "aload_3", Fixed(0);
    Iaload = 0x2e, "iaload", Fixed(0);
    Laload = 0x2f, "laload", Fixed(0);
    Faload = 0x30, "faload", Fixed(0);
    Daload = 0x31, "daload", Fixed(0);
    Aaload = 0x32, "aaload", Fixed(0);
    Baload = 0x33, "baload", Fixed(0);
    Caload = 0x34, "caload", Fixed(0);
    Saload = 0x35, "saload", Fixed(0);
    Istore = 0x36, "istore", Fixed(1);
    Lstore = 0x37, "lstore", Fixed(1);
    Fstore = 0x38, "fstore", Fixed(1);
    Dstore = 0x39, "dstore", Fixed(1);
    Astore = 0x3a, "astore", Fixed(1);
    Istore0 = 0x3b, "istore_0", Fixed(0);
    Istore1 = 0x3c, "istore_1", Fixed(0);
    Istore2 = 0x3d, "istore_2", Fixed(0);
    Istore3 = 0x3e, "istore_3", Fixed(0);
    Lstore0 = 0x3f, "lstore_0", Fixed(0);
    Lstore1 = 0x40, "lstore_1", Fixed(0);
    Lstore2 = 0x41, "lstore_2", Fixed(0);
    Lstore3 = 0x42, "lstore_3", Fixed(0);
    Fstore0 = 0x43, "fstore_0", Fixed(0);
    Fstore1 = 0x44, "fstore_1", Fixed(0);
    Fstore2 = 0x45, "fstore_2", Fixed(0);
    Fstore3 = 0x46, "fstore_3", Fixed(0);
    Dstore0 = 0x47, "dstore_0", Fixed(0);
    Dstore1 = 0x48, "dstore_1", Fixed(0);
    Dstore2 = 0x49, "dstore_2", Fixed(0);
    Dstore3 = 0x4a, "dstore_3", Fixed(0);
    Astore0 = 0x4b, "astore_0", Fixed(0);
    Astore1 = 0x4c, "astore_1", Fixed(0);
    Astore2 = 0x4d, "astore_2", Fixed(0);
    Astore3 = 0x4e, "astore_3", Fixed(0);
    Iastore = 0x4f, "iastore", Fixed(0);
    Lastore = 0x50, "lastore", Fixed(0);
    Fastore = 0x51, "fastore", Fixed(0);
    Dastore = 0x52, "dastore", Fixed(0);
    Aastore = 0x53, "aastore", Fixed(0);
    Bastore = 0x54, "bastore", Fixed(0);
    Castore = 0x55, "castore", Fixed(0);
    Sastore = 0x56, "sastore", Fixed(0);
    Pop = 0x57, "pop", Fixed(0);
    Pop2 = 0x58, "pop2", Fixed(0);
    Dup = 0x59, "dup", Fixed(0);
    DupX1 = 0x5a, "dup_x1", Fixed(0);
    DupX2 = 0x5b, "dup_x2", Fixed(0);
    Dup2 = 0x5c, "dup2", Fixed(0);
    Dup2X1 = 0x5d, "dup2_x1", Fixed(0);
    Dup2X2 = 0x5e, "dup2_x2", Fixed(0);
    Swap = 0x5f, "swap", Fixed(0);
    Iadd = 0x60, "iadd", Fixed(0);
    Ladd = 0x61, "ladd", Fixed(0);
    Fadd = 0x62, "fadd", Fixed(0);
    Dadd = 0x63, "dadd", Fixed(0);
    Isub = 0x64, "isub", Fixed(0);
    Lsub = 0x65, "lsub", Fixed(0);
    Fsub = 0x66, "fsub", Fixed(0);
    Dsub = 0x67, "dsub", Fixed(0);
    Imul = 0x68, "imul", Fixed(0);
    Lmul = 0x69, "lmul", Fixed(0);
    Fmul = 0x6a, "fmul", Fixed(0);
    Dmul = 0x6b, "dmul", Fixed(0);
    Idiv = 0x6c, "idiv", Fixed(0);
    Ldiv = 0x6d, "ldiv", Fixed(0);
    Fdiv = 0x6e, "fdiv", Fixed(0);
    Ddiv = 0x6f, "ddiv", Fixed(0);
    Irem = 0x70, "irem", Fixed(0);
    Lrem = 0x71, "lrem", Fixed(0);
    Frem = 0x72, "frem", Fixed(0);
    Drem = 0x73, "drem", Fixed(0);
    Ineg = 0x74, "ineg", Fixed(0);
    Lneg = 0x75, "lneg", Fixed(0);
    Fneg = 0x76, "fneg", Fixed(0);
    Dneg = 0x77, "dneg", Fixed(0);
    Ishl = 0x78, "ishl", Fixed(0);
    Lshl = 0x79, "lshl", Fixed(0);
    Ishr = 0x7a, "ishr", Fixed(0);
    Lshr = 0x7b, "lshr", Fixed(0);
    Iushr = 0x7c, "iushr", Fixed(0);
    Lushr = 0x7d, "lushr", Fixed(0);
    Iand = 0x7e, "iand", Fixed(0);
    Land = 0x7f, "land", Fixed(0);
    Ior = 0x80, "ior", Fixed(0);
    Lor = 0x81, "lor", Fixed(0);
    Ixor = 0x82, "ixor", Fixed(0);
    Lxor = 0x83, "lxor", Fixed(0);
    Iinc = 0x84, "iinc", Fixed(2);
    I2l = 0x85, "i2l", Fixed(0);
    I2f = 0x86, "i2f", Fixed(0);
    I2d = 0x87, "i2d", Fixed(0);
    L2i = 0x88, "l2i", Fixed(0);
    L2f = 0x89, "l2f", Fixed(0);
    L2d = 0x8a, "l2d", Fixed(0);
    F2i = 0x8b, "f2i", Fixed(0);
    F2l = 0x8c, "f2l", Fixed(0);
    F2d = 0x8d, "f2d", Fixed(0);
    D2i = 0x8e, "d2i", Fixed(0);
    D2l = 0x8f, "d2l", Fixed(0);
    D2f = 0x90, "d2f", Fixed(0);
    I2b = 0x91, "i2b", Fixed(0);
    I2c = 0x92, "i2c", Fixed(0);
    I2s = 0x93, "i2s", Fixed(0);
    Lcmp = 0x94, "lcmp", Fixed(0);
    Fcmpl = 0x95, "fcmpl", Fixed(0);
    Fcmpg = 0x96, "fcmpg", Fixed(0);
    Dcmpl = 0x97, "dcmpl", Fixed(0);
    Dcmpg = 0x98, "dcmpg", Fixed(0);
    Ifeq = 0x99, "ifeq", Fixed(2);
    Ifne = 0x9a, "ifne", Fixed(2);
    Iflt = 0x9b, "iflt", Fixed(2);
    Ifge = 0x9c, "ifge", Fixed(2);
    Ifgt = 0x9d, "ifgt", Fixed(2);
    Ifle = 0x9e, "ifle", Fixed(2);
    IfIcmpeq = 0x9f, "if_icmpeq", Fixed(2);
    IfIcmpne = 0xa0, "if_icmpne", Fixed(2);
    IfIcmplt = 0xa1, "if_icmplt", Fixed(2);
    IfIcmpge = 0xa2, "if_icmpge", Fixed(2);
    IfIcmpgt = 0xa3, "if_icmpgt", Fixed(2);
    IfIcmple = 0xa4, "if_icmple", Fixed(2);
    IfAcmpeq = 0xa5, "if_acmpeq", Fixed(2);
    IfAcmpne = 0xa6, "if_acmpne", Fixed(2);
    Goto = 0xa7, "goto", Fixed(2);
    Jsr = 0xa8, "jsr", Fixed(2);
    Ret = 0xa9, "ret", Fixed(1);
    Tableswitch = 0xaa, "tableswitch", Variable;
    Lookupswitch = 0xab, "lookupswitch", Variable;
    Ireturn = 0xac, "ireturn", Fixed(0);
    Lreturn = 0xad, "lreturn", Fixed(0);
    Freturn = 0xae, "freturn", Fixed(0);
    Dreturn = 0xaf, "dreturn", Fixed(0);
    Areturn = 0xb0, "areturn", Fixed(0);
    Return = 0xb1, "return", Fixed(0);
    Getstatic = 0xb2, "getstatic", Fixed(2);
    Putstatic = 0xb3, "putstatic", Fixed(2);
    Getfield = 0xb4, "getfield", Fixed(2);
    Putfield = 0xb5, "putfield", Fixed(2);
    Invokevirtual = 0xb6, "invokevirtual", Fixed(2);
    Invokespecial = 0xb7, "invokespecial", Fixed(2);
    Invokestatic = 0xb8, "invokestatic", Fixed(2);
    Invokeinterface = 0xb9, "invokeinterface", Fixed(4);
    Invokedynamic = 0xba, "invokedynamic", Fixed(4);
    New = 0xbb, "new", Fixed(2);
    Newarray = 0xbc, "newarray", Fixed(1);
    Anewarray = 0xbd, "anewarray", Fixed(2);
    Arraylength = 0xbe, "arraylength", Fixed(0);
    Athrow = 0xbf, "athrow", Fixed(0);
    Checkcast = 0xc0, "checkcast", Fixed(2);
    Instanceof = 0xc1, "instanceof", Fixed(2);
    Monitorenter = 0xc2, "monitorenter", Fixed(0);
    Monitorexit = 0xc3, "monitorexit", Fixed(0);
    Wide = 0xc4, "wide", Variable;
    Multianewarray = 0xc5, "multianewarray", Fixed(3);
    Ifnull = 0xc6, "ifnull", Fixed(2);
    Ifnonnull = 0xc7, "ifnonnull", Fixed(2);
    GotoW = 0xc8, "goto_w", Fixed(4);
    JsrW = 0xc9, "jsr_w", Fixed(4);
    Breakpoint = 0xca, "breakpoint", Fixed(0);
    Impdep1 = 0xfe, "impdep1", Fixed(0);
    Impdep2 = 0xff, "impdep2", Fixed(0);
}

impl fmt::Display for OPCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction: its offset in the code array, opcode and raw
/// operand bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub pc: usize,
    pub opcode: OPCode,
    pub operands: Vec<u8>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:>4}: {}", self.pc, self.opcode)?;
        match (self.opcode, self.operands.as_slice()) {
            // Constant pool operands print javap style.
            (OPCode::Ldc, [index]) => write!(f, " #{index}"),
            (
                OPCode::LdcW
                | OPCode::Ldc2W
                | OPCode::Getstatic
                | OPCode::Putstatic
                | OPCode::Getfield
                | OPCode::Putfield
                | OPCode::Invokevirtual
                | OPCode::Invokespecial
                | OPCode::Invokestatic
                | OPCode::New
                | OPCode::Anewarray
                | OPCode::Checkcast
                | OPCode::Instanceof,
                [hi, lo],
            ) => write!(f, " #{}", u16::from_be_bytes([*hi, *lo])),
            (_, operands) => {
                for operand in operands {
                    write!(f, " {operand}")?;
                }
                Ok(())
            }
        }
    }
}

/// Decodes a code array into instructions. Unassigned opcodes and the
/// variable-length instructions are reported as unsupported.
pub fn disassemble(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut cursor = ByteCursor::new(code);
    let mut instructions = Vec::new();
    while !cursor.is_at_end() {
        let pc = cursor.position();
        let byte = cursor.read_u1()?;
        let opcode = OPCode::from_byte(byte);
        let width = match opcode.map(OPCode::operands) {
            Some(Fixed(width)) => width,
            _ => {
                return Err(Error::UnsupportedInstruction {
                    opcode: byte,
                    mnemonic: opcode.map(OPCode::mnemonic),
                    pc,
                })
            }
        };
        let operands = cursor.read_bytes(width)?.to_vec();
        if let Some(opcode) = opcode {
            instructions.push(Instruction {
                pc,
                opcode,
                operands,
            });
        }
    }
    Ok(instructions)
}
