//! The CIL opcode tables.
//!
//! Opcodes occupy two encoding spaces: one-byte opcodes addressed directly, and
//! two-byte opcodes behind the `0xFE` escape. Both spaces are materialized as static
//! lookup tables ([`OPCODES`], [`OPCODES_FE`]) indexed by the encoded byte; reserved
//! slots carry an empty mnemonic and must be rejected by decoders.
//!
//! True prefixes (`tail.`, `volatile.`, `readonly.`, `unaligned.`, `constrained.`)
//! live in the two-byte space and are accumulated into [`PrefixFlags`] by the
//! instruction reader rather than surfacing as instructions. The reserved two-byte
//! slot [`SEQUENCE_POINT_CODE`] is used inside in-memory modified sequences as a
//! sequence-point pseudo-instruction carrying an `i16` ordinal.

use bitflags::bitflags;

use crate::metadata::token::Token;

/// Second byte of the two-byte escape introducing the sequence-point
/// pseudo-instruction in modified sequences.
pub const SEQUENCE_POINT_CODE: u8 = 0x20;

/// First byte of every two-byte opcode.
pub const TWO_BYTE_ESCAPE: u8 = 0xFE;

/// The operand shape following an opcode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandKind {
    /// No operand bytes
    None,
    /// 1-byte signed immediate
    Int8,
    /// 1-byte unsigned immediate
    UInt8,
    /// 2-byte unsigned immediate
    UInt16,
    /// 4-byte signed immediate
    Int32,
    /// 8-byte signed immediate
    Int64,
    /// 4-byte float
    Float32,
    /// 8-byte double
    Float64,
    /// 4-byte metadata token
    Token,
    /// 1-byte signed branch displacement
    BranchTarget8,
    /// 4-byte signed branch displacement
    BranchTarget32,
    /// 4-byte count followed by that many 4-byte relative targets
    Switch,
}

bitflags! {
    /// Prefixes accumulated ahead of one logical instruction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PrefixFlags: u8 {
        /// `tail.` - tail call follows
        const TAIL = 0x01;
        /// `volatile.` - volatile memory access follows
        const VOLATILE = 0x02;
        /// `readonly.` - readonly address follows
        const READONLY = 0x04;
        /// `unaligned.` - unaligned access follows (alignment in side data)
        const UNALIGNED = 0x08;
        /// `constrained.` - constrained virtual call follows (type in side data)
        const CONSTRAINED = 0x10;
    }
}

/// One slot of an opcode lookup table.
#[derive(Clone, Copy, Debug)]
pub struct OpCodeEntry {
    /// The decoded opcode.
    pub code: OpCode,
    /// The IL mnemonic; empty for reserved slots.
    pub mnemonic: &'static str,
    /// The operand shape that follows.
    pub operand: OperandKind,
}

const RESERVED: OpCodeEntry = OpCodeEntry {
    code: OpCode::Invalid,
    mnemonic: "",
    operand: OperandKind::None,
};

macro_rules! opcodes {
    (
        one_byte { $($b:literal => $v:ident, $mn:literal, $op:ident;)* }
        two_byte { $($b2:literal => $v2:ident, $mn2:literal, $op2:ident;)* }
    ) => {
        /// The decoded CIL opcodes, named after their IL mnemonics.
        #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
        #[allow(non_camel_case_types, missing_docs)]
        pub enum OpCode {
            $($v,)*
            $($v2,)*
            /// Sentinel for reserved encodings; never produced by a successful decode.
            Invalid,
        }

        impl OpCode {
            /// The IL mnemonic of this opcode.
            #[must_use]
            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $(OpCode::$v => $mn,)*
                    $(OpCode::$v2 => $mn2,)*
                    OpCode::Invalid => "",
                }
            }
        }

        /// One-byte opcode table, indexed by the encoded byte.
        pub static OPCODES: [OpCodeEntry; 256] = {
            let mut table = [RESERVED; 256];
            $(table[$b] = OpCodeEntry {
                code: OpCode::$v,
                mnemonic: $mn,
                operand: OperandKind::$op,
            };)*
            table
        };

        /// Two-byte opcode table, indexed by the byte after the `0xFE` escape.
        pub static OPCODES_FE: [OpCodeEntry; 0x1F] = {
            let mut table = [RESERVED; 0x1F];
            $(table[$b2] = OpCodeEntry {
                code: OpCode::$v2,
                mnemonic: $mn2,
                operand: OperandKind::$op2,
            };)*
            table
        };
    };
}

opcodes! {
    one_byte {
        0x00 => Nop, "nop", None;
        0x01 => Break, "break", None;
        0x02 => Ldarg_0, "ldarg.0", None;
        0x03 => Ldarg_1, "ldarg.1", None;
        0x04 => Ldarg_2, "ldarg.2", None;
        0x05 => Ldarg_3, "ldarg.3", None;
        0x06 => Ldloc_0, "ldloc.0", None;
        0x07 => Ldloc_1, "ldloc.1", None;
        0x08 => Ldloc_2, "ldloc.2", None;
        0x09 => Ldloc_3, "ldloc.3", None;
        0x0A => Stloc_0, "stloc.0", None;
        0x0B => Stloc_1, "stloc.1", None;
        0x0C => Stloc_2, "stloc.2", None;
        0x0D => Stloc_3, "stloc.3", None;
        0x0E => Ldarg_S, "ldarg.s", UInt8;
        0x0F => Ldarga_S, "ldarga.s", UInt8;
        0x10 => Starg_S, "starg.s", UInt8;
        0x11 => Ldloc_S, "ldloc.s", UInt8;
        0x12 => Ldloca_S, "ldloca.s", UInt8;
        0x13 => Stloc_S, "stloc.s", UInt8;
        0x14 => Ldnull, "ldnull", None;
        0x15 => Ldc_I4_M1, "ldc.i4.m1", None;
        0x16 => Ldc_I4_0, "ldc.i4.0", None;
        0x17 => Ldc_I4_1, "ldc.i4.1", None;
        0x18 => Ldc_I4_2, "ldc.i4.2", None;
        0x19 => Ldc_I4_3, "ldc.i4.3", None;
        0x1A => Ldc_I4_4, "ldc.i4.4", None;
        0x1B => Ldc_I4_5, "ldc.i4.5", None;
        0x1C => Ldc_I4_6, "ldc.i4.6", None;
        0x1D => Ldc_I4_7, "ldc.i4.7", None;
        0x1E => Ldc_I4_8, "ldc.i4.8", None;
        0x1F => Ldc_I4_S, "ldc.i4.s", Int8;
        0x20 => Ldc_I4, "ldc.i4", Int32;
        0x21 => Ldc_I8, "ldc.i8", Int64;
        0x22 => Ldc_R4, "ldc.r4", Float32;
        0x23 => Ldc_R8, "ldc.r8", Float64;
        0x25 => Dup, "dup", None;
        0x26 => Pop, "pop", None;
        0x27 => Jmp, "jmp", Token;
        0x28 => Call, "call", Token;
        0x29 => Calli, "calli", Token;
        0x2A => Ret, "ret", None;
        0x2B => Br_S, "br.s", BranchTarget8;
        0x2C => Brfalse_S, "brfalse.s", BranchTarget8;
        0x2D => Brtrue_S, "brtrue.s", BranchTarget8;
        0x2E => Beq_S, "beq.s", BranchTarget8;
        0x2F => Bge_S, "bge.s", BranchTarget8;
        0x30 => Bgt_S, "bgt.s", BranchTarget8;
        0x31 => Ble_S, "ble.s", BranchTarget8;
        0x32 => Blt_S, "blt.s", BranchTarget8;
        0x33 => Bne_Un_S, "bne.un.s", BranchTarget8;
        0x34 => Bge_Un_S, "bge.un.s", BranchTarget8;
        0x35 => Bgt_Un_S, "bgt.un.s", BranchTarget8;
        0x36 => Ble_Un_S, "ble.un.s", BranchTarget8;
        0x37 => Blt_Un_S, "blt.un.s", BranchTarget8;
        0x38 => Br, "br", BranchTarget32;
        0x39 => Brfalse, "brfalse", BranchTarget32;
        0x3A => Brtrue, "brtrue", BranchTarget32;
        0x3B => Beq, "beq", BranchTarget32;
        0x3C => Bge, "bge", BranchTarget32;
        0x3D => Bgt, "bgt", BranchTarget32;
        0x3E => Ble, "ble", BranchTarget32;
        0x3F => Blt, "blt", BranchTarget32;
        0x40 => Bne_Un, "bne.un", BranchTarget32;
        0x41 => Bge_Un, "bge.un", BranchTarget32;
        0x42 => Bgt_Un, "bgt.un", BranchTarget32;
        0x43 => Ble_Un, "ble.un", BranchTarget32;
        0x44 => Blt_Un, "blt.un", BranchTarget32;
        0x45 => Switch, "switch", Switch;
        0x46 => Ldind_I1, "ldind.i1", None;
        0x47 => Ldind_U1, "ldind.u1", None;
        0x48 => Ldind_I2, "ldind.i2", None;
        0x49 => Ldind_U2, "ldind.u2", None;
        0x4A => Ldind_I4, "ldind.i4", None;
        0x4B => Ldind_U4, "ldind.u4", None;
        0x4C => Ldind_I8, "ldind.i8", None;
        0x4D => Ldind_I, "ldind.i", None;
        0x4E => Ldind_R4, "ldind.r4", None;
        0x4F => Ldind_R8, "ldind.r8", None;
        0x50 => Ldind_Ref, "ldind.ref", None;
        0x51 => Stind_Ref, "stind.ref", None;
        0x52 => Stind_I1, "stind.i1", None;
        0x53 => Stind_I2, "stind.i2", None;
        0x54 => Stind_I4, "stind.i4", None;
        0x55 => Stind_I8, "stind.i8", None;
        0x56 => Stind_R4, "stind.r4", None;
        0x57 => Stind_R8, "stind.r8", None;
        0x58 => Add, "add", None;
        0x59 => Sub, "sub", None;
        0x5A => Mul, "mul", None;
        0x5B => Div, "div", None;
        0x5C => Div_Un, "div.un", None;
        0x5D => Rem, "rem", None;
        0x5E => Rem_Un, "rem.un", None;
        0x5F => And, "and", None;
        0x60 => Or, "or", None;
        0x61 => Xor, "xor", None;
        0x62 => Shl, "shl", None;
        0x63 => Shr, "shr", None;
        0x64 => Shr_Un, "shr.un", None;
        0x65 => Neg, "neg", None;
        0x66 => Not, "not", None;
        0x67 => Conv_I1, "conv.i1", None;
        0x68 => Conv_I2, "conv.i2", None;
        0x69 => Conv_I4, "conv.i4", None;
        0x6A => Conv_I8, "conv.i8", None;
        0x6B => Conv_R4, "conv.r4", None;
        0x6C => Conv_R8, "conv.r8", None;
        0x6D => Conv_U4, "conv.u4", None;
        0x6E => Conv_U8, "conv.u8", None;
        0x6F => Callvirt, "callvirt", Token;
        0x70 => Cpobj, "cpobj", Token;
        0x71 => Ldobj, "ldobj", Token;
        0x72 => Ldstr, "ldstr", Token;
        0x73 => Newobj, "newobj", Token;
        0x74 => Castclass, "castclass", Token;
        0x75 => Isinst, "isinst", Token;
        0x76 => Conv_R_Un, "conv.r.un", None;
        0x79 => Unbox, "unbox", Token;
        0x7A => Throw, "throw", None;
        0x7B => Ldfld, "ldfld", Token;
        0x7C => Ldflda, "ldflda", Token;
        0x7D => Stfld, "stfld", Token;
        0x7E => Ldsfld, "ldsfld", Token;
        0x7F => Ldsflda, "ldsflda", Token;
        0x80 => Stsfld, "stsfld", Token;
        0x81 => Stobj, "stobj", Token;
        0x82 => Conv_Ovf_I1_Un, "conv.ovf.i1.un", None;
        0x83 => Conv_Ovf_I2_Un, "conv.ovf.i2.un", None;
        0x84 => Conv_Ovf_I4_Un, "conv.ovf.i4.un", None;
        0x85 => Conv_Ovf_I8_Un, "conv.ovf.i8.un", None;
        0x86 => Conv_Ovf_U1_Un, "conv.ovf.u1.un", None;
        0x87 => Conv_Ovf_U2_Un, "conv.ovf.u2.un", None;
        0x88 => Conv_Ovf_U4_Un, "conv.ovf.u4.un", None;
        0x89 => Conv_Ovf_U8_Un, "conv.ovf.u8.un", None;
        0x8A => Conv_Ovf_I_Un, "conv.ovf.i.un", None;
        0x8B => Conv_Ovf_U_Un, "conv.ovf.u.un", None;
        0x8C => Box, "box", Token;
        0x8D => Newarr, "newarr", Token;
        0x8E => Ldlen, "ldlen", None;
        0x8F => Ldelema, "ldelema", Token;
        0x90 => Ldelem_I1, "ldelem.i1", None;
        0x91 => Ldelem_U1, "ldelem.u1", None;
        0x92 => Ldelem_I2, "ldelem.i2", None;
        0x93 => Ldelem_U2, "ldelem.u2", None;
        0x94 => Ldelem_I4, "ldelem.i4", None;
        0x95 => Ldelem_U4, "ldelem.u4", None;
        0x96 => Ldelem_I8, "ldelem.i8", None;
        0x97 => Ldelem_I, "ldelem.i", None;
        0x98 => Ldelem_R4, "ldelem.r4", None;
        0x99 => Ldelem_R8, "ldelem.r8", None;
        0x9A => Ldelem_Ref, "ldelem.ref", None;
        0x9B => Stelem_I, "stelem.i", None;
        0x9C => Stelem_I1, "stelem.i1", None;
        0x9D => Stelem_I2, "stelem.i2", None;
        0x9E => Stelem_I4, "stelem.i4", None;
        0x9F => Stelem_I8, "stelem.i8", None;
        0xA0 => Stelem_R4, "stelem.r4", None;
        0xA1 => Stelem_R8, "stelem.r8", None;
        0xA2 => Stelem_Ref, "stelem.ref", None;
        0xA3 => Ldelem, "ldelem", Token;
        0xA4 => Stelem, "stelem", Token;
        0xA5 => Unbox_Any, "unbox.any", Token;
        0xB3 => Conv_Ovf_I1, "conv.ovf.i1", None;
        0xB4 => Conv_Ovf_U1, "conv.ovf.u1", None;
        0xB5 => Conv_Ovf_I2, "conv.ovf.i2", None;
        0xB6 => Conv_Ovf_U2, "conv.ovf.u2", None;
        0xB7 => Conv_Ovf_I4, "conv.ovf.i4", None;
        0xB8 => Conv_Ovf_U4, "conv.ovf.u4", None;
        0xB9 => Conv_Ovf_I8, "conv.ovf.i8", None;
        0xBA => Conv_Ovf_U8, "conv.ovf.u8", None;
        0xC2 => Refanyval, "refanyval", Token;
        0xC3 => Ckfinite, "ckfinite", None;
        0xC6 => Mkrefany, "mkrefany", Token;
        0xD0 => Ldtoken, "ldtoken", Token;
        0xD1 => Conv_U2, "conv.u2", None;
        0xD2 => Conv_U1, "conv.u1", None;
        0xD3 => Conv_I, "conv.i", None;
        0xD4 => Conv_Ovf_I, "conv.ovf.i", None;
        0xD5 => Conv_Ovf_U, "conv.ovf.u", None;
        0xD6 => Add_Ovf, "add.ovf", None;
        0xD7 => Add_Ovf_Un, "add.ovf.un", None;
        0xD8 => Mul_Ovf, "mul.ovf", None;
        0xD9 => Mul_Ovf_Un, "mul.ovf.un", None;
        0xDA => Sub_Ovf, "sub.ovf", None;
        0xDB => Sub_Ovf_Un, "sub.ovf.un", None;
        0xDC => Endfinally, "endfinally", None;
        0xDD => Leave, "leave", BranchTarget32;
        0xDE => Leave_S, "leave.s", BranchTarget8;
        0xDF => Stind_I, "stind.i", None;
        0xE0 => Conv_U, "conv.u", None;
    }
    two_byte {
        0x00 => Arglist, "arglist", None;
        0x01 => Ceq, "ceq", None;
        0x02 => Cgt, "cgt", None;
        0x03 => Cgt_Un, "cgt.un", None;
        0x04 => Clt, "clt", None;
        0x05 => Clt_Un, "clt.un", None;
        0x06 => Ldftn, "ldftn", Token;
        0x07 => Ldvirtftn, "ldvirtftn", Token;
        0x09 => Ldarg, "ldarg", UInt16;
        0x0A => Ldarga, "ldarga", UInt16;
        0x0B => Starg, "starg", UInt16;
        0x0C => Ldloc, "ldloc", UInt16;
        0x0D => Ldloca, "ldloca", UInt16;
        0x0E => Stloc, "stloc", UInt16;
        0x0F => Localloc, "localloc", None;
        0x11 => Endfilter, "endfilter", None;
        0x12 => Unaligned, "unaligned.", UInt8;
        0x13 => Volatile, "volatile.", None;
        0x14 => Tail, "tail.", None;
        0x15 => Initobj, "initobj", Token;
        0x16 => Constrained, "constrained.", Token;
        0x17 => Cpblk, "cpblk", None;
        0x18 => Initblk, "initblk", None;
        0x1A => Rethrow, "rethrow", None;
        0x1C => Sizeof, "sizeof", Token;
        0x1D => Refanytype, "refanytype", None;
        0x1E => Readonly, "readonly.", None;
    }
}

impl OpCode {
    /// Whether this opcode is a true prefix, accumulated rather than decoded as an
    /// instruction of its own.
    #[must_use]
    pub fn is_prefix(&self) -> bool {
        matches!(
            self,
            OpCode::Tail
                | OpCode::Volatile
                | OpCode::Readonly
                | OpCode::Unaligned
                | OpCode::Constrained
        )
    }
}

/// An immediate operand value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// 1-byte signed
    Int8(i8),
    /// 1-byte unsigned
    UInt8(u8),
    /// 2-byte unsigned
    UInt16(u16),
    /// 4-byte signed
    Int32(i32),
    /// 8-byte signed
    Int64(i64),
    /// 4-byte float
    Float32(f32),
    /// 8-byte double
    Float64(f64),
}

/// The decoded operand of one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// An immediate value
    Immediate(Immediate),
    /// A metadata token
    Token(Token),
    /// A relative branch displacement from the next instruction
    BranchTarget(i32),
    /// A switch table of relative displacements
    Switch(Vec<i32>),
}

/// One decoded logical instruction, prefixes folded in.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// The opcode.
    pub opcode: OpCode,
    /// The IL mnemonic.
    pub mnemonic: &'static str,
    /// Byte offset of the first byte (including prefixes) within the sequence buffer.
    pub offset: u32,
    /// Encoded size in bytes, prefixes and operands included.
    pub size: u32,
    /// Accumulated prefixes.
    pub prefixes: PrefixFlags,
    /// Alignment operand of an `unaligned.` prefix.
    pub unaligned: Option<u8>,
    /// Type token operand of a `constrained.` prefix.
    pub constrained: Option<Token>,
    /// The decoded operand.
    pub operand: Operand,
    /// The debug sequence point attached to this instruction, if any.
    pub sequence_point: Option<crate::metadata::method::SequencePoint>,
}
