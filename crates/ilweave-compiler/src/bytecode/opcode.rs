//! Target instruction set.
//!
//! The target is a typed stack machine. Opcode names follow the builder
//! library's naming (`Ldc_I4_0` renders as `ldc.i4.0`). Each opcode knows how
//! many values it pops and pushes; call-like opcodes report
//! [`StackCount::Varies`] and take their arity from the member reference.

use std::fmt;

/// How many stack slots an opcode consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCount {
    Fixed(u8),
    /// Depends on the operand (calls, `newobj`, `ret`).
    Varies,
}

/// What an opcode does to control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    Next,
    Call,
    Branch,
    CondBranch,
    /// `leave`: exits a protected region, emptying the stack.
    Leave,
    Return,
    Throw,
    EndFinally,
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Nop,

    // =========================================================================
    // Constants
    // =========================================================================
    Ldnull,
    Ldc_I4_M1,
    Ldc_I4_0,
    Ldc_I4_1,
    Ldc_I4_2,
    Ldc_I4_3,
    Ldc_I4_4,
    Ldc_I4_5,
    Ldc_I4_6,
    Ldc_I4_7,
    Ldc_I4_8,
    /// Operand: `Int32` in `-128..=127`.
    Ldc_I4_S,
    /// Operand: `Int32`.
    Ldc_I4,
    /// Operand: `Int64`.
    Ldc_I8,
    Ldc_R4,
    Ldc_R8,
    Ldstr,

    // =========================================================================
    // Locals and arguments
    // =========================================================================
    Ldloc,
    Ldloca,
    Stloc,
    Ldarg,
    Ldarga,
    Starg,

    // =========================================================================
    // Stack
    // =========================================================================
    Dup,
    Pop,

    // =========================================================================
    // Arithmetic and bitwise
    // =========================================================================
    Add,
    Sub,
    Mul,
    Div,
    Div_Un,
    Rem,
    Rem_Un,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Shr_Un,
    Neg,
    Not,

    // =========================================================================
    // Comparison
    // =========================================================================
    Ceq,
    Cgt,
    Cgt_Un,
    Clt,
    Clt_Un,

    // =========================================================================
    // Conversions
    // =========================================================================
    Conv_I1,
    Conv_I2,
    Conv_I4,
    Conv_I8,
    Conv_U1,
    Conv_U2,
    Conv_U4,
    Conv_U8,
    Conv_I,
    Conv_U,
    Conv_R4,
    Conv_R8,
    Conv_R_Un,

    // =========================================================================
    // Control flow
    // =========================================================================
    Br,
    Brfalse,
    Brtrue,
    Leave,
    Endfinally,
    Ret,
    Throw,
    Rethrow,

    // =========================================================================
    // Calls and objects
    // =========================================================================
    Call,
    Callvirt,
    Newobj,
    Ldfld,
    Ldflda,
    Stfld,
    Ldsfld,
    Ldsflda,
    Stsfld,
    Box,
    Unbox_Any,
    Castclass,
    Isinst,
    Initobj,
    Ldobj,
    Stobj,
    Ldtoken,
    Ldftn,
    Ldvirtftn,
    Sizeof,
    Localloc,

    // =========================================================================
    // Arrays
    // =========================================================================
    Newarr,
    Ldlen,
    Ldelema,
    Ldelem_I1,
    Ldelem_U1,
    Ldelem_I2,
    Ldelem_U2,
    Ldelem_I4,
    Ldelem_U4,
    Ldelem_I8,
    Ldelem_I,
    Ldelem_R4,
    Ldelem_R8,
    Ldelem_Ref,
    Ldelem_Any,
    Stelem_I1,
    Stelem_I2,
    Stelem_I4,
    Stelem_I8,
    Stelem_I,
    Stelem_R4,
    Stelem_R8,
    Stelem_Ref,
    Stelem_Any,

    // =========================================================================
    // Indirect access
    // =========================================================================
    Ldind_I1,
    Ldind_U1,
    Ldind_I2,
    Ldind_U2,
    Ldind_I4,
    Ldind_U4,
    Ldind_I8,
    Ldind_I,
    Ldind_R4,
    Ldind_R8,
    Ldind_Ref,
    Stind_I1,
    Stind_I2,
    Stind_I4,
    Stind_I8,
    Stind_I,
    Stind_R4,
    Stind_R8,
    Stind_Ref,
}

impl OpCode {
    /// Textual name as used by the builder library, e.g. `ldc.i4.s`.
    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Nop => "nop",
            Ldnull => "ldnull",
            Ldc_I4_M1 => "ldc.i4.m1",
            Ldc_I4_0 => "ldc.i4.0",
            Ldc_I4_1 => "ldc.i4.1",
            Ldc_I4_2 => "ldc.i4.2",
            Ldc_I4_3 => "ldc.i4.3",
            Ldc_I4_4 => "ldc.i4.4",
            Ldc_I4_5 => "ldc.i4.5",
            Ldc_I4_6 => "ldc.i4.6",
            Ldc_I4_7 => "ldc.i4.7",
            Ldc_I4_8 => "ldc.i4.8",
            Ldc_I4_S => "ldc.i4.s",
            Ldc_I4 => "ldc.i4",
            Ldc_I8 => "ldc.i8",
            Ldc_R4 => "ldc.r4",
            Ldc_R8 => "ldc.r8",
            Ldstr => "ldstr",
            Ldloc => "ldloc",
            Ldloca => "ldloca",
            Stloc => "stloc",
            Ldarg => "ldarg",
            Ldarga => "ldarga",
            Starg => "starg",
            Dup => "dup",
            Pop => "pop",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Div_Un => "div.un",
            Rem => "rem",
            Rem_Un => "rem.un",
            And => "and",
            Or => "or",
            Xor => "xor",
            Shl => "shl",
            Shr => "shr",
            Shr_Un => "shr.un",
            Neg => "neg",
            Not => "not",
            Ceq => "ceq",
            Cgt => "cgt",
            Cgt_Un => "cgt.un",
            Clt => "clt",
            Clt_Un => "clt.un",
            Conv_I1 => "conv.i1",
            Conv_I2 => "conv.i2",
            Conv_I4 => "conv.i4",
            Conv_I8 => "conv.i8",
            Conv_U1 => "conv.u1",
            Conv_U2 => "conv.u2",
            Conv_U4 => "conv.u4",
            Conv_U8 => "conv.u8",
            Conv_I => "conv.i",
            Conv_U => "conv.u",
            Conv_R4 => "conv.r4",
            Conv_R8 => "conv.r8",
            Conv_R_Un => "conv.r.un",
            Br => "br",
            Brfalse => "brfalse",
            Brtrue => "brtrue",
            Leave => "leave",
            Endfinally => "endfinally",
            Ret => "ret",
            Throw => "throw",
            Rethrow => "rethrow",
            Call => "call",
            Callvirt => "callvirt",
            Newobj => "newobj",
            Ldfld => "ldfld",
            Ldflda => "ldflda",
            Stfld => "stfld",
            Ldsfld => "ldsfld",
            Ldsflda => "ldsflda",
            Stsfld => "stsfld",
            Box => "box",
            Unbox_Any => "unbox.any",
            Castclass => "castclass",
            Isinst => "isinst",
            Initobj => "initobj",
            Ldobj => "ldobj",
            Stobj => "stobj",
            Ldtoken => "ldtoken",
            Ldftn => "ldftn",
            Ldvirtftn => "ldvirtftn",
            Sizeof => "sizeof",
            Localloc => "localloc",
            Newarr => "newarr",
            Ldlen => "ldlen",
            Ldelema => "ldelema",
            Ldelem_I1 => "ldelem.i1",
            Ldelem_U1 => "ldelem.u1",
            Ldelem_I2 => "ldelem.i2",
            Ldelem_U2 => "ldelem.u2",
            Ldelem_I4 => "ldelem.i4",
            Ldelem_U4 => "ldelem.u4",
            Ldelem_I8 => "ldelem.i8",
            Ldelem_I => "ldelem.i",
            Ldelem_R4 => "ldelem.r4",
            Ldelem_R8 => "ldelem.r8",
            Ldelem_Ref => "ldelem.ref",
            Ldelem_Any => "ldelem.any",
            Stelem_I1 => "stelem.i1",
            Stelem_I2 => "stelem.i2",
            Stelem_I4 => "stelem.i4",
            Stelem_I8 => "stelem.i8",
            Stelem_I => "stelem.i",
            Stelem_R4 => "stelem.r4",
            Stelem_R8 => "stelem.r8",
            Stelem_Ref => "stelem.ref",
            Stelem_Any => "stelem.any",
            Ldind_I1 => "ldind.i1",
            Ldind_U1 => "ldind.u1",
            Ldind_I2 => "ldind.i2",
            Ldind_U2 => "ldind.u2",
            Ldind_I4 => "ldind.i4",
            Ldind_U4 => "ldind.u4",
            Ldind_I8 => "ldind.i8",
            Ldind_I => "ldind.i",
            Ldind_R4 => "ldind.r4",
            Ldind_R8 => "ldind.r8",
            Ldind_Ref => "ldind.ref",
            Stind_I1 => "stind.i1",
            Stind_I2 => "stind.i2",
            Stind_I4 => "stind.i4",
            Stind_I8 => "stind.i8",
            Stind_I => "stind.i",
            Stind_R4 => "stind.r4",
            Stind_R8 => "stind.r8",
            Stind_Ref => "stind.ref",
        }
    }

    /// Values consumed from the stack.
    pub fn stack_pop(&self) -> StackCount {
        use OpCode::*;
        use StackCount::*;
        match self {
            Call | Callvirt | Newobj | Ret => Varies,
            Nop | Ldnull | Ldc_I4_M1 | Ldc_I4_0 | Ldc_I4_1 | Ldc_I4_2 | Ldc_I4_3 | Ldc_I4_4
            | Ldc_I4_5 | Ldc_I4_6 | Ldc_I4_7 | Ldc_I4_8 | Ldc_I4_S | Ldc_I4 | Ldc_I8 | Ldc_R4
            | Ldc_R8 | Ldstr | Ldloc | Ldloca | Ldarg | Ldarga | Br | Leave | Endfinally
            | Rethrow | Ldsfld | Ldsflda | Ldtoken | Ldftn | Sizeof => Fixed(0),
            Stloc | Starg | Dup | Pop | Neg | Not | Conv_I1 | Conv_I2 | Conv_I4 | Conv_I8
            | Conv_U1 | Conv_U2 | Conv_U4 | Conv_U8 | Conv_I | Conv_U | Conv_R4 | Conv_R8
            | Conv_R_Un | Brfalse | Brtrue | Throw | Ldfld | Ldflda | Stsfld | Box | Unbox_Any
            | Castclass | Isinst | Initobj | Ldobj | Ldvirtftn | Localloc | Newarr | Ldlen
            | Ldind_I1 | Ldind_U1 | Ldind_I2 | Ldind_U2 | Ldind_I4 | Ldind_U4 | Ldind_I8
            | Ldind_I | Ldind_R4 | Ldind_R8 | Ldind_Ref => Fixed(1),
            Add | Sub | Mul | Div | Div_Un | Rem | Rem_Un | And | Or | Xor | Shl | Shr
            | Shr_Un | Ceq | Cgt | Cgt_Un | Clt | Clt_Un | Stfld | Stobj | Ldelema | Ldelem_I1
            | Ldelem_U1 | Ldelem_I2 | Ldelem_U2 | Ldelem_I4 | Ldelem_U4 | Ldelem_I8 | Ldelem_I
            | Ldelem_R4 | Ldelem_R8 | Ldelem_Ref | Ldelem_Any | Stind_I1 | Stind_I2 | Stind_I4
            | Stind_I8 | Stind_I | Stind_R4 | Stind_R8 | Stind_Ref => Fixed(2),
            Stelem_I1 | Stelem_I2 | Stelem_I4 | Stelem_I8 | Stelem_I | Stelem_R4 | Stelem_R8
            | Stelem_Ref | Stelem_Any => Fixed(3),
        }
    }

    /// Values produced onto the stack.
    pub fn stack_push(&self) -> StackCount {
        use OpCode::*;
        use StackCount::*;
        match self {
            Call | Callvirt => Varies,
            Dup => Fixed(2),
            Nop | Stloc | Starg | Pop | Br | Brfalse | Brtrue | Leave | Endfinally | Ret
            | Throw | Rethrow | Stfld | Stsfld | Initobj | Stobj | Stelem_I1 | Stelem_I2
            | Stelem_I4 | Stelem_I8 | Stelem_I | Stelem_R4 | Stelem_R8 | Stelem_Ref | Stelem_Any
            | Stind_I1 | Stind_I2 | Stind_I4 | Stind_I8 | Stind_I | Stind_R4 | Stind_R8
            | Stind_Ref => Fixed(0),
            _ => Fixed(1),
        }
    }

    pub fn flow_control(&self) -> FlowControl {
        use OpCode::*;
        match self {
            Br => FlowControl::Branch,
            Brfalse | Brtrue => FlowControl::CondBranch,
            Leave => FlowControl::Leave,
            Ret => FlowControl::Return,
            Throw | Rethrow => FlowControl::Throw,
            Endfinally => FlowControl::EndFinally,
            Call | Callvirt | Newobj => FlowControl::Call,
            _ => FlowControl::Next,
        }
    }

    /// Whether the operand is a branch target.
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_control(),
            FlowControl::Branch | FlowControl::CondBranch | FlowControl::Leave
        )
    }

    /// Short-form constant load for small integers.
    pub fn ldc_i4_short(value: i32) -> Option<OpCode> {
        use OpCode::*;
        Some(match value {
            -1 => Ldc_I4_M1,
            0 => Ldc_I4_0,
            1 => Ldc_I4_1,
            2 => Ldc_I4_2,
            3 => Ldc_I4_3,
            4 => Ldc_I4_4,
            5 => Ldc_I4_5,
            6 => Ldc_I4_6,
            7 => Ldc_I4_7,
            8 => Ldc_I4_8,
            _ => return None,
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
