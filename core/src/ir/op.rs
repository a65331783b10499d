use crate::ast::{BinaryOperator, UnaryOperator};

/// Operators carried by `Unop`, `Binop` and compound `Move`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluOp {
    Not,
    UMinus,
    UPlus,
    Compl,
    Increment,
    Decrement,

    BitAnd,
    BitOr,
    BitXor,

    Add,
    Sub,
    Mul,
    Div,
    Mod,

    LShift,
    RShift,
    URShift,

    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    StrictEq,
    StrictNe,

    InstanceOf,
    In,
}

impl AluOp {
    pub fn from_binary(op: BinaryOperator) -> Self {
        match op {
            BinaryOperator::Add => AluOp::Add,
            BinaryOperator::Sub => AluOp::Sub,
            BinaryOperator::Mul => AluOp::Mul,
            BinaryOperator::Div => AluOp::Div,
            BinaryOperator::Mod => AluOp::Mod,
            BinaryOperator::LShift => AluOp::LShift,
            BinaryOperator::RShift => AluOp::RShift,
            BinaryOperator::URShift => AluOp::URShift,
            BinaryOperator::BitAnd => AluOp::BitAnd,
            BinaryOperator::BitOr => AluOp::BitOr,
            BinaryOperator::BitXor => AluOp::BitXor,
            BinaryOperator::Eq => AluOp::Eq,
            BinaryOperator::Ne => AluOp::Ne,
            BinaryOperator::StrictEq => AluOp::StrictEq,
            BinaryOperator::StrictNe => AluOp::StrictNe,
            BinaryOperator::Lt => AluOp::Lt,
            BinaryOperator::Gt => AluOp::Gt,
            BinaryOperator::Le => AluOp::Le,
            BinaryOperator::Ge => AluOp::Ge,
            BinaryOperator::In => AluOp::In,
            BinaryOperator::InstanceOf => AluOp::InstanceOf,
        }
    }

    /// The arithmetic unary operators; `delete`, `void` and `typeof` have
    /// no `AluOp` and are lowered separately.
    pub fn from_unary(op: UnaryOperator) -> Option<Self> {
        match op {
            UnaryOperator::Not => Some(AluOp::Not),
            UnaryOperator::Minus => Some(AluOp::UMinus),
            UnaryOperator::Plus => Some(AluOp::UPlus),
            UnaryOperator::Tilde => Some(AluOp::Compl),
            UnaryOperator::Delete | UnaryOperator::Void | UnaryOperator::TypeOf => None,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            AluOp::Gt
                | AluOp::Lt
                | AluOp::Ge
                | AluOp::Le
                | AluOp::Eq
                | AluOp::Ne
                | AluOp::StrictEq
                | AluOp::StrictNe
                | AluOp::InstanceOf
                | AluOp::In
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AluOp::Not => "!",
            AluOp::UMinus => "-",
            AluOp::UPlus => "+",
            AluOp::Compl => "~",
            AluOp::Increment => "++",
            AluOp::Decrement => "--",
            AluOp::BitAnd => "&",
            AluOp::BitOr => "|",
            AluOp::BitXor => "^",
            AluOp::Add => "+",
            AluOp::Sub => "-",
            AluOp::Mul => "*",
            AluOp::Div => "/",
            AluOp::Mod => "%",
            AluOp::LShift => "<<",
            AluOp::RShift => ">>",
            AluOp::URShift => ">>>",
            AluOp::Gt => ">",
            AluOp::Lt => "<",
            AluOp::Ge => ">=",
            AluOp::Le => "<=",
            AluOp::Eq => "==",
            AluOp::Ne => "!=",
            AluOp::StrictEq => "===",
            AluOp::StrictNe => "!==",
            AluOp::InstanceOf => "instanceof",
            AluOp::In => "in",
        }
    }
}

impl std::fmt::Display for AluOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Runtime entry points the lowering calls for anything that is not a
/// primitive IR operation. The names are the contract with the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    TypeOf,
    Delete,
    Throw,
    FinishTry,
    PushWithScope,
    PopScope,
    ForeachIteratorObject,
    ForeachNextPropertyName,
    DeclareVars,
    DefineArray,
    DefineProperty,
    DefineGetterSetter,
    DefineObjectLiteral,
    PostIncrement,
    PostDecrement,
}

impl Builtin {
    pub const ALL: [Builtin; 15] = [
        Builtin::TypeOf,
        Builtin::Delete,
        Builtin::Throw,
        Builtin::FinishTry,
        Builtin::PushWithScope,
        Builtin::PopScope,
        Builtin::ForeachIteratorObject,
        Builtin::ForeachNextPropertyName,
        Builtin::DeclareVars,
        Builtin::DefineArray,
        Builtin::DefineProperty,
        Builtin::DefineGetterSetter,
        Builtin::DefineObjectLiteral,
        Builtin::PostIncrement,
        Builtin::PostDecrement,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::TypeOf => "builtin_typeof",
            Builtin::Delete => "builtin_delete",
            Builtin::Throw => "builtin_throw",
            Builtin::FinishTry => "builtin_finish_try",
            Builtin::PushWithScope => "builtin_push_with_scope",
            Builtin::PopScope => "builtin_pop_scope",
            Builtin::ForeachIteratorObject => "builtin_foreach_iterator_object",
            Builtin::ForeachNextPropertyName => "builtin_foreach_next_property_name",
            Builtin::DeclareVars => "builtin_declare_vars",
            Builtin::DefineArray => "builtin_define_array",
            Builtin::DefineProperty => "builtin_define_property",
            Builtin::DefineGetterSetter => "builtin_define_getter_setter",
            Builtin::DefineObjectLiteral => "builtin_define_object_literal",
            Builtin::PostIncrement => "builtin_postincrement",
            Builtin::PostDecrement => "builtin_postdecrement",
        }
    }
}

impl std::fmt::Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
