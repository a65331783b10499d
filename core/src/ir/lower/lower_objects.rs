//! file: core/src/ir/lower/lower_objects.rs
//! description: array and object literals, and `delete`.
//!
use std::collections::BTreeMap;

use crate::analyzers::CompilationMode;
use crate::ast::{Expression, Property, PropertyValue};
use crate::error::Abort;
use crate::ir::module::{Expr, FunctionId, Stmt};
use crate::ir::op::Builtin;
use crate::ir::value::Const;
use crate::location::Location;

use super::{Codegen, FunctionSource, LoweringContext};

/// What an object literal ends up defining under one key.
#[derive(Debug, Default)]
struct PropertySlot {
    value: Option<Expr>,
    getter: Option<FunctionId>,
    setter: Option<FunctionId>,
}

impl PropertySlot {
    fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }

    fn accessor_args(&self) -> [Expr; 2] {
        let closure = |f: Option<FunctionId>| f.map(Expr::Closure).unwrap_or(Expr::Const(Const::Undefined));
        [closure(self.getter), closure(self.setter)]
    }
}

/// Canonical array index: the decimal form of a uint32 below 2^32 - 1.
fn is_array_index(key: &str) -> bool {
    key.parse::<u32>()
        .is_ok_and(|index| index != u32::MAX && index.to_string() == key)
}

impl<'a, 'h> Codegen<'a, 'h> {
    pub(super) fn array_literal(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        elements: &'a [Option<Expression>],
    ) -> Result<Expr, Abort> {
        let mut args = Vec::with_capacity(elements.len());
        for element in elements {
            let Some(element) = element else {
                args.push(Expr::Const(Const::Missing));
                continue;
            };
            let value = self.expression(ctx, element)?;
            let value = match value {
                Expr::Temp(_) | Expr::Const(_) => value,
                other => self.pin(ctx, other),
            };
            args.push(value);
        }
        Ok(self.pin(ctx, Expr::builtin_call(Builtin::DefineArray, args)))
    }

    pub(super) fn object_literal(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        properties: &'a [Property],
    ) -> Result<Expr, Abort> {
        let strict = self.function(ctx).is_strict;
        let mut slots: BTreeMap<&'a str, PropertySlot> = BTreeMap::new();

        for property in properties {
            let key = property.key.as_str();
            match &property.value {
                PropertyValue::Value(expression) => {
                    let value = self.expression(ctx, expression)?;
                    let slot = slots.entry(key).or_default();
                    if slot.is_accessor() || (strict && slot.value.is_some()) {
                        return Err(self.duplicate_key(key, &property.location));
                    }
                    let value = self.pin_unless_temp(ctx, value);
                    slots.entry(key).or_default().value = Some(value);
                }
                PropertyValue::Getter(function) | PropertyValue::Setter(function) => {
                    let is_getter = matches!(property.value, PropertyValue::Getter(_));
                    let id = self.define_function(
                        FunctionSource::of(function, key),
                        CompilationMode::Function,
                        &[],
                        Some(ctx.function),
                    )?;
                    let slot = slots.entry(key).or_default();
                    let clash = slot.value.is_some()
                        || (is_getter && slot.getter.is_some())
                        || (!is_getter && slot.setter.is_some());
                    if clash {
                        return Err(self.duplicate_key(key, &property.location));
                    }
                    if is_getter {
                        slot.getter = Some(id);
                    } else {
                        slot.setter = Some(id);
                    }
                }
            }
        }

        let (indexed, named): (Vec<_>, Vec<_>) = slots.into_iter().partition(|(key, _)| is_array_index(key));

        let mut args = Vec::new();
        for (key, slot) in named {
            args.push(Expr::name(key, 0, 0));
            match slot.value {
                Some(value) if !slot.is_accessor() => {
                    args.push(Expr::Const(Const::Bool(true)));
                    args.push(value);
                }
                _ => {
                    args.push(Expr::Const(Const::Bool(false)));
                    args.extend(slot.accessor_args());
                }
            }
        }
        let object = self.pin(ctx, Expr::builtin_call(Builtin::DefineObjectLiteral, args));

        for (key, slot) in indexed {
            let call = match slot.value {
                Some(value) if !slot.is_accessor() => {
                    Expr::builtin_call(Builtin::DefineProperty, vec![object.clone(), Expr::name(key, 0, 0), value])
                }
                _ => {
                    let [getter, setter] = slot.accessor_args();
                    Expr::builtin_call(
                        Builtin::DefineGetterSetter,
                        vec![object.clone(), Expr::name(key, 0, 0), getter, setter],
                    )
                }
            };
            self.emit(ctx, Stmt::Exp(call));
        }
        Ok(object)
    }

    fn duplicate_key(&mut self, key: &str, location: &Location) -> Abort {
        self.syntax_error(format!("Illegal duplicate key '{}' in object literal", key), location)
    }

    pub(super) fn delete_expression(
        &mut self,
        ctx: &mut LoweringContext<'a>,
        operand: &'a Expression,
        location: &Location,
    ) -> Result<Expr, Abort> {
        let value = self.expression(ctx, operand)?;
        let strict = self.function(ctx).is_strict;
        let declared = self.envs.get(ctx.env).members.len() as i64;

        match value {
            // Declared locals and formals cannot be deleted.
            Expr::Temp(t) if i64::from(t.index) < declared => {
                if strict {
                    return Err(self.syntax_error("Delete of an unqualified identifier in strict mode.", location));
                }
                Ok(Expr::Const(Const::Bool(false)))
            }
            Expr::Name(_) if strict => {
                Err(self.syntax_error("Delete of an unqualified identifier in strict mode.", location))
            }
            Expr::Const(_) | Expr::String(_) | Expr::Temp(_) => Ok(Expr::Const(Const::Bool(true))),
            call @ Expr::Call { .. } => {
                self.emit(ctx, Stmt::Exp(call));
                Ok(Expr::Const(Const::Bool(true)))
            }
            other => {
                let reference = self.reference(ctx, other);
                Ok(Expr::builtin_call(Builtin::Delete, vec![reference]))
            }
        }
    }
}
