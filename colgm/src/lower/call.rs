//! Call chains, member access and struct initializers
//!
//! A call chain starts from a head expression (usually an identifier) and
//! applies links left to right. Links work on locations: identifiers push
//! the address of their slot, indexing and field access compute element
//! and field addresses, and only the end of the chain loads, unless the
//! caller asked for the address itself.

use crate::mir::{Mir, MirNode, MirStructField};
use crate::sir::{ConvertOp, SirInst, SirValue};
use crate::span::Span;
use crate::types::{SymbolKind, Type};
use crate::util::mangle;

use super::{EvalMode, FunctionLowering, MirValue, ValueKind};

/// Sentinel bound when an identifier has no local binding
const NAME_NOT_FOUND: &str = "<name-not-found>";

impl FunctionLowering<'_> {
    pub(super) fn lower_call(&mut self, node: &MirNode, mode: EvalMode) {
        let Mir::Call { ty, chain } = &node.node else {
            self.internal(node.span, format!("expected call, found {}", node.node.kind_name()));
            self.push(MirValue::nil(Type::void()));
            return;
        };
        let Some((head, links)) = chain.split_first() else {
            self.internal(node.span, "empty call chain");
            self.push(MirValue::nil(ty.clone()));
            return;
        };

        self.lower_node(head);
        for link in links {
            self.lower_link(link);
        }
        let dereferenced = self.de_reference();

        let Some(source) = self.stack.last().cloned() else {
            return;
        };
        if !source.is_variable() || !source.ty.is_pointer() {
            return;
        }
        let ends_with_call = links
            .last()
            .is_some_and(|link| matches!(link.node, Mir::CallFunc { .. }));

        match mode {
            EvalMode::Address => {
                // a returned pointer sits in its hidden slot, load the pointer
                if ends_with_call && !dereferenced && source.ty.ref_copy().is_pointer() {
                    self.stack.pop();
                    let pointer = self.load(&source);
                    self.push(pointer);
                }
            }
            EvalMode::Value => {
                self.stack.pop();
                let value = if source.ty.is_array {
                    self.array_decay(&source)
                } else {
                    self.load(&source)
                };
                self.push(value);
            }
        }
    }

    /// Replace a reference on top of the stack by the location it holds.
    /// Returns whether a load happened.
    pub(super) fn de_reference(&mut self) -> bool {
        if !self.stack.last().is_some_and(|top| top.ty.is_reference) {
            return false;
        }
        let Some(source) = self.stack.pop() else {
            return false;
        };
        let mut ty = source.ty.clone();
        ty.is_reference = false;
        let dest = self.temp();
        self.emit(SirInst::Load {
            ty: self.map(&ty),
            source: source.to_sir(),
            dest: SirValue::variable(dest.clone()),
        });
        self.push(MirValue::variable(dest, ty));
        true
    }

    /// `T[N]*` location to a `T*` pointing at the first element
    fn array_decay(&mut self, location: &MirValue) -> MirValue {
        let mut pointer = location.ty.ref_copy();
        pointer.is_array = false;
        let element = pointer.ref_copy();
        let dest = self.temp();
        self.emit(SirInst::ArrayCast {
            dest: SirValue::variable(dest.clone()),
            source: location.to_sir(),
            ty: self.map(&element),
            size: location.ty.array_length,
        });
        MirValue::variable(dest, pointer)
    }

    fn lower_link(&mut self, link: &MirNode) {
        let span = link.span;
        match &link.node {
            Mir::CallIndex { ty, index } => self.lower_call_index(ty, index, span),
            Mir::CallFunc {
                ty,
                args,
                args_is_ref,
            } => self.lower_call_func(ty, args, args_is_ref, span),
            Mir::GetField { name, ty } => {
                self.de_reference();
                let receiver = self.pop(span);
                self.member_access(receiver, name, ty, span);
            }
            Mir::PtrGetField { name, ty } => {
                self.de_reference();
                let pointer = self.pop(span);
                let receiver = self.load(&pointer);
                self.member_access(receiver, name, ty, span);
            }
            Mir::GetPath { name, ty } => self.lower_get_path(name, ty, span),
            other => self.internal(
                span,
                format!("{} cannot appear inside a call chain", other.kind_name()),
            ),
        }
    }

    pub(super) fn lower_call_id(&mut self, name: &str, ty: &Type, span: Span) {
        if !ty.is_global {
            let mut local = ty.clone();
            local.is_array = false;
            let generated = match self.locals.get(name) {
                Some(generated) => generated.to_string(),
                None => {
                    self.internal(span, format!("local {name} is not defined"));
                    NAME_NOT_FOUND.to_string()
                }
            };
            self.push(MirValue::variable(generated, local.pointer_copy()));
            return;
        }

        let full_name = ty.full_path_name();
        let value = match self.symbol_kind(ty) {
            SymbolKind::Basic => MirValue::primitive(full_name, ty.clone()),
            SymbolKind::Struct => MirValue::struct_symbol(full_name, ty.clone()),
            SymbolKind::TaggedUnion => MirValue::tagged_union_symbol(full_name, ty.clone()),
            SymbolKind::Enum => MirValue::enum_symbol(full_name, ty.clone()),
            SymbolKind::Func => {
                let symbol = match self.env.symbols.find_function(ty) {
                    Some(f) if f.is_extern => ty.name.clone(),
                    _ => mangle(&full_name),
                };
                MirValue::func(symbol, ty.clone())
            }
            SymbolKind::Error => {
                self.internal(span, format!("unknown global symbol {full_name}"));
                MirValue::nil(ty.clone())
            }
        };
        self.push(value);
    }

    fn lower_call_index(&mut self, ty: &Type, index: &MirNode, span: Span) {
        self.de_reference();
        let location = self.pop(span);
        self.lower_node(index);
        let index = self.pop(index.span);

        let base = if location.ty.is_array {
            self.array_decay(&location)
        } else {
            self.load(&location)
        };
        let element = base.ty.ref_copy();
        let dest = self.temp();
        self.emit(SirInst::GetIndex {
            dest: SirValue::variable(dest.clone()),
            source: base.to_sir(),
            index: index.to_sir(),
            ty: self.map(&element),
            index_ty: self.map(&index.ty),
        });
        self.push(MirValue::variable(dest, ty.pointer_copy()));
    }

    fn lower_call_func(&mut self, ty: &Type, args: &[MirNode], args_is_ref: &[bool], span: Span) {
        let callee = self.pop(span);
        let mut values = Vec::with_capacity(args.len() + 1);
        match callee.kind {
            ValueKind::Method => {
                self.de_reference();
                values.push(self.pop(span));
            }
            ValueKind::FuncSymbol => {}
            other => {
                self.internal(span, format!("cannot call a {other:?} value"));
                self.push(MirValue::nil(ty.clone()));
                return;
            }
        }

        for (i, arg) in args.iter().enumerate() {
            let by_ref = args_is_ref.get(i).copied().unwrap_or(false);
            if by_ref && matches!(arg.node, Mir::Call { .. }) {
                self.lower_call(arg, EvalMode::Address);
            } else {
                self.lower_node(arg);
            }
            values.push(self.pop(arg.span));
        }

        let name = mangle(&callee.content);
        let return_ty = self.map(ty);
        let result = if ty.is_void() {
            None
        } else {
            Some(self.temp())
        };
        let debug_loc = self
            .debug_scope
            .map(|scope| self.module.debug_info.add_location(span.line, span.column, scope));
        let signature = self.env.variadic.get(&name).cloned();
        let args = values
            .iter()
            .map(|v| (self.map(&v.ty), v.to_sir()))
            .collect();
        self.emit(SirInst::Call {
            name,
            return_ty: return_ty.clone(),
            dest: match &result {
                Some(temp) => SirValue::variable(temp.clone()),
                None => SirValue::Null("void call".to_string()),
            },
            args,
            signature,
            debug_loc,
        });

        match result {
            Some(temp) => {
                let slot = self.hidden_slot(&return_ty);
                self.emit(SirInst::Store {
                    ty: return_ty,
                    source: SirValue::variable(temp),
                    dest: SirValue::variable(slot.clone()),
                });
                self.push(MirValue::variable(slot, ty.pointer_copy()));
            }
            None => self.push(MirValue::nil(Type::void())),
        }
    }

    /// Field or method of the aggregate at `receiver`, a location
    fn member_access(&mut self, receiver: MirValue, name: &str, ty: &Type, span: Span) {
        let aggregate = receiver.ty.ref_copy();
        let method = format!("{}.{name}", aggregate.full_path_name());

        if receiver.ty.module.is_empty() {
            let has_method = self
                .env
                .symbols
                .find_primitive(&aggregate.name)
                .is_some_and(|p| p.methods.contains(name));
            if !has_method {
                self.internal(span, format!("{} has no method {name}", aggregate.name));
            }
            self.push(receiver);
            self.push(MirValue::method(method, ty.clone()));
            return;
        }

        if let Some(symbol) = self.env.symbols.find_struct(&aggregate) {
            if symbol.methods.contains(name) {
                self.push(receiver);
                self.push(MirValue::method(method, ty.clone()));
                return;
            }
            let Some(index) = symbol.field_index(name) else {
                self.internal(
                    span,
                    format!("struct {} has no field {name}", aggregate.full_path_name()),
                );
                self.push(MirValue::nil(ty.clone()));
                return;
            };
            let dest = self.temp();
            self.emit(SirInst::GetField {
                dest: SirValue::variable(dest.clone()),
                source: receiver.to_sir(),
                struct_ty: self.map(&aggregate),
                index,
            });
            self.push(MirValue::variable(dest, ty.pointer_copy()));
            return;
        }

        if let Some(symbol) = self.env.symbols.find_tagged_union(&aggregate) {
            if symbol.methods.contains(name) {
                self.push(receiver);
                self.push(MirValue::method(method, ty.clone()));
                return;
            }
            let Some(member) = symbol.member(name) else {
                self.internal(
                    span,
                    format!("tagged union {} has no member {name}", aggregate.full_path_name()),
                );
                self.push(MirValue::nil(ty.clone()));
                return;
            };
            let member_ty = member.ty.clone();
            let payload = self.union_payload(&receiver, &aggregate, &member_ty, span);
            self.push(MirValue::variable(payload, ty.pointer_copy()));
            return;
        }

        self.internal(
            span,
            format!("{} has no fields", aggregate.full_path_name()),
        );
        self.push(MirValue::nil(ty.clone()));
    }

    /// Address of a tagged union payload viewed as `member`
    fn union_payload(
        &mut self,
        location: &MirValue,
        union_ty: &Type,
        member: &Type,
        span: Span,
    ) -> String {
        let storage = match self
            .env
            .layouts
            .union_layout(union_ty)
            .and_then(|l| l.max_align_type.clone())
        {
            Some(ty) => ty,
            None => {
                self.internal(
                    span,
                    format!("tagged union {} has no payload", union_ty.full_path_name()),
                );
                member.clone()
            }
        };
        let raw = self.temp();
        self.emit(SirInst::GetField {
            dest: SirValue::variable(raw.clone()),
            source: location.to_sir(),
            struct_ty: self.map(union_ty),
            index: 1,
        });
        let dest = self.temp();
        self.emit(SirInst::Convert {
            op: ConvertOp::Bitcast,
            dest: SirValue::variable(dest.clone()),
            source: SirValue::variable(raw),
            from: self.map(&storage.pointer_copy()),
            to: self.map(&member.pointer_copy()),
        });
        dest
    }

    fn lower_get_path(&mut self, name: &str, ty: &Type, span: Span) {
        let owner = self.pop(span);
        match owner.kind {
            ValueKind::Primitive | ValueKind::StructSymbol | ValueKind::TaggedUnionSymbol => {
                let path = format!("{}.{name}", owner.ty.full_path_name());
                self.push(MirValue::func(path, ty.clone()));
            }
            ValueKind::EnumSymbol => {
                let value = self
                    .env
                    .symbols
                    .find_enum(&owner.ty)
                    .and_then(|e| e.member_value(name));
                match value {
                    Some(value) => self.push(MirValue::literal(value.to_string(), ty.clone())),
                    None => {
                        self.internal(
                            span,
                            format!("enum {} has no member {name}", owner.ty.full_path_name()),
                        );
                        self.push(MirValue::nil(ty.clone()));
                    }
                }
            }
            other => {
                self.internal(span, format!("cannot take path {name} of a {other:?} value"));
                self.push(MirValue::nil(ty.clone()));
            }
        }
    }

    /// Zeroed hidden slot filled field by field in declaration order
    pub(super) fn lower_struct_init(&mut self, ty: &Type, fields: &[MirStructField], span: Span) {
        let mapped = self.map(ty);
        let slot = self.hidden_slot(&mapped);
        let location = MirValue::variable(slot.clone(), ty.pointer_copy());
        self.emit(SirInst::ZeroInit {
            dest: location.to_sir(),
            ty: mapped.clone(),
        });

        if let Some(symbol) = self.env.symbols.find_struct(ty) {
            // initializers run in source order, stores follow field order
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                let Some(index) = symbol.field_index(&field.name) else {
                    self.internal(
                        field.content.span,
                        format!("struct {} has no field {}", ty.full_path_name(), field.name),
                    );
                    continue;
                };
                self.lower_node(&field.content);
                values.push((index, self.pop(field.content.span)));
            }
            values.sort_by_key(|(index, _)| *index);
            for (index, value) in values {
                let dest = SirValue::variable(self.temp());
                self.emit(SirInst::GetField {
                    dest: dest.clone(),
                    source: location.to_sir(),
                    struct_ty: mapped.clone(),
                    index,
                });
                self.emit(SirInst::Store {
                    ty: self.map(&value.ty),
                    source: value.to_sir(),
                    dest,
                });
            }
        } else if let Some(symbol) = self.env.symbols.find_tagged_union(ty) {
            for field in fields {
                let Some(member) = symbol.member(&field.name) else {
                    self.internal(
                        field.content.span,
                        format!("tagged union {} has no member {}", ty.full_path_name(), field.name),
                    );
                    continue;
                };
                let (tag, member_ty) = (member.tag, member.ty.clone());
                let tag_slot = SirValue::variable(self.temp());
                self.emit(SirInst::GetField {
                    dest: tag_slot.clone(),
                    source: location.to_sir(),
                    struct_ty: mapped.clone(),
                    index: 0,
                });
                self.emit(SirInst::Store {
                    ty: "i64".to_string(),
                    source: SirValue::literal(tag.to_string()),
                    dest: tag_slot,
                });
                let payload = self.union_payload(&location, ty, &member_ty, field.content.span);
                self.lower_node(&field.content);
                let value = self.pop(field.content.span);
                self.emit(SirInst::Store {
                    ty: self.map(&value.ty),
                    source: value.to_sir(),
                    dest: SirValue::variable(payload),
                });
            }
        } else {
            self.internal(
                span,
                format!("cannot initialize non-aggregate {}", ty.full_path_name()),
            );
        }

        self.push(location);
    }
}
