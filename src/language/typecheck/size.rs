use super::{TypeContext, TypeError, TypeErrorKind, TypeResult};
use crate::language::types::{TypeDescriptor, TypeKind};
use tracing::debug;

/// Layout size of `ty` in bits.
///
/// `incomplete` names a type whose layout is currently being computed by the
/// caller; reaching it again without a pointer in between is reported as
/// `IncompleteType`. Tagged unions take the size of their largest variant.
pub fn size_in_bits(
    ctx: &TypeContext<'_>,
    ty: &TypeDescriptor,
    incomplete: Option<&str>,
) -> TypeResult<u64> {
    let mut path: Vec<String> = incomplete.map(str::to_string).into_iter().collect();
    Sizer { ctx, path: &mut path }.size(ty)
}

/// First member with the strictly largest size. Zero-sized members are never
/// chosen, so an empty list or one holding only `void`/`type` gives `None`.
pub fn largest_variant<'t>(
    ctx: &TypeContext<'_>,
    members: &'t [TypeDescriptor],
    incomplete: Option<&str>,
) -> TypeResult<Option<(&'t TypeDescriptor, u64)>> {
    let mut path: Vec<String> = incomplete.map(str::to_string).into_iter().collect();
    Sizer { ctx, path: &mut path }.largest(members)
}

struct Sizer<'c, 'a> {
    ctx: &'c TypeContext<'a>,
    path: &'c mut Vec<String>,
}

impl Sizer<'_, '_> {
    fn size(&mut self, ty: &TypeDescriptor) -> TypeResult<u64> {
        let pointer_bits = u64::from(self.ctx.pointer_bits());
        match &ty.kind {
            TypeKind::Int { .. }
            | TypeKind::Float(_)
            | TypeKind::Bool
            | TypeKind::Char(_)
            | TypeKind::Void => Ok(ty
                .bit_width(self.ctx.pointer_bits())
                .map(u64::from)
                .unwrap_or_default()),
            TypeKind::TypeValue => Ok(0),
            TypeKind::Pointer(_) | TypeKind::Function { .. } | TypeKind::MetaFunction { .. } => {
                Ok(pointer_bits)
            }
            TypeKind::Array { element, len } => Ok(self.size(element)?.saturating_mul(*len)),
            TypeKind::Tuple(members) => self.sum(members),
            TypeKind::TypeVariable(name) => self.size_type_var(ty, name),
            TypeKind::Nominal { name, args } | TypeKind::TaggedUnion { name, args } => {
                self.size_named(ty, name, args)
            }
        }
    }

    fn sum(&mut self, members: &[TypeDescriptor]) -> TypeResult<u64> {
        members
            .iter()
            .try_fold(0u64, |total, member| Ok(total.saturating_add(self.size(member)?)))
    }

    fn largest<'t>(
        &mut self,
        members: &'t [TypeDescriptor],
    ) -> TypeResult<Option<(&'t TypeDescriptor, u64)>> {
        let mut largest: Option<(&TypeDescriptor, u64)> = None;
        for member in members {
            let bits = self.size(member)?;
            if bits > largest.map_or(0, |(_, best)| best) {
                largest = Some((member, bits));
            }
        }
        Ok(largest)
    }

    fn size_type_var(&mut self, ty: &TypeDescriptor, name: &str) -> TypeResult<u64> {
        let unresolved = || {
            TypeError::new(TypeErrorKind::UnresolvedTypeVariable {
                name: name.to_string(),
            })
            .at(ty.span)
        };
        if self.path.iter().any(|open| open == name) {
            return Err(unresolved().with_help("the variable is bound to itself"));
        }
        let Some(bound) = self.ctx.env.lookup(name) else {
            return Err(unresolved());
        };
        self.path.push(name.to_string());
        let outcome = self.size(bound);
        self.path.pop();
        outcome
    }

    fn size_named(
        &mut self,
        ty: &TypeDescriptor,
        name: &str,
        args: &[TypeDescriptor],
    ) -> TypeResult<u64> {
        if self.path.iter().any(|open| open == name) {
            debug!(name, "layout requested for a type still being defined");
            return Err(TypeError::new(TypeErrorKind::IncompleteType {
                name: name.to_string(),
            })
            .at(ty.span));
        }
        let decl = self.ctx.registry.require_type(name, ty.span)?;
        let expanded = decl.instantiate(args);
        let members = match &expanded.kind {
            TypeKind::Tuple(members) => members.as_slice(),
            _ => std::slice::from_ref(&expanded),
        };
        self.path.push(name.to_string());
        let outcome = if decl.is_union() {
            self.largest(members).map(|best| best.map_or(0, |(_, bits)| bits))
        } else {
            self.sum(members)
        };
        self.path.pop();
        outcome
    }
}
