use super::{TypeContext, TypeError, TypeErrorKind, TypeResult};
use crate::language::{decls::DeclOwner, types::{TypeDescriptor, TypeKind}};
use tracing::debug;

/// Checks that `ty` is well formed inside the declaration `owner`, stopping at
/// the first problem found.
pub fn validate<'o>(
    ctx: &TypeContext<'_>,
    ty: &TypeDescriptor,
    owner: impl Into<DeclOwner<'o>>,
) -> TypeResult<()> {
    let owner = owner.into();
    let mut expanding = vec![owner.name.to_string()];
    let mut resolving = Vec::new();
    let outcome = Validator {
        ctx,
        owner,
        expanding: &mut expanding,
        resolving: &mut resolving,
    }
    .check(ty);
    if let Err(err) = &outcome {
        debug!(owner = owner.name, ty = %ty, code = err.code(), "type validation failed");
    }
    outcome
}

struct Validator<'c, 'a, 'o> {
    ctx: &'c TypeContext<'a>,
    owner: DeclOwner<'o>,
    /// Nominal names expanded on the current path without a pointer between.
    expanding: &'c mut Vec<String>,
    /// Type variables followed through the environment on the current path.
    resolving: &'c mut Vec<String>,
}

impl Validator<'_, '_, '_> {
    fn check(&mut self, ty: &TypeDescriptor) -> TypeResult<()> {
        match &ty.kind {
            TypeKind::Nominal { name, args } | TypeKind::TaggedUnion { name, args } => {
                self.check_named(ty, name, args)
            }
            // Indirections are validated on their own, so recursive graphs
            // through pointers never descend forever.
            TypeKind::Pointer(_) | TypeKind::Function { .. } | TypeKind::MetaFunction { .. } => {
                Ok(())
            }
            TypeKind::TypeVariable(name) => self.check_type_var(ty, name),
            TypeKind::Array { element, .. } => self.check(element),
            TypeKind::Tuple(members) => members.iter().try_for_each(|member| self.check(member)),
            TypeKind::Int { .. }
            | TypeKind::Float(_)
            | TypeKind::Bool
            | TypeKind::Char(_)
            | TypeKind::Void
            | TypeKind::TypeValue => Ok(()),
        }
    }

    fn check_named(
        &mut self,
        ty: &TypeDescriptor,
        name: &str,
        args: &[TypeDescriptor],
    ) -> TypeResult<()> {
        if self.expanding.iter().any(|open| open == name) {
            return Err(TypeError::new(TypeErrorKind::RecursiveType {
                name: name.to_string(),
            })
            .at(ty.span)
            .with_help(format!("refer to `{name}` through a pointer, e.g. `{name}*`")));
        }
        let registry = self.ctx.registry;
        let Some(decl) = registry.lookup_type(name) else {
            if registry.lookup_trait(name).is_some() {
                return Ok(());
            }
            return Err(TypeError::new(TypeErrorKind::UndeclaredType {
                name: name.to_string(),
            })
            .at(ty.span));
        };
        if decl.generics.len() != args.len() {
            return Err(TypeError::new(TypeErrorKind::ArityMismatch {
                name: name.to_string(),
                expected: decl.generics.len(),
                found: args.len(),
            })
            .at(ty.span));
        }
        let expanded = decl.instantiate(args);
        self.expanding.push(name.to_string());
        let outcome = self.check(&expanded).map_err(|err| {
            // Errors inside the expansion carry the declaration's spans; point
            // at the use site instead when the declaration has none.
            if err.span.is_empty() {
                err.at(ty.span)
            } else {
                err
            }
        });
        self.expanding.pop();
        outcome
    }

    fn check_type_var(&mut self, ty: &TypeDescriptor, name: &str) -> TypeResult<()> {
        if let Some(bound) = self.ctx.env.lookup(name) {
            if self.resolving.iter().any(|open| open == name) {
                return Err(TypeError::new(TypeErrorKind::UnboundTypeVariable {
                    name: name.to_string(),
                })
                .at(ty.span)
                .with_help("the variable is bound to itself"));
            }
            self.resolving.push(name.to_string());
            let outcome = self.check(bound);
            self.resolving.pop();
            return outcome;
        }
        if self.owner.generics.iter().any(|generic| generic == name) {
            return Ok(());
        }
        Err(TypeError::new(TypeErrorKind::UnboundTypeVariable {
            name: name.to_string(),
        })
        .at(ty.span)
        .with_help(format!(
            "declare `{name}` as a generic parameter of `{}`",
            self.owner.name
        )))
    }
}
