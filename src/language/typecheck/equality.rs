use super::{TypeCheckResult, TypeContext};
use crate::language::types::{TypeDescriptor, TypeKind};
use std::{borrow::Cow, mem};
use tracing::trace;

/// Approximate equality of `l` and `r`, recording type-variable bindings
/// discovered on the way.
pub fn type_eq(ctx: &TypeContext<'_>, l: &TypeDescriptor, r: &TypeDescriptor) -> TypeCheckResult {
    let mut result = TypeCheckResult::new();
    Matcher::new(Some(ctx)).eq(l, r, &mut result);
    result
}

/// Pairwise equality of two lists, as used for call-argument matching.
pub fn type_eq_all(
    ctx: &TypeContext<'_>,
    ls: &[TypeDescriptor],
    rs: &[TypeDescriptor],
) -> TypeCheckResult {
    let mut result = TypeCheckResult::new();
    Matcher::new(Some(ctx)).eq_list(ls, rs, &mut result);
    result
}

/// Equality without declaration-table or environment access. Every type
/// variable counts as unbound and traits never match data types.
pub fn type_eq_base(l: &TypeDescriptor, r: &TypeDescriptor) -> TypeCheckResult {
    let mut result = TypeCheckResult::new();
    Matcher::new(None).eq(l, r, &mut result);
    result
}

struct Matcher<'c, 'a> {
    ctx: Option<&'c TypeContext<'a>>,
    /// Environment-bound variables whose bindings are being compared.
    settling: Vec<String>,
}

impl<'c, 'a> Matcher<'c, 'a> {
    fn new(ctx: Option<&'c TypeContext<'a>>) -> Self {
        Self {
            ctx,
            settling: Vec::new(),
        }
    }

    /// Follows environment bindings until an unbound variable or a concrete
    /// type is reached, noting every variable passed through. `None` means a
    /// binding leads back to a variable already being settled.
    fn settle<'t>(
        &self,
        ty: &'t TypeDescriptor,
        passed: &mut Vec<String>,
    ) -> Option<Cow<'t, TypeDescriptor>> {
        let Some(ctx) = self.ctx else {
            return Some(Cow::Borrowed(ty));
        };
        let mut current = Cow::Borrowed(ty);
        while let Some(name) = current.type_var_name() {
            let Some(bound) = ctx.env.lookup(name) else {
                break;
            };
            if self.settling.iter().chain(passed.iter()).any(|open| open == name) {
                trace!(var = name, "type variable is bound to itself");
                return None;
            }
            passed.push(name.to_string());
            current = Cow::Owned(bound.clone());
        }
        Some(current)
    }

    fn eq(
        &mut self,
        l: &TypeDescriptor,
        r: &TypeDescriptor,
        result: &mut TypeCheckResult,
    ) -> bool {
        match (&l.kind, &r.kind) {
            (TypeKind::TaggedUnion { name: a, .. }, TypeKind::Nominal { name: b, .. })
            | (TypeKind::Nominal { name: a, .. }, TypeKind::TaggedUnion { name: b, .. })
                if a == b =>
            {
                return result.success();
            }
            _ => {}
        }

        if l.type_var_name().is_some() || r.type_var_name().is_some() {
            return self.eq_type_vars(l, r, result);
        }

        let (l_named, r_named) = (l.named(), r.named());
        if let (Some((l_name, l_args)), Some((r_name, r_args))) = (l_named, r_named) {
            return if l_name == r_name {
                self.eq_same_name(l_name, l_args, r_args, result)
            } else {
                self.eq_trait(l_name, r_name, result)
            };
        }

        if mem::discriminant(&l.kind) != mem::discriminant(&r.kind) {
            return result.failure();
        }

        match (&l.kind, &r.kind) {
            (TypeKind::Pointer(lt), TypeKind::Pointer(rt)) => {
                if matches!(lt.kind, TypeKind::Void) || matches!(rt.kind, TypeKind::Void) {
                    result.success()
                } else {
                    self.eq(lt, rt, result)
                }
            }
            (
                TypeKind::Array {
                    element: le,
                    len: ll,
                },
                TypeKind::Array {
                    element: re,
                    len: rl,
                },
            ) => {
                if ll != rl {
                    return result.failure();
                }
                self.eq(le, re, result)
            }
            (TypeKind::Tuple(lm), TypeKind::Tuple(rm)) => self.eq_list(lm, rm, result),
            (
                TypeKind::Function {
                    params: lp,
                    ret: lr,
                },
                TypeKind::Function {
                    params: rp,
                    ret: rr,
                },
            )
            | (
                TypeKind::MetaFunction {
                    params: lp,
                    ret: lr,
                },
                TypeKind::MetaFunction {
                    params: rp,
                    ret: rr,
                },
            ) => {
                if lp.len() != rp.len() {
                    return result.failure();
                }
                self.eq(lr, rr, result) && self.eq_list(lp, rp, result)
            }
            // Primitive widths and signedness are part of the tag.
            (lk, rk) => result.success_if(lk == rk),
        }
    }

    fn eq_list(
        &mut self,
        ls: &[TypeDescriptor],
        rs: &[TypeDescriptor],
        result: &mut TypeCheckResult,
    ) -> bool {
        if ls.len() != rs.len() {
            return result.failure();
        }
        ls.iter().zip(rs).all(|(l, r)| self.eq(l, r, result))
    }

    fn eq_type_vars(
        &mut self,
        l: &TypeDescriptor,
        r: &TypeDescriptor,
        result: &mut TypeCheckResult,
    ) -> bool {
        let (mut l_passed, mut r_passed) = (Vec::new(), Vec::new());
        let (Some(l), Some(r)) = (
            self.settle(l, &mut l_passed),
            self.settle(r, &mut r_passed),
        ) else {
            return result.failure();
        };
        let depth = self.settling.len();
        self.settling.extend(l_passed);
        self.settling.extend(r_passed);
        let matched = match (l.type_var_name(), r.type_var_name()) {
            // Distinct unbound variables are never unified with each other.
            (Some(ln), Some(rn)) => result.success_if(ln == rn),
            (Some(name), None) => self.bind(name, &r, false, result),
            (None, Some(name)) => self.bind(name, &l, true, result),
            (None, None) => self.eq(&l, &r, result),
        };
        self.settling.truncate(depth);
        matched
    }

    /// Matches the unbound variable `name` against `concrete`, reusing a
    /// binding already discovered in this query. `var_on_right` keeps the
    /// original operand order for the recursive comparison.
    fn bind(
        &mut self,
        name: &str,
        concrete: &TypeDescriptor,
        var_on_right: bool,
        result: &mut TypeCheckResult,
    ) -> bool {
        if let Some(previous) = result.binding_for(name).cloned() {
            return if var_on_right {
                self.eq(concrete, &previous, result)
            } else {
                self.eq(&previous, concrete, result)
            };
        }
        trace!(var = name, bound = %concrete, "discovered type variable binding");
        result
            .bindings
            .push((name.to_string(), concrete.clone()));
        result.success_with_type_vars()
    }

    fn eq_same_name(
        &mut self,
        name: &str,
        l_args: &[TypeDescriptor],
        r_args: &[TypeDescriptor],
        result: &mut TypeCheckResult,
    ) -> bool {
        if l_args.is_empty() && r_args.is_empty() {
            return result.success();
        }
        if l_args.len() == r_args.len() {
            return l_args
                .iter()
                .zip(r_args)
                .all(|(l, r)| self.eq(l, r, result));
        }
        let Some(ctx) = self.ctx else {
            return result.success();
        };
        // One side is partially applied: compare the expanded structures.
        let Some(decl) = ctx.registry.lookup_type(name) else {
            return result.failure();
        };
        let l_expanded = decl.instantiate(l_args);
        let r_expanded = decl.instantiate(r_args);
        self.eq(&l_expanded, &r_expanded, result)
    }

    fn eq_trait(&self, l_name: &str, r_name: &str, result: &mut TypeCheckResult) -> bool {
        let Some(ctx) = self.ctx else {
            return result.failure();
        };
        let registry = ctx.registry;
        result.success_if(
            registry.implements(l_name, r_name) || registry.implements(r_name, l_name),
        )
    }
}
