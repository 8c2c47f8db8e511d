use crate::language::{
    decls::{Environment, TypeRegistry},
    span::Span,
    types::{Bindings, TypeDescriptor, TypeKind},
};
use crate::target::BuildTarget;
use thiserror::Error;

mod equality;
mod numeric;
mod size;
mod validate;

pub use equality::{type_eq, type_eq_all, type_eq_base};
pub use numeric::{
    coerce_argument, promote, widen, widening, ConstFolder, Constant, Conversion, NumericKind,
    TypedValue, ValueBuilder,
};
pub use size::{largest_variant, size_in_bits};
pub use validate::validate;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeErrorKind {
    #[error("undeclared type `{name}`")]
    UndeclaredType { name: String },
    #[error("`{name}` expects {expected} generic argument(s), found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("recursive type `{name}` contains itself without indirection")]
    RecursiveType { name: String },
    #[error("type variable `{name}` is not bound")]
    UnboundTypeVariable { name: String },
    #[error("type `{name}` is still being defined and has no known size")]
    IncompleteType { name: String },
    #[error("type variable `{name}` is unresolved")]
    UnresolvedTypeVariable { name: String },
    #[error("no implicit conversion from `{from}` to `{to}`")]
    NoImplicitConversion { from: String, to: String },
    #[error("expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl TypeErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            TypeErrorKind::UndeclaredType { .. } => "E0301",
            TypeErrorKind::ArityMismatch { .. } => "E0302",
            TypeErrorKind::RecursiveType { .. } => "E0303",
            TypeErrorKind::UnboundTypeVariable { .. } => "E0304",
            TypeErrorKind::IncompleteType { .. } => "E0305",
            TypeErrorKind::UnresolvedTypeVariable { .. } => "E0306",
            TypeErrorKind::NoImplicitConversion { .. } => "E0307",
            TypeErrorKind::TypeMismatch { .. } => "E0308",
            TypeErrorKind::Backend { .. } => "E0309",
        }
    }

    /// Errors that abort the enclosing declaration.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TypeErrorKind::IncompleteType { .. } | TypeErrorKind::UnresolvedTypeVariable { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
    pub help: Option<String>,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind) -> Self {
        Self {
            kind,
            span: Span::default(),
            help: None,
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn display_message(&self) -> String {
        format!("[{}] {}", self.code(), self.kind)
    }
}

pub type TypeResult<T> = Result<T, TypeError>;

#[derive(Clone, Debug, Default)]
pub struct TypecheckOptions {
    pub target: BuildTarget,
}

/// Read-only view of everything a type query may consult.
#[derive(Clone, Copy, Debug)]
pub struct TypeContext<'a> {
    pub registry: &'a TypeRegistry,
    pub env: &'a Environment,
    pub options: &'a TypecheckOptions,
}

impl<'a> TypeContext<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        env: &'a Environment,
        options: &'a TypecheckOptions,
    ) -> Self {
        Self {
            registry,
            env,
            options,
        }
    }

    pub fn pointer_bits(&self) -> u32 {
        self.options.target.pointer_width_bits()
    }

    /// Copy of `ty` with every environment-bound type variable replaced by
    /// its binding. Bindings are followed until an unbound variable or a
    /// concrete type is reached; a variable whose binding mentions itself is
    /// `UnresolvedTypeVariable`.
    pub fn resolve_bound_type_vars(&self, ty: &TypeDescriptor) -> TypeResult<TypeDescriptor> {
        let mut resolved = ty.clone();
        self.resolve_in_place(&mut resolved, &mut Vec::new())?;
        Ok(resolved)
    }

    fn resolve_in_place(
        &self,
        ty: &mut TypeDescriptor,
        path: &mut Vec<String>,
    ) -> TypeResult<()> {
        match &mut ty.kind {
            TypeKind::TypeVariable(name) => {
                if path.iter().any(|open| open == name) {
                    return Err(TypeError::new(TypeErrorKind::UnresolvedTypeVariable {
                        name: name.clone(),
                    })
                    .at(ty.span)
                    .with_help("the variable is bound to itself"));
                }
                let Some(bound) = self.env.lookup(name) else {
                    return Ok(());
                };
                path.push(name.clone());
                ty.kind = bound.kind.clone();
                let outcome = self.resolve_in_place(ty, path);
                path.pop();
                outcome
            }
            TypeKind::Pointer(target) => self.resolve_in_place(target, path),
            TypeKind::Array { element, .. } => self.resolve_in_place(element, path),
            TypeKind::Tuple(members) => members
                .iter_mut()
                .try_for_each(|member| self.resolve_in_place(member, path)),
            TypeKind::Function { params, ret } | TypeKind::MetaFunction { params, ret } => {
                self.resolve_in_place(ret, path)?;
                params
                    .iter_mut()
                    .try_for_each(|param| self.resolve_in_place(param, path))
            }
            TypeKind::Nominal { args, .. } | TypeKind::TaggedUnion { args, .. } => args
                .iter_mut()
                .try_for_each(|arg| self.resolve_in_place(arg, path)),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeCheck {
    Success,
    SuccessWithTypeVars,
    Failure,
}

/// Accumulator threaded through one equality query.
#[derive(Clone, Debug)]
pub struct TypeCheckResult {
    pub outcome: TypeCheck,
    pub bindings: Bindings,
    /// Successful sub-comparisons, used to rank overload candidates.
    pub matches: u32,
}

impl Default for TypeCheckResult {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCheckResult {
    pub fn new() -> Self {
        Self {
            outcome: TypeCheck::Success,
            bindings: Vec::new(),
            matches: 0,
        }
    }

    /// Counts a successful sub-comparison. A recorded failure is sticky.
    pub fn success(&mut self) -> bool {
        if self.outcome != TypeCheck::Failure {
            self.matches += 1;
            true
        } else {
            false
        }
    }

    pub fn success_with_type_vars(&mut self) -> bool {
        if self.outcome != TypeCheck::Failure {
            self.outcome = TypeCheck::SuccessWithTypeVars;
            true
        } else {
            false
        }
    }

    pub fn failure(&mut self) -> bool {
        self.outcome = TypeCheck::Failure;
        false
    }

    pub fn success_if(&mut self, cond: bool) -> bool {
        if cond {
            self.success()
        } else {
            self.failure()
        }
    }

    pub fn failed(&self) -> bool {
        self.outcome == TypeCheck::Failure
    }

    pub fn succeeded(&self) -> bool {
        !self.failed()
    }

    pub fn binding_for(&self, name: &str) -> Option<&TypeDescriptor> {
        self.bindings
            .iter()
            .find(|(var, _)| var == name)
            .map(|(_, ty)| ty)
    }
}
