use crate::language::{
    decls::DataTypeDecl,
    typecheck::{largest_variant, TypeContext, TypeError, TypeErrorKind, TypeResult},
    types::{CharWidth, TypeDescriptor, TypeKind},
};
use std::{collections::HashMap, fmt};
use tracing::{debug, trace};

#[cfg(feature = "llvm")]
pub mod llvm;
pub mod shape;

pub use shape::{Shape, ShapeBuilder, ShapeId};

/// Backend capability for constructing type representations.
///
/// Anonymous types may be uniqued by the backend. Named structs are created
/// opaque and receive their body later, which lets a struct refer to itself
/// through a pointer while its members are still being lowered.
pub trait TypeBuilder {
    type Type: Clone + PartialEq + fmt::Debug;

    fn int_type(&mut self, bits: u32) -> TypeResult<Self::Type>;
    fn float_type(&mut self, bits: u32) -> TypeResult<Self::Type>;
    fn void_type(&mut self) -> TypeResult<Self::Type>;
    fn pointer_type(&mut self, pointee: &Self::Type) -> TypeResult<Self::Type>;
    fn array_type(&mut self, element: &Self::Type, len: u64) -> TypeResult<Self::Type>;
    fn struct_type(&mut self, fields: &[Self::Type], packed: bool) -> TypeResult<Self::Type>;
    fn function_type(&mut self, params: &[Self::Type], ret: &Self::Type)
        -> TypeResult<Self::Type>;
    fn opaque_struct(&mut self, name: &str, packed: bool) -> TypeResult<Self::Type>;
    fn set_struct_body(
        &mut self,
        opaque: &Self::Type,
        fields: &[Self::Type],
        packed: bool,
    ) -> TypeResult<()>;
}

pub(crate) fn backend_error(message: impl Into<String>) -> TypeError {
    TypeError::new(TypeErrorKind::Backend {
        message: message.into(),
    })
}

/// Lowers descriptors through a [`TypeBuilder`], producing one backend type
/// per distinct instantiation of every data type.
pub struct TypeLowerer<B: TypeBuilder> {
    builder: B,
    /// Declaration name -> instantiation key -> backend type.
    cache: HashMap<String, HashMap<String, B::Type>>,
    /// Cache entries added since the outermost unfinished lowering began.
    pending: Vec<(String, String)>,
}

impl<B: TypeBuilder> TypeLowerer<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            cache: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut B {
        &mut self.builder
    }

    pub fn into_builder(self) -> B {
        self.builder
    }

    pub fn cached(&self, decl: &str, key: &str) -> Option<&B::Type> {
        self.cache.get(decl).and_then(|entries| entries.get(key))
    }

    pub fn instantiation_count(&self, decl: &str) -> usize {
        self.cache.get(decl).map_or(0, HashMap::len)
    }

    pub fn lower(&mut self, ctx: &TypeContext<'_>, ty: &TypeDescriptor) -> TypeResult<B::Type> {
        let pointer_bits = ctx.pointer_bits();
        match &ty.kind {
            TypeKind::Int { width, .. } => self.builder.int_type(width.bits(pointer_bits)),
            TypeKind::Float(width) => self.builder.float_type(width.bits()),
            TypeKind::Bool => self.builder.int_type(1),
            TypeKind::Char(CharWidth::W8) => self.builder.int_type(8),
            TypeKind::Char(CharWidth::W32) => self.builder.int_type(32),
            TypeKind::Void => self.builder.void_type(),
            TypeKind::TypeValue => self.builder.struct_type(&[], false),
            TypeKind::Pointer(target) => {
                let pointee = if matches!(target.kind, TypeKind::Void) {
                    self.builder.int_type(8)?
                } else {
                    self.lower(ctx, target)?
                };
                self.builder.pointer_type(&pointee)
            }
            TypeKind::Array { element, len } => {
                let element = self.lower(ctx, element)?;
                self.builder.array_type(&element, *len)
            }
            TypeKind::Tuple(members) => {
                let fields = self.lower_all(ctx, members)?;
                self.builder.struct_type(&fields, false)
            }
            TypeKind::Function { params, ret } | TypeKind::MetaFunction { params, ret } => {
                let params = self.lower_all(ctx, params)?;
                let ret = self.lower(ctx, ret)?;
                let function = self.builder.function_type(&params, &ret)?;
                self.builder.pointer_type(&function)
            }
            TypeKind::TypeVariable(name) => {
                let resolved = ctx.resolve_bound_type_vars(ty)?;
                if resolved.type_var_name().is_some() {
                    return Err(TypeError::new(TypeErrorKind::UnresolvedTypeVariable {
                        name: name.clone(),
                    })
                    .at(ty.span));
                }
                self.lower(ctx, &resolved)
            }
            TypeKind::Nominal { name, args } | TypeKind::TaggedUnion { name, args } => {
                self.lower_named(ctx, ty, name, args)
            }
        }
    }

    fn lower_all(
        &mut self,
        ctx: &TypeContext<'_>,
        members: &[TypeDescriptor],
    ) -> TypeResult<Vec<B::Type>> {
        members.iter().map(|member| self.lower(ctx, member)).collect()
    }

    fn lower_named(
        &mut self,
        ctx: &TypeContext<'_>,
        ty: &TypeDescriptor,
        name: &str,
        args: &[TypeDescriptor],
    ) -> TypeResult<B::Type> {
        let decl = ctx.registry.require_type(name, ty.span)?;
        if decl.generics.len() != args.len() {
            return Err(TypeError::new(TypeErrorKind::ArityMismatch {
                name: name.to_string(),
                expected: decl.generics.len(),
                found: args.len(),
            })
            .at(ty.span));
        }
        let args: Vec<TypeDescriptor> = args
            .iter()
            .map(|arg| ctx.resolve_bound_type_vars(arg))
            .collect::<TypeResult<_>>()?;
        let key = TypeDescriptor::nominal(name, args.clone()).to_string();
        if let Some(cached) = self.cached(name, &key) {
            trace!(key = %key, "monomorphization cache hit");
            return Ok(cached.clone());
        }

        debug!(key = %key, union = decl.is_union(), "lowering new instantiation");
        let packed = decl.is_union();
        let placeholder = self.builder.opaque_struct(&key, packed)?;
        let mark = self.pending.len();
        self.cache
            .entry(name.to_string())
            .or_default()
            .insert(key.clone(), placeholder.clone());
        self.pending.push((name.to_string(), key.clone()));

        let finished = self
            .lower_body(ctx, decl, &args)
            .and_then(|fields| self.builder.set_struct_body(&placeholder, &fields, packed));
        if let Err(err) = finished {
            // Instantiations finished after this placeholder may point at it,
            // so they are dropped with it.
            let stale: Vec<_> = self.pending.drain(mark..).collect();
            debug!(
                key = %key,
                code = err.code(),
                dropped = stale.len(),
                "rolling back lowering"
            );
            for (decl_name, stale_key) in stale {
                if let Some(entries) = self.cache.get_mut(&decl_name) {
                    entries.remove(&stale_key);
                }
            }
            return Err(err);
        }
        if mark == 0 {
            self.pending.clear();
        }
        trace!(key = %key, "placeholder finalized");
        Ok(placeholder)
    }

    fn lower_body(
        &mut self,
        ctx: &TypeContext<'_>,
        decl: &DataTypeDecl,
        args: &[TypeDescriptor],
    ) -> TypeResult<Vec<B::Type>> {
        let expanded = decl.instantiate(args);
        let members = match &expanded.kind {
            TypeKind::Tuple(members) => members.as_slice(),
            _ => std::slice::from_ref(&expanded),
        };
        if !decl.is_union() {
            return self.lower_all(ctx, members);
        }
        // Variants share storage, so the body is the largest one alone.
        match largest_variant(ctx, members, Some(&decl.name))? {
            Some((variant, _)) => Ok(vec![self.lower(ctx, variant)?]),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests;
