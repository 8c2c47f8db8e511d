use crate::language::{
    span::Span,
    typecheck::{TypeError, TypeErrorKind, TypeResult},
    types::{ordered_bindings, TypeDescriptor},
};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataShape {
    /// Members laid out one after another.
    Record,
    /// Members share storage; only one is live at a time.
    Union,
}

/// A declared nominal data type. `definition` is always a `Tuple` holding the
/// record fields or the union variants.
#[derive(Clone, Debug)]
pub struct DataTypeDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub definition: TypeDescriptor,
    pub shape: DataShape,
    pub traits: BTreeSet<String>,
    pub span: Span,
}

impl DataTypeDecl {
    pub fn record(
        name: impl Into<String>,
        generics: Vec<String>,
        fields: Vec<TypeDescriptor>,
    ) -> Self {
        Self::with_shape(name, generics, fields, DataShape::Record)
    }

    pub fn union(
        name: impl Into<String>,
        generics: Vec<String>,
        variants: Vec<TypeDescriptor>,
    ) -> Self {
        Self::with_shape(name, generics, variants, DataShape::Union)
    }

    fn with_shape(
        name: impl Into<String>,
        generics: Vec<String>,
        members: Vec<TypeDescriptor>,
        shape: DataShape,
    ) -> Self {
        Self {
            name: name.into(),
            generics,
            definition: TypeDescriptor::tuple(members),
            shape,
            traits: BTreeSet::new(),
            span: Span::default(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_union(&self) -> bool {
        self.shape == DataShape::Union
    }

    /// Copy of the definition with `args` bound positionally to the declared
    /// generics. The declaration itself is never touched.
    pub fn instantiate(&self, args: &[TypeDescriptor]) -> TypeDescriptor {
        self.definition
            .substitute(&ordered_bindings(&self.generics, args))
    }

    /// Reference to this type as it would be written in its own body.
    pub fn self_reference(&self) -> TypeDescriptor {
        let args = self
            .generics
            .iter()
            .map(|name| TypeDescriptor::type_var(name.clone()))
            .collect();
        if self.is_union() {
            TypeDescriptor::tagged_union(self.name.clone(), args)
        } else {
            TypeDescriptor::nominal(self.name.clone(), args)
        }
    }
}

#[derive(Clone, Debug)]
pub struct TraitDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub implementors: BTreeSet<String>,
}

impl TraitDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generics: Vec::new(),
            implementors: BTreeSet::new(),
        }
    }
}

/// The declaration a descriptor is validated against: either a data type or
/// a trait instance.
#[derive(Clone, Copy, Debug)]
pub struct DeclOwner<'a> {
    pub name: &'a str,
    pub generics: &'a [String],
}

impl<'a> From<&'a DataTypeDecl> for DeclOwner<'a> {
    fn from(decl: &'a DataTypeDecl) -> Self {
        Self {
            name: &decl.name,
            generics: &decl.generics,
        }
    }
}

impl<'a> From<&'a TraitDecl> for DeclOwner<'a> {
    fn from(decl: &'a TraitDecl) -> Self {
        Self {
            name: &decl.name,
            generics: &decl.generics,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, DataTypeDecl>,
    traits: HashMap<String, TraitDecl>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a data type, replacing any previous declaration of that name.
    /// Traits listed on the declaration are registered as implemented.
    pub fn declare_type(&mut self, decl: DataTypeDecl) {
        for trait_name in &decl.traits {
            self.traits
                .entry(trait_name.clone())
                .or_insert_with(|| TraitDecl::new(trait_name.clone()))
                .implementors
                .insert(decl.name.clone());
        }
        self.types.insert(decl.name.clone(), decl);
    }

    pub fn declare_trait(&mut self, decl: TraitDecl) {
        match self.traits.get_mut(&decl.name) {
            Some(existing) => {
                existing.generics = decl.generics;
                existing.implementors.extend(decl.implementors);
            }
            None => {
                self.traits.insert(decl.name.clone(), decl);
            }
        }
    }

    /// Records that `type_name` implements `trait_name`. Both must already be
    /// declared.
    pub fn implement(&mut self, trait_name: &str, type_name: &str) -> TypeResult<()> {
        let Some(data) = self.types.get_mut(type_name) else {
            return Err(TypeError::new(TypeErrorKind::UndeclaredType {
                name: type_name.to_string(),
            }));
        };
        let Some(trait_decl) = self.traits.get_mut(trait_name) else {
            return Err(TypeError::new(TypeErrorKind::UndeclaredType {
                name: trait_name.to_string(),
            })
            .with_help("declare the trait before implementing it"));
        };
        trait_decl.implementors.insert(type_name.to_string());
        data.traits.insert(trait_name.to_string());
        Ok(())
    }

    pub fn lookup_type(&self, name: &str) -> Option<&DataTypeDecl> {
        self.types.get(name)
    }

    pub fn lookup_trait(&self, name: &str) -> Option<&TraitDecl> {
        self.traits.get(name)
    }

    pub fn implements(&self, trait_name: &str, type_name: &str) -> bool {
        self.traits
            .get(trait_name)
            .map(|decl| decl.implementors.contains(type_name))
            .unwrap_or(false)
    }

    pub fn require_type(&self, name: &str, span: Span) -> TypeResult<&DataTypeDecl> {
        self.lookup_type(name).ok_or_else(|| {
            TypeError::new(TypeErrorKind::UndeclaredType {
                name: name.to_string(),
            })
            .at(span)
        })
    }
}

/// Scope stack of bound variables and type variables.
#[derive(Clone, Debug)]
pub struct Environment {
    scopes: Vec<HashMap<String, TypeDescriptor>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pops the innermost scope. The outermost scope is never removed.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: TypeDescriptor) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), ty);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeDescriptor> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty);
            }
        }
        None
    }
}
