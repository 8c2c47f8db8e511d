use crate::language::span::Span;
use std::fmt;

/// Generic bindings keyed by type-variable name, in discovery order.
pub type Bindings = Vec<(String, TypeDescriptor)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    /// Machine word (`isz`/`usz`).
    Size,
}

impl IntWidth {
    pub fn bits(self, pointer_bits: u32) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
            IntWidth::Size => pointer_bits,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    W16,
    W32,
    W64,
}

impl FloatWidth {
    pub fn bits(self) -> u32 {
        match self {
            FloatWidth::W16 => 16,
            FloatWidth::W32 => 32,
            FloatWidth::W64 => 64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CharWidth {
    W8,
    W32,
}

impl CharWidth {
    pub fn bits(self) -> u32 {
        match self {
            CharWidth::W8 => 8,
            CharWidth::W32 => 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Int { width: IntWidth, signed: bool },
    Float(FloatWidth),
    Bool,
    Char(CharWidth),
    Void,
    Pointer(Box<TypeDescriptor>),
    Array { element: Box<TypeDescriptor>, len: u64 },
    Tuple(Vec<TypeDescriptor>),
    Function { params: Vec<TypeDescriptor>, ret: Box<TypeDescriptor> },
    /// Compile-time function, same shape as `Function`.
    MetaFunction { params: Vec<TypeDescriptor>, ret: Box<TypeDescriptor> },
    Nominal { name: String, args: Vec<TypeDescriptor> },
    TaggedUnion { name: String, args: Vec<TypeDescriptor> },
    TypeVariable(String),
    /// A type used as a compile-time value.
    TypeValue,
}

/// One node of a type tree. Children are owned outright; the span only
/// feeds diagnostics and never takes part in equality.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub span: Span,
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for TypeDescriptor {}

impl From<TypeKind> for TypeDescriptor {
    fn from(kind: TypeKind) -> Self {
        TypeDescriptor::new(kind)
    }
}

impl TypeDescriptor {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn int(width: IntWidth, signed: bool) -> Self {
        Self::new(TypeKind::Int { width, signed })
    }

    pub fn float(width: FloatWidth) -> Self {
        Self::new(TypeKind::Float(width))
    }

    pub fn bool() -> Self {
        Self::new(TypeKind::Bool)
    }

    pub fn char(width: CharWidth) -> Self {
        Self::new(TypeKind::Char(width))
    }

    pub fn void() -> Self {
        Self::new(TypeKind::Void)
    }

    pub fn type_value() -> Self {
        Self::new(TypeKind::TypeValue)
    }

    pub fn pointer(target: TypeDescriptor) -> Self {
        Self::new(TypeKind::Pointer(Box::new(target)))
    }

    pub fn array(element: TypeDescriptor, len: u64) -> Self {
        Self::new(TypeKind::Array {
            element: Box::new(element),
            len,
        })
    }

    pub fn tuple(members: Vec<TypeDescriptor>) -> Self {
        Self::new(TypeKind::Tuple(members))
    }

    pub fn function(params: Vec<TypeDescriptor>, ret: TypeDescriptor) -> Self {
        Self::new(TypeKind::Function {
            params,
            ret: Box::new(ret),
        })
    }

    pub fn meta_function(params: Vec<TypeDescriptor>, ret: TypeDescriptor) -> Self {
        Self::new(TypeKind::MetaFunction {
            params,
            ret: Box::new(ret),
        })
    }

    pub fn nominal(name: impl Into<String>, args: Vec<TypeDescriptor>) -> Self {
        Self::new(TypeKind::Nominal {
            name: name.into(),
            args,
        })
    }

    pub fn tagged_union(name: impl Into<String>, args: Vec<TypeDescriptor>) -> Self {
        Self::new(TypeKind::TaggedUnion {
            name: name.into(),
            args,
        })
    }

    pub fn type_var(name: impl Into<String>) -> Self {
        Self::new(TypeKind::TypeVariable(name.into()))
    }

    /// Name and generic arguments of a `Nominal` or `TaggedUnion` reference.
    pub fn named(&self) -> Option<(&str, &[TypeDescriptor])> {
        match &self.kind {
            TypeKind::Nominal { name, args } | TypeKind::TaggedUnion { name, args } => {
                Some((name, args))
            }
            _ => None,
        }
    }

    pub fn type_var_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::TypeVariable(name) => Some(name),
            _ => None,
        }
    }

    /// Replaces every type variable named in `bindings` with a copy of its
    /// bound type. Variables missing from `bindings` are left alone since
    /// they may belong to an enclosing generic scope.
    pub fn bind_generics(&mut self, bindings: &[(String, TypeDescriptor)]) {
        if bindings.is_empty() {
            return;
        }
        match &mut self.kind {
            TypeKind::TypeVariable(name) => {
                if let Some((_, bound)) = bindings.iter().find(|(var, _)| var == name) {
                    self.kind = bound.kind.clone();
                }
            }
            TypeKind::Pointer(target) => target.bind_generics(bindings),
            TypeKind::Array { element, .. } => element.bind_generics(bindings),
            TypeKind::Tuple(members) => {
                for member in members {
                    member.bind_generics(bindings);
                }
            }
            TypeKind::Function { params, ret } | TypeKind::MetaFunction { params, ret } => {
                ret.bind_generics(bindings);
                for param in params {
                    param.bind_generics(bindings);
                }
            }
            TypeKind::Nominal { args, .. } | TypeKind::TaggedUnion { args, .. } => {
                for arg in args {
                    arg.bind_generics(bindings);
                }
            }
            TypeKind::Int { .. }
            | TypeKind::Float(_)
            | TypeKind::Bool
            | TypeKind::Char(_)
            | TypeKind::Void
            | TypeKind::TypeValue => {}
        }
    }

    /// Binds positional arguments against a declaration's generic parameter
    /// order. Extra parameters without an argument stay unbound.
    pub fn bind_ordered(&mut self, generics: &[String], args: &[TypeDescriptor]) {
        self.bind_generics(&ordered_bindings(generics, args));
    }

    pub fn substitute(&self, bindings: &[(String, TypeDescriptor)]) -> TypeDescriptor {
        let mut copy = self.clone();
        copy.bind_generics(bindings);
        copy
    }

    pub fn contains_type_var(&self) -> bool {
        match &self.kind {
            TypeKind::TypeVariable(_) => true,
            TypeKind::Pointer(target) => target.contains_type_var(),
            TypeKind::Array { element, .. } => element.contains_type_var(),
            TypeKind::Tuple(members) => members.iter().any(TypeDescriptor::contains_type_var),
            TypeKind::Function { params, ret } | TypeKind::MetaFunction { params, ret } => {
                ret.contains_type_var() || params.iter().any(TypeDescriptor::contains_type_var)
            }
            TypeKind::Nominal { args, .. } | TypeKind::TaggedUnion { args, .. } => {
                args.iter().any(TypeDescriptor::contains_type_var)
            }
            _ => false,
        }
    }

    pub fn tag_name(&self) -> &'static str {
        match &self.kind {
            TypeKind::Int { .. } => "Int",
            TypeKind::Float(_) => "Float",
            TypeKind::Bool => "Bool",
            TypeKind::Char(_) => "Char",
            TypeKind::Void => "Void",
            TypeKind::Pointer(_) => "Ptr",
            TypeKind::Array { .. } => "Array",
            TypeKind::Tuple(_) => "Tuple",
            TypeKind::Function { .. } => "Function",
            TypeKind::MetaFunction { .. } => "Meta Function",
            TypeKind::Nominal { .. } => "Data",
            TypeKind::TaggedUnion { .. } => "|",
            TypeKind::TypeVariable(_) => "'t",
            TypeKind::TypeValue => "type",
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Int { .. }
                | TypeKind::Float(_)
                | TypeKind::Bool
                | TypeKind::Char(_)
                | TypeKind::Void
        )
    }

    /// Integers and `c8` characters.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Int { .. } | TypeKind::Char(CharWidth::W8)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, TypeKind::Float(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Int { signed: false, .. } | TypeKind::Char(CharWidth::W8)
        )
    }

    /// Fixed width of a primitive, `None` for everything else.
    pub fn bit_width(&self, pointer_bits: u32) -> Option<u32> {
        match self.kind {
            TypeKind::Int { width, .. } => Some(width.bits(pointer_bits)),
            TypeKind::Float(width) => Some(width.bits()),
            TypeKind::Char(width) => Some(width.bits()),
            TypeKind::Bool => Some(1),
            TypeKind::Void => Some(0),
            _ => None,
        }
    }
}

/// Converts positional generic arguments into the name-keyed form.
pub fn ordered_bindings(generics: &[String], args: &[TypeDescriptor]) -> Bindings {
    generics
        .iter()
        .zip(args.iter())
        .map(|(name, arg)| (name.clone(), arg.clone()))
        .collect()
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeDescriptor]) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Int { width, signed } => {
                let prefix = if *signed { 'i' } else { 'u' };
                match width {
                    IntWidth::Size => write!(f, "{prefix}sz"),
                    other => write!(f, "{prefix}{}", other.bits(0)),
                }
            }
            TypeKind::Float(width) => write!(f, "f{}", width.bits()),
            TypeKind::Char(width) => write!(f, "c{}", width.bits()),
            TypeKind::Bool => f.write_str("bool"),
            TypeKind::Void => f.write_str("void"),
            TypeKind::TypeValue => f.write_str("type"),
            TypeKind::Pointer(target) => write!(f, "{target}*"),
            TypeKind::Array { element, len } => write!(f, "[{len} {element}]"),
            TypeKind::Tuple(members) => {
                f.write_str("(")?;
                write_list(f, members)?;
                f.write_str(")")
            }
            TypeKind::Function { params, ret } => {
                f.write_str("(")?;
                write_list(f, params)?;
                write!(f, ")->{ret}")
            }
            TypeKind::MetaFunction { params, ret } => {
                f.write_str("meta (")?;
                write_list(f, params)?;
                write!(f, ")->{ret}")
            }
            TypeKind::Nominal { name, args } | TypeKind::TaggedUnion { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    write_list(f, args)?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeKind::TypeVariable(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_ty() -> TypeDescriptor {
        TypeDescriptor::int(IntWidth::W32, true)
    }

    fn pair_of_vars() -> TypeDescriptor {
        TypeDescriptor::tuple(vec![
            TypeDescriptor::type_var("'a"),
            TypeDescriptor::pointer(TypeDescriptor::type_var("'b")),
        ])
    }

    #[test]
    fn canonical_strings_cover_composites() {
        let ty = TypeDescriptor::function(
            vec![
                TypeDescriptor::array(TypeDescriptor::char(CharWidth::W8), 4),
                TypeDescriptor::nominal("Map", vec![i32_ty(), TypeDescriptor::type_var("'v")]),
            ],
            TypeDescriptor::pointer(TypeDescriptor::int(IntWidth::Size, false)),
        );
        assert_eq!(ty.to_string(), "([4 c8], Map<i32, 'v>)->usz*");
        assert_eq!(TypeDescriptor::tuple(Vec::new()).to_string(), "()");
        assert_eq!(
            TypeDescriptor::meta_function(vec![TypeDescriptor::type_value()], TypeDescriptor::void())
                .to_string(),
            "meta (type)->void"
        );
    }

    #[test]
    fn substitution_replaces_only_named_vars() {
        let bindings = vec![("'a".to_string(), i32_ty())];
        let bound = pair_of_vars().substitute(&bindings);
        assert_eq!(bound.to_string(), "(i32, 'b*)");
        assert!(bound.contains_type_var());
    }

    #[test]
    fn substitution_leaves_source_untouched() {
        let original = pair_of_vars();
        let bindings = vec![
            ("'a".to_string(), i32_ty()),
            ("'b".to_string(), TypeDescriptor::bool()),
        ];
        let bound = original.substitute(&bindings);
        assert_eq!(original.to_string(), "('a, 'b*)");
        assert_eq!(bound.to_string(), "(i32, bool*)");
        assert!(!bound.contains_type_var());
    }

    #[test]
    fn substitution_recurses_into_generic_arguments() {
        let mut ty = TypeDescriptor::nominal(
            "List",
            vec![TypeDescriptor::nominal("Box", vec![TypeDescriptor::type_var("'t")])],
        );
        ty.bind_generics(&[("'t".to_string(), TypeDescriptor::float(FloatWidth::W64))]);
        assert_eq!(ty.to_string(), "List<Box<f64>>");
    }

    #[test]
    fn ordered_bindings_follow_declaration_order() {
        let generics = vec!["'k".to_string(), "'v".to_string()];
        let mut ty = TypeDescriptor::tuple(vec![
            TypeDescriptor::type_var("'v"),
            TypeDescriptor::type_var("'k"),
        ]);
        ty.bind_ordered(&generics, &[TypeDescriptor::bool(), i32_ty()]);
        assert_eq!(ty.to_string(), "(i32, bool)");
    }

    #[test]
    fn partial_ordered_bindings_leave_remaining_vars() {
        let generics = vec!["'k".to_string(), "'v".to_string()];
        let mut ty = TypeDescriptor::tuple(vec![
            TypeDescriptor::type_var("'k"),
            TypeDescriptor::type_var("'v"),
        ]);
        ty.bind_ordered(&generics, &[TypeDescriptor::bool()]);
        assert_eq!(ty.to_string(), "(bool, 'v)");
    }

    #[test]
    fn equality_ignores_spans() {
        let left = i32_ty().with_span(Span::new(0, 3));
        let right = i32_ty().with_span(Span::new(10, 13));
        assert_eq!(left, right);
    }

    #[test]
    fn primitive_predicates_match_width_table() {
        let c8 = TypeDescriptor::char(CharWidth::W8);
        let c32 = TypeDescriptor::char(CharWidth::W32);
        assert!(c8.is_integer() && c8.is_unsigned());
        assert!(!c32.is_numeric());
        assert_eq!(c32.bit_width(64), Some(32));
        assert_eq!(TypeDescriptor::bool().bit_width(64), Some(1));
        assert_eq!(TypeDescriptor::int(IntWidth::Size, true).bit_width(32), Some(32));
        assert_eq!(TypeDescriptor::pointer(i32_ty()).bit_width(64), None);
    }

    #[test]
    fn tag_names_and_primitive_classes() {
        let tags: Vec<&str> = [
            i32_ty(),
            TypeDescriptor::pointer(i32_ty()),
            TypeDescriptor::array(i32_ty(), 2),
            TypeDescriptor::meta_function(vec![], TypeDescriptor::void()),
            TypeDescriptor::tagged_union("Maybe", vec![]),
            TypeDescriptor::type_var("'t"),
        ]
        .iter()
        .map(TypeDescriptor::tag_name)
        .collect();
        assert_eq!(tags, ["Int", "Ptr", "Array", "Meta Function", "|", "'t"]);

        assert!(TypeDescriptor::void().is_primitive());
        assert!(TypeDescriptor::char(CharWidth::W32).is_primitive());
        assert!(!TypeDescriptor::pointer(i32_ty()).is_primitive());
        assert!(!TypeDescriptor::type_value().is_primitive());
        assert!(!TypeDescriptor::nominal("Point", vec![]).is_primitive());
    }
}
