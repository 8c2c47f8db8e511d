use super::*;
use crate::language::{
    decls::{Environment, TypeRegistry},
    parser::{parse_declaration, parse_type},
    typecheck::TypecheckOptions,
};

struct Session {
    registry: TypeRegistry,
    env: Environment,
    options: TypecheckOptions,
    lowerer: TypeLowerer<ShapeBuilder>,
}

impl Session {
    fn new(decls: &[&str]) -> Self {
        let mut registry = TypeRegistry::new();
        for source in decls {
            registry.declare_type(parse_declaration(source).expect(source));
        }
        Self {
            registry,
            env: Environment::new(),
            options: TypecheckOptions::default(),
            lowerer: TypeLowerer::new(ShapeBuilder::new()),
        }
    }

    fn lower(&mut self, source: &str) -> TypeResult<ShapeId> {
        let ty = parse_type(source).expect(source);
        let ctx = TypeContext::new(&self.registry, &self.env, &self.options);
        self.lowerer.lower(&ctx, &ty)
    }

    fn render(&mut self, source: &str) -> String {
        let id = self.lower(source).expect(source);
        self.lowerer.builder().render(id)
    }

    fn definition(&self, id: ShapeId) -> String {
        self.lowerer
            .builder()
            .definition(id)
            .expect("named struct")
    }
}

#[test]
fn instantiations_are_cached_by_key() {
    let mut session = Session::new(&["List<'t> = ('t, List<'t>*)"]);
    let first = session.lower("List<i32>").expect("lower");
    let again = session.lower("List< i32 >").expect("lower");
    let wide = session.lower("List<i64>").expect("lower");
    assert_eq!(first, again);
    assert_ne!(first, wide);
    assert_eq!(session.lowerer.instantiation_count("List"), 2);
    assert_eq!(session.lowerer.cached("List", "List<i32>"), Some(&first));
}

#[test]
fn self_reference_resolves_to_placeholder() {
    let mut session = Session::new(&["List<'t> = ('t, List<'t>*)"]);
    let list = session.lower("List<u8>").expect("lower");
    assert_eq!(
        session.definition(list),
        "%\"List<u8>\" = type { i8, %\"List<u8>\"* }"
    );
}

#[test]
fn mutually_recursive_records_finalize() {
    let mut session = Session::new(&["A = (i32, B*)", "B = (A*, bool)"]);
    let a = session.lower("A").expect("lower");
    let b = session.lower("B").expect("lower");
    assert_eq!(session.definition(a), "%\"A\" = type { i32, %\"B\"* }");
    assert_eq!(session.definition(b), "%\"B\" = type { %\"A\"*, i1 }");
}

#[test]
fn union_body_is_largest_variant() {
    let mut session = Session::new(&["Small = | i8 | [4 i32]"]);
    let small = session.lower("Small").expect("lower");
    assert_eq!(session.definition(small), "%\"Small\" = type <{ [4 x i32] }>");
}

#[test]
fn union_and_record_references_share_cache() {
    let mut session = Session::new(&["Maybe<'t> = | void* | 't"]);
    let parsed = session.lower("Maybe<f64>").expect("lower");
    let ctx = TypeContext::new(&session.registry, &session.env, &session.options);
    let tagged = TypeDescriptor::tagged_union("Maybe", vec![parse_type("f64").expect("f64")]);
    let direct = session.lowerer.lower(&ctx, &tagged).expect("lower");
    assert_eq!(parsed, direct);
}

#[test]
fn primitives_and_composites_lower_directly() {
    let mut session = Session::new(&[]);
    assert_eq!(session.render("void*"), "i8*");
    assert_eq!(session.render("(i32, c32)->bool"), "i1 (i32, i32)*");
    assert_eq!(session.render("meta ()->void"), "void ()*");
    assert_eq!(session.render("[2 (f32, u16)]"), "[2 x { float, i16 }]");
    assert_eq!(session.render("type"), "{}");
    assert_eq!(session.render("f16**"), "half**");
}

#[test]
fn bound_arguments_share_instantiation() {
    let mut session = Session::new(&["Box<'a> = ('a*)"]);
    session.env.declare("'t", parse_type("i32").expect("i32"));
    let via_var = session.lower("Box<'t>").expect("lower");
    let concrete = session.lower("Box<i32>").expect("lower");
    assert_eq!(via_var, concrete);
}

#[test]
fn unresolved_variable_drops_placeholder() {
    let mut session = Session::new(&["Box<'a> = ('a*)"]);
    let err = session.lower("Box<'t>").expect_err("'t is unbound");
    assert_eq!(
        err.kind,
        TypeErrorKind::UnresolvedTypeVariable { name: "'t".into() }
    );
    assert!(session.lowerer.cached("Box", "Box<'t>").is_none());
    assert_eq!(session.lowerer.instantiation_count("Box"), 0);
}

#[test]
fn lowering_checks_declarations() {
    let mut session = Session::new(&["Pair<'a, 'b> = ('a, 'b)"]);
    assert!(matches!(
        session.lower("Pair<i8>").map_err(|err| err.kind),
        Err(TypeErrorKind::ArityMismatch { expected: 2, found: 1, .. })
    ));
    assert!(matches!(
        session.lower("Nope").map_err(|err| err.kind),
        Err(TypeErrorKind::UndeclaredType { .. })
    ));
}

#[test]
fn failed_lowering_rolls_back_dependent_instantiations() {
    let mut session = Session::new(&["Outer = (Inner, Missing)", "Inner = (Outer*, i32)"]);
    let err = session.lower("Outer").expect_err("Missing is undeclared");
    assert_eq!(
        err.kind,
        TypeErrorKind::UndeclaredType {
            name: "Missing".into()
        }
    );
    assert_eq!(session.lowerer.instantiation_count("Outer"), 0);
    assert_eq!(session.lowerer.instantiation_count("Inner"), 0);

    session
        .registry
        .declare_type(parse_declaration("Missing = (i8)").expect("Missing"));
    let outer = session.lower("Outer").expect("lower");
    let inner = session.lower("Inner").expect("lower");
    let outer_ptr = session.lower("Outer*").expect("lower");
    let builder = session.lowerer.builder();
    let (outer_name, inner_name) = (builder.render(outer), builder.render(inner));
    assert_eq!(builder.render(outer_ptr), format!("{outer_name}*"));
    assert_eq!(
        session.definition(inner),
        format!("{inner_name} = type {{ {outer_name}*, i32 }}")
    );
    assert_eq!(
        session.definition(outer),
        format!("{outer_name} = type {{ {inner_name}, %\"Missing\" }}")
    );
}

#[test]
fn earlier_finished_instantiations_survive_a_failure() {
    let mut session = Session::new(&["Ok = (i32)", "Broken = (Gone)"]);
    let err = session.lower("(Ok, Broken)").expect_err("Gone is undeclared");
    assert!(matches!(err.kind, TypeErrorKind::UndeclaredType { .. }));
    assert_eq!(session.lowerer.instantiation_count("Ok"), 1);
    assert_eq!(session.lowerer.instantiation_count("Broken"), 0);
}

#[test]
fn self_containing_binding_is_unresolved() {
    let mut session = Session::new(&["Box<'a> = ('a*)"]);
    session
        .env
        .declare("'t", parse_type("('t, 't)").expect("binding"));
    assert!(matches!(
        session.lower("'t").map_err(|err| err.kind),
        Err(TypeErrorKind::UnresolvedTypeVariable { .. })
    ));
    assert!(matches!(
        session.lower("Box<'t>").map_err(|err| err.kind),
        Err(TypeErrorKind::UnresolvedTypeVariable { .. })
    ));
    assert_eq!(session.lowerer.instantiation_count("Box"), 0);
}

#[test]
fn union_of_zero_sized_variants_has_empty_body() {
    let mut session = Session::new(&["Unit = | void | type"]);
    let unit = session.lower("Unit").expect("lower");
    assert_eq!(session.definition(unit), "%\"Unit\" = type <{}>");
}
