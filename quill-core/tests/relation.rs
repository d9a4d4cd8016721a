use quill_ast::{no_span, Decl, Node};
use quill_core::{
    AnalysisTask, DefnId, Primitive, QualifiedType, SemaConfig, Session, Specificity,
    TypeVariable,
};

struct Hierarchy {
    session: Session,
    module: DefnId,
    animal: QualifiedType,
    dog: QualifiedType,
    puppy: QualifiedType,
}

fn hierarchy() -> Hierarchy {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![
                Decl::class("Animal"),
                Decl::class("Dog").with_bases(vec![Node::ident("Animal")]),
                Decl::class("Puppy").with_bases(vec![Node::ident("Dog")]),
                Decl::class("Rock"),
            ],
        )
        .expect("module");
    let (animal, dog, puppy) = {
        let mut an = session.analyzer(module);
        (
            an.resolve_type(&Node::ident("Animal")).expect("Animal"),
            an.resolve_type(&Node::ident("Dog")).expect("Dog"),
            an.resolve_type(&Node::ident("Puppy")).expect("Puppy"),
        )
    };
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    Hierarchy {
        session,
        module,
        animal,
        dog,
        puppy,
    }
}

#[test]
fn subtyping_is_transitive_over_three_levels() {
    let Hierarchy {
        session,
        animal,
        dog,
        puppy,
        ..
    } = hierarchy();
    let rel = session.graph.relation();
    assert!(rel.is_subtype(puppy, dog));
    assert!(rel.is_subtype(dog, animal));
    assert!(rel.is_subtype(puppy, animal));
    assert!(!rel.is_subtype(animal, puppy));
    for t in [animal, dog, puppy] {
        assert!(rel.is_subtype(t, t));
        assert!(rel.is_equal(t, t));
    }
}

#[test]
fn classes_without_bases_derive_from_the_root_object() {
    let Hierarchy {
        mut session,
        module,
        animal,
        puppy,
        ..
    } = hierarchy();
    let object = QualifiedType::plain(session.graph.builtins.object);
    let rock = session
        .analyzer(module)
        .resolve_type(&Node::ident("Rock"))
        .expect("Rock");
    let rel = session.graph.relation();
    assert!(rel.is_subclass(puppy, object));
    assert!(rel.is_subclass(rock, object));
    assert!(!rel.is_subclass(rock, animal));
    assert_eq!(session.graph.common_base(puppy, rock), Some(object));
}

#[test]
fn specificity_follows_the_class_hierarchy() {
    let Hierarchy {
        session, animal, dog, ..
    } = hierarchy();
    let rel = session.graph.relation();
    assert_eq!(rel.is_more_specific(dog, animal), Specificity::MoreSpecific);
    assert_eq!(rel.is_more_specific(animal, dog), Specificity::NotMoreSpecific);
    assert_eq!(rel.is_more_specific(dog, dog), Specificity::EqualSpecificity);
}

#[test]
fn integers_widen_but_never_narrow() {
    let mut session = Session::new(SemaConfig::default());
    let int8 = session.graph.primitive(Primitive::Int8);
    let int32 = session.graph.primitive(Primitive::Int32);
    let uint16 = session.graph.primitive(Primitive::UInt16);
    let uint32 = session.graph.primitive(Primitive::UInt32);
    let float64 = session.graph.primitive(Primitive::Float64);
    let big = QualifiedType::plain(session.graph.types.unsized_int(1 << 40));
    let small = QualifiedType::plain(session.graph.types.unsized_int(7));

    let rel = session.graph.relation();
    assert!(rel.is_subtype(int8, int32));
    assert!(!rel.is_subtype(int32, int8));
    assert!(rel.is_subtype(uint16, int32));
    assert!(!rel.is_subtype(uint32, int32));
    assert!(rel.is_subtype(small, int8));
    assert!(!rel.is_subtype(big, int32));
    assert!(rel.is_subtype(big, float64));
}

#[test]
fn aliases_are_transparent_to_equality() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module("app", vec![Decl::alias("Count", Node::ident("Int32"))])
        .expect("module");
    let count = session
        .analyzer(module)
        .resolve_type(&Node::ident("Count"))
        .expect("alias");
    let int32 = session.graph.primitive(Primitive::Int32);
    assert_ne!(count.ty, int32.ty);
    let rel = session.graph.relation();
    assert!(rel.is_equal(count, int32));
    assert!(rel.is_equal(int32, count));
    assert!(rel.is_subtype(count, int32));
}

#[test]
fn protocols_accept_any_class_with_matching_members() {
    let sized = |name: &str, ret: &str| Decl::function(name, vec![], Some(Node::ident(ret)));
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![
                Decl::protocol("Sized").with_members(vec![sized("size", "Int32")]),
                Decl::class("Bag").with_members(vec![sized("size", "Int32")]),
                Decl::class("Sack").with_members(vec![sized("size", "Bool")]),
                Decl::class("Rock"),
            ],
        )
        .expect("module");
    let mut types = Vec::new();
    for name in ["Sized", "Bag", "Sack", "Rock"] {
        let ty = session
            .analyzer(module)
            .resolve_type(&Node::ident(name))
            .expect("type");
        let defn = session.graph.type_defn_of(ty.ty).expect("defn");
        session
            .analyzer(module)
            .analyze_defn(defn, AnalysisTask::PrepOverloadSelection)
            .expect("members");
        types.push(ty);
    }
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    let (protocol, bag, sack, rock) = (types[0], types[1], types[2], types[3]);

    let rel = session.graph.relation();
    assert!(rel.is_supported_by(protocol.ty, bag));
    assert!(rel.is_subtype(bag, protocol));
    assert!(!rel.is_subclass(bag, protocol), "no declared base links them");
    assert!(!rel.is_subtype(sack, protocol), "return types must match");
    assert!(!rel.is_subtype(rock, protocol));
}

#[test]
fn unsolved_assignments_rank_by_their_upper_bounds() {
    let Hierarchy {
        mut session,
        animal,
        dog,
        ..
    } = hierarchy();
    let int32 = session.graph.primitive(Primitive::Int32);
    let mut bounded = |name: &str, bounds: Vec<QualifiedType>| {
        let mut var = TypeVariable::new(name, no_span());
        var.upper_bounds = bounds;
        let var = session.graph.types.type_var(var);
        QualifiedType::plain(session.graph.types.assignment(var))
    };
    let narrow = bounded("A", vec![dog, int32]);
    let wide = bounded("B", vec![animal]);
    let same = bounded("C", vec![animal]);

    let rel = session.graph.relation();
    assert_eq!(rel.is_more_specific(narrow, wide), Specificity::MoreSpecific);
    assert_eq!(rel.is_more_specific(wide, narrow), Specificity::NotMoreSpecific);
    assert_eq!(rel.is_more_specific(wide, same), Specificity::EqualSpecificity);
}
