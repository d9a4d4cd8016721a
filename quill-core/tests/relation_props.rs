use proptest::{
    prelude::{prop, Strategy},
    prop_oneof,
    test_runner::{Config, TestCaseError, TestRunner},
};
use quill_core::{Primitive, QualifiedType, SemaConfig, Session};

/// Shape of a structural type, built into a session on demand.
#[derive(Clone, Debug)]
enum Shape {
    Prim(usize),
    Literal(i128),
    Tuple(Vec<Shape>),
    Union(Vec<Shape>),
    Pointer(Box<Shape>),
    Address(Box<Shape>),
}

fn shapes() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        (0..Primitive::NAMED.len()).prop_map(Shape::Prim),
        (-300i128..300).prop_map(Shape::Literal),
    ];
    leaf.prop_recursive(3, 24, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Shape::Tuple),
            prop::collection::vec(inner.clone(), 1..3).prop_map(Shape::Union),
            inner.clone().prop_map(|s| Shape::Pointer(Box::new(s))),
            inner.prop_map(|s| Shape::Address(Box::new(s))),
        ]
    })
}

fn build(session: &mut Session, shape: &Shape) -> QualifiedType {
    let types = &mut session.graph.types;
    let ty = match shape {
        Shape::Prim(i) => types.primitive(Primitive::NAMED[*i]),
        Shape::Literal(v) => types.unsized_int(*v),
        Shape::Tuple(items) => {
            let members = items.iter().map(|s| build(session, s)).collect();
            session.graph.types.tuple(members)
        }
        Shape::Union(items) => {
            let members = items.iter().map(|s| build(session, s)).collect();
            session.graph.types.union(members)
        }
        Shape::Pointer(inner) => {
            let elem = build(session, inner);
            session.graph.types.pointer(elem)
        }
        Shape::Address(inner) => {
            let elem = build(session, inner);
            session.graph.types.address(elem)
        }
    };
    QualifiedType::plain(ty)
}

#[test]
fn equality_is_reflexive_and_symmetric() {
    let mut runner = TestRunner::new(Config {
        cases: 128,
        ..Config::default()
    });
    runner
        .run(&(shapes(), shapes()), |(a, b)| {
            let mut session = Session::new(SemaConfig::default());
            let (a, b) = (build(&mut session, &a), build(&mut session, &b));
            let rel = session.graph.relation();
            if !rel.is_equal(a, a) || !rel.is_equal(b, b) {
                return Err(TestCaseError::fail("is_equal is not reflexive"));
            }
            if rel.is_equal(a, b) != rel.is_equal(b, a) {
                return Err(TestCaseError::fail(format!(
                    "is_equal is not symmetric for {} and {}",
                    session.graph.display(a),
                    session.graph.display(b)
                )));
            }
            Ok(())
        })
        .expect("equality properties");
}

#[test]
fn subtyping_is_reflexive() {
    let mut runner = TestRunner::new(Config {
        cases: 128,
        ..Config::default()
    });
    runner
        .run(&shapes(), |shape| {
            let mut session = Session::new(SemaConfig::default());
            let t = build(&mut session, &shape);
            if !session.graph.relation().is_subtype(t, t) {
                return Err(TestCaseError::fail(format!(
                    "{} is not a subtype of itself",
                    session.graph.display(t)
                )));
            }
            Ok(())
        })
        .expect("subtype reflexivity");
}

#[test]
fn structurally_equal_types_are_interned_once() {
    let mut runner = TestRunner::new(Config {
        cases: 64,
        ..Config::default()
    });
    runner
        .run(&shapes(), |shape| {
            let mut session = Session::new(SemaConfig::default());
            let first = build(&mut session, &shape);
            let second = build(&mut session, &shape);
            if first != second {
                return Err(TestCaseError::fail("structural type built twice"));
            }
            Ok(())
        })
        .expect("interning");
}
