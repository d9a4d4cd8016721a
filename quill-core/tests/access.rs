use quill_ast::{Decl, Node, Visibility};
use quill_core::{Analyzer, DefnId, Expr, SemaConfig, Session};

struct Classes {
    session: Session,
    base: DefnId,
    derived: DefnId,
    stranger: DefnId,
}

fn classes() -> Classes {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![
                Decl::class("Base").with_members(vec![
                    Decl::function("shared", vec![], None)
                        .with_static()
                        .with_visibility(Visibility::Protected),
                    Decl::function("hidden", vec![], None)
                        .with_static()
                        .with_visibility(Visibility::Private),
                    Decl::function("open", vec![], None).with_static(),
                ]),
                Decl::class("Derived").with_bases(vec![Node::ident("Base")]),
                Decl::class("Stranger"),
            ],
        )
        .expect("module");
    let mut defn_of = |name: &str| {
        let ty = session
            .analyzer(module)
            .resolve_type(&Node::ident(name))
            .expect("class");
        session.graph.type_defn_of(ty.ty).expect("class defn")
    };
    let (base, derived, stranger) = (defn_of("Base"), defn_of("Derived"), defn_of("Stranger"));
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    Classes {
        session,
        base,
        derived,
        stranger,
    }
}

fn reach(session: &mut Session, from: DefnId, path: &str) -> Expr {
    Analyzer::for_defn(session, from)
        .reduce_expr(&Node::path(path))
        .expect("reduce")
}

#[test]
fn protected_members_are_visible_to_subclasses() {
    let Classes {
        mut session,
        derived,
        ..
    } = classes();
    let expr = reach(&mut session, derived, "Base.shared");
    assert!(matches!(expr, Expr::LValue { .. }), "{expr:?}");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
}

#[test]
fn protected_members_are_hidden_from_unrelated_classes() {
    let Classes {
        mut session,
        stranger,
        ..
    } = classes();
    reach(&mut session, stranger, "Base.shared");
    assert_eq!(session.diag.error_count(), 1);
    assert!(session
        .diag
        .contains("Symbol 'shared' is not accessible from this context"));
    assert!(session.diag.contains("'shared' is declared here"));
}

#[test]
fn private_members_stay_inside_their_class() {
    let Classes {
        mut session,
        base,
        derived,
        ..
    } = classes();
    reach(&mut session, base, "Base.hidden");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());

    reach(&mut session, derived, "Base.hidden");
    assert!(session
        .diag
        .contains("Symbol 'hidden' is not accessible from this context"));
}

#[test]
fn public_members_are_visible_everywhere() {
    let Classes {
        mut session,
        stranger,
        derived,
        ..
    } = classes();
    reach(&mut session, stranger, "Base.open");
    reach(&mut session, derived, "Base.open");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
}

#[test]
fn can_access_answers_without_reporting() {
    let Classes {
        mut session,
        base,
        derived,
        stranger,
    } = classes();
    let hidden = match reach(&mut session, base, "Base.hidden") {
        Expr::LValue { defn, .. } => defn,
        other => panic!("expected a function reference, got {other:?}"),
    };
    let an = Analyzer::for_defn(&mut session, base);
    assert!(an.can_access(Some(base), hidden));
    assert!(!an.can_access(Some(derived), hidden));
    assert!(!an.can_access(Some(stranger), hidden));
    assert!(!an.can_access(None, hidden));
    drop(an);
    assert!(!session.diag.has_errors());
}
