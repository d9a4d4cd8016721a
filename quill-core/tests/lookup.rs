use quill_ast::{Decl, Node};
use quill_core::{
    Analyzer, ConstValue, DefnId, Expr, ModuleMap, SemaConfig, Session, Severity,
};

fn member(session: &Session, owner: DefnId, name: &str) -> DefnId {
    let scope = session
        .graph
        .defns
        .get(owner)
        .member_scope()
        .expect("owner has members");
    session.graph.lookup_member(scope, name, false)[0]
}

#[test]
fn dotted_import_paths_are_tried_shortest_first() {
    let modules = ModuleMap::new();
    let mut session = Session::with_loader(SemaConfig::default(), Box::new(modules.clone()));
    let lib = session
        .add_module("lib", vec![Decl::class("Name")])
        .expect("lib");
    let name = member(&session, lib, "Name");
    modules.register("pkg.sub.Name", vec![name]);
    let app = session.add_module("app", vec![]).expect("app");

    let resolved = session
        .analyzer(app)
        .resolve_type(&Node::path("pkg.sub.Name"))
        .expect("import");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_eq!(session.graph.type_defn_of(resolved.ty), Some(name));
    assert_eq!(
        modules.requests(),
        vec!["pkg".to_string(), "pkg.sub".to_string(), "pkg.sub.Name".to_string()]
    );
}

#[test]
fn lexical_names_never_reach_the_loader() {
    let modules = ModuleMap::new();
    let mut session = Session::with_loader(SemaConfig::default(), Box::new(modules.clone()));
    let app = session
        .add_module("app", vec![Decl::class("Local")])
        .expect("app");
    session
        .analyzer(app)
        .resolve_type(&Node::ident("Local"))
        .expect("local");
    session
        .analyzer(app)
        .resolve_type(&Node::ident("Int32"))
        .expect("builtin");
    assert!(modules.requests().is_empty());
}

#[test]
fn unknown_names_are_reported_once() {
    let mut session = Session::new(SemaConfig::default());
    let app = session.add_module("app", vec![]).expect("app");
    let expr = session
        .analyzer(app)
        .reduce_expr(&Node::path("nowhere.thing"))
        .expect("reduce");
    assert!(expr.is_error());
    assert_eq!(session.diag.error_count(), 1);
    assert!(session.diag.contains("Undefined symbol 'nowhere.thing'"));
}

#[test]
fn enum_variants_are_constants_of_the_enum_type() {
    let mut session = Session::new(SemaConfig::default());
    let app = session
        .add_module(
            "app",
            vec![Decl::enumeration("Color", None, &["Red", "Green", "Blue"])],
        )
        .expect("app");
    let expr = session
        .analyzer(app)
        .reduce_expr(&Node::path("Color.Green"))
        .expect("variant");
    let Expr::Const { value, ty, .. } = expr else {
        panic!("expected a constant, got {expr:?}");
    };
    assert_eq!(value, ConstValue::Int(1));
    assert_eq!(session.graph.display(ty), "app.Color");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
}

#[test]
fn namespace_members_resolve_through_the_namespace_name() {
    let mut session = Session::new(SemaConfig::default());
    let app = session
        .add_module(
            "app",
            vec![Decl::namespace(
                "util",
                vec![Decl::function("helper", vec![], None)],
            )],
        )
        .expect("app");
    let expr = session
        .analyzer(app)
        .reduce_expr(&Node::path("util.helper"))
        .expect("member");
    let Expr::LValue { defn, .. } = expr else {
        panic!("expected a function reference, got {expr:?}");
    };
    assert_eq!(session.graph.defns.get(defn).qualified_name, "app.util.helper");
}

#[test]
fn instance_members_are_rejected_in_static_methods() {
    let mut session = Session::new(SemaConfig::default());
    let app = session
        .add_module(
            "app",
            vec![Decl::class("Counter").with_members(vec![
                Decl::var("count", Some(Node::ident("Int32")), None),
                Decl::function("tick", vec![], None).with_static(),
            ])],
        )
        .expect("app");
    let tick = match session
        .analyzer(app)
        .reduce_expr(&Node::path("Counter.tick"))
        .expect("tick")
    {
        Expr::LValue { defn, .. } => defn,
        other => panic!("expected a function reference, got {other:?}"),
    };

    let err = Analyzer::for_defn(&mut session, tick)
        .reduce_expr(&Node::ident("count"))
        .expect_err("static context");
    assert_eq!(
        err.message,
        "Cannot access non-static member 'count' from static method."
    );
    assert!(session
        .diag
        .records()
        .iter()
        .any(|r| r.severity == Severity::Fatal));
}

#[test]
fn imported_names_flatten_to_their_targets() {
    let modules = ModuleMap::new();
    let mut session = Session::with_loader(SemaConfig::default(), Box::new(modules.clone()));
    let lib = session
        .add_module(
            "lib",
            vec![
                Decl::function("f", vec![], None),
                Decl::function("g", vec![], None),
            ],
        )
        .expect("lib");
    let (f, g) = (member(&session, lib, "f"), member(&session, lib, "g"));
    modules.register("lib.both", vec![f, g]);
    let app = session.add_module("app", vec![]).expect("app");

    let exprs = session
        .analyzer(app)
        .lookup_name(&Node::path("lib.both"))
        .expect("lookup");
    let found: Vec<DefnId> = exprs
        .iter()
        .filter_map(|e| match e {
            Expr::LValue { defn, .. } => Some(*defn),
            _ => None,
        })
        .collect();
    assert_eq!(found, vec![f, g]);
}

#[test]
fn unsized_integer_constants_have_no_members() {
    let mut session = Session::new(SemaConfig::default());
    let app = session.add_module("app", vec![]).expect("app");
    let expr = session
        .analyzer(app)
        .reduce_expr(&Node::member(Node::int(5), "bits"))
        .expect("reduce");
    assert!(expr.is_error());
    assert_eq!(session.diag.error_count(), 1, "{:?}", session.diag.messages());
    assert!(session
        .diag
        .contains("Can't look up member 'bits' of an integer constant of unknown size"));
}

#[test]
fn imports_of_different_kinds_under_one_name_are_ambiguous() {
    let mut session = Session::new(SemaConfig::default());
    let shapes = session
        .add_module("shapes", vec![Decl::class("Shape")])
        .expect("shapes");
    let builders = session
        .add_module("builders", vec![Decl::function("Shape", vec![], None)])
        .expect("builders");
    let (class, function) = (member(&session, shapes, "Shape"), member(&session, builders, "Shape"));
    let app = session.add_module("app", vec![]).expect("app");
    session.add_import(app, "Shape", vec![class]);
    session.add_import(app, "Shape", vec![function]);

    let expr = session
        .analyzer(app)
        .reduce_expr(&Node::ident("Shape"))
        .expect("reduce");
    assert!(expr.is_error());
    assert_eq!(session.diag.error_count(), 1);
    assert!(session.diag.contains("Ambiguous reference to 'Shape'"));
    assert!(session.diag.contains("candidate: shapes.Shape"));
    let infos = session
        .diag
        .records()
        .iter()
        .filter(|r| r.severity == Severity::Info)
        .count();
    assert_eq!(infos, 2);
}

#[test]
fn imported_functions_merge_into_one_overload_set() {
    let mut session = Session::new(SemaConfig::default());
    let text = session
        .add_module("text", vec![Decl::function("render", vec![], None)])
        .expect("text");
    let html = session
        .add_module("html", vec![Decl::function("render", vec![], None)])
        .expect("html");
    let (a, b) = (member(&session, text, "render"), member(&session, html, "render"));
    let app = session.add_module("app", vec![]).expect("app");
    session.add_import(app, "render", vec![a]);
    session.add_import(app, "render", vec![b]);

    let exprs = session
        .analyzer(app)
        .lookup_name(&Node::ident("render"))
        .expect("lookup");
    let found: Vec<DefnId> = exprs
        .iter()
        .filter_map(|e| match e {
            Expr::LValue { defn, .. } => Some(*defn),
            _ => None,
        })
        .collect();
    assert_eq!(found, vec![a, b]);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
}
