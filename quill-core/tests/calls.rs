use quill_ast::{Decl, Node, Param, TypeParam};
use quill_core::{DefnId, Expr, Primitive, QualifiedType, SemaConfig, Session, Severity};

fn session_with(decls: Vec<Decl>) -> (Session, DefnId) {
    session_with_config(SemaConfig::default(), decls)
}

fn session_with_config(config: SemaConfig, decls: Vec<Decl>) -> (Session, DefnId) {
    let mut session = Session::new(config);
    let module = session.add_module("app", decls).expect("module");
    (session, module)
}

fn call(session: &mut Session, module: DefnId, callee: &str, args: Vec<Node>) -> Expr {
    session
        .analyzer(module)
        .reduce_expr(&Node::call(Node::path(callee), args))
        .expect("call")
}

fn unary(name: &str, param: &str, ret: Option<&str>) -> Decl {
    Decl::function(
        name,
        vec![Param::new("value", Node::ident(param))],
        ret.map(Node::ident),
    )
}

fn infos(session: &Session) -> usize {
    session
        .diag
        .records()
        .iter()
        .filter(|r| r.severity == Severity::Info)
        .count()
}

#[test]
fn integer_literal_picks_the_numeric_overload() {
    let (mut session, module) =
        session_with(vec![unary("f", "Int32", None), unary("f", "String", None)]);
    let expr = call(&mut session, module, "f", vec![Node::int(1)]);
    assert_eq!(session.diag.error_count(), 0, "{:?}", session.diag.messages());

    let Expr::Call { method, args, ty, .. } = expr else {
        panic!("expected a call, got {expr:?}");
    };
    assert_eq!(session.graph.display_signature(method), "app.f(Int32) -> Void");
    assert_eq!(ty, session.graph.primitive(Primitive::Void));
    match &args[0] {
        Expr::Const { ty, .. } => assert_eq!(*ty, session.graph.primitive(Primitive::Int32)),
        other => panic!("expected a constant argument, got {other:?}"),
    }
    assert_eq!(session.pending_analysis(), 1);
}

#[test]
fn unmatched_arguments_list_every_candidate() {
    let (mut session, module) =
        session_with(vec![unary("f", "Int32", None), unary("f", "String", None)]);
    let expr = call(&mut session, module, "f", vec![Node::boolean(true)]);
    assert!(expr.is_error());
    assert_eq!(session.diag.error_count(), 1);
    assert!(session
        .diag
        .contains("No matching method for call to f(Bool), candidates are:"));
    assert_eq!(infos(&session), 2);
    assert!(session.diag.contains("app.f(Int32) -> Void"));
    assert!(session.diag.contains("app.f(String) -> Void"));
}

#[test]
fn narrower_parameter_wins() {
    let (mut session, module) =
        session_with(vec![unary("h", "Int64", None), unary("h", "Int32", None)]);
    let expr = call(&mut session, module, "h", vec![Node::int(3)]);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    let Expr::Call { method, .. } = expr else {
        panic!("expected a call, got {expr:?}");
    };
    assert_eq!(session.graph.display_signature(method), "app.h(Int32) -> Void");
}

#[test]
fn crossed_parameter_lists_are_ambiguous() {
    let pair = |a: &str, b: &str| {
        Decl::function(
            "g",
            vec![
                Param::new("a", Node::ident(a)),
                Param::new("b", Node::ident(b)),
            ],
            None,
        )
    };
    let (mut session, module) =
        session_with(vec![pair("Int32", "Int64"), pair("Int64", "Int32")]);
    let expr = call(&mut session, module, "g", vec![Node::int(1), Node::int(2)]);
    assert!(expr.is_error());
    assert!(session.diag.contains("Ambiguous overloaded call to g("));
    assert_eq!(infos(&session), 2);
}

#[test]
fn keyword_arguments_bind_by_name() {
    let (mut session, module) = session_with(vec![Decl::function(
        "k",
        vec![
            Param::new("count", Node::ident("Int32")),
            Param::new("flag", Node::ident("Bool")),
        ],
        Some(Node::ident("Bool")),
    )]);
    let expr = call(
        &mut session,
        module,
        "k",
        vec![
            Node::keyword("flag", Node::boolean(true)),
            Node::keyword("count", Node::int(4)),
        ],
    );
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_eq!(expr.ty(), Some(session.graph.primitive(Primitive::Bool)));

    call(
        &mut session,
        module,
        "k",
        vec![Node::keyword("flag", Node::boolean(true))],
    );
    assert!(session.diag.contains("No matching method for call to k(Bool)"));
}

#[test]
fn defaults_and_variadics_absorb_missing_and_extra_arguments() {
    let (mut session, module) = session_with(vec![
        Decl::function(
            "log",
            vec![
                Param::new("level", Node::ident("Int32")).with_default(Node::int(0)),
            ],
            None,
        ),
        Decl::function(
            "sum",
            vec![Param::new("items", Node::ident("Int64")).variadic()],
            Some(Node::ident("Int64")),
        ),
    ]);
    call(&mut session, module, "log", vec![]);
    let total = call(
        &mut session,
        module,
        "sum",
        vec![Node::int(1), Node::int(2), Node::int(3)],
    );
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_eq!(total.ty(), Some(session.graph.primitive(Primitive::Int64)));
}

#[test]
fn generic_functions_infer_from_arguments() {
    let identity = Decl::function(
        "identity",
        vec![Param::new("value", Node::ident("T"))],
        Some(Node::ident("T")),
    )
    .with_type_params(vec![TypeParam::var("T")]);
    let (mut session, module) = session_with(vec![identity]);

    let flag = call(&mut session, module, "identity", vec![Node::boolean(false)]);
    let number = call(&mut session, module, "identity", vec![Node::int(7)]);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_eq!(flag.ty(), Some(session.graph.primitive(Primitive::Bool)));
    assert_eq!(number.ty(), Some(session.graph.primitive(Primitive::Int32)));

    let Expr::Call { method, .. } = number else {
        panic!("expected a call, got {number:?}");
    };
    assert_eq!(
        session.graph.display_signature(method),
        "app.identity[Int32](Int32) -> Int32"
    );
}

#[test]
fn type_arguments_are_inferred_through_generic_classes() {
    let box_decl = Decl::class("Box")
        .with_type_params(vec![TypeParam::var("T")])
        .with_members(vec![Decl::function(
            "construct",
            vec![Param::new("value", Node::ident("T"))],
            None,
        )]);
    let unbox = Decl::function(
        "unbox",
        vec![Param::new(
            "b",
            Node::specialize(Node::ident("Box"), vec![Node::ident("T")]),
        )],
        Some(Node::ident("T")),
    )
    .with_type_params(vec![TypeParam::var("T")]);
    let (mut session, module) = session_with(vec![box_decl, unbox]);

    let inner = Node::call(Node::ident("Box"), vec![Node::boolean(true)]);
    let expr = call(&mut session, module, "unbox", vec![inner]);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_eq!(expr.ty(), Some(session.graph.primitive(Primitive::Bool)));
}

#[test]
fn constructors_produce_construct_expressions() {
    let point = Decl::class("Point").with_members(vec![Decl::function(
        "construct",
        vec![
            Param::new("x", Node::ident("Int32")),
            Param::new("y", Node::ident("Int32")),
        ],
        None,
    )]);
    let (mut session, module) = session_with(vec![point]);
    let expr = call(&mut session, module, "Point", vec![Node::int(1), Node::int(2)]);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    let Expr::Construct { ty, args, .. } = expr else {
        panic!("expected a construction, got {expr:?}");
    };
    assert_eq!(session.graph.display(ty), "app.Point");
    assert_eq!(args.len(), 2);
}

#[test]
fn static_create_stands_in_for_a_constructor() {
    let factory = Decl::class("Factory").with_members(vec![Decl::function(
        "create",
        vec![],
        Some(Node::ident("Factory")),
    )
    .with_static()]);
    let (mut session, module) = session_with(vec![factory]);
    let expr = call(&mut session, module, "Factory", vec![]);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    let Expr::Call { ty, .. } = expr else {
        panic!("expected a call to create, got {expr:?}");
    };
    assert_eq!(session.graph.display(ty), "app.Factory");
}

#[test]
fn types_without_constructors_are_reported() {
    let (mut session, module) = session_with(vec![Decl::class("Empty")]);
    let expr = call(&mut session, module, "Empty", vec![]);
    assert!(expr.is_error());
    assert!(session
        .diag
        .contains("No constructors found for type app.Empty"));
}

#[test]
#[should_panic(expected = "internal error")]
fn constructors_returning_values_are_internal_errors() {
    let broken = Decl::class("Broken").with_members(vec![Decl::function(
        "construct",
        vec![],
        Some(Node::ident("Int32")),
    )]);
    let (mut session, module) = session_with(vec![broken]);
    call(&mut session, module, "Broken", vec![]);
}

#[test]
fn argument_types_bring_their_functions_into_scope() {
    let widget = Decl::class("Widget").with_members(vec![Decl::function(
        "describe",
        vec![Param::new("w", Node::ident("Widget"))],
        Some(Node::ident("Bool")),
    )
    .with_static()]);
    let var = Decl::var("w", Some(Node::ident("Widget")), None);

    let (mut session, module) = session_with(vec![widget.clone(), var.clone()]);
    let expr = call(&mut session, module, "describe", vec![Node::ident("w")]);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_eq!(expr.ty(), Some(session.graph.primitive(Primitive::Bool)));

    let config = SemaConfig {
        adl: false,
        ..SemaConfig::default()
    };
    let (mut session, module) = session_with_config(config, vec![widget, var]);
    let expr = call(&mut session, module, "describe", vec![Node::ident("w")]);
    assert!(expr.is_error());
    assert!(session.diag.contains("Undefined symbol 'describe'"));
}

#[test]
fn plain_values_are_not_callable() {
    let (mut session, module) =
        session_with(vec![Decl::var("x", Some(Node::ident("Int32")), None)]);
    let expr = call(&mut session, module, "x", vec![]);
    assert!(expr.is_error());
    assert!(session.diag.contains("'x' is not callable"));
}

#[test]
fn queued_callees_are_analyzed_once_on_flush() {
    let (mut session, module) = session_with(vec![unary("f", "Int32", Some("Int32"))]);
    call(&mut session, module, "f", vec![Node::int(1)]);
    call(&mut session, module, "f", vec![Node::int(2)]);
    assert_eq!(session.pending_analysis(), 1);
    assert_eq!(session.flush_analysis_queue().expect("flush"), 1);
    assert_eq!(session.pending_analysis(), 0);
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
}

#[test]
fn call_results_are_plain_qualified_types() {
    let (mut session, module) = session_with(vec![unary("f", "Int32", Some("Int64"))]);
    let expr = call(&mut session, module, "f", vec![Node::int(1)]);
    let int64: QualifiedType = session.graph.primitive(Primitive::Int64);
    assert_eq!(expr.ty(), Some(int64));
}
