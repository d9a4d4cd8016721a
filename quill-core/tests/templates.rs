use quill_ast::{no_span, Decl, Node, Param, TypeParam};
use quill_core::{
    AnalysisTask, Analyzer, BindingEnv, ConstraintKind, DefnId, Expect, Expr, Primitive,
    Provisions, QualifiedType, SemaConfig, Session, Severity, Traits, TypeKind, TypeVariable,
};

fn members_named(session: &Session, module: DefnId, name: &str) -> Vec<DefnId> {
    let scope = session
        .graph
        .defns
        .get(module)
        .member_scope()
        .expect("module scope");
    session.graph.scopes.lookup_local(scope, name).to_vec()
}

fn box_decl() -> Decl {
    Decl::class("Box")
        .with_type_params(vec![TypeParam::var("T")])
        .with_members(vec![Decl::function(
            "construct",
            vec![Param::new("value", Node::ident("T"))],
            None,
        )])
}

fn instance_args(session: &Session, ty: QualifiedType) -> Vec<QualifiedType> {
    let defn = session.graph.type_defn_of(ty.ty).expect("instance defn");
    let inst = session.graph.defns.get(defn).instance.expect("an instance");
    let args = session.graph.templates.instance(inst).type_args;
    session.graph.types.tuple_members(args).to_vec()
}

#[test]
fn box_through_an_alias_reuses_the_cached_instance() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![box_decl(), Decl::alias("Int", Node::ident("Int32"))],
        )
        .expect("module");
    let (direct, aliased, constructed) = {
        let mut an = session.analyzer(module);
        let direct = an
            .resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Int32")]))
            .expect("Box[Int32]");
        let aliased = an
            .resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Int")]))
            .expect("Box[Int]");
        let constructed = an
            .reduce_expr(&Node::call(Node::ident("Box"), vec![Node::int(5)]))
            .expect("Box(5)");
        (direct, aliased, constructed)
    };
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_eq!(direct.ty, aliased.ty, "both spellings name one instance");

    let box_defn = members_named(&session, module, "Box")[0];
    let template = session.graph.defns.get(box_defn).template.expect("generic");
    assert_eq!(session.graph.templates.get(template).cached_instances(), 1);

    let (int32_arg, alias_arg) = (instance_args(&session, direct)[0], instance_args(&session, aliased)[0]);
    assert!(session.graph.relation().is_equal(int32_arg, alias_arg));

    match constructed {
        Expr::Construct { ty, .. } => assert_eq!(ty.ty, direct.ty, "Box(5) infers Box[Int32]"),
        other => panic!("expected a construction, got {other:?}"),
    }
}

#[test]
fn different_arguments_make_distinct_instances() {
    let mut session = Session::new(SemaConfig::default());
    let module = session.add_module("app", vec![box_decl()]).expect("module");
    let mut an = session.analyzer(module);
    let ints = an
        .resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Int32")]))
        .expect("Box[Int32]");
    let bools = an
        .resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Bool")]))
        .expect("Box[Bool]");
    assert_ne!(ints.ty, bools.ty);
    let rel = an.session().graph.relation();
    assert!(!rel.is_equal(ints, bools));
}

#[test]
fn scaffold_instances_never_enter_the_cache() {
    let mut session = Session::new(SemaConfig::default());
    let module = session.add_module("app", vec![box_decl()]).expect("module");
    let box_defn = members_named(&session, module, "Box")[0];
    session
        .analyzer(module)
        .analyze_defn(box_defn, AnalysisTask::PrepTypeComparison)
        .expect("signature");
    let template = session.graph.defns.get(box_defn).template.expect("generic");

    let probe = session.graph.types.type_var(TypeVariable::new("U", no_span()));
    let placeholder = QualifiedType::plain(session.graph.types.pattern_value(probe));
    let env = session.bind_template_args(box_defn, &[placeholder]);
    let scaffold = session
        .instantiate(no_span(), box_defn, &env, Expect::NONE)
        .expect("scaffold instance");
    assert_eq!(session.graph.templates.get(template).cached_instances(), 0);
    let scaffold_ty = session.graph.defns.get(scaffold).type_value().expect("type");
    assert!(session.graph.is_scaffold(scaffold_ty));

    let err = session
        .instantiate(no_span(), box_defn, &env, Expect::CONCRETE)
        .expect_err("scaffolds are rejected when a concrete instance is expected");
    assert!(err.message.contains("Expected non-throwaway"));

    let int32 = session.graph.primitive(Primitive::Int32);
    let env = session.bind_template_args(box_defn, &[int32]);
    let first = session
        .instantiate(no_span(), box_defn, &env, Expect::CONCRETE)
        .expect("instance");
    let second = session
        .instantiate(no_span(), box_defn, &env, Expect::CONCRETE)
        .expect("instance");
    assert_ne!(first, scaffold);
    assert_eq!(first, second);
    assert_eq!(session.graph.templates.get(template).cached_instances(), 1);
}

#[test]
fn variadic_parameter_must_come_last() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![
                Decl::class("Misplaced")
                    .with_type_params(vec![TypeParam::variadic("Ts"), TypeParam::var("T")]),
                Decl::class("Twice")
                    .with_type_params(vec![TypeParam::variadic("Ts"), TypeParam::variadic("Us")]),
                Decl::class("Fine")
                    .with_type_params(vec![TypeParam::var("T"), TypeParam::variadic("Ts")]),
            ],
        )
        .expect("module");

    let misplaced = members_named(&session, module, "Misplaced")[0];
    session
        .analyzer(module)
        .analyze_defn(misplaced, AnalysisTask::PrepTypeComparison)
        .expect("analysis continues after the error");
    assert!(session.diag.contains("template variadic parameter must be last"));
    session.diag.clear();

    let twice = members_named(&session, module, "Twice")[0];
    session
        .analyzer(module)
        .analyze_defn(twice, AnalysisTask::PrepTypeComparison)
        .expect("analysis continues after the error");
    assert!(session.diag.contains("template variadic parameter must be last"));
    assert!(session.diag.contains("Variadic argument not allowed here"));
    session.diag.clear();

    let fine = members_named(&session, module, "Fine")[0];
    session
        .analyzer(module)
        .analyze_defn(fine, AnalysisTask::PrepTypeComparison)
        .expect("signature");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    let template = session.graph.defns.get(fine).template.expect("generic");
    let sig = session.graph.templates.get(template);
    assert!(sig.variadic);
    assert_eq!(sig.required_args, 1);
}

#[test]
fn variadic_arguments_are_packed_into_a_tuple() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![Decl::class("Row").with_type_params(vec![TypeParam::var("K"), TypeParam::variadic("Vs")])],
        )
        .expect("module");
    let row = session
        .analyzer(module)
        .resolve_type(&Node::specialize(
            Node::ident("Row"),
            vec![Node::ident("Int32"), Node::ident("Bool"), Node::ident("Char")],
        ))
        .expect("Row[Int32, Bool, Char]");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    let args = instance_args(&session, row);
    assert_eq!(args.len(), 2);
    assert_eq!(session.graph.display(args[1]), "(Bool, Char)");
}

#[test]
fn fixed_slot_specialization_beats_the_general_template() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![
                Decl::class("Vec").with_type_params(vec![TypeParam::var("T")]),
                Decl::class("Vec").with_type_params(vec![TypeParam::fixed(Node::ident("Bool"))]),
            ],
        )
        .expect("module");
    let declared = members_named(&session, module, "Vec");
    assert_eq!(declared.len(), 2, "generic types overload by name");

    let (bits, ints) = {
        let mut an = session.analyzer(module);
        (
            an.resolve_type(&Node::specialize(Node::ident("Vec"), vec![Node::ident("Bool")]))
                .expect("Vec[Bool]"),
            an.resolve_type(&Node::specialize(Node::ident("Vec"), vec![Node::ident("Int32")]))
                .expect("Vec[Int32]"),
        )
    };
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    let origin = |ty: QualifiedType| {
        let defn = session.graph.type_defn_of(ty.ty).expect("defn");
        let inst = session.graph.defns.get(defn).instance.expect("instance");
        session.graph.templates.instance(inst).template_defn
    };
    assert_eq!(origin(bits), declared[1]);
    assert_eq!(origin(ints), declared[0]);
}

#[test]
fn equally_general_templates_are_ambiguous() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![
                Decl::class("Pair").with_type_params(vec![TypeParam::var("A")]),
                Decl::class("Pair").with_type_params(vec![TypeParam::var("B")]),
            ],
        )
        .expect("module");
    let ty = session
        .analyzer(module)
        .resolve_type(&Node::specialize(Node::ident("Pair"), vec![Node::ident("Int32")]))
        .expect("resolution continues");
    assert!(session.graph.types.is_error(ty.ty));
    assert!(
        session.diag.contains("Ambiguous template specialization Pair[Int32]"),
        "{:?}",
        session.diag.messages()
    );
}

#[test]
fn value_parameters_only_accept_matching_constants() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![Decl::class("Buffer").with_type_params(vec![TypeParam::value("N", Node::ident("UInt8"))])],
        )
        .expect("module");
    let mut an = session.analyzer(module);
    let small = an
        .resolve_type(&Node::specialize(Node::ident("Buffer"), vec![Node::int(16)]))
        .expect("Buffer[16]");
    let too_big = an
        .resolve_type(&Node::specialize(Node::ident("Buffer"), vec![Node::int(300)]))
        .expect("resolution continues");
    let not_a_value = an
        .resolve_type(&Node::specialize(Node::ident("Buffer"), vec![Node::ident("Bool")]))
        .expect("resolution continues");
    let session = an.session();
    assert!(!session.graph.types.is_error(small.ty));
    assert!(session.graph.types.is_error(too_big.ty));
    assert!(session.graph.types.is_error(not_a_value.ty));
    assert!(session.diag.contains("No template found matching Buffer[300]"));
    assert!(session.diag.contains("No template found matching Buffer[Bool]"));
}

#[test]
fn reference_arguments_share_an_erased_instance() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module("app", vec![box_decl(), Decl::class("Widget")])
        .expect("module");
    let (widgets, ints) = {
        let mut an = session.analyzer(module);
        (
            an.resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Widget")]))
                .expect("Box[Widget]"),
            an.resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Int32")]))
                .expect("Box[Int32]"),
        )
    };
    let widget_box = session.graph.type_defn_of(widgets.ty).expect("defn");
    let int_box = session.graph.type_defn_of(ints.ty).expect("defn");

    let shared = session
        .find_less_specialized_instance(widget_box)
        .expect("erasure")
        .expect("a shared instance");
    let shared_ty = session.graph.defns.get(shared).type_value().expect("type");
    let object = QualifiedType::plain(session.graph.builtins.object);
    let erased_arg = instance_args(&session, QualifiedType::plain(shared_ty))[0];
    assert!(session.graph.relation().is_equal(erased_arg, object));
    assert_eq!(
        session.find_less_specialized_instance(widget_box).expect("memo"),
        Some(shared),
        "computed once and remembered"
    );
    assert_eq!(session.find_less_specialized_instance(int_box).expect("erasure"), None);
}

#[test]
fn erasure_can_be_switched_off() {
    let config = SemaConfig {
        share_less_specialized: false,
        ..SemaConfig::default()
    };
    let mut session = Session::new(config);
    let module = session
        .add_module("app", vec![box_decl(), Decl::class("Widget")])
        .expect("module");
    let widgets = session
        .analyzer(module)
        .resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Widget")]))
        .expect("Box[Widget]");
    let widget_box = session.graph.type_defn_of(widgets.ty).expect("defn");
    assert_eq!(session.find_less_specialized_instance(widget_box).expect("erasure"), None);
}

/// `Box` with its parameters bound, and its single template variable.
fn analyzed_box(session: &mut Session, module: DefnId) -> (DefnId, QualifiedType) {
    let box_defn = members_named(session, module, "Box")[0];
    session
        .analyzer(module)
        .analyze_defn(box_defn, AnalysisTask::PrepTypeComparison)
        .expect("signature");
    let template = session.graph.defns.get(box_defn).template.expect("generic");
    let var = session.graph.templates.get(template).vars[0];
    (box_defn, QualifiedType::plain(var))
}

fn fatal_count(session: &Session) -> usize {
    session
        .diag
        .records()
        .iter()
        .filter(|r| r.severity == Severity::Fatal)
        .count()
}

#[test]
fn generic_names_itself_inside_its_instances() {
    let node_of_t = || Node::specialize(Node::ident("Node"), vec![Node::ident("T")]);
    let node = Decl::class("Node")
        .with_type_params(vec![TypeParam::var("T")])
        .with_members(vec![
            Decl::var("next", Some(node_of_t()), None),
            Decl::function("get", vec![Param::new("n", node_of_t())], None),
        ]);
    let mut session = Session::new(SemaConfig::default());
    let module = session.add_module("app", vec![node]).expect("module");
    let ints = session
        .analyzer(module)
        .resolve_type(&Node::specialize(Node::ident("Node"), vec![Node::ident("Int32")]))
        .expect("Node[Int32]");
    let instance = session.graph.type_defn_of(ints.ty).expect("instance defn");
    Analyzer::for_defn(&mut session, instance)
        .analyze_defn(instance, AnalysisTask::PrepCodeGeneration)
        .expect("instance body");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());

    let members = session.graph.defns.get(instance).member_scope().expect("members");
    let next = session.graph.scopes.lookup_local(members, "next")[0];
    let next_ty = session.graph.defns.get(next).value_type().expect("resolved");
    assert_eq!(session.graph.display(next_ty), "app.Node[Int32]");
    assert_eq!(next_ty.ty, ints.ty, "the field refers back to the same instance");
}

#[test]
fn solved_partial_instances_are_not_reused_for_concrete_arguments() {
    let mut session = Session::new(SemaConfig::default());
    let module = session.add_module("app", vec![box_decl()]).expect("module");
    let (box_defn, var) = analyzed_box(&mut session, module);

    let pending = session.graph.types.assignment(var.ty);
    let env = BindingEnv::new().with(var.ty, QualifiedType::plain(pending));
    let partial = session
        .instantiate(no_span(), box_defn, &env, Expect::NONE)
        .expect("partial instance");
    assert!(session.graph.defns.get(partial).has_trait(Traits::PARTIAL));

    let int32 = session.graph.primitive(Primitive::Int32);
    session
        .graph
        .types
        .add_constraint(pending, ConstraintKind::Exact, int32, Provisions::new());
    assert_eq!(session.graph.find_singular_solution(pending), Some(int32));

    let concrete = session
        .analyzer(module)
        .resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Int32")]))
        .expect("Box[Int32]");
    let concrete = session.graph.type_defn_of(concrete.ty).expect("instance defn");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_ne!(concrete, partial);
    let d = session.graph.defns.get(concrete);
    assert!(!d.has_trait(Traits::PARTIAL));
    assert!(d.singular);
}

#[test]
fn relabeling_shares_one_placeholder_per_variable_within_a_pass() {
    let mut session = Session::new(SemaConfig::default());
    let module = session.add_module("app", vec![box_decl()]).expect("module");
    let (_, var) = analyzed_box(&mut session, module);
    let pair = QualifiedType::plain(session.graph.types.tuple(vec![var, var]));

    let (first, mapping) = session.relabel(&[var.ty], pair).expect("relabel");
    let members = session.graph.types.tuple_members(first.ty).to_vec();
    assert_eq!(members[0], members[1]);
    assert!(matches!(
        session.graph.types.kind(members[0].ty),
        TypeKind::PatternValue { .. }
    ));
    assert_eq!(mapping.get(var.ty), Some(members[0]));
    assert!(session.graph.is_scaffold(first.ty));

    let (second, _) = session.relabel(&[var.ty], pair).expect("relabel");
    let again = session.graph.types.tuple_members(second.ty)[0];
    assert_ne!(again, members[0], "each pass draws fresh placeholders");
}

#[test]
fn scaffold_instances_are_fresh_and_uncached() {
    let mut session = Session::new(SemaConfig::default());
    let module = session.add_module("app", vec![box_decl()]).expect("module");
    let (box_defn, var) = analyzed_box(&mut session, module);
    let template = session.graph.defns.get(box_defn).template.expect("generic");

    let (first, env) = session.scaffold_instance(no_span(), box_defn).expect("scaffold");
    let (second, _) = session.scaffold_instance(no_span(), box_defn).expect("scaffold");
    assert_ne!(first, second);
    assert_eq!(session.graph.templates.get(template).cached_instances(), 0);
    let first_ty = session.graph.defns.get(first).type_value().expect("type");
    assert!(session.graph.is_scaffold(first_ty));
    let placeholder = env.get(var.ty).expect("bound");
    assert_eq!(instance_args(&session, QualifiedType::plain(first_ty)), vec![placeholder]);
}

#[test]
fn substituting_into_a_partial_instance_reinstantiates_it() {
    let mut session = Session::new(SemaConfig::default());
    let module = session.add_module("app", vec![box_decl()]).expect("module");
    let (box_defn, var) = analyzed_box(&mut session, module);

    let outer = session.graph.types.type_var(TypeVariable::new("U", no_span()));
    let env = BindingEnv::new().with(var.ty, QualifiedType::plain(outer));
    let partial = session
        .instantiate(no_span(), box_defn, &env, Expect::NONE)
        .expect("Box[U]");
    assert!(session.graph.defns.get(partial).has_trait(Traits::PARTIAL));
    let partial_ty = QualifiedType::plain(session.graph.defns.get(partial).type_value().expect("type"));

    let int32 = session.graph.primitive(Primitive::Int32);
    let filled = session
        .substitute(no_span(), &BindingEnv::new().with(outer, int32), partial_ty)
        .expect("substitution");
    let direct = session
        .analyzer(module)
        .resolve_type(&Node::specialize(Node::ident("Box"), vec![Node::ident("Int32")]))
        .expect("Box[Int32]");
    assert!(!session.diag.has_errors(), "{:?}", session.diag.messages());
    assert_ne!(filled.ty, partial_ty.ty);
    assert_eq!(filled.ty, direct.ty);
    assert_eq!(instance_args(&session, filled), vec![int32]);
}

#[test]
fn failed_instantiation_during_substitution_is_reported_once() {
    let mut session = Session::new(SemaConfig::default());
    let module = session
        .add_module(
            "app",
            vec![Decl::class("Buffer").with_type_params(vec![TypeParam::value("N", Node::ident("UInt8"))])],
        )
        .expect("module");
    let buffer = members_named(&session, module, "Buffer")[0];
    session
        .analyzer(module)
        .analyze_defn(buffer, AnalysisTask::PrepTypeComparison)
        .expect("signature");
    let template = session.graph.defns.get(buffer).template.expect("generic");
    let size = session.graph.templates.get(template).vars[0];
    let generic = QualifiedType::plain(session.graph.defns.get(buffer).type_value().expect("type"));
    let both = QualifiedType::plain(session.graph.types.tuple(vec![generic, generic]));

    let flag = session.graph.primitive(Primitive::Bool);
    let err = session
        .substitute(no_span(), &BindingEnv::new().with(size, flag), both)
        .expect_err("Bool is not a UInt8 constant");
    assert!(err.message.contains("incompatible with template parameter N"), "{}", err.message);
    assert_eq!(fatal_count(&session), 1);
    assert_eq!(session.graph.templates.get(template).cached_instances(), 0);
}
