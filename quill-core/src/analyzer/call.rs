//! Overload resolution for calls and constructions.
//!
//! Every callable a call could mean becomes a [`CallCandidate`]. Candidates
//! whose parameters cannot take the arguments are culled, and the survivors
//! are ranked by how specific their parameter types are. Generic candidates
//! get their type variables inferred from the argument types first.

use quill_ast::{Node, NodeKind, Span};

use crate::defn::{DefnId, DefnKind};
use crate::error::{ice, SemaResult};
use crate::expr::Expr;
use crate::infer::{ConstraintKind, ProvisionId, Provisions};
use crate::relation::Specificity;
use crate::template::Expect;
use crate::transform::BindingEnv;
use crate::types::{
    AmbiguousChoice, AmbiguousKind, ParamType, Primitive, QualifiedType, TypeId, TypeKind,
};

use super::{AnalysisTask, Analyzer};

/// Which parameter each argument of a call binds to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterAssignments {
    pub arg_params: Vec<usize>,
}

impl ParameterAssignments {
    /// Matches arguments to `params`. `keywords[i]` names the parameter of
    /// argument `i`, or is `None` for a positional argument. `None` when the
    /// arguments cannot fill the parameter list.
    pub fn assign(params: &[ParamType], keywords: &[Option<&str>]) -> Option<Self> {
        let mut arg_params = Vec::with_capacity(keywords.len());
        let mut filled = vec![false; params.len()];
        let mut next = 0;
        for keyword in keywords {
            let index = match keyword {
                None => {
                    while params.get(next).is_some_and(|p| p.keyword_only) {
                        next += 1;
                    }
                    let index = next;
                    let param = params.get(index)?;
                    if !param.variadic {
                        next += 1;
                    }
                    index
                }
                Some(name) => {
                    let index = params.iter().position(|p| p.name == *name)?;
                    if filled[index] && !params[index].variadic {
                        return None;
                    }
                    index
                }
            };
            filled[index] = true;
            arg_params.push(index);
        }
        let complete = params
            .iter()
            .zip(&filled)
            .all(|(p, filled)| *filled || p.has_default || p.variadic);
        complete.then_some(Self { arg_params })
    }

    pub fn param_of(&self, arg: usize) -> usize {
        self.arg_params[arg]
    }
}

#[derive(Clone, Debug)]
pub struct CallCandidate {
    /// The declaration found by lookup, generic or not.
    pub origin: DefnId,
    /// The callable that would be invoked; an instance for generics.
    pub method: DefnId,
    pub fn_type: Option<TypeId>,
    pub assignments: Option<ParameterAssignments>,
    pub receiver: Option<Expr>,
    /// Type being constructed, for `construct` calls.
    pub construct: Option<QualifiedType>,
    /// Callee value, when calling through a variable of function type.
    pub value: Option<Expr>,
    pub provision: ProvisionId,
    pub culled: bool,
}

impl CallCandidate {
    fn param_type(&self, an: &Analyzer<'_>, arg: usize) -> Option<QualifiedType> {
        let ft = an.session.graph.types.function_type(self.fn_type?);
        let index = self.assignments.as_ref()?.param_of(arg);
        ft.params.get(index).map(|p| p.ty)
    }

    fn ret(&self, an: &Analyzer<'_>) -> Option<QualifiedType> {
        self.fn_type
            .map(|ft| an.session.graph.types.function_type(ft).ret)
    }
}

enum UnifyShape {
    Variable,
    Nested(Vec<(QualifiedType, QualifiedType)>),
    Unrelated,
}

#[derive(Clone, Debug)]
struct CallArg {
    keyword: Option<String>,
    expr: Expr,
    ty: QualifiedType,
}

impl Analyzer<'_> {
    /// A call whose callee is written as a name.
    pub fn call_name(&mut self, span: Span, callee: &Node, args: &[Node]) -> SemaResult<Expr> {
        let Some(args) = self.reduce_args(args)? else {
            return Ok(Expr::Error(span));
        };
        let callees = self.lookup_name(callee)?;
        if callees.iter().any(Expr::is_error) {
            return Ok(Expr::Error(span));
        }
        let name = match &callee.kind {
            NodeKind::Ident(name) => name.clone(),
            NodeKind::Member { member, .. } => member.node.clone(),
            _ => callee.to_string(),
        };

        let mut candidates = Vec::new();
        let mut reported = false;
        for c in &callees {
            reported |= self.add_callee_candidates(span, c, &args, &mut candidates)?;
        }
        if self.session.config.adl && matches!(callee.kind, NodeKind::Ident(_)) {
            self.add_adl_candidates(span, &name, &args, &mut candidates)?;
        }
        if callees.is_empty() && candidates.is_empty() {
            self.error(span, format!("Undefined symbol '{callee}'"));
            return Ok(Expr::Error(span));
        }
        if reported && candidates.is_empty() {
            return Ok(Expr::Error(span));
        }
        self.select_candidate(span, &name, candidates, args)
    }

    /// A call through an already reduced callee.
    pub fn call_expr(&mut self, span: Span, callee: Expr, args: &[Node]) -> SemaResult<Expr> {
        if callee.is_error() {
            return Ok(callee);
        }
        let Some(args) = self.reduce_args(args)? else {
            return Ok(Expr::Error(span));
        };
        let name = match &callee {
            Expr::TypeLiteral { ty, .. } => self.session.graph.display(*ty),
            other => match other.defn() {
                Some(defn) => self.session.graph.defns.get(defn).name.clone(),
                None => "<expression>".to_string(),
            },
        };
        let mut candidates = Vec::new();
        let reported = self.add_callee_candidates(span, &callee, &args, &mut candidates)?;
        if reported && candidates.is_empty() {
            return Ok(Expr::Error(span));
        }
        self.select_candidate(span, &name, candidates, args)
    }

    /// `None` once an argument failed to reduce; its error is already out.
    fn reduce_args(&mut self, nodes: &[Node]) -> SemaResult<Option<Vec<CallArg>>> {
        let mut args = Vec::with_capacity(nodes.len());
        for node in nodes {
            let (keyword, value) = match &node.kind {
                NodeKind::Keyword { name, arg } => (Some(name.node.clone()), arg.as_ref()),
                _ => (None, node),
            };
            let expr = self.reduce_expr(value)?;
            if expr.is_error() {
                return Ok(None);
            }
            let ty = match (&expr, self.infer_type(&expr)) {
                (_, Some(ty)) => ty,
                (Expr::TypeLiteral { ty, .. }, None) => {
                    QualifiedType::plain(self.session.graph.types.type_literal(*ty))
                }
                (_, None) => {
                    self.error(value.span, format!("Expected a value, found '{value}'"));
                    return Ok(None);
                }
            };
            args.push(CallArg { keyword, expr, ty });
        }
        Ok(Some(args))
    }

    /// Returns true when a diagnostic was already reported for this callee.
    fn add_callee_candidates(
        &mut self,
        span: Span,
        callee: &Expr,
        args: &[CallArg],
        out: &mut Vec<CallCandidate>,
    ) -> SemaResult<bool> {
        match callee {
            Expr::Error(_) => Ok(true),
            Expr::TypeLiteral { ty, .. } => self.add_constructor_candidates(span, *ty, args, out),
            Expr::LValue { defn, base, ty, .. } => {
                if matches!(self.session.graph.defns.get(*defn).kind, DefnKind::Function(_)) {
                    let receiver = base.as_deref().cloned();
                    self.add_method_candidate(span, *defn, receiver, None, args, out)?;
                    return Ok(false);
                }
                let fn_type = ty
                    .map(|t| self.session.graph.types.deref(t).ty)
                    .filter(|t| matches!(self.session.graph.types.kind(*t), TypeKind::Function(_)));
                let Some(fn_type) = fn_type else {
                    let name = self.session.graph.defns.get(*defn).name.clone();
                    self.error(span, format!("'{name}' is not callable"));
                    return Ok(true);
                };
                let params = self.session.graph.types.function_type(fn_type).params.clone();
                let assignments = ParameterAssignments::assign(&params, &keywords(args));
                let provision = self.session.graph.types.new_provision();
                out.push(CallCandidate {
                    origin: *defn,
                    method: *defn,
                    fn_type: Some(fn_type),
                    culled: assignments.is_none(),
                    assignments,
                    receiver: None,
                    construct: None,
                    value: Some(callee.clone()),
                    provision,
                });
                Ok(false)
            }
            other => {
                self.error(other.span(), "Expression is not callable");
                Ok(true)
            }
        }
    }

    fn add_method_candidate(
        &mut self,
        span: Span,
        method: DefnId,
        receiver: Option<Expr>,
        construct: Option<QualifiedType>,
        args: &[CallArg],
        out: &mut Vec<CallCandidate>,
    ) -> SemaResult<()> {
        if out.iter().any(|c| c.origin == method) {
            return Ok(());
        }
        self.analyze_defn(method, AnalysisTask::PrepOverloadSelection)?;
        let provision = self.session.graph.types.new_provision();
        let mut candidate = CallCandidate {
            origin: method,
            method,
            fn_type: None,
            assignments: None,
            receiver,
            construct,
            value: None,
            provision,
            culled: true,
        };
        let Some(fn_type) = self.session.graph.defns.get(method).function_type() else {
            out.push(candidate);
            return Ok(());
        };
        let ft = self.session.graph.types.function_type(fn_type).clone();
        if construct.is_some()
            && self
                .session
                .graph
                .defns
                .get(method)
                .function_defn()
                .is_some_and(|f| f.is_ctor)
            && !self.session.is_void(ft.ret)
        {
            ice!(
                "constructor '{}' must return void",
                self.session.graph.display_defn(method)
            );
        }
        candidate.fn_type = Some(fn_type);
        candidate.assignments = ParameterAssignments::assign(&ft.params, &keywords(args));
        let Some(assignments) = candidate.assignments.clone() else {
            out.push(candidate);
            return Ok(());
        };

        if self.session.graph.defns.get(method).is_template() {
            let vars = self.template_vars(method);
            let env = self.infer_type_args(span, &vars, &ft.params, &assignments, args, provision)?;
            let Some(env) = env else {
                out.push(candidate);
                return Ok(());
            };
            let inst = self.session.instantiate(span, method, &env, Expect::NONE)?;
            self.analyze_defn(inst, AnalysisTask::PrepOverloadSelection)?;
            candidate.method = inst;
            candidate.fn_type = self.session.graph.defns.get(inst).function_type();
        }
        candidate.culled = candidate.fn_type.is_none();
        out.push(candidate);
        Ok(())
    }

    fn template_vars(&self, defn: DefnId) -> Vec<TypeId> {
        let graph = &self.session.graph;
        graph
            .defns
            .get(defn)
            .template
            .map(|t| graph.templates.get(t).vars.clone())
            .unwrap_or_default()
    }

    /// Infers `vars` by unifying parameter patterns with argument types.
    /// `None` when some variable has no single solution.
    fn infer_type_args(
        &mut self,
        span: Span,
        vars: &[TypeId],
        params: &[ParamType],
        assignments: &ParameterAssignments,
        args: &[CallArg],
        provision: ProvisionId,
    ) -> SemaResult<Option<BindingEnv>> {
        let mut pattern_env = BindingEnv::new();
        let mut placeholders = Vec::with_capacity(vars.len());
        for var in vars {
            let assignment = self.session.graph.types.assignment(*var);
            pattern_env.bind(*var, QualifiedType::plain(assignment));
            placeholders.push((*var, assignment));
        }
        for (index, arg) in args.iter().enumerate() {
            let param = &params[assignments.param_of(index)];
            let pattern = self.session.substitute(span, &pattern_env, param.ty)?;
            self.unify(pattern, arg.ty, &Provisions::flag(provision), false);
        }
        let mut env = BindingEnv::new();
        for (var, assignment) in placeholders {
            match self.session.graph.find_singular_solution(assignment) {
                Some(solution) => env.bind(var, solution),
                None => {
                    tracing::trace!(
                        target: "quill::call",
                        var = %self.session.graph.display_type(var),
                        "no solution"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(env))
    }

    /// Records what `arg` says about the inference variables in `pattern`.
    /// A bare variable takes the argument as a lower bound; anything nested
    /// inside a structure must match exactly.
    fn unify(&mut self, pattern: QualifiedType, arg: QualifiedType, provisions: &Provisions, exact: bool) {
        let pattern = self.session.graph.types.dealias(pattern);
        let arg = self.session.graph.types.deref(arg);
        match self.unify_shape(pattern, arg) {
            UnifyShape::Variable => {
                let (kind, value) = if exact {
                    (ConstraintKind::Exact, arg)
                } else {
                    let value = match self.session.graph.types.primitive_of(arg.ty) {
                        Some(Primitive::UnsizedInt(v)) => self.session.default_int_type(v),
                        _ => arg,
                    };
                    (ConstraintKind::LowerBound, value)
                };
                self.session.graph.types.add_constraint(
                    pattern.ty,
                    kind,
                    value.unqualified(),
                    provisions.clone(),
                );
            }
            UnifyShape::Nested(pairs) => {
                for (p, a) in pairs {
                    self.unify(p, a, provisions, true);
                }
            }
            UnifyShape::Unrelated => {}
        }
    }

    fn unify_shape(&self, pattern: QualifiedType, arg: QualifiedType) -> UnifyShape {
        let graph = &self.session.graph;
        match (graph.types.kind(pattern.ty), graph.types.kind(arg.ty)) {
            (TypeKind::Assignment(_), _) => UnifyShape::Variable,
            (TypeKind::Composite { defn: pd, .. }, TypeKind::Composite { defn: ad, .. }) => {
                let (Some(pi), Some(ai)) = (graph.defns.get(*pd).instance, graph.defns.get(*ad).instance)
                else {
                    return UnifyShape::Unrelated;
                };
                let (pinst, ainst) = (graph.templates.instance(pi), graph.templates.instance(ai));
                if !self.same_decl(pinst.template_defn, ainst.template_defn) {
                    return UnifyShape::Unrelated;
                }
                UnifyShape::Nested(
                    pinst
                        .param_values
                        .iter()
                        .zip(&ainst.param_values)
                        .map(|((_, p), (_, a))| (*p, *a))
                        .collect(),
                )
            }
            (TypeKind::Address(p), TypeKind::Address(a))
            | (TypeKind::Pointer(p), TypeKind::Pointer(a))
            | (TypeKind::FlexibleArray(p), TypeKind::FlexibleArray(a))
            | (TypeKind::TypeLiteral(p), TypeKind::TypeLiteral(a))
            | (TypeKind::NativeArray { elem: p, .. }, TypeKind::NativeArray { elem: a, .. }) => {
                UnifyShape::Nested(vec![(*p, *a)])
            }
            (TypeKind::Tuple(ps), TypeKind::Tuple(args)) if ps.len() == args.len() => {
                UnifyShape::Nested(ps.iter().copied().zip(args.iter().copied()).collect())
            }
            _ => UnifyShape::Unrelated,
        }
    }

    /// Constructor candidates: own `construct`, then static `create`, then
    /// an inherited `construct`.
    fn add_constructor_candidates(
        &mut self,
        span: Span,
        ty: QualifiedType,
        args: &[CallArg],
        out: &mut Vec<CallCandidate>,
    ) -> SemaResult<bool> {
        let ty = self.session.graph.types.dealias(ty);
        let shown = self.session.graph.display(ty);
        let Some(class) = self.session.graph.type_defn_of(ty.ty) else {
            self.error(span, format!("No constructors found for type {shown}"));
            return Ok(true);
        };
        if self.session.graph.defns.get(class).is_template() {
            return self.add_generic_constructor_candidates(span, class, args, out);
        }
        self.analyze_defn(class, AnalysisTask::PrepConstruction)?;
        let Some(scope) = self.session.graph.defns.get(class).member_scope() else {
            self.error(span, format!("No constructors found for type {shown}"));
            return Ok(true);
        };

        let functions = |an: &Self, found: &[DefnId], want_static: bool| -> Vec<DefnId> {
            found
                .iter()
                .copied()
                .filter(|d| {
                    let d = an.session.graph.defns.get(*d);
                    matches!(d.kind, DefnKind::Function(_)) && d.is_static() == want_static
                })
                .collect()
        };
        let own = self.session.graph.scopes.lookup_local(scope, "construct").to_vec();
        let own = functions(self, &own, false);
        let (ctors, construct) = if !own.is_empty() {
            (own, Some(ty))
        } else {
            let creates = self.session.graph.scopes.lookup_local(scope, "create").to_vec();
            let creates = functions(self, &creates, true);
            if !creates.is_empty() {
                (creates, None)
            } else {
                let inherited = self.find_in_scope(scope, "construct")?;
                (functions(self, &inherited, false), Some(ty))
            }
        };
        if ctors.is_empty() {
            self.error(span, format!("No constructors found for type {shown}"));
            return Ok(true);
        }
        for ctor in ctors {
            self.check_access(span, ctor);
            self.add_method_candidate(span, ctor, None, construct, args, out)?;
        }
        Ok(false)
    }

    /// Constructing a generic type without explicit arguments: the search
    /// runs over the generic's own members, and the class variables are
    /// inferred from the constructor arguments.
    fn add_generic_constructor_candidates(
        &mut self,
        span: Span,
        class: DefnId,
        args: &[CallArg],
        out: &mut Vec<CallCandidate>,
    ) -> SemaResult<bool> {
        self.analyze_defn(class, AnalysisTask::PrepMemberLookup)?;
        let mut ctors = self.lookup_template_member(class, "construct")?;
        let construct = !ctors.is_empty();
        if !construct {
            ctors = self.lookup_template_member(class, "create")?;
            ctors.retain(|d| self.session.graph.defns.get(*d).is_static());
        }
        if ctors.is_empty() {
            let shown = self.session.graph.display_defn(class);
            self.error(span, format!("No constructors found for type {shown}"));
            return Ok(true);
        }

        let vars = self.template_vars(class);
        for ctor in ctors {
            self.analyze_defn(ctor, AnalysisTask::PrepOverloadSelection)?;
            let provision = self.session.graph.types.new_provision();
            let mut candidate = CallCandidate {
                origin: ctor,
                method: ctor,
                fn_type: self.session.graph.defns.get(ctor).function_type(),
                assignments: None,
                receiver: None,
                construct: None,
                value: None,
                provision,
                culled: true,
            };
            let Some(fn_type) = candidate.fn_type else {
                out.push(candidate);
                continue;
            };
            let params = self.session.graph.types.function_type(fn_type).params.clone();
            candidate.assignments = ParameterAssignments::assign(&params, &keywords(args));
            let Some(assignments) = candidate.assignments.clone() else {
                out.push(candidate);
                continue;
            };
            let Some(env) = self.infer_type_args(span, &vars, &params, &assignments, args, provision)? else {
                out.push(candidate);
                continue;
            };

            let inst = self.session.instantiate(span, class, &env, Expect::NONE)?;
            self.analyze_defn(inst, AnalysisTask::PrepConstruction)?;
            let name = self.session.graph.defns.get(ctor).name.clone();
            let inst_ctor = self
                .session
                .graph
                .defns
                .get(inst)
                .member_scope()
                .map(|scope| self.session.graph.scopes.lookup_local(scope, &name).to_vec())
                .unwrap_or_default()
                .into_iter()
                .find(|d| self.same_decl(*d, ctor));
            let Some(inst_ctor) = inst_ctor else {
                ice!("instance of '{}' lost its constructor", self.session.graph.display_defn(class));
            };
            self.check_access(span, inst_ctor);
            let inst_ty = self.session.graph.defns.get(inst).type_value();
            let mut found = Vec::new();
            let construct_ty = if construct { inst_ty.map(QualifiedType::plain) } else { None };
            self.add_method_candidate(span, inst_ctor, None, construct_ty, args, &mut found)?;
            for mut c in found {
                c.origin = ctor;
                out.push(c);
            }
        }
        Ok(false)
    }

    fn same_decl(&self, a: DefnId, b: DefnId) -> bool {
        if a == b {
            return true;
        }
        let defns = &self.session.graph.defns;
        match (&defns.get(a).ast, &defns.get(b).ast) {
            (Some(x), Some(y)) => std::rc::Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    /// Same-named functions in the member scopes of each argument's type
    /// and its ancestors.
    fn add_adl_candidates(
        &mut self,
        span: Span,
        name: &str,
        args: &[CallArg],
        out: &mut Vec<CallCandidate>,
    ) -> SemaResult<()> {
        for arg in args {
            let ty = arg.ty;
            if !self.session.graph.is_singular(ty.ty)
                || self.session.graph.composite_class(ty.ty).is_none()
            {
                continue;
            }
            self.analyze_type(ty, AnalysisTask::PrepMemberLookup)?;
            for ancestor in self.session.graph.ancestors_of(self.session.graph.types.deref(ty).ty) {
                let Some(owner) = self.session.graph.type_defn_of(ancestor) else {
                    continue;
                };
                self.analyze_defn(owner, AnalysisTask::PrepMemberLookup)?;
                let Some(scope) = self.session.graph.defns.get(owner).member_scope() else {
                    continue;
                };
                let found = self.session.graph.scopes.lookup_local(scope, name).to_vec();
                for d in found {
                    if matches!(self.session.graph.defns.get(d).kind, DefnKind::Function(_)) {
                        tracing::trace!(target: "quill::call", name, via = %self.session.graph.display_type(ancestor), "adl");
                        self.add_method_candidate(span, d, None, None, args, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn select_candidate(
        &mut self,
        span: Span,
        name: &str,
        mut candidates: Vec<CallCandidate>,
        mut args: Vec<CallArg>,
    ) -> SemaResult<Expr> {
        let arg_types: Vec<QualifiedType> = args.iter().map(|a| a.ty).collect();
        let shown = self.display_args(&arg_types);

        // Integer literals take whichever parameter type the chosen
        // candidate gives them.
        let mut literal_params: Vec<Option<TypeId>> = Vec::with_capacity(args.len());
        for (index, ty) in arg_types.iter().enumerate() {
            if !self.session.graph.types.is_unsized_int(ty.ty) {
                literal_params.push(None);
                continue;
            }
            let choices: Vec<AmbiguousChoice> = candidates
                .iter()
                .filter(|c| !c.culled)
                .filter_map(|c| {
                    c.param_type(self, index).map(|ty| AmbiguousChoice {
                        ty,
                        provisions: Provisions::flag(c.provision),
                    })
                })
                .collect();
            let ambiguous = self
                .session
                .graph
                .types
                .ambiguous(AmbiguousKind::Parameter, choices);
            literal_params.push(Some(ambiguous));
        }

        let rel = self.session.graph.relation();
        let rejected: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                c.culled
                    || arg_types.iter().enumerate().any(|(i, at)| {
                        c.param_type(self, i)
                            .is_none_or(|pt| !rel.is_subtype(*at, pt))
                    })
            })
            .map(|(i, _)| i)
            .collect();
        for index in rejected {
            candidates[index].culled = true;
            self.session
                .graph
                .types
                .cull_provision(candidates[index].provision);
        }

        let survivors: Vec<usize> = (0..candidates.len())
            .filter(|i| !candidates[*i].culled)
            .collect();
        if survivors.is_empty() {
            self.error(
                span,
                format!("No matching method for call to {name}({shown}), candidates are:"),
            );
            for c in &candidates {
                let text = self.session.graph.display_signature(c.origin);
                let at = self.session.graph.defns.get(c.origin).span;
                self.info(at, text);
            }
            return Ok(Expr::Error(span));
        }

        let winners = self.most_specific(&candidates, &survivors, args.len());
        if winners.len() > 1 {
            self.error(span, format!("Ambiguous overloaded call to {name}({shown}):"));
            for index in &winners {
                let method = candidates[*index].method;
                let text = self.session.graph.display_signature(method);
                let at = self.session.graph.defns.get(method).span;
                self.info(at, text);
            }
            return Ok(Expr::Error(span));
        }
        let winner = winners[0];
        for (index, c) in candidates.iter().enumerate() {
            if index != winner {
                self.session.graph.types.cull_provision(c.provision);
            }
        }

        for (arg, literal) in args.iter_mut().zip(literal_params) {
            let Some(ambiguous) = literal else {
                continue;
            };
            let mut choices = Vec::new();
            self.session
                .graph
                .expand(QualifiedType::plain(ambiguous), &mut choices);
            if let ([narrowed], Expr::Const { ty, .. }) = (choices.as_slice(), &mut arg.expr) {
                *ty = *narrowed;
            }
        }

        let chosen = candidates.swap_remove(winner);
        let ret = chosen
            .ret(self)
            .unwrap_or_else(|| self.session.graph.primitive(Primitive::Void));
        tracing::debug!(
            target: "quill::call",
            name,
            method = %self.session.graph.display_defn(chosen.method),
            "selected"
        );
        let args: Vec<Expr> = args.into_iter().map(|a| a.expr).collect();
        if let Some(callee) = chosen.value {
            return Ok(Expr::CallValue {
                span,
                callee: Box::new(callee),
                args,
                ty: ret,
            });
        }
        self.analyze_later(chosen.method);
        Ok(match chosen.construct {
            Some(ty) => Expr::Construct {
                span,
                ty,
                ctor: chosen.method,
                args,
            },
            None => Expr::Call {
                span,
                method: chosen.method,
                receiver: chosen.receiver.map(Box::new),
                args,
                ty: ret,
            },
        })
    }

    /// Survivors that no other survivor dominates. A dominates B when each
    /// argument's parameter in A is at least as specific as in B, and one
    /// is strictly more specific.
    fn most_specific(&self, candidates: &[CallCandidate], survivors: &[usize], arity: usize) -> Vec<usize> {
        let rel = self.session.graph.relation();
        let dominates = |a: &CallCandidate, b: &CallCandidate| {
            let mut more = false;
            for arg in 0..arity {
                let (Some(pa), Some(pb)) = (a.param_type(self, arg), b.param_type(self, arg)) else {
                    return false;
                };
                match rel.is_more_specific(pa, pb) {
                    Specificity::MoreSpecific => more = true,
                    Specificity::EqualSpecificity => {}
                    Specificity::NotMoreSpecific => return false,
                }
            }
            more
        };
        survivors
            .iter()
            .copied()
            .filter(|b| {
                !survivors
                    .iter()
                    .any(|a| a != b && dominates(&candidates[*a], &candidates[*b]))
            })
            .collect()
    }
}

fn keywords(args: &[CallArg]) -> Vec<Option<&str>> {
    args.iter().map(|a| a.keyword.as_deref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> ParamType {
        ParamType::new(name, QualifiedType::plain(TypeId(0)))
    }

    #[test]
    fn positional_and_keyword_arguments() {
        let params = vec![param("a"), param("b")];
        let assigned = ParameterAssignments::assign(&params, &[Some("b"), None]).expect("assignable");
        assert_eq!(assigned.arg_params, vec![1, 0]);
        assert!(ParameterAssignments::assign(&params, &[None]).is_none());
        assert!(ParameterAssignments::assign(&params, &[None, Some("a")]).is_none());
        assert!(ParameterAssignments::assign(&params, &[None, None, None]).is_none());
    }

    #[test]
    fn excess_arguments_collapse_into_variadic() {
        let mut rest = param("rest");
        rest.variadic = true;
        let params = vec![param("first"), rest];
        let assigned =
            ParameterAssignments::assign(&params, &[None, None, None, None]).expect("assignable");
        assert_eq!(assigned.arg_params, vec![0, 1, 1, 1]);
        let only_first = ParameterAssignments::assign(&params, &[None]).expect("assignable");
        assert_eq!(only_first.arg_params, vec![0]);
    }

    #[test]
    fn keyword_only_parameters_skip_positionals() {
        let mut flag = param("flag");
        flag.keyword_only = true;
        flag.has_default = true;
        let params = vec![flag, param("value")];
        let assigned = ParameterAssignments::assign(&params, &[None]).expect("assignable");
        assert_eq!(assigned.arg_params, vec![1]);
        let unknown = ParameterAssignments::assign(&params, &[None, Some("missing")]);
        assert!(unknown.is_none());
    }
}
