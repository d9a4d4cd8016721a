//! Name resolution, lazy per-definition analysis and call resolution.
//!
//! An [`Analyzer`] borrows the session together with an explicit stack of
//! scopes to search, the module it works in and the definition on whose
//! behalf it resolves names (used for access and static-context checks).
//! Resolving one definition from inside another opens a nested analyzer for
//! the target's own context, so no scope chain is ever rebound in place.

mod access;
mod call;
mod expr;
mod passes;
mod specialize;
mod types;

pub use call::{CallCandidate, ParameterAssignments};

use quill_ast::{Node, NodeKind, Span};

use crate::defn::{DefnId, DefnKind, Pass, StorageClass};
use crate::diagnostics::DiagnosticSink;
use crate::error::{SemaResult, SemanticError};
use crate::expr::Expr;
use crate::scope::{ScopeId, ScopeKind, ScopeStack};
use crate::session::Session;
use crate::types::{QualifiedType, TypeKind};

/// The minimum a caller needs from a definition. The dispatcher runs only
/// the passes required for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalysisTask {
    PrepTypeComparison,
    PrepMemberLookup,
    PrepOverloadSelection,
    PrepConstruction,
    PrepCallOrUse,
    PrepCodeGeneration,
    InferType,
}

impl AnalysisTask {
    fn needs_members(self) -> bool {
        !matches!(
            self,
            AnalysisTask::PrepTypeComparison | AnalysisTask::InferType
        )
    }

    fn needs_signatures(self) -> bool {
        matches!(
            self,
            AnalysisTask::PrepOverloadSelection
                | AnalysisTask::PrepConstruction
                | AnalysisTask::PrepCallOrUse
                | AnalysisTask::PrepCodeGeneration
        )
    }
}

pub struct Analyzer<'s> {
    pub(crate) session: &'s mut Session,
    scopes: ScopeStack,
    module: Option<DefnId>,
    subject: Option<DefnId>,
}

impl<'s> Analyzer<'s> {
    pub fn new(
        session: &'s mut Session,
        scopes: ScopeStack,
        module: Option<DefnId>,
        subject: Option<DefnId>,
    ) -> Self {
        Self {
            session,
            scopes,
            module,
            subject,
        }
    }

    /// An analyzer positioned inside `defn`: members of modules, namespaces
    /// and types are in scope, and functions see their declaring context.
    pub fn for_defn(session: &'s mut Session, defn: DefnId) -> Self {
        let d = session.graph.defns.get(defn);
        let scope = match (&d.kind, d.member_scope()) {
            (DefnKind::Function(_) | DefnKind::Variable(_) | DefnKind::Parameter(_), _) => None,
            (_, members) => members,
        }
        .or_else(|| session.decl_scope(defn));
        Self::at_scope(session, scope, defn)
    }

    fn at_scope(session: &'s mut Session, scope: Option<ScopeId>, subject: DefnId) -> Self {
        let scopes = match scope {
            Some(s) => ScopeStack::from_chain(&session.graph.scopes, s),
            None => ScopeStack::from_chain(&session.graph.scopes, session.graph.builtins.scope),
        };
        let module = session.graph.defns.get(subject).module;
        Self::new(session, scopes, module, Some(subject))
    }

    pub fn session(&mut self) -> &mut Session {
        self.session
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub fn module(&self) -> Option<DefnId> {
        self.module
    }

    pub fn subject(&self) -> Option<DefnId> {
        self.subject
    }

    pub fn push_scope(&mut self, scope: ScopeId) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<ScopeId> {
        self.scopes.pop()
    }

    /// Analyzer for the declaration context of `defn`, borrowing this one's
    /// session.
    fn nested(&mut self, defn: DefnId) -> Analyzer<'_> {
        Analyzer::for_defn(self.session, defn)
    }

    fn nested_at_decl(&mut self, defn: DefnId) -> Analyzer<'_> {
        let scope = self.session.decl_scope(defn);
        Analyzer::at_scope(self.session, scope, defn)
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.session.diag.error(span, message.into());
    }

    fn info(&mut self, span: Span, message: impl Into<String>) {
        self.session.diag.info(span, message.into());
    }

    fn fatal(&mut self, span: Span, message: impl Into<String>) -> SemanticError {
        self.session.diag.fatal(span, message.into())
    }

    /// Resolves a dotted, possibly specialized name to candidate expressions.
    /// Finding nothing is not reported here; callers decide.
    pub fn lookup_name(&mut self, node: &Node) -> SemaResult<Vec<Expr>> {
        let mut out = Vec::new();
        let mut path = String::new();
        self.lookup_name_recurse(node, &mut path, &mut out)?;
        Ok(out)
    }

    /// `path` receives the import path tried for `node` when it was not
    /// found lexically, so a longer path can be retried one level up.
    fn lookup_name_recurse(
        &mut self,
        node: &Node,
        path: &mut String,
        out: &mut Vec<Expr>,
    ) -> SemaResult<bool> {
        match &node.kind {
            NodeKind::Ident(name) => {
                let found = self.lookup_ident(name, node.span)?;
                if !found.is_empty() {
                    out.extend(found);
                    return Ok(true);
                }
                path.clear();
                path.push_str(name);
                self.import_name(path, node.span, out)
            }
            NodeKind::Member { qualifier, member } if !qualifier.is_name() => {
                let base = self.reduce_expr(qualifier)?;
                let found = self.find_member_of(&base, &member.node, member.span)?;
                let any = !found.is_empty();
                out.extend(found);
                Ok(any)
            }
            NodeKind::Member { qualifier, member } => {
                let mut bases = Vec::new();
                let mut qualifier_path = String::new();
                if self.lookup_name_recurse(qualifier, &mut qualifier_path, &mut bases)? {
                    let mut any = false;
                    for base in &bases {
                        let found = self.find_member_of(base, &member.node, member.span)?;
                        any |= !found.is_empty();
                        out.extend(found);
                    }
                    return Ok(any);
                }
                if qualifier_path.is_empty() {
                    return Ok(false);
                }
                *path = format!("{qualifier_path}.{}", member.node);
                self.import_name(path, node.span, out)
            }
            NodeKind::Specialize { base, args } => {
                self.resolve_specialization(node.span, base, args, out)
            }
            _ => Ok(false),
        }
    }

    /// Searches the scope stack innermost first. The first scope with a
    /// match wins.
    pub fn lookup_ident(&mut self, name: &str, span: Span) -> SemaResult<Vec<Expr>> {
        let stack: Vec<ScopeId> = self.scopes.iter().collect();
        for scope in stack {
            let found = self.find_in_scope(scope, name)?;
            if found.is_empty() {
                continue;
            }
            tracing::trace!(
                target: "quill::lookup",
                name,
                scope = %self.session.graph.scopes.get(scope).name,
                count = found.len(),
                "found"
            );
            if let ScopeKind::Members(_) = self.session.graph.scopes.kind(scope) {
                self.check_static_context(name, span, &found)?;
            }
            if !self.is_overload_set(&found) {
                self.error(span, format!("Ambiguous reference to '{name}'"));
                for d in &found {
                    let defn = self.session.graph.defns.get(*d);
                    let (at, text) = (defn.span, self.session.graph.display_defn(*d));
                    self.info(at, format!("candidate: {text}"));
                }
                return Ok(vec![Expr::Error(span)]);
            }
            return self.defn_list_as_exprs(&found, None, span);
        }
        Ok(Vec::new())
    }

    /// Several definitions under one name are fine when they are all
    /// functions (overloads) or all generic types (specializations).
    fn is_overload_set(&self, found: &[DefnId]) -> bool {
        if found.len() < 2 {
            return true;
        }
        let defns = &self.session.graph.defns;
        found
            .iter()
            .all(|d| matches!(defns.get(*d).kind, DefnKind::Function(_)))
            || found.iter().all(|d| {
                let d = defns.get(*d);
                matches!(d.kind, DefnKind::Type(_)) && d.template.is_some()
            })
    }

    fn check_static_context(&mut self, name: &str, span: Span, found: &[DefnId]) -> SemaResult<()> {
        let Some(subject) = self.subject else {
            return Ok(());
        };
        let subject = self.session.graph.defns.get(subject);
        if !matches!(subject.kind, DefnKind::Function(_)) || !subject.is_static() {
            return Ok(());
        }
        let defns = &self.session.graph.defns;
        let all_instance = found.iter().all(|d| {
            let d = defns.get(*d);
            d.storage == StorageClass::Instance
                && matches!(d.kind, DefnKind::Function(_) | DefnKind::Variable(_))
        });
        if all_instance {
            return Err(self.fatal(
                span,
                format!("Cannot access non-static member '{name}' from static method."),
            ));
        }
        Ok(())
    }

    /// Scope-provider lookup with imports flattened to their targets.
    pub fn find_in_scope(&mut self, scope: ScopeId, name: &str) -> SemaResult<Vec<DefnId>> {
        if let ScopeKind::Members(owner) = self.session.graph.scopes.kind(scope) {
            self.prepare_member_lookup(owner)?;
        }
        let raw = self.session.graph.lookup_member(scope, name, true);
        Ok(self.flatten_imports(raw))
    }

    fn flatten_imports(&self, defns: Vec<DefnId>) -> Vec<DefnId> {
        let mut out = Vec::with_capacity(defns.len());
        for d in defns {
            match &self.session.graph.defns.get(d).kind {
                DefnKind::ExplicitImport(targets) => out.extend(targets.iter().copied()),
                _ => out.push(d),
            }
        }
        out
    }

    /// Member tables of a type and all of its ancestors must be populated
    /// before an inheriting lookup walks them.
    fn prepare_member_lookup(&mut self, owner: DefnId) -> SemaResult<()> {
        self.analyze_defn(owner, AnalysisTask::PrepMemberLookup)?;
        if let Some(ty) = self.session.graph.defns.get(owner).type_value() {
            for ancestor in self.session.graph.ancestors_of(ty).into_iter().skip(1) {
                if let Some(defn) = self.session.graph.type_defn_of(ancestor) {
                    self.analyze_defn(defn, AnalysisTask::PrepMemberLookup)?;
                }
            }
        }
        Ok(())
    }

    /// Looks `name` up as a member of whatever `base` denotes.
    pub fn find_member_of(&mut self, base: &Expr, name: &str, span: Span) -> SemaResult<Vec<Expr>> {
        let (scope, receiver) = match base {
            Expr::Error(_) => return Ok(Vec::new()),
            Expr::ScopeName { defn, .. } => {
                self.analyze_defn(*defn, AnalysisTask::PrepMemberLookup)?;
                (self.session.graph.defns.get(*defn).member_scope(), None)
            }
            Expr::TypeLiteral { ty, .. } => {
                let ty = self.session.graph.types.dealias(*ty);
                self.analyze_type(ty, AnalysisTask::PrepMemberLookup)?;
                (self.session.graph.member_scope_of(ty.ty), None)
            }
            value => {
                let Some(ty) = self.infer_type(value) else {
                    return Ok(Vec::new());
                };
                if self.session.graph.types.is_unsized_int(ty.ty) {
                    self.error(
                        span,
                        format!(
                            "Can't look up member '{name}' of an integer constant of unknown size; cast it to a sized integer type first"
                        ),
                    );
                    return Ok(vec![Expr::Error(span)]);
                }
                self.analyze_type(ty, AnalysisTask::PrepMemberLookup)?;
                (self.session.graph.member_scope_of(ty.ty), Some(value.clone()))
            }
        };
        let Some(scope) = scope else {
            return Ok(Vec::new());
        };
        let found = self.find_in_scope(scope, name)?;
        for d in &found {
            self.check_access(span, *d);
        }
        self.defn_list_as_exprs(&found, receiver, span)
    }

    /// Asks the module loader for `path`.
    pub fn import_name(&mut self, path: &str, span: Span, out: &mut Vec<Expr>) -> SemaResult<bool> {
        match self.session.import(path, false) {
            Some(defns) => {
                let exprs = self.defn_list_as_exprs(&defns, None, span)?;
                out.extend(exprs);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Members of a generic declaration before any instantiation exists.
    pub fn lookup_template_member(&mut self, template: DefnId, name: &str) -> SemaResult<Vec<DefnId>> {
        self.analyze_defn(template, AnalysisTask::PrepMemberLookup)?;
        let Some(scope) = self.session.graph.defns.get(template).member_scope() else {
            return Ok(Vec::new());
        };
        Ok(self.session.graph.scopes.lookup_local(scope, name).to_vec())
    }

    pub fn defn_as_expr(
        &mut self,
        defn: DefnId,
        base: Option<Expr>,
        span: Span,
    ) -> SemaResult<Option<Expr>> {
        let kind = self.session.graph.defns.get(defn).kind.clone();
        let base = base.map(Box::new);
        let expr = match kind {
            DefnKind::Type(_) => {
                self.analyze_defn(defn, AnalysisTask::PrepTypeComparison)?;
                self.session
                    .graph
                    .defns
                    .get(defn)
                    .type_value()
                    .map(|ty| Expr::TypeLiteral {
                        span,
                        ty: QualifiedType::plain(ty),
                    })
            }
            DefnKind::Function(_) => {
                self.analyze_defn(defn, AnalysisTask::PrepOverloadSelection)?;
                Some(Expr::LValue {
                    span,
                    defn,
                    base,
                    ty: self.session.graph.defns.get(defn).value_type(),
                })
            }
            DefnKind::Variable(_) => {
                self.analyze_defn(defn, AnalysisTask::InferType)?;
                let d = self.session.graph.defns.get(defn);
                match (&d.kind, d.value_type()) {
                    (DefnKind::Variable(v), Some(ty)) if v.is_let && v.value.is_some() => {
                        v.value.clone().map(|value| Expr::Const { span, value, ty })
                    }
                    (_, ty) => Some(Expr::LValue {
                        span,
                        defn,
                        base,
                        ty,
                    }),
                }
            }
            DefnKind::Parameter(p) => Some(Expr::LValue {
                span,
                defn,
                base,
                ty: p.ty,
            }),
            DefnKind::Namespace { .. } | DefnKind::Module { .. } => {
                Some(Expr::ScopeName { span, defn })
            }
            DefnKind::ExplicitImport(_) => None,
        };
        Ok(expr)
    }

    pub fn defn_list_as_exprs(
        &mut self,
        defns: &[DefnId],
        base: Option<Expr>,
        span: Span,
    ) -> SemaResult<Vec<Expr>> {
        let mut out = Vec::with_capacity(defns.len());
        for defn in self.flatten_imports(defns.to_vec()) {
            if let Some(expr) = self.defn_as_expr(defn, base.clone(), span)? {
                out.push(expr);
            }
        }
        Ok(out)
    }

    /// Types named by a list of expressions. Constants become unit types.
    /// `None` if any expression is not a type.
    pub fn types_from_exprs(&mut self, exprs: &[Expr]) -> Option<Vec<QualifiedType>> {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::TypeLiteral { ty, .. } => out.push(*ty),
                Expr::Const { value, .. } => {
                    out.push(QualifiedType::plain(self.session.graph.types.unit(value.clone())))
                }
                _ => return None,
            }
        }
        Some(out)
    }

    /// The settled type of an expression, solving inference variables and
    /// collapsing ambiguous types that have narrowed to one choice.
    pub fn infer_type(&mut self, expr: &Expr) -> Option<QualifiedType> {
        let ty = expr.ty()?;
        let graph = &self.session.graph;
        let ty = graph.types.deref(ty);
        match graph.types.kind(ty.ty) {
            TypeKind::Assignment(_) => graph.find_singular_solution(ty.ty),
            TypeKind::Ambiguous(_) => {
                let mut choices = Vec::new();
                graph.expand(ty, &mut choices);
                match choices.as_slice() {
                    [single] => Some(*single),
                    _ => Some(ty),
                }
            }
            _ => Some(ty),
        }
    }

    pub fn analyze_type(&mut self, ty: QualifiedType, task: AnalysisTask) -> SemaResult<bool> {
        let ty = self.session.graph.types.deref(ty);
        match self.session.graph.types.kind(ty.ty) {
            TypeKind::Composite { defn, .. } | TypeKind::Enum { defn, .. } => {
                let defn = *defn;
                self.analyze_defn(defn, task)
            }
            TypeKind::Address(elem)
            | TypeKind::Pointer(elem)
            | TypeKind::NativeArray { elem, .. }
            | TypeKind::FlexibleArray(elem)
            | TypeKind::TypeLiteral(elem) => {
                let elem = *elem;
                self.analyze_type(elem, task)
            }
            TypeKind::Tuple(members) | TypeKind::Union(members) => {
                let mut ok = true;
                for member in members.clone() {
                    ok &= self.analyze_type(member, task)?;
                }
                Ok(ok)
            }
            _ => Ok(true),
        }
    }

    /// Runs the passes `task` needs on `defn`. Passes already finished or
    /// in progress further up the stack are skipped.
    pub fn analyze_defn(&mut self, defn: DefnId, task: AnalysisTask) -> SemaResult<bool> {
        let d = self.session.graph.defns.get(defn);
        if self.session.trace.is_trace_enabled(&d.qualified_name) {
            tracing::info!(target: "quill::analysis", defn = %d.qualified_name, ?task, "analyze");
        } else {
            tracing::trace!(target: "quill::analysis", defn = %d.qualified_name, ?task, "analyze");
        }
        let generic = self.session.graph.defns.is_within_template(defn);
        let has_syntax = d.ast.is_some();

        match d.kind {
            DefnKind::Type(_) => {
                if !has_syntax {
                    return Ok(true);
                }
                self.resolve_template_params(defn)?;
                if self.is_alias(defn) {
                    self.resolve_alias(defn)?;
                    return Ok(true);
                }
                self.resolve_base_types(defn)?;
                if task.needs_members() {
                    self.create_members(defn)?;
                }
                if task.needs_signatures() {
                    let members = self.member_defns(defn);
                    for member in members {
                        if matches!(self.session.graph.defns.get(member).kind, DefnKind::Function(_)) {
                            self.analyze_defn(member, AnalysisTask::PrepOverloadSelection)?;
                        }
                    }
                }
                if task == AnalysisTask::PrepCodeGeneration && !generic {
                    self.prepare_codegen(defn)?;
                }
            }
            DefnKind::Function(_) => {
                self.resolve_template_params(defn)?;
                if task != AnalysisTask::PrepTypeComparison {
                    self.resolve_signature(defn)?;
                }
                if task == AnalysisTask::PrepCodeGeneration && !generic {
                    self.prepare_codegen(defn)?;
                }
            }
            DefnKind::Variable(_) => {
                self.resolve_var_type(defn)?;
                if task == AnalysisTask::PrepCodeGeneration && !generic {
                    self.prepare_codegen(defn)?;
                }
            }
            DefnKind::Namespace { .. } | DefnKind::Module { .. } => {
                self.create_members(defn)?;
                if task == AnalysisTask::PrepCodeGeneration {
                    self.prepare_codegen(defn)?;
                }
            }
            DefnKind::Parameter(_) | DefnKind::ExplicitImport(_) => {}
        }
        Ok(true)
    }

    pub fn analyze_later(&mut self, defn: DefnId) {
        if !self.session.graph.defns.is_within_template(defn) {
            self.session.analyze_later(defn);
        }
    }

    fn member_defns(&self, defn: DefnId) -> Vec<DefnId> {
        self.session
            .graph
            .defns
            .get(defn)
            .member_scope()
            .map(|scope| self.session.graph.scopes.members(scope).to_vec())
            .unwrap_or_default()
    }

    /// Emits the active scope stack as debug events.
    pub fn dump_scope_hierarchy(&self) {
        for (depth, scope) in self.scopes.iter().enumerate() {
            let data = self.session.graph.scopes.get(scope);
            tracing::debug!(
                target: "quill::lookup",
                depth,
                scope = %data.name,
                kind = ?data.kind,
                members = self.session.graph.scopes.members(scope).len(),
                "scope"
            );
        }
    }

    pub(crate) fn pass_finished(&self, defn: DefnId, pass: Pass) -> bool {
        self.session.graph.defns.get(defn).passes.is_finished(pass)
    }
}
