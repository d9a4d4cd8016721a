//! Declaration and the per-definition analysis passes.

use std::rc::Rc;

use quill_ast::{Decl, DeclKind, TypeParam};

use crate::defn::{
    Defn, DefnId, DefnKind, FunctionDefn, ParameterDefn, Pass, StorageClass, Traits, TypeDefn,
    VariableDefn,
};
use crate::diagnostics::DiagnosticSink;
use crate::error::SemaResult;
use crate::expr::Expr;
use crate::scope::{ScopeId, ScopeKind};
use crate::session::Session;
use crate::template::InstanceId;
use crate::types::{
    CompositeClass, ConstValue, FunctionType, ParamType, Primitive, QualifiedType, TypeId,
    TypeKind, TypeVariable,
};

use super::{AnalysisTask, Analyzer};

impl Session {
    /// Scope that a definition's own syntax resolves names in: the template
    /// parameter scope for generics, otherwise where it was declared.
    pub(crate) fn decl_scope(&self, defn: DefnId) -> Option<ScopeId> {
        let d = self.graph.defns.get(defn);
        match d.template {
            Some(t) if d.instance.is_none() => Some(self.graph.templates.get(t).param_scope),
            _ => d.defining_scope,
        }
    }

    /// Adds the definition for `ast` to `scope`. Several functions may share
    /// a name, and so may several generic types; anything else conflicts.
    pub fn declare(
        &mut self,
        ast: Rc<Decl>,
        scope: ScopeId,
        parent: Option<DefnId>,
        module: Option<DefnId>,
    ) -> SemaResult<DefnId> {
        let name = ast.name.node.clone();
        let existing = self.graph.scopes.lookup_local(scope, &name).to_vec();
        let conflict = existing
            .iter()
            .find(|prev| !self.can_overload(**prev, &ast))
            .copied();

        let id = self.create_defn(Rc::clone(&ast), scope, parent, module, None)?;
        match conflict {
            Some(prev) => {
                self.diag.error(
                    ast.name.span,
                    format!("Definition of '{name}' conflicts with earlier definition"),
                );
                let at = self.graph.defns.get(prev).span;
                self.diag
                    .info(at, format!("'{name}' was previously defined here"));
            }
            None => self.graph.scopes.add_member(scope, &name, id),
        }
        Ok(id)
    }

    fn can_overload(&self, prev: DefnId, ast: &Decl) -> bool {
        match (&self.graph.defns.get(prev).kind, &ast.kind) {
            (DefnKind::Function(_), DeclKind::Function { .. }) => true,
            (DefnKind::Type(_), DeclKind::Composite { .. }) => {
                self.graph.defns.get(prev).template.is_some() && ast.is_generic()
            }
            _ => false,
        }
    }

    /// Allocates the definition for a declaration without registering it in
    /// any scope. Signatures, bases and members are filled in by the passes.
    pub(crate) fn create_defn(
        &mut self,
        ast: Rc<Decl>,
        scope: ScopeId,
        parent: Option<DefnId>,
        module: Option<DefnId>,
        instance: Option<InstanceId>,
    ) -> SemaResult<DefnId> {
        let name = ast.name.node.clone();
        let next = DefnId(self.graph.defns.len() as u32);
        let in_type = parent.is_some_and(|p| {
            matches!(self.graph.defns.get(p).kind, DefnKind::Type(_))
        });

        let kind = match &ast.kind {
            DeclKind::Composite { .. } | DeclKind::Enum { .. } | DeclKind::Alias { .. } => {
                DefnKind::Type(TypeDefn::default())
            }
            DeclKind::Function { .. } => DefnKind::Function(FunctionDefn {
                is_ctor: name == "construct",
                ..FunctionDefn::default()
            }),
            DeclKind::Var { is_let, .. } => DefnKind::Variable(VariableDefn {
                is_let: *is_let,
                ..VariableDefn::default()
            }),
            DeclKind::Namespace { .. } => {
                let ns_scope =
                    self.graph
                        .scopes
                        .new_scope(ScopeKind::Namespace(next), name.clone(), Some(scope));
                DefnKind::Namespace { scope: ns_scope }
            }
        };

        let mut defn = Defn::new(name.clone(), ast.name.span, kind);
        defn.visibility = ast.visibility;
        defn.storage = if ast.modifiers.is_static {
            StorageClass::Static
        } else if in_type && matches!(ast.kind, DeclKind::Function { .. } | DeclKind::Var { .. }) {
            StorageClass::Instance
        } else {
            StorageClass::Global
        };
        let modifiers = ast.modifiers;
        for (set, t) in [
            (modifiers.is_final, Traits::FINAL),
            (modifiers.is_abstract, Traits::ABSTRACT),
            (modifiers.is_readonly, Traits::READONLY),
            (modifiers.is_extern, Traits::EXTERN),
            (name == "construct", Traits::CTOR),
        ] {
            if set {
                defn.traits.insert(t);
            }
        }
        defn.qualified_name = match parent {
            Some(p) => format!("{}.{}", self.graph.defns.get(p).qualified_name, name),
            None => name.clone(),
        };
        defn.parent = parent;
        defn.defining_scope = Some(scope);
        defn.module = module;
        defn.instance = instance;
        defn.singular =
            !ast.is_generic() && parent.is_none_or(|p| self.graph.defns.get(p).singular);
        let is_generic = ast.is_generic();
        let composite = match &ast.kind {
            DeclKind::Composite { kind, .. } => Some(CompositeClass::from(*kind)),
            _ => None,
        };
        let has_members = matches!(ast.kind, DeclKind::Composite { .. } | DeclKind::Enum { .. });
        defn.ast = Some(ast);

        let id = self.graph.defns.alloc(defn);
        if is_generic && instance.is_none() {
            self.graph
                .templates
                .create(&mut self.graph.defns, &mut self.graph.scopes, id);
        }
        if has_members {
            let members_parent = self.decl_scope(id);
            let members = self
                .graph
                .scopes
                .new_scope(ScopeKind::Members(id), name, members_parent);
            let ty = composite.map(|class| self.graph.types.composite(class, id));
            if let Some(td) = self.graph.defns.get_mut(id).type_defn_mut() {
                td.members = Some(members);
                td.ty = ty;
            }
        }
        tracing::trace!(
            target: "quill::analysis",
            defn = %self.graph.defns.get(id).qualified_name,
            kind = self.graph.defns.get(id).kind.name(),
            "created"
        );
        Ok(id)
    }
}

impl Analyzer<'_> {
    fn begin_pass(&mut self, defn: DefnId, pass: Pass) -> bool {
        let started = self.session.graph.defns.get_mut(defn).passes.begin(pass);
        let name = &self.session.graph.defns.get(defn).qualified_name;
        if started && self.session.trace.is_trace_enabled(name) {
            tracing::debug!(target: "quill::analysis", defn = %name, %pass, "begin");
        }
        started
    }

    fn finish_pass(&mut self, defn: DefnId, pass: Pass) {
        self.session.graph.defns.get_mut(defn).passes.finish(pass);
    }

    fn syntax(&self, defn: DefnId) -> Option<Rc<Decl>> {
        self.session.graph.defns.get(defn).ast.clone()
    }

    pub(super) fn is_alias(&self, defn: DefnId) -> bool {
        self.session
            .graph
            .defns
            .get(defn)
            .ast
            .as_ref()
            .is_some_and(|ast| matches!(ast.kind, DeclKind::Alias { .. }))
    }

    /// Creates the pattern variables of a generic declaration and binds its
    /// parameter tuple. Variables are registered before any slot is
    /// resolved, so value types and fixed patterns may mention them.
    pub(super) fn resolve_template_params(&mut self, defn: DefnId) -> SemaResult<()> {
        let d = self.session.graph.defns.get(defn);
        let Some(template) = d.template else {
            return Ok(());
        };
        if d.instance.is_some() || self.session.graph.templates.get(template).is_bound() {
            return Ok(());
        }
        let Some(ast) = self.syntax(defn) else {
            return Ok(());
        };
        if !self.begin_pass(defn, Pass::ResolveTemplateParams) {
            return Ok(());
        }

        let param_scope = self.session.graph.templates.get(template).param_scope;
        let mut slots = Vec::with_capacity(ast.type_params.len());
        for param in &ast.type_params {
            match param {
                TypeParam::Var { name, variadic, .. } => {
                    let mut tv = TypeVariable::new(name.node.clone(), name.span);
                    tv.variadic = *variadic;
                    let var = self.session.graph.types.type_var(tv);
                    self.session.declare_type_var(param_scope, defn, &name.node, var);
                    slots.push(Some(var));
                }
                TypeParam::Fixed(_) => slots.push(None),
            }
        }

        let mut params = Vec::with_capacity(slots.len());
        let mut an = self.nested_at_decl(defn);
        for (param, slot) in ast.type_params.iter().zip(&slots) {
            match (param, slot) {
                (TypeParam::Var { value_type, .. }, Some(var)) => {
                    if let Some(node) = value_type {
                        let vt = an.resolve_type(node)?;
                        an.session.graph.types.type_var_data_mut(*var).value_type = Some(vt);
                    }
                    params.push(QualifiedType::plain(*var));
                }
                (TypeParam::Fixed(pattern), _) => params.push(an.resolve_type(pattern)?),
                (TypeParam::Var { .. }, None) => {}
            }
        }
        self.session.set_type_params(template, params)?;
        self.finish_pass(defn, Pass::ResolveTemplateParams);
        Ok(())
    }

    pub(super) fn resolve_base_types(&mut self, defn: DefnId) -> SemaResult<()> {
        let Some(ast) = self.syntax(defn) else {
            return Ok(());
        };
        if !self.begin_pass(defn, Pass::ResolveBaseTypes) {
            return Ok(());
        }
        match &ast.kind {
            DeclKind::Composite { kind, bases, .. } => {
                let class = CompositeClass::from(*kind);
                let mut resolved = Vec::with_capacity(bases.len() + 1);
                {
                    let mut an = self.nested_at_decl(defn);
                    for base in bases {
                        let qt = an.resolve_type(base)?;
                        if an.session.graph.types.is_error(qt.ty) {
                            continue;
                        }
                        an.analyze_type(qt, AnalysisTask::PrepTypeComparison)?;
                        if an.session.graph.composite_class(qt.ty).is_none() {
                            let shown = an.session.graph.display(qt);
                            an.error(
                                base.span,
                                format!("Base type '{shown}' is not a class or interface"),
                            );
                            continue;
                        }
                        resolved.push(an.session.graph.types.dealias(qt));
                    }
                }
                let graph = &self.session.graph;
                let has_class_base = resolved
                    .iter()
                    .any(|b| graph.composite_class(b.ty) == Some(CompositeClass::Class));
                if class == CompositeClass::Class
                    && !has_class_base
                    && defn != graph.builtins.object_defn
                {
                    resolved.insert(0, QualifiedType::plain(graph.builtins.object));
                }
                if let Some(td) = self.session.graph.defns.get_mut(defn).type_defn_mut() {
                    td.bases = resolved;
                }
            }
            DeclKind::Enum { base, .. } => {
                let int32 = self.session.graph.primitive(Primitive::Int32);
                let base_ty = match base {
                    Some(node) => {
                        let mut an = self.nested_at_decl(defn);
                        let qt = an.resolve_type(node)?;
                        let qt = an.session.graph.types.dealias(qt);
                        let integral = an
                            .session
                            .graph
                            .types
                            .primitive_of(qt.ty)
                            .is_some_and(|p| p.int_bits().is_some());
                        if !integral && !an.session.graph.types.is_error(qt.ty) {
                            let shown = an.session.graph.display(qt);
                            an.error(node.span, format!("Enum base type '{shown}' is not an integer type"));
                        }
                        if integral { qt } else { int32 }
                    }
                    None => int32,
                };
                let ty = self.session.graph.types.enumeration(defn, base_ty.ty);
                if let Some(td) = self.session.graph.defns.get_mut(defn).type_defn_mut() {
                    td.ty = Some(ty);
                    td.bases = vec![base_ty];
                }
            }
            _ => {}
        }
        self.finish_pass(defn, Pass::ResolveBaseTypes);
        Ok(())
    }

    pub(super) fn create_members(&mut self, defn: DefnId) -> SemaResult<()> {
        let Some(ast) = self.syntax(defn) else {
            return Ok(());
        };
        if let DeclKind::Enum { .. } = ast.kind {
            self.resolve_base_types(defn)?;
        }
        if !self.begin_pass(defn, Pass::CreateMembers) {
            return Ok(());
        }
        let d = self.session.graph.defns.get(defn);
        let (scope, module) = (d.member_scope(), d.module);
        let Some(scope) = scope else {
            self.finish_pass(defn, Pass::CreateMembers);
            return Ok(());
        };
        match &ast.kind {
            DeclKind::Composite { members, .. } | DeclKind::Namespace { members } => {
                for member in members {
                    self.session
                        .declare(Rc::clone(member), scope, Some(defn), module)?;
                }
            }
            DeclKind::Enum { variants, .. } => {
                let ty = self.session.graph.defns.get(defn).type_value();
                let qualified = self.session.graph.defns.get(defn).qualified_name.clone();
                for (index, variant) in variants.iter().enumerate() {
                    let mut v = Defn::new(
                        variant.node.clone(),
                        variant.span,
                        DefnKind::Variable(VariableDefn {
                            ty: ty.map(QualifiedType::plain),
                            value: Some(ConstValue::Int(index as i128)),
                            is_let: true,
                        }),
                    );
                    v.qualified_name = format!("{qualified}.{}", variant.node);
                    v.storage = StorageClass::Static;
                    v.parent = Some(defn);
                    v.module = module;
                    v.defining_scope = Some(scope);
                    v.passes.begin(Pass::ResolveVarType);
                    v.passes.finish(Pass::ResolveVarType);
                    let id = self.session.graph.defns.alloc(v);
                    self.session.graph.scopes.add_member(scope, &variant.node, id);
                }
            }
            _ => {}
        }
        self.finish_pass(defn, Pass::CreateMembers);
        Ok(())
    }

    pub(super) fn resolve_signature(&mut self, defn: DefnId) -> SemaResult<()> {
        let Some(ast) = self.syntax(defn) else {
            return Ok(());
        };
        let DeclKind::Function { params, ret } = &ast.kind else {
            return Ok(());
        };
        if !self.begin_pass(defn, Pass::ResolveSignature) {
            return Ok(());
        }

        let d = self.session.graph.defns.get(defn);
        let is_static = d.is_static();
        let self_param = match d.parent {
            Some(owner) if !is_static => self
                .session
                .graph
                .defns
                .get(owner)
                .type_value()
                .map(QualifiedType::plain),
            _ => None,
        };

        let mut param_types = Vec::with_capacity(params.len());
        let ret = {
            let mut an = self.nested_at_decl(defn);
            for param in params {
                let ty = an.resolve_type(&param.ty)?;
                param_types.push(ParamType {
                    name: param.name.node.clone(),
                    ty,
                    variadic: param.variadic,
                    keyword_only: param.keyword_only,
                    has_default: param.default.is_some(),
                });
            }
            match ret {
                Some(node) => an.resolve_type(node)?,
                None => an.session.graph.primitive(Primitive::Void),
            }
        };

        let module = self.session.graph.defns.get(defn).module;
        let mut param_defns = Vec::with_capacity(params.len());
        for (param, pt) in params.iter().zip(&param_types) {
            let mut p = Defn::new(
                param.name.node.clone(),
                param.span,
                DefnKind::Parameter(ParameterDefn {
                    ty: Some(pt.ty),
                    variadic: pt.variadic,
                }),
            );
            p.storage = StorageClass::Param;
            p.parent = Some(defn);
            p.module = module;
            param_defns.push(self.session.graph.defns.alloc(p));
        }

        let fn_type = self.session.graph.types.function(FunctionType {
            params: param_types,
            ret,
            self_param,
            is_static,
        });
        if let DefnKind::Function(f) = &mut self.session.graph.defns.get_mut(defn).kind {
            f.fn_type = Some(fn_type);
            f.params = param_defns;
        }
        self.finish_pass(defn, Pass::ResolveSignature);
        Ok(())
    }

    pub(super) fn resolve_var_type(&mut self, defn: DefnId) -> SemaResult<()> {
        let Some(ast) = self.syntax(defn) else {
            return Ok(());
        };
        let DeclKind::Var { ty, init, is_let } = &ast.kind else {
            return Ok(());
        };
        if !self.begin_pass(defn, Pass::ResolveVarType) {
            return Ok(());
        }

        let name = ast.name.node.clone();
        let (declared, init_ty, constant) = {
            let mut an = self.nested_at_decl(defn);
            let declared = match ty {
                Some(node) => Some(an.resolve_type(node)?),
                None => None,
            };
            let (init_ty, constant) = match init {
                Some(node) => {
                    let expr = an.reduce_expr(node)?;
                    let constant = match &expr {
                        Expr::Const { value, .. } => Some(value.clone()),
                        _ => None,
                    };
                    (an.infer_type(&expr), constant)
                }
                None => (None, None),
            };
            (declared, init_ty, constant)
        };

        let graph = &self.session.graph;
        if let (Some(declared), Some(init_ty)) = (declared, init_ty) {
            if !graph.types.is_error(declared.ty) && !graph.relation().is_subtype(init_ty, declared) {
                let message = format!(
                    "Cannot assign value of type {} to variable '{name}' of type {}",
                    graph.display(init_ty),
                    graph.display(declared)
                );
                self.error(ast.name.span, message);
            }
        }
        let inferred = match init_ty {
            Some(t) => match self.session.graph.types.primitive_of(t.ty) {
                Some(Primitive::UnsizedInt(v)) => Some(self.session.default_int_type(v)),
                _ => Some(t),
            },
            None => None,
        };
        let resolved = match declared.or(inferred) {
            Some(t) => t,
            None => {
                self.error(ast.name.span, format!("Cannot infer type of variable '{name}'"));
                QualifiedType::plain(self.session.graph.types.error())
            }
        };

        if let DefnKind::Variable(v) = &mut self.session.graph.defns.get_mut(defn).kind {
            v.ty = Some(resolved);
            v.value = if *is_let { constant } else { None };
        }
        self.finish_pass(defn, Pass::ResolveVarType);
        Ok(())
    }

    pub(super) fn resolve_alias(&mut self, defn: DefnId) -> SemaResult<()> {
        let Some(ast) = self.syntax(defn) else {
            return Ok(());
        };
        let DeclKind::Alias { target } = &ast.kind else {
            return Ok(());
        };
        if !self.begin_pass(defn, Pass::ResolveAlias) {
            return Ok(());
        }
        let resolved = {
            let mut an = self.nested_at_decl(defn);
            an.resolve_type(target)?
        };
        let name = self.session.graph.defns.get(defn).qualified_name.clone();
        let alias = self.session.graph.types.alias(name, resolved);
        if let Some(td) = self.session.graph.defns.get_mut(defn).type_defn_mut() {
            td.ty = Some(alias);
        }
        self.finish_pass(defn, Pass::ResolveAlias);
        Ok(())
    }

    /// Brings a non-generic definition and everything it owns to the state
    /// code generation reads.
    pub(super) fn prepare_codegen(&mut self, defn: DefnId) -> SemaResult<()> {
        if !self.begin_pass(defn, Pass::PrepareCodeGen) {
            return Ok(());
        }
        let kind = self.session.graph.defns.get(defn).kind.clone();
        match kind {
            DefnKind::Type(_) => {
                self.create_members(defn)?;
                for member in self.member_defns(defn) {
                    self.analyze_defn(member, AnalysisTask::PrepCodeGeneration)?;
                }
                if self.session.graph.defns.get(defn).is_template_instance() {
                    self.session.find_less_specialized_instance(defn)?;
                }
            }
            DefnKind::Function(_) => {
                self.resolve_signature(defn)?;
                if let Some(ft) = self.session.graph.defns.get(defn).function_type() {
                    let ft = self.session.graph.types.function_type(ft).clone();
                    for param in &ft.params {
                        self.analyze_type(param.ty, AnalysisTask::PrepTypeComparison)?;
                    }
                    self.analyze_type(ft.ret, AnalysisTask::PrepTypeComparison)?;
                }
            }
            DefnKind::Variable(_) => {
                self.resolve_var_type(defn)?;
                if let Some(ty) = self.session.graph.defns.get(defn).value_type() {
                    self.analyze_type(ty, AnalysisTask::PrepMemberLookup)?;
                }
            }
            DefnKind::Namespace { .. } | DefnKind::Module { .. } => {
                self.create_members(defn)?;
                for member in self.member_defns(defn) {
                    self.analyze_defn(member, AnalysisTask::PrepCodeGeneration)?;
                }
            }
            DefnKind::Parameter(_) | DefnKind::ExplicitImport(_) => {}
        }
        self.finish_pass(defn, Pass::PrepareCodeGen);
        Ok(())
    }
}

impl Session {
    /// Registers a pattern variable of `owner` by name in its parameter scope.
    pub(crate) fn declare_type_var(
        &mut self,
        param_scope: ScopeId,
        owner: DefnId,
        name: &str,
        var: TypeId,
    ) -> DefnId {
        let span = self.graph.types.type_var_data(var).span;
        let mut defn = Defn::new(
            name,
            span,
            DefnKind::Type(TypeDefn {
                ty: Some(var),
                ..TypeDefn::default()
            }),
        );
        defn.parent = Some(owner);
        defn.module = self.graph.defns.get(owner).module;
        defn.defining_scope = Some(param_scope);
        defn.storage = StorageClass::Static;
        defn.singular = false;
        let id = self.graph.defns.alloc(defn);
        self.graph.scopes.add_member(param_scope, name, id);
        id
    }

    /// Type given to an integer literal once nothing narrows it further.
    pub fn default_int_type(&self, value: i128) -> QualifiedType {
        if Primitive::Int32.fits(value) {
            self.graph.primitive(Primitive::Int32)
        } else {
            self.graph.primitive(Primitive::Int64)
        }
    }

    pub(crate) fn is_void(&self, qt: QualifiedType) -> bool {
        matches!(
            self.graph.types.kind(self.graph.types.dealias(qt).ty),
            TypeKind::Primitive(Primitive::Void)
        )
    }
}
