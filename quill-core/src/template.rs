//! Generic signatures, their instances and the specialization cache.

use std::rc::Rc;

use quill_ast::Span;

use crate::defn::{
    Defn, DefnId, DefnKind, DefnTable, StorageClass, Traits, TypeDefn, TypeOperator, VariableDefn,
};
use crate::diagnostics::DiagnosticSink;
use crate::error::{ice, SemaResult, SemanticError};
use crate::scope::{ScopeId, ScopeKind, ScopeTable};
use crate::session::Session;
use crate::transform::BindingEnv;
use crate::types::{CompositeClass, ConstValue, QualifiedType, TypeId, TypeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemplateId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(pub(crate) u32);

/// Requirements a caller places on an instantiation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Expect {
    pub singular: bool,
    pub non_scaffold: bool,
}

impl Expect {
    pub const NONE: Expect = Expect {
        singular: false,
        non_scaffold: false,
    };
    pub const CONCRETE: Expect = Expect {
        singular: true,
        non_scaffold: true,
    };
}

#[derive(Clone, Debug)]
pub struct Template {
    pub defn: DefnId,
    pub param_scope: ScopeId,
    /// Tuple of parameter slots; `None` until the parameters are bound.
    pub params: Option<TypeId>,
    /// Free variables of `params` in first-occurrence order.
    pub vars: Vec<TypeId>,
    pub required_args: usize,
    pub variadic: bool,
    specializations: Vec<(TypeId, DefnId)>,
}

impl Template {
    pub fn is_bound(&self) -> bool {
        self.params.is_some()
    }

    pub fn cached_instances(&self) -> usize {
        self.specializations.len()
    }
}

/// Memo for the erased instance shared by reference-type instantiations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LessSpecialized {
    Unknown,
    /// Already maximally general.
    Itself,
    Instance(DefnId),
}

#[derive(Clone, Debug)]
pub struct TemplateInstance {
    pub template_defn: DefnId,
    /// The clone produced for this instance.
    pub value: DefnId,
    /// The parameter tuple with bindings applied.
    pub type_args: TypeId,
    /// One binding per template variable.
    pub param_values: Vec<(TypeId, QualifiedType)>,
    pub scope: ScopeId,
    pub instantiated_from: Span,
    pub less_specialized: LessSpecialized,
}

#[derive(Debug, Default)]
pub struct TemplateTable {
    templates: Vec<Template>,
    instances: Vec<TemplateInstance>,
}

impl TemplateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a fresh, unbound signature to `defn`.
    pub fn create(
        &mut self,
        defns: &mut DefnTable,
        scopes: &mut ScopeTable,
        defn: DefnId,
    ) -> TemplateId {
        let parent = defns.get(defn).defining_scope;
        let param_scope = scopes.new_scope(ScopeKind::TemplateParams(defn), "template-params", parent);
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(Template {
            defn,
            param_scope,
            params: None,
            vars: Vec::new(),
            required_args: 0,
            variadic: false,
            specializations: Vec::new(),
        });
        defns.get_mut(defn).template = Some(id);
        id
    }

    pub fn bind_params(
        &mut self,
        id: TemplateId,
        params: TypeId,
        vars: Vec<TypeId>,
        required_args: usize,
        variadic: bool,
    ) {
        let template = self.get_mut(id);
        if template.params.is_some() {
            ice!("template parameters of {:?} bound twice", template.defn);
        }
        template.params = Some(params);
        template.vars = vars;
        template.required_args = required_args;
        template.variadic = variadic;
    }

    pub fn get(&self, id: TemplateId) -> &Template {
        match self.templates.get(id.0 as usize) {
            Some(t) => t,
            None => ice!("dangling template id {}", id.0),
        }
    }

    fn get_mut(&mut self, id: TemplateId) -> &mut Template {
        match self.templates.get_mut(id.0 as usize) {
            Some(t) => t,
            None => ice!("dangling template id {}", id.0),
        }
    }

    pub fn instance(&self, id: InstanceId) -> &TemplateInstance {
        match self.instances.get(id.0 as usize) {
            Some(i) => i,
            None => ice!("dangling instance id {}", id.0),
        }
    }

    fn instance_mut(&mut self, id: InstanceId) -> &mut TemplateInstance {
        match self.instances.get_mut(id.0 as usize) {
            Some(i) => i,
            None => ice!("dangling instance id {}", id.0),
        }
    }

    fn next_instance_id(&self) -> InstanceId {
        InstanceId(self.instances.len() as u32)
    }

    fn add_instance(&mut self, instance: TemplateInstance) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(instance);
        id
    }
}

impl Session {
    fn template_of(&self, defn: DefnId) -> TemplateId {
        match self.graph.defns.get(defn).template {
            Some(t) => t,
            None => ice!("'{}' is not generic", self.graph.defns.get(defn).qualified_name),
        }
    }

    /// Binds the parameter tuple of a signature, registering each free
    /// variable by name in its parameter scope.
    pub fn set_type_params(
        &mut self,
        template: TemplateId,
        params: Vec<QualifiedType>,
    ) -> SemaResult<()> {
        let tuple = self.graph.types.tuple(params.clone());
        let vars = self.find_type_variables(QualifiedType::plain(tuple))?;
        let owner = self.graph.templates.get(template).defn;

        let mut required = params.len();
        let mut variadic_param = None;
        for (index, param) in params.iter().enumerate() {
            if let TypeKind::TypeVar(tv) = self.graph.types.kind(param.ty) {
                if tv.variadic {
                    if index + 1 != params.len() {
                        self.diag
                            .error(tv.span, "template variadic parameter must be last".to_string());
                    }
                    variadic_param = Some(param.ty);
                    required -= 1;
                }
            }
        }

        let param_scope = self.graph.templates.get(template).param_scope;
        for var in &vars {
            let tv = self.graph.types.type_var_data(*var);
            let (name, span, variadic) = (tv.name.clone(), tv.span, tv.variadic);
            if variadic && variadic_param != Some(*var) {
                self.diag
                    .error(span, "Variadic argument not allowed here".to_string());
            }
            if self.graph.scopes.lookup_local(param_scope, &name).is_empty() {
                self.declare_type_var(param_scope, owner, &name, *var);
            }
        }

        self.graph.templates.bind_params(
            template,
            tuple,
            vars,
            required,
            variadic_param.is_some(),
        );
        Ok(())
    }

    /// Maps positional arguments onto the variable slots of a signature.
    /// Excess arguments fold into a trailing variadic slot as a tuple.
    pub fn bind_template_args(&mut self, defn: DefnId, args: &[QualifiedType]) -> BindingEnv {
        let template = self.graph.templates.get(self.template_of(defn));
        let Some(params) = template.params else {
            return BindingEnv::new();
        };
        let slots = self.graph.types.tuple_members(params).to_vec();
        let variadic = template.variadic;
        let mut env = BindingEnv::new();
        for (index, slot) in slots.iter().enumerate() {
            if !matches!(self.graph.types.kind(slot.ty), TypeKind::TypeVar(_)) {
                continue;
            }
            if env.get(slot.ty).is_some() {
                continue;
            }
            if variadic && index + 1 == slots.len() {
                let rest = args.get(index..).unwrap_or(&[]).to_vec();
                let packed = self.graph.types.tuple(rest);
                env.bind(slot.ty, QualifiedType::plain(packed));
            } else if let Some(arg) = args.get(index) {
                env.bind(slot.ty, *arg);
            }
        }
        env
    }

    /// Quick compatibility filter: arity, and equality for fixed slots.
    pub fn can_unify(&self, defn: DefnId, args: &[QualifiedType]) -> bool {
        let template = self.graph.templates.get(self.template_of(defn));
        let Some(params) = template.params else {
            return false;
        };
        let slots = self.graph.types.tuple_members(params);
        if args.len() > slots.len() && !template.variadic {
            return false;
        }
        let rel = self.graph.relation();
        slots.iter().zip(args).all(|(slot, arg)| {
            matches!(self.graph.types.kind(slot.ty), TypeKind::TypeVar(_))
                || rel.is_equal(*slot, self.graph.types.dealias(*arg))
        })
    }

    /// Produces (or fetches from the cache) the instance of generic `defn`
    /// with `env` applied to its parameters. Failures are recorded here.
    pub fn instantiate(
        &mut self,
        span: Span,
        defn: DefnId,
        env: &BindingEnv,
        expect: Expect,
    ) -> SemaResult<DefnId> {
        self.instantiate_unreported(span, defn, env, expect)
            .map_err(|err| self.diag.record_fatal(err))
    }

    /// [`Session::instantiate`] without recording the failure, for callers
    /// that report it themselves.
    pub(crate) fn instantiate_unreported(
        &mut self,
        span: Span,
        defn: DefnId,
        env: &BindingEnv,
        expect: Expect,
    ) -> SemaResult<DefnId> {
        let template_id = self.template_of(defn);
        let template = self.graph.templates.get(template_id);
        let (vars, Some(params)) = (template.vars.clone(), template.params) else {
            ice!("instantiating '{}' before its parameters are bound", self.graph.defns.get(defn).qualified_name);
        };
        let qualified_name = self.graph.defns.get(defn).qualified_name.clone();
        let trace = self.trace.instantiation || self.trace.is_trace_enabled(&qualified_name);

        let mut param_values = Vec::with_capacity(vars.len());
        let mut scaffold = false;
        for var in &vars {
            let value = self.substitute_unreported(span, env, QualifiedType::plain(*var))?;
            let open = matches!(
                self.graph.types.kind(self.graph.types.dealias(value).ty),
                TypeKind::TypeVar(_) | TypeKind::PatternValue { .. } | TypeKind::Assignment(_)
            );
            if !open && !self.graph.can_bind_to(*var, value) {
                let var_name = self.graph.types.type_var_data(*var).name.clone();
                return Err(SemanticError::new(
                    span,
                    format!(
                        "Type of expression {} incompatible with template parameter {}",
                        self.graph.display(value),
                        var_name
                    ),
                ));
            }
            scaffold |= self.graph.is_scaffold(value.ty);
            param_values.push((*var, value));
        }

        if scaffold && expect.non_scaffold {
            return Err(SemanticError::new(
                span,
                "Expected non-throwaway template instantiation.",
            ));
        }

        let type_args = self.substitute_unreported(span, env, QualifiedType::plain(params))?.ty;
        let partial = !self.graph.is_singular(type_args);
        if partial && expect.singular {
            let args = self.graph.display_type(type_args);
            return Err(SemanticError::new(
                span,
                format!("Non-singular parameters [{}]", args.trim_matches(['(', ')'])),
            ));
        }

        if !scaffold {
            if let Some(hit) = self.find_specialization(template_id, type_args) {
                if trace {
                    tracing::debug!(
                        target: "quill::template",
                        template = %qualified_name,
                        args = %self.graph.display_type(type_args),
                        "found in cache"
                    );
                }
                return Ok(hit);
            }
        }
        if trace {
            tracing::debug!(
                target: "quill::template",
                template = %qualified_name,
                args = %self.graph.display_type(type_args),
                "instantiating"
            );
        }

        let defining_scope = self.graph.defns.get(defn).defining_scope;
        let next = self.graph.templates.next_instance_id();
        let inst_scope = self.graph.scopes.new_scope(
            ScopeKind::TemplateInstance(next),
            format!("{qualified_name}-instance"),
            defining_scope,
        );
        let inst = self.graph.templates.add_instance(TemplateInstance {
            template_defn: defn,
            value: defn,
            type_args,
            param_values: param_values.clone(),
            scope: inst_scope,
            instantiated_from: span,
            less_specialized: LessSpecialized::Unknown,
        });

        let clone = self.clone_for_instance(defn, template_id, inst, inst_scope, partial, scaffold)?;
        self.graph.templates.instance_mut(inst).value = clone;

        if !scaffold {
            self.graph
                .templates
                .get_mut(template_id)
                .specializations
                .push((type_args, clone));
        }

        let module = self.graph.defns.get(clone).module;
        let mut singular = true;
        for (var, value) in &param_values {
            let tv = self.graph.types.type_var_data(*var);
            let (name, var_span, value_type) = (tv.name.clone(), tv.span, tv.value_type);
            let value_singular = self.graph.is_singular(value.ty);
            singular &= value_singular;
            let kind = match self.graph.types.kind(self.graph.types.dealias(*value).ty) {
                TypeKind::Unit(constant) => DefnKind::Variable(VariableDefn {
                    ty: value_type,
                    value: Some(constant.clone()),
                    is_let: true,
                }),
                _ => DefnKind::Type(TypeDefn {
                    ty: Some(value.ty),
                    ..TypeDefn::default()
                }),
            };
            let mut arg_defn = Defn::new(name.clone(), var_span, kind);
            arg_defn.storage = StorageClass::Static;
            arg_defn.traits.insert(Traits::SYNTHETIC);
            arg_defn.singular = value_singular;
            arg_defn.parent = Some(clone);
            arg_defn.module = module;
            arg_defn.defining_scope = Some(inst_scope);
            let arg_id = self.graph.defns.alloc(arg_defn);
            self.graph.scopes.add_member(inst_scope, &name, arg_id);
        }

        if expect.singular && !singular {
            return Err(SemanticError::new(
                span,
                format!(
                    "Expected {} to be singular, why isn't it?",
                    self.graph.display_defn(clone)
                ),
            ));
        }

        // The clone answers to its own simple name inside its body.
        let is_composite = self
            .graph
            .defns
            .get(clone)
            .type_value()
            .is_some_and(|ty| matches!(self.graph.types.kind(ty), TypeKind::Composite { .. }));
        if is_composite {
            let name = self.graph.defns.get(clone).name.clone();
            self.graph.scopes.add_member(inst_scope, &name, clone);
        }

        self.graph.defns.get_mut(clone).singular = singular;
        Ok(clone)
    }

    /// A throwaway instance of generic `defn` with every parameter replaced
    /// by a fresh pattern value. Scaffolds never enter the cache, so each
    /// call yields a distinct defn.
    pub fn scaffold_instance(&mut self, span: Span, defn: DefnId) -> SemaResult<(DefnId, BindingEnv)> {
        let template = self.graph.templates.get(self.template_of(defn));
        let (vars, Some(params)) = (template.vars.clone(), template.params) else {
            ice!("scaffolding '{}' before its parameters are bound", self.graph.defns.get(defn).qualified_name);
        };
        let (_, env) = self.relabel(&vars, QualifiedType::plain(params))?;
        let inst = self.instantiate(span, defn, &env, Expect::NONE)?;
        Ok((inst, env))
    }

    /// A cached instance for `type_args`. Partial instances keyed by
    /// assignments that have since been solved compare equal to concrete
    /// arguments, so a singular request never reuses one.
    fn find_specialization(&self, template: TemplateId, type_args: TypeId) -> Option<DefnId> {
        let rel = self.graph.relation();
        let singular = self.graph.is_singular(type_args);
        self.graph
            .templates
            .get(template)
            .specializations
            .iter()
            .filter(|(_, defn)| !singular || !self.graph.defns.get(*defn).has_trait(Traits::PARTIAL))
            .find(|(args, _)| rel.is_equal((*args).into(), type_args.into()))
            .map(|(_, defn)| *defn)
    }

    /// Makes the instance's copy of a generic declaration from its shared
    /// syntax. Members and signatures are filled in lazily by the passes.
    fn clone_for_instance(
        &mut self,
        defn: DefnId,
        template: TemplateId,
        inst: InstanceId,
        inst_scope: ScopeId,
        partial: bool,
        scaffold: bool,
    ) -> SemaResult<DefnId> {
        let source = self.graph.defns.get(defn);
        let Some(ast) = source.ast.clone() else {
            ice!("cannot clone '{}': no declaration syntax", source.qualified_name);
        };
        let (parent, module, storage) = (source.parent, source.module, source.storage);
        let qualified_name = source.qualified_name.clone();
        let inherited = source.traits.intersection(Traits::INSTANCE_WHITELIST);

        let clone = self.create_defn(Rc::clone(&ast), inst_scope, parent, module, Some(inst))?;
        let d = self.graph.defns.get_mut(clone);
        d.qualified_name = qualified_name;
        d.storage = storage;
        d.template = Some(template);
        d.traits = inherited | Traits::SYNTHETIC;
        if partial {
            d.traits.insert(Traits::PARTIAL);
        }
        if scaffold {
            d.traits.insert(Traits::SCAFFOLD);
        }
        Ok(clone)
    }

    /// Like [`Session::instantiate`], but yields a type, building builtin
    /// structural operators directly.
    pub fn instantiate_type(
        &mut self,
        span: Span,
        defn: DefnId,
        env: &BindingEnv,
        expect: Expect,
    ) -> SemaResult<QualifiedType> {
        let operator = self
            .graph
            .defns
            .get(defn)
            .type_defn()
            .and_then(|td| td.operator);
        let Some(op) = operator else {
            let inst = self.instantiate(span, defn, env, expect)?;
            return match self.graph.defns.get(inst).type_value() {
                Some(ty) => Ok(QualifiedType::plain(ty)),
                None => ice!("instance of '{}' is not a type", self.graph.display_defn(defn)),
            };
        };

        let vars = self.graph.templates.get(self.template_of(defn)).vars.clone();
        let mut values = Vec::with_capacity(vars.len());
        for var in &vars {
            let value = self.substitute(span, env, QualifiedType::plain(*var))?;
            let open = matches!(
                self.graph.types.kind(value.ty),
                TypeKind::TypeVar(_) | TypeKind::PatternValue { .. } | TypeKind::Assignment(_)
            );
            if !open && !self.graph.can_bind_to(*var, value) {
                let var_name = self.graph.types.type_var_data(*var).name.clone();
                return Err(self.diag.fatal(
                    span,
                    format!(
                        "Type of expression {} incompatible with template parameter {}",
                        self.graph.display(value),
                        var_name
                    ),
                ));
            }
            values.push(value);
        }
        let Some(elem) = values.first().copied() else {
            ice!("type operator {op:?} has no parameters");
        };
        let types = &mut self.graph.types;
        let ty = match op {
            TypeOperator::Address => types.address(elem),
            TypeOperator::Pointer => types.pointer(elem),
            TypeOperator::FlexibleArray => types.flexible_array(elem),
            TypeOperator::TypeLiteral => types.type_literal(elem.unqualified()),
            TypeOperator::NativeArray => {
                let size = match values.get(1).map(|v| types.dealias(*v).ty) {
                    Some(s) => match types.kind(s) {
                        TypeKind::Unit(ConstValue::Int(n)) if *n >= 0 => Some(*n as u64),
                        _ => None,
                    },
                    None => None,
                };
                match size {
                    Some(n) => types.native_array(elem, n),
                    None => {
                        return Err(self
                            .diag
                            .fatal(span, "NativeArray size must be a constant".to_string()));
                    }
                }
            }
        };
        Ok(QualifiedType::plain(ty))
    }

    /// The erased instance that reference-type instantiations of the same
    /// template share, computed once per instance.
    pub fn find_less_specialized_instance(&mut self, defn: DefnId) -> SemaResult<Option<DefnId>> {
        if !self.config.share_less_specialized {
            return Ok(None);
        }
        let Some(inst) = self.graph.defns.get(defn).instance else {
            return Ok(None);
        };
        match self.graph.templates.instance(inst).less_specialized {
            LessSpecialized::Itself => return Ok(None),
            LessSpecialized::Instance(found) => return Ok(Some(found)),
            LessSpecialized::Unknown => {}
        }

        let instance = self.graph.templates.instance(inst);
        let (template_defn, span) = (instance.template_defn, instance.instantiated_from);
        let object = QualifiedType::plain(self.graph.builtins.object);
        let mut env = BindingEnv::new();
        let mut widened = false;
        for (var, value) in instance.param_values.clone() {
            let erased = match self.graph.composite_class(value.ty) {
                Some(CompositeClass::Class | CompositeClass::Interface) => object,
                _ => value,
            };
            widened |= erased.ty != value.ty;
            env.bind(var, erased);
        }

        let memo = if widened {
            let shared = self.instantiate(span, template_defn, &env, Expect::CONCRETE)?;
            LessSpecialized::Instance(shared)
        } else {
            LessSpecialized::Itself
        };
        self.graph.templates.instance_mut(inst).less_specialized = memo;
        Ok(match memo {
            LessSpecialized::Instance(shared) => Some(shared),
            _ => None,
        })
    }

    /// Creates a signature for a builtin-style declaration built in code.
    pub fn new_template(&mut self, defn: DefnId) -> TemplateId {
        self.graph
            .templates
            .create(&mut self.graph.defns, &mut self.graph.scopes, defn)
    }
}
