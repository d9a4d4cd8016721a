//! The builtins module: primitive type names, the root class, `String`,
//! and the structural type operators.

use std::collections::HashMap;

use quill_ast::no_span;

use crate::defn::{Defn, DefnId, DefnKind, DefnTable, StorageClass, TypeDefn, TypeOperator};
use crate::error::ice;
use crate::scope::{ScopeId, ScopeKind, ScopeTable};
use crate::template::TemplateTable;
use crate::types::{
    CompositeClass, Primitive, QualifiedType, TypeId, TypeStore, TypeVariable,
};

#[derive(Clone, Debug)]
pub struct Builtins {
    pub module: DefnId,
    pub scope: ScopeId,
    pub object: TypeId,
    pub object_defn: DefnId,
    pub string: TypeId,
    pub string_defn: DefnId,
    primitives: HashMap<Primitive, (TypeId, DefnId)>,
    operators: Vec<(TypeOperator, DefnId)>,
}

impl Builtins {
    pub fn primitive(&self, p: Primitive) -> TypeId {
        match self.primitives.get(&p) {
            Some((ty, _)) => *ty,
            None => ice!("no builtin definition for {}", p.name()),
        }
    }

    pub fn primitive_defn(&self, p: Primitive) -> Option<DefnId> {
        self.primitives.get(&p).map(|(_, defn)| *defn)
    }

    pub fn operator(&self, op: TypeOperator) -> DefnId {
        match self.operators.iter().find(|(o, _)| *o == op) {
            Some((_, defn)) => *defn,
            None => ice!("missing builtin type operator {op:?}"),
        }
    }

    pub(crate) fn install(
        types: &mut TypeStore,
        defns: &mut DefnTable,
        scopes: &mut ScopeTable,
        templates: &mut TemplateTable,
        root_object: &str,
    ) -> Builtins {
        let scope = scopes.new_scope(ScopeKind::Builtins, "builtins", None);
        let mut module_defn = Defn::new("builtins", no_span(), DefnKind::Module { scope });
        module_defn.storage = StorageClass::Global;
        let module = defns.alloc(module_defn);

        let mut installer = Installer {
            defns,
            scopes,
            module,
            scope,
        };

        let mut primitives = HashMap::new();
        for p in Primitive::NAMED {
            let ty = types.primitive(p);
            let defn = installer.declare(&p.name(), Some(ty), Vec::new(), None);
            primitives.insert(p, (ty, defn));
        }

        let object_defn = installer.declare(root_object, None, Vec::new(), None);
        let object = types.composite(CompositeClass::Class, object_defn);
        installer.set_type(object_defn, object);

        let string_defn = installer.declare("String", None, vec![QualifiedType::plain(object)], None);
        let string = types.composite(CompositeClass::Class, string_defn);
        installer.set_type(string_defn, string);

        let int64 = types.primitive(Primitive::Int64);
        let mut operators = Vec::new();
        for (op, name) in [
            (TypeOperator::Address, "Address"),
            (TypeOperator::Pointer, "Pointer"),
            (TypeOperator::NativeArray, "NativeArray"),
            (TypeOperator::FlexibleArray, "FlexibleArray"),
            (TypeOperator::TypeLiteral, "TypeLiteral"),
        ] {
            let defn = installer.declare(name, None, Vec::new(), Some(op));
            let template = templates.create(installer.defns, installer.scopes, defn);
            let param_scope = templates.get(template).param_scope;

            let mut vars = vec![types.type_var(TypeVariable::new("T", no_span()))];
            if op == TypeOperator::NativeArray {
                let mut size = TypeVariable::new("N", no_span());
                size.value_type = Some(QualifiedType::plain(int64));
                vars.push(types.type_var(size));
            }
            for (var, var_name) in vars.iter().zip(["T", "N"]) {
                let var_defn = installer.declare_in(param_scope, var_name, Some(*var));
                installer.defns.get_mut(var_defn).parent = Some(defn);
            }
            let params = types.tuple(vars.iter().copied().map(QualifiedType::plain).collect());
            templates.bind_params(template, params, vars.clone(), vars.len(), false);
            operators.push((op, defn));
        }

        Builtins {
            module,
            scope,
            object,
            object_defn,
            string,
            string_defn,
            primitives,
            operators,
        }
    }
}

struct Installer<'a> {
    defns: &'a mut DefnTable,
    scopes: &'a mut ScopeTable,
    module: DefnId,
    scope: ScopeId,
}

impl Installer<'_> {
    fn declare(
        &mut self,
        name: &str,
        ty: Option<TypeId>,
        bases: Vec<QualifiedType>,
        operator: Option<TypeOperator>,
    ) -> DefnId {
        let id = self.declare_in(self.scope, name, ty);
        let members = self
            .scopes
            .new_scope(ScopeKind::Members(id), name, Some(self.scope));
        if let Some(td) = self.defns.get_mut(id).type_defn_mut() {
            td.bases = bases;
            td.members = Some(members);
            td.operator = operator;
        }
        id
    }

    fn declare_in(&mut self, scope: ScopeId, name: &str, ty: Option<TypeId>) -> DefnId {
        let mut defn = Defn::new(
            name,
            no_span(),
            DefnKind::Type(TypeDefn {
                ty,
                ..TypeDefn::default()
            }),
        );
        defn.parent = Some(self.module);
        defn.module = Some(self.module);
        defn.defining_scope = Some(scope);
        let id = self.defns.alloc(defn);
        self.scopes.add_member(scope, name, id);
        id
    }

    fn set_type(&mut self, defn: DefnId, ty: TypeId) {
        if let Some(td) = self.defns.get_mut(defn).type_defn_mut() {
            td.ty = Some(ty);
        }
    }
}
