//! Explicit specialization, `Name[Args]`.

use quill_ast::{Node, Span};

use crate::defn::{DefnId, DefnKind};
use crate::error::SemaResult;
use crate::expr::Expr;
use crate::relation::Specificity;
use crate::template::Expect;
use crate::types::{QualifiedType, TypeKind};

use super::{AnalysisTask, Analyzer};

impl Analyzer<'_> {
    /// Resolves `base[args]`: every generic named by `base` whose parameters
    /// accept `args` is a candidate, and the most specialized one is
    /// instantiated.
    pub fn resolve_specialization(
        &mut self,
        span: Span,
        base: &Node,
        args: &[Node],
        out: &mut Vec<Expr>,
    ) -> SemaResult<bool> {
        let bases = self.lookup_name(base)?;
        if bases.is_empty() {
            return Ok(false);
        }
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.resolve_type(arg)?);
        }
        if bases.iter().any(Expr::is_error)
            || arg_types.iter().any(|t| self.session.graph.types.is_error(t.ty))
        {
            out.push(Expr::Error(span));
            return Ok(true);
        }

        let mut candidates = Vec::new();
        for b in &bases {
            self.add_spec_candidate(b, &arg_types, &mut candidates)?;
        }
        let shown_args = self.display_args(&arg_types);
        if candidates.is_empty() {
            self.error(span, format!("No template found matching {base}[{shown_args}]"));
            for b in &bases {
                if let Some(defn) = self.spec_target(b) {
                    let text = self.session.graph.display_defn(defn);
                    let at = self.session.graph.defns.get(defn).span;
                    self.info(at, format!("candidate: {text}"));
                }
            }
            out.push(Expr::Error(span));
            return Ok(true);
        }

        let winners = self.most_specialized(&candidates);
        if winners.len() != 1 {
            self.error(
                span,
                format!("Ambiguous template specialization {base}[{shown_args}]"),
            );
            for defn in winners {
                let text = self.session.graph.display_defn(defn);
                let at = self.session.graph.defns.get(defn).span;
                self.info(at, format!("candidate: {text}"));
            }
            out.push(Expr::Error(span));
            return Ok(true);
        }
        let chosen = winners[0];

        let env = self.session.bind_template_args(chosen, &arg_types);
        let is_type = matches!(self.session.graph.defns.get(chosen).kind, DefnKind::Type(_));
        if is_type {
            let ty = self
                .session
                .instantiate_type(span, chosen, &env, Expect::NONE)?;
            out.push(Expr::TypeLiteral { span, ty });
        } else {
            let inst = self.session.instantiate(span, chosen, &env, Expect::NONE)?;
            if let Some(expr) = self.defn_as_expr(inst, None, span)? {
                out.push(expr);
            }
        }
        Ok(true)
    }

    fn spec_target(&self, expr: &Expr) -> Option<DefnId> {
        match expr {
            Expr::TypeLiteral { ty, .. } => self.session.graph.type_defn_of(ty.ty),
            Expr::LValue { defn, .. } => Some(*defn),
            _ => None,
        }
    }

    /// Adds the generic behind `base` to `out` when `args` fit its
    /// parameter list.
    pub fn add_spec_candidate(
        &mut self,
        base: &Expr,
        args: &[QualifiedType],
        out: &mut Vec<DefnId>,
    ) -> SemaResult<()> {
        let Some(mut defn) = self.spec_target(base) else {
            return Ok(());
        };
        // Inside an instance body the generic's own name finds the instance.
        if let Some(inst) = self.session.graph.defns.get(defn).instance {
            defn = self.session.graph.templates.instance(inst).template_defn;
        }
        if !self.session.graph.defns.get(defn).is_template() {
            return Ok(());
        }
        self.analyze_defn(defn, AnalysisTask::PrepTypeComparison)?;
        let Some(template) = self.session.graph.defns.get(defn).template else {
            return Ok(());
        };
        let template = self.session.graph.templates.get(template);
        let Some(params) = template.params else {
            return Ok(());
        };
        if args.len() < template.required_args || !self.session.can_unify(defn, args) {
            return Ok(());
        }
        let graph = &self.session.graph;
        let slots = graph.types.tuple_members(params);
        let binds = slots.iter().zip(args).all(|(slot, arg)| {
            match graph.types.kind(slot.ty) {
                TypeKind::TypeVar(tv) if !tv.variadic => graph.can_bind_to(slot.ty, *arg),
                _ => true,
            }
        });
        if binds && !out.contains(&defn) {
            out.push(defn);
        }
        Ok(())
    }

    /// Candidates not dominated by another. A fixed slot beats a variable
    /// slot, and two fixed slots compare by type specificity.
    fn most_specialized(&self, candidates: &[DefnId]) -> Vec<DefnId> {
        if candidates.len() < 2 {
            return candidates.to_vec();
        }
        let slots: Vec<Vec<QualifiedType>> = candidates
            .iter()
            .map(|d| self.template_slots(*d))
            .collect();
        let dominates = |a: usize, b: usize| {
            let mut more = false;
            for (x, y) in slots[a].iter().zip(&slots[b]) {
                match self.slot_specificity(*x, *y) {
                    Specificity::MoreSpecific => more = true,
                    Specificity::EqualSpecificity => {}
                    Specificity::NotMoreSpecific => return false,
                }
            }
            more
        };
        (0..candidates.len())
            .filter(|b| !(0..candidates.len()).any(|a| a != *b && dominates(a, *b)))
            .map(|i| candidates[i])
            .collect()
    }

    fn template_slots(&self, defn: DefnId) -> Vec<QualifiedType> {
        let graph = &self.session.graph;
        graph
            .defns
            .get(defn)
            .template
            .and_then(|t| graph.templates.get(t).params)
            .map(|p| graph.types.tuple_members(p).to_vec())
            .unwrap_or_default()
    }

    fn slot_specificity(&self, lhs: QualifiedType, rhs: QualifiedType) -> Specificity {
        let types = &self.session.graph.types;
        let is_var = |qt: QualifiedType| matches!(types.kind(qt.ty), TypeKind::TypeVar(_));
        match (is_var(lhs), is_var(rhs)) {
            (true, true) => Specificity::EqualSpecificity,
            (false, true) => Specificity::MoreSpecific,
            (true, false) => Specificity::NotMoreSpecific,
            (false, false) => self.session.graph.relation().is_more_specific(lhs, rhs),
        }
    }

    pub(super) fn display_args(&self, args: &[QualifiedType]) -> String {
        args.iter()
            .map(|a| self.session.graph.display(*a))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
