use std::collections::HashSet;
use std::rc::Rc;

use quill_ast::{no_span, Decl};

use crate::analyzer::{AnalysisTask, Analyzer};
use crate::config::SemaConfig;
use crate::defn::{Defn, DefnId, DefnKind, Pass, StorageClass};
use crate::diagnostics::DiagnosticLog;
use crate::error::{ice, SemaResult};
use crate::graph::SemaGraph;
use crate::logging::TraceOptions;
use crate::module::{ModuleLoader, ModuleMap};
use crate::scope::ScopeKind;

/// Definitions waiting for code-generation analysis, drained in discovery
/// order.
#[derive(Debug, Default)]
struct AnalysisQueue {
    items: Vec<DefnId>,
    queued: HashSet<DefnId>,
}

/// One compilation: the semantic graph plus everything that mutates it.
pub struct Session {
    pub graph: SemaGraph,
    pub diag: DiagnosticLog,
    pub config: SemaConfig,
    pub trace: TraceOptions,
    loader: Box<dyn ModuleLoader>,
    queue: AnalysisQueue,
}

impl Session {
    pub fn new(config: SemaConfig) -> Self {
        Self::with_loader(config, Box::new(ModuleMap::new()))
    }

    pub fn with_loader(config: SemaConfig, loader: Box<dyn ModuleLoader>) -> Self {
        let trace = TraceOptions::from_config(&config);
        Self {
            graph: SemaGraph::new(&config),
            diag: DiagnosticLog::new(),
            config,
            trace,
            loader,
            queue: AnalysisQueue::default(),
        }
    }

    pub fn with_trace(mut self, trace: TraceOptions) -> Self {
        self.trace = trace;
        self
    }

    /// Builds a module from top-level declarations. Its members are declared
    /// immediately; everything else about them is analyzed on demand.
    pub fn add_module(&mut self, path: &str, decls: Vec<Decl>) -> SemaResult<DefnId> {
        let next = DefnId(self.graph.defns.len() as u32);
        let scope = self.graph.scopes.new_scope(
            ScopeKind::Module(next),
            path,
            Some(self.graph.builtins.scope),
        );
        let mut defn = Defn::new(path, no_span(), DefnKind::Module { scope });
        defn.storage = StorageClass::Global;
        let module = self.graph.defns.alloc(defn);
        self.graph.defns.get_mut(module).module = Some(module);

        self.graph.defns.get_mut(module).passes.begin(Pass::CreateMembers);
        for decl in decls {
            self.declare(Rc::new(decl), scope, Some(module), Some(module))?;
        }
        self.graph.defns.get_mut(module).passes.finish(Pass::CreateMembers);
        tracing::debug!(target: "quill::analysis", module = path, "module declared");
        Ok(module)
    }

    /// Brings `targets` into `module` under `name`. Lookups see through the
    /// import to its targets.
    pub fn add_import(&mut self, module: DefnId, name: &str, targets: Vec<DefnId>) -> DefnId {
        let owner = self.graph.defns.get(module);
        let (scope, qualified_name) = (owner.member_scope(), format!("{}.{name}", owner.qualified_name));
        let Some(scope) = scope else {
            ice!("'{}' cannot hold imports", owner.qualified_name);
        };
        let mut defn = Defn::new(name, no_span(), DefnKind::ExplicitImport(targets));
        defn.qualified_name = qualified_name;
        defn.parent = Some(module);
        defn.module = Some(module);
        defn.defining_scope = Some(scope);
        let id = self.graph.defns.alloc(defn);
        self.graph.scopes.add_member(scope, name, id);
        id
    }

    /// Analyzer over the scopes of `module`.
    pub fn analyzer(&mut self, module: DefnId) -> Analyzer<'_> {
        Analyzer::for_defn(self, module)
    }

    pub fn import(&mut self, path: &str, absolute: bool) -> Option<Vec<DefnId>> {
        let found = self.loader.import(path, absolute);
        tracing::trace!(target: "quill::lookup", path, found = found.is_some(), "import");
        found
    }

    pub fn analyze_later(&mut self, defn: DefnId) {
        if self.queue.queued.insert(defn) {
            self.queue.items.push(defn);
        }
    }

    pub fn pending_analysis(&self) -> usize {
        self.queue.items.len()
    }

    /// Runs code-generation analysis for every queued definition, including
    /// ones queued while draining. Returns how many were processed.
    pub fn flush_analysis_queue(&mut self) -> SemaResult<usize> {
        let mut position = 0;
        while position < self.queue.items.len() {
            let defn = self.queue.items[position];
            position += 1;
            Analyzer::for_defn(self, defn).analyze_defn(defn, AnalysisTask::PrepCodeGeneration)?;
        }
        self.queue.items.clear();
        Ok(position)
    }
}
