// src/pipeline/mod.rs

//! Module resolution and transformation for the script bundle.
//!
//! - [`module`]: source modules, hashing, specifier extraction.
//! - [`graph`]: the arena module graph and bundle ordering.
//! - [`resolve`]: specifier resolution.
//! - [`cache`]: session-scoped memo of transformed output.
//! - [`transform`]: the per-variant transform chain.

pub mod cache;
pub mod graph;
pub mod module;
pub mod resolve;
pub mod transform;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bundle::{BundleArtifact, BundleAssembler, SourceMapFragment, TransformedModule};
use crate::config::ConfigFile;
use crate::errors::{BuildError, PipelineFailure};
use crate::fs::FileSystem;
use crate::types::BuildVariant;

pub use cache::{CacheEntry, CacheStats, ModuleGraphCache};
pub use graph::{Edge, ModuleGraph, ModuleId};
pub use module::SourceModule;
pub use resolve::{FsResolver, Resolved, Resolver};
pub use transform::{Transform, TransformChain};

/// Result of one successful resolution + transform pass.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub graph: ModuleGraph,
    /// Dependency-first, entry last.
    pub modules: Vec<TransformedModule>,
    /// Modules whose transforms actually ran in this pass.
    pub transformed: usize,
    /// Modules served from the cache.
    pub reused: usize,
}

/// Resolves the module graph from a root and transforms every module once.
#[derive(Debug)]
pub struct TransformPipeline {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    resolver: Arc<dyn Resolver>,
    cache: Arc<ModuleGraphCache>,
    chains: BTreeMap<BuildVariant, Arc<TransformChain>>,
    /// Source map fragments are produced for these variants.
    map_variants: BTreeSet<BuildVariant>,
    /// Paths seen by the most recent pass, including modules that failed.
    module_paths: RwLock<BTreeSet<String>>,
}

enum Slot {
    Cached(SourceModule, Arc<CacheEntry>),
    Running(SourceModule, JoinHandle<anyhow::Result<String>>),
    Unreadable(BuildError),
}

impl TransformPipeline {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        resolver: Arc<dyn Resolver>,
        cache: Arc<ModuleGraphCache>,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            resolver,
            cache,
            chains: BTreeMap::new(),
            map_variants: BTreeSet::new(),
            module_paths: RwLock::new(BTreeSet::new()),
        }
    }

    /// Register the chain used for `chain.variant()`.
    pub fn with_chain(mut self, chain: TransformChain) -> Self {
        self.chains.insert(chain.variant(), Arc::new(chain));
        self
    }

    pub fn with_source_maps(mut self, variant: BuildVariant) -> Self {
        self.map_variants.insert(variant);
        self
    }

    /// Pipeline wired from `[script]` and `[env.*]`, with both variants.
    pub fn from_config(
        cfg: &ConfigFile,
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        cache: Arc<ModuleGraphCache>,
    ) -> Self {
        let root = root.into();
        let script = cfg.script();
        let resolver = FsResolver::new(
            Arc::clone(&fs),
            &root,
            script.extensions.clone(),
            script.externals.iter().cloned(),
        );

        let mut pipeline = Self::new(fs, &root, Arc::new(resolver), cache);
        for variant in [BuildVariant::Development, BuildVariant::Production] {
            pipeline = pipeline.with_chain(TransformChain::from_script_config(
                script,
                variant,
                cfg.env_values(variant),
                &root,
            ));
        }
        if script.source_map {
            pipeline = pipeline.with_source_maps(BuildVariant::Development);
        }
        pipeline
    }

    pub fn cache(&self) -> &Arc<ModuleGraphCache> {
        &self.cache
    }

    /// Whether `path` (project-relative) took part in the latest pass.
    pub fn is_module(&self, path: &str) -> bool {
        self.module_paths
            .read()
            .map(|paths| paths.contains(path))
            .unwrap_or(false)
    }

    pub fn module_paths(&self) -> Vec<String> {
        self.module_paths
            .read()
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve, transform and assemble the bundle rooted at `root_module`.
    pub async fn build(
        &self,
        root_module: &str,
        variant: BuildVariant,
        assembler: &BundleAssembler,
    ) -> Result<BundleArtifact, PipelineFailure> {
        let output = self.resolve(root_module, variant).await?;
        Ok(assembler.assemble(&output.modules))
    }

    /// Breadth-first resolution from `root_module`, transforming each newly
    /// discovered module at most once.
    ///
    /// Modules of one breadth level are transformed concurrently. Their
    /// results are consumed in discovery order, so the graph (and hence the
    /// bundle) does not depend on completion order. A failing module does not
    /// stop its siblings; all failures are returned together once the
    /// traversal is done.
    pub async fn resolve(
        &self,
        root_module: &str,
        variant: BuildVariant,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let Some(chain) = self.chains.get(&variant).cloned() else {
            return Err(PipelineFailure::single(BuildError::Runtime(format!(
                "no transform chain registered for {variant}"
            ))));
        };
        let with_maps = self.map_variants.contains(&variant);

        // Module ids are normalized project paths; the entry must match the
        // id its importers resolve it to.
        let entry_missing = || {
            PipelineFailure::single(BuildError::Resolution {
                specifier: root_module.to_string(),
                from_module: "(entry)".to_string(),
            })
        };
        let root_module = resolve::normalize(root_module).ok_or_else(entry_missing)?;
        if root_module.is_empty() || !self.fs.is_file(&self.root.join(&root_module)) {
            return Err(entry_missing());
        }

        let mut graph = ModuleGraph::new();
        let mut maps: HashMap<String, SourceMapFragment> = HashMap::new();
        let mut failures: Vec<BuildError> = Vec::new();
        let mut discovered: BTreeSet<String> = BTreeSet::new();
        // Targets may not be in the graph yet when an edge is found.
        let mut edges: Vec<(ModuleId, String, Resolved)> = Vec::new();
        let mut transformed = 0usize;
        let mut reused = 0usize;

        discovered.insert(root_module.to_string());
        let mut frontier: Vec<String> = vec![root_module.to_string()];

        while !frontier.is_empty() {
            let slots: Vec<Slot> = frontier
                .drain(..)
                .map(|path| self.start_module(path, variant, &chain))
                .collect();

            for slot in slots {
                let (module, entry) = match slot {
                    Slot::Cached(module, entry) => {
                        reused += 1;
                        (module, entry)
                    }
                    Slot::Running(module, handle) => {
                        let result = match handle.await {
                            Ok(result) => result,
                            Err(join_err) => {
                                Err(anyhow::anyhow!("transform task aborted: {join_err}"))
                            }
                        };
                        match result {
                            Ok(code) => {
                                transformed += 1;
                                let entry = self.store(&module, variant, code, with_maps);
                                (module, entry)
                            }
                            Err(e) => {
                                let cause = format!("{e:#}");
                                warn!(module = %module.path, %variant, error = %cause, "transform failed");
                                failures.push(BuildError::Transform {
                                    module_path: module.path,
                                    cause,
                                });
                                continue;
                            }
                        }
                    }
                    Slot::Unreadable(err) => {
                        warn!(error = %err, "module unreadable");
                        failures.push(err);
                        continue;
                    }
                };

                if let Some(map) = &entry.source_map {
                    maps.insert(module.path.clone(), map.clone());
                }
                let from = module.path.clone();
                let id = graph.insert(module, entry.code.clone());

                for specifier in &entry.specifiers {
                    match self.resolver.resolve(specifier, &from) {
                        Ok(Resolved::Module(target)) => {
                            if discovered.insert(target.clone()) {
                                frontier.push(target.clone());
                            }
                            edges.push((id, specifier.clone(), Resolved::Module(target)));
                        }
                        Ok(external @ Resolved::External(_)) => {
                            edges.push((id, specifier.clone(), external));
                        }
                        Err(err) => {
                            warn!(module = %from, specifier = %specifier, "unresolved specifier");
                            failures.push(err);
                        }
                    }
                }
            }
        }

        self.remember_paths(&discovered);

        if let Some(failure) = PipelineFailure::new(failures) {
            info!(
                %variant,
                failed = failure.failures().len(),
                "pipeline pass failed"
            );
            return Err(failure);
        }

        for (from, specifier, target) in edges {
            let edge = match target {
                Resolved::Module(path) => match graph.id_of(&path) {
                    Some(to) => Edge::Module(to),
                    None => continue,
                },
                Resolved::External(name) => Edge::External(name),
            };
            graph.add_edge(from, specifier, edge);
        }

        let order = match graph.id_of(&root_module) {
            Some(root) => graph.bundle_order(root),
            None => Vec::new(),
        };
        let modules: Vec<TransformedModule> = order
            .iter()
            .filter_map(|id| graph.node(*id))
            .map(|node| transformed_module(&graph, node, &mut maps))
            .collect();

        let reachable: HashSet<String> = modules.iter().map(|m| m.path.clone()).collect();
        self.cache.retain(variant, &reachable);

        info!(
            %variant,
            modules = modules.len(),
            transformed,
            reused,
            "pipeline pass finished"
        );

        Ok(PipelineOutput {
            graph,
            modules,
            transformed,
            reused,
        })
    }

    fn start_module(&self, path: String, variant: BuildVariant, chain: &Arc<TransformChain>) -> Slot {
        let content = match self.fs.read_to_string(&self.root.join(&path)) {
            Ok(content) => content,
            Err(e) => {
                return Slot::Unreadable(BuildError::Transform {
                    module_path: path,
                    cause: format!("{e:#}"),
                });
            }
        };

        let module = SourceModule::new(path, content);
        if let Some(entry) = self.cache.get(&module.path, &module.content_hash, variant) {
            return Slot::Cached(module, entry);
        }

        debug!(module = %module.path, %variant, "transforming");
        let chain = Arc::clone(chain);
        let job_path = module.path.clone();
        let input = module.content.to_string();
        let handle = tokio::spawn(async move { chain.run(&job_path, input).await });
        Slot::Running(module, handle)
    }

    fn store(
        &self,
        module: &SourceModule,
        variant: BuildVariant,
        code: String,
        with_maps: bool,
    ) -> Arc<CacheEntry> {
        let source_map = with_maps
            .then(|| SourceMapFragment::line_identity(&module.path, &module.content, &code));
        let entry = CacheEntry {
            content_hash: module.content_hash,
            specifiers: module::extract_specifiers(&code),
            code,
            source_map,
        };
        self.cache.insert(&module.path, variant, entry)
    }

    fn remember_paths(&self, paths: &BTreeSet<String>) {
        if let Ok(mut known) = self.module_paths.write() {
            known.clone_from(paths);
        }
    }
}

fn transformed_module(
    graph: &ModuleGraph,
    node: &graph::ModuleNode,
    maps: &mut HashMap<String, SourceMapFragment>,
) -> TransformedModule {
    let deps = node
        .edges
        .iter()
        .filter_map(|(specifier, edge)| {
            let target = match edge {
                Edge::Module(id) => Resolved::Module(graph.node(*id)?.module.path.clone()),
                Edge::External(name) => Resolved::External(name.clone()),
            };
            Some((specifier.clone(), target))
        })
        .collect();

    TransformedModule {
        path: node.module.path.clone(),
        code: node.code.clone(),
        deps,
        map: maps.remove(&node.module.path),
    }
}
