// src/exec/actions.rs

//! What each task action actually does.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use globset::GlobSet;
use tracing::{debug, info};

use crate::bundle::{BundleAssembler, SinkConfig};
use crate::config::model::ConfigFile;
use crate::dag::ScheduledTask;
use crate::engine::Generation;
use crate::errors::{BuildError, PipelineFailure};
use crate::fs::{FileSystem, collect_matching_files};
use crate::pipeline::{ModuleGraphCache, TransformPipeline};
use crate::tools::{
    CommandLinter, GrassCompiler, Linter, MarkupContext, MinijinjaTemplater, PatternLinter,
    StylesheetCompiler, Templater,
};
use crate::types::{BuildVariant, TaskAction};
use crate::watch::patterns::build_globset;

/// Everything the task actions need for one build variant.
#[derive(Debug)]
pub struct BuildActions {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    variant: BuildVariant,
    generation: Generation,

    pipeline: Arc<TransformPipeline>,
    assembler: BundleAssembler,
    script_entry: String,

    stylesheet: Arc<dyn StylesheetCompiler>,
    stylesheet_entry: String,
    stylesheet_output: String,

    templater: Arc<dyn Templater>,
    markup_template: String,
    markup_output: String,
    env_values: BTreeMap<String, String>,

    linter: Arc<dyn Linter>,
    lint_include: GlobSet,
    lint_exclude: Option<GlobSet>,

    clean_targets: Vec<String>,
}

impl BuildActions {
    pub fn from_config(
        cfg: &ConfigFile,
        root: impl Into<PathBuf>,
        variant: BuildVariant,
        fs: Arc<dyn FileSystem>,
        cache: Arc<ModuleGraphCache>,
        generation: Generation,
    ) -> anyhow::Result<Self> {
        let root = root.into();
        let script = cfg.script();

        let pipeline = Arc::new(TransformPipeline::from_config(
            cfg,
            Arc::clone(&fs),
            &root,
            cache,
        ));
        let assembler = BundleAssembler::new(
            Arc::clone(&fs),
            &root,
            SinkConfig {
                output: script.output_for(variant).to_string(),
                source_map: script.source_map && !variant.is_production(),
            },
        );

        let linter: Arc<dyn Linter> = match &cfg.lint().cmd {
            Some(cmd) => Arc::new(CommandLinter::new(cmd, &root)),
            None => Arc::new(PatternLinter::new(Arc::clone(&fs), &root, &cfg.lint().deny)?),
        };
        let lint_include = build_globset(&cfg.lint().include)?;
        let lint_exclude = if cfg.lint().exclude.is_empty() {
            None
        } else {
            Some(build_globset(&cfg.lint().exclude)?)
        };

        Ok(Self {
            fs,
            root,
            variant,
            generation,
            pipeline,
            assembler,
            script_entry: script.entry.clone(),
            stylesheet: Arc::new(GrassCompiler),
            stylesheet_entry: cfg.stylesheet().entry.clone(),
            stylesheet_output: cfg.stylesheet().output.clone(),
            templater: Arc::new(MinijinjaTemplater),
            markup_template: cfg.markup().template.clone(),
            markup_output: cfg.markup().output.clone(),
            env_values: cfg.env_values(variant),
            linter,
            lint_include,
            lint_exclude,
            clean_targets: cfg.artifact_paths(),
        })
    }

    pub fn with_linter(mut self, linter: Arc<dyn Linter>) -> Self {
        self.linter = linter;
        self
    }

    pub fn with_stylesheet_compiler(mut self, compiler: Arc<dyn StylesheetCompiler>) -> Self {
        self.stylesheet = compiler;
        self
    }

    pub fn with_templater(mut self, templater: Arc<dyn Templater>) -> Self {
        self.templater = templater;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Arc<TransformPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn pipeline(&self) -> &Arc<TransformPipeline> {
        &self.pipeline
    }

    pub fn variant(&self) -> BuildVariant {
        self.variant
    }

    pub fn script_output(&self) -> &str {
        &self.assembler.sink().output
    }

    /// Run the action of `task`.
    pub async fn execute(&self, task: &ScheduledTask) -> Result<(), PipelineFailure> {
        debug!(task = %task.name, action = %task.action, run_id = task.run_id, "executing action");
        match task.action {
            TaskAction::Lint => self.lint().await.map_err(PipelineFailure::single),
            TaskAction::JsBundle => self.bundle(task.run_id).await,
            TaskAction::Stylesheet => self.compile_stylesheet(task.run_id).map_err(PipelineFailure::single),
            TaskAction::Markup => self.render_markup(task.run_id).map_err(PipelineFailure::single),
            TaskAction::Clean => self.clean().map_err(PipelineFailure::single),
            TaskAction::Group => Ok(()),
        }
    }

    async fn lint(&self) -> Result<(), BuildError> {
        let files = collect_matching_files(
            self.fs.as_ref(),
            &self.root,
            &self.lint_include,
            self.lint_exclude.as_ref(),
        )
        .map_err(|e| BuildError::Runtime(format!("collecting lint inputs: {e:#}")))?;

        let problems = self
            .linter
            .lint(&files)
            .await
            .map_err(|e| BuildError::Runtime(format!("running linter: {e:#}")))?;

        if problems.is_empty() {
            info!(files = files.len(), "lint passed");
            Ok(())
        } else {
            Err(BuildError::Lint { problems })
        }
    }

    async fn bundle(&self, run_id: u64) -> Result<(), PipelineFailure> {
        let artifact = self
            .pipeline
            .build(&self.script_entry, self.variant, &self.assembler)
            .await?;

        if !self.is_current(run_id, &self.assembler.sink().output) {
            return Ok(());
        }
        self.assembler.write(&artifact)?;
        Ok(())
    }

    fn compile_stylesheet(&self, run_id: u64) -> Result<(), BuildError> {
        let entry = self.root.join(&self.stylesheet_entry);
        let css = self
            .stylesheet
            .compile(self.fs.as_ref(), &entry, self.variant)
            .map_err(|e| BuildError::Transform {
                module_path: self.stylesheet_entry.clone(),
                cause: format!("{e:#}"),
            })?;

        if !self.is_current(run_id, &self.stylesheet_output) {
            return Ok(());
        }
        self.write_output(&self.stylesheet_output, &css)?;
        info!(output = %self.stylesheet_output, "stylesheet written");
        Ok(())
    }

    fn render_markup(&self, run_id: u64) -> Result<(), BuildError> {
        let source = self
            .fs
            .read_to_string(&self.root.join(&self.markup_template))
            .map_err(|e| BuildError::Transform {
                module_path: self.markup_template.clone(),
                cause: format!("{e:#}"),
            })?;

        let ctx = MarkupContext::new(
            self.variant,
            self.assembler.sink().output.clone(),
            self.stylesheet_output.clone(),
            self.env_values.clone(),
        );
        let html = self
            .templater
            .render(&self.markup_template, &source, &ctx)
            .map_err(|e| BuildError::Transform {
                module_path: self.markup_template.clone(),
                cause: format!("{e:#}"),
            })?;

        if !self.is_current(run_id, &self.markup_output) {
            return Ok(());
        }
        self.write_output(&self.markup_output, &html)?;
        info!(output = %self.markup_output, "markup written");
        Ok(())
    }

    fn clean(&self) -> Result<(), BuildError> {
        let mut removed = 0usize;
        for target in &self.clean_targets {
            let existed = self
                .fs
                .remove_file(&self.root.join(target))
                .map_err(|e| BuildError::SinkWrite {
                    path: target.clone(),
                    cause: format!("{e:#}"),
                })?;
            if existed {
                debug!(path = %target, "removed");
                removed += 1;
            }
        }
        info!(removed, "clean finished");
        Ok(())
    }

    fn write_output(&self, rel: &str, contents: &str) -> Result<(), BuildError> {
        self.fs
            .write_atomic(&self.root.join(rel), contents.as_bytes())
            .map_err(|e| BuildError::SinkWrite {
                path: rel.to_string(),
                cause: format!("{e:#}"),
            })
    }

    fn is_current(&self, run_id: u64, output: &str) -> bool {
        if self.generation.is_current(run_id) {
            return true;
        }
        info!(
            run_id,
            newest = self.generation.current(),
            output = %output,
            "discarding output of a superseded run"
        );
        false
    }
}
