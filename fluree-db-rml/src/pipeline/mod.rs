//! Asynchronous mapping pipeline
//!
//! [`MappingPipeline::new`] validates the whole rule graph before any
//! source is opened. [`MappingPipeline::run`] then drives every TriplesMap
//! concurrently and yields the generated quads as a [`MappingRun`] stream.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use futures::StreamExt;
//! # use fluree_db_rml::{CompiledRmlMapping, FunctionRegistry, InMemoryResolver, MappingPipeline, RmlConfig};
//! # async fn demo(mapping: CompiledRmlMapping, resolver: InMemoryResolver) -> fluree_db_rml::RmlResult<()> {
//! let pipeline = MappingPipeline::new(
//!     &mapping,
//!     &FunctionRegistry::with_builtins(),
//!     Arc::new(resolver),
//!     RmlConfig::default(),
//! )?;
//! let mut run = pipeline.run();
//! while let Some(quad) = run.next().await {
//!     println!("{}", quad?);
//! }
//! # Ok(())
//! # }
//! ```

mod plan;
mod run;

use std::sync::Arc;

pub use plan::MappingPlan;
pub use run::MappingRun;

use crate::config::RmlConfig;
use crate::error::RmlResult;
use crate::function::FunctionRegistry;
use crate::mapping::CompiledRmlMapping;
use crate::source::LogicalSourceResolver;

/// A validated mapping bound to a source resolver
///
/// Join state lives in the plan, so a pipeline runs once.
#[derive(Debug)]
pub struct MappingPipeline {
    plan: MappingPlan,
    resolver: Arc<dyn LogicalSourceResolver>,
    config: RmlConfig,
}

impl MappingPipeline {
    /// Compile the mapping; fails with every construction error found
    pub fn new(
        mapping: &CompiledRmlMapping,
        functions: &FunctionRegistry,
        resolver: Arc<dyn LogicalSourceResolver>,
        config: RmlConfig,
    ) -> RmlResult<Self> {
        let plan = MappingPlan::compile(mapping, functions, &config)?;
        Ok(Self {
            plan,
            resolver,
            config,
        })
    }

    /// Validate a mapping without binding it to sources
    pub fn validate(
        mapping: &CompiledRmlMapping,
        functions: &FunctionRegistry,
        config: &RmlConfig,
    ) -> RmlResult<()> {
        MappingPlan::compile(mapping, functions, config).map(|_| ())
    }

    pub fn plan(&self) -> &MappingPlan {
        &self.plan
    }

    pub fn config(&self) -> &RmlConfig {
        &self.config
    }

    /// Start the run on the current Tokio runtime
    pub fn run(self) -> MappingRun {
        run::start(
            self.plan,
            self.resolver,
            self.config.batch_size,
            self.config.channel_capacity,
            self.config.max_concurrent_sources,
        )
    }
}
