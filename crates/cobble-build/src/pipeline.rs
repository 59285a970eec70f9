//! Ordered build stages.

use crate::{Build, BuildError};
use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use tracing::debug;

/// One step of the build pipeline.
///
/// Stages run strictly one after another in registration order, so a stage
/// can rely on anything earlier stages attached to the [`Build`].
pub trait Stage: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Run against the in-progress build.
    fn run<'a>(&'a self, build: &'a mut Build) -> BoxFuture<'a, Result<(), BuildError>>;
}

/// A synchronous stage built from a closure. See [`stage_fn`].
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> Stage for FnStage<F>
where
    F: Fn(&mut Build) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run<'a>(&'a self, build: &'a mut Build) -> BoxFuture<'a, Result<(), BuildError>> {
        future::ready((self.f)(build).map_err(BuildError::Hook)).boxed()
    }
}

/// Turn a closure into a stage. An `Err` aborts the build with its message.
pub fn stage_fn<F>(name: impl Into<String>, f: F) -> FnStage<F>
where
    F: Fn(&mut Build) -> Result<(), String> + Send + Sync,
{
    FnStage {
        name: name.into(),
        f,
    }
}

/// The registered stages of a builder.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stage: impl Stage + 'static) {
        self.stages.push(Box::new(stage));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Names of the registered stages, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name())
    }

    /// Run every stage in order, stopping at the first failure.
    pub async fn run(&self, build: &mut Build) -> Result<(), BuildError> {
        for stage in &self.stages {
            debug!(stage = stage.name(), "running stage");
            stage.run(build).await?;
        }
        Ok(())
    }
}
