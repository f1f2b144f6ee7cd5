use async_trait::async_trait;

/// A task which performs async work against a shared context.
///
/// Tasks receive the context by reference and communicate results
/// through its interior mutability (`OnceLock`, `Mutex`, `RwLock`).
/// Returning an error aborts the remainder of the pipeline.
#[async_trait]
pub trait AsyncTask<C: Send + Sync, E>: Send + Sync {
    async fn run(&self, context: &C) -> Result<(), E>;
}

/// A task which performs purely synchronous work against a shared context.
pub trait BlockingTask<C: Send + Sync, E>: Send + Sync {
    fn run(&self, context: &C) -> Result<(), E>;
}

enum Stage<C, E> {
    Async(Box<dyn AsyncTask<C, E>>),
    Blocking(Box<dyn BlockingTask<C, E>>),
}

/// An ordered sequence of tasks sharing a context.
///
/// Stages run strictly in order. The first stage error short-circuits
/// the pipeline, so tasks which want downstream work to continue must
/// record their problem on the context and return `Ok`.
pub struct Pipeline<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C: Send + Sync, E> Pipeline<C, E> {
    pub async fn run(&self, context: &C) -> Result<(), E> {
        for stage in &self.stages {
            match stage {
                Stage::Async(task) => task.run(context).await?,
                Stage::Blocking(task) => task.run(context)?,
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

pub struct PipelineBuilder<C, E> {
    stages: Vec<Stage<C, E>>,
}

impl<C: Send + Sync, E> PipelineBuilder<C, E> {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn with_async(mut self, task: Box<dyn AsyncTask<C, E>>) -> Self {
        self.stages.push(Stage::Async(task));
        self
    }

    pub fn with_blocking(mut self, task: Box<dyn BlockingTask<C, E>>) -> Self {
        self.stages.push(Stage::Blocking(task));
        self
    }

    pub fn add_async(&mut self, task: Box<dyn AsyncTask<C, E>>) {
        self.stages.push(Stage::Async(task));
    }

    pub fn add_blocking(&mut self, task: Box<dyn BlockingTask<C, E>>) {
        self.stages.push(Stage::Blocking(task));
    }

    /// Builds the pipeline, or `None` when no tasks were added
    pub fn build(self) -> Option<Pipeline<C, E>> {
        if self.stages.is_empty() {
            return None;
        }

        Some(Pipeline {
            stages: self.stages,
        })
    }
}

impl<C: Send + Sync, E> Default for PipelineBuilder<C, E> {
    fn default() -> Self {
        Self::new()
    }
}
