use crate::task::{Status, Task};

use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};

/// A named chain of dependent stages.
///
/// Each stage starts only after the previous one fulfilled, receiving its
/// value. The first rejection or cancellation skips every later stage and
/// becomes the outcome of the whole pipeline.
///
/// # Examples
///
/// ```rust,ignore
/// let report = Pipeline::new("report", fetch_user(&scheduler))
///     .stage("posts", move |user| fetch_posts(&scheduler, user))
///     .map("count", |posts| posts.len())
///     .finish();
/// ```
pub struct Pipeline<T, E> {
    name: Rc<str>,
    current: Task<T, E>,
    stages: Vec<String>,
}

impl<T, E> Pipeline<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Starts a pipeline whose first value comes from `input`.
    pub fn new(name: impl Into<String>, input: Task<T, E>) -> Self {
        let name: Rc<str> = Rc::from(name.into());
        debug!(pipeline = %name, input = %input.id(), "pipeline created");

        Self {
            name,
            current: input,
            stages: Vec::new(),
        }
    }

    /// Appends a stage that starts the task returned by `f`.
    pub fn stage<U, F>(mut self, stage: impl Into<String>, f: F) -> Pipeline<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Task<U, E> + 'static,
    {
        let label = stage.into();
        let index = self.stages.len();
        let pipeline = Rc::clone(&self.name);
        let logged = label.clone();

        let next = self.current.and_then(move |value| {
            debug!(pipeline = %pipeline, stage = %logged, index, "stage started");
            f(value)
        });

        self.stages.push(label);

        Pipeline {
            name: self.name,
            current: next,
            stages: self.stages,
        }
    }

    /// Appends a synchronous stage.
    pub fn map<U, F>(mut self, stage: impl Into<String>, f: F) -> Pipeline<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        let label = stage.into();
        let index = self.stages.len();
        let pipeline = Rc::clone(&self.name);
        let logged = label.clone();

        let next = self.current.map(move |value| {
            debug!(pipeline = %pipeline, stage = %logged, index, "mapping value");
            f(value)
        });

        self.stages.push(label);

        Pipeline {
            name: self.name,
            current: next,
            stages: self.stages,
        }
    }

    /// Stage names, in order.
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// The task of the last stage so far.
    pub fn task(&self) -> &Task<T, E> {
        &self.current
    }

    /// Closes the pipeline and returns the task of its last stage.
    pub fn finish(self) -> Task<T, E> {
        let name = Rc::clone(&self.name);
        let stages = self.stages.len();

        self.current.finally(move |status| match status {
            Status::Fulfilled => info!(pipeline = %name, stages, "pipeline completed"),
            _ => info!(pipeline = %name, stages, ?status, "pipeline stopped"),
        })
    }
}

impl<T, E> fmt::Debug for Pipeline<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("task", &self.current)
            .finish()
    }
}
