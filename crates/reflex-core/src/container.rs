//! A minimal drive loop around a graph.
//!
//! [`ProcessorContainer`] owns a [`Graph`] and an [`OutputHandler`]:
//! [`process`](ProcessorContainer::process) pushes one input and drains
//! every pending pass, invoking the handler exactly once per pass. Because
//! feedback loops enqueue further inputs, one `process` call can run more
//! than one pass; the per-pass handler invocation is what keeps every
//! output list inspectable exactly once.

use crate::graph::{Graph, GraphError, TopicState};

/// Per-pass output hook of a [`ProcessorContainer`].
pub trait OutputHandler {
    /// Called exactly once after each evaluation pass, with access to the
    /// graph (and thereby [`Graph::output_list`]).
    fn on_output(&mut self, graph: &Graph);
}

/// Drive loop holding a [`Graph`] and an [`OutputHandler`].
#[derive(Debug)]
pub struct ProcessorContainer<H: OutputHandler> {
    graph: Graph,
    handler: H,
}

impl<H: OutputHandler> ProcessorContainer<H> {
    /// Creates a container around a default graph.
    pub fn new(handler: H) -> Self {
        Self::with_graph(Graph::new(), handler)
    }

    /// Creates a container around an already-configured graph.
    pub fn with_graph(graph: Graph, handler: H) -> Self {
        Self { graph, handler }
    }

    /// The contained graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the contained graph (wiring, timer delivery).
    #[must_use]
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// The contained handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Pushes one input, then drains all pending passes.
    ///
    /// # Errors
    ///
    /// Propagates push and evaluation errors.
    pub fn process<T: TopicState + Clone + Default>(
        &mut self,
        value: T,
    ) -> Result<(), GraphError> {
        self.graph.push(value)?;
        self.process_graph()
    }

    /// Performs all pending evaluations, calling the handler once per
    /// pass.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors; remaining inputs stay queued.
    pub fn process_graph(&mut self) -> Result<(), GraphError> {
        while self.graph.evaluate_if_pending()? {
            self.handler.on_output(&self.graph);
        }
        Ok(())
    }
}
