use async_trait::async_trait;
use std::future::Future;

/// One transformation stage of a pipeline.
///
/// `process` may keep partial input buffered until a later call completes it.
pub trait StreamNode: Send {
    type Input: Send + 'static;
    type Output: Clone + Send + 'static;

    /// Consumes one input unit and returns the output units it completes.
    fn process(&mut self, input: Self::Input) -> Vec<Self::Output>;

    /// Releases whatever is still buffered at end of stream.
    fn flush(&mut self) -> Vec<Self::Output> {
        Vec::new()
    }

    /// Discards buffered state without touching the wiring.
    fn reset(&mut self) {}
}

/// Anything that can receive pipeline output.
#[async_trait]
pub trait Sink<T: Send + 'static>: Send {
    async fn handle(&mut self, input: T);

    /// Signals end of stream; buffered units are pushed through.
    async fn finish(&mut self) {}

    fn reset(&mut self) {}
}

/// A stage wired to its downstream sinks.
///
/// Wiring is fixed once the node is built: `connect_to` consumes the node, and
/// once it is boxed into an upstream node there is no way to reach it again.
pub struct Node<N: StreamNode> {
    stage: N,
    downstream: Vec<Box<dyn Sink<N::Output>>>,
}

impl<N: StreamNode> Node<N> {
    pub fn new(stage: N) -> Self {
        Self {
            stage,
            downstream: Vec::new(),
        }
    }

    /// Adds a downstream sink. Outputs go to sinks in the order they were added.
    pub fn connect_to(mut self, sink: impl Sink<N::Output> + 'static) -> Self {
        self.downstream.push(Box::new(sink));
        self
    }

    /// Borrows the stage, e.g. to inspect its buffer.
    pub fn stage(&self) -> &N {
        &self.stage
    }

    async fn forward(&mut self, outputs: Vec<N::Output>) {
        for output in outputs {
            for sink in self.downstream.iter_mut() {
                sink.handle(output.clone()).await;
            }
        }
    }
}

#[async_trait]
impl<N: StreamNode> Sink<N::Input> for Node<N> {
    async fn handle(&mut self, input: N::Input) {
        let outputs = self.stage.process(input);
        self.forward(outputs).await;
    }

    async fn finish(&mut self) {
        let outputs = self.stage.flush();
        self.forward(outputs).await;
        for sink in self.downstream.iter_mut() {
            sink.finish().await;
        }
    }

    fn reset(&mut self) {
        self.stage.reset();
        for sink in self.downstream.iter_mut() {
            sink.reset();
        }
    }
}

/// Terminal sink that hands each unit to a user callback.
pub struct CallbackNode<F> {
    callback: F,
}

impl<F> CallbackNode<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<T, F, Fut> Sink<T> for CallbackNode<F>
where
    T: Send + 'static,
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&mut self, input: T) {
        (self.callback)(input).await;
    }
}
