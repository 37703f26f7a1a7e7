use log::error;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinSet};

/// A single-threaded actor that processes messages sequentially.
///
/// Messages are delivered through an unbounded inbox, so senders never block
/// and messages can be enqueued from synchronous contexts such as `Drop`
/// implementations.
pub trait Actor: Sized + Send + 'static {
    type Message: Send + 'static;
    type Options;
    type Error: std::fmt::Display + Send;

    /// The actor name used in log messages.
    fn name() -> &'static str;

    fn new(options: Self::Options) -> Self;

    fn start(&mut self, ctx: &mut ActorContext<Self>) -> Result<(), Self::Error>;

    /// Process one message and return the next action.
    /// This method should only return errors when they are not recoverable.
    /// In such a situation, the actor will be stopped.
    /// If the actor can recover from the error, it should handle it inside
    /// the method and return [Ok].
    /// This method must not block the thread, otherwise the actor event loop
    /// would stall since all messages are processed sequentially.
    /// Async operations belong in tasks spawned via [ActorContext::spawn].
    fn receive(
        &mut self,
        ctx: &mut ActorContext<Self>,
        message: Self::Message,
    ) -> Result<ActorAction, Self::Error>;

    fn stop(self) -> Result<(), Self::Error>;
}

pub enum ActorAction {
    Continue,
    Stop,
}

pub struct ActorContext<T: Actor> {
    handle: ActorHandle<T>,
    /// Tasks spawned by the actor when processing messages.
    /// All remaining tasks are aborted when the context is dropped.
    tasks: JoinSet<Result<(), T::Error>>,
}

impl<T: Actor> ActorContext<T> {
    pub fn new(handle: &ActorHandle<T>) -> Self {
        Self {
            handle: handle.clone(),
            tasks: JoinSet::new(),
        }
    }

    pub fn handle(&self) -> &ActorHandle<T> {
        &self.handle
    }

    /// Spawn a task owned by the actor and return a handle that can abort it.
    pub fn spawn(
        &mut self,
        task: impl std::future::Future<Output = Result<(), T::Error>> + Send + 'static,
    ) -> AbortHandle {
        self.tasks.spawn(task)
    }

    /// Join tasks that have completed and log errors.
    /// When the actor expects to handle errors, it should add the logic
    /// inside the task (e.g. sending itself a message on error).
    /// Any unhandled errors are logged here.
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("{} task failed: {e}", T::name());
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    error!("failed to join task spawned by {}: {e}", T::name());
                }
            }
        }
    }
}

pub struct ActorHandle<T: Actor> {
    sender: mpsc::UnboundedSender<T::Message>,
    stopped: watch::Receiver<bool>,
}

impl<T: Actor> Clone for ActorHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stopped: self.stopped.clone(),
        }
    }
}

impl<T: Actor> ActorHandle<T> {
    pub fn new(options: T::Options) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stopped_tx, stopped_rx) = watch::channel::<bool>(false);
        let handle = Self {
            sender: tx,
            stopped: stopped_rx,
        };
        let runner = ActorRunner {
            actor: T::new(options),
            ctx: ActorContext::new(&handle),
            receiver: rx,
            stopped: stopped_tx,
        };
        // The handle to the actor event loop task is not saved.
        // The actor runs "detached" and the event loop task stops by itself
        // when the stop action is taken.
        tokio::spawn(runner.run());
        handle
    }

    /// Enqueue a message for the actor.
    /// Returns the message if the actor has already stopped.
    pub fn send(&self, message: T::Message) -> Result<(), T::Message> {
        self.sender.send(message).map_err(|e| e.0)
    }

    /// A sender that can be embedded in other objects to reach the actor
    /// without carrying the actor type parameter around.
    pub fn sender(&self) -> mpsc::UnboundedSender<T::Message> {
        self.sender.clone()
    }

    pub async fn wait_for_stop(mut self) {
        // The receiver error is ignored since the sender must have been
        // dropped in this case, which means the actor has stopped.
        let _ = self.stopped.wait_for(|x| *x).await;
    }
}

struct ActorRunner<T: Actor> {
    actor: T,
    ctx: ActorContext<T>,
    receiver: mpsc::UnboundedReceiver<T::Message>,
    stopped: watch::Sender<bool>,
}

impl<T: Actor> ActorRunner<T> {
    async fn run(mut self) {
        let out = async {
            self.actor.start(&mut self.ctx)?;
            while let Some(message) = self.receiver.recv().await {
                match self.actor.receive(&mut self.ctx, message)? {
                    ActorAction::Continue => {}
                    ActorAction::Stop => {
                        break;
                    }
                }
                self.ctx.reap();
            }
            self.actor.stop()
        }
        .await;
        if let Err(e) = out {
            error!("{} failed: {e}", T::name());
        }
        // The inbox is closed before the stop signal, so a send attempted
        // after [ActorHandle::wait_for_stop] resolves is guaranteed to fail.
        drop(self.receiver);
        let _ = self.stopped.send(true);
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    struct TestActor {
        greeting: &'static str,
    }

    #[derive(Debug)]
    struct TestError;

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error")
        }
    }

    enum TestMessage {
        Greet {
            name: String,
            reply: oneshot::Sender<String>,
        },
        Defer {
            name: String,
            reply: oneshot::Sender<String>,
        },
        Stop,
    }

    impl Actor for TestActor {
        type Message = TestMessage;
        type Options = &'static str;
        type Error = TestError;

        fn name() -> &'static str {
            "TestActor"
        }

        fn new(options: Self::Options) -> Self {
            Self { greeting: options }
        }

        fn start(&mut self, _: &mut ActorContext<Self>) -> Result<(), Self::Error> {
            Ok(())
        }

        fn receive(
            &mut self,
            ctx: &mut ActorContext<Self>,
            message: Self::Message,
        ) -> Result<ActorAction, Self::Error> {
            match message {
                TestMessage::Greet { name, reply } => {
                    let _ = reply.send(format!("{} {name}", self.greeting));
                    Ok(ActorAction::Continue)
                }
                TestMessage::Defer { name, reply } => {
                    // Deferred replies go through a spawned task so that
                    // the event loop is never blocked.
                    let greeting = self.greeting;
                    ctx.spawn(async move {
                        let _ = reply.send(format!("{greeting} {name} (deferred)"));
                        Ok(())
                    });
                    Ok(ActorAction::Continue)
                }
                TestMessage::Stop => Ok(ActorAction::Stop),
            }
        }

        fn stop(self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_actor_handle_send() {
        let handle = ActorHandle::<TestActor>::new("hello");
        let (tx, rx) = oneshot::channel();
        let result = handle.send(TestMessage::Greet {
            name: "world".to_string(),
            reply: tx,
        });
        assert!(result.is_ok());
        assert_eq!(rx.await, Ok("hello world".to_string()));
    }

    #[tokio::test]
    async fn test_actor_context_spawn() {
        let handle = ActorHandle::<TestActor>::new("hi");
        let (tx, rx) = oneshot::channel();
        let result = handle.send(TestMessage::Defer {
            name: "there".to_string(),
            reply: tx,
        });
        assert!(result.is_ok());
        assert_eq!(rx.await, Ok("hi there (deferred)".to_string()));
    }

    #[tokio::test]
    async fn test_actor_handle_wait_for_stop() {
        let handle = ActorHandle::<TestActor>::new("bye");
        let result = handle.send(TestMessage::Stop);
        assert!(result.is_ok());

        handle.clone().wait_for_stop().await;
        // Multiple handles should be able to wait for the actor to stop.
        handle.clone().wait_for_stop().await;

        // Messages sent after the actor has stopped are returned to the caller.
        let (tx, _rx) = oneshot::channel();
        let message = TestMessage::Greet {
            name: "again".to_string(),
            reply: tx,
        };
        assert!(handle.send(message).is_err());
    }
}
