// ABOUTME: Defines the SubTask trait - the one entry point a coordinator uses
// ABOUTME: to run a unit of work and drain its lazy, finite event stream.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use super::Event;
use crate::context::ExecutionContext;
use crate::error::SubTaskError;

/// A lazy, finite sequence of result events.
///
/// An `Err` item means the sub-task terminated abnormally; nothing after it is read.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, SubTaskError>> + Send + 'static>>;

/// A schedulable unit of work.
pub trait SubTask: Send + Sync {
    /// Start the sub-task against `ctx` and return its event stream.
    fn run(&self, ctx: ExecutionContext) -> EventStream;
}

/// Adapter that turns an async closure into a [`SubTask`].
///
/// The closure resolves to every event at once; the stream replays them.
pub struct FnSubTask<F> {
    f: F,
}

impl<F, Fut> FnSubTask<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Event>, SubTaskError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> SubTask for FnSubTask<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Event>, SubTaskError>> + Send + 'static,
{
    fn run(&self, ctx: ExecutionContext) -> EventStream {
        let fut = (self.f)(ctx);
        Box::pin(async_stream::try_stream! {
            let events = fut.await?;
            for event in events {
                yield event;
            }
        })
    }
}

/// A sub-task whose whole result is one piece of text.
#[async_trait]
pub trait TextTask: Send + Sync + 'static {
    /// Author name on the produced event.
    fn name(&self) -> &str;

    /// Produce the result text. An error fails the sub-task.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<String, anyhow::Error>;
}

/// Adapter that runs a [`TextTask`] as a [`SubTask`] yielding one text event.
pub struct TextSubTask<T> {
    task: Arc<T>,
}

impl<T: TextTask> TextSubTask<T> {
    pub fn new(task: T) -> Self {
        Self {
            task: Arc::new(task),
        }
    }
}

impl<T: TextTask> SubTask for TextSubTask<T> {
    fn run(&self, ctx: ExecutionContext) -> EventStream {
        let task = Arc::clone(&self.task);
        Box::pin(async_stream::try_stream! {
            let text = task.execute(&ctx).await.map_err(SubTaskError::Failed)?;
            yield Event::text(task.name(), text);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Session;
    use futures::StreamExt;

    struct Echo;

    #[async_trait]
    impl TextTask for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, ctx: &ExecutionContext) -> Result<String, anyhow::Error> {
            ctx.instruction()
                .map(String::from)
                .ok_or_else(|| anyhow::anyhow!("no instruction"))
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Session::new("s", "u", "app"))
    }

    #[tokio::test]
    async fn test_fn_sub_task_replays_events() {
        let task = FnSubTask::new(|_ctx| async {
            Ok(vec![Event::text("a", "one"), Event::text("a", "two")])
        });
        let events: Vec<_> = task.run(ctx()).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].as_ref().unwrap().parts, vec!["two".to_string()]);
    }

    #[tokio::test]
    async fn test_text_sub_task_yields_one_event() {
        let task = TextSubTask::new(Echo);
        let mut stream = task.run(ctx().with_instruction(Some("hello".into())));

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.author, "echo");
        assert_eq!(event.parts, vec!["hello".to_string()]);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_text_sub_task_error_ends_stream() {
        let task = TextSubTask::new(Echo);
        let mut stream = task.run(ctx());

        match stream.next().await {
            Some(Err(SubTaskError::Failed(e))) => assert_eq!(e.to_string(), "no instruction"),
            other => panic!("Expected Failed, got {:?}", other.map(|r| r.is_ok())),
        }
        assert!(stream.next().await.is_none());
    }
}
