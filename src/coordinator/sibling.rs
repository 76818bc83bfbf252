// ABOUTME: One sibling's lifecycle inside a coordinator: snapshot, instruction
// ABOUTME: expansion, stream drain, commit or failure record, failure event.

use std::time::Instant;

use futures::StreamExt;

use crate::context::ExecutionContext;
use crate::error::SubTaskError;
use crate::state::{AggregationStore, ExecutionDraft};
use crate::subtask::{Event, EventStream, SubTaskDefinition};
use crate::workflow::substitute;

/// How one sibling settled.
#[derive(Debug)]
pub(crate) struct SiblingOutcome {
    pub events: Vec<Event>,
    pub error: Option<String>,
}

impl SiblingOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// A sibling that never got to run.
    pub fn rejected(author: &str, def: &SubTaskDefinition, message: String) -> Self {
        Self {
            events: vec![Event::failure(author, &def.name, &message)],
            error: Some(message),
        }
    }
}

/// Child session id for the sibling at `index`.
pub(crate) fn child_session_id(parent: &str, index: usize) -> String {
    format!("{}-sub-{}", parent, index)
}

/// Run a sibling in keyed-aggregation mode.
///
/// The sibling starts from parent state merged with the outputs committed so
/// far, and never sees later commits. A success is committed through the
/// store; any failure becomes a failure record plus a failure event.
pub(crate) async fn run_keyed(
    author: &str,
    index: usize,
    def: &SubTaskDefinition,
    default_namespace: &str,
    ctx: &ExecutionContext,
    store: &AggregationStore,
) -> SiblingOutcome {
    let workflow_id = ctx.session_id();
    let child_id = child_session_id(workflow_id, index);
    let draft = ExecutionDraft::start(
        index,
        &def.name,
        def.namespace_or(default_namespace),
        &child_id,
        def.output_key.clone(),
    );
    let started = Instant::now();
    let mut events = Vec::new();

    let result = match drive_keyed(def, ctx, &child_id, store, &mut events).await {
        Ok(output) => store
            .commit_success(workflow_id, draft.clone(), output)
            .await
            .map_err(SubTaskError::from),
        Err(err) => Err(err),
    };

    match result {
        Ok(execution) => {
            tracing::debug!(
                completion_order = execution.completion_order,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Sub-task succeeded"
            );
            SiblingOutcome {
                events,
                error: None,
            }
        }
        Err(err) => {
            let message = err.to_string();
            tracing::warn!(
                error = %message,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Sub-task failed"
            );
            if let Err(e) = store.record_failure(workflow_id, draft, &message).await {
                tracing::error!(error = %e, "Failed to record sub-task failure");
            }
            events.push(Event::failure(author, &def.name, &message));
            SiblingOutcome {
                events,
                error: Some(message),
            }
        }
    }
}

/// Run a sibling in shared-context mode: a shallow copy of the parent
/// context, events forwarded as they are.
pub(crate) async fn run_shared(
    author: &str,
    def: &SubTaskDefinition,
    ctx: &ExecutionContext,
) -> SiblingOutcome {
    let started = Instant::now();
    let mut events = Vec::new();

    let result = match expand_instruction(def, &ctx.session().snapshot()) {
        Ok(instruction) => {
            let copy = ctx.shallow_copy().with_instruction(instruction);
            drain(def.task.run(copy), &mut events).await.map(|_| ())
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => SiblingOutcome {
            events,
            error: None,
        },
        Err(err) => {
            let message = err.to_string();
            tracing::warn!(
                error = %message,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Sub-task failed"
            );
            events.push(Event::failure(author, &def.name, &message));
            SiblingOutcome {
                events,
                error: Some(message),
            }
        }
    }
}

async fn drive_keyed(
    def: &SubTaskDefinition,
    ctx: &ExecutionContext,
    child_id: &str,
    store: &AggregationStore,
    events: &mut Vec<Event>,
) -> Result<String, SubTaskError> {
    let mut state = ctx.session().snapshot();
    state.extend(store.outputs_of(ctx.session_id()).await?);

    let instruction = expand_instruction(def, &state)?;
    let child = ctx.child(child_id, state).with_instruction(instruction);

    drain(def.task.run(child), events).await
}

fn expand_instruction(
    def: &SubTaskDefinition,
    state: &std::collections::HashMap<String, String>,
) -> Result<Option<String>, SubTaskError> {
    let instruction = def
        .instruction
        .as_deref()
        .map(|template| substitute(template, state))
        .transpose()?;
    Ok(instruction)
}

/// Read the stream to the end, keeping every event. Returns the text
/// fragments joined with newlines. Stops at the first error.
async fn drain(mut stream: EventStream, events: &mut Vec<Event>) -> Result<String, SubTaskError> {
    let mut fragments: Vec<String> = Vec::new();
    while let Some(event) = stream.next().await {
        let event = event?;
        fragments.extend(event.text_fragments().map(String::from));
        events.push(event);
    }
    Ok(fragments.join("\n"))
}
