// ABOUTME: Execution context handed to every sub-task - session identity plus
// ABOUTME: a session-scoped key/value state bag shared or snapshotted per mode.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

/// Session-scoped storage of named string values.
#[derive(Debug)]
pub struct Session {
    id: String,
    user_id: String,
    app_name: String,
    state: RwLock<HashMap<String, String>>,
}

impl Session {
    /// Create an empty session.
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            app_name: app_name.into(),
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the session with initial state.
    pub fn with_state(self, state: HashMap<String, String>) -> Self {
        *self.state.write() = state;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Read a single value.
    pub fn get(&self, key: &str) -> Option<String> {
        self.state.read().get(key).cloned()
    }

    /// Write a single value, replacing any previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.write().insert(key.into(), value.into());
    }

    /// Copy of the whole state as of now.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.state.read().clone()
    }

    /// Merge many values in one step; readers never see a half-applied merge.
    pub fn extend(&self, values: HashMap<String, String>) {
        self.state.write().extend(values);
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }
}

/// Everything a sub-task gets to see when it runs.
///
/// Cloning is cheap: the session is reference counted, so a clone (or
/// [`shallow_copy`](Self::shallow_copy)) observes and mutates the same state.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    session: Arc<Session>,
    invocation_id: String,
    instruction: Option<String>,
}

impl ExecutionContext {
    /// Create a root context over a session with a fresh invocation id.
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
            invocation_id: Uuid::new_v4().to_string(),
            instruction: None,
        }
    }

    /// Create a root context sharing an existing session.
    pub fn from_shared(session: Arc<Session>) -> Self {
        Self {
            session,
            invocation_id: Uuid::new_v4().to_string(),
            instruction: None,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn user_id(&self) -> &str {
        self.session.user_id()
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// The expanded instruction for the sub-task, if its definition carried one.
    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref()
    }

    /// Same session, same invocation. Writes are visible to every copy.
    pub fn shallow_copy(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            invocation_id: self.invocation_id.clone(),
            instruction: None,
        }
    }

    /// An isolated child session seeded with `state`.
    ///
    /// The child keeps the parent's user, app and invocation id.
    pub fn child(&self, session_id: impl Into<String>, state: HashMap<String, String>) -> Self {
        let session = Session::new(
            session_id,
            self.session.user_id(),
            self.session.app_name(),
        )
        .with_state(state);

        Self {
            session: Arc::new(session),
            invocation_id: self.invocation_id.clone(),
            instruction: None,
        }
    }

    /// Attach an expanded instruction.
    pub fn with_instruction(mut self, instruction: Option<String>) -> Self {
        self.instruction = instruction;
        self
    }
}
