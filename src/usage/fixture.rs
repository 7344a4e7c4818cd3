//! In-memory usage sources for tests. Each test owns its fixture; nothing is shared.

use super::{Session, SourceError, UsageSource};

pub struct FixtureSource {
    name: &'static str,
    sessions: Vec<Session>,
}

impl FixtureSource {
    pub fn new(name: &'static str, sessions: Vec<Session>) -> Self {
        Self { name, sessions }
    }
}

impl UsageSource for FixtureSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn setup(&self) -> Result<(), SourceError> {
        Ok(())
    }

    fn load_all_sessions(&self) -> Result<Vec<Session>, SourceError> {
        Ok(self.sessions.clone())
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>, SourceError> {
        Ok(self
            .sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned())
    }
}

/// A source that fails either during setup or on every call.
pub struct FailingSource {
    name: &'static str,
    message: &'static str,
    in_setup: bool,
}

impl FailingSource {
    pub fn runtime(name: &'static str, message: &'static str) -> Self {
        Self {
            name,
            message,
            in_setup: false,
        }
    }

    pub fn setup(name: &'static str, message: &'static str) -> Self {
        Self {
            name,
            message,
            in_setup: true,
        }
    }

    fn fail<T>(&self) -> Result<T, SourceError> {
        Err(SourceError::Failed(self.message.to_string()))
    }
}

impl UsageSource for FailingSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn setup(&self) -> Result<(), SourceError> {
        if self.in_setup {
            return Err(SourceError::NoData(self.message.to_string()));
        }
        Ok(())
    }

    fn load_all_sessions(&self) -> Result<Vec<Session>, SourceError> {
        self.fail()
    }

    fn load_session(&self, _session_id: &str) -> Result<Option<Session>, SourceError> {
        self.fail()
    }
}
