//! The deployment collaborator: for each attached action, delete it
//! (ignoring not-found) and then update it, so every attachment ends up
//! in exactly one final state.
//!
//! Kept behind a trait so `publish`'s sequencing is unit-testable without
//! a network. The real HTTP client that talks to a platform's management
//! API is intentionally not implemented here.

use composer_compiler::ast::AttachedAction;

/// A platform client capable of publishing attached actions.
pub trait DeployClient {
    fn delete(&mut self, name: &str) -> Result<(), DeployError>;
    fn update(&mut self, action: &AttachedAction) -> Result<(), DeployError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeployError {
    /// The action didn't exist yet; `publish` ignores this on `delete`.
    #[error("action {0:?} not found")]
    NotFound(String),
    /// Any other failure; `publish` stops and propagates it.
    #[error("{0}")]
    Failed(String),
}

/// Deletes (ignoring `NotFound`) then updates every attached action, in
/// order, so each attachment ends up in exactly one final state.
pub fn publish(client: &mut dyn DeployClient, actions: &[AttachedAction]) -> Result<(), DeployError> {
    for action in actions {
        match client.delete(&action.name) {
            Ok(()) | Err(DeployError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        client.update(action)?;
    }
    Ok(())
}

/// A stub client documenting the real client's contract without making
/// network calls: reading credentials and talking to a platform's
/// management API live outside this crate.
pub struct StubDeployClient {
    pub apihost: Option<String>,
    pub auth: Option<String>,
    pub insecure: bool,
}

impl DeployClient for StubDeployClient {
    fn delete(&mut self, _name: &str) -> Result<(), DeployError> {
        Err(self.unimplemented())
    }

    fn update(&mut self, _action: &AttachedAction) -> Result<(), DeployError> {
        Err(self.unimplemented())
    }
}

impl StubDeployClient {
    fn unimplemented(&self) -> DeployError {
        DeployError::Failed(format!(
            "no management-API client is configured for {} (auth {}, insecure={})",
            self.apihost.as_deref().unwrap_or("<default apihost>"),
            if self.auth.is_some() { "provided" } else { "not provided" },
            self.insecure,
        ))
    }
}
