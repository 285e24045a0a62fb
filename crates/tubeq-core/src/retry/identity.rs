//! Client identity (User-Agent) rotation across attempts.

/// Cycles through configured identities, one per attempt.
#[derive(Debug, Clone, Default)]
pub struct IdentityRotation {
    agents: Vec<String>,
}

impl IdentityRotation {
    pub fn new(agents: Vec<String>) -> Self {
        let agents = agents.into_iter().filter(|a| !a.trim().is_empty()).collect();
        Self { agents }
    }

    /// Identity for `attempt` (1-based). None when no identities are configured.
    pub fn for_attempt(&self, attempt: u32) -> Option<&str> {
        if self.agents.is_empty() {
            return None;
        }
        let idx = attempt.saturating_sub(1) as usize % self.agents.len();
        Some(&self.agents[idx])
    }
}
