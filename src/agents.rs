use crate::models::Agent;
use chrono::Utc;
use indexmap::IndexMap;
use log::info;

/// In-memory agents keyed by id, kept in insertion order, plus the
/// current selection.
#[derive(Debug, Clone)]
pub struct AgentStore {
    agents: IndexMap<String, Agent>,
    selected: Option<String>,
}

impl AgentStore {
    pub fn new(agents: Vec<Agent>) -> Self {
        let selected = agents.first().map(|a| a.id.clone());
        let agents = agents.into_iter().map(|a| (a.id.clone(), a)).collect();
        AgentStore { agents, selected }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_agents())
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Agent> {
        self.selected.as_deref().and_then(|id| self.agents.get(id))
    }

    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Replaces the agent with the same id in place, or appends it. An agent
    /// without an id gets a fresh time-derived one.
    pub fn save(&mut self, mut agent: Agent) -> Agent {
        if agent.id.trim().is_empty() {
            agent.id = self.fresh_id();
        }
        let replaced = self.agents.insert(agent.id.clone(), agent.clone()).is_some();
        info!(
            "{} agent '{}' ({}).",
            if replaced { "Updated" } else { "Added" },
            agent.name,
            agent.id
        );
        agent
    }

    /// Removes an agent. Deleting the selected one moves the selection to
    /// the first remaining agent, or clears it.
    pub fn delete(&mut self, id: &str) -> Option<Agent> {
        let removed = self.agents.shift_remove(id)?;
        if self.selected.as_deref() == Some(id) {
            self.selected = self.agents.keys().next().cloned();
        }
        info!("Deleted agent '{}' ({}).", removed.name, removed.id);
        Some(removed)
    }

    fn fresh_id(&self) -> String {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let id = format!("agent-{}", millis);
            if !self.agents.contains_key(&id) {
                return id;
            }
            millis += 1;
        }
    }
}

fn default_agents() -> Vec<Agent> {
    vec![
        Agent {
            id: "project-overview".to_string(),
            name: "Project Overview".to_string(),
            description: "Summarizes what the project is, how it is organized and how to run it."
                .to_string(),
            master_prompt: "You are a senior software architect. Write a clear overview of this \
                project: its purpose, main components, how the directories are organized, key \
                technologies, and how to build and run it. Use headings and bullet lists."
                .to_string(),
        },
        Agent {
            id: "code-review".to_string(),
            name: "Code Review".to_string(),
            description: "Points out bugs, risky patterns and maintainability problems.".to_string(),
            master_prompt: "You are an experienced code reviewer. Review the uploaded files and \
                report likely bugs, security issues, error-handling gaps and maintainability \
                problems. Group findings by file and rank them by severity."
                .to_string(),
        },
        Agent {
            id: "documentation-writer".to_string(),
            name: "Documentation Writer".to_string(),
            description: "Drafts user-facing documentation from the folder's contents.".to_string(),
            master_prompt: "You are a technical writer. Using the uploaded files, draft user \
                documentation: an introduction, installation steps, a usage guide with examples, \
                and a short FAQ."
                .to_string(),
        },
    ]
}
