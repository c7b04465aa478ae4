use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

/// One entry of the directory tree rebuilt from uploaded paths.
/// `children` is `Some` exactly for directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
    pub content: Option<String>,
}

impl FileNode {
    pub fn root() -> Self {
        FileNode::directory("root", "/")
    }

    pub fn directory(name: &str, path: &str) -> Self {
        FileNode {
            name: name.to_string(),
            path: path.to_string(),
            node_type: NodeType::Directory,
            children: Some(Vec::new()),
            content: None,
        }
    }

    pub fn file(name: &str, path: &str) -> Self {
        FileNode {
            name: name.to_string(),
            path: path.to_string(),
            node_type: NodeType::File,
            children: None,
            content: None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children.as_ref()?.iter().find(|c| c.name == name)
    }
}

/// A named prompt template used to steer report generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub master_prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Idle,
    Processing,
    Generating,
    Success,
    Error,
}

impl AnalysisStatus {
    pub fn is_running(self) -> bool {
        matches!(self, AnalysisStatus::Processing | AnalysisStatus::Generating)
    }
}

#[derive(Deserialize)]
pub struct DirectoryQuery {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub config_error: Option<String>,
    pub status: AnalysisStatus,
    pub progress: String,
    pub file_count: usize,
    pub has_report: bool,
    pub selected_agent_id: Option<String>,
    pub error: Option<String>,
}
