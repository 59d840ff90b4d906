//! Wire types for the agents service
//!
//! Only the fields the runner reads are modelled; everything else is ignored
//! on deserialization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Tool definitions
// ============================================================================

/// A tool attached to an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    /// Sandboxed code execution
    CodeInterpreter,
    /// Web search through a Bing connection
    BingGrounding { bing_grounding: BingGroundingConfig },
    /// Remote MCP server called by the service itself (approval flow)
    Mcp {
        server_label: String,
        server_url: String,
        #[serde(default)]
        allowed_tools: Vec<String>,
    },
    /// Function executed by the runner (tool-output flow)
    Function { function: FunctionDefinition },
}

impl ToolDefinition {
    /// Short type name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ToolDefinition::CodeInterpreter => "code_interpreter",
            ToolDefinition::BingGrounding { .. } => "bing_grounding",
            ToolDefinition::Mcp { .. } => "mcp",
            ToolDefinition::Function { .. } => "function",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BingGroundingConfig {
    pub search_configurations: Vec<BingSearchConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BingSearchConfiguration {
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments
    pub parameters: Value,
}

/// Per-run resources for the attached tools
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp: Vec<McpToolResource>,
}

impl ToolResources {
    pub fn is_empty(&self) -> bool {
        self.mcp.is_empty()
    }
}

/// Headers and approval mode for one MCP server
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolResource {
    pub server_label: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_approval: Option<String>,
}

impl std::fmt::Debug for McpToolResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolResource")
            .field("server_label", &self.server_label)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("require_approval", &self.require_approval)
            .finish()
    }
}

// ============================================================================
// Agents, threads, messages
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub model: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAgentRequest {
    pub model: String,
    pub name: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletionStatus {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentThread {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest {
    pub role: MessageRole,
    pub content: String,
}

/// Sort order for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSortOrder {
    Ascending,
    Descending,
}

impl ListSortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListSortOrder::Ascending => "asc",
            ListSortOrder::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    /// Text parts of the message, in order
    pub fn text_messages(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.value.as_str()),
                MessageContent::Other => None,
            })
            .collect()
    }

    /// The last text part, if any
    pub fn last_text(&self) -> Option<&str> {
        self.text_messages().last().copied()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: MessageText },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
    pub value: String,
}

/// Paged list envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub last_id: Option<String>,
}

// ============================================================================
// Runs
// ============================================================================

/// Lifecycle status of a run
///
/// Unrecognised statuses are kept verbatim so a newer service version
/// doesn't break deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    Unknown(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown(s) => s,
        }
    }

    /// Whether polling should stop
    ///
    /// Unknown statuses are treated as terminal; polling forever on a status
    /// we can't interpret is worse than stopping.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RunStatus::Queued
                | RunStatus::InProgress
                | RunStatus::RequiresAction
                | RunStatus::Cancelling
        )
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => RunStatus::Queued,
            "in_progress" => RunStatus::InProgress,
            "requires_action" => RunStatus::RequiresAction,
            "cancelling" => RunStatus::Cancelling,
            "cancelled" => RunStatus::Cancelled,
            "failed" => RunStatus::Failed,
            "completed" => RunStatus::Completed,
            "incomplete" => RunStatus::Incomplete,
            "expired" => RunStatus::Expired,
            _ => RunStatus::Unknown(value),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest {
    /// Agent that executes the run
    #[serde(rename = "assistant_id")]
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<ToolResources>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    #[serde(rename = "assistant_id", default)]
    pub agent_id: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.as_deref().unwrap_or("unknown"),
            self.message.as_deref().unwrap_or("no message")
        )
    }
}

/// What the service needs from the caller before the run can continue
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequiredAction {
    /// Approve (or reject) calls the service will make to an MCP server
    SubmitToolApproval {
        submit_tool_approval: RequiredToolCalls,
    },
    /// Execute function calls and hand back their output
    SubmitToolOutputs {
        submit_tool_outputs: RequiredToolCalls,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequiredToolCalls {
    #[serde(default)]
    pub tool_calls: Vec<RequiredToolCall>,
}

/// A single tool call the run is blocked on
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequiredToolCall {
    Function {
        id: String,
        function: FunctionCall,
    },
    Mcp {
        id: String,
        name: String,
        #[serde(default)]
        arguments: String,
        server_label: String,
    },
    #[serde(other)]
    Unsupported,
}

impl RequiredToolCall {
    pub fn id(&self) -> Option<&str> {
        match self {
            RequiredToolCall::Function { id, .. } | RequiredToolCall::Mcp { id, .. } => Some(id.as_str()),
            RequiredToolCall::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    pub arguments: String,
}

/// Output of an executed function call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// Decision on an MCP call awaiting approval
#[derive(Clone, PartialEq, Serialize)]
pub struct ToolApproval {
    pub tool_call_id: String,
    pub approve: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl std::fmt::Debug for ToolApproval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolApproval")
            .field("tool_call_id", &self.tool_call_id)
            .field("approve", &self.approve)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Run steps
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RunStep {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub step_details: Option<StepDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDetails {
    MessageCreation {
        message_creation: MessageCreationRef,
    },
    ToolCalls {
        #[serde(default)]
        tool_calls: Vec<StepToolCall>,
    },
    Activities {
        #[serde(default)]
        activities: Vec<RunStepActivity>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreationRef {
    pub message_id: String,
}

/// A tool call recorded on a step; type-specific payload is kept raw
#[derive(Debug, Clone, Deserialize)]
pub struct StepToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Functions the service announced it is about to call
#[derive(Debug, Clone, Deserialize)]
pub struct RunStepActivity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tools: BTreeMap<String, ActivityFunction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityFunction {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<ActivityParameters>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityParameters {
    #[serde(default)]
    pub properties: BTreeMap<String, ActivityParameter>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityParameter {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definitions_serialize() {
        let tools = vec![
            ToolDefinition::CodeInterpreter,
            ToolDefinition::Mcp {
                server_label: "docs".into(),
                server_url: "https://learn.microsoft.com/api/mcp".into(),
                allowed_tools: vec!["microsoft_docs_search".into()],
            },
            ToolDefinition::BingGrounding {
                bing_grounding: BingGroundingConfig {
                    search_configurations: vec![BingSearchConfiguration {
                        connection_id: "conn-1".into(),
                    }],
                },
            },
        ];

        let value = serde_json::to_value(&tools).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "code_interpreter"},
                {
                    "type": "mcp",
                    "server_label": "docs",
                    "server_url": "https://learn.microsoft.com/api/mcp",
                    "allowed_tools": ["microsoft_docs_search"]
                },
                {
                    "type": "bing_grounding",
                    "bing_grounding": {"search_configurations": [{"connection_id": "conn-1"}]}
                }
            ])
        );
    }

    #[test]
    fn test_run_with_approval_action() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "object": "thread.run",
            "thread_id": "thread_1",
            "assistant_id": "asst_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_approval",
                "submit_tool_approval": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "mcp",
                        "name": "microsoft_docs_search",
                        "arguments": "{\"query\":\"AI-102\"}",
                        "server_label": "docs"
                    }]
                }
            }
        }))
        .unwrap();

        assert_eq!(run.status, RunStatus::RequiresAction);
        match run.required_action.unwrap() {
            RequiredAction::SubmitToolApproval { submit_tool_approval } => {
                assert_eq!(submit_tool_approval.tool_calls.len(), 1);
                assert_eq!(submit_tool_approval.tool_calls[0].id(), Some("call_1"));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_run_with_output_action_and_unknown_call() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "sql__list_tables", "arguments": "{}"}},
                        {"id": "call_2", "type": "file_search"}
                    ]
                }
            }
        }))
        .unwrap();

        let Some(RequiredAction::SubmitToolOutputs { submit_tool_outputs }) = run.required_action
        else {
            panic!("expected submit_tool_outputs");
        };
        assert!(matches!(
            &submit_tool_outputs.tool_calls[0],
            RequiredToolCall::Function { function, .. } if function.name == "sql__list_tables"
        ));
        assert_eq!(submit_tool_outputs.tool_calls[1], RequiredToolCall::Unsupported);
    }

    #[test]
    fn test_run_status_roundtrip_and_terminal() {
        let status: RunStatus = serde_json::from_value(json!("in_progress")).unwrap();
        assert_eq!(status, RunStatus::InProgress);
        assert!(!status.is_terminal());

        let status: RunStatus = serde_json::from_value(json!("paused")).unwrap();
        assert_eq!(status, RunStatus::Unknown("paused".into()));
        assert!(status.is_terminal());
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("paused"));

        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Cancelling.is_terminal());
    }

    #[test]
    fn test_thread_message_text() {
        let message: ThreadMessage = serde_json::from_value(json!({
            "id": "msg_1",
            "role": "assistant",
            "content": [
                {"type": "text", "text": {"value": "first", "annotations": []}},
                {"type": "image_file", "image_file": {"file_id": "f"}},
                {"type": "text", "text": {"value": "second", "annotations": []}}
            ]
        }))
        .unwrap();

        assert_eq!(message.text_messages(), vec!["first", "second"]);
        assert_eq!(message.last_text(), Some("second"));
    }

    #[test]
    fn test_run_step_activities() {
        let step: RunStep = serde_json::from_value(json!({
            "id": "step_1",
            "status": "completed",
            "step_details": {
                "type": "activities",
                "activities": [{
                    "type": "mcp_list_tools",
                    "server_label": "docs",
                    "tools": {
                        "microsoft_docs_search": {
                            "description": "Search docs",
                            "parameters": {
                                "type": "object",
                                "properties": {
                                    "query": {"type": "string", "description": "Search query"}
                                },
                                "required": ["query"]
                            }
                        }
                    }
                }]
            }
        }))
        .unwrap();

        let Some(StepDetails::Activities { activities }) = step.step_details else {
            panic!("expected activities");
        };
        let function = &activities[0].tools["microsoft_docs_search"];
        let params = function.parameters.as_ref().unwrap();
        assert_eq!(params.properties["query"].kind.as_deref(), Some("string"));
        assert_eq!(params.required, vec!["query"]);
    }

    #[test]
    fn test_approval_debug_hides_headers() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer secret".to_string());
        let approval = ToolApproval {
            tool_call_id: "call_1".into(),
            approve: true,
            headers,
        };
        let debug = format!("{:?}", approval);
        assert!(!debug.contains("secret"));

        let value = serde_json::to_value(&approval).unwrap();
        assert_eq!(value["headers"]["Authorization"], "Bearer secret");
    }
}
