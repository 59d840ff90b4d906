//! Run-step and conversation rendering
//!
//! Formatting is kept apart from printing so it can be tested.

use crate::agents::{ListSortOrder, MessageRole, RunStep, StepDetails, ThreadMessage};
use crate::core::RunnerResult;
use crate::session::AgentSession;

use super::console::Console;

/// Plain-text lines describing one run step
pub fn step_lines(step: &RunStep) -> Vec<String> {
    let mut lines = vec![format!("Step {} status: {}", step.id, step.status)];

    match &step.step_details {
        Some(StepDetails::ToolCalls { tool_calls }) if !tool_calls.is_empty() => {
            lines.push("  Tool calls:".to_string());
            for call in tool_calls {
                lines.push(format!("    Tool Call ID: {}", call.id));
                lines.push(format!("    Type: {}", call.kind));
            }
        }
        Some(StepDetails::Activities { activities }) => {
            for activity in activities {
                for (name, function) in &activity.tools {
                    lines.push(format!(
                        "  The function {} with description \"{}\" will be called.",
                        name,
                        function.description.as_deref().unwrap_or("")
                    ));
                    match &function.parameters {
                        Some(params) if !params.properties.is_empty() => {
                            lines.push("  Function parameters:".to_string());
                            for (arg, param) in &params.properties {
                                lines.push(format!("      {}", arg));
                                lines.push(format!(
                                    "      Type: {}",
                                    param.kind.as_deref().unwrap_or("unknown")
                                ));
                                lines.push(format!(
                                    "      Description: {}",
                                    param.description.as_deref().unwrap_or("")
                                ));
                            }
                        }
                        _ => lines.push("  This function has no parameters".to_string()),
                    }
                }
            }
        }
        Some(StepDetails::MessageCreation { message_creation }) => {
            lines.push(format!("  Created message {}", message_creation.message_id));
        }
        _ => {}
    }

    lines
}

/// The role and last text of every message that has text
pub fn conversation_entries(messages: &[ThreadMessage]) -> Vec<(MessageRole, String)> {
    messages
        .iter()
        .filter_map(|m| m.last_text().map(|text| (m.role, text.to_string())))
        .collect()
}

/// Print the steps of a run
pub fn print_run_steps(console: &Console, steps: &[RunStep]) {
    for step in steps {
        for line in step_lines(step) {
            console.print_step_line(&line);
        }
        console.println();
    }
}

/// Print the conversation in chronological order
pub fn print_conversation(console: &Console, messages: &[ThreadMessage]) {
    console.print_section("Conversation:");
    console.print_separator();
    for (role, text) in conversation_entries(messages) {
        console.print_message(role, &text);
        console.print_separator();
    }
}

/// Fetch and print the steps of `run_id` and the whole thread
pub async fn print_transcript(
    console: &Console,
    session: &AgentSession,
    run_id: &str,
) -> RunnerResult<()> {
    let client = session.client();

    let steps = client.list_run_steps(session.thread_id(), run_id).await?;
    print_run_steps(console, &steps);

    let messages = client
        .list_messages(session.thread_id(), ListSortOrder::Ascending)
        .await?;
    print_conversation(console, &messages);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_call_step() {
        let step: RunStep = serde_json::from_value(json!({
            "id": "step_1",
            "status": "completed",
            "step_details": {
                "type": "tool_calls",
                "tool_calls": [{"id": "call_1", "type": "mcp", "server_label": "docs"}]
            }
        }))
        .unwrap();

        assert_eq!(
            step_lines(&step),
            vec![
                "Step step_1 status: completed",
                "  Tool calls:",
                "    Tool Call ID: call_1",
                "    Type: mcp",
            ]
        );
    }

    #[test]
    fn test_activity_step() {
        let step: RunStep = serde_json::from_value(json!({
            "id": "step_2",
            "status": "completed",
            "step_details": {
                "type": "activities",
                "activities": [{
                    "type": "mcp_list_tools",
                    "tools": {
                        "ping": {"description": "Health check", "parameters": {"type": "object"}},
                        "search": {
                            "description": "Search",
                            "parameters": {
                                "type": "object",
                                "properties": {"query": {"type": "string", "description": "Text"}}
                            }
                        }
                    }
                }]
            }
        }))
        .unwrap();

        let lines = step_lines(&step);
        assert_eq!(
            lines[1],
            "  The function ping with description \"Health check\" will be called."
        );
        assert_eq!(lines[2], "  This function has no parameters");
        assert_eq!(lines[4], "  Function parameters:");
        assert_eq!(lines[5], "      query");
        assert_eq!(lines[6], "      Type: string");
        assert_eq!(lines[7], "      Description: Text");
    }

    #[test]
    fn test_conversation_entries_skip_empty() {
        let messages: Vec<ThreadMessage> = serde_json::from_value(json!([
            {"id": "m1", "role": "user",
             "content": [{"type": "text", "text": {"value": "What should I study?"}}]},
            {"id": "m2", "role": "assistant", "content": []},
            {"id": "m3", "role": "assistant",
             "content": [{"type": "text", "text": {"value": "Start with the skills outline."}}]}
        ]))
        .unwrap();

        let entries = conversation_entries(&messages);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (MessageRole::User, "What should I study?".to_string()));
        assert_eq!(entries[1].0, MessageRole::Assistant);
    }
}
