//! Wire vocabulary of the planning service. Everything is a closed tagged
//! enum so an unrecognized kind fails decoding instead of slipping through
//! as an untyped blob.

use serde::{Deserialize, Serialize};

use crate::computer::{MouseButton, Point};

/// One entry in the conversation history: items we send to the service and
/// items it returns share a single shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    Message {
        role: String,
        content: Vec<ContentPart>,
    },
    Reasoning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },
    ComputerCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        call_id: String,
        action: ComputerAction,
        #[serde(default)]
        pending_safety_checks: Vec<SafetyCheck>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    ComputerCallOutput {
        call_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        acknowledged_safety_checks: Vec<SafetyCheck>,
        output: CallOutput,
    },
}

impl Item {
    pub fn user_message(text: &str) -> Self {
        Item::Message {
            role: "user".into(),
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
    OutputText { text: String },
    Refusal { refusal: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummaryPart {
    SummaryText { text: String },
}

impl SummaryPart {
    pub fn text(&self) -> &str {
        match self {
            SummaryPart::SummaryText { text } => text,
        }
    }
}

/// Screenshot payload of a completed computer call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallOutput {
    ComputerScreenshot { image_url: String },
}

/// The closed action vocabulary the planner may emit. Coordinates are in
/// virtual space on the wire; the scaler owns the translation to native.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputerAction {
    Click { x: i32, y: i32, button: MouseButton },
    DoubleClick { x: i32, y: i32 },
    Drag { path: Vec<Point> },
    Keypress { keys: Vec<String> },
    Move { x: i32, y: i32 },
    Screenshot,
    Scroll { x: i32, y: i32, scroll_x: i32, scroll_y: i32 },
    Type { text: String },
    Wait,
}

impl ComputerAction {
    /// Wire name of the action kind.
    pub fn name(&self) -> &'static str {
        match self {
            ComputerAction::Click { .. } => "click",
            ComputerAction::DoubleClick { .. } => "double_click",
            ComputerAction::Drag { .. } => "drag",
            ComputerAction::Keypress { .. } => "keypress",
            ComputerAction::Move { .. } => "move",
            ComputerAction::Screenshot => "screenshot",
            ComputerAction::Scroll { .. } => "scroll",
            ComputerAction::Type { .. } => "type",
            ComputerAction::Wait => "wait",
        }
    }
}

/// A service-issued flag requiring explicit acknowledgement before the
/// accompanying action is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Token accounting as reported by the service. Different deployments report
/// different subsets, so every field is optional and decoded once here
/// instead of probed at call sites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub tokens: Option<u64>,
}

impl Usage {
    /// Best available total for this exchange.
    pub fn total(&self) -> Option<u64> {
        self.tokens.or(self.total_tokens).or(
            match (self.input_tokens, self.output_tokens) {
                (Some(i), Some(o)) => Some(i + o),
                _ => None,
            },
        )
    }
}

/// One full service response: ordered output items plus accounting metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub output: Vec<Item>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_a_full_planner_response() {
        let raw = json!({
            "id": "resp_1",
            "status": "completed",
            "output": [
                {
                    "type": "reasoning",
                    "id": "rs_1",
                    "summary": [{"type": "summary_text", "text": "Clicking the search box"}]
                },
                {
                    "type": "computer_call",
                    "call_id": "call_1",
                    "action": {"type": "click", "x": 512, "y": 384, "button": "left"},
                    "pending_safety_checks": [
                        {"id": "sc_1", "code": "sensitive_domain", "message": "Proceed with care"}
                    ],
                    "status": "completed"
                }
            ],
            "usage": {"input_tokens": 100, "output_tokens": 20, "total_tokens": 120}
        });

        let response: Response = serde_json::from_value(raw).unwrap();
        assert_eq!(response.output.len(), 2);
        assert_eq!(response.usage.unwrap().total(), Some(120));

        match &response.output[1] {
            Item::ComputerCall { call_id, action, pending_safety_checks, .. } => {
                assert_eq!(call_id, "call_1");
                assert_eq!(action.name(), "click");
                assert_eq!(pending_safety_checks[0].id, "sc_1");
            }
            other => panic!("expected computer call, got {other:?}"),
        }
    }

    #[test]
    fn unknown_action_kind_fails_decoding() {
        let raw = json!({
            "type": "computer_call",
            "call_id": "call_1",
            "action": {"type": "teleport", "x": 1, "y": 2}
        });
        assert!(serde_json::from_value::<Item>(raw).is_err());
    }

    #[test]
    fn drag_path_round_trips() {
        let action = ComputerAction::Drag {
            path: vec![Point { x: 1, y: 2 }, Point { x: 3, y: 4 }],
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "drag");
        assert_eq!(value["path"][1]["x"], 3);
        let back: ComputerAction = serde_json::from_value(value).unwrap();
        assert!(matches!(back, ComputerAction::Drag { path } if path.len() == 2));
    }

    #[test]
    fn parameterless_actions_decode_from_tag_only() {
        let shot: ComputerAction = serde_json::from_value(json!({"type": "screenshot"})).unwrap();
        assert!(matches!(shot, ComputerAction::Screenshot));
        let wait: ComputerAction = serde_json::from_value(json!({"type": "wait"})).unwrap();
        assert!(matches!(wait, ComputerAction::Wait));
    }

    #[test]
    fn usage_total_covers_reported_shapes() {
        let azure: Usage = serde_json::from_value(json!({"tokens": 42})).unwrap();
        assert_eq!(azure.total(), Some(42));

        let split: Usage =
            serde_json::from_value(json!({"input_tokens": 10, "output_tokens": 5})).unwrap();
        assert_eq!(split.total(), Some(15));

        let empty: Usage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.total(), None);
    }

    #[test]
    fn user_message_serializes_as_input_text() {
        let value = serde_json::to_value(Item::user_message("open a browser")).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "input_text");
        assert_eq!(value["content"][0]["text"], "open a browser");
    }

    #[test]
    fn call_output_omits_empty_acknowledgements() {
        let value = serde_json::to_value(Item::ComputerCallOutput {
            call_id: "call_1".into(),
            acknowledged_safety_checks: Vec::new(),
            output: CallOutput::ComputerScreenshot { image_url: "data:image/png;base64,AA==".into() },
        })
        .unwrap();
        assert!(value.get("acknowledged_safety_checks").is_none());
        assert_eq!(value["output"]["type"], "computer_screenshot");
    }
}
