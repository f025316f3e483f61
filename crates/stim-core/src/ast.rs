//! Command tree produced by the parser and consumed by the resolver and compiler.
//!
//! Trees serialize to JSON with a `type` tag on every statement, which is the
//! format printed by `stim parse`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    Ask {
        question: Text,
    },
    Confirm {
        message: String,
    },
    CreateFile {
        filename: String,
        content: Text,
    },
    VariableAssignment {
        name: String,
        value: Value,
    },
    FunctionCall {
        name: String,
        args: Vec<String>,
    },
    If {
        condition: String,
        body: Vec<Statement>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        else_body: Option<Vec<Statement>>,
    },
    While {
        condition: String,
        body: Vec<Statement>,
    },
    For {
        variable: String,
        iterable: String,
        body: Vec<Statement>,
    },
    Break,
    WaitForResponse,
    Task(Task),
    Parallel {
        tasks: Vec<Task>,
    },
    /// Any tag this version does not know about, kept by name. Only
    /// reachable through deserialization; the parser never produces it.
    /// Must stay the last variant.
    #[serde(untagged)]
    Unknown {
        #[serde(rename = "type")]
        kind: String,
    },
}

/// A unit of work delegated to a subagent.
///
/// Inline tasks carry a description and body. File tasks (`task("path")`)
/// start with an empty description and body and a `file`; the resolver fills
/// both in from the referenced file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    #[serde(default)]
    pub agent: AgentType,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Task {
    pub fn inline(description: impl Into<String>, agent: AgentType, body: Vec<Statement>) -> Self {
        Self {
            description: description.into(),
            agent,
            body,
            file: None,
        }
    }

    pub fn from_file(file: impl Into<String>, agent: AgentType) -> Self {
        Self {
            description: String::new(),
            agent,
            body: Vec::new(),
            file: Some(file.into()),
        }
    }

    /// True for a file task the resolver has not expanded yet.
    pub fn is_unresolved(&self) -> bool {
        self.file.is_some() && self.description.is_empty() && self.body.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Bash,
    Explore,
    Plan,
    #[default]
    General,
}

impl AgentType {
    pub const ALL: [AgentType; 4] = [
        AgentType::Bash,
        AgentType::Explore,
        AgentType::Plan,
        AgentType::General,
    ];

    /// Keyword used in source files.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Bash => "bash",
            AgentType::Explore => "explore",
            AgentType::Plan => "plan",
            AgentType::General => "general",
        }
    }

    /// The `subagent_type` the assistant runtime expects.
    pub fn label(&self) -> &'static str {
        match self {
            AgentType::Bash => "Bash",
            AgentType::Explore => "Explore",
            AgentType::Plan => "Plan",
            AgentType::General => "general-purpose",
        }
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentType::ALL
            .into_iter()
            .find(|agent| agent.as_str() == s)
            .ok_or_else(|| format!("unknown agent type '{}'", s))
    }
}

/// A statement argument that is either a quoted string or a reference to a
/// value held elsewhere (an identifier or a raw expression).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Text {
    Literal(String),
    Reference(String),
}

impl Text {
    pub fn as_str(&self) -> &str {
        match self {
            Text::Literal(s) | Text::Reference(s) => s,
        }
    }
}

/// Right-hand side of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Str(String),
    Bool(bool),
    Array(Vec<String>),
    /// Raw expression text, forwarded verbatim.
    Expr(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) | Value::Expr(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Array(items) => f.write_str(&items.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_labels() {
        assert_eq!(AgentType::Bash.label(), "Bash");
        assert_eq!(AgentType::Explore.label(), "Explore");
        assert_eq!(AgentType::Plan.label(), "Plan");
        assert_eq!(AgentType::General.label(), "general-purpose");
        assert_eq!(AgentType::default(), AgentType::General);
    }

    #[test]
    fn test_agent_from_str() {
        assert_eq!("explore".parse::<AgentType>(), Ok(AgentType::Explore));
        assert!("Explore".parse::<AgentType>().is_err());
        assert!("shell".parse::<AgentType>().is_err());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Str("world".into()).to_string(), "world");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(
            Value::Array(vec!["a".into(), "b".into()]).to_string(),
            "a,b"
        );
        assert_eq!(Value::Expr("count + 1".into()).to_string(), "count + 1");
    }

    #[test]
    fn test_statement_json_shape() {
        let stmt = Statement::Ask {
            question: Text::Literal("Hi".into()),
        };
        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json["type"], "ask");
        assert_eq!(json["question"]["kind"], "literal");
        assert_eq!(json["question"]["value"], "Hi");
    }

    #[test]
    fn test_task_json_roundtrip() {
        let stmt = Statement::Task(Task::from_file("helpers/research.stim", AgentType::Explore));
        let json = serde_json::to_string(&stmt).unwrap();
        assert!(json.contains(r#""type":"task""#));
        assert!(json.contains(r#""agent":"explore""#));
        let back: Statement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stmt);
    }

    #[test]
    fn test_if_without_else_omits_field() {
        let stmt = Statement::If {
            condition: "x".into(),
            body: vec![Statement::Break],
            else_body: None,
        };
        let json = serde_json::to_value(&stmt).unwrap();
        assert!(json.get("else").is_none());
    }

    #[test]
    fn test_unknown_tag_deserializes() {
        let stmt: Statement = serde_json::from_str(r#"{"type":"teleport","to":"mars"}"#).unwrap();
        assert_eq!(stmt, Statement::Unknown { kind: "teleport".into() });

        let json = serde_json::to_value(&stmt).unwrap();
        assert_eq!(json, serde_json::json!({"type": "teleport"}));
    }

    #[test]
    fn test_known_tag_still_deserializes() {
        let stmt: Statement = serde_json::from_str(r#"{"type":"break"}"#).unwrap();
        assert_eq!(stmt, Statement::Break);
    }

    #[test]
    fn test_unresolved_task() {
        assert!(Task::from_file("a.stim", AgentType::General).is_unresolved());
        assert!(!Task::inline("x", AgentType::General, vec![]).is_unresolved());
    }
}
