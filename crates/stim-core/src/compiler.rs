//! Renders a [`Command`] into the markdown instructions read by the assistant.
//!
//! Every statement becomes one instruction block. Top-level blocks are
//! separated by a blank line; block bodies are rendered as `- ` bullets.
//! Text is passed through as-is, no markdown escaping is applied.

use crate::ast::{Command, Statement, Task, Text};

/// Compiles a command into its instruction document.
pub fn compile(command: &Command) -> String {
    compile_statements(&command.body).join("\n\n")
}

fn compile_statements(statements: &[Statement]) -> Vec<String> {
    statements.iter().map(compile_statement).collect()
}

fn compile_statement(statement: &Statement) -> String {
    match statement {
        Statement::Ask { question } => match question {
            Text::Literal(q) => format!("Ask the user: \"{}\"", q),
            Text::Reference(q) => format!("Ask the user the question from variable: {}", q),
        },
        Statement::Confirm { message } => format!("Ask for confirmation: \"{}\"", message),
        Statement::CreateFile { filename, content } => {
            let content = match content {
                Text::Literal(s) => format!("\"{}\"", s),
                Text::Reference(s) => s.clone(),
            };
            format!("Create file \"{}\" with content: {}", filename, content)
        }
        Statement::VariableAssignment { name, value } => format!("Set {} = {}", name, value),
        Statement::FunctionCall { name, args } => {
            if args.is_empty() {
                format!("Call function {}", name)
            } else {
                format!("Call function {} with arguments: {}", name, args.join(", "))
            }
        }
        Statement::WaitForResponse => "Wait for user response before continuing.".to_string(),
        Statement::Break => "Stop current loop/process.".to_string(),
        Statement::If { condition, body, else_body } => {
            let mut out = bulleted(format!("If {}:", condition), body);
            if let Some(else_body) = else_body {
                out.push_str("\n\n");
                out.push_str(&bulleted("Otherwise:".to_string(), else_body));
            }
            out
        }
        Statement::While { condition, body } => bulleted(format!("While {}, repeat:", condition), body),
        Statement::For { variable, iterable, body } => {
            bulleted(format!("For each {} in {}:", variable, iterable), body)
        }
        Statement::Task(task) => compile_task(task),
        Statement::Parallel { tasks } => compile_parallel(tasks),
        Statement::Unknown { kind } => format!("// Unknown statement type: {}", kind),
    }
}

fn bulleted(header: String, body: &[Statement]) -> String {
    let mut out = header;
    for instruction in compile_statements(body) {
        out.push_str("\n- ");
        out.push_str(&instruction);
    }
    out
}

fn compile_task(task: &Task) -> String {
    let label = task.agent.label();
    let description = match (&task.file, task.description.is_empty()) {
        (Some(file), true) => file.as_str(),
        _ => task.description.as_str(),
    };

    let mut out = format!("Spawn a {} subagent task: \"{}\"\n\n", label, description);
    out.push_str("Use the Task tool with:\n");
    out.push_str(&format!("- subagent_type: {}\n", label));
    out.push_str(&format!("- description: {}\n", description));
    out.push_str("- prompt:");

    let mut prompt = compile_statements(&task.body);
    if prompt.is_empty() {
        if let Some(file) = task.file.as_ref().filter(|_| task.is_unresolved()) {
            prompt.push(format!("Follow the instructions in {}", file));
        }
    }
    for instruction in prompt {
        out.push('\n');
        out.push_str(&prompt_item(&instruction));
    }
    out
}

/// Indents one compiled instruction under `- prompt:`. The first line gets
/// the bullet, continuation lines align with its text.
fn prompt_item(instruction: &str) -> String {
    instruction
        .lines()
        .enumerate()
        .map(|(i, line)| match (i, line.is_empty()) {
            (0, _) => format!("  - {}", line),
            (_, true) => String::new(),
            (_, false) => format!("    {}", line),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn compile_parallel(tasks: &[Task]) -> String {
    let mut out = format!("Spawn {} subagent tasks in parallel:", tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        out.push_str(&format!("\n\n### Task {}\n\n", i + 1));
        out.push_str(&compile_task(task));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AgentType, Value};

    fn compile_body(body: Vec<Statement>) -> String {
        compile(&Command { name: "test".into(), body })
    }

    fn ask(q: &str) -> Statement {
        Statement::Ask { question: Text::Literal(q.into()) }
    }

    #[test]
    fn test_compile_ask_literal() {
        assert_eq!(compile_body(vec![ask("What?")]), "Ask the user: \"What?\"");
    }

    #[test]
    fn test_compile_ask_reference() {
        let result = compile_body(vec![Statement::Ask { question: Text::Reference("myVar".into()) }]);
        assert_eq!(result, "Ask the user the question from variable: myVar");
    }

    #[test]
    fn test_compile_confirm() {
        let result = compile_body(vec![Statement::Confirm { message: "Proceed?".into() }]);
        assert_eq!(result, "Ask for confirmation: \"Proceed?\"");
    }

    #[test]
    fn test_compile_create_file() {
        let result = compile_body(vec![
            Statement::CreateFile { filename: "out.txt".into(), content: Text::Reference("data".into()) },
            Statement::CreateFile { filename: "a.md".into(), content: Text::Literal("hello".into()) },
        ]);
        assert_eq!(
            result,
            "Create file \"out.txt\" with content: data\n\nCreate file \"a.md\" with content: \"hello\""
        );
    }

    #[test]
    fn test_compile_fixed_sentences() {
        let result = compile_body(vec![Statement::WaitForResponse, Statement::Break]);
        assert_eq!(result, "Wait for user response before continuing.\n\nStop current loop/process.");
    }

    #[test]
    fn test_compile_assignments() {
        let result = compile_body(vec![
            Statement::VariableAssignment { name: "x".into(), value: Value::Expr("42".into()) },
            Statement::VariableAssignment { name: "flag".into(), value: Value::Bool(true) },
            Statement::VariableAssignment {
                name: "items".into(),
                value: Value::Array(vec!["a".into(), "b".into()]),
            },
        ]);
        assert_eq!(result, "Set x = 42\n\nSet flag = true\n\nSet items = a,b");
    }

    #[test]
    fn test_compile_function_calls() {
        let result = compile_body(vec![
            Statement::FunctionCall { name: "doStuff".into(), args: vec![] },
            Statement::FunctionCall { name: "doStuff".into(), args: vec!["a".into(), "b".into()] },
        ]);
        assert_eq!(result, "Call function doStuff\n\nCall function doStuff with arguments: a, b");
    }

    #[test]
    fn test_compile_if_else() {
        let result = compile_body(vec![Statement::If {
            condition: "x > 0".into(),
            body: vec![ask("yes"), Statement::Break],
            else_body: Some(vec![ask("no")]),
        }]);
        assert_eq!(
            result,
            "If x > 0:\n- Ask the user: \"yes\"\n- Stop current loop/process.\n\nOtherwise:\n- Ask the user: \"no\""
        );
    }

    #[test]
    fn test_compile_loops() {
        let result = compile_body(vec![
            Statement::While { condition: "running".into(), body: vec![ask("again?")] },
            Statement::For { variable: "item".into(), iterable: "items".into(), body: vec![] },
        ]);
        assert_eq!(
            result,
            "While running, repeat:\n- Ask the user: \"again?\"\n\nFor each item in items:"
        );
    }

    #[test]
    fn test_compile_task() {
        let task = Task::inline(
            "explore auth",
            AgentType::Explore,
            vec![ask("What patterns?"), Statement::WaitForResponse],
        );
        let result = compile_body(vec![Statement::Task(task)]);
        assert_eq!(
            result,
            "Spawn a Explore subagent task: \"explore auth\"\n\n\
             Use the Task tool with:\n\
             - subagent_type: Explore\n\
             - description: explore auth\n\
             - prompt:\n  \
             - Ask the user: \"What patterns?\"\n  \
             - Wait for user response before continuing."
        );
    }

    #[test]
    fn test_compile_task_agent_labels() {
        let bash = compile_body(vec![Statement::Task(Task::inline("run", AgentType::Bash, vec![]))]);
        assert!(bash.contains("subagent_type: Bash"));
        let plan = compile_body(vec![Statement::Task(Task::inline("design", AgentType::Plan, vec![]))]);
        assert!(plan.contains("subagent_type: Plan"));
        let general = compile_body(vec![Statement::Task(Task::inline("x", AgentType::default(), vec![]))]);
        assert!(general.contains("Spawn a general-purpose subagent task: \"x\""));
        assert!(general.contains("subagent_type: general-purpose"));
    }

    #[test]
    fn test_compile_task_indents_nested_blocks() {
        let task = Task::inline(
            "loop",
            AgentType::General,
            vec![Statement::While { condition: "busy".into(), body: vec![Statement::Break] }],
        );
        let result = compile_body(vec![Statement::Task(task)]);
        assert!(result.ends_with("- prompt:\n  - While busy, repeat:\n    - Stop current loop/process."));
    }

    #[test]
    fn test_compile_unresolved_file_task() {
        let task = Task::from_file("helpers/research.stim", AgentType::General);
        let result = compile_body(vec![Statement::Task(task)]);
        assert!(result.contains("description: helpers/research.stim"));
        assert!(result.ends_with("- prompt:\n  - Follow the instructions in helpers/research.stim"));
    }

    #[test]
    fn test_compile_parallel() {
        let result = compile_body(vec![Statement::Parallel {
            tasks: vec![
                Task::inline("analyze frontend", AgentType::General, vec![ask("What frontend patterns?")]),
                Task::inline("analyze backend", AgentType::Explore, vec![ask("What backend patterns?")]),
            ],
        }]);
        assert!(result.starts_with("Spawn 2 subagent tasks in parallel:\n\n### Task 1\n\nSpawn a general-purpose"));
        assert!(result.contains("\n\n### Task 2\n\nSpawn a Explore subagent task: \"analyze backend\""));
        assert!(result.contains("  - Ask the user: \"What backend patterns?\""));
    }

    #[test]
    fn test_compile_unknown_statement() {
        let result = compile_body(vec![ask("first"), Statement::Unknown { kind: "hologram".into() }]);
        assert_eq!(result, "Ask the user: \"first\"\n\n// Unknown statement type: hologram");
    }

    #[test]
    fn test_compile_empty_command() {
        assert_eq!(compile_body(vec![]), "");
    }
}
