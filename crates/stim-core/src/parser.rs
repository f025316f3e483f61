use crate::ast::*;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Identifiers, keywords and numbers.
    Word(String),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Assign,
    /// Any other operator or punctuation. Only ever forwarded as raw text.
    Op(String),
    Newline,
}

#[derive(Debug, Clone)]
struct Located {
    token: Token,
    line: usize,
    start: usize,
    end: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier(word: &str) -> bool {
    word.chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
}

fn line_text(source: &str, line: usize) -> &str {
    source.lines().nth(line.saturating_sub(1)).unwrap_or("").trim()
}

fn unclosed_brace(source: &str, line: usize) -> ParseError {
    ParseError::new(
        format!(
            "Unmatched braces: '{{' opened on line {} is never closed: {}",
            line,
            line_text(source, line)
        ),
        line,
    )
}

fn tokenize(source: &str) -> Result<Vec<Located>, ParseError> {
    let mut tokens: Vec<Located> = Vec::new();
    let mut chars = source.char_indices().peekable();
    let mut line = 1usize;

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            '\n' => {
                chars.next();
                // Collapse runs of blank lines into one separator
                if tokens.last().map_or(true, |t| t.token != Token::Newline) {
                    tokens.push(Located { token: Token::Newline, line, start, end: start + 1 });
                }
                line += 1;
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' if source[start..].starts_with("//") => {
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '(' | ')' | '{' | '}' | '[' | ']' | ',' => {
                chars.next();
                let token = match ch {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    _ => Token::Comma,
                };
                tokens.push(Located { token, line, start, end: start + 1 });
            }
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut s = String::new();
                let unterminated = || {
                    ParseError::new(format!("Unterminated string: {}", line_text(source, line)), line)
                };
                let end = loop {
                    match chars.next() {
                        // Escapes are kept verbatim; `\"` only stops the
                        // quote from closing the string.
                        Some((_, '\\')) => match chars.next() {
                            Some((_, '\n')) | None => return Err(unterminated()),
                            Some((_, c)) => {
                                s.push('\\');
                                s.push(c);
                            }
                        },
                        Some((i, c)) if c == quote => break i + 1,
                        Some((_, '\n')) | None => return Err(unterminated()),
                        Some((_, c)) => s.push(c),
                    }
                };
                tokens.push(Located { token: Token::Str(s), line, start, end });
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    end = i + 1;
                    chars.next();
                }
                tokens.push(Located { token: Token::Word(word), line, start, end });
            }
            '=' => {
                chars.next();
                if let Some(&(i, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Located { token: Token::Op("==".to_string()), line, start, end: i + 1 });
                } else {
                    tokens.push(Located { token: Token::Assign, line, start, end: start + 1 });
                }
            }
            _ => {
                chars.next();
                let mut op = ch.to_string();
                let mut end = start + ch.len_utf8();
                if let Some(&(i, next)) = chars.peek() {
                    if matches!((ch, next), ('!', '=') | ('<', '=') | ('>', '=') | ('&', '&') | ('|', '|')) {
                        op.push(next);
                        end = i + 1;
                        chars.next();
                    }
                }
                tokens.push(Located { token: Token::Op(op), line, start, end });
            }
        }
    }

    Ok(tokens)
}

/// Splits an array literal's interior on every comma. Quoting is not taken
/// into account, so `["a, b"]` yields two elements.
fn split_array(interior: &str) -> Vec<String> {
    if interior.trim().is_empty() {
        return Vec::new();
    }
    let is_quote = |c: char| c == '"' || c == '\'';
    interior
        .split(',')
        .map(|item| {
            let item = item.trim();
            let item = item.strip_prefix(is_quote).unwrap_or(item);
            item.strip_suffix(is_quote).unwrap_or(item).to_string()
        })
        .collect()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Located>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Located>) -> Self {
        Self { source, tokens, pos: 0 }
    }

    fn current_line(&self) -> usize {
        self.tokens.get(self.pos).map_or(
            self.tokens.last().map_or(1, |t| t.line),
            |t| t.line,
        )
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos).map(|t| &t.token);
        self.pos += 1;
        t
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.advance();
        }
    }

    fn error(&self, line: usize, what: &str) -> ParseError {
        ParseError::new(format!("{}: {}", what, line_text(self.source, line)), line)
    }

    /// Source text covered by tokens `from..to`, trimmed.
    fn raw(&self, from: usize, to: usize) -> String {
        if from >= to {
            return String::new();
        }
        self.source[self.tokens[from].start..self.tokens[to - 1].end]
            .trim()
            .to_string()
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        self.skip_newlines();
        if self.pos >= self.tokens.len() {
            return Err(ParseError::new(
                "Expected command declaration: command <name> { (empty command file)",
                1,
            ));
        }

        let line = self.current_line();
        let name = match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some(Token::Word(kw)), Some(Token::Word(name)), Some(Token::LBrace))
                if kw == "command" && is_identifier(name) =>
            {
                name.clone()
            }
            _ => {
                return Err(ParseError::new(
                    format!(
                        "Expected command declaration: command <name> {{, found '{}'",
                        line_text(self.source, line)
                    ),
                    line,
                ))
            }
        };
        self.pos += 3;
        self.check_braces()?;

        let body = self.parse_block_body(line)?;

        self.skip_newlines();
        match self.peek() {
            None => Ok(Command { name, body }),
            Some(Token::RBrace) => Err(self.error(self.current_line(), "Unmatched braces: unexpected '}'")),
            Some(_) => Err(self.error(self.current_line(), "Unexpected content after command body")),
        }
    }

    /// Rejects sources whose `{` and `}` do not pair up before any statement
    /// is parsed, so a stray brace is never reported as some other defect.
    fn check_braces(&self) -> Result<(), ParseError> {
        let mut open = Vec::new();
        for located in &self.tokens {
            match located.token {
                Token::LBrace => open.push(located.line),
                Token::RBrace => {
                    if open.pop().is_none() {
                        return Err(self.error(located.line, "Unmatched braces: unexpected '}'"));
                    }
                }
                _ => {}
            }
        }
        match open.last() {
            Some(&line) => Err(unclosed_brace(self.source, line)),
            None => Ok(()),
        }
    }

    /// Parses statements up to and including the `}` that closes a block
    /// opened on `open_line`.
    fn parse_block_body(&mut self, open_line: usize) -> Result<Vec<Statement>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                None => return Err(unclosed_brace(self.source, open_line)),
                Some(Token::RBrace) => {
                    self.advance();
                    return Ok(stmts);
                }
                Some(_) => stmts.push(self.parse_statement()?),
            }
        }
    }

    fn parse_block(&mut self, line: usize, what: &str) -> Result<Vec<Statement>, ParseError> {
        if self.peek() != Some(&Token::LBrace) {
            return Err(self.error(line, what));
        }
        self.advance();
        self.parse_block_body(line)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let line = self.current_line();
        let word = match self.peek() {
            Some(Token::Word(w)) => w.clone(),
            _ => return Err(self.error(line, "Invalid statement")),
        };
        let next = self.peek_at(1).cloned();

        let stmt = match (word.as_str(), next.as_ref()) {
            ("ask", Some(Token::LParen)) => self.parse_ask(line)?,
            ("confirm", Some(Token::LParen)) => self.parse_confirm(line)?,
            ("create_file", Some(Token::LParen)) => self.parse_create_file(line)?,
            ("if", Some(Token::LParen)) => self.parse_if(line)?,
            ("while", Some(Token::LParen)) => self.parse_while(line)?,
            ("for", Some(Token::Word(_))) => self.parse_for(line)?,
            ("task", next) if next != Some(&Token::Assign) => self.parse_task(line)?,
            ("parallel", Some(Token::LBrace)) => self.parse_parallel(line)?,
            ("break", None | Some(Token::Newline) | Some(Token::RBrace)) => {
                self.advance();
                Statement::Break
            }
            ("wait_for_response", Some(Token::LParen)) => self.parse_wait_for_response(line)?,
            (_, Some(Token::Assign)) => self.parse_assignment(line)?,
            (_, Some(Token::LParen)) => self.parse_function_call(line)?,
            _ => return Err(self.error(line, "Invalid statement")),
        };

        self.end_statement()?;
        Ok(stmt)
    }

    /// One statement per line: after a statement only a newline or a block
    /// closer may follow.
    fn end_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None | Some(Token::RBrace) => Ok(()),
            Some(Token::Newline) => {
                self.advance();
                Ok(())
            }
            Some(_) => Err(self.error(self.current_line(), "Unexpected trailing input")),
        }
    }

    /// Consumes `( ... )` and returns the token range of each top-level
    /// argument.
    fn parse_call_args(&mut self, line: usize, what: &str) -> Result<Vec<(usize, usize)>, ParseError> {
        if self.peek() != Some(&Token::LParen) {
            return Err(self.error(line, what));
        }
        self.advance();

        let mut args = Vec::new();
        let mut depth = 0usize;
        let mut start = self.pos;
        loop {
            match self.peek().cloned() {
                None | Some(Token::Newline) => return Err(self.error(line, what)),
                Some(Token::LParen) | Some(Token::LBracket) => depth += 1,
                Some(Token::RParen) | Some(Token::RBracket) if depth > 0 => depth -= 1,
                Some(Token::RParen) => {
                    if self.pos > start {
                        args.push((start, self.pos));
                    } else if !args.is_empty() {
                        return Err(self.error(line, what));
                    }
                    self.advance();
                    return Ok(args);
                }
                Some(Token::Comma) if depth == 0 => {
                    if self.pos == start {
                        return Err(self.error(line, what));
                    }
                    args.push((start, self.pos));
                    start = self.pos + 1;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn string_arg(&self, (from, to): (usize, usize)) -> Option<String> {
        match &self.tokens[from..to] {
            [Located { token: Token::Str(s), .. }] => Some(s.clone()),
            _ => None,
        }
    }

    fn text_arg(&self, range: (usize, usize)) -> Text {
        match self.string_arg(range) {
            Some(s) => Text::Literal(s),
            None => Text::Reference(self.raw(range.0, range.1)),
        }
    }

    fn parse_ask(&mut self, line: usize) -> Result<Statement, ParseError> {
        self.advance();
        let args = self.parse_call_args(line, "Invalid ask statement")?;
        match args.as_slice() {
            [question] => Ok(Statement::Ask { question: self.text_arg(*question) }),
            _ => Err(self.error(line, "Invalid ask statement")),
        }
    }

    fn parse_confirm(&mut self, line: usize) -> Result<Statement, ParseError> {
        self.advance();
        let args = self.parse_call_args(line, "Invalid confirm statement")?;
        match args.as_slice() {
            [message] => Ok(Statement::Confirm {
                message: self.text_arg(*message).as_str().to_string(),
            }),
            _ => Err(self.error(line, "Invalid confirm statement")),
        }
    }

    fn parse_create_file(&mut self, line: usize) -> Result<Statement, ParseError> {
        self.advance();
        let args = self.parse_call_args(line, "Invalid create_file statement")?;
        if let [filename, content] = args.as_slice() {
            if let Some(filename) = self.string_arg(*filename) {
                return Ok(Statement::CreateFile {
                    filename,
                    content: self.text_arg(*content),
                });
            }
        }
        Err(self.error(line, "Invalid create_file statement"))
    }

    fn parse_wait_for_response(&mut self, line: usize) -> Result<Statement, ParseError> {
        self.advance();
        let args = self.parse_call_args(line, "Invalid wait_for_response statement")?;
        if !args.is_empty() {
            return Err(self.error(line, "Invalid wait_for_response statement"));
        }
        Ok(Statement::WaitForResponse)
    }

    fn parse_function_call(&mut self, line: usize) -> Result<Statement, ParseError> {
        let name = match self.advance().cloned() {
            Some(Token::Word(w)) if is_identifier(&w) => w,
            _ => return Err(self.error(line, "Invalid function call")),
        };
        let args = self.parse_call_args(line, "Invalid function call")?;
        let args = args.into_iter().map(|(from, to)| self.raw(from, to)).collect();
        Ok(Statement::FunctionCall { name, args })
    }

    fn parse_assignment(&mut self, line: usize) -> Result<Statement, ParseError> {
        let name = match self.advance().cloned() {
            Some(Token::Word(w)) if is_identifier(&w) => w,
            _ => return Err(self.error(line, "Invalid assignment")),
        };
        self.advance();

        let start = self.pos;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token {
                Token::Newline => break,
                Token::RBrace if depth == 0 => break,
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
        if self.pos == start {
            return Err(self.error(line, "Invalid assignment"));
        }

        let value = self.literal_value(start, self.pos);
        Ok(Statement::VariableAssignment { name, value })
    }

    fn literal_value(&self, from: usize, to: usize) -> Value {
        match &self.tokens[from..to] {
            [Located { token: Token::Str(s), .. }] => Value::Str(s.clone()),
            [Located { token: Token::Word(w), .. }] if w == "true" => Value::Bool(true),
            [Located { token: Token::Word(w), .. }] if w == "false" => Value::Bool(false),
            [first, .., last]
                if first.token == Token::LBracket
                    && last.token == Token::RBracket
                    && self.bracket_closes_at(from, to - 1) =>
            {
                Value::Array(split_array(&self.source[first.end..last.start]))
            }
            _ => Value::Expr(self.raw(from, to)),
        }
    }

    /// Whether the `[` at `open` is closed by the `]` at `close`, so that
    /// `[a] + [b]` is not mistaken for a single array.
    fn bracket_closes_at(&self, open: usize, close: usize) -> bool {
        let mut depth = 0usize;
        for (i, located) in self.tokens.iter().enumerate().take(close + 1).skip(open) {
            match located.token {
                Token::LBracket => depth += 1,
                Token::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        return i == close;
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// Parses `( <raw text> )` and returns the text between the parentheses.
    fn parse_condition(&mut self, line: usize, what: &str) -> Result<String, ParseError> {
        if self.peek() != Some(&Token::LParen) {
            return Err(self.error(line, what));
        }
        self.advance();

        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None | Some(Token::Newline) => return Err(self.error(line, what)),
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) if depth == 0 => break,
                Some(Token::RParen) => depth -= 1,
                _ => {}
            }
            self.advance();
        }
        let condition = self.raw(start, self.pos);
        self.advance();

        if condition.is_empty() {
            return Err(self.error(line, what));
        }
        Ok(condition)
    }

    fn parse_if(&mut self, line: usize) -> Result<Statement, ParseError> {
        self.advance();
        let condition = self.parse_condition(line, "Invalid if statement")?;
        let body = self.parse_block(line, "Invalid if statement")?;

        let after_body = self.pos;
        self.skip_newlines();
        let else_body = if self.at_word("else") && self.peek_at(1) == Some(&Token::LBrace) {
            let else_line = self.current_line();
            self.advance();
            Some(self.parse_block(else_line, "Invalid else branch")?)
        } else {
            self.pos = after_body;
            None
        };

        Ok(Statement::If { condition, body, else_body })
    }

    fn parse_while(&mut self, line: usize) -> Result<Statement, ParseError> {
        self.advance();
        let condition = self.parse_condition(line, "Invalid while statement")?;
        let body = self.parse_block(line, "Invalid while statement")?;
        Ok(Statement::While { condition, body })
    }

    fn parse_for(&mut self, line: usize) -> Result<Statement, ParseError> {
        const INVALID: &str = "Invalid for statement";
        self.advance();
        let variable = match self.advance().cloned() {
            Some(Token::Word(w)) if is_identifier(&w) => w,
            _ => return Err(self.error(line, INVALID)),
        };
        if !self.at_word("in") {
            return Err(self.error(line, INVALID));
        }
        self.advance();

        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None | Some(Token::Newline) => return Err(self.error(line, INVALID)),
                Some(Token::LBrace) if depth == 0 => break,
                Some(Token::LParen) | Some(Token::LBracket) => depth += 1,
                Some(Token::RParen) | Some(Token::RBracket) => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
        }
        let iterable = self.raw(start, self.pos);
        if iterable.is_empty() {
            return Err(self.error(line, INVALID));
        }

        let body = self.parse_block(line, INVALID)?;
        Ok(Statement::For { variable, iterable, body })
    }

    fn parse_task(&mut self, line: usize) -> Result<Statement, ParseError> {
        const INVALID: &str = "Invalid task statement";
        self.advance();
        if self.peek() == Some(&Token::LParen) {
            return self.parse_task_file(line);
        }

        let agent = match self.peek().cloned() {
            Some(Token::Word(w)) => {
                let agent = w.parse::<AgentType>().map_err(|_| self.error(line, INVALID))?;
                self.advance();
                agent
            }
            _ => AgentType::default(),
        };
        let description = match self.advance().cloned() {
            Some(Token::Str(s)) if !s.is_empty() => s,
            _ => return Err(self.error(line, INVALID)),
        };
        let body = self.parse_block(line, INVALID)?;

        Ok(Statement::Task(Task::inline(description, agent, body)))
    }

    fn parse_task_file(&mut self, line: usize) -> Result<Statement, ParseError> {
        const INVALID: &str = "Invalid task file reference";
        let args = self.parse_call_args(line, INVALID)?;
        let (path, agent) = match args.as_slice() {
            [path] => (*path, None),
            [path, agent] => (*path, Some(*agent)),
            _ => return Err(self.error(line, INVALID)),
        };

        let file = match self.string_arg(path) {
            Some(file) if !file.is_empty() => file,
            _ => return Err(self.error(line, INVALID)),
        };
        let agent = match agent {
            None => AgentType::default(),
            Some((from, to)) => match &self.tokens[from..to] {
                [Located { token: Token::Word(w), .. }] => {
                    w.parse::<AgentType>().map_err(|_| self.error(line, INVALID))?
                }
                _ => return Err(self.error(line, INVALID)),
            },
        };

        Ok(Statement::Task(Task::from_file(file, agent)))
    }

    fn parse_parallel(&mut self, line: usize) -> Result<Statement, ParseError> {
        self.advance();
        let body = self.parse_block(line, "Invalid parallel block")?;

        let mut tasks = Vec::with_capacity(body.len());
        for stmt in body {
            match stmt {
                Statement::Task(task) => tasks.push(task),
                _ => return Err(self.error(line, "parallel block may only contain task statements")),
            }
        }
        Ok(Statement::Parallel { tasks })
    }
}

/// Parses one command file.
pub fn parse(source: &str) -> Result<Command, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    parser.parse_command()
}
