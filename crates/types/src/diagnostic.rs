use core::fmt;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Lexer,
    Parser,
    Loader,
    Kernel,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lexer => "lexer",
            Stage::Parser => "parser",
            Stage::Loader => "loader",
            Stage::Kernel => "kernel",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// 1-based line and column in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub source: Stage,
    pub severity: Severity,
    pub text: String,
    pub position: Option<Position>,
}

impl DiagnosticMessage {
    pub fn new(source: Stage, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            source,
            severity,
            text: text.into(),
            position: None,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "[{}] {} at {}: {}", self.source, self.severity, pos, self.text),
            None => write!(f, "[{}] {}: {}", self.source, self.severity, self.text),
        }
    }
}

/// Ordered, append-only collection of diagnostics. Emission order is kept
/// across stages; `by_stage` filters without reordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    messages: Vec<DiagnosticMessage>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: DiagnosticMessage) {
        self.messages.push(message);
    }

    pub fn error(&mut self, source: Stage, text: impl Into<String>, position: Option<Position>) {
        self.push_with(source, Severity::Error, text, position);
    }

    pub fn warning(&mut self, source: Stage, text: impl Into<String>, position: Option<Position>) {
        self.push_with(source, Severity::Warning, text, position);
    }

    pub fn info(&mut self, source: Stage, text: impl Into<String>, position: Option<Position>) {
        self.push_with(source, Severity::Info, text, position);
    }

    fn push_with(
        &mut self,
        source: Stage,
        severity: Severity,
        text: impl Into<String>,
        position: Option<Position>,
    ) {
        let mut message = DiagnosticMessage::new(source, severity, text);
        message.position = position;
        self.push(message);
    }

    /// Appends every message of `other`, keeping its order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.messages.extend(other.messages);
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(DiagnosticMessage::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_error()).count()
    }

    pub fn by_stage(&self, stage: Stage) -> impl Iterator<Item = &DiagnosticMessage> + '_ {
        self.messages.iter().filter(move |m| m.source == stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticMessage> + '_ {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticMessage;
    type IntoIter = std::vec::IntoIter<DiagnosticMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}
