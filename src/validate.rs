use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::component::TargetType;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_UNTERMINATED_EXPRESSION: &str = "TPL-LEX-001";
pub const ERR_UNTERMINATED_TAG: &str = "TPL-LEX-002";
pub const ERR_UNTERMINATED_COMMENT: &str = "TPL-LEX-003";
pub const ERR_UNBALANCED_MARKUP: &str = "TPL-PARSE-001";
pub const ERR_DUPLICATE_CODE_BLOCK: &str = "TPL-PARSE-002";
pub const ERR_MALFORMED_DIRECTIVE: &str = "TPL-PARSE-003";
pub const ERR_UNKNOWN_DIRECTIVE: &str = "TPL-PARSE-004";
pub const ERR_AMBIGUOUS_TAG_NAME: &str = "TPL-RES-001";
pub const ERR_REGISTRY_FROZEN: &str = "TPL-RES-002";
pub const ERR_EVENT_HANDLER_ON_NON_ELEMENT: &str = "TPL-SEM-001";
pub const ERR_STYLESHEET_PATH_EMPTY: &str = "TPL-SEM-002";
pub const ERR_ATTRIBUTE_ON_TEXT: &str = "TPL-SEM-003";
pub const ERR_SEQUENCE_COLLISION: &str = "TPL-GEN-001";
pub const ERR_UNBALANCED_OUTPUT: &str = "TPL-GEN-002";
pub const ERR_IO: &str = "TPL-IO-001";

fn get_hint(code: &str) -> &'static str {
    match code {
        ERR_UNTERMINATED_EXPRESSION => "Every '(', '[' and '{' after '@' needs a matching close.",
        ERR_UNTERMINATED_TAG => "Close the tag with '>' or '/>'.",
        ERR_UNTERMINATED_COMMENT => "Template comments end with '*@'.",
        ERR_UNBALANCED_MARKUP => "Every opened element must be closed in the same block.",
        ERR_DUPLICATE_CODE_BLOCK => "Merge the members into a single @code block.",
        ERR_MALFORMED_DIRECTIVE => "Directives take the form @keyword (header) { body }.",
        ERR_UNKNOWN_DIRECTIVE => "Use @@ for a literal '@' at the start of a line.",
        ERR_AMBIGUOUS_TAG_NAME => "A tag name may be claimed by only one component type.",
        ERR_REGISTRY_FROZEN => "Register every component before compiling any template.",
        ERR_EVENT_HANDLER_ON_NON_ELEMENT => {
            "Event handlers attach to elements. Pass callbacks to components as parameters."
        }
        ERR_STYLESHEET_PATH_EMPTY => "StyleSheet(...) needs at least one non-empty path.",
        ERR_ATTRIBUTE_ON_TEXT => {
            "<text> renders only its children. Move the attribute to an element."
        }
        ERR_SEQUENCE_COLLISION | ERR_UNBALANCED_OUTPUT => {
            "This is a compiler defect. Please report it with the template source."
        }
        ERR_IO => "Check that the file exists and is readable.",
        _ => "Unknown diagnostic.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR TAXONOMY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    LexError,
    ParseError,
    ResolutionError,
    SemanticError,
    GenerationError,
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    UnterminatedExpression,
    UnterminatedTag,
    UnterminatedComment,
    UnbalancedMarkup,
    DuplicateCodeBlock,
    MalformedDirective,
    UnknownDirective,
    AmbiguousTagName,
    RegistryFrozen,
    EventHandlerAttributeOnNonElement,
    StyleSheetPathEmpty,
    AttributeOnTextElement,
    SequenceCollision,
    UnbalancedOutput,
    Io,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::UnterminatedExpression => ERR_UNTERMINATED_EXPRESSION,
            ErrorKind::UnterminatedTag => ERR_UNTERMINATED_TAG,
            ErrorKind::UnterminatedComment => ERR_UNTERMINATED_COMMENT,
            ErrorKind::UnbalancedMarkup => ERR_UNBALANCED_MARKUP,
            ErrorKind::DuplicateCodeBlock => ERR_DUPLICATE_CODE_BLOCK,
            ErrorKind::MalformedDirective => ERR_MALFORMED_DIRECTIVE,
            ErrorKind::UnknownDirective => ERR_UNKNOWN_DIRECTIVE,
            ErrorKind::AmbiguousTagName => ERR_AMBIGUOUS_TAG_NAME,
            ErrorKind::RegistryFrozen => ERR_REGISTRY_FROZEN,
            ErrorKind::EventHandlerAttributeOnNonElement => ERR_EVENT_HANDLER_ON_NON_ELEMENT,
            ErrorKind::StyleSheetPathEmpty => ERR_STYLESHEET_PATH_EMPTY,
            ErrorKind::AttributeOnTextElement => ERR_ATTRIBUTE_ON_TEXT,
            ErrorKind::SequenceCollision => ERR_SEQUENCE_COLLISION,
            ErrorKind::UnbalancedOutput => ERR_UNBALANCED_OUTPUT,
            ErrorKind::Io => ERR_IO,
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::UnterminatedExpression
            | ErrorKind::UnterminatedTag
            | ErrorKind::UnterminatedComment => ErrorCategory::LexError,
            ErrorKind::UnbalancedMarkup
            | ErrorKind::DuplicateCodeBlock
            | ErrorKind::MalformedDirective
            | ErrorKind::UnknownDirective => ErrorCategory::ParseError,
            ErrorKind::AmbiguousTagName | ErrorKind::RegistryFrozen => {
                ErrorCategory::ResolutionError
            }
            ErrorKind::EventHandlerAttributeOnNonElement
            | ErrorKind::StyleSheetPathEmpty
            | ErrorKind::AttributeOnTextElement => ErrorCategory::SemanticError,
            ErrorKind::SequenceCollision | ErrorKind::UnbalancedOutput => {
                ErrorCategory::GenerationError
            }
            ErrorKind::Io => ErrorCategory::IoError,
        }
    }
}

/// A per-file compilation failure. Never escapes the file that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unterminated expression starting at {at}")]
    UnterminatedExpression { at: SourceLocation },

    #[error("tag <{tag}> opened at {at} is never closed with '>'")]
    UnterminatedTag { tag: String, at: SourceLocation },

    #[error("template comment opened at {at} is never closed")]
    UnterminatedComment { at: SourceLocation },

    #[error("</{close}> at line {close_line} does not match <{open}> opened at line {open_line}")]
    UnbalancedMarkup {
        open: String,
        open_line: u32,
        close: String,
        close_line: u32,
        at: SourceLocation,
    },

    #[error("<{tag}> opened at line {} is never closed", .at.line)]
    UnclosedElement { tag: String, at: SourceLocation },

    #[error("</{tag}> at line {} has no matching open tag", .at.line)]
    UnexpectedCloseTag { tag: String, at: SourceLocation },

    #[error("duplicate @code block at line {second_line}; the first one is at line {first_line}")]
    DuplicateCodeBlock {
        first_line: u32,
        second_line: u32,
        at: SourceLocation,
    },

    #[error("malformed @{directive}: {reason}")]
    MalformedDirective {
        directive: String,
        reason: String,
        at: SourceLocation,
    },

    #[error("unknown directive @{name}")]
    UnknownDirective { name: String, at: SourceLocation },

    #[error(
        "event handler attribute '{attribute}' cannot be placed on <{tag}>, which is not an element"
    )]
    EventHandlerAttributeOnNonElement {
        attribute: String,
        tag: String,
        at: SourceLocation,
    },

    #[error("attribute '{attribute}' has no effect on <text>")]
    AttributeOnTextElement { attribute: String, at: SourceLocation },

    #[error("stylesheet directive has an empty path")]
    StyleSheetPathEmpty { at: SourceLocation },

    #[error("sequence number {sequence} was assigned more than once")]
    SequenceCollision { sequence: u32, at: SourceLocation },

    #[error("generated build routine is unbalanced: {detail}")]
    UnbalancedOutput { detail: String },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::UnterminatedExpression { .. } => ErrorKind::UnterminatedExpression,
            CompileError::UnterminatedTag { .. } => ErrorKind::UnterminatedTag,
            CompileError::UnterminatedComment { .. } => ErrorKind::UnterminatedComment,
            CompileError::UnbalancedMarkup { .. }
            | CompileError::UnclosedElement { .. }
            | CompileError::UnexpectedCloseTag { .. } => ErrorKind::UnbalancedMarkup,
            CompileError::DuplicateCodeBlock { .. } => ErrorKind::DuplicateCodeBlock,
            CompileError::MalformedDirective { .. } => ErrorKind::MalformedDirective,
            CompileError::UnknownDirective { .. } => ErrorKind::UnknownDirective,
            CompileError::EventHandlerAttributeOnNonElement { .. } => {
                ErrorKind::EventHandlerAttributeOnNonElement
            }
            CompileError::AttributeOnTextElement { .. } => ErrorKind::AttributeOnTextElement,
            CompileError::StyleSheetPathEmpty { .. } => ErrorKind::StyleSheetPathEmpty,
            CompileError::SequenceCollision { .. } => ErrorKind::SequenceCollision,
            CompileError::UnbalancedOutput { .. } => ErrorKind::UnbalancedOutput,
        }
    }

    pub fn location(&self) -> SourceLocation {
        match self {
            CompileError::UnterminatedExpression { at }
            | CompileError::UnterminatedTag { at, .. }
            | CompileError::UnterminatedComment { at }
            | CompileError::UnbalancedMarkup { at, .. }
            | CompileError::UnclosedElement { at, .. }
            | CompileError::UnexpectedCloseTag { at, .. }
            | CompileError::DuplicateCodeBlock { at, .. }
            | CompileError::MalformedDirective { at, .. }
            | CompileError::UnknownDirective { at, .. }
            | CompileError::EventHandlerAttributeOnNonElement { at, .. }
            | CompileError::AttributeOnTextElement { at, .. }
            | CompileError::StyleSheetPathEmpty { at }
            | CompileError::SequenceCollision { at, .. } => *at,
            CompileError::UnbalancedOutput { .. } => SourceLocation::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub kind: ErrorKind,
    pub category: ErrorCategory,
    pub file_path: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub hint: String,
}

impl Diagnostic {
    pub fn from_error(file_path: &str, error: &CompileError) -> Self {
        let kind = error.kind();
        let at = error.location();
        Self {
            code: kind.code().to_string(),
            kind,
            category: kind.category(),
            file_path: file_path.to_string(),
            line: at.line,
            column: at.column,
            message: error.to_string(),
            hint: get_hint(kind.code()).to_string(),
        }
    }

    pub fn io(file_path: &str, error: &std::io::Error) -> Self {
        Self {
            code: ERR_IO.to_string(),
            kind: ErrorKind::Io,
            category: ErrorCategory::IoError,
            file_path: file_path.to_string(),
            line: 0,
            column: 0,
            message: error.to_string(),
            hint: get_hint(ERR_IO).to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {} [{:?}] {}",
            self.file_path, self.line, self.column, self.code, self.kind, self.message
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Expression(ExpressionNode),
    Directive(ControlDirectiveNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<AttributeIR>,
    pub children: Vec<TemplateNode>,
    pub self_closing: bool,
    #[serde(default)]
    pub location: SourceLocation,
    /// Assigned by the analyzer.
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub target: TargetType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: String,
    #[serde(default)]
    pub location: SourceLocation,
    #[serde(default)]
    pub sequence: u32,
}

/// `@expr` emitting a value into the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub expression: String,
    #[serde(default)]
    pub location: SourceLocation,
    #[serde(default)]
    pub sequence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DirectiveKind {
    If,
    ElseIf,
    Else,
    ForEach,
    For,
    While,
    CodeBlock,
}

impl DirectiveKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DirectiveKind::If => "if",
            DirectiveKind::ElseIf => "elseif",
            DirectiveKind::Else => "else",
            DirectiveKind::ForEach => "foreach",
            DirectiveKind::For => "for",
            DirectiveKind::While => "while",
            DirectiveKind::CodeBlock => "{",
        }
    }
}

/// One branch of a control directive. A `CodeBlock` branch is either a single
/// verbatim statement in `header` with an empty `body`, or an `@{ }` block
/// with an empty `header` and its statements and markup in `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectiveBranch {
    pub kind: DirectiveKind,
    pub header: String,
    pub body: Vec<TemplateNode>,
    #[serde(default)]
    pub location: SourceLocation,
    #[serde(default)]
    pub sequence: u32,
}

/// An `@if` chain is a single directive whose branches run in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlDirectiveNode {
    pub kind: DirectiveKind,
    pub branches: Vec<DirectiveBranch>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValuePart {
    Literal(String),
    Expression(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValue {
    /// Boolean attribute without `=`.
    Absent,
    Literal(String),
    Expression(String),
    /// Quoted value mixing literal text with `@expr` parts.
    Interpolated(Vec<ValuePart>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeValueKind {
    #[default]
    Literal,
    BoundExpression,
    EventHandler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeIR {
    pub name: String,
    pub value: AttributeValue,
    #[serde(default)]
    pub kind: AttributeValueKind,
    /// Bare callable-looking reference on a non-event attribute; the generated
    /// code decides between handler and value at runtime.
    #[serde(default)]
    pub handler_candidate: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

impl AttributeIR {
    pub fn new(name: &str, value: AttributeValue, location: SourceLocation) -> Self {
        Self {
            name: name.to_string(),
            value,
            kind: AttributeValueKind::default(),
            handler_candidate: false,
            location,
        }
    }

    /// Name handed to the runtime, without a leading `@`.
    pub fn runtime_name(&self) -> &str {
        self.name.trim_start_matches('@')
    }

    /// The value as written: literal text for literals, host code otherwise.
    pub fn raw_value(&self) -> String {
        match &self.value {
            AttributeValue::Absent => String::new(),
            AttributeValue::Literal(text) | AttributeValue::Expression(text) => text.clone(),
            AttributeValue::Interpolated(parts) => parts
                .iter()
                .map(|part| match part {
                    ValuePart::Literal(text) => text.as_str(),
                    ValuePart::Expression(code) => code.as_str(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataKind {
    Using,
    Inherits,
    Attribute,
    Namespace,
    Implements,
    Page,
}

impl MetadataKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "using" => Some(MetadataKind::Using),
            "inherits" => Some(MetadataKind::Inherits),
            "attribute" => Some(MetadataKind::Attribute),
            "namespace" => Some(MetadataKind::Namespace),
            "implements" => Some(MetadataKind::Implements),
            "page" => Some(MetadataKind::Page),
            _ => None,
        }
    }
}

/// File-level directive such as `@using` or `@inherits`; not part of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDirective {
    pub kind: MetadataKind,
    pub value: String,
    #[serde(default)]
    pub location: SourceLocation,
}

/// The `@code { ... }` block, relocated verbatim into the generated type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLevelCode {
    pub raw: String,
    /// The `@code` keyword.
    #[serde(default)]
    pub location: SourceLocation,
    /// First non-blank character of `raw` in the template.
    #[serde(default)]
    pub body_location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub metadata: Vec<MetadataDirective>,
    pub nodes: Vec<TemplateNode>,
    pub code: Option<TopLevelCode>,
}

impl Document {
    pub fn metadata_of(&self, kind: MetadataKind) -> impl Iterator<Item = &MetadataDirective> {
        self.metadata.iter().filter(move |m| m.kind == kind)
    }

    /// Last occurrence wins for single-valued directives.
    pub fn last_metadata(&self, kind: MetadataKind) -> Option<&MetadataDirective> {
        self.metadata_of(kind).last()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Sequence numbers must be unique and strictly increasing in pre-order.
pub fn validate_sequence_numbers(document: &Document) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    let mut last: Option<u32> = None;
    for node in &document.nodes {
        check_node_sequence(node, &mut seen, &mut last)?;
    }
    Ok(())
}

fn check_sequence(
    sequence: u32,
    at: SourceLocation,
    seen: &mut HashSet<u32>,
    last: &mut Option<u32>,
) -> Result<(), CompileError> {
    let ascending = last.map_or(true, |prev| sequence > prev);
    if !seen.insert(sequence) || !ascending {
        return Err(CompileError::SequenceCollision { sequence, at });
    }
    *last = Some(sequence);
    Ok(())
}

fn check_node_sequence(
    node: &TemplateNode,
    seen: &mut HashSet<u32>,
    last: &mut Option<u32>,
) -> Result<(), CompileError> {
    match node {
        TemplateNode::Element(el) => {
            check_sequence(el.sequence, el.location, seen, last)?;
            for child in &el.children {
                check_node_sequence(child, seen, last)?;
            }
            Ok(())
        }
        TemplateNode::Text(t) => check_sequence(t.sequence, t.location, seen, last),
        TemplateNode::Expression(e) => check_sequence(e.sequence, e.location, seen, last),
        TemplateNode::Directive(d) => {
            for branch in &d.branches {
                check_sequence(branch.sequence, branch.location, seen, last)?;
                for child in &branch.body {
                    check_node_sequence(child, seen, last)?;
                }
            }
            Ok(())
        }
    }
}
