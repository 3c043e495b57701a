//! Lexer Module for the template compiler
//!
//! Converts template source into a flat token stream. Markup and host-language
//! expressions are interleaved, so the lexer tracks whether it sits in markup
//! or in the code context of a directive body. It never fails: malformed input
//! becomes an `Error` token and the parser reports it.

use crate::expression::{
    extract_expression, find_balanced_end, is_ident_char, is_ident_start, scan_statement,
};
use crate::validate::SourceLocation;

/// Directive keywords that open a control structure anywhere in a template.
const CONTROL_KEYWORDS: &[&str] = &["if", "elseif", "else", "foreach", "for", "while"];

/// File-level metadata directives.
pub const METADATA_KEYWORDS: &[&str] = &[
    "using",
    "inherits",
    "attribute",
    "namespace",
    "implements",
    "page",
];

/// Elements that never have children or a close tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexFault {
    UnterminatedExpression,
    UnterminatedTag,
    UnterminatedComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    /// `<name`; attributes follow until `TagEnd` or `TagSelfClose`.
    TagOpen,
    /// `>` ending an open tag.
    TagEnd,
    /// `</name>`
    TagClose,
    /// `/>`
    TagSelfClose,
    AttributeName,
    AttributeValueLiteral,
    AttributeValueExpr,
    /// `@keyword`; text holds the keyword.
    DirectiveAt,
    ExpressionSpan,
    CodeBlock,
    /// `{` opening a directive body.
    BlockOpen,
    /// `}` closing a directive body.
    BlockClose,
    Error(LexFault),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

/// An open directive body.
#[derive(Debug, Clone, Copy)]
struct BlockFrame {
    /// Element depth when the body opened; equal depth means code context.
    element_depth: usize,
    /// Whether an `else` may follow the closing brace.
    conditional: bool,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    text: String,
    text_start: SourceLocation,
    element_depth: usize,
    blocks: Vec<BlockFrame>,
}

pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    lexer.run();
    lexer.tokens
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            text: String::new(),
            text_start: SourceLocation::new(1, 1),
            element_depth: 0,
            blocks: Vec::new(),
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // cursor helpers
    // ───────────────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn here(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    fn advance_to(&mut self, end: usize) {
        while self.pos < end && self.pos < self.chars.len() {
            self.bump();
        }
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn starts_with(&self, at: usize, word: &str) -> bool {
        word.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(at + i) == Some(&c))
    }

    /// `word` at `at` followed by a non-identifier char.
    fn keyword_at(&self, at: usize, word: &str) -> bool {
        self.starts_with(at, word)
            && !self
                .chars
                .get(at + word.chars().count())
                .copied()
                .is_some_and(is_ident_char)
    }

    fn read_word(&self, at: usize) -> String {
        let mut end = at;
        while end < self.chars.len() && is_ident_char(self.chars[end]) {
            end += 1;
        }
        self.slice(at, end)
    }

    /// Location of char index `target`, which must not precede the cursor.
    fn location_ahead(&self, target: usize) -> SourceLocation {
        let mut at = self.here();
        for &c in &self.chars[self.pos..target] {
            if c == '\n' {
                at.line += 1;
                at.column = 1;
            } else {
                at.column += 1;
            }
        }
        at
    }

    fn in_code_context(&self) -> bool {
        self.blocks
            .last()
            .is_some_and(|frame| frame.element_depth == self.element_depth)
    }

    fn at_file_level(&self) -> bool {
        self.blocks.is_empty() && self.element_depth == 0
    }

    /// Only whitespace between the previous newline and `at`.
    fn at_line_start(&self, at: usize) -> bool {
        self.chars[..at]
            .iter()
            .rev()
            .take_while(|c| **c != '\n')
            .all(|c| c.is_whitespace())
    }

    // ───────────────────────────────────────────────────────────────────────
    // token output
    // ───────────────────────────────────────────────────────────────────────

    fn push(&mut self, kind: TokenKind, text: String, at: SourceLocation) {
        self.tokens.push(Token {
            kind,
            text,
            line: at.line,
            column: at.column,
        });
    }

    fn push_text_char(&mut self, c: char) {
        if self.text.is_empty() {
            self.text_start = self.here();
        }
        self.text.push(c);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.push(TokenKind::Text, text, self.text_start);
        }
    }

    fn fail(&mut self, fault: LexFault, at: SourceLocation, resume: usize) {
        self.flush_text();
        self.push(TokenKind::Error(fault), String::new(), at);
        self.advance_to(resume);
    }

    // ───────────────────────────────────────────────────────────────────────
    // main loop
    // ───────────────────────────────────────────────────────────────────────

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            if self.in_code_context() {
                self.lex_code();
                continue;
            }
            match c {
                '<' if self.starts_tag() => self.lex_tag(),
                '@' => self.lex_at(),
                _ => {
                    self.push_text_char(c);
                    self.bump();
                }
            }
        }
        self.flush_text();
    }

    fn starts_tag(&self) -> bool {
        match self.peek_at(1) {
            Some(c) if c.is_ascii_alphabetic() => true,
            Some('/') => self.peek_at(2).is_some_and(|c| c.is_ascii_alphabetic()),
            Some('!') => self.starts_with(self.pos + 1, "!--"),
            _ => false,
        }
    }

    /// Inside a directive body, outside any element: host code.
    fn lex_code(&mut self) {
        let Some(c) = self.peek() else { return };
        if c.is_whitespace() {
            self.bump();
            return;
        }
        match c {
            '}' => self.close_block(),
            '<' if self.starts_tag() => self.lex_tag(),
            '@' => self.lex_at(),
            _ => {
                if let Some(keyword) = CONTROL_KEYWORDS
                    .iter()
                    .find(|kw| **kw != "elseif" && self.keyword_at(self.pos, kw))
                {
                    let at = self.here();
                    self.lex_control(keyword, at);
                } else {
                    self.lex_statement();
                }
            }
        }
    }

    fn lex_statement(&mut self) {
        let at = self.here();
        match scan_statement(&self.chars, self.pos) {
            Ok(end) => {
                let statement = self.slice(self.pos, end).trim().to_string();
                self.advance_to(end);
                if !statement.is_empty() {
                    self.push(TokenKind::CodeBlock, statement, at);
                }
            }
            Err(err) => {
                let resume = err.resume_at(self.chars.len());
                self.fail(LexFault::UnterminatedExpression, at, resume);
            }
        }
    }

    fn close_block(&mut self) {
        let at = self.here();
        self.flush_text();
        self.push(TokenKind::BlockClose, "}".to_string(), at);
        self.bump();
        let frame = self.blocks.pop();

        // `} else { ... }` and `} else if (...) { ... }` continue the chain.
        if frame.is_some_and(|f| f.conditional) {
            let mut look = self.pos;
            while look < self.chars.len() && self.chars[look].is_whitespace() {
                look += 1;
            }
            if self.keyword_at(look, "else") {
                self.advance_to(look);
                let else_at = self.here();
                self.lex_control("else", else_at);
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // directives and expressions
    // ───────────────────────────────────────────────────────────────────────

    fn lex_at(&mut self) {
        let at = self.here();
        let next = self.peek_at(1);

        if next == Some('@') {
            self.push_text_char('@');
            self.bump();
            self.bump();
            return;
        }

        if next == Some('*') {
            self.skip_template_comment(at);
            return;
        }

        // e-mail style `name@host` is literal text
        if self.pos > 0 && self.chars[self.pos - 1].is_alphanumeric() {
            self.push_text_char('@');
            self.bump();
            return;
        }

        match next {
            Some('{') => {
                // `@{ ... }` opens a code context like any directive body.
                self.flush_text();
                self.push(TokenKind::DirectiveAt, "{".to_string(), at);
                self.bump();
                let brace_at = self.here();
                self.push(TokenKind::BlockOpen, "{".to_string(), brace_at);
                self.bump();
                self.blocks.push(BlockFrame {
                    element_depth: self.element_depth,
                    conditional: false,
                });
            }
            Some(c) if c == '(' || c == '[' || is_ident_start(c) => {
                let word = self.read_word(self.pos + 1);
                if CONTROL_KEYWORDS.contains(&word.as_str()) {
                    self.flush_text();
                    self.bump();
                    self.lex_control(&word, at);
                } else if word == "code" {
                    self.lex_code_directive(at);
                } else if self.is_file_level_directive(&word) {
                    self.lex_metadata_directive(&word, at);
                } else {
                    self.lex_expression(at);
                }
            }
            _ => {
                self.push_text_char('@');
                self.bump();
            }
        }
    }

    fn skip_template_comment(&mut self, at: SourceLocation) {
        let mut i = self.pos + 2;
        while i + 1 < self.chars.len() {
            if self.chars[i] == '*' && self.chars[i + 1] == '@' {
                self.advance_to(i + 2);
                return;
            }
            i += 1;
        }
        self.fail(LexFault::UnterminatedComment, at, self.chars.len());
    }

    /// At file level and line start, a lowercase word is a directive when it is
    /// a known metadata keyword, or when more content follows on the line.
    fn is_file_level_directive(&self, word: &str) -> bool {
        if !self.at_file_level() || !self.at_line_start(self.pos) {
            return false;
        }
        if METADATA_KEYWORDS.contains(&word) {
            return true;
        }
        if word.is_empty() || !word.chars().all(|c| c.is_ascii_lowercase()) {
            return false;
        }
        let after = self.pos + 1 + word.chars().count();
        matches!(self.chars.get(after), Some(' ') | Some('\t'))
            && self.chars[after..]
                .iter()
                .take_while(|c| **c != '\n')
                .any(|c| !c.is_whitespace())
    }

    fn lex_metadata_directive(&mut self, word: &str, at: SourceLocation) {
        self.flush_text();
        self.push(TokenKind::DirectiveAt, word.to_string(), at);
        self.advance_to(self.pos + 1 + word.chars().count());

        let value_at = self.here();
        let mut end = self.pos;
        while end < self.chars.len() && self.chars[end] != '\n' {
            end += 1;
        }
        let value = self.slice(self.pos, end).trim().trim_end_matches(';').trim().to_string();
        self.push(TokenKind::ExpressionSpan, value, value_at);
        // The line break belongs to the directive.
        self.advance_to(end + 1);
    }

    fn lex_code_directive(&mut self, at: SourceLocation) {
        self.flush_text();
        self.push(TokenKind::DirectiveAt, "code".to_string(), at);
        self.advance_to(self.pos + 1 + "code".len());
        self.skip_whitespace();
        if self.peek() != Some('{') {
            return;
        }
        let body_at = self.here();
        match find_balanced_end(&self.chars, self.pos) {
            Ok(end) => {
                let body = self.slice(self.pos + 1, end - 1);
                // Positioned on the first line that survives trimming.
                let first_code = (self.pos + 1..end - 1)
                    .find(|&i| !self.chars[i].is_whitespace())
                    .map_or(body_at, |i| self.location_ahead(i));
                self.push(TokenKind::CodeBlock, trim_blank_lines(&body), first_code);
                self.advance_to(end);
            }
            Err(err) => {
                let resume = err.resume_at(self.chars.len());
                self.fail(LexFault::UnterminatedExpression, body_at, resume);
            }
        }
    }

    /// `@name.Chain(...)`, `@(explicit)` or `@[...]`.
    fn lex_expression(&mut self, at: SourceLocation) {
        self.flush_text();
        match self.read_at_expression(self.pos) {
            Ok((expr, end)) => {
                self.push(TokenKind::ExpressionSpan, expr, at);
                self.advance_to(end);
            }
            Err(resume) => self.fail(LexFault::UnterminatedExpression, at, resume),
        }
    }

    /// Expression after the `@` at `at_index`. Explicit `( )` are stripped.
    /// On failure returns the index to resume from.
    fn read_at_expression(&self, at_index: usize) -> Result<(String, usize), usize> {
        let start = at_index + 1;
        let end = extract_expression(&self.chars, start)
            .map_err(|err| err.resume_at(self.chars.len()))?;
        let expr = if self.chars.get(start) == Some(&'(') {
            self.slice(start + 1, end - 1).trim().to_string()
        } else {
            self.slice(start, end)
        };
        Ok((expr, end))
    }

    /// `if (...) {`, `foreach (...) {`, `else {`, `else if (...) {` and friends.
    /// The cursor sits on the keyword (the `@`, if any, is already consumed).
    fn lex_control(&mut self, keyword: &str, at: SourceLocation) {
        self.flush_text();
        self.advance_to(self.pos + keyword.chars().count());

        let mut keyword = keyword.to_string();
        if keyword == "else" {
            let mut look = self.pos;
            while look < self.chars.len() && self.chars[look].is_whitespace() {
                look += 1;
            }
            if self.keyword_at(look, "if") {
                self.advance_to(look + 2);
                keyword = "elseif".to_string();
            }
        }
        self.push(TokenKind::DirectiveAt, keyword.clone(), at);

        if keyword != "else" {
            self.skip_whitespace();
            if self.peek() == Some('(') {
                let header_at = self.here();
                match find_balanced_end(&self.chars, self.pos) {
                    Ok(end) => {
                        let header = self.slice(self.pos + 1, end - 1).trim().to_string();
                        self.push(TokenKind::ExpressionSpan, header, header_at);
                        self.advance_to(end);
                    }
                    Err(err) => {
                        let resume = err.resume_at(self.chars.len());
                        self.fail(LexFault::UnterminatedExpression, header_at, resume);
                        return;
                    }
                }
            }
        }

        let mut look = self.pos;
        while look < self.chars.len() && self.chars[look].is_whitespace() {
            look += 1;
        }
        if self.chars.get(look) == Some(&'{') {
            self.advance_to(look);
            let brace_at = self.here();
            self.push(TokenKind::BlockOpen, "{".to_string(), brace_at);
            self.bump();
            self.blocks.push(BlockFrame {
                element_depth: self.element_depth,
                conditional: keyword == "if" || keyword == "elseif",
            });
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // markup
    // ───────────────────────────────────────────────────────────────────────

    fn read_tag_name(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        {
            self.bump();
        }
        self.slice(start, self.pos)
    }

    fn lex_tag(&mut self) {
        let at = self.here();
        self.flush_text();

        if self.starts_with(self.pos, "<!--") {
            let mut i = self.pos + 4;
            while i + 2 < self.chars.len() {
                if self.starts_with(i, "-->") {
                    self.advance_to(i + 3);
                    return;
                }
                i += 1;
            }
            self.fail(LexFault::UnterminatedComment, at, self.chars.len());
            return;
        }

        self.bump();
        if self.peek() == Some('/') {
            self.bump();
            let name = self.read_tag_name();
            self.skip_whitespace();
            if self.peek() == Some('>') {
                self.bump();
                self.push(TokenKind::TagClose, name, at);
                self.element_depth = self.element_depth.saturating_sub(1);
            } else {
                self.push(TokenKind::Error(LexFault::UnterminatedTag), name, at);
            }
            return;
        }

        let name = self.read_tag_name();
        self.push(TokenKind::TagOpen, name.clone(), at);

        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                self.push(TokenKind::Error(LexFault::UnterminatedTag), name, at);
                return;
            };
            match c {
                '>' => {
                    let end_at = self.here();
                    self.bump();
                    self.push(TokenKind::TagEnd, ">".to_string(), end_at);
                    if !is_void_element(&name) {
                        self.element_depth += 1;
                    }
                    return;
                }
                '/' if self.peek_at(1) == Some('>') => {
                    let end_at = self.here();
                    self.bump();
                    self.bump();
                    self.push(TokenKind::TagSelfClose, "/>".to_string(), end_at);
                    return;
                }
                '/' => self.bump(),
                _ => {
                    if !self.lex_attribute() {
                        return;
                    }
                }
            }
        }
    }

    /// Returns false when lexing hit an error and the tag must be abandoned.
    fn lex_attribute(&mut self) -> bool {
        let at = self.here();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\''))
        {
            self.bump();
        }
        if self.pos == start {
            // stray character
            self.bump();
            return true;
        }
        let name = self.slice(start, self.pos);
        self.push(TokenKind::AttributeName, name, at);

        let mut look = self.pos;
        while look < self.chars.len() && self.chars[look].is_whitespace() {
            look += 1;
        }
        if self.chars.get(look) != Some(&'=') {
            return true;
        }
        self.advance_to(look + 1);
        self.skip_whitespace();

        match self.peek() {
            Some(q) if q == '"' || q == '\'' => self.lex_quoted_value(q),
            Some('@') if self.peek_at(1).is_some_and(|c| c == '(' || is_ident_start(c)) => {
                let value_at = self.here();
                match self.read_at_expression(self.pos) {
                    Ok((expr, end)) => {
                        self.push(TokenKind::AttributeValueExpr, expr, value_at);
                        self.advance_to(end);
                        true
                    }
                    Err(resume) => {
                        self.fail(LexFault::UnterminatedExpression, value_at, resume);
                        false
                    }
                }
            }
            Some(_) => {
                let value_at = self.here();
                let value_start = self.pos;
                while let Some(c) = self.peek() {
                    let self_close = c == '/' && self.peek_at(1) == Some('>');
                    if c.is_whitespace() || c == '>' || self_close {
                        break;
                    }
                    self.bump();
                }
                let value = self.slice(value_start, self.pos);
                self.push(TokenKind::AttributeValueLiteral, value, value_at);
                true
            }
            None => true,
        }
    }

    fn lex_quoted_value(&mut self, quote: char) -> bool {
        self.bump();
        let mut literal = String::new();
        let mut literal_at = self.here();
        let mut emitted = false;

        loop {
            let Some(c) = self.peek() else {
                let at = self.here();
                self.push(TokenKind::Error(LexFault::UnterminatedTag), String::new(), at);
                return false;
            };

            if c == quote {
                if !literal.is_empty() || !emitted {
                    self.push(TokenKind::AttributeValueLiteral, literal, literal_at);
                }
                self.bump();
                return true;
            }

            if c == '@' {
                let next = self.peek_at(1);
                let after_word = self.pos > 0 && self.chars[self.pos - 1].is_alphanumeric();
                if next == Some('@') {
                    if literal.is_empty() {
                        literal_at = self.here();
                    }
                    literal.push('@');
                    self.bump();
                    self.bump();
                    continue;
                }
                if !after_word && next.is_some_and(|n| n == '(' || is_ident_start(n)) {
                    if !literal.is_empty() {
                        let text = std::mem::take(&mut literal);
                        self.push(TokenKind::AttributeValueLiteral, text, literal_at);
                    }
                    let expr_at = self.here();
                    match self.read_at_expression(self.pos) {
                        Ok((expr, end)) => {
                            self.push(TokenKind::AttributeValueExpr, expr, expr_at);
                            self.advance_to(end);
                            emitted = true;
                            literal_at = self.here();
                            continue;
                        }
                        Err(resume) => {
                            self.fail(LexFault::UnterminatedExpression, expr_at, resume);
                            return false;
                        }
                    }
                }
            }

            if literal.is_empty() {
                literal_at = self.here();
            }
            literal.push(c);
            self.bump();
        }
    }
}

/// Drop leading and trailing blank lines but keep indentation of the rest.
fn trim_blank_lines(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
