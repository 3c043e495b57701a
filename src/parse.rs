//! Parse Module for the template compiler
//!
//! Recursive descent over the lexer's token stream. Builds the template tree,
//! collects file-level metadata directives and the single `@code` block.
//! Fails on the first structural error.

use log::debug;

use crate::lexer::{is_void_element, tokenize, LexFault, Token, TokenKind, METADATA_KEYWORDS};
use crate::validate::{
    AttributeIR, AttributeValue, CompileError, ControlDirectiveNode, DirectiveBranch,
    DirectiveKind, Document, ElementNode, ExpressionNode, MetadataDirective, MetadataKind,
    SourceLocation, TemplateNode, TextNode, TopLevelCode, ValuePart,
};

// ═══════════════════════════════════════════════════════════════════════════════
// PARSE CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// What the node list currently being parsed is nested in.
#[derive(Debug, Clone)]
enum Context {
    Root,
    Element { tag: String, at: SourceLocation },
    Block { keyword: String, at: SourceLocation },
}

impl Context {
    fn drops_blank_text(&self) -> bool {
        !matches!(self, Context::Element { .. })
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    metadata: Vec<MetadataDirective>,
    code: Option<TopLevelCode>,
}

fn lex_error(fault: LexFault, token: &Token) -> CompileError {
    let at = token.location();
    match fault {
        LexFault::UnterminatedExpression => CompileError::UnterminatedExpression { at },
        LexFault::UnterminatedTag => CompileError::UnterminatedTag {
            tag: token.text.clone(),
            at,
        },
        LexFault::UnterminatedComment => CompileError::UnterminatedComment { at },
    }
}

fn malformed(directive: &str, reason: &str, at: SourceLocation) -> CompileError {
    CompileError::MalformedDirective {
        directive: directive.to_string(),
        reason: reason.to_string(),
        at,
    }
}

fn unterminated(tag: &str, at: SourceLocation) -> CompileError {
    CompileError::UnterminatedTag {
        tag: tag.to_string(),
        at,
    }
}

fn is_blank_text(token: &Token) -> bool {
    token.kind == TokenKind::Text && token.text.trim().is_empty()
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            metadata: Vec::new(),
            code: None,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn next_if(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.next()
        } else {
            None
        }
    }

    fn parse_document(mut self) -> Result<Document, CompileError> {
        let nodes = self.parse_nodes(&Context::Root)?;
        Ok(Document {
            metadata: self.metadata,
            nodes,
            code: self.code,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NODE LISTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_nodes(&mut self, ctx: &Context) -> Result<Vec<TemplateNode>, CompileError> {
        let mut nodes = Vec::new();

        loop {
            let Some(token) = self.next() else {
                return match ctx {
                    Context::Root => Ok(nodes),
                    Context::Element { tag, at } => Err(CompileError::UnclosedElement {
                        tag: tag.clone(),
                        at: *at,
                    }),
                    Context::Block { keyword, at } => {
                        Err(malformed(keyword, "body is never closed with '}'", *at))
                    }
                };
            };

            match token.kind {
                TokenKind::Text => {
                    if ctx.drops_blank_text() && is_blank_text(&token) {
                        continue;
                    }
                    nodes.push(TemplateNode::Text(TextNode {
                        value: token.text.clone(),
                        location: token.location(),
                        sequence: 0,
                    }));
                }
                TokenKind::ExpressionSpan => {
                    nodes.push(TemplateNode::Expression(ExpressionNode {
                        expression: token.text.clone(),
                        location: token.location(),
                        sequence: 0,
                    }));
                }
                TokenKind::CodeBlock => {
                    nodes.push(TemplateNode::Directive(ControlDirectiveNode {
                        kind: DirectiveKind::CodeBlock,
                        branches: vec![DirectiveBranch {
                            kind: DirectiveKind::CodeBlock,
                            header: token.text.clone(),
                            body: Vec::new(),
                            location: token.location(),
                            sequence: 0,
                        }],
                        location: token.location(),
                    }));
                }
                TokenKind::TagOpen => {
                    nodes.push(TemplateNode::Element(self.parse_element(token)?));
                }
                TokenKind::TagClose => {
                    return match ctx {
                        Context::Element { tag, .. } if tag.eq_ignore_ascii_case(&token.text) => {
                            Ok(nodes)
                        }
                        Context::Element { tag, at } => Err(CompileError::UnbalancedMarkup {
                            open: tag.clone(),
                            open_line: at.line,
                            close: token.text.clone(),
                            close_line: token.line,
                            at: token.location(),
                        }),
                        _ => Err(CompileError::UnexpectedCloseTag {
                            tag: token.text.clone(),
                            at: token.location(),
                        }),
                    };
                }
                TokenKind::BlockClose => {
                    return match ctx {
                        Context::Block { .. } => Ok(nodes),
                        Context::Element { tag, at } => Err(CompileError::UnclosedElement {
                            tag: tag.clone(),
                            at: *at,
                        }),
                        Context::Root => {
                            Err(malformed("}", "has no matching '{'", token.location()))
                        }
                    };
                }
                TokenKind::DirectiveAt => {
                    if let Some(node) = self.parse_directive(&token)? {
                        nodes.push(node);
                    }
                }
                TokenKind::Error(fault) => return Err(lex_error(fault, &token)),
                // Only produced inside tags and directives, which consume them.
                TokenKind::TagEnd
                | TokenKind::TagSelfClose
                | TokenKind::AttributeName
                | TokenKind::AttributeValueLiteral
                | TokenKind::AttributeValueExpr
                | TokenKind::BlockOpen => {}
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ELEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_element(&mut self, open: Token) -> Result<ElementNode, CompileError> {
        let tag = open.text.clone();
        let at = open.location();
        let mut attributes = Vec::new();

        loop {
            let Some(token) = self.next() else {
                return Err(unterminated(&tag, at));
            };
            match token.kind {
                TokenKind::AttributeName => {
                    let value = self.parse_attribute_value();
                    attributes.push(AttributeIR::new(&token.text, value, token.location()));
                }
                TokenKind::TagSelfClose => {
                    return Ok(ElementNode {
                        tag,
                        attributes,
                        children: Vec::new(),
                        self_closing: true,
                        location: at,
                        sequence: 0,
                        target: Default::default(),
                    });
                }
                TokenKind::TagEnd => {
                    let void = is_void_element(&tag);
                    let children = if void {
                        Vec::new()
                    } else {
                        self.parse_nodes(&Context::Element {
                            tag: tag.clone(),
                            at,
                        })?
                    };
                    return Ok(ElementNode {
                        tag,
                        attributes,
                        children,
                        self_closing: void,
                        location: at,
                        sequence: 0,
                        target: Default::default(),
                    });
                }
                TokenKind::Error(LexFault::UnterminatedTag) => return Err(unterminated(&tag, at)),
                TokenKind::Error(fault) => return Err(lex_error(fault, &token)),
                _ => return Err(unterminated(&tag, at)),
            }
        }
    }

    fn parse_attribute_value(&mut self) -> AttributeValue {
        let mut parts = Vec::new();
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::AttributeValueLiteral => {
                    parts.push(ValuePart::Literal(token.text.clone()))
                }
                TokenKind::AttributeValueExpr => {
                    parts.push(ValuePart::Expression(token.text.clone()))
                }
                _ => break,
            }
            self.pos += 1;
        }

        match parts.len() {
            0 => AttributeValue::Absent,
            1 => match parts.remove(0) {
                ValuePart::Literal(text) => AttributeValue::Literal(text),
                ValuePart::Expression(code) => AttributeValue::Expression(code),
            },
            _ => AttributeValue::Interpolated(parts),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DIRECTIVES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Returns `None` for directives that do not become tree nodes.
    fn parse_directive(&mut self, token: &Token) -> Result<Option<TemplateNode>, CompileError> {
        let keyword = token.text.as_str();
        let at = token.location();

        match keyword {
            "code" => {
                let Some(body) = self.next_if(TokenKind::CodeBlock) else {
                    return Err(malformed("code", "expects a { } body", at));
                };
                if let Some(first) = &self.code {
                    return Err(CompileError::DuplicateCodeBlock {
                        first_line: first.location.line,
                        second_line: at.line,
                        at,
                    });
                }
                let body_location = body.location();
                self.code = Some(TopLevelCode {
                    raw: body.text,
                    location: at,
                    body_location,
                });
                Ok(None)
            }
            _ if METADATA_KEYWORDS.contains(&keyword) => {
                let value = self
                    .next_if(TokenKind::ExpressionSpan)
                    .map(|t| t.text)
                    .unwrap_or_default();
                if value.is_empty() {
                    return Err(malformed(keyword, "expects a value", at));
                }
                if let Some(kind) = MetadataKind::from_keyword(keyword) {
                    self.metadata.push(MetadataDirective {
                        kind,
                        value,
                        location: at,
                    });
                }
                Ok(None)
            }
            "if" => self.parse_if_chain(at).map(Some),
            "foreach" | "for" | "while" => {
                let kind = match keyword {
                    "foreach" => DirectiveKind::ForEach,
                    "for" => DirectiveKind::For,
                    _ => DirectiveKind::While,
                };
                let branch = self.parse_branch(kind, at)?;
                Ok(Some(TemplateNode::Directive(ControlDirectiveNode {
                    kind,
                    branches: vec![branch],
                    location: at,
                })))
            }
            "{" => {
                let branch = self.parse_branch(DirectiveKind::CodeBlock, at)?;
                Ok(Some(TemplateNode::Directive(ControlDirectiveNode {
                    kind: DirectiveKind::CodeBlock,
                    branches: vec![branch],
                    location: at,
                })))
            }
            "else" | "elseif" => Err(malformed(keyword, "has no preceding @if", at)),
            _ => Err(CompileError::UnknownDirective {
                name: keyword.to_string(),
                at,
            }),
        }
    }

    /// `@if` followed by any number of `else if` and at most one `else`.
    fn parse_if_chain(&mut self, at: SourceLocation) -> Result<TemplateNode, CompileError> {
        let mut branches = vec![self.parse_branch(DirectiveKind::If, at)?];

        loop {
            let mut look = self.pos;
            while self.tokens.get(look).is_some_and(is_blank_text) {
                look += 1;
            }
            let kind = match self.tokens.get(look) {
                Some(t) if t.kind == TokenKind::DirectiveAt && t.text == "elseif" => {
                    DirectiveKind::ElseIf
                }
                Some(t) if t.kind == TokenKind::DirectiveAt && t.text == "else" => {
                    DirectiveKind::Else
                }
                _ => break,
            };
            let branch_at = self.tokens[look].location();
            self.pos = look + 1;
            branches.push(self.parse_branch(kind, branch_at)?);
            if kind == DirectiveKind::Else {
                break;
            }
        }

        Ok(TemplateNode::Directive(ControlDirectiveNode {
            kind: DirectiveKind::If,
            branches,
            location: at,
        }))
    }

    /// Header (unless `else` or `@{`) and `{ }` body. The directive token is
    /// consumed.
    fn parse_branch(
        &mut self,
        kind: DirectiveKind,
        at: SourceLocation,
    ) -> Result<DirectiveBranch, CompileError> {
        let keyword = kind.keyword();

        let header = if matches!(kind, DirectiveKind::Else | DirectiveKind::CodeBlock) {
            String::new()
        } else {
            match self.peek().cloned() {
                Some(t) if t.kind == TokenKind::ExpressionSpan => {
                    self.pos += 1;
                    if t.text.is_empty() {
                        return Err(malformed(keyword, "has an empty header", at));
                    }
                    t.text
                }
                Some(t) => match t.kind {
                    TokenKind::Error(fault) => return Err(lex_error(fault, &t)),
                    _ => return Err(malformed(keyword, "expects a (header)", at)),
                },
                None => return Err(malformed(keyword, "expects a (header)", at)),
            }
        };

        if self.next_if(TokenKind::BlockOpen).is_none() {
            return Err(malformed(keyword, "expects a { } body", at));
        }

        let body = self.parse_nodes(&Context::Block {
            keyword: keyword.to_string(),
            at,
        })?;

        Ok(DirectiveBranch {
            kind,
            header,
            body,
            location: at,
            sequence: 0,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a template source file into its document tree.
pub fn parse_template(source: &str, file_path: &str) -> Result<Document, CompileError> {
    let tokens = tokenize(source);
    debug!("{}: {} tokens", file_path, tokens.len());
    Parser::new(tokens).parse_document()
}
