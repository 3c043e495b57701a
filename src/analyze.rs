//! Semantic Analysis Module for the template compiler
//!
//! Numbers every node, resolves element targets against the component
//! registry, classifies attributes, and collects stylesheet paths from
//! `@attribute [StyleSheet(...)]` directives.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::component::{ComponentRegistry, TargetType};
use crate::options::CompileOptions;
use crate::validate::{
    AttributeIR, AttributeValue, AttributeValueKind, CompileError, DirectiveBranch, Document,
    ElementNode, ExpressionNode, MetadataKind, SourceLocation, TextNode,
};
use crate::visitor::{walk_branch, walk_element, TemplateVisitor};

lazy_static! {
    /// `Name` or `a.b.Name`, with no call or indexer.
    static ref BARE_REFERENCE_RE: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap();
    static ref STYLESHEET_RE: Regex = Regex::new(r"StyleSheet\s*\(([^)]*)\)").unwrap();
    static ref STRING_LITERAL_RE: Regex = Regex::new(r#""([^"]*)""#).unwrap();
}

/// Keywords that look like bare references but are never callables.
const VALUE_KEYWORDS: &[&str] = &["true", "false", "null", "this", "default"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Stylesheet paths in directive order.
    pub stylesheets: Vec<String>,
    /// `@attribute` values that are not stylesheet declarations; emitted on the class.
    pub class_attributes: Vec<String>,
    /// Number of sequence numbers handed out.
    pub sequence_count: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// `on` + lowercase letters (or `@on...`), for each configured prefix.
pub fn is_event_attribute(name: &str, event_prefixes: &[String]) -> bool {
    let name = name.trim_start_matches('@');
    event_prefixes.iter().any(|prefix| {
        name.len() > prefix.len()
            && name.starts_with(prefix.as_str())
            && name[prefix.len()..].chars().all(|c| c.is_ascii_lowercase())
    })
}

pub fn is_bare_reference(code: &str) -> bool {
    let code = code.trim();
    BARE_REFERENCE_RE.is_match(code) && !VALUE_KEYWORDS.contains(&code)
}

/// Decide how an attribute's value reaches the runtime.
pub fn classify_attribute(attribute: &mut AttributeIR, event_prefixes: &[String]) {
    attribute.handler_candidate = false;

    if is_event_attribute(&attribute.name, event_prefixes) {
        attribute.kind = AttributeValueKind::EventHandler;
        return;
    }

    attribute.kind = match &attribute.value {
        AttributeValue::Absent | AttributeValue::Literal(_) => AttributeValueKind::Literal,
        AttributeValue::Expression(_) => {
            attribute.handler_candidate = is_bare_reference(&attribute.raw_value());
            AttributeValueKind::BoundExpression
        }
        AttributeValue::Interpolated(_) => AttributeValueKind::BoundExpression,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLESHEETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Paths declared by `StyleSheet(...)` in an `@attribute` value, or `None`
/// when the value declares something else.
pub fn parse_stylesheet_attribute(
    value: &str,
    at: SourceLocation,
) -> Option<Result<Vec<String>, CompileError>> {
    let caps = STYLESHEET_RE.captures(value)?;
    let args = caps.get(1).map_or("", |m| m.as_str());
    let paths: Vec<String> = STRING_LITERAL_RE
        .captures_iter(args)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .collect();
    if paths.is_empty() || paths.iter().any(|p| p.is_empty()) {
        return Some(Err(CompileError::StyleSheetPathEmpty { at }));
    }
    Some(Ok(paths))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYZER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SemanticAnalyzer<'a> {
    registry: &'a ComponentRegistry,
    options: &'a CompileOptions,
    next_sequence: u32,
    errors: Vec<CompileError>,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(registry: &'a ComponentRegistry, options: &'a CompileOptions) -> Self {
        Self {
            registry,
            options,
            next_sequence: 0,
            errors: Vec::new(),
        }
    }

    fn allocate(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

impl TemplateVisitor for SemanticAnalyzer<'_> {
    fn visit_element(&mut self, element: &mut ElementNode) {
        element.sequence = self.allocate();
        element.target = self.registry.resolve(&element.tag);

        for attribute in &mut element.attributes {
            classify_attribute(attribute, &self.options.event_prefixes);
            if attribute.kind == AttributeValueKind::EventHandler && !element.target.is_element() {
                self.errors.push(CompileError::EventHandlerAttributeOnNonElement {
                    attribute: attribute.name.clone(),
                    tag: element.tag.clone(),
                    at: attribute.location,
                });
            } else if element.target == TargetType::Transparent {
                self.errors.push(CompileError::AttributeOnTextElement {
                    attribute: attribute.name.clone(),
                    at: attribute.location,
                });
            }
        }

        walk_element(self, element);
    }

    fn visit_text(&mut self, text: &mut TextNode) {
        text.sequence = self.allocate();
    }

    fn visit_expression(&mut self, expression: &mut ExpressionNode) {
        expression.sequence = self.allocate();
    }

    fn visit_branch(&mut self, branch: &mut DirectiveBranch) {
        branch.sequence = self.allocate();
        walk_branch(self, branch);
    }
}

/// Analyze a parsed document in place.
///
/// On failure returns the errors in source order: only the first unless
/// `options.strict` is set.
pub fn analyze(
    document: &mut Document,
    registry: &ComponentRegistry,
    options: &CompileOptions,
) -> Result<Analysis, Vec<CompileError>> {
    let mut analysis = Analysis::default();
    let mut errors = Vec::new();

    for directive in document.metadata_of(MetadataKind::Attribute) {
        match parse_stylesheet_attribute(&directive.value, directive.location) {
            Some(Ok(paths)) => analysis.stylesheets.extend(paths),
            Some(Err(err)) => errors.push(err),
            None => analysis.class_attributes.push(directive.value.clone()),
        }
    }

    let mut analyzer = SemanticAnalyzer::new(registry, options);
    analyzer.visit_document(document);
    errors.append(&mut analyzer.errors);
    analysis.sequence_count = analyzer.next_sequence;

    if !errors.is_empty() {
        errors.sort_by_key(|e| {
            let at = e.location();
            (at.line, at.column)
        });
        if !options.strict {
            errors.truncate(1);
        }
        return Err(errors);
    }

    debug!(
        "analysis: {} sequence numbers, {} stylesheets",
        analysis.sequence_count,
        analysis.stylesheets.len()
    );
    Ok(analysis)
}
