//! Codegen module for the template compiler
//!
//! Emits one host-language source module per template: a partial class whose
//! `BuildRenderTree` routine replays the template as render-tree calls. The
//! numbering from analysis is used verbatim, so loop bodies reuse the same
//! sequence numbers on every iteration.

use serde::{Deserialize, Serialize};

use crate::analyze::Analysis;
use crate::component::TargetType;
use crate::options::CompileOptions;
use crate::validate::{
    validate_sequence_numbers, AttributeIR, AttributeValue, AttributeValueKind, CompileError,
    ControlDirectiveNode, DirectiveKind, Document, ElementNode, MetadataKind, SourceLocation,
    TemplateNode, ValuePart,
};

// ═══════════════════════════════════════════════════════════════════════════════
// INPUT/OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

pub struct CodegenInput<'a> {
    /// Path as written into `#line` directives and the header.
    pub file_path: &'a str,
    pub type_name: &'a str,
    /// Namespace used when the file has no `@namespace`.
    pub namespace: &'a str,
    pub fingerprint: &'a str,
    pub document: &'a Document,
    pub analysis: &'a Analysis,
    pub options: &'a CompileOptions,
}

/// One generated line that came from a template location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapping {
    pub generated_line: u32,
    pub source_line: u32,
    pub source_column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub source: String,
    pub source_map: Vec<SourceMapping>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODE WRITER
// ═══════════════════════════════════════════════════════════════════════════════

struct CodeWriter<'a> {
    out: String,
    indent: usize,
    /// 1-based number of the next line to be written.
    next_line: u32,
    mappings: Vec<SourceMapping>,
    file_path: &'a str,
    line_directives: bool,
}

impl<'a> CodeWriter<'a> {
    fn new(file_path: &'a str, line_directives: bool) -> Self {
        Self {
            out: String::new(),
            indent: 0,
            next_line: 1,
            mappings: Vec::new(),
            file_path,
            line_directives,
        }
    }

    fn raw(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
        self.next_line += 1;
    }

    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.raw("");
            return;
        }
        let indented = format!("{}{}", "    ".repeat(self.indent), text);
        self.raw(&indented);
    }

    fn blank(&mut self) {
        self.raw("");
    }

    /// Write `text` (possibly several lines) attributed to `at`.
    fn mapped(&mut self, at: SourceLocation, text: &str) {
        if self.line_directives {
            let directive = format!("#line {} \"{}\"", at.line, escape_path(self.file_path));
            self.raw(&directive);
        }
        self.mappings.push(SourceMapping {
            generated_line: self.next_line,
            source_line: at.line,
            source_column: at.column,
        });
        for line in text.lines() {
            self.line(line);
        }
    }

    /// Host code copied through with its own indentation.
    fn verbatim(&mut self, at: SourceLocation, text: &str) {
        if self.line_directives {
            let directive = format!("#line {} \"{}\"", at.line, escape_path(self.file_path));
            self.raw(&directive);
        }
        self.mappings.push(SourceMapping {
            generated_line: self.next_line,
            source_line: at.line,
            source_column: at.column,
        });
        for line in text.lines() {
            self.raw(line);
        }
    }

    fn end_mapping(&mut self) {
        if self.line_directives {
            self.raw("#line default");
        }
    }

    fn open(&mut self, header: &str) {
        self.line(header);
        self.line("{");
        self.indent += 1;
    }

    fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line("}");
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRING HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Quote `s` as a regular string literal.
pub fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `$"..."` from literal and expression parts.
fn interpolated_literal(parts: &[ValuePart]) -> String {
    let mut out = String::from("$\"");
    for part in parts {
        match part {
            ValuePart::Literal(text) => {
                let escaped = string_literal(text);
                let inner = &escaped[1..escaped.len() - 1];
                out.push_str(&inner.replace('{', "{{").replace('}', "}}"));
            }
            ValuePart::Expression(code) => {
                out.push_str("{(");
                out.push_str(code);
                out.push_str(")}");
            }
        }
    }
    out.push('"');
    out
}

fn escape_path(path: &str) -> String {
    path.replace('\\', "/").replace('"', "\\\"")
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER TREE EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

struct RenderEmitter<'w, 'a> {
    writer: &'w mut CodeWriter<'a>,
    builder: &'a str,
    /// Open element/component calls not yet closed.
    depth: i64,
    /// Set when a close would go below zero.
    underflow: bool,
}

impl RenderEmitter<'_, '_> {
    fn call(&mut self, at: SourceLocation, call: &str) {
        let statement = format!("{}.{};", self.builder, call);
        self.writer.mapped(at, &statement);
    }

    fn close_element(&mut self, at: SourceLocation) {
        self.depth -= 1;
        if self.depth < 0 {
            self.underflow = true;
        }
        self.call(at, "CloseElement()");
    }

    fn emit_nodes(&mut self, nodes: &[TemplateNode]) {
        for node in nodes {
            self.emit_node(node);
        }
    }

    fn emit_node(&mut self, node: &TemplateNode) {
        match node {
            TemplateNode::Element(el) => self.emit_element(el),
            TemplateNode::Text(t) => {
                let call = format!("AddText({}, {})", t.sequence, string_literal(&t.value));
                self.call(t.location, &call);
            }
            TemplateNode::Expression(e) => {
                let call = format!("AddText({}, {})", e.sequence, e.expression);
                self.call(e.location, &call);
            }
            TemplateNode::Directive(d) => self.emit_directive(d),
        }
    }

    fn emit_element(&mut self, el: &ElementNode) {
        match &el.target {
            TargetType::Transparent => {
                self.emit_nodes(&el.children);
                return;
            }
            TargetType::Element => {
                let call = format!("OpenElement({}, {})", el.sequence, string_literal(&el.tag));
                self.call(el.location, &call);
            }
            TargetType::Component(type_name) => {
                let call = format!("OpenComponent<{}>({})", type_name, el.sequence);
                self.call(el.location, &call);
            }
        }
        self.depth += 1;

        for (index, attr) in el.attributes.iter().enumerate() {
            self.emit_attribute(el.sequence, index, attr);
        }
        self.emit_nodes(&el.children);
        self.close_element(el.location);
    }

    fn emit_attribute(&mut self, sequence: u32, index: usize, attr: &AttributeIR) {
        let name = string_literal(attr.runtime_name());

        let value = match &attr.value {
            AttributeValue::Absent => "true".to_string(),
            AttributeValue::Literal(text) if attr.kind == AttributeValueKind::EventHandler => {
                text.clone()
            }
            AttributeValue::Literal(text) => string_literal(text),
            AttributeValue::Expression(code) => code.clone(),
            AttributeValue::Interpolated(parts) => interpolated_literal(parts),
        };

        let event = attr.kind == AttributeValueKind::EventHandler
            && !matches!(attr.value, AttributeValue::Absent);

        if event {
            let call = format!("SetEventHandler({}, {}, {})", sequence, name, value);
            self.call(attr.location, &call);
        } else if attr.handler_candidate {
            // Only the host compiler knows whether the reference is a delegate.
            let var = format!("__handler{}_{}", sequence, index);
            let test = format!("(object)({}) is global::System.Delegate {}", value, var);
            let statement = format!(
                "if ({test}) {b}.SetEventHandler({seq}, {name}, {var}); \
                 else {b}.SetAttribute({seq}, {name}, {value});",
                test = test,
                value = value,
                var = var,
                b = self.builder,
                seq = sequence,
                name = name,
            );
            self.writer.mapped(attr.location, &statement);
        } else {
            let call = format!("SetAttribute({}, {}, {})", sequence, name, value);
            self.call(attr.location, &call);
        }
    }

    fn emit_directive(&mut self, directive: &ControlDirectiveNode) {
        for branch in &directive.branches {
            let header = match branch.kind {
                DirectiveKind::If => format!("if ({})", branch.header),
                DirectiveKind::ElseIf => format!("else if ({})", branch.header),
                DirectiveKind::Else => "else".to_string(),
                DirectiveKind::ForEach => format!("foreach ({})", branch.header),
                DirectiveKind::For => format!("for ({})", branch.header),
                DirectiveKind::While => format!("while ({})", branch.header),
                DirectiveKind::CodeBlock => {
                    // Statements share the scope of the enclosing routine.
                    if !branch.header.is_empty() {
                        self.writer.mapped(branch.location, &branch.header);
                    }
                    self.emit_nodes(&branch.body);
                    continue;
                }
            };
            self.writer.mapped(branch.location, &header);
            self.writer.line("{");
            self.writer.indent += 1;
            self.emit_nodes(&branch.body);
            self.writer.indent = self.writer.indent.saturating_sub(1);
            self.writer.line("}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

fn page_route(value: &str) -> String {
    if value.starts_with('"') {
        value.to_string()
    } else {
        string_literal(value)
    }
}

/// Generate the source module for one analyzed template.
pub fn generate(input: &CodegenInput) -> Result<GeneratedCode, CompileError> {
    let document = input.document;
    let options = input.options;
    validate_sequence_numbers(document)?;

    let mut w = CodeWriter::new(input.file_path, options.emit_line_directives);

    w.line("// <auto-generated>");
    w.line(&format!("//     Generated from {}", input.file_path));
    w.line(&format!("//     Source fingerprint: {}", input.fingerprint));
    w.line("// </auto-generated>");
    w.line("#pragma warning disable 1591");

    let namespace = document
        .last_metadata(MetadataKind::Namespace)
        .map_or(input.namespace, |m| m.value.as_str());
    w.open(&format!("namespace {}", namespace));

    for using in &options.default_usings {
        w.line(&format!("using {};", using));
    }
    let mut file_usings = document.metadata_of(MetadataKind::Using).peekable();
    if file_usings.peek().is_some() {
        for using in file_usings {
            w.mapped(using.location, &format!("using {};", using.value));
        }
        w.end_mapping();
    }
    w.blank();

    let mut pages = document.metadata_of(MetadataKind::Page).peekable();
    if pages.peek().is_some() {
        for page in pages {
            w.mapped(page.location, &format!("[Route({})]", page_route(&page.value)));
        }
        w.end_mapping();
    }
    for attribute in &input.analysis.class_attributes {
        let text = if attribute.starts_with('[') {
            attribute.clone()
        } else {
            format!("[{}]", attribute)
        };
        w.line(&text);
    }

    let base = document
        .last_metadata(MetadataKind::Inherits)
        .map_or(options.default_base_type.as_str(), |m| m.value.as_str());
    let mut supertypes = vec![base.to_string()];
    supertypes.extend(
        document
            .metadata_of(MetadataKind::Implements)
            .map(|m| m.value.clone()),
    );
    w.open(&format!(
        "public partial class {} : {}",
        input.type_name,
        supertypes.join(", ")
    ));

    if !input.analysis.stylesheets.is_empty() {
        w.open(&format!("public {}()", input.type_name));
        for path in &input.analysis.stylesheets {
            w.line(&format!(
                "{}({});",
                options.stylesheet_attach_method,
                string_literal(path)
            ));
        }
        w.close();
        w.blank();
    }

    w.open(&format!(
        "protected override void BuildRenderTree({} {})",
        options.builder_type, options.builder_name
    ));
    let (depth, underflow) = {
        let mut emitter = RenderEmitter {
            writer: &mut w,
            builder: options.builder_name.as_str(),
            depth: 0,
            underflow: false,
        };
        emitter.emit_nodes(&document.nodes);
        (emitter.depth, emitter.underflow)
    };
    w.end_mapping();
    w.close();

    if underflow || depth != 0 {
        return Err(CompileError::UnbalancedOutput {
            detail: format!("{} element(s) left open", depth),
        });
    }

    if let Some(code) = &document.code {
        w.blank();
        w.verbatim(code.body_location, &code.raw);
        w.end_mapping();
    }

    w.close();
    w.close();

    Ok(GeneratedCode {
        source: w.out,
        source_map: w.mappings,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
