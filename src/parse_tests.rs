#[cfg(test)]
mod tests {
    use crate::parse::parse_template;
    use crate::validate::*;

    fn parse(source: &str) -> Document {
        parse_template(source, "Test.razor").unwrap()
    }

    fn parse_err(source: &str) -> CompileError {
        parse_template(source, "Test.razor").unwrap_err()
    }

    fn element(node: &TemplateNode) -> &ElementNode {
        match node {
            TemplateNode::Element(el) => el,
            other => panic!("expected element, got {:?}", other),
        }
    }

    fn directive(node: &TemplateNode) -> &ControlDirectiveNode {
        match node {
            TemplateNode::Directive(d) => d,
            other => panic!("expected directive, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_elements() {
        let doc = parse("<div class=\"x\">Hello @Name<br></div>");
        assert_eq!(doc.nodes.len(), 1);
        let div = element(&doc.nodes[0]);
        assert_eq!(div.tag, "div");
        assert_eq!(
            div.attributes[0].value,
            AttributeValue::Literal("x".to_string())
        );
        assert_eq!(div.children.len(), 3);
        assert!(matches!(&div.children[0], TemplateNode::Text(t) if t.value == "Hello "));
        assert!(matches!(&div.children[1], TemplateNode::Expression(e) if e.expression == "Name"));
        let br = element(&div.children[2]);
        assert!(br.self_closing);
    }

    #[test]
    fn test_attribute_value_shapes() {
        let doc = parse("<a href=@Url title=\"a @B c\" hidden></a>");
        let a = element(&doc.nodes[0]);
        let values: Vec<&AttributeValue> = a.attributes.iter().map(|attr| &attr.value).collect();
        assert_eq!(
            values,
            vec![
                &AttributeValue::Expression("Url".to_string()),
                &AttributeValue::Interpolated(vec![
                    ValuePart::Literal("a ".to_string()),
                    ValuePart::Expression("B".to_string()),
                    ValuePart::Literal(" c".to_string()),
                ]),
                &AttributeValue::Absent,
            ]
        );
    }

    #[test]
    fn test_if_chain_is_one_directive() {
        let source = "@if (a) {\n  <p>A</p>\n} else if (b) {\n  <p>B</p>\n} else {\n  <p>C</p>\n}";
        let doc = parse(source);
        assert_eq!(doc.nodes.len(), 1);
        let chain = directive(&doc.nodes[0]);
        let kinds: Vec<DirectiveKind> = chain.branches.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![DirectiveKind::If, DirectiveKind::ElseIf, DirectiveKind::Else]
        );
        assert_eq!(chain.branches[1].header, "b");
        // Blank text around the body markup is dropped.
        assert_eq!(chain.branches[0].body.len(), 1);
    }

    #[test]
    fn test_at_else_continues_chain_across_whitespace() {
        let doc = parse("<div>@if (a) { <b>x</b> }\n    @else { <i>y</i> }</div>");
        let div = element(&doc.nodes[0]);
        assert_eq!(div.children.len(), 1);
        assert_eq!(directive(&div.children[0]).branches.len(), 2);
    }

    #[test]
    fn test_foreach_header_is_verbatim() {
        let doc =
            parse("<ul>@foreach (var item in Items.Where(i => i.Visible)) { <li>@item</li> }</ul>");
        let ul = element(&doc.nodes[0]);
        let each = directive(&ul.children[0]);
        assert_eq!(each.kind, DirectiveKind::ForEach);
        assert_eq!(each.branches[0].header, "var item in Items.Where(i => i.Visible)");
        assert_eq!(each.branches[0].body.len(), 1);
    }

    #[test]
    fn test_metadata_and_code_block() {
        let source = concat!(
            "@using System.Linq\n",
            "@inherits LayoutBase\n",
            "<p>x</p>\n",
            "@code {\n    int count;\n}\n",
        );
        let doc = parse(source);
        assert_eq!(doc.metadata.len(), 2);
        assert_eq!(
            doc.last_metadata(MetadataKind::Inherits).map(|m| m.value.as_str()),
            Some("LayoutBase")
        );
        assert_eq!(doc.code.as_ref().map(|c| c.raw.as_str()), Some("    int count;"));
        assert_eq!(doc.nodes.len(), 1);
    }

    #[test]
    fn test_inline_code_block_in_body() {
        let doc = parse("@foreach (var x in Xs) { var y = x * 2; <p>@y</p> }");
        let body = &directive(&doc.nodes[0]).branches[0].body;
        let code = directive(&body[0]);
        assert_eq!(code.kind, DirectiveKind::CodeBlock);
        assert_eq!(code.branches[0].header, "var y = x * 2;");
    }

    #[test]
    fn test_markup_in_code_block_becomes_nodes() {
        let doc = parse("@{ var x = 1; <p>@x</p> }");
        assert_eq!(doc.nodes.len(), 1);
        let block = directive(&doc.nodes[0]);
        assert_eq!(block.kind, DirectiveKind::CodeBlock);
        let branch = &block.branches[0];
        assert!(branch.header.is_empty());
        assert_eq!(branch.body.len(), 2);
        assert_eq!(directive(&branch.body[0]).branches[0].header, "var x = 1;");
        assert_eq!(element(&branch.body[1]).tag, "p");
    }

    #[test]
    fn test_unclosed_code_block() {
        let err = parse_err("@{ var x = 1;");
        assert_eq!(err.kind(), ErrorKind::MalformedDirective);
        assert_eq!(err.location(), SourceLocation::new(1, 1));
    }

    #[test]
    fn test_code_body_location_is_first_member() {
        let doc = parse("<p/>\n@code {\n\n    int count;\n}");
        let code = doc.code.unwrap();
        assert_eq!(code.location, SourceLocation::new(2, 1));
        assert_eq!(code.body_location, SourceLocation::new(4, 5));
    }

    #[test]
    fn test_mismatched_close_names_both_tags() {
        let err = parse_err("<div>\n<p>\n</div>");
        assert_eq!(
            err,
            CompileError::UnbalancedMarkup {
                open: "p".to_string(),
                open_line: 2,
                close: "div".to_string(),
                close_line: 3,
                at: SourceLocation::new(3, 1),
            }
        );
    }

    #[test]
    fn test_unclosed_element_at_end_of_input() {
        let err = parse_err("<section><p>x</p>");
        assert_eq!(err.kind(), ErrorKind::UnbalancedMarkup);
        assert!(err.to_string().contains("section"));
    }

    #[test]
    fn test_duplicate_code_block_names_both_lines() {
        let err = parse_err("@code { int a; }\n<p/>\n@code { int b; }");
        assert_eq!(
            err,
            CompileError::DuplicateCodeBlock {
                first_line: 1,
                second_line: 3,
                at: SourceLocation::new(3, 1),
            }
        );
    }

    #[test]
    fn test_malformed_directives() {
        for source in [
            "@if { <p/> }",
            "@foreach (var x in Xs) <p/>",
            "<p>@else { x }</p>",
            "@inherits\n<p/>",
            "@if (a) { <p/>",
        ] {
            let err = parse_err(source);
            assert_eq!(err.kind(), ErrorKind::MalformedDirective, "source: {}", source);
        }
    }

    #[test]
    fn test_unknown_directive() {
        let err = parse_err("@model Person\n<p/>");
        assert_eq!(
            err,
            CompileError::UnknownDirective {
                name: "model".to_string(),
                at: SourceLocation::new(1, 1),
            }
        );
    }

    #[test]
    fn test_lexer_errors_surface_with_location() {
        let err = parse_err("<p>\n  @(Compute(1)</p>");
        assert_eq!(err.kind(), ErrorKind::UnterminatedExpression);
        assert_eq!(err.location(), SourceLocation::new(2, 3));

        let err = parse_err("<img src=\"a.png\"");
        assert_eq!(
            err,
            CompileError::UnterminatedTag {
                tag: "img".to_string(),
                at: SourceLocation::new(1, 1),
            }
        );
    }

    #[test]
    fn test_text_wrapper_is_parsed_as_element() {
        let doc = parse("@if (a) { <text>plain @b</text> }");
        let body = &directive(&doc.nodes[0]).branches[0].body;
        let text = element(&body[0]);
        assert_eq!(text.tag, "text");
        assert_eq!(text.children.len(), 2);
    }
}
