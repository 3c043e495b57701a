#[cfg(test)]
mod tests {
    use crate::analyze::*;
    use crate::component::{ComponentRegistry, TargetType};
    use crate::options::CompileOptions;
    use crate::parse::parse_template;
    use crate::validate::*;

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register("Widget", "Widget", &["w"]).unwrap();
        registry.freeze();
        registry
    }

    fn analyzed(source: &str) -> (Document, Analysis) {
        let mut doc = parse_template(source, "Test.razor").unwrap();
        let analysis = analyze(&mut doc, &registry(), &CompileOptions::default()).unwrap();
        (doc, analysis)
    }

    fn attribute(name: &str, value: AttributeValue) -> AttributeIR {
        AttributeIR::new(name, value, SourceLocation::new(1, 1))
    }

    fn sequences(nodes: &[TemplateNode], out: &mut Vec<u32>) {
        for node in nodes {
            match node {
                TemplateNode::Element(el) => {
                    out.push(el.sequence);
                    sequences(&el.children, out);
                }
                TemplateNode::Text(t) => out.push(t.sequence),
                TemplateNode::Expression(e) => out.push(e.sequence),
                TemplateNode::Directive(d) => {
                    for branch in &d.branches {
                        out.push(branch.sequence);
                        sequences(&branch.body, out);
                    }
                }
            }
        }
    }

    #[test]
    fn test_sequence_numbers_are_preorder_from_zero() {
        let (doc, analysis) = analyzed(
            "<div class=\"x\">Hello @Name</div>\n@if (a) { <p>A</p> } else { <p>B</p> }",
        );
        let mut seen = Vec::new();
        sequences(&doc.nodes, &mut seen);
        assert_eq!(seen, (0..9).collect::<Vec<u32>>());
        assert_eq!(analysis.sequence_count, 9);
        assert!(validate_sequence_numbers(&doc).is_ok());
    }

    #[test]
    fn test_numbering_is_deterministic() {
        let source = "<ul>@foreach (var i in Items) { <li>@i</li> }</ul>";
        let (first, _) = analyzed(source);
        let (second, _) = analyzed(source);
        assert_eq!(first, second);
    }

    #[test]
    fn test_targets_are_resolved() {
        let (doc, _) = analyzed("<div><Widget /><w /><ghost></ghost><text>t</text></div>");
        let TemplateNode::Element(div) = &doc.nodes[0] else {
            panic!("expected element");
        };
        let targets: Vec<&TargetType> = div
            .children
            .iter()
            .map(|n| match n {
                TemplateNode::Element(el) => &el.target,
                _ => panic!("expected element"),
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                &TargetType::Component("Widget".to_string()),
                &TargetType::Component("Widget".to_string()),
                &TargetType::Element,
                &TargetType::Transparent,
            ]
        );
    }

    #[test]
    fn test_classify_event_handler() {
        let prefixes = vec!["on".to_string()];
        let mut attr = attribute("onclick", AttributeValue::Expression("Save".to_string()));
        classify_attribute(&mut attr, &prefixes);
        assert_eq!(attr.kind, AttributeValueKind::EventHandler);
        assert!(!attr.handler_candidate);

        let mut attr = attribute("@onchange", AttributeValue::Literal("x".to_string()));
        classify_attribute(&mut attr, &prefixes);
        assert_eq!(attr.kind, AttributeValueKind::EventHandler);

        // `onClick` does not match the lowercase rule.
        let mut attr = attribute("onClick", AttributeValue::Literal("x".to_string()));
        classify_attribute(&mut attr, &prefixes);
        assert_eq!(attr.kind, AttributeValueKind::Literal);
    }

    #[test]
    fn test_classify_values() {
        let prefixes = vec!["on".to_string()];

        let mut attr = attribute("class", AttributeValue::Literal("x".to_string()));
        classify_attribute(&mut attr, &prefixes);
        assert_eq!(attr.kind, AttributeValueKind::Literal);

        let mut attr = attribute(
            "Changed",
            AttributeValue::Expression("model.OnChanged".to_string()),
        );
        classify_attribute(&mut attr, &prefixes);
        assert_eq!(attr.kind, AttributeValueKind::BoundExpression);
        assert!(attr.handler_candidate);

        let mut attr = attribute("title", AttributeValue::Expression("Format(x)".to_string()));
        classify_attribute(&mut attr, &prefixes);
        assert_eq!(attr.kind, AttributeValueKind::BoundExpression);
        assert!(!attr.handler_candidate);

        let mut attr = attribute("disabled", AttributeValue::Expression("true".to_string()));
        classify_attribute(&mut attr, &prefixes);
        assert!(!attr.handler_candidate);
    }

    #[test]
    fn test_custom_event_prefix() {
        let prefixes = vec!["on".to_string(), "x".to_string()];
        assert!(is_event_attribute("xtap", &prefixes));
        assert!(!is_event_attribute("on", &prefixes));
        assert!(!is_event_attribute("on-click", &prefixes));
    }

    #[test]
    fn test_event_handler_on_component_is_rejected() {
        let mut doc = parse_template("<p>ok</p>\n<Widget onclick=@Go />", "Test.razor").unwrap();
        let errors = analyze(&mut doc, &registry(), &CompileOptions::default()).unwrap_err();
        assert_eq!(
            errors,
            vec![CompileError::EventHandlerAttributeOnNonElement {
                attribute: "onclick".to_string(),
                tag: "Widget".to_string(),
                at: SourceLocation::new(2, 9),
            }]
        );
    }

    #[test]
    fn test_plain_attribute_on_text_is_rejected() {
        let mut doc = parse_template("<text class=\"note\">hi</text>", "Test.razor").unwrap();
        let errors = analyze(&mut doc, &registry(), &CompileOptions::default()).unwrap_err();
        assert_eq!(
            errors,
            vec![CompileError::AttributeOnTextElement {
                attribute: "class".to_string(),
                at: SourceLocation::new(1, 7),
            }]
        );
        assert_eq!(errors[0].kind().code(), ERR_ATTRIBUTE_ON_TEXT);
    }

    #[test]
    fn test_stylesheet_attribute() {
        let (_, analysis) = analyzed(
            "@attribute [StyleSheet(\"a.css\", \"b.css\")]\n@attribute [Authorize]\n<p/>",
        );
        assert_eq!(analysis.stylesheets, vec!["a.css", "b.css"]);
        assert_eq!(analysis.class_attributes, vec!["[Authorize]"]);
    }

    #[test]
    fn test_empty_stylesheet_path() {
        let mut doc =
            parse_template("@attribute [StyleSheet(\"\")]\n<p/>", "Test.razor").unwrap();
        let errors = analyze(&mut doc, &registry(), &CompileOptions::default()).unwrap_err();
        assert_eq!(errors[0].kind(), ErrorKind::StyleSheetPathEmpty);
        assert_eq!(errors[0].location().line, 1);
    }

    #[test]
    fn test_strict_mode_reports_every_error() {
        let source = "@attribute [StyleSheet()]\n<Widget onclick=@A />\n<text onkeyup=@B>x</text>";
        let mut doc = parse_template(source, "Test.razor").unwrap();
        let lenient =
            analyze(&mut doc.clone(), &registry(), &CompileOptions::default()).unwrap_err();
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient[0].kind(), ErrorKind::StyleSheetPathEmpty);

        let strict = CompileOptions {
            strict: true,
            ..Default::default()
        };
        let errors = analyze(&mut doc, &registry(), &strict).unwrap_err();
        let lines: Vec<u32> = errors.iter().map(|e| e.location().line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }
}
