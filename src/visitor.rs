use crate::validate::{
    ControlDirectiveNode, DirectiveBranch, Document, ElementNode, ExpressionNode, TemplateNode,
    TextNode,
};

/// The TemplateVisitor trait is the single traversal mechanism for template trees.
///
/// Rules:
/// 1. Traversal is depth-first pre-order; a node is visited before its children.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call the matching `walk_*` function to continue traversal
///    unless pruning is intended.
pub trait TemplateVisitor {
    fn visit_document(&mut self, document: &mut Document) {
        walk_document(self, document);
    }

    fn visit_node(&mut self, node: &mut TemplateNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &mut TextNode) {
        // Leaf node
    }

    fn visit_expression(&mut self, _expression: &mut ExpressionNode) {
        // Leaf node
    }

    fn visit_directive(&mut self, directive: &mut ControlDirectiveNode) {
        walk_directive(self, directive);
    }

    fn visit_branch(&mut self, branch: &mut DirectiveBranch) {
        walk_branch(self, branch);
    }

    fn visit_children(&mut self, children: &mut Vec<TemplateNode>) {
        walk_children(self, children);
    }
}

pub fn walk_document<V: TemplateVisitor + ?Sized>(visitor: &mut V, document: &mut Document) {
    visitor.visit_children(&mut document.nodes);
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    children: &mut Vec<TemplateNode>,
) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &mut TemplateNode) {
    match node {
        TemplateNode::Element(el) => visitor.visit_element(el),
        TemplateNode::Text(t) => visitor.visit_text(t),
        TemplateNode::Expression(e) => visitor.visit_expression(e),
        TemplateNode::Directive(d) => visitor.visit_directive(d),
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &mut ElementNode) {
    visitor.visit_children(&mut element.children);
}

pub fn walk_directive<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    directive: &mut ControlDirectiveNode,
) {
    for branch in &mut directive.branches {
        visitor.visit_branch(branch);
    }
}

pub fn walk_branch<V: TemplateVisitor + ?Sized>(visitor: &mut V, branch: &mut DirectiveBranch) {
    visitor.visit_children(&mut branch.body);
}
