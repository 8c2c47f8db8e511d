use crate::language::{
    parser::ParseError,
    typecheck::{TypeError, TypeErrorKind},
};
use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct TypeDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

fn label_for(kind: &TypeErrorKind) -> &'static str {
    match kind {
        TypeErrorKind::UndeclaredType { .. } => "not declared",
        TypeErrorKind::ArityMismatch { .. } => "wrong number of generic arguments",
        TypeErrorKind::RecursiveType { .. } => "contains itself by value",
        TypeErrorKind::UnboundTypeVariable { .. } => "unbound type variable",
        TypeErrorKind::IncompleteType { .. } => "size depends on itself",
        TypeErrorKind::UnresolvedTypeVariable { .. } => "no binding in scope",
        TypeErrorKind::NoImplicitConversion { .. } => "cannot widen implicitly",
        TypeErrorKind::TypeMismatch { .. } => "mismatched type",
        TypeErrorKind::Backend { .. } => "rejected by the backend",
    }
}

impl TypeDiagnostic {
    pub fn from_type_error(src: NamedSource, err: &TypeError) -> Self {
        Self {
            src,
            span: err.span.into(),
            help: err.help.clone(),
            message: err.display_message(),
            label: label_for(&err.kind).to_string(),
        }
    }

    pub fn from_parse_error(src: NamedSource, err: &ParseError) -> Self {
        Self {
            src,
            span: err.span,
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label.clone(),
        }
    }
}

fn render(diagnostic: &TypeDiagnostic) -> String {
    let mut out = String::new();
    let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
    if handler.render_report(&mut out, diagnostic).is_err() {
        out = diagnostic.message.clone();
    }
    out
}

/// Renders each error against the source it was reported for, without color.
pub fn render_type_errors(name: &str, source: &str, errors: &[TypeError]) -> String {
    errors
        .iter()
        .map(|err| {
            let src = NamedSource::new(name, source.to_string());
            render(&TypeDiagnostic::from_type_error(src, err))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_parse_error(name: &str, source: &str, err: &ParseError) -> String {
    let src = NamedSource::new(name, source.to_string());
    render(&TypeDiagnostic::from_parse_error(src, err))
}

pub fn emit_type_errors(name: &str, source: &str, errors: &[TypeError]) {
    for err in errors {
        let src = NamedSource::new(name, source.to_string());
        let diagnostic = TypeDiagnostic::from_type_error(src, err);
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{parser::parse_type, span::Span};

    #[test]
    fn type_error_renders_code_label_and_help() {
        let source = "Node = (Node, i32)";
        let err = TypeError::new(TypeErrorKind::RecursiveType {
            name: "Node".into(),
        })
        .at(Span::new(8, 12))
        .with_help("refer to `Node` through a pointer");
        let text = render_type_errors("node.prime", source, &[err]);
        assert!(text.contains("[E0303] recursive type `Node`"), "{text}");
        assert!(text.contains("contains itself by value"), "{text}");
        assert!(text.contains("through a pointer"), "{text}");
        assert!(text.contains("node.prime"), "{text}");
    }

    #[test]
    fn parse_error_renders_position() {
        let source = "[4 i32";
        let err = parse_type(source).expect_err("unterminated");
        let text = render_parse_error("inline", source, &err);
        assert!(text.contains("invalid type notation"), "{text}");
    }

    #[test]
    fn batches_render_every_error() {
        let errors = vec![
            TypeError::new(TypeErrorKind::UndeclaredType { name: "A".into() }),
            TypeError::new(TypeErrorKind::UndeclaredType { name: "B".into() }),
        ];
        let text = render_type_errors("batch", "A B", &errors);
        assert!(text.contains("`A`") && text.contains("`B`"), "{text}");
    }
}
