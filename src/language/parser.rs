use crate::language::{
    decls::DataTypeDecl,
    span::Span,
    types::{CharWidth, FloatWidth, IntWidth, TypeDescriptor, TypeKind},
};
use miette::{Diagnostic, SourceSpan};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{map_res, opt, recognize},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(prime::types::syntax))]
pub struct ParseError {
    pub message: String,
    pub label: String,
    #[label("{label}")]
    pub span: SourceSpan,
    #[help]
    pub help: Option<String>,
}

/// Parses type notation such as `List<i32>`, `([4 u8], 'a*)->bool`.
pub fn parse_type(source: &str) -> Result<TypeDescriptor, ParseError> {
    let parser = TypeParser { source };
    let (rest, ty) = parser
        .ty(source)
        .map_err(|err| parser.error(err, "expected a type"))?;
    parser.finish(rest)?;
    Ok(ty)
}

/// Parses a data type declaration: `Pair<'a, 'b> = ('a, 'b)` declares a
/// record, `Maybe<'t> = | 't | void` a tagged union.
pub fn parse_declaration(source: &str) -> Result<DataTypeDecl, ParseError> {
    let parser = TypeParser { source };
    let (rest, decl) = parser
        .declaration(source)
        .map_err(|err| parser.error(err, "expected a declaration"))?;
    parser.finish(rest)?;
    Ok(decl)
}

fn token<'a>(text: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(multispace0, tag(text))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn type_var_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('\''), identifier))(input)
}

fn primitive(name: &str) -> Option<TypeKind> {
    let int = |width, signed| Some(TypeKind::Int { width, signed });
    match name {
        "i8" => int(IntWidth::W8, true),
        "i16" => int(IntWidth::W16, true),
        "i32" => int(IntWidth::W32, true),
        "i64" => int(IntWidth::W64, true),
        "isz" => int(IntWidth::Size, true),
        "u8" => int(IntWidth::W8, false),
        "u16" => int(IntWidth::W16, false),
        "u32" => int(IntWidth::W32, false),
        "u64" => int(IntWidth::W64, false),
        "usz" => int(IntWidth::Size, false),
        "f16" => Some(TypeKind::Float(FloatWidth::W16)),
        "f32" => Some(TypeKind::Float(FloatWidth::W32)),
        "f64" => Some(TypeKind::Float(FloatWidth::W64)),
        "c8" => Some(TypeKind::Char(CharWidth::W8)),
        "c32" => Some(TypeKind::Char(CharWidth::W32)),
        "bool" => Some(TypeKind::Bool),
        "void" => Some(TypeKind::Void),
        "type" => Some(TypeKind::TypeValue),
        _ => None,
    }
}

struct TypeParser<'a> {
    source: &'a str,
}

impl<'a> TypeParser<'a> {
    fn offset(&self, rest: &str) -> usize {
        self.source.len().saturating_sub(rest.len())
    }

    fn span_between(&self, start: &str, end: &str) -> Span {
        Span::new(self.offset(start), self.offset(end))
    }

    fn error(&self, err: nom::Err<nom::error::Error<&'a str>>, label: &str) -> ParseError {
        let at = match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => self.offset(e.input),
            nom::Err::Incomplete(_) => self.source.len(),
        };
        ParseError {
            message: "invalid type notation".to_string(),
            label: label.to_string(),
            span: SourceSpan::from((at, 0)),
            help: None,
        }
    }

    fn finish(&self, rest: &'a str) -> Result<(), ParseError> {
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            return Ok(());
        }
        let at = self.offset(trimmed);
        Err(ParseError {
            message: "unexpected trailing input".to_string(),
            label: "type notation ends before this".to_string(),
            span: SourceSpan::from((at, trimmed.len())),
            help: Some("pointers are written as a trailing `*`, e.g. `i32*`".to_string()),
        })
    }

    fn ty(&self, input: &'a str) -> IResult<&'a str, TypeDescriptor> {
        let (input, _) = multispace0(input)?;
        let start = input;
        let (input, base) = self.prefix(input)?;
        let (input, stars) = many0(token("*"))(input)?;
        let span = self.span_between(start, input);
        let ty = stars
            .into_iter()
            .fold(base, |inner, _| TypeDescriptor::pointer(inner).with_span(span));
        Ok((input, ty))
    }

    fn prefix(&self, input: &'a str) -> IResult<&'a str, TypeDescriptor> {
        let start = input;
        let (input, kind) = alt((
            |i: &'a str| self.meta_function(i),
            |i: &'a str| self.parenthesized(i),
            |i: &'a str| self.array(i),
            |i: &'a str| self.type_var(i),
            |i: &'a str| self.named(i),
        ))(input)?;
        Ok((
            input,
            TypeDescriptor::new(kind).with_span(self.span_between(start, input)),
        ))
    }

    fn list(
        &self,
        open: char,
        close: char,
        input: &'a str,
    ) -> IResult<&'a str, Vec<TypeDescriptor>> {
        delimited(
            char(open),
            separated_list0(token(","), |i: &'a str| self.ty(i)),
            preceded(multispace0, char(close)),
        )(input)
    }

    fn meta_function(&self, input: &'a str) -> IResult<&'a str, TypeKind> {
        let (input, _) = tag("meta")(input)?;
        let (input, _) = multispace0(input)?;
        let (input, params) = self.list('(', ')', input)?;
        let (input, _) = token("->")(input)?;
        let (input, ret) = self.ty(input)?;
        Ok((
            input,
            TypeKind::MetaFunction {
                params,
                ret: Box::new(ret),
            },
        ))
    }

    fn parenthesized(&self, input: &'a str) -> IResult<&'a str, TypeKind> {
        let (input, members) = self.list('(', ')', input)?;
        let (input, ret) = opt(preceded(token("->"), |i: &'a str| self.ty(i)))(input)?;
        let kind = match ret {
            Some(ret) => TypeKind::Function {
                params: members,
                ret: Box::new(ret),
            },
            None => TypeKind::Tuple(members),
        };
        Ok((input, kind))
    }

    fn array(&self, input: &'a str) -> IResult<&'a str, TypeKind> {
        let (input, _) = char('[')(input)?;
        let (input, _) = multispace0(input)?;
        let (input, len) = map_res(digit1, |digits: &str| digits.parse::<u64>())(input)?;
        let (input, element) = self.ty(input)?;
        let (input, _) = token("]")(input)?;
        Ok((
            input,
            TypeKind::Array {
                element: Box::new(element),
                len,
            },
        ))
    }

    fn type_var(&self, input: &'a str) -> IResult<&'a str, TypeKind> {
        let (input, name) = type_var_name(input)?;
        Ok((input, TypeKind::TypeVariable(name.to_string())))
    }

    fn named(&self, input: &'a str) -> IResult<&'a str, TypeKind> {
        let (input, name) = identifier(input)?;
        if let Some(kind) = primitive(name) {
            return Ok((input, kind));
        }
        let (input, args) = opt(delimited(
            token("<"),
            separated_list1(token(","), |i: &'a str| self.ty(i)),
            token(">"),
        ))(input)?;
        Ok((
            input,
            TypeKind::Nominal {
                name: name.to_string(),
                args: args.unwrap_or_default(),
            },
        ))
    }

    fn declaration(&self, input: &'a str) -> IResult<&'a str, DataTypeDecl> {
        let (input, _) = multispace0(input)?;
        let start = input;
        let (input, name) = identifier(input)?;
        let (input, generics) = opt(delimited(
            token("<"),
            separated_list1(token(","), preceded(multispace0, type_var_name)),
            token(">"),
        ))(input)?;
        let generics: Vec<String> = generics
            .unwrap_or_default()
            .into_iter()
            .map(str::to_string)
            .collect();
        let (input, _) = token("=")(input)?;
        let (input, variants) = many0(preceded(token("|"), |i: &'a str| self.ty(i)))(input)?;
        if !variants.is_empty() {
            let decl = DataTypeDecl::union(name, generics, variants)
                .with_span(self.span_between(start, input));
            return Ok((input, decl));
        }
        let (input, body) = self.ty(input)?;
        let fields = match body.kind {
            TypeKind::Tuple(members) => members,
            _ => vec![body],
        };
        let decl =
            DataTypeDecl::record(name, generics, fields).with_span(self.span_between(start, input));
        Ok((input, decl))
    }
}
