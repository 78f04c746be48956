//! Interpretation of raw attribute arguments.
//!
//! The grammar captures everything between an attribute's parentheses
//! verbatim. This module turns that text into [`AttributeArgs`] based on the
//! attribute name. Errors are plain messages; the caller positions them.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};
use smol_str::SmolStr;

use crate::ast::{
    AttributeArgs, CheckArgs, DefaultFunction, FieldListArgs, FunctionCall, Literal, RelationArgs,
};

static FIELDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfields\s*:\s*\[([^\]]*)\]").expect("valid regex"));
static REFERENCES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breferences\s*:\s*\[([^\]]*)\]").expect("valid regex"));
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bname\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex"));
static ON_DELETE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bonDelete\s*:\s*([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));
static ON_UPDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bonUpdate\s*:\s*([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));
static FIELD_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\bfields\s*:\s*)?\[([^\]]*)\]").expect("valid regex"));
static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)$").expect("valid regex")
});
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));
static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").expect("valid regex"));
static FLOAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+\.\d+$").expect("valid regex"));

/// Interpret the raw argument text of attribute `name`.
pub(crate) fn interpret(name: &str, raw: &str) -> Result<AttributeArgs, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(AttributeArgs::None);
    }

    match name {
        "relation" => parse_relation(raw).map(AttributeArgs::Relation),
        "index" | "unique" | "id" => parse_field_list(raw).map(AttributeArgs::FieldList),
        "check" => parse_check(raw).map(AttributeArgs::Check),
        "default" => parse_default(raw),
        _ => Ok(match parse_literal(raw) {
            Some(lit) => AttributeArgs::Literal(lit),
            None => AttributeArgs::Raw(raw.to_string()),
        }),
    }
}

/// Find `re` in `rest`, remove the match, and return the capture mapped by `f`.
fn take<T>(rest: &mut String, re: &Regex, f: impl FnOnce(&Captures<'_>) -> T) -> Option<T> {
    let (range, value) = {
        let caps = re.captures(rest)?;
        let whole = caps.get(0)?;
        (whole.range(), f(&caps))
    };
    rest.replace_range(range, "");
    Some(value)
}

fn parse_relation(raw: &str) -> Result<RelationArgs, String> {
    let mut rest = raw.to_string();
    let mut args = RelationArgs {
        name: take(&mut rest, &NAME_RE, |c| unescape(&c[1])),
        ..Default::default()
    };

    if let Some(list) = take(&mut rest, &FIELDS_RE, |c| c[1].to_string()) {
        args.fields = parse_ident_list(&list)?;
    }
    if let Some(list) = take(&mut rest, &REFERENCES_RE, |c| c[1].to_string()) {
        args.references = parse_ident_list(&list)?;
    }
    args.on_delete = take(&mut rest, &ON_DELETE_RE, |c| SmolStr::new(&c[1]));
    args.on_update = take(&mut rest, &ON_UPDATE_RE, |c| SmolStr::new(&c[1]));

    for piece in split_top_level(&rest) {
        match parse_literal(piece) {
            Some(Literal::String(name)) if args.name.is_none() => args.name = Some(name),
            _ => return Err(format!("unexpected relation argument `{piece}`")),
        }
    }

    Ok(args)
}

fn parse_field_list(raw: &str) -> Result<FieldListArgs, String> {
    let mut rest = raw.to_string();
    let mut args = FieldListArgs {
        name: take(&mut rest, &NAME_RE, |c| unescape(&c[1])),
        ..Default::default()
    };

    if let Some(list) = take(&mut rest, &FIELD_LIST_RE, |c| c[1].to_string()) {
        args.fields = parse_ident_list(&list)?;
    }

    for piece in split_top_level(&rest) {
        match parse_literal(piece) {
            Some(Literal::String(name)) if args.name.is_none() => args.name = Some(name),
            _ => return Err(format!("unexpected argument `{piece}`, expected a field list")),
        }
    }

    Ok(args)
}

fn parse_check(raw: &str) -> Result<CheckArgs, String> {
    let mut rest = raw.to_string();
    let name = take(&mut rest, &NAME_RE, |c| unescape(&c[1]));
    let expression = rest
        .trim_matches(|c: char| c.is_whitespace() || c == ',')
        .to_string();

    if expression.is_empty() {
        return Err("check constraint requires an expression".to_string());
    }

    Ok(CheckArgs { expression, name })
}

fn parse_default(raw: &str) -> Result<AttributeArgs, String> {
    if let Some(caps) = CALL_RE.captures(raw) {
        let name = &caps[1];
        let function = DefaultFunction::from_str(name)
            .ok_or_else(|| format!("unknown default function `{name}()`"))?;
        let args = split_top_level(&caps[2])
            .into_iter()
            .map(str::to_string)
            .collect();
        return Ok(AttributeArgs::Function(FunctionCall { function, args }));
    }

    Ok(match parse_literal(raw) {
        Some(lit) => AttributeArgs::Literal(lit),
        None => AttributeArgs::Raw(raw.to_string()),
    })
}

fn parse_ident_list(list: &str) -> Result<Vec<SmolStr>, String> {
    split_top_level(list)
        .into_iter()
        .map(|item| {
            if IDENT_RE.is_match(item) {
                Ok(SmolStr::new(item))
            } else {
                Err(format!("`{item}` is not a field name"))
            }
        })
        .collect()
}

/// Parse `text` as a single literal.
pub(crate) fn parse_literal(text: &str) -> Option<Literal> {
    let text = text.trim();
    if let Some(s) = unquote(text) {
        return Some(Literal::String(s));
    }
    match text {
        "true" => return Some(Literal::Boolean(true)),
        "false" => return Some(Literal::Boolean(false)),
        _ => {}
    }
    if INT_RE.is_match(text) {
        return text.parse().ok().map(Literal::Int);
    }
    if FLOAT_RE.is_match(text) {
        return text.parse().ok().map(Literal::Float);
    }
    if IDENT_RE.is_match(text) {
        return Some(Literal::Ident(SmolStr::new(text)));
    }
    None
}

/// Strip matching quotes from a complete string literal and unescape it.
fn unquote(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = text.strip_prefix(quote)?.strip_suffix(quote)?;

    // Reject `"a" "b"`: the body may not contain an unescaped closing quote.
    let mut escaped = false;
    for c in body.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == quote => return None,
            _ => {}
        }
    }
    if escaped {
        return None;
    }

    Some(unescape(body))
}

pub(crate) fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split on commas outside quotes and brackets; pieces are trimmed, empty ones dropped.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                c if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn relation(raw: &str) -> RelationArgs {
        match interpret("relation", raw).unwrap() {
            AttributeArgs::Relation(args) => args,
            other => panic!("expected relation args, got {other:?}"),
        }
    }

    #[test]
    fn test_relation_named_arguments() {
        let args = relation(
            r#"fields: [authorId], references: [id], name: "PostAuthor", onDelete: Cascade, onUpdate: SetNull"#,
        );
        assert_eq!(
            args,
            RelationArgs {
                fields: vec!["authorId".into()],
                references: vec!["id".into()],
                name: Some("PostAuthor".into()),
                on_delete: Some("Cascade".into()),
                on_update: Some("SetNull".into()),
            }
        );
    }

    #[test]
    fn test_relation_positional_name() {
        let args = relation(r#""Author", fields: [a, b], references: [x, y]"#);
        assert_eq!(args.name.as_deref(), Some("Author"));
        assert_eq!(args.fields, vec![SmolStr::new("a"), SmolStr::new("b")]);
        assert_eq!(args.references, vec![SmolStr::new("x"), SmolStr::new("y")]);
        assert_eq!(args.on_delete, None);
    }

    #[test]
    fn test_relation_name_only() {
        let args = relation(r#""Followers""#);
        assert_eq!(args.name.as_deref(), Some("Followers"));
        assert!(args.fields.is_empty());
    }

    #[test]
    fn test_relation_rejects_leftover() {
        let err = interpret("relation", "fields: [a], references: [id], bogus").unwrap_err();
        assert!(err.contains("bogus"), "{err}");
        assert!(interpret("relation", r#""A", "B""#).is_err());
    }

    #[test]
    fn test_field_list_with_name() {
        let args = interpret("index", r#"[email, createdAt], name: "by_email""#).unwrap();
        assert_eq!(
            args,
            AttributeArgs::FieldList(FieldListArgs {
                fields: vec!["email".into(), "createdAt".into()],
                name: Some("by_email".into()),
            })
        );
    }

    #[test]
    fn test_field_list_named_fields_keyword() {
        let args = interpret("unique", "fields: [a, b]").unwrap();
        assert_eq!(
            args,
            AttributeArgs::FieldList(FieldListArgs {
                fields: vec!["a".into(), "b".into()],
                name: None,
            })
        );
    }

    #[test]
    fn test_field_level_unique_name_only() {
        let args = interpret("unique", r#"name: "uq_email""#).unwrap();
        assert_eq!(
            args,
            AttributeArgs::FieldList(FieldListArgs {
                fields: vec![],
                name: Some("uq_email".into()),
            })
        );
    }

    #[test]
    fn test_field_list_rejects_expressions() {
        assert!(interpret("index", "[lower(email)]").is_err());
        assert!(interpret("id", "[a], 42").is_err());
    }

    #[test]
    fn test_check_expression_verbatim() {
        let args = interpret("check", r#"age >= 0 AND age < 150, name: "age_range""#).unwrap();
        assert_eq!(
            args,
            AttributeArgs::Check(CheckArgs {
                expression: "age >= 0 AND age < 150".into(),
                name: Some("age_range".into()),
            })
        );
    }

    #[test]
    fn test_check_keeps_string_literals() {
        let args = interpret("check", "status IN ('a', 'b')").unwrap();
        assert_eq!(
            args,
            AttributeArgs::Check(CheckArgs {
                expression: "status IN ('a', 'b')".into(),
                name: None,
            })
        );
    }

    #[test]
    fn test_check_requires_expression() {
        assert!(interpret("check", r#"name: "empty""#).is_err());
    }

    #[test]
    fn test_default_functions() {
        for name in [
            "autoincrement",
            "now",
            "uuid",
            "cuid",
            "sequence",
            "auto",
            "nanoid",
        ] {
            let args = interpret("default", &format!("{name}()")).unwrap();
            match args {
                AttributeArgs::Function(call) => {
                    assert_eq!(call.function.as_str(), name);
                    assert!(call.args.is_empty());
                }
                other => panic!("expected function, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_default_dbgenerated_keeps_argument() {
        let args = interpret("default", r#"dbgenerated("(strftime('%s', 'now'))")"#).unwrap();
        assert_eq!(
            args,
            AttributeArgs::Function(FunctionCall {
                function: DefaultFunction::DbGenerated,
                args: vec![r#""(strftime('%s', 'now'))""#.to_string()],
            })
        );
    }

    #[test]
    fn test_default_unknown_function() {
        let err = interpret("default", "random()").unwrap_err();
        assert!(err.contains("random"), "{err}");
    }

    #[test]
    fn test_default_literals() {
        assert_eq!(
            interpret("default", "42").unwrap(),
            AttributeArgs::Literal(Literal::Int(42))
        );
        assert_eq!(
            interpret("default", "-1.5").unwrap(),
            AttributeArgs::Literal(Literal::Float(-1.5))
        );
        assert_eq!(
            interpret("default", "true").unwrap(),
            AttributeArgs::Literal(Literal::Boolean(true))
        );
        assert_eq!(
            interpret("default", r#""it\"s""#).unwrap(),
            AttributeArgs::Literal(Literal::String("it\"s".into()))
        );
        assert_eq!(
            interpret("default", "USER").unwrap(),
            AttributeArgs::Literal(Literal::Ident("USER".into()))
        );
    }

    #[test]
    fn test_other_attributes() {
        assert_eq!(
            interpret("map", r#""users""#).unwrap(),
            AttributeArgs::Literal(Literal::String("users".into()))
        );
        assert_eq!(
            interpret("db.VarChar", "255").unwrap(),
            AttributeArgs::Literal(Literal::Int(255))
        );
        assert_eq!(
            interpret("custom", "a: 1, b: 2").unwrap(),
            AttributeArgs::Raw("a: 1, b: 2".into())
        );
        assert_eq!(interpret("id", "  ").unwrap(), AttributeArgs::None);
    }

    #[test]
    fn test_unquote_rejects_adjacent_strings() {
        assert_eq!(parse_literal(r#""a" "b""#), None);
        assert_eq!(parse_literal("'single'"), Some(Literal::String("single".into())));
        assert_eq!(parse_literal(r#""""#), Some(Literal::String(String::new())));
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level(r#"a, f(b, c), "d,e", [x, y],"#),
            vec!["a", "f(b, c)", r#""d,e""#, "[x, y]"]
        );
    }
}
