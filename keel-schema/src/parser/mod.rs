//! Schema parser for `.keel` files.

pub(crate) mod args;
mod grammar;

use std::path::Path;

use pest::Parser;
use pest::error::{InputLocation, LineColLocation};
use pest::iterators::{Pair, Pairs};
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::*;
use crate::error::{SchemaError, SchemaResult};

pub use grammar::{KeelParser, Rule};

/// Parse a schema from a string.
///
/// Parsing is all-or-nothing: any malformed block yields a positioned
/// [`SchemaError::SyntaxError`].
pub fn parse_schema(input: &str) -> SchemaResult<SchemaDocument> {
    let mut pairs =
        KeelParser::parse(Rule::schema, input).map_err(|e| syntax_error_from_pest(input, e))?;
    let parser = SchemaParser { src: input };

    let mut document = SchemaDocument::new();
    let Some(schema_pair) = pairs.next() else {
        return Ok(document);
    };

    for pair in schema_pair.into_inner() {
        let declaration = match pair.as_rule() {
            Rule::datasource_def => Declaration::Datasource(parser.parse_config_block(pair)?),
            Rule::generator_def => Declaration::Generator(parser.parse_config_block(pair)?),
            Rule::model_def => Declaration::Model(parser.parse_model(pair)?),
            Rule::enum_def => Declaration::Enum(parser.parse_enum(pair)?),
            Rule::type_def => Declaration::CompositeType(parser.parse_composite_type(pair)?),
            Rule::view_def => Declaration::View(parser.parse_view(pair)?),
            _ => continue,
        };
        document.declarations.push(declaration);
    }

    debug!(
        declarations = document.declarations.len(),
        models = document.models().count(),
        "parsed schema"
    );
    Ok(document)
}

/// Parse a schema from a file.
pub fn parse_schema_file(path: impl AsRef<Path>) -> SchemaResult<SchemaDocument> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| SchemaError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_schema(&content)
}

fn syntax_error_from_pest(input: &str, err: pest::error::Error<Rule>) -> SchemaError {
    let err = err.renamed_rules(describe_rule);
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    let (offset, len) = match err.location {
        InputLocation::Pos(pos) => (pos, 0),
        InputLocation::Span((start, end)) => (start, end - start),
    };
    SchemaError::syntax(input, (offset, len), (line, column), err.variant.message())
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input",
        Rule::identifier => "identifier",
        Rule::field_type => "field type",
        Rule::field_def => "field",
        Rule::field_attribute => "field attribute",
        Rule::model_attribute => "model attribute",
        Rule::attribute_args => "attribute arguments",
        Rule::assignment => "assignment",
        Rule::enum_value => "enum value",
        Rule::string_literal => "string",
        Rule::kw_datasource
        | Rule::kw_generator
        | Rule::kw_model
        | Rule::kw_enum
        | Rule::kw_type
        | Rule::kw_view => "declaration",
        other => return format!("{other:?}"),
    }
    .to_string()
}

/// Walks pest pairs into AST nodes, positioning errors against `src`.
struct SchemaParser<'i> {
    src: &'i str,
}

impl<'i> SchemaParser<'i> {
    fn error_at(&self, span: pest::Span<'_>, message: impl Into<String>) -> SchemaError {
        let (line, column) = span.start_pos().line_col();
        SchemaError::syntax(
            self.src,
            (span.start(), span.end() - span.start()),
            (line, column),
            message,
        )
    }

    fn next_pair<'p>(
        &self,
        inner: &mut Pairs<'p, Rule>,
        parent: pest::Span<'p>,
        what: &str,
    ) -> SchemaResult<Pair<'p, Rule>> {
        inner
            .next()
            .ok_or_else(|| self.error_at(parent, format!("expected {what}")))
    }

    fn ident(pair: &Pair<'_, Rule>) -> Ident {
        Ident::new(pair.as_str(), pair.as_span().into())
    }

    /// Skip the block keyword and read the block name.
    fn block_header<'p>(&self, pair: Pair<'p, Rule>) -> SchemaResult<(Ident, Span, Pairs<'p, Rule>)> {
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        self.next_pair(&mut inner, span, "keyword")?;
        let name = Self::ident(&self.next_pair(&mut inner, span, "block name")?);
        Ok((name, span.into(), inner))
    }

    fn parse_config_block(&self, pair: Pair<'_, Rule>) -> SchemaResult<ConfigBlock> {
        let (name, span, inner) = self.block_header(pair)?;
        let mut block = ConfigBlock::new(name, span);

        for assignment in inner.filter(|p| p.as_rule() == Rule::assignment) {
            let assignment_span = assignment.as_span();
            let mut parts = assignment.into_inner();
            let key = self.next_pair(&mut parts, assignment_span, "property name")?;
            let value = self.next_pair(&mut parts, assignment_span, "property value")?;
            let key = SmolStr::new(key.as_str());

            if block.properties.contains_key(&key) {
                return Err(self.error_at(
                    assignment_span,
                    format!("duplicate property `{key}` in `{}`", block.name),
                ));
            }
            let value = self.parse_config_value(value)?;
            block.properties.insert(key, value);
        }

        Ok(block)
    }

    fn parse_config_value(&self, pair: Pair<'_, Rule>) -> SchemaResult<ConfigValue> {
        let span = pair.as_span();
        Ok(match pair.as_rule() {
            Rule::string_literal => {
                let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                ConfigValue::String(args::unescape(body))
            }
            Rule::number => ConfigValue::Number(SmolStr::new(pair.as_str())),
            Rule::boolean => ConfigValue::Boolean(pair.as_str() == "true"),
            Rule::identifier => ConfigValue::Ident(SmolStr::new(pair.as_str())),
            Rule::array => ConfigValue::Array(
                pair.into_inner()
                    .map(|p| self.parse_config_value(p))
                    .collect::<SchemaResult<_>>()?,
            ),
            Rule::function_call => {
                let mut inner = pair.into_inner();
                let name = self.next_pair(&mut inner, span, "function name")?;
                let args = inner
                    .map(|p| self.parse_config_value(p))
                    .collect::<SchemaResult<_>>()?;
                ConfigValue::Function(SmolStr::new(name.as_str()), args)
            }
            other => return Err(self.error_at(span, format!("unexpected {other:?}"))),
        })
    }

    fn parse_model(&self, pair: Pair<'_, Rule>) -> SchemaResult<Model> {
        let (name, span, inner) = self.block_header(pair)?;
        let mut model = Model::new(name, span);

        for item in inner {
            match item.as_rule() {
                Rule::field_def => model.add_field(self.parse_field(item)?),
                Rule::model_attribute => model.attributes.push(self.parse_attribute(item)?),
                _ => {}
            }
        }

        Ok(model)
    }

    fn parse_view(&self, pair: Pair<'_, Rule>) -> SchemaResult<View> {
        let (name, span, inner) = self.block_header(pair)?;
        let mut view = View::new(name, span);

        for item in inner {
            match item.as_rule() {
                Rule::field_def => view.fields.push(self.parse_field(item)?),
                Rule::model_attribute => view.attributes.push(self.parse_attribute(item)?),
                _ => {}
            }
        }

        Ok(view)
    }

    fn parse_composite_type(&self, pair: Pair<'_, Rule>) -> SchemaResult<CompositeType> {
        let (name, span, inner) = self.block_header(pair)?;
        let mut composite = CompositeType::new(name, span);

        for item in inner.filter(|p| p.as_rule() == Rule::field_def) {
            composite.fields.push(self.parse_field(item)?);
        }

        Ok(composite)
    }

    fn parse_enum(&self, pair: Pair<'_, Rule>) -> SchemaResult<Enum> {
        let (name, span, inner) = self.block_header(pair)?;
        let mut e = Enum::new(name, span);

        for item in inner {
            match item.as_rule() {
                Rule::enum_value => {
                    let value_span = item.as_span();
                    let mut parts = item.into_inner();
                    let name = Self::ident(&self.next_pair(&mut parts, value_span, "enum value")?);
                    let mut value = EnumValue::new(name, value_span.into());
                    for attr in parts {
                        value.attributes.push(self.parse_attribute(attr)?);
                    }
                    e.values.push(value);
                }
                Rule::model_attribute => e.attributes.push(self.parse_attribute(item)?),
                _ => {}
            }
        }

        Ok(e)
    }

    fn parse_field(&self, pair: Pair<'_, Rule>) -> SchemaResult<Field> {
        let span = pair.as_span();
        let mut inner = pair.into_inner();

        let name = Self::ident(&self.next_pair(&mut inner, span, "field name")?);
        let field_type = self.parse_field_type(self.next_pair(&mut inner, span, "field type")?)?;
        let attributes = inner
            .map(|attr| self.parse_attribute(attr))
            .collect::<SchemaResult<Vec<_>>>()?;

        Ok(Field::new(name, field_type, attributes, span.into()))
    }

    fn parse_field_type(&self, pair: Pair<'_, Rule>) -> SchemaResult<FieldType> {
        let span = pair.as_span();
        let mut inner = pair.into_inner();
        let base = self.next_pair(&mut inner, span, "type name")?;

        let mut is_list = false;
        let mut optional = false;
        for marker in inner {
            match marker.as_rule() {
                Rule::list_marker => is_list = true,
                Rule::optional_marker => optional = true,
                _ => {}
            }
        }

        Ok(FieldType::new(
            base.as_str(),
            TypeModifier::from_flags(is_list, optional),
        ))
    }

    fn parse_attribute(&self, pair: Pair<'_, Rule>) -> SchemaResult<Attribute> {
        let span = pair.as_span();
        let prefix = if pair.as_rule() == Rule::model_attribute {
            "@@"
        } else {
            "@"
        };
        let mut inner = pair.into_inner();

        let name = Self::ident(&self.next_pair(&mut inner, span, "attribute name")?);
        let raw = inner
            .next()
            .and_then(|args| args.into_inner().next())
            .map(|raw| raw.as_str());

        let args = match raw {
            None => AttributeArgs::None,
            Some(raw) => args::interpret(name.as_str(), raw).map_err(|message| {
                self.error_at(
                    span,
                    format!("invalid arguments for `{prefix}{name}`: {message}"),
                )
            })?,
        };

        Ok(Attribute::new(name, args, span.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BLOG: &str = r#"
        // Blog schema
        datasource db {
            provider = "sqlite"
            url      = env("DATABASE_URL")
        }

        generator client {
            provider = "keel-client"
            features = ["a", "b"]
            strict   = true
        }

        enum Role {
            USER
            ADMIN @map("admin")
        }

        model User {
            id        Int      @id @default(autoincrement())
            email     String   @unique
            name      String?
            role      Role     @default(USER)
            posts     Post[]
            createdAt DateTime @default(now()) @map("created_at")

            @@map("users")
            @@check(length(email) > 3, name: "email_len")
        }

        model Post {
            id       Int    @id @default(autoincrement())
            title    String @db.Text
            authorId Int
            author   User   @relation(fields: [authorId], references: [id], onDelete: Cascade)

            @@index([authorId, title], name: "post_author_title")
        }

        type Address {
            street String
            city   String?
        }

        view ActiveUser {
            id    Int    @id
            email String
        }
    "#;

    #[test]
    fn test_parse_declarations_in_order() {
        let doc = parse_schema(BLOG).unwrap();
        let kinds: Vec<_> = doc
            .declarations
            .iter()
            .map(|d| (d.kind(), d.name()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("datasource", "db"),
                ("generator", "client"),
                ("enum", "Role"),
                ("model", "User"),
                ("model", "Post"),
                ("type", "Address"),
                ("view", "ActiveUser"),
            ]
        );
    }

    #[test]
    fn test_parse_fields_and_types() {
        let doc = parse_schema(BLOG).unwrap();
        let user = doc.get_model("User").unwrap();
        assert_eq!(user.fields.len(), 6);

        let name = user.get_field("name").unwrap();
        assert!(name.is_optional());
        assert_eq!(name.field_type.base_name(), "String");

        let posts = user.get_field("posts").unwrap();
        assert!(posts.is_list());
        assert_eq!(posts.field_type.base_name(), "Post");

        let id = user.get_field("id").unwrap();
        assert!(id.is_id());
        assert!(id.is_identity());

        assert_eq!(user.get_field("createdAt").unwrap().mapped_name(), Some("created_at"));
        assert_eq!(user.mapped_name(), Some("users"));
    }

    #[test]
    fn test_parse_bare_attributes_have_no_args() {
        let doc = parse_schema(BLOG).unwrap();
        let email = doc.get_model("User").unwrap().get_field("email").unwrap();
        assert_eq!(email.attributes.len(), 1);
        assert_eq!(email.attributes[0].args, AttributeArgs::None);
    }

    #[test]
    fn test_parse_relation_and_index() {
        let doc = parse_schema(BLOG).unwrap();
        let post = doc.get_model("Post").unwrap();

        let relation = post.get_field("author").unwrap().relation().unwrap();
        assert_eq!(relation.fields, vec![SmolStr::new("authorId")]);
        assert_eq!(relation.references, vec![SmolStr::new("id")]);
        assert_eq!(relation.on_delete.as_deref(), Some("Cascade"));
        assert_eq!(relation.on_update, None);

        let index = post.get_attribute("index").unwrap().field_list().unwrap();
        assert_eq!(index.fields.len(), 2);
        assert_eq!(index.name.as_deref(), Some("post_author_title"));

        let title = post.get_field("title").unwrap();
        assert_eq!(title.attributes[0].name(), "db.Text");
    }

    #[test]
    fn test_parse_check_and_enum() {
        let doc = parse_schema(BLOG).unwrap();
        let check = doc
            .get_model("User")
            .unwrap()
            .get_attribute("check")
            .unwrap()
            .check()
            .unwrap();
        assert_eq!(check.expression, "length(email) > 3");
        assert_eq!(check.name.as_deref(), Some("email_len"));

        let role = doc.get_enum("Role").unwrap();
        assert_eq!(role.values.len(), 2);
        assert_eq!(role.get_value("ADMIN").unwrap().db_value(), "admin");
    }

    #[test]
    fn test_parse_config_blocks() {
        let doc = parse_schema(BLOG).unwrap();
        let db = doc.datasource().unwrap();
        assert_eq!(db.provider(), Some("sqlite"));
        assert_eq!(
            db.get("url").and_then(ConfigValue::env_var),
            Some("DATABASE_URL")
        );

        let client = doc.generators().next().unwrap();
        assert_eq!(client.get("strict"), Some(&ConfigValue::Boolean(true)));
        assert_eq!(
            client.get("features"),
            Some(&ConfigValue::Array(vec![
                ConfigValue::String("a".into()),
                ConfigValue::String("b".into()),
            ]))
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse_schema(BLOG).unwrap(), parse_schema(BLOG).unwrap());
    }

    #[test]
    fn test_parse_empty() {
        let doc = parse_schema("  // nothing here\n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse_schema("model User {\n  id Int @id\n}\n}\n").unwrap_err();
        match err {
            SchemaError::SyntaxError { line, column, .. } => {
                assert_eq!(line, 4);
                assert_eq!(column, 1);
            }
            other => panic!("expected SyntaxError, got {other:?}"),
        }
    }

    #[test]
    fn test_keyword_requires_boundary() {
        let err = parse_schema("modelUser {\n  id Int @id\n}").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_unknown_block_is_rejected() {
        let err = parse_schema("table User {\n  id Int\n}").unwrap_err();
        match err {
            SchemaError::SyntaxError { line, column, .. } => assert_eq!((line, column), (1, 1)),
            other => panic!("expected SyntaxError, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_attribute_arguments_are_positioned() {
        let input = "model User {\n  id Int @id\n  at DateTime @default(yesterday())\n}";
        let err = parse_schema(input).unwrap_err();
        match err {
            SchemaError::SyntaxError {
                line,
                column,
                message,
                ..
            } => {
                assert_eq!((line, column), (3, 15));
                assert!(message.contains("yesterday"), "{message}");
                assert!(message.contains("@default"), "{message}");
            }
            other => panic!("expected SyntaxError, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_datasource_property() {
        let err = parse_schema("datasource db {\n provider = \"a\"\n provider = \"b\"\n}").unwrap_err();
        assert!(err.to_string().contains("duplicate property"));
    }

    #[test]
    fn test_parse_schema_file_reports_path() {
        let err = parse_schema_file("/definitely/missing/schema.keel").unwrap_err();
        match err {
            SchemaError::IoError { path, .. } => assert!(path.ends_with("schema.keel")),
            other => panic!("expected IoError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.keel");
        std::fs::write(&path, "model Tag {\n  id Int @id\n}\n").unwrap();
        let doc = parse_schema_file(&path).unwrap();
        assert_eq!(doc.model_names().collect::<Vec<_>>(), ["Tag"]);
    }
}
