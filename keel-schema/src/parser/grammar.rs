//! Pest grammar parser for Keel schema files.

use pest_derive::Parser;

/// The Keel schema parser.
#[derive(Parser)]
#[grammar = "parser/keel.pest"]
pub struct KeelParser;

#[cfg(test)]
mod tests {
    use super::*;
    use pest::Parser;

    fn raw_argument(input: &str) -> &str {
        let mut pairs = KeelParser::parse(Rule::field_attribute, input).unwrap();
        pairs
            .next()
            .unwrap()
            .into_inner()
            .find(|p| p.as_rule() == Rule::attribute_args)
            .unwrap()
            .into_inner()
            .next()
            .unwrap()
            .as_str()
    }

    #[test]
    fn test_parse_identifier() {
        assert!(KeelParser::parse(Rule::identifier, "User").is_ok());
        assert!(KeelParser::parse(Rule::identifier, "_private").is_ok());
        assert!(KeelParser::parse(Rule::identifier, "1abc").is_err());
    }

    #[test]
    fn test_parse_field_type() {
        assert!(KeelParser::parse(Rule::field_type, "String?").is_ok());
        assert!(KeelParser::parse(Rule::field_type, "Post[]").is_ok());
        assert!(KeelParser::parse(Rule::field_type, "Tag[]?").is_ok());
    }

    #[test]
    fn test_keyword_needs_boundary() {
        assert!(KeelParser::parse(Rule::kw_model, "model").is_ok());
        assert!(KeelParser::parse(Rule::kw_model, "models").is_err());
    }

    #[test]
    fn test_parse_attribute() {
        assert!(KeelParser::parse(Rule::field_attribute, "@id").is_ok());
        assert!(KeelParser::parse(Rule::field_attribute, "@default(now())").is_ok());
        assert!(KeelParser::parse(Rule::field_attribute, "@db.Text").is_ok());
        assert!(KeelParser::parse(Rule::model_attribute, "@@index([email])").is_ok());
    }

    #[test]
    fn test_raw_argument_is_balanced() {
        assert_eq!(
            raw_argument("@relation(fields: [author_id], references: [id])"),
            "fields: [author_id], references: [id]"
        );
        assert_eq!(raw_argument("@default(dbgenerated(\"f(x)\"))"), "dbgenerated(\"f(x)\")");
        assert_eq!(raw_argument("@default(\")(\")"), "\")(\"");
        assert_eq!(raw_argument("@default('it\\'s')"), "'it\\'s'");
    }

    #[test]
    fn test_unbalanced_argument_fails() {
        assert!(KeelParser::parse(Rule::schema, "model A { id Int @default(now() }").is_err());
        assert!(KeelParser::parse(Rule::schema, "model A { id Int @map(\"x) }").is_err());
    }

    #[test]
    fn test_parse_model() {
        let input = r#"model User {
            id    Int    @id @default(autoincrement())
            email String @unique // trailing comment
            @@map("users")
        }"#;
        let result = KeelParser::parse(Rule::model_def, input);
        assert!(result.is_ok(), "Failed to parse model: {:?}", result.err());
    }

    #[test]
    fn test_parse_enum() {
        let input = r#"enum Role {
            User
            Admin @map("admin")
            @@map("roles")
        }"#;
        assert!(KeelParser::parse(Rule::enum_def, input).is_ok());
    }

    #[test]
    fn test_parse_datasource() {
        let input = r#"datasource db {
            provider = "sqlite"
            url      = env("DATABASE_URL")
        }"#;
        assert!(KeelParser::parse(Rule::datasource_def, input).is_ok());
    }
}
