use graphql_parser::{query, schema};

/// Convenience wrappers over `graphql_parser` for code that works with
/// trusted, static documents (tests, fixtures, embedded schemas). Callers
/// holding untrusted input should parse directly and handle the error.
pub fn parse_schema(sdl: &str) -> schema::Document<'static, String> {
    match graphql_parser::parse_schema(sdl) {
        Ok(document) => document.into_static(),
        Err(error) => panic!("invalid schema document: {}", error),
    }
}

pub fn parse_operation(operation: &str) -> query::Document<'static, String> {
    match graphql_parser::parse_query(operation) {
        Ok(document) => document.into_static(),
        Err(error) => panic!("invalid executable document: {}", error),
    }
}
