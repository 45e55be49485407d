//! Keyword recognition. Keywords are case-insensitive.

use super::token::TokenKind;

pub fn lookup_keyword(name: &str) -> Option<TokenKind> {
    let kind = match name.to_ascii_uppercase().as_str() {
        "CYPHER" => TokenKind::Cypher,
        "MATCH" => TokenKind::Match,
        "WHERE" => TokenKind::Where,
        "RETURN" => TokenKind::Return,
        "WITH" => TokenKind::With,
        "UNWIND" => TokenKind::Unwind,
        "CREATE" => TokenKind::Create,
        "SET" => TokenKind::Set,
        "DELETE" => TokenKind::Delete,
        "DETACH" => TokenKind::Detach,
        "AS" => TokenKind::As,
        "ORDER" => TokenKind::Order,
        "BY" => TokenKind::By,
        "ASC" | "ASCENDING" => TokenKind::Asc,
        "DESC" | "DESCENDING" => TokenKind::Desc,
        "SKIP" => TokenKind::Skip,
        "LIMIT" => TokenKind::Limit,
        "DISTINCT" => TokenKind::Distinct,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "XOR" => TokenKind::Xor,
        "NOT" => TokenKind::Not,
        "IS" => TokenKind::Is,
        "IN" => TokenKind::In,
        "NULL" => TokenKind::Null,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}

pub fn is_keyword(name: &str) -> bool {
    lookup_keyword(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup_keyword("cypher"), Some(TokenKind::Cypher));
        assert_eq!(lookup_keyword("Cypher"), Some(TokenKind::Cypher));
        assert_eq!(lookup_keyword("rEtUrN"), Some(TokenKind::Return));
    }

    #[test]
    fn long_sort_direction_spellings() {
        assert_eq!(lookup_keyword("ascending"), Some(TokenKind::Asc));
        assert_eq!(lookup_keyword("DESCENDING"), Some(TokenKind::Desc));
    }

    #[test]
    fn function_names_are_not_keywords() {
        assert!(!is_keyword("count"));
        assert!(!is_keyword("id"));
        assert!(!is_keyword("param"));
        assert!(is_keyword("limit"));
    }
}
