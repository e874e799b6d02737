//! Validity predicates for names and string contents.
//!
//! Column names, predicate names, formal-argument names and the three
//! string-valued data kinds each accept a different character class.

/// Characters that may never appear in names or nominals.
const RESERVED: [char; 6] = ['(', ')', '<', '>', ',', '"'];

/// Printable, non-space ASCII.
pub fn is_graphical_char(c: char) -> bool {
    ('\u{21}'..='\u{7e}').contains(&c)
}

fn is_name_char(c: char) -> bool {
    is_graphical_char(c) && !RESERVED.contains(&c)
}

/// A nominal: non-empty, no leading or trailing space, and otherwise only
/// spaces and non-reserved graphical characters.
pub fn is_valid_nominal(s: &str) -> bool {
    if s.is_empty() || s.starts_with(' ') || s.ends_with(' ') {
        return false;
    }
    s.chars().all(|c| c == ' ' || is_name_char(c))
}

/// Spreadsheet variable names (columns and matrix vocabulary elements)
/// follow the nominal rules.
pub fn is_valid_svar_name(s: &str) -> bool {
    is_valid_nominal(s)
}

/// Predicate names: non-empty, no spaces at all.
pub fn is_valid_pred_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_name_char)
}

/// Formal argument names look like `<name>`.
pub fn is_valid_farg_name(s: &str) -> bool {
    let Some(inner) = s.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) else {
        return false;
    };
    !inner.is_empty() && inner.chars().all(is_name_char)
}

/// Quote strings: printable ASCII including space, without `"`.
pub fn is_valid_quote_string(s: &str) -> bool {
    s.chars().all(|c| ('\u{20}'..='\u{7e}').contains(&c) && c != '"')
}

/// Text strings: any ASCII except backspace.
pub fn is_valid_text_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii() && c != '\u{8}')
}
