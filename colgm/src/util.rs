//! Shared utility functions
//!
//! Symbol mangling and the quoting/escaping rules of the textual IR.

/// Flatten a qualified name into a symbol name.
///
/// Namespace separators `::` before the first generic argument list become
/// `.`; the generic suffix is kept verbatim so distinct instantiations
/// stay distinct.
pub fn mangle(name: &str) -> String {
    let (path, suffix) = match name.find('<') {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    };
    let mut out = path.replace("::", ".");
    out.push_str(suffix);
    out
}

/// Quote a type or symbol name when it contains characters the IR
/// does not accept in bare identifiers.
///
/// Trailing pointer stars stay outside the quotes, and a leading `%` or
/// `@` sigil is moved in front of the opening quote.
pub fn quoted_name(name: &str) -> String {
    if !name.contains(['<', ':', '>']) {
        return name.to_string();
    }
    if let Some(inner) = name.strip_prefix('[').and_then(|n| n.strip_suffix(']')) {
        if let Some((count, element)) = inner.split_once(" x ") {
            return format!("[{count} x {}]", quoted_name(element));
        }
    }
    let base = name.trim_end_matches('*');
    let stars = &name[base.len()..];
    let (sigil, base) = match base.chars().next() {
        Some(c @ ('%' | '@')) => (Some(c), &base[1..]),
        _ => (None, base),
    };
    let mut out = String::with_capacity(name.len() + 2);
    if let Some(c) = sigil {
        out.push(c);
    }
    out.push('"');
    out.push_str(base);
    out.push('"');
    out.push_str(stars);
    out
}

fn llvm_visible_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"_: ,[](){}<>.;-+*/~?!=&|%^@".contains(&c)
}

/// Escape a string constant body, including the trailing NUL.
pub fn llvm_raw_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 3);
    for &b in s.as_bytes() {
        if llvm_visible_char(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\{b:02x}"));
        }
    }
    out.push_str("\\00");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangle_path() {
        assert_eq!(mangle("std::io::print"), "std.io.print");
        assert_eq!(mangle("main"), "main");
    }

    #[test]
    fn test_mangle_keeps_generic_suffix() {
        assert_eq!(mangle("std::vec<data::foo>"), "std.vec<data::foo>");
        assert_eq!(mangle("std::vec<i64>.push"), "std.vec<i64>.push");
    }

    #[test]
    fn test_quoted_name_plain() {
        assert_eq!(quoted_name("%struct.std.vec"), "%struct.std.vec");
        assert_eq!(quoted_name("i64*"), "i64*");
    }

    #[test]
    fn test_quoted_name_generic() {
        assert_eq!(quoted_name("%struct.vec<i64>"), "%\"struct.vec<i64>\"");
        assert_eq!(quoted_name("%struct.vec<i64>**"), "%\"struct.vec<i64>\"**");
        assert_eq!(quoted_name("vec<i64>.push"), "\"vec<i64>.push\"");
        assert_eq!(quoted_name("%struct.vec<i64*>*"), "%\"struct.vec<i64*>\"*");
    }

    #[test]
    fn test_quoted_name_array_element() {
        assert_eq!(quoted_name("[4 x %struct.vec<i64>]"), "[4 x %\"struct.vec<i64>\"]");
        assert_eq!(quoted_name("[4 x i64]"), "[4 x i64]");
    }

    #[test]
    fn test_llvm_raw_string_escapes() {
        assert_eq!(llvm_raw_string("hi"), "hi\\00");
        assert_eq!(llvm_raw_string("a\nb"), "a\\0ab\\00");
        assert_eq!(llvm_raw_string("\"q\""), "\\22q\\22\\00");
    }
}
