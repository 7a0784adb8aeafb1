//! Identifier quoting and SQL text normalization.

/// Wraps an identifier in double quotes, doubling any embedded quote.
///
/// Every column and table name interpolated into generated SQL must pass
/// through here.
pub fn safe_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Normalizes a SQL string for stable comparison and cache keys.
///
/// Strips `-- …` line comments, collapses whitespace runs to a single
/// space, removes whitespace around commas, trims, drops trailing `;`s,
/// and lowercases when `lower` is set. Idempotent.
pub fn sanitize_query(sql: &str, lower: bool) -> String {
    let mut without_comments = String::with_capacity(sql.len());
    for line in sql.lines() {
        let line = match line.find("--") {
            Some(idx) => &line[..idx],
            None => line,
        };
        without_comments.push_str(line);
        without_comments.push('\n');
    }

    let mut out = String::with_capacity(without_comments.len());
    let mut pending_space = false;
    for c in without_comments.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if c == ',' {
            pending_space = false;
            out.push(',');
            continue;
        }
        if pending_space && !out.ends_with(',') {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    while out.ends_with(';') {
        out.pop();
        while out.ends_with(' ') {
            out.pop();
        }
    }
    if lower {
        out = out.to_lowercase();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_names() {
        assert_eq!(safe_name("country"), "\"country\"");
        assert_eq!(safe_name("user id"), "\"user id\"");
    }

    #[test]
    fn doubles_embedded_quotes() {
        assert_eq!(safe_name("a\"b"), "\"a\"\"b\"");
        assert_eq!(safe_name("\""), "\"\"\"\"");
    }

    #[test]
    fn strips_comments_and_collapses() {
        assert_eq!(sanitize_query("-- x\nSELECT  1,  2 ;", true), "select 1,2");
    }

    #[test]
    fn preserves_token_boundaries() {
        assert_eq!(sanitize_query("SELECT   1", false), "SELECT 1");
        assert_eq!(sanitize_query("a, b", false), "a,b");
        assert_eq!(sanitize_query("a , b,c", false), "a,b,c");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "-- header\nSELECT a,   b -- trailing\nFROM t;",
            "  SELECT\n\t1\n;",
            "select 1,2",
            "SELECT 1;;",
        ];
        for sql in inputs {
            let once = sanitize_query(sql, true);
            assert_eq!(sanitize_query(&once, true), once);
        }
    }

    #[test]
    fn drops_trailing_semicolons() {
        assert_eq!(sanitize_query("SELECT 1;", false), "SELECT 1");
        assert_eq!(sanitize_query("SELECT 1;;", false), "SELECT 1");
        assert_eq!(sanitize_query("SELECT 1 ; ;", false), "SELECT 1");
    }
}
