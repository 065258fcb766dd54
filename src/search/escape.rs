//! Query escaping / 查询转义
//!
//! Escapes query-string syntax characters while letting the `*` and `?`
//! wildcards through, so `"*"`, `"*.csv"` and `"data?"` keep their meaning.

/// Characters with syntactic meaning in the backend query grammar / 需转义的字符
const RESERVED: &[char] = &[
    '+', '-', '=', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', ':', '\\', '/',
];

/// Escape a raw user query / 转义用户查询
pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        if RESERVED.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Whether the query matches everything (`*`, `**`, ...) / 是否匹配全部
pub fn is_match_all(query: &str) -> bool {
    let q = query.trim();
    !q.is_empty() && q.chars().all(|c| c == '*')
}
