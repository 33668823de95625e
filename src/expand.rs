//! Wildcard expansion for stage arguments (`*` and `?`).
//!
//! Expansion walks the pattern one path component at a time over an
//! explicit worklist of concrete prefixes, so deeply nested patterns never
//! grow the stack and each component's match-and-sort step is independently
//! testable. Components translate to anchored regexes: `*` matches any run
//! of characters, `?` exactly one, everything else literally.

use regex::Regex;

/// Expand one word. A word without wildcard characters, like a pattern
/// that matches nothing, comes back unchanged as a single-element list.
pub fn expand_word(word: &str) -> Vec<String> {
    if !word.contains(['*', '?']) {
        return vec![word.to_string()];
    }

    let root = if word.starts_with('/') { "/" } else { "" };
    let mut prefixes: Vec<String> = vec![root.to_string()];

    for component in word.split('/').filter(|c| !c.is_empty()) {
        if !component.contains(['*', '?']) {
            // Concrete component: extend every prefix verbatim. Existence is
            // decided later, when a wildcard component lists the directory
            // (or by the program that receives the argument).
            for prefix in &mut prefixes {
                *prefix = join(prefix, component);
            }
            continue;
        }

        let Ok(re) = component_regex(component) else {
            return vec![word.to_string()];
        };
        let mut next = Vec::new();
        for prefix in &prefixes {
            let dir = if prefix.is_empty() { "." } else { prefix.as_str() };
            // A prefix that is not a listable directory prunes silently.
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            let mut matches: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| re.is_match(name))
                // Hidden entries only match patterns that ask for them.
                .filter(|name| !name.starts_with('.') || component.starts_with('.'))
                .collect();
            matches.sort();
            next.extend(matches.iter().map(|name| join(prefix, name)));
        }
        prefixes = next;
    }

    if prefixes.is_empty() {
        vec![word.to_string()]
    } else {
        prefixes
    }
}

fn join(prefix: &str, component: &str) -> String {
    if prefix.is_empty() || prefix == "/" {
        format!("{}{}", prefix, component)
    } else {
        format!("{}/{}", prefix, component)
    }
}

/// Translate one pattern component into an anchored regex.
fn component_regex(component: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(component.len() * 2 + 2);
    pattern.push('^');
    for ch in component.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}
