//! CSS selector matching for the headless document.
//!
//! Supports the subset the portfolio markup needs:
//!   - comma-separated groups: `a, button`
//!   - descendant (space) and child (`>`) combinators
//!   - compound selectors: `tag`, `*`, `#id`, `.class`
//!   - attributes: `[attr]`, `[attr="v"]`, `[attr^="v"]`, `[attr*="v"]`
//!   - negation of a compound: `:not([tabindex="-1"])`
//!
//! Matching runs right-to-left: the last compound must match the candidate,
//! then each combinator walks up through the ancestors.

/// Read access to an element tree, indexed by arena position.
pub(crate) trait Tree {
    /// Parent element, if any.
    fn parent_of(&self, id: usize) -> Option<usize>;
    /// Lower-case tag name.
    fn tag_of(&self, id: usize) -> &str;
    /// Attribute value.
    fn attr_of(&self, id: usize, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Simple {
    Tag(String),
    Id(String),
    Class(String),
    Attr(String, AttrOp),
    Not(Compound),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound(Vec<Simple>);

/// One comma-free selector, stored left-to-right. The combinator of entry
/// `i` connects it to entry `i - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex(Vec<(Combinator, Compound)>);

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList(Vec<Complex>);

impl SelectorList {
    /// Parse a selector list. Malformed groups are dropped.
    pub(crate) fn parse(selector: &str) -> Self {
        let groups = split_top_level(selector, ',')
            .into_iter()
            .filter_map(|group| parse_complex(group.trim()))
            .collect();
        Self(groups)
    }

    /// Whether the element `id` matches any group.
    pub(crate) fn matches(&self, tree: &impl Tree, id: usize) -> bool {
        self.0.iter().any(|complex| matches_complex(tree, id, complex))
    }
}

/// Split on `sep` outside of `[...]` and `(...)`.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_complex(s: &str) -> Option<Complex> {
    if s.is_empty() {
        return None;
    }
    let mut parts = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut buf = String::new();
    let mut depth = 0i32;

    let flush = |buf: &mut String,
                 parts: &mut Vec<(Combinator, Compound)>,
                 pending: &mut Combinator|
     -> Option<()> {
        if !buf.is_empty() {
            parts.push((*pending, parse_compound(buf)?));
            buf.clear();
            *pending = Combinator::Descendant;
        }
        Some(())
    };

    for c in s.chars() {
        match c {
            '[' | '(' => {
                depth += 1;
                buf.push(c);
            }
            ']' | ')' => {
                depth -= 1;
                buf.push(c);
            }
            ' ' | '\t' | '\n' if depth == 0 => {
                flush(&mut buf, &mut parts, &mut pending)?;
            }
            '>' if depth == 0 => {
                flush(&mut buf, &mut parts, &mut pending)?;
                pending = Combinator::Child;
            }
            _ => buf.push(c),
        }
    }
    flush(&mut buf, &mut parts, &mut pending)?;

    if parts.is_empty() {
        None
    } else {
        Some(Complex(parts))
    }
}

fn parse_compound(s: &str) -> Option<Compound> {
    let mut simple = Vec::new();
    let mut rest = s;

    // Leading tag or universal.
    let tag_end = rest
        .find(|c| matches!(c, '#' | '.' | '[' | ':'))
        .unwrap_or(rest.len());
    let tag = &rest[..tag_end];
    if !tag.is_empty() && tag != "*" {
        simple.push(Simple::Tag(tag.to_ascii_lowercase()));
    }
    rest = &rest[tag_end..];

    while let Some(first) = rest.chars().next() {
        match first {
            '#' | '.' => {
                let body = &rest[1..];
                let end = body
                    .find(|c| matches!(c, '#' | '.' | '[' | ':'))
                    .unwrap_or(body.len());
                if end == 0 {
                    return None;
                }
                let name = body[..end].to_owned();
                simple.push(if first == '#' {
                    Simple::Id(name)
                } else {
                    Simple::Class(name)
                });
                rest = &body[end..];
            }
            '[' => {
                let close = rest.find(']')?;
                simple.push(parse_attr(&rest[1..close])?);
                rest = &rest[close + 1..];
            }
            ':' => {
                let inner = rest.strip_prefix(":not(")?;
                let close = matching_paren(inner)?;
                simple.push(Simple::Not(parse_compound(&inner[..close])?));
                rest = &inner[close + 1..];
            }
            _ => return None,
        }
    }
    Some(Compound(simple))
}

/// Index of the `)` closing an already-opened parenthesis.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 1i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_attr(inner: &str) -> Option<Simple> {
    let unquote = |v: &str| {
        v.trim().trim_matches('"').trim_matches('\'').to_owned()
    };
    let Some(eq) = inner.find('=') else {
        let name = inner.trim();
        return (!name.is_empty())
            .then(|| Simple::Attr(name.to_owned(), AttrOp::Exists));
    };
    let value = unquote(&inner[eq + 1..]);
    let (name, op) = match inner[..eq].trim_end() {
        n if n.ends_with('^') => (&n[..n.len() - 1], AttrOp::Prefix(value)),
        n if n.ends_with('*') => (&n[..n.len() - 1], AttrOp::Contains(value)),
        n => (n, AttrOp::Equals(value)),
    };
    Some(Simple::Attr(name.trim().to_owned(), op))
}

fn matches_complex(tree: &impl Tree, id: usize, complex: &Complex) -> bool {
    let Some(((_, last), rest)) = complex.0.split_last() else {
        return false;
    };
    if !matches_compound(tree, id, last) {
        return false;
    }
    // The combinator stored on entry `i + 1` relates it to entry `i`.
    let mut current = id;
    let mut link = complex.0.last().map(|(c, _)| *c);
    for (combinator, compound) in rest.iter().rev() {
        let relation = link.unwrap_or(Combinator::Descendant);
        link = Some(*combinator);
        match relation {
            Combinator::Child => match tree.parent_of(current) {
                Some(parent) if matches_compound(tree, parent, compound) => {
                    current = parent;
                }
                _ => return false,
            },
            Combinator::Descendant => {
                let mut ancestor = tree.parent_of(current);
                loop {
                    match ancestor {
                        Some(a) if matches_compound(tree, a, compound) => {
                            current = a;
                            break;
                        }
                        Some(a) => ancestor = tree.parent_of(a),
                        None => return false,
                    }
                }
            }
        }
    }
    true
}

fn matches_compound(tree: &impl Tree, id: usize, compound: &Compound) -> bool {
    compound.0.iter().all(|simple| match simple {
        Simple::Tag(tag) => tree.tag_of(id) == tag,
        Simple::Id(value) => tree.attr_of(id, "id") == Some(value.as_str()),
        Simple::Class(class) => tree
            .attr_of(id, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class)),
        Simple::Attr(name, op) => {
            let actual = tree.attr_of(id, name);
            match op {
                AttrOp::Exists => actual.is_some(),
                AttrOp::Equals(v) => actual == Some(v.as_str()),
                AttrOp::Prefix(v) => actual.is_some_and(|a| a.starts_with(v)),
                AttrOp::Contains(v) => actual.is_some_and(|a| a.contains(v)),
            }
        }
        Simple::Not(inner) => !matches_compound(tree, id, inner),
    })
}
