//! Minimal MediaWiki wikitext parser
//!
//! Recognises templates (`{{name|a|key=value}}`) and wikilinks
//! (`[[target|label]]`); everything else is text. Template parameter values
//! are parsed recursively. Unbalanced openers are kept as text.

/// Parsed wikitext
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wikicode {
    pub nodes: Vec<Node>,
    raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Template(Template),
    Wikilink(Wikilink),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Trimmed template name
    pub name: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Raw name for `key=value` params, 1-based index for positional ones
    pub name: String,
    pub value: Wikicode,
    /// Whether the name was written out (`key=value`)
    pub named: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wikilink {
    pub title: String,
    /// Raw label after the first `|`, if any
    pub text: Option<String>,
}

pub fn parse(input: &str) -> Wikicode {
    let mut nodes = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < input.len() {
        let rest = &input[i..];
        let opener = if rest.starts_with("{{") {
            Some(Opener::Template)
        } else if rest.starts_with("[[") {
            Some(Opener::Link)
        } else {
            None
        };

        if let Some(opener) = opener {
            if let Some(end) = find_close(input, i) {
                if !text.is_empty() {
                    nodes.push(Node::Text(std::mem::take(&mut text)));
                }
                let inner = &input[i + 2..end - 2];
                nodes.push(match opener {
                    Opener::Template => Node::Template(parse_template(inner)),
                    Opener::Link => Node::Wikilink(parse_link(inner)),
                });
                i = end;
                continue;
            }
        }

        // Safe: i is always on a char boundary
        let ch = rest.chars().next().unwrap_or_default();
        text.push(ch);
        i += ch.len_utf8();
    }

    if !text.is_empty() {
        nodes.push(Node::Text(text));
    }

    Wikicode {
        nodes,
        raw: input.to_string(),
    }
}

#[derive(Clone, Copy)]
enum Opener {
    Template,
    Link,
}

/// Byte offset just past the closer matching the opener at `start`
fn find_close(input: &str, start: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut i = start;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                stack.push(b'{');
                i += 2;
            }
            (b'[', b'[') => {
                stack.push(b'[');
                i += 2;
            }
            (b'}', b'}') if stack.last() == Some(&b'{') => {
                stack.pop();
                i += 2;
                if stack.is_empty() {
                    return Some(i);
                }
            }
            (b']', b']') if stack.last() == Some(&b'[') => {
                stack.pop();
                i += 2;
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }

    None
}

/// Split on `sep` where it is not nested inside a template or link
fn split_top_level(input: &str, sep: u8, max_parts: Option<usize>) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let pair = if i + 1 < bytes.len() {
            Some((bytes[i], bytes[i + 1]))
        } else {
            None
        };
        match pair {
            Some((b'{', b'{')) | Some((b'[', b'[')) => {
                depth += 1;
                i += 2;
                continue;
            }
            Some((b'}', b'}')) | Some((b']', b']')) if depth > 0 => {
                depth -= 1;
                i += 2;
                continue;
            }
            _ => {}
        }

        if depth == 0 && bytes[i] == sep && max_parts.map_or(true, |m| parts.len() + 1 < m) {
            parts.push(&input[last..i]);
            last = i + 1;
        }
        i += 1;
    }

    parts.push(&input[last..]);
    parts
}

fn parse_template(inner: &str) -> Template {
    let mut parts = split_top_level(inner, b'|', None).into_iter();
    let name = parts.next().unwrap_or_default().trim().to_string();

    let mut params = Vec::new();
    let mut position = 0;
    for part in parts {
        let named = split_top_level(part, b'=', Some(2));
        if named.len() == 2 {
            params.push(Param {
                name: named[0].to_string(),
                value: parse(named[1]),
                named: true,
            });
        } else {
            position += 1;
            params.push(Param {
                name: position.to_string(),
                value: parse(part),
                named: false,
            });
        }
    }

    Template { name, params }
}

fn parse_link(inner: &str) -> Wikilink {
    let parts = split_top_level(inner, b'|', Some(2));
    Wikilink {
        title: parts[0].trim().to_string(),
        text: parts.get(1).map(|t| t.to_string()),
    }
}

impl Wikicode {
    /// The source text this was parsed from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// All templates, depth-first, including those nested in parameter values
    pub fn filter_templates(&self) -> Vec<&Template> {
        let mut found = Vec::new();
        for node in &self.nodes {
            if let Node::Template(t) = node {
                found.push(t);
                for param in &t.params {
                    found.extend(param.value.filter_templates());
                }
            }
        }
        found
    }

    /// Top-level templates only
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Template(t) => Some(t),
            _ => None,
        })
    }

    /// Readable text: links as their label, templates dropped, emphasis removed
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Wikilink(link) => match &link.text {
                    Some(text) => out.push_str(&parse(text).plain_text()),
                    None => out.push_str(&link.title),
                },
                Node::Template(_) => {}
            }
        }
        out.replace("'''", "").replace("''", "")
    }
}

impl Template {
    /// Parameter whose name matches `name` once trimmed
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name.trim() == name)
    }

    /// The n-th positional parameter (0-based)
    pub fn positional(&self, n: usize) -> Option<&Param> {
        self.params.iter().filter(|p| !p.named).nth(n)
    }

    /// First parameter regardless of kind, as its raw trimmed text
    pub fn first_param_text(&self) -> Option<String> {
        self.params.first().map(|p| p.value.raw().trim().to_string())
    }

    /// `name -> trimmed raw value` for named params
    pub fn named_values(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter(|p| p.named)
            .map(|p| (p.name.trim().to_string(), p.value.raw().trim().to_string()))
            .collect()
    }
}
