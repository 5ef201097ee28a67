//! Minimal CSS inliner.
//!
//! Note services drop `<style>` elements, so theme rules are copied onto the
//! matching elements as `style` attributes. Only simple selectors are
//! understood: `tag`, `.class` and `tag.class`, optionally scoped by the
//! article wrapper (`.markdown-body h1`, `article p`). Anything else is
//! skipped.

use regex::Regex;

#[derive(Debug)]
struct Rule {
    selector: SimpleSelector,
    declarations: Vec<(String, String)>,
    order: usize,
}

#[derive(Debug, PartialEq)]
struct SimpleSelector {
    tag: Option<String>,
    classes: Vec<String>,
}

impl SimpleSelector {
    fn parse(raw: &str) -> Option<Self> {
        let mut raw = raw.trim();
        for scope in [".markdown-body ", "article "] {
            if let Some(rest) = raw.strip_prefix(scope) {
                raw = rest.trim();
                break;
            }
        }

        if raw.is_empty()
            || raw.contains(|c: char| {
                c.is_whitespace() || matches!(c, '>' | '+' | '~' | ':' | '[' | '*' | '#')
            })
        {
            return None;
        }

        let mut parts = raw.split('.');
        let tag = parts
            .next()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_ascii_lowercase());
        let classes: Vec<String> = parts.map(str::to_string).collect();
        if classes.iter().any(|c| c.is_empty()) || (tag.is_none() && classes.is_empty()) {
            return None;
        }

        Some(Self { tag, classes })
    }

    fn specificity(&self) -> (usize, usize) {
        (self.classes.len(), usize::from(self.tag.is_some()))
    }

    fn matches(&self, tag: &str, classes: &[&str]) -> bool {
        if let Some(expected) = &self.tag {
            if expected != tag {
                return false;
            }
        }
        self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

fn parse_stylesheet(css: &str) -> Vec<Rule> {
    let comment_re = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    let css = comment_re.replace_all(css, "");
    let css = strip_at_rules(&css);

    let rule_re = Regex::new(r"([^{}]+)\{([^{}]*)\}").unwrap();
    let mut rules = Vec::new();

    for caps in rule_re.captures_iter(&css) {
        let declarations = parse_declarations(&caps[2]);
        if declarations.is_empty() {
            continue;
        }
        for raw_selector in caps[1].split(',') {
            match SimpleSelector::parse(raw_selector) {
                Some(selector) => rules.push(Rule {
                    selector,
                    declarations: declarations.clone(),
                    order: rules.len(),
                }),
                None => log::debug!("Skipping unsupported selector '{}'", raw_selector.trim()),
            }
        }
    }

    rules
}

/// Drop `@media`, `@font-face`, `@import` and friends, including nested blocks.
fn strip_at_rules(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut i = 0;

    while let Some(offset) = css[i..].find('@') {
        let at = i + offset;
        out.push_str(&css[i..at]);
        let rest = &css[at..];

        match rest.find(|c| c == ';' || c == '{') {
            None => {
                i = css.len();
                break;
            }
            Some(p) if rest.as_bytes()[p] == b';' => i = at + p + 1,
            Some(p) => {
                let mut depth = 0usize;
                let mut end = rest.len();
                for (j, c) in rest[p..].char_indices() {
                    match c {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                end = p + j + 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                i = at + end;
            }
        }
    }

    out.push_str(&css[i..]);
    out
}

/// Double quotes become single quotes so the value fits in `style="..."`.
fn parse_declarations(block: &str) -> Vec<(String, String)> {
    block
        .split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim().replace('"', "'");
            if property.is_empty() || value.is_empty() {
                None
            } else {
                Some((property, value))
            }
        })
        .collect()
}

fn upsert(merged: &mut Vec<(String, String)>, property: &str, value: &str) {
    match merged.iter_mut().find(|(p, _)| p == property) {
        Some(entry) => entry.1 = value.to_string(),
        None => merged.push((property.to_string(), value.to_string())),
    }
}

/// Apply `css` to every opening tag in `html`.
///
/// Rules are applied in specificity order, then source order; declarations
/// already present in a `style` attribute win.
pub(super) fn inline_styles(html: &str, css: &str) -> String {
    let rules = parse_stylesheet(css);
    if rules.is_empty() {
        return html.to_string();
    }

    let tag_re = Regex::new(r"<([a-zA-Z][a-zA-Z0-9]*)([^<>]*?)(/?)>").unwrap();
    let class_re = Regex::new(r#"\bclass\s*=\s*"([^"]*)""#).unwrap();
    let style_re = Regex::new(r#"\s+style\s*=\s*"([^"]*)""#).unwrap();

    tag_re
        .replace_all(html, |caps: &regex::Captures| {
            let tag = caps[1].to_ascii_lowercase();
            let attrs = &caps[2];

            let classes: Vec<&str> = class_re
                .captures(attrs)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().split_whitespace().collect())
                .unwrap_or_default();

            let mut matched: Vec<&Rule> = rules
                .iter()
                .filter(|r| r.selector.matches(&tag, &classes))
                .collect();
            if matched.is_empty() {
                return caps[0].to_string();
            }
            matched.sort_by_key(|r| (r.selector.specificity(), r.order));

            let mut merged: Vec<(String, String)> = Vec::new();
            for rule in matched {
                for (property, value) in &rule.declarations {
                    upsert(&mut merged, property, value);
                }
            }
            if let Some(existing) = style_re.captures(attrs) {
                for (property, value) in parse_declarations(&existing[1]) {
                    upsert(&mut merged, &property, &value);
                }
            }

            let attrs = style_re.replace(attrs, "");
            let style = merged
                .iter()
                .map(|(p, v)| format!("{}: {}", p, v))
                .collect::<Vec<_>>()
                .join("; ");
            let self_closing = if caps[3].is_empty() { "" } else { " /" };

            format!(
                "<{}{} style=\"{}\"{}>",
                &caps[1],
                attrs.trim_end(),
                style,
                self_closing
            )
        })
        .to_string()
}
