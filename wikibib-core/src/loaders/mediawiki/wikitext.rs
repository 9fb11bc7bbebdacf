//! Wikitext to plain text
//!
//! Parses MediaWiki markup into a small node tree and strips it back down to
//! readable text. Unclosed constructs fall back to literal text, so the only
//! failure is nesting deeper than [`MAX_DEPTH`].

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Maximum nesting of templates, links, tags and headings
pub const MAX_DEPTH: usize = 40;

static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(={1,6})(.+?)(={1,6})[ \t]*$").unwrap());

static TAG_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<([A-Za-z][A-Za-z0-9]*)").unwrap());

static ENTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^&(#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap());

/// Tags whose contents never show up on the rendered page
const INVISIBLE_TAGS: &[&str] = &[
    "abstract",
    "categorytree",
    "references",
    "gallery",
    "graph",
    "imagemap",
    "inputbox",
    "math",
    "ref",
    "score",
    "section",
    "templatedata",
    "timeline",
];

/// Tags whose contents are not wikitext
const RAW_TAGS: &[&str] = &[
    "categorytree",
    "ce",
    "chem",
    "gallery",
    "graph",
    "hiero",
    "imagemap",
    "inputbox",
    "math",
    "nowiki",
    "pre",
    "score",
    "section",
    "source",
    "syntaxhighlight",
    "templatedata",
    "timeline",
];

const VOID_TAGS: &[&str] = &["br", "hr", "wbr"];

const URL_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "ftps://", "//", "mailto:", "news:"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WikitextError {
    #[error("markup nested deeper than {max} levels at byte {offset}")]
    TooDeep { max: usize, offset: usize },
}

/// How markup is reduced to text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripOptions {
    /// Decode character entities
    pub normalize: bool,
    /// Trim surrounding newlines and squeeze blank-line runs
    pub collapse: bool,
    /// Keep template parameter values instead of dropping templates entirely
    pub keep_template_params: bool,
}

impl Default for StripOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            collapse: true,
            keep_template_params: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Comment,
    Template {
        name: Vec<Node>,
        params: Vec<Param>,
    },
    Argument {
        name: Vec<Node>,
        default: Option<Vec<Node>>,
    },
    Wikilink {
        target: Vec<Node>,
        label: Option<Vec<Node>>,
    },
    ExternalLink {
        url: String,
        label: Option<Vec<Node>>,
    },
    Heading {
        level: usize,
        title: Vec<Node>,
    },
    Tag {
        name: String,
        contents: Vec<Node>,
    },
    Entity {
        raw: String,
        value: String,
    },
    /// Quote runs, list bullets, horizontal rules
    Markup,
    /// `{| ... |}`: optional caption plus rows of cells
    Table {
        caption: Option<Vec<Node>>,
        rows: Vec<Vec<Vec<Node>>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub value: Vec<Node>,
}

/// Parse and strip in one step
pub fn strip_code(wikitext: &str, options: StripOptions) -> Result<String, WikitextError> {
    let nodes = parse(wikitext)?;
    Ok(strip_nodes(&nodes, &options))
}

/// Parse wikitext into nodes
pub fn parse(wikitext: &str) -> Result<Vec<Node>, WikitextError> {
    let mut parser = Parser::new(wikitext);
    let (nodes, _) = parser.parse_nodes(&[]);
    match parser.overflow {
        Some(offset) => Err(WikitextError::TooDeep {
            max: MAX_DEPTH,
            offset,
        }),
        None => Ok(nodes),
    }
}

/// Strip a node list down to text
pub fn strip_nodes(nodes: &[Node], options: &StripOptions) -> String {
    let mut joined = String::new();
    for node in nodes {
        if let Some(stripped) = strip_node(node, options) {
            joined.push_str(&stripped);
        }
    }

    if !options.collapse {
        return joined;
    }

    let mut collapsed = joined.trim_matches('\n').to_string();
    while collapsed.contains("\n\n\n") {
        collapsed = collapsed.replace("\n\n\n", "\n\n");
    }
    collapsed
}

fn strip_node(node: &Node, options: &StripOptions) -> Option<String> {
    match node {
        Node::Text(text) => Some(text.clone()),
        Node::Comment | Node::Markup => None,
        Node::Template { params, .. } => {
            if !options.keep_template_params {
                return None;
            }
            let parts: Vec<String> = params
                .iter()
                .map(|p| strip_nodes(&p.value, options))
                .filter(|s| !s.is_empty())
                .collect();
            Some(parts.join(" "))
        }
        Node::Argument { default, .. } => default.as_ref().map(|d| strip_nodes(d, options)),
        Node::Wikilink { target, label } => match label {
            Some(label) => Some(strip_nodes(label, options)),
            None => Some(strip_nodes(target, options)),
        },
        Node::ExternalLink { label, .. } => label.as_ref().map(|l| strip_nodes(l, options)),
        Node::Heading { title, .. } => Some(strip_nodes(title, options).trim().to_string()),
        Node::Tag { name, contents } => {
            if INVISIBLE_TAGS.contains(&name.as_str()) || contents.is_empty() {
                None
            } else {
                Some(strip_nodes(contents, options))
            }
        }
        Node::Entity { raw, value } => {
            if options.normalize {
                Some(value.clone())
            } else {
                Some(raw.clone())
            }
        }
        Node::Table { caption, rows } => {
            let mut lines = Vec::new();
            if let Some(caption) = caption {
                let text = strip_nodes(caption, options);
                if !text.trim().is_empty() {
                    lines.push(text.trim().to_string());
                }
            }
            for row in rows {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| strip_nodes(cell, options).trim().to_string())
                    .filter(|cell| !cell.is_empty())
                    .collect();
                if !cells.is_empty() {
                    lines.push(cells.join(" "));
                }
            }
            Some(lines.join("\n"))
        }
    }
}

/// Constructs that can fail and be retried as text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Construct {
    Template,
    Argument,
    Wikilink,
}

impl Construct {
    fn brackets(self) -> (&'static str, &'static str) {
        match self {
            Construct::Template => ("{{", "}}"),
            Construct::Argument => ("{{{", "}}}"),
            Construct::Wikilink => ("[[", "]]"),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    end: usize,
    depth: usize,
    /// (start, end bound, construct) attempts already known to fail
    failed: HashSet<(usize, usize, Construct)>,
    /// First offset where nesting hit MAX_DEPTH inside constructs that closed
    overflow: Option<usize>,
    last_braces: Option<usize>,
    last_brackets: Option<usize>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            end: src.len(),
            depth: 0,
            failed: HashSet::new(),
            overflow: None,
            last_braces: src.rfind("}}"),
            last_brackets: src.rfind("]]"),
        }
    }

    /// Whether `close` occurs between `from` and the current bound
    fn closes_after(&self, from: usize, close: &str) -> bool {
        let last = if close.starts_with(']') {
            self.last_brackets
        } else {
            self.last_braces
        };
        match last {
            Some(last) if last >= from => self
                .src
                .get(from..self.end)
                .map_or(false, |rest| rest.contains(close)),
            _ => false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..self.end]
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src.as_bytes()[self.pos - 1] == b'\n'
    }

    /// Enter one nesting level. At the limit the offset is remembered and the
    /// caller treats the construct as text. An enclosing bracket attempt that
    /// turns out unclosed rolls the record back, so only nesting of closed
    /// constructs fails the parse.
    fn descend(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            self.overflow.get_or_insert(self.pos);
            return false;
        }
        self.depth += 1;
        true
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    /// Parse `src[start..end]` one level deeper. Returns the nodes, the stop
    /// reached and the position where parsing ended. The caller's position and
    /// bound are restored. At the depth limit the range comes back as text.
    fn parse_range(
        &mut self,
        start: usize,
        end: usize,
        stops: &[&'static str],
    ) -> (Vec<Node>, Option<&'static str>, usize) {
        if !self.descend() {
            return (vec![Node::Text(self.src[start..end].to_string())], None, end);
        }
        let (saved_pos, saved_end) = (self.pos, self.end);
        self.pos = start;
        self.end = end;

        let (nodes, stop) = self.parse_nodes(stops);
        let stopped_at = self.pos;

        self.pos = saved_pos;
        self.end = saved_end;
        self.ascend();

        (nodes, stop, stopped_at)
    }

    /// Parse a detached piece of text (a table cell) one level deeper
    fn parse_fragment(&mut self, text: &str) -> Vec<Node> {
        if !self.descend() {
            return vec![Node::Text(text.to_string())];
        }
        let mut sub = Parser::new(text);
        sub.depth = self.depth;
        let (nodes, _) = sub.parse_nodes(&[]);
        if sub.overflow.is_some() {
            self.overflow.get_or_insert(self.pos);
        }
        self.ascend();
        nodes
    }

    /// Parse until one of `stops` or the bound. Returns the stop that ended the
    /// run (not consumed), or None at the bound.
    fn parse_nodes(&mut self, stops: &[&'static str]) -> (Vec<Node>, Option<&'static str>) {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while self.pos < self.end {
            let rest = self.rest();
            if let Some(stop) = stops.iter().find(|s| rest.starts_with(**s)) {
                flush_text(&mut text, &mut nodes);
                return (nodes, Some(*stop));
            }

            let start = self.pos;
            if let Some(node) = self.try_construct() {
                flush_text(&mut text, &mut nodes);
                nodes.push(node);
                continue;
            }
            self.pos = start;

            let ch = rest.chars().next().unwrap_or_default();
            text.push(ch);
            self.pos += ch.len_utf8();
        }

        flush_text(&mut text, &mut nodes);
        (nodes, None)
    }

    fn try_construct(&mut self) -> Option<Node> {
        let rest = self.rest();

        if self.at_line_start() {
            if rest.starts_with("{|") {
                return self.try_table();
            }
            if rest.starts_with('=') {
                if let Some(node) = self.try_heading() {
                    return Some(node);
                }
            }
            if rest.starts_with("----") {
                self.pos += rest.bytes().take_while(|b| *b == b'-').count();
                return Some(Node::Markup);
            }
            let markers = rest
                .bytes()
                .take_while(|b| matches!(b, b'*' | b'#' | b':' | b';'))
                .count();
            if markers > 0 {
                self.pos += markers;
                return Some(Node::Markup);
            }
        }

        if rest.starts_with("<!--") {
            self.pos += match rest.find("-->") {
                Some(end) => end + 3,
                None => rest.len(),
            };
            return Some(Node::Comment);
        }
        if rest.starts_with("{{{") {
            if let Some(node) = self.attempt(Construct::Argument) {
                return Some(node);
            }
        }
        if rest.starts_with("{{") {
            return self.attempt(Construct::Template);
        }
        if rest.starts_with("[[") {
            return self.attempt(Construct::Wikilink);
        }
        if rest.starts_with('[') {
            return self.try_external_link();
        }
        if rest.starts_with("''") {
            self.pos += if rest.starts_with("'''") { 3 } else { 2 };
            return Some(Node::Markup);
        }
        if rest.starts_with('<') {
            return self.try_tag();
        }
        if rest.starts_with('&') {
            return self.try_entity();
        }
        None
    }

    /// Run a bracketed construct, rewinding and remembering the failure when
    /// it turns out to be unclosed
    fn attempt(&mut self, construct: Construct) -> Option<Node> {
        let key = (self.pos, self.end, construct);
        if self.failed.contains(&key) {
            return None;
        }

        let (open, close) = construct.brackets();
        if !self.closes_after(self.pos + open.len(), close) {
            self.failed.insert(key);
            return None;
        }

        let start = self.pos;
        let overflow = self.overflow;
        if !self.descend() {
            return None;
        }
        let node = match construct {
            Construct::Template => self.template_body(),
            Construct::Argument => self.argument_body(),
            Construct::Wikilink => self.wikilink_body(),
        };
        self.ascend();

        if node.is_none() {
            self.failed.insert(key);
            self.pos = start;
            self.overflow = overflow;
        }
        node
    }

    fn template_body(&mut self) -> Option<Node> {
        self.pos += 2;
        let (name, mut stop) = self.parse_nodes(&["}}", "|"]);
        let mut params = Vec::new();
        while stop == Some("|") {
            self.pos += 1;
            let (value, next) = self.parse_nodes(&["}}", "|"]);
            params.push(split_param(value));
            stop = next;
        }
        stop?;
        self.pos += 2;
        Some(Node::Template { name, params })
    }

    fn argument_body(&mut self) -> Option<Node> {
        self.pos += 3;
        let (name, stop) = self.parse_nodes(&["}}}", "|"]);
        let default = match stop? {
            "|" => {
                self.pos += 1;
                let (default, stop) = self.parse_nodes(&["}}}"]);
                stop?;
                Some(default)
            }
            _ => None,
        };
        self.pos += 3;
        Some(Node::Argument { name, default })
    }

    fn wikilink_body(&mut self) -> Option<Node> {
        self.pos += 2;
        let (target, stop) = self.parse_nodes(&["]]", "|"]);
        let label = match stop? {
            "|" => {
                self.pos += 1;
                let (label, stop) = self.parse_nodes(&["]]"]);
                stop?;
                Some(label)
            }
            _ => None,
        };
        self.pos += 2;
        Some(Node::Wikilink { target, label })
    }

    fn try_table(&mut self) -> Option<Node> {
        let len = table_len(self.rest())?;
        let layout = split_table(&self.rest()[..len]);

        let caption = layout.caption.map(|c| self.parse_fragment(&c));
        let mut rows = Vec::with_capacity(layout.rows.len());
        for row in layout.rows {
            let cells: Vec<Vec<Node>> = row.iter().map(|cell| self.parse_fragment(cell)).collect();
            rows.push(cells);
        }

        self.pos += len;
        Some(Node::Table { caption, rows })
    }

    fn try_heading(&mut self) -> Option<Node> {
        let rest = self.rest();
        let line_len = rest.find('\n').unwrap_or(rest.len());
        let line = &rest[..line_len];

        let caps = HEADING_REGEX.captures(line)?;
        let (open, title, close) = (caps.get(1)?, caps.get(2)?, caps.get(3)?);

        let level = open.len().min(close.len());
        // Unbalanced markers stay in the title: "=== a ==" is level 2 titled "= a"
        let title_start = self.pos + level;
        let title_end = self.pos + title.end() + (close.len() - level);

        let (title, _, _) = self.parse_range(title_start, title_end, &[]);
        self.pos += line_len;
        Some(Node::Heading { level, title })
    }

    fn try_external_link(&mut self) -> Option<Node> {
        let start = self.pos;
        let after = &self.rest()[1..];
        let lowered = after.to_ascii_lowercase();
        if !URL_SCHEMES.iter().any(|s| lowered.starts_with(s)) {
            return None;
        }

        let url_len = after
            .find(|c: char| c.is_whitespace() || c == ']')
            .unwrap_or(after.len());
        let url = after[..url_len].to_string();
        self.pos += 1 + url_len;

        if self.rest().starts_with(']') {
            self.pos += 1;
            return Some(Node::ExternalLink { url, label: None });
        }
        if !self.rest().starts_with(' ') {
            self.pos = start;
            return None;
        }

        // Labels end at the closing bracket and never span lines
        let line_end = match self.rest().find('\n') {
            Some(i) => self.pos + i,
            None => self.end,
        };
        if !self.src[self.pos..line_end].contains(']') {
            self.pos = start;
            return None;
        }
        let overflow = self.overflow;
        let (label, stop, stopped_at) = self.parse_range(self.pos + 1, line_end, &["]"]);
        if stop.is_none() {
            if self.depth < MAX_DEPTH {
                self.overflow = overflow;
            }
            self.pos = start;
            return None;
        }
        self.pos = stopped_at + 1;
        Some(Node::ExternalLink {
            url,
            label: Some(label),
        })
    }

    fn try_tag(&mut self) -> Option<Node> {
        let rest = self.rest();
        let caps = TAG_NAME_REGEX.captures(rest)?;
        let name = caps[1].to_ascii_lowercase();
        let open_len = rest.find('>')? + 1;

        if rest[..open_len].ends_with("/>") || VOID_TAGS.contains(&name.as_str()) {
            self.pos += open_len;
            return Some(Node::Tag {
                name,
                contents: Vec::new(),
            });
        }

        let raw = RAW_TAGS.contains(&name.as_str());
        let (close_at, close_len) = find_closing_tag(&rest[open_len..], &name, !raw)?;

        let contents_start = self.pos + open_len;
        let contents_end = contents_start + close_at;
        let contents = if raw {
            vec![Node::Text(self.src[contents_start..contents_end].to_string())]
        } else {
            self.parse_range(contents_start, contents_end, &[]).0
        };

        self.pos = contents_end + close_len;
        Some(Node::Tag { name, contents })
    }

    fn try_entity(&mut self) -> Option<Node> {
        let raw = ENTITY_REGEX.find(self.rest())?.as_str();
        let value = html_escape::decode_html_entities(raw);
        if value == raw {
            return None;
        }
        self.pos += raw.len();
        Some(Node::Entity {
            raw: raw.to_string(),
            value: value.into_owned(),
        })
    }
}

fn flush_text(text: &mut String, nodes: &mut Vec<Node>) {
    if !text.is_empty() {
        nodes.push(Node::Text(std::mem::take(text)));
    }
}

/// Split `name=value` when the first text node holds an `=`
fn split_param(mut value: Vec<Node>) -> Param {
    if let Some(Node::Text(first)) = value.first_mut() {
        if let Some(eq) = first.find('=') {
            let name = first[..eq].trim().to_string();
            let remainder = first[eq + 1..].to_string();
            if remainder.is_empty() {
                value.remove(0);
            } else {
                *first = remainder;
            }
            return Param {
                name: Some(name),
                value,
            };
        }
    }
    Param { name: None, value }
}

/// Locate `</name>` for a tag whose body starts `body`, skipping nested tags
/// of the same name when `nested`. Returns (offset, length) of the closing tag.
fn find_closing_tag(body: &str, name: &str, nested: bool) -> Option<(usize, usize)> {
    let lower = body.to_ascii_lowercase();
    let mut depth = 0usize;
    let mut from = 0;

    while let Some(rel) = lower[from..].find('<') {
        let at = from + rel;
        let after = &lower[at + 1..];
        if let Some(closing) = after.strip_prefix('/') {
            if tag_name_is(closing, name) {
                let len = lower[at..].find('>')? + 1;
                if depth == 0 {
                    return Some((at, len));
                }
                depth -= 1;
            }
        } else if nested && tag_name_is(after, name) {
            if let Some(len) = lower[at..].find('>') {
                if !lower[at..=at + len].ends_with("/>") {
                    depth += 1;
                }
            }
        }
        from = at + 1;
    }
    None
}

/// `s` starts with exactly the tag name `name` ("b" does not match "blockquote")
fn tag_name_is(s: &str, name: &str) -> bool {
    match s.strip_prefix(name) {
        Some(tail) => tail
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '>' || c == '/'),
        None => false,
    }
}

/// Byte length of the `{| ... |}` block at the start of `s`, nested tables included
fn table_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'|' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'|' && bytes[i + 1] == b'}' && depth > 0 {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Raw caption and cell texts of a table block, table markup removed
#[derive(Debug, Default, PartialEq)]
struct TableLayout {
    caption: Option<String>,
    rows: Vec<Vec<String>>,
}

impl TableLayout {
    /// Continuation lines belong to the last cell (or the caption)
    fn append(&mut self, in_caption: bool, text: &str) {
        let target = if in_caption {
            self.caption.as_mut()
        } else {
            self.rows.last_mut().and_then(|row| row.last_mut())
        };
        if let Some(target) = target {
            target.push('\n');
            target.push_str(text);
        }
    }

    fn push_cells(&mut self, line: &str, separators: &[&str]) {
        let mut parts = vec![line];
        for sep in separators {
            parts = parts.into_iter().flat_map(|p| p.split(*sep)).collect();
        }
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        if let Some(row) = self.rows.last_mut() {
            row.extend(parts.into_iter().map(|p| cell_content(p).to_string()));
        }
    }
}

fn split_table(block: &str) -> TableLayout {
    let inner = &block[2..block.len() - 2];
    // The opening line only carries table attributes
    let mut rest = match inner.find('\n') {
        Some(i) => &inner[i + 1..],
        None => "",
    };

    let mut layout = TableLayout::default();
    let mut in_caption = false;
    let is_blank = |c: char| c == ' ' || c == '\t';

    while !rest.is_empty() {
        let line_start = rest.trim_start_matches(is_blank);
        if line_start.starts_with("{|") {
            if let Some(len) = table_len(line_start) {
                let indent = rest.len() - line_start.len();
                layout.append(in_caption, &rest[..indent + len]);
                rest = &rest[indent + len..];
                continue;
            }
        }

        let line_len = rest.find('\n').unwrap_or(rest.len());
        let line = rest[..line_len].trim_start_matches(is_blank);
        rest = rest.get(line_len + 1..).unwrap_or("");

        if line.starts_with("|-") {
            layout.rows.push(Vec::new());
            in_caption = false;
        } else if let Some(caption) = line.strip_prefix("|+") {
            layout.caption = Some(cell_content(caption).to_string());
            in_caption = true;
        } else if let Some(cells) = line.strip_prefix('|') {
            layout.push_cells(cells, &["||"]);
            in_caption = false;
        } else if let Some(cells) = line.strip_prefix('!') {
            layout.push_cells(cells, &["!!", "||"]);
            in_caption = false;
        } else {
            layout.append(in_caption, line);
        }
    }
    layout
}

/// Drop the `attrs |` prefix of a cell; pipes inside links and templates don't count
fn cell_content(cell: &str) -> &str {
    let mut depth = 0i32;
    for (i, b) in cell.bytes().enumerate() {
        match b {
            b'[' | b'{' => depth += 1,
            b']' | b'}' => depth -= 1,
            b'|' if depth <= 0 => return &cell[i + 1..],
            _ => {}
        }
    }
    cell
}
