//! Markdown answers turned into typed content blocks plus a fixed style map.
//!
//! The front end never looks at raw markdown: it draws `Block`s and asks
//! `block_style`/`inline_style` how each kind should look. Table cells are
//! toned by keyword (confidence and traffic-light words).

use std::sync::OnceLock;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

/// Inline emphasis flags accumulated from the surrounding tags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub strong: bool,
    pub emphasis: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: InlineStyle,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: InlineStyle::default(),
        }
    }
}

/// Keyword-driven tone of a table cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTone {
    Emerald,
    Amber,
    Rose,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub spans: Vec<Span>,
    pub tone: CellTone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    List { start: Option<u64>, items: Vec<Vec<Block>> },
    Quote(Vec<Block>),
    Table { header: Vec<Cell>, rows: Vec<Vec<Cell>> },
    Code(String),
    Rule,
}

/// Node kinds the style map distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    ListMarker,
    Quote,
    TableHeader,
    TableCell(CellTone),
    Code,
    Rule,
}

/// Palette understood by the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Default,
    Bright,
    Muted,
    Rose,
    RoseLight,
    Emerald,
    Amber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStyle {
    pub tone: Tone,
    pub bold: bool,
    pub italic: bool,
    pub uppercase: bool,
    pub underline: bool,
}

impl BlockStyle {
    const fn new(tone: Tone) -> Self {
        Self {
            tone,
            bold: false,
            italic: false,
            uppercase: false,
            underline: false,
        }
    }

    const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    const fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    const fn uppercase(mut self) -> Self {
        self.uppercase = true;
        self
    }

    const fn underline(mut self) -> Self {
        self.underline = true;
        self
    }
}

pub fn block_style(kind: BlockKind) -> BlockStyle {
    match kind {
        BlockKind::Heading(1) => BlockStyle::new(Tone::Bright).bold().underline(),
        BlockKind::Heading(2) => BlockStyle::new(Tone::Bright).bold(),
        BlockKind::Heading(3) => BlockStyle::new(Tone::RoseLight).bold().uppercase(),
        BlockKind::Heading(_) => BlockStyle::new(Tone::Bright).bold(),
        BlockKind::Paragraph => BlockStyle::new(Tone::Default),
        BlockKind::ListMarker => BlockStyle::new(Tone::Rose),
        BlockKind::Quote => BlockStyle::new(Tone::Default).italic(),
        BlockKind::TableHeader => BlockStyle::new(Tone::Rose).bold().uppercase(),
        BlockKind::TableCell(CellTone::Emerald) => BlockStyle::new(Tone::Emerald).bold(),
        BlockKind::TableCell(CellTone::Amber) => BlockStyle::new(Tone::Amber).bold(),
        BlockKind::TableCell(CellTone::Rose) => BlockStyle::new(Tone::Rose).bold(),
        BlockKind::TableCell(CellTone::Default) => BlockStyle::new(Tone::Default),
        BlockKind::Code => BlockStyle::new(Tone::RoseLight),
        BlockKind::Rule => BlockStyle::new(Tone::Muted),
    }
}

/// Inline overrides applied on top of the enclosing block style.
/// `None` keeps the block's tone.
pub fn inline_tone(style: InlineStyle) -> Option<Tone> {
    if style.code {
        Some(Tone::RoseLight)
    } else if style.strong {
        Some(Tone::Rose)
    } else if style.emphasis {
        Some(Tone::Muted)
    } else {
        None
    }
}

fn emerald_re() -> &'static Regex {
    static EMERALD_RE: OnceLock<Regex> = OnceLock::new();
    EMERALD_RE.get_or_init(|| Regex::new(r"(?i)Alta|Verde|🟢").expect("valid emerald regex"))
}

fn amber_re() -> &'static Regex {
    static AMBER_RE: OnceLock<Regex> = OnceLock::new();
    AMBER_RE.get_or_init(|| Regex::new(r"(?i)Media|🟡").expect("valid amber regex"))
}

fn rose_re() -> &'static Regex {
    static ROSE_RE: OnceLock<Regex> = OnceLock::new();
    ROSE_RE.get_or_init(|| Regex::new(r"(?i)Riesgo|Baja|Rojo|🔴").expect("valid rose regex"))
}

/// Tone for a table cell. First match wins: emerald, amber, rose.
pub fn cell_tone(text: &str) -> CellTone {
    if emerald_re().is_match(text) {
        CellTone::Emerald
    } else if amber_re().is_match(text) {
        CellTone::Amber
    } else if rose_re().is_match(text) {
        CellTone::Rose
    } else {
        CellTone::Default
    }
}

pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

enum Container {
    Root(Vec<Block>),
    Quote(Vec<Block>),
    List { start: Option<u64>, items: Vec<Vec<Block>> },
    Item(Vec<Block>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Leaf {
    Paragraph,
    Heading(u8),
    Cell,
    Code,
}

#[derive(Default)]
struct TableBuilder {
    header: Vec<Cell>,
    rows: Vec<Vec<Cell>>,
    row: Vec<Cell>,
    in_head: bool,
}

struct BlockBuilder {
    stack: Vec<Container>,
    leaf: Option<Leaf>,
    spans: Vec<Span>,
    code: String,
    table: Option<TableBuilder>,
    style: InlineStyle,
    // Nesting depth per inline tag, so `**a *b* c**` keeps strong on `c`
    strong_depth: usize,
    emphasis_depth: usize,
    strike_depth: usize,
    link_depth: usize,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Container::Root(Vec::new())],
            leaf: None,
            spans: Vec::new(),
            code: String::new(),
            table: None,
            style: InlineStyle::default(),
            strong_depth: 0,
            emphasis_depth: 0,
            strike_depth: 0,
            link_depth: 0,
        }
    }

    fn run<'a>(mut self, events: impl Iterator<Item = Event<'a>>) -> Vec<Block> {
        for event in events {
            self.handle_event(event);
        }
        self.flush_leaf();
        while self.stack.len() > 1 {
            self.close_container();
        }
        match self.stack.pop() {
            Some(Container::Root(blocks)) => blocks,
            _ => Vec::new(),
        }
    }

    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(text),
            Event::Code(code) => {
                let style = InlineStyle {
                    code: true,
                    ..self.style
                };
                self.push_span(code.into_string(), style);
            }
            Event::SoftBreak => self.push_span(" ".to_string(), self.style),
            Event::HardBreak => self.push_span("\n".to_string(), self.style),
            Event::Rule => {
                self.flush_leaf();
                self.push_block(Block::Rule);
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(html),
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_span(marker.to_string(), self.style);
            }
            Event::FootnoteReference(_) => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush_leaf();
                self.leaf = Some(Leaf::Paragraph);
            }
            Tag::Heading { level, .. } => {
                self.flush_leaf();
                self.leaf = Some(Leaf::Heading(level as u8));
            }
            Tag::BlockQuote => {
                self.flush_leaf();
                self.stack.push(Container::Quote(Vec::new()));
            }
            Tag::CodeBlock(_) => {
                self.flush_leaf();
                self.leaf = Some(Leaf::Code);
                self.code.clear();
            }
            Tag::List(start) => {
                self.flush_leaf();
                self.stack.push(Container::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => {
                self.flush_leaf();
                self.stack.push(Container::Item(Vec::new()));
            }
            Tag::Table(_) => {
                self.flush_leaf();
                self.table = Some(TableBuilder::default());
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                }
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                self.spans.clear();
                self.leaf = Some(Leaf::Cell);
            }
            Tag::Emphasis => {
                self.emphasis_depth += 1;
                self.refresh_style();
            }
            Tag::Strong => {
                self.strong_depth += 1;
                self.refresh_style();
            }
            Tag::Strikethrough => {
                self.strike_depth += 1;
                self.refresh_style();
            }
            Tag::Link { .. } => {
                self.link_depth += 1;
                self.refresh_style();
            }
            Tag::HtmlBlock
            | Tag::FootnoteDefinition(_)
            | Tag::Image { .. }
            | Tag::MetadataBlock(_) => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) => self.flush_leaf(),
            TagEnd::CodeBlock => {
                let code = std::mem::take(&mut self.code);
                self.leaf = None;
                self.push_block(Block::Code(code.trim_end_matches('\n').to_string()));
            }
            TagEnd::BlockQuote | TagEnd::List(_) => {
                self.flush_leaf();
                self.close_container();
            }
            TagEnd::Item => {
                self.flush_leaf();
                self.close_container();
            }
            TagEnd::TableCell => {
                let spans = std::mem::take(&mut self.spans);
                self.leaf = None;
                let tone = cell_tone(&plain_text(&spans));
                if let Some(table) = self.table.as_mut() {
                    let cell = Cell { spans, tone };
                    if table.in_head {
                        table.header.push(cell);
                    } else {
                        table.row.push(cell);
                    }
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.push_block(Block::Table {
                        header: table.header,
                        rows: table.rows,
                    });
                }
            }
            TagEnd::Emphasis => {
                self.emphasis_depth = self.emphasis_depth.saturating_sub(1);
                self.refresh_style();
            }
            TagEnd::Strong => {
                self.strong_depth = self.strong_depth.saturating_sub(1);
                self.refresh_style();
            }
            TagEnd::Strikethrough => {
                self.strike_depth = self.strike_depth.saturating_sub(1);
                self.refresh_style();
            }
            TagEnd::Link => {
                self.link_depth = self.link_depth.saturating_sub(1);
                self.refresh_style();
            }
            TagEnd::HtmlBlock
            | TagEnd::FootnoteDefinition
            | TagEnd::Image
            | TagEnd::MetadataBlock(_) => {}
        }
    }

    fn refresh_style(&mut self) {
        self.style = InlineStyle {
            strong: self.strong_depth > 0,
            emphasis: self.emphasis_depth > 0,
            strikethrough: self.strike_depth > 0,
            code: false,
            link: self.link_depth > 0,
        };
    }

    fn text(&mut self, text: CowStr<'_>) {
        if self.leaf == Some(Leaf::Code) {
            self.code.push_str(&text);
            return;
        }
        self.push_span(text.into_string(), self.style);
    }

    fn push_span(&mut self, text: String, style: InlineStyle) {
        // Tight list items carry inline content without a paragraph tag
        if self.leaf.is_none() {
            self.leaf = Some(Leaf::Paragraph);
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.spans.push(Span { text, style }),
        }
    }

    fn flush_leaf(&mut self) {
        let spans = std::mem::take(&mut self.spans);
        match self.leaf.take() {
            Some(Leaf::Paragraph) if !spans.is_empty() => self.push_block(Block::Paragraph(spans)),
            Some(Leaf::Heading(level)) => self.push_block(Block::Heading { level, spans }),
            Some(Leaf::Cell) => {
                // Cells are closed by their own end tag
                self.spans = spans;
                self.leaf = Some(Leaf::Cell);
            }
            _ => {}
        }
    }

    fn push_block(&mut self, block: Block) {
        match self.stack.last_mut() {
            Some(Container::Root(blocks))
            | Some(Container::Quote(blocks))
            | Some(Container::Item(blocks)) => blocks.push(block),
            Some(Container::List { items, .. }) => items.push(vec![block]),
            None => {}
        }
    }

    fn close_container(&mut self) {
        let Some(container) = self.stack.pop() else {
            return;
        };
        match container {
            Container::Quote(blocks) => self.push_block(Block::Quote(blocks)),
            Container::List { start, items } => self.push_block(Block::List { start, items }),
            Container::Item(blocks) => {
                if let Some(Container::List { items, .. }) = self.stack.last_mut() {
                    items.push(blocks);
                } else {
                    for block in blocks {
                        self.push_block(block);
                    }
                }
            }
            Container::Root(blocks) => {
                // Root never closes early; put it back
                self.stack.push(Container::Root(blocks));
            }
        }
    }
}

/// Parse `input` (GitHub-flavored: tables, strikethrough, task lists) into
/// blocks.
pub fn parse_blocks(input: &str) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    BlockBuilder::new().run(Parser::new_ext(input, options))
}

struct CleanRule {
    re: Regex,
    replacement: &'static str,
}

fn clean_rules() -> &'static [CleanRule] {
    static CLEAN_RULES: OnceLock<Vec<CleanRule>> = OnceLock::new();
    CLEAN_RULES.get_or_init(|| {
        [
            // Headers
            (r"(?m)^#{1,6}\s+", ""),
            // Bold/italic
            (r"\*\*(.*?)\*\*", "${1}"),
            (r"__(.*?)__", "${1}"),
            (r"\*(.*?)\*", "${1}"),
            (r"_(.*?)_", "${1}"),
            // Blockquotes
            (r"(?m)^>\s+", ""),
            // Code
            (r"(?s)```.*?```", ""),
            (r"`([^`]+)`", "${1}"),
            // Links
            (r"\[([^\]]+)\]\([^)]+\)", "${1}"),
            // Table separator rows, then pipes
            (r"(?m)^\|?[\s\-:|]+\|$", ""),
            (r"\|", " "),
            (r"\n{3,}", "\n\n"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| CleanRule {
            re: Regex::new(pattern).expect("valid clean-markdown regex"),
            replacement,
        })
        .collect()
    })
}

/// Plain-text rendition of an answer, for copying out of the app
pub fn clean_markdown(markdown: &str) -> String {
    let mut text = markdown.to_string();
    for rule in clean_rules() {
        text = rule.re.replace_all(&text, rule.replacement).into_owned();
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strong(text: &str) -> Span {
        Span {
            text: text.to_string(),
            style: InlineStyle {
                strong: true,
                ..InlineStyle::default()
            },
        }
    }

    #[test]
    fn test_cell_tone_first_match_wins() {
        assert_eq!(cell_tone("💎 ALTA"), CellTone::Emerald);
        assert_eq!(cell_tone("😐 media"), CellTone::Amber);
        assert_eq!(cell_tone("Riesgo"), CellTone::Rose);
        assert_eq!(cell_tone("🔴"), CellTone::Rose);
        assert_eq!(cell_tone("@1.90"), CellTone::Default);
        // Both amber and rose words: amber is checked first
        assert_eq!(cell_tone("Media / Baja"), CellTone::Amber);
        // Emerald beats everything
        assert_eq!(cell_tone("Baja pero Verde"), CellTone::Emerald);
    }

    #[test]
    fn test_heading_and_paragraph() {
        let blocks = parse_blocks("# 🐂 Betis vs Sevilla\n\nTexto con **dato** clave.");
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    spans: vec![Span::plain("🐂 Betis vs Sevilla")],
                },
                Block::Paragraph(vec![
                    Span::plain("Texto con "),
                    strong("dato"),
                    Span::plain(" clave."),
                ]),
            ]
        );
    }

    #[test]
    fn test_table_cells_are_toned() {
        let md = "| Mercado | Pick | Confianza |\n\
                  | :--- | :--- | :--- |\n\
                  | 🏆 Ganador | Betis | 💎 ALTA |\n\
                  | 🥅 Goles | Over 2.5 | 😐 MEDIA |\n";
        let blocks = parse_blocks(md);
        let Block::Table { header, rows } = &blocks[0] else {
            panic!("expected table, got {:?}", blocks);
        };
        assert_eq!(header.len(), 3);
        assert_eq!(plain_text(&header[0].spans), "Mercado");
        assert_eq!(rows.len(), 2);
        assert_eq!(plain_text(&rows[0][1].spans), "Betis");
        assert_eq!(rows[0][2].tone, CellTone::Emerald);
        assert_eq!(rows[1][2].tone, CellTone::Amber);
        assert_eq!(rows[0][0].tone, CellTone::Default);
    }

    #[test]
    fn test_tight_list_items_become_paragraphs() {
        let blocks = parse_blocks("*   **Árbitro:** Mateu\n*   **Bajas:** ninguna\n");
        let Block::List { start, items } = &blocks[0] else {
            panic!("expected list, got {:?}", blocks);
        };
        assert_eq!(*start, None);
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            vec![Block::Paragraph(vec![strong("Árbitro:"), Span::plain(" Mateu")])]
        );
    }

    #[test]
    fn test_quote_and_rule() {
        let blocks = parse_blocks("### 💎 LA JOYA\n> **Saka tiros**\n>\n> *Evidencia*\n\n---\n");
        assert!(matches!(blocks[0], Block::Heading { level: 3, .. }));
        let Block::Quote(inner) = &blocks[1] else {
            panic!("expected quote, got {:?}", blocks);
        };
        assert_eq!(inner.len(), 2);
        assert_eq!(blocks[2], Block::Rule);
    }

    #[test]
    fn test_code_block() {
        let blocks = parse_blocks("```\nline 1\nline 2\n```\n");
        assert_eq!(blocks, vec![Block::Code("line 1\nline 2".to_string())]);
    }

    #[test]
    fn test_style_map() {
        assert!(block_style(BlockKind::Heading(1)).underline);
        assert_eq!(block_style(BlockKind::Heading(3)).tone, Tone::RoseLight);
        assert!(block_style(BlockKind::Quote).italic);
        assert_eq!(block_style(BlockKind::TableCell(CellTone::Rose)).tone, Tone::Rose);
        assert_eq!(inline_tone(strong("x").style), Some(Tone::Rose));
        assert_eq!(inline_tone(InlineStyle::default()), None);
    }

    #[test]
    fn test_clean_markdown_strips_formatting() {
        let md = "# 🐂 Betis vs Sevilla\n\n\
                  | Mercado | Pick |\n\
                  | :--- | :--- |\n\
                  | 🏆 Ganador | **Betis** |\n\n\n\n\
                  > *Dato* con [fuente](https://x.example) y `código`";
        let clean = clean_markdown(md);
        assert!(clean.starts_with("🐂 Betis vs Sevilla"));
        assert!(!clean.contains('|'));
        assert!(!clean.contains("**"));
        assert!(!clean.contains(":---"));
        assert!(clean.contains("Dato con fuente y código"));
        assert!(!clean.contains("\n\n\n"));
    }
}
