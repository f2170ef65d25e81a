use matadorbets_core::markdown::{
    self, block_style, inline_tone, plain_text, Block as MdBlock, BlockKind, BlockStyle, Cell,
    InlineStyle, Span as MdSpan, Tone,
};
use matadorbets_core::persona::{CLEAR_HISTORY_PROMPT, SUGGESTIONS};
use matadorbets_core::{ChatRole, Config, ConversationMessage, GroundingChunk, MessageContent};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

pub const DISCLAIMER: &str = "Matadorbets usa IA + Google. Apuesta con responsabilidad. +18";
const INPUT_PLACEHOLDER: &str = "Pregunta al Matador (Ej: Real Madrid vs Barça...)";
const INPUT_WAITING: &str = "Esperando análisis...";
const HISTORY_EMPTY: &str = "No hay análisis guardados.";
const HISTORY_NO_MATCH: &str = "Ningún análisis coincide con la búsqueda.";
const DETAIL_PLACEHOLDER: &str = "Selecciona un partido del historial";
const SOURCES_TITLE: &str = "Fuentes del Matador";
const API_KEY_URL: &str = "https://aistudio.google.com/app/apikey";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, status_area, suggestions_area, input_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_status(app, frame, status_area);
    render_suggestions(app, frame, suggestions_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Popups, lowest first
    if app.history_panel.is_some() {
        render_history(app, frame, area);
    }
    if app.confirm_clear {
        render_confirm_clear(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let model = app.model_name().unwrap_or("sin API Key");
    let saved = if app.history.is_empty() {
        String::new()
    } else {
        format!(" [{} guardados]", app.history.len())
    };

    let title = Line::from(vec![
        Span::styled(" 🐂 Matadorbets ", Style::default().fg(Color::LightRed).bold()),
        Span::styled("AI Analyst ", Style::default().fg(Color::Gray)),
        Span::styled(model.to_string(), Style::default().fg(Color::DarkGray)),
        Span::styled(saved, Style::default().fg(Color::DarkGray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);

    let mut lines: Vec<Line<'static>> = Vec::new();
    for message in app.chat.messages() {
        lines.extend(message_lines(message, inner_width as usize));
        lines.push(Line::default());
    }

    let total = wrapped_height(&lines, inner_width);
    app.set_chat_max_scroll(total.saturating_sub(inner_height));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let line = if app.is_loading() {
        Line::from(Span::styled(
            format!(" {}", app.loading_message()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(status) = &app.status {
        Line::from(Span::styled(format!(" {}", status), Style::default().fg(Color::LightGreen)))
    } else {
        Line::from(Span::styled(format!(" {}", DISCLAIMER), Style::default().fg(Color::DarkGray)))
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_suggestions(app: &App, frame: &mut Frame, area: Rect) {
    let (key_style, label_style) = if app.is_loading() {
        (Style::default().fg(Color::DarkGray), Style::default().fg(Color::DarkGray))
    } else {
        (
            Style::default().bg(Color::DarkGray).fg(Color::White),
            Style::default().fg(Color::Gray),
        )
    };

    let spans: Vec<Span> = SUGGESTIONS
        .iter()
        .enumerate()
        .flat_map(|(i, suggestion)| {
            [
                Span::styled(format!(" F{} ", i + 1), key_style),
                Span::styled(format!(" {} ", suggestion.label), label_style),
            ]
        })
        .collect();

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let overlay_open = app.history_panel.is_some() || app.confirm_clear;
    let border_color = if app.is_loading() || overlay_open {
        Color::DarkGray
    } else {
        Color::LightRed
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Pregunta al Matador ");

    if app.input.is_empty() {
        let placeholder = if app.is_loading() { INPUT_WAITING } else { INPUT_PLACEHOLDER };
        let input = Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
            .block(input_block);
        frame.render_widget(input, area);
        if !overlay_open && !app.is_loading() {
            frame.set_cursor_position((area.x + 1, area.y + 1));
        }
    } else {
        // Horizontal scrolling keeps the cursor inside the box
        let inner_width = area.width.saturating_sub(2) as usize;
        let cursor_pos = app.input_cursor;
        let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
            0
        } else {
            cursor_pos - inner_width + 1
        };

        let visible_text: String = app.input.chars().skip(scroll_offset).take(inner_width).collect();
        let input = Paragraph::new(visible_text)
            .style(Style::default().fg(Color::Cyan))
            .block(input_block);
        frame.render_widget(input, area);

        if !overlay_open {
            let before_cursor: String = app
                .input
                .chars()
                .skip(scroll_offset)
                .take(cursor_pos - scroll_offset)
                .collect();
            let cursor_x = text_width(&before_cursor) as u16;
            frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
        }
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style, keys): (&str, Style, &[(&str, &str)]) = if app.confirm_clear {
        (
            " CONFIRMAR ",
            Style::default().bg(Color::Red).fg(Color::White),
            &[("y", "sí"), ("n", "no")],
        )
    } else if app
        .history_panel
        .as_ref()
        .is_some_and(|panel| panel.open_id.is_some())
    {
        (
            " HISTORIAL ",
            Style::default().bg(Color::Magenta).fg(Color::White),
            &[
                ("↑/↓", "scroll"),
                ("^Y", "copiar"),
                ("Esc", "volver"),
                ("^D", "borrar"),
                ("^H", "cerrar"),
            ],
        )
    } else if app.history_panel.is_some() {
        (
            " HISTORIAL ",
            Style::default().bg(Color::Magenta).fg(Color::White),
            &[
                ("abc", "buscar"),
                ("↑/↓", "nav"),
                ("Enter", "abrir"),
                ("^D", "borrar"),
                ("Esc", "cerrar"),
            ],
        )
    } else {
        (
            " CHAT ",
            Style::default().bg(Color::LightRed).fg(Color::Black),
            &[
                ("Enter", "enviar"),
                ("F1-F6", "sugerencias"),
                ("^H", "historial"),
                ("^Y", "copiar"),
                ("^S", "compartir"),
                ("^D", "borrar"),
                ("PgUp/PgDn", "scroll"),
                ("^C", "salir"),
            ],
        )
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)];
    for (key, label) in keys {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area.width * 9 / 10, area.height * 17 / 20, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::LightRed))
        .title(" 📜 Historial de Análisis ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [list_column, detail_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(inner);
    let [search_area, list_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(list_column);

    // Search box
    let search = app
        .history_panel
        .as_ref()
        .map(|panel| panel.search.clone())
        .unwrap_or_default();
    let search_line = if search.is_empty() {
        Span::styled("Buscar por equipo o fecha (d/m/aaaa)...", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(search, Style::default().fg(Color::Cyan))
    };
    let search_box = Paragraph::new(search_line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" 🔎 "),
    );
    frame.render_widget(search_box, search_area);

    // Entry list
    let items: Vec<ListItem<'static>> = app
        .history_results()
        .iter()
        .map(|item| {
            ListItem::new(vec![
                Line::from(Span::styled(
                    item.match_title.clone(),
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                )),
                Line::from(vec![
                    Span::styled(item.display_date(), Style::default().fg(Color::DarkGray)),
                    Span::raw("  "),
                    Span::styled(item.summary.clone(), Style::default().fg(Color::LightGreen)),
                ]),
            ])
        })
        .collect();

    if items.is_empty() {
        let text = if app.history.is_empty() { HISTORY_EMPTY } else { HISTORY_NO_MATCH };
        let empty = Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray)))
            .wrap(Wrap { trim: true });
        let padded = Rect::new(
            list_area.x + 1,
            list_area.y + 1,
            list_area.width.saturating_sub(2),
            list_area.height.saturating_sub(2),
        );
        frame.render_widget(empty, padded);
    } else if let Some(panel) = app.history_panel.as_mut() {
        let list = List::new(items)
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, list_area, &mut panel.list_state);
    }

    // Detail pane
    let detail_width = detail_area.width.saturating_sub(2);
    let detail = app.opened_history_item().map(|item| {
        (item.match_title.clone(), message_lines(&item.as_message(), detail_width as usize))
    });

    match detail {
        Some((title, lines)) => {
            let visible = detail_area.height.saturating_sub(2);
            let total = wrapped_height(&lines, detail_width);
            app.set_history_detail_max_scroll(total.saturating_sub(visible));
            let detail_scroll = app.history_panel.as_ref().map_or(0, |panel| panel.detail_scroll);

            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed))
                .title(format!(" {} ", title));
            let paragraph = Paragraph::new(Text::from(lines))
                .block(block)
                .wrap(Wrap { trim: false })
                .scroll((detail_scroll, 0));
            frame.render_widget(paragraph, detail_area);
        }
        None => {
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray));
            let placeholder = Paragraph::new(Span::styled(
                DETAIL_PLACEHOLDER,
                Style::default().fg(Color::DarkGray),
            ))
            .centered()
            .block(block);
            frame.render_widget(placeholder, detail_area);
        }
    }
}

fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(50, 5, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Borrar historial ");

    let text = Text::from(vec![
        Line::from(CLEAR_HISTORY_PROMPT),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::Red).fg(Color::White)),
            Span::raw(" sí   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" no"),
        ]),
    ]);

    frame.render_widget(Paragraph::new(text).centered().block(block), popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Rows the lines take once word-wrapped to `width`, the same way the
/// chat and detail paragraphs wrap them
fn wrapped_height(lines: &[Line<'static>], width: u16) -> u16 {
    Paragraph::new(Text::from(lines.to_vec()))
        .wrap(Wrap { trim: false })
        .line_count(width.max(1))
        .try_into()
        .unwrap_or(u16::MAX)
}

fn text_width(text: &str) -> usize {
    Span::raw(text).width()
}

// Message rendering

pub fn message_lines(message: &ConversationMessage, width: usize) -> Vec<Line<'static>> {
    let time = message.timestamp.format("%H:%M").to_string();
    let time_style = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();

    match message.role {
        ChatRole::User => {
            lines.push(Line::from(vec![
                Span::styled("Tú", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Span::styled(format!(" · {}", time), time_style),
            ]));
            // Literal text: user input is never interpreted as markdown
            for line in message.text().lines() {
                lines.push(Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::Cyan),
                )));
            }
        }
        ChatRole::Model => {
            let (label, color) = if message.is_error {
                ("⚠ El Matador", Color::Red)
            } else {
                ("🐂 El Matador", Color::LightRed)
            };
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::styled(format!(" · {}", time), time_style),
            ]));

            match &message.content {
                MessageContent::SetupNotice => lines.extend(setup_notice_lines()),
                MessageContent::Text(text) => {
                    lines.extend(blocks_to_lines(&markdown::parse_blocks(text), width))
                }
            }
            lines.extend(citation_lines(&message.grounding_chunks));
        }
    }

    lines
}

fn setup_notice_lines() -> Vec<Line<'static>> {
    let config_path = Config::get_config_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "config.json".to_string());
    let step = Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD);

    vec![
        Line::from(Span::styled(
            "⚠ Configuración Necesaria",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled("Falta la API Key de Google", Style::default().fg(Color::Gray))),
        Line::default(),
        Line::from(vec![
            Span::styled("1. ", step),
            Span::raw("Consigue una API Key gratis en Google AI Studio: "),
            Span::styled(API_KEY_URL, Style::default().fg(Color::Cyan).underlined()),
        ]),
        Line::from(vec![
            Span::styled("2. ", step),
            Span::raw("Expórtala como variable de entorno "),
            Span::styled("API_KEY", Style::default().fg(Color::Yellow)),
            Span::raw(" (o GEMINI_API_KEY)"),
        ]),
        Line::from(vec![
            Span::styled("3. ", step),
            Span::raw("o guárdala como \"api_key\" en "),
            Span::styled(config_path, Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![Span::styled("4. ", step), Span::raw("Reinicia Matadorbets.")]),
    ]
}

fn citation_lines(chunks: &[GroundingChunk]) -> Vec<Line<'static>> {
    let links: Vec<(&str, &str)> = chunks.iter().filter_map(GroundingChunk::link).collect();
    if links.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            SOURCES_TITLE,
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        )),
    ];
    for (label, uri) in links {
        lines.push(Line::from(vec![
            Span::styled("  • ", Style::default().fg(Color::LightRed)),
            Span::styled(label.to_string(), Style::default().fg(Color::White)),
            Span::styled(format!("  {}", uri), Style::default().fg(Color::DarkGray).underlined()),
        ]));
    }
    lines
}

// Markdown blocks to ratatui lines

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Default => Color::Reset,
        Tone::Bright => Color::White,
        Tone::Muted => Color::DarkGray,
        Tone::Rose => Color::LightRed,
        Tone::RoseLight => Color::LightMagenta,
        Tone::Emerald => Color::LightGreen,
        Tone::Amber => Color::Yellow,
    }
}

fn to_style(block: BlockStyle) -> Style {
    let mut style = Style::default().fg(tone_color(block.tone));
    if block.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if block.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if block.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

fn span_style(block: BlockStyle, inline: InlineStyle) -> Style {
    let mut style = to_style(block);
    if let Some(tone) = inline_tone(inline) {
        style = style.fg(tone_color(tone));
    }
    if inline.strong {
        style = style.add_modifier(Modifier::BOLD);
    }
    if inline.emphasis {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if inline.strikethrough {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    if inline.link {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    style
}

/// Inline spans as lines; hard breaks start a new line
fn styled_lines(spans: &[MdSpan], block: BlockStyle) -> Vec<Line<'static>> {
    let mut lines: Vec<Vec<Span<'static>>> = vec![Vec::new()];
    for span in spans {
        let style = span_style(block, span.style);
        let text = if block.uppercase {
            span.text.to_uppercase()
        } else {
            span.text.clone()
        };
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Vec::new());
            }
            if let (false, Some(current)) = (part.is_empty(), lines.last_mut()) {
                current.push(Span::styled(part.to_string(), style));
            }
        }
    }
    lines.into_iter().map(Line::from).collect()
}

pub fn blocks_to_lines(blocks: &[MdBlock], width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        lines.extend(block_lines(block, width));
    }
    lines
}

fn block_lines(block: &MdBlock, width: usize) -> Vec<Line<'static>> {
    match block {
        MdBlock::Heading { level, spans } => styled_lines(spans, block_style(BlockKind::Heading(*level))),
        MdBlock::Paragraph(spans) => styled_lines(spans, block_style(BlockKind::Paragraph)),
        MdBlock::List { start, items } => {
            let marker_style = to_style(block_style(BlockKind::ListMarker));
            let mut lines = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let marker = match start {
                    Some(first) => format!("{}. ", first + i as u64),
                    None => "• ".to_string(),
                };
                let indent = " ".repeat(text_width(&marker));
                let item_lines = blocks_to_lines(item, width.saturating_sub(indent.len()));
                lines.extend(prefix_lines(
                    item_lines,
                    Span::styled(marker, marker_style),
                    Span::raw(indent),
                ));
            }
            lines
        }
        MdBlock::Quote(inner) => {
            let bar = Span::styled("▌ ", Style::default().fg(tone_color(Tone::Rose)));
            let quote_style = to_style(block_style(BlockKind::Quote));
            let inner_lines = blocks_to_lines(inner, width.saturating_sub(2))
                .into_iter()
                .map(|line| line.patch_style(quote_style))
                .collect();
            prefix_lines(inner_lines, bar.clone(), bar)
        }
        MdBlock::Table { header, rows } => table_lines(header, rows),
        MdBlock::Code(code) => {
            let style = to_style(block_style(BlockKind::Code));
            code.lines()
                .map(|line| Line::from(Span::styled(format!("  {}", line), style)))
                .collect()
        }
        MdBlock::Rule => vec![Line::from(Span::styled(
            "─".repeat(width.clamp(3, 60)),
            to_style(block_style(BlockKind::Rule)),
        ))],
    }
}

fn prefix_lines(
    lines: Vec<Line<'static>>,
    first: Span<'static>,
    rest: Span<'static>,
) -> Vec<Line<'static>> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let prefix = if i == 0 { first.clone() } else { rest.clone() };
            let style = line.style;
            let mut spans = vec![prefix];
            spans.extend(line.spans);
            Line::from(spans).style(style)
        })
        .collect()
}

fn table_lines(header: &[Cell], rows: &[Vec<Cell>]) -> Vec<Line<'static>> {
    let header_style = block_style(BlockKind::TableHeader);
    let header_cells: Vec<(String, Style)> = header
        .iter()
        .map(|cell| (plain_text(&cell.spans).to_uppercase(), to_style(header_style)))
        .collect();
    let body: Vec<Vec<(String, Style)>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    let style = to_style(block_style(BlockKind::TableCell(cell.tone)));
                    (plain_text(&cell.spans), style)
                })
                .collect()
        })
        .collect();

    let columns = body.iter().map(Vec::len).chain([header_cells.len()]).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in std::iter::once(&header_cells).chain(&body) {
        for (i, (text, _)) in row.iter().enumerate() {
            widths[i] = widths[i].max(text_width(text));
        }
    }

    let border = Style::default().fg(tone_color(Tone::Muted));
    let separator = widths
        .iter()
        .map(|w| "─".repeat(*w))
        .collect::<Vec<_>>()
        .join("─┼─");

    let mut lines = vec![
        table_row(&header_cells, &widths, border),
        Line::from(Span::styled(separator, border)),
    ];
    lines.extend(body.iter().map(|row| table_row(row, &widths, border)));
    lines
}

fn table_row(cells: &[(String, Style)], widths: &[usize], border: Style) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", border));
        }
        let (text, style) = cells.get(i).cloned().unwrap_or_default();
        let pad = width.saturating_sub(text_width(&text));
        spans.push(Span::styled(text, style));
        if pad > 0 {
            spans.push(Span::raw(" ".repeat(pad)));
        }
    }
    Line::from(spans)
}
