use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
};
use shapekit_core::chain::{format_ether, short_address};
use shapekit_core::normalize::preview;
use shapekit_core::payloads::ShapeNftData;
use shapekit_core::{ChatRole, ChatStatus, MessagePart, MintStatus, ToolOutcome, ToolPart, ToolState};

use crate::app::{
    AnalyticsKind, AnalyticsView, App, InputMode, Load, MintCard, Screen, ServerStatus, SUGGESTED_PROMPTS,
};

/// Items listed before the NFT panel collapses the rest into a count.
const NFT_LIST_LIMIT: usize = 5;
const TOOL_PREVIEW_CHARS: usize = 80;

const CHAT_PLACEHOLDER: &str = "Ask about a Shape collection, or how much gasback you can earn";

/// Inline `**bold**` and `` `code` `` for assistant text; everything else is literal.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let (close, style): (&str, Style) = match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                ("**", Style::default().add_modifier(Modifier::BOLD))
            }
            '`' => ("`", Style::default().fg(Color::Magenta)),
            _ => {
                current.push(c);
                continue;
            }
        };

        let rest: String = chars.clone().collect();
        match rest.find(close) {
            Some(end) if end > 0 => {
                if !current.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current)));
                }
                spans.push(Span::styled(rest[..end].to_string(), style));
                // Skip the styled text and its closing marker
                for _ in 0..rest[..end].chars().count() + close.chars().count() {
                    chars.next();
                }
            }
            _ => current.push_str(if close == "**" { "**" } else { "`" }),
        }
    }

    if !current.is_empty() {
        spans.push(Span::raw(current));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// A rect of the given percentage size, centered in `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);

    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);

    center
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn error_line(message: &str) -> Line<'static> {
    Line::from(Span::styled(format!("Error: {}", message), Style::default().fg(Color::Red)))
}

pub fn render(app: &App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, tabs_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_tabs(app, frame, tabs_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Nfts => render_nfts_screen(app, frame, body_area),
        Screen::Analytics => render_analytics_screen(app, frame, body_area),
        Screen::Greet => render_greet_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if let Some(error) = &app.fatal_error {
        render_error_screen(error, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Shape Kit ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.network.display_name(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(format!("v{}", env!("CARGO_PKG_VERSION")), dim()),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_tabs(app: &App, frame: &mut Frame, area: Rect) {
    let selected = Screen::ALL.iter().position(|s| *s == app.screen).unwrap_or(0);
    let tabs = Tabs::new(Screen::ALL.iter().map(|s| s.title()))
        .select(selected)
        .style(dim())
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    let server_style = match app.server_status {
        ServerStatus::Connected => Style::default().fg(Color::Green),
        ServerStatus::Disconnected => Style::default().fg(Color::Red),
        ServerStatus::Checking => Style::default().fg(Color::Yellow),
    };
    let server_text = match app.server_status {
        ServerStatus::Connected => " MCP ok ",
        ServerStatus::Disconnected => " MCP down ",
        ServerStatus::Checking => " MCP ... ",
    };

    let wallet_text = match (&app.wallet, app.balance) {
        (Some(address), Some(wei)) => format!(" {} {} ETH ", short_address(address), format_ether(wei, 4)),
        (Some(address), None) => format!(" {} ", short_address(address)),
        (None, _) => " no wallet ".to_string(),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    match app.input_mode {
        InputMode::Editing => {
            hints.extend(hint("Enter", "send"));
            hints.extend(hint("Esc", "done"));
        }
        InputMode::Normal => {
            hints.extend(hint("Tab", "screen"));
            if app.wallet.is_none() {
                hints.extend(hint("w", "wallet"));
            }
            match app.screen {
                Screen::Chat if app.mint_card.is_some() => {
                    hints.extend(hint("m", "mint"));
                    hints.extend(hint("x", "dismiss"));
                }
                Screen::Analytics => hints.extend(hint("h/l", "tool")),
                Screen::Nfts => hints.extend(hint("r", "refresh")),
                _ => {}
            }
            if app.screen != Screen::Nfts {
                hints.extend(hint("i", "type"));
            }
            hints.extend(hint("q", "quit"));
        }
    }

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(server_text, server_style),
        Span::styled(wallet_text, Style::default().fg(Color::Cyan)),
    ];
    if let Some(notice) = &app.notice {
        spans.push(Span::styled(format!(" {} ", notice), Style::default().fg(Color::Red)));
    }
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn input_box<'a>(title: &'a str, value: &'a str, placeholder: &'a str, active: bool, enabled: bool) -> Paragraph<'a> {
    let border = if !enabled {
        Color::DarkGray
    } else if active {
        Color::Yellow
    } else {
        Color::Gray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(format!(" {} ", title));

    if value.is_empty() {
        Paragraph::new(Span::styled(placeholder, dim())).block(block)
    } else {
        Paragraph::new(Span::styled(value, Style::default().fg(Color::Cyan))).block(block)
    }
}

fn set_cursor(app: &App, frame: &mut Frame, area: Rect, value: &str) {
    if app.input_mode == InputMode::Editing {
        let inner_width = area.width.saturating_sub(2);
        let x = (value.chars().count() as u16).min(inner_width.saturating_sub(1));
        frame.set_cursor_position((area.x + x + 1, area.y + 1));
    }
}

// Chat

fn render_chat_screen(app: &App, frame: &mut Frame, area: Rect) {
    if app.wallet.is_none() {
        render_connect_prompt(frame, area);
        return;
    }

    let notice_height = if app.chat_error.is_some() { 4 } else { 0 };
    let card_height = if app.mint_card.is_some() { 10 } else { 0 };
    let [messages_area, notice_area, card_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(notice_height),
        Constraint::Length(card_height),
        Constraint::Length(3),
    ])
    .areas(area);

    render_messages(app, frame, messages_area);

    if let Some(notice) = &app.chat_error {
        let color = if notice.rate_limited { Color::Yellow } else { Color::Red };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(Span::styled(format!(" {} ", notice.title), Style::default().fg(color).bold()));
        let body = Paragraph::new(notice.body.as_str())
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(body, notice_area);
    }

    if let Some(card) = &app.mint_card {
        render_mint_card(app, card, frame, card_area);
    }

    let enabled = app.chat_status.accepts_input();
    let title = if enabled { "Message" } else { "Message (waiting for response)" };
    let input = input_box(
        title,
        &app.chat_input,
        CHAT_PLACEHOLDER,
        app.input_mode == InputMode::Editing,
        enabled,
    );
    frame.render_widget(input, input_area);
    set_cursor(app, frame, input_area, &app.chat_input);
}

fn render_connect_prompt(frame: &mut Frame, area: Rect) {
    let text = Text::from(vec![
        Line::from(Span::styled("Connect Your Wallet", Style::default().fg(Color::Cyan).bold())),
        Line::default(),
        Line::from("Connect your wallet to start chatting with the Shape assistant."),
        Line::default(),
        Line::from(vec![
            Span::raw("Press "),
            Span::styled("w", Style::default().fg(Color::Yellow).bold()),
            Span::raw(" to connect."),
        ]),
    ]);

    let prompt = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(dim()))
        .wrap(Wrap { trim: true });
    frame.render_widget(prompt, centered_rect(60, 40, area));
}

fn tool_lines(tool: &ToolPart) -> Vec<Line<'static>> {
    let state_style = match tool.state {
        ToolState::InputStreaming | ToolState::InputAvailable => Style::default().fg(Color::Yellow),
        ToolState::OutputAvailable => Style::default().fg(Color::Green),
        ToolState::OutputError => Style::default().fg(Color::Red),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("  [tool] ", dim()),
        Span::styled(tool.tool_name.clone(), Style::default().fg(Color::Magenta)),
        Span::raw(" "),
        Span::styled(tool.state.label(), state_style),
    ])];

    if let Some(input) = &tool.input {
        let text = input.to_string();
        lines.push(Line::from(Span::styled(
            format!("    in:  {}", preview(&text, TOOL_PREVIEW_CHARS)),
            dim(),
        )));
    }
    if let Some(output) = &tool.output {
        let text = match output.as_str() {
            Some(s) => s.to_string(),
            None => output.to_string(),
        };
        lines.push(Line::from(Span::styled(
            format!("    out: {}", preview(&text, TOOL_PREVIEW_CHARS)),
            dim(),
        )));
    }
    if let Some(error) = &tool.error_text {
        lines.push(Line::from(Span::styled(
            format!("    {}", error),
            Style::default().fg(Color::Red),
        )));
    }

    lines
}

fn render_messages(app: &App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(dim())
        .title(" Shape Assistant ");

    if app.chat_messages.is_empty() {
        let mut lines = vec![
            Line::from(Span::styled(
                "Start a conversation with the Shape assistant!",
                Style::default().fg(Color::Cyan).bold(),
            )),
            Line::default(),
        ];
        for (i, suggestion) in SUGGESTED_PROMPTS.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!(" {} ", i + 1), Style::default().fg(Color::Yellow).bold()),
                Span::styled(suggestion.title, Style::default().bold()),
            ]));
            lines.push(Line::from(Span::styled(format!("   {}", suggestion.prompt), dim())));
        }

        let empty = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
        frame.render_widget(empty, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for message in &app.chat_messages {
        match message.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(message.text_content()));
            }
            ChatRole::Assistant => {
                lines.push(Line::from(Span::styled(
                    "Shape:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )));
                for part in &message.parts {
                    match part {
                        MessagePart::Text { text } => lines.extend(text.lines().map(parse_markdown_line)),
                        MessagePart::Tool(tool) => lines.extend(tool_lines(tool)),
                        MessagePart::Other { .. } => {}
                    }
                }
            }
            ChatRole::System => continue,
        }
        lines.push(Line::default());
    }

    let waiting = app.chat_status == ChatStatus::Submitted
        || (app.chat_status == ChatStatus::Streaming
            && app.chat_messages.last().map_or(false, |m| m.parts.is_empty()));
    if waiting {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            dim().add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_mint_card(app: &App, card: &MintCard, frame: &mut Frame, area: Rect) {
    let tx = &card.transaction;
    let status_style = match card.status {
        MintStatus::Ready => Style::default().fg(Color::Cyan),
        MintStatus::Signing => Style::default().fg(Color::Yellow),
        MintStatus::Confirmed(_) => Style::default().fg(Color::Green),
        MintStatus::Failed(_) => Style::default().fg(Color::Red),
    };

    let nft = tx.metadata.nft_metadata.clone().unwrap_or_default();
    let name = nft.name.unwrap_or_else(|| "Shape NFT".to_string());

    let field = |label: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("{:<10}", label), dim()), Span::raw(value)])
    };

    let mut lines = vec![
        Line::from(Span::styled(card.status.label(), status_style.add_modifier(Modifier::BOLD))),
        field("Name", name),
        field("About", nft.description.unwrap_or_else(|| "-".to_string())),
        field("Recipient", tx.short_recipient()),
        field("Contract", tx.short_contract()),
        field("Network", tx.chain_label()),
        field("Gas", tx.estimated_gas()),
    ];

    lines.push(match &card.status {
        MintStatus::Ready => Line::from(Span::styled("Press m to sign, x to dismiss", dim())),
        MintStatus::Signing => Line::from(Span::styled("Confirm the transaction in your wallet...", dim())),
        MintStatus::Confirmed(hash) => Line::from(Span::styled(
            app.explorer_link().unwrap_or_else(|| hash.clone()),
            Style::default().fg(Color::Green).add_modifier(Modifier::UNDERLINED),
        )),
        MintStatus::Failed(reason) => Line::from(vec![
            Span::styled(reason.clone(), Style::default().fg(Color::Red)),
            Span::styled("  (m to retry)", dim()),
        ]),
    });

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(status_style)
        .title(" Mint NFT ");
    let card = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    frame.render_widget(card, area);
}

// NFTs

fn nft_lines(data: &ShapeNftData) -> Vec<Line<'static>> {
    if data.total_nfts == 0 || data.nfts.is_empty() {
        return vec![Line::from(Span::styled("No NFTs found on Shape network", dim()))];
    }

    let mut lines = vec![
        Line::from(Span::styled("Success!", Style::default().fg(Color::Green).bold())),
        Line::from(data.summary()),
        Line::default(),
    ];

    for nft in data.nfts.iter().take(NFT_LIST_LIMIT) {
        let name = nft
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Token #{}", nft.token_id));
        lines.push(Line::from(vec![
            Span::styled(name, Style::default().bold()),
            Span::raw("  "),
            Span::styled(short_address(&nft.contract_address), dim()),
        ]));
    }

    if data.nfts.len() > NFT_LIST_LIMIT {
        lines.push(Line::from(Span::styled(
            format!("...and {} more", data.nfts.len() - NFT_LIST_LIMIT),
            dim(),
        )));
    }

    lines
}

fn render_nfts_screen(app: &App, frame: &mut Frame, area: Rect) {
    let lines = match (&app.wallet, &app.nfts) {
        (None, _) => vec![Line::from(Span::styled(
            "Connect your wallet to view your Shape network NFTs",
            dim(),
        ))],
        (Some(_), Load::Idle) | (Some(_), Load::Loading) => vec![Line::from(Span::styled(
            "Fetching NFTs from Shape network...",
            Style::default().fg(Color::Yellow),
        ))],
        (Some(_), Load::Done(ToolOutcome::Ok(data))) => nft_lines(data),
        (Some(_), Load::Done(ToolOutcome::SoftError(message))) | (Some(_), Load::Failed(message)) => {
            vec![error_line(message)]
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(dim())
        .title(" Shape NFTs ");
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

// Analytics

fn analytics_lines(view: &AnalyticsView) -> Vec<Line<'static>> {
    let row = |label: &str, value: String| {
        Line::from(vec![Span::styled(format!("{:<22}", label), dim()), Span::raw(value)])
    };
    let eth = |amount: &Option<shapekit_core::payloads::EthAmount>| {
        amount.as_ref().map_or_else(|| "-".to_string(), |a| a.to_string())
    };
    let count = |n: Option<u64>| n.map_or_else(|| "-".to_string(), |n| n.to_string());

    match view {
        AnalyticsView::Creator(data) => {
            let mut lines = vec![row("Creator", short_address(&data.creator_address))];
            if !data.has_tokens {
                lines.push(Line::from(Span::styled("No gasback tokens for this creator", dim())));
                return lines;
            }
            lines.extend([
                row("Tokens", data.total_tokens.to_string()),
                row("Registered contracts", data.registered_contracts.to_string()),
                row("Total earned", data.total_earned_eth.to_string()),
                row("Current balance", data.current_balance_eth.to_string()),
                row("Withdrawn", data.total_withdrawn_eth.to_string()),
            ]);
            lines
        }
        AnalyticsView::Collection(data) => vec![
            row("Collection", data.name.clone().unwrap_or_else(|| short_address(&data.contract_address))),
            row("Total supply", count(data.total_supply)),
            row("Floor price", eth(&data.floor_price_eth)),
            row("7d volume", eth(&data.seven_day_volume_eth)),
            row("7d sales", count(data.seven_day_sales_count)),
            row("Average sale", eth(&data.average_sale_price_eth)),
            row("Market cap", eth(&data.market_cap_eth)),
        ],
        AnalyticsView::TopCreators(data) => {
            let mut lines = vec![row("Creators analyzed", data.total_creators_analyzed.to_string()), Line::default()];
            for (rank, creator) in data.top_creators.iter().enumerate() {
                lines.push(Line::from(vec![
                    Span::styled(format!("{:>3}. ", rank + 1), Style::default().fg(Color::Yellow)),
                    Span::raw(format!("{:<14}", short_address(&creator.address))),
                    Span::styled(creator.total_earned_eth.to_string(), Style::default().fg(Color::Green)),
                    Span::styled(format!("  {} tokens", creator.total_tokens), dim()),
                ]));
            }
            lines
        }
        AnalyticsView::StackAchievements(data) => {
            let mut lines = vec![row("User", short_address(&data.user_address))];
            if !data.has_stack {
                lines.push(Line::from(Span::styled("This address has no Stack yet", dim())));
                return lines;
            }
            let tiers = &data.medals_by_tier;
            lines.extend([
                row("Total medals", data.total_medals.to_string()),
                row("Gold", tiers.gold.to_string()),
                row("Silver", tiers.silver.to_string()),
                row("Bronze", tiers.bronze.to_string()),
                row("Special", tiers.special.to_string()),
            ]);
            lines
        }
    }
}

fn render_analytics_screen(app: &App, frame: &mut Frame, area: Rect) {
    let [kinds_area, input_area, result_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let selected = AnalyticsKind::ALL.iter().position(|k| *k == app.analytics_kind).unwrap_or(0);
    let kinds = Tabs::new(AnalyticsKind::ALL.iter().map(|k| k.title()))
        .select(selected)
        .style(dim())
        .highlight_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD));
    frame.render_widget(kinds, kinds_area);

    let placeholder = match app.analytics_kind {
        AnalyticsKind::TopCreators => "50",
        AnalyticsKind::Collection => "0x... seaport",
        _ => "0x...",
    };
    let input = input_box(
        app.analytics_kind.input_label(),
        &app.analytics_input,
        placeholder,
        app.input_mode == InputMode::Editing,
        !app.analytics.is_loading(),
    );
    frame.render_widget(input, input_area);
    set_cursor(app, frame, input_area, &app.analytics_input);

    let lines = match &app.analytics {
        Load::Idle => vec![Line::from(Span::styled(
            format!("Enter a value and press Enter to run {}", app.analytics_kind.tool_name()),
            dim(),
        ))],
        Load::Loading => vec![Line::from(Span::styled("Loading...", Style::default().fg(Color::Yellow)))],
        Load::Done(ToolOutcome::Ok(view)) => analytics_lines(view),
        Load::Done(ToolOutcome::SoftError(message)) | Load::Failed(message) => vec![error_line(message)],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(dim())
        .title(format!(" {} ", app.analytics_kind.title()));
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), result_area);
}

// Greet

fn render_greet_screen(app: &App, frame: &mut Frame, area: Rect) {
    let [status_area, input_area, result_area] = Layout::vertical([
        Constraint::Length(6),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let status_line = match app.server_status {
        ServerStatus::Checking => Line::from(Span::styled("Checking server status...", Style::default().fg(Color::Yellow))),
        ServerStatus::Connected => Line::from(Span::styled(app.server_status.label(), Style::default().fg(Color::Green))),
        ServerStatus::Disconnected => Line::from(Span::styled(app.server_status.label(), Style::default().fg(Color::Red))),
    };
    let tools = if app.available_tools.is_empty() {
        Line::from(Span::styled("No tools listed", dim()))
    } else {
        let names: Vec<&str> = app.available_tools.iter().map(|t| t.name.as_str()).collect();
        Line::from(vec![Span::styled("Tools: ", dim()), Span::raw(names.join(", "))])
    };
    let status = Paragraph::new(vec![status_line, tools])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(dim())
                .title(" XMCP Greet Tool Demo "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status, status_area);

    let input = input_box(
        "Your name",
        &app.greet_input,
        "Enter your name",
        app.input_mode == InputMode::Editing,
        !app.greet.is_loading(),
    );
    frame.render_widget(input, input_area);
    set_cursor(app, frame, input_area, &app.greet_input);

    let lines = match &app.greet {
        Load::Idle => vec![],
        Load::Loading => vec![Line::from(Span::styled("Calling greet...", Style::default().fg(Color::Yellow)))],
        Load::Done(ToolOutcome::Ok(text)) => vec![Line::from(Span::styled(text.clone(), Style::default().fg(Color::Green)))],
        Load::Done(ToolOutcome::SoftError(message)) | Load::Failed(message) => vec![error_line(message)],
    };
    let block = Block::default().borders(Borders::ALL).border_style(dim()).title(" Result ");
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), result_area);
}

fn render_error_screen(message: &str, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 40, area);
    frame.render_widget(Clear, popup);

    let text = Text::from(vec![
        Line::from(Span::styled("Something went wrong", Style::default().fg(Color::Red).bold())),
        Line::default(),
        Line::from(message.to_string()),
        Line::default(),
        Line::from(Span::styled("Press r to try again, q to quit", dim())),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, popup);
}
