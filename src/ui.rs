use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{App, ListMode, PopupState, View};
use crate::engine;
use crate::models::{Category, CategoryColor, Token};

const STATUS_DURATION_MS: u128 = 1500;

pub(crate) fn render_app(frame: &mut Frame, app: &mut App) {
    match app.view {
        View::List => render_list(frame, app),
        View::Preview => render_preview(frame, app),
        View::Error => render_error(frame, app),
    }
}

fn render_error(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let message = app
        .error_message
        .clone()
        .unwrap_or_else(|| "未知错误".to_string());
    let block = Block::bordered().title("错误");
    let paragraph = Paragraph::new(message)
        .block(block)
        .style(Style::new().fg(Color::Red))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_list(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(1)])
        .split(area);

    let list_area = layout[0];
    let help_area = layout[1];

    let title = format!("模板列表 ({})", app.workshop.templates.len());
    let block = Block::bordered().title(title);
    let inner = inner_rect(list_area);
    app.list_area = inner;

    let view_height = inner.height as usize;
    app.list_scroll = ensure_visible(
        app.list_scroll,
        app.list_state.selected().unwrap_or(0),
        app.workshop.templates.len(),
        view_height,
    );

    let start = app.list_scroll;
    let end = (start + view_height).min(app.workshop.templates.len());
    let selected = app.list_state.selected();
    let active_id = app.workshop.active_template_id.as_deref();

    let items: Vec<ListItem> = app.workshop.templates[start..end]
        .iter()
        .enumerate()
        .map(|(idx, template)| {
            let index = start + idx;
            let renaming =
                app.list_mode == ListMode::Renaming && selected == Some(index);
            let label = if renaming {
                format!("{}|", app.rename_input)
            } else {
                template.name.clone()
            };
            let mut style = Style::new();
            if active_id == Some(template.id.as_str()) {
                style = style.add_modifier(Modifier::BOLD);
            }
            ListItem::new(label).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::new().bg(Color::Blue).fg(Color::White))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if let Some(selected) = selected {
        if selected >= start && selected < end {
            state.select(Some(selected - start));
        }
    }
    frame.render_stateful_widget(list, list_area, &mut state);

    let mut help = match app.list_mode {
        ListMode::Normal => {
            "↑↓/j k 选择  Enter/双击 打开  n 新建  r 重命名  d 删除  e 编辑  q 退出".to_string()
        }
        ListMode::Renaming => "重命名: Enter 确认  Esc 取消".to_string(),
        ListMode::ConfirmDelete => "确定删除此模板？ y 确认  其他键取消".to_string(),
    };
    if let Some(message) = app
        .list_status
        .as_ref()
        .filter(|msg| msg.since.elapsed().as_millis() <= STATUS_DURATION_MS)
    {
        help.push_str("  |  ");
        help.push_str(&message.text);
    }
    let help = Paragraph::new(help).style(Style::new().fg(Color::DarkGray));
    frame.render_widget(help, help_area);
}

fn render_preview(frame: &mut Frame, app: &mut App) {
    let workshop = &app.workshop;
    let Some(preview) = app.preview.as_mut() else {
        return;
    };
    let Some(template) = workshop.template(&preview.template_id) else {
        return;
    };

    let area = frame.area();
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(1)])
        .split(area);

    let content_area = layout[0];
    let status_area = layout[1];

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(content_area);

    let main_area = horizontal[0];
    let banks_area = horizontal[1];

    let active = preview.occurrences.get(preview.active).copied();
    let lines: Vec<Line> = preview
        .lines
        .iter()
        .enumerate()
        .map(|(line_index, tokens)| {
            let spans: Vec<Span> = tokens
                .iter()
                .enumerate()
                .map(|(token_index, token)| match token {
                    Token::Literal(text) => Span::raw(text.clone()),
                    Token::Placeholder { name, index, .. } => {
                        let display = engine::resolve_display_value(token, &template.selections);
                        let resolved = template
                            .selections
                            .get(&engine::occurrence_key(name, *index))
                            .is_some_and(|value| !value.is_empty());
                        let category = engine::find_bank(&workshop.banks, name)
                            .map(|bank| bank.category.as_str())
                            .unwrap_or("other");
                        let color = category_color(&workshop.categories, category);
                        let mut style = Style::new().fg(color);
                        if resolved {
                            style = style.add_modifier(Modifier::BOLD);
                        } else {
                            style = style.add_modifier(Modifier::ITALIC);
                        }
                        if active == Some((line_index, token_index)) {
                            style = style.add_modifier(Modifier::REVERSED);
                        }
                        Span::styled(display, style)
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let inner = inner_rect(main_area);
    let active_line = active.map(|(line, _)| line).unwrap_or(0);
    preview.scroll = ensure_visible(
        preview.scroll,
        active_line,
        preview.lines.len(),
        inner.height as usize,
    );

    let title = format!("预览: {}", template.name);
    let paragraph = Paragraph::new(lines)
        .block(Block::bordered().title(title))
        .wrap(Wrap { trim: false })
        .scroll((preview.scroll as u16, 0));
    frame.render_widget(paragraph, main_area);

    render_banks_sidebar(frame, app, banks_area);

    let Some(preview) = app.preview.as_ref() else {
        return;
    };
    let mut status = match preview.popup.as_ref() {
        Some(popup) if popup.adding => "输入自定义值  Enter 确认  Esc 取消".to_string(),
        Some(_) => "↑↓/j k 选择  Enter 确认  a 自定义  Esc 关闭".to_string(),
        None => "Tab/↑↓ 切换变量  Enter 选择  e 编辑  Ctrl+C 复制  Esc 返回".to_string(),
    };
    if let Some(message) = preview
        .status
        .as_ref()
        .filter(|msg| msg.since.elapsed().as_millis() <= STATUS_DURATION_MS)
    {
        status.push_str("  |  ");
        status.push_str(&message.text);
    }
    let status = Paragraph::new(status).style(Style::new().fg(Color::DarkGray));
    frame.render_widget(status, status_area);

    if let Some(popup) = preview.popup.as_ref() {
        render_popup(frame, popup, area);
    }
}

fn render_banks_sidebar(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    for category in &app.workshop.categories {
        let banks: Vec<_> = app
            .workshop
            .banks
            .iter()
            .filter(|bank| bank.category == category.id)
            .collect();
        if banks.is_empty() {
            continue;
        }
        let color = category_color(&app.workshop.categories, &category.id);
        lines.push(Line::from(Span::styled(
            category.label.clone(),
            Style::new().fg(color).add_modifier(Modifier::BOLD),
        )));
        for bank in banks {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(bank.label.clone(), Style::new().fg(color)),
                Span::styled(
                    format!(" {} ({})", bank.key, bank.options.len()),
                    Style::new().fg(Color::DarkGray),
                ),
            ]));
        }
        lines.push(Line::default());
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::bordered().title("词库"))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_popup(frame: &mut Frame, popup: &PopupState, area: Rect) {
    let height = (popup.options.len() as u16 + 3).clamp(5, area.height.saturating_sub(2));
    let popup_area = centered_rect(area, 44, height);
    frame.render_widget(Clear, popup_area);

    let mut items: Vec<ListItem> = popup
        .options
        .iter()
        .map(|option| {
            let marker = if *option == popup.current { "✓ " } else { "  " };
            ListItem::new(format!("{marker}{option}"))
        })
        .collect();
    let add_row = if popup.adding {
        format!("自定义: {}|", popup.input)
    } else {
        "＋ 添加选项".to_string()
    };
    items.push(ListItem::new(add_row).style(Style::new().fg(Color::DarkGray)));

    let title = format!("选择 {{{{{}}}}}", popup.variable);
    let list = List::new(items)
        .block(Block::bordered().title(title))
        .highlight_style(Style::new().bg(Color::Blue).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(popup.selected.min(popup.options.len())));
    frame.render_stateful_widget(list, popup_area, &mut state);
}

fn category_color(categories: &[Category], category_id: &str) -> Color {
    let color = categories
        .iter()
        .find(|category| category.id == category_id)
        .map(|category| category.color)
        .unwrap_or(CategoryColor::Slate);
    match color {
        CategoryColor::Blue => Color::Blue,
        CategoryColor::Amber => Color::Yellow,
        CategoryColor::Rose => Color::Red,
        CategoryColor::Emerald => Color::Green,
        CategoryColor::Violet => Color::Magenta,
        CategoryColor::Slate => Color::DarkGray,
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn inner_rect(area: Rect) -> Rect {
    let mut inner = area;
    if inner.width >= 2 {
        inner.x += 1;
        inner.width -= 2;
    }
    if inner.height >= 2 {
        inner.y += 1;
        inner.height -= 2;
    }
    inner
}

fn ensure_visible(
    current_scroll: usize,
    selected: usize,
    total: usize,
    view_height: usize,
) -> usize {
    if total == 0 || view_height == 0 {
        return 0;
    }
    let mut scroll = current_scroll.min(total.saturating_sub(1));
    if selected < scroll {
        scroll = selected;
    } else if selected >= scroll + view_height {
        scroll = selected + 1 - view_height;
    }
    scroll
}
