use std::time::Instant;

use crossterm::event::{
    KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;

use crate::defaults;
use crate::engine;
use crate::models::{Token, Workshop};
use crate::store;
use crate::system;

const DOUBLE_CLICK_MS: u128 = 400;

#[derive(Clone, Debug)]
pub(crate) enum View {
    List,
    Preview,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ListMode {
    Normal,
    Renaming,
    ConfirmDelete,
}

#[derive(Clone, Debug)]
pub(crate) struct StatusMessage {
    pub(crate) text: String,
    pub(crate) since: Instant,
}

#[derive(Clone, Debug)]
pub(crate) struct PopupState {
    pub(crate) variable: String,
    pub(crate) occurrence: usize,
    pub(crate) add_target: String,
    pub(crate) options: Vec<String>,
    pub(crate) current: String,
    pub(crate) selected: usize,
    pub(crate) adding: bool,
    pub(crate) input: String,
}

#[derive(Clone, Debug)]
pub(crate) struct PreviewState {
    pub(crate) template_id: String,
    pub(crate) lines: Vec<Vec<Token>>,
    pub(crate) occurrences: Vec<(usize, usize)>,
    pub(crate) active: usize,
    pub(crate) scroll: usize,
    pub(crate) popup: Option<PopupState>,
    pub(crate) status: Option<StatusMessage>,
}

#[derive(Clone, Debug)]
pub(crate) struct App {
    pub(crate) workshop: Workshop,
    pub(crate) list_state: ListState,
    pub(crate) list_scroll: usize,
    pub(crate) list_mode: ListMode,
    pub(crate) rename_input: String,
    pub(crate) view: View,
    pub(crate) preview: Option<PreviewState>,
    pub(crate) error_message: Option<String>,
    pub(crate) last_click: Option<(usize, Instant)>,
    pub(crate) list_area: Rect,
    pub(crate) should_quit: bool,
    pub(crate) list_status: Option<StatusMessage>,
    pub(crate) needs_redraw: bool,
}

impl App {
    pub(crate) fn load() -> Self {
        match store::load_workshop() {
            Ok(workshop) => {
                let mut list_state = ListState::default();
                if !workshop.templates.is_empty() {
                    let selected = workshop
                        .active_template_id
                        .as_deref()
                        .and_then(|id| {
                            workshop.templates.iter().position(|template| template.id == id)
                        })
                        .unwrap_or(0);
                    list_state.select(Some(selected));
                }
                Self {
                    workshop,
                    list_state,
                    list_scroll: 0,
                    list_mode: ListMode::Normal,
                    rename_input: String::new(),
                    view: View::List,
                    preview: None,
                    error_message: None,
                    last_click: None,
                    list_area: Rect::default(),
                    should_quit: false,
                    list_status: None,
                    needs_redraw: false,
                }
            }
            Err(err) => Self {
                workshop: Workshop {
                    templates: Vec::new(),
                    banks: Vec::new(),
                    categories: Vec::new(),
                    active_template_id: None,
                },
                list_state: ListState::default(),
                list_scroll: 0,
                list_mode: ListMode::Normal,
                rename_input: String::new(),
                view: View::Error,
                preview: None,
                error_message: Some(err),
                last_click: None,
                list_area: Rect::default(),
                should_quit: false,
                list_status: None,
                needs_redraw: false,
            },
        }
    }

    pub(crate) fn on_key(&mut self, key: KeyEvent) {
        match self.view {
            View::List => self.on_key_list(key),
            View::Preview => self.on_key_preview(key),
            View::Error => self.on_key_error(key),
        }
    }

    pub(crate) fn on_mouse(&mut self, mouse: MouseEvent) {
        match self.view {
            View::List if self.list_mode == ListMode::Normal => self.on_mouse_list(mouse),
            _ => {}
        }
    }

    fn on_key_error(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            _ => {}
        }
    }

    fn on_key_list(&mut self, key: KeyEvent) {
        match self.list_mode {
            ListMode::Normal => self.on_key_list_normal(key),
            ListMode::Renaming => self.on_key_list_renaming(key),
            ListMode::ConfirmDelete => self.on_key_list_confirm_delete(key),
        }
    }

    fn on_key_list_normal(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.move_list(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_list(-1),
            KeyCode::Enter => self.open_selected_template(),
            KeyCode::Char('n') => self.create_template(),
            KeyCode::Char('r') => self.start_rename(),
            KeyCode::Char('d') => {
                if self.selected_template_id().is_some() {
                    self.list_mode = ListMode::ConfirmDelete;
                }
            }
            KeyCode::Char('e') => self.edit_selected_content(),
            _ => {}
        }
    }

    fn on_key_list_renaming(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.list_mode = ListMode::Normal;
                self.rename_input.clear();
            }
            KeyCode::Enter => self.commit_rename(),
            KeyCode::Backspace => {
                self.rename_input.pop();
            }
            KeyCode::Char(ch) => self.rename_input.push(ch),
            _ => {}
        }
    }

    fn on_key_list_confirm_delete(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') => {
                self.list_mode = ListMode::Normal;
                self.delete_selected_template();
            }
            _ => self.list_mode = ListMode::Normal,
        }
    }

    fn on_mouse_list(&mut self, mouse: MouseEvent) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }
        if let Some(index) = self.index_from_mouse(mouse) {
            self.list_state.select(Some(index));
            let now = Instant::now();
            if let Some((last_index, last_time)) = self.last_click {
                if last_index == index && last_time.elapsed().as_millis() <= DOUBLE_CLICK_MS {
                    self.open_selected_template();
                }
            }
            self.last_click = Some((index, now));
        }
    }

    fn on_key_preview(&mut self, key: KeyEvent) {
        if self
            .preview
            .as_ref()
            .is_some_and(|preview| preview.popup.is_some())
        {
            self.on_key_popup(key);
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.preview = None;
                self.view = View::List;
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => self.move_occurrence(1),
            KeyCode::BackTab | KeyCode::Up | KeyCode::Char('k') => self.move_occurrence(-1),
            KeyCode::Enter => self.open_popup(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.copy_final_prompt();
            }
            KeyCode::Char('e') => self.edit_preview_content(),
            _ => {}
        }
    }

    fn on_key_popup(&mut self, key: KeyEvent) {
        let Some(popup) = self
            .preview
            .as_mut()
            .and_then(|preview| preview.popup.as_mut())
        else {
            return;
        };

        if popup.adding {
            let mut commit = false;
            match key.code {
                KeyCode::Esc => {
                    popup.adding = false;
                    popup.input.clear();
                }
                KeyCode::Enter => commit = true,
                KeyCode::Backspace => {
                    popup.input.pop();
                }
                KeyCode::Char(ch) => popup.input.push(ch),
                _ => {}
            }
            if commit {
                self.commit_custom_option();
            }
            return;
        }

        let mut close = false;
        let mut chosen: Option<String> = None;
        match key.code {
            KeyCode::Esc => close = true,
            KeyCode::Down | KeyCode::Char('j') => {
                if popup.selected < popup.options.len() {
                    popup.selected += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                popup.selected = popup.selected.saturating_sub(1);
            }
            KeyCode::Char('a') => popup.adding = true,
            KeyCode::Enter => {
                if popup.selected == popup.options.len() {
                    popup.adding = true;
                } else {
                    chosen = Some(popup.options[popup.selected].clone());
                }
            }
            _ => {}
        }
        if close {
            if let Some(preview) = self.preview.as_mut() {
                preview.popup = None;
            }
        }
        if let Some(value) = chosen {
            self.apply_selection(&value);
        }
    }

    fn move_list(&mut self, delta: isize) {
        let len = self.workshop.templates.len();
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, (len - 1) as isize) as usize;
        self.list_state.select(Some(next));
    }

    fn move_occurrence(&mut self, delta: isize) {
        let Some(preview) = self.preview.as_mut() else {
            return;
        };
        let len = preview.occurrences.len();
        if len == 0 {
            return;
        }
        let current = preview.active as isize;
        preview.active = (current + delta).rem_euclid(len as isize) as usize;
    }

    fn selected_template_id(&self) -> Option<String> {
        let index = self.list_state.selected()?;
        self.workshop
            .templates
            .get(index)
            .map(|template| template.id.clone())
    }

    fn open_selected_template(&mut self) {
        let Some(id) = self.selected_template_id() else {
            return;
        };
        self.workshop.active_template_id = Some(id.clone());
        self.persist_from_list();
        self.preview = Some(self.build_preview(&id));
        self.view = View::Preview;
    }

    fn build_preview(&self, id: &str) -> PreviewState {
        let content = self
            .workshop
            .template(id)
            .map(|template| template.content.as_str())
            .unwrap_or("");
        let lines = engine::parse(content);
        let occurrences = collect_occurrences(&lines);
        PreviewState {
            template_id: id.to_string(),
            lines,
            occurrences,
            active: 0,
            scroll: 0,
            popup: None,
            status: None,
        }
    }

    fn create_template(&mut self) {
        self.workshop
            .create_template("新建模板", defaults::NEW_TEMPLATE_CONTENT);
        let index = self.workshop.templates.len() - 1;
        self.list_state.select(Some(index));
        self.set_list_status("已新建模板，按 r 重命名，按 e 编辑内容");
        self.persist_from_list();
    }

    fn start_rename(&mut self) {
        let Some(index) = self.list_state.selected() else {
            return;
        };
        let Some(template) = self.workshop.templates.get(index) else {
            return;
        };
        self.rename_input = template.name.clone();
        self.list_mode = ListMode::Renaming;
    }

    fn commit_rename(&mut self) {
        let name = self.rename_input.trim().to_string();
        if name.is_empty() {
            return;
        }
        if let Some(id) = self.selected_template_id() {
            self.workshop.rename_template(&id, &name);
            self.persist_from_list();
        }
        self.list_mode = ListMode::Normal;
        self.rename_input.clear();
    }

    fn delete_selected_template(&mut self) {
        let Some(id) = self.selected_template_id() else {
            return;
        };
        self.workshop.delete_template(&id);
        let len = self.workshop.templates.len();
        if len == 0 {
            self.list_state.select(None);
        } else {
            let selected = self.list_state.selected().unwrap_or(0).min(len - 1);
            self.list_state.select(Some(selected));
        }
        self.set_list_status("已删除");
        self.persist_from_list();
    }

    fn edit_selected_content(&mut self) {
        let Some(id) = self.selected_template_id() else {
            return;
        };
        let Some(content) = self
            .workshop
            .template(&id)
            .map(|template| template.content.clone())
        else {
            return;
        };
        self.needs_redraw = true;
        match system::edit_content(&content) {
            Ok(edited) => {
                let edited = system::trim_trailing_newline(&edited).to_string();
                self.workshop.update_content(&id, &edited);
                self.set_list_status("已保存内容");
                self.persist_from_list();
            }
            Err(err) => self.set_list_status(&err),
        }
    }

    fn edit_preview_content(&mut self) {
        let Some(id) = self.preview.as_ref().map(|preview| preview.template_id.clone()) else {
            return;
        };
        let Some(content) = self
            .workshop
            .template(&id)
            .map(|template| template.content.clone())
        else {
            return;
        };
        self.needs_redraw = true;
        match system::edit_content(&content) {
            Ok(edited) => {
                let edited = system::trim_trailing_newline(&edited).to_string();
                self.workshop.update_content(&id, &edited);
                self.preview = Some(self.build_preview(&id));
                self.set_preview_status("已保存内容");
                self.persist_from_preview();
            }
            Err(err) => self.set_preview_status(&err),
        }
    }

    fn open_popup(&mut self) {
        let Some(preview) = self.preview.as_ref() else {
            return;
        };
        let Some(&(line, token)) = preview.occurrences.get(preview.active) else {
            return;
        };
        let Some(Token::Placeholder { name, index, .. }) =
            preview.lines.get(line).and_then(|tokens| tokens.get(token))
        else {
            return;
        };
        let name = name.clone();
        let index = *index;
        let bank = engine::find_bank(&self.workshop.banks, &name);
        let options: Vec<String> = bank.map(|bank| bank.options.clone()).unwrap_or_default();
        let current = self
            .workshop
            .template(&preview.template_id)
            .and_then(|template| template.selections.get(&engine::occurrence_key(&name, index)))
            .cloned()
            .unwrap_or_default();
        let selected = options
            .iter()
            .position(|option| *option == current)
            .unwrap_or(0);
        let add_target = engine::base_key(&name).to_string();
        if let Some(preview) = self.preview.as_mut() {
            preview.popup = Some(PopupState {
                variable: name,
                occurrence: index,
                add_target,
                options,
                current,
                selected,
                adding: false,
                input: String::new(),
            });
        }
    }

    fn apply_selection(&mut self, value: &str) {
        let Some((id, name, occurrence)) = self.preview.as_ref().and_then(|preview| {
            preview.popup.as_ref().map(|popup| {
                (
                    preview.template_id.clone(),
                    popup.variable.clone(),
                    popup.occurrence,
                )
            })
        }) else {
            return;
        };
        self.workshop.set_selection(&id, &name, occurrence, value);
        if let Some(preview) = self.preview.as_mut() {
            preview.popup = None;
        }
        self.set_preview_status("已选择");
        self.persist_from_preview();
    }

    fn commit_custom_option(&mut self) {
        let Some((add_target, value)) = self.preview.as_ref().and_then(|preview| {
            preview.popup.as_ref().map(|popup| {
                (popup.add_target.clone(), popup.input.trim().to_string())
            })
        }) else {
            return;
        };
        if value.is_empty() {
            return;
        }
        // 自定义值追加到基础键对应的词库；词库不存在时静默跳过，选择仍然生效
        self.workshop.add_bank_option(&add_target, &value);
        self.apply_selection(&value);
    }

    fn copy_final_prompt(&mut self) {
        let Some(id) = self.preview.as_ref().map(|preview| preview.template_id.clone()) else {
            return;
        };
        let Some(template) = self.workshop.template(&id) else {
            return;
        };
        let prompt = engine::generate_final_text(template, &self.workshop.banks);
        match system::set_clipboard(&prompt) {
            Ok(_) => self.set_preview_status("已复制"),
            Err(err) => self.set_preview_status(&err),
        }
    }

    fn persist_from_list(&mut self) {
        if let Err(err) = store::save_workshop(&self.workshop) {
            self.set_list_status(&err);
        }
    }

    fn persist_from_preview(&mut self) {
        if let Err(err) = store::save_workshop(&self.workshop) {
            self.set_preview_status(&err);
        }
    }

    fn set_list_status(&mut self, text: &str) {
        self.list_status = Some(StatusMessage {
            text: text.to_string(),
            since: Instant::now(),
        });
    }

    fn set_preview_status(&mut self, text: &str) {
        if let Some(preview) = self.preview.as_mut() {
            preview.status = Some(StatusMessage {
                text: text.to_string(),
                since: Instant::now(),
            });
        }
    }

    fn index_from_mouse(&self, mouse: MouseEvent) -> Option<usize> {
        let area = self.list_area;
        if area.width == 0 || area.height == 0 {
            return None;
        }
        if mouse.column < area.x
            || mouse.column >= area.x + area.width
            || mouse.row < area.y
            || mouse.row >= area.y + area.height
        {
            return None;
        }
        let row_offset = (mouse.row - area.y) as usize;
        let index = self.list_scroll + row_offset;
        if index >= self.workshop.templates.len() {
            return None;
        }
        Some(index)
    }
}

fn collect_occurrences(lines: &[Vec<Token>]) -> Vec<(usize, usize)> {
    let mut occurrences = Vec::new();
    for (line_index, tokens) in lines.iter().enumerate() {
        for (token_index, token) in tokens.iter().enumerate() {
            if matches!(token, Token::Placeholder { .. }) {
                occurrences.push((line_index, token_index));
            }
        }
    }
    occurrences
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::engine::parse;

    #[test]
    fn occurrences_are_collected_in_document_order() {
        let lines = parse("{{role}}和{{task}}\n\n再次{{role}}");
        let occurrences = collect_occurrences(&lines);
        assert_eq!(occurrences, vec![(0, 0), (0, 2), (2, 1)]);
    }

    #[test]
    fn occurrences_skip_literal_only_lines() {
        let lines = parse("纯文本\n{{role}}");
        assert_eq!(collect_occurrences(&lines), vec![(1, 0)]);
    }
}
