use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{add_bank_option, select_value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Template {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) content: String,
    #[serde(default)]
    pub(crate) selections: BTreeMap<String, String>,
    pub(crate) created_at: u64,
    pub(crate) updated_at: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Bank {
    pub(crate) key: String,
    pub(crate) label: String,
    pub(crate) category: String,
    pub(crate) options: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CategoryColor {
    Blue,
    Amber,
    Rose,
    Emerald,
    Violet,
    Slate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Category {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) color: CategoryColor,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Literal(String),
    Placeholder {
        name: String,
        index: usize,
        raw: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Workshop {
    pub(crate) templates: Vec<Template>,
    pub(crate) banks: Vec<Bank>,
    pub(crate) categories: Vec<Category>,
    pub(crate) active_template_id: Option<String>,
}

impl Workshop {
    pub(crate) fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|template| template.id == id)
    }

    pub(crate) fn create_template(&mut self, name: &str, content: &str) -> String {
        let now = now_millis();
        let mut stamp = now;
        let mut id = format!("template-{stamp}");
        while self.templates.iter().any(|template| template.id == id) {
            stamp += 1;
            id = format!("template-{stamp}");
        }
        self.templates.push(Template {
            id: id.clone(),
            name: name.to_string(),
            content: content.to_string(),
            selections: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        });
        self.active_template_id = Some(id.clone());
        id
    }

    pub(crate) fn rename_template(&mut self, id: &str, name: &str) {
        if let Some(template) = self.template_mut(id) {
            template.name = name.to_string();
            template.updated_at = now_millis();
        }
    }

    pub(crate) fn delete_template(&mut self, id: &str) {
        self.templates.retain(|template| template.id != id);
        if self.active_template_id.as_deref() == Some(id) {
            self.active_template_id = self.templates.first().map(|template| template.id.clone());
        }
    }

    pub(crate) fn update_content(&mut self, id: &str, content: &str) {
        if let Some(template) = self.template_mut(id) {
            template.content = content.to_string();
            template.updated_at = now_millis();
        }
    }

    pub(crate) fn set_selection(&mut self, id: &str, name: &str, index: usize, value: &str) {
        if let Some(position) = self.templates.iter().position(|template| template.id == id) {
            let mut updated = select_value(&self.templates[position], name, index, value);
            updated.updated_at = now_millis();
            self.templates[position] = updated;
        }
    }

    pub(crate) fn add_bank_option(&mut self, key: &str, option: &str) {
        if let Some(position) = self.banks.iter().position(|bank| bank.key == key) {
            self.banks[position] = add_bank_option(&self.banks[position], option);
        }
    }

    fn template_mut(&mut self, id: &str) -> Option<&mut Template> {
        self.templates.iter_mut().find(|template| template.id == id)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::defaults;

    fn empty_workshop() -> Workshop {
        Workshop {
            templates: Vec::new(),
            banks: Vec::new(),
            categories: Vec::new(),
            active_template_id: None,
        }
    }

    #[test]
    fn create_template_activates_it_and_ids_stay_unique() {
        let mut workshop = empty_workshop();
        let first = workshop.create_template("新建模板", defaults::NEW_TEMPLATE_CONTENT);
        let second = workshop.create_template("新建模板", defaults::NEW_TEMPLATE_CONTENT);
        assert_ne!(first, second);
        assert_eq!(workshop.templates.len(), 2);
        assert_eq!(workshop.active_template_id.as_deref(), Some(second.as_str()));
        assert_eq!(
            workshop.template(&first).map(|t| t.content.as_str()),
            Some(defaults::NEW_TEMPLATE_CONTENT)
        );
    }

    #[test]
    fn delete_active_template_falls_back_to_first_remaining() {
        let mut workshop = empty_workshop();
        let first = workshop.create_template("甲", "a");
        let second = workshop.create_template("乙", "b");
        workshop.delete_template(&second);
        assert_eq!(workshop.active_template_id.as_deref(), Some(first.as_str()));
        workshop.delete_template(&first);
        assert_eq!(workshop.active_template_id, None);
        assert!(workshop.templates.is_empty());
    }

    #[test]
    fn delete_inactive_template_keeps_active_id() {
        let mut workshop = empty_workshop();
        let first = workshop.create_template("甲", "a");
        let second = workshop.create_template("乙", "b");
        workshop.delete_template(&first);
        assert_eq!(workshop.active_template_id.as_deref(), Some(second.as_str()));
    }

    #[test]
    fn rename_updates_name_only() {
        let mut workshop = empty_workshop();
        let id = workshop.create_template("新建模板", "正文");
        workshop.rename_template(&id, "代码评审");
        let template = workshop.template(&id).unwrap();
        assert_eq!(template.name, "代码评审");
        assert_eq!(template.content, "正文");
    }

    #[test]
    fn set_selection_records_occurrence_key() {
        let mut workshop = empty_workshop();
        let id = workshop.create_template("新建模板", "你是{{role}}");
        workshop.set_selection(&id, "role", 0, "工程师");
        let template = workshop.template(&id).unwrap();
        assert_eq!(
            template.selections.get("role-0").map(String::as_str),
            Some("工程师")
        );
    }

    #[test]
    fn add_bank_option_ignores_unknown_key() {
        let mut workshop = empty_workshop();
        workshop.banks.push(Bank {
            key: "role".to_string(),
            label: "角色身份".to_string(),
            category: "character".to_string(),
            options: vec!["AI助手".to_string()],
        });
        workshop.add_bank_option("missing", "值");
        assert_eq!(workshop.banks[0].options.len(), 1);
        workshop.add_bank_option("role", "值");
        workshop.add_bank_option("role", "值");
        assert_eq!(
            workshop.banks[0].options,
            vec!["AI助手".to_string(), "值".to_string(), "值".to_string()]
        );
    }
}
