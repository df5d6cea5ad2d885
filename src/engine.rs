use std::collections::{BTreeMap, HashMap};

use crate::models::{Bank, Template, Token};

/// Occurrence keys pair a variable name with how many times the same name
/// appeared earlier in the template, so repeated `{{role}}` markers can hold
/// independent selections.
pub(crate) fn occurrence_key(name: &str, index: usize) -> String {
    format!("{name}-{index}")
}

/// Strips one trailing `_<digits>` suffix, so `role_2` shares the `role`
/// option bank while keeping its own occurrence keys.
pub(crate) fn base_key(name: &str) -> &str {
    if let Some(position) = name.rfind('_') {
        let digits = &name[position + 1..];
        if !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return &name[..position];
        }
    }
    name
}

/// Tokenizes template content line by line. A placeholder is exactly
/// `{{` + one-or-more non-brace, non-newline characters + `}}`; anything
/// malformed stays literal text. Occurrence counters live only inside this
/// call, so identical content always yields identical keys.
pub(crate) fn parse(content: &str) -> Vec<Vec<Token>> {
    let mut counters: HashMap<String, usize> = HashMap::new();
    content
        .split('\n')
        .map(|line| parse_line(line, &mut counters))
        .collect()
}

fn parse_line(line: &str, counters: &mut HashMap<String, usize>) -> Vec<Token> {
    let mut tokens = Vec::new();
    if line.is_empty() {
        return tokens;
    }
    let mut cursor = 0;
    let mut search = 0;
    while let Some(offset) = line[search..].find("{{") {
        let start = search + offset;
        let Some(close) = line[start + 2..].find("}}") else {
            break;
        };
        let inner = &line[start + 2..start + 2 + close];
        if inner.is_empty() || inner.contains('{') || inner.contains('}') {
            // Not a marker; a valid one may still begin inside this span.
            search = start + 1;
            continue;
        }
        if start > cursor {
            tokens.push(Token::Literal(line[cursor..start].to_string()));
        }
        let end = start + 2 + close + 2;
        let name = inner.trim().to_string();
        let index = counters.get(&name).copied().unwrap_or(0);
        counters.insert(name.clone(), index + 1);
        tokens.push(Token::Placeholder {
            name,
            index,
            raw: line[start..end].to_string(),
        });
        cursor = end;
        search = end;
    }
    if cursor < line.len() {
        tokens.push(Token::Literal(line[cursor..].to_string()));
    }
    tokens
}

/// Preview text for a single token: the recorded selection when one exists,
/// otherwise the `{{name}}` marker itself.
pub(crate) fn resolve_display_value(token: &Token, selections: &BTreeMap<String, String>) -> String {
    match token {
        Token::Literal(text) => text.clone(),
        Token::Placeholder { name, index, .. } => {
            match selections.get(&occurrence_key(name, *index)) {
                Some(value) if !value.is_empty() => value.clone(),
                _ => format!("{{{{{name}}}}}"),
            }
        }
    }
}

/// Renders the final prompt. Per occurrence: the selection if non-empty,
/// else the first option of the bank matching the full variable name (no
/// base-key fallback here), else the original marker text.
pub(crate) fn generate_final_text(template: &Template, banks: &[Bank]) -> String {
    let lines = parse(&template.content);
    let rendered: Vec<String> = lines
        .iter()
        .map(|tokens| {
            let mut line = String::new();
            for token in tokens {
                match token {
                    Token::Literal(text) => line.push_str(text),
                    Token::Placeholder { name, index, raw } => {
                        match template.selections.get(&occurrence_key(name, *index)) {
                            Some(value) if !value.is_empty() => line.push_str(value),
                            _ => match banks.iter().find(|bank| bank.key == *name) {
                                Some(bank) if !bank.options.is_empty() => {
                                    line.push_str(&bank.options[0]);
                                }
                                _ => line.push_str(raw),
                            },
                        }
                    }
                }
            }
            line
        })
        .collect();
    rendered.join("\n")
}

/// Copy-on-write selection update; the input template is left untouched.
pub(crate) fn select_value(template: &Template, name: &str, index: usize, value: &str) -> Template {
    let mut updated = template.clone();
    updated
        .selections
        .insert(occurrence_key(name, index), value.to_string());
    updated
}

/// Copy-on-write option append. Duplicates are permitted.
pub(crate) fn add_bank_option(bank: &Bank, option: &str) -> Bank {
    let mut updated = bank.clone();
    updated.options.push(option.to_string());
    updated
}

/// Bank used for preview display: the first bank whose key matches the base
/// key or the full variable name. Final generation deliberately does not use
/// this fallback.
pub(crate) fn find_bank<'a>(banks: &'a [Bank], name: &str) -> Option<&'a Bank> {
    let base = base_key(name);
    banks.iter().find(|bank| bank.key == base || bank.key == name)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn template(content: &str, selections: &[(&str, &str)]) -> Template {
        Template {
            id: "template-1".to_string(),
            name: "测试".to_string(),
            content: content.to_string(),
            selections: selections
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn bank(key: &str, options: &[&str]) -> Bank {
        Bank {
            key: key.to_string(),
            label: key.to_string(),
            category: "other".to_string(),
            options: options.iter().map(|option| option.to_string()).collect(),
        }
    }

    fn placeholders(lines: &[Vec<Token>]) -> Vec<(String, usize)> {
        lines
            .iter()
            .flatten()
            .filter_map(|token| match token {
                Token::Placeholder { name, index, .. } => Some((name.clone(), *index)),
                Token::Literal(_) => None,
            })
            .collect()
    }

    #[test]
    fn content_without_markers_is_all_literal() {
        let lines = parse("普通文本，没有变量。");
        assert_eq!(
            lines,
            vec![vec![Token::Literal("普通文本，没有变量。".to_string())]]
        );
        let output = generate_final_text(&template("普通文本，没有变量。", &[]), &[]);
        assert_eq!(output, "普通文本，没有变量。");
    }

    #[test]
    fn repeated_name_gets_increasing_indices_in_document_order() {
        let lines = parse("{{role}}与{{role}}\n再来一个{{role}}");
        assert_eq!(
            placeholders(&lines),
            vec![
                ("role".to_string(), 0),
                ("role".to_string(), 1),
                ("role".to_string(), 2),
            ]
        );
    }

    #[test]
    fn reparsing_identical_content_yields_identical_tokens() {
        let content = "{{role}}\n{{task}}\n{{role}}";
        assert_eq!(parse(content), parse(content));
    }

    #[test]
    fn empty_line_has_no_tokens() {
        let lines = parse("第一行\n\n第三行");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].is_empty());
    }

    #[test]
    fn whitespace_only_line_stays_literal() {
        let lines = parse("  \t ");
        assert_eq!(lines, vec![vec![Token::Literal("  \t ".to_string())]]);
    }

    #[test]
    fn variable_name_is_trimmed_but_raw_marker_is_kept() {
        let lines = parse("{{ role }}");
        assert_eq!(
            lines[0],
            vec![Token::Placeholder {
                name: "role".to_string(),
                index: 0,
                raw: "{{ role }}".to_string(),
            }]
        );
    }

    #[test]
    fn unterminated_marker_passes_through_literally() {
        let lines = parse("{{unterminated");
        assert_eq!(
            lines,
            vec![vec![Token::Literal("{{unterminated".to_string())]]
        );
        let output = generate_final_text(
            &template("{{unterminated", &[]),
            &[bank("unterminated", &["值"])],
        );
        assert_eq!(output, "{{unterminated");
    }

    #[test]
    fn nested_open_braces_shift_the_match_right() {
        let lines = parse("{{a{{b}}");
        assert_eq!(
            lines[0],
            vec![
                Token::Literal("{{a".to_string()),
                Token::Placeholder {
                    name: "b".to_string(),
                    index: 0,
                    raw: "{{b}}".to_string(),
                },
            ]
        );
    }

    #[test]
    fn stray_inner_brace_disqualifies_the_marker() {
        let lines = parse("{{a}b}} {{c}}");
        assert_eq!(
            lines[0],
            vec![
                Token::Literal("{{a}b}} ".to_string()),
                Token::Placeholder {
                    name: "c".to_string(),
                    index: 0,
                    raw: "{{c}}".to_string(),
                },
            ]
        );
    }

    #[test]
    fn empty_braces_are_not_a_marker() {
        let lines = parse("{{}}");
        assert_eq!(lines, vec![vec![Token::Literal("{{}}".to_string())]]);
    }

    #[test]
    fn display_value_prefers_selection_over_marker() {
        let selections: BTreeMap<String, String> =
            [("role-0".to_string(), "工程师".to_string())].into();
        let lines = parse("{{role}} {{role}}");
        assert_eq!(resolve_display_value(&lines[0][0], &selections), "工程师");
        assert_eq!(resolve_display_value(&lines[0][2], &selections), "{{role}}");
    }

    #[test]
    fn display_value_treats_empty_selection_as_unset() {
        let selections: BTreeMap<String, String> = [("role-0".to_string(), String::new())].into();
        let lines = parse("{{role}}");
        assert_eq!(resolve_display_value(&lines[0][0], &selections), "{{role}}");
    }

    #[test]
    fn selection_wins_over_bank_default() {
        let output = generate_final_text(
            &template("你是{{role}}", &[("role-0", "工程师")]),
            &[bank("role", &["AI助手"])],
        );
        assert_eq!(output, "你是工程师");
    }

    #[test]
    fn bank_first_option_is_the_default() {
        let output = generate_final_text(
            &template("请{{task}}", &[]),
            &[bank("task", &["写代码", "写文档"])],
        );
        assert_eq!(output, "请写代码");
    }

    #[test]
    fn empty_selection_falls_back_to_bank_default() {
        let output = generate_final_text(
            &template("请{{task}}", &[("task-0", "")]),
            &[bank("task", &["写代码", "写文档"])],
        );
        assert_eq!(output, "请写代码");
    }

    #[test]
    fn unresolved_marker_stays_verbatim_including_whitespace() {
        let output = generate_final_text(&template("请{{ task }}", &[]), &[]);
        assert_eq!(output, "请{{ task }}");
    }

    #[test]
    fn each_occurrence_resolves_independently() {
        let output = generate_final_text(
            &template(
                "{{role}}对话{{role}}",
                &[("role-0", "导师"), ("role-1", "学生")],
            ),
            &[],
        );
        assert_eq!(output, "导师对话学生");
    }

    #[test]
    fn generation_is_pure_across_calls() {
        let template = template(
            "你是{{role}}\n\n请{{task}}，目标是{{goal}}",
            &[("role-0", "工程师")],
        );
        let banks = [bank("task", &["写代码"])];
        let first = generate_final_text(&template, &banks);
        let second = generate_final_text(&template, &banks);
        assert_eq!(first, second);
        assert_eq!(first, "你是工程师\n\n请写代码，目标是{{goal}}");
    }

    #[test]
    fn base_key_strips_one_trailing_digit_suffix() {
        assert_eq!(base_key("role"), "role");
        assert_eq!(base_key("role_2"), "role");
        assert_eq!(base_key("role_2_3"), "role_2");
        assert_eq!(base_key("output_format"), "output_format");
        assert_eq!(base_key("role_"), "role_");
        assert_eq!(base_key("_2"), "");
    }

    #[test]
    fn preview_bank_lookup_uses_base_key_but_generation_does_not() {
        // role_2 groups under the role bank for display, yet the final text
        // only accepts an exact-name bank. The asymmetry mirrors the shipped
        // behavior and is intentional here.
        let banks = [bank("role", &["AI助手"])];
        let found = find_bank(&banks, "role_2");
        assert_eq!(found.map(|bank| bank.key.as_str()), Some("role"));

        let output = generate_final_text(&template("你是{{role_2}}", &[]), &banks);
        assert_eq!(output, "你是{{role_2}}");
    }

    #[test]
    fn exact_name_bank_can_shadow_base_key_bank() {
        let banks = [bank("role_2", &["替身"]), bank("role", &["AI助手"])];
        let found = find_bank(&banks, "role_2");
        assert_eq!(found.map(|bank| bank.key.as_str()), Some("role_2"));
    }

    #[test]
    fn select_value_does_not_mutate_the_input() {
        let original = template("你是{{role}}", &[]);
        let updated = select_value(&original, "role", 0, "工程师");
        assert!(original.selections.is_empty());
        assert_eq!(
            updated.selections.get("role-0").map(String::as_str),
            Some("工程师")
        );
    }

    #[test]
    fn stale_selections_are_harmless() {
        let output = generate_final_text(
            &template("纯文本", &[("removed-0", "旧值")]),
            &[],
        );
        assert_eq!(output, "纯文本");
    }

    #[test]
    fn add_bank_option_appends_without_dedup() {
        let original = bank("role", &["AI助手"]);
        let updated = add_bank_option(&original, "AI助手");
        assert_eq!(original.options, vec!["AI助手".to_string()]);
        assert_eq!(
            updated.options,
            vec!["AI助手".to_string(), "AI助手".to_string()]
        );
    }

    #[test]
    fn multiline_layout_survives_generation() {
        let content = "第一行{{role}}\n\n第三行{{task}}\n";
        let output = generate_final_text(
            &template(content, &[("role-0", "工程师")]),
            &[bank("task", &["写代码"])],
        );
        assert_eq!(output, "第一行工程师\n\n第三行写代码\n");
    }
}
