use std::collections::BTreeMap;

use crate::models::{Bank, Category, CategoryColor, Template, Workshop, now_millis};

pub(crate) const NEW_TEMPLATE_CONTENT: &str = "你是一个{{role}}，请帮我{{task}}。";

pub(crate) fn default_workshop() -> Workshop {
    let templates = default_templates();
    let active_template_id = templates.first().map(|template| template.id.clone());
    Workshop {
        templates,
        banks: default_banks(),
        categories: default_categories(),
        active_template_id,
    }
}

pub(crate) fn default_categories() -> Vec<Category> {
    [
        ("character", "人物", CategoryColor::Blue),
        ("item", "物品", CategoryColor::Amber),
        ("action", "动作", CategoryColor::Rose),
        ("location", "地点", CategoryColor::Emerald),
        ("visual", "画面", CategoryColor::Violet),
        ("other", "其他", CategoryColor::Slate),
    ]
    .into_iter()
    .map(|(id, label, color)| Category {
        id: id.to_string(),
        label: label.to_string(),
        color,
    })
    .collect()
}

pub(crate) fn default_banks() -> Vec<Bank> {
    [
        (
            "role",
            "角色身份",
            "character",
            vec!["专业程序员", "资深产品经理", "创意设计师", "AI助手", "数据分析师", "文案策划"],
        ),
        (
            "personality",
            "性格特点",
            "character",
            vec!["专业严谨", "友好耐心", "创意无限", "逻辑清晰", "细心周到", "高效务实"],
        ),
        (
            "expertise",
            "专业领域",
            "character",
            vec!["前端开发", "后端开发", "全栈开发", "UI/UX设计", "数据科学", "产品设计"],
        ),
        (
            "task",
            "任务类型",
            "action",
            vec!["代码审查", "功能开发", "Bug修复", "性能优化", "文档编写", "方案设计"],
        ),
        (
            "output_format",
            "输出格式",
            "action",
            vec!["Markdown格式", "JSON格式", "表格形式", "分步骤说明", "代码示例", "流程图"],
        ),
        (
            "thinking_style",
            "思考方式",
            "action",
            vec!["逐步分析", "先总后分", "对比分析", "案例驱动", "问题导向", "系统思考"],
        ),
        (
            "language",
            "编程语言",
            "item",
            vec!["TypeScript", "JavaScript", "Python", "Java", "Go", "Rust"],
        ),
        (
            "framework",
            "技术框架",
            "item",
            vec!["React", "Vue", "Next.js", "Node.js", "Spring Boot", "Django"],
        ),
        (
            "tool",
            "工具",
            "item",
            vec!["VS Code", "Git", "Docker", "Webpack", "ESLint", "Prettier"],
        ),
        (
            "scenario",
            "使用场景",
            "location",
            vec!["日常开发", "技术面试", "代码学习", "项目重构", "团队协作", "独立开发"],
        ),
        (
            "project_type",
            "项目类型",
            "location",
            vec!["Web应用", "移动应用", "后端服务", "开源项目", "企业系统", "个人项目"],
        ),
        (
            "style",
            "回答风格",
            "visual",
            vec!["简洁明了", "详细全面", "循序渐进", "直击重点", "图文并茂", "代码为主"],
        ),
        (
            "tone",
            "语气",
            "visual",
            vec!["专业正式", "轻松友好", "严谨学术", "生动有趣", "鼓励引导", "客观中立"],
        ),
        (
            "constraint",
            "限制条件",
            "other",
            vec!["不超过500字", "使用中文", "包含示例", "避免术语", "保持简洁", "提供参考"],
        ),
        (
            "goal",
            "目标",
            "other",
            vec!["解决问题", "学习理解", "提高效率", "代码质量", "性能提升", "最佳实践"],
        ),
    ]
    .into_iter()
    .map(|(key, label, category, options)| Bank {
        key: key.to_string(),
        label: label.to_string(),
        category: category.to_string(),
        options: options.into_iter().map(str::to_string).collect(),
    })
    .collect()
}

pub(crate) fn default_templates() -> Vec<Template> {
    let now = now_millis();
    vec![
        Template {
            id: "template-1".to_string(),
            name: "通用助手模板".to_string(),
            content: "你是一个{{role}}，具有{{personality}}的特点。\n\n你的专业领域是{{expertise}}，擅长{{task}}。\n\n请以{{style}}的方式回答，语气保持{{tone}}。\n\n输出格式：{{output_format}}\n\n{{constraint}}".to_string(),
            selections: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        },
        Template {
            id: "template-2".to_string(),
            name: "代码助手模板".to_string(),
            content: "你是一个精通{{language}}的{{role}}。\n\n主要使用{{framework}}框架，熟练运用{{tool}}工具。\n\n当前场景：{{scenario}}\n项目类型：{{project_type}}\n\n请帮我完成{{task}}任务，目标是{{goal}}。\n\n要求：\n- 思考方式：{{thinking_style}}\n- 输出格式：{{output_format}}\n- {{constraint}}".to_string(),
            selections: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        },
    ]
}
