use std::env;
use std::fs;
use std::path::PathBuf;

use crate::defaults;
use crate::models::Workshop;

pub(crate) fn load_workshop() -> Result<Workshop, String> {
    let path = ensure_workshop_file()?;
    let content =
        fs::read_to_string(&path).map_err(|err| format!("读取失败: {} ({err})", path.display()))?;
    let mut workshop: Workshop = serde_json::from_str(&content)
        .map_err(|err| format!("解析失败: {} ({err})", path.display()))?;
    // 活动模板被删除后残留的 id 指向空，启动时回退到第一个模板
    let active_exists = workshop
        .active_template_id
        .as_deref()
        .is_some_and(|id| workshop.templates.iter().any(|template| template.id == id));
    if !active_exists {
        workshop.active_template_id = workshop.templates.first().map(|template| template.id.clone());
    }
    Ok(workshop)
}

pub(crate) fn save_workshop(workshop: &Workshop) -> Result<(), String> {
    let path = workshop_path().ok_or_else(|| "无法定位用户目录".to_string())?;
    let content =
        serde_json::to_string_pretty(workshop).map_err(|err| format!("序列化失败: {err}"))?;
    fs::write(&path, content).map_err(|err| format!("保存失败: {} ({err})", path.display()))
}

fn ensure_workshop_file() -> Result<PathBuf, String> {
    let path = workshop_path().ok_or_else(|| "无法定位用户目录".to_string())?;
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("创建目录失败: {} ({err})", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(&defaults::default_workshop())
        .map_err(|err| format!("序列化失败: {err}"))?;
    fs::write(&path, content)
        .map_err(|err| format!("创建数据文件失败: {} ({err})", path.display()))?;
    Ok(path)
}

fn workshop_path() -> Option<PathBuf> {
    let home = env::var_os("USERPROFILE")
        .or_else(|| env::var_os("HOME"))
        .map(PathBuf::from)?;
    Some(home.join(".config").join("pwk").join("workshop.json"))
}
