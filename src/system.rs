use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use arboard::Clipboard;
use crossterm::cursor::MoveTo;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};

pub(crate) fn edit_content(initial: &str) -> Result<String, String> {
    let editor = match env::var("EDITOR") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Err("未设置 EDITOR 环境变量".to_string()),
    };
    let path = env::temp_dir().join("pwk-template.txt");
    fs::write(&path, initial).map_err(|err| format!("写入临时文件失败: {err}"))?;
    run_editor_command(&editor, &path)?;
    fs::read_to_string(&path).map_err(|err| format!("读取临时文件失败: {err}"))
}

fn run_editor_command(editor: &str, path: &PathBuf) -> Result<(), String> {
    let mut parts = editor.split_whitespace();
    let command = parts
        .next()
        .ok_or_else(|| "EDITOR 为空".to_string())
        .map(|value| value.to_string())?;
    let args: Vec<String> = parts.map(|part| part.to_string()).collect();

    disable_raw_mode().map_err(|err| format!("退出原始模式失败: {err}"))?;
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture)
        .map_err(|err| format!("退出全屏模式失败: {err}"))?;

    let status_result = Command::new(&command).args(&args).arg(path).status();

    let restore_result = execute!(
        io::stdout(),
        EnterAlternateScreen,
        EnableMouseCapture,
        Clear(ClearType::All),
        MoveTo(0, 0)
    )
    .map_err(|err| format!("恢复全屏模式失败: {err}"))
    .and_then(|_| enable_raw_mode().map_err(|err| format!("恢复原始模式失败: {err}")));

    let status = match status_result {
        Ok(status) => status,
        Err(err) => {
            let _ = restore_result;
            return Err(format!("启动编辑器失败: {err}"));
        }
    };
    if let Err(err) = restore_result {
        return Err(err);
    }
    if !status.success() {
        return Err(format!("编辑器退出异常: {status}"));
    }
    Ok(())
}

pub(crate) fn set_clipboard(text: &str) -> Result<(), String> {
    Clipboard::new()
        .and_then(|mut cb| cb.set_text(text.to_string()))
        .map_err(|err| format!("复制失败: {err}"))
}

pub(crate) fn trim_trailing_newline(input: &str) -> &str {
    let trimmed = input.strip_suffix('\n').unwrap_or(input);
    trimmed.strip_suffix('\r').unwrap_or(trimmed)
}
