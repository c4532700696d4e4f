//! 属性文本编解码
//! 解析 `key=value` 形式的作业参数文本

use std::collections::BTreeMap;

/// 解析后的属性表
pub type Properties = BTreeMap<String, String>;

/// 将属性文本解析为属性表
///
/// 不含换行时逗号视为条目分隔符，因此 `a=1,b=2` 与两行写法等价。
pub fn string_to_properties(input: &str) -> Properties {
    let normalized;
    let text = if input.contains('\n') {
        input
    } else {
        normalized = input
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        normalized.as_str()
    };

    let mut properties = Properties::new();
    for line in logical_lines(text) {
        if let Some((key, value)) = parse_entry(&line) {
            properties.insert(key, value);
        }
    }
    properties
}

/// 将属性表渲染为每行一个 `key=value` 的文本，按键排序，每个条目以换行结尾
pub fn properties_to_string(properties: &Properties) -> String {
    let mut text = String::new();
    for (key, value) in properties {
        text.push_str(&escape(key, true));
        text.push('=');
        text.push_str(&escape(value, false));
        text.push('\n');
    }
    text
}

/// 转义后的文本能被 [`string_to_properties`] 原样读回
fn escape(text: &str, is_key: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for (index, c) in text.chars().enumerate() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            ' ' if is_key || index == 0 => escaped.push_str("\\ "),
            '=' | ':' if is_key => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' | '!' if is_key && index == 0 => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}

/// 合并以反斜杠结尾的续行，跳过空行与注释
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r').trim_start();
        let mut current = match pending.take() {
            Some(mut prefix) => {
                prefix.push_str(line);
                prefix
            }
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                line.to_string()
            }
        };

        if ends_with_continuation(&current) {
            current.pop();
            pending = Some(current);
        } else {
            lines.push(current);
        }
    }

    if let Some(rest) = pending {
        lines.push(rest);
    }
    lines
}

/// 行尾奇数个反斜杠表示续行
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn parse_entry(line: &str) -> Option<(String, String)> {
    let mut key = String::new();
    let mut chars = line.chars().peekable();
    let mut separated = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    key.push(unescape(escaped));
                }
            }
            '=' | ':' => {
                separated = true;
                break;
            }
            c if c.is_whitespace() => {
                // `key value` 或 `key = value`
                while chars.peek().is_some_and(|next| next.is_whitespace()) {
                    chars.next();
                }
                if chars.peek().is_some_and(|next| *next == '=' || *next == ':') {
                    chars.next();
                }
                separated = true;
                break;
            }
            c => key.push(c),
        }
    }

    if key.is_empty() {
        return None;
    }

    let mut value = String::new();
    if separated {
        while chars.peek().is_some_and(|next| next.is_whitespace()) {
            chars.next();
        }
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    value.push(unescape(escaped));
                }
            } else {
                value.push(c);
            }
        }
    }

    Some((key, value))
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}
