//! 视图层
//! 视图模型容器、格式协商与 HTML/JSON/RSS 渲染

use axum::{
    http::header,
    response::{Html, IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tera::{Context, Tera};

use crate::error::{AppError, Result};
use crate::models::view::ResourceInfo;

/// 支持 RSS 输出的视图
const RSS_VIEWS: &[&str] = &["jobs", "jobs/job"];

/// 用户可见的拒绝消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub code: String,
    pub message: String,
}

/// 视图模型：属性表 + 拒绝消息
#[derive(Debug, Clone, Default)]
pub struct Model {
    attributes: Map<String, Value>,
    errors: Vec<Rejection>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        self.attributes
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn reject(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.errors.push(Rejection {
            code: code.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `code -> message`，同一错误码保留最后一条
    fn errors_by_code(&self) -> Map<String, Value> {
        self.errors
            .iter()
            .map(|e| (e.code.clone(), Value::String(e.message.clone())))
            .collect()
    }
}

/// 输出格式，由请求路径的扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Json,
    Rss,
}

impl Format {
    /// 无扩展名时为 HTML；无法渲染的扩展名返回 None
    pub fn from_extension(extension: Option<&str>) -> Option<Self> {
        let extension = extension.map(|e| e.trim_start_matches('.').to_ascii_lowercase());
        match extension.as_deref() {
            None | Some("html") => Some(Format::Html),
            Some("json") => Some(Format::Json),
            Some("rss") => Some(Format::Rss),
            _ => None,
        }
    }

    /// 在配置的扩展名中查找路径的后缀
    ///
    /// 路径带有未配置的扩展名时不回退到 HTML。
    pub fn for_path(path: &str, extensions: &[String]) -> Result<Self> {
        let extension = extensions
            .iter()
            .find(|extension| path.ends_with(extension.as_str()))
            .map(String::as_str);
        let unconfigured = extension.is_none()
            && path
                .rsplit('/')
                .next()
                .is_some_and(|segment| segment.contains('.'));
        if unconfigured {
            return Err(AppError::NotAcceptable(path.to_string()));
        }
        Self::from_extension(extension)
            .ok_or_else(|| AppError::NotAcceptable(path.to_string()))
    }
}

/// 视图渲染器
pub struct Renderer {
    tera: Tera,
    servlet_path: String,
    messages: BTreeMap<String, String>,
}

impl Renderer {
    /// `messages` 为资源描述目录，键与 [`ResourceInfo::key`] 一致
    pub fn new(
        servlet_path: impl Into<String>,
        messages: BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("templates/layout.html")),
            ("home.html", include_str!("templates/home.html")),
            ("jobs.html", include_str!("templates/jobs.html")),
            ("jobs/job.html", include_str!("templates/jobs/job.html")),
            ("jobs/execution.html", include_str!("templates/jobs/execution.html")),
            ("jobs.rss.xml", include_str!("templates/jobs.rss.xml")),
            ("jobs/job.rss.xml", include_str!("templates/jobs/job.rss.xml")),
        ])?;
        tera.set_escape_fn(escape_markup);

        Ok(Self {
            tera,
            servlet_path: servlet_path.into(),
            messages,
        })
    }

    /// 视图能否以给定格式渲染
    pub fn supports(&self, view: &str, format: Format) -> bool {
        format != Format::Rss || RSS_VIEWS.contains(&view)
    }

    pub fn render(&self, view: &str, format: Format, model: &Model) -> Result<Response> {
        let response = match format {
            Format::Json => Json(self.render_json(view, model)?).into_response(),
            Format::Html => Html(self.render_html(view, model)?).into_response(),
            Format::Rss => (
                [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
                self.render_rss(view, model)?,
            )
                .into_response(),
        };
        Ok(response)
    }

    pub fn render_json(&self, view: &str, model: &Model) -> Result<Value> {
        let mut document = if view == "home" {
            let mut document = Map::new();
            document.insert("feed".to_string(), self.home_feed(model)?);
            document
        } else {
            model.attributes.clone()
        };

        if model.has_errors() {
            document.insert("errors".to_string(), Value::Object(model.errors_by_code()));
        }
        Ok(Value::Object(document))
    }

    pub fn render_html(&self, view: &str, model: &Model) -> Result<String> {
        let context = self.template_context(view, model)?;
        Ok(self.tera.render(&format!("{}.html", view), &context)?)
    }

    pub fn render_rss(&self, view: &str, model: &Model) -> Result<String> {
        if !self.supports(view, Format::Rss) {
            return Err(AppError::NotAcceptable(format!("{}.rss", view)));
        }
        let context = self.template_context(view, model)?;
        Ok(self.tera.render(&format!("{}.rss.xml", view), &context)?)
    }

    /// 首页资源目录：键为去掉扩展名的 url，uri 为完整地址
    pub fn home_feed(&self, model: &Model) -> Result<Value> {
        let resources: Vec<ResourceInfo> = match model.get("resources") {
            Some(value) => serde_json::from_value(value.clone())?,
            None => Vec::new(),
        };
        let base_url = model
            .get("baseUrl")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut entries = Map::new();
        for resource in &resources {
            let key = resource.key();
            let description = resource
                .description
                .clone()
                .or_else(|| self.messages.get(&key).cloned())
                .unwrap_or_default();
            entries.insert(
                key,
                json!({
                    "uri": format!("{}{}{}", base_url, self.servlet_path, resource.url),
                    "method": resource.method,
                    "description": description,
                }),
            );
        }

        Ok(json!({ "resources": entries }))
    }

    fn template_context(&self, view: &str, model: &Model) -> Result<Context> {
        let mut values = model.attributes.clone();
        values.insert("servletPath".to_string(), Value::String(self.servlet_path.clone()));
        values
            .entry("baseUrl")
            .or_insert_with(|| Value::String(String::new()));
        values.insert("errors".to_string(), serde_json::to_value(&model.errors)?);
        if view == "home" {
            values.insert("feed".to_string(), self.home_feed(model)?);
        }
        Ok(Context::from_value(Value::Object(values))?)
    }
}

/// 转义 HTML/XML 特殊字符；`/` 保持原样，地址可以直接输出
pub fn escape_markup(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> Renderer {
        Renderer::new("/batch", BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_extension(None), Some(Format::Html));
        assert_eq!(Format::from_extension(Some(".json")), Some(Format::Json));
        assert_eq!(Format::from_extension(Some(".RSS")), Some(Format::Rss));
        assert_eq!(Format::from_extension(Some(".xml")), None);
    }

    #[test]
    fn test_format_for_path() {
        let extensions = vec![".html".to_string(), ".json".to_string(), ".xml".to_string()];
        assert_eq!(Format::for_path("/jobs", &extensions).unwrap(), Format::Html);
        assert_eq!(Format::for_path("/jobs.json", &extensions).unwrap(), Format::Json);
        // 未配置的扩展名不参与协商
        assert!(matches!(
            Format::for_path("/jobs.rss", &extensions),
            Err(AppError::NotAcceptable(_))
        ));
        assert!(matches!(
            Format::for_path("/jobs.xml", &extensions),
            Err(AppError::NotAcceptable(_))
        ));
    }

    #[test]
    fn test_json_includes_errors_by_code() {
        let mut model = Model::new();
        model.insert("jobName", "payroll").unwrap();
        model.reject("no.such.job", "No such job: payroll");

        let json = renderer().render_json("jobs/execution", &model).unwrap();
        assert_eq!(json["jobName"], "payroll");
        assert_eq!(json["errors"]["no.such.job"], "No such job: payroll");
    }

    #[test]
    fn test_json_without_errors_has_no_errors_key() {
        let mut model = Model::new();
        model.insert("jobs", &Vec::<String>::new()).unwrap();
        let json = renderer().render_json("jobs", &model).unwrap();
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_home_feed_uri_and_descriptions() {
        let mut messages = BTreeMap::new();
        messages.insert("/jobs".to_string(), "List jobs".to_string());
        let renderer = Renderer::new("/batch", messages).unwrap();

        let mut model = Model::new();
        model
            .insert(
                "resources",
                &vec![
                    ResourceInfo::new("/jobs.json", "GET"),
                    ResourceInfo::new("/jobs/{jobName}.json", "POST").with_description("Launch"),
                ],
            )
            .unwrap();
        model.insert("baseUrl", "http://example.com").unwrap();

        let feed = renderer.home_feed(&model).unwrap();
        assert_eq!(feed["resources"]["/jobs"]["uri"], "http://example.com/batch/jobs.json");
        assert_eq!(feed["resources"]["/jobs"]["description"], "List jobs");
        assert_eq!(feed["resources"]["POST /jobs/{jobName}"]["description"], "Launch");
    }

    #[test]
    fn test_rss_only_for_listing_views() {
        let model = Model::new();
        let result = renderer().render_rss("home", &model);
        assert!(matches!(result, Err(AppError::NotAcceptable(_))));
    }

    #[test]
    fn test_escape_markup_keeps_slashes() {
        assert_eq!(escape_markup("/batch/jobs"), "/batch/jobs");
        assert_eq!(escape_markup(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
    }

    #[test]
    fn test_supports() {
        let renderer = renderer();
        assert!(renderer.supports("jobs/job", Format::Rss));
        assert!(!renderer.supports("jobs/execution", Format::Rss));
        assert!(renderer.supports("jobs/execution", Format::Json));
    }

    #[test]
    fn test_html_escapes_model_values() {
        let mut model = Model::new();
        model.insert("jobName", "<script>").unwrap();
        model.insert("launchable", &false).unwrap();
        let html = renderer().render_html("jobs/execution", &model).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
