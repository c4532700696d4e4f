//! 作业处理器
//! 作业列表、作业详情与启动作业

use axum::{
    extract::{rejection::FormRejection, Form, Path, Query, State},
    http::{header, HeaderMap, Uri},
    response::Response,
};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    error::{AppError, JobServiceError, Result},
    handlers::base_url,
    middleware::AppState,
    models::{
        job::JobParameters,
        pagination::Pagination,
        request::{JobDetailsQuery, JobListQuery, LaunchQuery, LaunchRequest},
        view::{JobExecutionInfo, JobInfo, JobInstanceInfo},
    },
    services::properties::{properties_to_string, string_to_properties},
    views::{escape_markup, Format, Model},
};

/// 从请求路径中解析作业名
///
/// 取最后一个 `jobs/` 之后的部分；若以配置的某个扩展名结尾，只去掉一个扩展名，
/// 因此名为 `job.html` 的作业可以通过 `job.html.json` 访问。
/// 返回作业名和被去掉的扩展名。
pub fn resolve_job_name<'a>(path: &str, extensions: &'a [String]) -> (String, Option<&'a str>) {
    let name = match path.rfind("jobs/") {
        Some(index) => &path[index + "jobs/".len()..],
        None => path,
    };
    if !name.contains('.') {
        return (name.to_string(), None);
    }

    for extension in extensions {
        if name.ends_with(extension.as_str()) {
            let stripped = match name.rfind('.') {
                Some(dot) => &name[..dot],
                None => name,
            };
            return (stripped.to_string(), Some(extension.as_str()));
        }
    }

    (name.to_string(), None)
}

fn job_name_and_format(state: &AppState, segment: &str) -> Result<(String, Format)> {
    let (job_name, extension) = resolve_job_name(segment, &state.config.console.extensions);
    let format = Format::from_extension(extension)
        .ok_or_else(|| AppError::NotAcceptable(segment.to_string()))?;
    Ok((job_name, format))
}

/// GET /jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): Query<JobListQuery>,
) -> Result<Response> {
    query
        .validate()
        .map_err(|e| AppError::validation(&e.to_string()))?;
    let format = Format::for_path(uri.path(), &state.config.console.extensions)?;

    let start = query.start_job.unwrap_or(0);
    let page_size = query
        .page_size
        .unwrap_or(state.config.console.default_page_size);

    let service = &state.job_service;
    let mut model = Model::new();

    let total = service.count_jobs().await;
    Pagination::new(total, start, page_size).apply(&mut model, "Job");

    let names = service.list_jobs(start, page_size).await;
    let mut jobs = Vec::with_capacity(names.len());
    for name in names {
        let count = service
            .count_job_executions_for_job(&name)
            .await
            .unwrap_or(0);
        let launchable = service.is_launchable(&name).await;
        let incrementable = service.is_incrementable(&name).await;
        jobs.push(JobInfo::new(name, count).with_flags(launchable, incrementable));
    }

    model.insert("jobs", &jobs)?;
    model.insert("pageSize", &page_size)?;
    model.insert("baseUrl", &base_url(&state, &headers))?;

    state.renderer.render("jobs", format, &model)
}

/// GET /jobs/{jobName}
pub async fn job_details(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(segment): Path<String>,
    Query(query): Query<JobDetailsQuery>,
) -> Result<Response> {
    query
        .validate()
        .map_err(|e| AppError::validation(&e.to_string()))?;
    let (job_name, format) = job_name_and_format(&state, &segment)?;

    let start = query.start_job_instance.unwrap_or(0);
    let page_size = query
        .page_size
        .unwrap_or(state.config.console.default_page_size);

    let mut model = Model::new();
    model.insert("baseUrl", &base_url(&state, &headers))?;
    populate_details(&state, &job_name, start, page_size, &mut model).await?;

    state.renderer.render("jobs/job", format, &model)
}

/// POST /jobs/{jobName}
pub async fn launch_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(segment): Path<String>,
    Query(query): Query<LaunchQuery>,
    form: std::result::Result<Form<LaunchRequest>, FormRejection>,
) -> Result<Response> {
    let (job_name, format) = job_name_and_format(&state, &segment)?;

    let request = match form {
        Ok(Form(request)) => request,
        // 没有 Content-Type 的空请求按空参数启动
        Err(FormRejection::InvalidFormContentType(_))
            if !headers.contains_key(header::CONTENT_TYPE) =>
        {
            LaunchRequest::default()
        }
        Err(rejection) => return Err(AppError::BadRequest(rejection.body_text())),
    };

    let view = if query.origin() == "job" {
        "jobs/job"
    } else {
        "jobs/execution"
    };
    if !state.renderer.supports(view, format) {
        return Err(AppError::NotAcceptable(format!("{}.rss", view)));
    }

    let mut model = Model::new();
    model.insert("jobName", &job_name)?;
    model.insert("baseUrl", &base_url(&state, &headers))?;

    let properties = string_to_properties(request.job_parameters.as_deref().unwrap_or_default());
    let launched = match state.converter.job_parameters(&properties) {
        Ok(parameters) => state.job_service.launch(&job_name, parameters).await,
        Err(e) => Err(e.into()),
    };

    match launched {
        Ok(execution) => {
            metrics::counter!("batch_job_launches_total", "result" => "launched").increment(1);
            info!(
                job_name = %job_name,
                execution_id = execution.id,
                "Job launched"
            );
            model.insert(
                "jobExecution",
                &JobExecutionInfo::new(&execution, state.time_zone),
            )?;
        }
        Err(e) => {
            metrics::counter!("batch_job_launches_total", "result" => e.code()).increment(1);
            warn!(job_name = %job_name, code = e.code(), error = %e, "Job launch rejected");
            model.reject(e.code(), e.default_message(&job_name));
        }
    }

    if view == "jobs/job" {
        populate_details(
            &state,
            &job_name,
            0,
            state.config.console.default_page_size,
            &mut model,
        )
        .await?;
    }
    state.renderer.render(view, format, &model)
}

/// 详情页所需的作业服务数据
struct JobDetails {
    instances: Vec<JobInstanceInfo>,
    last_parameters: JobParameters,
    total_instances: usize,
    execution_count: usize,
}

async fn load_details(
    state: &AppState,
    job_name: &str,
    start: usize,
    page_size: usize,
) -> std::result::Result<JobDetails, JobServiceError> {
    let service = &state.job_service;

    let instances = service.list_job_instances(job_name, start, page_size).await?;
    let mut infos = Vec::with_capacity(instances.len());
    for instance in &instances {
        let executions = service
            .get_job_executions_for_job_instance(job_name, instance.id)
            .await?;
        infos.push(JobInstanceInfo::new(instance, &executions, state.time_zone));
    }

    let last_parameters = instances
        .first()
        .map(|instance| instance.job_parameters.clone())
        .unwrap_or_default();

    Ok(JobDetails {
        instances: infos,
        last_parameters,
        total_instances: service.count_job_instances(job_name).await?,
        execution_count: service.count_job_executions_for_job(job_name).await?,
    })
}

async fn populate_details(
    state: &AppState,
    job_name: &str,
    start: usize,
    page_size: usize,
    model: &mut Model,
) -> Result<()> {
    model.insert("jobName", job_name)?;
    model.insert("pageSize", &page_size)?;
    model.insert("launchable", &state.job_service.is_launchable(job_name).await)?;

    match load_details(state, job_name, start, page_size).await {
        Ok(details) => {
            model.insert("jobInstances", &details.instances)?;
            model.insert(
                "jobParameters",
                &last_job_parameters(state, &details.last_parameters),
            )?;
            Pagination::new(details.total_instances, start, page_size)
                .apply(model, "JobInstance");
            model.insert("job", &JobInfo::new(job_name, details.execution_count))?;
        }
        Err(JobServiceError::NoSuchJob(_)) => {
            model.reject(
                "no.such.job",
                format!("There is no such job ({})", escape_markup(job_name)),
            );
        }
        Err(e) => {
            model.reject(e.code(), e.default_message(job_name));
        }
    }

    Ok(())
}

/// 启动表单里预填的上一次参数，原样提交即以相同参数启动
fn last_job_parameters(state: &AppState, parameters: &JobParameters) -> String {
    properties_to_string(&state.converter.properties(parameters))
}
