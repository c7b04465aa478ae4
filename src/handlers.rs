use crate::error::AppError;
use crate::file_system::{collect_local_files, validate_path};
use crate::models::{Agent, DirectoryQuery};
use crate::session::AppState;
use crate::source::{SourceFile, UploadedFile};
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use log::{debug, info, warn};
use rust_embed::RustEmbed;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

#[derive(RustEmbed)]
#[folder = "public/"]
struct Asset;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(connect)
        .service(get_status)
        .service(list_agents)
        .service(save_agent)
        .service(delete_agent)
        .service(select_agent)
        .service(list_files)
        .service(upload_files)
        .service(load_directory)
        .service(get_tree)
        .service(analyze)
        .service(get_report)
        .service(download_report)
        .service(reset)
        .default_service(web::to(static_handler));
}

#[get("/api/connect")]
pub async fn connect() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true, "message": "Connection successful" }))
}

#[get("/api/status")]
pub async fn get_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.status())
}

#[get("/api/agents")]
pub async fn list_agents(state: web::Data<AppState>) -> HttpResponse {
    let session = state.session.lock();
    HttpResponse::Ok().json(json!({
        "success": true,
        "agents": session.agents.list(),
        "selectedAgentId": session.agents.selected_id(),
    }))
}

#[post("/api/agents")]
pub async fn save_agent(
    state: web::Data<AppState>,
    agent: web::Json<Agent>,
) -> Result<HttpResponse, AppError> {
    let agent = agent.into_inner();
    if agent.name.trim().is_empty() || agent.master_prompt.trim().is_empty() {
        return Err(AppError::Precondition(
            "An agent needs a name and a master prompt.".to_string(),
        ));
    }
    let saved = state.session.lock().agents.save(agent);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "agent": saved })))
}

#[delete("/api/agents/{id}")]
pub async fn delete_agent(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let mut session = state.session.lock();
    session
        .agents
        .delete(&id)
        .ok_or_else(|| AppError::NotFound(format!("Agent not found: {}", id)))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "selectedAgentId": session.agents.selected_id(),
    })))
}

#[post("/api/agents/{id}/select")]
pub async fn select_agent(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    if !state.session.lock().agents.select(&id) {
        return Err(AppError::NotFound(format!("Agent not found: {}", id)));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "selectedAgentId": id.as_str() })))
}

#[get("/api/files")]
pub async fn list_files(state: web::Data<AppState>) -> HttpResponse {
    let session = state.session.lock();
    let paths: Vec<&str> = session.files().iter().map(|f| f.path()).collect();
    HttpResponse::Ok().json(json!({ "success": true, "files": paths }))
}

#[post("/api/files")]
pub async fn upload_files(
    state: web::Data<AppState>,
    files: web::Json<Vec<UploadedFile>>,
) -> Result<HttpResponse, AppError> {
    let files: Vec<Arc<dyn SourceFile>> = files
        .into_inner()
        .into_iter()
        .map(|f| Arc::new(f) as Arc<dyn SourceFile>)
        .collect();
    let count = state.session.lock().set_files(files)?;
    info!("Received upload of {} files.", count);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "fileCount": count })))
}

#[post("/api/directory")]
pub async fn load_directory(
    state: web::Data<AppState>,
    query: web::Query<DirectoryQuery>,
) -> Result<HttpResponse, AppError> {
    let base_path_str = query.path.clone().unwrap_or_else(|| ".".to_string());
    info!("Received request to load directory: {}", base_path_str);
    let start_time = Instant::now();

    let path = validate_path(&base_path_str).map_err(|e| {
        warn!("Path validation failed for '{}': {}", base_path_str, e);
        e
    })?;
    let files = collect_local_files(&path).await?;
    let files: Vec<Arc<dyn SourceFile>> = files
        .into_iter()
        .map(|f| Arc::new(f) as Arc<dyn SourceFile>)
        .collect();
    let count = state.session.lock().set_files(files)?;

    info!(
        "Loaded {} files from '{}' in {:.2?}.",
        count,
        path.display(),
        start_time.elapsed()
    );
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "root": path.to_str().unwrap_or(""),
        "fileCount": count,
    })))
}

#[get("/api/tree")]
pub async fn get_tree(state: web::Data<AppState>) -> HttpResponse {
    let session = state.session.lock();
    HttpResponse::Ok().json(json!({
        "success": true,
        "tree": session.tree(),
        "listing": session.listing(),
    }))
}

#[post("/api/analyze")]
pub async fn analyze(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let (tree, report) = state.run_analysis().await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "tree": tree, "report": report })))
}

#[get("/api/report")]
pub async fn get_report(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let session = state.session.lock();
    let report = session
        .report()
        .ok_or_else(|| AppError::NotFound("No report has been generated yet.".to_string()))?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "markdown": report.markdown })))
}

#[get("/api/report/download")]
pub async fn download_report(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let (file_name, document) = state.export_report().await?;
    debug!("Serving report download '{}'.", file_name);
    Ok(HttpResponse::Ok()
        .content_type("application/msword")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file_name)],
        })
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(document))
}

#[post("/api/reset")]
pub async fn reset(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    state.session.lock().reset()?;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn static_handler(req: HttpRequest) -> HttpResponse {
    let path = req.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };
    debug!("Serving static asset: {}", path);

    match Asset::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            HttpResponse::Ok()
                .content_type(mime.as_ref())
                .body(content.data.into_owned())
        }
        None => HttpResponse::NotFound().body("404 Not Found"),
    }
}
