use crate::analyzer;
use crate::analyzer::categorizer::{Category, Classification, MatchType};
use crate::analyzer::report::{ActivitySample, ProductivityReport};
use crate::analyzer::suggest::RuleSuggestion;
use crate::config::Config;
use crate::db::{
    AddRuleOutcome, AppRule, BulkRules, Database, NewRule, TeamName, TeamRow, TeamSummary,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/teams", get(team_list).post(team_create))
        .route(
            "/api/v1/teams/:team_id",
            get(team_detail).put(team_rename).delete(team_delete),
        )
        .route(
            "/api/v1/teams/:team_id/rules",
            get(rule_list).post(rule_create).put(rule_replace),
        )
        .route("/api/v1/teams/:team_id/rules/:rule_id", delete(rule_delete))
        .route("/api/v1/teams/:team_id/classify", post(classify))
        .route("/api/v1/teams/:team_id/productivity", post(productivity))
        .route("/api/v1/teams/:team_id/suggest-rules", post(suggest_rules))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    db_path: String,
    team_count: i64,
    rule_count: i64,
    api_port: u16,
}

#[derive(Debug, Deserialize)]
struct TeamNamePayload {
    name: String,
}

#[derive(Debug, Serialize)]
struct TeamDetailPayload {
    id: String,
    name: String,
    created_at: Option<DateTime<Utc>>,
    rules: Vec<AppRule>,
}

#[derive(Debug, Deserialize)]
struct RuleCreatePayload {
    app_pattern: String,
    category: Option<String>,
    match_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassifyPayload {
    app_name: String,
    window_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SamplesPayload {
    samples: Vec<ActivitySample>,
}

#[derive(Debug, Serialize)]
struct SuggestionsPayload {
    team_id: String,
    team_name: String,
    suggestions: Vec<RuleSuggestion>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;

    Ok(Json(StatusPayload {
        db_path: state.config.db_path.display().to_string(),
        team_count: database.team_count()?,
        rule_count: database.rule_count()?,
        api_port: state.config.api_port,
    }))
}

async fn team_list(State(state): State<ApiState>) -> ApiResult<Json<Vec<TeamSummary>>> {
    let database = Database::open(&state.config.db_path)?;
    Ok(Json(database.list_teams()?))
}

async fn team_create(
    State(state): State<ApiState>,
    Json(payload): Json<TeamNamePayload>,
) -> ApiResult<(StatusCode, Json<TeamRow>)> {
    let name =
        TeamName::parse(&payload.name).map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let database = Database::open(&state.config.db_path)?;
    let team = database.create_team(&name)?;
    info!(team_id = %team.id, name = %team.name, "team created");

    Ok((StatusCode::CREATED, Json(team)))
}

async fn team_detail(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<TeamDetailPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let team = require_team(&database, &team_id)?;
    let rules = database.rules_for_team(&team_id)?;

    Ok(Json(TeamDetailPayload {
        id: team.id,
        name: team.name,
        created_at: team.created_at,
        rules,
    }))
}

async fn team_rename(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Json(payload): Json<TeamNamePayload>,
) -> ApiResult<Json<TeamRow>> {
    let name =
        TeamName::parse(&payload.name).map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let database = Database::open(&state.config.db_path)?;
    if !database.rename_team(&team_id, &name)? {
        return Err(team_not_found());
    }

    Ok(Json(require_team(&database, &team_id)?))
}

async fn team_delete(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let database = Database::open(&state.config.db_path)?;
    let team = require_team(&database, &team_id)?;
    database.delete_team(&team_id)?;
    info!(team_id = %team_id, "team deleted");

    Ok(Json(json!({
        "success": true,
        "message": format!("Team '{}' deleted", team.name)
    })))
}

async fn rule_list(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
) -> ApiResult<Json<Vec<AppRule>>> {
    let database = Database::open(&state.config.db_path)?;
    require_team(&database, &team_id)?;

    Ok(Json(database.rules_for_team(&team_id)?))
}

async fn rule_create(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Json(payload): Json<RuleCreatePayload>,
) -> ApiResult<(StatusCode, Json<AppRule>)> {
    let rule = parse_new_rule(&payload).map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let database = Database::open(&state.config.db_path)?;
    require_team(&database, &team_id)?;

    match database.add_rule(&team_id, &rule)? {
        AddRuleOutcome::Created(created) => {
            info!(team_id = %team_id, rule_id = created.id, pattern = %created.app_pattern, "rule added");
            Ok((StatusCode::CREATED, Json(created)))
        }
        AddRuleOutcome::Duplicate => Err(ApiError::Conflict(format!(
            "Rule for '{}' already exists",
            rule.app_pattern
        ))),
    }
}

async fn rule_replace(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Json(payload): Json<BulkRules>,
) -> ApiResult<Json<Value>> {
    let rules = payload
        .into_new_rules()
        .map_err(|error| ApiError::BadRequest(error.to_string()))?;

    let mut database = Database::open(&state.config.db_path)?;
    require_team(&database, &team_id)?;
    let total_rules = database.replace_rules(&team_id, &rules)?;
    info!(team_id = %team_id, total_rules, "team rules replaced");

    Ok(Json(json!({ "success": true, "total_rules": total_rules })))
}

async fn rule_delete(
    State(state): State<ApiState>,
    Path((team_id, rule_id)): Path<(String, i64)>,
) -> ApiResult<Json<Value>> {
    let database = Database::open(&state.config.db_path)?;
    let deleted = database
        .delete_rule(&team_id, rule_id)?
        .ok_or_else(|| ApiError::NotFound("Rule not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Rule '{}' deleted", deleted.app_pattern)
    })))
}

async fn classify(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Json(payload): Json<ClassifyPayload>,
) -> ApiResult<Json<Classification>> {
    let database = Database::open(&state.config.db_path)?;
    require_team(&database, &team_id)?;
    let classifier = analyzer::load_classifier(&database, &team_id)?;

    Ok(Json(classifier.classify(
        &payload.app_name,
        payload.window_title.as_deref(),
    )))
}

async fn productivity(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Json(payload): Json<SamplesPayload>,
) -> ApiResult<Json<ProductivityReport>> {
    let database = Database::open(&state.config.db_path)?;
    require_team(&database, &team_id)?;

    Ok(Json(analyzer::team_productivity(
        &state.config,
        &database,
        &team_id,
        &payload.samples,
    )?))
}

async fn suggest_rules(
    State(state): State<ApiState>,
    Path(team_id): Path<String>,
    Json(payload): Json<SamplesPayload>,
) -> ApiResult<Json<SuggestionsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let team = require_team(&database, &team_id)?;
    let suggestions =
        analyzer::team_suggestions(&state.config, &database, &team_id, &payload.samples)?;

    Ok(Json(SuggestionsPayload {
        team_id: team.id,
        team_name: team.name,
        suggestions,
    }))
}

fn parse_new_rule(payload: &RuleCreatePayload) -> anyhow::Result<NewRule> {
    let category = payload
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()?
        .unwrap_or_default();
    let match_type = payload
        .match_type
        .as_deref()
        .map(str::parse::<MatchType>)
        .transpose()?
        .unwrap_or_default();

    NewRule::new(&payload.app_pattern, category, match_type)
}

fn require_team(database: &Database, team_id: &str) -> ApiResult<TeamRow> {
    database.team(team_id)?.ok_or_else(team_not_found)
}

fn team_not_found() -> ApiError {
    ApiError::NotFound("Team not found".to_string())
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{error:#}") })),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiState, router};
    use crate::config::Config;
    use crate::db::Database;
    use crate::seed::{self, SeedCatalog};
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;

    const YUTORI: &str = "3f6c2a1e-8b4d-4c7a-9e21-5d0b7f4a6c01";

    fn seeded_app() -> (Router, TempDir) {
        let dir = tempdir().expect("tempdir");
        let config = Config {
            db_path: dir.path().join("api.db"),
            ..Config::default()
        };

        let mut database = Database::open(&config.db_path).expect("open db");
        let catalog = SeedCatalog::builtin().expect("catalog");
        seed::run(&mut database, &catalog).expect("seed");

        let app = router(ApiState {
            config: Arc::new(config),
        });
        (app, dir)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(
                body.map(|value| Body::from(value.to_string()))
                    .unwrap_or_else(Body::empty),
            )
            .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, value)
    }

    #[tokio::test]
    async fn lists_seeded_teams_with_rule_counts() {
        let (app, _dir) = seeded_app();
        let (status, body) = send(&app, Method::GET, "/api/v1/teams", None).await;

        assert_eq!(status, StatusCode::OK);
        let teams = body.as_array().expect("array");
        assert_eq!(teams.len(), 3);
        assert!(
            teams
                .iter()
                .any(|team| team["name"] == "Smart Manufacturing" && team["rule_count"] == 20)
        );
    }

    #[tokio::test]
    async fn duplicate_rule_is_a_conflict() {
        let (app, _dir) = seeded_app();
        let uri = format!("/api/v1/teams/{YUTORI}/rules");

        let (status, _) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "app_pattern": "Slack", "category": "non_productive" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "app_pattern": "Figma", "category": "productive" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["match_type"], "contains");
        assert_eq!(body["category"], "productive");
    }

    #[tokio::test]
    async fn invalid_category_is_a_bad_request() {
        let (app, _dir) = seeded_app();
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/teams/{YUTORI}/rules"),
            Some(json!({ "app_pattern": "Figma", "category": "distraction" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("distraction"));
    }

    #[tokio::test]
    async fn unknown_team_is_not_found() {
        let (app, _dir) = seeded_app();
        let (status, _) = send(&app, Method::GET, "/api/v1/teams/nope/rules", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn classifies_against_team_rules() {
        let (app, _dir) = seeded_app();
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/teams/{YUTORI}/classify"),
            Some(json!({ "app_name": "Google Chrome", "window_title": "Reddit - front page" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "non_productive");
    }

    #[tokio::test]
    async fn deleting_team_removes_its_rules() {
        let (app, _dir) = seeded_app();

        let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/teams/{YUTORI}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, status_body) = send(&app, Method::GET, "/api/v1/status", None).await;
        assert_eq!(status_body["team_count"], 2);
        assert_eq!(status_body["rule_count"], 35);
    }

    #[tokio::test]
    async fn productivity_report_scores_samples() {
        let (app, _dir) = seeded_app();
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/v1/teams/{YUTORI}/productivity"),
            Some(json!({
                "samples": [
                    { "app_name": "Slack" },
                    { "app_name": "Slack" },
                    { "app_name": "Safari", "window_title": "Netflix" },
                    { "app_name": "Slack", "is_idle": true }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["productive_seconds"], 10);
        assert_eq!(body["non_productive_seconds"], 5);
        assert_eq!(body["productivity_score"], 67);
        assert_eq!(body["total_samples"], 3);
    }

    #[tokio::test]
    async fn team_names_are_validated_once_and_trimmed() {
        let (app, _dir) = seeded_app();

        let (status, body) =
            send(&app, Method::POST, "/api/v1/teams", Some(json!({ "name": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("empty"));

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/teams",
            Some(json!({ "name": "  Data Ops  " })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "Data Ops");

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/v1/teams/{YUTORI}"),
            Some(json!({ "name": "x".repeat(101) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
