use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use pantry_core::models::{
    Ingredient, Measurement, NewIngredient, NewRecipe, Recipe, RecipeLine, UpdateIngredient,
    UpdateRecipe, validate_amount, validate_name, validate_recipe_lines,
};
use pantry_core::planner::RequirementReport;
use pantry_core::service::PantryService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<PantryService>>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, PantryService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

fn default_category() -> String {
    "Other".to_string()
}

#[derive(Deserialize)]
struct CreateIngredientRequest {
    name: String,
    #[serde(default = "default_category")]
    category: String,
    measurement: Measurement,
    #[serde(default)]
    amount: f64,
}

#[derive(Deserialize)]
struct IngredientQuery {
    category: Option<String>,
}

#[derive(Deserialize)]
struct CreateRecipeRequest {
    name: String,
    #[serde(default)]
    comments: String,
    #[serde(default)]
    ingredients: Vec<RecipeLine>,
    vegie: Option<String>,
    tag: Option<String>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[allow(clippy::option_option)]
struct UpdateRecipeRequest {
    name: Option<String>,
    comments: Option<String>,
    ingredients: Option<Vec<RecipeLine>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    vegie: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    tag: Option<Option<String>>,
}

fn default_people() -> u32 {
    1
}

#[derive(Deserialize)]
struct PlanQuery {
    #[serde(default = "default_people")]
    people: u32,
}

#[derive(Deserialize)]
struct AddCategoryRequest {
    name: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(err.to_string())
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

/// Reject recipe lines with bad quantities or that point at no ingredient.
fn check_recipe_lines(svc: &PantryService, lines: &[RecipeLine]) -> Result<(), ApiError> {
    validate_recipe_lines(lines).map_err(|e| bad_request(&e))?;
    for line in lines {
        if svc.get_ingredient(line.ingredient_id)?.is_none() {
            return Err(ApiError::BadRequest(format!(
                "Ingredient with id {} not found",
                line.ingredient_id
            )));
        }
    }
    Ok(())
}

// --- Ingredient Handlers ---

async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    let svc = state.lock();
    let ingredients = svc
        .list_ingredients(query.category.as_deref())
        .context("failed to list ingredients")?;
    Ok(Json(ingredients))
}

async fn create_ingredient(
    State(state): State<AppState>,
    Json(req): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Ingredient>), ApiError> {
    validate_name("Ingredient", &req.name).map_err(|e| bad_request(&e))?;
    validate_amount(req.amount).map_err(|e| bad_request(&e))?;

    let svc = state.lock();
    let ingredient = svc
        .add_ingredient(&NewIngredient {
            name: req.name,
            category: req.category,
            measurement: req.measurement,
            amount: req.amount,
        })
        .context("failed to add ingredient")?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Ingredient>, ApiError> {
    let svc = state.lock();
    svc.get_ingredient(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Ingredient {id} not found")))
}

async fn update_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateIngredient>,
) -> Result<Json<Ingredient>, ApiError> {
    if let Some(name) = &req.name {
        validate_name("Ingredient", name).map_err(|e| bad_request(&e))?;
    }
    if let Some(amount) = req.amount {
        validate_amount(amount).map_err(|e| bad_request(&e))?;
    }

    let svc = state.lock();
    svc.update_ingredient(id, &req)
        .context("failed to update ingredient")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Ingredient {id} not found")))
}

async fn delete_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state.lock();
    if svc
        .delete_ingredient(id)
        .context("failed to delete ingredient")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Ingredient {id} not found")))
    }
}

// --- Recipe Handlers ---

async fn list_recipes(State(state): State<AppState>) -> Result<Json<Vec<Recipe>>, ApiError> {
    let svc = state.lock();
    let recipes = svc.list_recipes().context("failed to list recipes")?;
    Ok(Json(recipes))
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    validate_name("Recipe", &req.name).map_err(|e| bad_request(&e))?;

    let svc = state.lock();
    check_recipe_lines(&svc, &req.ingredients)?;

    let recipe = svc
        .add_recipe(&NewRecipe {
            name: req.name,
            comments: req.comments,
            ingredients: req.ingredients,
            vegie: req.vegie,
            tag: req.tag,
        })
        .context("failed to create recipe")?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>, ApiError> {
    let svc = state.lock();
    svc.get_recipe(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecipeRequest>,
) -> Result<Json<Recipe>, ApiError> {
    if let Some(name) = &req.name {
        validate_name("Recipe", name).map_err(|e| bad_request(&e))?;
    }

    let svc = state.lock();
    if let Some(lines) = &req.ingredients {
        check_recipe_lines(&svc, lines)?;
    }

    let update = UpdateRecipe {
        name: req.name,
        comments: req.comments,
        ingredients: req.ingredients,
        vegie: req.vegie,
        tag: req.tag,
    };
    svc.update_recipe(id, &update)
        .context("failed to update recipe")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state.lock();
    if svc.delete_recipe(id).context("failed to delete recipe")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Recipe {id} not found")))
    }
}

async fn plan_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<RequirementReport>, ApiError> {
    if query.people == 0 {
        return Err(ApiError::BadRequest(
            "people must be at least 1".to_string(),
        ));
    }

    let svc = state.lock();
    svc.compute_requirements(id, query.people)
        .context("failed to compute requirements")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

// --- Reference list Handlers ---

async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let svc = state.lock();
    Ok(Json(svc.categories()?))
}

async fn add_category(
    State(state): State<AppState>,
    Json(req): Json<AddCategoryRequest>,
) -> Result<(StatusCode, Json<Vec<String>>), ApiError> {
    validate_name("Category", &req.name).map_err(|e| bad_request(&e))?;

    let svc = state.lock();
    let added = svc
        .add_category(&req.name)
        .context("failed to add category")?;
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(svc.categories()?)))
}

async fn list_measurements(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let svc = state.lock();
    Ok(Json(svc.measurements()?))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/ingredients",
            get(list_ingredients).post(create_ingredient),
        )
        .route(
            "/api/ingredients/{id}",
            get(get_ingredient)
                .put(update_ingredient)
                .delete(delete_ingredient),
        )
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route("/api/recipes/{id}/plan", get(plan_recipe))
        .route("/api/categories", get(list_categories).post(add_category))
        .route("/api/measurements", get(list_measurements))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(svc: PantryService, port: u16, bind: &str) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
    };

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        warn!("Listening on {bind} with no authentication");
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(%bind, port, "server started");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app() -> Router {
        build_router(AppState {
            svc: Arc::new(Mutex::new(PantryService::new_in_memory())),
        })
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn add_rice(app: &Router) -> i64 {
        let (status, json) = send(
            app,
            "POST",
            "/api/ingredients",
            Some(serde_json::json!({
                "name": "Rice",
                "category": "Grains",
                "measurement": "kg",
                "amount": 2.0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn ingredient_crud_roundtrip() {
        let app = test_app();
        let id = add_rice(&app).await;

        let (status, json) = send(&app, "GET", &format!("/api/ingredients/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Rice");
        assert_eq!(json["measurement"], "kg");

        let (status, json) = send(
            &app,
            "PUT",
            &format!("/api/ingredients/{id}"),
            Some(serde_json::json!({ "amount": 0.5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["amount"], 0.5);
        assert_eq!(json["name"], "Rice");

        let (status, _) = send(&app, "DELETE", &format!("/api/ingredients/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, json) = send(&app, "GET", &format!("/api/ingredients/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], format!("Ingredient {id} not found"));
    }

    #[tokio::test]
    async fn list_ingredients_filters_by_category() {
        let app = test_app();
        add_rice(&app).await;
        send(
            &app,
            "POST",
            "/api/ingredients",
            Some(serde_json::json!({ "name": "Milk", "category": "Dairy", "measurement": "liter" })),
        )
        .await;

        let (status, json) = send(&app, "GET", "/api/ingredients?category=Dairy", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "Milk");
    }

    #[tokio::test]
    async fn create_ingredient_rejects_blank_name_and_negative_amount() {
        let app = test_app();

        let (status, _) = send(
            &app,
            "POST",
            "/api/ingredients",
            Some(serde_json::json!({ "name": "  ", "measurement": "kg" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/ingredients",
            Some(serde_json::json!({ "name": "Salt", "measurement": "kg", "amount": -1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_missing_ingredient_returns_404() {
        let app = test_app();
        let (status, _) = send(
            &app,
            "PUT",
            "/api/ingredients/42",
            Some(serde_json::json!({ "amount": 1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn recipe_with_unknown_ingredient_is_rejected() {
        let app = test_app();
        let (status, json) = send(
            &app,
            "POST",
            "/api/recipes",
            Some(serde_json::json!({
                "name": "Risotto",
                "ingredients": [{ "ingredient_id": 99, "quantity_grams": 100.0 }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Ingredient with id 99 not found");
    }

    #[tokio::test]
    async fn recipe_update_clears_tag_with_null() {
        let app = test_app();
        let (status, json) = send(
            &app,
            "POST",
            "/api/recipes",
            Some(serde_json::json!({ "name": "Salad", "tag": "summer", "vegie": "yes" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json["id"].as_i64().unwrap();

        let (status, json) = send(
            &app,
            "PUT",
            &format!("/api/recipes/{id}"),
            Some(serde_json::json!({ "tag": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("tag").is_none());
        assert_eq!(json["vegie"], "yes");
    }

    #[tokio::test]
    async fn plan_reports_shortfall() {
        let app = test_app();
        let rice = add_rice(&app).await;
        let (_, json) = send(
            &app,
            "POST",
            "/api/recipes",
            Some(serde_json::json!({
                "name": "Rice bowl",
                "ingredients": [{ "ingredient_id": rice, "quantity_grams": 500.0 }]
            })),
        )
        .await;
        let recipe = json["id"].as_i64().unwrap();

        let (status, json) = send(
            &app,
            "GET",
            &format!("/api/recipes/{recipe}/plan?people=5"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["recipe_name"], "Rice bowl");
        assert_eq!(json["num_people"], 5);
        let line = &json["lines"][0];
        assert_eq!(line["required_quantity"], 2500.0);
        assert_eq!(line["available_quantity"], 2000.0);
        assert_eq!(line["is_sufficient"], false);
        assert_eq!(line["shortfall"], 500.0);
    }

    #[tokio::test]
    async fn plan_rejects_zero_people_and_unknown_recipe() {
        let app = test_app();
        let (status, _) = send(&app, "GET", "/api/recipes/1/plan?people=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/recipes/1/plan?people=2", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reference_lists_return_defaults() {
        let app = test_app();

        let (status, json) = send(&app, "GET", "/api/measurements", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!(["kg", "liter", "pieces"]));

        let (status, json) = send(&app, "GET", "/api/categories", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.as_array().unwrap().contains(&serde_json::json!("Other")));
    }

    #[tokio::test]
    async fn add_category_is_idempotent() {
        let app = test_app();
        let body = serde_json::json!({ "name": "Spices" });

        let (status, json) = send(&app, "POST", "/api/categories", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(json.as_array().unwrap().contains(&serde_json::json!("Spices")));

        let (status, _) = send(&app, "POST", "/api/categories", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app();

        let response = app
            .oneshot(
                axum::http::Request::get("/api/ingredients")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app();

        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/ingredients")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret path /home/user/pantry.json"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }
}
