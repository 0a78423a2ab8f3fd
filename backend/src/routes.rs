use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::StatusCode;
use actix_web::{web, Error, HttpRequest, HttpResponse, ResponseError};
use log::{error, info, warn};
use shared::{ErrorResponse, ProductionRequest, YieldRequest};

use crate::service::{PredictionError, PredictionService};

pub const LIVENESS_MESSAGE: &str = "Backend is working!";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(web::resource("/predict").route(web::post().to(predict_yield)))
        .service(web::resource("/predictprice").route(web::post().to(predict_production)))
        .service(web::resource("/models").route(web::get().to(list_models)))
        .service(web::resource("/test").route(web::get().to(liveness)));
}

impl ResponseError for PredictionError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictionError::Validation(_) => StatusCode::BAD_REQUEST,
            PredictionError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            PredictionError::Model(_) | PredictionError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> Error {
    warn!("Rejected malformed JSON body on {}: {}", req.path(), err);
    let response = HttpResponse::BadRequest().json(ErrorResponse {
        error: format!("Invalid JSON body: {}", err),
    });
    InternalError::from_response(err, response).into()
}

/// Runs a prediction on the blocking pool, bounded by the service timeout.
/// A timed-out job is not cancelled and keeps its pool thread until it returns.
async fn run_prediction<T, F>(
    service: web::Data<PredictionService>,
    predict: F,
) -> Result<T, PredictionError>
where
    F: FnOnce(&PredictionService) -> Result<T, PredictionError> + Send + 'static,
    T: Send + 'static,
{
    let timeout = service.timeout();
    let task = web::block(move || predict(service.get_ref()));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(PredictionError::Blocking(e.to_string())),
        Err(_) => Err(PredictionError::Timeout(timeout)),
    }
}

fn log_failure(route: &str, e: &PredictionError) {
    match e {
        PredictionError::Validation(_) => warn!("{} rejected request: {}", route, e),
        _ => error!("{} failed: {}", route, e),
    }
}

async fn predict_yield(
    service: web::Data<PredictionService>,
    body: web::Json<YieldRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    match run_prediction(service, move |svc| svc.predict_yield(&request)).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log_failure("/predict", &e);
            e.error_response()
        }
    }
}

async fn predict_production(
    service: web::Data<PredictionService>,
    body: web::Json<ProductionRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    match run_prediction(service, move |svc| svc.predict_production_by_year(&request)).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log_failure("/predictprice", &e);
            e.error_response()
        }
    }
}

async fn list_models(service: web::Data<PredictionService>) -> HttpResponse {
    info!("Listing loaded models");
    HttpResponse::Ok().json(service.models())
}

async fn liveness() -> HttpResponse {
    HttpResponse::Ok().body(LIVENESS_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeatureRow, ModelError, PipelineModel, TrainedModel};
    use crate::service::tests::{FixedModel, RejectingModel};
    use crate::service::PredictionPolicy;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use shared::{ModelSummary, ModelsResponse, ProductionResponse, YieldResponse};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    struct SlowModel;

    impl TrainedModel for SlowModel {
        fn predict(&self, _row: &FeatureRow) -> Result<f64, ModelError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(1.0)
        }

        fn summary(&self) -> ModelSummary {
            ModelSummary {
                name: "slow".into(),
                kind: "constant".into(),
                features: vec![],
                sha256: String::new(),
                loaded_at: String::new(),
            }
        }
    }

    fn demo_service() -> PredictionService {
        let models = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../models");
        let yield_model = PipelineModel::load(&models.join("yield_model.json")).unwrap();
        let production_model =
            PipelineModel::load(&models.join("production_model.json")).unwrap();
        PredictionService::new(
            Arc::new(yield_model),
            Arc::new(production_model),
            PredictionPolicy::default(),
        )
    }

    macro_rules! app {
        ($service:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($service))
                    .configure(configure_routes),
            )
            .await
        };
    }

    fn has_two_decimals(value: f64) -> bool {
        ((value * 100.0).round() - value * 100.0).abs() < 1e-6
    }

    #[actix_web::test]
    async fn predict_returns_rounded_non_negative_yield_and_total() {
        let app = app!(demo_service());
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({
                "area": 2.0,
                "crop": "Rice",
                "state": "Punjab",
                "district": "Ludhiana",
                "season": "Kharif"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: YieldResponse = test::read_body_json(resp).await;
        assert!(body.predicted_production >= 0.0);
        assert!(body.total_production >= 0.0);
        assert!(has_two_decimals(body.predicted_production));
        assert!(has_two_decimals(body.total_production));
        assert_eq!(body.predicted_production, 37.33);
        assert_eq!(body.total_production, 74.66);
    }

    #[actix_web::test]
    async fn predict_accepts_area_as_string() {
        let app = app!(demo_service());
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({
                "area": "2",
                "crop": "Rice",
                "state": "Punjab",
                "district": "Ludhiana",
                "season": "Kharif"
            }))
            .to_request();
        let body: YieldResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.total_production, 74.66);
    }

    #[actix_web::test]
    async fn predict_without_area_is_a_client_error() {
        let app = app!(demo_service());
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({
                "crop": "Rice",
                "state": "Punjab",
                "district": "Ludhiana",
                "season": "Kharif"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.error.contains("area"));
    }

    #[actix_web::test]
    async fn predict_with_non_positive_area_never_reaches_the_model() {
        let model = FixedModel::new(3.0);
        let app = app!(PredictionService::new(
            model.clone(),
            FixedModel::new(0.0),
            PredictionPolicy::default()
        ));
        for area in [json!(0), json!(-2.5), json!("lots")] {
            let req = test::TestRequest::post()
                .uri("/predict")
                .set_json(json!({
                    "area": area,
                    "crop": "Rice",
                    "state": "Punjab",
                    "district": "Ludhiana",
                    "season": "Kharif"
                }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(model.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn malformed_json_gets_an_error_body() {
        let app = app!(demo_service());
        let req = test::TestRequest::post()
            .uri("/predict")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{\"area\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn predictprice_uses_dataset_column_keys() {
        let app = app!(demo_service());
        let req = test::TestRequest::post()
            .uri("/predictprice")
            .set_json(json!({
                "Crop_Year": 2010,
                "Crop": "Rice",
                "Season": "Kharif",
                "Area": 100,
                "State_Name": "Punjab",
                "District_Name": "Ludhiana"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: ProductionResponse = test::read_body_json(resp).await;
        assert_eq!(body.predicted_production, 1095.0);
    }

    #[actix_web::test]
    async fn predictprice_clamps_negative_output() {
        let app = app!(demo_service());
        let req = test::TestRequest::post()
            .uri("/predictprice")
            .set_json(json!({
                "Crop_Year": 1,
                "Crop": "Cotton",
                "Season": "Autumn",
                "Area": 1,
                "State_Name": "Punjab",
                "District_Name": "Ludhiana"
            }))
            .to_request();
        let body: ProductionResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.predicted_production, 0.0);
    }

    #[actix_web::test]
    async fn model_failures_become_server_errors_with_a_message() {
        let app = app!(PredictionService::new(
            Arc::new(RejectingModel),
            Arc::new(RejectingModel),
            PredictionPolicy::default()
        ));
        let req = test::TestRequest::post()
            .uri("/predictprice")
            .set_json(json!({
                "Crop_Year": 2010,
                "Crop": "Quinoa",
                "Season": "Kharif",
                "Area": 10,
                "State_Name": "Punjab",
                "District_Name": "Ludhiana"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.error.contains("Quinoa"));
    }

    /// Production pipeline whose crop encoder refuses unseen categories.
    fn strict_production_model() -> PipelineModel {
        let export = json!({
            "name": "strict-production",
            "features": [
                {"name": "Crop", "kind": "categorical"},
                {"name": "Area", "kind": "numeric"}
            ],
            "transforms": [
                {"type": "one_hot", "column": "Crop", "categories": ["Rice", "Wheat"], "handle_unknown": "error"},
                {"type": "passthrough", "column": "Area"}
            ],
            "regressor": {
                "type": "linear",
                "n_features": 3,
                "model": {
                    "coefficients": {"ncols": 1, "nrows": 3, "values": [100.0, 200.0, 1.0], "column_major": true},
                    "intercept": 0.0,
                    "_phantom_ty": null,
                    "_phantom_y": null
                }
            }
        });
        PipelineModel::from_slice(&serde_json::to_vec(&export).unwrap()).unwrap()
    }

    fn production_body(crop: &str) -> Value {
        json!({
            "Crop_Year": 2010,
            "Crop": crop,
            "Season": "Kharif",
            "Area": 10,
            "State_Name": "Punjab",
            "District_Name": "Ludhiana"
        })
    }

    #[actix_web::test]
    async fn strict_encoder_turns_unseen_crop_into_server_error() {
        let app = app!(PredictionService::new(
            FixedModel::new(1.0),
            Arc::new(strict_production_model()),
            PredictionPolicy::default()
        ));

        let req = test::TestRequest::post()
            .uri("/predictprice")
            .set_json(production_body("Rice"))
            .to_request();
        let body: ProductionResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.predicted_production, 110.0);

        let req = test::TestRequest::post()
            .uri("/predictprice")
            .set_json(production_body("Quinoa"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("Quinoa"));
        assert!(error.contains("Crop"));
    }

    #[actix_web::test]
    async fn repeated_requests_against_loaded_pipelines_agree() {
        let app = app!(demo_service());
        let yield_body = json!({
            "area": 3.5,
            "crop": "Wheat",
            "state": "Haryana",
            "district": "Karnal",
            "season": "Rabi"
        });

        let mut yields = Vec::new();
        let mut productions = Vec::new();
        for _ in 0..3 {
            let req = test::TestRequest::post()
                .uri("/predict")
                .set_json(yield_body.clone())
                .to_request();
            let body: YieldResponse = test::call_and_read_body_json(&app, req).await;
            yields.push(body);

            let req = test::TestRequest::post()
                .uri("/predictprice")
                .set_json(production_body("Wheat"))
                .to_request();
            let body: ProductionResponse = test::call_and_read_body_json(&app, req).await;
            productions.push(body);
        }
        assert!(yields.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(productions.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[actix_web::test]
    async fn overflowing_totals_are_errors_not_nulls() {
        let app = app!(PredictionService::new(
            FixedModel::new(3.7),
            FixedModel::new(1.0),
            PredictionPolicy::default()
        ));
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({
                "area": 1e308,
                "crop": "Rice",
                "state": "Punjab",
                "district": "Ludhiana",
                "season": "Kharif"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
        assert!(body.get("total_production").is_none());
    }

    #[actix_web::test]
    async fn slow_models_time_out() {
        let app = app!(PredictionService::new(
            Arc::new(SlowModel),
            Arc::new(SlowModel),
            PredictionPolicy {
                timeout: Duration::from_millis(20),
                ..PredictionPolicy::default()
            }
        ));
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(json!({
                "area": 1.0,
                "crop": "Rice",
                "state": "Punjab",
                "district": "Ludhiana",
                "season": "Kharif"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[actix_web::test]
    async fn liveness_probe_returns_fixed_text() {
        let app = app!(demo_service());
        let req = test::TestRequest::get().uri("/test").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, LIVENESS_MESSAGE.as_bytes());
    }

    #[actix_web::test]
    async fn models_endpoint_describes_both_artifacts() {
        let app = app!(demo_service());
        let req = test::TestRequest::get().uri("/models").to_request();
        let body: ModelsResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.yield_model.kind, "random_forest");
        assert_eq!(body.production.kind, "linear");
        assert_eq!(body.production.features[0], "Crop_Year");
        assert_ne!(body.yield_model.sha256, body.production.sha256);
    }
}
