use crate::AppState;
use crate::catalog;
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use shared::models::{
    ModelListing, OverviewMetadata, ProviderKind, ProviderOverview, ProviderSummary,
    TestProviderRequest, TestProviderResponse,
};

const API_VERSION: &str = "1.0.0";

pub async fn list_providers(State(state): State<AppState>) -> Json<ProviderOverview> {
    let status = state.chat.providers().status_all().await;
    let all = catalog::all_models().to_vec();
    let unfiltered = catalog::unfiltered_models();

    let available = status
        .iter()
        .filter(|(_, s)| s.available)
        .map(|(kind, _)| *kind)
        .collect();

    Json(ProviderOverview {
        success: true,
        providers: ProviderSummary {
            available,
            models_by_provider: catalog::models_by_provider(),
            total_models: all.len(),
            unfiltered_models: unfiltered.len(),
        },
        status,
        models: ModelListing { all, unfiltered },
        metadata: OverviewMetadata {
            timestamp: Utc::now(),
            version: API_VERSION.to_string(),
        },
    })
}

pub async fn test_provider(
    State(state): State<AppState>,
    Json(payload): Json<TestProviderRequest>,
) -> Result<Json<TestProviderResponse>, (StatusCode, String)> {
    let Some(name) = payload.provider.filter(|p| !p.is_empty()) else {
        return Err((StatusCode::BAD_REQUEST, "Provider is required".to_string()));
    };
    let provider: ProviderKind = name
        .parse()
        .map_err(|e: shared::models::UnknownProvider| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let status = state.chat.providers().status(provider).await;
    tracing::info!("Provider {} available: {}", provider, status.available);
    Ok(Json(TestProviderResponse {
        success: status.available,
        provider,
        status,
    }))
}
