use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::core::entities::ServiceDescriptor;
use crate::routing::AppState;

#[derive(Serialize)]
pub struct RootStatus {
    pub status: &'static str,
    pub message: &'static str,
    pub available_services: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct ServiceList {
    pub services: Vec<ServiceDescriptor>,
}

pub async fn root(State(app): State<AppState>) -> Json<RootStatus> {
    Json(RootStatus {
        status: "online",
        message: "AI Image Generation API",
        available_services: app.registry().service_ids(),
    })
}

pub async fn list(State(app): State<AppState>) -> Json<ServiceList> {
    Json(ServiceList {
        services: app.registry().descriptors(),
    })
}
