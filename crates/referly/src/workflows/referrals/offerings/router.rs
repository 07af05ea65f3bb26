use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::catalog::{CatalogError, OfferingCatalog, OfferingStore};
use super::domain::{NewOffering, OfferingFilter, OfferingUpdate};
use crate::workflows::referrals::domain::OfferingId;

/// Router builder exposing mentor catalog management and student browsing.
pub fn offering_router<S>(catalog: Arc<OfferingCatalog<S>>) -> Router
where
    S: OfferingStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/offerings",
            get(list_handler::<S>).post(create_handler::<S>),
        )
        .route(
            "/api/v1/offerings/:offering_id",
            get(get_handler::<S>)
                .put(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .route(
            "/api/v1/offerings/:offering_id/active",
            patch(set_active_handler::<S>),
        )
        .with_state(catalog)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateOfferingBody {
    mentor_id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    companies: BTreeSet<String>,
    #[serde(default)]
    positions: BTreeSet<String>,
    initiation_fee_minor: u64,
    final_fee_minor: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateOfferingBody {
    title: Option<String>,
    description: Option<String>,
    companies: Option<BTreeSet<String>>,
    positions: Option<BTreeSet<String>>,
    initiation_fee_minor: Option<u64>,
    final_fee_minor: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetActiveBody {
    active: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListOfferingsQuery {
    mentor_id: Option<String>,
    company: Option<String>,
    #[serde(default)]
    active_only: bool,
}

pub(crate) async fn create_handler<S>(
    State(catalog): State<Arc<OfferingCatalog<S>>>,
    axum::Json(body): axum::Json<CreateOfferingBody>,
) -> Response
where
    S: OfferingStore + 'static,
{
    if body.title.trim().is_empty() {
        let payload = json!({ "error": "offering title must not be empty" });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }

    let result = catalog.create(NewOffering {
        mentor_id: body.mentor_id,
        title: body.title,
        description: body.description,
        companies: body.companies,
        positions: body.positions,
        initiation_fee_minor: body.initiation_fee_minor,
        final_fee_minor: body.final_fee_minor,
    });

    match result {
        Ok(offering) => (StatusCode::CREATED, axum::Json(offering)).into_response(),
        Err(error) => catalog_error_response(&error),
    }
}

pub(crate) async fn get_handler<S>(
    State(catalog): State<Arc<OfferingCatalog<S>>>,
    Path(offering_id): Path<String>,
) -> Response
where
    S: OfferingStore + 'static,
{
    match catalog.get(&OfferingId(offering_id)) {
        Ok(offering) => (StatusCode::OK, axum::Json(offering)).into_response(),
        Err(error) => catalog_error_response(&error),
    }
}

pub(crate) async fn update_handler<S>(
    State(catalog): State<Arc<OfferingCatalog<S>>>,
    Path(offering_id): Path<String>,
    axum::Json(body): axum::Json<UpdateOfferingBody>,
) -> Response
where
    S: OfferingStore + 'static,
{
    let update = OfferingUpdate {
        title: body.title,
        description: body.description,
        companies: body.companies,
        positions: body.positions,
        initiation_fee_minor: body.initiation_fee_minor,
        final_fee_minor: body.final_fee_minor,
    };

    match catalog.update(&OfferingId(offering_id), update) {
        Ok(offering) => (StatusCode::OK, axum::Json(offering)).into_response(),
        Err(error) => catalog_error_response(&error),
    }
}

pub(crate) async fn set_active_handler<S>(
    State(catalog): State<Arc<OfferingCatalog<S>>>,
    Path(offering_id): Path<String>,
    axum::Json(body): axum::Json<SetActiveBody>,
) -> Response
where
    S: OfferingStore + 'static,
{
    match catalog.set_active(&OfferingId(offering_id), body.active) {
        Ok(()) => {
            let payload = json!({ "active": body.active });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => catalog_error_response(&error),
    }
}

pub(crate) async fn delete_handler<S>(
    State(catalog): State<Arc<OfferingCatalog<S>>>,
    Path(offering_id): Path<String>,
) -> Response
where
    S: OfferingStore + 'static,
{
    match catalog.delete(&OfferingId(offering_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => catalog_error_response(&error),
    }
}

pub(crate) async fn list_handler<S>(
    State(catalog): State<Arc<OfferingCatalog<S>>>,
    Query(query): Query<ListOfferingsQuery>,
) -> Response
where
    S: OfferingStore + 'static,
{
    let filter = OfferingFilter {
        mentor_id: query.mentor_id,
        company: query.company,
        active_only: query.active_only,
    };

    match catalog.list(&filter) {
        Ok(offerings) => (StatusCode::OK, axum::Json(offerings)).into_response(),
        Err(error) => catalog_error_response(&error),
    }
}

fn catalog_error_response(error: &CatalogError) -> Response {
    let status = match error {
        CatalogError::NotFound => StatusCode::NOT_FOUND,
        CatalogError::Conflict => StatusCode::CONFLICT,
        CatalogError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
