use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use serde_json::json;

use crate::auth::Claims;
use crate::models::book;

/// Catalog export as CSV (staff).
pub async fn export_books_csv(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    claims.require_staff()?;

    let books = book::Entity::find()
        .order_by_asc(book::Column::Title)
        .all(&db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "isbn",
            "title",
            "publisher",
            "publication_year",
            "copies_total",
            "copies_available",
        ])
        .map_err(csv_error)?;

    for b in &books {
        let year = b.publication_year.map(|y| y.to_string()).unwrap_or_default();
        let total = b.copies_total.to_string();
        let available = b.copies_available.to_string();
        writer
            .write_record([
                b.isbn.as_str(),
                b.title.as_str(),
                b.publisher.as_deref().unwrap_or(""),
                year.as_str(),
                total.as_str(),
                available.as_str(),
            ])
            .map_err(csv_error)?;
    }

    let data = writer
        .into_inner()
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    let filename = format!("libris_catalog_{}.csv", chrono::Utc::now().format("%Y-%m-%d"));

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "text/csv".parse().unwrap());
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", filename)
            .parse()
            .unwrap(),
    );

    Ok((StatusCode::OK, headers, data))
}

fn csv_error(e: csv::Error) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}
