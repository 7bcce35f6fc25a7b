use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Claims;
use crate::models::book::{self, Book, Entity as BookEntity};
use crate::models::book_tags;
use crate::models::tag::Entity as Tag;
use crate::services::audit;

#[derive(Deserialize)]
pub struct ListBooksQuery {
    pub search: Option<String>,
    pub category_id: Option<i32>,
    pub tag_id: Option<i32>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

pub async fn list_books(
    State(db): State<DatabaseConnection>,
    Query(query): Query<ListBooksQuery>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut condition = Condition::all().add(book::Column::IsActive.eq(true));

    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(book::Column::Title.like(&pattern))
                .add(book::Column::Isbn.like(&pattern)),
        );
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(book::Column::CategoryId.eq(category_id));
    }

    let mut find = BookEntity::find().filter(condition);

    if let Some(tag_id) = query.tag_id {
        find = find
            .join(JoinType::InnerJoin, book_tags::Relation::Book.def().rev())
            .filter(book_tags::Column::TagId.eq(tag_id));
    }

    let per_page = query.per_page.unwrap_or(50).clamp(1, 200);
    let page = query.page.unwrap_or(1).max(1);

    let paginator = find
        .order_by_asc(book::Column::Title)
        .paginate(&db, per_page);
    let total = paginator
        .num_items()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let books = paginator
        .fetch_page(page - 1)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let book_dtos: Vec<Book> = books.into_iter().map(Book::from).collect();

    Ok(Json(json!({
        "books": book_dtos,
        "total": total,
        "page": page,
        "per_page": per_page
    })))
}

pub async fn create_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<Book>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    if payload.isbn.is_empty() || payload.title.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "isbn and title are required" })),
        ));
    }

    let now = chrono::Utc::now().to_rfc3339();
    let new_book = book::ActiveModel {
        isbn: Set(payload.isbn),
        title: Set(payload.title),
        description: Set(payload.description),
        publisher: Set(payload.publisher),
        publication_year: Set(payload.publication_year),
        category_id: Set(payload.category_id),
        price: Set(payload.price),
        copies_total: Set(0),
        copies_available: Set(0),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_book.insert(&db).await {
        Ok(model) => {
            let _ =
                audit::log_action(&db, Some(claims.uid), "create", "book", Some(model.id), None)
                    .await;
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "message": "Book created successfully",
                    "book": Book::from(model)
                })),
            ))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub async fn get_book(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let found = BookEntity::find_by_id(id).one(&db).await.unwrap_or(None);
    match found {
        Some(model) => {
            // Include tag names in the detail view
            let tags = model
                .find_related(Tag)
                .all(&db)
                .await
                .unwrap_or_default();
            let mut body = serde_json::to_value(Book::from(model)).unwrap_or_default();
            if let Some(obj) = body.as_object_mut() {
                obj.insert(
                    "tags".to_string(),
                    json!(tags.iter().map(|t| t.name.clone()).collect::<Vec<_>>()),
                );
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Book not found" })),
        )
            .into_response(),
    }
}

pub async fn update_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<Book>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let found = BookEntity::find_by_id(id)
        .one(&db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Book not found" })),
        ))?;

    let mut active: book::ActiveModel = found.into();
    active.isbn = Set(payload.isbn);
    active.title = Set(payload.title);
    active.description = Set(payload.description);
    active.publisher = Set(payload.publisher);
    active.publication_year = Set(payload.publication_year);
    active.category_id = Set(payload.category_id);
    active.price = Set(payload.price);
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    let updated = active.update(&db).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
    })?;

    let _ = audit::log_action(&db, Some(claims.uid), "update", "book", Some(id), None).await;

    Ok(Json(json!({ "book": Book::from(updated) })))
}

pub async fn delete_book(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    match BookEntity::delete_by_id(id).exec(&db).await {
        Ok(res) if res.rows_affected > 0 => {
            let _ = audit::log_action(&db, Some(claims.uid), "delete", "book", Some(id), None)
                .await;
            Ok(Json(json!({ "message": "Book deleted successfully" })))
        }
        Ok(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Book not found" })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

#[derive(Deserialize)]
pub struct AttachTagRequest {
    tag_id: i32,
}

pub async fn attach_tag(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<AttachTagRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    let link = book_tags::ActiveModel {
        book_id: Set(id),
        tag_id: Set(payload.tag_id),
    };

    match book_tags::Entity::insert(link)
        .on_conflict(
            sea_orm::sea_query::OnConflict::columns([
                book_tags::Column::BookId,
                book_tags::Column::TagId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec(&db)
        .await
    {
        // Attaching an already-attached tag is a no-op
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(Json(json!({ "message": "Tag attached" }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub async fn detach_tag(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path((id, tag_id)): Path<(i32, i32)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    claims.require_staff()?;

    book_tags::Entity::delete_many()
        .filter(book_tags::Column::BookId.eq(id))
        .filter(book_tags::Column::TagId.eq(tag_id))
        .exec(&db)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(Json(json!({ "message": "Tag detached" })))
}
