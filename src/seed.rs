use sea_orm::*;

use crate::auth::hash_password;
use crate::models::{author, book, book_authors, book_copy, category, user};
use crate::services::membership_service;

// ON CONFLICT DO NOTHING surfaces as RecordNotInserted; re-seeding is fine
fn ignore_conflict<T>(res: Result<T, DbErr>) -> Result<(), DbErr> {
    match res {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Seed demo data for local development. Safe to run repeatedly.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    // 1. Users
    let admin_password = hash_password("admin123!").unwrap();
    let member_password = hash_password("member123!").unwrap();

    let admin = user::ActiveModel {
        username: Set("admin".to_owned()),
        password_hash: Set(admin_password),
        email: Set("admin@libris.local".to_owned()),
        full_name: Set("Administrator".to_owned()),
        role: Set("admin".to_owned()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    let member = user::ActiveModel {
        username: Set("reader".to_owned()),
        password_hash: Set(member_password),
        email: Set("reader@libris.local".to_owned()),
        full_name: Set("Demo Reader".to_owned()),
        role: Set("member".to_owned()),
        is_active: Set(true),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };

    ignore_conflict(
        user::Entity::insert(admin)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await,
    )?;

    ignore_conflict(
        user::Entity::insert(member)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await,
    )?;

    // 2. Category
    let fiction = category::ActiveModel {
        name: Set("Fiction".to_owned()),
        description: Set(Some("Novels and short stories".to_owned())),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    };
    ignore_conflict(
        category::Entity::insert(fiction)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(category::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await,
    )?;

    // 3. Authors and books with one copy each
    let titles = [
        ("9780261103573", "The Fellowship of the Ring", "J.R.R.", "Tolkien"),
        ("9780553293357", "Foundation", "Isaac", "Asimov"),
        ("9780441172719", "Dune", "Frank", "Herbert"),
    ];

    for (isbn, title, first_name, last_name) in titles {
        let existing = book::Entity::find()
            .filter(book::Column::Isbn.eq(isbn))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        let saved_author = author::ActiveModel {
            first_name: Set(first_name.to_owned()),
            last_name: Set(last_name.to_owned()),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let saved_book = book::ActiveModel {
            isbn: Set(isbn.to_owned()),
            title: Set(title.to_owned()),
            category_id: Set(Some(1)),
            copies_total: Set(1),
            copies_available: Set(1),
            is_active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        book_authors::ActiveModel {
            book_id: Set(saved_book.id),
            author_id: Set(saved_author.id),
        }
        .insert(db)
        .await?;

        book_copy::ActiveModel {
            book_id: Set(saved_book.id),
            barcode: Set(uuid::Uuid::new_v4().to_string()),
            condition: Set("good".to_owned()),
            is_available: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    // 4. Give the demo reader a Basic membership
    if let Some(reader) = user::Entity::find()
        .filter(user::Column::Username.eq("reader"))
        .one(db)
        .await?
    {
        let has_membership = membership_service::active_membership(db, reader.id)
            .await
            .map_err(|e| DbErr::Custom(e.to_string()))?
            .is_some();
        if !has_membership {
            membership_service::assign_membership(db, reader.id, 1, Some(365))
                .await
                .map_err(|e| DbErr::Custom(e.to_string()))?;
        }
    }

    Ok(())
}
