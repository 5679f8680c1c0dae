use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit::{self, Actor, AuditAction, AuditEvent, TargetType};
use crate::database::manager::DatabaseManager;
use crate::database::models::{Category, MenuItem};
use crate::storage;

use super::table_service::table_for_guest;
use super::validation::{optional_text, required_text, validate_price, MAX_NAME_LEN, MAX_NOTE_LEN};
use super::{ServiceError, ServiceResult};

const CATEGORY_COLUMNS: &str = "id, venue_id, name, sort_order, is_active, created_at";
const ITEM_COLUMNS: &str =
    "id, venue_id, category_id, name, description, price, is_available, image_path, sort_order, created_at";

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MenuItemInput {
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub is_available: Option<bool>,
    pub image_path: Option<String>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuItemPatch {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub is_available: Option<bool>,
    pub image_path: Option<String>,
    pub sort_order: Option<i32>,
}

/// Guest-facing menu section.
#[derive(Debug, Serialize)]
pub struct MenuSection {
    #[serde(flatten)]
    pub category: Category,
    pub items: Vec<MenuItem>,
}

/// Menu as seen from a table QR code.
#[derive(Debug, Serialize)]
pub struct TableMenu {
    pub venue_id: Uuid,
    pub venue_name: String,
    pub table_id: Uuid,
    pub table_label: String,
    pub sections: Vec<MenuSection>,
}

/// Group items under their categories, keeping category order and dropping
/// empty sections.
pub fn build_sections(categories: Vec<Category>, items: Vec<MenuItem>) -> Vec<MenuSection> {
    let mut sections: Vec<MenuSection> = categories
        .into_iter()
        .map(|category| MenuSection { category, items: Vec::new() })
        .collect();
    for item in items {
        if let Some(section) = sections.iter_mut().find(|s| s.category.id == item.category_id) {
            section.items.push(item);
        }
    }
    sections.retain(|s| !s.items.is_empty());
    sections
}

fn check_image_path(path: Option<&str>, venue_id: Uuid) -> ServiceResult<Option<String>> {
    match path.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => {
            storage::ensure_venue_path(p, venue_id)?;
            Ok(Some(p.to_string()))
        }
        None => Ok(None),
    }
}

pub struct MenuService {
    pool: PgPool,
}

impl MenuService {
    pub async fn new() -> ServiceResult<Self> {
        let pool = DatabaseManager::main_pool().await?;
        Ok(Self { pool })
    }

    pub async fn list_categories(&self, venue_id: Uuid) -> ServiceResult<Vec<Category>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE venue_id = $1 ORDER BY sort_order, name",
            CATEGORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, Category>(&sql).bind(venue_id).fetch_all(&self.pool).await?)
    }

    pub async fn get_category(&self, venue_id: Uuid, id: Uuid) -> ServiceResult<Category> {
        let sql = format!("SELECT {} FROM categories WHERE venue_id = $1 AND id = $2", CATEGORY_COLUMNS);
        sqlx::query_as::<_, Category>(&sql)
            .bind(venue_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound("Category"))
    }

    pub async fn create_category(&self, actor: &Actor, venue_id: Uuid, input: CategoryInput) -> ServiceResult<Category> {
        let name = required_text("Name", &input.name, MAX_NAME_LEN)?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO categories (id, venue_id, name, sort_order, is_active) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(Uuid::new_v4())
            .bind(venue_id)
            .bind(&name)
            .bind(input.sort_order.unwrap_or(0))
            .bind(input.is_active.unwrap_or(true))
            .fetch_one(&mut *tx)
            .await?;

        let event = AuditEvent::new(actor, AuditAction::CreateCategory, TargetType::Category)
            .target(category.id)
            .details(json!({ "name": category.name }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(category)
    }

    pub async fn update_category(
        &self,
        actor: &Actor,
        venue_id: Uuid,
        id: Uuid,
        patch: CategoryPatch,
    ) -> ServiceResult<Category> {
        let name = patch.name.as_deref().map(|n| required_text("Name", n, MAX_NAME_LEN)).transpose()?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            UPDATE categories
            SET name = COALESCE($3, name),
                sort_order = COALESCE($4, sort_order),
                is_active = COALESCE($5, is_active)
            WHERE venue_id = $1 AND id = $2
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(venue_id)
            .bind(id)
            .bind(&name)
            .bind(patch.sort_order)
            .bind(patch.is_active)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("Category"))?;

        let event = AuditEvent::new(actor, AuditAction::UpdateCategory, TargetType::Category)
            .target(id)
            .details(json!({ "name": name, "sort_order": patch.sort_order, "is_active": patch.is_active }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(category)
    }

    /// Deleting a category removes its items.
    pub async fn delete_category(&self, actor: &Actor, venue_id: Uuid, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        let deleted: Option<(String,)> =
            sqlx::query_as("DELETE FROM categories WHERE venue_id = $1 AND id = $2 RETURNING name")
                .bind(venue_id)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (name,) = deleted.ok_or(ServiceError::NotFound("Category"))?;

        let event = AuditEvent::new(actor, AuditAction::DeleteCategory, TargetType::Category)
            .target(id)
            .details(json!({ "name": name }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_items(&self, venue_id: Uuid, category_id: Option<Uuid>) -> ServiceResult<Vec<MenuItem>> {
        let sql = format!(
            r#"
            SELECT {} FROM menu_items
            WHERE venue_id = $1 AND ($2::uuid IS NULL OR category_id = $2)
            ORDER BY sort_order, name
            "#,
            ITEM_COLUMNS
        );
        Ok(sqlx::query_as::<_, MenuItem>(&sql)
            .bind(venue_id)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get_item(&self, venue_id: Uuid, id: Uuid) -> ServiceResult<MenuItem> {
        let sql = format!("SELECT {} FROM menu_items WHERE venue_id = $1 AND id = $2", ITEM_COLUMNS);
        sqlx::query_as::<_, MenuItem>(&sql)
            .bind(venue_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound("Menu item"))
    }

    pub async fn create_item(&self, actor: &Actor, venue_id: Uuid, input: MenuItemInput) -> ServiceResult<MenuItem> {
        let name = required_text("Name", &input.name, MAX_NAME_LEN)?;
        let description = optional_text("Description", input.description.as_deref(), MAX_NOTE_LEN)?.unwrap_or_default();
        let price = validate_price(input.price)?;
        let image_path = check_image_path(input.image_path.as_deref(), venue_id)?;
        // Category must belong to the same venue.
        self.get_category(venue_id, input.category_id).await?;

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            INSERT INTO menu_items
                (id, venue_id, category_id, name, description, price, is_available, image_path, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(Uuid::new_v4())
            .bind(venue_id)
            .bind(input.category_id)
            .bind(&name)
            .bind(&description)
            .bind(price)
            .bind(input.is_available.unwrap_or(true))
            .bind(&image_path)
            .bind(input.sort_order.unwrap_or(0))
            .fetch_one(&mut *tx)
            .await?;

        let event = AuditEvent::new(actor, AuditAction::CreateMenuItem, TargetType::MenuItem)
            .target(item.id)
            .details(json!({ "name": item.name, "price": item.price }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(item)
    }

    pub async fn update_item(&self, actor: &Actor, venue_id: Uuid, id: Uuid, patch: MenuItemPatch) -> ServiceResult<MenuItem> {
        let name = patch.name.as_deref().map(|n| required_text("Name", n, MAX_NAME_LEN)).transpose()?;
        let price = patch.price.map(validate_price).transpose()?;
        let image_path = check_image_path(patch.image_path.as_deref(), venue_id)?;
        if let Some(category_id) = patch.category_id {
            self.get_category(venue_id, category_id).await?;
        }

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            r#"
            UPDATE menu_items
            SET category_id = COALESCE($3, category_id),
                name = COALESCE($4, name),
                description = COALESCE($5, description),
                price = COALESCE($6, price),
                is_available = COALESCE($7, is_available),
                image_path = COALESCE($8, image_path),
                sort_order = COALESCE($9, sort_order)
            WHERE venue_id = $1 AND id = $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, MenuItem>(&sql)
            .bind(venue_id)
            .bind(id)
            .bind(patch.category_id)
            .bind(&name)
            .bind(patch.description.as_deref().map(str::trim))
            .bind(price)
            .bind(patch.is_available)
            .bind(&image_path)
            .bind(patch.sort_order)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("Menu item"))?;

        let event = AuditEvent::new(actor, AuditAction::UpdateMenuItem, TargetType::MenuItem)
            .target(id)
            .details(json!({ "name": name, "price": price, "is_available": patch.is_available }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(item)
    }

    pub async fn delete_item(&self, actor: &Actor, venue_id: Uuid, id: Uuid) -> ServiceResult<()> {
        let mut tx = self.pool.begin().await?;
        let deleted: Option<(String,)> =
            sqlx::query_as("DELETE FROM menu_items WHERE venue_id = $1 AND id = $2 RETURNING name")
                .bind(venue_id)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (name,) = deleted.ok_or(ServiceError::NotFound("Menu item"))?;

        let event = AuditEvent::new(actor, AuditAction::DeleteMenuItem, TargetType::MenuItem)
            .target(id)
            .details(json!({ "name": name }));
        audit::record(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Active categories with their available items.
    pub async fn guest_menu(&self, venue_id: Uuid) -> ServiceResult<Vec<MenuSection>> {
        let sql = format!(
            "SELECT {} FROM categories WHERE venue_id = $1 AND is_active ORDER BY sort_order, name",
            CATEGORY_COLUMNS
        );
        let categories = sqlx::query_as::<_, Category>(&sql).bind(venue_id).fetch_all(&self.pool).await?;

        let sql = format!(
            "SELECT {} FROM menu_items WHERE venue_id = $1 AND is_available ORDER BY sort_order, name",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, MenuItem>(&sql).bind(venue_id).fetch_all(&self.pool).await?;

        Ok(build_sections(categories, items))
    }

    pub async fn menu_for_table(&self, qr_token: &str) -> ServiceResult<TableMenu> {
        let (table, venue) = table_for_guest(&self.pool, qr_token).await?;
        let sections = self.guest_menu(venue.id).await?;
        Ok(TableMenu {
            venue_id: venue.id,
            venue_name: venue.name,
            table_id: table.id,
            table_label: table.label,
            sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(venue_id: Uuid, name: &str, sort_order: i32) -> Category {
        Category { id: Uuid::new_v4(), venue_id, name: name.into(), sort_order, is_active: true, created_at: Utc::now() }
    }

    fn item(category: &Category, name: &str) -> MenuItem {
        MenuItem {
            id: Uuid::new_v4(),
            venue_id: category.venue_id,
            category_id: category.id,
            name: name.into(),
            description: String::new(),
            price: Decimal::new(450, 2),
            is_available: true,
            image_path: None,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sections_group_items_and_skip_empty_categories() {
        let venue = Uuid::new_v4();
        let drinks = category(venue, "Drinks", 0);
        let mains = category(venue, "Mains", 1);
        let empty = category(venue, "Desserts", 2);
        let items = vec![item(&mains, "Steak"), item(&drinks, "Lemonade"), item(&drinks, "Cola")];

        let sections = build_sections(vec![drinks.clone(), mains, empty], items);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].category.id, drinks.id);
        assert_eq!(sections[0].items.len(), 2);
        assert_eq!(sections[1].items[0].name, "Steak");
    }

    #[test]
    fn image_paths_must_stay_in_venue() {
        let venue = Uuid::new_v4();
        let own = format!("venues/{}/menu/steak.jpg", venue);
        assert_eq!(check_image_path(Some(own.as_str()), venue).unwrap(), Some(own.clone()));
        assert_eq!(check_image_path(Some("  "), venue).unwrap(), None);
        let foreign = format!("venues/{}/menu/steak.jpg", Uuid::new_v4());
        assert!(matches!(
            check_image_path(Some(foreign.as_str()), venue),
            Err(ServiceError::Storage(storage::StorageError::ForeignPath))
        ));
    }
}
