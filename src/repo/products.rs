//! Catalog entity persistence. The full update and its section-count shifts
//! share one transaction, which is what keeps the section counters honest
//! under concurrent consumers.

use anyhow::Result;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::mapping::balance::BalanceByCity;
use crate::mapping::bundle::BundleComponent;
use crate::mapping::prices::{PriceRow, ResolvedDiscount};
use crate::model::product::{Product, SectionShift};
use crate::model::transfer::UnitEntry;

#[async_trait::async_trait]
pub trait ProductRepo: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Product>>;
    /// Resolves external ids to internal ids in one round trip; ids with no
    /// catalog entity are simply absent from the result.
    async fn resolve_external_ids(&self, external_ids: &[String]) -> Result<Vec<(String, Uuid)>>;
    async fn insert(&self, product: &Product) -> Result<()>;
    async fn save(&self, product: &Product, shifts: &[SectionShift]) -> Result<()>;
}

const PRODUCT_COLUMNS: &str = "id, external_id, name, sortable_name, product_code, active, \
     status, section_id, section_name, brand_id, description, vendor_code, tnved, tru, \
     badges, barcodes, characteristics, on_order, date_receipt, days_order, purchase_limit, \
     related, additional, points_multiplier, points_multipliers, additional_points, \
     is_dimensional, search_synonyms, prices, discounts, units, balance, set_components, \
     filters, unifying, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    external_id: String,
    name: String,
    sortable_name: String,
    product_code: String,
    active: bool,
    status: i16,
    section_id: Option<Uuid>,
    section_name: Option<String>,
    brand_id: Option<Uuid>,
    description: Option<String>,
    vendor_code: Option<String>,
    tnved: Option<String>,
    tru: Option<String>,
    badges: Json<Vec<String>>,
    barcodes: Json<Vec<String>>,
    characteristics: Json<IndexMap<String, String>>,
    on_order: bool,
    date_receipt: Option<String>,
    days_order: String,
    purchase_limit: i64,
    related: Json<Vec<String>>,
    additional: Json<Vec<String>>,
    points_multiplier: f64,
    points_multipliers: Json<IndexMap<String, f64>>,
    additional_points: f64,
    is_dimensional: bool,
    search_synonyms: String,
    prices: Json<Vec<PriceRow>>,
    discounts: Json<Vec<ResolvedDiscount>>,
    units: Json<Vec<UnitEntry>>,
    balance: Json<BalanceByCity>,
    set_components: Json<Vec<BundleComponent>>,
    filters: Json<Vec<String>>,
    unifying: Json<Vec<String>>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            sortable_name: row.sortable_name,
            product_code: row.product_code,
            active: row.active,
            status: row.status,
            section_id: row.section_id,
            section_name: row.section_name,
            brand_id: row.brand_id,
            description: row.description,
            vendor_code: row.vendor_code,
            tnved: row.tnved,
            tru: row.tru,
            badges: row.badges.0,
            barcodes: row.barcodes.0,
            characteristics: row.characteristics.0,
            on_order: row.on_order,
            date_receipt: row.date_receipt,
            days_order: row.days_order,
            purchase_limit: row.purchase_limit,
            related: row.related.0,
            additional: row.additional.0,
            points_multiplier: row.points_multiplier,
            points_multipliers: row.points_multipliers.0,
            additional_points: row.additional_points,
            is_dimensional: row.is_dimensional,
            search_synonyms: row.search_synonyms,
            prices: row.prices.0,
            discounts: row.discounts.0,
            units: row.units.0,
            balance: row.balance.0,
            set: row.set_components.0,
            filters: row.filters.0,
            unifying: row.unifying.0,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgProductRepo {
    pool: PgPool,
}

impl PgProductRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProductRepo for PgProductRepo {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE external_id = $1"
        ))
        .bind(external_id)
        .persistent(false)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Product::from))
    }

    async fn resolve_external_ids(&self, external_ids: &[String]) -> Result<Vec<(String, Uuid)>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, (String, Uuid)>(
            "SELECT external_id, id FROM products WHERE external_id = ANY($1)",
        )
        .bind(external_ids)
        .persistent(false)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert(&self, product: &Product) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
              $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, \
              $33, $34, $35, $36)"
        ))
        .bind(product.id)
        .bind(&product.external_id)
        .bind(&product.name)
        .bind(&product.sortable_name)
        .bind(&product.product_code)
        .bind(product.active)
        .bind(product.status)
        .bind(product.section_id)
        .bind(&product.section_name)
        .bind(product.brand_id)
        .bind(&product.description)
        .bind(&product.vendor_code)
        .bind(&product.tnved)
        .bind(&product.tru)
        .bind(Json(&product.badges))
        .bind(Json(&product.barcodes))
        .bind(Json(&product.characteristics))
        .bind(product.on_order)
        .bind(&product.date_receipt)
        .bind(&product.days_order)
        .bind(product.purchase_limit)
        .bind(Json(&product.related))
        .bind(Json(&product.additional))
        .bind(product.points_multiplier)
        .bind(Json(&product.points_multipliers))
        .bind(product.additional_points)
        .bind(product.is_dimensional)
        .bind(&product.search_synonyms)
        .bind(Json(&product.prices))
        .bind(Json(&product.discounts))
        .bind(Json(&product.units))
        .bind(Json(&product.balance))
        .bind(Json(&product.set))
        .bind(Json(&product.filters))
        .bind(Json(&product.unifying))
        .bind(product.updated_at)
        .persistent(false)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, product: &Product, shifts: &[SectionShift]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE products SET \
                 external_id = $2, name = $3, sortable_name = $4, product_code = $5, \
                 active = $6, status = $7, section_id = $8, section_name = $9, \
                 brand_id = $10, description = $11, vendor_code = $12, tnved = $13, \
                 tru = $14, badges = $15, barcodes = $16, characteristics = $17, \
                 on_order = $18, date_receipt = $19, days_order = $20, \
                 purchase_limit = $21, related = $22, additional = $23, \
                 points_multiplier = $24, points_multipliers = $25, \
                 additional_points = $26, is_dimensional = $27, search_synonyms = $28, \
                 prices = $29, discounts = $30, units = $31, balance = $32, \
                 set_components = $33, filters = $34, unifying = $35, updated_at = $36 \
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.external_id)
        .bind(&product.name)
        .bind(&product.sortable_name)
        .bind(&product.product_code)
        .bind(product.active)
        .bind(product.status)
        .bind(product.section_id)
        .bind(&product.section_name)
        .bind(product.brand_id)
        .bind(&product.description)
        .bind(&product.vendor_code)
        .bind(&product.tnved)
        .bind(&product.tru)
        .bind(Json(&product.badges))
        .bind(Json(&product.barcodes))
        .bind(Json(&product.characteristics))
        .bind(product.on_order)
        .bind(&product.date_receipt)
        .bind(&product.days_order)
        .bind(product.purchase_limit)
        .bind(Json(&product.related))
        .bind(Json(&product.additional))
        .bind(product.points_multiplier)
        .bind(Json(&product.points_multipliers))
        .bind(product.additional_points)
        .bind(product.is_dimensional)
        .bind(&product.search_synonyms)
        .bind(Json(&product.prices))
        .bind(Json(&product.discounts))
        .bind(Json(&product.units))
        .bind(Json(&product.balance))
        .bind(Json(&product.set))
        .bind(Json(&product.filters))
        .bind(Json(&product.unifying))
        .bind(product.updated_at)
        .persistent(false)
        .execute(&mut *tx)
        .await?;

        for shift in shifts {
            sqlx::query("UPDATE sections SET item_count = item_count + $1 WHERE id = $2")
                .bind(shift.delta)
                .bind(shift.section_id)
                .persistent(false)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
