use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Name shown on the profile page
    pub full_name: Option<String>,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: Uuid,
    pub placed_at: DateTime<Utc>,
    pub customer: User,
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
    pub unit_price: rust_decimal::Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub parent: Option<Box<Category>>,
    pub children: Vec<Category>,
}

pub struct Health;

pub fn handler() -> User {
    unimplemented!()
}
