use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Line item snapshot. Every `sku_*` column is copied from the catalog at
/// purchase time and never rewritten.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub spu_id: i64,
    pub sku_id: i64,
    pub sku_name: String,
    #[sea_orm(column_type = "Text")]
    pub sku_description: String,
    pub sku_original_price: i64,
    pub sku_real_price: i64,
    pub quantity: i64,
    pub ctime: i64,
    pub utime: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = super::now_millis();

        if insert && matches!(active_model.ctime, ActiveValue::NotSet) {
            active_model.ctime = Set(now);
        }
        if matches!(active_model.utime, ActiveValue::NotSet) {
            active_model.utime = Set(now);
        }

        Ok(active_model)
    }
}
