use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub sn: String,
    pub buyer_id: i64,
    pub payment_id: i64,
    pub payment_sn: String,
    pub original_total_price: i64,
    pub real_total_price: i64,
    pub status: i32,
    pub ctime: i64,
    pub utime: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
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
