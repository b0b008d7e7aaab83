use sea_orm::entity::prelude::*;

/// Account record as seen by the password-reset flow.
/// Only the columns needed to address a user by email are mapped here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::password_reset_codes::Entity")]
    PasswordResetCodes,
}

impl Related<super::password_reset_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PasswordResetCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
