use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PasswordResetCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PasswordResetCodes::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PasswordResetCodes::UserId).uuid().not_null())
                    .col(ColumnDef::new(PasswordResetCodes::Code).string().not_null())
                    .col(
                        ColumnDef::new(PasswordResetCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordResetCodes::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PasswordResetCodes::IsUsed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(PasswordResetCodes::UsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(PasswordResetCodes::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PasswordResetCodes::Table, PasswordResetCodes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup by (user, code) during validation.
        manager
            .create_index(
                Index::create()
                    .table(PasswordResetCodes::Table)
                    .col(PasswordResetCodes::UserId)
                    .col(PasswordResetCodes::Code)
                    .name("idx_password_reset_codes_user_id_code")
                    .to_owned(),
            )
            .await?;

        // Cleanup scans by expiry.
        manager
            .create_index(
                Index::create()
                    .table(PasswordResetCodes::Table)
                    .col(PasswordResetCodes::ExpiresAt)
                    .name("idx_password_reset_codes_expires_at")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PasswordResetCodes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PasswordResetCodes {
    Table,
    Id,
    UserId,
    Code,
    CreatedAt,
    ExpiresAt,
    IsUsed,
    UsedAt,
    Attempts,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
}
