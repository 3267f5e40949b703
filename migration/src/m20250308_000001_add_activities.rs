use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Activities {
    Table,
    Id,
    Title,
    ActivityType,
    Description,
    UserId,
    Metadata,
    Timestamp,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 后台动态日志 (只追加)
/// activity_type: USER | DRAW | TICKET | SYSTEM
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activities::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Activities::Title).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Activities::ActivityType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activities::Description)
                            .string_len(1024)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activities::UserId).big_integer().null())
                    .col(ColumnDef::new(Activities::Metadata).json().not_null())
                    .col(
                        ColumnDef::new(Activities::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activities_user")
                            .from(Activities::Table, Activities::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activities_timestamp")
                    .table(Activities::Table)
                    .col(Activities::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activities_type_timestamp")
                    .table(Activities::Table)
                    .col(Activities::ActivityType)
                    .col(Activities::Timestamp)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activities_user_timestamp")
                    .table(Activities::Table)
                    .col(Activities::UserId)
                    .col(Activities::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Activities::Table).to_owned())
            .await?;
        Ok(())
    }
}
