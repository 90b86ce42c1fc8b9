use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240901_000001_create_users_and_sessions::Migration),
            Box::new(m20240901_000002_create_teams::Migration),
            Box::new(m20240901_000003_create_vendors_and_parts::Migration),
            Box::new(m20240901_000004_create_bom_items::Migration),
            Box::new(m20240901_000005_create_orders::Migration),
            Box::new(m20240901_000006_create_conversations::Migration),
        ]
    }
}

mod m20240901_000001_create_users_and_sessions {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000001_create_users_and_sessions"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                        .col(
                            ColumnDef::new(Users::DiscordUserId)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Sessions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sessions::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sessions::UserId).uuid().not_null())
                        .col(
                            ColumnDef::new(Sessions::TokenHash)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Sessions::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Sessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sessions_user_id")
                                .from(Sessions::Table, Sessions::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sessions_user_id")
                        .table(Sessions::Table)
                        .col(Sessions::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sessions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Email,
        Name,
        PasswordHash,
        DiscordUserId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Sessions {
        Table,
        Id,
        UserId,
        TokenHash,
        ExpiresAt,
        CreatedAt,
    }
}

mod m20240901_000002_create_teams {
    use super::m20240901_000001_create_users_and_sessions::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000002_create_teams"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Teams::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Teams::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Teams::Program).string_len(8).not_null())
                        .col(ColumnDef::new(Teams::Number).integer().not_null())
                        .col(ColumnDef::new(Teams::Name).string().not_null())
                        .col(ColumnDef::new(Teams::Season).string_len(9).not_null())
                        .col(
                            ColumnDef::new(Teams::DiscordGuildId)
                                .string()
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Teams::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Teams::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("idx_teams_program_number")
                        .table(Teams::Table)
                        .col(Teams::Program)
                        .col(Teams::Number)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TeamMembers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TeamMembers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TeamMembers::TeamId).uuid().not_null())
                        .col(ColumnDef::new(TeamMembers::UserId).uuid().not_null())
                        .col(ColumnDef::new(TeamMembers::Role).string_len(16).not_null())
                        .col(
                            ColumnDef::new(TeamMembers::JoinedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_team_members_team_id")
                                .from(TeamMembers::Table, TeamMembers::TeamId)
                                .to(Teams::Table, Teams::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_team_members_user_id")
                                .from(TeamMembers::Table, TeamMembers::UserId)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("idx_team_members_team_user")
                        .table(TeamMembers::Table)
                        .col(TeamMembers::TeamId)
                        .col(TeamMembers::UserId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_team_members_user_id")
                        .table(TeamMembers::Table)
                        .col(TeamMembers::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TeamMembers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Teams::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Teams {
        Table,
        Id,
        Program,
        Number,
        Name,
        Season,
        DiscordGuildId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum TeamMembers {
        Table,
        Id,
        TeamId,
        UserId,
        Role,
        JoinedAt,
    }
}

mod m20240901_000003_create_vendors_and_parts {
    use super::m20240901_000002_create_teams::Teams;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000003_create_vendors_and_parts"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Vendors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vendors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Vendors::TeamId).uuid().null())
                        .col(ColumnDef::new(Vendors::Name).string().not_null())
                        .col(ColumnDef::new(Vendors::Website).string().null())
                        .col(ColumnDef::new(Vendors::ContactEmail).string().null())
                        .col(ColumnDef::new(Vendors::LeadTimeDays).integer().null())
                        .col(ColumnDef::new(Vendors::Notes).text().null())
                        .col(
                            ColumnDef::new(Vendors::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vendors::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_vendors_team_id")
                                .from(Vendors::Table, Vendors::TeamId)
                                .to(Teams::Table, Teams::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vendors_team_id")
                        .table(Vendors::Table)
                        .col(Vendors::TeamId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Parts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Parts::TeamId).uuid().not_null())
                        .col(ColumnDef::new(Parts::Name).string().not_null())
                        .col(ColumnDef::new(Parts::PartNumber).string().null())
                        .col(ColumnDef::new(Parts::Category).string().null())
                        .col(ColumnDef::new(Parts::Description).text().null())
                        .col(ColumnDef::new(Parts::Location).string().null())
                        .col(
                            ColumnDef::new(Parts::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Parts::ReorderPoint)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Parts::VendorId).uuid().null())
                        .col(ColumnDef::new(Parts::UnitPrice).decimal_len(12, 2).null())
                        .col(
                            ColumnDef::new(Parts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Parts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_parts_team_id")
                                .from(Parts::Table, Parts::TeamId)
                                .to(Teams::Table, Teams::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_parts_vendor_id")
                                .from(Parts::Table, Parts::VendorId)
                                .to(Vendors::Table, Vendors::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_parts_team_id")
                        .table(Parts::Table)
                        .col(Parts::TeamId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Parts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Vendors::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Vendors {
        Table,
        Id,
        TeamId,
        Name,
        Website,
        ContactEmail,
        LeadTimeDays,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Parts {
        Table,
        Id,
        TeamId,
        Name,
        PartNumber,
        Category,
        Description,
        Location,
        Quantity,
        ReorderPoint,
        VendorId,
        UnitPrice,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240901_000004_create_bom_items {
    use super::m20240901_000002_create_teams::Teams;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000004_create_bom_items"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // No foreign key on part_id: a removed part reads as zero on hand
            manager
                .create_table(
                    Table::create()
                        .table(BomItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BomItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(BomItems::TeamId).uuid().not_null())
                        .col(ColumnDef::new(BomItems::PartId).uuid().not_null())
                        .col(ColumnDef::new(BomItems::Subsystem).string().not_null())
                        .col(
                            ColumnDef::new(BomItems::QuantityNeeded)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(BomItems::Notes).text().null())
                        .col(
                            ColumnDef::new(BomItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BomItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_bom_items_team_id")
                                .from(BomItems::Table, BomItems::TeamId)
                                .to(Teams::Table, Teams::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_bom_items_team_subsystem")
                        .table(BomItems::Table)
                        .col(BomItems::TeamId)
                        .col(BomItems::Subsystem)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BomItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BomItems {
        Table,
        Id,
        TeamId,
        PartId,
        Subsystem,
        QuantityNeeded,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240901_000005_create_orders {
    use super::m20240901_000002_create_teams::Teams;
    use super::m20240901_000003_create_vendors_and_parts::Vendors;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000005_create_orders"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::TeamId).uuid().not_null())
                        .col(ColumnDef::new(Orders::VendorId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().null())
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_team_id")
                                .from(Orders::Table, Orders::TeamId)
                                .to(Teams::Table, Teams::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_vendor_id")
                                .from(Orders::Table, Orders::VendorId)
                                .to(Vendors::Table, Vendors::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_team_status")
                        .table(Orders::Table)
                        .col(Orders::TeamId)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::PartId).uuid().null())
                        .col(ColumnDef::new(OrderItems::Description).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        TeamId,
        VendorId,
        Status,
        OrderNumber,
        Notes,
        TotalAmount,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        PartId,
        Description,
        Quantity,
        UnitPrice,
        CreatedAt,
    }
}

mod m20240901_000006_create_conversations {
    use super::m20240901_000002_create_teams::Teams;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000006_create_conversations"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Conversations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Conversations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Conversations::TeamId).uuid().not_null())
                        .col(ColumnDef::new(Conversations::ChannelId).string().not_null())
                        .col(ColumnDef::new(Conversations::Persona).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Conversations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Conversations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_conversations_team_id")
                                .from(Conversations::Table, Conversations::TeamId)
                                .to(Teams::Table, Teams::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("idx_conversations_team_channel")
                        .table(Conversations::Table)
                        .col(Conversations::TeamId)
                        .col(Conversations::ChannelId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_conversations_updated_at")
                        .table(Conversations::Table)
                        .col(Conversations::UpdatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ConversationMessages::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConversationMessages::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversationMessages::ConversationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversationMessages::Sequence)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConversationMessages::Role)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ConversationMessages::Author).string().null())
                        .col(ColumnDef::new(ConversationMessages::Content).text().not_null())
                        .col(
                            ColumnDef::new(ConversationMessages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_conversation_messages_conversation_id")
                                .from(
                                    ConversationMessages::Table,
                                    ConversationMessages::ConversationId,
                                )
                                .to(Conversations::Table, Conversations::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("idx_conversation_messages_conversation_sequence")
                        .table(ConversationMessages::Table)
                        .col(ConversationMessages::ConversationId)
                        .col(ConversationMessages::Sequence)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConversationMessages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Conversations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Conversations {
        Table,
        Id,
        TeamId,
        ChannelId,
        Persona,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ConversationMessages {
        Table,
        Id,
        ConversationId,
        Sequence,
        Role,
        Author,
        Content,
        CreatedAt,
    }
}

/// Connects with migration-friendly pool settings and applies every pending migration.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}

/// Rolls back the most recent `steps` migrations.
pub async fn rollback_migration(db_url: &str, steps: u32) -> Result<()> {
    let db = Database::connect(ConnectOptions::new(db_url)).await?;
    info!(steps, "Rolling back database migrations");
    Migrator::down(&db, Some(steps)).await?;
    Ok(())
}
