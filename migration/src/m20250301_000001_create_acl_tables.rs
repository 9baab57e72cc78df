use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PolicyRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PolicyRules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PolicyRules::Subject).string().not_null())
                    .col(ColumnDef::new(PolicyRules::Object).string().not_null())
                    .col(ColumnDef::new(PolicyRules::Action).string().not_null())
                    // Absent qualifiers are stored as "" so the unique index below holds
                    .col(
                        ColumnDef::new(PolicyRules::Attribute)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(PolicyRules::Effect).string().not_null())
                    .col(
                        ColumnDef::new(PolicyRules::Entity)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(PolicyRules::CreatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_policy_rule")
                    .table(PolicyRules::Table)
                    .col(PolicyRules::Subject)
                    .col(PolicyRules::Object)
                    .col(PolicyRules::Action)
                    .col(PolicyRules::Attribute)
                    .col(PolicyRules::Entity)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupingEdges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupingEdges::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupingEdges::Child).string().not_null())
                    .col(ColumnDef::new(GroupingEdges::Parent).string().not_null())
                    .col(
                        ColumnDef::new(GroupingEdges::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_grouping_edge")
                    .table(GroupingEdges::Table)
                    .col(GroupingEdges::Child)
                    .col(GroupingEdges::Parent)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupingEdges::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PolicyRules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PolicyRules {
    Table,
    Id,
    Subject,
    Object,
    Action,
    Attribute,
    Effect,
    Entity,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GroupingEdges {
    Table,
    Id,
    Child,
    Parent,
    CreatedAt,
}
