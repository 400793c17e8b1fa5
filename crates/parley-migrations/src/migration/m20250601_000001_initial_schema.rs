use sea_orm_migration::prelude::*;

/// Initial schema: tenants, brands, agents and their brand assignments,
/// visitors, visitor messages, settings stores, and the hand-off audit
/// trail. Kept portable across Postgres and SQLite (tests run on the
/// latter).
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("tenants"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("is_active"))
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("brands"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("tenant_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("widget_key"))
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("is_active"))
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_brands_tenant")
                            .from(Alias::new("brands"), Alias::new("tenant_id"))
                            .to(Alias::new("tenants"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("agents"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("tenant_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("email")).string().not_null())
                    .col(ColumnDef::new(Alias::new("avatar_url")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("account_status"))
                            .text()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("presence"))
                            .text()
                            .not_null()
                            .default("offline"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("last_login_at"))
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agents_tenant")
                            .from(Alias::new("agents"), Alias::new("tenant_id"))
                            .to(Alias::new("tenants"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("agent_brands"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("agent_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("brand_id")).integer().not_null())
                    .col(
                        ColumnDef::new(Alias::new("is_active"))
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agent_brands_agent")
                            .from(Alias::new("agent_brands"), Alias::new("agent_id"))
                            .to(Alias::new("agents"), Alias::new("id")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_agent_brands_brand")
                            .from(Alias::new("agent_brands"), Alias::new("brand_id"))
                            .to(Alias::new("brands"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_agent_brands_brand_active")
                    .table(Alias::new("agent_brands"))
                    .col(Alias::new("brand_id"))
                    .col(Alias::new("is_active"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("visitors"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("visitor_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("session_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("tenant_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("brand_id")).integer().null())
                    .col(
                        ColumnDef::new(Alias::new("assigned_agent_id"))
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("name")).string().not_null())
                    .col(ColumnDef::new(Alias::new("email")).string().null())
                    .col(ColumnDef::new(Alias::new("phone")).string().null())
                    .col(ColumnDef::new(Alias::new("current_page")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("referrer"))
                            .string()
                            .not_null()
                            .default("Direct"),
                    )
                    .col(ColumnDef::new(Alias::new("user_agent")).string().null())
                    .col(ColumnDef::new(Alias::new("country")).string().null())
                    .col(ColumnDef::new(Alias::new("city")).string().null())
                    .col(
                        ColumnDef::new(Alias::new("status"))
                            .text()
                            .not_null()
                            .default("idle"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("is_typing"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Alias::new("widget_state"))
                            .text()
                            .not_null()
                            .default("minimized"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("messages_count"))
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Alias::new("visits_count"))
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Alias::new("is_active"))
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Alias::new("session_duration"))
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Alias::new("satisfaction_rating"))
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("satisfaction_comment"))
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(Alias::new("custom_data")).json_binary().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("last_activity"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_visitors_tenant")
                            .from(Alias::new("visitors"), Alias::new("tenant_id"))
                            .to(Alias::new("tenants"), Alias::new("id")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_visitors_agent")
                            .from(Alias::new("visitors"), Alias::new("assigned_agent_id"))
                            .to(Alias::new("agents"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_visitors_tenant_visitor")
                    .table(Alias::new("visitors"))
                    .col(Alias::new("tenant_id"))
                    .col(Alias::new("visitor_id"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_visitors_tenant_active")
                    .table(Alias::new("visitors"))
                    .col(Alias::new("tenant_id"))
                    .col(Alias::new("is_active"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("visitor_messages"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("visitor_row_id"))
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("tenant_id")).integer().not_null())
                    .col(ColumnDef::new(Alias::new("sender_role")).text().not_null())
                    .col(ColumnDef::new(Alias::new("sender_id")).integer().null())
                    .col(ColumnDef::new(Alias::new("sender_name")).string().null())
                    .col(ColumnDef::new(Alias::new("body")).text().not_null())
                    .col(
                        ColumnDef::new(Alias::new("kind"))
                            .text()
                            .not_null()
                            .default("text"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("is_read"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Alias::new("metadata")).json_binary().null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_visitor_messages_visitor")
                            .from(Alias::new("visitor_messages"), Alias::new("visitor_row_id"))
                            .to(Alias::new("visitors"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_visitor_messages_visitor_created")
                    .table(Alias::new("visitor_messages"))
                    .col(Alias::new("visitor_row_id"))
                    .col(Alias::new("created_at"))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("widget_settings"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("tenant_id"))
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("ai_enabled"))
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Alias::new("welcome_message"))
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_widget_settings_tenant")
                            .from(Alias::new("widget_settings"), Alias::new("tenant_id"))
                            .to(Alias::new("tenants"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("system_settings"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("key"))
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Alias::new("value")).text().not_null())
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Alias::new("handoff_events"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("tenant_id")).integer().not_null())
                    .col(
                        ColumnDef::new(Alias::new("visitor_row_id"))
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("brand_id")).integer().null())
                    .col(ColumnDef::new(Alias::new("from_agent_id")).integer().null())
                    .col(
                        ColumnDef::new(Alias::new("to_agent_id"))
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("trigger")).text().not_null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_handoff_events_visitor")
                            .from(Alias::new("handoff_events"), Alias::new("visitor_row_id"))
                            .to(Alias::new("visitors"), Alias::new("id")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_handoff_events_agent")
                            .from(Alias::new("handoff_events"), Alias::new("to_agent_id"))
                            .to(Alias::new("agents"), Alias::new("id")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_handoff_events_tenant_created")
                    .table(Alias::new("handoff_events"))
                    .col(Alias::new("tenant_id"))
                    .col(Alias::new("created_at"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            "handoff_events",
            "system_settings",
            "widget_settings",
            "visitor_messages",
            "visitors",
            "agent_brands",
            "agents",
            "brands",
            "tenants",
        ] {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        Ok(())
    }
}
