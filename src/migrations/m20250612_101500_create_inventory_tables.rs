use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Project::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Project::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Project::Title).string().not_null())
                    .col(ColumnDef::new(Project::Summary).string())
                    .col(ColumnDef::new(Project::Description).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OpenapiSpec::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OpenapiSpec::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OpenapiSpec::Title).string())
                    .col(ColumnDef::new(OpenapiSpec::Version).string())
                    .col(ColumnDef::new(OpenapiSpec::BaseUrl).string().not_null())
                    .col(ColumnDef::new(OpenapiSpec::ProjectId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .from(OpenapiSpec::Table, OpenapiSpec::ProjectId)
                            .to(Project::Table, Project::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_openapi_spec_project_base_url")
                    .table(OpenapiSpec::Table)
                    .col(OpenapiSpec::ProjectId)
                    .col(OpenapiSpec::BaseUrl)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OpenapiSpecVersion::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OpenapiSpecVersion::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OpenapiSpecVersion::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OpenapiSpecVersion::CommitHash).string())
                    .col(
                        ColumnDef::new(OpenapiSpecVersion::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OpenapiSpecVersion::OpenapiSpecId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(OpenapiSpecVersion::Table, OpenapiSpecVersion::OpenapiSpecId)
                            .to(OpenapiSpec::Table, OpenapiSpec::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Endpoint::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Endpoint::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Endpoint::Path).string().not_null())
                    .col(ColumnDef::new(Endpoint::Method).string().not_null())
                    .col(ColumnDef::new(Endpoint::Summary).text())
                    .col(ColumnDef::new(Endpoint::Description).text())
                    .col(ColumnDef::new(Endpoint::TagName).string())
                    .col(ColumnDef::new(Endpoint::TagDescription).string())
                    .col(
                        ColumnDef::new(Endpoint::OpenapiSpecVersionId)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Endpoint::Table, Endpoint::OpenapiSpecVersionId)
                            .to(OpenapiSpecVersion::Table, OpenapiSpecVersion::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Parameter::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Parameter::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Parameter::EndpointId).integer().not_null())
                    .col(ColumnDef::new(Parameter::ParamType).string().not_null())
                    .col(ColumnDef::new(Parameter::Name).string().not_null())
                    .col(
                        ColumnDef::new(Parameter::Required)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Parameter::ValueType).string())
                    .col(ColumnDef::new(Parameter::Title).string())
                    .col(ColumnDef::new(Parameter::Description).text())
                    .col(ColumnDef::new(Parameter::Value).json())
                    .foreign_key(
                        ForeignKey::create()
                            .from(Parameter::Table, Parameter::EndpointId)
                            .to(Endpoint::Table, Endpoint::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServerInfra::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServerInfra::Id)
                            .integer()
                            .auto_increment()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ServerInfra::OpenapiSpecId).integer())
                    .col(ColumnDef::new(ServerInfra::ResourceType).string().not_null())
                    .col(ColumnDef::new(ServerInfra::Environment).string().not_null())
                    .col(ColumnDef::new(ServerInfra::ServiceType).string().not_null())
                    .col(ColumnDef::new(ServerInfra::Name).string().not_null())
                    .col(ColumnDef::new(ServerInfra::GroupName).string().not_null())
                    .col(ColumnDef::new(ServerInfra::Labels).json())
                    .col(ColumnDef::new(ServerInfra::Namespace).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(ServerInfra::Table, ServerInfra::OpenapiSpecId)
                            .to(OpenapiSpec::Table, OpenapiSpec::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_server_infra_namespace_name")
                    .table(ServerInfra::Table)
                    .col(ServerInfra::Namespace)
                    .col(ServerInfra::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServerInfra::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Parameter::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Endpoint::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OpenapiSpecVersion::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OpenapiSpec::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Project::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Project {
    Table,
    Id,
    Title,
    Summary,
    Description,
}

#[derive(DeriveIden)]
pub enum OpenapiSpec {
    Table,
    Id,
    Title,
    Version,
    BaseUrl,
    ProjectId,
}

#[derive(DeriveIden)]
pub enum OpenapiSpecVersion {
    Table,
    Id,
    CreatedAt,
    CommitHash,
    IsActive,
    OpenapiSpecId,
}

#[derive(DeriveIden)]
pub enum Endpoint {
    Table,
    Id,
    Path,
    Method,
    Summary,
    Description,
    TagName,
    TagDescription,
    OpenapiSpecVersionId,
}

#[derive(DeriveIden)]
pub enum Parameter {
    Table,
    Id,
    EndpointId,
    ParamType,
    Name,
    Required,
    ValueType,
    Title,
    Description,
    Value,
}

#[derive(DeriveIden)]
pub enum ServerInfra {
    Table,
    Id,
    OpenapiSpecId,
    ResourceType,
    Environment,
    ServiceType,
    Name,
    GroupName,
    Labels,
    Namespace,
}
