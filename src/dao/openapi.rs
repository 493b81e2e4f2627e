use crate::entities::{endpoint, openapi_spec, openapi_spec_version, parameter, server_infra};
use crate::openapi::parser::ParsedOpenApi;
use anyhow::{self, Context};
use chrono::Utc;
use sea_orm::*;
use std::collections::HashSet;

/// Persists a parsed document as an `openapi_spec` plus one active version.
///
/// Re-registering a `base_url` already known to the project does not create a
/// second spec row: all existing versions are flipped inactive and the new
/// version becomes the single active one.
pub async fn save_spec<C: ConnectionTrait>(
    project_id: Option<i32>,
    parsed: &ParsedOpenApi,
    db: &C,
) -> anyhow::Result<openapi_spec::Model> {
    let mut query = openapi_spec::Entity::find()
        .filter(openapi_spec::Column::BaseUrl.eq(parsed.base_url.clone()));
    query = match project_id {
        Some(id) => query.filter(openapi_spec::Column::ProjectId.eq(id)),
        None => query.filter(openapi_spec::Column::ProjectId.is_null()),
    };
    let existing = query
        .one(db)
        .await
        .context("Error looking up existing openapi spec")?;

    let spec = match existing {
        Some(spec) => {
            openapi_spec_version::Entity::update_many()
                .col_expr(
                    openapi_spec_version::Column::IsActive,
                    sea_orm::sea_query::Expr::value(false),
                )
                .filter(openapi_spec_version::Column::OpenapiSpecId.eq(spec.id))
                .exec(db)
                .await
                .context("Error deactivating previous spec versions")?;
            spec
        }
        None => openapi_spec::ActiveModel {
            id: ActiveValue::NotSet,
            title: ActiveValue::Set(Some(parsed.title.clone())),
            version: ActiveValue::Set(Some(parsed.version.clone())),
            base_url: ActiveValue::Set(parsed.base_url.clone()),
            project_id: ActiveValue::Set(project_id),
        }
        .insert(db)
        .await
        .context("Error inserting openapi spec")?,
    };

    let version = openapi_spec_version::ActiveModel {
        id: ActiveValue::NotSet,
        created_at: ActiveValue::Set(Utc::now()),
        commit_hash: ActiveValue::Set(None),
        is_active: ActiveValue::Set(true),
        openapi_spec_id: ActiveValue::Set(spec.id),
    }
    .insert(db)
    .await
    .context("Error inserting openapi spec version")?;

    for parsed_endpoint in &parsed.endpoints {
        let endpoint = endpoint::ActiveModel {
            id: ActiveValue::NotSet,
            path: ActiveValue::Set(parsed_endpoint.path.clone()),
            method: ActiveValue::Set(parsed_endpoint.method.clone()),
            summary: ActiveValue::Set(parsed_endpoint.summary.clone()),
            description: ActiveValue::Set(parsed_endpoint.description.clone()),
            tag_name: ActiveValue::Set(parsed_endpoint.tag_name.clone()),
            tag_description: ActiveValue::Set(parsed_endpoint.tag_description.clone()),
            openapi_spec_version_id: ActiveValue::Set(version.id),
        }
        .insert(db)
        .await
        .context("Error inserting endpoint")?;

        let parameters: Vec<parameter::ActiveModel> = parsed_endpoint
            .parameters
            .iter()
            .map(|p| parameter::ActiveModel {
                id: ActiveValue::NotSet,
                endpoint_id: ActiveValue::Set(endpoint.id),
                param_type: ActiveValue::Set(p.param_type.clone()),
                name: ActiveValue::Set(p.name.clone()),
                required: ActiveValue::Set(p.required),
                value_type: ActiveValue::Set(p.value_type.clone()),
                title: ActiveValue::Set(p.title.clone()),
                description: ActiveValue::Set(p.description.clone()),
                value: ActiveValue::Set(p.value.clone()),
            })
            .collect();
        if !parameters.is_empty() {
            parameter::Entity::insert_many(parameters)
                .exec(db)
                .await
                .context("Error inserting endpoint parameters")?;
        }
    }

    Ok(spec)
}

/// The spec an endpoint belongs to, through its version.
pub async fn spec_id_for_endpoint(
    endpoint_id: i32,
    db: &DatabaseConnection,
) -> anyhow::Result<Option<i32>> {
    let Some(endpoint) = endpoint::Entity::find_by_id(endpoint_id)
        .one(db)
        .await
        .context(format!("Error fetching endpoint {endpoint_id}"))?
    else {
        return Ok(None);
    };
    let version = openapi_spec_version::Entity::find_by_id(endpoint.openapi_spec_version_id)
        .one(db)
        .await
        .context("Error fetching spec version")?;
    Ok(version.map(|v| v.openapi_spec_id))
}

/// All server-infra rows bound to a test through its scenarios' endpoints.
pub async fn server_infras_for_test(
    test_history_id: i32,
    db: &DatabaseConnection,
) -> anyhow::Result<Vec<server_infra::Model>> {
    let scenarios = crate::dao::test_history::fetch_scenarios(test_history_id, db).await?;

    let mut spec_ids = HashSet::new();
    for scenario in &scenarios {
        if let Some(spec_id) = spec_id_for_endpoint(scenario.endpoint_id, db).await? {
            spec_ids.insert(spec_id);
        }
    }

    let mut infras = Vec::new();
    let mut seen = HashSet::new();
    for spec_id in spec_ids {
        for infra in crate::dao::server_infra::fetch_by_spec_id(spec_id, db).await? {
            if seen.insert(infra.id) {
                infras.push(infra);
            }
        }
    }
    Ok(infras)
}
