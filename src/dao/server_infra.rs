use crate::entities::server_infra;
use anyhow::{self, Context};
use sea_orm::*;
use std::collections::{HashMap, HashSet};

/// `group_name -> openapi_spec_id` for every known service group.
pub async fn group_spec_ids<C: ConnectionTrait>(
    db: &C,
) -> anyhow::Result<HashMap<String, Option<i32>>> {
    let rows = server_infra::Entity::find()
        .all(db)
        .await
        .context("Error fetching server infra rows")?;

    let mut map = HashMap::new();
    for row in rows {
        // Any member with a spec id wins for the group.
        let entry = map.entry(row.group_name).or_insert(None);
        if entry.is_none() {
            *entry = row.openapi_spec_id;
        }
    }
    Ok(map)
}

pub async fn pod_names_by_group<C: ConnectionTrait>(
    group_name: &str,
    namespace: &str,
    db: &C,
) -> anyhow::Result<HashSet<String>> {
    let rows = server_infra::Entity::find()
        .filter(server_infra::Column::GroupName.eq(group_name))
        .filter(server_infra::Column::Namespace.eq(namespace))
        .all(db)
        .await
        .context(format!("Error fetching pods for group {group_name}"))?;
    Ok(rows.into_iter().map(|row| row.name).collect())
}

pub async fn fetch_by_spec_id(
    spec_id: i32,
    db: &DatabaseConnection,
) -> anyhow::Result<Vec<server_infra::Model>> {
    server_infra::Entity::find()
        .filter(server_infra::Column::OpenapiSpecId.eq(spec_id))
        .all(db)
        .await
        .context(format!("Error fetching server infra for spec {spec_id}"))
}

pub async fn insert_many<C: ConnectionTrait>(
    rows: Vec<server_infra::ActiveModel>,
    db: &C,
) -> anyhow::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    server_infra::Entity::insert_many(rows)
        .exec(db)
        .await
        .context("Error inserting server infra rows")?;
    Ok(())
}

pub async fn delete_by_names<C: ConnectionTrait>(
    names: &[String],
    namespace: &str,
    db: &C,
) -> anyhow::Result<u64> {
    if names.is_empty() {
        return Ok(0);
    }
    let result = server_infra::Entity::delete_many()
        .filter(server_infra::Column::Name.is_in(names.iter().cloned()))
        .filter(server_infra::Column::Namespace.eq(namespace))
        .exec(db)
        .await
        .context("Error deleting obsolete server infra rows")?;
    Ok(result.rows_affected)
}
