use crate::entities::analysis_history;
use anyhow::{self, Context};
use chrono::{DateTime, Utc};
use sea_orm::*;

pub async fn insert(
    primary_test_id: i32,
    analysis_category: &str,
    analysis_type: &str,
    analysis_result: serde_json::Value,
    model_name: &str,
    analyzed_at: DateTime<Utc>,
    db: &DatabaseConnection,
) -> anyhow::Result<analysis_history::Model> {
    analysis_history::ActiveModel {
        id: ActiveValue::NotSet,
        primary_test_id: ActiveValue::Set(primary_test_id),
        analysis_category: ActiveValue::Set(analysis_category.to_string()),
        analysis_type: ActiveValue::Set(analysis_type.to_string()),
        analysis_result: ActiveValue::Set(analysis_result),
        model_name: ActiveValue::Set(model_name.to_string()),
        analyzed_at: ActiveValue::Set(analyzed_at),
    }
    .insert(db)
    .await
    .context("Error inserting analysis history")
}

/// Stored analyses for a test, newest first.
pub async fn fetch_for_test(
    test_history_id: i32,
    analysis_type: Option<&str>,
    limit: u64,
    db: &DatabaseConnection,
) -> anyhow::Result<Vec<analysis_history::Model>> {
    let mut query = analysis_history::Entity::find()
        .filter(analysis_history::Column::PrimaryTestId.eq(test_history_id));
    if let Some(analysis_type) = analysis_type {
        query = query.filter(analysis_history::Column::AnalysisType.eq(analysis_type));
    }
    query
        .order_by_desc(analysis_history::Column::AnalyzedAt)
        .limit(limit)
        .all(db)
        .await
        .context(format!(
            "Error fetching analysis history for test {test_history_id}"
        ))
}
