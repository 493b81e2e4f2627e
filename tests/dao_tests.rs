use chrono::Utc;
use loadlens::dao;
use loadlens::db_migrate;
use loadlens::entities::{
    endpoint, openapi_spec_version, scenario_history, server_infra, test_history,
    test_metrics_timeseries,
};
use loadlens::influxdb::{AggregateMetrics, IntervalMetrics};
use loadlens::openapi::parser::{ParsedEndpoint, ParsedOpenApi, ParsedParameter};
use sea_orm::*;

async fn test_db() -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await?;
    db_migrate(&db).await?;
    Ok(db)
}

fn sample_parsed_spec(base_url: &str) -> ParsedOpenApi {
    ParsedOpenApi {
        title: "Orders API".to_string(),
        version: "1.0".to_string(),
        base_url: base_url.to_string(),
        endpoints: vec![ParsedEndpoint {
            path: "/orders".to_string(),
            method: "GET".to_string(),
            summary: Some("List orders".to_string()),
            description: None,
            tag_name: Some("orders".to_string()),
            tag_description: None,
            parameters: vec![ParsedParameter {
                param_type: "query".to_string(),
                name: "page".to_string(),
                required: false,
                value_type: Some("integer".to_string()),
                title: None,
                description: None,
                value: None,
            }],
        }],
    }
}

async fn seed_test_with_scenario(
    db: &DatabaseConnection,
    job_name: &str,
) -> anyhow::Result<(test_history::Model, scenario_history::Model, i32)> {
    let spec = dao::openapi::save_spec(None, &sample_parsed_spec("http://orders.test"), db).await?;
    let endpoint = endpoint::Entity::find()
        .one(db)
        .await?
        .expect("seeded endpoint");

    let test = test_history::ActiveModel {
        id: ActiveValue::NotSet,
        title: "checkout load test".to_string().into_active_value(),
        description: ActiveValue::Set(None),
        target_tps: ActiveValue::Set(Some(100.0)),
        tested_at: ActiveValue::Set(Utc::now()),
        job_name: job_name.to_string().into_active_value(),
        k6_script_file_name: ActiveValue::Set(Some("checkout.js".to_string())),
        is_completed: ActiveValue::Set(false),
        completed_at: ActiveValue::Set(None),
        is_analysis_completed: ActiveValue::Set(false),
        analysis_completed_at: ActiveValue::Set(None),
        project_id: ActiveValue::Set(None),
        max_tps: ActiveValue::Set(None),
        min_tps: ActiveValue::Set(None),
        avg_tps: ActiveValue::Set(None),
        max_response_time: ActiveValue::Set(None),
        min_response_time: ActiveValue::Set(None),
        avg_response_time: ActiveValue::Set(None),
        p50_response_time: ActiveValue::Set(None),
        p95_response_time: ActiveValue::Set(None),
        p99_response_time: ActiveValue::Set(None),
        max_error_rate: ActiveValue::Set(None),
        min_error_rate: ActiveValue::Set(None),
        avg_error_rate: ActiveValue::Set(None),
        max_vus: ActiveValue::Set(None),
        min_vus: ActiveValue::Set(None),
        avg_vus: ActiveValue::Set(None),
        total_requests: ActiveValue::Set(None),
        failed_requests: ActiveValue::Set(None),
        test_duration: ActiveValue::Set(None),
    }
    .insert(db)
    .await?;

    let scenario = scenario_history::ActiveModel {
        id: ActiveValue::NotSet,
        name: "list orders".to_string().into_active_value(),
        scenario_tag: format!("{job_name}#{}", endpoint.id).into_active_value(),
        endpoint_id: endpoint.id.into_active_value(),
        think_time: 1.0.into_active_value(),
        executor: "ramping-vus".to_string().into_active_value(),
        response_time_target: ActiveValue::Set(None),
        error_rate_target: ActiveValue::Set(None),
        total_requests: ActiveValue::Set(None),
        failed_requests: ActiveValue::Set(None),
        test_duration: ActiveValue::Set(None),
        max_tps: ActiveValue::Set(None),
        min_tps: ActiveValue::Set(None),
        avg_tps: ActiveValue::Set(None),
        max_response_time: ActiveValue::Set(None),
        min_response_time: ActiveValue::Set(None),
        avg_response_time: ActiveValue::Set(None),
        p50_response_time: ActiveValue::Set(None),
        p95_response_time: ActiveValue::Set(None),
        p99_response_time: ActiveValue::Set(None),
        max_error_rate: ActiveValue::Set(None),
        min_error_rate: ActiveValue::Set(None),
        avg_error_rate: ActiveValue::Set(None),
        test_history_id: test.id.into_active_value(),
    }
    .insert(db)
    .await?;

    Ok((test, scenario, spec.id))
}

fn sample_aggregate() -> AggregateMetrics {
    AggregateMetrics {
        total_requests: 6000,
        failed_requests: 30,
        max_tps: 120.0,
        min_tps: 80.0,
        avg_tps: 100.0,
        avg_response_time: 50.0,
        max_response_time: 180.0,
        min_response_time: 12.0,
        p50_response_time: 45.0,
        p95_response_time: 90.0,
        p99_response_time: 150.0,
        max_error_rate: 1.2,
        min_error_rate: 0.1,
        avg_error_rate: 0.5,
        max_vus: Some(200.0),
        min_vus: Some(10.0),
        avg_vus: Some(105.0),
        test_duration: 60.0,
    }
}

#[tokio::test]
async fn registering_a_spec_twice_keeps_one_active_version() -> anyhow::Result<()> {
    let db = test_db().await?;
    let parsed = sample_parsed_spec("http://orders.test");

    let first = dao::openapi::save_spec(None, &parsed, &db).await?;
    let second = dao::openapi::save_spec(None, &parsed, &db).await?;
    assert_eq!(first.id, second.id, "same base_url must reuse the spec row");

    let versions = openapi_spec_version::Entity::find()
        .filter(openapi_spec_version::Column::OpenapiSpecId.eq(first.id))
        .all(&db)
        .await?;
    assert_eq!(versions.len(), 2);
    let active: Vec<_> = versions.iter().filter(|v| v.is_active).collect();
    assert_eq!(active.len(), 1, "exactly one version may be active");

    Ok(())
}

#[tokio::test]
async fn server_infra_namespace_name_is_unique() -> anyhow::Result<()> {
    let db = test_db().await?;

    let row = || server_infra::ActiveModel {
        id: ActiveValue::NotSet,
        openapi_spec_id: ActiveValue::Set(None),
        resource_type: ActiveValue::Set("Deployment".to_string()),
        environment: ActiveValue::Set("K3S".to_string()),
        service_type: ActiveValue::Set("SERVER".to_string()),
        name: ActiveValue::Set("api-pod-1".to_string()),
        group_name: ActiveValue::Set("svc-api".to_string()),
        labels: ActiveValue::Set(None),
        namespace: ActiveValue::Set("test".to_string()),
    };

    row().insert(&db).await?;
    assert!(row().insert(&db).await.is_err(), "duplicate (namespace, name) must fail");

    Ok(())
}

#[tokio::test]
async fn completed_test_has_aggregates_and_ordered_timestamps() -> anyhow::Result<()> {
    let db = test_db().await?;
    let (test, _scenario, _) = seed_test_with_scenario(&db, "job-A").await?;

    dao::test_history::update_with_metrics(&test, &sample_aggregate(), &db).await?;
    let test = dao::test_history::fetch_by_id(test.id, &db).await?.unwrap();
    dao::test_history::mark_completed(&test, &db).await?;

    let completed = dao::test_history::fetch_by_id(test.id, &db).await?.unwrap();
    assert!(completed.is_completed);
    assert_eq!(completed.total_requests, Some(6000));
    assert_eq!(completed.failed_requests, Some(30));
    assert!(completed.avg_tps.is_some());
    let completed_at = completed.completed_at.expect("completed_at set");
    assert!(completed_at >= completed.tested_at);

    let error_rate = completed.overall_error_rate().unwrap();
    assert!((error_rate - 0.5).abs() < 1e-9);

    Ok(())
}

#[tokio::test]
async fn timeseries_buckets_round_trip() -> anyhow::Result<()> {
    let db = test_db().await?;
    let (test, scenario, _) = seed_test_with_scenario(&db, "job-B").await?;

    let base = Utc::now();
    let mut buckets = Vec::new();
    for i in 0..6 {
        let metrics = IntervalMetrics {
            tps: 100.0 + i as f64,
            error_rate: 0.5,
            vus: 50 + i,
            avg_response_time: 42.0,
            p95_response_time: 80.0,
            p99_response_time: 120.0,
        };
        buckets.push(dao::timeseries::MetricsBucket {
            timestamp: base + chrono::Duration::seconds(i as i64 * 10),
            scenario_history_id: None,
            metrics: metrics.clone(),
        });
        buckets.push(dao::timeseries::MetricsBucket {
            timestamp: base + chrono::Duration::seconds(i as i64 * 10),
            scenario_history_id: Some(scenario.id),
            metrics,
        });
    }

    let saved = dao::timeseries::save_metrics_buckets(test.id, &buckets, &db).await?;
    assert_eq!(saved, 12);

    let overall = dao::timeseries::fetch_overall_series(test.id, &db).await?;
    assert_eq!(overall.len(), 6, "overall series excludes scenario rows");
    assert_eq!(overall[0].tps, Some(100.0));
    assert_eq!(overall[5].tps, Some(105.0));
    assert!(overall.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    Ok(())
}

#[tokio::test]
async fn resource_buckets_link_scenario_and_infra() -> anyhow::Result<()> {
    let db = test_db().await?;
    let (_test, scenario, spec_id) = seed_test_with_scenario(&db, "job-C").await?;

    let infra = server_infra::ActiveModel {
        id: ActiveValue::NotSet,
        openapi_spec_id: ActiveValue::Set(Some(spec_id)),
        resource_type: ActiveValue::Set("Deployment".to_string()),
        environment: ActiveValue::Set("K3S".to_string()),
        service_type: ActiveValue::Set("SERVER".to_string()),
        name: ActiveValue::Set("orders-pod".to_string()),
        group_name: ActiveValue::Set("svc-orders".to_string()),
        labels: ActiveValue::Set(None),
        namespace: ActiveValue::Set("test".to_string()),
    }
    .insert(&db)
    .await?;

    let spec = loadlens::k8s::resources::PodResourceSpec {
        cpu_request_millicores: 250.0,
        cpu_limit_millicores: 1000.0,
        memory_request_mb: 256.0,
        memory_limit_mb: 512.0,
    };
    let buckets = vec![
        dao::timeseries::ResourceBucket {
            timestamp: Utc::now(),
            value: 400.0,
        },
        dao::timeseries::ResourceBucket {
            timestamp: Utc::now() + chrono::Duration::seconds(10),
            value: 450.0,
        },
    ];
    dao::timeseries::save_resource_buckets(
        scenario.id,
        infra.id,
        "cpu",
        "millicores",
        &buckets,
        Some(&spec),
        &db,
    )
    .await?;

    let rows = dao::timeseries::fetch_resource_series(&[scenario.id], &db).await?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.server_infra_id == infra.id));
    assert!(rows.iter().all(|r| r.cpu_limit_millicores == Some(1000.0)));
    assert!(rows.iter().all(|r| r.value >= 0.0));

    Ok(())
}

#[tokio::test]
async fn server_infras_resolve_through_the_endpoint_graph() -> anyhow::Result<()> {
    let db = test_db().await?;
    let (test, _scenario, spec_id) = seed_test_with_scenario(&db, "job-D").await?;

    server_infra::ActiveModel {
        id: ActiveValue::NotSet,
        openapi_spec_id: ActiveValue::Set(Some(spec_id)),
        resource_type: ActiveValue::Set("Deployment".to_string()),
        environment: ActiveValue::Set("K3S".to_string()),
        service_type: ActiveValue::Set("SERVER".to_string()),
        name: ActiveValue::Set("orders-pod-1".to_string()),
        group_name: ActiveValue::Set("svc-orders".to_string()),
        labels: ActiveValue::Set(None),
        namespace: ActiveValue::Set("test".to_string()),
    }
    .insert(&db)
    .await?;

    let infras = dao::openapi::server_infras_for_test(test.id, &db).await?;
    assert_eq!(infras.len(), 1);
    assert_eq!(infras[0].name, "orders-pod-1");

    Ok(())
}

#[tokio::test]
async fn analysis_history_is_newest_first_and_filterable() -> anyhow::Result<()> {
    let db = test_db().await?;
    let (test, _scenario, _) = seed_test_with_scenario(&db, "job-E").await?;

    let base = Utc::now();
    for (i, analysis_type) in ["comprehensive", "tps", "comprehensive"].iter().enumerate() {
        dao::analysis::insert(
            test.id,
            "comprehensive",
            analysis_type,
            serde_json::json!({"summary": format!("analysis {i}")}),
            "llama3.1:8b",
            base + chrono::Duration::seconds(i as i64),
            &db,
        )
        .await?;
    }

    let all = dao::analysis::fetch_for_test(test.id, None, 10, &db).await?;
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].analyzed_at >= w[1].analyzed_at));

    let comprehensive =
        dao::analysis::fetch_for_test(test.id, Some("comprehensive"), 10, &db).await?;
    assert_eq!(comprehensive.len(), 2);

    let limited = dao::analysis::fetch_for_test(test.id, None, 1, &db).await?;
    assert_eq!(limited.len(), 1);

    Ok(())
}

#[tokio::test]
async fn deleting_a_test_cascades_to_children() -> anyhow::Result<()> {
    let db = test_db().await?;
    let (test, scenario, _) = seed_test_with_scenario(&db, "job-F").await?;

    dao::timeseries::save_metrics_buckets(
        test.id,
        &[dao::timeseries::MetricsBucket {
            timestamp: Utc::now(),
            scenario_history_id: Some(scenario.id),
            metrics: IntervalMetrics::default(),
        }],
        &db,
    )
    .await?;

    test_history::Entity::delete_by_id(test.id).exec(&db).await?;

    assert!(scenario_history::Entity::find_by_id(scenario.id)
        .one(&db)
        .await?
        .is_none());
    assert_eq!(
        test_metrics_timeseries::Entity::find().all(&db).await?.len(),
        0
    );

    Ok(())
}
