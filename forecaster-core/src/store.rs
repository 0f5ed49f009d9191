//! Prediction persistence.
//!
//! A pipeline run is written as one transaction across the prediction,
//! input, output, chart, chart data and chart metadata tables, so a record is
//! either fully present or absent. Reads rebuild the typed result from the
//! stored `kind` discriminant.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

use crate::error::ForecasterError;
use crate::models::{
    BayesianOutcome, Chart, ChartView, ContributingFeature, DataPoint, EvolutionaryOutcome,
    NewPrediction, PredictionKind, PredictionRecord, PredictionResult, PredictionSource,
    ThreatLevel,
};
use crate::render;

/// Context and interpretation captions stored with each chart.
pub fn chart_captions(title: &str) -> (&'static str, &'static str) {
    if title.contains("Contribution") {
        (
            "Relative contribution of named mutations to resistance risk, normalized to 0–1 under cautious interpretation.",
            "Higher values indicate greater inferred influence of the mutation on resistance risk. Values are observational, not diagnostic.",
        )
    } else if title.contains("Co-occurrence") {
        (
            "Frequency of mutation co-occurrence across isolates, normalized to 0–1.",
            "Higher values indicate mutations observed together more often across isolates. Association does not imply causation.",
        )
    } else {
        (
            "Quantitative visualization of model-derived signals, normalized to 0–1.",
            "Values represent normalized magnitudes and should be interpreted cautiously in context of other evidence.",
        )
    }
}

/// Flattened output columns shared by both prediction kinds.
struct OutputColumns<'a> {
    summary: &'a str,
    explanation: Option<&'a str>,
    interventions: &'a str,
    vancomycin_prob: Option<f64>,
    ceftaroline_prob: Option<f64>,
    breakdown: &'a str,
}

impl<'a> OutputColumns<'a> {
    fn from_result(result: &'a PredictionResult) -> Self {
        match result {
            PredictionResult::Bayesian(o) => Self {
                summary: &o.rationale,
                explanation: None,
                interventions: &o.solution,
                vancomycin_prob: Some(o.vancomycin_resistance_probability),
                ceftaroline_prob: Some(o.ceftaroline_resistance_probability),
                breakdown: &o.breakdown_analysis,
            },
            PredictionResult::Evolutionary(o) => Self {
                summary: &o.resistance_prediction,
                explanation: Some(&o.in_depth_explanation),
                interventions: &o.suggested_interventions,
                vancomycin_prob: None,
                ceftaroline_prob: None,
                breakdown: &o.breakdown_analysis,
            },
        }
    }
}

/// Persist one pipeline run and return the new prediction id.
pub async fn save(
    pool: &SqlitePool,
    prediction: &NewPrediction<'_>,
) -> Result<i64, ForecasterError> {
    let kind = prediction.input.kind();
    let output = prediction.output;
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    let features = serde_json::to_string(output.contributing_features())?;
    let columns = OutputColumns::from_result(output);

    let mut tx = pool.begin().await?;

    let prediction_id = sqlx::query("INSERT INTO predictions (kind, created_at) VALUES (?, ?)")
        .bind(kind.as_str())
        .bind(&created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    for (position, (key, value)) in prediction.input.to_input_map().into_iter().enumerate() {
        sqlx::query(
            "INSERT INTO prediction_inputs (prediction_id, position, key, value) VALUES (?, ?, ?, ?)",
        )
        .bind(prediction_id)
        .bind(position as i64)
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO prediction_outputs (
            prediction_id, summary, confidence, explanation, interventions,
            vancomycin_prob, ceftaroline_prob, threat_level, source, breakdown,
            contributing_features
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(prediction_id)
    .bind(columns.summary)
    .bind(output.confidence())
    .bind(columns.explanation)
    .bind(columns.interventions)
    .bind(columns.vancomycin_prob)
    .bind(columns.ceftaroline_prob)
    .bind(output.threat_level().as_str())
    .bind(output.source().as_str())
    .bind(columns.breakdown)
    .bind(&features)
    .execute(&mut *tx)
    .await?;

    for (position, chart) in output.charts().iter().enumerate() {
        let chart_id = sqlx::query(
            "INSERT INTO charts (prediction_id, position, title) VALUES (?, ?, ?)",
        )
        .bind(prediction_id)
        .bind(position as i64)
        .bind(&chart.title)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (point_position, point) in chart.data.iter().enumerate() {
            sqlx::query(
                "INSERT INTO chart_data (chart_id, position, name, value) VALUES (?, ?, ?, ?)",
            )
            .bind(chart_id)
            .bind(point_position as i64)
            .bind(&point.name)
            .bind(point.value)
            .execute(&mut *tx)
            .await?;
        }

        let (context, interpretation) = chart_captions(&chart.title);
        sqlx::query(
            "INSERT INTO chart_meta (chart_id, context, interpretation, image) VALUES (?, ?, ?, NULL)",
        )
        .bind(chart_id)
        .bind(context)
        .bind(interpretation)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        prediction_id,
        kind = %kind,
        charts = output.charts().len(),
        source = output.source().as_str(),
        "Saved prediction"
    );

    Ok(prediction_id)
}

type PredictionRow = (i64, String, String);

type OutputRow = (
    String,
    f64,
    Option<String>,
    String,
    Option<f64>,
    Option<f64>,
    String,
    String,
    String,
    String,
);

/// Most recent predictions first.
pub async fn list_recent(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<PredictionRecord>, ForecasterError> {
    let rows: Vec<PredictionRow> = sqlx::query_as(
        "SELECT id, kind, created_at FROM predictions ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for (id, kind, created_at) in rows {
        records.push(load_record(pool, id, &kind, &created_at).await?);
    }
    Ok(records)
}

async fn load_record(
    pool: &SqlitePool,
    id: i64,
    kind: &str,
    created_at: &str,
) -> Result<PredictionRecord, ForecasterError> {
    let kind: PredictionKind = kind.parse().map_err(ForecasterError::Other)?;
    let created_at = DateTime::parse_from_rfc3339(created_at)
        .map_err(|e| ForecasterError::Other(format!("bad created_at for prediction {}: {}", id, e)))?
        .with_timezone(&Utc);

    let inputs: Vec<(String, String)> = sqlx::query_as(
        "SELECT key, value FROM prediction_inputs WHERE prediction_id = ? ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    let input: BTreeMap<String, String> = inputs.into_iter().collect();

    let output: OutputRow = sqlx::query_as(
        r#"
        SELECT summary, confidence, explanation, interventions, vancomycin_prob,
               ceftaroline_prob, threat_level, source, breakdown, contributing_features
        FROM prediction_outputs
        WHERE prediction_id = ?
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    let charts = load_charts(pool, id).await?;
    let output = rebuild_output(kind, output, charts)?;

    Ok(PredictionRecord {
        id,
        kind,
        created_at,
        input,
        output,
    })
}

async fn load_charts(pool: &SqlitePool, prediction_id: i64) -> Result<Vec<Chart>, ForecasterError> {
    let rows: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, title FROM charts WHERE prediction_id = ? ORDER BY position, id",
    )
    .bind(prediction_id)
    .fetch_all(pool)
    .await?;

    let mut charts = Vec::with_capacity(rows.len());
    for (chart_id, title) in rows {
        charts.push(Chart {
            id: Some(chart_id),
            title,
            data: load_points(pool, chart_id).await?,
        });
    }
    Ok(charts)
}

async fn load_points(pool: &SqlitePool, chart_id: i64) -> Result<Vec<DataPoint>, sqlx::Error> {
    let rows: Vec<(String, f64)> = sqlx::query_as(
        "SELECT name, value FROM chart_data WHERE chart_id = ? ORDER BY position, id",
    )
    .bind(chart_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, value)| DataPoint::new(name, value))
        .collect())
}

fn rebuild_output(
    kind: PredictionKind,
    row: OutputRow,
    charts: Vec<Chart>,
) -> Result<PredictionResult, ForecasterError> {
    let (
        summary,
        confidence_level,
        explanation,
        interventions,
        vancomycin_prob,
        ceftaroline_prob,
        threat_level,
        source,
        breakdown_analysis,
        features,
    ) = row;

    let threat_level: ThreatLevel = threat_level.parse().map_err(ForecasterError::Other)?;
    let source: PredictionSource = source.parse().map_err(ForecasterError::Other)?;
    let contributing_features: Vec<ContributingFeature> = serde_json::from_str(&features)?;

    let result = match kind {
        PredictionKind::Bayesian => PredictionResult::Bayesian(BayesianOutcome {
            vancomycin_resistance_probability: vancomycin_prob.unwrap_or_default(),
            ceftaroline_resistance_probability: ceftaroline_prob.unwrap_or_default(),
            rationale: summary,
            solution: interventions,
            confidence_level,
            threat_level,
            contributing_features,
            charts,
            breakdown_analysis,
            source,
        }),
        PredictionKind::Evolutionary => PredictionResult::Evolutionary(EvolutionaryOutcome {
            resistance_prediction: summary,
            confidence_level,
            in_depth_explanation: explanation.unwrap_or_default(),
            suggested_interventions: interventions,
            threat_level,
            contributing_features,
            charts,
            breakdown_analysis,
            source,
        }),
    };
    Ok(result)
}

/// Ids of a prediction's charts, in stored order.
pub async fn chart_ids(pool: &SqlitePool, prediction_id: i64) -> Result<Vec<i64>, ForecasterError> {
    let rows: Vec<(i64,)> =
        sqlx::query_as("SELECT id FROM charts WHERE prediction_id = ? ORDER BY position, id")
            .bind(prediction_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

/// Look up a stored chart, rendering an SVG when none was stored.
pub async fn get_chart(pool: &SqlitePool, id: i64) -> Result<Option<ChartView>, ForecasterError> {
    let row: Option<(i64, String, Option<String>, Option<String>, Option<String>)> =
        sqlx::query_as(
            r#"
            SELECT c.prediction_id, c.title, m.context, m.interpretation, m.image
            FROM charts c
            LEFT JOIN chart_meta m ON m.chart_id = c.id
            WHERE c.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some((prediction_id, title, context, interpretation, image)) = row else {
        tracing::debug!(chart_id = id, "Chart not found");
        return Ok(None);
    };

    let data = load_points(pool, id).await?;
    let image_svg = match image {
        Some(svg) if !svg.trim().is_empty() => svg,
        _ => render::bar_chart_svg(Some(id), &title, &data),
    };

    Ok(Some(ChartView {
        id,
        prediction_id,
        title,
        context,
        interpretation,
        image_svg,
        data,
    }))
}
