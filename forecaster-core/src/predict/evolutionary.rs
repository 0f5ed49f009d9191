//! Evolutionary resistance-emergence estimate from free-text mutation patterns.

use serde::Deserialize;
use serde_json::Value;

use super::{check_chart_values, clamp01, is_unit_interval, percent, usable_charts, MAX_FEATURES};
use crate::llm::CompletionError;
use crate::models::{
    Chart, ContributingFeature, DataPoint, EvolutionaryOutcome, EvolutionaryRequest,
    PredictionSource, ThreatLevel,
};
use crate::validate::mutation_tokens;

pub const CONTRIBUTION_TITLE: &str = "Relative Contribution Score";
pub const CO_OCCURRENCE_TITLE: &str = "Co-occurrence Frequency Across Isolates";

const DEFAULT_EXPLANATION: &str = "Evolutionary Trajectory Explanation: mecA acquisition → \
PBP2a structural mutation → regulatory adaptation → phenotypic resistance shift \
(under β-lactam/glycopeptide selection pressure).\n\n\
Existing Knowledge vs Model Inference: literature-supported associations include altered \
β-lactam binding via PBP2a mutations; model-inferred signals reflect heuristic interpretation \
of co-occurring variants and observed trajectories.\n\n\
Scientific Disclaimer: results are probabilistic, observational, and not diagnostic. \
No clinical recommendations.";

const FALLBACK_PREDICTION: &str = "Analysis suggests an elevated risk of resistance emergence \
under the provided patterns and trajectories (probabilistic, not definitive).";

const FALLBACK_INTERVENTIONS: &str = "Genomic surveillance; temporal mutation tracking; \
phenotypic validation assays; literature cross-validation.";

pub fn system_prompt() -> String {
    [
        "You are a computational biology reviewer for an evolutionary antibiotic resistance predictor. \
         Use rigorous, cautious, publication-style language.",
        "",
        "Required content guidelines:",
        "- Mutation Pattern Analysis: list specific mutations using standard notation (e.g., mecA(G246E), PBP2a(V311A)). \
         Classify each as Structural, Regulatory, or Accessory/virulence-associated.",
        "- Existing Knowledge Integration: explicitly separate literature-supported associations from model-inferred signals.",
        "- Evolutionary Trajectory Modeling: describe resistance emergence stepwise \
         (e.g., mecA acquisition → PBP2a structural mutation → regulatory adaptation → phenotypic shift) \
         and reference selection pressure.",
        "- Scientific Rigor: include an explicit disclaimer that results are probabilistic, observational and non-diagnostic. \
         No treatment guidance.",
        "- Visualization: produce charts titled \"Relative Contribution Score\" and \
         \"Co-occurrence Frequency Across Isolates\". Values must be in [0,1].",
        "- Interventions: suggest research actions only.",
        "",
        "Return a JSON object strictly matching keys:",
        r#"{"resistancePrediction": string, "confidenceLevel": number, "inDepthExplanation": string, "suggestedInterventions": string, "charts": [{"title": string, "data": [{"name": string, "value": number}]}]}"#,
    ]
    .join("\n")
}

pub fn user_prompt(request: &EvolutionaryRequest) -> String {
    format!(
        "Mutation Patterns: {}\nEvolutionary Trajectories: {}\nExisting Knowledge: {}",
        request.mutation_patterns,
        request.evolutionary_trajectories,
        request.existing_knowledge.as_deref().unwrap_or(""),
    )
}

/// Expected reply shape. Only `resistancePrediction` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionaryCompletion {
    pub resistance_prediction: String,
    #[serde(default)]
    pub confidence_level: Option<f64>,
    #[serde(default)]
    pub in_depth_explanation: Option<String>,
    #[serde(default)]
    pub suggested_interventions: Option<String>,
    #[serde(default)]
    pub charts: Option<Vec<Chart>>,
}

pub fn parse_completion(value: Value) -> Result<EvolutionaryCompletion, CompletionError> {
    let completion: EvolutionaryCompletion = serde_json::from_value(value)
        .map_err(|e| CompletionError::Malformed(format!("evolutionary schema: {}", e)))?;

    if let Some(c) = completion.confidence_level {
        if !is_unit_interval(c) {
            return Err(CompletionError::Malformed(format!(
                "confidenceLevel = {} is outside [0, 1]",
                c
            )));
        }
    }
    if let Some(charts) = &completion.charts {
        check_chart_values(charts)?;
    }

    Ok(completion)
}

pub fn from_completion(
    request: &EvolutionaryRequest,
    completion: EvolutionaryCompletion,
) -> EvolutionaryOutcome {
    let tokens = mutation_tokens(&request.mutation_patterns);

    let mut charts = usable_charts(completion.charts);
    if !charts.iter().any(|c| c.title.contains("Contribution")) {
        charts.push(contribution_chart(&tokens));
    }
    if !charts.iter().any(|c| c.title.contains("Co-occurrence")) {
        charts.push(co_occurrence_chart(&tokens));
    }

    let mut contributing_features: Vec<ContributingFeature> = charts
        .first()
        .map(|c| {
            c.data
                .iter()
                .take(MAX_FEATURES)
                .map(|p| ContributingFeature::new(p.name.clone(), clamp01(p.value)))
                .collect()
        })
        .unwrap_or_default();
    if contributing_features.is_empty() {
        contributing_features = token_features(&tokens);
    }

    let baseline = baseline_confidence(tokens.len());
    let confidence = completion
        .confidence_level
        .map(|c| c.max(baseline).min(0.95))
        .unwrap_or(baseline);
    let threat_level = ThreatLevel::from_score(mean_weight(&contributing_features));

    let explanation = completion
        .in_depth_explanation
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

    let breakdown_analysis = [
        detected_line(&tokens),
        features_line(&contributing_features),
        format!("Threat level: {}.", threat_level),
        format!(
            "Confidence: {}, an aggregated score blending model output with input signal strength.",
            percent(confidence)
        ),
        format!("How the AI derived this result: {}", explanation),
    ]
    .join("\n\n");

    EvolutionaryOutcome {
        resistance_prediction: completion.resistance_prediction,
        confidence_level: confidence,
        in_depth_explanation: explanation,
        suggested_interventions: completion.suggested_interventions.unwrap_or_default(),
        threat_level,
        contributing_features,
        charts,
        breakdown_analysis,
        source: PredictionSource::Model,
    }
}

/// Deterministic estimate from the mutation tokens alone.
pub fn fallback(request: &EvolutionaryRequest) -> EvolutionaryOutcome {
    let tokens = mutation_tokens(&request.mutation_patterns);
    let confidence = baseline_confidence(tokens.len());
    let contributing_features = token_features(&tokens);
    let threat_level = ThreatLevel::from_score(mean_weight(&contributing_features));

    let breakdown_analysis = [
        detected_line(&tokens),
        features_line(&contributing_features),
        format!("Threat level: {}.", threat_level),
        format!("Confidence: {} (heuristic fallback estimate).", percent(confidence)),
        "Explanation: evolutionary trajectory heuristics applied; see charts and suggested interventions."
            .to_string(),
    ]
    .join("\n\n");

    EvolutionaryOutcome {
        resistance_prediction: FALLBACK_PREDICTION.to_string(),
        confidence_level: confidence,
        in_depth_explanation: DEFAULT_EXPLANATION.to_string(),
        suggested_interventions: FALLBACK_INTERVENTIONS.to_string(),
        threat_level,
        contributing_features,
        charts: vec![contribution_chart(&tokens), co_occurrence_chart(&tokens)],
        breakdown_analysis,
        source: PredictionSource::Heuristic,
    }
}

/// `clamp(0.55, 0.95, 0.55 + 0.06·min(6, tokens))`
pub fn baseline_confidence(token_count: usize) -> f64 {
    (0.55 + 0.06 * token_count.min(MAX_FEATURES) as f64).clamp(0.55, 0.95)
}

fn derived_chart(title: &str, tokens: &[String], placeholder: &str, base: f64, step: f64) -> Chart {
    let names: Vec<String> = if tokens.is_empty() {
        vec![placeholder.to_string()]
    } else {
        tokens.iter().take(MAX_FEATURES).cloned().collect()
    };

    let data = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| DataPoint::new(name, clamp01(base + step * i as f64)))
        .collect();
    Chart::new(title, data)
}

fn contribution_chart(tokens: &[String]) -> Chart {
    derived_chart(CONTRIBUTION_TITLE, tokens, "signal", 0.5, 0.1)
}

fn co_occurrence_chart(tokens: &[String]) -> Chart {
    derived_chart(CO_OCCURRENCE_TITLE, tokens, "feature", 0.3, 0.08)
}

fn token_features(tokens: &[String]) -> Vec<ContributingFeature> {
    tokens
        .iter()
        .take(MAX_FEATURES)
        .enumerate()
        .map(|(i, t)| ContributingFeature::new(t.clone(), clamp01(0.5 + 0.08 * i as f64)))
        .collect()
}

fn mean_weight(features: &[ContributingFeature]) -> f64 {
    if features.is_empty() {
        return 0.0;
    }
    features.iter().map(|f| f.weight).sum::<f64>() / features.len() as f64
}

fn detected_line(tokens: &[String]) -> String {
    format!(
        "Detected {} mutation token(s): {}.",
        tokens.len(),
        tokens.join(", ")
    )
}

fn features_line(features: &[ContributingFeature]) -> String {
    let listed: Vec<String> = features
        .iter()
        .map(|f| format!("{} ({}%)", f.name, (f.weight * 100.0).round() as i64))
        .collect();
    format!("Top contributing features: {}.", listed.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(patterns: &str) -> EvolutionaryRequest {
        EvolutionaryRequest {
            mutation_patterns: patterns.to_string(),
            evolutionary_trajectories: "beta-lactam exposure".to_string(),
            existing_knowledge: None,
        }
    }

    fn assert_invariants(o: &EvolutionaryOutcome, token_count: usize) {
        assert!(o.charts.len() >= 2);
        for chart in &o.charts {
            assert!(chart.data.iter().all(|p| (0.0..=1.0).contains(&p.value)));
        }
        assert!(o.confidence_level >= baseline_confidence(token_count) - 1e-12);
        assert!(o.confidence_level <= 0.95 + 1e-12);
    }

    #[test]
    fn test_fallback_scenario_d() {
        let o = fallback(&request("mecA(G246E), PBP2a(V311A)"));

        assert_eq!(o.charts.len(), 2);
        assert_eq!(o.charts[0].title, CONTRIBUTION_TITLE);
        assert_eq!(o.charts[1].title, CO_OCCURRENCE_TITLE);
        assert_eq!(o.charts[0].data.len(), 2);
        assert_eq!(o.charts[1].data.len(), 2);
        assert_eq!(o.charts[0].data[0].name, "mecA(G246E)");
        assert!((o.charts[0].data[1].value - 0.6).abs() < 1e-9);
        assert!((o.charts[1].data[1].value - 0.38).abs() < 1e-9);

        // mean(0.5, 0.58) = 0.54
        assert_eq!(o.threat_level, ThreatLevel::Moderate);
        assert!((o.confidence_level - 0.67).abs() < 1e-9);
        assert_eq!(o.source, PredictionSource::Heuristic);
        assert_invariants(&o, 2);
    }

    #[test]
    fn test_fallback_caps_points_at_six() {
        let patterns = (0..9).map(|i| format!("g{}(x{})", i, i)).collect::<Vec<_>>().join("; ");
        let o = fallback(&request(&patterns));

        assert!(o.charts.iter().all(|c| c.data.len() == 6));
        assert_eq!(o.contributing_features.len(), 6);
        assert!((o.confidence_level - 0.91).abs() < 1e-9);
        assert!((o.charts[0].data[5].value - 1.0).abs() < 1e-9);
        assert_invariants(&o, 9);
    }

    #[test]
    fn test_model_confidence_only_raises_floor() {
        let req = request("mecA(G246E), PBP2a(V311A)");

        let low = parse_completion(json!({
            "resistancePrediction": "uncertain",
            "confidenceLevel": 0.2
        }))
        .unwrap();
        let o = from_completion(&req, low);
        assert!((o.confidence_level - 0.67).abs() < 1e-9);

        let high = parse_completion(json!({
            "resistancePrediction": "likely",
            "confidenceLevel": 0.99
        }))
        .unwrap();
        let o = from_completion(&req, high);
        assert!((o.confidence_level - 0.95).abs() < 1e-9);

        let mid = parse_completion(json!({
            "resistancePrediction": "likely",
            "confidenceLevel": 0.8
        }))
        .unwrap();
        let o = from_completion(&req, mid);
        assert!((o.confidence_level - 0.8).abs() < 1e-9);
        assert_eq!(o.source, PredictionSource::Model);
    }

    #[test]
    fn test_missing_model_charts_are_derived() {
        let req = request("mecA(G246E), PBP2a(V311A), femA(K12R)");
        let completion = parse_completion(json!({
            "resistancePrediction": "elevated",
            "charts": [
                { "title": "Relative Contribution Score", "data": [
                    { "name": "mecA(G246E)", "value": 0.9 },
                    { "name": "PBP2a(V311A)", "value": 0.7 }
                ]}
            ]
        }))
        .unwrap();

        let o = from_completion(&req, completion);
        assert_eq!(o.charts.len(), 2);
        assert_eq!(o.charts[1].title, CO_OCCURRENCE_TITLE);
        assert_eq!(o.charts[1].data.len(), 3);

        // features come from the model's first chart
        assert_eq!(o.contributing_features.len(), 2);
        assert!((o.contributing_features[0].weight - 0.9).abs() < 1e-9);
        assert_eq!(o.threat_level, ThreatLevel::High);
        assert_invariants(&o, 3);
    }

    #[test]
    fn test_empty_model_charts_replaced() {
        let completion = parse_completion(json!({
            "resistancePrediction": "elevated",
            "charts": [{ "title": "Relative Contribution Score", "data": [] }]
        }))
        .unwrap();

        let o = from_completion(&request("mecA(G246E)"), completion);
        assert_eq!(o.charts.len(), 2);
        assert_eq!(o.charts[0].title, CONTRIBUTION_TITLE);
        assert_eq!(o.charts[0].data.len(), 1);
    }

    #[test]
    fn test_blank_explanation_gets_default() {
        let completion = parse_completion(json!({
            "resistancePrediction": "elevated",
            "inDepthExplanation": ""
        }))
        .unwrap();

        let o = from_completion(&request("mecA(G246E)"), completion);
        assert!(o.in_depth_explanation.contains("Scientific Disclaimer"));
        assert!(o.breakdown_analysis.contains("How the AI derived this result"));
    }

    #[test]
    fn test_schema_violations_are_malformed() {
        assert!(matches!(
            parse_completion(json!({ "confidenceLevel": 0.7 })),
            Err(CompletionError::Malformed(_))
        ));
        assert!(matches!(
            parse_completion(json!({ "resistancePrediction": "x", "confidenceLevel": 7 })),
            Err(CompletionError::Malformed(_))
        ));
        assert!(matches!(
            parse_completion(json!({
                "resistancePrediction": "x",
                "charts": [{ "title": "t", "data": [{ "name": "a", "value": -0.1 }] }]
            })),
            Err(CompletionError::Malformed(_))
        ));
    }

    #[test]
    fn test_prompts_carry_requirements_and_inputs() {
        let system = system_prompt();
        assert!(system.contains("Structural, Regulatory, or Accessory"));
        assert!(system.contains("literature-supported"));
        assert!(system.contains("non-diagnostic"));
        assert!(system.contains(CO_OCCURRENCE_TITLE));

        let user = user_prompt(&request("mecA(G246E)"));
        assert!(user.starts_with("Mutation Patterns: mecA(G246E)"));
        assert!(user.contains("Evolutionary Trajectories: beta-lactam exposure"));
    }

    #[test]
    fn test_features_line_rounds_percentages() {
        let line = features_line(&[ContributingFeature::new("a", 0.58)]);
        assert_eq!(line, "Top contributing features: a (58%).");
    }
}
