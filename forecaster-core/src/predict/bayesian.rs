//! Bayesian resistance estimate for vancomycin and ceftaroline.

use serde::Deserialize;
use serde_json::Value;

use super::{
    check_chart_values, has_resistance_keywords, is_unit_interval, percent, usable_charts,
    MAX_FEATURES,
};
use crate::llm::CompletionError;
use crate::models::{
    BayesianOutcome, BayesianRequest, Chart, ContributingFeature, DataPoint, PredictionSource,
    ThreatLevel,
};

pub const CHART_TITLE: &str = "Resistance Probabilities";

const DEFAULT_RATIONALE: &str = "This analysis is probabilistic and observational. \
Vancomycin probabilities remain low without explicit mechanisms; \
ceftaroline probabilities reflect mutation burden.";

const FALLBACK_RATIONALE: &str = "Fallback heuristic estimates probabilities from mutation counts. \
Vancomycin remains low without explicit mechanisms; \
ceftaroline increases with PBP2a/mecA mutation burden.";

const FALLBACK_SOLUTION: &str = "1. Monitor co-occurring mecA/PBP2a variants. \
2. Track phenotype validation in surveillance datasets. \
3. Investigate structural impacts via in-silico modeling. \
4. Establish conservative alerting thresholds.";

pub fn system_prompt() -> String {
    [
        "You are a computational biology assistant modeling antibiotic resistance for a research demo. \
         Outputs must be probabilistic and cautious.",
        "",
        "Return a JSON object strictly matching keys:",
        r#"{"vancomycinResistanceProbability": number, "ceftarolineResistanceProbability": number, "rationale": string, "solution": string, "charts": [{"title": string, "data": [{"name": string, "value": number}]}]}"#,
        "All probabilities and chart values must be in [0,1].",
        "",
        "Scientific constraints:",
        "- High probabilities only with multiple corroborating resistance-associated mutations.",
        "- Vancomycin probability stays low unless the profiles mention mechanisms such as van genes, \
         cell wall thickening or other cell wall changes.",
    ]
    .join("\n")
}

pub fn user_prompt(request: &BayesianRequest) -> String {
    format!(
        "mecA Mutations: {}\nPBP2a Mutations: {}\nVancomycin Profile: {}\nCeftaroline Profile: {}",
        request.mec_a_mutations.join(", "),
        request.pbp2a_mutations.join(", "),
        request.vancomycin_resistance_profile.as_deref().unwrap_or(""),
        request.ceftaroline_resistance_profile.as_deref().unwrap_or(""),
    )
}

/// Expected reply shape. The two probabilities are required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BayesianCompletion {
    pub vancomycin_resistance_probability: f64,
    pub ceftaroline_resistance_probability: f64,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub charts: Option<Vec<Chart>>,
}

pub fn parse_completion(value: Value) -> Result<BayesianCompletion, CompletionError> {
    let completion: BayesianCompletion = serde_json::from_value(value)
        .map_err(|e| CompletionError::Malformed(format!("bayesian schema: {}", e)))?;

    for (field, p) in [
        ("vancomycinResistanceProbability", completion.vancomycin_resistance_probability),
        ("ceftarolineResistanceProbability", completion.ceftaroline_resistance_probability),
    ] {
        if !is_unit_interval(p) {
            return Err(CompletionError::Malformed(format!(
                "{} = {} is outside [0, 1]",
                field, p
            )));
        }
    }
    if let Some(charts) = &completion.charts {
        check_chart_values(charts)?;
    }

    Ok(completion)
}

pub fn from_completion(request: &BayesianRequest, completion: BayesianCompletion) -> BayesianOutcome {
    let van = completion.vancomycin_resistance_probability;
    let cef = completion.ceftaroline_resistance_probability;

    let mut charts = usable_charts(completion.charts);
    if charts.is_empty() {
        charts.push(probability_chart(van, cef));
    }
    charts.truncate(1);

    let confidence = confidence(van, cef, request.mutation_count());
    let threat_level = ThreatLevel::from_score(van.max(cef));

    let rationale = completion
        .rationale
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_RATIONALE.to_string());

    let breakdown_analysis = format!(
        "{}\n\nThreat level: {} (based on the highest probability).\n\n\
         Confidence: {}, calibrated from model outputs and input mutation burden.\n\n\
         Rationale: {}",
        summary(request, van, cef),
        threat_level,
        percent(confidence),
        rationale,
    );

    BayesianOutcome {
        vancomycin_resistance_probability: van,
        ceftaroline_resistance_probability: cef,
        rationale,
        solution: completion.solution.unwrap_or_default(),
        confidence_level: confidence,
        threat_level,
        contributing_features: contributing_features(request),
        charts,
        breakdown_analysis,
        source: PredictionSource::Model,
    }
}

/// Deterministic estimate from mutation counts and profile keywords.
pub fn fallback(request: &BayesianRequest) -> BayesianOutcome {
    let van = if has_resistance_keywords(request.vancomycin_resistance_profile.as_deref()) {
        0.22
    } else {
        0.10
    };
    let cef = (0.25 + 0.08 * request.mutation_count() as f64).min(0.85);

    let confidence = confidence(van, cef, request.mutation_count());
    let threat_level = ThreatLevel::from_score(van.max(cef));

    let breakdown_analysis = format!(
        "{}\n\nThreat level: {}.\n\nConfidence: {} (heuristic fallback estimate).",
        summary(request, van, cef),
        threat_level,
        percent(confidence),
    );

    BayesianOutcome {
        vancomycin_resistance_probability: van,
        ceftaroline_resistance_probability: cef,
        rationale: FALLBACK_RATIONALE.to_string(),
        solution: FALLBACK_SOLUTION.to_string(),
        confidence_level: confidence,
        threat_level,
        contributing_features: contributing_features(request),
        charts: vec![probability_chart(van, cef)],
        breakdown_analysis,
        source: PredictionSource::Heuristic,
    }
}

/// `clamp(0.55, 0.95, 0.6 + 0.25·avg(van, cef) + 0.02·min(6, mutations))`
pub fn confidence(van: f64, cef: f64, mutation_count: usize) -> f64 {
    let burden = mutation_count.min(MAX_FEATURES) as f64;
    (0.6 + 0.25 * (van + cef) / 2.0 + 0.02 * burden).clamp(0.55, 0.95)
}

/// Up to six mecA entries then up to six PBP2a entries, in input order.
pub fn contributing_features(request: &BayesianRequest) -> Vec<ContributingFeature> {
    let mec = request
        .mec_a_mutations
        .iter()
        .take(MAX_FEATURES)
        .enumerate()
        .map(|(i, m)| ContributingFeature::new(format!("mecA:{}", m), (0.45 + 0.06 * i as f64).min(1.0)));
    let pbp = request
        .pbp2a_mutations
        .iter()
        .take(MAX_FEATURES)
        .enumerate()
        .map(|(i, m)| ContributingFeature::new(format!("PBP2a:{}", m), (0.40 + 0.06 * i as f64).min(1.0)));
    mec.chain(pbp).collect()
}

fn probability_chart(van: f64, cef: f64) -> Chart {
    Chart::new(
        CHART_TITLE,
        vec![DataPoint::new("Vancomycin", van), DataPoint::new("Ceftaroline", cef)],
    )
}

fn summary(request: &BayesianRequest, van: f64, cef: f64) -> String {
    format!(
        "Input summary: {} mecA mutation(s), {} PBP2a mutation(s).\n\n\
         Probabilities estimated: Vancomycin {}, Ceftaroline {}.",
        request.mec_a_mutations.len(),
        request.pbp2a_mutations.len(),
        percent(van),
        percent(cef),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(mec: &[&str], pbp: &[&str], van_profile: Option<&str>) -> BayesianRequest {
        BayesianRequest {
            mec_a_mutations: mec.iter().map(|s| s.to_string()).collect(),
            pbp2a_mutations: pbp.iter().map(|s| s.to_string()).collect(),
            vancomycin_resistance_profile: van_profile.map(str::to_string),
            ceftaroline_resistance_profile: None,
        }
    }

    fn assert_bounds(o: &BayesianOutcome) {
        assert!((0.0..=1.0).contains(&o.vancomycin_resistance_probability));
        assert!((0.0..=1.0).contains(&o.ceftaroline_resistance_probability));
        assert!((0.55..=0.95).contains(&o.confidence_level), "confidence {}", o.confidence_level);
        assert_eq!(o.charts.len(), 1);
        assert!(o.contributing_features.iter().all(|f| (0.0..=1.0).contains(&f.weight)));
    }

    #[test]
    fn test_fallback_scenario_a() {
        let o = fallback(&request(&["G246E"], &["V311A"], None));

        assert!((o.vancomycin_resistance_probability - 0.10).abs() < 1e-9);
        assert!((o.ceftaroline_resistance_probability - 0.41).abs() < 1e-9);
        assert_eq!(o.threat_level, ThreatLevel::Low);
        assert_eq!(o.source, PredictionSource::Heuristic);
        // 0.6 + 0.25 * 0.255 + 0.04
        assert!((o.confidence_level - 0.70375).abs() < 1e-9);
        assert_eq!(o.charts[0].title, CHART_TITLE);
        assert_eq!(o.charts[0].data[0].name, "Vancomycin");
        assert_eq!(o.charts[0].data[1].name, "Ceftaroline");
        assert_bounds(&o);
    }

    #[test]
    fn test_fallback_keywords_raise_vancomycin() {
        let o = fallback(&request(&["G246E"], &[], Some("vanA operon, cell wall thickening")));
        assert!((o.vancomycin_resistance_probability - 0.22).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_ceftaroline_caps_at_085() {
        let many: Vec<String> = (0..10).map(|i| format!("M{}", i)).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let o = fallback(&request(&refs, &refs, None));

        assert!((o.ceftaroline_resistance_probability - 0.85).abs() < 1e-9);
        assert_eq!(o.threat_level, ThreatLevel::High);
        assert_eq!(o.contributing_features.len(), 12);
        assert_bounds(&o);
    }

    #[test]
    fn test_contributing_feature_weights_and_order() {
        let features = contributing_features(&request(&["A1", "B2"], &["C3"], None));
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].name, "mecA:A1");
        assert!((features[0].weight - 0.45).abs() < 1e-9);
        assert!((features[1].weight - 0.51).abs() < 1e-9);
        assert_eq!(features[2].name, "PBP2a:C3");
        assert!((features[2].weight - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert!((confidence(0.0, 0.0, 0) - 0.6).abs() < 1e-9);
        assert!((confidence(1.0, 1.0, 50) - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_model_charts_truncated_to_one() {
        let completion = parse_completion(json!({
            "vancomycinResistanceProbability": 0.1,
            "ceftarolineResistanceProbability": 0.3,
            "charts": [
                { "title": "First", "data": [{ "name": "a", "value": 0.2 }] },
                { "title": "Second", "data": [{ "name": "b", "value": 0.4 }] }
            ]
        }))
        .unwrap();

        let o = from_completion(&request(&["G246E"], &[], None), completion);
        assert_eq!(o.charts.len(), 1);
        assert_eq!(o.charts[0].title, "First");
        assert_bounds(&o);
    }

    #[test]
    fn test_blank_rationale_gets_default() {
        let completion = parse_completion(json!({
            "vancomycinResistanceProbability": 0.1,
            "ceftarolineResistanceProbability": 0.3,
            "rationale": "   "
        }))
        .unwrap();

        let o = from_completion(&request(&["G246E"], &[], None), completion);
        assert_eq!(o.rationale, DEFAULT_RATIONALE);
        assert!(o.breakdown_analysis.contains("Rationale: This analysis"));
        assert_eq!(o.source, PredictionSource::Model);
    }

    #[test]
    fn test_out_of_range_probability_is_malformed() {
        let err = parse_completion(json!({
            "vancomycinResistanceProbability": 1.5,
            "ceftarolineResistanceProbability": 0.3
        }))
        .unwrap_err();
        assert!(matches!(err, CompletionError::Malformed(_)));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let err = parse_completion(json!({
            "vancomycinResistanceProbability": "low",
            "ceftarolineResistanceProbability": 0.3
        }))
        .unwrap_err();
        assert!(matches!(err, CompletionError::Malformed(_)));
    }

    #[test]
    fn test_user_prompt_lists_inputs() {
        let prompt = user_prompt(&request(&["G246E", "I112V"], &["V311A"], Some("van genes")));
        assert!(prompt.contains("mecA Mutations: G246E, I112V"));
        assert!(prompt.contains("PBP2a Mutations: V311A"));
        assert!(prompt.contains("Vancomycin Profile: van genes"));
        assert!(prompt.contains("Ceftaroline Profile: "));
    }

    #[test]
    fn test_system_prompt_states_constraints() {
        let prompt = system_prompt();
        assert!(prompt.contains("vancomycinResistanceProbability"));
        assert!(prompt.contains("multiple corroborating"));
        assert!(prompt.contains("cell wall thickening"));
    }
}
