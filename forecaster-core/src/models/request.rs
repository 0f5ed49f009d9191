use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::result::PredictionKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BayesianRequest {
    pub mec_a_mutations: Vec<String>,
    pub pbp2a_mutations: Vec<String>,
    pub vancomycin_resistance_profile: Option<String>,
    pub ceftaroline_resistance_profile: Option<String>,
}

impl BayesianRequest {
    pub fn mutation_count(&self) -> usize {
        self.mec_a_mutations.len() + self.pbp2a_mutations.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionaryRequest {
    pub mutation_patterns: String,
    pub evolutionary_trajectories: String,
    pub existing_knowledge: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionRequest {
    Bayesian(BayesianRequest),
    Evolutionary(EvolutionaryRequest),
}

impl PredictionRequest {
    pub fn kind(&self) -> PredictionKind {
        match self {
            PredictionRequest::Bayesian(_) => PredictionKind::Bayesian,
            PredictionRequest::Evolutionary(_) => PredictionKind::Evolutionary,
        }
    }

    /// Flatten into the stored key → string form. Lists are joined with ", "
    /// and absent optionals become empty strings.
    pub fn to_input_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        match self {
            PredictionRequest::Bayesian(r) => {
                map.insert("mecAMutations".to_string(), r.mec_a_mutations.join(", "));
                map.insert("pbp2aMutations".to_string(), r.pbp2a_mutations.join(", "));
                map.insert(
                    "vancomycinResistanceProfile".to_string(),
                    r.vancomycin_resistance_profile.clone().unwrap_or_default(),
                );
                map.insert(
                    "ceftarolineResistanceProfile".to_string(),
                    r.ceftaroline_resistance_profile.clone().unwrap_or_default(),
                );
            }
            PredictionRequest::Evolutionary(r) => {
                map.insert("mutationPatterns".to_string(), r.mutation_patterns.clone());
                map.insert(
                    "evolutionaryTrajectories".to_string(),
                    r.evolutionary_trajectories.clone(),
                );
                map.insert(
                    "existingKnowledge".to_string(),
                    r.existing_knowledge.clone().unwrap_or_default(),
                );
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bayesian_input_map_joins_lists() {
        let req = PredictionRequest::Bayesian(BayesianRequest {
            mec_a_mutations: vec!["G246E".to_string(), "I112V".to_string()],
            pbp2a_mutations: vec![],
            vancomycin_resistance_profile: None,
            ceftaroline_resistance_profile: Some("elevated MIC".to_string()),
        });

        let map = req.to_input_map();
        assert_eq!(map["mecAMutations"], "G246E, I112V");
        assert_eq!(map["pbp2aMutations"], "");
        assert_eq!(map["vancomycinResistanceProfile"], "");
        assert_eq!(map["ceftarolineResistanceProfile"], "elevated MIC");
        assert_eq!(req.kind(), PredictionKind::Bayesian);
    }

    #[test]
    fn test_evolutionary_input_map_keeps_text() {
        let req = PredictionRequest::Evolutionary(EvolutionaryRequest {
            mutation_patterns: "mecA(G246E), PBP2a(V311A)".to_string(),
            evolutionary_trajectories: "beta-lactam exposure".to_string(),
            existing_knowledge: None,
        });

        let map = req.to_input_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map["mutationPatterns"], "mecA(G246E), PBP2a(V311A)");
        assert_eq!(map["existingKnowledge"], "");
    }
}
