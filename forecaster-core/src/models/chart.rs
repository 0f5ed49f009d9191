use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub name: String,
    pub value: f64,
}

impl DataPoint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A titled series of named values in [0, 1]. `id` is only set once the chart
/// has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub data: Vec<DataPoint>,
}

impl Chart {
    pub fn new(title: impl Into<String>, data: Vec<DataPoint>) -> Self {
        Self {
            id: None,
            title: title.into(),
            data,
        }
    }
}

/// A stored chart as served by `GET /api/graphs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub id: i64,
    pub prediction_id: i64,
    pub title: String,
    pub context: Option<String>,
    pub interpretation: Option<String>,
    pub image_svg: String,
    pub data: Vec<DataPoint>,
}
