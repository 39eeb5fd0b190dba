use serde::Deserialize;

/// Instant-query response of `/api/v1/query`.
#[derive(Debug, Deserialize)]
pub struct PromResponse {
    pub data: Option<PromData>,
}

#[derive(Debug, Deserialize)]
pub struct PromData {
    #[serde(default)]
    pub result: Vec<PromSample>,
}

#[derive(Debug, Deserialize)]
pub struct PromSample {
    pub value: (f64, String),
}

impl PromResponse {
    /// Value of the first sample, `None` for an empty result.
    pub fn first_value(&self) -> Option<f64> {
        let sample = self.data.as_ref()?.result.first()?;
        sample.value.1.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_sample() {
        let resp: PromResponse = serde_json::from_str(
            r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{},"value":[1700000000.123,"4217"]}]}}"#,
        )
        .unwrap();
        assert_eq!(resp.first_value(), Some(4217.0));
    }

    #[test]
    fn empty_result_has_no_value() {
        let resp: PromResponse =
            serde_json::from_str(r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#)
                .unwrap();
        assert_eq!(resp.first_value(), None);
    }
}
