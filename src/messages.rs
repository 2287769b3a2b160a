use serde_derive::Serialize;

/// What the device is currently reporting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState {
    Off,
    Warmup,
    Sample {
        /// Raw frequency, Hz
        raw: f64,
        /// Filtered frequency, Hz
        filt: f64,
        /// Flow rate, L/min
        flow: f64,
        /// Total dissolved solids, ppm
        tds: f64,
    },
}

impl DisplayState {
    pub fn label(&self) -> &'static str {
        match self {
            DisplayState::Off => "off",
            DisplayState::Warmup => "warmup",
            DisplayState::Sample { .. } => "sample",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        assert_eq!(
            serde_json::to_string(&DisplayState::Off).unwrap(),
            r#"{"state":"off"}"#
        );
        assert_eq!(
            serde_json::to_string(&DisplayState::Warmup).unwrap(),
            r#"{"state":"warmup"}"#
        );
        let sample = DisplayState::Sample {
            raw: 12.0,
            filt: 11.5,
            flow: 0.5,
            tds: 100.25,
        };
        assert_eq!(
            serde_json::to_string(&sample).unwrap(),
            r#"{"state":"sample","raw":12.0,"filt":11.5,"flow":0.5,"tds":100.25}"#
        );
    }
}
