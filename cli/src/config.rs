use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use datasets::DEFAULT_BASE_URL;
use model_rnn::{Activation, ScorerConfig};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use trainer::TrainerConfig;

/// Settings driving the `train` command.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrainSettings {
    /// CSV corpus with `title` and `score` columns.
    #[serde(default = "TrainSettings::default_dataset")]
    pub dataset: PathBuf,
    /// Maximum number of stems kept; also the one-hot width of the scorer.
    #[serde(default = "TrainSettings::default_vocabulary_size")]
    pub vocabulary_size: usize,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub trainer: TrainerConfig,
    /// Plain text summary of the epoch.
    #[serde(default = "TrainSettings::default_report")]
    pub report: Option<PathBuf>,
    /// JSON dump of the ranked vocabulary.
    #[serde(default)]
    pub vocabulary_output: Option<PathBuf>,
    /// Optional flamegraph destination collected while training.
    #[serde(default)]
    pub profile_output: Option<PathBuf>,
}

impl TrainSettings {
    fn default_dataset() -> PathBuf {
        PathBuf::from("data.csv")
    }

    fn default_vocabulary_size() -> usize {
        10_000
    }

    fn default_report() -> Option<PathBuf> {
        Some(PathBuf::from("reports/train_summary.txt"))
    }
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            dataset: Self::default_dataset(),
            vocabulary_size: Self::default_vocabulary_size(),
            model: ModelSettings::default(),
            trainer: TrainerConfig::default(),
            report: Self::default_report(),
            vocabulary_output: None,
            profile_output: None,
        }
    }
}

/// Scorer dimensions that are not derived from the vocabulary.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
    pub input_l2_size: usize,
    pub hidden_size: usize,
    pub activation: Activation,
    pub random_seed: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        let scorer = ScorerConfig::default();
        Self {
            input_l2_size: scorer.input_l2_size,
            hidden_size: scorer.hidden_size,
            activation: scorer.activation,
            random_seed: scorer.seed,
        }
    }
}

impl ModelSettings {
    pub fn scorer_config(&self, vocabulary_size: usize) -> ScorerConfig {
        ScorerConfig {
            vector_size: vocabulary_size,
            input_l2_size: self.input_l2_size,
            hidden_size: self.hidden_size,
            activation: self.activation,
            seed: self.random_seed,
        }
    }
}

/// Settings for the `fetch` command.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSettings {
    /// Root of the item API.
    pub base_url: String,
    /// Number of most recent ids to request.
    pub count: u64,
    /// Upper id bound (exclusive); queried from the API when absent.
    pub max_item: Option<u64>,
    pub output: PathBuf,
    pub workers: usize,
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            count: 1000,
            max_item: None,
            output: PathBuf::from("data.csv"),
            workers: 8,
            timeout_secs: 30,
        }
    }
}

/// Loads TOML settings for the requested command, falling back to defaults when missing.
pub fn load_settings<T>(command: &str, explicit: Option<PathBuf>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let (candidate, explicit_provided) = match explicit {
        Some(path) => (path, true),
        None => (PathBuf::from(format!("{command}.toml")), false),
    };

    if candidate.exists() {
        let raw = std::fs::read_to_string(&candidate).with_context(|| {
            format!(
                "failed to read configuration for `{command}` from {}",
                candidate.display()
            )
        })?;
        let parsed = toml::from_str(&raw).with_context(|| {
            format!(
                "failed to parse TOML configuration for `{command}` at {}",
                candidate.display()
            )
        })?;
        Ok(parsed)
    } else if explicit_provided {
        bail!(
            "configuration file for `{command}` not found at {}",
            candidate.display()
        );
    } else {
        Ok(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use trainer::{BatchPolicy, LearningRateSchedule};

    fn write_config(body: &str) -> tempfile::TempPath {
        let path = NamedTempFile::new().expect("temp file").into_temp_path();
        std::fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn load_settings_returns_default_when_missing() {
        let settings: FetchSettings =
            load_settings("no_such_command", None).expect("default settings");
        assert_eq!(settings, FetchSettings::default());
    }

    #[test]
    fn load_settings_errors_for_missing_explicit_path() {
        let result: Result<TrainSettings> =
            load_settings("train", Some(PathBuf::from("definitely_missing.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn train_settings_parse_nested_tables() {
        let path = write_config(
            r#"dataset = "corpora/hn.csv"
vocabulary_size = 500
vocabulary_output = "reports/vocab.json"

[model]
hidden_size = 64
activation = "tanh"

[trainer]
batch_size = 10
batch_policy = "row_index"
flush_trailing_batch = true

[trainer.schedule]
kind = "warmup_cosine"
warmup_steps = 5
total_steps = 100
min_lr = 0.0001
"#,
        );

        let settings: TrainSettings =
            load_settings("train", Some(path.to_path_buf())).expect("parsed settings");
        assert_eq!(settings.dataset, PathBuf::from("corpora/hn.csv"));
        assert_eq!(settings.vocabulary_size, 500);
        assert_eq!(
            settings.vocabulary_output,
            Some(PathBuf::from("reports/vocab.json"))
        );
        assert_eq!(settings.report, TrainSettings::default_report());

        let scorer = settings.model.scorer_config(settings.vocabulary_size);
        assert_eq!(scorer.vector_size, 500);
        assert_eq!(scorer.hidden_size, 64);
        assert_eq!(scorer.input_l2_size, 100);
        assert_eq!(scorer.activation, Activation::Tanh);
        assert_eq!(scorer.seed, 1);

        assert_eq!(settings.trainer.batch_size, 10);
        assert_eq!(settings.trainer.batch_policy, BatchPolicy::RowIndex);
        assert!(settings.trainer.flush_trailing_batch);
        assert_eq!(settings.trainer.learning_rate, 1e-3);
        assert_eq!(
            settings.trainer.schedule,
            LearningRateSchedule::WarmupCosine {
                warmup_steps: 5,
                total_steps: 100,
                min_lr: 1e-4,
            }
        );
    }

    #[test]
    fn fetch_settings_keep_defaults_for_absent_keys() {
        let path = write_config("count = 25\nmax_item = 4000\n");
        let settings: FetchSettings =
            load_settings("fetch", Some(path.to_path_buf())).expect("parsed settings");
        assert_eq!(settings.count, 25);
        assert_eq!(settings.max_item, Some(4000));
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.workers, 8);
    }

    #[test]
    fn malformed_toml_is_reported() {
        let path = write_config("vocabulary_size = \"many\"\n");
        let result: Result<TrainSettings> = load_settings("train", Some(path.to_path_buf()));
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("failed to parse TOML configuration for `train`"));
    }
}
