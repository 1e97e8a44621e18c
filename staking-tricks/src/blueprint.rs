//! CIP-57 blueprints as emitted by the Aiken compiler

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{pattern::PatternTemplates, script::ScriptTemplate, Error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blueprint {
    pub preamble: Preamble,
    pub validators: Vec<BlueprintValidator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preamble {
    pub title: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub plutus_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintValidator {
    pub title: String,
    pub compiled_code: String,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Blueprint titles of each pattern's validators. A title matches a
/// validator with the same title or one of its handlers (`title.purpose`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTitles {
    pub spend_owner: String,
    pub stake_owner: String,
    pub spend_dry: String,
    pub stake_dry: String,
    pub withdraw0: String,
}

impl Default for TemplateTitles {
    fn default() -> Self {
        Self {
            spend_owner: "owner.spend".into(),
            stake_owner: "owner.stake".into(),
            spend_dry: "dry.spend".into(),
            stake_dry: "dry.stake".into(),
            withdraw0: "withdraw0.withdraw0".into(),
        }
    }
}

impl Blueprint {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let blueprint: Self =
            serde_json::from_str(json).map_err(|e| Error::Blueprint(e.to_string()))?;

        match blueprint.preamble.plutus_version.as_deref() {
            None | Some("v3") => Ok(blueprint),
            Some(other) => Err(Error::Blueprint(format!(
                "unsupported plutus version {other}"
            ))),
        }
    }

    pub fn validator(&self, title: &str) -> Option<&BlueprintValidator> {
        self.validators.iter().find(|v| {
            v.title == title
                || v.title
                    .strip_prefix(title)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub fn template(&self, title: &str) -> Result<ScriptTemplate, Error> {
        let validator = self
            .validator(title)
            .ok_or_else(|| Error::Blueprint(format!("no validator titled {title}")))?;

        debug!(title, matched = %validator.title, "loaded validator");

        ScriptTemplate::from_hex(&validator.compiled_code)
    }

    pub fn templates(&self, titles: &TemplateTitles) -> Result<PatternTemplates, Error> {
        Ok(PatternTemplates {
            spend_owner: self.template(&titles.spend_owner)?,
            stake_owner: self.template(&titles.stake_owner)?,
            spend_dry: self.template(&titles.spend_dry)?,
            stake_dry: self.template(&titles.stake_dry)?,
            withdraw0: self.template(&titles.withdraw0)?,
        })
    }
}
