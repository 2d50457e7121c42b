//! Class definitions for the vector store

use crate::config::Settings;
use crate::error::Result;
use crate::models::POD_CLASS;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A class (collection) definition as accepted by `POST /v1/schema`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    pub class: String,
    #[serde(default)]
    pub vectorizer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverted_index_config: Option<InvertedIndexConfig>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvertedIndexConfig {
    /// Required for filtering on `_creationTimeUnix`
    #[serde(default)]
    pub index_timestamps: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub data_type: Vec<String>,
}

impl Property {
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: vec![data_type.to_string()],
        }
    }
}

impl ClassDefinition {
    /// Describe how `existing` differs structurally, if it does
    ///
    /// Only the vectorizer and the property set are compared; the store
    /// fills in defaults for everything else.
    pub fn difference_from(&self, existing: &ClassDefinition) -> Option<String> {
        if self.vectorizer != existing.vectorizer {
            return Some(format!(
                "vectorizer is '{}', expected '{}'",
                existing.vectorizer, self.vectorizer
            ));
        }

        let mut wanted: Vec<_> = self
            .properties
            .iter()
            .map(|p| (p.name.to_lowercase(), p.data_type.clone()))
            .collect();
        let mut found: Vec<_> = existing
            .properties
            .iter()
            .map(|p| (p.name.to_lowercase(), p.data_type.clone()))
            .collect();
        wanted.sort();
        found.sort();

        if wanted != found {
            let describe = |props: &[(String, Vec<String>)]| {
                props
                    .iter()
                    .map(|(name, types)| format!("{}:{}", name, types.join("|")))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Some(format!(
                "properties are [{}], expected [{}]",
                describe(&found),
                describe(&wanted)
            ));
        }

        None
    }
}

/// The class every metric object is stored under
///
/// Generation runs inside the store, so the class binds the generative
/// module: the local one in dev mode, the hosted one otherwise.
pub fn pod_class(settings: &Settings) -> Result<ClassDefinition> {
    let model = settings.generative_model()?;

    let module_config = if settings.dev {
        json!({
            "generative-ollama": {
                "apiEndpoint": settings.generative_ollama_endpoint(),
                "model": model,
            }
        })
    } else {
        json!({
            "generative-openai": {
                "model": model,
            }
        })
    };

    Ok(ClassDefinition {
        class: POD_CLASS.to_string(),
        vectorizer: "none".to_string(),
        module_config: Some(module_config),
        inverted_index_config: Some(InvertedIndexConfig {
            index_timestamps: true,
        }),
        properties: vec![
            Property::new("namespace", "text"),
            Property::new("name", "text"),
            Property::new("container", "text"),
            Property::new("cpu", "text"),
            Property::new("mem", "text"),
            Property::new("observedAt", "date"),
        ],
    })
}
