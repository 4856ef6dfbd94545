//! Job descriptor templating.
//!
//! The descriptor template is a batch script with `{{KEY}}` placeholders
//! filled from the run's settings.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{SchedulerError, SchedulerResult};
use crate::config::Settings;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Rendered descriptor text and the placeholders nothing filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDescriptor {
    pub text: String,
    pub unknown: Vec<String>,
}

/// Placeholder values derived from settings.
pub fn descriptor_values(settings: &Settings) -> BTreeMap<String, String> {
    let path = |p: PathBuf| p.display().to_string();
    BTreeMap::from([
        ("INPUT_DIR".to_string(), path(settings.input_dir())),
        ("OUTPUT_DIR".to_string(), path(settings.output_dir())),
        ("CACHE_DIR".to_string(), path(settings.cache_dir())),
        ("HF_CACHE".to_string(), path(settings.hf_cache_dir())),
        ("NLTK_CACHE".to_string(), path(settings.nltk_cache_dir())),
        ("MODEL".to_string(), settings.preparation.model.clone()),
        ("WORKING_DIR".to_string(), path(settings.working_dir())),
    ])
}

/// Replace every `{{KEY}}` with its value. Unknown keys stay as written.
pub fn render_descriptor(template: &str, values: &BTreeMap<String, String>) -> RenderedDescriptor {
    let mut unknown = Vec::new();
    let text = PLACEHOLDER
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => {
                if !unknown.iter().any(|u| u == &caps[1]) {
                    unknown.push(caps[1].to_string());
                }
                caps[0].to_string()
            }
        })
        .into_owned();
    RenderedDescriptor { text, unknown }
}

/// Render the configured template and write it next to the working tree.
///
/// Returns the path of the written descriptor.
pub fn write_descriptor(settings: &Settings) -> SchedulerResult<PathBuf> {
    let template_path = settings.descriptor_template_path();
    let template = fs::read_to_string(&template_path).map_err(|source| {
        SchedulerError::Descriptor {
            path: template_path.clone(),
            source,
        }
    })?;

    let rendered = render_descriptor(&template, &descriptor_values(settings));
    if !rendered.unknown.is_empty() {
        tracing::warn!(
            "Descriptor template has unfilled placeholders: {}",
            rendered.unknown.join(", ")
        );
    }

    let out_path = settings.rendered_descriptor_path();
    fs::write(&out_path, rendered.text).map_err(|source| SchedulerError::Descriptor {
        path: out_path.clone(),
        source,
    })?;

    tracing::debug!("Wrote job descriptor {}", out_path.display());
    Ok(out_path)
}
