//! Label schema: which categories exist and how many values each may take.

use serde::{Deserialize, Serialize};

use super::labels::{LabelDocument, LabelMap};

/// One selectable value of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Keyboard shortcut that toggles this option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<String>,
}

impl LabelOption {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            shortcut: None,
        }
    }
}

/// A classification category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub options: Vec<LabelOption>,
    /// Allow several values at once (otherwise single-select).
    #[serde(default)]
    pub multiple: bool,
    /// Accept values that are not in `options`.
    #[serde(default)]
    pub freeform: bool,
    /// Saving is refused until this category has a value.
    #[serde(default)]
    pub required: bool,
}

impl LabelConfig {
    /// A single-select category with the given options.
    pub fn single(name: &str, options: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            options: options.iter().map(|o| LabelOption::new(o)).collect(),
            multiple: false,
            freeform: false,
            required: false,
        }
    }

    /// A multi-select category with the given options.
    pub fn multiple(name: &str, options: &[&str]) -> Self {
        Self {
            multiple: true,
            ..Self::single(name, options)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Whether `value` may be assigned to this category.
    pub fn accepts(&self, value: &str) -> bool {
        self.freeform || self.options.iter().any(|o| o.name == value)
    }

    /// Toggle `value` in `labels`, honouring the cardinality of this category.
    ///
    /// Single-select categories replace their value (selecting the current
    /// value again clears it); multi-select categories toggle membership while
    /// keeping option order. Returns `false` when the value is not accepted.
    pub fn toggle(&self, labels: &mut LabelMap, value: &str) -> bool {
        if !self.accepts(value) {
            log::debug!("Category '{}' does not accept '{}'", self.name, value);
            return false;
        }
        let current = labels.entry(self.name.clone()).or_default();
        let present = current.iter().any(|v| v == value);

        if !self.multiple {
            current.clear();
            if !present {
                current.push(value.to_string());
            }
        } else if present {
            current.retain(|v| v != value);
        } else {
            current.push(value.to_string());
            let order = |v: &String| {
                self.options
                    .iter()
                    .position(|o| &o.name == v)
                    .unwrap_or(usize::MAX)
            };
            current.sort_by_key(order);
        }

        if current.is_empty() {
            labels.remove(&self.name);
        }
        true
    }
}

/// Which part of the schema a category belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    Image,
    Regions,
}

/// The full label schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub image: Vec<LabelConfig>,
    #[serde(default)]
    pub regions: Vec<LabelConfig>,
}

impl Config {
    pub fn new(image: Vec<LabelConfig>, regions: Vec<LabelConfig>) -> Self {
        Self { image, regions }
    }

    /// Categories in one scope.
    pub fn scope(&self, scope: ConfigScope) -> &[LabelConfig] {
        match scope {
            ConfigScope::Image => &self.image,
            ConfigScope::Regions => &self.regions,
        }
    }

    /// Look up a category by name.
    pub fn find(&self, scope: ConfigScope, name: &str) -> Option<&LabelConfig> {
        self.scope(scope).iter().find(|c| c.name == name)
    }

    /// Region drawing is only enabled when region categories are configured.
    pub fn has_regions(&self) -> bool {
        !self.regions.is_empty()
    }

    /// Required categories that are still empty, image scope first, then
    /// every region of the document.
    pub fn missing_required(&self, doc: &LabelDocument) -> Vec<String> {
        let mut missing: Vec<String> = self
            .image
            .iter()
            .filter(|c| c.required && is_empty_category(&doc.image, &c.name))
            .map(|c| c.name.clone())
            .collect();

        let region_maps = doc
            .boxes
            .iter()
            .map(|r| &r.labels)
            .chain(doc.polygons.iter().map(|r| &r.labels))
            .chain(doc.masks.iter().map(|r| &r.labels));
        for labels in region_maps {
            for c in self.regions.iter().filter(|c| c.required) {
                if is_empty_category(labels, &c.name) && !missing.contains(&c.name) {
                    missing.push(c.name.clone());
                }
            }
        }
        missing
    }
}

fn is_empty_category(labels: &LabelMap, name: &str) -> bool {
    labels.get(name).is_none_or(Vec::is_empty)
}
