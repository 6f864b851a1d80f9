//! Non-fatal checks over a loaded module list.
use std::collections::HashMap;
use std::path::Path;

use crate::build::Module;
use crate::directives::Markers;

/// A validation warning detected during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The configuration area (e.g., "modules", "global").
    pub source: String,
    /// The specific item that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Trait for configuration validators.
pub trait ConfigValidator {
    /// Validate the configuration and return any warnings found.
    fn validate(&self) -> Vec<ValidationWarning>;

    /// Return a human-readable name for this validator (e.g., "modules").
    fn name(&self) -> &'static str;
}

/// Validator for the module list.
#[derive(Debug)]
pub struct ModuleValidator<'a> {
    modules: &'a [Module],
}

impl<'a> ModuleValidator<'a> {
    /// Validate `modules`.
    #[must_use]
    pub const fn new(modules: &'a [Module]) -> Self {
        Self { modules }
    }
}

impl ConfigValidator for ModuleValidator<'_> {
    fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let mut first_use: HashMap<&Path, usize> = HashMap::new();

        for (i, module) in self.modules.iter().enumerate() {
            let item = format!("module #{} ({})", i + 1, module.source.display());

            if let Some(first) = first_use.insert(&module.source, i) {
                warnings.push(ValidationWarning::new(
                    self.name(),
                    &item,
                    format!("source is also used by module #{}", first + 1),
                ));
            }

            for (j, other) in self.modules.iter().enumerate() {
                if module.target.starts_with(&other.source) {
                    warnings.push(ValidationWarning::new(
                        self.name(),
                        &item,
                        format!(
                            "target {} lies inside the source of module #{}",
                            module.target.display(),
                            j + 1
                        ),
                    ));
                }
            }
        }

        warnings
    }

    fn name(&self) -> &'static str {
        "modules"
    }
}

/// Validator for marker file names.
#[derive(Debug)]
pub struct MarkerValidator<'a> {
    markers: &'a Markers,
}

impl<'a> MarkerValidator<'a> {
    /// Validate `markers`.
    #[must_use]
    pub const fn new(markers: &'a Markers) -> Self {
        Self { markers }
    }
}

impl ConfigValidator for MarkerValidator<'_> {
    fn validate(&self) -> Vec<ValidationWarning> {
        [&self.markers.linkthis, &self.markers.linkthese]
            .into_iter()
            .filter(|name| !name.starts_with('.'))
            .map(|name| {
                ValidationWarning::new(
                    self.name(),
                    name.as_str(),
                    "marker file name is not hidden; it will look like module content",
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "global"
    }
}

/// Run all validators against a loaded configuration.
#[must_use]
pub fn validate_all(config: &super::Config) -> Vec<ValidationWarning> {
    let validators: Vec<Box<dyn ConfigValidator + '_>> = vec![
        Box::new(MarkerValidator::new(&config.markers)),
        Box::new(ModuleValidator::new(&config.modules)),
    ];

    let mut all_warnings = Vec::new();
    for validator in validators {
        all_warnings.extend(validator.validate());
    }

    all_warnings
}
