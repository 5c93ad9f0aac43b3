//! What a conversion keeps, drops and decides.
//!
//! Lossy directions are not errors; they are reported here so a caller can
//! decide whether to accept them (the CLI refuses unless `--allow-lossy`).

use serde::Serialize;
use std::fmt;

/// Counts and issues for one `from -> to` conversion.
///
/// Serializes to the JSON printed by `annoconv convert --report json`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    pub from: String,
    pub to: String,
    /// What was decoded.
    pub input: ConversionCounts,
    /// What the target format will hold.
    pub output: ConversionCounts,
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    pub fn warning_count(&self) -> usize {
        self.with_severity(ConversionSeverity::Warning).count()
    }

    pub fn info_count(&self) -> usize {
        self.with_severity(ConversionSeverity::Info).count()
    }

    /// Any warning means the target cannot hold everything the source had.
    pub fn is_lossy(&self) -> bool {
        self.with_severity(ConversionSeverity::Warning).next().is_some()
    }

    pub fn has(&self, code: ConversionIssueCode) -> bool {
        self.issues.iter().any(|issue| issue.code == code)
    }

    /// Messages of the warnings, in the order they were added.
    pub fn lossy_messages(&self) -> impl Iterator<Item = &str> {
        self.with_severity(ConversionSeverity::Warning)
            .map(|issue| issue.message.as_str())
    }

    fn with_severity(
        &self,
        severity: ConversionSeverity,
    ) -> impl Iterator<Item = &ConversionIssue> {
        self.issues.iter().filter(move |issue| issue.severity == severity)
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Converted {} -> {}", self.from, self.to)?;
        writeln!(f, "  input:  {}", self.input)?;
        if self.output != self.input {
            writeln!(f, "  output: {}", self.output)?;
        }

        let sections = [
            ("Warnings", ConversionSeverity::Warning),
            ("Notes", ConversionSeverity::Info),
        ];
        for (title, severity) in sections {
            let issues: Vec<_> = self.with_severity(severity).collect();
            if issues.is_empty() {
                continue;
            }
            write!(f, "\n{title} ({}):\n", issues.len())?;
            for issue in issues {
                writeln!(f, "  - {}", issue.message)?;
            }
        }
        Ok(())
    }
}

/// Image, category and annotation totals.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounts {
    pub images: usize,
    pub categories: usize,
    pub annotations: usize,
}

impl fmt::Display for ConversionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} image(s), {} category(ies), {} annotation(s)",
            self.images, self.categories, self.annotations
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    /// Information the target will drop.
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self::with(ConversionSeverity::Warning, code, message)
    }

    /// A policy the conversion applied; never blocks.
    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self::with(ConversionSeverity::Info, code, message)
    }

    fn with(
        severity: ConversionSeverity,
        code: ConversionIssueCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    Warning,
    Info,
}

/// Machine-readable issue codes, serialized in snake_case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    /// Category identity collapses; the target carries no category.
    DropCategories,
    DropSupercategories,
    DropFileNames,
    /// `iscrowd` flags are dropped.
    DropCrowdFlags,
    /// Registered categories no annotation uses cannot be written per image.
    DropUnusedCategories,

    /// Every decoded box was filed under the synthetic category.
    SyntheticCategory,
    CategoryIdsByFirstSeen,
    /// COCO category ids were kept where the registry allowed.
    CocoCategoryIdAdoption,
    AreaRecomputed,
    AnnotationIdsRenumbered,
    ImageIdsAssigned,
}
