use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ValidationWarning;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KpiCategory {
    Financial,
    Esg,
    Other,
}

impl KpiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            KpiCategory::Financial => "financial",
            KpiCategory::Esg => "esg",
            KpiCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "financial" => Ok(KpiCategory::Financial),
            "esg" => Ok(KpiCategory::Esg),
            "other" => Ok(KpiCategory::Other),
            _ => Err(AppError::invalid_argument(
                "KPI category must be financial, esg, or other",
            )
            .with_details(format!("category={s}"))),
        }
    }
}

/// A named, sourced metric. `chunk_ids` point at the fragments that justify `value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kpi {
    pub name: String,
    pub category: KpiCategory,
    pub value: Option<f64>,
    pub unit: String,
    pub year: i32,
    pub description: String,
    pub source: String,
    pub chunk_ids: Vec<u32>,
    #[serde(default)]
    pub notes: String,
}

/// Display shape of a KPI: one flat record per row, chunk ids joined into a single cell.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KpiRow {
    pub name: String,
    pub category: KpiCategory,
    pub value: Option<f64>,
    pub unit: String,
    pub year: i32,
    pub description: String,
    pub source: String,
    pub chunk_ids: String,
    pub notes: String,
}

impl Kpi {
    pub fn to_row(&self) -> KpiRow {
        KpiRow {
            name: self.name.clone(),
            category: self.category,
            value: self.value,
            unit: self.unit.clone(),
            year: self.year,
            description: self.description.clone(),
            source: self.source.clone(),
            chunk_ids: self
                .chunk_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            notes: self.notes.clone(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn kpi(
    name: &str,
    category: KpiCategory,
    value: Option<f64>,
    unit: &str,
    description: &str,
    source: &str,
    chunk_ids: &[u32],
    notes: &str,
) -> Kpi {
    Kpi {
        name: name.to_string(),
        category,
        value,
        unit: unit.to_string(),
        year: 2024,
        description: description.to_string(),
        source: source.to_string(),
        chunk_ids: chunk_ids.to_vec(),
        notes: notes.to_string(),
    }
}

/// FY2024 catalog shipped with the binary. Financial values are placeholders until sourced.
pub fn builtin_kpis() -> Vec<Kpi> {
    vec![
        kpi(
            "Revenue",
            KpiCategory::Financial,
            None,
            "€ bn",
            "Total revenue for FY24.",
            "factset_financials_clean.txt",
            &[0],
            "Replace value and chunk_ids with actual data.",
        ),
        kpi(
            "EBITDA",
            KpiCategory::Financial,
            None,
            "€ bn",
            "EBITDA for FY24.",
            "factset_financials_clean.txt",
            &[0],
            "",
        ),
        kpi(
            "Total GHG emissions (Scope 1+2+3)",
            KpiCategory::Esg,
            Some(4_119_954.0),
            "tCO2e",
            "Total greenhouse gas emissions for FY24 across Scope 1, 2 and 3.",
            "factset_esg_clean.txt",
            &[0],
            "Sum of Scope 1 (116,092), Scope 2 (475,555) and Scope 3 (3,528,307) tCO2e.",
        ),
        kpi(
            "Scope 1 emissions",
            KpiCategory::Esg,
            Some(116_092.0),
            "tCO2e",
            "Direct Scope 1 emissions from owned or controlled sources.",
            "factset_esg_clean.txt",
            &[0],
            "Intensity: 0.9499 tCO2e per EUR million EVIC.",
        ),
        kpi(
            "Scope 2 emissions (market-based)",
            KpiCategory::Esg,
            Some(475_555.0),
            "tCO2e",
            "Scope 2 emissions from purchased energy (market-based).",
            "factset_esg_clean.txt",
            &[0],
            "Intensity: 3.8909 tCO2e per EUR million EVIC.",
        ),
        kpi(
            "Scope 3 emissions",
            KpiCategory::Esg,
            Some(3_528_307.0),
            "tCO2e",
            "Scope 3 value-chain emissions (indirect).",
            "factset_esg_clean.txt",
            &[0],
            "Intensity: 28.8683 tCO2e per EUR million EVIC.",
        ),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiCatalog {
    kpis: Vec<Kpi>,
}

impl KpiCatalog {
    pub fn builtin() -> Self {
        Self {
            kpis: builtin_kpis(),
        }
    }

    pub fn from_kpis(kpis: Vec<Kpi>) -> Self {
        Self { kpis }
    }

    /// Load a catalog from a JSON array of KPI records.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("KPI_CATALOG_FAILED", "Failed to read KPI catalog")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let kpis: Vec<Kpi> = serde_json::from_str(&raw).map_err(|e| {
            AppError::new("KPI_CATALOG_FAILED", "Failed to decode KPI catalog")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Ok(Self { kpis })
    }

    /// KPIs in catalog order, optionally restricted to one category.
    pub fn get(&self, category: Option<KpiCategory>) -> Vec<Kpi> {
        match category {
            None => self.kpis.clone(),
            Some(c) => self.kpis.iter().filter(|k| k.category == c).cloned().collect(),
        }
    }

    pub fn rows(&self, category: Option<KpiCategory>) -> Vec<KpiRow> {
        self.get(category).iter().map(Kpi::to_row).collect()
    }

    pub fn to_csv(&self, category: Option<KpiCategory>) -> Result<String, AppError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for row in self.rows(category) {
            wtr.serialize(&row).map_err(|e| {
                AppError::new("KPI_EXPORT_FAILED", "Failed to encode KPI row")
                    .with_details(format!("name={}; err={}", row.name, e))
            })?;
        }
        let bytes = wtr.into_inner().map_err(|e| {
            AppError::new("KPI_EXPORT_FAILED", "Failed to flush KPI CSV")
                .with_details(e.to_string())
        })?;
        String::from_utf8(bytes).map_err(|e| {
            AppError::new("KPI_EXPORT_FAILED", "KPI CSV was not valid UTF-8")
                .with_details(e.to_string())
        })
    }

    /// Surface provenance gaps without rejecting the catalog.
    ///
    /// When `known_fragment_ids` is given, every referenced chunk id must exist in the corpus.
    pub fn validate(&self, known_fragment_ids: Option<&BTreeSet<u32>>) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for k in &self.kpis {
            if k.name.trim().is_empty() {
                warnings.push(ValidationWarning::new(
                    "KPI_NAME_MISSING",
                    "KPI name is required",
                ));
                continue;
            }
            if k.value.is_none() {
                warnings.push(
                    ValidationWarning::new("KPI_VALUE_MISSING", "KPI has no value yet")
                        .with_details(format!("name={}", k.name)),
                );
            }
            if k.unit.trim().is_empty() {
                warnings.push(
                    ValidationWarning::new("KPI_UNIT_MISSING", "KPI unit is required")
                        .with_details(format!("name={}", k.name)),
                );
            }
            if k.chunk_ids.is_empty() {
                warnings.push(
                    ValidationWarning::new(
                        "KPI_CHUNKS_MISSING",
                        "KPI must reference at least one supporting fragment",
                    )
                    .with_details(format!("name={}", k.name)),
                );
            }
            if let Some(known) = known_fragment_ids {
                for id in &k.chunk_ids {
                    if !known.contains(id) {
                        warnings.push(
                            ValidationWarning::new(
                                "KPI_CHUNK_UNKNOWN",
                                "KPI references a fragment that is not in the corpus",
                            )
                            .with_details(format!("name={}; chunk_id={}", k.name, id)),
                        );
                    }
                }
            }
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(KpiCategory::parse("ESG").unwrap(), KpiCategory::Esg);
        assert_eq!(KpiCategory::parse(" financial ").unwrap(), KpiCategory::Financial);
        assert_eq!(KpiCategory::parse("governance").unwrap_err().code, "INVALID_ARGUMENT");
    }

    #[test]
    fn row_joins_chunk_ids() {
        let mut k = builtin_kpis().remove(3);
        k.chunk_ids = vec![0, 4, 12];
        assert_eq!(k.to_row().chunk_ids, "0, 4, 12");
    }
}
