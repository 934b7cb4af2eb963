//! Report composition: classification records + summary statistics + fixed
//! guidance text, assembled into a renderer-agnostic document model.
//!
//! Everything here is pure. Image bytes are carried through untouched; decoding
//! and embedding belong to the renderer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{classify, ClassificationRecord, Priority, Rgb, SeverityTier};
use crate::imaging::decode_base64_payload;

/// Probability above which a scan counts as a positive finding.
pub const POSITIVE_THRESHOLD: f64 = 0.5;
/// Positive findings above this probability count as critical risk.
pub const CRITICAL_THRESHOLD: f64 = 0.85;
/// Positive findings above this probability (and not critical) count as high risk.
pub const HIGH_THRESHOLD: f64 = 0.70;
const REVIEW_THRESHOLD: f64 = 0.55;

pub const REPORT_TITLE: &str = "COMPREHENSIVE BRAIN TUMOR ANALYSIS REPORT";
pub const REPORT_SUBTITLE: &str =
    "AI-Powered Neuro-Imaging Analysis | Deep Learning Detection with Multi-Class Tumor Classification";
const ANALYSIS_SYSTEM: &str = "AI Deep Learning System (VGG16 CNN)";

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl PatientInfo {
    pub fn display_name(&self) -> &str {
        non_blank(self.name.as_deref()).unwrap_or("N/A")
    }

    pub fn display_email(&self) -> &str {
        non_blank(self.email.as_deref()).unwrap_or("N/A")
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Encoded image bytes for a scan, or the reason they could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Bytes(Vec<u8>),
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct ReportItem {
    pub probability: f64,
    /// Drives record selection; normally the submitted base64 payload verbatim.
    pub identifier: String,
    pub image: ImageSource,
}

impl ReportItem {
    /// Build an item from a submitted base64 / data-URL payload. A payload that
    /// does not decode still yields an item; the renderer shows a placeholder.
    pub fn from_payload(probability: f64, payload: String) -> Self {
        let image = match decode_base64_payload(&payload) {
            Ok(bytes) => ImageSource::Bytes(bytes),
            Err(e) => ImageSource::Invalid(e.to_string()),
        };
        Self {
            probability,
            identifier: payload,
            image,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReportError {
    #[error("predictions.image has {images} entries but predictions.result has {results}")]
    LengthMismatch { images: usize, results: usize },

    #[error("predictions.result[{index}] = {value} is not a probability in [0, 1]")]
    Probability { index: usize, value: f64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Predictions {
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub result: Vec<f64>,
}

/// Body of a report request: `{user:{name,email}, predictions:{image,result}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub user: PatientInfo,
    #[serde(default)]
    pub predictions: Predictions,
}

impl ReportRequest {
    /// Pair images with probabilities, rejecting mismatched or out-of-range input.
    pub fn into_items(self) -> Result<(PatientInfo, Vec<ReportItem>), ReportError> {
        let Predictions { image, result } = self.predictions;
        if image.len() != result.len() {
            return Err(ReportError::LengthMismatch {
                images: image.len(),
                results: result.len(),
            });
        }
        if let Some((index, &value)) = result
            .iter()
            .enumerate()
            .find(|(_, p)| !(p.is_finite() && (0.0..=1.0).contains(*p)))
        {
            return Err(ReportError::Probability { index, value });
        }
        let items = result
            .into_iter()
            .zip(image)
            .map(|(p, payload)| ReportItem::from_payload(p, payload))
            .collect();
        Ok((self.user, items))
    }
}

// ---------------------------------------------------------------------------
// Sections and summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScanStatus {
    CriticalHigh,
    ModerateHigh,
    LowModerate,
    RequiresReview,
    Negative,
}

impl ScanStatus {
    pub fn for_probability(probability: f64) -> Self {
        if probability > CRITICAL_THRESHOLD {
            Self::CriticalHigh
        } else if probability > HIGH_THRESHOLD {
            Self::ModerateHigh
        } else if probability > REVIEW_THRESHOLD {
            Self::LowModerate
        } else if probability > POSITIVE_THRESHOLD {
            Self::RequiresReview
        } else {
            Self::Negative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CriticalHigh => "POSITIVE - CRITICAL/HIGH RISK",
            Self::ModerateHigh => "POSITIVE - MODERATE-HIGH RISK",
            Self::LowModerate => "POSITIVE - LOW-MODERATE RISK",
            Self::RequiresReview => "POSITIVE - REQUIRES REVIEW",
            Self::Negative => "NEGATIVE - NO TUMOR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportSection {
    /// 1-based position in the submitted batch.
    pub index: usize,
    pub probability: f64,
    pub record: &'static ClassificationRecord,
    /// Percentage confidence in the reported outcome.
    pub confidence: f64,
    pub is_positive: bool,
    pub status: ScanStatus,
    pub image: ImageSource,
}

impl ReportSection {
    pub fn confidence_text(&self) -> String {
        format!("{:.2}%", self.confidence)
    }

    /// Text shown in place of the scan when its image cannot be embedded.
    pub fn placeholder_text(&self) -> String {
        format!(
            "Image {}: Error processing image. Classification: {}",
            self.index, self.record.label
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    pub label: &'static str,
    pub count: usize,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub critical: usize,
    pub high: usize,
    /// Positive findings per severity tier.
    pub tier_counts: BTreeMap<SeverityTier, usize>,
    /// Positive findings per label, most frequent first, ties in first-seen order.
    pub labels: Vec<LabelCount>,
}

impl ReportSummary {
    fn record(&mut self, section: &ReportSection) {
        self.total += 1;
        if !section.is_positive {
            self.negative += 1;
            return;
        }
        self.positive += 1;
        if section.probability > CRITICAL_THRESHOLD {
            self.critical += 1;
        } else if section.probability > HIGH_THRESHOLD {
            self.high += 1;
        }
        *self
            .tier_counts
            .entry(section.record.severity_tier)
            .or_insert(0) += 1;
        match self.labels.iter_mut().find(|l| l.label == section.record.label) {
            Some(entry) => entry.count += 1,
            None => self.labels.push(LabelCount {
                label: section.record.label,
                count: 1,
                priority: section.record.priority,
            }),
        }
    }

    fn finish(&mut self) {
        // stable: equal counts keep first-seen order
        self.labels.sort_by(|a, b| b.count.cmp(&a.count));
    }

    /// `count` as a percentage of all scans; 0 for an empty batch.
    pub fn percent(&self, count: usize) -> f64 {
        ratio(count, self.total)
    }

    /// `count` as a percentage of positive scans; 0 when there are none.
    pub fn positive_percent(&self, count: usize) -> f64 {
        ratio(count, self.positive)
    }

    pub fn tier_count(&self, tier: SeverityTier) -> usize {
        self.tier_counts.get(&tier).copied().unwrap_or(0)
    }
}

fn ratio(count: usize, of: usize) -> f64 {
    if of == 0 {
        0.0
    } else {
        count as f64 / of as f64 * 100.0
    }
}

fn section_for(index: usize, item: &ReportItem) -> ReportSection {
    let record = classify(item.probability, &item.identifier);
    let is_positive = item.probability > POSITIVE_THRESHOLD;
    let confidence = if is_positive {
        item.probability * 100.0
    } else {
        (1.0 - item.probability) * 100.0
    };
    ReportSection {
        index: index + 1,
        probability: item.probability,
        record,
        confidence,
        is_positive,
        status: ScanStatus::for_probability(item.probability),
        image: item.image.clone(),
    }
}

/// Classify every item and aggregate the batch statistics.
pub fn analyze(items: &[ReportItem]) -> (Vec<ReportSection>, ReportSummary) {
    let mut summary = ReportSummary::default();
    let sections: Vec<ReportSection> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let section = section_for(i, item);
            summary.record(&section);
            section
        })
        .collect();
    summary.finish();
    (sections, summary)
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Text,
    Bullet,
    Gap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelLine {
    pub kind: LineKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading(String),
    Subheading(String),
    /// Two-column field/value table.
    KeyValue(Vec<(String, String)>),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Index into [`RenderableDocument::sections`].
    Scan(usize),
    /// Boxed block of styled lines.
    Panel {
        accent: Rgb,
        lines: Vec<PanelLine>,
    },
    Footer(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct RenderableDocument {
    pub title: String,
    pub subtitle: String,
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub patient: PatientInfo,
    pub sections: Vec<ReportSection>,
    pub summary: ReportSummary,
    pub blocks: Vec<Block>,
}

impl RenderableDocument {
    /// Download name, restricted to `[A-Za-z0-9_-]` before the extension.
    pub fn filename(&self) -> String {
        let name = non_blank(self.patient.name.as_deref()).unwrap_or("Patient");
        let stem: String = name
            .chars()
            .map(|c| match c {
                ' ' => '_',
                c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => c,
                _ => '_',
            })
            .collect();
        format!(
            "Comprehensive_Brain_Tumor_Report_{}_{}.pdf",
            stem,
            self.generated_at.timestamp()
        )
    }
}

/// Assemble the full report for a batch of scans.
pub fn compose_report(
    patient: &PatientInfo,
    items: &[ReportItem],
    generated_at: DateTime<Utc>,
) -> RenderableDocument {
    let (sections, summary) = analyze(items);
    let report_id = format!("RPT-BT-{}", generated_at.timestamp());

    let mut blocks = Vec::new();

    blocks.push(Block::Heading("PATIENT & REPORT INFORMATION".into()));
    blocks.push(Block::KeyValue(vec![
        kv("Patient Name:", patient.display_name()),
        kv("Patient Contact:", patient.display_email()),
        kv(
            "Report Generation Date:",
            &generated_at.format("%B %d, %Y").to_string(),
        ),
        kv(
            "Report Generation Time:",
            &generated_at.format("%I:%M %p UTC").to_string(),
        ),
        kv("Report Identifier:", &report_id),
        kv("Analysis System:", ANALYSIS_SYSTEM),
        kv("Images Analyzed:", &items.len().to_string()),
    ]));

    blocks.push(Block::Heading("DETAILED NEURO-IMAGING ANALYSIS RESULTS".into()));
    blocks.extend((0..sections.len()).map(Block::Scan));

    blocks.push(Block::Heading(
        "COMPREHENSIVE SUMMARY & STATISTICAL ANALYSIS".into(),
    ));
    blocks.push(summary_table(&summary));
    blocks.push(Block::Subheading("Positive Findings by Severity Tier".into()));
    blocks.push(tier_table(&summary));

    if summary.positive > 0 {
        blocks.push(Block::Subheading(
            "Detected Tumor Types Distribution & Classification".into(),
        ));
        blocks.push(distribution_table(&summary));

        blocks.push(Block::Heading("CLINICAL RECOMMENDATIONS & NEXT STEPS".into()));
        blocks.push(panel(Rgb(255, 165, 0), RECOMMENDATIONS));
    }

    blocks.push(Block::Heading(
        "BRAIN TUMOR CLASSIFICATION REFERENCE GUIDE".into(),
    ));
    blocks.push(panel(Rgb(0, 0, 255), REFERENCE_GUIDE));

    blocks.push(Block::Heading("CRITICAL MEDICAL & LEGAL DISCLAIMER".into()));
    blocks.push(panel(Rgb(255, 0, 0), DISCLAIMER));

    blocks.push(Block::Footer(vec![
        "Brain Tumor Detection & Multi-Class Classification System".into(),
        format!(
            "Report Generated: {}",
            generated_at.format("%B %d, %Y at %I:%M %p UTC")
        ),
        "Binary Detection: deep learning model | Multi-Class Classification: Research Mode".into(),
        "CONFIDENTIAL MEDICAL DOCUMENT - For Authorized Healthcare Professional Use Only".into(),
        "AI-Assisted Analysis - Requires Professional Medical Interpretation & Correlation".into(),
        "Tumor Type Classification Requires Histopathological Confirmation".into(),
    ]));

    RenderableDocument {
        title: REPORT_TITLE.into(),
        subtitle: REPORT_SUBTITLE.into(),
        report_id,
        generated_at,
        patient: patient.clone(),
        sections,
        summary,
        blocks,
    }
}

fn kv(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn pct(value: f64) -> String {
    format!("{value:.1}%")
}

fn summary_table(summary: &ReportSummary) -> Block {
    let row = |metric: &str, count: usize, significance: &str| {
        vec![
            metric.to_string(),
            count.to_string(),
            pct(summary.percent(count)),
            significance.to_string(),
        ]
    };
    Block::Table {
        header: ["Metric", "Count", "Percentage", "Clinical Significance"]
            .map(String::from)
            .to_vec(),
        rows: vec![
            row("Total Scans Analyzed", summary.total, "Complete dataset"),
            row("Positive Findings (Tumor)", summary.positive, "Requires intervention"),
            row("Critical Risk Cases", summary.critical, "Urgent attention needed"),
            row("High Risk Cases", summary.high, "Prompt evaluation needed"),
            row("Negative Findings (Normal)", summary.negative, "Continue monitoring"),
        ],
    }
}

fn tier_table(summary: &ReportSummary) -> Block {
    Block::Table {
        header: ["Severity Tier", "Cases", "Percentage"]
            .map(String::from)
            .to_vec(),
        rows: SeverityTier::ALL
            .iter()
            .filter(|t| **t != SeverityTier::Normal)
            .map(|tier| {
                let count = summary.tier_count(*tier);
                vec![
                    tier.as_str().to_string(),
                    count.to_string(),
                    pct(summary.positive_percent(count)),
                ]
            })
            .collect(),
    }
}

fn distribution_table(summary: &ReportSummary) -> Block {
    Block::Table {
        header: ["Tumor Classification", "Cases", "Percentage", "Priority Level"]
            .map(String::from)
            .to_vec(),
        rows: summary
            .labels
            .iter()
            .map(|l| {
                vec![
                    l.label.to_string(),
                    l.count.to_string(),
                    pct(summary.positive_percent(l.count)),
                    l.priority.as_str().to_string(),
                ]
            })
            .collect(),
    }
}

fn panel(accent: Rgb, lines: &[(LineKind, &str)]) -> Block {
    Block::Panel {
        accent,
        lines: lines
            .iter()
            .map(|(kind, text)| PanelLine {
                kind: *kind,
                text: text.to_string(),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Fixed text
// ---------------------------------------------------------------------------

use LineKind::{Bullet as B, Gap as G, Heading as H, Text as T};

const RECOMMENDATIONS: &[(LineKind, &str)] = &[
    (H, "Based on AI analysis indicating tumor detection, the following medical actions are STRONGLY RECOMMENDED:"),
    (G, ""),
    (H, "IMMEDIATE PRIORITY ACTIONS (Within 24-48 Hours):"),
    (T, "1. Specialist Consultation: Schedule urgent appointment with board-certified neurologist or neuro-oncologist"),
    (T, "2. Comprehensive Imaging: MRI with gadolinium contrast, diffusion-weighted imaging (DWI), and MR spectroscopy"),
    (T, "3. Radiological Review: Have all imaging reviewed by certified neuroradiologist"),
    (T, "4. Multidisciplinary Conference: Present case to neurosurgery/neuro-oncology tumor board"),
    (G, ""),
    (H, "DIAGNOSTIC WORKUP:"),
    (T, "5. Advanced Imaging: Consider PET scan, CT perfusion, or functional MRI based on tumor location"),
    (T, "6. Tissue Diagnosis: Stereotactic or open biopsy for histopathological confirmation and molecular testing"),
    (T, "7. Baseline Studies: Complete neurological examination, cognitive assessment, visual field testing"),
    (T, "8. Laboratory Tests: Complete blood count, metabolic panel, endocrine function tests if indicated"),
    (G, ""),
    (H, "TREATMENT PLANNING:"),
    (T, "9. Neurosurgical Evaluation: Assess feasibility and risks of surgical resection"),
    (T, "10. Radiation Oncology: Consultation for adjuvant or primary radiation therapy options"),
    (T, "11. Medical Oncology: Evaluate chemotherapy, targeted therapy, or immunotherapy options"),
    (T, "12. Clinical Trials: Investigate eligibility for cutting-edge treatment protocols"),
    (G, ""),
    (H, "SUPPORTIVE CARE:"),
    (T, "13. Symptom Management: Anti-epileptic drugs if seizures, corticosteroids for edema"),
    (T, "14. Rehabilitation Services: Physical, occupational, and speech therapy as needed"),
    (T, "15. Psychosocial Support: Counseling, support groups, palliative care consultation"),
    (T, "16. Care Coordination: Assign nurse navigator or case manager"),
    (G, ""),
    (H, "SEEK EMERGENCY CARE IMMEDIATELY IF EXPERIENCING:"),
    (B, "Sudden severe headache (\"worst headache of life\")"),
    (B, "New onset seizures or status epilepticus"),
    (B, "Acute vision loss or double vision"),
    (B, "Sudden weakness, numbness, or paralysis"),
    (B, "Severe confusion, disorientation, or altered consciousness"),
    (B, "Difficulty speaking, understanding, or swallowing"),
    (B, "Loss of balance, coordination, or inability to walk"),
    (B, "Persistent vomiting with signs of increased intracranial pressure"),
    (G, ""),
    (H, "FOLLOW-UP MONITORING:"),
    (B, "Post-treatment MRI scans every 2-3 months initially, then per protocol"),
    (B, "Regular clinical examinations and symptom assessments"),
    (B, "Quality of life and functional status monitoring"),
    (B, "Long-term survivorship care planning"),
    (G, ""),
    (T, "IMPORTANT NOTE: Early detection and prompt, aggressive treatment significantly improve outcomes for most brain tumor types. Do not delay seeking comprehensive neurosurgical evaluation."),
];

const REFERENCE_GUIDE: &[(LineKind, &str)] = &[
    (H, "Understanding Brain Tumor Types:"),
    (T, "PRIMARY BRAIN TUMORS originate within the brain tissue itself."),
    (G, ""),
    (H, "1. Gliomas (40-50% of primary brain tumors):"),
    (B, "Glioblastoma (Grade IV): Most aggressive, median survival 12-18 months with treatment"),
    (B, "Anaplastic Astrocytoma (Grade III): Malignant, median survival 2-5 years"),
    (B, "Astrocytoma (Grade II): Slow-growing, median survival 5-10+ years"),
    (B, "Oligodendroglioma: Often chemosensitive, median survival 10-15+ years"),
    (B, "Ependymoma: Arises from ventricle lining, better prognosis with complete resection"),
    (G, ""),
    (H, "2. Meningiomas (35-40% of primary brain tumors):"),
    (B, "Grade I: Benign, >90% cure rate with complete removal"),
    (B, "Grade II (Atypical): 30-40% recurrence rate at 10 years"),
    (B, "Grade III (Malignant): Aggressive, higher recurrence risk"),
    (G, ""),
    (H, "3. Pituitary Tumors (10-15% of primary tumors):"),
    (B, "Usually benign adenomas"),
    (B, "Can be functioning (hormone-secreting) or non-functioning"),
    (B, "Excellent prognosis with appropriate treatment"),
    (G, ""),
    (H, "4. Other Types:"),
    (B, "Schwannomas: Benign nerve sheath tumors (acoustic neuroma most common)"),
    (B, "Craniopharyngiomas: Benign but challenging due to location"),
    (B, "Pineal region tumors: Various types, prognosis depends on histology"),
    (G, ""),
    (H, "GRADING SYSTEM (WHO Classification):"),
    (B, "Grade I: Least malignant, best prognosis, often curable with surgery"),
    (B, "Grade II: Low-grade but infiltrative, can progress to higher grades"),
    (B, "Grade III: Malignant, anaplastic features, active treatment required"),
    (B, "Grade IV: Most malignant, aggressive growth, intensive treatment needed"),
    (G, ""),
    (H, "MOLECULAR MARKERS (important for prognosis and treatment):"),
    (B, "IDH mutation: Better prognosis in gliomas"),
    (B, "1p/19q codeletion: Chemosensitive oligodendrogliomas"),
    (B, "MGMT methylation: Better response to chemotherapy in glioblastoma"),
    (B, "BRAF mutation: Targeted therapy available"),
    (G, ""),
    (H, "NOTE: This AI classification is preliminary. Definitive tumor typing requires:"),
    (B, "Histopathological examination (biopsy/surgical specimen)"),
    (B, "Immunohistochemistry studies"),
    (B, "Molecular genetic profiling"),
    (B, "Integration with clinical and radiological findings"),
];

const DISCLAIMER: &[(LineKind, &str)] = &[
    (H, "PLEASE READ THIS DISCLAIMER CAREFULLY - IMPORTANT LEGAL NOTICE:"),
    (G, ""),
    (T, "1. AI SYSTEM LIMITATIONS: This report is generated by an artificial intelligence deep learning system. The binary detector estimates tumor presence only; the specific tumor type classification is SIMULATED for demonstration and educational purposes. ACTUAL TUMOR TYPE CAN ONLY BE DEFINITIVELY DETERMINED THROUGH HISTOPATHOLOGICAL EXAMINATION (BIOPSY) BY BOARD-CERTIFIED PATHOLOGISTS."),
    (G, ""),
    (T, "2. NOT A MEDICAL DIAGNOSIS: This AI analysis is a SCREENING TOOL and DECISION SUPPORT SYSTEM only. It is NOT a medical diagnosis, clinical assessment, or treatment recommendation. This report must be interpreted by qualified healthcare professionals with appropriate medical training and clinical context."),
    (G, ""),
    (T, "3. ACCURACY AND ERROR RATES: All medical imaging AI systems have limitations:"),
    (B, "False Positives: System may detect tumors where none exist (imaging artifacts, normal variants)"),
    (B, "False Negatives: System may fail to detect actual tumors (small lesions, unusual presentations)"),
    (B, "Misclassification: Tumor type predictions may be inaccurate without histological confirmation"),
    (B, "Image Quality: Results depend on scan quality, protocol, and patient factors"),
    (G, ""),
    (T, "4. REQUIRED PROFESSIONAL EVALUATION: This report MUST be reviewed by:"),
    (B, "Neuroradiologist: Board-certified specialist in brain imaging interpretation"),
    (B, "Neurologist/Neurosurgeon: For clinical correlation and treatment planning"),
    (B, "Pathologist: For tissue diagnosis and molecular characterization"),
    (B, "Multidisciplinary Team: Tumor board review for complex cases"),
    (G, ""),
    (T, "5. STANDARD OF CARE: This AI system does not replace standard diagnostic procedures including:"),
    (B, "Comprehensive neurological examination"),
    (B, "Multiple imaging modalities (MRI with contrast, CT, PET)"),
    (B, "Tissue biopsy and histopathological analysis"),
    (B, "Molecular genetic testing and biomarker analysis"),
    (B, "Clinical-radiological-pathological correlation"),
    (G, ""),
    (T, "6. NO LIABILITY: The developers, operators, distributors, and all parties associated with this AI system assume ABSOLUTELY NO LIABILITY for:"),
    (B, "Medical decisions or treatments based on this report"),
    (B, "Misdiagnoses, missed diagnoses, or delayed diagnoses"),
    (B, "Any adverse health outcomes or consequences"),
    (B, "Financial, emotional, or other damages"),
    (G, ""),
    (T, "7. USER RESPONSIBILITY: By using this report, you acknowledge and agree that:"),
    (B, "You understand the limitations of AI medical systems"),
    (B, "You will seek appropriate professional medical care"),
    (B, "You will not make medical decisions based solely on this report"),
    (B, "You use this information entirely at your own risk"),
    (G, ""),
    (T, "8. EMERGENCY SITUATIONS: In case of acute neurological symptoms, seizures, or medical emergencies, seek IMMEDIATE emergency medical care. Do not wait for AI analysis or consultations."),
    (G, ""),
    (T, "9. PRIVACY & CONFIDENTIALITY: This report contains protected health information (PHI). Handle according to:"),
    (B, "HIPAA regulations (United States)"),
    (B, "GDPR requirements (European Union)"),
    (B, "Local healthcare privacy laws and regulations"),
    (B, "Institutional data protection policies"),
    (G, ""),
    (T, "10. REGULATORY STATUS: This AI system is for research, education and supplementary screening. It is NOT FDA-approved for clinical diagnosis and NOT a replacement for clinical judgment."),
    (G, ""),
    (T, "11. INFORMED CONSENT: Patients should be informed when AI systems are used in their care and should provide consent for AI-assisted analysis when required by institutional policies."),
    (G, ""),
    (T, "12. SECOND OPINIONS: For any positive findings or concerning results, always seek second opinions from other qualified medical professionals and specialized centers of excellence."),
    (G, ""),
    (H, "BY USING THIS REPORT, YOU ACKNOWLEDGE THAT YOU HAVE READ, FULLY UNDERSTOOD, AND EXPRESSLY AGREED TO ALL TERMS, CONDITIONS, AND LIMITATIONS STATED IN THIS DISCLAIMER. IF YOU DO NOT AGREE, DO NOT USE THIS REPORT FOR ANY PURPOSE."),
];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(p: f64, id: &str) -> ReportItem {
        ReportItem {
            probability: p,
            identifier: id.to_string(),
            image: ImageSource::Bytes(vec![1, 2, 3]),
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap()
    }

    #[test]
    fn test_two_item_batch() {
        let items = [item(0.92, "imgA"), item(0.30, "imgB")];
        let doc = compose_report(&PatientInfo::default(), &items, at());
        let s = &doc.summary;
        assert_eq!((s.total, s.positive, s.negative, s.critical, s.high), (2, 1, 1, 1, 0));
        assert!(doc.sections[0].is_positive);
        assert!((doc.sections[0].confidence - 92.0).abs() < 1e-9);
        assert!(!doc.sections[1].is_positive);
        assert!((doc.sections[1].confidence - 70.0).abs() < 1e-9);
        assert_eq!(doc.sections[0].status, ScanStatus::CriticalHigh);
        assert_eq!(doc.sections[1].status, ScanStatus::Negative);
        assert_eq!(doc.sections[0].index, 1);
        assert_eq!(doc.sections[1].index, 2);
        assert_eq!(s.percent(s.positive), 50.0);
    }

    #[test]
    fn test_empty_batch_zero_fills() {
        let doc = compose_report(&PatientInfo::default(), &[], at());
        let s = &doc.summary;
        assert_eq!(s.total, 0);
        assert_eq!(s.percent(s.positive), 0.0);
        assert_eq!(s.percent(s.total), 0.0);
        assert_eq!(s.positive_percent(0), 0.0);
        assert!(s.labels.is_empty());
        // No recommendations or distribution without positives.
        assert!(!doc
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Heading(h) if h.contains("RECOMMENDATIONS"))));
    }

    #[test]
    fn test_high_and_critical_are_exclusive() {
        let items = [item(0.75, "a"), item(0.85, "b"), item(0.86, "c"), item(0.60, "d")];
        let (_, s) = analyze(&items);
        assert_eq!(s.critical, 1);
        assert_eq!(s.high, 2);
        assert_eq!(s.positive, 4);
    }

    #[test]
    fn test_boundary_half_is_negative() {
        let (sections, s) = analyze(&[item(0.5, "x")]);
        assert!(!sections[0].is_positive);
        assert!((sections[0].confidence - 50.0).abs() < 1e-9);
        assert_eq!(s.negative, 1);
        assert!(s.tier_counts.is_empty());
    }

    #[test]
    fn test_label_histogram_sorted_with_stable_ties() {
        // Same identifier in the same bucket always resolves to the same label.
        let items = [
            item(0.90, ""),
            item(0.53, "q"),
            item(0.53, "r"),
            item(0.90, ""),
            item(0.90, ""),
            item(0.20, "n"),
        ];
        let (_, s) = analyze(&items);
        assert_eq!(s.labels.len(), 2);
        assert_eq!(s.labels[0].label, "Glioblastoma (Grade IV Glioma)");
        assert_eq!(s.labels[0].count, 3);
        assert_eq!(s.labels[0].priority, Priority::Urgent);
        assert_eq!(s.labels[1].label, "Abnormal Growth - Indeterminate Type");
        assert_eq!(s.labels[1].count, 2);
        assert_eq!(s.tier_count(SeverityTier::Critical), 3);
        assert_eq!(s.tier_count(SeverityTier::Uncertain), 2);
        assert_eq!(s.tier_count(SeverityTier::Normal), 0);

        let tied = [item(0.53, "q"), item(0.90, "")];
        let (_, s) = analyze(&tied);
        assert_eq!(s.labels[0].label, "Abnormal Growth - Indeterminate Type");
    }

    #[test]
    fn test_prefix_collision_yields_same_record() {
        let a = [item(0.60, &"x".repeat(150))];
        let b = [item(0.60, &format!("{}DIFFERENT_TAIL", "x".repeat(100)))];
        let (sa, _) = analyze(&a);
        let (sb, _) = analyze(&b);
        assert_eq!(sa[0].record, sb[0].record);
        assert_eq!(sa[0].record.severity_tier, sb[0].record.severity_tier);
    }

    #[test]
    fn test_document_blocks_in_order() {
        let items = [item(0.92, "imgA"), item(0.30, "imgB"), item(0.6, "imgC")];
        let patient = PatientInfo {
            name: Some("Jane Q Doe".into()),
            email: Some("jane@example.com".into()),
        };
        let doc = compose_report(&patient, &items, at());
        assert_eq!(doc.report_id, format!("RPT-BT-{}", at().timestamp()));

        let scans: Vec<usize> = doc
            .blocks
            .iter()
            .filter_map(|b| match b {
                Block::Scan(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert_eq!(scans, vec![0, 1, 2]);

        let Some(Block::KeyValue(rows)) = doc.blocks.get(1) else {
            panic!("patient table missing");
        };
        assert_eq!(rows[0].1, "Jane Q Doe");
        assert_eq!(rows[1].1, "jane@example.com");
        assert_eq!(rows[2].1, "March 05, 2024");
        assert_eq!(rows[3].1, "02:07 PM UTC");
        assert_eq!(rows[6].1, "3");

        assert!(doc
            .blocks
            .iter()
            .any(|b| matches!(b, Block::Heading(h) if h.contains("RECOMMENDATIONS"))));
        assert!(matches!(doc.blocks.last(), Some(Block::Footer(_))));
    }

    #[test]
    fn test_patient_defaults_and_filename() {
        let p = PatientInfo {
            name: Some("  ".into()),
            email: None,
        };
        assert_eq!(p.display_name(), "N/A");
        assert_eq!(p.display_email(), "N/A");

        let doc = compose_report(&p, &[], at());
        assert_eq!(
            doc.filename(),
            format!("Comprehensive_Brain_Tumor_Report_Patient_{}.pdf", at().timestamp())
        );

        let named = PatientInfo {
            name: Some("Ana \"O'Neil\"\r\n".into()),
            email: None,
        };
        let doc = compose_report(&named, &[], at());
        let f = doc.filename();
        assert!(f.starts_with("Comprehensive_Brain_Tumor_Report_Ana__O_Neil__"));
        assert!(f
            .trim_end_matches(".pdf")
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_request_validation() {
        let req = ReportRequest {
            user: PatientInfo::default(),
            predictions: Predictions {
                image: vec!["a".into()],
                result: vec![0.2, 0.4],
            },
        };
        assert_eq!(
            req.into_items().unwrap_err(),
            ReportError::LengthMismatch { images: 1, results: 2 }
        );

        let req = ReportRequest {
            user: PatientInfo::default(),
            predictions: Predictions {
                image: vec!["a".into(), "b".into()],
                result: vec![0.2, 1.5],
            },
        };
        assert!(matches!(
            req.into_items(),
            Err(ReportError::Probability { index: 1, .. })
        ));
    }

    #[test]
    fn test_request_items_keep_raw_identifier() {
        let payload = "data:image/png;base64,@@@".to_string();
        let req: ReportRequest = serde_json::from_value(serde_json::json!({
            "user": {"name": "A"},
            "predictions": {"image": [payload], "result": [0.7]}
        }))
        .unwrap();
        let (patient, items) = req.into_items().unwrap();
        assert_eq!(patient.display_name(), "A");
        assert_eq!(items[0].identifier, payload);
        assert!(matches!(items[0].image, ImageSource::Invalid(_)));
    }

    #[test]
    fn test_placeholder_keeps_label() {
        let (sections, _) = analyze(&[item(0.92, "")]);
        assert_eq!(
            sections[0].placeholder_text(),
            "Image 1: Error processing image. Classification: Glioblastoma (Grade IV Glioma)"
        );
    }
}
