//! Section prompts for medical-report analysis.
//!
//! Every section of the report is one row of [`SECTIONS`]: a stable key, a
//! display title and the instruction sent to the model together with the
//! composite image. The orchestrator iterates the table, so adding or removing
//! a section is a change to this file only.
//!
//! Each prompt runs independently against the same image; there is no shared
//! conversation state between sections.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One analytical section of the report, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    HealthSummary,
    GlanceParameters,
    PotentialRisks,
    DietRecommendations,
    ConsolidatedGuidance,
    FinalSummary,
}

/// A row of the section table.
#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub section: Section,
    pub title: &'static str,
    pub prompt: &'static str,
}

impl Section {
    /// All sections in display order.
    pub const ALL: [Section; 6] = [
        Section::HealthSummary,
        Section::GlanceParameters,
        Section::PotentialRisks,
        Section::DietRecommendations,
        Section::ConsolidatedGuidance,
        Section::FinalSummary,
    ];

    /// Stable snake_case key used in JSON output and templates.
    pub fn key(self) -> &'static str {
        match self {
            Section::HealthSummary => "health_summary",
            Section::GlanceParameters => "glance_parameters",
            Section::PotentialRisks => "potential_risks",
            Section::DietRecommendations => "diet_recommendations",
            Section::ConsolidatedGuidance => "consolidated_guidance",
            Section::FinalSummary => "final_summary",
        }
    }

    /// Look a section up by its key.
    pub fn from_key(key: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.key() == key)
    }

    pub fn spec(self) -> &'static SectionSpec {
        // SECTIONS is ordered like Section::ALL
        &SECTIONS[self as usize]
    }

    pub fn title(self) -> &'static str {
        self.spec().title
    }

    pub fn prompt(self) -> &'static str {
        self.spec().prompt
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The fixed section table, in display order.
pub static SECTIONS: [SectionSpec; 6] = [
    SectionSpec {
        section: Section::HealthSummary,
        title: "Health Summary",
        prompt: HEALTH_SUMMARY_PROMPT,
    },
    SectionSpec {
        section: Section::GlanceParameters,
        title: "Glance at Important Parameters",
        prompt: GLANCE_PARAMETERS_PROMPT,
    },
    SectionSpec {
        section: Section::PotentialRisks,
        title: "Potential Risks",
        prompt: POTENTIAL_RISKS_PROMPT,
    },
    SectionSpec {
        section: Section::DietRecommendations,
        title: "Diet Do's and Don'ts",
        prompt: DIET_RECOMMENDATIONS_PROMPT,
    },
    SectionSpec {
        section: Section::ConsolidatedGuidance,
        title: "Consolidated Guidance",
        prompt: CONSOLIDATED_GUIDANCE_PROMPT,
    },
    SectionSpec {
        section: Section::FinalSummary,
        title: "Final Summary",
        prompt: FINAL_SUMMARY_PROMPT,
    },
];

pub const HEALTH_SUMMARY_PROMPT: &str = r#"You are going to facilitate the Report Rx tech, an innovative medical report analyzer which has its approach implemented by a dynamic consortium of virtual experts, each serving a distinct role.
Your role will be the Medical Expert (ME), a professional who has all knowledge with respect to the healthcare.. As the ME, you will facilitate the report rx process by following these key stages
HEALTH SUMMARY - Summarize the report findings by:
Highlighting key observations (e.g., normal and abnormal values).
Mentioning overall health implications (e.g., "Overall health is satisfactory, but some parameters indicate potential liver dysfunction and risk of anemia").
Include a general assessment of whether the report suggests any immediate health concerns.
Only mention levels of those parameters in this which seem abnormal. Also instead of this section being the final output it should be the intial summary which comforts the user/patient
Example:Overall, the report indicates satisfactory health. Blood sugar levels and kidney functions are within normal ranges. However, hemoglobin levels (11.2 g/dL, below the reference range of 12-15 g/dL) suggest mild anemia, and SGPT levels (56 IU/L, above the reference range of 7-40 IU/L) point to potential liver stress."#;

pub const GLANCE_PARAMETERS_PROMPT: &str = r#"Glance at Important Parameters - 
List critical health parameters, organizing them by category (e.g., Glucose, Liver Function, Lipid Profile, etc.), and flag those that are abnormal or near-boundary values.
Example:
Glucose: 
Fasting Glucose: 89 mg/dL (Normal)
HbA1c: 5.6% (Normal, but approaching pre-diabetes threshold)
Liver Function:
SGPT (ALT): 56 IU/L (High, above 7-40 IU/L)
SGOT (AST): 42 IU/L (Slightly High, above 10-40 IU/L)
Blood Count:
Hemoglobin: 11.2 g/dL (Low, reference range: 12-15 g/dL)
Lipid Profile:
Total Cholesterol: 230 mg/dL (High, above 200 mg/dL)
Under each test , this should cover all the paramters and if any parameter is abornal it should be mentioned in bold."#;

pub const POTENTIAL_RISKS_PROMPT: &str = r#"POTENTIAL RISKS
This should start with lines like (" since ur report has abnormalities such as mention the abnormals with range ( verbose 1)
Followed by this it should mention thr risks such as if glucose is high then maybe diabetes or if lymphocyte count is high then it may point to any infection somewhere in the body. ( Verbose-2)
After this there should be a nested sub-heading - " WHY ARE U PRONE TO THESE DISEASES "
This subheading should be detailed and should contain the following info -
For each flagged/abmnormal parameter, provide:
Explanation of the Parameter: Explain the role of the parameter in health (e.g., "Hemoglobin is essential for oxygen transport in the blood").
Observed Value and Reference Range: Clearly state the observed value and the normal range.
Health Implications: Explain what deviations mean (e.g., "Low hemoglobin may indicate anemia, possibly due to iron deficiency").
Actions not performed - mention all those actions performed by the patient  / lifestyle that might be carried by the patient / intakes that the patient is missing due to which the above parameter is abnoraml
Example:
Hemoglobin (11.2 g/dL, Low):
Explanation: Hemoglobin is a protein in red blood cells that carries oxygen to the body.
Implications: Low levels suggest anemia, which could result in fatigue, weakness, or more serious complications if untreated.
Unintended actions - iron deficient diet , less exercise etc"#;

pub const DIET_RECOMMENDATIONS_PROMPT: &str = r#"Diet Do's and Don'ts:
Provide dietary recommendations based on abnormal parameters. Categorize them into foods to include and avoid, targeting the specific issues flagged.
Example:
For Anemia:
Foods to Include: Spinach, lentils, tofu, red meat, dates, vitamin C-rich foods like oranges (to enhance iron absorption).
Foods to Avoid: Tea and coffee near meals (reduce iron absorption).
For High Cholesterol:
Foods to Include: Oats, flaxseeds, nuts (almonds, walnuts), fatty fish (salmon, mackerel), olive oil.
Foods to Avoid: Fried foods, processed meats, butter, and cheese."#;

pub const CONSOLIDATED_GUIDANCE_PROMPT: &str = r#"Provide a summary of recommendations for overall health improvement, considering the combined impact of the report findings. Include:
Medical follow-up advice (e.g., "Consult a gastroenterologist for liver enzyme abnormalities").
This should convince the user that although there is nothing to worry about and should consult a specialist if possible to ensure safety."#;

pub const FINAL_SUMMARY_PROMPT: &str = r#"FINAL SUMMARY - Just a detailed summary of everything above that seems satisfactory to the user/patient."#;
